//! Puerto serie COM1 para salida de debug hacia el host.
//! Es el canal por el que reportan los tests; QEMU lo redirige a stdio.

use core::fmt;

use lazy_static::lazy_static;
use spin::Mutex;

use crate::arch::{inb, outb};

const COM1: u16 = 0x3F8;

const LCR_OFF: u16 = 3;
const LCR_8N1: u8 = 0x03;
const MCR_OFF: u16 = 4;
const MCR_DTR_RTS: u8 = 0x03;
const LSR_OFF: u16 = 5;
const LSR_THRE: u8 = 0x20;

/// UART 16550 direccionado por puertos de E/S.
pub struct SerialPort {
    base: u16,
}

impl SerialPort {
    /// # Safety
    /// `base` debe ser la dirección base de un UART 16550 real.
    pub const unsafe fn new(base: u16) -> SerialPort {
        SerialPort { base }
    }

    /// Configura la línea en 8n1, sin interrupciones.
    pub fn init(&mut self) {
        unsafe {
            outb(self.base + LCR_OFF, LCR_8N1);
            outb(self.base + MCR_OFF, MCR_DTR_RTS);
        }
    }

    fn is_transmit_empty(&self) -> bool {
        unsafe { (inb(self.base + LSR_OFF) & LSR_THRE) != 0 }
    }

    /// Envía un byte. Bloquea hasta que el registro de transmisión se vacíe.
    pub fn send(&mut self, byte: u8) {
        while !self.is_transmit_empty() {}
        unsafe { outb(self.base, byte) }
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.send(byte);
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        // 0x3F8 es la dirección estándar del COM1 en x86
        let mut serial_port = unsafe { SerialPort::new(COM1) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;

    // Las interrupciones siguen deshabilitadas en esta etapa del arranque,
    // así que nadie puede expropiarnos el lock a mitad de una impresión.
    SERIAL1.lock()
        .write_fmt(args)
        .expect("Fallo la impresión por puerto serie");
}

/// Imprime en el puerto serie (Host terminal)
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*));
    };
}

/// Imprime con salto de línea en el puerto serie
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(
        concat!($fmt, "\n"), $($arg)*));
}
