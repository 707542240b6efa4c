//! # Buffer VGA en Modo Texto
//!
//! El hardware VGA expone una rejilla de 80x25 celdas mapeada en la dirección
//! física `0xB8000`. Cada celda ocupa 16 bits:
//!
//! ```text
//! bits 0-7   código ASCII del carácter
//! bits 8-11  color del texto
//! bits 12-15 color del fondo
//! ```
//!
//! El módulo mantiene un cursor `(línea, columna)` y un color actual, maneja
//! los caracteres de control (`\n`, `\r`, `\t`) y desplaza la pantalla hacia
//! arriba cuando se llena. La fila superior se pierde: no hay historial.
//!
//! Todas las escrituras al buffer pasan por `Volatile` para que el compilador
//! no elimine accesos a memoria que "nadie lee" (los lee la tarjeta de video).

use core::fmt;

use lazy_static::lazy_static;
use spin::Mutex;
use volatile::Volatile;

/// Los 16 colores estándar del modo texto VGA.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

/// Atributo de color completo de una celda: fondo en el nibble alto,
/// texto en el nibble bajo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
struct ColorCode(u8);

impl ColorCode {
    const fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode((background as u8) << 4 | (foreground as u8))
    }
}

/// Color inicial de la consola: celeste sobre negro.
const DEFAULT_COLOR: ColorCode = ColorCode::new(Color::LightBlue, Color::Black);

/// Una celda de la pantalla tal como la lee el hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct ScreenChar {
    ascii_character: u8,
    color_code: ColorCode,
}

/// Alto de la rejilla en líneas.
pub const BUFFER_HEIGHT: usize = 25;
/// Ancho de la rejilla en columnas.
pub const BUFFER_WIDTH: usize = 80;

/// Las paradas de tabulación caen cada 4 columnas.
const TAB_WIDTH: usize = 4;

#[repr(transparent)]
struct Buffer {
    chars: [[Volatile<ScreenChar>; BUFFER_WIDTH]; BUFFER_HEIGHT],
}

/// Escritor de la consola: cursor `(línea, columna)`, color actual y la
/// referencia al buffer mapeado en memoria.
pub struct Writer {
    line: usize,
    column: usize,
    color_code: ColorCode,
    buffer: &'static mut Buffer,
}

impl Writer {
    /// Limpia la pantalla completa y devuelve el escritor a su estado
    /// inicial: cursor en el origen y color por defecto.
    pub fn reset(&mut self) {
        self.line = 0;
        self.column = 0;
        self.color_code = DEFAULT_COLOR;

        let blank = ScreenChar {
            ascii_character: b' ',
            color_code: DEFAULT_COLOR,
        };
        for y in 0..BUFFER_HEIGHT {
            for x in 0..BUFFER_WIDTH {
                self.buffer.chars[y][x].write(blank);
            }
        }
    }

    /// Cambia el color con el que se escriben los próximos caracteres.
    pub fn set_color(&mut self, foreground: Color, background: Color) {
        self.color_code = ColorCode::new(foreground, background);
    }

    /// Escribe un byte aplicando la semántica de los caracteres de control.
    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            // retorno de carro: vuelve al principio de la línea actual
            b'\r' => self.column = 0,
            b'\t' => {
                if self.column == BUFFER_WIDTH {
                    self.new_line();
                }
                // Rellena con espacios hasta el próximo múltiplo de 4.
                // En una parada exacta avanza las 4 columnas completas.
                let mut fill = TAB_WIDTH - self.column % TAB_WIDTH;
                while fill != 0 {
                    self.put_char(b' ');
                    fill -= 1;
                }
            }
            byte => {
                if self.column == BUFFER_WIDTH {
                    self.new_line();
                }
                self.put_char(byte);
            }
        }
    }

    /// Escribe un string byte a byte. Los bytes fuera del rango ASCII
    /// imprimible se muestran como `■` (0xFE).
    pub fn write_string(&mut self, s: &str) {
        for byte in s.bytes() {
            match byte {
                0x20..=0x7e | b'\n' | b'\r' | b'\t' => self.write_byte(byte),
                _ => self.write_byte(0xfe),
            }
        }
    }

    /// Posición actual del cursor como `(línea, columna)`.
    pub fn cursor(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    fn put_char(&mut self, byte: u8) {
        self.buffer.chars[self.line][self.column].write(ScreenChar {
            ascii_character: byte,
            color_code: self.color_code,
        });
        self.column += 1;
    }

    /// Baja a la columna 0 de la línea siguiente; en la última línea
    /// desplaza la pantalla en lugar de salirse de la rejilla.
    fn new_line(&mut self) {
        if self.line < BUFFER_HEIGHT - 1 {
            self.line += 1;
        } else {
            self.scroll_up();
        }
        self.column = 0;
    }

    /// Copia cada fila sobre la anterior y deja la última en blanco,
    /// con el color actual. La fila superior se descarta.
    fn scroll_up(&mut self) {
        for y in 1..BUFFER_HEIGHT {
            for x in 0..BUFFER_WIDTH {
                let character = self.buffer.chars[y][x].read();
                self.buffer.chars[y - 1][x].write(character);
            }
        }

        let blank = ScreenChar {
            ascii_character: b' ',
            color_code: self.color_code,
        };
        for x in 0..BUFFER_WIDTH {
            self.buffer.chars[BUFFER_HEIGHT - 1][x].write(blank);
        }
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}

lazy_static! {
    /// Escritor global de la consola. Único punto de acceso al buffer VGA:
    /// la conversión del puntero crudo `0xB8000` ocurre una sola vez, aquí.
    pub static ref WRITER: Mutex<Writer> = Mutex::new(Writer {
        line: 0,
        column: 0,
        color_code: DEFAULT_COLOR,
        buffer: unsafe { &mut *(0xb8000 as *mut Buffer) },
    });
}

/// Limpia la pantalla y restaura el estado inicial del escritor global.
pub fn reset() {
    WRITER.lock().reset();
}

/// Posición del cursor del escritor global.
pub fn cursor_position() -> (usize, usize) {
    WRITER.lock().cursor()
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    WRITER.lock().write_fmt(args).unwrap();
}

/// Imprime en la pantalla VGA
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::vga_buffer::_print(format_args!($($arg)*)));
}

/// Imprime con salto de línea en la pantalla VGA
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

// ============================================================================
// Tests
// ============================================================================

#[test_case]
fn test_reset_limpia_la_pantalla() {
    let mut writer = WRITER.lock();
    writer.set_color(Color::White, Color::Red);
    writer.write_string("basura previa");
    writer.reset();

    assert_eq!(writer.cursor(), (0, 0));
    let blank = ScreenChar {
        ascii_character: b' ',
        color_code: DEFAULT_COLOR,
    };
    for y in 0..BUFFER_HEIGHT {
        for x in 0..BUFFER_WIDTH {
            assert_eq!(writer.buffer.chars[y][x].read(), blank);
        }
    }
}

#[test_case]
fn test_escribir_avanza_la_columna() {
    let mut writer = WRITER.lock();
    writer.reset();
    writer.write_string("hola");

    assert_eq!(writer.cursor(), (0, 4));
    for (x, byte) in b"hola".iter().enumerate() {
        let cell = writer.buffer.chars[0][x].read();
        assert_eq!(cell.ascii_character, *byte);
        assert_eq!(cell.color_code, DEFAULT_COLOR);
    }
}

#[test_case]
fn test_salto_de_linea_no_toca_filas_previas() {
    let mut writer = WRITER.lock();
    writer.reset();
    writer.write_string("abc\nxyz");

    assert_eq!(writer.cursor(), (1, 3));
    for (x, byte) in b"abc".iter().enumerate() {
        assert_eq!(writer.buffer.chars[0][x].read().ascii_character, *byte);
    }
    for (x, byte) in b"xyz".iter().enumerate() {
        assert_eq!(writer.buffer.chars[1][x].read().ascii_character, *byte);
    }
}

#[test_case]
fn test_retorno_de_carro_sobreescribe() {
    let mut writer = WRITER.lock();
    writer.reset();
    writer.write_string("abc\rX");

    assert_eq!(writer.cursor(), (0, 1));
    assert_eq!(writer.buffer.chars[0][0].read().ascii_character, b'X');
    assert_eq!(writer.buffer.chars[0][1].read().ascii_character, b'b');
    assert_eq!(writer.buffer.chars[0][2].read().ascii_character, b'c');
}

#[test_case]
fn test_tabulacion_en_parada_avanza_cuatro() {
    let mut writer = WRITER.lock();
    writer.reset();
    writer.write_byte(b'\t');

    assert_eq!(writer.cursor(), (0, 4));
    for x in 0..4 {
        assert_eq!(writer.buffer.chars[0][x].read().ascii_character, b' ');
    }
}

#[test_case]
fn test_tabulacion_redondea_a_la_proxima_parada() {
    // "ab" deja el cursor en 2; el tab rellena 2 y 3 y sigue en 4
    let mut writer = WRITER.lock();
    writer.reset();
    writer.write_string("ab\tc");

    assert_eq!(writer.cursor(), (0, 5));
    let esperado = b"ab  c";
    for (x, byte) in esperado.iter().enumerate() {
        assert_eq!(writer.buffer.chars[0][x].read().ascii_character, *byte);
    }

    // desde la columna 5 la próxima parada es la 8
    writer.write_byte(b'\t');
    assert_eq!(writer.cursor(), (0, 8));
}

#[test_case]
fn test_ajuste_al_final_de_la_linea() {
    let mut writer = WRITER.lock();
    writer.reset();
    for _ in 0..BUFFER_WIDTH {
        writer.write_byte(b'a');
    }
    assert_eq!(writer.cursor(), (0, BUFFER_WIDTH));

    // la columna ya vale 80: el próximo byte baja de línea primero
    writer.write_byte(b'b');
    assert_eq!(writer.cursor(), (1, 1));
    assert_eq!(writer.buffer.chars[0][BUFFER_WIDTH - 1].read().ascii_character, b'a');
    assert_eq!(writer.buffer.chars[1][0].read().ascii_character, b'b');
}

#[test_case]
fn test_desplazamiento_en_la_ultima_linea() {
    let mut writer = WRITER.lock();
    writer.reset();
    writer.write_string("uno\ndos");

    // baja hasta la última línea y fuerza un desplazamiento
    while writer.cursor().0 < BUFFER_HEIGHT - 1 {
        writer.write_byte(b'\n');
    }
    writer.write_byte(b'\n');

    // "dos" estaba en la línea 1 y ahora está en la 0; "uno" se perdió
    for (x, byte) in b"dos".iter().enumerate() {
        assert_eq!(writer.buffer.chars[0][x].read().ascii_character, *byte);
    }
    // la última línea queda en blanco y el cursor al principio de ella
    for x in 0..BUFFER_WIDTH {
        let cell = writer.buffer.chars[BUFFER_HEIGHT - 1][x].read();
        assert_eq!(cell.ascii_character, b' ');
    }
    assert_eq!(writer.cursor(), (BUFFER_HEIGHT - 1, 0));
}

#[test_case]
fn test_println_escribe_en_pantalla() {
    reset();
    println!("algo probado");

    let writer = WRITER.lock();
    assert_eq!(writer.cursor(), (1, 0));
    for (x, byte) in b"algo probado".iter().enumerate() {
        assert_eq!(writer.buffer.chars[0][x].read().ascii_character, *byte);
    }
}
