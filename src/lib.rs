//! # chispa-os - Kernel Educativo en Rust
//!
//! Este es el módulo principal de la biblioteca del kernel. Expone los subsistemas
//! y funcionalidades comunes a todo el kernel.
//!
//! ## Arquitectura
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    main.rs                          │
//! │              (punto de entrada)                     │
//! └─────────────────────┬───────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                    lib.rs                           │
//! │           (inicialización y utilities)              │
//! └───────┬─────────────┬────────────────┬──────────────┘
//!         │             │                │
//!         ▼             ▼                ▼
//!    ┌─────────┐   ┌──────────┐   ┌─────────────┐
//!    │  gdt.rs │   │  tss.rs  │   │ vga_buffer  │
//!    │  (GDT)  │   │  (TSS)   │   │  (pantalla) │
//!    └─────────┘   └──────────┘   └─────────────┘
//! ```
//!
//! ## Características del Target
//! Este kernel usa un target custom (`i686-chispa_os.json`) con:
//! - `arch: x86` - Modo protegido de 32 bits, el modo que describen la GDT y el TSS
//! - `rustc-abi: x86-softfloat` - Evita instrucciones SSE en código de kernel
//! - `disable-redzone: true` - Necesario para código de kernel
//! - `panic-strategy: abort` - No hay stack unwinding
//!
//! El arranque es vía Multiboot: QEMU (`-kernel`) o GRUB dejan el procesador
//! en modo protegido con una GDT provisional y saltan a `_start`. Una de las
//! primeras tareas del kernel es reemplazar esa GDT por la propia.

#![no_std]                       // No usamos la biblioteca estándar
#![cfg_attr(test, no_main)]      // En modo test, no hay main normal
#![feature(custom_test_frameworks)]
#![test_runner(crate::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;

/// Instrucciones privilegiadas del procesador (`lgdt`, `ltr`, puertos de E/S).
/// Los demás módulos solo preparan estructuras en memoria; cargarlas en la
/// CPU pasa siempre por aquí.
pub mod arch;

/// Módulo para comunicación serial (COM1).
/// Permite imprimir mensajes al host durante el desarrollo.
#[macro_use]
pub mod serial;

/// Módulo para el buffer VGA en modo texto.
/// Permite imprimir en la pantalla del sistema.
#[macro_use]
pub mod vga_buffer;

/// Global Descriptor Table.
/// Construye los descriptores de segmento y carga la tabla en el procesador.
pub mod gdt;

/// Task State Segment.
/// Prepara la pila de anillo 0 usada en las transiciones de privilegio.
pub mod tss;

/// Declara el punto de entrada del kernel (o de un binario de test).
///
/// Emite la cabecera Multiboot, reserva una pila de arranque y define
/// `_start`, que deja `esp` apuntando a esa pila antes de saltar a Rust.
/// La función indicada debe tener la firma `fn() -> !`.
#[macro_export]
macro_rules! entry_point {
    ($path:path) => {
        ::core::arch::global_asm!(
            r#"
            .section .multiboot_header, "a"
            .align 4
            .long 0x1badb002            // magic
            .long 0                     // flags
            .long -0x1badb002           // checksum: magic + flags + checksum == 0

            .section .bss
            .align 16
            __boot_stack_bottom:
            .skip 65536
            __boot_stack_top:

            .section .text._start, "ax"
            .global _start
            _start:
                // Multiboot no garantiza un esp válido
                lea esp, [__boot_stack_top]
                xor ebp, ebp
                call __kernel_entry
            2:
                hlt
                jmp 2b
            "#
        );

        #[unsafe(no_mangle)]
        extern "C" fn __kernel_entry() -> ! {
            // Fuerza en compilación la firma correcta del punto de entrada
            let f: fn() -> ! = $path;
            f()
        }
    };
}

/// Trait para funciones de test que pueden ejecutarse automáticamente.
pub trait Testable {
    fn run(&self) -> ();
}

impl<T> Testable for T
where
    T: Fn(),
{
    fn run(&self) {
        serial_print!("{}...\t", core::any::type_name::<T>());
        self();
        serial_println!("[ok]");
    }
}

/// Inicializa todos los subsistemas del kernel.
///
/// Debe llamarse al inicio del arranque, antes de cualquier otra operación.
///
/// # Orden de inicialización
/// 1. GDT - Reemplaza la tabla provisional del bootloader, registra el TSS
///    y lo carga en el Task Register
pub fn init() {
    gdt::init();
}

/// Detiene el procesador en bucle con `hlt`.
/// Todavía no hay interrupciones habilitadas, así que en la práctica
/// detiene la máquina sin quemar CPU.
pub fn hlt_loop() -> ! {
    loop {
        arch::hlt();
    }
}

/// Ejecuta todos los tests y sale de QEMU con el código apropiado.
pub fn test_runner(tests: &[&dyn Testable]) {
    serial_println!("Ejecutando {} pruebas", tests.len());
    for test in tests {
        test.run();
    }
    exit_qemu(QemuExitCode::Success);
}

/// Handler de panic para modo test.
/// Imprime el error y sale de QEMU con código de fallo.
pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[fallido]\n");
    serial_println!("Error: {}\n", info);
    exit_qemu(QemuExitCode::Failed);
    hlt_loop();
}

/// Punto de entrada para los tests de la propia biblioteca.
#[cfg(test)]
entry_point!(test_kernel_main);

#[cfg(test)]
fn test_kernel_main() -> ! {
    init();
    test_main();
    hlt_loop();
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

/// Códigos de salida para QEMU.
/// Usados para indicar éxito o fallo en tests automatizados.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    /// Test exitoso (se mapea a código de salida 33 en QEMU)
    Success = 0x10,
    /// Test fallido (se mapea a código de salida 35 en QEMU)
    Failed = 0x11,
}

/// Sale de QEMU escribiendo al puerto de debug.
///
/// Esto funciona porque QEMU está configurado con:
/// `-device isa-debug-exit,iobase=0xf4,iosize=0x04`
///
/// El código de salida real es `(exit_code << 1) | 1`
pub fn exit_qemu(exit_code: QemuExitCode) {
    unsafe {
        arch::outl(0xf4, exit_code as u32);
    }
}
