//! # Punto de Entrada del Kernel
//!
//! Este archivo contiene `kernel_main`, la función a la que salta el stub de
//! arranque una vez que hay una pila válida.
//!
//! La secuencia de arranque es corta: dejar la consola en un estado conocido,
//! anunciar que el kernel está vivo, y reemplazar la GDT provisional del
//! bootloader por la definitiva (con su TSS). Todo lo demás (paginación,
//! interrupciones, scheduling) vendrá después, encima de esta base.

#![no_std]   // No usamos la biblioteca estándar (no hay OS debajo)
#![no_main]  // No usamos el runtime estándar de Rust (no hay main normal)
#![feature(custom_test_frameworks)]
#![test_runner(chispa_os::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;

use chispa_os::{entry_point, println, serial_println};

entry_point!(kernel_main);

fn kernel_main() -> ! {
    // La consola primero: el resto del arranque informa por pantalla
    chispa_os::vga_buffer::reset();
    println!("Hola desde chispa-os!");

    // Segmentación definitiva: GDT con segmentos planos + TSS
    chispa_os::init();
    println!("GDT cargada!");
    serial_println!("chispa-os: arranque completo");

    #[cfg(test)]
    test_main();

    // El kernel nunca termina
    chispa_os::hlt_loop();
}

/// Handler de panic para modo normal (no test).
/// Muestra el mensaje en pantalla y detiene la máquina.
#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("{}", info);
    chispa_os::hlt_loop();
}

/// Handler de panic para modo test.
/// Delega al handler de la biblioteca que imprime por serial y sale de QEMU.
#[cfg(test)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    chispa_os::test_panic_handler(info)
}
