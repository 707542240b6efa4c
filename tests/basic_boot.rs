#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(chispa_os::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;

use chispa_os::{entry_point, println, vga_buffer};

entry_point!(main);

fn main() -> ! {
    // A propósito NO se llama a chispa_os::init(): la consola tiene que
    // funcionar incluso antes de reemplazar la GDT provisional.
    test_main();
    chispa_os::hlt_loop();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    chispa_os::test_panic_handler(info)
}

// ============================================================================
// Tests de arranque básico
// ============================================================================

#[test_case]
fn test_println_antes_de_la_gdt() {
    println!("salida de prueba");
}

#[test_case]
fn test_reset_deja_el_cursor_en_el_origen() {
    vga_buffer::reset();
    assert_eq!(vga_buffer::cursor_position(), (0, 0));
}

#[test_case]
fn test_muchas_lineas_no_desbordan() {
    // mucho más que las 25 líneas de la pantalla: obliga a desplazar
    for i in 0..200 {
        println!("linea {}", i);
    }
}
