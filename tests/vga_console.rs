#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(chispa_os::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;

use chispa_os::{entry_point, print, println, vga_buffer};
use chispa_os::vga_buffer::{BUFFER_HEIGHT, BUFFER_WIDTH};

entry_point!(main);

fn main() -> ! {
    test_main();
    chispa_os::hlt_loop();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    chispa_os::test_panic_handler(info)
}

// ============================================================================
// Comportamiento de la consola visto desde afuera del módulo
// ============================================================================

#[test_case]
fn test_imprimir_avanza_el_cursor() {
    vga_buffer::reset();
    print!("12345");
    assert_eq!(vga_buffer::cursor_position(), (0, 5));
}

#[test_case]
fn test_tabulacion_tras_dos_caracteres() {
    // "ab" + tab rellena las columnas 2 y 3, "c" queda en la 4
    vga_buffer::reset();
    print!("ab\tc");
    assert_eq!(vga_buffer::cursor_position(), (0, 5));
}

#[test_case]
fn test_retorno_de_carro() {
    vga_buffer::reset();
    print!("abc\r");
    assert_eq!(vga_buffer::cursor_position(), (0, 0));
}

#[test_case]
fn test_ajuste_de_linea() {
    vga_buffer::reset();
    for _ in 0..BUFFER_WIDTH {
        print!("a");
    }
    print!("b");
    assert_eq!(vga_buffer::cursor_position(), (1, 1));
}

#[test_case]
fn test_desplazamiento_deja_el_cursor_abajo() {
    vga_buffer::reset();
    for i in 0..100 {
        println!("linea {}", i);
    }
    // una vez llena la pantalla, cada salto desplaza y el cursor se queda
    // al principio de la última línea
    assert_eq!(vga_buffer::cursor_position(), (BUFFER_HEIGHT - 1, 0));
}
