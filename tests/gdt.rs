#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(chispa_os::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;

use chispa_os::{arch, entry_point, gdt};

entry_point!(main);

fn main() -> ! {
    chispa_os::init();
    test_main();
    chispa_os::hlt_loop();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    chispa_os::test_panic_handler(info)
}

// ============================================================================
// Verificación del estado real del procesador después de init()
// ============================================================================

#[test_case]
fn test_gdtr_apunta_a_nuestra_tabla() {
    let cargado = arch::sgdt();
    let esperado = gdt::pointer();

    let limite_cargado = cargado.limit;
    let base_cargada = cargado.base;
    let limite_esperado = esperado.limit;
    let base_esperada = esperado.base;

    assert_eq!(limite_cargado, limite_esperado);
    assert_eq!(limite_cargado, (gdt::ENTRY_COUNT * 8 - 1) as u16);
    assert_eq!(base_cargada, base_esperada);
}

#[test_case]
fn test_task_register_cargado() {
    // el TR guarda el selector completo, con sus bits RPL
    let tr = arch::store_task_register();
    assert_eq!(tr, gdt::TSS_SELECTOR | gdt::RPL_USER);
}

#[test_case]
fn test_selectores_de_segmento_recargados() {
    assert_eq!(arch::cs(), gdt::KERNEL_CODE_SELECTOR);
    assert_eq!(arch::ds(), gdt::KERNEL_DATA_SELECTOR);
}

#[test_case]
fn test_init_es_idempotente() {
    // recargar la misma tabla no cambia nada observable
    chispa_os::init();

    assert_eq!(arch::cs(), gdt::KERNEL_CODE_SELECTOR);
    let tr = arch::store_task_register();
    assert_eq!(tr, gdt::TSS_SELECTOR | gdt::RPL_USER);
}
