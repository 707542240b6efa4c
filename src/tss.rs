//! # Task State Segment (TSS)
//!
//! ## ¿Qué es el TSS?
//! El Task State Segment es un registro de hardware pensado originalmente
//! para multitarea por hardware. Este kernel no usa cambios de tarea: del TSS
//! solo importan `ss0` y `esp0`, los campos que el procesador lee de forma
//! automática en cada transición de anillo 3 a anillo 0 (una syscall o una
//! interrupción futura) para cambiar a una pila de kernel segura.
//!
//! El resto de los campos queda en cero, salvo los selectores de segmento por
//! defecto, que deben ser estructuralmente válidos por si alguna vez se
//! ejecutara un cambio de tarea completo.
//!
//! El layout es de 26 campos de 32 bits fijados por el hardware: ni el orden
//! ni los tamaños pueden cambiar.

use core::mem::size_of;

use lazy_static::lazy_static;

use crate::gdt::{self, Gdt};

/// Tamaño de la pila de anillo 0 (20 KiB, alineada a 16 bytes).
pub const KERNEL_STACK_SIZE: usize = 4096 * 5;

/// Byte de acceso del descriptor: presente, DPL 3, tipo de sistema
/// "TSS de 32 bits disponible".
const TSS_ACCESS: u8 = 0xE9;

/// El registro tal como lo lee el procesador.
///
/// Los campos de selectores (`ss0`, `es`...`gs`, `ldt`) ocupan 32 bits cada
/// uno aunque un selector mida 16: la mitad alta está reservada y debe
/// quedar en cero.
#[repr(C, packed)]
pub struct TaskStateSegment {
    pub prev_tss: u32,
    pub esp0: u32,
    pub ss0: u32,
    pub esp1: u32,
    pub ss1: u32,
    pub esp2: u32,
    pub ss2: u32,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u32,
    pub cs: u32,
    pub ss: u32,
    pub ds: u32,
    pub fs: u32,
    pub gs: u32,
    pub ldt: u32,
    pub trap: u16,
    pub iomap_base: u16,
}

const _: () = assert!(size_of::<TaskStateSegment>() == 104);

impl TaskStateSegment {
    /// Un TSS con todos los campos en cero.
    pub const fn new() -> TaskStateSegment {
        TaskStateSegment {
            prev_tss: 0,
            esp0: 0,
            ss0: 0,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldt: 0,
            trap: 0,
            iomap_base: 0,
        }
    }
}

/// Construye el TSS del kernel.
///
/// Parte de un registro completamente en cero (el hardware interpreta lo que
/// encuentre, incluso basura de memoria sin inicializar) y fija solo:
/// - `ss0`/`esp0`: la pila a la que salta el procesador al entrar a anillo 0
/// - `cs` y los selectores de datos: los valores por defecto de un cambio de
///   tarea, con los bits RPL de anillo 3
fn kernel_tss(ss0: u16, esp0: u32) -> TaskStateSegment {
    let mut tss = TaskStateSegment::new();

    tss.ss0 = ss0 as u32;
    tss.esp0 = esp0;

    tss.cs = (gdt::KERNEL_CODE_SELECTOR | gdt::RPL_USER) as u32;
    let data = (gdt::KERNEL_DATA_SELECTOR | gdt::RPL_USER) as u32;
    tss.ss = data;
    tss.ds = data;
    tss.es = data;
    tss.fs = data;
    tss.gs = data;

    tss
}

lazy_static! {
    /// TSS único del kernel.
    pub static ref TSS: TaskStateSegment = {
        // Pila dedicada para las transiciones a anillo 0
        let esp0 = {
            #[repr(align(16))]
            #[allow(dead_code)]
            struct AlignedStack([u8; KERNEL_STACK_SIZE]);
            static mut STACK: AlignedStack = AlignedStack([0; KERNEL_STACK_SIZE]);

            let stack_start = (&raw const STACK) as *const u8 as u32;
            // La pila crece hacia abajo: esp0 apunta al TOPE
            stack_start + KERNEL_STACK_SIZE as u32
        };

        kernel_tss(gdt::KERNEL_DATA_SELECTOR, esp0)
    };
}

/// Escribe el descriptor del TSS en la ranura `index` de la tabla.
///
/// El descriptor usa granularidad de byte (flags 0x00): el TSS mide 104
/// bytes exactos y no tiene sentido medirlo en páginas.
pub fn register(gdt: &mut Gdt, index: usize) {
    let base = (&*TSS as *const TaskStateSegment) as u32;
    let limit = base + size_of::<TaskStateSegment>() as u32;

    gdt.set_gate(index, base, limit, TSS_ACCESS, 0x00);
}

// ============================================================================
// Tests
// ============================================================================

#[test_case]
fn test_tamanio_del_tss() {
    // 104 bytes, fijados por el hardware
    assert_eq!(size_of::<TaskStateSegment>(), 104);
}

#[test_case]
fn test_campos_de_la_pila_de_anillo_0() {
    let ss0 = TSS.ss0;
    let esp0 = TSS.esp0;

    assert_eq!(ss0, gdt::KERNEL_DATA_SELECTOR as u32);
    assert_ne!(esp0, 0);
    assert_eq!(esp0 % 16, 0);
}

#[test_case]
fn test_selectores_por_defecto() {
    let cs = TSS.cs;
    assert_eq!(cs, (gdt::KERNEL_CODE_SELECTOR | gdt::RPL_USER) as u32);

    let data = (gdt::KERNEL_DATA_SELECTOR | gdt::RPL_USER) as u32;
    let selectores = [TSS.ss, TSS.ds, TSS.es, TSS.fs, TSS.gs];
    for selector in selectores {
        assert_eq!(selector, data);
    }
}

#[test_case]
fn test_el_resto_queda_en_cero() {
    let restos = [
        TSS.prev_tss, TSS.esp1, TSS.ss1, TSS.esp2, TSS.ss2, TSS.cr3,
        TSS.eip, TSS.eflags, TSS.eax, TSS.ecx, TSS.edx, TSS.ebx,
        TSS.esp, TSS.ebp, TSS.esi, TSS.edi, TSS.ldt,
    ];
    for campo in restos {
        assert_eq!(campo, 0);
    }
    let trap = TSS.trap;
    let iomap_base = TSS.iomap_base;
    assert_eq!(trap, 0);
    assert_eq!(iomap_base, 0);
}

#[test_case]
fn test_descriptor_del_tss() {
    let descriptor = gdt::entry(5);
    let base = (&*TSS as *const TaskStateSegment) as u32;

    assert_eq!(descriptor.access(), TSS_ACCESS);
    // granularidad de byte: nibble de flags en cero
    assert_eq!(descriptor.granularity() & 0xF0, 0x00);
    assert_eq!(descriptor.base(), base);
    // el límite del descriptor solo conserva los 20 bits bajos
    assert_eq!(descriptor.limit(), (base + size_of::<TaskStateSegment>() as u32) & 0xFFFFF);
}
