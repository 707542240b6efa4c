//! # Global Descriptor Table (GDT)
//!
//! Este módulo construye la GDT del kernel para modo protegido de 32 bits.
//!
//! ## ¿Qué es la GDT?
//! La GDT es la tabla con la que los procesadores x86 definen los segmentos de
//! memoria y sus reglas de acceso. Usamos el modelo *flat*: todos los segmentos
//! arrancan en 0 y cubren los 4 GiB completos, así que la segmentación solo
//! aporta la separación de privilegios (anillo 0 para el kernel, anillo 3 para
//! usuario). La protección real de memoria llegará con paginación.
//!
//! ## Contenido de la tabla
//! | Índice | Selector | Descriptor                    |
//! |--------|----------|-------------------------------|
//! | 0      | 0x00     | Nulo (obligatorio)            |
//! | 1      | 0x08     | Código del kernel (anillo 0)  |
//! | 2      | 0x10     | Datos del kernel (anillo 0)   |
//! | 3      | 0x18     | Código de usuario (anillo 3)  |
//! | 4      | 0x20     | Datos de usuario (anillo 3)   |
//! | 5      | 0x28     | TSS                           |
//!
//! Cada descriptor ocupa exactamente 8 bytes con un layout fijado por el
//! hardware; el módulo los codifica bit a bit en lugar de confiar en el
//! layout por defecto de Rust.

use core::mem::size_of;

use lazy_static::lazy_static;

use crate::arch;

/// Cantidad fija de entradas de la tabla.
pub const ENTRY_COUNT: usize = 6;

/// Índice de la entrada del TSS.
const TSS_INDEX: usize = 5;

/// Selector del segmento de código del kernel (índice 1, anillo 0).
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
/// Selector del segmento de datos del kernel (índice 2, anillo 0).
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
/// Selector del segmento de código de usuario (índice 3).
pub const USER_CODE_SELECTOR: u16 = 0x18;
/// Selector del segmento de datos de usuario (índice 4).
pub const USER_DATA_SELECTOR: u16 = 0x20;
/// Selector del TSS (índice 5).
pub const TSS_SELECTOR: u16 = 0x28;

/// Bits RPL de un selector usado desde anillo 3.
pub const RPL_USER: u16 = 0b11;

/// Un descriptor de segmento de 8 bytes.
///
/// El hardware reparte el campo base (32 bits) en tres pedazos y el límite
/// (20 bits) en dos; el nibble alto del límite comparte byte con los flags de
/// granularidad. `repr(C, packed)` garantiza que no haya relleno y que los
/// campos queden en el orden exacto que espera el procesador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_middle: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

const _: () = assert!(size_of::<GdtEntry>() == 8);

impl GdtEntry {
    /// El descriptor nulo: todos los campos en cero.
    pub const fn null() -> GdtEntry {
        GdtEntry {
            limit_low: 0,
            base_low: 0,
            base_middle: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }

    /// Codifica un descriptor a partir de sus campos lógicos.
    ///
    /// `limit` se trata como un valor de 20 bits: los bits por encima del 19
    /// se descartan por construcción. `access` y `gran` son los bytes crudos
    /// en formato de hardware; no hay validación posible por software, un
    /// valor malformado produce un descriptor que se comportará mal en la CPU.
    pub fn new(base: u32, limit: u32, access: u8, gran: u8) -> GdtEntry {
        GdtEntry {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_middle: ((base >> 16) & 0xFF) as u8,
            access,
            // nibble bajo: bits 16-19 del límite; nibble alto: flags
            granularity: (((limit >> 16) & 0x0F) as u8) | (gran & 0xF0),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }

    /// Reconstruye la dirección base a partir de sus tres pedazos.
    pub fn base(&self) -> u32 {
        let low = self.base_low as u32;
        let middle = self.base_middle as u32;
        let high = self.base_high as u32;
        low | (middle << 16) | (high << 24)
    }

    /// Reconstruye el límite de 20 bits.
    pub fn limit(&self) -> u32 {
        let low = self.limit_low as u32;
        let high = (self.granularity & 0x0F) as u32;
        low | (high << 16)
    }

    /// Byte de acceso tal como lo verá el hardware.
    pub fn access(&self) -> u8 {
        self.access
    }

    /// Byte de flags + límite alto tal como lo verá el hardware.
    pub fn granularity(&self) -> u8 {
        self.granularity
    }

    /// Los 8 bytes del descriptor en el orden en que los lee el procesador.
    pub fn as_bytes(&self) -> [u8; 8] {
        let limit_low = self.limit_low.to_le_bytes();
        let base_low = self.base_low.to_le_bytes();
        [
            limit_low[0],
            limit_low[1],
            base_low[0],
            base_low[1],
            self.base_middle,
            self.access,
            self.granularity,
            self.base_high,
        ]
    }
}

/// El par `(límite, base)` que consume la instrucción `lgdt`: tamaño de la
/// tabla en bytes menos uno, y su dirección.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct GdtPointer {
    pub limit: u16,
    pub base: u32,
}

const _: () = assert!(size_of::<GdtPointer>() == 6);

/// La tabla de descriptores completa.
pub struct Gdt {
    entries: [GdtEntry; ENTRY_COUNT],
}

impl Gdt {
    /// Una tabla con todas las entradas nulas.
    pub const fn new() -> Gdt {
        Gdt {
            entries: [GdtEntry::null(); ENTRY_COUNT],
        }
    }

    /// Escribe el descriptor de la ranura `index`.
    ///
    /// No hay camino de error: un índice fuera de rango es un bug del kernel
    /// y el panic resultante es preferible a corromper memoria vecina.
    pub fn set_gate(&mut self, index: usize, base: u32, limit: u32, access: u8, gran: u8) {
        self.entries[index] = GdtEntry::new(base, limit, access, gran);
    }

    /// Copia del descriptor en la ranura `index`.
    pub fn entry(&self, index: usize) -> GdtEntry {
        self.entries[index]
    }

    /// El puntero `(límite, base)` que describe esta tabla.
    pub fn pointer(&self) -> GdtPointer {
        GdtPointer {
            limit: (size_of::<[GdtEntry; ENTRY_COUNT]>() - 1) as u16,
            base: self.entries.as_ptr() as u32,
        }
    }
}

lazy_static! {
    /// GDT única del kernel.
    ///
    /// Los cuatro segmentos planos usan base 0 y límite 0xFFFFF con
    /// granularidad de 4 KiB (flags 0xCF: páginas de 4 KiB, segmento de
    /// 32 bits), es decir, cubren todo el espacio de direcciones.
    static ref GDT: Gdt = {
        let mut gdt = Gdt::new();

        gdt.set_gate(0, 0, 0, 0, 0);                // nulo, lo exige el hardware
        gdt.set_gate(1, 0, 0xFFFFFFFF, 0x9A, 0xCF); // código kernel: presente, anillo 0, ejecutar/leer
        gdt.set_gate(2, 0, 0xFFFFFFFF, 0x92, 0xCF); // datos kernel: presente, anillo 0, leer/escribir
        gdt.set_gate(3, 0, 0xFFFFFFFF, 0xFA, 0xCF); // código usuario: presente, anillo 3, ejecutar/leer
        gdt.set_gate(4, 0, 0xFFFFFFFF, 0xF2, 0xCF); // datos usuario: presente, anillo 3, leer/escribir

        // El TSS calcula su propio descriptor y lo registra en la ranura 5
        crate::tss::register(&mut gdt, TSS_INDEX);

        gdt
    };
}

/// Copia del descriptor en la ranura `index` de la GDT del kernel.
pub fn entry(index: usize) -> GdtEntry {
    GDT.entry(index)
}

/// El puntero que describe la GDT del kernel.
pub fn pointer() -> GdtPointer {
    GDT.pointer()
}

/// Construye la GDT (si hace falta), la carga en el registro GDTR y después
/// carga el selector del TSS en el Task Register.
///
/// El orden importa: la tabla tiene que estar activa antes de que el Task
/// Register pueda referenciar una entrada dentro de ella.
pub fn init() {
    let pointer = GDT.pointer();
    let limit = pointer.limit;
    let base = pointer.base;
    serial_println!("gdt: cargando tabla en {:#010x} (limite {:#06x})", base, limit);

    unsafe {
        arch::load_gdt(&pointer);
        arch::load_task_register(TSS_SELECTOR | RPL_USER);
    }

    serial_println!("gdt: GDTR y TR cargados");
}

// ============================================================================
// Tests
// ============================================================================

#[test_case]
fn test_tamanios_de_las_estructuras() {
    // layouts fijados por el hardware: sin relleno posible
    assert_eq!(size_of::<GdtEntry>(), 8);
    assert_eq!(size_of::<GdtPointer>(), 6);
    assert_eq!(size_of::<[GdtEntry; ENTRY_COUNT]>(), 48);
}

#[test_case]
fn test_descriptor_de_codigo_del_kernel() {
    // el descriptor plano clásico, byte a byte
    let entry = GdtEntry::new(0, 0xFFFFFFFF, 0x9A, 0xCF);
    assert_eq!(entry.as_bytes(), [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x9A, 0xCF, 0x00]);
}

#[test_case]
fn test_codificar_y_decodificar_conserva_los_campos() {
    let casos: [(u32, u32); 4] = [
        (0x0000_0000, 0x0000_0000),
        (0x1234_5678, 0x000A_BCDE),
        (0xFFFF_FFFF, 0x000F_FFFF),
        (0xDEAD_0000, 0x0001_2345),
    ];
    for (base, limit) in casos {
        let entry = GdtEntry::new(base, limit, 0x92, 0xC0);
        assert_eq!(entry.base(), base);
        assert_eq!(entry.limit(), limit & 0xFFFFF);
        assert_eq!(entry.access(), 0x92);
    }
}

#[test_case]
fn test_limite_alto_y_flags_no_se_mezclan() {
    // el nibble del límite no debe pisar el de los flags, ni al revés
    let solo_limite = GdtEntry::new(0, 0xF0000, 0, 0x00);
    assert_eq!(solo_limite.granularity(), 0x0F);

    let solo_flags = GdtEntry::new(0, 0, 0, 0xF0);
    assert_eq!(solo_flags.granularity(), 0xF0);

    // los bits por encima del bit 19 del límite se descartan
    let limite_recortado = GdtEntry::new(0, 0xABCDE123, 0, 0x00);
    assert_eq!(limite_recortado.limit(), 0xDE123);
}

#[test_case]
fn test_limite_del_puntero() {
    let gdt = Gdt::new();
    let pointer = gdt.pointer();
    let limit = pointer.limit;
    let base = pointer.base;
    assert_eq!(limit, (ENTRY_COUNT * 8 - 1) as u16);
    assert_eq!(base, gdt.entries.as_ptr() as u32);
}

#[test_case]
fn test_contenido_de_la_tabla() {
    assert_eq!(entry(0).as_bytes(), [0; 8]);

    let segmentos_planos = [(1, 0x9A), (2, 0x92), (3, 0xFA), (4, 0xF2)];
    for (index, access) in segmentos_planos {
        let descriptor = entry(index);
        assert_eq!(descriptor.base(), 0);
        assert_eq!(descriptor.limit(), 0xFFFFF);
        assert_eq!(descriptor.access(), access);
        assert_eq!(descriptor.granularity() & 0xF0, 0xC0);
    }
}
