pub trait Env {
    const ENTRY_POINT: &str;

    const FILE_PROLOGUE: &str;

    const SECTION_TEXT: &str;
    const SECTION_READ_ONLY_DATA: &str;

    /// Number of integer and of floating-point argument registers.
    const ARG_REGISTERS: usize;
}

impl Env for Rv32 {
    const ENTRY_POINT: &str = "main";

    const FILE_PROLOGUE: &str = ".option nopic";

    const SECTION_TEXT: &str = ".text";
    const SECTION_READ_ONLY_DATA: &str = ".rodata";

    const ARG_REGISTERS: usize = 8;
}

/// 32-bit RISC-V with the M and F extensions, ilp32f calling convention.
pub struct Rv32;
