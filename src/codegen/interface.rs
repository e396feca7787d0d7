use std::fmt;

use crate::{
    ast::Program,
    codegen::{riscv::Generator, riscv_env},
    symbols::ScopeMap,
    util::intern::Interner,
};

/// Emits the assembly for an analyzed program into `writer`.
///
/// `scopes` must be the table map produced by analyzing this very program.
pub fn generate<W>(
    writer: W,
    names: &Interner,
    target: Target,
    scopes: ScopeMap,
    program: &Program,
    source_name: &str,
) where
    W: fmt::Write,
{
    type Rv32Generator<'a, W> = Generator<'a, W, riscv_env::Rv32>;

    match target {
        Target::riscv32 => Rv32Generator::new(writer, names, scopes, source_name).generate(program),
    }
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Target {
    #[default]
    riscv32,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::riscv32 => f.write_str("riscv32"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_is_riscv32() {
        assert_eq!(Target::default(), Target::riscv32);
        assert_eq!(Target::default().to_string(), "riscv32");
    }
}
