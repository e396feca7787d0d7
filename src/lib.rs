/// The abstract syntax tree, as produced by a front end through
/// [`ast::builder::Builder`].
pub mod ast;

/// The semantic analyzer checks scoping and typing rules, annotating every
/// expression with its type and archiving each scope's symbol table.
pub mod semantic;

/// The code generator maps an analyzed AST into RISC-V assembly.
pub mod codegen {
    pub mod interface;
    pub mod riscv;
    pub mod riscv_env;

    pub use interface::{generate, Target};
}

/// Ties the passes together behind a single entry point.
pub mod driver;

pub mod location;
pub mod symbols;
pub mod types;

pub mod util {
    pub mod fmt;
    pub mod intern;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
