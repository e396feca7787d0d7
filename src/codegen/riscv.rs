use std::{fmt, format_args as f, marker::PhantomData};

use tracing::debug;

use crate::{
    ast::{self, BinaryOperator, ConstVal, Expr, ExprKind, Stmt, UnaryOperator},
    codegen::riscv_env,
    symbols::{ScopeMap, SymbolEntry, SymbolKind, SymbolManager},
    types::{ScalarType, Type, SLOT_SIZE},
    util::intern::{Interner, Name},
};

/// Routines provided by the runtime library linked with every program.
mod runtime {
    pub const PRINT_INT: &str = "printInt";
    pub const PRINT_REAL: &str = "printReal";
    pub const PRINT_STRING: &str = "printString";
    pub const READ_INT: &str = "readInt";
    pub const READ_REAL: &str = "readReal";
    pub const READ_STRING: &str = "readString";
    pub const CONCAT_STRING: &str = "concatString";
}

const SLOT: i32 = SLOT_SIZE as i32;

/// Whether a compound statement opens its own scope.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Scope {
    Own,
    /// Function bodies share the scope of their parameters.
    Shared,
}

/// Where one argument travels to its callee.
#[derive(Copy, Clone)]
enum ArgSlot {
    Register(usize),
    Stack(usize),
}

/// Stack machine code generator. Every expression leaves its value in a
/// 4-byte slot on top of the stack.
pub struct Generator<'a, W, E> {
    writer: W,
    names: &'a Interner,
    source_name: &'a str,
    symbols: SymbolManager,
    scopes: ScopeMap,
    next_label: u32,
    indent: bool,
    _env: PhantomData<E>,
}

impl<'a, W, E> Generator<'a, W, E>
where
    W: fmt::Write,
    E: riscv_env::Env,
{
    pub fn new(
        writer: W,
        names: &'a Interner,
        scopes: ScopeMap,
        source_name: &'a str,
    ) -> Generator<'a, W, E> {
        Generator {
            writer,
            names,
            source_name,
            symbols: SymbolManager::default(),
            scopes,
            next_label: 0,
            indent: false,
            _env: PhantomData,
        }
    }

    pub fn generate(mut self, program: &ast::Program) {
        let source_name = self.source_name;
        self.out(f!(".file \"{source_name}\""));
        self.out(E::FILE_PROLOGUE);

        let table = self.scopes.take(program.id);
        self.symbols.push_scope(table);

        for decl in &program.declarations {
            for variable in &decl.variables {
                self.g_global(variable);
            }
        }
        for function in &program.functions {
            if let Some(body) = &function.body {
                self.g_function(function, body);
            }
        }
        self.g_main(program);

        self.symbols.pop_scope();
    }
}

/// Declarations and routines.
impl<W, E> Generator<'_, W, E>
where
    W: fmt::Write,
    E: riscv_env::Env,
{
    fn g_global(&mut self, variable: &ast::Variable) {
        let name = self.name(variable.name.name);
        let Some(value) = variable.constant() else {
            let size = variable.ty.byte_size().expect("object sizes are checked during analysis");
            self.out(f!(".comm {name}, {size}, 4"));
            return;
        };

        let storage = match value {
            ConstVal::Integer(int) => format!(".word {int}"),
            ConstVal::Boolean(b) => format!(".word {}", i32::from(*b)),
            ConstVal::Real(real) => format!(".float {}", float_literal(*real)),
            ConstVal::String(s) => {
                let pooled = ConstLabel(self.new_label());
                self.out(f!(".section {}", E::SECTION_READ_ONLY_DATA));
                self.out(".align 2");
                self.label(pooled);
                self.out(f!(".string {}", quoted(s)));
                format!(".word {pooled}")
            }
        };
        self.out(f!(".section {}", E::SECTION_READ_ONLY_DATA));
        self.out(".align 2");
        self.out(f!(".globl {name}"));
        self.out(f!(".type {name}, @object"));
        self.out(f!("{name}:"));
        self.out(storage);
    }

    fn g_routine_header(&mut self, name: &str) {
        self.out_line();
        self.out(f!(".section {}", E::SECTION_TEXT));
        self.out(".align 2");
        self.out(f!(".globl {name}"));
        self.out(f!(".type {name}, @function"));
        self.out(f!("{name}:"));
    }

    fn g_function(&mut self, function: &ast::Function, body: &ast::CompoundStatement) {
        let name = self.name(function.name.name);
        let frame = self.scopes.frame_size(function.id);
        debug!(function = name, frame, "generating function");

        self.g_routine_header(name);
        self.indented(|this| {
            this.g_prologue(frame);

            let table = this.scopes.take(function.id);
            this.symbols.push_scope(table);
            this.symbols.push_return_type(function.return_type);

            this.g_spill_parameters();
            this.g_compound(body, Scope::Shared);
            this.g_epilogue();

            this.symbols.pop_return_type();
            this.symbols.pop_scope();
            this.out(f!(".size {name}, .-{name}"));
        });
    }

    fn g_main(&mut self, program: &ast::Program) {
        let frame = self.scopes.frame_size(program.body.id);
        debug!(frame, "generating main");

        self.g_routine_header(E::ENTRY_POINT);
        self.indented(|this| {
            this.g_prologue(frame);
            this.symbols.push_return_type(ScalarType::Void);
            this.g_compound(&program.body, Scope::Own);
            this.symbols.pop_return_type();
            this.out("li a0, 0");
            this.g_epilogue();
            this.out(f!(".size {0}, .-{0}", E::ENTRY_POINT));
        });
    }

    fn g_prologue(&mut self, frame: u32) {
        match i32::try_from(frame) {
            Ok(frame) if frame <= 2047 => {
                self.out(f!("addi sp, sp, -{frame}"));
                self.out(f!("sw ra, {}(sp)", frame - 4));
                self.out(f!("sw s0, {}(sp)", frame - 8));
                self.out(f!("addi s0, sp, {frame}"));
            }
            _ => {
                self.out("mv t0, sp");
                self.out(f!("li t1, {frame}"));
                self.out("sub sp, sp, t1");
                self.out("sw ra, -4(t0)");
                self.out("sw s0, -8(t0)");
                self.out("mv s0, t0");
            }
        }
    }

    /// Restores the caller's registers from the frame pointer, so it is valid
    /// at any depth of the expression stack.
    fn g_epilogue(&mut self) {
        self.out("lw ra, -4(s0)");
        self.out("mv t0, s0");
        self.out("lw s0, -8(s0)");
        self.out("mv sp, t0");
        self.out("jr ra");
    }

    /// Copies incoming arguments into their local slots.
    fn g_spill_parameters(&mut self) {
        let parameters: Vec<(i32, bool)> = self
            .symbols
            .current()
            .entries()
            .iter()
            .filter(|entry| entry.kind == SymbolKind::Parameter)
            .map(|entry| (entry.offset, entry.ty.is(ScalarType::Real)))
            .collect();
        let slots = arg_slots::<E>(parameters.iter().map(|&(_, real)| real));

        for (&(offset, real), slot) in parameters.iter().zip(slots) {
            let dst = self.frame_slot(offset, "t3");
            match (slot, real) {
                (ArgSlot::Register(k), true) => self.out(f!("fsw fa{k}, {dst}")),
                (ArgSlot::Register(k), false) => self.out(f!("sw a{k}, {dst}")),
                (ArgSlot::Stack(k), true) => {
                    self.out(f!("flw ft0, {}(s0)", slot_offset(k)));
                    self.out(f!("fsw ft0, {dst}"));
                }
                (ArgSlot::Stack(k), false) => {
                    self.out(f!("lw t0, {}(s0)", slot_offset(k)));
                    self.out(f!("sw t0, {dst}"));
                }
            }
        }
    }
}

/// Statements.
impl<W, E> Generator<'_, W, E>
where
    W: fmt::Write,
    E: riscv_env::Env,
{
    fn g_compound(&mut self, compound: &ast::CompoundStatement, scope: Scope) {
        if scope == Scope::Own {
            let table = self.scopes.take(compound.id);
            self.symbols.push_scope(table);
        }

        for decl in &compound.declarations {
            for variable in &decl.variables {
                let Some(value) = variable.constant() else {
                    continue;
                };
                let offset = self.lookup(variable.name.name).offset;
                self.g_constant(value);
                let dst = self.frame_slot(offset, "t3");
                if value.scalar_type() == ScalarType::Real {
                    self.pop_float("ft0");
                    self.out(f!("fsw ft0, {dst}"));
                } else {
                    self.pop("t0");
                    self.out(f!("sw t0, {dst}"));
                }
            }
        }
        for stmt in &compound.statements {
            self.g_stmt(stmt);
        }

        if scope == Scope::Own {
            self.symbols.pop_scope();
        }
    }

    fn g_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Compound(compound) => self.g_compound(compound, Scope::Own),
            Stmt::Assignment(assignment) => self.g_assignment(assignment),
            Stmt::Print(print) => self.g_print(&print.value),
            Stmt::Read(read) => self.g_read(&read.target),
            Stmt::If(stmt) => self.g_if(stmt),
            Stmt::While(stmt) => self.g_while(stmt),
            Stmt::For(stmt) => self.g_for(stmt),
            Stmt::Return(stmt) => self.g_return(&stmt.value),
            Stmt::Invocation(call) => {
                self.g_expr(call);
                self.out(f!("addi sp, sp, {SLOT}"));
            }
        }
    }

    fn g_assignment(&mut self, assignment: &ast::Assignment) {
        let target = &assignment.target;
        self.g_address(reference(target));
        self.g_expr(&assignment.value);
        if target.ty.is(ScalarType::Real) {
            self.pop_as_float("ft0", &assignment.value.ty);
            self.pop("t0");
            self.out("fsw ft0, 0(t0)");
        } else {
            self.pop("t0");
            self.pop("t1");
            self.out("sw t0, 0(t1)");
        }
    }

    fn g_print(&mut self, value: &Expr) {
        self.g_expr(value);
        match value.ty.scalar() {
            ScalarType::Integer | ScalarType::Boolean => {
                self.pop("a0");
                self.call(runtime::PRINT_INT);
            }
            ScalarType::Real => {
                self.pop_float("fa0");
                self.call(runtime::PRINT_REAL);
            }
            ScalarType::String => {
                self.pop("a0");
                self.call(runtime::PRINT_STRING);
            }
            ty @ (ScalarType::Void | ScalarType::Unknown) => {
                unreachable!("print of {ty} value survived analysis")
            }
        }
    }

    fn g_read(&mut self, target: &Expr) {
        self.g_address(reference(target));
        match target.ty.scalar() {
            ScalarType::Integer | ScalarType::Boolean => {
                self.call(runtime::READ_INT);
                self.pop("t0");
                self.out("sw a0, 0(t0)");
            }
            ScalarType::Real => {
                self.call(runtime::READ_REAL);
                self.pop("t0");
                self.out("fsw fa0, 0(t0)");
            }
            ScalarType::String => {
                self.call(runtime::READ_STRING);
                self.pop("t0");
                self.out("sw a0, 0(t0)");
            }
            ty @ (ScalarType::Void | ScalarType::Unknown) => {
                unreachable!("read into {ty} target survived analysis")
            }
        }
    }

    fn g_if(&mut self, stmt: &ast::If) {
        self.g_expr(&stmt.condition);
        self.pop("t0");
        let skip = Label(self.new_label());
        self.out(f!("beqz t0, {skip}"));
        self.g_compound(&stmt.then_body, Scope::Own);
        match &stmt.else_body {
            Some(else_body) => {
                let end = Label(self.new_label());
                self.out(f!("j {end}"));
                self.label(skip);
                self.g_compound(else_body, Scope::Own);
                self.label(end);
            }
            None => self.label(skip),
        }
    }

    fn g_while(&mut self, stmt: &ast::While) {
        let (check, exit) = (Label(self.new_label()), Label(self.new_label()));
        self.label(check);
        self.g_expr(&stmt.condition);
        self.pop("t0");
        self.out(f!("beqz t0, {exit}"));
        self.g_compound(&stmt.body, Scope::Own);
        self.out(f!("j {check}"));
        self.label(exit);
    }

    fn g_for(&mut self, stmt: &ast::For) {
        let table = self.scopes.take(stmt.id);
        self.symbols.push_scope(table);

        self.g_assignment(&stmt.init);
        let counter = self.lookup(reference(&stmt.init.target).name.name).offset;

        let (check, exit) = (Label(self.new_label()), Label(self.new_label()));
        self.label(check);
        let slot = self.frame_slot(counter, "t3");
        self.out(f!("lw t0, {slot}"));
        self.out(f!("li t1, {}", stmt.bound_value()));
        self.out(f!("bge t0, t1, {exit}"));
        self.g_compound(&stmt.body, Scope::Own);
        let slot = self.frame_slot(counter, "t3");
        self.out(f!("lw t0, {slot}"));
        self.out("addi t0, t0, 1");
        self.out(f!("sw t0, {slot}"));
        self.out(f!("j {check}"));
        self.label(exit);

        self.symbols.pop_scope();
    }

    fn g_return(&mut self, value: &Expr) {
        self.g_expr(value);
        if self.symbols.return_type() == ScalarType::Real {
            self.pop_as_float("fa0", &value.ty);
        } else {
            self.pop("a0");
        }
        self.g_epilogue();
    }
}

/// Expressions.
impl<W, E> Generator<'_, W, E>
where
    W: fmt::Write,
    E: riscv_env::Env,
{
    fn g_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Constant(value) => self.g_constant(value),
            ExprKind::Reference(r) => self.g_reference(r, &expr.ty),
            ExprKind::Invocation(call) => self.g_invocation(call),
            ExprKind::Unary { op, operand } => self.g_unary(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.g_binary(*op, lhs, rhs),
        }
    }

    fn g_constant(&mut self, value: &ConstVal) {
        match value {
            ConstVal::Integer(int) => {
                self.out(f!("li t0, {int}"));
                self.push("t0");
            }
            ConstVal::Boolean(b) => {
                self.out(f!("li t0, {}", i32::from(*b)));
                self.push("t0");
            }
            ConstVal::Real(real) => {
                let pooled = self.g_inline_literal(f!(".float {}", float_literal(*real)));
                self.out(f!("lui t0, %hi({pooled})"));
                self.out(f!("flw ft0, %lo({pooled})(t0)"));
                self.push_float("ft0");
            }
            ConstVal::String(s) => {
                let pooled = self.g_inline_literal(f!(".string {}", quoted(s)));
                self.out(f!("lui t0, %hi({pooled})"));
                self.out(f!("addi t0, t0, %lo({pooled})"));
                self.push("t0");
            }
        }
    }

    /// Places a literal in read-only data without leaving the current routine.
    fn g_inline_literal(&mut self, directive: fmt::Arguments<'_>) -> ConstLabel {
        let n = self.new_label();
        let (skip, pooled) = (Label(n), ConstLabel(n));
        self.out(f!("j {skip}"));
        self.out(f!(".section {}", E::SECTION_READ_ONLY_DATA));
        self.out(".align 2");
        self.label(pooled);
        self.out(directive);
        self.out(f!(".section {}", E::SECTION_TEXT));
        self.label(skip);
        pooled
    }

    fn g_reference(&mut self, reference: &ast::VariableRef, ty: &Type) {
        if reference.indices.is_empty() && !ty.is_array() {
            let entry = self.lookup(reference.name.name).clone();
            let src = if entry.is_global() {
                let name = self.name(entry.name);
                self.out(f!("la t0, {name}"));
                "0(t0)".to_owned()
            } else {
                self.frame_slot(entry.offset, "t0")
            };
            self.g_load(ty, &src);
            return;
        }

        self.g_address(reference);
        if !ty.is_array() {
            self.pop("t0");
            self.g_load(ty, "0(t0)");
        }
    }

    fn g_load(&mut self, ty: &Type, src: &str) {
        if ty.is(ScalarType::Real) {
            self.out(f!("flw ft0, {src}"));
            self.push_float("ft0");
        } else {
            self.out(f!("lw t0, {src}"));
            self.push("t0");
        }
    }

    /// Pushes the address designated by a (possibly partially) indexed
    /// variable reference.
    fn g_address(&mut self, reference: &ast::VariableRef) {
        let entry = self.lookup(reference.name.name).clone();
        if entry.is_global() {
            let name = self.name(entry.name);
            self.out(f!("la t0, {name}"));
        } else if entry.kind == SymbolKind::Parameter && entry.ty.is_array() {
            let slot = self.frame_slot(entry.offset, "t0");
            self.out(f!("lw t0, {slot}"));
        } else if fits_immediate(entry.offset) {
            self.out(f!("addi t0, s0, {}", entry.offset));
        } else {
            self.out(f!("li t0, {}", entry.offset));
            self.out("add t0, s0, t0");
        }
        self.push("t0");

        for (k, index) in reference.indices.iter().enumerate() {
            self.g_expr(index);
            self.pop("t0");
            self.out(f!("li t1, {}", entry.ty.stride(k)));
            self.out("mul t0, t0, t1");
            self.pop("t1");
            self.out("add t0, t1, t0");
            self.push("t0");
        }
    }

    fn g_invocation(&mut self, call: &ast::Invocation) {
        for arg in &call.args {
            self.g_expr(arg);
        }

        let entry = self.lookup(call.name.name).clone();
        let parameters = entry.parameters();
        let slots = arg_slots::<E>(parameters.iter().map(|ty| ty.is(ScalarType::Real)));
        let on_stack = slots
            .iter()
            .filter(|slot| matches!(slot, ArgSlot::Stack(_)))
            .count();
        let n = call.args.len();

        self.out("mv t2, sp");
        if on_stack > 0 {
            self.out(f!("addi t3, sp, -{}", slot_offset(on_stack)));
        }
        let marshaled = call.args.iter().zip(parameters).zip(slots);
        for (i, ((arg, parameter), slot)) in marshaled.enumerate() {
            let src = slot_offset(n - 1 - i);
            if parameter.is(ScalarType::Real) {
                let reg = match slot {
                    ArgSlot::Register(k) => format!("fa{k}"),
                    ArgSlot::Stack(_) => "ft0".to_owned(),
                };
                if arg.ty.is(ScalarType::Integer) {
                    self.out(f!("lw t0, {src}(t2)"));
                    self.out(f!("fcvt.s.w {reg}, t0"));
                } else {
                    self.out(f!("flw {reg}, {src}(t2)"));
                }
                if let ArgSlot::Stack(k) = slot {
                    self.out(f!("fsw ft0, {}(t3)", slot_offset(k)));
                }
            } else {
                match slot {
                    ArgSlot::Register(k) => self.out(f!("lw a{k}, {src}(t2)")),
                    ArgSlot::Stack(k) => {
                        self.out(f!("lw t0, {src}(t2)"));
                        self.out(f!("sw t0, {}(t3)", slot_offset(k)));
                    }
                }
            }
        }
        if on_stack > 0 {
            self.out("mv sp, t3");
        }

        let callee = self.name(entry.name);
        self.call(callee);

        let release = slot_offset(n + on_stack);
        if release > 0 {
            self.out(f!("addi sp, sp, {release}"));
        }
        if entry.ty.is(ScalarType::Real) {
            self.push_float("fa0");
        } else {
            self.push("a0");
        }
    }

    fn g_unary(&mut self, op: UnaryOperator, operand: &Expr) {
        self.g_expr(operand);
        match op {
            UnaryOperator::Neg if operand.ty.is(ScalarType::Real) => {
                self.pop_float("ft0");
                self.out("fneg.s ft0, ft0");
                self.push_float("ft0");
            }
            UnaryOperator::Neg => {
                self.pop("t0");
                self.out("sub t0, zero, t0");
                self.push("t0");
            }
            UnaryOperator::Not => {
                self.pop("t0");
                self.out("xori t0, t0, 1");
                self.push("t0");
            }
        }
    }

    fn g_binary(&mut self, op: BinaryOperator, lhs: &Expr, rhs: &Expr) {
        use BinaryOperator::*;

        self.g_expr(lhs);
        self.g_expr(rhs);

        let (l, r) = (lhs.ty.scalar(), rhs.ty.scalar());
        if op == Add && l == ScalarType::String && r == ScalarType::String {
            self.pop("a1");
            self.pop("a0");
            self.call(runtime::CONCAT_STRING);
            self.push("a0");
            return;
        }

        if l == ScalarType::Real || r == ScalarType::Real {
            self.pop_as_float("ft1", &rhs.ty);
            self.pop_as_float("ft0", &lhs.ty);
            let arithmetic = match op {
                Add => Some("fadd.s"),
                Sub => Some("fsub.s"),
                Mul => Some("fmul.s"),
                Div => Some("fdiv.s"),
                _ => None,
            };
            if let Some(instruction) = arithmetic {
                self.out(f!("{instruction} ft0, ft0, ft1"));
                self.push_float("ft0");
                return;
            }
            match op {
                Lt => self.out("flt.s t0, ft0, ft1"),
                Le => self.out("fle.s t0, ft0, ft1"),
                Gt => self.out("flt.s t0, ft1, ft0"),
                Ge => self.out("fle.s t0, ft1, ft0"),
                Eq => self.out("feq.s t0, ft0, ft1"),
                Ne => {
                    self.out("feq.s t0, ft0, ft1");
                    self.out("xori t0, t0, 1");
                }
                _ => unreachable!("operator {op} on real operands survived analysis"),
            }
            self.push("t0");
            return;
        }

        self.pop("t1");
        self.pop("t0");
        match op {
            Add => self.out("add t0, t0, t1"),
            Sub => self.out("sub t0, t0, t1"),
            Mul => self.out("mul t0, t0, t1"),
            Div => self.out("div t0, t0, t1"),
            Mod => self.out("rem t0, t0, t1"),
            Lt => self.out("slt t0, t0, t1"),
            Gt => self.out("slt t0, t1, t0"),
            Le => {
                self.out("slt t0, t1, t0");
                self.out("xori t0, t0, 1");
            }
            Ge => {
                self.out("slt t0, t0, t1");
                self.out("xori t0, t0, 1");
            }
            Eq => {
                self.out("sub t0, t0, t1");
                self.out("seqz t0, t0");
            }
            Ne => {
                self.out("sub t0, t0, t1");
                self.out("snez t0, t0");
            }
            And => self.out("and t0, t0, t1"),
            Or => self.out("or t0, t0, t1"),
        }
        self.push("t0");
    }
}

/// Utility functions.
impl<'a, W, E> Generator<'a, W, E>
where
    W: fmt::Write,
    E: riscv_env::Env,
{
    /// Prints a line.
    fn out(&mut self, f: impl fmt::Display) {
        let indent = if self.indent { "    " } else { "" };
        writeln!(self.writer, "{indent}{f}").expect("Failed to write to sink");
    }

    /// Prints an empty line.
    fn out_line(&mut self) {
        writeln!(self.writer).expect("Failed to write to sink");
    }

    /// Labels are never indented.
    fn label(&mut self, label: impl fmt::Display) {
        writeln!(self.writer, "{label}:").expect("Failed to write to sink");
    }

    /// Writes in an indented block that is finished with an empty line.
    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.indent = true;
        let res = f(self);
        self.indent = false;
        self.out_line();
        res
    }

    fn push(&mut self, reg: &str) {
        self.out(f!("addi sp, sp, -{SLOT}"));
        self.out(f!("sw {reg}, 0(sp)"));
    }

    fn pop(&mut self, reg: &str) {
        self.out(f!("lw {reg}, 0(sp)"));
        self.out(f!("addi sp, sp, {SLOT}"));
    }

    fn push_float(&mut self, reg: &str) {
        self.out(f!("addi sp, sp, -{SLOT}"));
        self.out(f!("fsw {reg}, 0(sp)"));
    }

    fn pop_float(&mut self, reg: &str) {
        self.out(f!("flw {reg}, 0(sp)"));
        self.out(f!("addi sp, sp, {SLOT}"));
    }

    /// Pops a numeric value into a float register, converting integers.
    fn pop_as_float(&mut self, reg: &str, ty: &Type) {
        if ty.is(ScalarType::Integer) {
            self.pop("t0");
            self.out(f!("fcvt.s.w {reg}, t0"));
        } else {
            self.pop_float(reg);
        }
    }

    fn call(&mut self, routine: &str) {
        self.out(f!("jal ra, {routine}"));
    }

    /// Operand addressing the frame slot at `offset`. Offsets beyond the
    /// immediate range are materialized into `scratch`.
    fn frame_slot(&mut self, offset: i32, scratch: &str) -> String {
        if fits_immediate(offset) {
            format!("{offset}(s0)")
        } else {
            self.out(f!("li {scratch}, {offset}"));
            self.out(f!("add {scratch}, s0, {scratch}"));
            format!("0({scratch})")
        }
    }

    fn new_label(&mut self) -> u32 {
        let n = self.next_label;
        self.next_label += 1;
        n
    }

    fn lookup(&self, name: Name) -> &SymbolEntry {
        self.symbols
            .find(name)
            .unwrap_or_else(|| panic!("unresolved symbol {:?} survived analysis", self.name(name)))
    }

    fn name(&self, name: Name) -> &'a str {
        self.names.get(name)
    }
}

fn reference(expr: &Expr) -> &ast::VariableRef {
    expr.as_reference()
        .unwrap_or_else(|| unreachable!("assignment and read targets are variable references"))
}

/// Assigns each argument, in order, to the next free register of its class or
/// to the next outgoing stack slot.
fn arg_slots<E: riscv_env::Env>(reals: impl Iterator<Item = bool>) -> Vec<ArgSlot> {
    let (mut ints, mut floats, mut stack) = (0, 0, 0);
    reals
        .map(|real| {
            let used = if real { &mut floats } else { &mut ints };
            if *used < E::ARG_REGISTERS {
                *used += 1;
                ArgSlot::Register(*used - 1)
            } else {
                stack += 1;
                ArgSlot::Stack(stack - 1)
            }
        })
        .collect()
}

fn slot_offset(k: usize) -> usize {
    k * SLOT_SIZE as usize
}

fn fits_immediate(offset: i32) -> bool {
    (-2048..=2047).contains(&offset)
}

/// Shortest decimal text that reads back as the same value.
fn float_literal(value: f64) -> String {
    format!("{value:?}")
}

fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Copy, Clone)]
struct Label(u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".L{}", self.0)
    }
}

/// Label of a pooled read-only literal.
#[derive(Copy, Clone)]
struct ConstLabel(u32);

impl fmt::Display for ConstLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".LC{}", self.0)
    }
}
