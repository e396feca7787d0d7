use std::fmt::Write as _;

use tracing::{debug, trace};

use crate::{
    ast::*,
    location::{Located, Location},
    symbols::{Attribute, ScopeMap, SymbolKind, SymbolManager, SymbolTable},
    types::{ScalarType, Type},
    util::{
        fmt::{Context, Show},
        intern::{Interner, Name},
    },
};

pub type CheckResult = Result<ScopeMap, Vec<Located<Error>>>;

/// Which construct a compound statement belongs to.
#[derive(Copy, Clone, PartialEq, Eq)]
enum BodyKind {
    /// The main program body. Opens the main activation record.
    Main,
    /// A function body, which shares the scope opened for its parameters.
    Function,
    /// Any other nested block.
    Block,
}

/// How a declared name is classified.
#[derive(Copy, Clone, PartialEq, Eq)]
enum DeclRole {
    Ordinary,
    Parameter,
    LoopVar,
}

pub struct Checker<'n, 'w> {
    names: &'n Interner,
    symbols: SymbolManager,
    scopes: ScopeMap,
    errors: Vec<Located<Error>>,
    table_dump: Option<&'w mut dyn std::fmt::Write>,
}

impl<'n, 'w> Checker<'n, 'w> {
    pub fn new(names: &'n Interner) -> Checker<'n, 'w> {
        Checker {
            names,
            symbols: SymbolManager::default(),
            scopes: ScopeMap::default(),
            errors: Vec::with_capacity(8),
            table_dump: None,
        }
    }

    /// Writes every symbol table to `out` as its scope closes.
    #[must_use]
    pub fn with_table_dump(mut self, out: &'w mut dyn std::fmt::Write) -> Checker<'n, 'w> {
        self.table_dump = Some(out);
        self
    }

    /// Annotates every expression of the program with its type, collecting
    /// all diagnostics in source traversal order.
    ///
    /// On success, returns the symbol table of every scope keyed by the node
    /// that opened it.
    pub fn check(mut self, program: &mut Program) -> CheckResult {
        self.program(program);
        if self.errors.is_empty() {
            Ok(self.scopes)
        } else {
            debug!(count = self.errors.len(), "semantic analysis failed");
            Err(self.errors)
        }
    }

    fn error(&mut self, location: Location, error: Error) {
        trace!(%location, ?error, "diagnostic");
        self.errors.push(location.wrap(error));
    }

    fn close_scope(&mut self, id: NodeId) {
        let table = self.symbols.pop_scope();
        if let Some(out) = self.table_dump.as_deref_mut() {
            let ctx = Context { names: self.names };
            write!(out, "{}", table.display(&ctx)).expect("table dump sink failed");
        }
        self.scopes.archive(id, table);
    }

    fn program(&mut self, program: &mut Program) {
        self.symbols.push_scope(SymbolTable::default());
        let name = program.name.name;
        if self.symbols.is_redeclared(name) {
            self.error(program.name.location, Error::SymbolRedeclaration(name));
        } else {
            self.symbols
                .push_entry(name, SymbolKind::Program, Type::VOID, Attribute::None)
                .expect("scalar symbols always fit");
        }
        self.symbols.push_return_type(ScalarType::Void);

        for decl in &mut program.declarations {
            self.decl(decl, DeclRole::Ordinary);
        }
        for function in &mut program.functions {
            self.function(function);
        }
        self.compound(&mut program.body, BodyKind::Main);

        self.symbols.pop_return_type();
        self.close_scope(program.id);
    }

    fn function(&mut self, function: &mut Function) {
        let name = function.name.name;
        if self.symbols.is_redeclared(name) {
            self.error(function.name.location, Error::SymbolRedeclaration(name));
        } else {
            let parameters = function.parameter_types();
            self.symbols.push_entry(
                name,
                SymbolKind::Function,
                function.return_type.into(),
                Attribute::Parameters(parameters),
            )
            .expect("scalar symbols always fit");
        }

        self.symbols.push_scope(SymbolTable::default());
        self.symbols.push_return_type(function.return_type);
        self.symbols.enter_frame();

        for decl in &mut function.parameters {
            self.decl(decl, DeclRole::Parameter);
        }
        if let Some(body) = &mut function.body {
            self.compound(body, BodyKind::Function);
        }

        let frame = self.symbols.exit_frame();
        self.scopes.record_frame(function.id, frame);
        self.symbols.pop_return_type();
        self.close_scope(function.id);
    }

    fn compound(&mut self, compound: &mut CompoundStatement, kind: BodyKind) {
        if kind == BodyKind::Main {
            self.symbols.enter_frame();
        }
        if kind != BodyKind::Function {
            self.symbols.push_scope(SymbolTable::default());
        }

        for decl in &mut compound.declarations {
            self.decl(decl, DeclRole::Ordinary);
        }
        for stmt in &mut compound.statements {
            self.stmt(stmt);
        }

        if kind != BodyKind::Function {
            self.close_scope(compound.id);
        }
        if kind == BodyKind::Main {
            let frame = self.symbols.exit_frame();
            self.scopes.record_frame(compound.id, frame);
        }
    }

    fn decl(&mut self, decl: &mut Decl, role: DeclRole) {
        for variable in &mut decl.variables {
            self.variable(variable, role);
        }
    }

    fn variable(&mut self, variable: &mut Variable, role: DeclRole) {
        let name = variable.name.name;
        let redeclared = self.symbols.is_redeclared(name);
        let mut oversized = false;
        if redeclared {
            self.error(variable.location(), Error::SymbolRedeclaration(name));
        } else {
            let (kind, attribute) = match (role, variable.constant()) {
                (DeclRole::LoopVar, _) => (SymbolKind::LoopVar, Attribute::None),
                (DeclRole::Parameter, _) => (SymbolKind::Parameter, Attribute::None),
                (DeclRole::Ordinary, Some(value)) => {
                    (SymbolKind::Constant, Attribute::Constant(value.clone()))
                }
                (DeclRole::Ordinary, None) => (SymbolKind::Variable, Attribute::None),
            };
            oversized = self
                .symbols
                .push_entry(name, kind, variable.ty.clone(), attribute)
                .is_err();
        }

        if let Some(initializer) = &mut variable.initializer {
            self.expr(initializer);
        }

        if !redeclared && variable.ty.dims().iter().any(|&dim| dim == 0) {
            self.error(variable.location(), Error::NonPositiveArrayDimension(name));
            self.symbols.set_current_entry_decl_err();
        } else if oversized {
            self.error(variable.location(), Error::StorageOverflow(name));
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Compound(compound) => self.compound(compound, BodyKind::Block),
            Stmt::Assignment(assignment) => self.assignment(assignment, false),
            Stmt::Print(print) => {
                self.expr(&mut print.value);
                let ty = &print.value.ty;
                if !ty.is_unknown() && (ty.is_array() || ty.is(ScalarType::Void)) {
                    self.error(print.value.location, Error::PrintOutNonScalarType);
                }
            }
            Stmt::Read(read) => self.read(read),
            Stmt::If(stmt) => {
                self.condition(&mut stmt.condition);
                self.compound(&mut stmt.then_body, BodyKind::Block);
                if let Some(else_body) = &mut stmt.else_body {
                    self.compound(else_body, BodyKind::Block);
                }
            }
            Stmt::While(stmt) => {
                self.condition(&mut stmt.condition);
                self.compound(&mut stmt.body, BodyKind::Block);
            }
            Stmt::For(stmt) => self.for_loop(stmt),
            Stmt::Return(stmt) => self.return_stmt(stmt),
            Stmt::Invocation(call) => self.expr(call),
        }
    }

    fn condition(&mut self, condition: &mut Expr) {
        self.expr(condition);
        if !condition.ty.is_unknown() && !condition.ty.is(ScalarType::Boolean) {
            self.error(condition.location, Error::NonBooleanCondition);
        }
    }

    /// Only the initial assignment of a `for` loop may write its loop variable.
    fn assignment(&mut self, assignment: &mut Assignment, in_loop_init: bool) {
        self.expr(&mut assignment.target);
        self.expr(&mut assignment.value);

        let target = &assignment.target;
        if target.ty.is_unknown() {
            return;
        }
        let name = reference_name(target);
        let kind = self.symbols.find(name).map(|entry| entry.kind);

        if target.ty.is_array() {
            self.error(target.location, Error::AssignToArrayType);
        } else if kind == Some(SymbolKind::Constant) {
            self.error(target.location, Error::AssignToConstant(name));
        } else if kind == Some(SymbolKind::LoopVar) && !in_loop_init {
            self.error(target.location, Error::AssignToLoopVar);
        } else {
            let value = &assignment.value;
            if value.ty.is_unknown() {
                return;
            }
            if value.ty.is_array() {
                self.error(value.location, Error::AssignByArrayType);
            } else if !target.ty.accepts(&value.ty) {
                let error = Error::IncompatibleAssignment {
                    target: target.ty.clone(),
                    value: value.ty.clone(),
                };
                self.error(assignment.location, error);
            }
        }
    }

    fn read(&mut self, read: &mut Read) {
        self.expr(&mut read.target);
        let target = &read.target;
        if target.ty.is_unknown() {
            return;
        }
        if target.ty.is_array() {
            self.error(target.location, Error::ReadToNonScalarType);
        }
        let name = reference_name(target);
        let kind = self.symbols.find(name).map(|entry| entry.kind);
        if matches!(kind, Some(SymbolKind::Constant | SymbolKind::LoopVar)) {
            self.error(target.location, Error::ReadToConstantOrLoopVar);
        }
    }

    fn for_loop(&mut self, stmt: &mut For) {
        self.symbols.push_scope(SymbolTable::default());

        self.decl(&mut stmt.loop_var, DeclRole::LoopVar);
        self.assignment(&mut stmt.init, true);
        self.expr(&mut stmt.bound);
        self.compound(&mut stmt.body, BodyKind::Block);

        if stmt.init_value() >= stmt.bound_value() {
            self.error(stmt.location, Error::NonIncrementalLoopVariable);
        }
        self.close_scope(stmt.id);
    }

    fn return_stmt(&mut self, stmt: &mut Return) {
        self.expr(&mut stmt.value);
        let expected = Type::from(self.symbols.return_type());
        let value = &stmt.value;
        if expected.is(ScalarType::Void) {
            self.error(stmt.location, Error::ReturnFromVoid);
        } else if !value.ty.is_unknown() && !expected.accepts(&value.ty) {
            let error = Error::IncompatibleReturnType {
                expected,
                actual: value.ty.clone(),
            };
            self.error(value.location, error);
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        let location = expr.location;
        let ty = match &mut expr.kind {
            ExprKind::Constant(value) => Type::scalar_of(value.scalar_type()),
            ExprKind::Binary { op, lhs, rhs } => {
                self.expr(lhs);
                self.expr(rhs);
                let ty = op.result_type(&lhs.ty, &rhs.ty);
                if ty.is_unknown() && !lhs.ty.is_unknown() && !rhs.ty.is_unknown() {
                    let error = Error::InvalidBinaryOperand {
                        op: *op,
                        lhs: lhs.ty.clone(),
                        rhs: rhs.ty.clone(),
                    };
                    self.error(location, error);
                }
                ty
            }
            ExprKind::Unary { op, operand } => {
                self.expr(operand);
                let ty = op.result_type(&operand.ty);
                if ty.is_unknown() && !operand.ty.is_unknown() {
                    let error = Error::InvalidUnaryOperand {
                        op: *op,
                        operand: operand.ty.clone(),
                    };
                    self.error(location, error);
                }
                ty
            }
            ExprKind::Reference(reference) => self.reference(reference, location),
            ExprKind::Invocation(invocation) => self.invocation(invocation, location),
        };
        expr.ty = ty;
    }

    fn reference(&mut self, reference: &mut VariableRef, location: Location) -> Type {
        for index in &mut reference.indices {
            self.expr(index);
        }

        let name = reference.name.name;
        let Some(entry) = self.symbols.find(name) else {
            self.error(location, Error::UndeclaredSymbol(name));
            return Type::UNKNOWN;
        };
        if matches!(entry.kind, SymbolKind::Program | SymbolKind::Function) {
            self.error(location, Error::NonVariableSymbol(name));
            return Type::UNKNOWN;
        }
        if entry.decl_err {
            return Type::UNKNOWN;
        }
        let declared = entry.ty.clone();

        for index in &reference.indices {
            if index.ty.is_unknown() {
                return Type::UNKNOWN;
            }
            if !index.ty.is(ScalarType::Integer) {
                self.error(index.location, Error::NonIntegerArrayIndex);
                return Type::UNKNOWN;
            }
        }
        if reference.indices.len() > declared.dims().len() {
            self.error(location, Error::OverArraySubscript(name));
            return Type::UNKNOWN;
        }
        declared.strip_dims(reference.indices.len())
    }

    fn invocation(&mut self, invocation: &mut Invocation, location: Location) -> Type {
        for arg in &mut invocation.args {
            self.expr(arg);
        }

        let name = invocation.name.name;
        let Some(entry) = self.symbols.find(name) else {
            self.error(location, Error::UndeclaredSymbol(name));
            return Type::UNKNOWN;
        };
        if entry.kind != SymbolKind::Function {
            self.error(location, Error::NonFunctionSymbol(name));
            return Type::UNKNOWN;
        }
        let (parameters, return_type) = (entry.parameters().to_vec(), entry.ty.clone());
        if parameters.len() != invocation.args.len() {
            self.error(location, Error::ArgumentNumberMismatch(name));
            return Type::UNKNOWN;
        }

        let mut failed = false;
        for (parameter, arg) in parameters.into_iter().zip(&invocation.args) {
            if arg.ty.is_unknown() {
                failed = true;
            } else if !parameter.accepts(&arg.ty) {
                let error = Error::IncompatibleArgumentType {
                    parameter,
                    argument: arg.ty.clone(),
                };
                self.error(arg.location, error);
                failed = true;
            }
        }
        if failed {
            Type::UNKNOWN
        } else {
            return_type
        }
    }
}

fn reference_name(expr: &Expr) -> Name {
    match expr.as_reference() {
        Some(reference) => reference.name.name,
        None => unreachable!("assignment and read targets are variable references"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    SymbolRedeclaration(Name),
    UndeclaredSymbol(Name),
    NonVariableSymbol(Name),
    NonFunctionSymbol(Name),
    ArgumentNumberMismatch(Name),
    IncompatibleArgumentType { parameter: Type, argument: Type },
    NonIntegerArrayIndex,
    OverArraySubscript(Name),
    InvalidBinaryOperand { op: BinaryOperator, lhs: Type, rhs: Type },
    InvalidUnaryOperand { op: UnaryOperator, operand: Type },
    AssignToArrayType,
    AssignByArrayType,
    AssignToConstant(Name),
    AssignToLoopVar,
    IncompatibleAssignment { target: Type, value: Type },
    PrintOutNonScalarType,
    ReadToNonScalarType,
    ReadToConstantOrLoopVar,
    NonBooleanCondition,
    NonIncrementalLoopVariable,
    ReturnFromVoid,
    IncompatibleReturnType { expected: Type, actual: Type },
    NonPositiveArrayDimension(Name),
    StorageOverflow(Name),
}
