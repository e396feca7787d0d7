// program ::= ID ';' decl* function* compound end
// decl ::= var ID (',' ID)* ':' type ';'
//        | var ID (',' ID)* ':' ['-'] literal ';'
// type ::= (array INT of)* scalar
// function ::= ID '(' [ID ':' type (';' ID ':' type)*] ')' [':' scalar] (compound end | ';')
// compound ::= begin decl* stmt* end
// stmt ::= compound
//        | var_ref ':=' expr ';'
//        | print expr ';'
//        | read var_ref ';'
//        | if expr then compound [else compound] end if
//        | while expr do compound end do
//        | for ID ':=' INT to INT do compound end do
//        | return expr ';'
//        | ID '(' [expr (',' expr)*] ')' ';'
// expr ::= expr binop expr
//        | ('-' | not) expr
//        | literal
//        | var_ref
//        | ID '(' [expr (',' expr)*] ')'
// var_ref ::= ID ('[' expr ']')*

// Precedence
//
// - (unary)
// * / mod
// + -
// < <= <> >= > =
// not
// and
// or

use std::fmt;

use crate::{
    location::Location,
    types::{ScalarType, Type},
    util::intern::Name,
};

pub mod builder;

/// Unique identity of a node within one program. Assigned by the
/// [`builder::Builder`] at construction time.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, PartialEq)]
pub struct Program {
    pub id: NodeId,
    pub location: Location,
    pub name: Ident,
    pub declarations: Vec<Decl>,
    pub functions: Vec<Function>,
    pub body: CompoundStatement,
}

/// One `var` line, which may introduce several variables of the same type.
#[derive(Debug, PartialEq)]
pub struct Decl {
    pub id: NodeId,
    pub location: Location,
    pub variables: Vec<Variable>,
}

#[derive(Debug, PartialEq)]
pub struct Variable {
    pub id: NodeId,
    pub name: Ident,
    pub ty: Type,
    /// Present for constants. Always an [`ExprKind::Constant`].
    pub initializer: Option<Expr>,
}

impl Variable {
    pub fn location(&self) -> Location {
        self.name.location
    }

    pub fn constant(&self) -> Option<&ConstVal> {
        match &self.initializer.as_ref()?.kind {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Function {
    pub id: NodeId,
    pub location: Location,
    pub name: Ident,
    /// Each declaration groups parameters sharing a type.
    pub parameters: Vec<Decl>,
    pub return_type: ScalarType,
    /// Absent for declarations without a definition.
    pub body: Option<CompoundStatement>,
}

impl Function {
    pub fn parameter_types(&self) -> Vec<Type> {
        self.parameters
            .iter()
            .flat_map(|decl| &decl.variables)
            .map(|var| var.ty.clone())
            .collect()
    }
}

#[derive(Debug, PartialEq)]
pub struct CompoundStatement {
    pub id: NodeId,
    pub location: Location,
    pub declarations: Vec<Decl>,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub enum Stmt {
    Compound(CompoundStatement),
    Assignment(Assignment),
    Print(Print),
    Read(Read),
    If(If),
    While(While),
    For(Box<For>),
    Return(Return),
    /// A function call whose result is discarded.
    Invocation(Expr),
}

impl Stmt {
    pub fn as_node(&self) -> NodeRef<'_> {
        match self {
            Stmt::Compound(s) => NodeRef::Compound(s),
            Stmt::Assignment(s) => NodeRef::Assignment(s),
            Stmt::Print(s) => NodeRef::Print(s),
            Stmt::Read(s) => NodeRef::Read(s),
            Stmt::If(s) => NodeRef::If(s),
            Stmt::While(s) => NodeRef::While(s),
            Stmt::For(s) => NodeRef::For(s),
            Stmt::Return(s) => NodeRef::Return(s),
            Stmt::Invocation(e) => NodeRef::Expr(e),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Assignment {
    pub id: NodeId,
    pub location: Location,
    /// Always an [`ExprKind::Reference`].
    pub target: Expr,
    pub value: Expr,
}

#[derive(Debug, PartialEq)]
pub struct Print {
    pub id: NodeId,
    pub location: Location,
    pub value: Expr,
}

#[derive(Debug, PartialEq)]
pub struct Read {
    pub id: NodeId,
    pub location: Location,
    /// Always an [`ExprKind::Reference`].
    pub target: Expr,
}

#[derive(Debug, PartialEq)]
pub struct If {
    pub id: NodeId,
    pub location: Location,
    pub condition: Expr,
    pub then_body: CompoundStatement,
    pub else_body: Option<CompoundStatement>,
}

#[derive(Debug, PartialEq)]
pub struct While {
    pub id: NodeId,
    pub location: Location,
    pub condition: Expr,
    pub body: CompoundStatement,
}

/// `for i := init to bound do ... end do`. Iterates while the loop variable
/// is strictly below `bound`.
#[derive(Debug, PartialEq)]
pub struct For {
    pub id: NodeId,
    pub location: Location,
    pub loop_var: Decl,
    pub init: Assignment,
    /// Always an integer [`ExprKind::Constant`].
    pub bound: Expr,
    pub body: CompoundStatement,
}

impl For {
    pub fn init_value(&self) -> i32 {
        match self.init.value.kind {
            ExprKind::Constant(ConstVal::Integer(value)) => value,
            _ => unreachable!("loop bounds are integer literals"),
        }
    }

    pub fn bound_value(&self) -> i32 {
        match self.bound.kind {
            ExprKind::Constant(ConstVal::Integer(value)) => value,
            _ => unreachable!("loop bounds are integer literals"),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Return {
    pub id: NodeId,
    pub location: Location,
    pub value: Expr,
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub location: Location,
    pub kind: ExprKind,
    /// Filled in by semantic analysis. Starts as [`Type::UNKNOWN`].
    pub ty: Type,
}

impl Expr {
    pub fn as_reference(&self) -> Option<&VariableRef> {
        match &self.kind {
            ExprKind::Reference(reference) => Some(reference),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Constant(ConstVal),
    Reference(VariableRef),
    Invocation(Invocation),
}

#[derive(Debug, PartialEq)]
pub struct VariableRef {
    pub name: Ident,
    pub indices: Vec<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub name: Ident,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConstVal {
    Integer(i32),
    Real(f64),
    String(Box<str>),
    Boolean(bool),
}

impl ConstVal {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ConstVal::Integer(_) => ScalarType::Integer,
            ConstVal::Real(_) => ScalarType::Real,
            ConstVal::String(_) => ScalarType::String,
            ConstVal::Boolean(_) => ScalarType::Boolean,
        }
    }

    /// Folds a leading minus sign into a numeric literal.
    pub fn negated(self) -> Option<ConstVal> {
        match self {
            ConstVal::Integer(value) => Some(ConstVal::Integer(value.wrapping_neg())),
            ConstVal::Real(value) => Some(ConstVal::Real(-value)),
            ConstVal::String(_) | ConstVal::Boolean(_) => None,
        }
    }
}

impl fmt::Display for ConstVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstVal::Integer(value) => write!(f, "{value}"),
            ConstVal::Real(value) => write!(f, "{value:.6}"),
            ConstVal::String(value) => f.write_str(value),
            ConstVal::Boolean(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Ne,
    Ge,
    Gt,
    Eq,
    And,
    Or,
}

static BINARY_OPERATORS: phf::Map<&'static str, BinaryOperator> = phf::phf_map! {
    "+" => BinaryOperator::Add,
    "-" => BinaryOperator::Sub,
    "*" => BinaryOperator::Mul,
    "/" => BinaryOperator::Div,
    "mod" => BinaryOperator::Mod,
    "<" => BinaryOperator::Lt,
    "<=" => BinaryOperator::Le,
    "<>" => BinaryOperator::Ne,
    ">=" => BinaryOperator::Ge,
    ">" => BinaryOperator::Gt,
    "=" => BinaryOperator::Eq,
    "and" => BinaryOperator::And,
    "or" => BinaryOperator::Or,
};

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<BinaryOperator> {
        BINARY_OPERATORS.get(symbol).copied()
    }

    pub const fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "mod",
            Lt => "<",
            Le => "<=",
            Ne => "<>",
            Ge => ">=",
            Gt => ">",
            Eq => "=",
            And => "and",
            Or => "or",
        }
    }

    pub const fn is_relational(self) -> bool {
        use BinaryOperator::*;
        matches!(self, Lt | Le | Ne | Ge | Gt | Eq)
    }

    /// Result type of applying this operator, or [`Type::UNKNOWN`] if the
    /// operands are not valid for it.
    pub fn result_type(self, lhs: &Type, rhs: &Type) -> Type {
        use BinaryOperator::*;
        use ScalarType as S;
        if lhs.is_array() || rhs.is_array() {
            return Type::UNKNOWN;
        }
        let numeric = |t: S| matches!(t, S::Integer | S::Real);
        let (l, r) = (lhs.scalar(), rhs.scalar());
        match self {
            Add if l == S::String && r == S::String => Type::STRING,
            Add | Sub | Mul | Div if numeric(l) && numeric(r) => {
                if l == S::Real || r == S::Real {
                    Type::REAL
                } else {
                    Type::INTEGER
                }
            }
            Mod if l == S::Integer && r == S::Integer => Type::INTEGER,
            Lt | Le | Ne | Ge | Gt | Eq if numeric(l) && numeric(r) => Type::BOOLEAN,
            And | Or if l == S::Boolean && r == S::Boolean => Type::BOOLEAN,
            _ => Type::UNKNOWN,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Not,
}

static UNARY_OPERATORS: phf::Map<&'static str, UnaryOperator> = phf::phf_map! {
    "neg" => UnaryOperator::Neg,
    "-" => UnaryOperator::Neg,
    "not" => UnaryOperator::Not,
};

impl UnaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<UnaryOperator> {
        UNARY_OPERATORS.get(symbol).copied()
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Neg => "neg",
            UnaryOperator::Not => "not",
        }
    }

    pub fn result_type(self, operand: &Type) -> Type {
        match self {
            _ if operand.is_array() => Type::UNKNOWN,
            UnaryOperator::Neg
                if matches!(operand.scalar(), ScalarType::Integer | ScalarType::Real) =>
            {
                operand.clone()
            }
            UnaryOperator::Not if operand.is(ScalarType::Boolean) => Type::BOOLEAN,
            _ => Type::UNKNOWN,
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: Name,
    pub location: Location,
}

/// Borrowed view over any node, used to walk the tree generically.
#[derive(Copy, Clone, Debug)]
pub enum NodeRef<'a> {
    Program(&'a Program),
    Decl(&'a Decl),
    Variable(&'a Variable),
    Function(&'a Function),
    Compound(&'a CompoundStatement),
    Assignment(&'a Assignment),
    Print(&'a Print),
    Read(&'a Read),
    If(&'a If),
    While(&'a While),
    For(&'a For),
    Return(&'a Return),
    Expr(&'a Expr),
}

impl<'a> NodeRef<'a> {
    pub fn id(self) -> NodeId {
        match self {
            NodeRef::Program(n) => n.id,
            NodeRef::Decl(n) => n.id,
            NodeRef::Variable(n) => n.id,
            NodeRef::Function(n) => n.id,
            NodeRef::Compound(n) => n.id,
            NodeRef::Assignment(n) => n.id,
            NodeRef::Print(n) => n.id,
            NodeRef::Read(n) => n.id,
            NodeRef::If(n) => n.id,
            NodeRef::While(n) => n.id,
            NodeRef::For(n) => n.id,
            NodeRef::Return(n) => n.id,
            NodeRef::Expr(n) => n.id,
        }
    }

    pub fn location(self) -> Location {
        match self {
            NodeRef::Program(n) => n.location,
            NodeRef::Decl(n) => n.location,
            NodeRef::Variable(n) => n.location(),
            NodeRef::Function(n) => n.location,
            NodeRef::Compound(n) => n.location,
            NodeRef::Assignment(n) => n.location,
            NodeRef::Print(n) => n.location,
            NodeRef::Read(n) => n.location,
            NodeRef::If(n) => n.location,
            NodeRef::While(n) => n.location,
            NodeRef::For(n) => n.location,
            NodeRef::Return(n) => n.location,
            NodeRef::Expr(n) => n.location,
        }
    }

    /// Direct children, in the order the passes visit them.
    pub fn children(self) -> Vec<NodeRef<'a>> {
        fn compound<'a>(out: &mut Vec<NodeRef<'a>>, c: &'a CompoundStatement) {
            out.push(NodeRef::Compound(c));
        }
        let mut out = Vec::new();
        match self {
            NodeRef::Program(p) => {
                out.extend(p.declarations.iter().map(NodeRef::Decl));
                out.extend(p.functions.iter().map(NodeRef::Function));
                compound(&mut out, &p.body);
            }
            NodeRef::Decl(d) => out.extend(d.variables.iter().map(NodeRef::Variable)),
            NodeRef::Variable(v) => out.extend(v.initializer.iter().map(NodeRef::Expr)),
            NodeRef::Function(f) => {
                out.extend(f.parameters.iter().map(NodeRef::Decl));
                if let Some(body) = &f.body {
                    compound(&mut out, body);
                }
            }
            NodeRef::Compound(c) => {
                out.extend(c.declarations.iter().map(NodeRef::Decl));
                out.extend(c.statements.iter().map(Stmt::as_node));
            }
            NodeRef::Assignment(a) => {
                out.push(NodeRef::Expr(&a.target));
                out.push(NodeRef::Expr(&a.value));
            }
            NodeRef::Print(p) => out.push(NodeRef::Expr(&p.value)),
            NodeRef::Read(r) => out.push(NodeRef::Expr(&r.target)),
            NodeRef::If(i) => {
                out.push(NodeRef::Expr(&i.condition));
                compound(&mut out, &i.then_body);
                if let Some(else_body) = &i.else_body {
                    compound(&mut out, else_body);
                }
            }
            NodeRef::While(w) => {
                out.push(NodeRef::Expr(&w.condition));
                compound(&mut out, &w.body);
            }
            NodeRef::For(f) => {
                out.push(NodeRef::Decl(&f.loop_var));
                out.push(NodeRef::Assignment(&f.init));
                out.push(NodeRef::Expr(&f.bound));
                compound(&mut out, &f.body);
            }
            NodeRef::Return(r) => out.push(NodeRef::Expr(&r.value)),
            NodeRef::Expr(e) => match &e.kind {
                ExprKind::Binary { lhs, rhs, .. } => {
                    out.push(NodeRef::Expr(lhs));
                    out.push(NodeRef::Expr(rhs));
                }
                ExprKind::Unary { operand, .. } => out.push(NodeRef::Expr(operand)),
                ExprKind::Constant(_) => {}
                ExprKind::Reference(r) => out.extend(r.indices.iter().map(NodeRef::Expr)),
                ExprKind::Invocation(i) => out.extend(i.args.iter().map(NodeRef::Expr)),
            },
        }
        out
    }
}

/// Pre-order traversal starting at (and including) `node`.
pub fn walk<'a>(node: NodeRef<'a>, f: &mut impl FnMut(NodeRef<'a>)) {
    f(node);
    for child in node.children() {
        walk(child, f);
    }
}
