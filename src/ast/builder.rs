//! Construction of well-formed trees. Every node built here receives a fresh
//! [`NodeId`], and every expression starts with an unknown type.

use crate::{
    ast::*,
    location::Location,
    types::{ScalarType, Type},
    util::intern::Interner,
};

pub struct Builder<'i> {
    names: &'i mut Interner,
    next_id: u32,
}

impl<'i> Builder<'i> {
    pub fn new(names: &'i mut Interner) -> Builder<'i> {
        Builder { names, next_id: 0 }
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn ident(&mut self, name: &str, location: Location) -> Ident {
        Ident {
            name: self.names.intern(name),
            location,
        }
    }

    pub fn program(
        &mut self,
        name: &str,
        location: Location,
        declarations: Vec<Decl>,
        functions: Vec<Function>,
        body: CompoundStatement,
    ) -> Program {
        Program {
            id: self.id(),
            location,
            name: self.ident(name, location),
            declarations,
            functions,
            body,
        }
    }

    /// `var a, b: ty;`
    pub fn decl(&mut self, location: Location, names: &[(&str, Location)], ty: &Type) -> Decl {
        let variables = names
            .iter()
            .map(|&(name, name_location)| Variable {
                id: self.id(),
                name: self.ident(name, name_location),
                ty: ty.clone(),
                initializer: None,
            })
            .collect();
        Decl {
            id: self.id(),
            location,
            variables,
        }
    }

    /// `var a, b: literal;`
    ///
    /// Every name gets its own copy of the literal node.
    pub fn const_decl(
        &mut self,
        location: Location,
        names: &[(&str, Location)],
        value: &ConstVal,
        value_location: Location,
    ) -> Decl {
        let ty = Type::scalar_of(value.scalar_type());
        let variables = names
            .iter()
            .map(|&(name, name_location)| Variable {
                id: self.id(),
                name: self.ident(name, name_location),
                ty: ty.clone(),
                initializer: Some(self.constant(value_location, value.clone())),
            })
            .collect();
        Decl {
            id: self.id(),
            location,
            variables,
        }
    }

    /// `var a: -literal;` where `minus_location` points at the sign.
    ///
    /// Panics if the literal is not numeric.
    pub fn negative_const_decl(
        &mut self,
        location: Location,
        names: &[(&str, Location)],
        value: ConstVal,
        value_location: Location,
    ) -> Decl {
        let value = value.negated().expect("only numeric literals can be negated");
        self.const_decl(location, names, &value, value_location.shifted_left())
    }

    pub fn function(
        &mut self,
        name: &str,
        location: Location,
        parameters: Vec<Decl>,
        return_type: ScalarType,
        body: Option<CompoundStatement>,
    ) -> Function {
        Function {
            id: self.id(),
            location,
            name: self.ident(name, location),
            parameters,
            return_type,
            body,
        }
    }

    pub fn compound(
        &mut self,
        location: Location,
        declarations: Vec<Decl>,
        statements: Vec<Stmt>,
    ) -> CompoundStatement {
        CompoundStatement {
            id: self.id(),
            location,
            declarations,
            statements,
        }
    }

    /// A compound statement nested as a statement.
    pub fn block(
        &mut self,
        location: Location,
        declarations: Vec<Decl>,
        statements: Vec<Stmt>,
    ) -> Stmt {
        Stmt::Compound(self.compound(location, declarations, statements))
    }

    pub fn assignment(&mut self, location: Location, target: Expr, value: Expr) -> Assignment {
        assert!(target.as_reference().is_some(), "assignment target must be a variable reference");
        Assignment {
            id: self.id(),
            location,
            target,
            value,
        }
    }

    pub fn assign(&mut self, location: Location, target: Expr, value: Expr) -> Stmt {
        Stmt::Assignment(self.assignment(location, target, value))
    }

    pub fn print(&mut self, location: Location, value: Expr) -> Stmt {
        Stmt::Print(Print {
            id: self.id(),
            location,
            value,
        })
    }

    pub fn read(&mut self, location: Location, target: Expr) -> Stmt {
        assert!(target.as_reference().is_some(), "read target must be a variable reference");
        Stmt::Read(Read {
            id: self.id(),
            location,
            target,
        })
    }

    pub fn if_stmt(
        &mut self,
        location: Location,
        condition: Expr,
        then_body: CompoundStatement,
        else_body: Option<CompoundStatement>,
    ) -> Stmt {
        Stmt::If(If {
            id: self.id(),
            location,
            condition,
            then_body,
            else_body,
        })
    }

    pub fn while_stmt(
        &mut self,
        location: Location,
        condition: Expr,
        body: CompoundStatement,
    ) -> Stmt {
        Stmt::While(While {
            id: self.id(),
            location,
            condition,
            body,
        })
    }

    /// `for var := init to bound do body end do`
    ///
    /// Synthesizes the integer loop variable declaration and its initial
    /// assignment.
    pub fn for_stmt(
        &mut self,
        location: Location,
        (var, var_location): (&str, Location),
        (init, init_location): (i32, Location),
        (bound, bound_location): (i32, Location),
        body: CompoundStatement,
    ) -> Stmt {
        let loop_var = self.decl(var_location, &[(var, var_location)], &Type::INTEGER);
        let target = self.var_ref(var, var_location, Vec::new());
        let value = self.int(init_location, init);
        let init = self.assignment(var_location, target, value);
        let bound = self.int(bound_location, bound);
        Stmt::For(Box::new(For {
            id: self.id(),
            location,
            loop_var,
            init,
            bound,
            body,
        }))
    }

    pub fn return_stmt(&mut self, location: Location, value: Expr) -> Stmt {
        Stmt::Return(Return {
            id: self.id(),
            location,
            value,
        })
    }

    /// A call whose result is discarded.
    pub fn call_stmt(&mut self, call: Expr) -> Stmt {
        assert!(
            matches!(call.kind, ExprKind::Invocation(_)),
            "call statement must wrap an invocation"
        );
        Stmt::Invocation(call)
    }

    fn expr(&mut self, location: Location, kind: ExprKind) -> Expr {
        Expr {
            id: self.id(),
            location,
            kind,
            ty: Type::UNKNOWN,
        }
    }

    pub fn constant(&mut self, location: Location, value: ConstVal) -> Expr {
        self.expr(location, ExprKind::Constant(value))
    }

    pub fn int(&mut self, location: Location, value: i32) -> Expr {
        self.constant(location, ConstVal::Integer(value))
    }

    pub fn real(&mut self, location: Location, value: f64) -> Expr {
        self.constant(location, ConstVal::Real(value))
    }

    pub fn string(&mut self, location: Location, value: &str) -> Expr {
        self.constant(location, ConstVal::String(value.into()))
    }

    pub fn boolean(&mut self, location: Location, value: bool) -> Expr {
        self.constant(location, ConstVal::Boolean(value))
    }

    pub fn binary(&mut self, location: Location, op: BinaryOperator, lhs: Expr, rhs: Expr) -> Expr {
        let kind = ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
        self.expr(location, kind)
    }

    pub fn unary(&mut self, location: Location, op: UnaryOperator, operand: Expr) -> Expr {
        let kind = ExprKind::Unary {
            op,
            operand: Box::new(operand),
        };
        self.expr(location, kind)
    }

    pub fn var_ref(&mut self, name: &str, location: Location, indices: Vec<Expr>) -> Expr {
        let name = self.ident(name, location);
        self.expr(location, ExprKind::Reference(VariableRef { name, indices }))
    }

    pub fn call(&mut self, name: &str, location: Location, args: Vec<Expr>) -> Expr {
        let name = self.ident(name, location);
        self.expr(location, ExprKind::Invocation(Invocation { name, args }))
    }
}
