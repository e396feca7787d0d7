use std::fmt::Write as _;

use crate::{location::Located, semantic, symbols::MAX_STORAGE_SIZE, util::fmt::Show};

impl Show for Located<semantic::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &super::Context<'_>) -> std::fmt::Result {
        use semantic::Error::*;

        let i = ctx.names;
        let Located { location, inner: error } = self;

        if f.alternate() {
            write!(f, "{location}: ")?;
        }

        match error {
            SymbolRedeclaration(name) => write!(f, "symbol '{}' is redeclared", i.get(*name)),
            UndeclaredSymbol(name) => write!(f, "use of undeclared symbol '{}'", i.get(*name)),
            NonVariableSymbol(name) => write!(f, "use of non-variable symbol '{}'", i.get(*name)),
            NonFunctionSymbol(name) => write!(f, "call of non-function symbol '{}'", i.get(*name)),
            ArgumentNumberMismatch(name) => {
                let name = i.get(*name);
                write!(f, "too few/much arguments provided for function '{name}'")
            }
            IncompatibleArgumentType { parameter, argument } => write!(
                f,
                "incompatible type passing '{argument}' to parameter of type '{parameter}'"
            ),
            NonIntegerArrayIndex => write!(f, "index of array reference must be an integer"),
            OverArraySubscript(name) => {
                write!(f, "there is an over array subscript on '{}'", i.get(*name))
            }
            InvalidBinaryOperand { op, lhs, rhs } => write!(
                f,
                "invalid operands to binary operator '{op}' ('{lhs}' and '{rhs}')"
            ),
            InvalidUnaryOperand { op, operand } => {
                write!(f, "invalid operand to unary operator '{op}' ('{operand}')")
            }
            AssignToArrayType | AssignByArrayType => write!(f, "array assignment is not allowed"),
            AssignToConstant(name) => write!(
                f,
                "cannot assign to variable '{}' which is a constant",
                i.get(*name)
            ),
            AssignToLoopVar => write!(
                f,
                "the value of loop variable cannot be modified inside the loop body"
            ),
            IncompatibleAssignment { target, value } => write!(
                f,
                "assigning to '{target}' from incompatible type '{value}'"
            ),
            PrintOutNonScalarType => write!(f, "expression of print statement must be scalar type"),
            ReadToNonScalarType => write!(
                f,
                "variable reference of read statement must be scalar type"
            ),
            ReadToConstantOrLoopVar => write!(
                f,
                "variable reference of read statement cannot be a constant or loop variable"
            ),
            NonBooleanCondition => write!(f, "the expression of condition must be boolean type"),
            NonIncrementalLoopVariable => write!(
                f,
                "the lower bound and upper bound of iteration count must be in the {}",
                "incremental order"
            ),
            ReturnFromVoid => write!(f, "program/procedure should not return a value"),
            IncompatibleReturnType { expected, actual } => write!(
                f,
                "return '{actual}' from a function with return type '{expected}'"
            ),
            NonPositiveArrayDimension(name) => write!(
                f,
                "'{}' declared as an array with an index that is not greater than 0",
                i.get(*name)
            ),
            StorageOverflow(name) => write!(
                f,
                "'{}' exceeds the maximum storage size of {MAX_STORAGE_SIZE} bytes",
                i.get(*name)
            ),
        }
    }
}

/// Renders the full report for one diagnostic: a header line, the offending
/// source line, and a caret under the reported column.
///
/// Source lines that do not exist are left out.
pub fn report(
    ctx: &super::Context<'_>,
    source: Option<&str>,
    error: &Located<semantic::Error>,
) -> String {
    let location = error.location;
    let mut out = format!(
        "<Error> Found in line {}, column {}: {}\n",
        location.line,
        location.col,
        error.display(ctx)
    );
    let line = source.and_then(|src| src.lines().nth((location.line as usize).saturating_sub(1)));
    if let Some(line) = line {
        let pad = (location.col as usize).saturating_sub(1);
        // Infallible, since writing into a String never fails.
        let _ = writeln!(out, "    {line}\n    {:pad$}^", "");
    }
    out
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{location::Location, util::fmt::Context, util::intern::Interner};

    #[test]
    fn report_points_at_column() {
        let mut names = Interner::default();
        let x = names.intern("x");
        let ctx = Context { names: &names };
        let error = Location::new(2, 5).wrap(semantic::Error::UndeclaredSymbol(x));
        let source = "program p;\nbegin x := 1; end\nend\n";

        assert_eq!(
            report(&ctx, Some(source), &error),
            indoc! {"
                <Error> Found in line 2, column 5: use of undeclared symbol 'x'
                    begin x := 1; end
                        ^
            "}
        );
        assert_eq!(
            report(&ctx, None, &error),
            "<Error> Found in line 2, column 5: use of undeclared symbol 'x'\n"
        );
    }

    #[test]
    fn storage_overflow_names_the_limit() {
        let mut names = Interner::default();
        let a = names.intern("a");
        let ctx = Context { names: &names };
        let error = Location::new(3, 9).wrap(semantic::Error::StorageOverflow(a));

        assert_eq!(
            format!("{:#}", error.display(&ctx)),
            "3:9: 'a' exceeds the maximum storage size of 2147483632 bytes"
        );
    }
}
