use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    ast::Program,
    codegen::{self, Target},
    semantic::Checker,
    util::{
        fmt::{error::report, Context},
        intern::Interner,
    },
};

const DEFAULT_ASSEMBLY_CAPACITY: usize = 4 * 1024; // 4 KiB

/// Knobs for one compilation.
#[derive(Debug, Clone)]
pub struct Options {
    pub target: Target,
    /// Directory receiving the assembly file. Defaults to the current one.
    pub output_dir: Option<PathBuf>,
    /// Collects every symbol table as its scope closes.
    pub dump_symbol_tables: bool,
    /// Path of the source file, used for the `.file` directive and to name
    /// the output.
    pub source_name: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            target: Target::default(),
            output_dir: None,
            dump_symbol_tables: false,
            source_name: "main.p".to_owned(),
        }
    }
}

impl Options {
    pub fn new(source_name: impl Into<String>) -> Options {
        Options {
            source_name: source_name.into(),
            ..Options::default()
        }
    }

    pub fn output_path(&self) -> PathBuf {
        output_path(&self.source_name, self.output_dir.as_deref())
    }
}

#[derive(Debug)]
pub struct Output {
    pub assembly: String,
    /// Empty unless [`Options::dump_symbol_tables`] is set.
    pub symbol_tables: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("found {count} semantic error(s), no code was generated")]
    Semantic {
        count: usize,
        /// One rendered report per diagnostic, in traversal order.
        diagnostics: Vec<String>,
        symbol_tables: String,
    },
    #[error("failed to write `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Analyzes the program and, if no diagnostic was found, generates its
/// assembly. `source` is only used to quote offending lines.
pub fn compile(
    program: &mut Program,
    names: &Interner,
    source: Option<&str>,
    options: &Options,
) -> Result<Output, CompileError> {
    info!(source = %options.source_name, "semantic analysis");
    let mut symbol_tables = String::new();
    let mut checker = Checker::new(names);
    if options.dump_symbol_tables {
        checker = checker.with_table_dump(&mut symbol_tables);
    }

    let scopes = match checker.check(program) {
        Ok(scopes) => scopes,
        Err(errors) => {
            warn!(count = errors.len(), "semantic errors found, skipping code generation");
            let ctx = Context { names };
            let diagnostics = errors.iter().map(|e| report(&ctx, source, e)).collect();
            return Err(CompileError::Semantic {
                count: errors.len(),
                diagnostics,
                symbol_tables,
            });
        }
    };

    info!(target = %options.target, "code generation");
    let mut assembly = String::with_capacity(DEFAULT_ASSEMBLY_CAPACITY);
    codegen::generate(
        &mut assembly,
        names,
        options.target,
        scopes,
        program,
        &options.source_name,
    );
    info!(bytes = assembly.len(), "assembly generated");
    Ok(Output {
        assembly,
        symbol_tables,
    })
}

/// Like [`compile`], but also writes the assembly to
/// [`Options::output_path`], returning that path.
pub fn compile_to_file(
    program: &mut Program,
    names: &Interner,
    source: Option<&str>,
    options: &Options,
) -> Result<PathBuf, CompileError> {
    let output = compile(program, names, source, options)?;
    let path = options.output_path();
    fs::write(&path, output.assembly).map_err(|source| CompileError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "assembly written");
    Ok(path)
}

/// `<dir>/<stem>.S`, where the stem is the source file name without its
/// directory and extension.
pub fn output_path(source_name: &str, output_dir: Option<&Path>) -> PathBuf {
    let stem = Path::new(source_name)
        .file_stem()
        .unwrap_or(OsStr::new("out"));
    let mut file = stem.to_owned();
    file.push(".S");
    output_dir.unwrap_or(Path::new(".")).join(file)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        ast::{builder::Builder, BinaryOperator, ConstVal, ExprKind, Stmt},
        location::Location,
        types::{ScalarType, Type},
        util::test_utils::{assert_lines_in_order, init_test_logging, loc},
    };

    fn run(
        build: impl FnOnce(&mut Builder<'_>) -> Program,
    ) -> (Program, Result<Output, CompileError>) {
        init_test_logging();
        let mut names = Interner::default();
        let mut program = build(&mut Builder::new(&mut names));
        let result = compile(&mut program, &names, None, &Options::new("tests/demo.p"));
        (program, result)
    }

    #[track_caller]
    fn diagnostics(result: Result<Output, CompileError>) -> Vec<String> {
        match result {
            Err(CompileError::Semantic { diagnostics, .. }) => diagnostics,
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected semantic errors"),
        }
    }

    #[test]
    fn integer_sum_is_stored_and_printed() {
        let (program, result) = run(|b| {
            let x = b.decl(loc(1, 1), &[("x", loc(1, 5))], &Type::INTEGER);
            let assign = {
                let one = b.int(loc(2, 12), 1);
                let two = b.int(loc(2, 16), 2);
                let sum = b.binary(loc(2, 14), BinaryOperator::Add, one, two);
                let t = b.var_ref("x", loc(2, 7), vec![]);
                b.assign(loc(2, 9), t, sum)
            };
            let print = {
                let x = b.var_ref("x", loc(2, 25), vec![]);
                b.print(loc(2, 19), x)
            };
            let body = b.compound(loc(2, 1), vec![], vec![assign, print]);
            b.program("demo", loc(1, 1), vec![x], vec![], body)
        });
        let output = result.expect("no diagnostics");

        let Stmt::Assignment(assign) = &program.body.statements[0] else {
            unreachable!()
        };
        assert_eq!(assign.target.ty, Type::INTEGER);
        assert_eq!(assign.value.ty, Type::INTEGER);

        let asm = &output.assembly;
        assert_eq!(asm.matches("sw t0, 0(t1)").count(), 1);
        assert_eq!(asm.matches("jal ra, printInt").count(), 1);
        assert_lines_in_order(
            asm,
            &[".file \"tests/demo.p\"", ".comm x, 4, 4", "la t0, x", "add t0, t0, t1"],
        );
        assert!(output.symbol_tables.is_empty());
    }

    #[test]
    fn integer_is_converted_before_real_store() {
        let (_, result) = run(|b| {
            let y = b.decl(loc(1, 1), &[("y", loc(1, 5))], &Type::REAL);
            let assign = {
                let three = b.int(loc(2, 12), 3);
                let t = b.var_ref("y", loc(2, 7), vec![]);
                b.assign(loc(2, 9), t, three)
            };
            let body = b.compound(loc(2, 1), vec![], vec![assign]);
            b.program("demo", loc(1, 1), vec![y], vec![], body)
        });
        let asm = result.expect("no diagnostics").assembly;
        assert_lines_in_order(
            &asm,
            &["la t0, y", "li t0, 3", "fcvt.s.w ft0, t0", "fsw ft0, 0(t0)"],
        );
    }

    #[test]
    fn decreasing_loop_is_rejected_without_output() {
        let (_, result) = run(|b| {
            let loop_body = b.compound(loc(1, 26), vec![], vec![]);
            let for_stmt = b.for_stmt(
                loc(1, 7),
                ("i", loc(1, 11)),
                (5, loc(1, 16)),
                (3, loc(1, 21)),
                loop_body,
            );
            let body = b.compound(loc(1, 1), vec![], vec![for_stmt]);
            b.program("demo", loc(1, 1), vec![], vec![], body)
        });
        assert_eq!(
            diagnostics(result),
            [concat!(
                "<Error> Found in line 1, column 7: the lower bound and upper bound of iteration ",
                "count must be in the incremental order\n",
            )]
        );
    }

    #[test]
    fn argument_count_mismatch_is_the_only_call_diagnostic() {
        let (program, result) = run(|b| {
            let params = b.decl(
                loc(1, 12),
                &[("a", loc(1, 12)), ("b", loc(1, 15))],
                &Type::INTEGER,
            );
            let f = b.function("f", loc(1, 10), vec![params], ScalarType::Integer, None);
            let x = b.decl(loc(2, 1), &[("x", loc(2, 5))], &Type::STRING);
            let print = {
                let x = b.var_ref("x", loc(3, 9), vec![]);
                let call = b.call("f", loc(3, 7), vec![x]);
                b.print(loc(3, 1), call)
            };
            let body = b.compound(loc(3, 1), vec![], vec![print]);
            b.program("demo", loc(1, 1), vec![x], vec![f], body)
        });
        assert_eq!(
            diagnostics(result),
            [concat!(
                "<Error> Found in line 3, column 7: ",
                "too few/much arguments provided for function 'f'\n",
            )]
        );
        let Stmt::Print(print) = &program.body.statements[0] else {
            unreachable!()
        };
        assert!(matches!(print.value.kind, ExprKind::Invocation(_)));
        assert_eq!(print.value.ty, Type::UNKNOWN);
    }

    #[test]
    fn extra_subscript_is_reported_once() {
        let (_, result) = run(|b| {
            let matrix = Type::array(ScalarType::Integer, [2, 2]);
            let arr = b.decl(loc(1, 1), &[("arr", loc(1, 5))], &matrix);
            let print = {
                let indices = vec![
                    b.int(loc(2, 11), 1),
                    b.int(loc(2, 14), 2),
                    b.int(loc(2, 17), 3),
                ];
                let r = b.var_ref("arr", loc(2, 7), indices);
                b.print(loc(2, 1), r)
            };
            let body = b.compound(loc(2, 1), vec![], vec![print]);
            b.program("demo", loc(1, 1), vec![arr], vec![], body)
        });
        assert_eq!(
            diagnostics(result),
            ["<Error> Found in line 2, column 7: there is an over array subscript on 'arr'\n"]
        );
    }

    #[test]
    fn oversized_storage_closes_the_gate() {
        let (_, result) = run(|b| {
            let huge = Type::array(ScalarType::Real, [70_000, 70_000]);
            let g = b.decl(loc(1, 1), &[("g", loc(1, 5))], &huge);
            let big = Type::array(ScalarType::Integer, [300_000_000, 2]);
            let l = b.decl(loc(3, 1), &[("l", loc(3, 5))], &big);
            let print = {
                let i = b.int(loc(4, 9), 0);
                let j = b.int(loc(4, 12), 1);
                let r = b.var_ref("l", loc(4, 7), vec![i, j]);
                b.print(loc(4, 1), r)
            };
            let body = b.compound(loc(2, 1), vec![l], vec![print]);
            b.program("demo", loc(1, 1), vec![g], vec![], body)
        });
        assert_eq!(
            diagnostics(result),
            [
                "<Error> Found in line 1, column 5: \
                 'g' exceeds the maximum storage size of 2147483632 bytes\n",
                "<Error> Found in line 3, column 5: \
                 'l' exceeds the maximum storage size of 2147483632 bytes\n",
            ]
        );
    }

    #[test]
    fn report_quotes_the_source_line() {
        init_test_logging();
        let source = "demo;\nbegin\n  print 1 + true;\nend\nend\n";
        let mut names = Interner::default();
        let mut program = {
            let mut b = Builder::new(&mut names);
            let one = b.int(loc(3, 9), 1);
            let t = b.boolean(loc(3, 13), true);
            let sum = b.binary(loc(3, 11), BinaryOperator::Add, one, t);
            let print = b.print(loc(3, 3), sum);
            let body = b.compound(loc(2, 1), vec![], vec![print]);
            b.program("demo", loc(1, 1), vec![], vec![], body)
        };
        let options = Options {
            dump_symbol_tables: true,
            ..Options::new("demo.p")
        };
        let err = compile(&mut program, &names, Some(source), &options).unwrap_err();
        assert_eq!(err.to_string(), "found 1 semantic error(s), no code was generated");
        let CompileError::Semantic {
            diagnostics,
            symbol_tables,
            ..
        } = err
        else {
            unreachable!()
        };
        assert_eq!(
            diagnostics,
            [concat!(
                "<Error> Found in line 3, column 11: ",
                "invalid operands to binary operator '+' ('integer' and 'boolean')\n",
                "      print 1 + true;\n",
                "              ^\n",
            )]
        );
        assert!(symbol_tables.contains("demo"));
    }

    #[test]
    fn output_path_uses_source_stem() {
        assert_eq!(output_path("tests/foo.p", None), PathBuf::from("./foo.S"));
        assert_eq!(
            output_path("foo.p", Some(Path::new("/tmp/out"))),
            PathBuf::from("/tmp/out/foo.S")
        );
        assert_eq!(Options::new("a/b/c.p").output_path(), PathBuf::from("./c.S"));
    }

    #[test]
    fn compile_to_file_writes_assembly() {
        init_test_logging();
        let dir = std::env::temp_dir().join(format!("pcc-driver-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut names = Interner::default();
        let mut program = {
            let mut b = Builder::new(&mut names);
            let yes = ConstVal::Boolean(true);
            let c = b.const_decl(loc(2, 1), &[("c", loc(2, 5))], &yes, loc(2, 8));
            let body = b.compound(Location::new(3, 1), vec![], vec![]);
            b.program("demo", loc(1, 1), vec![c], vec![], body)
        };
        let options = Options {
            output_dir: Some(dir.clone()),
            ..Options::new("src/demo.p")
        };
        let path = compile_to_file(&mut program, &names, None, &options).unwrap();
        assert_eq!(path, dir.join("demo.S"));
        let asm = fs::read_to_string(&path).unwrap();
        assert_lines_in_order(&asm, &["c:", ".word 1", "main:"]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
