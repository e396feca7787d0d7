use criterion::{criterion_group, criterion_main, Criterion};
use pcc::{
    ast::{builder::Builder, BinaryOperator, Program},
    driver::{compile, Options},
    location::Location,
    types::{ScalarType, Type},
    util::intern::Interner,
};
use std::hint::black_box;

const FUNCTIONS: u32 = 200;

/// One global array plus many small functions, each summing part of it in a
/// loop and called once from the main body.
fn build(names: &mut Interner) -> Program {
    let mut b = Builder::new(names);
    let at = |line: u32| Location::new(line, 1);

    let data = b.decl(at(1), &[("data", at(1))], &Type::array(ScalarType::Integer, [64]));
    let mut functions = Vec::new();
    let mut calls = Vec::new();
    for i in 0..FUNCTIONS {
        let line = 10 + i * 10;
        let name = format!("sum{i}");
        let acc = b.decl(at(line), &[("acc", at(line))], &Type::INTEGER);
        let init = {
            let t = b.var_ref("acc", at(line + 1), vec![]);
            let zero = b.int(at(line + 1), 0);
            b.assign(at(line + 1), t, zero)
        };
        let step = {
            let index = b.var_ref("k", at(line + 3), vec![]);
            let elem = b.var_ref("data", at(line + 3), vec![index]);
            let acc_ref = b.var_ref("acc", at(line + 3), vec![]);
            let sum = b.binary(at(line + 3), BinaryOperator::Add, acc_ref, elem);
            let t = b.var_ref("acc", at(line + 3), vec![]);
            b.assign(at(line + 3), t, sum)
        };
        let loop_body = b.compound(at(line + 3), vec![], vec![step]);
        let header = at(line + 2);
        let for_stmt = b.for_stmt(header, ("k", header), (0, header), (64, header), loop_body);
        let ret = {
            let acc_ref = b.var_ref("acc", at(line + 4), vec![]);
            b.return_stmt(at(line + 4), acc_ref)
        };
        let body = b.compound(at(line), vec![acc], vec![init, for_stmt, ret]);
        functions.push(b.function(&name, at(line), vec![], ScalarType::Integer, Some(body)));

        let call = b.call(&name, at(5), vec![]);
        calls.push(b.print(at(5), call));
    }
    let main = b.compound(at(2), vec![], calls);
    b.program("bench", at(1), vec![data], functions, main)
}

fn criterion_benchmark(c: &mut Criterion) {
    let options = Options::new("bench.p");

    c.bench_function("pipeline", |bencher| {
        bencher.iter(|| {
            let mut names = Interner::with_capacity(FUNCTIONS as usize + 8);
            let mut program = build(&mut names);
            let output = compile(&mut program, &names, None, &options).unwrap();
            black_box(output);
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
