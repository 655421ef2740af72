use criterion::{black_box, criterion_group, criterion_main, Criterion};
use smscr::context::RequestContext;
use smscr::params::ParamStore;
use smscr::script::lexer::Lexer;
use smscr::script::{parse, render, SmartScriptEngine};

fn make_doc(rows: usize) -> String {
    let row = "<tr>{$FOR c 1 10$}<td>{$= r c * \" \" $}{$= c @sin \"0.000\" @decfmt $}</td>{$END$}</tr>\n";
    format!("<table>\n{{$FOR r 1 {rows}$}}{row}{{$END$}}</table>\\{{done}}\n")
}

fn bench_front_end(c: &mut Criterion) {
    let src = make_doc(10).repeat(50);

    let mut g = c.benchmark_group("front_end");
    g.bench_function("lex", |b| b.iter(|| Lexer::new(black_box(&src)).segments().unwrap()));
    g.bench_function("parse", |b| b.iter(|| parse(black_box(&src)).unwrap()));

    let doc = parse(&src).unwrap();
    g.bench_function("render", |b| b.iter(|| render(black_box(&doc))));
    g.finish();
}

fn bench_execute(c: &mut Criterion) {
    let small = parse(&make_doc(10)).unwrap();
    let large = parse(&make_doc(500)).unwrap();

    let mut g = c.benchmark_group("execute");
    for (name, doc) in [("table_10", &small), ("table_500", &large)] {
        g.bench_function(name, |b| {
            b.iter(|| {
                let mut ctx = RequestContext::new(Vec::new(), ParamStore::new(), ParamStore::new())
                    .with_header(false);
                SmartScriptEngine::new(black_box(doc)).execute(&mut ctx).unwrap();
                ctx.into_parts().0.len()
            })
        });
    }
    g.finish();
}

criterion_group!(benches, bench_front_end, bench_execute);
criterion_main!(benches);
