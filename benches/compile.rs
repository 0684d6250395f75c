use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use sqlgraph::ast::{Column, Exp, Op, Operation, QCode, Select, Val, Variables};
use sqlgraph::db::introspect::{DbColumn, DbInfo, DbTable, TableKind};
use sqlgraph::{Compiler, Config, Schema};
use std::collections::HashMap;
use std::sync::Arc;

fn table(id: i32, name: &str) -> DbTable {
    DbTable {
        id,
        name: name.to_string(),
        kind: TableKind::Table,
    }
}

fn setup_compiler() -> Compiler {
    let info = DbInfo {
        version: 140000,
        tables: vec![
            table(1, "users"),
            table(2, "products"),
            table(3, "customers"),
            table(4, "purchases"),
        ],
        columns: vec![
            vec![
                DbColumn::new(1, "id", "bigint").primary(),
                DbColumn::new(2, "full_name", "text"),
                DbColumn::new(3, "email", "text").unique(),
            ],
            vec![
                DbColumn::new(1, "id", "bigint").primary(),
                DbColumn::new(2, "name", "text"),
                DbColumn::new(3, "price", "numeric(7,2)"),
                DbColumn::new(4, "user_id", "bigint").references("users", 1),
            ],
            vec![
                DbColumn::new(1, "id", "bigint").primary(),
                DbColumn::new(2, "full_name", "text"),
            ],
            vec![
                DbColumn::new(1, "id", "bigint").primary(),
                DbColumn::new(2, "customer_id", "bigint").references("customers", 1),
                DbColumn::new(3, "product_id", "bigint").references("products", 1),
            ],
        ],
    };
    let schema = Schema::new(&info, &HashMap::new()).unwrap();
    Compiler::new(Arc::new(schema), Config::default())
}

fn select(id: usize, parent: Option<usize>, table: &str, cols: &[&str]) -> Select {
    let mut sel = Select::new(id, table);
    sel.parent_id = parent;
    sel.cols = cols.iter().map(|name| Column::new(name)).collect();
    sel
}

fn nested_query() -> QCode {
    let mut products = select(0, None, "products", &["id", "name", "price"]);
    products.children = vec![1, 2];
    products.filter = Some(Exp::And(vec![
        Exp::cond("price", Op::GreaterThan, Val::Int(10)),
        Exp::not(Exp::cond("id", Op::IsNull, Val::Bool(true))),
    ]));

    let mut user = select(1, Some(0), "users", &["full_name", "email"]);
    user.singular = true;
    user.field_name = "user".to_string();

    let customers = select(2, Some(0), "customers", &["id", "full_name"]);
    QCode::query(vec![products, user, customers])
}

fn query_compile_benchmark(c: &mut Criterion) {
    let compiler = setup_compiler();
    let qc = QCode::query(vec![select(0, None, "products", &["id", "name"])]);
    let vars = Variables::new();

    c.bench_function("query::compile", |b| {
        b.iter(|| compiler.compile(black_box(&qc), black_box(&vars)).unwrap())
    });
}

fn query_nested_compile_benchmark(c: &mut Criterion) {
    let compiler = setup_compiler();
    let qc = nested_query();
    let vars = Variables::new();

    c.bench_function("query::compile_nested", |b| {
        b.iter(|| compiler.compile(black_box(&qc), black_box(&vars)).unwrap())
    });
}

fn mutation_compile_benchmark(c: &mut Criterion) {
    let compiler = setup_compiler();
    let qc = QCode::mutation(
        Operation::Insert,
        "data",
        vec![select(0, None, "products", &["id"])],
    );
    let vars: Variables = [(
        "data".to_string(),
        json!({ "name": "Apple", "user": { "email": "ada@example.com" } }),
    )]
    .into_iter()
    .collect();

    c.bench_function("mutation::compile_nested_insert", |b| {
        b.iter(|| compiler.compile(black_box(&qc), black_box(&vars)).unwrap())
    });
}

criterion_group!(
    benches,
    query_compile_benchmark,
    query_nested_compile_benchmark,
    mutation_compile_benchmark
);
criterion_main!(benches);
