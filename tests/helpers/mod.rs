#![allow(dead_code)]

pub mod schema;

use std::collections::HashMap;
use std::sync::Arc;

use sqlgraph::ast::{Column, QCode, Select, Variables};
use sqlgraph::{Compiled, Compiler, Config, Schema};

#[derive(Debug)]
pub enum TestError {
    Schema(sqlgraph::Error),
    Compile(sqlgraph::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Schema(e) => write!(f, "Schema Error: {}", e),
            TestError::Compile(e) => write!(f, "Compile Error: {}", e),
            TestError::Json(e) => write!(f, "JSON Error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

/// Helper function to convert a Result to a test result, printing errors with proper formatting
pub fn expect_ok<T>(result: Result<T, TestError>) -> T {
    match result {
        Ok(val) => val,
        Err(e) => {
            eprintln!("\n{}", e);
            panic!("Test failed with error (see above for details)");
        }
    }
}

pub fn shop_schema() -> Result<Schema, TestError> {
    let mut aliases = HashMap::new();
    aliases.insert("users".to_string(), vec!["me".to_string()]);

    let mut schema = Schema::new(&schema::shop(), &aliases).map_err(TestError::Schema)?;
    schema
        .add_remote_relationship("payments", "users", "stripe_id", "payments")
        .map_err(TestError::Schema)?;
    Ok(schema)
}

pub fn compiler_with(config: Config) -> Result<Compiler, TestError> {
    Ok(Compiler::new(Arc::new(shop_schema()?), config))
}

pub fn compiler() -> Result<Compiler, TestError> {
    compiler_with(Config::default())
}

pub fn keyless_compiler() -> Result<Compiler, TestError> {
    let schema = Schema::new(&schema::keyless(), &HashMap::new()).map_err(TestError::Schema)?;
    Ok(Compiler::new(Arc::new(schema), Config::default()))
}

pub fn compile(qc: &QCode, vars: &Variables) -> Result<Compiled, TestError> {
    compiler()?.compile(qc, vars).map_err(TestError::Compile)
}

pub fn vars(value: serde_json::Value) -> Variables {
    match value {
        serde_json::Value::Object(fields) => fields.into_iter().collect(),
        _ => Variables::new(),
    }
}

pub fn select(id: usize, table: &str, cols: &[&str]) -> Select {
    let mut sel = Select::new(id, table);
    sel.cols = cols.iter().map(|name| Column::new(name)).collect();
    sel
}

/// Attaches `child` under `parent` in a flat selection list.
pub fn nest(selects: &mut [Select], parent: usize, child: usize) {
    selects[child].parent_id = Some(parent);
    selects[parent].children.push(child);
}
