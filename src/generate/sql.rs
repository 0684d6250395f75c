use std::sync::Arc;

use crate::ast::{self, QCode, Variables};
use crate::config::Config;
use crate::db::introspect::DbColumn;
use crate::error::{Error, Result};
use crate::schema::Schema;

pub mod columns;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod mutate;
pub mod select;
pub mod to_sql;
pub mod update;

/// Selection ids left out of the SQL, to be resolved by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipMask(u64);

impl SkipMask {
    pub fn set(&mut self, id: usize) -> Result<()> {
        if id >= 64 {
            return Err(Error::TooManySelections(id));
        }
        self.0 |= 1 << id;
        Ok(())
    }

    pub fn contains(&self, id: usize) -> bool {
        id < 64 && self.0 & (1 << id) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub sql: String,
    pub skipped: SkipMask,
}

/// Turns a `QCode` into a single Postgres statement.
///
/// Holds no per-request state, one compiler can serve every request.
#[derive(Debug, Clone)]
pub struct Compiler {
    schema: Arc<Schema>,
    config: Config,
}

impl Compiler {
    pub fn new(schema: Arc<Schema>, config: Config) -> Self {
        Compiler { schema, config }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn compile(&self, qc: &QCode, vars: &Variables) -> Result<Compiled> {
        match qc.operation {
            ast::Operation::Query => self.compile_query(qc, vars),
            _ => self.compile_mutation(qc, vars),
        }
    }

    pub fn compile_query(&self, qc: &QCode, vars: &Variables) -> Result<Compiled> {
        tracing::debug!(selects = qc.selects.len(), roots = qc.roots.len(), "compiling query");

        let mut sql = String::new();
        let skipped = select::QueryCompiler::new(self, qc, vars, None).compile(&mut sql)?;

        tracing::debug!(bytes = sql.len(), skipped = skipped.bits(), "compiled query");
        Ok(Compiled { sql, skipped })
    }

    pub fn compile_mutation(&self, qc: &QCode, vars: &Variables) -> Result<Compiled> {
        tracing::debug!(operation = qc.operation.as_str(), selects = qc.selects.len(), "compiling mutation");

        let mut sql = String::new();
        let skipped = mutate::compile(self, qc, vars, &mut sql)?;

        tracing::debug!(bytes = sql.len(), "compiled mutation");
        Ok(Compiled { sql, skipped })
    }

    /// Primary key of `table`, the column mutations are usually keyed on.
    pub fn id_column(&self, table: &str) -> Result<&DbColumn> {
        let ti = self.schema.get_table(table)?;
        ti.primary_col().ok_or_else(|| Error::MissingPrimaryKey {
            table: ti.name.clone(),
            field: table.to_string(),
        })
    }

    pub(crate) fn vars<'a>(&'a self, request: &'a Variables) -> filter::Vars<'a> {
        filter::Vars::new(&self.config.vars, request)
    }

    pub(crate) fn filter_context<'a>(&'a self, request: &'a Variables) -> filter::FilterContext<'a> {
        filter::FilterContext {
            schema: &self.schema,
            vars: self.vars(request),
        }
    }
}
