use std::collections::HashMap;

use crate::db::introspect::{DbColumn, DbInfo, DbTable, TableKind};
use crate::error::{Error, Result};
use crate::ext::string;

pub mod relationship;

pub use relationship::{Rel, RelColumn, RelKind};

/// Postgres 11 introduced `websearch_to_tsquery`.
const WEBSEARCH_VERSION: i32 = 110000;

/// One physical table. Every name form and alias resolves to the same
/// descriptor.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub key: String,
    pub kind: TableKind,
    pub columns: Vec<DbColumn>,
    col_map: HashMap<String, usize>,
    col_id_map: HashMap<i16, usize>,
    primary: Option<usize>,
    tsv: Option<usize>,
}

impl TableInfo {
    fn new(table: &DbTable, columns: &[DbColumn]) -> Self {
        let mut info = TableInfo {
            name: table.name.clone(),
            key: string::canonical(&table.name),
            kind: table.kind,
            columns: columns.to_vec(),
            col_map: HashMap::with_capacity(columns.len()),
            col_id_map: HashMap::with_capacity(columns.len()),
            primary: None,
            tsv: None,
        };

        for (i, col) in info.columns.iter().enumerate() {
            info.col_map.insert(col.name.to_lowercase(), i);
            info.col_id_map.insert(col.id, i);

            if col.primary_key && info.primary.is_none() {
                info.primary = Some(i);
            }
            if col.is_tsvector() && info.tsv.is_none() {
                info.tsv = Some(i);
            }
        }

        info
    }

    pub fn column(&self, name: &str) -> Option<&DbColumn> {
        self.col_map
            .get(&name.to_lowercase())
            .map(|i| &self.columns[*i])
    }

    pub fn column_by_id(&self, id: i16) -> Option<&DbColumn> {
        self.col_id_map.get(&id).map(|i| &self.columns[*i])
    }

    pub fn require_column(&self, name: &str) -> Result<&DbColumn> {
        self.column(name).ok_or_else(|| Error::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn primary_col(&self) -> Option<&DbColumn> {
        self.primary.map(|i| &self.columns[i])
    }

    /// Views and materialized views are read only.
    pub fn is_writable(&self) -> bool {
        matches!(self.kind, TableKind::Table | TableKind::ForeignTable)
    }

    /// The first `tsvector` column, used for full-text search.
    pub fn tsv_col(&self) -> Option<&DbColumn> {
        self.tsv.map(|i| &self.columns[i])
    }
}

/// Read-only model of the database, built once and shared across compiles.
#[derive(Debug, Default)]
pub struct Schema {
    version: i32,
    tables: HashMap<String, TableInfo>,
    aliases: HashMap<String, String>,
    rels: HashMap<(String, String), Rel>,
}

impl Schema {
    /// Registers every table first, then derives relationships, since a
    /// foreign key may point at a table that appears later in `info`.
    pub fn new(info: &DbInfo, aliases: &HashMap<String, Vec<String>>) -> Result<Schema> {
        let mut schema = Schema {
            version: info.version,
            ..Schema::default()
        };

        for (i, table) in info.tables.iter().enumerate() {
            let columns = info.columns.get(i).map(Vec::as_slice).unwrap_or(&[]);
            let table_aliases = aliases
                .get(&table.name)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            schema.add_table(table, columns, table_aliases);
        }

        schema.build_relationships(info)?;

        tracing::debug!(
            tables = schema.tables.len(),
            relationships = schema.rels.len(),
            "schema built"
        );
        Ok(schema)
    }

    pub fn add_table(&mut self, table: &DbTable, columns: &[DbColumn], aliases: &[String]) {
        let info = TableInfo::new(table, columns);
        let key = info.key.clone();

        if self.tables.contains_key(&key) {
            tracing::warn!(table = %table.name, key = %key, "table name collides with an existing table, keeping the first");
            return;
        }

        for alias in aliases {
            self.aliases.insert(string::canonical(alias), key.clone());
        }
        self.tables.insert(key, info);
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn ts_query_fn(&self) -> &'static str {
        if self.version >= WEBSEARCH_VERSION {
            "websearch_to_tsquery"
        } else {
            "to_tsquery"
        }
    }

    /// Canonical key for a table name or alias, if either is known.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let key = string::canonical(name);
        if let Some((k, _)) = self.tables.get_key_value(&key) {
            return Some(k.as_str());
        }
        self.aliases.get(&key).map(String::as_str)
    }

    pub fn get_table(&self, name: &str) -> Result<&TableInfo> {
        self.resolve(name)
            .and_then(|key| self.tables.get(key))
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(&string::canonical(name))
    }

    /// Whether `name` is written in its singular form.
    pub fn is_singular(&self, name: &str) -> bool {
        string::is_singular(name)
    }

    pub fn get_rel(&self, child: &str, parent: &str) -> Result<&Rel> {
        let key = (self.rel_key(child), self.rel_key(parent));
        self.rels
            .get(&key)
            .ok_or_else(|| Error::UnknownRelationship {
                child: child.to_string(),
                parent: parent.to_string(),
            })
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    fn rel_key(&self, name: &str) -> String {
        match self.resolve(name) {
            Some(key) => key.to_string(),
            None => string::canonical(name),
        }
    }
}
