use serde::{Deserialize, Serialize};

/*
Introspection rows drive the schema model.

The catalog queries return one row per table and one row per column *per
constraint*, so a column that is both a primary key and referenced by a unique
index shows up twice:

    [
      { "id": 1, "name": "id", "type": "bigint", "primary_key": true },
      { "id": 1, "name": "id", "type": "bigint", "unique_key": true },
      { "id": 2, "name": "user_id", "type": "bigint",
        "fkey_table": "users", "fkey_col_id": [1] }
    ]

`merge_column_rows` folds those back into one descriptor per column before
the rows reach `Schema::new`.

*/

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbInfo {
    /// `server_version_num`, e.g. 110005
    #[serde(default)]
    pub version: i32,
    pub tables: Vec<DbTable>,
    /// One column list per entry in `tables`, in the same order.
    pub columns: Vec<Vec<DbColumn>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbTable {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub kind: TableKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum TableKind {
    #[default]
    Table,
    View,
    MaterializedView,
    ForeignTable,
}

impl TryFrom<String> for TableKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "table" | "r" => Ok(TableKind::Table),
            "view" | "v" => Ok(TableKind::View),
            "materialized view" | "materializedview" | "m" => Ok(TableKind::MaterializedView),
            "foreign table" | "foreigntable" | "f" => Ok(TableKind::ForeignTable),
            _ => Err(format!("Invalid table kind: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbColumn {
    /// Positional id within the table (`attnum`).
    pub id: i16,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub array: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique_key: bool,
    #[serde(default)]
    pub fkey_table: Option<String>,
    /// Only the first id is used; composite foreign keys are not followed.
    #[serde(default)]
    pub fkey_col_id: Vec<i16>,
}

impl DbColumn {
    pub fn new(id: i16, name: &str, column_type: &str) -> Self {
        DbColumn {
            id,
            name: name.to_string(),
            column_type: column_type.to_string(),
            ..DbColumn::default()
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn references(mut self, table: &str, col_id: i16) -> Self {
        self.fkey_table = Some(table.to_string());
        self.fkey_col_id = vec![col_id];
        self
    }

    pub fn is_tsvector(&self) -> bool {
        self.column_type.eq_ignore_ascii_case("tsvector")
    }
}

/// Collapses catalog rows that describe the same column id into one
/// descriptor. Flags are OR-ed and the first foreign key wins.
pub fn merge_column_rows(rows: Vec<DbColumn>) -> Vec<DbColumn> {
    let mut merged: Vec<DbColumn> = Vec::with_capacity(rows.len());

    for row in rows {
        match merged.iter_mut().find(|existing| existing.id == row.id) {
            Some(existing) => {
                existing.array |= row.array;
                existing.not_null |= row.not_null;
                existing.primary_key |= row.primary_key;
                existing.unique_key |= row.unique_key;
                if existing.fkey_table.is_none() && row.fkey_table.is_some() {
                    existing.fkey_table = row.fkey_table;
                    existing.fkey_col_id = row.fkey_col_id;
                }
            }
            None => merged.push(row),
        }
    }

    merged
}
