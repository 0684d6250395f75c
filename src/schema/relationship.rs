use crate::db::introspect::{DbColumn, DbInfo};
use crate::error::{Error, Result};
use crate::ext::string;
use crate::schema::{Schema, TableInfo};

/// A column on one side of a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelColumn {
    pub table: String,
    pub col: String,
    pub array: bool,
}

impl RelColumn {
    fn new(table: &str, col: &DbColumn) -> Self {
        RelColumn {
            table: table.to_string(),
            col: col.name.clone(),
            array: col.array,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelKind {
    /// The parent holds the foreign key.
    OneToOne,
    /// The child holds the foreign key.
    OneToMany,
    /// Linked through a junction table. `left_col` points at the child,
    /// `right_col` at the parent.
    Through {
        table: String,
        left_col: String,
        right_col: String,
    },
    /// Resolved outside the database. `left` is the parent's local column and
    /// `right.col` the field name its value is exposed under.
    Remote,
}

/// Edge between a child and its parent. `left` is the child side, `right`
/// the parent side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rel {
    pub kind: RelKind,
    pub left: RelColumn,
    pub right: RelColumn,
}

impl Rel {
    pub fn is_remote(&self) -> bool {
        self.kind == RelKind::Remote
    }

    pub fn through(&self) -> Option<(&str, &str, &str)> {
        match &self.kind {
            RelKind::Through {
                table,
                left_col,
                right_col,
            } => Some((table, left_col, right_col)),
            _ => None,
        }
    }
}

/*
Relationships are read off foreign keys.

A foreign key `purchases.customer_id -> customers.id` gives two direct edges:

    (purchases, customers)  OneToMany   left purchases.customer_id  right customers.id
    (customers, purchases)  OneToOne    left customers.id           right purchases.customer_id

Any table holding two or more foreign keys also links its targets to each
other. `purchases` references both `customers` and `products`, so:

    (customers, products)   Through purchases  left customers.id  right products.id
    (products, customers)   Through purchases  left products.id   right customers.id

Direct edges are all inserted before any through edge, and an edge is never
replaced, so a direct relationship always wins.

*/
impl Schema {
    pub fn build_relationships(&mut self, info: &DbInfo) -> Result<()> {
        let mut links: Vec<(String, Vec<ForeignKey>)> = Vec::new();

        for (i, table) in info.tables.iter().enumerate() {
            let columns = match info.columns.get(i) {
                Some(columns) => columns,
                None => continue,
            };
            let ti = self.get_table(&table.name)?;
            let mut fkeys = Vec::new();

            for col in columns {
                if let Some(fkey) = self.foreign_key(ti, col)? {
                    fkeys.push(fkey);
                }
            }
            links.push((ti.key.clone(), fkeys));
        }

        for (_, fkeys) in &links {
            for fkey in fkeys {
                self.add_direct(fkey);
            }
        }

        for (key, fkeys) in &links {
            let outbound: Vec<&ForeignKey> =
                fkeys.iter().filter(|fkey| &fkey.target_key != key).collect();

            if outbound.len() < 2 {
                continue;
            }

            for left in &outbound {
                for right in &outbound {
                    if left.col.col != right.col.col {
                        self.add_through(left, right);
                    }
                }
            }
        }

        Ok(())
    }

    /// Registers a child that is resolved outside the database. Queries skip
    /// it and forward `local_col` from the parent under `remote_field`.
    pub fn add_remote_relationship(
        &mut self,
        child: &str,
        parent: &str,
        local_col: &str,
        remote_field: &str,
    ) -> Result<()> {
        let ti = self.get_table(parent)?;
        let col = ti.require_column(local_col)?;

        let rel = Rel {
            kind: RelKind::Remote,
            left: RelColumn::new(&ti.name, col),
            right: RelColumn {
                table: child.to_string(),
                col: remote_field.to_string(),
                array: false,
            },
        };
        let key = (string::canonical(child), ti.key.clone());
        self.rels.insert(key, rel);
        Ok(())
    }

    pub fn set_rel(&mut self, child: &str, parent: &str, rel: Rel) {
        let key = (self.rel_key(child), self.rel_key(parent));
        self.rels.insert(key, rel);
    }

    fn foreign_key(&self, ti: &TableInfo, col: &DbColumn) -> Result<Option<ForeignKey>> {
        let target_name = match &col.fkey_table {
            Some(name) => name,
            None => return Ok(None),
        };
        let target = self.get_table(target_name)?;
        let target_id = col.fkey_col_id.first().copied().unwrap_or_default();
        let target_col = target
            .column_by_id(target_id)
            .ok_or_else(|| Error::UnknownColumnId {
                table: target.name.clone(),
                id: target_id,
            })?;

        Ok(Some(ForeignKey {
            table_key: ti.key.clone(),
            col: RelColumn::new(&ti.name, col),
            target_key: target.key.clone(),
            target: RelColumn::new(&target.name, target_col),
        }))
    }

    fn add_direct(&mut self, fkey: &ForeignKey) {
        self.insert_rel(
            &fkey.table_key,
            &fkey.target_key,
            Rel {
                kind: RelKind::OneToMany,
                left: fkey.col.clone(),
                right: fkey.target.clone(),
            },
        );

        // A self reference keeps only the edge where the child holds the key.
        if fkey.table_key == fkey.target_key {
            return;
        }

        self.insert_rel(
            &fkey.target_key,
            &fkey.table_key,
            Rel {
                kind: RelKind::OneToOne,
                left: fkey.target.clone(),
                right: fkey.col.clone(),
            },
        );
    }

    fn add_through(&mut self, left: &ForeignKey, right: &ForeignKey) {
        self.insert_rel(
            &left.target_key,
            &right.target_key,
            Rel {
                kind: RelKind::Through {
                    table: left.col.table.clone(),
                    left_col: left.col.col.clone(),
                    right_col: right.col.col.clone(),
                },
                left: left.target.clone(),
                right: right.target.clone(),
            },
        );
    }

    fn insert_rel(&mut self, child: &str, parent: &str, rel: Rel) {
        let key = (child.to_string(), parent.to_string());
        if self.rels.contains_key(&key) {
            return;
        }
        tracing::trace!(child, parent, kind = ?rel.kind, "relationship");
        self.rels.insert(key, rel);
    }
}

struct ForeignKey {
    table_key: String,
    col: RelColumn,
    target_key: String,
    target: RelColumn,
}
