use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::ast::{Exp, Operation, QCode, Select, Variables};
use crate::db::introspect::DbColumn;
use crate::error::{Error, Result};
use crate::generate::sql::select::QueryCompiler;
use crate::generate::sql::{delete, filter, insert, to_sql, update};
use crate::generate::sql::{Compiler, SkipMask};
use crate::jsn;
use crate::schema::{Rel, RelKind, TableInfo};

/// CTE that exposes the payload variable as `i.j`.
pub const INPUT_CTE: &str = "_sg_input";

const CONNECT_KEYS: [&str; 2] = ["connect", "_connect"];
const DISCONNECT_KEYS: [&str; 2] = ["disconnect", "_disconnect"];
const WHERE_KEY: &str = "where";

/*
A mutation is a chain of CTEs followed by the regular read of the root
selection, which now reads the rows the chain returned.

    mutation {
        products(insert: $data) { id name user { email } }
    }

with `$data = { "name": "Apple", "user": { "email": "a@b.c" } }` becomes

    WITH "_sg_input" AS (SELECT '{{data}}' :: json AS j),
    "users" AS (INSERT INTO "users" ("email")
        SELECT "t"."email" FROM "_sg_input" i,
        json_populate_record(NULL::"users", i.j->'user') t RETURNING *),
    "products" AS (INSERT INTO "products" ("name", "user_id")
        SELECT "t"."name", "users"."id" FROM "_sg_input" i, "users",
        json_populate_record(NULL::"products", i.j) t RETURNING *)
    SELECT json_object_agg('products', "json_0") FROM (...)

The payload itself stays a placeholder. Its value is only used to work out
which tables and columns the chain touches.

Each payload key naming a related table becomes an item of its own. When the
parent holds the foreign key the child is written first, otherwise the parent
goes first. `connect` and `disconnect` keys link existing rows instead. Each
becomes its own `"<table>_<n>"` CTE, and a union of those takes the table's
name so the read sees them.

Rows added to or removed from a junction table are folded back the same way.
The chain ends with a CTE named after the junction that the read joins
instead of the table:

    "purchases" AS (SELECT "purchases".* FROM "purchases"
        WHERE NOT EXISTS (SELECT 1 FROM "purchases_3" WHERE ...)
        UNION ALL SELECT * FROM "purchases_2")

*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemKind {
    Insert,
    Upsert,
    Update,
    Connect,
    Disconnect,
    Union,
}

pub(crate) struct Item<'a> {
    pub id: usize,
    pub kind: ItemKind,
    pub ti: &'a TableInfo,
    /// Payload keys leading from the root to this item's data.
    pub path: Vec<String>,
    pub data: Map<String, Value>,
    pub array: bool,
    pub parent: Option<usize>,
    /// Relationship between this item (child) and its parent.
    pub rel: Option<&'a Rel>,
    pub children: Vec<usize>,
    /// `where` of a nested update, or the rows a connect/disconnect targets.
    pub filter: Option<Exp>,
}

impl<'a> Item<'a> {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Where a written column takes its value from.
#[derive(Debug, Clone)]
pub(crate) enum Source<'a> {
    Payload,
    Preset(&'a str),
    /// A column of an earlier CTE.
    Related { table: String, col: &'a str },
    Null,
}

struct JunctionWrite<'a> {
    junction: &'a str,
    left_col: &'a str,
    right_col: &'a str,
    cte: String,
    removed: bool,
}

pub(crate) struct Mutation<'a> {
    pub compiler: &'a Compiler,
    pub qc: &'a QCode,
    pub vars: &'a Variables,
    pub root: &'a Select,
    pub items: Vec<Item<'a>>,
}

pub fn compile(
    compiler: &Compiler,
    qc: &QCode,
    vars: &Variables,
    result: &mut String,
) -> Result<SkipMask> {
    let root_id = *qc.roots.first().ok_or(Error::EmptyQuery)?;
    let root = qc
        .selects
        .get(root_id)
        .ok_or(Error::UnknownSelection(root_id))?;
    let ti = compiler.schema().get_table(&root.table)?;
    if qc.operation.is_mutation() {
        writable(ti)?;
    }

    let mut m = Mutation {
        compiler,
        qc,
        vars,
        root,
        items: Vec::new(),
    };

    for preset in &root.presets {
        ti.require_column(&preset.col)?;
    }

    let kind = match qc.operation {
        Operation::Delete => {
            result.push_str("WITH ");
            delete::render(&m, ti, result)?;
            return m.render_read(root_id, result);
        }
        Operation::Insert => ItemKind::Insert,
        Operation::Upsert => ItemKind::Upsert,
        Operation::Update => ItemKind::Update,
        Operation::Query => return QueryCompiler::new(compiler, qc, vars, None).compile(result),
    };

    let action_var = qc.action_var.as_deref().ok_or(Error::MissingActionVar)?;
    let payload = vars
        .get(action_var)
        .ok_or_else(|| Error::MissingVariable(action_var.to_string()))?;
    if payload.is_null() || payload.as_str() == Some("") {
        return Err(Error::EmptyVariable(action_var.to_string()));
    }

    m.build(kind, ti, payload)?;

    result.push_str("WITH ");
    to_sql::table(result, INPUT_CTE);
    result.push_str(" AS (SELECT ");
    to_sql::placeholder(result, action_var, "json");
    result.push_str(" AS j)");

    for idx in m.order() {
        result.push_str(", ");
        m.render_item(idx, result)?;
    }
    m.render_junctions(result)?;

    m.render_read(root_id, result)
}

impl<'a> Mutation<'a> {
    fn build(&mut self, kind: ItemKind, ti: &'a TableInfo, payload: &Value) -> Result<()> {
        let compiler = self.compiler;
        let schema = compiler.schema();
        let (data, array) = jsn::tree(payload)?;
        let mut written: HashSet<&str> = HashSet::new();
        written.insert(&ti.key);

        self.items.push(Item {
            id: 0,
            kind,
            ti,
            path: Vec::new(),
            data,
            array,
            parent: None,
            rel: None,
            children: Vec::new(),
            filter: None,
        });

        let mut pending = vec![0];
        while let Some(idx) = pending.pop() {
            let item = &self.items[idx];
            let item_ti = item.ti;
            let item_kind = item.kind;
            let item_array = item.array;
            let item_path = item.path.clone();

            let nested: Vec<(String, Value)> = item
                .data
                .iter()
                .filter(|(key, value)| jsn::is_nested(value) && item_ti.column(key).is_none())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            let links = nested
                .iter()
                .filter(|(key, _)| is_link_key(key))
                .count();
            if links > 0 {
                if item.is_root() {
                    return Err(Error::InvalidPayload(
                        "connect and disconnect apply to related tables only".to_string(),
                    ));
                }
                if links != item.data.len() {
                    return Err(Error::InvalidPayload(format!(
                        "'{}' mixes connect or disconnect with other fields",
                        item_path.join(".")
                    )));
                }
                self.items[idx].kind = ItemKind::Union;
            }

            for (key, value) in nested {
                // The root takes its filter from the selection.
                if key == WHERE_KEY && item_kind == ItemKind::Update {
                    if !item_path.is_empty() {
                        let exp = filter::from_json(schema, item_ti, &value)?;
                        self.items[idx].filter = Some(exp);
                    }
                    continue;
                }

                if is_link_key(&key) {
                    let link_kind = if DISCONNECT_KEYS.contains(&key.as_str()) {
                        if matches!(item_kind, ItemKind::Insert | ItemKind::Upsert) {
                            return Err(Error::InvalidPayload(format!(
                                "cannot disconnect '{}' while inserting",
                                item_ti.name
                            )));
                        }
                        ItemKind::Disconnect
                    } else {
                        ItemKind::Connect
                    };
                    let exp = link_filter(compiler, item_ti, &value)?;
                    let rel = self.items[idx].rel;
                    if matches!(rel, Some(rel) if rel.kind == RelKind::OneToMany) {
                        writable(item_ti)?;
                    }
                    self.push_child(idx, Item {
                        id: 0,
                        kind: link_kind,
                        ti: item_ti,
                        path: item_path.clone(),
                        data: Map::new(),
                        array: false,
                        parent: Some(idx),
                        rel,
                        children: Vec::new(),
                        filter: Some(exp),
                    });
                    continue;
                }

                if item_array {
                    return Err(Error::NestedBulkMutation);
                }

                let child_ti = schema.get_table(&key)?;
                let rel = schema.get_rel(&key, &item_ti.name)?;
                writable(child_ti)?;
                if rel.is_remote() {
                    return Err(Error::UnsupportedRelationship {
                        child: key,
                        parent: item_ti.name.clone(),
                        reason: "remote relationships cannot be mutated",
                    });
                }
                if !written.insert(&child_ti.key) {
                    return Err(Error::DuplicateMutation(child_ti.name.clone()));
                }

                let child_kind = match item_kind {
                    ItemKind::Update => ItemKind::Update,
                    _ => ItemKind::Insert,
                };
                let (data, array) = jsn::tree(&value)?;
                if array && child_kind == ItemKind::Update {
                    return Err(Error::InvalidPayload(format!(
                        "nested update of '{}' expects an object",
                        key
                    )));
                }

                let mut path = item_path.clone();
                path.push(key);
                let child = self.push_child(idx, Item {
                    id: 0,
                    kind: child_kind,
                    ti: child_ti,
                    path,
                    data,
                    array,
                    parent: Some(idx),
                    rel: Some(rel),
                    children: Vec::new(),
                    filter: None,
                });
                pending.push(child);
            }
        }

        Ok(())
    }

    fn push_child(&mut self, parent: usize, mut item: Item<'a>) -> usize {
        let idx = self.items.len();
        item.id = idx;
        self.items.push(item);
        self.items[parent].children.push(idx);
        idx
    }

    /// Items in the order their CTEs must appear.
    fn order(&self) -> Vec<usize> {
        enum Visit {
            Enter(usize),
            Emit(usize),
        }

        let mut ordered = Vec::with_capacity(self.items.len());
        let mut stack = vec![Visit::Enter(0)];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Emit(idx) => ordered.push(idx),
                Visit::Enter(idx) => {
                    let (before, after): (Vec<usize>, Vec<usize>) = self.items[idx]
                        .children
                        .iter()
                        .copied()
                        .partition(|child| self.runs_before_parent(*child));

                    for child in after.into_iter().rev() {
                        stack.push(Visit::Enter(child));
                    }
                    stack.push(Visit::Emit(idx));
                    for child in before.into_iter().rev() {
                        stack.push(Visit::Enter(child));
                    }
                }
            }
        }

        ordered
    }

    fn runs_before_parent(&self, idx: usize) -> bool {
        let item = &self.items[idx];
        match item.kind {
            ItemKind::Connect | ItemKind::Disconnect => true,
            ItemKind::Insert | ItemKind::Union => {
                matches!(item.rel, Some(rel) if rel.kind == RelKind::OneToOne)
            }
            ItemKind::Upsert | ItemKind::Update => false,
        }
    }

    fn render_item(&self, idx: usize, result: &mut String) -> Result<()> {
        match self.items[idx].kind {
            ItemKind::Insert | ItemKind::Upsert => insert::render(self, idx, result),
            ItemKind::Update => update::render(self, idx, result),
            ItemKind::Connect => self.render_connect(idx, result),
            ItemKind::Disconnect => self.render_disconnect(idx, result),
            ItemKind::Union => {
                self.render_union(idx, result);
                Ok(())
            }
        }
    }

    fn render_read(&self, root_id: usize, result: &mut String) -> Result<SkipMask> {
        result.push(' ');
        QueryCompiler::new(self.compiler, self.qc, self.vars, Some(root_id)).compile(result)
    }

    pub(crate) fn parent(&self, idx: usize) -> Option<&Item<'a>> {
        self.items[idx].parent.map(|p| &self.items[p])
    }

    /// The item a link (connect/disconnect) attaches its rows to.
    fn link_owner(&self, idx: usize) -> Result<(&Item<'a>, &'a Rel)> {
        let union = self.parent(idx);
        let owner = union.and_then(|union| union.parent.map(|p| &self.items[p]));
        match (owner, self.items[idx].rel) {
            (Some(owner), Some(rel)) => Ok((owner, rel)),
            _ => Err(Error::InvalidPayload(
                "connect and disconnect apply to related tables only".to_string(),
            )),
        }
    }

    pub(crate) fn cte_name(&self, idx: usize) -> String {
        let item = &self.items[idx];
        match item.kind {
            ItemKind::Connect | ItemKind::Disconnect => format!("{}_{}", item.ti.name, item.id),
            _ => item.ti.name.clone(),
        }
    }

    // "users_2" AS (UPDATE "users" SET "org_id" = "orgs"."id" FROM "orgs" WHERE ... RETURNING "users".*)
    fn render_connect(&self, idx: usize, result: &mut String) -> Result<()> {
        let item = &self.items[idx];
        let (owner, rel) = self.link_owner(idx)?;
        let table = item.ti.name.as_str();
        let parent = owner.ti.name.as_str();
        let name = self.cte_name(idx);

        to_sql::table(result, &name);
        result.push_str(" AS (");
        match &rel.kind {
            RelKind::OneToMany => {
                result.push_str("UPDATE ");
                to_sql::table(result, table);
                result.push_str(" SET ");
                to_sql::table(result, &rel.left.col);
                result.push_str(" = ");
                to_sql::col_with_table(result, parent, &rel.right.col);
                result.push_str(" FROM ");
                to_sql::table(result, parent);
                result.push_str(" WHERE ");
                self.render_filter(result, item)?;
                result.push_str(" RETURNING ");
                to_sql::table(result, table);
                result.push_str(".*)");
            }
            RelKind::OneToOne => {
                self.render_link_select(result, item, true)?;
            }
            RelKind::Through {
                table: junction,
                left_col,
                right_col,
            } => {
                self.render_link_select(result, item, false)?;
                result.push_str(", ");
                to_sql::table_with_id(result, junction, item.id);
                result.push_str(" AS (INSERT INTO ");
                to_sql::table(result, junction);
                result.push_str(" (");
                to_sql::table(result, right_col);
                result.push_str(", ");
                to_sql::table(result, left_col);
                result.push_str(") SELECT ");
                to_sql::col_with_table(result, parent, &rel.right.col);
                result.push_str(", ");
                to_sql::col_with_table(result, &name, &rel.left.col);
                result.push_str(" FROM ");
                to_sql::table(result, parent);
                result.push_str(", ");
                to_sql::table(result, &name);
                result.push_str(" RETURNING *)");
            }
            RelKind::Remote => return Err(remote_link(item, owner)),
        }
        Ok(())
    }

    fn render_disconnect(&self, idx: usize, result: &mut String) -> Result<()> {
        let item = &self.items[idx];
        let (owner, rel) = self.link_owner(idx)?;
        let table = item.ti.name.as_str();
        let parent = owner.ti.name.as_str();
        let name = self.cte_name(idx);

        to_sql::table(result, &name);
        result.push_str(" AS (");
        match &rel.kind {
            RelKind::OneToMany => {
                result.push_str("UPDATE ");
                to_sql::table(result, table);
                result.push_str(" SET ");
                to_sql::table(result, &rel.left.col);
                result.push_str(" = NULL FROM ");
                to_sql::table(result, parent);
                result.push_str(" WHERE ");
                to_sql::rel_condition(result, rel, parent);
                result.push_str(" AND ");
                self.render_filter(result, item)?;
                result.push_str(" RETURNING ");
                to_sql::table(result, table);
                result.push_str(".*)");
            }
            RelKind::OneToOne => {
                self.render_link_select(result, item, true)?;
            }
            RelKind::Through {
                table: junction,
                left_col,
                right_col,
            } => {
                self.render_link_select(result, item, false)?;
                result.push_str(", ");
                to_sql::table_with_id(result, junction, item.id);
                result.push_str(" AS (DELETE FROM ");
                to_sql::table(result, junction);
                result.push_str(" USING ");
                to_sql::table(result, parent);
                result.push_str(", ");
                to_sql::table(result, &name);
                result.push_str(" WHERE ((");
                to_sql::col_with_table(result, junction, right_col);
                result.push_str(") = (");
                to_sql::col_with_table(result, parent, &rel.right.col);
                result.push_str(")) AND ((");
                to_sql::col_with_table(result, junction, left_col);
                result.push_str(") = (");
                to_sql::col_with_table(result, &name, &rel.left.col);
                result.push_str(")) RETURNING ");
                to_sql::table(result, junction);
                result.push_str(".*)");
            }
            RelKind::Remote => return Err(remote_link(item, owner)),
        }
        Ok(())
    }

    /// Junction rows written by the chain, in item order.
    fn junction_writes(&self) -> Vec<JunctionWrite<'a>> {
        let mut writes = Vec::new();
        for item in &self.items {
            let rel: &'a Rel = match item.rel {
                Some(rel) => rel,
                None => continue,
            };
            let (junction, left_col, right_col) = match rel.through() {
                Some(through) => through,
                None => continue,
            };
            let removed = match item.kind {
                ItemKind::Insert | ItemKind::Connect => false,
                ItemKind::Disconnect => true,
                _ => continue,
            };
            writes.push(JunctionWrite {
                junction,
                left_col,
                right_col,
                cte: format!("{}_{}", junction, item.id),
                removed,
            });
        }
        writes
    }

    // , "purchases" AS (SELECT "purchases".* FROM "purchases" UNION ALL SELECT * FROM "purchases_2")
    fn render_junctions(&self, result: &mut String) -> Result<()> {
        let writes = self.junction_writes();
        let mut junctions: Vec<&str> = Vec::new();
        for write in &writes {
            if !junctions.contains(&write.junction) {
                junctions.push(write.junction);
            }
        }

        for junction in junctions {
            if self.items.iter().any(|item| item.ti.name == junction) {
                return Err(Error::DuplicateMutation(junction.to_string()));
            }

            result.push_str(", ");
            to_sql::table(result, junction);
            result.push_str(" AS (SELECT ");
            to_sql::table(result, junction);
            result.push_str(".* FROM ");
            to_sql::table(result, junction);

            let mut first = true;
            for write in writes.iter().filter(|w| w.junction == junction && w.removed) {
                result.push_str(if first { " WHERE " } else { " AND " });
                first = false;
                result.push_str("NOT EXISTS (SELECT 1 FROM ");
                to_sql::table(result, &write.cte);
                result.push_str(" WHERE ((");
                to_sql::col_with_table(result, &write.cte, write.left_col);
                result.push_str(") = (");
                to_sql::col_with_table(result, junction, write.left_col);
                result.push_str(")) AND ((");
                to_sql::col_with_table(result, &write.cte, write.right_col);
                result.push_str(") = (");
                to_sql::col_with_table(result, junction, write.right_col);
                result.push_str(")))");
            }

            for write in writes.iter().filter(|w| w.junction == junction && !w.removed) {
                result.push_str(" UNION ALL SELECT * FROM ");
                to_sql::table(result, &write.cte);
            }
            result.push(')');
        }
        Ok(())
    }

    // SELECT * FROM "users" WHERE ... [LIMIT 1])
    fn render_link_select(&self, result: &mut String, item: &Item, single: bool) -> Result<()> {
        result.push_str("SELECT * FROM ");
        to_sql::table(result, &item.ti.name);
        result.push_str(" WHERE ");
        self.render_filter(result, item)?;
        if single {
            result.push_str(" LIMIT 1");
        }
        result.push(')');
        Ok(())
    }

    // "users" AS (SELECT * FROM "users_2" UNION ALL SELECT * FROM "users_3")
    fn render_union(&self, idx: usize, result: &mut String) {
        let item = &self.items[idx];
        to_sql::table(result, &item.ti.name);
        result.push_str(" AS (");
        for (i, child) in item.children.iter().enumerate() {
            if i != 0 {
                result.push_str(" UNION ALL ");
            }
            result.push_str("SELECT * FROM ");
            to_sql::table(result, &self.cte_name(*child));
        }
        result.push(')');
    }

    pub(crate) fn render_filter(&self, result: &mut String, item: &Item) -> Result<()> {
        match &item.filter {
            Some(exp) => {
                let ctx = self.compiler.filter_context(self.vars);
                filter::render_where(&ctx, result, exp, item.ti)
            }
            None => {
                result.push_str("true");
                Ok(())
            }
        }
    }

    /// The root selection's filter, required for updates and deletes.
    pub(crate) fn render_root_filter(
        &self,
        result: &mut String,
        ti: &TableInfo,
        operation: &'static str,
    ) -> Result<()> {
        let exp = self.root.filter.as_ref().ok_or_else(|| Error::MissingFilter {
            operation,
            table: ti.name.clone(),
        })?;
        let ctx = self.compiler.filter_context(self.vars);
        filter::render_where(&ctx, result, exp, ti)
    }

    /// Columns an insert or update writes, in table order.
    pub(crate) fn columns(&self, idx: usize) -> Vec<(&'a DbColumn, Source<'a>)> {
        let item = &self.items[idx];
        let ti: &'a TableInfo = item.ti;
        let related = self.related_sources(idx);
        let mut cols = Vec::new();

        for col in &ti.columns {
            if let Some((_, source)) = related.iter().find(|(name, _)| *name == col.name) {
                cols.push((col, source.clone()));
                continue;
            }
            if item.is_root() {
                if let Some(preset) = self.root.presets.iter().find(|p| p.col == col.name) {
                    cols.push((col, Source::Preset(&preset.value)));
                    continue;
                }
                if !self.root.is_allowed(&col.name) {
                    continue;
                }
            }
            if item.data.contains_key(&col.name) {
                cols.push((col, Source::Payload));
            }
        }

        cols
    }

    fn related_sources(&self, idx: usize) -> Vec<(&'a str, Source<'a>)> {
        let item = &self.items[idx];
        let writes_row = matches!(item.kind, ItemKind::Insert | ItemKind::Upsert);
        let mut related = Vec::new();

        if writes_row {
            if let (Some(rel), Some(parent)) = (item.rel, self.parent(idx)) {
                if rel.kind == RelKind::OneToMany {
                    related.push((
                        rel.left.col.as_str(),
                        Source::Related {
                            table: parent.ti.name.clone(),
                            col: rel.right.col.as_str(),
                        },
                    ));
                }
            }
        }

        for &child_idx in &item.children {
            let child = &self.items[child_idx];
            let rel = match child.rel {
                Some(rel) if rel.kind == RelKind::OneToOne => rel,
                _ => continue,
            };

            match child.kind {
                ItemKind::Insert if writes_row => related.push((
                    rel.right.col.as_str(),
                    Source::Related {
                        table: child.ti.name.clone(),
                        col: rel.left.col.as_str(),
                    },
                )),
                ItemKind::Union => {
                    let connect = child
                        .children
                        .iter()
                        .find(|link| self.items[**link].kind == ItemKind::Connect);
                    let source = match connect {
                        Some(link) => Source::Related {
                            table: self.cte_name(*link),
                            col: rel.left.col.as_str(),
                        },
                        None => Source::Null,
                    };
                    related.push((rel.right.col.as_str(), source));
                }
                _ => {}
            }
        }

        related
    }

    pub(crate) fn render_source(&self, result: &mut String, col: &DbColumn, source: &Source) {
        match source {
            Source::Payload => to_sql::col_with_table(result, "t", &col.name),
            Source::Preset(value) => match value.strip_prefix('$') {
                Some(name) => self
                    .compiler
                    .vars(self.vars)
                    .render(result, name, &col.column_type),
                None => to_sql::typed(result, value, &col.column_type),
            },
            Source::Related {
                table,
                col: related,
            } => to_sql::col_with_table(result, table, related),
            Source::Null => result.push_str("NULL"),
        }
    }

    /// `"_sg_input" i, "users", json_populate_record(NULL::"products", i.j->'product') t`
    pub(crate) fn render_input(
        &self,
        result: &mut String,
        idx: usize,
        cols: &[(&DbColumn, Source)],
    ) {
        let item = &self.items[idx];

        to_sql::table(result, INPUT_CTE);
        result.push_str(" i, ");

        let mut tables: Vec<&str> = Vec::new();
        for (_, source) in cols {
            if let Source::Related { table, .. } = source {
                if !tables.contains(&table.as_str()) {
                    tables.push(table);
                }
            }
        }
        for table in tables {
            to_sql::table(result, table);
            result.push_str(", ");
        }

        if item.array {
            result.push_str("json_populate_recordset(NULL::");
        } else {
            result.push_str("json_populate_record(NULL::");
        }
        to_sql::table(result, &item.ti.name);
        result.push_str(", i.j");
        for key in &item.path {
            result.push_str("->");
            to_sql::squoted(result, key);
        }
        result.push_str(") t");
    }
}

fn is_link_key(key: &str) -> bool {
    CONNECT_KEYS.contains(&key) || DISCONNECT_KEYS.contains(&key)
}

fn link_filter(compiler: &Compiler, ti: &TableInfo, value: &Value) -> Result<Exp> {
    match value {
        Value::Array(items) => {
            let mut exps = Vec::with_capacity(items.len());
            for item in items {
                exps.push(filter::from_json(compiler.schema(), ti, item)?);
            }
            if exps.len() == 1 {
                Ok(exps.remove(0))
            } else {
                Ok(Exp::Or(exps))
            }
        }
        other => filter::from_json(compiler.schema(), ti, other),
    }
}

fn writable(ti: &TableInfo) -> Result<()> {
    if ti.is_writable() {
        Ok(())
    } else {
        Err(Error::ReadOnlyTable(ti.name.clone()))
    }
}

fn remote_link(item: &Item, owner: &Item) -> Error {
    Error::UnsupportedRelationship {
        child: item.ti.name.clone(),
        parent: owner.ti.name.clone(),
        reason: "remote relationships cannot be linked",
    }
}
