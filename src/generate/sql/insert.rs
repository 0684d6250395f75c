use crate::ast::Exp;
use crate::db::introspect::DbColumn;
use crate::error::{Error, Result};
use crate::generate::sql::mutate::{ItemKind, Mutation, Source};
use crate::generate::sql::to_sql;
use crate::schema::RelKind;

/*
    "users" AS (INSERT INTO "users" ("full_name", "email")
        SELECT "t"."full_name", "t"."email"
        FROM "_sg_input" i, json_populate_record(NULL::"users", i.j) t
        RETURNING *)

An array payload uses `json_populate_recordset` and inserts one row per
element. An upsert adds

    ON CONFLICT ("email") DO UPDATE SET "full_name" = EXCLUDED."full_name"

targeting the unique columns present in the payload, else the primary key.

*/
pub(crate) fn render(m: &Mutation, idx: usize, result: &mut String) -> Result<()> {
    let item = &m.items[idx];
    let ti = item.ti;
    let cols = m.columns(idx);

    if cols.is_empty() {
        return Err(Error::InvalidPayload(format!(
            "nothing to insert into '{}'",
            ti.name
        )));
    }

    to_sql::table(result, &ti.name);
    result.push_str(" AS (INSERT INTO ");
    to_sql::table(result, &ti.name);
    result.push_str(" (");
    for (i, (col, _)) in cols.iter().enumerate() {
        if i != 0 {
            result.push_str(", ");
        }
        to_sql::table(result, &col.name);
    }
    result.push_str(") SELECT ");
    for (i, (col, source)) in cols.iter().enumerate() {
        if i != 0 {
            result.push_str(", ");
        }
        m.render_source(result, col, source);
    }
    result.push_str(" FROM ");
    m.render_input(result, idx, &cols);

    if item.is_root() {
        // A false filter blocks the insert but keeps the statement valid.
        if let Some(Exp::False) = &m.root.filter {
            result.push_str(" WHERE false");
        }
        if item.kind == ItemKind::Upsert {
            render_conflict(m, result, &cols)?;
        }
    }
    result.push_str(" RETURNING *)");

    render_junction(m, idx, result);
    Ok(())
}

fn render_conflict(m: &Mutation, result: &mut String, cols: &[(&DbColumn, Source)]) -> Result<()> {
    let ti = m.items[0].ti;

    let mut targets: Vec<&DbColumn> = cols
        .iter()
        .filter(|(col, source)| {
            matches!(source, Source::Payload) && (col.unique_key || col.primary_key)
        })
        .map(|(col, _)| *col)
        .collect();

    if targets.is_empty() {
        let pk = ti.primary_col().ok_or_else(|| Error::MissingPrimaryKey {
            table: ti.name.clone(),
            field: m.root.field_name.clone(),
        })?;
        targets.push(pk);
    }

    result.push_str(" ON CONFLICT (");
    for (i, col) in targets.iter().enumerate() {
        if i != 0 {
            result.push_str(", ");
        }
        to_sql::table(result, &col.name);
    }
    result.push(')');

    if let Some(exp) = &m.root.filter {
        if *exp != Exp::False {
            result.push_str(" WHERE ");
            m.render_root_filter(result, ti, "upsert")?;
        }
    }

    let updates: Vec<&DbColumn> = cols
        .iter()
        .map(|(col, _)| *col)
        .filter(|col| !targets.iter().any(|target| target.name == col.name))
        .collect();

    if updates.is_empty() {
        result.push_str(" DO NOTHING");
        return Ok(());
    }

    result.push_str(" DO UPDATE SET ");
    for (i, col) in updates.iter().enumerate() {
        if i != 0 {
            result.push_str(", ");
        }
        to_sql::table(result, &col.name);
        result.push_str(" = EXCLUDED.");
        to_sql::table(result, &col.name);
    }
    Ok(())
}

// , "purchases_2" AS (INSERT INTO "purchases" ("product_id", "customer_id")
//       SELECT "products"."id", "customers"."id" FROM "products", "customers" RETURNING *)
fn render_junction(m: &Mutation, idx: usize, result: &mut String) {
    let item = &m.items[idx];
    let (rel, parent) = match (item.rel, m.parent(idx)) {
        (Some(rel), Some(parent)) => (rel, parent),
        _ => return,
    };
    let (junction, left_col, right_col) = match &rel.kind {
        RelKind::Through {
            table,
            left_col,
            right_col,
        } => (table, left_col, right_col),
        _ => return,
    };

    result.push_str(", ");
    to_sql::table_with_id(result, junction, item.id);
    result.push_str(" AS (INSERT INTO ");
    to_sql::table(result, junction);
    result.push_str(" (");
    to_sql::table(result, right_col);
    result.push_str(", ");
    to_sql::table(result, left_col);
    result.push_str(") SELECT ");
    to_sql::col_with_table(result, &parent.ti.name, &rel.right.col);
    result.push_str(", ");
    to_sql::col_with_table(result, &item.ti.name, &rel.left.col);
    result.push_str(" FROM ");
    to_sql::table(result, &parent.ti.name);
    result.push_str(", ");
    to_sql::table(result, &item.ti.name);
    result.push_str(" RETURNING *)");
}
