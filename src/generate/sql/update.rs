use crate::error::Result;
use crate::generate::sql::mutate::{Item, Mutation};
use crate::generate::sql::to_sql;
use crate::schema::Rel;

/*
    "users" AS (UPDATE "users" SET ("full_name") =
        (SELECT "t"."full_name" FROM "_sg_input" i, json_populate_record(NULL::"users", i.j) t)
        WHERE (("users"."id") = '5' :: bigint)
        RETURNING "users".*)

The root update is scoped by the selection's filter. A nested update is
scoped to the rows related to its parent CTE, narrowed by its own `where`.
An update with nothing to write still selects its rows so the read can see
them.

*/
pub(crate) fn render(m: &Mutation, idx: usize, result: &mut String) -> Result<()> {
    let item = &m.items[idx];
    let ti = item.ti;
    let cols = m.columns(idx);

    to_sql::table(result, &ti.name);

    if cols.is_empty() {
        tracing::debug!(table = %ti.name, "nothing to update, selecting rows");
        result.push_str(" AS (SELECT ");
        to_sql::table(result, &ti.name);
        result.push_str(".* FROM ");
        to_sql::table(result, &ti.name);
        match scope(m, idx) {
            Some((rel, parent)) => {
                result.push_str(", ");
                render_scope(m, result, item, rel, parent)?;
            }
            None => {
                result.push_str(" WHERE ");
                m.render_root_filter(result, ti, "update")?;
            }
        }
        result.push(')');
        return Ok(());
    }

    result.push_str(" AS (UPDATE ");
    to_sql::table(result, &ti.name);
    result.push_str(" SET (");
    for (i, (col, _)) in cols.iter().enumerate() {
        if i != 0 {
            result.push_str(", ");
        }
        to_sql::table(result, &col.name);
    }
    result.push_str(") = (SELECT ");
    for (i, (col, source)) in cols.iter().enumerate() {
        if i != 0 {
            result.push_str(", ");
        }
        m.render_source(result, col, source);
    }
    result.push_str(" FROM ");
    m.render_input(result, idx, &cols);
    result.push(')');

    match scope(m, idx) {
        Some((rel, parent)) => {
            result.push_str(" FROM ");
            render_scope(m, result, item, rel, parent)?;
        }
        None => {
            result.push_str(" WHERE ");
            m.render_root_filter(result, ti, "update")?;
        }
    }

    result.push_str(" RETURNING ");
    to_sql::table(result, &ti.name);
    result.push_str(".*)");
    Ok(())
}

fn scope<'m>(m: &'m Mutation, idx: usize) -> Option<(&'m Rel, &'m str)> {
    let rel = m.items[idx].rel?;
    let parent = m.parent(idx)?;
    Some((rel, parent.ti.name.as_str()))
}

// "products" WHERE (("users"."id") = ("products"."user_id")) AND (...)
fn render_scope(
    m: &Mutation,
    result: &mut String,
    item: &Item,
    rel: &Rel,
    parent: &str,
) -> Result<()> {
    match rel.through() {
        Some((junction, _, right_col)) => {
            to_sql::table(result, junction);
            result.push_str(", ");
            to_sql::table(result, parent);
            result.push_str(" WHERE ");
            to_sql::rel_condition(result, rel, parent);
            result.push_str(" AND ((");
            to_sql::col_with_table(result, junction, right_col);
            result.push_str(") = (");
            to_sql::col_with_table(result, parent, &rel.right.col);
            result.push_str("))");
        }
        None => {
            to_sql::table(result, parent);
            result.push_str(" WHERE ");
            to_sql::rel_condition(result, rel, parent);
        }
    }

    if item.filter.is_some() {
        result.push_str(" AND ");
        m.render_filter(result, item)?;
    }
    Ok(())
}
