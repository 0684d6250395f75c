use crate::error::Result;
use crate::generate::sql::mutate::Mutation;
use crate::generate::sql::to_sql;
use crate::schema::TableInfo;

// "products" AS (DELETE FROM "products" WHERE (("products"."id") = '1' :: bigint) RETURNING *)
pub(crate) fn render(m: &Mutation, ti: &TableInfo, result: &mut String) -> Result<()> {
    to_sql::table(result, &ti.name);
    result.push_str(" AS (DELETE FROM ");
    to_sql::table(result, &ti.name);
    result.push_str(" WHERE ");
    m.render_root_filter(result, ti, "delete")?;
    result.push_str(" RETURNING *)");
    Ok(())
}
