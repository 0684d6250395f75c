use crate::ext::string;
use crate::schema::{Rel, RelColumn};

pub fn table(result: &mut String, name: &str) {
    result.push('"');
    result.push_str(name);
    result.push('"');
}

/// `"products_0"`
pub fn table_with_id(result: &mut String, name: &str, id: usize) {
    result.push('"');
    result.push_str(name);
    result.push('_');
    result.push_str(&id.to_string());
    result.push('"');
}

/// `"products"."price"`
pub fn col_with_table(result: &mut String, table: &str, col: &str) {
    result.push('"');
    result.push_str(table);
    result.push_str("\".\"");
    result.push_str(col);
    result.push('"');
}

/// `"products_0"."price"`
pub fn col_with_table_id(result: &mut String, table: &str, id: usize, col: &str) {
    table_with_id(result, table, id);
    result.push_str(".\"");
    result.push_str(col);
    result.push('"');
}

pub fn alias(result: &mut String, name: &str) {
    result.push_str(" AS \"");
    result.push_str(name);
    result.push('"');
}

pub fn alias_with_id(result: &mut String, name: &str, id: usize) {
    result.push_str(" AS ");
    table_with_id(result, name, id);
}

pub fn squoted(result: &mut String, value: &str) {
    result.push_str(&string::single_quote(value));
}

/// `'value' :: type`
pub fn typed(result: &mut String, value: &str, col_type: &str) {
    squoted(result, value);
    result.push_str(" :: ");
    result.push_str(col_type);
}

/// `'{{name}}' :: type`, filled in by the bind step after compilation.
pub fn placeholder(result: &mut String, name: &str, col_type: &str) {
    result.push_str("'{{");
    result.push_str(name);
    result.push_str("}}' :: ");
    result.push_str(col_type);
}

/// `('20') :: integer`
pub fn integer(result: &mut String, value: &str) {
    result.push('(');
    squoted(result, value);
    result.push_str(") :: integer");
}

/*
Correlates a child row with its parent row.

    direct      (("users"."id") = ("products_0"."user_id"))
    array       (("tags"."slug") = any ("products_0"."tags"))
    through     (("customers"."id") = ("purchases"."customer_id"))

For a through relationship the junction table must already be joined, see
`through_join`. `parent` is the name the parent row is visible under, an
aliased row source in queries or a table/CTE name in filters and mutations.

*/
pub fn rel_condition(result: &mut String, rel: &Rel, parent: &str) {
    match rel.through() {
        Some((junction, left_col, _)) => {
            let junction_col = RelColumn {
                table: junction.to_string(),
                col: left_col.to_string(),
                array: false,
            };
            compare(result, &rel.left, &rel.left.table, &junction_col, junction);
        }
        None => compare(result, &rel.left, &rel.left.table, &rel.right, parent),
    }
}

/// ` LEFT OUTER JOIN "purchases" ON (("purchases"."product_id") = ("products_0"."id"))`
pub fn through_join(result: &mut String, rel: &Rel, parent: &str) {
    if let Some((junction, _, right_col)) = rel.through() {
        let junction_col = RelColumn {
            table: junction.to_string(),
            col: right_col.to_string(),
            array: false,
        };
        result.push_str(" LEFT OUTER JOIN ");
        table(result, junction);
        result.push_str(" ON ");
        compare(result, &junction_col, junction, &rel.right, parent);
    }
}

fn compare(
    result: &mut String,
    left: &RelColumn,
    left_table: &str,
    right: &RelColumn,
    right_table: &str,
) {
    result.push_str("((");
    if !left.array && right.array {
        col_with_table(result, left_table, &left.col);
        result.push_str(") = any (");
        col_with_table(result, right_table, &right.col);
    } else if left.array && !right.array {
        col_with_table(result, right_table, &right.col);
        result.push_str(") = any (");
        col_with_table(result, left_table, &left.col);
    } else {
        col_with_table(result, left_table, &left.col);
        result.push_str(") = (");
        col_with_table(result, right_table, &right.col);
    }
    result.push_str("))");
}
