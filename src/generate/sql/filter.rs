use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value;

use crate::ast::{Cond, Exp, Op, Val, Variables};
use crate::error::{Error, Result};
use crate::generate::sql::to_sql;
use crate::schema::{Schema, TableInfo};

const MAX_FILTER_DEPTH: usize = 32;

/// Variable values known at compile time. Static values from the config win
/// over request values; anything unknown stays a placeholder.
#[derive(Debug, Clone, Copy)]
pub struct Vars<'a> {
    statics: &'a HashMap<String, String>,
    request: &'a Variables,
}

impl<'a> Vars<'a> {
    pub fn new(statics: &'a HashMap<String, String>, request: &'a Variables) -> Self {
        Vars { statics, request }
    }

    pub fn bound(&self, name: &str) -> Option<Cow<'a, str>> {
        if let Some(value) = self.statics.get(name) {
            return Some(Cow::Borrowed(value.as_str()));
        }
        match self.request.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    /// `'value' :: type` when bound, `'{{name}}' :: type` otherwise.
    pub fn render(&self, result: &mut String, name: &str, col_type: &str) {
        match self.bound(name) {
            Some(value) => to_sql::typed(result, &value, col_type),
            None => to_sql::placeholder(result, name, col_type),
        }
    }

    /// Same as `render` but without a cast, for text-only positions.
    pub fn render_text(&self, result: &mut String, name: &str) {
        match self.bound(name) {
            Some(value) => to_sql::squoted(result, &value),
            None => {
                result.push_str("'{{");
                result.push_str(name);
                result.push_str("}}'");
            }
        }
    }
}

pub struct FilterContext<'a> {
    pub schema: &'a Schema,
    pub vars: Vars<'a>,
}

enum Item<'a> {
    Exp(&'a Exp),
    Text(&'static str),
}

/*
Renders a filter tree without recursion.

    { and: { not: { id: { is_null: true } }, price: { gt: 10 } } }

becomes

    ((("products"."price") > 10) AND NOT (("products"."id") IS NULL))

Children of AND/OR are put in a canonical order first, plain comparisons
sorted by column and then compound expressions, so the same filter renders
the same way whatever order its keys arrived in.

*/
pub fn render_where(
    ctx: &FilterContext,
    result: &mut String,
    exp: &Exp,
    ti: &TableInfo,
) -> Result<()> {
    let mut stack = vec![Item::Exp(exp)];

    while let Some(item) = stack.pop() {
        match item {
            Item::Text(text) => result.push_str(text),
            Item::Exp(Exp::And(children)) => push_group(&mut stack, children, " AND ", "true"),
            Item::Exp(Exp::Or(children)) => push_group(&mut stack, children, " OR ", "false"),
            Item::Exp(Exp::Not(inner)) => {
                stack.push(Item::Exp(inner));
                stack.push(Item::Text("NOT "));
            }
            Item::Exp(Exp::False) => result.push_str("false"),
            Item::Exp(Exp::Cond(cond)) => {
                if cond.path.is_empty() {
                    render_cond(ctx, result, cond, ti)?;
                } else {
                    render_nested(ctx, result, cond, ti)?;
                }
            }
        }
    }

    Ok(())
}

fn push_group<'a>(
    stack: &mut Vec<Item<'a>>,
    children: &'a [Exp],
    separator: &'static str,
    empty: &'static str,
) {
    if children.is_empty() {
        stack.push(Item::Text(empty));
        return;
    }

    let ordered = canonical_order(children);
    stack.push(Item::Text(")"));
    for (i, child) in ordered.into_iter().enumerate().rev() {
        stack.push(Item::Exp(child));
        if i != 0 {
            stack.push(Item::Text(separator));
        }
    }
    stack.push(Item::Text("("));
}

fn canonical_order(children: &[Exp]) -> Vec<&Exp> {
    let mut leaves: Vec<&Exp> = children.iter().filter(|exp| exp.is_leaf()).collect();
    leaves.sort_by(|a, b| match (a, b) {
        (Exp::Cond(a), Exp::Cond(b)) => (&a.path, &a.col).cmp(&(&b.path, &b.col)),
        _ => std::cmp::Ordering::Equal,
    });
    leaves.extend(children.iter().filter(|exp| !exp.is_leaf()));
    leaves
}

// EXISTS (SELECT 1 FROM "products" WHERE (("products"."user_id") = ("users"."id")) AND (...))
fn render_nested(
    ctx: &FilterContext,
    result: &mut String,
    cond: &Cond,
    ti: &TableInfo,
) -> Result<()> {
    let mut parent = ti;

    for (i, hop) in cond.path.iter().enumerate() {
        let rel = ctx.schema.get_rel(hop, &parent.name)?;
        if rel.is_remote() {
            return Err(Error::UnsupportedRelationship {
                child: hop.clone(),
                parent: parent.name.clone(),
                reason: "remote relationships cannot be filtered on",
            });
        }

        let child = ctx.schema.get_table(hop)?;
        if child.key == parent.key {
            return Err(Error::UnsupportedRelationship {
                child: hop.clone(),
                parent: parent.name.clone(),
                reason: "self-referencing relationships cannot be filtered on",
            });
        }

        if i != 0 {
            result.push_str(" AND ");
        }
        result.push_str("EXISTS (SELECT 1 FROM ");
        to_sql::table(result, &child.name);
        to_sql::through_join(result, rel, &parent.name);
        result.push_str(" WHERE ");
        to_sql::rel_condition(result, rel, &parent.name);
        parent = child;
    }

    result.push_str(" AND (");
    render_cond(ctx, result, cond, parent)?;
    result.push(')');
    for _ in &cond.path {
        result.push(')');
    }

    Ok(())
}

fn render_cond(
    ctx: &FilterContext,
    result: &mut String,
    cond: &Cond,
    ti: &TableInfo,
) -> Result<()> {
    match cond.op {
        Op::EqualsId => {
            let pk = ti.primary_col().ok_or_else(|| Error::MissingPrimaryKey {
                table: ti.name.clone(),
                field: cond.col.clone(),
            })?;
            result.push_str("((");
            to_sql::col_with_table(result, &ti.name, &pk.name);
            result.push_str(") = ");
            render_val(ctx, result, &cond.val, &pk.column_type, false)?;
            result.push(')');
        }
        Op::TsQuery => {
            let tsv = ti
                .tsv_col()
                .ok_or_else(|| Error::MissingSearchColumn(ti.name.clone()))?;
            result.push_str("((");
            to_sql::col_with_table(result, &ti.name, &tsv.name);
            result.push_str(") @@ ");
            result.push_str(ctx.schema.ts_query_fn());
            result.push('(');
            match &cond.val {
                Val::Var(name) => ctx.vars.render_text(result, name),
                Val::Str(text) => to_sql::squoted(result, text),
                other => {
                    return Err(Error::InvalidFilter(format!(
                        "full-text search expects text, found {:?}",
                        other
                    )))
                }
            }
            result.push_str("))");
        }
        Op::IsNull => {
            let col = ti.require_column(&cond.col)?;
            result.push_str("((");
            to_sql::col_with_table(result, &ti.name, &col.name);
            if matches!(cond.val, Val::Bool(false)) {
                result.push_str(") IS NOT NULL)");
            } else {
                result.push_str(") IS NULL)");
            }
        }
        op => {
            let col = ti.require_column(&cond.col)?;
            if matches!(&cond.val, Val::List(items) if items.is_empty()) {
                // Nothing is in an empty list.
                match op {
                    Op::In => result.push_str("false"),
                    Op::NotIn => result.push_str("true"),
                    _ => {
                        return Err(Error::InvalidFilter(format!(
                            "'{}' cannot be compared with an empty list",
                            col.name
                        )))
                    }
                }
                return Ok(());
            }
            result.push_str("((");
            to_sql::col_with_table(result, &ti.name, &col.name);
            result.push(')');
            result.push_str(operator(op));
            let as_array = matches!(op, Op::HasKeyAny | Op::HasKeyAll);
            if matches!(op, Op::In | Op::NotIn | Op::HasKeyAny | Op::HasKeyAll)
                && !matches!(cond.val, Val::List(_))
            {
                result.push('(');
                render_val(ctx, result, &cond.val, &col.column_type, as_array)?;
                result.push(')');
            } else {
                render_val(ctx, result, &cond.val, &col.column_type, as_array)?;
            }
            result.push(')');
        }
    }

    Ok(())
}

fn operator(op: Op) -> &'static str {
    match op {
        Op::Equals => " = ",
        Op::NotEquals => " != ",
        Op::GreaterThan => " > ",
        Op::GreaterOrEquals => " >= ",
        Op::LesserThan => " < ",
        Op::LesserOrEquals => " <= ",
        Op::In => " IN ",
        Op::NotIn => " NOT IN ",
        Op::Like => " LIKE ",
        Op::NotLike => " NOT LIKE ",
        Op::ILike => " ILIKE ",
        Op::NotILike => " NOT ILIKE ",
        Op::Similar => " SIMILAR TO ",
        Op::NotSimilar => " NOT SIMILAR TO ",
        Op::Contains => " @> ",
        Op::ContainedIn => " <@ ",
        Op::HasKey => " ? ",
        Op::HasKeyAny => " ?| ",
        Op::HasKeyAll => " ?& ",
        // Rendered by `render_cond` directly.
        Op::IsNull | Op::EqualsId | Op::TsQuery => "",
    }
}

fn render_val(
    ctx: &FilterContext,
    result: &mut String,
    val: &Val,
    col_type: &str,
    as_array: bool,
) -> Result<()> {
    match val {
        Val::Null => result.push_str("NULL"),
        Val::Bool(b) => result.push_str(if *b { "true" } else { "false" }),
        Val::Int(i) => result.push_str(&i.to_string()),
        Val::Float(f) => result.push_str(&f.to_string()),
        Val::Str(s) => to_sql::squoted(result, s),
        Val::Var(name) => ctx.vars.render(result, name, col_type),
        Val::List(items) => {
            result.push_str(if as_array { "array[" } else { "(" });
            for (i, item) in items.iter().enumerate() {
                if i != 0 {
                    result.push_str(", ");
                }
                match item {
                    Val::List(_) => {
                        return Err(Error::InvalidFilter(
                            "lists cannot be nested".to_string(),
                        ))
                    }
                    Val::Var(name) => ctx.vars.render(result, name, element_type(col_type)),
                    other => render_val(ctx, result, other, col_type, false)?,
                }
            }
            result.push(if as_array { ']' } else { ')' });
        }
    }
    Ok(())
}

fn element_type(col_type: &str) -> &str {
    col_type.strip_suffix("[]").unwrap_or(col_type)
}

/*
Builds a filter from a JSON object, as found in the `where`, `connect` and
`disconnect` keys of a mutation payload.

    { "id": 5 }                          equality
    { "price": { "gt": 10, "lt": 20 } }  explicit operators
    { "or": [{ "id": 1 }, { "id": 2 }] } combinators
    { "user": { "id": "$user_id" } }     condition on a related table

Strings starting with `$` are variable references.

*/
pub fn from_json(schema: &Schema, ti: &TableInfo, value: &Value) -> Result<Exp> {
    parse_object(schema, ti, &[], value, 0)
}

fn parse_object(
    schema: &Schema,
    ti: &TableInfo,
    path: &[String],
    value: &Value,
    depth: usize,
) -> Result<Exp> {
    if depth > MAX_FILTER_DEPTH {
        return Err(Error::InvalidFilter("filter is nested too deeply".to_string()));
    }
    let fields = value
        .as_object()
        .ok_or_else(|| Error::InvalidFilter(format!("expected an object, found {}", value)))?;

    let mut exps = Vec::with_capacity(fields.len());
    for (key, val) in fields {
        exps.push(parse_entry(schema, ti, path, key, val, depth)?);
    }
    combine(exps, Exp::And)
}

fn parse_entry(
    schema: &Schema,
    ti: &TableInfo,
    path: &[String],
    key: &str,
    val: &Value,
    depth: usize,
) -> Result<Exp> {
    match key {
        "and" | "or" => {
            let mut exps = Vec::new();
            match val {
                Value::Array(items) => {
                    for item in items {
                        exps.push(parse_object(schema, ti, path, item, depth + 1)?);
                    }
                }
                Value::Object(fields) => {
                    for (k, v) in fields {
                        exps.push(parse_entry(schema, ti, path, k, v, depth + 1)?);
                    }
                }
                _ => {
                    return Err(Error::InvalidFilter(format!(
                        "'{}' expects an object or a list",
                        key
                    )))
                }
            }
            if key == "and" {
                combine(exps, Exp::And)
            } else {
                combine(exps, Exp::Or)
            }
        }
        "not" => Ok(Exp::not(parse_object(schema, ti, path, val, depth + 1)?)),
        col if ti.column(col).is_some() => parse_column(path, col, val),
        related => {
            let child = schema.get_table(related).map_err(|_| Error::UnknownColumn {
                table: ti.name.clone(),
                column: related.to_string(),
            })?;
            let mut nested = path.to_vec();
            nested.push(related.to_string());
            parse_object(schema, child, &nested, val, depth + 1)
        }
    }
}

fn parse_column(path: &[String], col: &str, val: &Value) -> Result<Exp> {
    let cond = |op: Op, val: Val| {
        Exp::Cond(Cond {
            path: path.to_vec(),
            col: col.to_string(),
            op,
            val,
        })
    };

    match val {
        Value::Object(ops) => {
            let mut exps = Vec::with_capacity(ops.len());
            for (code, operand) in ops {
                exps.push(cond(code.parse()?, to_val(operand)));
            }
            combine(exps, Exp::And)
        }
        Value::Null => Ok(cond(Op::IsNull, Val::Bool(true))),
        Value::Array(_) => Ok(cond(Op::In, to_val(val))),
        scalar => Ok(cond(Op::Equals, to_val(scalar))),
    }
}

fn combine(mut exps: Vec<Exp>, group: fn(Vec<Exp>) -> Exp) -> Result<Exp> {
    match exps.len() {
        0 => Err(Error::InvalidFilter("empty filter".to_string())),
        1 => Ok(exps.remove(0)),
        _ => Ok(group(exps)),
    }
}

fn to_val(value: &Value) -> Val {
    match value {
        Value::Null => Val::Null,
        Value::Bool(b) => Val::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Val::Int(i),
            None => Val::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => match s.strip_prefix('$') {
            Some(name) if !name.is_empty() => Val::Var(name.to_string()),
            _ => Val::Str(s.clone()),
        },
        Value::Array(items) => Val::List(items.iter().map(to_val).collect()),
        Value::Object(_) => Val::Str(value.to_string()),
    }
}
