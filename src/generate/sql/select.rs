use std::borrow::Cow;

use crate::ast::{self, Order, PagingKind, QCode, Select, Variables};
use crate::db::introspect::DbColumn;
use crate::error::{Error, Result};
use crate::generate::sql::columns::{self, ColumnKind};
use crate::generate::sql::filter;
use crate::generate::sql::to_sql;
use crate::generate::sql::{Compiler, SkipMask};
use crate::schema::{Rel, TableInfo};

/*
Every selection turns into a row source that yields its JSON.

    query {
        products(where: { price: { gt: 10 } }) {
            id
            name
            user { email }
        }
    }

becomes

    SELECT json_object_agg('products', "json_0") FROM (
        SELECT coalesce(json_agg("json_0"), '[]') AS "json_0" FROM (
            SELECT row_to_json((SELECT "json_row_0" FROM (
                SELECT "products_0"."id" AS "id", "products_0"."name" AS "name",
                       "user_1_join"."json_1" AS "user"
            ) AS "json_row_0")) AS "json_0"
            FROM (
                SELECT "products"."id", "products"."name", "products"."user_id"
                FROM "products"
                WHERE (("products"."price") > 10)
                LIMIT ('20') :: integer
            ) AS "products_0"
            LEFT OUTER JOIN LATERAL (
                SELECT row_to_json((SELECT "json_row_1" FROM (
                    SELECT "users_1"."email" AS "email"
                ) AS "json_row_1")) AS "json_1"
                FROM (
                    SELECT "users"."email" FROM "users"
                    WHERE (("users"."id") = ("products_0"."user_id"))
                    LIMIT ('1') :: integer
                ) AS "users_1"
            ) AS "user_1_join" ON ('true')
        ) AS "json_agg_0"
    ) AS "sel_0"

(whitespace added). Children are lateral joins placed right after their
parent's base row source, so the whole tree is emitted in one pass driven by
an explicit stack of open/close frames.

With more than one root, or a root using cursor pagination, the roots are
collected into a single row instead:

    SELECT row_to_json("json_root") FROM (
        SELECT "sel_0"."json_0" AS "tags", "sel_2"."json_2" AS "product"
        FROM (...) AS "sel_0", (...) AS "sel_2"
    ) AS "json_root"

A cursor page is cut on the primary key, so under cursor paging the key
alone orders the rows and `order_by` is ignored.

*/

enum Frame {
    Open(usize),
    Close(usize),
}

struct Plan<'a> {
    cols: Vec<(&'a ast::Column, ColumnKind<'a>)>,
    joined: Vec<&'a Select>,
    remotes: Vec<&'a Rel>,
    /// Columns the base row source needs beyond the requested ones.
    extra: Vec<&'a str>,
    distinct: Vec<&'a str>,
    orders: Vec<(&'a str, Order)>,
    cursor: Option<&'a DbColumn>,
    grouped: bool,
}

struct Parent<'a> {
    alias: String,
    rel: &'a Rel,
}

pub(crate) struct QueryCompiler<'a> {
    compiler: &'a Compiler,
    qc: &'a QCode,
    vars: &'a Variables,
    /// A mutation root: its filter and paging were applied by the mutation.
    absorbed: Option<usize>,
}

impl<'a> QueryCompiler<'a> {
    pub(crate) fn new(
        compiler: &'a Compiler,
        qc: &'a QCode,
        vars: &'a Variables,
        absorbed: Option<usize>,
    ) -> Self {
        QueryCompiler {
            compiler,
            qc,
            vars,
            absorbed,
        }
    }

    pub(crate) fn compile(&self, result: &mut String) -> Result<SkipMask> {
        let roots = &self.qc.roots;
        if roots.is_empty() {
            return Err(Error::EmptyQuery);
        }
        for (position, sel) in self.qc.selects.iter().enumerate() {
            if sel.id != position {
                return Err(Error::InvalidSelectionId {
                    position,
                    id: sel.id,
                });
            }
        }

        let mut multi = roots.len() > 1;
        for &id in roots {
            multi |= self.has_cursor(self.select(id)?);
        }

        if multi {
            result.push_str("SELECT row_to_json(\"json_root\") FROM (SELECT ");
            for (i, &id) in roots.iter().enumerate() {
                let sel = self.select(id)?;
                if i != 0 {
                    result.push_str(", ");
                }
                to_sql::col_with_table_id(result, "sel", id, &format!("json_{}", id));
                to_sql::alias(result, &sel.field_name);
                if self.has_cursor(sel) {
                    result.push_str(", ");
                    to_sql::col_with_table_id(result, "sel", id, &format!("__cursor_{}", id));
                    to_sql::alias(result, &format!("{}_cursor", sel.field_name));
                }
            }
            result.push_str(" FROM ");
        } else {
            let sel = self.select(roots[0])?;
            result.push_str("SELECT json_object_agg(");
            to_sql::squoted(result, &sel.field_name);
            result.push_str(", \"json_");
            result.push_str(&sel.id.to_string());
            result.push_str("\") FROM ");
        }

        let mut skipped = SkipMask::default();
        let mut rendered_roots = 0;
        let mut stack: Vec<Frame> = roots.iter().rev().map(|id| Frame::Open(*id)).collect();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Open(id) => {
                    let sel = self.select(id)?;
                    let ti = self.compiler.schema().get_table(&sel.table)?;
                    let parent = self.parent(sel)?;

                    match parent {
                        Some(_) => result.push_str(" LEFT OUTER JOIN LATERAL ("),
                        None => result.push('('),
                    }

                    let plan = self.plan(sel, ti, &mut skipped)?;
                    self.render_node(result, sel, ti, parent.as_ref(), &plan)?;

                    stack.push(Frame::Close(id));
                    for child in plan.joined.iter().rev() {
                        stack.push(Frame::Open(child.id));
                    }
                }
                Frame::Close(id) => {
                    let sel = self.select(id)?;
                    if !sel.singular {
                        result.push(')');
                        to_sql::alias_with_id(result, "json_agg", id);
                    }
                    match sel.parent_id {
                        Some(_) => {
                            result.push(')');
                            to_sql::alias(result, &join_alias(sel));
                            result.push_str(" ON ('true')");
                        }
                        None => {
                            result.push(')');
                            to_sql::alias_with_id(result, "sel", id);
                            rendered_roots += 1;
                            if rendered_roots < roots.len() {
                                result.push_str(", ");
                            }
                        }
                    }
                }
            }
        }

        if multi {
            result.push_str(") AS \"json_root\"");
        }

        Ok(skipped)
    }

    fn select(&self, id: usize) -> Result<&'a Select> {
        self.qc.selects.get(id).ok_or(Error::UnknownSelection(id))
    }

    fn is_absorbed(&self, id: usize) -> bool {
        self.absorbed == Some(id)
    }

    fn has_cursor(&self, sel: &Select) -> bool {
        sel.paging.is_cursor() && !self.is_absorbed(sel.id)
    }

    fn parent(&self, sel: &'a Select) -> Result<Option<Parent<'a>>> {
        let parent_id = match sel.parent_id {
            Some(id) => id,
            None => return Ok(None),
        };
        let schema = self.compiler.schema();
        let parent = self.select(parent_id)?;
        let parent_ti = schema.get_table(&parent.table)?;
        let rel = schema.get_rel(&sel.table, &parent.table)?;

        Ok(Some(Parent {
            alias: format!("{}_{}", parent_ti.name, parent_id),
            rel,
        }))
    }

    fn plan(
        &self,
        sel: &'a Select,
        ti: &'a TableInfo,
        skipped: &mut SkipMask,
    ) -> Result<Plan<'a>> {
        let schema = self.compiler.schema();
        let mut plan = Plan {
            cols: Vec::with_capacity(sel.cols.len()),
            joined: Vec::new(),
            remotes: Vec::new(),
            extra: Vec::new(),
            distinct: Vec::new(),
            orders: Vec::new(),
            cursor: None,
            grouped: false,
        };

        for col in &sel.cols {
            match columns::classify(sel, col, ti) {
                Some(kind) => {
                    if kind == ColumnKind::Undefined {
                        tracing::debug!(table = %ti.name, column = %col.name, "column not defined");
                    }
                    plan.grouped |= kind.is_aggregate();
                    plan.cols.push((col, kind));
                }
                None => {
                    tracing::trace!(table = %ti.name, column = %col.name, "column not allowed");
                }
            }
        }

        for &child_id in &sel.children {
            let child = self.select(child_id)?;
            let rel = schema.get_rel(&child.table, &sel.table)?;

            if rel.is_remote() {
                skipped.set(child_id)?;
                tracing::debug!(field = %child.field_name, id = child_id, "skipping remote selection");
                plan.extra.push(&rel.left.col);
                plan.remotes.push(rel);
            } else {
                plan.extra.push(&rel.right.col);
                plan.joined.push(child);
            }
        }

        for col in &sel.distinct_on {
            let real = ti.require_column(col)?;
            plan.distinct.push(&real.name);
            plan.extra.push(&real.name);
        }

        for ob in &sel.order_by {
            let real = ti.require_column(&ob.col)?;
            plan.orders.push((&real.name, ob.order));
            plan.extra.push(&real.name);
        }

        if self.has_cursor(sel) {
            let pk = ti.primary_col().ok_or_else(|| Error::MissingPrimaryKey {
                table: ti.name.clone(),
                field: sel.field_name.clone(),
            })?;
            // Pages are cut on the primary key, so it alone orders the rows.
            if !plan.orders.is_empty() {
                tracing::debug!(field = %sel.field_name, "cursor paging ignores order_by");
                plan.orders.clear();
            }
            let order = match sel.paging.kind {
                PagingKind::Backward => Order::Desc,
                _ => Order::Asc,
            };
            plan.orders.push((&pk.name, order));
            plan.extra.push(&pk.name);
            plan.cursor = Some(pk);
        }

        Ok(plan)
    }

    fn render_node(
        &self,
        result: &mut String,
        sel: &Select,
        ti: &TableInfo,
        parent: Option<&Parent>,
        plan: &Plan,
    ) -> Result<()> {
        let id = sel.id;
        let table = ti.name.as_str();

        if !sel.singular {
            result.push_str("SELECT coalesce(json_agg(\"json_");
            result.push_str(&id.to_string());
            result.push('"');
            if !plan.orders.is_empty() {
                result.push_str(" ORDER BY ");
                for (i, (col, order)) in plan.orders.iter().enumerate() {
                    if i != 0 {
                        result.push_str(", ");
                    }
                    result.push('"');
                    result.push_str(&order_alias(table, id, col));
                    result.push_str("\" ");
                    result.push_str(order.to_sql());
                }
            }
            result.push_str("), '[]')");
            to_sql::alias_with_id(result, "json", id);

            if plan.cursor.is_some() {
                result.push_str(match sel.paging.kind {
                    PagingKind::Backward => ", min(",
                    _ => ", max(",
                });
                to_sql::table_with_id(result, "__cur", id);
                result.push(')');
                to_sql::alias_with_id(result, "__cursor", id);
            }
            result.push_str(" FROM (");
        }

        result.push_str("SELECT row_to_json((SELECT ");
        to_sql::table_with_id(result, "json_row", id);
        result.push_str(" FROM (SELECT ");
        self.render_json_cols(result, sel, table, plan);
        result.push(')');
        to_sql::alias_with_id(result, "json_row", id);
        result.push_str("))");
        to_sql::alias_with_id(result, "json", id);

        if !sel.singular {
            for (col, _) in &plan.orders {
                result.push_str(", ");
                to_sql::col_with_table_id(result, table, id, col);
                to_sql::alias(result, &order_alias(table, id, col));
            }
        }
        if let Some(pk) = plan.cursor {
            result.push_str(", ");
            to_sql::col_with_table_id(result, table, id, &pk.name);
            if sel.singular {
                to_sql::alias_with_id(result, "__cursor", id);
            } else {
                to_sql::alias_with_id(result, "__cur", id);
            }
        }

        result.push_str(" FROM (");
        self.render_base(result, sel, ti, parent, plan)?;
        result.push(')');
        to_sql::alias_with_id(result, table, id);

        Ok(())
    }

    fn render_json_cols(&self, result: &mut String, sel: &Select, table: &str, plan: &Plan) {
        let id = sel.id;
        let mut first = true;
        let mut separate = |result: &mut String| {
            if !first {
                result.push_str(", ");
            }
            first = false;
        };

        for (col, kind) in &plan.cols {
            separate(result);
            let source = match kind {
                ColumnKind::Plain(real) => real.name.as_str(),
                _ => col.name.as_str(),
            };
            to_sql::col_with_table_id(result, table, id, source);
            to_sql::alias(result, &col.field_name);
        }

        for rel in &plan.remotes {
            separate(result);
            to_sql::col_with_table_id(result, table, id, &rel.left.col);
            to_sql::alias(result, &rel.right.col);
        }

        for child in &plan.joined {
            separate(result);
            let join = join_alias(child);
            to_sql::col_with_table(result, &join, &format!("json_{}", child.id));
            to_sql::alias(result, &child.field_name);

            if self.has_cursor(child) {
                result.push_str(", ");
                to_sql::col_with_table(result, &join, &format!("__cursor_{}", child.id));
                to_sql::alias(result, &format!("{}_cursor", child.field_name));
            }
        }
    }

    fn render_base(
        &self,
        result: &mut String,
        sel: &Select,
        ti: &TableInfo,
        parent: Option<&Parent>,
        plan: &Plan,
    ) -> Result<()> {
        let table = ti.name.as_str();
        let mut emitted: Vec<&str> = Vec::with_capacity(plan.cols.len() + plan.extra.len());
        let mut grouping: Vec<&str> = Vec::new();

        result.push_str("SELECT ");
        if !plan.distinct.is_empty() {
            result.push_str("DISTINCT ON (");
            for (i, col) in plan.distinct.iter().enumerate() {
                if i != 0 {
                    result.push_str(", ");
                }
                to_sql::col_with_table(result, table, col);
            }
            result.push_str(") ");
        }

        for (col, kind) in &plan.cols {
            let name = match kind {
                ColumnKind::Plain(real) => real.name.as_str(),
                _ => col.name.as_str(),
            };
            if emitted.contains(&name) {
                continue;
            }
            if !emitted.is_empty() {
                result.push_str(", ");
            }
            emitted.push(name);

            match kind {
                ColumnKind::Plain(real) => {
                    to_sql::col_with_table(result, table, &real.name);
                    if !grouping.contains(&real.name.as_str()) {
                        grouping.push(&real.name);
                    }
                }
                ColumnKind::Aggregate(func, real) => {
                    result.push_str(func.sql_name());
                    result.push('(');
                    to_sql::col_with_table(result, table, &real.name);
                    result.push(')');
                    to_sql::alias(result, name);
                }
                ColumnKind::SearchRank(tsv) => {
                    result.push_str("ts_rank(");
                    to_sql::col_with_table(result, table, &tsv.name);
                    result.push_str(", ");
                    self.render_tsquery(result, sel);
                    result.push(')');
                    to_sql::alias(result, name);
                    if !grouping.contains(&tsv.name.as_str()) {
                        grouping.push(&tsv.name);
                    }
                }
                ColumnKind::SearchHeadline(real) => {
                    result.push_str("ts_headline(");
                    to_sql::col_with_table(result, table, &real.name);
                    result.push_str(", ");
                    self.render_tsquery(result, sel);
                    result.push(')');
                    to_sql::alias(result, name);
                    if !grouping.contains(&real.name.as_str()) {
                        grouping.push(&real.name);
                    }
                }
                ColumnKind::Undefined => {
                    to_sql::squoted(result, &format!("{} not defined", name));
                    to_sql::alias(result, name);
                }
            }
        }

        for col in &plan.extra {
            if emitted.contains(col) {
                continue;
            }
            if !emitted.is_empty() {
                result.push_str(", ");
            }
            emitted.push(*col);
            if !grouping.contains(col) {
                grouping.push(*col);
            }
            to_sql::col_with_table(result, table, col);
        }

        result.push_str(" FROM ");
        to_sql::table(result, table);
        if let Some(parent) = parent {
            to_sql::through_join(result, parent.rel, &parent.alias);
        }

        self.render_where(result, sel, ti, parent, plan)?;

        if plan.grouped && !grouping.is_empty() {
            result.push_str(" GROUP BY ");
            for (i, col) in grouping.iter().enumerate() {
                if i != 0 {
                    result.push_str(", ");
                }
                to_sql::col_with_table(result, table, col);
            }
        }

        self.render_order_by(result, table, plan);
        self.render_paging(result, sel);

        Ok(())
    }

    fn render_where(
        &self,
        result: &mut String,
        sel: &Select,
        ti: &TableInfo,
        parent: Option<&Parent>,
        plan: &Plan,
    ) -> Result<()> {
        let mut parts: Vec<String> = Vec::new();

        if let Some(parent) = parent {
            let mut part = String::new();
            to_sql::rel_condition(&mut part, parent.rel, &parent.alias);
            parts.push(part);
        }

        if !self.is_absorbed(sel.id) {
            if let Some(exp) = &sel.filter {
                let mut part = String::new();
                let ctx = self.compiler.filter_context(self.vars);
                filter::render_where(&ctx, &mut part, exp, ti)?;
                parts.push(part);
            }

            if let (Some(pk), Some(cursor)) = (plan.cursor, &sel.paging.cursor) {
                let mut part = String::from("((");
                to_sql::col_with_table(&mut part, &ti.name, &pk.name);
                part.push_str(match sel.paging.kind {
                    PagingKind::Backward => ") < ",
                    _ => ") > ",
                });
                match cursor.strip_prefix('$') {
                    Some(name) => self
                        .compiler
                        .vars(self.vars)
                        .render(&mut part, name, &pk.column_type),
                    None => to_sql::typed(&mut part, cursor, &pk.column_type),
                }
                part.push(')');
                parts.push(part);
            }
        }

        match parts.len() {
            0 => {}
            1 => {
                result.push_str(" WHERE ");
                result.push_str(&parts[0]);
            }
            _ => {
                result.push_str(" WHERE (");
                result.push_str(&parts.join(" AND "));
                result.push(')');
            }
        }

        Ok(())
    }

    fn render_order_by(&self, result: &mut String, table: &str, plan: &Plan) {
        // DISTINCT ON expressions have to lead the ordering.
        let mut orders: Vec<(&str, Order)> = plan
            .distinct
            .iter()
            .map(|col| {
                let order = plan
                    .orders
                    .iter()
                    .find(|(ob, _)| ob == col)
                    .map_or(Order::Asc, |(_, order)| *order);
                (*col, order)
            })
            .collect();
        for (col, order) in &plan.orders {
            if !plan.distinct.contains(col) {
                orders.push((*col, *order));
            }
        }

        if orders.is_empty() {
            return;
        }

        result.push_str(" ORDER BY ");
        for (i, (col, order)) in orders.iter().enumerate() {
            if i != 0 {
                result.push_str(", ");
            }
            to_sql::col_with_table(result, table, col);
            result.push(' ');
            result.push_str(order.to_sql());
        }
    }

    fn render_paging(&self, result: &mut String, sel: &Select) {
        if sel.singular {
            result.push_str(" LIMIT ");
            to_sql::integer(result, "1");
        } else if self.is_absorbed(sel.id) || sel.paging.no_limit {
            // unbounded
        } else {
            result.push_str(" LIMIT ");
            match &sel.paging.limit {
                Some(limit) => to_sql::integer(result, &self.paging_arg(limit)),
                None => to_sql::integer(result, &self.compiler.config().default_limit.to_string()),
            }
        }

        if self.is_absorbed(sel.id) {
            return;
        }
        if let Some(offset) = &sel.paging.offset {
            result.push_str(" OFFSET ");
            to_sql::integer(result, &self.paging_arg(offset));
        }
    }

    /// Literal, bound variable, or `{{name}}` placeholder for `$name`.
    fn paging_arg<'s>(&'s self, value: &'s str) -> Cow<'s, str> {
        match value.strip_prefix('$') {
            Some(name) => match self.compiler.vars(self.vars).bound(name) {
                Some(bound) => bound,
                None => Cow::Owned(format!("{{{{{}}}}}", name)),
            },
            None => Cow::Borrowed(value),
        }
    }

    fn render_tsquery(&self, result: &mut String, sel: &Select) {
        result.push_str(self.compiler.schema().ts_query_fn());
        result.push('(');
        match sel.search.as_deref() {
            Some(search) => match search.strip_prefix('$') {
                Some(name) => self.compiler.vars(self.vars).render_text(result, name),
                None => to_sql::squoted(result, search),
            },
            None => result.push_str("''"),
        }
        result.push(')');
    }
}

fn join_alias(sel: &Select) -> String {
    format!("{}_{}_join", sel.field_name, sel.id)
}

fn order_alias(table: &str, id: usize, col: &str) -> String {
    format!("{}_{}_{}_ob", table, id, col)
}
