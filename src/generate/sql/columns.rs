use crate::ast;
use crate::db::introspect::DbColumn;
use crate::schema::TableInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Max,
    Min,
    Stddev,
    StddevPop,
    StddevSamp,
    Variance,
    VarPop,
    VarSamp,
}

// Longest prefixes first, `stddev_pop_` must not match as `stddev_`.
const AGGREGATE_PREFIXES: [(&str, AggregateFn); 11] = [
    ("stddev_samp_", AggregateFn::StddevSamp),
    ("stddev_pop_", AggregateFn::StddevPop),
    ("variance_", AggregateFn::Variance),
    ("var_samp_", AggregateFn::VarSamp),
    ("var_pop_", AggregateFn::VarPop),
    ("stddev_", AggregateFn::Stddev),
    ("count_", AggregateFn::Count),
    ("sum_", AggregateFn::Sum),
    ("avg_", AggregateFn::Avg),
    ("max_", AggregateFn::Max),
    ("min_", AggregateFn::Min),
];

impl AggregateFn {
    /// Splits `count_price` into `(Count, "price")`.
    pub fn parse(name: &str) -> Option<(AggregateFn, &str)> {
        AGGREGATE_PREFIXES.iter().find_map(|(prefix, func)| {
            name.strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (*func, rest))
        })
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregateFn::Count => "count",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Max => "max",
            AggregateFn::Min => "min",
            AggregateFn::Stddev => "stddev",
            AggregateFn::StddevPop => "stddev_pop",
            AggregateFn::StddevSamp => "stddev_samp",
            AggregateFn::Variance => "variance",
            AggregateFn::VarPop => "var_pop",
            AggregateFn::VarSamp => "var_samp",
        }
    }
}

const SEARCH_RANK: &str = "search_rank";
const SEARCH_HEADLINE_PREFIX: &str = "search_headline_";

/// What a requested column turns into in the base row source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKind<'a> {
    Plain(&'a DbColumn),
    Aggregate(AggregateFn, &'a DbColumn),
    /// Carries the full-text column.
    SearchRank(&'a DbColumn),
    SearchHeadline(&'a DbColumn),
    /// Rendered as a `'<name> not defined'` literal.
    Undefined,
}

impl<'a> ColumnKind<'a> {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, ColumnKind::Aggregate(..))
    }
}

/// Classifies a requested column once. `None` means the allow-list hides it.
pub fn classify<'a>(
    sel: &ast::Select,
    col: &ast::Column,
    ti: &'a TableInfo,
) -> Option<ColumnKind<'a>> {
    if let Some(real) = ti.column(&col.name) {
        return allowed(sel, real, ColumnKind::Plain(real));
    }

    if sel.search.is_some() {
        if col.name == SEARCH_RANK {
            return match ti.tsv_col() {
                Some(tsv) => allowed(sel, tsv, ColumnKind::SearchRank(tsv)),
                None => Some(ColumnKind::Undefined),
            };
        }
        if let Some(source) = col.name.strip_prefix(SEARCH_HEADLINE_PREFIX) {
            return match ti.column(source) {
                Some(real) => allowed(sel, real, ColumnKind::SearchHeadline(real)),
                None => Some(ColumnKind::Undefined),
            };
        }
    }

    if let Some((func, source)) = AggregateFn::parse(&col.name) {
        return match ti.column(source) {
            Some(real) => allowed(sel, real, ColumnKind::Aggregate(func, real)),
            None => Some(ColumnKind::Undefined),
        };
    }

    Some(ColumnKind::Undefined)
}

fn allowed<'a>(
    sel: &ast::Select,
    col: &DbColumn,
    kind: ColumnKind<'a>,
) -> Option<ColumnKind<'a>> {
    if sel.is_allowed(&col.name) {
        Some(kind)
    } else {
        None
    }
}
