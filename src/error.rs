use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything the schema builder and the compilers can refuse.
///
/// Errors are grouped the way they surface: problems with the schema model,
/// problems with the IR handed to the compiler, and problems inside a filter
/// expression. A failed compile never returns partial SQL.
#[derive(Debug, Error)]
pub enum Error {
    // Schema
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("unknown column id '{id}' for table '{table}'")]
    UnknownColumnId { table: String, id: i16 },

    #[error("unknown relationship '{child}' -> '{parent}'")]
    UnknownRelationship { child: String, parent: String },

    #[error("relationship '{child}' -> '{parent}' cannot be used here: {reason}")]
    UnsupportedRelationship {
        child: String,
        parent: String,
        reason: &'static str,
    },

    // IR
    #[error("query has no root selections")]
    EmptyQuery,

    #[error("selection {0} does not exist")]
    UnknownSelection(usize),

    #[error("selection at position {position} carries id {id}")]
    InvalidSelectionId { position: usize, id: usize },

    #[error("variable '{0}' not defined")]
    MissingVariable(String),

    #[error("variable '{0}' is empty")]
    EmptyVariable(String),

    #[error("mutation has no payload variable")]
    MissingActionVar,

    #[error("no primary key column defined for '{table}' (selection '{field}')")]
    MissingPrimaryKey { table: String, field: String },

    #[error("no full-text search column defined for '{0}'")]
    MissingSearchColumn(String),

    #[error("{operation} on '{table}' requires a filter")]
    MissingFilter {
        operation: &'static str,
        table: String,
    },

    #[error("nested mutations are not supported on a bulk payload")]
    NestedBulkMutation,

    #[error("invalid mutation payload: {0}")]
    InvalidPayload(String),

    #[error("'{0}' is a view and cannot be mutated")]
    ReadOnlyTable(String),

    #[error("table '{0}' is mutated more than once in a single request")]
    DuplicateMutation(String),

    #[error("selection {0} cannot be skipped, only the first 64 selections fit the skip mask")]
    TooManySelections(usize),

    // Expressions
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("no column '{column}' found on table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
