//! Build-time errors.

use thiserror::Error;

/// Errors raised while building operation nodes or assembling a document.
///
/// These are programming errors surfaced immediately; none of them is ever
/// retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("`{table}` has no primary key declared")]
    NoPrimaryKey { table: String },

    #[error("primary key of `{table}` must be exactly {expected:?}, got {got:?}")]
    PrimaryKeyMismatch {
        table: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("`{field}` is not a column of `{table}`")]
    UnknownField { table: String, field: String },

    #[error("invalid columns used with an inverted selection on `{table}`: {columns:?}")]
    InvalidInvertedColumns { table: String, columns: Vec<String> },

    #[error("`{key}` cannot be used to filter `{table}`")]
    UnknownFilterField { table: String, key: String },

    #[error("`{argument}` on `{table}` must be a JSON {expected}")]
    InvalidArgument {
        table: String,
        argument: String,
        expected: &'static str,
    },

    #[error("selection on `{table}` is empty")]
    EmptySelection { table: String },

    #[error("`{key}` is requested more than once in the same selection set")]
    DuplicateResponseKey { key: String },

    #[error("invalid include: no relation to `{target}` found on `{parent}`")]
    RelationNotFound { parent: String, target: String },

    #[error("ambiguous include of `{target}` on `{parent}`, candidates: {candidates:?}; name one with `field_name`")]
    AmbiguousRelation {
        parent: String,
        target: String,
        candidates: Vec<String>,
    },

    #[error("invalid include: `{field}` on `{parent}` does not relate to `{target}`")]
    RelationMismatch {
        parent: String,
        field: String,
        target: String,
    },

    #[error("at least one aggregate is required: count, avg, max, min, stddev, stddev_pop, stddev_samp, sum, var_pop, var_samp, variance")]
    MissingAggregate,

    #[error("at least one update operation is required: set, inc, append, prepend, delete_key, delete_elem, delete_at_path")]
    MissingUpdateOperation,

    #[error("a {document} document cannot hold a {node} operation")]
    MixedOperationTypes {
        document: &'static str,
        node: &'static str,
    },

    #[error("alias `{alias}` is already used in this document")]
    DuplicateAlias { alias: String },
}
