//! Result materialization.
//!
//! Every root of a document answers under its alias. The functions here turn
//! that JSON subtree into the caller's models: a single record, a list, or the
//! `returning`/`affected_rows` pair of a mutation. Included relations are
//! nested inside the record and decode through the model's own `Deserialize`
//! implementation.

use cuckoo_document::{OperationKind, OperationNode, OperationType};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ErrorCode, ResultExt, SdkError, SdkResult};

/// Turns the value answered under a root's alias into a typed result.
pub type Materializer<T> = Box<dyn FnOnce(Value) -> SdkResult<T> + Send>;

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> SdkResult<T> {
    serde_json::from_value(value).map_sdk_err(ErrorCode::DeserializeError)
}

/// Removes `key` from an object response.
pub(crate) fn take_field(value: &mut Value, key: &str) -> SdkResult<Value> {
    value
        .as_object_mut()
        .and_then(|object| object.remove(key))
        .ok_or_else(|| {
            SdkError::new(
                ErrorCode::InvalidResponse,
                format!("Response has no `{key}` field"),
            )
        })
}

/// Removes the value a root answered under `alias`; an absent root reads as
/// `null`.
pub(crate) fn take_root(data: &mut Value, alias: &str) -> Value {
    data.as_object_mut()
        .and_then(|object| object.remove(alias))
        .unwrap_or(Value::Null)
}

/// Error reported when a single-record root answers `null`.
///
/// A by-pk read or write that matched nothing is not found; an insert that
/// produced nothing failed; a mutation function that returned nothing failed.
pub(crate) fn missing_record(node: &OperationNode) -> SdkError {
    let field = node.field();
    match (node.kind(), node.operation_type()) {
        (OperationKind::InsertOne, _) => SdkError::new(
            ErrorCode::InsertFailed,
            format!("`{field}` did not return the inserted record"),
        ),
        (OperationKind::FunctionOne, Some(OperationType::Mutation)) => SdkError::new(
            ErrorCode::MutationFailed,
            format!("`{field}` did not return a record"),
        ),
        _ => SdkError::not_found(format!("Record of `{field}`")),
    }
}

/// Decodes a single record; `null` becomes `missing`.
pub(crate) fn one<M: DeserializeOwned>(value: Value, missing: SdkError) -> SdkResult<M> {
    if value.is_null() {
        return Err(missing);
    }
    decode(value)
}

/// Decodes a list of records.
pub(crate) fn many<M: DeserializeOwned>(value: Value) -> SdkResult<Vec<M>> {
    if value.is_null() {
        return Err(SdkError::new(
            ErrorCode::InvalidResponse,
            "Expected a list of records, got null",
        ));
    }
    decode(value)
}

/// Decodes the `returning` rows of a mutation response.
pub(crate) fn returning<M: DeserializeOwned>(mut value: Value) -> SdkResult<Vec<M>> {
    many(take_field(&mut value, "returning")?)
}

/// Reads the `affected_rows` count of a mutation response.
pub(crate) fn affected_rows(mut value: Value) -> SdkResult<u64> {
    take_field(&mut value, "affected_rows")?
        .as_u64()
        .ok_or_else(|| {
            SdkError::new(
                ErrorCode::InvalidResponse,
                "`affected_rows` is not an integer",
            )
        })
}

pub(crate) fn returning_with_rows<M: DeserializeOwned>(
    mut value: Value,
) -> SdkResult<(Vec<M>, u64)> {
    let rows = take_field(&mut value, "returning")?;
    let count = affected_rows(value)?;
    Ok((many(rows)?, count))
}

/// Splits the response of an `update_<t>_many` root, one entry per update.
fn responses(value: Value) -> SdkResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(SdkError::new(
            ErrorCode::InvalidResponse,
            format!("Expected one response per update, got {other}"),
        )),
    }
}

pub(crate) fn each_returning<M: DeserializeOwned>(value: Value) -> SdkResult<Vec<Vec<M>>> {
    responses(value)?.into_iter().map(returning).collect()
}

pub(crate) fn each_affected_rows(value: Value) -> SdkResult<Vec<u64>> {
    responses(value)?.into_iter().map(affected_rows).collect()
}

pub(crate) fn each_returning_with_rows<M: DeserializeOwned>(
    value: Value,
) -> SdkResult<Vec<(Vec<M>, u64)>> {
    responses(value)?
        .into_iter()
        .map(returning_with_rows)
        .collect()
}

/// Decodes the `nodes` rows of an aggregate response.
pub(crate) fn nodes<M: DeserializeOwned>(value: &mut Value) -> SdkResult<Vec<M>> {
    many(take_field(value, "nodes")?)
}
