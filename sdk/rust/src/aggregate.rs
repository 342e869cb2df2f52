//! Aggregate projection.
//!
//! Aggregate fragments are projected into an [`Aggregate`] container. `count`
//! is a plain integer; `min`/`max` are shaped like the base type `B` and the
//! statistical functions like the numeric type `N`. Without typed models both
//! default to [`Untyped`], an open map of whatever the server returned.
//! Functions that were not requested are always `None`.

use cuckoo_document::{AggregateFunction, Aggregates};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::materialize::{decode, take_field};

/// Open mapping used when no typed aggregate model is supplied.
pub type Untyped = serde_json::Map<String, Value>;

/// Types an aggregate function's fragment can be decoded into.
pub trait Projection: DeserializeOwned + Send + Sync + 'static {}

impl<T: DeserializeOwned + Send + Sync + 'static> Projection for T {}

/// Result of an `aggregate { ... }` selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate<B = Untyped, N = Untyped> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg: Option<N>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<B>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<B>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev: Option<N>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev_pop: Option<N>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev_samp: Option<N>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<N>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var_pop: Option<N>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var_samp: Option<N>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance: Option<N>,
}

/// Shape of an aggregate include inside a model, e.g.
/// `articles_aggregate: Option<AggregateResponse<Article>>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResponse<M, B = Untyped, N = Untyped> {
    pub aggregate: Option<Aggregate<B, N>>,
    pub nodes: Option<Vec<M>>,
}

/// Projects an `aggregate` fragment, keeping only the requested functions.
pub fn project<B, N>(requested: &Aggregates, fragment: Value) -> SdkResult<Aggregate<B, N>>
where
    B: DeserializeOwned,
    N: DeserializeOwned,
{
    let Value::Object(mut fragment) = fragment else {
        return Err(SdkError::new(
            ErrorCode::InvalidResponse,
            "Aggregate fragment is not an object",
        ));
    };

    if requested.count_spec().is_none() {
        fragment.remove("count");
    }
    let kept: Vec<AggregateFunction> = requested.functions().map(|(function, _)| function).collect();
    for function in AggregateFunction::ALL {
        if !kept.contains(&function) {
            fragment.remove(function.as_str());
        }
    }

    decode(Value::Object(fragment))
}

/// Projects the `aggregate` key of an aggregate response.
pub(crate) fn project_response<B, N>(
    requested: &Aggregates,
    mut value: Value,
) -> SdkResult<Aggregate<B, N>>
where
    B: DeserializeOwned,
    N: DeserializeOwned,
{
    project(requested, take_field(&mut value, "aggregate")?)
}

/// Reads `aggregate.count` of an aggregate response.
pub(crate) fn project_count(mut value: Value) -> SdkResult<u64> {
    let mut aggregate = take_field(&mut value, "aggregate")?;
    take_field(&mut aggregate, "count")?
        .as_u64()
        .ok_or_else(|| SdkError::new(ErrorCode::InvalidResponse, "`count` is not an integer"))
}

/// Reads one aggregate function's fragment of an aggregate response.
pub(crate) fn project_function(function: AggregateFunction, mut value: Value) -> SdkResult<Untyped> {
    let mut aggregate = take_field(&mut value, "aggregate")?;
    decode(take_field(&mut aggregate, function.as_str())?)
}
