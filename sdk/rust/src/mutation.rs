//! SQL functions exposed as mutations.

use std::marker::PhantomData;

use cuckoo_document::{Conditions, Model, OperationNode, OperationType};
use serde_json::Value;

use crate::client::{Client, Immediate};
use crate::error::SdkResult;
use crate::finalizer::{Many, One, RowFinalizer};

/// Calls volatile SQL functions returning rows of `M`.
pub struct Mutation<M, Mode = Immediate> {
    mode: Mode,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Mutation<M> {
    /// Creates a mutation bound to the default client.
    pub fn new() -> SdkResult<Self> {
        Ok(Client::from_default()?.mutation())
    }
}

impl<M: Model, Mode> Mutation<M, Mode> {
    pub(crate) fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            _model: PhantomData,
        }
    }

    /// A function returning a single row. A `null` answer fails with
    /// [`ErrorCode::MutationFailed`](crate::ErrorCode::MutationFailed).
    pub fn one_function(
        self,
        function: impl Into<String>,
        args: Value,
    ) -> RowFinalizer<M, One, Mode> {
        let function = function.into();
        RowFinalizer::new(
            self.mode,
            Box::new(move |columns| {
                Ok(OperationNode::function_one(
                    OperationType::Mutation,
                    M::schema(),
                    &function,
                    &args,
                    columns,
                )?)
            }),
        )
    }

    pub fn many_function(
        self,
        function: impl Into<String>,
        args: Value,
        conditions: Conditions,
    ) -> RowFinalizer<M, Many, Mode> {
        let function = function.into();
        RowFinalizer::new(
            self.mode,
            Box::new(move |columns| {
                Ok(OperationNode::function_many(
                    OperationType::Mutation,
                    M::schema(),
                    &function,
                    &args,
                    &conditions,
                    columns,
                )?)
            }),
        )
    }
}
