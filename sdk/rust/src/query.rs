//! Read builders.

use std::marker::PhantomData;

use cuckoo_document::{Conditions, Model, OperationNode, OperationType};
use serde_json::Value;

use crate::client::{Client, Immediate};
use crate::error::SdkResult;
use crate::finalizer::{AggregateFinalizer, Many, One, RowFinalizer};

/// Reads rows of `M`.
pub struct Query<M, Mode = Immediate> {
    mode: Mode,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Query<M> {
    /// Creates a query bound to the default client.
    pub fn new() -> SdkResult<Self> {
        Ok(Client::from_default()?.query())
    }
}

impl<M: Model, Mode> Query<M, Mode> {
    pub(crate) fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            _model: PhantomData,
        }
    }

    /// `<t>_by_pk`. Matching no row fails with
    /// [`ErrorCode::NotFound`](crate::ErrorCode::NotFound).
    ///
    /// `pk` is a scalar for single-column keys, otherwise an object holding
    /// every key column.
    pub fn one_by_pk(self, pk: impl Into<Value>) -> RowFinalizer<M, One, Mode> {
        let pk = pk.into();
        RowFinalizer::new(
            self.mode,
            Box::new(move |columns| Ok(OperationNode::select_by_pk(M::schema(), &pk, columns)?)),
        )
    }

    pub fn many(self, conditions: Conditions) -> RowFinalizer<M, Many, Mode> {
        RowFinalizer::new(
            self.mode,
            Box::new(move |columns| {
                Ok(OperationNode::select_many(M::schema(), &conditions, columns)?)
            }),
        )
    }

    /// `<t>_aggregate`.
    pub fn aggregate(self, conditions: Conditions) -> AggregateFinalizer<M, Mode> {
        AggregateFinalizer::new(
            self.mode,
            Box::new(move |aggregates, nodes| {
                Ok(OperationNode::aggregate(
                    M::schema(),
                    &conditions,
                    aggregates,
                    nodes,
                )?)
            }),
        )
    }

    /// A SQL function returning a single row of `M`.
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
                    OperationType::Query,
                    M::schema(),
                    &function,
                    &args,
                    columns,
                )?)
            }),
        )
    }

    /// A SQL function returning rows of `M`.
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
                    OperationType::Query,
                    M::schema(),
                    &function,
                    &args,
                    &conditions,
                    columns,
                )?)
            }),
        )
    }

    /// `<function>_aggregate` over the rows a SQL function returns.
    pub fn aggregate_function(
        self,
        function: impl Into<String>,
        args: Value,
        conditions: Conditions,
    ) -> AggregateFinalizer<M, Mode> {
        let function = function.into();
        AggregateFinalizer::new(
            self.mode,
            Box::new(move |aggregates, nodes| {
                Ok(OperationNode::function_aggregate(
                    M::schema(),
                    &function,
                    &args,
                    &conditions,
                    aggregates,
                    nodes,
                )?)
            }),
        )
    }
}
