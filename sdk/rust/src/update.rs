//! Update builders.

use std::marker::PhantomData;

use cuckoo_document::{Model, OperationNode, UpdateEntry, UpdateOps};
use serde_json::Value;

use crate::client::{Client, Immediate};
use crate::error::SdkResult;
use crate::finalizer::{MutationFinalizer, One, PerUpdate, RowFinalizer, Whole};

/// Updates rows of `M`.
pub struct Update<M, Mode = Immediate> {
    mode: Mode,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Update<M> {
    /// Creates an update bound to the default client.
    pub fn new() -> SdkResult<Self> {
        Ok(Client::from_default()?.update())
    }
}

impl<M: Model, Mode> Update<M, Mode> {
    pub(crate) fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            _model: PhantomData,
        }
    }

    /// `update_<t>_by_pk`. Matching no row fails with
    /// [`ErrorCode::NotFound`](crate::ErrorCode::NotFound).
    pub fn one_by_pk(self, pk: impl Into<Value>, ops: UpdateOps) -> RowFinalizer<M, One, Mode> {
        let pk = pk.into();
        RowFinalizer::new(
            self.mode,
            Box::new(move |columns| {
                Ok(OperationNode::update_by_pk(M::schema(), &pk, &ops, columns)?)
            }),
        )
    }

    /// `update_<t>` applying `ops` to every row matching `filter`.
    pub fn many(self, filter: Value, ops: UpdateOps) -> MutationFinalizer<M, Whole, Mode> {
        MutationFinalizer::new(
            self.mode,
            Box::new(move |output| {
                Ok(OperationNode::update_many(M::schema(), &filter, &ops, output)?)
            }),
        )
    }

    /// `update_<t>_many`: several filter/operator pairs in one root, each
    /// answered separately.
    pub fn many_distinct(
        self,
        updates: Vec<UpdateEntry>,
    ) -> MutationFinalizer<M, PerUpdate, Mode> {
        MutationFinalizer::new(
            self.mode,
            Box::new(move |output| {
                Ok(OperationNode::update_many_distinct(
                    M::schema(),
                    &updates,
                    output,
                )?)
            }),
        )
    }
}
