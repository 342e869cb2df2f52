//! Delete builders.

use std::marker::PhantomData;

use cuckoo_document::{Model, OperationNode};
use serde_json::Value;

use crate::client::{Client, Immediate};
use crate::error::SdkResult;
use crate::finalizer::{MutationFinalizer, One, RowFinalizer, Whole};

/// Deletes rows of `M`.
pub struct Delete<M, Mode = Immediate> {
    mode: Mode,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Delete<M> {
    /// Creates a delete bound to the default client.
    pub fn new() -> SdkResult<Self> {
        Ok(Client::from_default()?.delete())
    }
}

impl<M: Model, Mode> Delete<M, Mode> {
    pub(crate) fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            _model: PhantomData,
        }
    }

    /// `delete_<t>_by_pk`, returning the deleted record.
    pub fn one_by_pk(self, pk: impl Into<Value>) -> RowFinalizer<M, One, Mode> {
        let pk = pk.into();
        RowFinalizer::new(
            self.mode,
            Box::new(move |columns| Ok(OperationNode::delete_by_pk(M::schema(), &pk, columns)?)),
        )
    }

    /// `delete_<t>` removing every row matching `filter`.
    pub fn many(self, filter: Value) -> MutationFinalizer<M, Whole, Mode> {
        MutationFinalizer::new(
            self.mode,
            Box::new(move |output| Ok(OperationNode::delete_many(M::schema(), &filter, output)?)),
        )
    }
}
