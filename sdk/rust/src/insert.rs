//! Insert builders.

use std::marker::PhantomData;

use cuckoo_document::{Model, OperationNode};
use serde::Serialize;
use serde_json::Value;

use crate::client::{Client, Immediate};
use crate::error::{ErrorCode, ResultExt, SdkResult};
use crate::finalizer::{MutationFinalizer, One, RowFinalizer, Whole};

/// Inserts rows of `M`.
pub struct Insert<M, Mode = Immediate> {
    mode: Mode,
    on_conflict: Option<Value>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Insert<M> {
    /// Creates an insert bound to the default client.
    pub fn new() -> SdkResult<Self> {
        Ok(Client::from_default()?.insert())
    }
}

fn to_value(value: impl Serialize) -> SdkResult<Value> {
    serde_json::to_value(value).map_sdk_err(ErrorCode::SerializeError)
}

impl<M: Model, Mode> Insert<M, Mode> {
    pub(crate) fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            on_conflict: None,
            _model: PhantomData,
        }
    }

    /// Upsert behaviour, e.g.
    /// `{"constraint": "authors_pkey", "update_columns": ["name"]}`.
    pub fn on_conflict(mut self, on_conflict: Value) -> Self {
        self.on_conflict = Some(on_conflict);
        self
    }

    /// `insert_<t>_one`. A `null` answer fails with
    /// [`ErrorCode::InsertFailed`](crate::ErrorCode::InsertFailed).
    pub fn one(self, object: impl Serialize) -> RowFinalizer<M, One, Mode> {
        let object = to_value(object);
        let on_conflict = self.on_conflict;
        RowFinalizer::new(
            self.mode,
            Box::new(move |columns| {
                Ok(OperationNode::insert_one(
                    M::schema(),
                    object?,
                    on_conflict,
                    columns,
                )?)
            }),
        )
    }

    /// `insert_<t>` with a list of objects.
    pub fn many(self, objects: impl Serialize) -> MutationFinalizer<M, Whole, Mode> {
        let objects = to_value(objects);
        let on_conflict = self.on_conflict;
        MutationFinalizer::new(
            self.mode,
            Box::new(move |output| {
                Ok(OperationNode::insert_many(
                    M::schema(),
                    objects?,
                    on_conflict,
                    output,
                )?)
            }),
        )
    }
}
