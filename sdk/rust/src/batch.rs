//! Batch transactions.
//!
//! A [`Batch`] collects root operations into a single document. Nothing is
//! sent while it is open; every operation hands out a pending [`Deferred`]
//! instead. [`Batch::commit`] compiles the document once, sends it once and
//! settles every handle from the response. A batch that is aborted, or
//! dropped while open, sends nothing and fails all of its handles.
//!
//! ```text
//! OPEN --commit--> EXECUTED --distribute--> CLOSED
//!   \--abort / drop--> ABORTED
//! ```

use std::marker::PhantomData;
use std::mem;

use cuckoo_document::{Document, Model, OperationNode, OperationType};
use serde_json::Value;
use tracing::debug;

use crate::client::Client;
use crate::deferred::Deferred;
use crate::delete::Delete;
use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::insert::Insert;
use crate::materialize::{take_root, Materializer};
use crate::mutation::Mutation;
use crate::query::Query;
use crate::update::Update;

mod sealed {
    pub trait Sealed {}
}

/// Operation type a batch accepts.
pub trait BatchKind: sealed::Sealed {
    const OPERATION_TYPE: OperationType;
}

/// Marker of a batch of queries.
#[derive(Debug)]
pub enum Queries {}

/// Marker of a batch of mutations.
#[derive(Debug)]
pub enum Mutations {}

impl sealed::Sealed for Queries {}
impl sealed::Sealed for Mutations {}

impl BatchKind for Queries {
    const OPERATION_TYPE: OperationType = OperationType::Query;
}

impl BatchKind for Mutations {
    const OPERATION_TYPE: OperationType = OperationType::Mutation;
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Open,
    /// The document was sent and a response (or failure) came back.
    Executed,
    /// Every handle has been settled.
    Closed,
    Aborted,
}

struct PendingRoot {
    alias: String,
    settle: Box<dyn FnOnce(SdkResult<Value>) + Send>,
}

/// Roots and pending handles of a batch.
pub(crate) struct BatchCore {
    state: BatchState,
    document: Document,
    pending: Vec<PendingRoot>,
}

impl BatchCore {
    fn new(operation_type: OperationType) -> Self {
        Self {
            state: BatchState::Open,
            document: Document::new(operation_type),
            pending: Vec::new(),
        }
    }

    /// Adds a root and returns the handle its result will be settled into.
    pub(crate) fn defer<T>(
        &mut self,
        node: OperationNode,
        materialize: Materializer<T>,
    ) -> SdkResult<Deferred<T>>
    where
        T: Send + Sync + 'static,
    {
        if self.state != BatchState::Open {
            return Err(SdkError::new(
                ErrorCode::BatchClosed,
                "Cannot add operations to a batch that is no longer open",
            ));
        }

        let alias = self.document.push(node)?;
        let (deferred, resolver) = Deferred::pending();
        self.pending.push(PendingRoot {
            alias,
            settle: Box::new(move |result| resolver.settle(result.and_then(materialize))),
        });
        Ok(deferred)
    }

    /// Settles every handle from the response, or fails them all.
    fn distribute(&mut self, response: SdkResult<Value>) -> SdkResult<()> {
        self.state = BatchState::Executed;
        let pending = mem::take(&mut self.pending);

        let outcome = match response {
            Ok(mut data) => {
                for root in pending {
                    let value = take_root(&mut data, &root.alias);
                    (root.settle)(Ok(value));
                }
                Ok(())
            }
            Err(e) => {
                debug!(roots = pending.len(), code = %e.code, "Batch failed");
                for root in pending {
                    (root.settle)(Err(e.clone()));
                }
                Err(e)
            }
        };

        self.state = BatchState::Closed;
        outcome
    }

    fn abort(&mut self) {
        debug!(roots = self.pending.len(), "Aborting batch");
        self.state = BatchState::Aborted;
        // Dropping the resolvers fails their handles.
        self.pending.clear();
    }
}

/// A batch of operations of kind `K`, sent as one document.
pub struct Batch<K: BatchKind> {
    client: Client,
    core: BatchCore,
    _kind: PhantomData<K>,
}

impl<K: BatchKind> Batch<K> {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            core: BatchCore::new(K::OPERATION_TYPE),
            _kind: PhantomData,
        }
    }

    pub fn state(&self) -> BatchState {
        self.core.state
    }

    /// Number of queued root operations.
    pub fn len(&self) -> usize {
        self.core.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.document.is_empty()
    }

    fn batched(&mut self) -> Batched<'_> {
        Batched {
            core: &mut self.core,
        }
    }

    /// Sends the batch and settles every handle.
    ///
    /// An empty batch sends nothing. If the request fails, every handle fails
    /// with the same error, which is also returned.
    pub fn commit(mut self) -> SdkResult<()> {
        if self.close_if_empty() {
            return Ok(());
        }
        debug!(roots = self.len(), "Committing batch");
        let response = self.client.execute(&self.core.document.compile());
        self.core.distribute(response)
    }

    /// Async variant of [`Batch::commit`]. Dropping the future before the
    /// response arrives aborts the batch.
    pub async fn commit_async(mut self) -> SdkResult<()> {
        if self.close_if_empty() {
            return Ok(());
        }
        debug!(roots = self.len(), "Committing batch");
        let document = self.core.document.compile();
        let response = self.client.execute_async(&document).await;
        self.core.distribute(response)
    }

    fn close_if_empty(&mut self) -> bool {
        if self.core.document.is_empty() {
            self.core.state = BatchState::Closed;
            return true;
        }
        false
    }

    /// Discards the batch without sending anything.
    pub fn abort(mut self) {
        self.core.abort();
    }
}

impl<K: BatchKind> Drop for Batch<K> {
    fn drop(&mut self) {
        if self.core.state == BatchState::Open {
            self.core.abort();
        }
    }
}

impl Batch<Queries> {
    pub fn query<M: Model>(&mut self) -> Query<M, Batched<'_>> {
        Query::with_mode(self.batched())
    }
}

impl Batch<Mutations> {
    pub fn insert<M: Model>(&mut self) -> Insert<M, Batched<'_>> {
        Insert::with_mode(self.batched())
    }

    pub fn update<M: Model>(&mut self) -> Update<M, Batched<'_>> {
        Update::with_mode(self.batched())
    }

    pub fn delete<M: Model>(&mut self) -> Delete<M, Batched<'_>> {
        Delete::with_mode(self.batched())
    }

    pub fn mutation<M: Model>(&mut self) -> Mutation<M, Batched<'_>> {
        Mutation::with_mode(self.batched())
    }
}

/// Finalizers in this mode queue their operation in a batch.
pub struct Batched<'b> {
    core: &'b mut BatchCore,
}

impl Batched<'_> {
    pub(crate) fn defer<T>(
        self,
        node: OperationNode,
        materialize: Materializer<T>,
    ) -> SdkResult<Deferred<T>>
    where
        T: Send + Sync + 'static,
    {
        self.core.defer(node, materialize)
    }
}
