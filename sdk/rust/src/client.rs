//! Cuckoo client.
//!
//! A [`Client`] owns a [`Transport`] and is the entry point of every builder:
//!
//! ```ignore
//! use cuckoo_sdk::{columns, Client, ClientConfig, Conditions, Include};
//!
//! let client = Client::new(ClientConfig::new("http://localhost:8080/v1/graphql"));
//!
//! // Immediate: one document, one request.
//! let author: Author = client
//!     .query::<Author>()
//!     .one_by_pk("ABC")
//!     .returning(columns!["uuid", Include::of::<Article>().many(Conditions::new()).returning(["title"])])?;
//!
//! // Batched: every operation lands in one document, sent when the scope ends.
//! let (inserted, updated) = client.mutation_batch(|batch| {
//!     let inserted = batch.insert::<Author>().one(&new_author).yielding(["uuid"])?;
//!     let updated = batch.update::<Author>().one_by_pk("ABC", ops).yielding(["uuid", "name"])?;
//!     Ok((inserted, updated))
//! })?;
//! ```

use std::fmt;
use std::sync::Arc;

use cuckoo_document::{CompiledDocument, Document, Model, OperationNode};
use serde_json::Value;
use tracing::{debug, error};

use crate::batch::{Batch, Mutations, Queries};
use crate::config::{default_config, ClientConfig};
use crate::delete::Delete;
use crate::error::SdkResult;
use crate::insert::Insert;
use crate::materialize::{take_root, Materializer};
use crate::mutation::Mutation;
use crate::query::Query;
use crate::transport::{truncate, HttpTransport, Request, Response, Transport};
use crate::update::Update;

/// Longest request or response text written to the log.
const LOG_LIMIT: usize = 1000;

/// Executes compiled documents and creates builders.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client talking HTTP to `config.url`.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(HttpTransport::new(config))
    }

    /// Creates a client on top of a custom transport.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Creates a client from the configuration installed with
    /// [`configure`](crate::configure), or from the environment.
    pub fn from_default() -> SdkResult<Self> {
        Ok(Self::new(default_config()?))
    }

    /// Executes a compiled document and returns its `data`.
    ///
    /// Blocks the calling thread; must not be used inside an async runtime.
    pub fn execute(&self, document: &CompiledDocument) -> SdkResult<Value> {
        let request = request(document);
        finish(self.transport.execute_blocking(&request))
    }

    /// Executes a compiled document and returns its `data`.
    pub async fn execute_async(&self, document: &CompiledDocument) -> SdkResult<Value> {
        let request = request(document);
        finish(self.transport.execute(&request).await)
    }

    pub fn query<M: Model>(&self) -> Query<M> {
        Query::with_mode(self.immediate())
    }

    pub fn insert<M: Model>(&self) -> Insert<M> {
        Insert::with_mode(self.immediate())
    }

    pub fn update<M: Model>(&self) -> Update<M> {
        Update::with_mode(self.immediate())
    }

    pub fn delete<M: Model>(&self) -> Delete<M> {
        Delete::with_mode(self.immediate())
    }

    /// SQL functions exposed as mutations.
    pub fn mutation<M: Model>(&self) -> Mutation<M> {
        Mutation::with_mode(self.immediate())
    }

    fn immediate(&self) -> Immediate {
        Immediate {
            client: self.clone(),
        }
    }

    /// Opens a batch of queries. Dropping it without [`Batch::commit`]
    /// aborts it.
    pub fn begin_query_batch(&self) -> Batch<Queries> {
        Batch::new(self.clone())
    }

    /// Opens a batch of mutations, executed as one transaction.
    pub fn begin_mutation_batch(&self) -> Batch<Mutations> {
        Batch::new(self.clone())
    }

    /// Runs `scope` against a new query batch and commits it.
    ///
    /// If `scope` fails the batch is aborted: nothing is sent and every
    /// handle it produced fails with [`ErrorCode::BatchAborted`](crate::ErrorCode::BatchAborted).
    pub fn query_batch<R>(
        &self,
        scope: impl FnOnce(&mut Batch<Queries>) -> SdkResult<R>,
    ) -> SdkResult<R> {
        let mut batch = self.begin_query_batch();
        let output = scope(&mut batch)?;
        batch.commit()?;
        Ok(output)
    }

    pub async fn query_batch_async<R>(
        &self,
        scope: impl FnOnce(&mut Batch<Queries>) -> SdkResult<R>,
    ) -> SdkResult<R> {
        let mut batch = self.begin_query_batch();
        let output = scope(&mut batch)?;
        batch.commit_async().await?;
        Ok(output)
    }

    /// Runs `scope` against a new mutation batch and commits it.
    pub fn mutation_batch<R>(
        &self,
        scope: impl FnOnce(&mut Batch<Mutations>) -> SdkResult<R>,
    ) -> SdkResult<R> {
        let mut batch = self.begin_mutation_batch();
        let output = scope(&mut batch)?;
        batch.commit()?;
        Ok(output)
    }

    pub async fn mutation_batch_async<R>(
        &self,
        scope: impl FnOnce(&mut Batch<Mutations>) -> SdkResult<R>,
    ) -> SdkResult<R> {
        let mut batch = self.begin_mutation_batch();
        let output = scope(&mut batch)?;
        batch.commit_async().await?;
        Ok(output)
    }
}

fn request(document: &CompiledDocument) -> Request {
    debug!(
        query = %truncate(&document.query, LOG_LIMIT),
        variables = document.variables.len(),
        "Sending document"
    );
    Request::new(document.query.clone(), document.variables.clone())
}

fn finish(response: SdkResult<Response>) -> SdkResult<Value> {
    match response.and_then(Response::into_data) {
        Ok(data) => {
            debug!(data = %truncate(&data.to_string(), LOG_LIMIT), "Query successful");
            Ok(data)
        }
        Err(e) => {
            error!(code = %e.code, error = %truncate(&e.message, LOG_LIMIT), "Query failed");
            Err(e)
        }
    }
}

/// Finalizers in this mode compile and send their operation right away.
#[derive(Debug, Clone)]
pub struct Immediate {
    client: Client,
}

impl Immediate {
    pub(crate) fn run<T>(self, node: OperationNode, materialize: Materializer<T>) -> SdkResult<T> {
        let (document, alias) = Document::single(node)?;
        let mut data = self.client.execute(&document.compile())?;
        materialize(take_root(&mut data, &alias))
    }

    pub(crate) async fn run_async<T>(
        self,
        node: OperationNode,
        materialize: Materializer<T>,
    ) -> SdkResult<T> {
        let (document, alias) = Document::single(node)?;
        let mut data = self.client.execute_async(&document.compile()).await?;
        materialize(take_root(&mut data, &alias))
    }
}
