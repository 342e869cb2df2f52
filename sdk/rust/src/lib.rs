//! Cuckoo SDK
//!
//! A typed client for Hasura GraphQL endpoints. Builders assemble operation
//! trees from your models, `cuckoo_document` compiles them into a single
//! document with every literal bound as a variable, and the SDK sends it and
//! materializes the answer.
//!
//! # Immediate operations
//!
//! ```ignore
//! use cuckoo_sdk::{columns, Client, ClientConfig, Conditions, Include};
//!
//! let client = Client::new(ClientConfig::from_env()?);
//! let author: Author = client
//!     .query::<Author>()
//!     .one_by_pk("ABC")
//!     .returning(columns![
//!         "uuid",
//!         Include::of::<Article>().many(Conditions::new()).returning(["title"]),
//!     ])?;
//! ```
//!
//! # Batches
//!
//! Operations queued in a batch share one document and one request. Their
//! results are [`Deferred`] handles that settle when the batch commits.
//!
//! ```ignore
//! let count = client.query_batch(|batch| {
//!     let recent = batch.query::<Article>().many(Conditions::new().limit(10)).yielding(["title"])?;
//!     batch.query::<Article>().aggregate(Conditions::new()).yield_count()
//! })?;
//! println!("{} articles", count.get()?);
//! ```

pub mod aggregate;
pub mod batch;
pub mod client;
pub mod config;
pub mod deferred;
pub mod delete;
pub mod error;
pub mod finalizer;
pub mod insert;
mod materialize;
pub mod mutation;
pub mod query;
pub mod retry;
pub mod transport;
pub mod update;

pub use cuckoo_document::{
    columns, AggregateFunction, Aggregates, Cardinality, Column, Columns, CompiledDocument,
    Conditions, FieldDef, Include, Model, ModelSchema, RelationDef, UpdateEntry, UpdateOps,
};

pub use aggregate::{project, Aggregate, AggregateResponse, Projection, Untyped};
pub use batch::{Batch, BatchState, Batched, Mutations, Queries};
pub use client::{Client, Immediate};
pub use config::{configure, default_config, ClientConfig};
pub use deferred::{Deferred, HandleState};
pub use delete::Delete;
pub use error::{ErrorCode, IntoSdkError, ResultExt, SdkError, SdkResult};
pub use finalizer::{
    AggregateFinalizer, Many, MutationFinalizer, MutationShape, One, PerUpdate, RowFinalizer,
    RowShape, Whole,
};
pub use insert::Insert;
pub use mutation::Mutation;
pub use query::Query;
pub use retry::{ExponentialBackoff, NoRetry, RetryDecision, RetryPolicy};
pub use transport::{GraphQLError, HttpTransport, Request, Response, Transport};
pub use update::Update;
