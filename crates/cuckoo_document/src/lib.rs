//! # cuckoo_document
//!
//! Builds Hasura-flavoured GraphQL documents from typed operation trees.
//!
//! The crate is pure: it knows about model schemas, operation nodes, includes
//! and aggregate selections, and compiles them into a `(query, variables)`
//! pair. Executing documents is left to `cuckoo_sdk`.
//!
//! ```ignore
//! let columns = columns!["uuid", Include::of::<Article>().many(Conditions::new()).returning(["title"])];
//! let node = OperationNode::select_by_pk(Author::schema(), &json!("ABC"), &columns)?;
//! let (document, alias) = Document::single(node)?;
//! let compiled = document.compile();
//! ```

pub mod aggregate;
pub mod args;
pub mod compiler;
pub mod error;
pub mod include;
pub mod model;
pub mod node;
pub mod variables;

pub use aggregate::{AggregateFunction, Aggregates, CountSpec};
pub use args::{sql_function_args, ArgValue, Argument, Binding, Conditions, UpdateOps};
pub use compiler::{CompiledDocument, Document};
pub use error::DocumentError;
pub use include::{Column, Columns, Include, IncludeAggregate, IncludeColumn, IncludeMany, IncludeOne};
pub use model::{Cardinality, FieldDef, Model, ModelSchema, RelationDef, PUBLIC_SCHEMA};
pub use node::{
    MutationOutput, OperationKind, OperationNode, OperationType, Selection, UpdateEntry,
};
pub use variables::{Variable, VariableRegistry};
