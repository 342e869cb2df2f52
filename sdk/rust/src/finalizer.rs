//! Finalizers.
//!
//! A builder call (`one_by_pk`, `many`, `aggregate`, ...) returns a finalizer
//! that still lacks the requested output. Supplying it builds the operation
//! node and, depending on the mode, either runs it right away
//! ([`Immediate`]) or queues it in a batch ([`Batched`]).
//!
//! | Finalizer | Immediate | Batched |
//! |-----------|-----------|---------|
//! | [`RowFinalizer`] | `returning`, `returning_async`, `yielding` | `yielding` |
//! | [`MutationFinalizer`] | `returning`, `affected_rows`, `returning_with_rows` (+ `_async`), `yield*` | `yielding`, `yield_affected_rows`, `yielding_with_rows` |
//! | [`AggregateFinalizer`] | `on`, `on_typed`, `with_nodes` (+ `_async`), `count`, `avg`, `max`, `min`, `sum`, `yield_on` | `yield_on`, `yield_on_typed`, `yield_with_nodes`, `yield_count` |

use std::marker::PhantomData;

use cuckoo_document::{
    AggregateFunction, Aggregates, Columns, Model, MutationOutput, OperationNode,
};

use crate::aggregate::{
    project_count, project_function, project_response, Aggregate, Projection, Untyped,
};
use crate::batch::Batched;
use crate::client::Immediate;
use crate::deferred::Deferred;
use crate::error::SdkResult;
use crate::materialize::{
    affected_rows, each_affected_rows, each_returning, each_returning_with_rows, many,
    missing_record, nodes, one, returning, returning_with_rows, Materializer,
};

pub(crate) type BuildRows = Box<dyn FnOnce(&Columns) -> SdkResult<OperationNode> + Send>;
pub(crate) type BuildMutation =
    Box<dyn FnOnce(&MutationOutput) -> SdkResult<OperationNode> + Send>;
pub(crate) type BuildAggregate =
    Box<dyn FnOnce(&Aggregates, Option<&Columns>) -> SdkResult<OperationNode> + Send>;

mod sealed {
    pub trait Sealed {}
}

/// Whether a row operation answers one record or a list.
pub trait RowShape: sealed::Sealed {
    type Output<M: Model>: Send + Sync + 'static;

    #[doc(hidden)]
    fn materializer<M: Model>(node: &OperationNode) -> Materializer<Self::Output<M>>;
}

/// A single record; `null` fails with the kind's missing-record error.
#[derive(Debug)]
pub enum One {}

/// A list of records.
#[derive(Debug)]
pub enum Many {}

impl sealed::Sealed for One {}
impl sealed::Sealed for Many {}

impl RowShape for One {
    type Output<M: Model> = M;

    fn materializer<M: Model>(node: &OperationNode) -> Materializer<M> {
        let missing = missing_record(node);
        Box::new(move |value| one(value, missing))
    }
}

impl RowShape for Many {
    type Output<M: Model> = Vec<M>;

    fn materializer<M: Model>(_node: &OperationNode) -> Materializer<Vec<M>> {
        Box::new(many::<M>)
    }
}

/// Finalizer of operations selecting columns of one record or a list.
pub struct RowFinalizer<M, S, Mode> {
    mode: Mode,
    build: BuildRows,
    _shape: PhantomData<fn() -> (M, S)>,
}

impl<M: Model, S: RowShape, Mode> RowFinalizer<M, S, Mode> {
    pub(crate) fn new(mode: Mode, build: BuildRows) -> Self {
        Self {
            mode,
            build,
            _shape: PhantomData,
        }
    }

    fn prepare(
        self,
        columns: impl Into<Columns>,
    ) -> SdkResult<(Mode, OperationNode, Materializer<S::Output<M>>)> {
        let node = (self.build)(&columns.into())?;
        let materialize = S::materializer::<M>(&node);
        Ok((self.mode, node, materialize))
    }
}

impl<M: Model, S: RowShape> RowFinalizer<M, S, Immediate> {
    /// Runs the operation and returns the selected `columns`.
    ///
    /// An empty column list selects the primary key.
    pub fn returning(self, columns: impl Into<Columns>) -> SdkResult<S::Output<M>> {
        let (mode, node, materialize) = self.prepare(columns)?;
        mode.run(node, materialize)
    }

    pub async fn returning_async(self, columns: impl Into<Columns>) -> SdkResult<S::Output<M>> {
        let (mode, node, materialize) = self.prepare(columns)?;
        mode.run_async(node, materialize).await
    }

    /// Runs the operation and wraps the result in an already settled handle.
    pub fn yielding(self, columns: impl Into<Columns>) -> SdkResult<Deferred<S::Output<M>>> {
        self.returning(columns).map(Deferred::fulfilled)
    }
}

impl<M: Model, S: RowShape> RowFinalizer<M, S, Batched<'_>> {
    /// Queues the operation; the handle settles when the batch commits.
    pub fn yielding(self, columns: impl Into<Columns>) -> SdkResult<Deferred<S::Output<M>>> {
        let (mode, node, materialize) = self.prepare(columns)?;
        mode.defer(node, materialize)
    }
}

/// How a multi-row mutation answers: one result for the whole root, or one
/// per entry of a distinct update.
pub trait MutationShape: sealed::Sealed {
    type Rows<M: Model>: Send + Sync + 'static;
    type Count: Send + Sync + 'static;
    type RowsWithCount<M: Model>: Send + Sync + 'static;

    #[doc(hidden)]
    fn rows<M: Model>() -> Materializer<Self::Rows<M>>;
    #[doc(hidden)]
    fn count() -> Materializer<Self::Count>;
    #[doc(hidden)]
    fn rows_with_count<M: Model>() -> Materializer<Self::RowsWithCount<M>>;
}

/// `insert_<t>`, `update_<t>` and `delete_<t>`.
#[derive(Debug)]
pub enum Whole {}

/// `update_<t>_many`.
#[derive(Debug)]
pub enum PerUpdate {}

impl sealed::Sealed for Whole {}
impl sealed::Sealed for PerUpdate {}

impl MutationShape for Whole {
    type Rows<M: Model> = Vec<M>;
    type Count = u64;
    type RowsWithCount<M: Model> = (Vec<M>, u64);

    fn rows<M: Model>() -> Materializer<Vec<M>> {
        Box::new(returning::<M>)
    }

    fn count() -> Materializer<u64> {
        Box::new(affected_rows)
    }

    fn rows_with_count<M: Model>() -> Materializer<(Vec<M>, u64)> {
        Box::new(returning_with_rows::<M>)
    }
}

impl MutationShape for PerUpdate {
    type Rows<M: Model> = Vec<Vec<M>>;
    type Count = Vec<u64>;
    type RowsWithCount<M: Model> = Vec<(Vec<M>, u64)>;

    fn rows<M: Model>() -> Materializer<Vec<Vec<M>>> {
        Box::new(each_returning::<M>)
    }

    fn count() -> Materializer<Vec<u64>> {
        Box::new(each_affected_rows)
    }

    fn rows_with_count<M: Model>() -> Materializer<Vec<(Vec<M>, u64)>> {
        Box::new(each_returning_with_rows::<M>)
    }
}

/// Finalizer of mutations touching any number of rows.
pub struct MutationFinalizer<M, P, Mode> {
    mode: Mode,
    build: BuildMutation,
    _shape: PhantomData<fn() -> (M, P)>,
}

impl<M: Model, P: MutationShape, Mode> MutationFinalizer<M, P, Mode> {
    pub(crate) fn new(mode: Mode, build: BuildMutation) -> Self {
        Self {
            mode,
            build,
            _shape: PhantomData,
        }
    }

    fn prepare(self, output: &MutationOutput) -> SdkResult<(Mode, OperationNode)> {
        let node = (self.build)(output)?;
        Ok((self.mode, node))
    }
}

impl<M: Model, P: MutationShape> MutationFinalizer<M, P, Immediate> {
    /// Runs the mutation and returns the affected rows' `columns`.
    pub fn returning(self, columns: impl Into<Columns>) -> SdkResult<P::Rows<M>> {
        let (mode, node) = self.prepare(&MutationOutput::Returning(columns.into()))?;
        mode.run(node, P::rows::<M>())
    }

    pub async fn returning_async(self, columns: impl Into<Columns>) -> SdkResult<P::Rows<M>> {
        let (mode, node) = self.prepare(&MutationOutput::Returning(columns.into()))?;
        mode.run_async(node, P::rows::<M>()).await
    }

    /// Runs the mutation and returns how many rows it touched.
    pub fn affected_rows(self) -> SdkResult<P::Count> {
        let (mode, node) = self.prepare(&MutationOutput::AffectedRows)?;
        mode.run(node, P::count())
    }

    pub async fn affected_rows_async(self) -> SdkResult<P::Count> {
        let (mode, node) = self.prepare(&MutationOutput::AffectedRows)?;
        mode.run_async(node, P::count()).await
    }

    pub fn returning_with_rows(
        self,
        columns: impl Into<Columns>,
    ) -> SdkResult<P::RowsWithCount<M>> {
        let (mode, node) = self.prepare(&MutationOutput::ReturningWithRows(columns.into()))?;
        mode.run(node, P::rows_with_count::<M>())
    }

    pub async fn returning_with_rows_async(
        self,
        columns: impl Into<Columns>,
    ) -> SdkResult<P::RowsWithCount<M>> {
        let (mode, node) = self.prepare(&MutationOutput::ReturningWithRows(columns.into()))?;
        mode.run_async(node, P::rows_with_count::<M>()).await
    }

    pub fn yielding(self, columns: impl Into<Columns>) -> SdkResult<Deferred<P::Rows<M>>> {
        self.returning(columns).map(Deferred::fulfilled)
    }

    pub fn yield_affected_rows(self) -> SdkResult<Deferred<P::Count>> {
        self.affected_rows().map(Deferred::fulfilled)
    }

    pub fn yielding_with_rows(
        self,
        columns: impl Into<Columns>,
    ) -> SdkResult<Deferred<P::RowsWithCount<M>>> {
        self.returning_with_rows(columns).map(Deferred::fulfilled)
    }
}

impl<M: Model, P: MutationShape> MutationFinalizer<M, P, Batched<'_>> {
    pub fn yielding(self, columns: impl Into<Columns>) -> SdkResult<Deferred<P::Rows<M>>> {
        let (mode, node) = self.prepare(&MutationOutput::Returning(columns.into()))?;
        mode.defer(node, P::rows::<M>())
    }

    pub fn yield_affected_rows(self) -> SdkResult<Deferred<P::Count>> {
        let (mode, node) = self.prepare(&MutationOutput::AffectedRows)?;
        mode.defer(node, P::count())
    }

    pub fn yielding_with_rows(
        self,
        columns: impl Into<Columns>,
    ) -> SdkResult<Deferred<P::RowsWithCount<M>>> {
        let (mode, node) = self.prepare(&MutationOutput::ReturningWithRows(columns.into()))?;
        mode.defer(node, P::rows_with_count::<M>())
    }
}

/// Finalizer of `<t>_aggregate` and `<function>_aggregate` reads.
pub struct AggregateFinalizer<M, Mode> {
    mode: Mode,
    build: BuildAggregate,
    _model: PhantomData<fn() -> M>,
}

fn projected<B: Projection, N: Projection>(
    aggregates: Aggregates,
) -> Materializer<Aggregate<B, N>> {
    Box::new(move |value| project_response(&aggregates, value))
}

fn projected_with_nodes<M: Model, B: Projection, N: Projection>(
    aggregates: Aggregates,
) -> Materializer<(Aggregate<B, N>, Vec<M>)> {
    Box::new(move |mut value| {
        let rows = nodes(&mut value)?;
        Ok((project_response(&aggregates, value)?, rows))
    })
}

fn counted() -> Materializer<u64> {
    Box::new(project_count)
}

fn single_function(function: AggregateFunction) -> Materializer<Untyped> {
    Box::new(move |value| project_function(function, value))
}

impl<M: Model, Mode> AggregateFinalizer<M, Mode> {
    pub(crate) fn new(mode: Mode, build: BuildAggregate) -> Self {
        Self {
            mode,
            build,
            _model: PhantomData,
        }
    }

    fn prepare(
        self,
        aggregates: &Aggregates,
        columns: Option<&Columns>,
    ) -> SdkResult<(Mode, OperationNode)> {
        let node = (self.build)(aggregates, columns)?;
        Ok((self.mode, node))
    }
}

impl<M: Model> AggregateFinalizer<M, Immediate> {
    /// Runs the aggregate and returns the requested functions, untyped.
    pub fn on(self, aggregates: Aggregates) -> SdkResult<Aggregate> {
        self.on_typed(aggregates)
    }

    pub async fn on_async(self, aggregates: Aggregates) -> SdkResult<Aggregate> {
        self.on_typed_async(aggregates).await
    }

    /// Runs the aggregate and decodes `min`/`max` as `B` and the statistical
    /// functions as `N`.
    pub fn on_typed<B: Projection, N: Projection>(
        self,
        aggregates: Aggregates,
    ) -> SdkResult<Aggregate<B, N>> {
        let (mode, node) = self.prepare(&aggregates, None)?;
        mode.run(node, projected(aggregates))
    }

    pub async fn on_typed_async<B: Projection, N: Projection>(
        self,
        aggregates: Aggregates,
    ) -> SdkResult<Aggregate<B, N>> {
        let (mode, node) = self.prepare(&aggregates, None)?;
        mode.run_async(node, projected(aggregates)).await
    }

    /// Runs the aggregate and also returns the matched rows.
    pub fn with_nodes(
        self,
        aggregates: Aggregates,
        columns: impl Into<Columns>,
    ) -> SdkResult<(Aggregate, Vec<M>)> {
        self.with_nodes_typed(aggregates, columns)
    }

    pub async fn with_nodes_async(
        self,
        aggregates: Aggregates,
        columns: impl Into<Columns>,
    ) -> SdkResult<(Aggregate, Vec<M>)> {
        self.with_nodes_typed_async(aggregates, columns).await
    }

    /// [`with_nodes`](Self::with_nodes) with `min`/`max` decoded as `B` and
    /// the statistical functions as `N`.
    pub fn with_nodes_typed<B: Projection, N: Projection>(
        self,
        aggregates: Aggregates,
        columns: impl Into<Columns>,
    ) -> SdkResult<(Aggregate<B, N>, Vec<M>)> {
        let (mode, node) = self.prepare(&aggregates, Some(&columns.into()))?;
        mode.run(node, projected_with_nodes(aggregates))
    }

    pub async fn with_nodes_typed_async<B: Projection, N: Projection>(
        self,
        aggregates: Aggregates,
        columns: impl Into<Columns>,
    ) -> SdkResult<(Aggregate<B, N>, Vec<M>)> {
        let (mode, node) = self.prepare(&aggregates, Some(&columns.into()))?;
        mode.run_async(node, projected_with_nodes(aggregates)).await
    }

    /// Number of matching rows.
    pub fn count(self) -> SdkResult<u64> {
        let (mode, node) = self.prepare(&Aggregates::new().count(), None)?;
        mode.run(node, counted())
    }

    pub async fn count_async(self) -> SdkResult<u64> {
        let (mode, node) = self.prepare(&Aggregates::new().count(), None)?;
        mode.run_async(node, counted()).await
    }

    pub fn avg<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> SdkResult<Untyped> {
        self.function(AggregateFunction::Avg, columns)
    }

    pub fn max<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> SdkResult<Untyped> {
        self.function(AggregateFunction::Max, columns)
    }

    pub fn min<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> SdkResult<Untyped> {
        self.function(AggregateFunction::Min, columns)
    }

    pub fn sum<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> SdkResult<Untyped> {
        self.function(AggregateFunction::Sum, columns)
    }

    fn function<I, S>(self, function: AggregateFunction, columns: I) -> SdkResult<Untyped>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aggregates = Aggregates::new().function(function, columns);
        let (mode, node) = self.prepare(&aggregates, None)?;
        mode.run(node, single_function(function))
    }

    pub fn yield_on(self, aggregates: Aggregates) -> SdkResult<Deferred<Aggregate>> {
        self.on(aggregates).map(Deferred::fulfilled)
    }
}

impl<M: Model> AggregateFinalizer<M, Batched<'_>> {
    pub fn yield_on(self, aggregates: Aggregates) -> SdkResult<Deferred<Aggregate>> {
        self.yield_on_typed(aggregates)
    }

    pub fn yield_on_typed<B: Projection, N: Projection>(
        self,
        aggregates: Aggregates,
    ) -> SdkResult<Deferred<Aggregate<B, N>>> {
        let (mode, node) = self.prepare(&aggregates, None)?;
        mode.defer(node, projected(aggregates))
    }

    pub fn yield_with_nodes(
        self,
        aggregates: Aggregates,
        columns: impl Into<Columns>,
    ) -> SdkResult<Deferred<(Aggregate, Vec<M>)>> {
        self.yield_with_nodes_typed(aggregates, columns)
    }

    pub fn yield_with_nodes_typed<B: Projection, N: Projection>(
        self,
        aggregates: Aggregates,
        columns: impl Into<Columns>,
    ) -> SdkResult<Deferred<(Aggregate<B, N>, Vec<M>)>> {
        let (mode, node) = self.prepare(&aggregates, Some(&columns.into()))?;
        mode.defer(node, projected_with_nodes(aggregates))
    }

    pub fn yield_count(self) -> SdkResult<Deferred<u64>> {
        let (mode, node) = self.prepare(&Aggregates::new().count(), None)?;
        mode.defer(node, counted())
    }
}
