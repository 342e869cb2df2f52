//! Operation nodes.
//!
//! An [`OperationNode`] is one field invocation of a document: a root query or
//! mutation field, or an include nested in another node's selection set. Nodes
//! are assembled once by a constructor, which validates arguments and
//! resolves the selection, and are read-only afterwards.

use serde_json::Value;

use crate::aggregate::Aggregates;
use crate::args::{
    as_object, compile_filter, primary_key_bindings, sql_function_args, ArgValue, Argument,
    Conditions, UpdateOps,
};
use crate::error::DocumentError;
use crate::include::Columns;
use crate::model::ModelSchema;

/// Kind of a GraphQL operation document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
}

impl OperationType {
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        }
    }

    /// Operation name written after the keyword.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    SelectOne,
    SelectMany,
    Aggregate,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    UpdateManyDistinct,
    DeleteOne,
    DeleteMany,
    FunctionOne,
    FunctionMany,
    FunctionAggregate,
    IncludeOne,
    IncludeMany,
    IncludeAggregate,
}

impl OperationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SelectOne => "select_one",
            Self::SelectMany => "select_many",
            Self::Aggregate => "aggregate",
            Self::InsertOne => "insert_one",
            Self::InsertMany => "insert_many",
            Self::UpdateOne => "update_one",
            Self::UpdateMany => "update_many",
            Self::UpdateManyDistinct => "update_many_distinct",
            Self::DeleteOne => "delete_one",
            Self::DeleteMany => "delete_many",
            Self::FunctionOne => "function_one",
            Self::FunctionMany => "function_many",
            Self::FunctionAggregate => "function_aggregate",
            Self::IncludeOne => "include_one",
            Self::IncludeMany => "include_many",
            Self::IncludeAggregate => "include_aggregate",
        }
    }

    pub const fn is_include(&self) -> bool {
        matches!(
            self,
            Self::IncludeOne | Self::IncludeMany | Self::IncludeAggregate
        )
    }
}

/// One entry of a selection set.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// A scalar column.
    Field(String),
    /// A nested relation.
    Include(OperationNode),
    /// `returning { ... }` of a mutation response.
    Returning(Vec<Selection>),
    /// `affected_rows` of a mutation response.
    AffectedRows,
    /// `aggregate { ... }` of an aggregate response.
    Aggregate(Aggregates),
    /// `nodes { ... }` of an aggregate response.
    Nodes(Vec<Selection>),
}

impl Selection {
    /// Key under which the selection appears in the response.
    pub fn response_key(&self) -> &str {
        match self {
            Self::Field(name) => name,
            Self::Include(node) => node.response_key(),
            Self::Returning(_) => "returning",
            Self::AffectedRows => "affected_rows",
            Self::Aggregate(_) => "aggregate",
            Self::Nodes(_) => "nodes",
        }
    }
}

/// What a multi-row mutation reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutput {
    /// `returning { ... }`
    Returning(Columns),
    /// `affected_rows`
    AffectedRows,
    /// `returning { ... } affected_rows`
    ReturningWithRows(Columns),
}

impl MutationOutput {
    fn selection(&self, schema: &'static ModelSchema) -> Result<Vec<Selection>, DocumentError> {
        Ok(match self {
            Self::Returning(columns) => vec![Selection::Returning(columns.resolve(schema)?)],
            Self::AffectedRows => vec![Selection::AffectedRows],
            Self::ReturningWithRows(columns) => vec![
                Selection::Returning(columns.resolve(schema)?),
                Selection::AffectedRows,
            ],
        })
    }
}

/// One update of a `update_<table>_many` mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEntry {
    pub filter: Value,
    pub ops: UpdateOps,
}

impl UpdateEntry {
    pub fn new(filter: Value, ops: UpdateOps) -> Self {
        Self { filter, ops }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationNode {
    kind: OperationKind,
    operation_type: Option<OperationType>,
    alias: Option<String>,
    schema: &'static ModelSchema,
    field: String,
    arguments: Vec<Argument>,
    selection: Vec<Selection>,
}

impl OperationNode {
    fn new(
        kind: OperationKind,
        operation_type: Option<OperationType>,
        schema: &'static ModelSchema,
        field: String,
    ) -> Self {
        Self {
            kind,
            operation_type,
            alias: None,
            schema,
            field,
            arguments: Vec::new(),
            selection: Vec::new(),
        }
    }

    fn query(kind: OperationKind, schema: &'static ModelSchema, field: String) -> Self {
        Self::new(kind, Some(OperationType::Query), schema, field)
    }

    fn mutation(kind: OperationKind, schema: &'static ModelSchema, field: String) -> Self {
        Self::new(kind, Some(OperationType::Mutation), schema, field)
    }

    pub(crate) fn include(kind: OperationKind, schema: &'static ModelSchema, field: String) -> Self {
        Self::new(kind, None, schema, field)
    }

    pub(crate) fn with_arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    pub(crate) fn with_selection(mut self, selection: Vec<Selection>) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the response alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub(crate) fn set_alias(&mut self, alias: String) {
        self.alias = Some(alias);
    }

    /// `<table>_by_pk(<pk>: $<pk>) { ... }`
    pub fn select_by_pk(
        schema: &'static ModelSchema,
        pk: &Value,
        columns: &Columns,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        Ok(
            Self::query(OperationKind::SelectOne, schema, format!("{table}_by_pk"))
                .with_arguments(pk_arguments(schema, pk)?)
                .with_selection(columns.resolve(schema)?),
        )
    }

    /// `<table>(where: ..., ...) { ... }`
    pub fn select_many(
        schema: &'static ModelSchema,
        conditions: &Conditions,
        columns: &Columns,
    ) -> Result<Self, DocumentError> {
        Ok(
            Self::query(OperationKind::SelectMany, schema, schema.qualified_name())
                .with_arguments(conditions.arguments(schema)?)
                .with_selection(columns.resolve(schema)?),
        )
    }

    /// `<table>_aggregate(...) { aggregate { ... } nodes { ... } }`
    pub fn aggregate(
        schema: &'static ModelSchema,
        conditions: &Conditions,
        aggregates: &Aggregates,
        nodes: Option<&Columns>,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        Ok(
            Self::query(OperationKind::Aggregate, schema, format!("{table}_aggregate"))
                .with_arguments(conditions.arguments(schema)?)
                .with_selection(aggregate_selection(schema, aggregates, nodes)?),
        )
    }

    /// `insert_<table>_one(object: $object, on_conflict: $on_conflict) { ... }`
    pub fn insert_one(
        schema: &'static ModelSchema,
        object: Value,
        on_conflict: Option<Value>,
        columns: &Columns,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        as_object(&object, &table, "object")?;

        let mut arguments = vec![Argument::bound(
            "object",
            format!("{table}_insert_input!"),
            object,
        )];
        arguments.extend(on_conflict_argument(&table, on_conflict)?);

        Ok(
            Self::mutation(OperationKind::InsertOne, schema, format!("insert_{table}_one"))
                .with_arguments(arguments)
                .with_selection(columns.resolve(schema)?),
        )
    }

    /// `insert_<table>(objects: $objects, on_conflict: $on_conflict) { ... }`
    pub fn insert_many(
        schema: &'static ModelSchema,
        objects: Value,
        on_conflict: Option<Value>,
        output: &MutationOutput,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        let valid = objects
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_object));
        if !valid {
            return Err(DocumentError::InvalidArgument {
                table,
                argument: "objects".to_string(),
                expected: "array of objects",
            });
        }

        let mut arguments = vec![Argument::bound(
            "objects",
            format!("[{table}_insert_input!]!"),
            objects,
        )];
        arguments.extend(on_conflict_argument(&table, on_conflict)?);

        Ok(
            Self::mutation(OperationKind::InsertMany, schema, format!("insert_{table}"))
                .with_arguments(arguments)
                .with_selection(output.selection(schema)?),
        )
    }

    /// `update_<table>_by_pk(pk_columns: {<pk>: $<pk>}, _set: $set, ...) { ... }`
    pub fn update_by_pk(
        schema: &'static ModelSchema,
        pk: &Value,
        ops: &UpdateOps,
        columns: &Columns,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        let pk_columns = primary_key_bindings(schema, pk)?
            .into_iter()
            .map(|(column, binding)| (column, ArgValue::Variable(binding)))
            .collect();

        let mut arguments = vec![Argument::new("pk_columns", ArgValue::Object(pk_columns))];
        arguments.extend(ops.arguments(schema)?);

        Ok(
            Self::mutation(OperationKind::UpdateOne, schema, format!("update_{table}_by_pk"))
                .with_arguments(arguments)
                .with_selection(columns.resolve(schema)?),
        )
    }

    /// `update_<table>(where: {...}, _set: $set, ...) { ... }`
    pub fn update_many(
        schema: &'static ModelSchema,
        filter: &Value,
        ops: &UpdateOps,
        output: &MutationOutput,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        let mut arguments = vec![Argument::new(
            "where",
            ArgValue::Object(compile_filter(schema, filter)?),
        )];
        arguments.extend(ops.arguments(schema)?);

        Ok(
            Self::mutation(OperationKind::UpdateMany, schema, format!("update_{table}"))
                .with_arguments(arguments)
                .with_selection(output.selection(schema)?),
        )
    }

    /// `update_<table>_many(updates: $updates) { ... }`
    ///
    /// Each entry yields its own `returning`/`affected_rows` pair.
    pub fn update_many_distinct(
        schema: &'static ModelSchema,
        updates: &[UpdateEntry],
        output: &MutationOutput,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        if updates.is_empty() {
            return Err(DocumentError::InvalidArgument {
                table,
                argument: "updates".to_string(),
                expected: "non-empty array",
            });
        }

        let mut values = Vec::with_capacity(updates.len());
        for update in updates {
            compile_filter(schema, &update.filter)?;
            if update.ops.is_empty() {
                return Err(DocumentError::MissingUpdateOperation);
            }
            let mut entry = serde_json::Map::new();
            entry.insert("where".to_string(), update.filter.clone());
            entry.extend(update.ops.to_object());
            values.push(Value::Object(entry));
        }

        Ok(Self::mutation(
            OperationKind::UpdateManyDistinct,
            schema,
            format!("update_{table}_many"),
        )
        .with_arguments(vec![Argument::bound(
            "updates",
            format!("[{table}_updates!]!"),
            Value::Array(values),
        )])
        .with_selection(output.selection(schema)?))
    }

    /// `delete_<table>_by_pk(<pk>: $<pk>) { ... }`
    pub fn delete_by_pk(
        schema: &'static ModelSchema,
        pk: &Value,
        columns: &Columns,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        Ok(
            Self::mutation(OperationKind::DeleteOne, schema, format!("delete_{table}_by_pk"))
                .with_arguments(pk_arguments(schema, pk)?)
                .with_selection(columns.resolve(schema)?),
        )
    }

    /// `delete_<table>(where: {...}) { ... }`
    pub fn delete_many(
        schema: &'static ModelSchema,
        filter: &Value,
        output: &MutationOutput,
    ) -> Result<Self, DocumentError> {
        let table = schema.qualified_name();
        Ok(
            Self::mutation(OperationKind::DeleteMany, schema, format!("delete_{table}"))
                .with_arguments(vec![Argument::new(
                    "where",
                    ArgValue::Object(compile_filter(schema, filter)?),
                )])
                .with_selection(output.selection(schema)?),
        )
    }

    /// `<function>(args: $args) { ... }` returning a single row.
    pub fn function_one(
        operation_type: OperationType,
        schema: &'static ModelSchema,
        function: &str,
        args: &Value,
        columns: &Columns,
    ) -> Result<Self, DocumentError> {
        let function = schema.prefixed(function);
        let arguments = vec![function_args(schema, &function, args)?];
        Ok(
            Self::new(OperationKind::FunctionOne, Some(operation_type), schema, function)
                .with_arguments(arguments)
                .with_selection(columns.resolve(schema)?),
        )
    }

    /// `<function>(args: $args, where: ..., ...) { ... }` returning rows.
    pub fn function_many(
        operation_type: OperationType,
        schema: &'static ModelSchema,
        function: &str,
        args: &Value,
        conditions: &Conditions,
        columns: &Columns,
    ) -> Result<Self, DocumentError> {
        let function = schema.prefixed(function);
        let mut arguments = vec![function_args(schema, &function, args)?];
        arguments.extend(conditions.arguments(schema)?);
        Ok(
            Self::new(OperationKind::FunctionMany, Some(operation_type), schema, function)
                .with_arguments(arguments)
                .with_selection(columns.resolve(schema)?),
        )
    }

    /// `<function>_aggregate(args: $args, ...) { aggregate { ... } }`
    pub fn function_aggregate(
        schema: &'static ModelSchema,
        function: &str,
        args: &Value,
        conditions: &Conditions,
        aggregates: &Aggregates,
        nodes: Option<&Columns>,
    ) -> Result<Self, DocumentError> {
        let function = schema.prefixed(function);
        let mut arguments = vec![function_args(schema, &function, args)?];
        arguments.extend(conditions.arguments(schema)?);
        Ok(Self::query(
            OperationKind::FunctionAggregate,
            schema,
            format!("{function}_aggregate"),
        )
        .with_arguments(arguments)
        .with_selection(aggregate_selection(schema, aggregates, nodes)?))
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Document kind this node belongs to; `None` for includes.
    pub fn operation_type(&self) -> Option<OperationType> {
        self.operation_type
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn schema(&self) -> &'static ModelSchema {
        self.schema
    }

    /// Name of the invoked field, e.g. `authors_by_pk`.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn selection(&self) -> &[Selection] {
        &self.selection
    }

    /// Key under which the node's result appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }
}

fn pk_arguments(schema: &ModelSchema, pk: &Value) -> Result<Vec<Argument>, DocumentError> {
    Ok(primary_key_bindings(schema, pk)?
        .into_iter()
        .map(|(column, binding)| Argument::new(column, ArgValue::Variable(binding)))
        .collect())
}

fn on_conflict_argument(
    table: &str,
    on_conflict: Option<Value>,
) -> Result<Option<Argument>, DocumentError> {
    on_conflict
        .map(|value| {
            as_object(&value, table, "on_conflict")?;
            Ok(Argument::bound(
                "on_conflict",
                format!("{table}_on_conflict"),
                value,
            ))
        })
        .transpose()
}

fn function_args(
    schema: &ModelSchema,
    function: &str,
    args: &Value,
) -> Result<Argument, DocumentError> {
    let args = match args {
        Value::Null => serde_json::Map::new(),
        other => sql_function_args(as_object(other, &schema.qualified_name(), "args")?),
    };
    Ok(Argument::bound(
        "args",
        format!("{function}_args!"),
        Value::Object(args),
    ))
}

pub(crate) fn aggregate_selection(
    schema: &'static ModelSchema,
    aggregates: &Aggregates,
    nodes: Option<&Columns>,
) -> Result<Vec<Selection>, DocumentError> {
    aggregates.validate(schema)?;
    let mut selection = vec![Selection::Aggregate(aggregates.clone())];
    if let Some(columns) = nodes {
        selection.push(Selection::Nodes(columns.resolve(schema)?));
    }
    Ok(selection)
}
