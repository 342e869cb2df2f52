//! Operation arguments.
//!
//! Argument values are never inlined into the document. Every value site is
//! carried as a [`Binding`] and turned into a named variable by the compiler.
//! Filters are the one structured case: the top-level keys of a `where` object
//! are emitted as an object literal whose entries are individually bound, so
//! that each key gets a variable named after it and typed by its role.

use serde_json::{Map, Value};

use crate::error::DocumentError;
use crate::model::{Cardinality, ModelSchema};

/// A value waiting to be bound to a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Base name for the variable; collisions are suffixed by the registry.
    pub base: String,
    /// Declared GraphQL type.
    pub type_name: String,
    pub value: Value,
}

impl Binding {
    pub fn new(base: impl Into<String>, type_name: impl Into<String>, value: Value) -> Self {
        Self {
            base: base.into(),
            type_name: type_name.into(),
            value,
        }
    }
}

/// Right-hand side of an argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// `$name`
    Variable(Binding),
    /// `{key: <value>, ...}`
    Object(Vec<(String, ArgValue)>),
}

/// A named argument of a field invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: ArgValue,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: ArgValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// An argument bound to a single variable named after the argument.
    pub fn bound(name: &str, type_name: impl Into<String>, value: Value) -> Self {
        Self::new(name, ArgValue::Variable(Binding::new(name, type_name, value)))
    }
}

/// Row selection conditions of list and aggregate reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    filter: Option<Value>,
    order_by: Option<Value>,
    distinct_on: Option<Vec<String>>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the boolean expression rows must match.
    pub fn where_(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the ordering, an object or a list of objects such as
    /// `{"created_at": "desc"}`.
    pub fn order_by(mut self, order_by: Value) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn distinct_on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct_on = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Turns the conditions into arguments in `where`, `order_by`,
    /// `distinct_on`, `limit`, `offset` order.
    pub fn arguments(&self, schema: &ModelSchema) -> Result<Vec<Argument>, DocumentError> {
        let table = schema.qualified_name();
        let mut arguments = Vec::new();

        if let Some(filter) = &self.filter {
            let entries = compile_filter(schema, filter)?;
            if !entries.is_empty() {
                arguments.push(Argument::new("where", ArgValue::Object(entries)));
            }
        }
        if let Some(order_by) = &self.order_by {
            if !(order_by.is_object() || order_by.is_array()) {
                return Err(DocumentError::InvalidArgument {
                    table,
                    argument: "order_by".to_string(),
                    expected: "object or array",
                });
            }
            arguments.push(Argument::bound(
                "order_by",
                format!("[{table}_order_by!]"),
                order_by.clone(),
            ));
        }
        if let Some(columns) = &self.distinct_on {
            check_columns(schema, columns)?;
            arguments.push(Argument::bound(
                "distinct_on",
                format!("[{table}_select_column!]"),
                Value::from(columns.clone()),
            ));
        }
        if let Some(limit) = self.limit {
            arguments.push(Argument::bound("limit", "Int", Value::from(limit)));
        }
        if let Some(offset) = self.offset {
            arguments.push(Argument::bound("offset", "Int", Value::from(offset)));
        }
        Ok(arguments)
    }
}

/// Compiles a `where` object into entries whose values are bound per key.
///
/// Column keys are typed `<Scalar>_comparison_exp`, `_and`/`_or` take a list
/// of the table's boolean expressions, `_not` a single one, relation keys the
/// related table's boolean expression and `<relation>_aggregate` keys its
/// aggregate boolean expression.
pub fn compile_filter(
    schema: &ModelSchema,
    filter: &Value,
) -> Result<Vec<(String, ArgValue)>, DocumentError> {
    let table = schema.qualified_name();
    let filter = as_object(filter, &table, "where")?;

    filter
        .iter()
        .map(|(key, value)| {
            let type_name = filter_key_type(schema, &table, key)?;
            let binding = Binding::new(key.as_str(), type_name, value.clone());
            Ok((key.clone(), ArgValue::Variable(binding)))
        })
        .collect()
}

fn filter_key_type(schema: &ModelSchema, table: &str, key: &str) -> Result<String, DocumentError> {
    match key {
        "_and" | "_or" => return Ok(format!("[{table}_bool_exp!]")),
        "_not" => return Ok(format!("{table}_bool_exp")),
        _ => {}
    }
    if let Some(field) = schema.field(key) {
        return Ok(format!("{}_comparison_exp", field.graphql_type));
    }
    if let Some(relation) = schema.relation(key) {
        return Ok(format!("{}_bool_exp", relation.target().qualified_name()));
    }
    if let Some(relation) = key
        .strip_suffix("_aggregate")
        .and_then(|name| schema.relation(name))
        .filter(|relation| relation.cardinality == Cardinality::Many)
    {
        return Ok(format!(
            "{}_aggregate_bool_exp",
            relation.target().qualified_name()
        ));
    }
    Err(DocumentError::UnknownFilterField {
        table: table.to_string(),
        key: key.to_string(),
    })
}

/// Binds the primary key of a by-pk operation.
///
/// `pk` is either an object holding exactly the primary key columns or, for a
/// single-column key, the bare key value. Bindings follow the declared key
/// order.
pub fn primary_key_bindings(
    schema: &ModelSchema,
    pk: &Value,
) -> Result<Vec<(String, Binding)>, DocumentError> {
    let table = schema.qualified_name();
    let declared = schema.primary_key;
    if declared.is_empty() {
        return Err(DocumentError::NoPrimaryKey { table });
    }

    let values: Vec<(&str, Value)> = match pk {
        Value::Object(map) => {
            let matches = map.len() == declared.len()
                && declared.iter().all(|column| map.contains_key(*column));
            if !matches {
                return Err(DocumentError::PrimaryKeyMismatch {
                    table,
                    expected: declared.iter().map(ToString::to_string).collect(),
                    got: map.keys().cloned().collect(),
                });
            }
            declared
                .iter()
                .map(|column| (*column, map[*column].clone()))
                .collect()
        }
        Value::Null => {
            return Err(DocumentError::PrimaryKeyMismatch {
                table,
                expected: declared.iter().map(ToString::to_string).collect(),
                got: Vec::new(),
            })
        }
        value if declared.len() == 1 => vec![(declared[0], value.clone())],
        _ => {
            return Err(DocumentError::PrimaryKeyMismatch {
                table,
                expected: declared.iter().map(ToString::to_string).collect(),
                got: Vec::new(),
            })
        }
    };

    values
        .into_iter()
        .map(|(column, value)| {
            let field = schema.field(column).ok_or_else(|| DocumentError::UnknownField {
                table: table.clone(),
                field: column.to_string(),
            })?;
            let binding = Binding::new(column, format!("{}!", field.graphql_type), value);
            Ok((column.to_string(), binding))
        })
        .collect()
}

/// Update operators of an update mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOps {
    set: Option<Value>,
    inc: Option<Value>,
    append: Option<Value>,
    prepend: Option<Value>,
    delete_key: Option<Value>,
    delete_elem: Option<Value>,
    delete_at_path: Option<Value>,
}

impl UpdateOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// `_set`: replaces column values.
    pub fn set(mut self, values: Value) -> Self {
        self.set = Some(values);
        self
    }

    /// `_inc`: increments numeric columns.
    pub fn inc(mut self, values: Value) -> Self {
        self.inc = Some(values);
        self
    }

    /// `_append`: appends to `jsonb` columns.
    pub fn append(mut self, values: Value) -> Self {
        self.append = Some(values);
        self
    }

    /// `_prepend`: prepends to `jsonb` columns.
    pub fn prepend(mut self, values: Value) -> Self {
        self.prepend = Some(values);
        self
    }

    pub fn delete_key(mut self, values: Value) -> Self {
        self.delete_key = Some(values);
        self
    }

    pub fn delete_elem(mut self, values: Value) -> Self {
        self.delete_elem = Some(values);
        self
    }

    pub fn delete_at_path(mut self, values: Value) -> Self {
        self.delete_at_path = Some(values);
        self
    }

    fn entries(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        [
            ("_set", &self.set),
            ("_inc", &self.inc),
            ("_append", &self.append),
            ("_prepend", &self.prepend),
            ("_delete_key", &self.delete_key),
            ("_delete_elem", &self.delete_elem),
            ("_delete_at_path", &self.delete_at_path),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|value| (name, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Returns one argument per operator, each typed `<table><op>_input`.
    pub fn arguments(&self, schema: &ModelSchema) -> Result<Vec<Argument>, DocumentError> {
        if self.is_empty() {
            return Err(DocumentError::MissingUpdateOperation);
        }
        let table = schema.qualified_name();
        self.entries()
            .map(|(name, value)| {
                as_object(value, &table, name)?;
                Ok(Argument::bound(name, format!("{table}{name}_input"), value.clone()))
            })
            .collect()
    }

    /// Returns the operators as a JSON object, the shape used inside
    /// `<table>_updates` entries.
    pub fn to_object(&self) -> Map<String, Value> {
        self.entries()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }
}

/// Converts SQL function arguments to the representation Postgres expects:
/// lists become array literals such as `{a,b}` and objects become JSON text.
pub fn sql_function_args(args: &Map<String, Value>) -> Map<String, Value> {
    args.iter()
        .map(|(name, value)| (name.clone(), sql_function_value(value)))
        .collect()
}

fn sql_function_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            Value::String(format!("{{{}}}", items.join(",")))
        }
        Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

pub(crate) fn as_object<'a>(
    value: &'a Value,
    table: &str,
    argument: &str,
) -> Result<&'a Map<String, Value>, DocumentError> {
    value.as_object().ok_or_else(|| DocumentError::InvalidArgument {
        table: table.to_string(),
        argument: argument.to_string(),
        expected: "object",
    })
}

pub(crate) fn check_columns(schema: &ModelSchema, columns: &[String]) -> Result<(), DocumentError> {
    match columns.iter().find(|column| schema.field(column).is_none()) {
        Some(column) => Err(DocumentError::UnknownField {
            table: schema.qualified_name(),
            field: column.clone(),
        }),
        None => Ok(()),
    }
}
