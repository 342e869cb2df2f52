//! Model schema descriptors.
//!
//! Every typed model describes its backing table through a static
//! [`ModelSchema`]: the table name, the Postgres schema it lives in, its scalar
//! columns with their GraphQL scalar types, its relations, and its primary key.
//!
//! ```ignore
//! impl Model for Author {
//!     fn schema() -> &'static ModelSchema {
//!         static SCHEMA: ModelSchema = ModelSchema::new("authors")
//!             .fields(&[FieldDef::new("uuid", "uuid"), FieldDef::new("name", "String")])
//!             .relations(&[RelationDef::many("articles", Article::schema)])
//!             .primary_key(&["uuid"]);
//!         &SCHEMA
//!     }
//! }
//! ```

use serde::de::DeserializeOwned;

/// Postgres schema whose tables are exposed without a prefix.
pub const PUBLIC_SCHEMA: &str = "public";

/// A typed model backed by a table.
pub trait Model: DeserializeOwned + Send + Sync + 'static {
    /// Returns the static description of the model's table.
    fn schema() -> &'static ModelSchema;
}

/// How many related rows a relation resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// An object relation.
    One,
    /// An array relation.
    Many,
}

/// A scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Column name.
    pub name: &'static str,
    /// GraphQL scalar type, e.g. `uuid`, `String`, `Int`, `timestamptz`.
    pub graphql_type: &'static str,
}

impl FieldDef {
    pub const fn new(name: &'static str, graphql_type: &'static str) -> Self {
        Self { name, graphql_type }
    }
}

/// A relation to another model.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    /// Relation field name on the owning model.
    pub name: &'static str,
    /// Accessor for the related model's schema.
    pub target: fn() -> &'static ModelSchema,
    /// Whether the relation is an object or an array relation.
    pub cardinality: Cardinality,
}

impl RelationDef {
    /// Creates an object relation.
    pub const fn one(name: &'static str, target: fn() -> &'static ModelSchema) -> Self {
        Self {
            name,
            target,
            cardinality: Cardinality::One,
        }
    }

    /// Creates an array relation.
    pub const fn many(name: &'static str, target: fn() -> &'static ModelSchema) -> Self {
        Self {
            name,
            target,
            cardinality: Cardinality::Many,
        }
    }

    /// Returns the related model's schema.
    pub fn target(&self) -> &'static ModelSchema {
        (self.target)()
    }
}

/// Static description of a table.
#[derive(Debug)]
pub struct ModelSchema {
    /// Postgres schema the table lives in.
    pub schema: &'static str,
    /// Table name without schema prefix.
    pub table: &'static str,
    /// Scalar columns.
    pub fields: &'static [FieldDef],
    /// Relations to other tables.
    pub relations: &'static [RelationDef],
    /// Primary key column names.
    pub primary_key: &'static [&'static str],
}

impl ModelSchema {
    /// Creates a schema for a table in the `public` schema.
    pub const fn new(table: &'static str) -> Self {
        Self {
            schema: PUBLIC_SCHEMA,
            table,
            fields: &[],
            relations: &[],
            primary_key: &[],
        }
    }

    /// Places the table in another Postgres schema.
    pub const fn in_schema(mut self, schema: &'static str) -> Self {
        self.schema = schema;
        self
    }

    pub const fn fields(mut self, fields: &'static [FieldDef]) -> Self {
        self.fields = fields;
        self
    }

    pub const fn relations(mut self, relations: &'static [RelationDef]) -> Self {
        self.relations = relations;
        self
    }

    pub const fn primary_key(mut self, primary_key: &'static [&'static str]) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Returns the table name as exposed by the GraphQL API.
    ///
    /// Tables outside the `public` schema are prefixed with their schema name,
    /// e.g. `anomaly_signals` for table `signals` in schema `anomaly`.
    pub fn qualified_name(&self) -> String {
        self.prefixed(self.table)
    }

    /// Prefixes a name with the table's schema unless it is `public`.
    pub fn prefixed(&self, label: &str) -> String {
        if self.schema == PUBLIC_SCHEMA {
            label.to_string()
        } else {
            format!("{}_{}", self.schema, label)
        }
    }

    /// Looks up a scalar column.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Looks up a relation.
    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Returns the scalar column names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|field| field.name)
    }

    /// Returns true if both descriptors address the same table.
    pub fn is_same_table(&self, other: &ModelSchema) -> bool {
        self.schema == other.schema && self.table == other.table
    }
}

/// Schemas are equal when they describe the same table.
impl PartialEq for ModelSchema {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_table(other)
    }
}

impl Eq for ModelSchema {}

#[cfg(test)]
mod tests {
    use super::*;

    static SIGNALS: ModelSchema = ModelSchema::new("signals")
        .in_schema("anomaly")
        .fields(&[FieldDef::new("uuid", "uuid"), FieldDef::new("score", "Float")])
        .primary_key(&["uuid"]);

    static USERS: ModelSchema = ModelSchema::new("users");

    #[test]
    fn test_qualified_name() {
        assert_eq!(SIGNALS.qualified_name(), "anomaly_signals");
        assert_eq!(USERS.qualified_name(), "users");
        assert_eq!(SIGNALS.prefixed("score_fn"), "anomaly_score_fn");
    }

    #[test]
    fn test_field_lookup() {
        assert_eq!(SIGNALS.field("score").map(|f| f.graphql_type), Some("Float"));
        assert!(SIGNALS.field("missing").is_none());
        assert_eq!(SIGNALS.field_names().collect::<Vec<_>>(), ["uuid", "score"]);
    }

    #[test]
    fn test_same_table() {
        assert!(SIGNALS.is_same_table(&SIGNALS));
        assert!(!SIGNALS.is_same_table(&USERS));
    }

    #[test]
    fn test_schema_equality_follows_table() {
        static SIGNALS_AGAIN: ModelSchema = ModelSchema::new("signals").in_schema("anomaly");
        static PUBLIC_SIGNALS: ModelSchema = ModelSchema::new("signals");

        assert_eq!(SIGNALS, SIGNALS_AGAIN);
        assert_ne!(SIGNALS, PUBLIC_SIGNALS);
        assert_ne!(&SIGNALS, &USERS);
    }
}
