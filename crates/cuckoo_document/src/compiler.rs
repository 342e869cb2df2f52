//! Document compiler.
//!
//! Serializes root operation nodes into one single-line GraphQL document:
//!
//! ```text
//! query Query($uuid: uuid!) { op0: authors_by_pk(uuid: $uuid) { uuid articles { title } } }
//! ```
//!
//! Variables are bound while the body is written, in depth-first order of the
//! tree, and the header is emitted afterwards. Compiling the same tree twice
//! yields byte-identical output.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::aggregate::Aggregates;
use crate::args::{ArgValue, Argument};
use crate::error::DocumentError;
use crate::model::ModelSchema;
use crate::node::{OperationNode, OperationType, Selection};
use crate::variables::VariableRegistry;

/// Root operations of one document.
#[derive(Debug, Clone)]
pub struct Document {
    operation_type: OperationType,
    roots: Vec<OperationNode>,
}

impl Document {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            roots: Vec::new(),
        }
    }

    /// Creates a document holding a single root.
    pub fn single(node: OperationNode) -> Result<(Self, String), DocumentError> {
        let operation_type = node
            .operation_type()
            .ok_or(DocumentError::MixedOperationTypes {
                document: OperationType::Query.keyword(),
                node: node.kind().as_str(),
            })?;
        let mut document = Self::new(operation_type);
        let alias = document.push(node)?;
        Ok((document, alias))
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    /// Appends a root and returns the alias its result is keyed by.
    ///
    /// Roots without an alias are named `op<index>`.
    pub fn push(&mut self, mut node: OperationNode) -> Result<String, DocumentError> {
        if node.operation_type() != Some(self.operation_type) {
            return Err(DocumentError::MixedOperationTypes {
                document: self.operation_type.keyword(),
                node: node.kind().as_str(),
            });
        }

        let alias = match node.alias() {
            Some(alias) => {
                if self.is_taken(alias) {
                    return Err(DocumentError::DuplicateAlias {
                        alias: alias.to_string(),
                    });
                }
                alias.to_string()
            }
            None => {
                let mut index = self.roots.len();
                while self.is_taken(&format!("op{index}")) {
                    index += 1;
                }
                format!("op{index}")
            }
        };

        node.set_alias(alias.clone());
        self.roots.push(node);
        Ok(alias)
    }

    fn is_taken(&self, alias: &str) -> bool {
        self.roots.iter().any(|root| root.alias() == Some(alias))
    }

    pub fn roots(&self) -> &[OperationNode] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn compile(&self) -> CompiledDocument {
        Compiler::default().compile(self)
    }
}

/// A compiled document ready for transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledDocument {
    pub query: String,
    pub variables: IndexMap<String, Value>,
}

#[derive(Default)]
struct Compiler {
    output: String,
    registry: VariableRegistry,
}

impl Compiler {
    fn compile(mut self, document: &Document) -> CompiledDocument {
        for (index, root) in document.roots.iter().enumerate() {
            if index > 0 {
                self.output.push(' ');
            }
            self.write_node(root);
        }

        let operation_type = document.operation_type;
        let mut query = String::with_capacity(self.output.len() + 64);
        query.push_str(operation_type.keyword());
        query.push(' ');
        query.push_str(operation_type.name());
        if !self.registry.is_empty() {
            query.push('(');
            query.push_str(&self.registry.declarations().collect::<Vec<_>>().join(", "));
            query.push(')');
        }
        query.push_str(" { ");
        query.push_str(&self.output);
        query.push_str(" }");

        CompiledDocument {
            query,
            variables: self.registry.into_values(),
        }
    }

    fn write_node(&mut self, node: &OperationNode) {
        if let Some(alias) = node.alias() {
            self.output.push_str(alias);
            self.output.push_str(": ");
        }
        self.output.push_str(node.field());
        self.write_arguments(node.arguments());
        self.output.push(' ');
        self.write_selection_set(node.schema(), node.selection());
    }

    fn write_arguments(&mut self, arguments: &[Argument]) {
        if arguments.is_empty() {
            return;
        }
        self.output.push('(');
        for (index, argument) in arguments.iter().enumerate() {
            if index > 0 {
                self.output.push_str(", ");
            }
            self.output.push_str(&argument.name);
            self.output.push_str(": ");
            self.write_value(&argument.value);
        }
        self.output.push(')');
    }

    fn write_value(&mut self, value: &ArgValue) {
        match value {
            ArgValue::Variable(binding) => {
                let name = self.registry.bind(
                    &binding.base,
                    binding.type_name.as_str(),
                    binding.value.clone(),
                );
                self.output.push('$');
                self.output.push_str(&name);
            }
            ArgValue::Object(entries) => {
                self.output.push('{');
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        self.output.push_str(", ");
                    }
                    self.output.push_str(key);
                    self.output.push_str(": ");
                    self.write_value(value);
                }
                self.output.push('}');
            }
        }
    }

    fn write_selection_set(&mut self, schema: &ModelSchema, selection: &[Selection]) {
        self.output.push('{');
        for entry in selection {
            self.output.push(' ');
            match entry {
                Selection::Field(name) => self.output.push_str(name),
                Selection::Include(node) => self.write_node(node),
                Selection::Returning(inner) => {
                    self.output.push_str("returning ");
                    self.write_selection_set(schema, inner);
                }
                Selection::AffectedRows => self.output.push_str("affected_rows"),
                Selection::Aggregate(aggregates) => self.write_aggregate(schema, aggregates),
                Selection::Nodes(inner) => {
                    self.output.push_str("nodes ");
                    self.write_selection_set(schema, inner);
                }
            }
        }
        self.output.push_str(" }");
    }

    fn write_aggregate(&mut self, schema: &ModelSchema, aggregates: &Aggregates) {
        self.output.push_str("aggregate {");

        if let Some(count) = aggregates.count_spec() {
            self.output.push_str(" count");
            if count.has_arguments() {
                let table = schema.qualified_name();
                let mut arguments = Vec::new();
                if let Some(columns) = &count.columns {
                    arguments.push(Argument::bound(
                        "columns",
                        format!("[{table}_select_column!]"),
                        Value::from(columns.clone()),
                    ));
                }
                if let Some(distinct) = count.distinct {
                    arguments.push(Argument::bound("distinct", "Boolean", Value::Bool(distinct)));
                }
                self.write_arguments(&arguments);
            }
        }

        for (function, columns) in aggregates.functions() {
            self.output.push(' ');
            self.output.push_str(function.as_str());
            self.output.push_str(" {");
            for column in columns {
                self.output.push(' ');
                self.output.push_str(column);
            }
            self.output.push_str(" }");
        }

        self.output.push_str(" }");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregates;
    use crate::args::{Conditions, UpdateOps};
    use crate::include::{Columns, Include};
    use crate::model::{FieldDef, RelationDef};
    use crate::node::MutationOutput;
    use serde_json::json;

    fn articles() -> &'static ModelSchema {
        &ARTICLES
    }

    static AUTHORS: ModelSchema = ModelSchema::new("authors")
        .fields(&[
            FieldDef::new("uuid", "uuid"),
            FieldDef::new("name", "String"),
            FieldDef::new("age", "Int"),
        ])
        .relations(&[
            RelationDef::many("articles", articles),
            RelationDef::many("reviewed_articles", articles),
        ])
        .primary_key(&["uuid"]);

    static ARTICLES: ModelSchema = ModelSchema::new("articles")
        .fields(&[FieldDef::new("uuid", "uuid"), FieldDef::new("title", "String")])
        .primary_key(&["uuid"]);

    static SIGNALS: ModelSchema = ModelSchema::new("signals")
        .in_schema("anomaly")
        .fields(&[FieldDef::new("uuid", "uuid"), FieldDef::new("score", "Float")])
        .primary_key(&["uuid"]);

    fn compile(operation_type: OperationType, nodes: Vec<OperationNode>) -> CompiledDocument {
        let mut document = Document::new(operation_type);
        for node in nodes {
            document.push(node).unwrap();
        }
        document.compile()
    }

    fn nested_author_query() -> OperationNode {
        let columns = crate::columns![
            "uuid",
            Include::new(&ARTICLES)
                .field_name("articles")
                .many(Conditions::new())
                .returning(["title"]),
        ];
        OperationNode::select_by_pk(&AUTHORS, &json!("ABC"), &columns).unwrap()
    }

    #[test]
    fn test_nested_select_by_pk() {
        let compiled = compile(OperationType::Query, vec![nested_author_query()]);
        insta::assert_snapshot!(compiled.query, @"query Query($uuid: uuid!) { op0: authors_by_pk(uuid: $uuid) { uuid articles { title } } }");
        assert_eq!(json!(compiled.variables), json!({"uuid": "ABC"}));
    }

    #[test]
    fn test_sibling_includes_get_suffixed_variables() {
        let columns = crate::columns![
            "uuid",
            Include::new(&ARTICLES)
                .field_name("articles")
                .many(Conditions::new().where_(json!({"title": {"_eq": "Rust"}})))
                .returning(["title"]),
            Include::new(&ARTICLES)
                .field_name("reviewed_articles")
                .many(Conditions::new().where_(json!({"title": {"_ilike": "%go%"}})))
                .returning(["uuid"]),
        ];
        let node = OperationNode::select_many(&AUTHORS, &Conditions::new(), &columns).unwrap();
        let compiled = compile(OperationType::Query, vec![node]);

        insta::assert_snapshot!(compiled.query, @"query Query($title: String_comparison_exp, $title_1: String_comparison_exp) { op0: authors { uuid articles(where: {title: $title}) { title } reviewed_articles(where: {title: $title_1}) { uuid } } }");
        assert_eq!(
            json!(compiled.variables),
            json!({"title": {"_eq": "Rust"}, "title_1": {"_ilike": "%go%"}})
        );
    }

    #[test]
    fn test_document_without_variables() {
        let node =
            OperationNode::select_many(&AUTHORS, &Conditions::new(), &Columns::default()).unwrap();
        let compiled = compile(OperationType::Query, vec![node]);
        insta::assert_snapshot!(compiled.query, @"query Query { op0: authors { uuid } }");
        assert!(compiled.variables.is_empty());
    }

    #[test]
    fn test_mutation_with_two_roots() {
        let insert = OperationNode::insert_one(
            &AUTHORS,
            json!({"name": "Ann"}),
            None,
            &Columns::from(["uuid"]),
        )
        .unwrap();
        let update = OperationNode::update_by_pk(
            &AUTHORS,
            &json!("ABC"),
            &UpdateOps::new().set(json!({"name": "Bob"})),
            &Columns::from(["uuid", "name"]),
        )
        .unwrap();
        let compiled = compile(OperationType::Mutation, vec![insert, update]);

        insta::assert_snapshot!(compiled.query, @"mutation Mutation($object: authors_insert_input!, $uuid: uuid!, $set: authors_set_input) { op0: insert_authors_one(object: $object) { uuid } op1: update_authors_by_pk(pk_columns: {uuid: $uuid}, _set: $set) { uuid name } }");
        assert_eq!(
            json!(compiled.variables),
            json!({"object": {"name": "Ann"}, "uuid": "ABC", "set": {"name": "Bob"}})
        );
    }

    #[test]
    fn test_aggregate_with_nodes() {
        let node = OperationNode::aggregate(
            &AUTHORS,
            &Conditions::new().where_(json!({"age": {"_gt": 30}})).limit(10),
            &Aggregates::new()
                .max(["age"])
                .avg(["age"])
                .count_with(Some(["name"]), Some(true)),
            Some(&Columns::from(["name"])),
        )
        .unwrap();
        let compiled = compile(OperationType::Query, vec![node]);

        insta::assert_snapshot!(compiled.query, @"query Query($age: Int_comparison_exp, $limit: Int, $columns: [authors_select_column!], $distinct: Boolean) { op0: authors_aggregate(where: {age: $age}, limit: $limit) { aggregate { count(columns: $columns, distinct: $distinct) avg { age } max { age } } nodes { name } } }");
        assert_eq!(
            json!(compiled.variables),
            json!({"age": {"_gt": 30}, "limit": 10, "columns": ["name"], "distinct": true})
        );
    }

    #[test]
    fn test_multi_row_mutations() {
        let delete = OperationNode::delete_many(
            &AUTHORS,
            &json!({"name": {"_eq": "Ann"}}),
            &MutationOutput::ReturningWithRows(Columns::from(["uuid"])),
        )
        .unwrap();
        let update = OperationNode::update_many(
            &AUTHORS,
            &json!({}),
            &UpdateOps::new().inc(json!({"age": 1})),
            &MutationOutput::AffectedRows,
        )
        .unwrap();
        let compiled = compile(OperationType::Mutation, vec![delete, update]);

        insta::assert_snapshot!(compiled.query, @"mutation Mutation($name: String_comparison_exp, $inc: authors_inc_input) { op0: delete_authors(where: {name: $name}) { returning { uuid } affected_rows } op1: update_authors(where: {}, _inc: $inc) { affected_rows } }");
    }

    #[test]
    fn test_sql_function_and_schema_prefix() {
        let node = OperationNode::function_many(
            OperationType::Query,
            &SIGNALS,
            "top_signals",
            &json!({"kinds": ["spike", "drop"]}),
            &Conditions::new().limit(5),
            &Columns::from(["uuid", "score"]),
        )
        .unwrap();
        let by_pk =
            OperationNode::select_by_pk(&SIGNALS, &json!("S1"), &Columns::default()).unwrap();
        let compiled = compile(OperationType::Query, vec![node, by_pk]);

        insta::assert_snapshot!(compiled.query, @"query Query($args: anomaly_top_signals_args!, $limit: Int, $uuid: uuid!) { op0: anomaly_top_signals(args: $args, limit: $limit) { uuid score } op1: anomaly_signals_by_pk(uuid: $uuid) { uuid } }");
        assert_eq!(compiled.variables["args"], json!({"kinds": "{spike,drop}"}));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let mut document = Document::new(OperationType::Query);
        document.push(nested_author_query()).unwrap();
        document.push(nested_author_query()).unwrap();

        let first = document.compile();
        let second = document.compile();
        assert_eq!(first, second);
        assert_eq!(
            first.variables.keys().collect::<Vec<_>>(),
            ["uuid", "uuid_1"]
        );
    }

    #[test]
    fn test_every_declared_variable_is_referenced() {
        let mut document = Document::new(OperationType::Query);
        document.push(nested_author_query()).unwrap();
        document
            .push(
                OperationNode::select_many(
                    &AUTHORS,
                    &Conditions::new().where_(json!({"uuid": {"_eq": "X"}})).limit(1),
                    &Columns::default(),
                )
                .unwrap(),
            )
            .unwrap();
        let compiled = document.compile();
        let (header, body) = compiled.query.split_once(") {").unwrap();

        for name in compiled.variables.keys() {
            assert_eq!(header.matches(&format!("${name}:")).count(), 1);
            assert!(body.contains(&format!("${name}")));
        }
    }

    #[test]
    fn test_push_assigns_and_checks_aliases() {
        let mut document = Document::new(OperationType::Query);
        let first = nested_author_query().with_alias("op1");
        assert_eq!(document.push(first).unwrap(), "op1");
        assert_eq!(document.push(nested_author_query()).unwrap(), "op2");
        assert_eq!(
            document.push(nested_author_query().with_alias("op2")),
            Err(DocumentError::DuplicateAlias { alias: "op2".into() })
        );
    }

    #[test]
    fn test_push_rejects_mixed_operation_types() {
        let mut document = Document::new(OperationType::Query);
        let delete =
            OperationNode::delete_by_pk(&AUTHORS, &json!("ABC"), &Columns::default()).unwrap();
        assert_eq!(
            document.push(delete),
            Err(DocumentError::MixedOperationTypes {
                document: "query",
                node: "delete_one"
            })
        );
    }
}
