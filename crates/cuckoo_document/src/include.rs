//! Column selections and includes.
//!
//! A [`Columns`] value lists what a node returns: scalar column names and
//! [`Include`]s of related models. Includes are resolved against the parent
//! model only when the selection is, so the same include can be reused under
//! different parents.

use rustc_hash::FxHashSet;

use crate::aggregate::Aggregates;
use crate::args::Conditions;
use crate::error::DocumentError;
use crate::model::{Cardinality, Model, ModelSchema, RelationDef};
use crate::node::{aggregate_selection, OperationKind, OperationNode, Selection};

/// Builds a [`Columns`] value from column names and includes.
///
/// ```ignore
/// let columns = columns!["uuid", Include::of::<Article>().many(Conditions::new()).returning(["title"])];
/// ```
#[macro_export]
macro_rules! columns {
    () => {
        $crate::Columns::default()
    };
    ($($column:expr),+ $(,)?) => {
        $crate::Columns::from(vec![$($crate::Column::from($column)),+])
    };
}

/// One entry of a column list.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Field(String),
    Include(Box<IncludeColumn>),
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

impl From<IncludeColumn> for Column {
    fn from(include: IncludeColumn) -> Self {
        Self::Include(Box::new(include))
    }
}

/// Columns requested from a model.
///
/// An empty list selects the primary key. An inverted list selects every
/// scalar column except the listed ones; includes in an inverted list are
/// still selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    items: Vec<Column>,
    inverted: bool,
}

impl Columns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every scalar column except `excluded`.
    pub fn all_except<I, C>(excluded: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        Self {
            items: excluded.into_iter().map(Into::into).collect(),
            inverted: true,
        }
    }

    /// Every scalar column.
    pub fn all() -> Self {
        Self::all_except(Vec::<Column>::new())
    }

    /// Adds a column or include.
    pub fn with(mut self, column: impl Into<Column>) -> Self {
        self.items.push(column.into());
        self
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Resolves the list against `schema` into a selection set.
    pub fn resolve(&self, schema: &'static ModelSchema) -> Result<Vec<Selection>, DocumentError> {
        let table = schema.qualified_name();
        let mut selection = Vec::new();

        if self.inverted {
            let excluded: Vec<&str> = self
                .items
                .iter()
                .filter_map(|column| match column {
                    Column::Field(name) => Some(name.as_str()),
                    Column::Include(_) => None,
                })
                .collect();
            let invalid: Vec<String> = excluded
                .iter()
                .filter(|name| schema.field(name).is_none())
                .map(ToString::to_string)
                .collect();
            if !invalid.is_empty() {
                return Err(DocumentError::InvalidInvertedColumns {
                    table,
                    columns: invalid,
                });
            }
            selection.extend(
                schema
                    .field_names()
                    .filter(|name| !excluded.contains(name))
                    .map(|name| Selection::Field(name.to_string())),
            );
            for column in &self.items {
                if let Column::Include(include) = column {
                    selection.push(Selection::Include(include.resolve(schema)?));
                }
            }
        } else if self.items.is_empty() {
            if schema.primary_key.is_empty() {
                return Err(DocumentError::EmptySelection { table });
            }
            selection.extend(
                schema
                    .primary_key
                    .iter()
                    .map(|name| Selection::Field(name.to_string())),
            );
        } else {
            for column in &self.items {
                selection.push(match column {
                    Column::Field(name) => {
                        if schema.field(name).is_none() {
                            return Err(DocumentError::UnknownField {
                                table,
                                field: name.clone(),
                            });
                        }
                        Selection::Field(name.clone())
                    }
                    Column::Include(include) => Selection::Include(include.resolve(schema)?),
                });
            }
        }

        if selection.is_empty() {
            return Err(DocumentError::EmptySelection { table });
        }
        check_response_keys(&selection)?;
        Ok(selection)
    }
}

impl<C: Into<Column>, const N: usize> From<[C; N]> for Columns {
    fn from(items: [C; N]) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            inverted: false,
        }
    }
}

impl<C: Into<Column>> From<Vec<C>> for Columns {
    fn from(items: Vec<C>) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            inverted: false,
        }
    }
}

fn check_response_keys(selection: &[Selection]) -> Result<(), DocumentError> {
    let mut seen = FxHashSet::default();
    for entry in selection {
        let key = entry.response_key();
        if !seen.insert(key) {
            return Err(DocumentError::DuplicateResponseKey {
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Starts an include of a related model.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    target: &'static ModelSchema,
    field_name: Option<String>,
    alias: Option<String>,
}

impl Include {
    /// Includes the relation to `M`.
    pub fn of<M: Model>() -> Self {
        Self::new(M::schema())
    }

    pub fn new(target: &'static ModelSchema) -> Self {
        Self {
            target,
            field_name: None,
            alias: None,
        }
    }

    /// Names the relation field explicitly, required when the parent has
    /// several relations to the same model.
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    /// Returns the related rows under another response key.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Includes an object relation.
    pub fn one(self) -> IncludeOne {
        IncludeOne { include: self }
    }

    /// Includes an array relation.
    pub fn many(self, conditions: Conditions) -> IncludeMany {
        IncludeMany {
            include: self,
            conditions,
        }
    }

    /// Includes aggregates over an array relation.
    pub fn aggregate(self, conditions: Conditions) -> IncludeAggregate {
        IncludeAggregate {
            include: self,
            conditions,
        }
    }

    fn relation(
        &self,
        parent: &ModelSchema,
        cardinality: Cardinality,
    ) -> Result<&'static RelationDef, DocumentError> {
        let target = self.target.qualified_name();

        if let Some(name) = &self.field_name {
            let relation = parent
                .relation(name)
                .ok_or_else(|| DocumentError::RelationNotFound {
                    parent: parent.qualified_name(),
                    target: target.clone(),
                })?;
            if !relation.target().is_same_table(self.target) || relation.cardinality != cardinality
            {
                return Err(DocumentError::RelationMismatch {
                    parent: parent.qualified_name(),
                    field: name.clone(),
                    target,
                });
            }
            return Ok(relation);
        }

        let candidates: Vec<&'static RelationDef> = parent
            .relations
            .iter()
            .filter(|relation| {
                relation.cardinality == cardinality && relation.target().is_same_table(self.target)
            })
            .collect();
        match candidates.as_slice() {
            [relation] => Ok(*relation),
            [] => Err(DocumentError::RelationNotFound {
                parent: parent.qualified_name(),
                target,
            }),
            _ => Err(DocumentError::AmbiguousRelation {
                parent: parent.qualified_name(),
                target,
                candidates: candidates.iter().map(|r| r.name.to_string()).collect(),
            }),
        }
    }
}

/// Finalizer of an object relation include.
#[derive(Debug, Clone)]
pub struct IncludeOne {
    include: Include,
}

impl IncludeOne {
    pub fn returning(self, columns: impl Into<Columns>) -> IncludeColumn {
        IncludeColumn {
            include: self.include,
            shape: IncludeShape::One(columns.into()),
        }
    }
}

/// Finalizer of an array relation include.
#[derive(Debug, Clone)]
pub struct IncludeMany {
    include: Include,
    conditions: Conditions,
}

impl IncludeMany {
    pub fn returning(self, columns: impl Into<Columns>) -> IncludeColumn {
        IncludeColumn {
            include: self.include,
            shape: IncludeShape::Many(self.conditions, columns.into()),
        }
    }
}

/// Finalizer of an aggregate include.
#[derive(Debug, Clone)]
pub struct IncludeAggregate {
    include: Include,
    conditions: Conditions,
}

impl IncludeAggregate {
    pub fn on(self, aggregates: Aggregates) -> IncludeColumn {
        self.finish(aggregates, None)
    }

    /// Requests aggregates and the matched rows.
    pub fn with_nodes(self, aggregates: Aggregates, columns: impl Into<Columns>) -> IncludeColumn {
        self.finish(aggregates, Some(columns.into()))
    }

    pub fn count(self) -> IncludeColumn {
        self.on(Aggregates::new().count())
    }

    pub fn avg<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> IncludeColumn {
        self.on(Aggregates::new().avg(columns))
    }

    pub fn max<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> IncludeColumn {
        self.on(Aggregates::new().max(columns))
    }

    pub fn min<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> IncludeColumn {
        self.on(Aggregates::new().min(columns))
    }

    pub fn sum<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> IncludeColumn {
        self.on(Aggregates::new().sum(columns))
    }

    fn finish(self, aggregates: Aggregates, nodes: Option<Columns>) -> IncludeColumn {
        IncludeColumn {
            include: self.include,
            shape: IncludeShape::Aggregate {
                conditions: self.conditions,
                aggregates,
                nodes,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum IncludeShape {
    One(Columns),
    Many(Conditions, Columns),
    Aggregate {
        conditions: Conditions,
        aggregates: Aggregates,
        nodes: Option<Columns>,
    },
}

/// A finalized include, usable as a [`Column`].
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeColumn {
    include: Include,
    shape: IncludeShape,
}

impl IncludeColumn {
    fn resolve(&self, parent: &ModelSchema) -> Result<OperationNode, DocumentError> {
        let target = self.include.target;
        let node = match &self.shape {
            IncludeShape::One(columns) => {
                let relation = self.include.relation(parent, Cardinality::One)?;
                OperationNode::include(OperationKind::IncludeOne, target, relation.name.to_string())
                    .with_selection(columns.resolve(target)?)
            }
            IncludeShape::Many(conditions, columns) => {
                let relation = self.include.relation(parent, Cardinality::Many)?;
                OperationNode::include(
                    OperationKind::IncludeMany,
                    target,
                    relation.name.to_string(),
                )
                .with_arguments(conditions.arguments(target)?)
                .with_selection(columns.resolve(target)?)
            }
            IncludeShape::Aggregate {
                conditions,
                aggregates,
                nodes,
            } => {
                let relation = self.include.relation(parent, Cardinality::Many)?;
                OperationNode::include(
                    OperationKind::IncludeAggregate,
                    target,
                    format!("{}_aggregate", relation.name),
                )
                .with_arguments(conditions.arguments(target)?)
                .with_selection(aggregate_selection(target, aggregates, nodes.as_ref())?)
            }
        };

        Ok(match &self.include.alias {
            Some(alias) => node.with_alias(alias.clone()),
            None => node,
        })
    }
}
