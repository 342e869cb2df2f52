//! Aggregate function selections.

use crate::error::DocumentError;
use crate::model::ModelSchema;

/// A column-wise aggregate function. `count` is modelled separately since it
/// takes arguments instead of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Avg,
    Max,
    Min,
    Stddev,
    StddevPop,
    StddevSamp,
    Sum,
    VarPop,
    VarSamp,
    Variance,
}

impl AggregateFunction {
    /// All functions in emission order.
    pub const ALL: [AggregateFunction; 10] = [
        Self::Avg,
        Self::Max,
        Self::Min,
        Self::Stddev,
        Self::StddevPop,
        Self::StddevSamp,
        Self::Sum,
        Self::VarPop,
        Self::VarSamp,
        Self::Variance,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
            Self::Stddev => "stddev",
            Self::StddevPop => "stddev_pop",
            Self::StddevSamp => "stddev_samp",
            Self::Sum => "sum",
            Self::VarPop => "var_pop",
            Self::VarSamp => "var_samp",
            Self::Variance => "variance",
        }
    }

    /// Returns true if the function yields floating point values rather than
    /// values shaped like the column itself.
    pub const fn is_numeric(&self) -> bool {
        !matches!(self, Self::Max | Self::Min)
    }

    const fn index(&self) -> usize {
        *self as usize
    }
}

/// Arguments of `count`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSpec {
    pub columns: Option<Vec<String>>,
    pub distinct: Option<bool>,
}

impl CountSpec {
    pub fn has_arguments(&self) -> bool {
        self.columns.is_some() || self.distinct.is_some()
    }
}

/// The set of aggregates requested from an `aggregate { ... }` selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregates {
    count: Option<CountSpec>,
    functions: [Option<Vec<String>>; 10],
}

impl Aggregates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests `count` over all matched rows.
    pub fn count(mut self) -> Self {
        self.count = Some(CountSpec::default());
        self
    }

    /// Requests `count` restricted to columns and/or distinct values.
    pub fn count_with<I, S>(mut self, columns: Option<I>, distinct: Option<bool>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.count = Some(CountSpec {
            columns: columns.map(|columns| columns.into_iter().map(Into::into).collect()),
            distinct,
        });
        self
    }

    pub fn avg<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::Avg, columns)
    }

    pub fn max<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::Max, columns)
    }

    pub fn min<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::Min, columns)
    }

    pub fn stddev<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::Stddev, columns)
    }

    pub fn stddev_pop<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::StddevPop, columns)
    }

    pub fn stddev_samp<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::StddevSamp, columns)
    }

    pub fn sum<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::Sum, columns)
    }

    pub fn var_pop<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::VarPop, columns)
    }

    pub fn var_samp<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::VarSamp, columns)
    }

    pub fn variance<I: IntoIterator<Item = S>, S: Into<String>>(self, columns: I) -> Self {
        self.function(AggregateFunction::Variance, columns)
    }

    /// Requests a column-wise aggregate function.
    pub fn function<I, S>(mut self, function: AggregateFunction, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.functions[function.index()] = if columns.is_empty() {
            None
        } else {
            Some(columns)
        };
        self
    }

    pub fn count_spec(&self) -> Option<&CountSpec> {
        self.count.as_ref()
    }

    /// Returns the requested functions with their columns, in emission order.
    pub fn functions(&self) -> impl Iterator<Item = (AggregateFunction, &[String])> + '_ {
        AggregateFunction::ALL.iter().filter_map(|function| {
            self.functions[function.index()]
                .as_deref()
                .map(|columns| (*function, columns))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.count.is_none() && self.functions.iter().all(Option::is_none)
    }

    /// Returns true if only `count` was requested.
    pub fn is_count_only(&self) -> bool {
        self.count.is_some() && self.functions.iter().all(Option::is_none)
    }

    /// Checks that something was requested and that every column exists.
    pub fn validate(&self, schema: &ModelSchema) -> Result<(), DocumentError> {
        if self.is_empty() {
            return Err(DocumentError::MissingAggregate);
        }

        let count_columns = self
            .count
            .as_ref()
            .and_then(|count| count.columns.as_deref())
            .unwrap_or_default();
        let function_columns = self.functions().flat_map(|(_, columns)| columns);

        for column in count_columns.iter().chain(function_columns) {
            if schema.field(column).is_none() {
                return Err(DocumentError::UnknownField {
                    table: schema.qualified_name(),
                    field: column.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDef;

    static AUTHORS: ModelSchema = ModelSchema::new("authors")
        .fields(&[FieldDef::new("uuid", "uuid"), FieldDef::new("age", "Int")])
        .primary_key(&["uuid"]);

    #[test]
    fn test_functions_follow_emission_order() {
        let aggregates = Aggregates::new().sum(["age"]).max(["age", "uuid"]).avg(["age"]);
        let names: Vec<_> = aggregates.functions().map(|(f, _)| f.as_str()).collect();
        assert_eq!(names, ["avg", "max", "sum"]);
    }

    #[test]
    fn test_empty_aggregates_are_rejected() {
        assert_eq!(
            Aggregates::new().validate(&AUTHORS),
            Err(DocumentError::MissingAggregate)
        );
        assert_eq!(
            Aggregates::new().max(Vec::<String>::new()).validate(&AUTHORS),
            Err(DocumentError::MissingAggregate)
        );
    }

    #[test]
    fn test_unknown_columns_are_rejected() {
        let err = Aggregates::new().avg(["height"]).validate(&AUTHORS).unwrap_err();
        assert!(matches!(err, DocumentError::UnknownField { field, .. } if field == "height"));

        let err = Aggregates::new()
            .count_with(Some(["height"]), None)
            .validate(&AUTHORS)
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnknownField { .. }));
    }

    #[test]
    fn test_count_only() {
        assert!(Aggregates::new().count().is_count_only());
        assert!(!Aggregates::new().count().min(["age"]).is_count_only());
        assert!(!Aggregates::new().count().count_spec().unwrap().has_arguments());
    }

    #[test]
    fn test_numeric_functions() {
        assert!(AggregateFunction::Avg.is_numeric());
        assert!(AggregateFunction::Variance.is_numeric());
        assert!(!AggregateFunction::Max.is_numeric());
        assert!(!AggregateFunction::Min.is_numeric());
    }
}
