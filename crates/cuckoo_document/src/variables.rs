//! Variable registry.
//!
//! Every bound value in a document becomes a named variable. Names derive from
//! the role of the value (`uuid`, `title`, `limit`, ...); the first occurrence
//! of a base name keeps it bare and later occurrences get `_1`, `_2`, ... in
//! the order they are bound.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::Value;

/// A declared variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Declared GraphQL type, e.g. `uuid!` or `[authors_order_by!]`.
    pub type_name: String,
    /// Bound value.
    pub value: Value,
}

/// Variables of one document, in binding order.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    variables: IndexMap<String, Variable>,
    occurrences: FxHashMap<String, usize>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a value site and returns the variable name assigned to it.
    pub fn bind(&mut self, base: &str, type_name: impl Into<String>, value: Value) -> String {
        let name = self.next_name(&sanitize(base));
        self.variables.insert(
            name.clone(),
            Variable {
                type_name: type_name.into(),
                value,
            },
        );
        name
    }

    fn next_name(&mut self, base: &str) -> String {
        loop {
            let count = self.occurrences.entry(base.to_string()).or_insert(0);
            let candidate = if *count == 0 {
                base.to_string()
            } else {
                format!("{base}_{count}")
            };
            *count += 1;

            // A suffixed name can clash with a literal base such as `title_1`.
            if !self.variables.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Returns `$name: Type` declarations in binding order.
    pub fn declarations(&self) -> impl Iterator<Item = String> + '_ {
        self.variables
            .iter()
            .map(|(name, variable)| format!("${}: {}", name, variable.type_name))
    }

    /// Consumes the registry into the ordered variable map sent with the document.
    pub fn into_values(self) -> IndexMap<String, Value> {
        self.variables
            .into_iter()
            .map(|(name, variable)| (name, variable.value))
            .collect()
    }
}

/// Turns an arbitrary key into a valid GraphQL name.
fn sanitize(base: &str) -> String {
    let trimmed = base.trim_start_matches('_');
    let mut name: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push_str("var");
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}
