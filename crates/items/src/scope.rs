//! Scope labels: `type/component[/component...]`.

use std::fmt;
use std::str::FromStr;

use crate::kinds::ScopeType;
use crate::ItemError;

/// A parsed scope label such as `chapter/3` or `attribute/w/lemma/0/ἀρχή`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeLabel {
    pub scope_type: ScopeType,
    pub components: Vec<String>,
}

impl ScopeLabel {
    /// Builds a label, checking the component count against the type's arity.
    pub fn new(scope_type: ScopeType, components: Vec<String>) -> Result<Self, ItemError> {
        if components.len() != scope_type.arity() {
            return Err(ItemError::Arity {
                scope_type,
                expected: scope_type.arity(),
                found: components.len(),
            });
        }
        Ok(Self {
            scope_type,
            components,
        })
    }

    /// First component, e.g. `3` for `chapter/3`.
    #[must_use]
    pub fn value(&self) -> &str {
        self.components.first().map(String::as_str).unwrap_or("")
    }
}

impl FromStr for ScopeLabel {
    type Err = ItemError;

    /// The last component keeps any further `/`, so `milestone/a/b` has the
    /// single component `a/b`.
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let (type_name, rest) = label
            .split_once('/')
            .ok_or_else(|| ItemError::BadLabel(label.to_string()))?;
        let scope_type: ScopeType = type_name.parse()?;
        let components: Vec<String> = rest
            .splitn(scope_type.arity(), '/')
            .map(str::to_string)
            .collect();
        ScopeLabel::new(scope_type, components)
    }
}

impl fmt::Display for ScopeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scope_type.as_str())?;
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

/// Numeric value of a `chapter/<n>` label.
#[must_use]
pub fn chapter_number(label: &str) -> Option<u32> {
    label.strip_prefix("chapter/")?.parse().ok()
}

/// Numeric value of a `verse/<n>` label.
#[must_use]
pub fn verse_number(label: &str) -> Option<u32> {
    label.strip_prefix("verse/")?.parse().ok()
}
