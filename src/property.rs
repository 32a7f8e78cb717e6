//! Property catalog: the structural identity of fields and parameters.
//!
//! Detection compares declarations by *property keys*: the declared name
//! with any leading underscore stripped (backing-field convention) plus the
//! set of type alternatives obtained by splitting the declared type on `|`.
//! Two properties with the same key are structurally equal regardless of
//! which declaration they came from.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Visibility and Modifiers
// ============================================================================

/// Field visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

impl Visibility {
    /// The source keyword for this visibility.
    pub fn keyword(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Non-visibility field modifiers, in canonical emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Static,
    Readonly,
    Abstract,
    Declare,
}

impl Modifier {
    /// The source keyword for this modifier.
    pub fn keyword(&self) -> &'static str {
        match self {
            Modifier::Static => "static",
            Modifier::Readonly => "readonly",
            Modifier::Abstract => "abstract",
            Modifier::Declare => "declare",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ============================================================================
// Property Key
// ============================================================================

/// Structural identity of a property: normalized name plus type alternatives.
///
/// Equality and hashing are defined over the normalized name and the *set*
/// of type alternatives, so `number|string` and `string | number` compare
/// equal, and `_total` matches `total`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyKey {
    /// Declared name with any leading `_` stripped.
    pub name: String,
    /// Type alternatives, split on `|` and trimmed.
    pub types: BTreeSet<String>,
}

impl PropertyKey {
    /// Build a key from a declared name and type text.
    pub fn new(declared_name: &str, type_text: &str) -> Self {
        let name = declared_name
            .strip_prefix('_')
            .unwrap_or(declared_name)
            .to_string();
        let types = type_text
            .split('|')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        PropertyKey { name, types }
    }

    /// Canonical rendering of the type alternatives (sorted, `|`-joined).
    pub fn type_set_display(&self) -> String {
        self.types.iter().cloned().collect::<Vec<_>>().join("|")
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_set_display())
    }
}

// ============================================================================
// Classfield and Parameter
// ============================================================================

/// A class field as seen by the property catalog.
///
/// `stored_name` keeps the declared spelling (underscore prefix intact) and
/// `type_text` the declared type, both needed for code synthesis; structural
/// comparison goes through `key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classfield {
    pub key: PropertyKey,
    pub stored_name: String,
    pub type_text: String,
    pub visibility: Visibility,
    pub modifiers: Vec<Modifier>,
}

impl Classfield {
    /// Build a classfield from its declared parts.
    pub fn new(
        declared_name: &str,
        type_text: &str,
        visibility: Visibility,
        modifiers: Vec<Modifier>,
    ) -> Self {
        Classfield {
            key: PropertyKey::new(declared_name, type_text),
            stored_name: declared_name.to_string(),
            type_text: type_text.to_string(),
            visibility,
            modifiers,
        }
    }

    /// Shorthand for a public field with no modifiers.
    pub fn public(declared_name: &str, type_text: &str) -> Self {
        Classfield::new(declared_name, type_text, Visibility::Public, Vec::new())
    }

    /// Structural match against another field.
    ///
    /// With `include_modifiers` the modifier sets must also agree (order
    /// insensitive); visibility never participates.
    pub fn matches(&self, other: &Classfield, include_modifiers: bool) -> bool {
        if self.key != other.key {
            return false;
        }
        if include_modifiers {
            let mut mine: Vec<Modifier> = self.modifiers.clone();
            let mut theirs: Vec<Modifier> = other.modifiers.clone();
            mine.sort();
            theirs.sort();
            mine == theirs
        } else {
            true
        }
    }

    /// Whether the field carries the given modifier.
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

impl PartialEq for Classfield {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Classfield {}

impl std::hash::Hash for Classfield {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// A function parameter as seen by the property catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub key: PropertyKey,
    pub stored_name: String,
    pub type_text: String,
}

impl Parameter {
    /// Build a parameter from its declared parts.
    pub fn new(declared_name: &str, type_text: &str) -> Self {
        Parameter {
            key: PropertyKey::new(declared_name, type_text),
            stored_name: declared_name.to_string(),
            type_text: type_text.to_string(),
        }
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Parameter {}

impl std::hash::Hash for Parameter {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod property_key {
        use super::*;

        #[test]
        fn leading_underscore_is_stripped() {
            let a = PropertyKey::new("_total", "number");
            let b = PropertyKey::new("total", "number");
            assert_eq!(a, b);
            assert_eq!(a.name, "total");
        }

        #[test]
        fn only_first_underscore_is_stripped() {
            let key = PropertyKey::new("__hidden", "number");
            assert_eq!(key.name, "_hidden");
        }

        #[test]
        fn union_types_compare_as_sets() {
            let a = PropertyKey::new("id", "number|string");
            let b = PropertyKey::new("id", "string | number");
            assert_eq!(a, b);
        }

        #[test]
        fn different_types_do_not_match() {
            let a = PropertyKey::new("id", "number");
            let b = PropertyKey::new("id", "string");
            assert_ne!(a, b);
        }

        #[test]
        fn type_set_display_is_sorted() {
            let key = PropertyKey::new("id", "string|boolean|number");
            assert_eq!(key.type_set_display(), "boolean|number|string");
        }
    }

    mod classfield {
        use super::*;

        #[test]
        fn equality_ignores_visibility_and_modifiers() {
            let a = Classfield::new("x", "number", Visibility::Private, vec![Modifier::Readonly]);
            let b = Classfield::public("x", "number");
            assert_eq!(a, b);
        }

        #[test]
        fn matches_with_modifiers_requires_same_set() {
            let a = Classfield::new(
                "x",
                "number",
                Visibility::Public,
                vec![Modifier::Static, Modifier::Readonly],
            );
            let b = Classfield::new(
                "x",
                "number",
                Visibility::Private,
                vec![Modifier::Readonly, Modifier::Static],
            );
            let c = Classfield::new("x", "number", Visibility::Public, vec![Modifier::Static]);
            assert!(a.matches(&b, true));
            assert!(!a.matches(&c, true));
            assert!(a.matches(&c, false));
        }

        #[test]
        fn backing_field_matches_parameter_spelling() {
            let field = Classfield::new("_x", "number", Visibility::Private, Vec::new());
            let param = Parameter::new("x", "number");
            assert_eq!(field.key, param.key);
            assert_eq!(field.stored_name, "_x");
        }
    }

    mod modifier_order {
        use super::*;

        #[test]
        fn canonical_order_is_static_readonly_abstract_declare() {
            let mut mods = vec![
                Modifier::Declare,
                Modifier::Static,
                Modifier::Abstract,
                Modifier::Readonly,
            ];
            mods.sort();
            assert_eq!(
                mods,
                vec![
                    Modifier::Static,
                    Modifier::Readonly,
                    Modifier::Abstract,
                    Modifier::Declare,
                ]
            );
        }
    }
}
