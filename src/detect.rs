//! Data clump detection.
//!
//! A clump is a group of at least `min_properties` structurally equal
//! properties shared between two declarations: two classes (fields to
//! fields), a function and a class (parameters to fields), or two functions
//! (parameters to parameters).
//!
//! Detection is anchored at one declaration and consults the structural
//! index for candidates sharing at least one property key. Candidates the
//! model no longer considers valid are purged from the index on the way
//! (self-healing). Inherited duplicates are suppressed: fields redeclared
//! from an ancestor and method pairs related by overriding do not count.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DeclumpConfig;
use crate::index::StructuralIndex;
use crate::model::{ClassDecl, ClassId, DeclRef, FunctionDecl, FunctionId, SourceModel};
use crate::property::{Classfield, Modifier, PropertyKey};

// ============================================================================
// Clump
// ============================================================================

/// Which kinds of declaration the two sides of a clump are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClumpKind {
    FieldsToFields,
    ParametersToFields,
    ParametersToParameters,
}

impl ClumpKind {
    /// The classification tag used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClumpKind::FieldsToFields => "fields_to_fields_data_clump",
            ClumpKind::ParametersToFields => "parameters_to_fields_data_clump",
            ClumpKind::ParametersToParameters => "parameters_to_parameters_data_clump",
        }
    }
}

/// A detected data clump between two declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clump {
    /// The declaration detection was anchored at.
    pub origin: DeclRef,
    pub origin_qualified_name: String,
    /// The partner declaration.
    pub other: DeclRef,
    pub other_qualified_name: String,
    pub kind: ClumpKind,
    /// The shared property keys, sorted for deterministic output.
    pub properties: Vec<PropertyKey>,
    /// Whether extract-class refactoring can run without manual work:
    /// no interfaces involved, no static properties, and neither side is
    /// a method with an override relation anywhere in its hierarchy.
    pub auto_refactorable: bool,
}

// ============================================================================
// Detector
// ============================================================================

/// Clump detection over a model and its index.
///
/// Holds the index mutably so stale entries discovered during candidate
/// checks can be purged in place.
pub struct Detector<'a> {
    model: &'a SourceModel,
    index: &'a mut StructuralIndex,
    config: &'a DeclumpConfig,
}

impl<'a> Detector<'a> {
    pub fn new(
        model: &'a SourceModel,
        index: &'a mut StructuralIndex,
        config: &'a DeclumpConfig,
    ) -> Self {
        Detector {
            model,
            index,
            config,
        }
    }

    /// Detect all clumps anchored at the given declaration.
    ///
    /// Declarations below the admission threshold yield nothing.
    pub fn detect(&mut self, decl: DeclRef) -> Vec<Clump> {
        match decl {
            DeclRef::Class(id) => self.detect_class(id),
            DeclRef::Function(id) => self.detect_function(id),
        }
    }

    // ------------------------------------------------------------------
    // Class-anchored detection
    // ------------------------------------------------------------------

    fn detect_class(&mut self, origin_id: ClassId) -> Vec<Clump> {
        let Some(origin) = self.model.class(origin_id) else {
            self.index.remove(DeclRef::Class(origin_id));
            return Vec::new();
        };
        let Some(fields) = self.index.fields_of(origin_id).map(|f| f.to_vec()) else {
            return Vec::new();
        };

        let origin_ancestors = self.proper_ancestors(origin_id);
        let mut ancestor_cache: BTreeMap<ClassId, HashSet<ClassId>> = BTreeMap::new();
        let mut class_matches: BTreeMap<ClassId, BTreeSet<PropertyKey>> = BTreeMap::new();
        let mut fn_matches: BTreeMap<FunctionId, BTreeSet<PropertyKey>> = BTreeMap::new();

        for field in &fields {
            if !self.field_participates(field, &origin_ancestors) {
                continue;
            }

            let class_candidates: Vec<ClassId> = self.index.classes_with(&field.key).collect();
            for other_id in class_candidates {
                if other_id == origin_id {
                    continue;
                }
                if !self.model.is_valid(DeclRef::Class(other_id)) {
                    debug!(class = %other_id, "purging stale class from index");
                    self.index.remove(DeclRef::Class(other_id));
                    continue;
                }
                if !self.class_field_matches(other_id, field) {
                    continue;
                }
                // The candidate's matching field must participate too, so a
                // subclass redeclaring ancestor fields never pairs with that
                // ancestor from either anchor.
                if !ancestor_cache.contains_key(&other_id) {
                    ancestor_cache.insert(other_id, self.proper_ancestors(other_id));
                }
                let other_ancestors = &ancestor_cache[&other_id];
                if !self.candidate_field_participates(other_id, &field.key, other_ancestors) {
                    continue;
                }
                class_matches
                    .entry(other_id)
                    .or_default()
                    .insert(field.key.clone());
            }

            let fn_candidates: Vec<FunctionId> = self.index.functions_with(&field.key).collect();
            for other_id in fn_candidates {
                if !self.model.is_valid(DeclRef::Function(other_id)) {
                    debug!(function = %other_id, "purging stale function from index");
                    self.index.remove(DeclRef::Function(other_id));
                    continue;
                }
                fn_matches
                    .entry(other_id)
                    .or_default()
                    .insert(field.key.clone());
            }
        }

        let mut clumps = Vec::new();
        for (other_id, keys) in class_matches {
            if keys.len() < self.config.min_properties {
                continue;
            }
            if let Some(other) = self.model.class(other_id) {
                clumps.push(self.make_clump(
                    DeclRef::Class(origin_id),
                    &origin.qualified_name,
                    DeclRef::Class(other_id),
                    &other.qualified_name,
                    ClumpKind::FieldsToFields,
                    keys,
                    origin.is_interface || other.is_interface,
                ));
            }
        }
        for (other_id, keys) in fn_matches {
            if keys.len() < self.config.min_properties {
                continue;
            }
            if let Some(other) = self.model.function(other_id) {
                clumps.push(self.make_clump(
                    DeclRef::Class(origin_id),
                    &origin.qualified_name,
                    DeclRef::Function(other_id),
                    &other.qualified_name,
                    ClumpKind::ParametersToFields,
                    keys,
                    origin.is_interface,
                ));
            }
        }
        clumps
    }

    // ------------------------------------------------------------------
    // Function-anchored detection
    // ------------------------------------------------------------------

    fn detect_function(&mut self, origin_id: FunctionId) -> Vec<Clump> {
        let Some(origin) = self.model.function(origin_id) else {
            self.index.remove(DeclRef::Function(origin_id));
            return Vec::new();
        };
        if origin.is_constructor {
            return Vec::new();
        }
        let Some(params) = self.index.params_of(origin_id).map(|p| p.to_vec()) else {
            return Vec::new();
        };

        let mut fn_matches: BTreeMap<FunctionId, BTreeSet<PropertyKey>> = BTreeMap::new();
        let mut class_matches: BTreeMap<ClassId, BTreeSet<PropertyKey>> = BTreeMap::new();
        let mut ancestor_cache: BTreeMap<ClassId, HashSet<ClassId>> = BTreeMap::new();

        for param in &params {
            let fn_candidates: Vec<FunctionId> = self.index.functions_with(&param.key).collect();
            for other_id in fn_candidates {
                if other_id == origin_id {
                    continue;
                }
                let Some(other) = self.model.function(other_id) else {
                    debug!(function = %other_id, "purging stale function from index");
                    self.index.remove(DeclRef::Function(other_id));
                    continue;
                };
                if self.is_overriding_pair(origin, other) {
                    continue;
                }
                fn_matches
                    .entry(other_id)
                    .or_default()
                    .insert(param.key.clone());
            }

            let class_candidates: Vec<ClassId> = self.index.classes_with(&param.key).collect();
            for other_id in class_candidates {
                if !self.model.is_valid(DeclRef::Class(other_id)) {
                    debug!(class = %other_id, "purging stale class from index");
                    self.index.remove(DeclRef::Class(other_id));
                    continue;
                }
                if !ancestor_cache.contains_key(&other_id) {
                    ancestor_cache.insert(other_id, self.proper_ancestors(other_id));
                }
                if !self.candidate_field_participates(
                    other_id,
                    &param.key,
                    &ancestor_cache[&other_id],
                ) {
                    continue;
                }
                class_matches
                    .entry(other_id)
                    .or_default()
                    .insert(param.key.clone());
            }
        }

        let mut clumps = Vec::new();
        for (other_id, keys) in fn_matches {
            if keys.len() < self.config.min_properties {
                continue;
            }
            if let Some(other) = self.model.function(other_id) {
                clumps.push(self.make_clump(
                    DeclRef::Function(origin_id),
                    &origin.qualified_name,
                    DeclRef::Function(other_id),
                    &other.qualified_name,
                    ClumpKind::ParametersToParameters,
                    keys,
                    false,
                ));
            }
        }
        for (other_id, keys) in class_matches {
            if keys.len() < self.config.min_properties {
                continue;
            }
            if let Some(other) = self.model.class(other_id) {
                clumps.push(self.make_clump(
                    DeclRef::Function(origin_id),
                    &origin.qualified_name,
                    DeclRef::Class(other_id),
                    &other.qualified_name,
                    ClumpKind::ParametersToFields,
                    keys,
                    other.is_interface,
                ));
            }
        }
        clumps
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    /// Whether a field of the origin class takes part in detection.
    ///
    /// Static fields never do, and neither do fields redeclaring a
    /// property an ancestor already defines.
    fn field_participates(&self, field: &Classfield, origin_ancestors: &HashSet<ClassId>) -> bool {
        if field.has_modifier(Modifier::Static) {
            return false;
        }
        for ancestor_id in origin_ancestors {
            if let Some(ancestor) = self.model.class(*ancestor_id) {
                if self
                    .model
                    .classfields(ancestor)
                    .iter()
                    .any(|f| f.matches(field, self.config.include_modifiers_in_detection))
                {
                    return false;
                }
            }
        }
        true
    }

    /// Whether the candidate class's field with the given key would itself
    /// pass the participation guards.
    fn candidate_field_participates(
        &self,
        other_id: ClassId,
        key: &PropertyKey,
        other_ancestors: &HashSet<ClassId>,
    ) -> bool {
        let Some(other_fields) = self.index.fields_of(other_id) else {
            return false;
        };
        match other_fields.iter().find(|f| &f.key == key) {
            Some(other_field) => self.field_participates(other_field, other_ancestors),
            None => false,
        }
    }

    /// Modifier-aware match of an origin field against the other class's
    /// field with the same key.
    fn class_field_matches(&self, other_id: ClassId, field: &Classfield) -> bool {
        if !self.config.include_modifiers_in_detection {
            return true;
        }
        let Some(other_fields) = self.index.fields_of(other_id) else {
            return false;
        };
        other_fields
            .iter()
            .any(|f| f.key == field.key && f.matches(field, true))
    }

    /// Two methods are override-related when they share a name and their
    /// containing classes share a class in their resolved hierarchies.
    fn is_overriding_pair(&self, a: &FunctionDecl, b: &FunctionDecl) -> bool {
        if a.name != b.name {
            return false;
        }
        let (Some(ca), Some(cb)) = (a.containing_class, b.containing_class) else {
            return false;
        };
        let ha = self.resolve_hierarchy(ca);
        let hb = self.resolve_hierarchy(cb);
        ha.intersection(&hb).next().is_some()
    }

    /// Whether a clump side is a method that overrides or is overridden by
    /// a same-named method elsewhere in its hierarchy.
    ///
    /// Extracting parameters out of such a method would change its
    /// signature without touching the related methods, so its clumps stay
    /// detectable but are never flagged auto-refactorable, regardless of
    /// the pair partner.
    fn involves_overridden_method(&self, decl: DeclRef) -> bool {
        let DeclRef::Function(id) = decl else {
            return false;
        };
        let Some(function) = self.model.function(id) else {
            return false;
        };
        let Some(class_id) = function.containing_class else {
            return false;
        };
        let hierarchy = self.resolve_hierarchy(class_id);
        let definers: Vec<ClassId> = self.index.classes_defining_method(&function.name).collect();
        definers.into_iter().any(|other| {
            other != class_id
                && self
                    .resolve_hierarchy(other)
                    .intersection(&hierarchy)
                    .next()
                    .is_some()
        })
    }

    // ------------------------------------------------------------------
    // Hierarchy resolution
    // ------------------------------------------------------------------

    /// All classes reachable through `extends`/`implements`, including the
    /// class itself. The visited set makes diamond hierarchies terminate.
    pub fn resolve_hierarchy(&self, id: ClassId) -> HashSet<ClassId> {
        let mut visited: HashSet<ClassId> = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(class) = self.model.class(current) else {
                continue;
            };
            for name in class.superclasses.iter().chain(class.interfaces.iter()) {
                if let Some(parent) = self.model.class_by_qualified_name(name) {
                    stack.push(parent.id);
                }
            }
        }
        visited
    }

    fn proper_ancestors(&self, id: ClassId) -> HashSet<ClassId> {
        let mut set = self.resolve_hierarchy(id);
        set.remove(&id);
        set
    }

    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn make_clump(
        &self,
        origin: DeclRef,
        origin_name: &str,
        other: DeclRef,
        other_name: &str,
        kind: ClumpKind,
        keys: BTreeSet<PropertyKey>,
        involves_interface: bool,
    ) -> Clump {
        let has_static = self.any_side_static(&keys, origin) || self.any_side_static(&keys, other);
        let overridden =
            self.involves_overridden_method(origin) || self.involves_overridden_method(other);
        Clump {
            origin,
            origin_qualified_name: origin_name.to_string(),
            other,
            other_qualified_name: other_name.to_string(),
            kind,
            properties: keys.into_iter().collect(),
            auto_refactorable: !involves_interface && !has_static && !overridden,
        }
    }

    fn any_side_static(&self, keys: &BTreeSet<PropertyKey>, decl: DeclRef) -> bool {
        let DeclRef::Class(id) = decl else {
            return false;
        };
        let Some(class) = self.model.class(id) else {
            return false;
        };
        self.model
            .classfields(class)
            .iter()
            .any(|f| keys.contains(&f.key) && f.has_modifier(Modifier::Static))
    }
}

// ============================================================================
// Tests
// ============================================================================
