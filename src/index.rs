//! Structural index over the source model.
//!
//! Bidirectional maps from property keys to the declarations that carry
//! them, plus qualified-name and method-name lookups used by hierarchy
//! resolution. The index is an explicitly owned value; the host creates it,
//! feeds it declarations, and drops it.
//!
//! Declarations with fewer properties than the clump threshold are not
//! admitted into the property maps. They can never be part of a clump, and
//! keeping them out bounds the index to what detection can use.
//!
//! The index is not self-updating: after model mutations the host calls
//! `update_class`/`update_function` (incremental, diff-based) or `remove`.
//! Detection additionally purges entries it discovers to be stale.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::model::{ClassDecl, ClassId, DeclRef, FunctionDecl, FunctionId, SourceModel};
use crate::property::{Classfield, Parameter, PropertyKey};

/// Property-to-declaration maps with incremental maintenance.
#[derive(Debug, Clone)]
pub struct StructuralIndex {
    min_properties: usize,
    properties_to_classes: HashMap<PropertyKey, HashSet<ClassId>>,
    properties_to_functions: HashMap<PropertyKey, HashSet<FunctionId>>,
    classes_to_fields: HashMap<ClassId, Vec<Classfield>>,
    functions_to_params: HashMap<FunctionId, Vec<Parameter>>,
    qualified_names: HashMap<String, ClassId>,
    function_names_to_classes: HashMap<String, HashSet<ClassId>>,
    /// Reverse bookkeeping so `remove` needs nothing but the id.
    class_names: HashMap<ClassId, (String, Vec<String>)>,
}

impl StructuralIndex {
    /// Create an empty index with the given admission threshold.
    pub fn new(min_properties: usize) -> Self {
        StructuralIndex {
            min_properties,
            properties_to_classes: HashMap::new(),
            properties_to_functions: HashMap::new(),
            classes_to_fields: HashMap::new(),
            functions_to_params: HashMap::new(),
            qualified_names: HashMap::new(),
            function_names_to_classes: HashMap::new(),
            class_names: HashMap::new(),
        }
    }

    /// Index every declaration in the model.
    pub fn build(model: &SourceModel, min_properties: usize) -> Self {
        let mut index = StructuralIndex::new(min_properties);
        for class in &model.classes {
            if model.is_valid(DeclRef::Class(class.id)) {
                index.add_class(model, class);
            }
        }
        for function in &model.functions {
            if model.is_valid(DeclRef::Function(function.id)) {
                index.add_function(function);
            }
        }
        index
    }

    /// The admission threshold this index was built with.
    pub fn min_properties(&self) -> usize {
        self.min_properties
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Index a class: qualified name, method names, and (at threshold) its
    /// fields.
    pub fn add_class(&mut self, model: &SourceModel, class: &ClassDecl) {
        let method_names: Vec<String> = class
            .methods
            .iter()
            .filter_map(|id| model.function(*id))
            .map(|f| f.name.clone())
            .collect();
        self.qualified_names
            .insert(class.qualified_name.clone(), class.id);
        for name in &method_names {
            self.function_names_to_classes
                .entry(name.clone())
                .or_default()
                .insert(class.id);
        }
        self.class_names
            .insert(class.id, (class.qualified_name.clone(), method_names));

        let fields = model.classfields(class);
        if fields.len() < self.min_properties {
            debug!(class = %class.id, count = fields.len(), "class below threshold, not indexing properties");
            return;
        }
        for field in &fields {
            self.properties_to_classes
                .entry(field.key.clone())
                .or_default()
                .insert(class.id);
        }
        self.classes_to_fields.insert(class.id, fields);
    }

    /// Index a function's parameters (constructors are skipped; their
    /// promoted parameters surface as class fields instead).
    pub fn add_function(&mut self, function: &FunctionDecl) {
        if function.is_constructor {
            return;
        }
        let params: Vec<Parameter> = function.params.iter().map(|p| p.param.clone()).collect();
        if params.len() < self.min_properties {
            debug!(function = %function.id, count = params.len(), "function below threshold, not indexing properties");
            return;
        }
        for param in &params {
            self.properties_to_functions
                .entry(param.key.clone())
                .or_default()
                .insert(function.id);
        }
        self.functions_to_params.insert(function.id, params);
    }

    /// Re-index a class after its declaration changed.
    ///
    /// Diffs the previously indexed fields against the current ones and
    /// touches only the changed keys. Delegates to `add_class` for classes
    /// never seen before.
    pub fn update_class(&mut self, model: &SourceModel, class: &ClassDecl) {
        if !self.class_names.contains_key(&class.id) {
            self.add_class(model, class);
            return;
        }
        self.remove_class_entries(class.id);
        self.add_class(model, class);
    }

    /// Re-index a function after its declaration changed.
    pub fn update_function(&mut self, function: &FunctionDecl) {
        if let Some(old) = self.functions_to_params.remove(&function.id) {
            for param in &old {
                if let Some(set) = self.properties_to_functions.get_mut(&param.key) {
                    set.remove(&function.id);
                    if set.is_empty() {
                        self.properties_to_functions.remove(&param.key);
                    }
                }
            }
        }
        self.add_function(function);
    }

    /// Remove a declaration from every map.
    ///
    /// Also used as the self-healing path: detection calls this when it
    /// finds an indexed declaration the model no longer considers valid.
    pub fn remove(&mut self, decl: DeclRef) {
        match decl {
            DeclRef::Class(id) => self.remove_class_entries(id),
            DeclRef::Function(id) => {
                if let Some(params) = self.functions_to_params.remove(&id) {
                    for param in &params {
                        if let Some(set) = self.properties_to_functions.get_mut(&param.key) {
                            set.remove(&id);
                            if set.is_empty() {
                                self.properties_to_functions.remove(&param.key);
                            }
                        }
                    }
                }
            }
        }
    }

    fn remove_class_entries(&mut self, id: ClassId) {
        if let Some(fields) = self.classes_to_fields.remove(&id) {
            for field in &fields {
                if let Some(set) = self.properties_to_classes.get_mut(&field.key) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.properties_to_classes.remove(&field.key);
                    }
                }
            }
        }
        if let Some((qualified_name, method_names)) = self.class_names.remove(&id) {
            self.qualified_names.remove(&qualified_name);
            for name in &method_names {
                if let Some(set) = self.function_names_to_classes.get_mut(name) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.function_names_to_classes.remove(name);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Classes carrying a field with this property key.
    pub fn classes_with(&self, key: &PropertyKey) -> impl Iterator<Item = ClassId> + '_ {
        self.properties_to_classes
            .get(key)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Functions carrying a parameter with this property key.
    pub fn functions_with(&self, key: &PropertyKey) -> impl Iterator<Item = FunctionId> + '_ {
        self.properties_to_functions
            .get(key)
            .into_iter()
            .flatten()
            .copied()
    }

    /// The indexed fields of a class (admitted classes only).
    pub fn fields_of(&self, id: ClassId) -> Option<&[Classfield]> {
        self.classes_to_fields.get(&id).map(|v| v.as_slice())
    }

    /// The indexed parameters of a function (admitted functions only).
    pub fn params_of(&self, id: FunctionId) -> Option<&[Parameter]> {
        self.functions_to_params.get(&id).map(|v| v.as_slice())
    }

    /// Resolve a qualified class name.
    pub fn class_by_qualified_name(&self, qualified_name: &str) -> Option<ClassId> {
        self.qualified_names.get(qualified_name).copied()
    }

    /// Classes defining a method with this name.
    pub fn classes_defining_method(&self, name: &str) -> impl Iterator<Item = ClassId> + '_ {
        self.function_names_to_classes
            .get(name)
            .into_iter()
            .flatten()
            .copied()
    }
}

// ============================================================================
// Tests
// ============================================================================
