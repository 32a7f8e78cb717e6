//! Source analysis for the extraction planner.
//!
//! Before any code is synthesized the planner needs to know, for each side
//! of the clump, which constructor parameter initializes which field
//! (directly by promotion or through a single `this.f = p` assignment),
//! which properties carry default values, and which extracted properties
//! must be optional.

use std::collections::{HashMap, HashSet};

use crate::model::{AssignmentRhs, ClassDecl, SourceModel};
use crate::property::{Classfield, Modifier, PropertyKey, Visibility};

/// How a class's constructor supplies its fields.
#[derive(Debug, Clone, Default)]
pub struct ConstructorInfo {
    /// Normalized field name to the index of the parameter defining it.
    pub defining_params: HashMap<String, usize>,
    /// Normalized field name to its default value expression text.
    pub defaults: HashMap<String, String>,
}

impl ConstructorInfo {
    /// Whether the constructor supplies this property.
    pub fn defines(&self, name: &str) -> bool {
        self.defining_params.contains_key(name)
    }
}

/// Compute constructor facts for a class.
///
/// A field counts as constructor-defined when a parameter is promoted to it
/// or when exactly one body assignment `this.f = p` feeds it from a
/// parameter. Defaults come from field initializers and promoted-parameter
/// initializers.
pub fn analyze_class(model: &SourceModel, class: &ClassDecl) -> ConstructorInfo {
    let mut info = ConstructorInfo::default();

    for field in &class.fields {
        if let Some(init) = &field.initializer {
            info.defaults.insert(field.field.key.name.clone(), init.clone());
        }
    }

    let Some(ctor) = class.constructor.and_then(|id| model.function(id)) else {
        return info;
    };

    let param_index: HashMap<&str, usize> = ctor
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| (p.param.key.name.as_str(), i))
        .collect();

    for (i, param) in ctor.params.iter().enumerate() {
        if let Some(promoted) = &param.promoted {
            info.defining_params.insert(promoted.key.name.clone(), i);
            if let Some(init) = &param.initializer {
                info.defaults.insert(promoted.key.name.clone(), init.clone());
            }
        }
    }

    if let Some(body) = &ctor.body {
        // One defining assignment per field; a second one disqualifies it.
        let mut assignment_counts: HashMap<&str, usize> = HashMap::new();
        for assignment in &body.assignments {
            *assignment_counts
                .entry(assignment.lhs_field.as_str())
                .or_insert(0) += 1;
        }
        for assignment in &body.assignments {
            if assignment_counts[assignment.lhs_field.as_str()] != 1 {
                continue;
            }
            if info.defining_params.contains_key(&assignment.lhs_field) {
                continue;
            }
            if let AssignmentRhs::Param(param_name) = &assignment.rhs {
                let normalized = param_name.strip_prefix('_').unwrap_or(param_name);
                if let Some(&idx) = param_index.get(normalized) {
                    info.defining_params
                        .insert(assignment.lhs_field.clone(), idx);
                }
            }
        }
    }

    info
}

/// One property of the extracted class, in constructor parameter order.
#[derive(Debug, Clone)]
pub struct ExtractedProperty {
    pub key: PropertyKey,
    pub type_text: String,
    pub visibility: Visibility,
    pub modifiers: Vec<Modifier>,
    pub optional: bool,
    pub default: Option<String>,
}

impl ExtractedProperty {
    /// Whether the property becomes a backing field with accessors.
    pub fn needs_accessors(&self) -> bool {
        self.visibility != Visibility::Public
    }

    /// Whether the property is declared rather than constructed
    /// (abstract/declare fields stay out of the constructor).
    pub fn is_declaration_only(&self) -> bool {
        self.modifiers.contains(&Modifier::Abstract) || self.modifiers.contains(&Modifier::Declare)
    }
}

/// Resolve a selected property key against the source declarations.
///
/// Fields win over parameters so visibility and modifiers survive; when
/// modifiers are excluded from extraction they are dropped here.
pub fn resolve_property(
    model: &SourceModel,
    sources: &[crate::model::DeclRef],
    key: &PropertyKey,
    include_modifiers: bool,
) -> ExtractedProperty {
    let mut found: Option<(Classfield, Option<String>)> = None;
    let mut param_type: Option<String> = None;

    for decl in sources {
        match decl {
            crate::model::DeclRef::Class(id) => {
                if let Some(class) = model.class(*id) {
                    for field in &class.fields {
                        if &field.field.key == key && found.is_none() {
                            found = Some((field.field.clone(), field.initializer.clone()));
                        }
                    }
                    if let Some(ctor) = class.constructor.and_then(|id| model.function(id)) {
                        for param in &ctor.params {
                            if let Some(promoted) = &param.promoted {
                                if &promoted.key == key && found.is_none() {
                                    found =
                                        Some((promoted.clone(), param.initializer.clone()));
                                }
                            }
                        }
                    }
                }
            }
            crate::model::DeclRef::Function(id) => {
                if let Some(function) = model.function(*id) {
                    for param in &function.params {
                        if &param.param.key == key && param_type.is_none() {
                            param_type = Some(param.param.type_text.clone());
                        }
                    }
                }
            }
        }
    }

    match found {
        Some((field, default)) => ExtractedProperty {
            key: key.clone(),
            type_text: field.type_text.clone(),
            visibility: field.visibility,
            modifiers: if include_modifiers {
                let mut mods = field.modifiers.clone();
                mods.sort();
                mods
            } else {
                Vec::new()
            },
            optional: false,
            default,
        },
        None => ExtractedProperty {
            key: key.clone(),
            type_text: param_type.unwrap_or_else(|| key.type_set_display()),
            visibility: Visibility::Public,
            modifiers: Vec::new(),
            optional: false,
            default: None,
        },
    }
}

/// Mark extracted properties optional.
///
/// A property starts optional when no source constructor defines it and it
/// has no default; optionality then propagates along `this.f = <ref>`
/// assignments until a fixed point is reached.
pub fn infer_optional(
    properties: &mut [ExtractedProperty],
    ctor_infos: &[&ConstructorInfo],
    assignments: &[(String, AssignmentRhs)],
) {
    let mut optional: HashSet<String> = properties
        .iter()
        .filter(|p| {
            p.default.is_none() && !ctor_infos.iter().any(|info| info.defines(&p.key.name))
        })
        .map(|p| p.key.name.clone())
        .collect();

    let names: HashSet<String> = properties.iter().map(|p| p.key.name.clone()).collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (lhs, rhs) in assignments {
            if !names.contains(lhs) || optional.contains(lhs) {
                continue;
            }
            let rhs_name = match rhs {
                AssignmentRhs::Param(name) | AssignmentRhs::Field(name) => {
                    name.strip_prefix('_').unwrap_or(name)
                }
                AssignmentRhs::Other(_) => continue,
            };
            if optional.contains(rhs_name) {
                optional.insert(lhs.clone());
                changed = true;
            }
        }
    }

    for property in properties.iter_mut() {
        property.optional = optional.contains(&property.key.name);
    }
}

/// Literal default for a primitive type, if one exists.
///
/// `string` maps to `""`, `number` to `0`, `boolean` to `false`, and
/// `any`/`undefined` to `undefined`. Union alternatives are tried in that
/// order.
pub fn primitive_default(key: &PropertyKey) -> Option<&'static str> {
    for (ty, literal) in [
        ("string", "\"\""),
        ("number", "0"),
        ("boolean", "false"),
        ("any", "undefined"),
        ("undefined", "undefined"),
    ] {
        if key.types.contains(ty) {
            return Some(literal);
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::Span;
    use crate::model::{
        Assignment, ClassId, DeclRef, FieldDecl, FunctionBody, FunctionDecl, FunctionId,
        ParamDecl,
    };
    use crate::property::Parameter;

    fn model_with_ctor_class() -> (SourceModel, ClassId) {
        let mut model = SourceModel::new();
        model.add_file("a.ts", "");
        let class_id = model.add_class(ClassDecl {
            id: ClassId(0),
            name: "A".to_string(),
            qualified_name: "A".to_string(),
            file: "a.ts".to_string(),
            span: Span::new(0, 0),
            is_interface: false,
            is_exported: true,
            is_abstract: false,
            fields: vec![
                FieldDecl {
                    field: Classfield::new("_x", "number", Visibility::Private, Vec::new()),
                    span: Span::new(0, 0),
                    initializer: None,
                    usages: Vec::new(),
                },
                FieldDecl {
                    field: Classfield::public("tag", "string"),
                    span: Span::new(0, 0),
                    initializer: Some("\"none\"".to_string()),
                    usages: Vec::new(),
                },
            ],
            constructor: None,
            methods: Vec::new(),
            accessors: Vec::new(),
            superclasses: Vec::new(),
            interfaces: Vec::new(),
            header_offset: 0,
            body_insert_offset: 0,
        });
        model.add_function(FunctionDecl {
            id: FunctionId(0),
            name: "constructor".to_string(),
            qualified_name: "A.constructor".to_string(),
            file: "a.ts".to_string(),
            span: Span::new(0, 0),
            param_list_span: Span::new(0, 0),
            params: vec![
                ParamDecl {
                    param: Parameter::new("x", "number"),
                    text: "x: number".to_string(),
                    promoted: None,
                    initializer: None,
                    usages: Vec::new(),
                },
                ParamDecl {
                    param: Parameter::new("y", "number"),
                    text: "public y: number".to_string(),
                    promoted: Some(Classfield::public("y", "number")),
                    initializer: None,
                    usages: Vec::new(),
                },
            ],
            is_constructor: true,
            containing_class: Some(class_id),
            body: Some(FunctionBody {
                span: Span::new(0, 0),
                super_call: None,
                assignments: vec![Assignment {
                    span: Span::new(0, 0),
                    lhs_field: "x".to_string(),
                    rhs: AssignmentRhs::Param("x".to_string()),
                }],
            }),
            call_sites: Vec::new(),
        });
        (model, class_id)
    }

    mod constructor_info {
        use super::*;

        #[test]
        fn promoted_and_assigned_params_are_defining() {
            let (model, class_id) = model_with_ctor_class();
            let class = model.class(class_id).expect("class exists");
            let info = analyze_class(&model, class);

            assert_eq!(info.defining_params.get("x"), Some(&0));
            assert_eq!(info.defining_params.get("y"), Some(&1));
            assert!(!info.defines("tag"));
        }

        #[test]
        fn field_initializers_become_defaults() {
            let (model, class_id) = model_with_ctor_class();
            let class = model.class(class_id).expect("class exists");
            let info = analyze_class(&model, class);
            assert_eq!(info.defaults.get("tag"), Some(&"\"none\"".to_string()));
        }

        #[test]
        fn class_without_constructor_defines_nothing() {
            let mut model = SourceModel::new();
            model.add_file("a.ts", "");
            let class_id = model.add_class(ClassDecl {
                id: ClassId(0),
                name: "B".to_string(),
                qualified_name: "B".to_string(),
                file: "a.ts".to_string(),
                span: Span::new(0, 0),
                is_interface: false,
                is_exported: true,
                is_abstract: false,
                fields: Vec::new(),
                constructor: None,
                methods: Vec::new(),
                accessors: Vec::new(),
                superclasses: Vec::new(),
                interfaces: Vec::new(),
                header_offset: 0,
                body_insert_offset: 0,
            });
            let class = model.class(class_id).expect("class exists");
            let info = analyze_class(&model, class);
            assert!(info.defining_params.is_empty());
        }
    }

    mod property_resolution {
        use super::*;

        #[test]
        fn field_wins_and_keeps_visibility() {
            let (model, class_id) = model_with_ctor_class();
            let key = PropertyKey::new("x", "number");
            let prop = resolve_property(&model, &[DeclRef::Class(class_id)], &key, false);
            assert_eq!(prop.visibility, Visibility::Private);
            assert_eq!(prop.type_text, "number");
            assert!(prop.needs_accessors());
        }

        #[test]
        fn modifiers_dropped_when_extraction_excludes_them() {
            let mut model = SourceModel::new();
            model.add_file("a.ts", "");
            let class_id = model.add_class(ClassDecl {
                id: ClassId(0),
                name: "A".to_string(),
                qualified_name: "A".to_string(),
                file: "a.ts".to_string(),
                span: Span::new(0, 0),
                is_interface: false,
                is_exported: true,
                is_abstract: false,
                fields: vec![FieldDecl {
                    field: Classfield::new(
                        "x",
                        "number",
                        Visibility::Public,
                        vec![Modifier::Readonly],
                    ),
                    span: Span::new(0, 0),
                    initializer: None,
                    usages: Vec::new(),
                }],
                constructor: None,
                methods: Vec::new(),
                accessors: Vec::new(),
                superclasses: Vec::new(),
                interfaces: Vec::new(),
                header_offset: 0,
                body_insert_offset: 0,
            });
            let key = PropertyKey::new("x", "number");
            let without = resolve_property(&model, &[DeclRef::Class(class_id)], &key, false);
            assert!(without.modifiers.is_empty());
            let with = resolve_property(&model, &[DeclRef::Class(class_id)], &key, true);
            assert_eq!(with.modifiers, vec![Modifier::Readonly]);
        }

        #[test]
        fn parameter_fallback_is_public() {
            let mut model = SourceModel::new();
            model.add_file("a.ts", "");
            let fn_id = model.add_function(FunctionDecl {
                id: FunctionId(0),
                name: "draw".to_string(),
                qualified_name: "draw".to_string(),
                file: "a.ts".to_string(),
                span: Span::new(0, 0),
                param_list_span: Span::new(0, 0),
                params: vec![ParamDecl {
                    param: Parameter::new("x", "number"),
                    text: "x: number".to_string(),
                    promoted: None,
                    initializer: None,
                    usages: Vec::new(),
                }],
                is_constructor: false,
                containing_class: None,
                body: None,
                call_sites: Vec::new(),
            });
            let key = PropertyKey::new("x", "number");
            let prop = resolve_property(&model, &[DeclRef::Function(fn_id)], &key, false);
            assert_eq!(prop.visibility, Visibility::Public);
            assert!(!prop.needs_accessors());
        }
    }

    mod optional_inference {
        use super::*;

        fn prop(name: &str, default: Option<&str>) -> ExtractedProperty {
            ExtractedProperty {
                key: PropertyKey::new(name, "number"),
                type_text: "number".to_string(),
                visibility: Visibility::Public,
                modifiers: Vec::new(),
                optional: false,
                default: default.map(|s| s.to_string()),
            }
        }

        #[test]
        fn undefined_unassigned_property_is_optional() {
            let mut props = vec![prop("x", None), prop("y", Some("0"))];
            let info = ConstructorInfo::default();
            infer_optional(&mut props, &[&info], &[]);
            assert!(props[0].optional);
            assert!(!props[1].optional);
        }

        #[test]
        fn constructor_defined_property_is_not_optional() {
            let mut props = vec![prop("x", None)];
            let mut info = ConstructorInfo::default();
            info.defining_params.insert("x".to_string(), 0);
            infer_optional(&mut props, &[&info], &[]);
            assert!(!props[0].optional);
        }

        #[test]
        fn optionality_propagates_through_assignments() {
            let mut props = vec![prop("a", None), prop("b", None), prop("c", None)];
            let mut info = ConstructorInfo::default();
            info.defining_params.insert("b".to_string(), 0);
            info.defining_params.insert("c".to_string(), 1);
            // b = a makes b optional despite its defining param; c = b follows.
            let assignments = vec![
                ("c".to_string(), AssignmentRhs::Field("b".to_string())),
                ("b".to_string(), AssignmentRhs::Field("a".to_string())),
            ];
            infer_optional(&mut props, &[&info], &assignments);
            assert!(props[0].optional);
            assert!(props[1].optional);
            assert!(props[2].optional);
        }
    }

    mod defaults {
        use super::*;

        #[test]
        fn primitive_defaults() {
            assert_eq!(primitive_default(&PropertyKey::new("s", "string")), Some("\"\""));
            assert_eq!(primitive_default(&PropertyKey::new("n", "number")), Some("0"));
            assert_eq!(
                primitive_default(&PropertyKey::new("b", "boolean")),
                Some("false")
            );
            assert_eq!(
                primitive_default(&PropertyKey::new("a", "any")),
                Some("undefined")
            );
            assert_eq!(primitive_default(&PropertyKey::new("p", "Point")), None);
        }

        #[test]
        fn union_prefers_string() {
            assert_eq!(
                primitive_default(&PropertyKey::new("v", "number|string")),
                Some("\"\"")
            );
        }
    }
}
