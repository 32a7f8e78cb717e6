//! Extract-class refactoring planner.
//!
//! The planner runs a linear state machine over one confirmed clump:
//! target selection, source analysis, class materialization, call-site
//! rewriting, consumer rewriting. Selecting an existing target whose
//! accessors collide loops back to selection when the user declines to
//! reuse them.
//!
//! Planning never mutates the model. The product is a `RefactorPlan`
//! whose edit set the host applies atomically; abandoning at any prompt
//! leaves everything untouched.

pub mod analyze;
pub mod materialize;
pub mod rewrite;

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::config::DeclumpConfig;
use crate::detect::Clump;
use crate::edit::EditSet;
use crate::error::{DeclumpError, Result};
use crate::interaction::{ExtractChoice, ExtractionRequest, SelectionUi};
use crate::model::{AssignmentRhs, ClassDecl, DeclRef, SourceModel};
use crate::property::PropertyKey;

pub use analyze::{ConstructorInfo, ExtractedProperty};
pub use rewrite::TargetSpec;

/// How many times a declined accessor conflict may send the user back to
/// target selection before the refactoring gives up.
const MAX_SELECTION_ATTEMPTS: usize = 3;

/// The outcome of planning: an atomic edit set plus what it builds.
#[derive(Debug)]
pub struct RefactorPlan {
    pub edits: EditSet,
    pub class_name: String,
    pub class_file: String,
    /// False when an existing class was reused.
    pub created_new_class: bool,
}

/// One extraction run over a confirmed clump.
pub struct Refactoring<'a> {
    model: &'a SourceModel,
    config: &'a DeclumpConfig,
    ui: &'a dyn SelectionUi,
}

impl<'a> Refactoring<'a> {
    pub fn new(
        model: &'a SourceModel,
        config: &'a DeclumpConfig,
        ui: &'a dyn SelectionUi,
    ) -> Self {
        Refactoring { model, config, ui }
    }

    /// Plan the extraction for a clump.
    ///
    /// Returns `Cancelled` when the user declines, `InvalidSelection` when
    /// selection never converges, `AmbiguousDefault` when a call-site
    /// argument cannot be derived.
    pub fn plan(&self, clump: &Clump) -> Result<RefactorPlan> {
        let selected: BTreeSet<PropertyKey> = clump.properties.iter().cloned().collect();
        if selected.len() < 2 {
            return Err(DeclumpError::invalid_selection(
                "an extraction needs at least two properties",
            ));
        }
        let sides = [clump.origin, clump.other];
        let side_names = [
            clump.origin_qualified_name.as_str(),
            clump.other_qualified_name.as_str(),
        ];
        for (side, name) in sides.iter().zip(side_names) {
            if !self.model.is_valid(*side) {
                return Err(DeclumpError::declaration_not_found(name));
            }
        }

        // ANALYZE_SOURCES. A function side supplies every property in its
        // signature, so it contributes defining entries like a constructor.
        let ctor_infos: Vec<(DeclRef, ConstructorInfo)> = sides
            .iter()
            .map(|side| {
                let info = match side {
                    DeclRef::Class(id) => self
                        .model
                        .class(*id)
                        .map(|c| analyze::analyze_class(self.model, c))
                        .unwrap_or_default(),
                    DeclRef::Function(id) => {
                        let mut info = ConstructorInfo::default();
                        if let Some(function) = self.model.function(*id) {
                            for (i, param) in function.params.iter().enumerate() {
                                info.defining_params.insert(param.param.key.name.clone(), i);
                            }
                        }
                        info
                    }
                };
                (*side, info)
            })
            .collect();
        let assignment_graph = self.assignment_graph(&sides);

        let mut properties: Vec<ExtractedProperty> = clump
            .properties
            .iter()
            .map(|key| {
                analyze::resolve_property(
                    self.model,
                    &sides,
                    key,
                    self.config.include_modifiers_in_extraction,
                )
            })
            .collect();
        let infos: Vec<&ConstructorInfo> = ctor_infos.iter().map(|(_, i)| i).collect();
        analyze::infer_optional(&mut properties, &infos, &assignment_graph);

        let usable = usable_classes(self.model, &selected, self.config, &sides);
        let request = ExtractionRequest {
            properties: clump.properties.clone(),
            suggested_class_name: self.suggested_class_name(clump),
            suggested_file: self.suggested_file(clump, &self.suggested_class_name(clump)),
            usable_classes: usable.iter().map(|c| c.qualified_name.clone()).collect(),
        };

        // SELECT_TARGET with the accessor-conflict retry loop.
        let mut attempts = 0;
        let (spec, mut edits, created_new_class) = loop {
            attempts += 1;
            if attempts > MAX_SELECTION_ATTEMPTS {
                return Err(DeclumpError::invalid_selection(
                    "target selection did not converge",
                ));
            }
            let Some(choice) = self.ui.select_extraction(&request)? else {
                return Err(DeclumpError::Cancelled);
            };
            match choice {
                ExtractChoice::NewClass { name, file } => {
                    if let Err(err) = self.validate_new_class(&name, &file) {
                        warn!(%err, "rejecting new-class selection");
                        continue;
                    }
                    // MATERIALIZE_CLASS, new target.
                    let ctor_args: Vec<ExtractedProperty> = properties
                        .iter()
                        .filter(|p| !p.is_declaration_only())
                        .cloned()
                        .collect();
                    let mut edits = EditSet::new();
                    edits.add_new_file(materialize::new_class_file(&file, &name, &properties));
                    info!(class = %name, file = %file, "materializing new extraction target");
                    let spec = TargetSpec {
                        field_name: consumer_field_name(&name),
                        class_name: name,
                        file,
                        ctor_args,
                    };
                    break (spec, edits, true);
                }
                ExtractChoice::Existing { qualified_name } => {
                    let Some(target) = usable
                        .iter()
                        .find(|c| c.qualified_name == qualified_name)
                    else {
                        warn!(class = %qualified_name, "selected class is not a usable target");
                        continue;
                    };

                    // MATERIALIZE_CLASS, reused target. Declined accessor
                    // conflicts loop back to selection with no mutation.
                    let conflicts = materialize::accessor_conflicts(target, &properties);
                    let mut reused = Vec::new();
                    let mut declined = false;
                    for accessor in conflicts {
                        if self.ui.confirm_accessor_reuse(&target.name, &accessor)? {
                            reused.push(accessor);
                        } else {
                            debug!(class = %target.name, %accessor, "accessor reuse declined");
                            declined = true;
                            break;
                        }
                    }
                    if declined {
                        continue;
                    }

                    let extended = materialize::extend_existing_class(
                        self.model,
                        target,
                        &properties,
                        &reused,
                    )?;
                    let mut edits = extended.edits;

                    // REWRITE_CALL_SITES for the extended constructor.
                    if let Some(ctor) = target.constructor.and_then(|id| self.model.function(id))
                    {
                        rewrite::extend_call_sites(
                            self.model,
                            ctor,
                            &extended.appended,
                            &target.name,
                            self.ui,
                            &mut edits,
                        )?;
                    }
                    info!(class = %target.name, "reusing existing extraction target");
                    let spec = TargetSpec {
                        field_name: consumer_field_name(&target.name),
                        class_name: target.name.clone(),
                        file: target.file.clone(),
                        ctor_args: extended.ctor_args,
                    };
                    break (spec, edits, false);
                }
            }
        };

        // REWRITE_CONSUMERS
        for side in sides {
            match side {
                DeclRef::Class(id) => {
                    let class = self
                        .model
                        .class(id)
                        .ok_or_else(|| DeclumpError::internal("consumer class vanished"))?;
                    let info = ctor_infos
                        .iter()
                        .find(|(decl, _)| *decl == side)
                        .map(|(_, i)| i.clone())
                        .unwrap_or_default();
                    rewrite::rewrite_class_consumer(
                        self.model, class, &selected, &spec, &info, self.ui, &mut edits,
                    )?;
                }
                DeclRef::Function(id) => {
                    let function = self
                        .model
                        .function(id)
                        .ok_or_else(|| DeclumpError::internal("consumer function vanished"))?;
                    rewrite::rewrite_function_consumer(
                        self.model, function, &selected, &spec, self.ui, &mut edits,
                    )?;
                }
            }
        }

        Ok(RefactorPlan {
            edits,
            class_name: spec.class_name,
            class_file: spec.file,
            created_new_class,
        })
    }

    fn assignment_graph(&self, sides: &[DeclRef]) -> Vec<(String, AssignmentRhs)> {
        let mut graph = Vec::new();
        for side in sides {
            let DeclRef::Class(id) = side else { continue };
            let Some(class) = self.model.class(*id) else {
                continue;
            };
            let Some(ctor) = class.constructor.and_then(|id| self.model.function(id)) else {
                continue;
            };
            if let Some(body) = &ctor.body {
                for assignment in &body.assignments {
                    graph.push((assignment.lhs_field.clone(), assignment.rhs.clone()));
                }
            }
        }
        graph
    }

    fn validate_new_class(&self, name: &str, file: &str) -> Result<()> {
        if !is_valid_identifier(name) {
            return Err(DeclumpError::invalid_selection(format!(
                "'{}' is not a legal class name",
                name
            )));
        }
        if self.model.class_by_qualified_name(name).is_some() {
            return Err(DeclumpError::invalid_selection(format!(
                "a class named '{}' already exists",
                name
            )));
        }
        if self.model.file_text(file).is_some() {
            return Err(DeclumpError::invalid_selection(format!(
                "file '{}' already exists",
                file
            )));
        }
        Ok(())
    }

    fn suggested_class_name(&self, clump: &Clump) -> String {
        let base = clump
            .origin_qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&clump.origin_qualified_name);
        let mut name: String = base
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if name.is_empty() || !name.chars().next().is_some_and(|c| c.is_alphabetic()) {
            name = "Extracted".to_string();
        }
        format!("{}Data", capitalize(&name))
    }

    fn suggested_file(&self, clump: &Clump, class_name: &str) -> String {
        let origin_file = match clump.origin {
            DeclRef::Class(id) => self.model.class(id).map(|c| c.file.clone()),
            DeclRef::Function(id) => self.model.function(id).map(|f| f.file.clone()),
        }
        .unwrap_or_default();
        let dir = origin_file
            .rsplit_once('/')
            .map(|(d, _)| format!("{}/", d))
            .unwrap_or_default();
        format!("{}{}.ts", dir, class_name.to_lowercase())
    }
}

// ============================================================================
// Usable-class query
// ============================================================================

/// Find existing classes eligible as extraction targets for a property
/// set: they carry every selected property, are named non-interface
/// classes, have no readonly match, and no constructor assignment feeding
/// a matching field from anything but its own defining parameter. The
/// clump's own declarations are excluded.
pub fn usable_classes<'m>(
    model: &'m SourceModel,
    selected: &BTreeSet<PropertyKey>,
    config: &DeclumpConfig,
    exclude: &[DeclRef],
) -> Vec<&'m ClassDecl> {
    let mut usable = Vec::new();
    for class in &model.classes {
        if !model.is_valid(DeclRef::Class(class.id)) {
            continue;
        }
        if exclude.contains(&DeclRef::Class(class.id)) {
            continue;
        }
        if class.is_interface || class.name.is_empty() {
            continue;
        }
        let fields = model.classfields(class);
        let matching: Vec<_> = fields
            .iter()
            .filter(|f| selected.contains(&f.key))
            .collect();
        if matching.len() < selected.len() {
            continue;
        }
        if config.include_modifiers_in_extraction
            && matching
                .iter()
                .any(|f| f.has_modifier(crate::property::Modifier::Static))
        {
            continue;
        }
        if matching
            .iter()
            .any(|f| f.has_modifier(crate::property::Modifier::Readonly))
        {
            continue;
        }
        if let Some(ctor) = class.constructor.and_then(|id| model.function(id)) {
            let info = analyze::analyze_class(model, class);
            let mut tainted = false;
            if let Some(body) = &ctor.body {
                for assignment in &body.assignments {
                    if !selected.iter().any(|k| k.name == assignment.lhs_field) {
                        continue;
                    }
                    let fed_by_own_param = match &assignment.rhs {
                        AssignmentRhs::Param(p) => {
                            let normalized = p.strip_prefix('_').unwrap_or(p);
                            info.defining_params
                                .get(&assignment.lhs_field)
                                .and_then(|&i| ctor.params.get(i))
                                .map(|param| param.param.key.name == normalized)
                                .unwrap_or(false)
                        }
                        _ => false,
                    };
                    if !fed_by_own_param {
                        tainted = true;
                        break;
                    }
                }
            }
            if tainted {
                continue;
            }
        }
        usable.push(class);
    }
    usable
}

// ============================================================================
// Helpers
// ============================================================================

/// The consumer-side field name for a target class: the class name with
/// its first letter lowercased.
pub fn consumer_field_name(class_name: &str) -> String {
    let mut chars = class_name.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_lowercase(), chars.as_str()),
        None => String::new(),
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::Span;
    use crate::model::{ClassId, FieldDecl};
    use crate::property::{Classfield, Modifier, Visibility};

    mod naming {
        use super::*;

        #[test]
        fn consumer_field_name_lowercases_first_letter() {
            assert_eq!(consumer_field_name("Point"), "point");
            assert_eq!(consumer_field_name("HTTPConfig"), "hTTPConfig");
            assert_eq!(consumer_field_name(""), "");
        }

        #[test]
        fn identifier_validation() {
            assert!(is_valid_identifier("Point"));
            assert!(is_valid_identifier("_private"));
            assert!(!is_valid_identifier("1point"));
            assert!(!is_valid_identifier(""));
            assert!(!is_valid_identifier("a-b"));
        }
    }

    mod usable {
        use super::*;

        fn class_with(
            model: &mut SourceModel,
            name: &str,
            fields: Vec<Classfield>,
            is_interface: bool,
        ) -> ClassId {
            model.add_class(ClassDecl {
                id: ClassId(0),
                name: name.to_string(),
                qualified_name: name.to_string(),
                file: "a.ts".to_string(),
                span: Span::new(0, 0),
                is_interface,
                is_exported: true,
                is_abstract: false,
                fields: fields
                    .into_iter()
                    .map(|f| FieldDecl {
                        field: f,
                        span: Span::new(0, 0),
                        initializer: None,
                        usages: Vec::new(),
                    })
                    .collect(),
                constructor: None,
                methods: Vec::new(),
                accessors: Vec::new(),
                superclasses: Vec::new(),
                interfaces: Vec::new(),
                header_offset: 0,
                body_insert_offset: 0,
            })
        }

        fn keys(names: &[(&str, &str)]) -> BTreeSet<PropertyKey> {
            names.iter().map(|(n, t)| PropertyKey::new(n, t)).collect()
        }

        #[test]
        fn class_with_all_properties_is_usable() {
            let mut model = SourceModel::new();
            model.add_file("a.ts", "");
            let _target = class_with(
                &mut model,
                "Point",
                vec![
                    Classfield::public("x", "number"),
                    Classfield::public("y", "number"),
                ],
                false,
            );
            let selected = keys(&[("x", "number"), ("y", "number")]);
            let usable = usable_classes(&model, &selected, &DeclumpConfig::default(), &[]);
            assert_eq!(usable.len(), 1);
            assert_eq!(usable[0].name, "Point");
        }

        #[test]
        fn interfaces_and_partial_matches_are_excluded() {
            let mut model = SourceModel::new();
            model.add_file("a.ts", "");
            class_with(
                &mut model,
                "IPoint",
                vec![
                    Classfield::public("x", "number"),
                    Classfield::public("y", "number"),
                ],
                true,
            );
            class_with(
                &mut model,
                "Partial",
                vec![Classfield::public("x", "number")],
                false,
            );
            let selected = keys(&[("x", "number"), ("y", "number")]);
            let usable = usable_classes(&model, &selected, &DeclumpConfig::default(), &[]);
            assert!(usable.is_empty());
        }

        #[test]
        fn readonly_match_is_excluded() {
            let mut model = SourceModel::new();
            model.add_file("a.ts", "");
            class_with(
                &mut model,
                "Frozen",
                vec![
                    Classfield::new("x", "number", Visibility::Public, vec![Modifier::Readonly]),
                    Classfield::public("y", "number"),
                ],
                false,
            );
            let selected = keys(&[("x", "number"), ("y", "number")]);
            let usable = usable_classes(&model, &selected, &DeclumpConfig::default(), &[]);
            assert!(usable.is_empty());
        }

        #[test]
        fn clump_sides_are_excluded() {
            let mut model = SourceModel::new();
            model.add_file("a.ts", "");
            let side = class_with(
                &mut model,
                "A",
                vec![
                    Classfield::public("x", "number"),
                    Classfield::public("y", "number"),
                ],
                false,
            );
            let selected = keys(&[("x", "number"), ("y", "number")]);
            let usable = usable_classes(
                &model,
                &selected,
                &DeclumpConfig::default(),
                &[DeclRef::Class(side)],
            );
            assert!(usable.is_empty());
        }
    }
}
