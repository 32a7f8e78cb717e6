//! Target class synthesis.
//!
//! New targets are emitted whole: a constructor taking every non-abstract
//! property (non-public ones as underscore-prefixed backing parameters) and
//! a getter/setter pair per non-public property. Reused targets are
//! extended in place: missing constructor parameters and accessors are
//! appended, and the class gains an `export` keyword if it lacks one.

use crate::edit::{Edit, EditSet, NewFile};
use crate::error::{DeclumpError, Result};
use crate::model::{ClassDecl, SourceModel};
use crate::property::Visibility;
use crate::refactor::analyze::{analyze_class, ExtractedProperty};
use crate::text::{extract_span, line_indent};

// ============================================================================
// New class
// ============================================================================

/// Render the source of a freshly extracted class.
pub fn new_class_source(name: &str, properties: &[ExtractedProperty]) -> String {
    let is_abstract = properties.iter().any(|p| p.is_declaration_only());
    let mut out = String::new();
    out.push_str("export ");
    if is_abstract {
        out.push_str("abstract ");
    }
    out.push_str("class ");
    out.push_str(name);
    out.push_str(" {\n");

    for prop in properties.iter().filter(|p| p.is_declaration_only()) {
        out.push_str("    ");
        out.push_str(&field_declaration(prop));
        out.push('\n');
    }

    let ctor_params: Vec<String> = properties
        .iter()
        .filter(|p| !p.is_declaration_only())
        .map(|p| promoted_param_text(p))
        .collect();
    out.push_str("    constructor(");
    out.push_str(&ctor_params.join(", "));
    out.push_str(") {\n    }\n");

    for prop in properties
        .iter()
        .filter(|p| p.needs_accessors() && !p.is_declaration_only())
    {
        out.push('\n');
        out.push_str(&accessor_pair(prop, "    "));
    }

    out.push_str("}\n");
    out
}

/// A promoted constructor parameter for one property.
///
/// Public properties are promoted under their plain name; non-public ones
/// get an underscore-prefixed backing name so accessors can take the plain
/// one.
pub fn promoted_param_text(prop: &ExtractedProperty) -> String {
    let mut out = String::new();
    out.push_str(prop.visibility.keyword());
    for modifier in &prop.modifiers {
        out.push(' ');
        out.push_str(modifier.keyword());
    }
    out.push(' ');
    if prop.needs_accessors() {
        out.push('_');
    }
    out.push_str(&prop.key.name);
    if prop.optional {
        out.push('?');
    }
    out.push_str(": ");
    out.push_str(&prop.type_text);
    out
}

fn field_declaration(prop: &ExtractedProperty) -> String {
    let mut out = String::new();
    if prop.visibility != Visibility::Public {
        out.push_str(prop.visibility.keyword());
        out.push(' ');
    }
    for modifier in &prop.modifiers {
        out.push_str(modifier.keyword());
        out.push(' ');
    }
    out.push_str(&prop.key.name);
    if prop.optional {
        out.push('?');
    }
    out.push_str(": ");
    out.push_str(&prop.type_text);
    out.push(';');
    out
}

/// Getter/setter pair over the underscore-prefixed backing field.
pub fn accessor_pair(prop: &ExtractedProperty, indent: &str) -> String {
    let value_type = if prop.optional {
        format!("{} | undefined", prop.type_text)
    } else {
        prop.type_text.clone()
    };
    format!(
        "{i}get {n}(): {t} {{\n{i}    return this._{n};\n{i}}}\n\n\
         {i}set {n}(value: {t}) {{\n{i}    this._{n} = value;\n{i}}}\n",
        i = indent,
        n = prop.key.name,
        t = value_type,
    )
}

// ============================================================================
// Existing class
// ============================================================================

/// Accessor names on the target that collide with properties being added.
pub fn accessor_conflicts(target: &ClassDecl, properties: &[ExtractedProperty]) -> Vec<String> {
    properties
        .iter()
        .filter(|p| target.accessors.iter().any(|a| a == &p.key.name))
        .map(|p| p.key.name.clone())
        .collect()
}

/// What extending an existing target produced.
pub struct ExtendedTarget {
    /// Edits that bring the target class up to shape.
    pub edits: EditSet,
    /// The target constructor's final parameter order, for argument
    /// synthesis at `new Target(...)` sites.
    pub ctor_args: Vec<ExtractedProperty>,
    /// Properties appended to the constructor (call sites of the old
    /// signature must gain arguments for exactly these).
    pub appended: Vec<ExtractedProperty>,
}

/// Extend a reused target class so its constructor defines every selected
/// property.
///
/// Properties the constructor already defines (promoted, or fed by a
/// defining assignment) stay untouched. A property the class carries only
/// as a plain field gains a parameter and a `this.f = p;` assignment; one
/// the class lacks entirely is appended as a promoted parameter with
/// accessors as needed. A class without a constructor gets one
/// synthesized, and the class gains an `export` keyword when absent.
/// `reused_accessors` lists conflicting accessor names the user agreed to
/// keep.
pub fn extend_existing_class(
    model: &SourceModel,
    target: &ClassDecl,
    properties: &[ExtractedProperty],
    reused_accessors: &[String],
) -> Result<ExtendedTarget> {
    let text = model
        .file_text(&target.file)
        .ok_or_else(|| DeclumpError::FileNotFound {
            path: target.file.clone(),
        })?;
    let existing = model.classfields(target);
    let info = analyze_class(model, target);
    let mut edits = EditSet::new();

    if !target.is_exported {
        edits.push(Edit::insert(&target.file, target.header_offset, "export "));
    }

    // Fields the target merely declares still need constructor coverage,
    // otherwise reused targets are instantiated uninitialized.
    let missing: Vec<&ExtractedProperty> = properties
        .iter()
        .filter(|p| !info.defines(&p.key.name))
        .collect();

    let mut new_params: Vec<String> = Vec::new();
    let mut assignments: Vec<String> = Vec::new();
    let mut accessor_props: Vec<&ExtractedProperty> = Vec::new();
    for prop in &missing {
        match existing.iter().find(|f| f.key == prop.key) {
            Some(field) => {
                new_params.push(format!("{}: {}", prop.key.name, prop.type_text));
                assignments.push(format!("this.{} = {};", field.stored_name, prop.key.name));
            }
            None => {
                new_params.push(promoted_param_text(prop));
                if prop.needs_accessors() && !reused_accessors.contains(&prop.key.name) {
                    accessor_props.push(prop);
                }
            }
        }
    }

    let mut ctor_args: Vec<ExtractedProperty> = Vec::new();
    match target.constructor.and_then(|id| model.function(id)) {
        Some(ctor) => {
            for param in &ctor.params {
                let key = param
                    .promoted
                    .as_ref()
                    .map(|f| f.key.clone())
                    .unwrap_or_else(|| param.param.key.clone());
                ctor_args.push(ExtractedProperty {
                    key,
                    type_text: param.param.type_text.clone(),
                    visibility: Visibility::Public,
                    modifiers: Vec::new(),
                    optional: false,
                    default: param.initializer.clone(),
                });
            }
            if !missing.is_empty() {
                let old_list =
                    extract_span(text, &ctor.param_list_span).ok_or_else(|| {
                        DeclumpError::internal(format!(
                            "constructor parameter list span out of bounds in {}",
                            target.file
                        ))
                    })?;
                let mut parts: Vec<String> =
                    ctor.params.iter().map(|p| p.text.clone()).collect();
                parts.extend(new_params);
                edits.push(Edit::replace(
                    &target.file,
                    ctor.param_list_span,
                    old_list,
                    parts.join(", "),
                ));
            }
            if !assignments.is_empty() {
                if let Some(body) = &ctor.body {
                    let block: String = match &body.super_call {
                        Some(super_span) => {
                            let indent = line_indent(text, super_span.start);
                            let block: String = assignments
                                .iter()
                                .map(|a| format!("\n{}{}", indent, a))
                                .collect();
                            edits.push(Edit::insert(&target.file, super_span.end, block));
                            String::new()
                        }
                        None => assignments
                            .iter()
                            .map(|a| {
                                let indent =
                                    format!("{}    ", line_indent(text, body.span.start));
                                format!("\n{}{}", indent, a)
                            })
                            .collect(),
                    };
                    if !block.is_empty() {
                        edits.push(Edit::insert(&target.file, body.span.start, block));
                    }
                }
            }
        }
        None => {
            if !missing.is_empty() {
                let indent = member_indent(text, target);
                let body: String = assignments
                    .iter()
                    .map(|a| format!("{}    {}\n", indent, a))
                    .collect();
                let ctor_text = format!(
                    "{i}constructor({params}) {{\n{body}{i}}}\n",
                    i = indent,
                    params = new_params.join(", "),
                    body = body,
                );
                edits.push(Edit::insert(
                    &target.file,
                    target.body_insert_offset,
                    ctor_text,
                ));
            }
        }
    }
    for prop in &missing {
        ctor_args.push((*prop).clone());
    }

    let indent = member_indent(text, target);
    for prop in accessor_props {
        let accessors = format!("\n{}", accessor_pair(prop, &indent));
        edits.push(Edit::insert(
            &target.file,
            target.body_insert_offset,
            accessors,
        ));
    }

    let appended: Vec<ExtractedProperty> = missing.into_iter().cloned().collect();
    Ok(ExtendedTarget {
        edits,
        ctor_args,
        appended,
    })
}

fn member_indent(text: &str, class: &ClassDecl) -> String {
    format!("{}    ", line_indent(text, class.header_offset))
}

// ============================================================================
// Build the new file record
// ============================================================================

/// Wrap a rendered class into its new file.
pub fn new_class_file(path: &str, name: &str, properties: &[ExtractedProperty]) -> NewFile {
    NewFile {
        path: path.to_string(),
        text: new_class_source(name, properties),
    }
}

// ============================================================================
// Tests
// ============================================================================
