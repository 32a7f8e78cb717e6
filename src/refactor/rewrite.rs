//! Call-site and consumer rewriting.
//!
//! After the target class exists, both source declarations are routed
//! through it: extracted fields become accesses on a single new field,
//! changed signatures get their parameter lists rebuilt, and every call of
//! a changed function has its argument list rewritten positionally.
//!
//! All rewriting is planned as edits over the pre-change text. Whole
//! parameter and argument lists are replaced as single spans so the plan
//! stays free of internal overlaps, and statements scheduled for deletion
//! suppress any usage rewrites nested inside them.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::warn;

use crate::edit::{Edit, EditSet, Span};
use crate::error::{DeclumpError, Result};
use crate::interaction::SelectionUi;
use crate::model::{AssignmentRhs, ClassDecl, FunctionDecl, ParamDecl, SourceModel, Usage};
use crate::property::PropertyKey;
use crate::refactor::analyze::{primitive_default, ConstructorInfo, ExtractedProperty};
use crate::text::{extract_span, line_indent, line_start};

/// The extraction target as the rewriter sees it.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub class_name: String,
    /// Name of the field/parameter consumers gain (lowercased class name).
    pub field_name: String,
    /// File the target class lives in.
    pub file: String,
    /// The target constructor's parameter order, for argument synthesis.
    pub ctor_args: Vec<ExtractedProperty>,
}

impl TargetSpec {
    /// The declared type of the consumer's new field/parameter.
    pub fn field_decl_text(&self) -> String {
        format!("{}: {}", self.field_name, self.class_name)
    }
}

// ============================================================================
// Imports
// ============================================================================

/// Module specifier for importing `to_file` from `from_file`.
///
/// Paths are model-relative with `/` separators; the extension of the
/// imported file is dropped.
pub fn relative_import_path(from_file: &str, to_file: &str) -> String {
    let from_parts: Vec<&str> = from_file.split('/').collect();
    let to_parts: Vec<&str> = to_file.split('/').collect();
    let from_dirs = &from_parts[..from_parts.len().saturating_sub(1)];
    let to_dirs = &to_parts[..to_parts.len().saturating_sub(1)];

    let common = from_dirs
        .iter()
        .zip(to_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = String::new();
    if from_dirs.len() == common {
        out.push_str("./");
    } else {
        for _ in common..from_dirs.len() {
            out.push_str("../");
        }
    }
    for dir in &to_dirs[common..] {
        out.push_str(dir);
        out.push('/');
    }
    let file_name = to_parts.last().copied().unwrap_or_default();
    let stem = file_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(file_name);
    out.push_str(stem);
    out
}

/// Plan an import of the target class into `consumer_file`, unless the
/// class lives there already or an import is present.
pub fn import_edit(model: &SourceModel, consumer_file: &str, spec: &TargetSpec) -> Option<Edit> {
    if consumer_file == spec.file {
        return None;
    }
    let text = model.file_text(consumer_file)?;
    let marker = format!("import {{ {} }}", spec.class_name);
    if text.contains(&marker) {
        return None;
    }
    let statement = format!(
        "import {{ {} }} from \"{}\";\n",
        spec.class_name,
        relative_import_path(consumer_file, &spec.file),
    );
    Some(Edit::insert(consumer_file, 0, statement))
}

// ============================================================================
// Argument synthesis
// ============================================================================

/// Build the `new Target(...)` expression for one rewritten call.
///
/// Each target constructor argument is resolved through the fallback
/// chain: the original argument for a property present in the old
/// signature, the defining parameter's original argument when the call is
/// itself a constructor call, a captured default value, a primitive-type
/// default, and finally an interactively supplied literal. An exhausted
/// chain aborts the refactoring.
pub fn synthesize_target_call(
    spec: &TargetSpec,
    original_params: &[ParamDecl],
    original_args: &[String],
    defining: Option<&ConstructorInfo>,
    ui: &dyn SelectionUi,
    context: &str,
) -> Result<String> {
    let mut args: Vec<String> = Vec::with_capacity(spec.ctor_args.len());
    for prop in &spec.ctor_args {
        let by_signature = original_params
            .iter()
            .position(|p| p.param.key == prop.key)
            .and_then(|i| original_args.get(i));
        if let Some(arg) = by_signature {
            args.push(arg.clone());
            continue;
        }
        let by_defining = defining
            .and_then(|info| info.defining_params.get(&prop.key.name))
            .and_then(|&i| original_args.get(i));
        if let Some(arg) = by_defining {
            args.push(arg.clone());
            continue;
        }
        if let Some(default) = &prop.default {
            args.push(default.clone());
            continue;
        }
        if let Some(literal) = primitive_default(&prop.key) {
            args.push(literal.to_string());
            continue;
        }
        match ui.provide_default_value(&prop.key.name, context)? {
            Some(literal) => args.push(literal),
            None => {
                return Err(DeclumpError::ambiguous_default(
                    prop.key.name.clone(),
                    context.to_string(),
                ))
            }
        }
    }
    Ok(format!("new {}({})", spec.class_name, args.join(", ")))
}

/// Resolve a plain default (no surrounding constructor call) for one
/// appended parameter: captured default, primitive default, interactive
/// literal.
fn plain_default(
    prop: &ExtractedProperty,
    ui: &dyn SelectionUi,
    context: &str,
) -> Result<String> {
    if let Some(default) = &prop.default {
        return Ok(default.clone());
    }
    if let Some(literal) = primitive_default(&prop.key) {
        return Ok(literal.to_string());
    }
    match ui.provide_default_value(&prop.key.name, context)? {
        Some(literal) => Ok(literal),
        None => Err(DeclumpError::ambiguous_default(
            prop.key.name.clone(),
            context.to_string(),
        )),
    }
}

/// Rewrite every call of a function whose signature lost `removed`
/// parameter positions and gained the target parameter at the end.
pub fn rewrite_call_sites(
    model: &SourceModel,
    function: &FunctionDecl,
    removed: &HashSet<usize>,
    spec: &TargetSpec,
    defining: Option<&ConstructorInfo>,
    ui: &dyn SelectionUi,
    edits: &mut EditSet,
) -> Result<()> {
    for call in &function.call_sites {
        let Some(text) = model.file_text(&call.file) else {
            warn!(file = %call.file, "call site file missing from model, skipping");
            continue;
        };
        let Some(old_list) = extract_span(text, &call.arg_list_span) else {
            warn!(file = %call.file, span = %call.arg_list_span, "stale call site span, skipping");
            continue;
        };

        let mut new_args: Vec<String> = Vec::new();
        for (i, _param) in function.params.iter().enumerate() {
            if removed.contains(&i) {
                continue;
            }
            if let Some(arg) = call.args.get(i) {
                new_args.push(arg.clone());
            }
        }
        let context = format!("new {}(...) in {}", spec.class_name, call.file);
        new_args.push(synthesize_target_call(
            spec,
            &function.params,
            &call.args,
            defining,
            ui,
            &context,
        )?);

        edits.push(Edit::replace(
            &call.file,
            call.arg_list_span,
            old_list,
            new_args.join(", "),
        ));
    }
    Ok(())
}

/// Rewrite calls of a reused target's constructor after its signature
/// gained the `appended` parameters.
pub fn extend_call_sites(
    model: &SourceModel,
    ctor: &FunctionDecl,
    appended: &[ExtractedProperty],
    class_name: &str,
    ui: &dyn SelectionUi,
    edits: &mut EditSet,
) -> Result<()> {
    if appended.is_empty() {
        return Ok(());
    }
    for call in &ctor.call_sites {
        let Some(text) = model.file_text(&call.file) else {
            warn!(file = %call.file, "call site file missing from model, skipping");
            continue;
        };
        let Some(old_list) = extract_span(text, &call.arg_list_span) else {
            warn!(file = %call.file, span = %call.arg_list_span, "stale call site span, skipping");
            continue;
        };
        let mut new_args = call.args.clone();
        let context = format!("new {}(...) in {}", class_name, call.file);
        for prop in appended {
            new_args.push(plain_default(prop, ui, &context)?);
        }
        edits.push(Edit::replace(
            &call.file,
            call.arg_list_span,
            old_list,
            new_args.join(", "),
        ));
    }
    Ok(())
}

// ============================================================================
// Consumer rewriting
// ============================================================================

/// Expand a statement span to cover its whole line(s), trailing newline
/// included.
pub fn full_line_span(text: &str, span: &Span) -> Span {
    let start = line_start(text, span.start);
    let end = text[span.end.min(text.len())..]
        .find('\n')
        .map(|p| span.end + p + 1)
        .unwrap_or(text.len());
    Span::new(start, end)
}

fn usage_replacement(usage: &Usage, field_name: &str, property: &str) -> String {
    match &usage.receiver {
        Some(receiver) => format!("{}.{}.{}", receiver, field_name, property),
        None => format!("{}.{}", field_name, property),
    }
}

fn usage_is_deleted(usage: &Usage, deleted: &HashMap<String, Vec<Span>>) -> bool {
    deleted
        .get(&usage.file)
        .map(|spans| spans.iter().any(|s| s.contains(&usage.span)))
        .unwrap_or(false)
}

fn push_usage_edit(
    model: &SourceModel,
    usage: &Usage,
    replacement: String,
    edits: &mut EditSet,
) {
    let Some(text) = model.file_text(&usage.file) else {
        warn!(file = %usage.file, "usage file missing from model, skipping");
        return;
    };
    let Some(old) = extract_span(text, &usage.span) else {
        warn!(file = %usage.file, span = %usage.span, "stale usage span, skipping");
        return;
    };
    edits.push(Edit::replace(&usage.file, usage.span, old, replacement));
}

/// Route a consumer class through the target.
///
/// Replaces the extracted field declarations with one `point: Target`
/// field, rewrites field references to go through it, removes the
/// constructor parameters that defined extracted fields, appends the
/// target parameter, inserts `this.point = point;`, deletes redundant
/// self-assignments, and rewrites the constructor's own call sites.
pub fn rewrite_class_consumer(
    model: &SourceModel,
    class: &ClassDecl,
    selected: &BTreeSet<PropertyKey>,
    spec: &TargetSpec,
    info: &ConstructorInfo,
    ui: &dyn SelectionUi,
    edits: &mut EditSet,
) -> Result<()> {
    let text = model
        .file_text(&class.file)
        .ok_or_else(|| DeclumpError::FileNotFound {
            path: class.file.clone(),
        })?;

    if let Some(edit) = import_edit(model, &class.file, spec) {
        // Both consumers may live in one file; import it once.
        if !edits.edits().contains(&edit) {
            edits.push(edit);
        }
    }

    let matching_fields: Vec<_> = class
        .fields
        .iter()
        .filter(|f| selected.contains(&f.field.key))
        .collect();
    let ctor = class.constructor.and_then(|id| model.function(id));

    let mut deleted: HashMap<String, Vec<Span>> = HashMap::new();

    // The first extracted field declaration becomes the new field; the
    // rest are deleted outright. A class whose extracted properties were
    // all promoted parameters gets the field inserted instead.
    let field_decl = if ctor.is_some() {
        format!("{};", spec.field_decl_text())
    } else {
        let context = format!("field initializer in {}", class.qualified_name);
        let mut args: Vec<String> = Vec::new();
        for prop in &spec.ctor_args {
            args.push(plain_default(prop, ui, &context)?);
        }
        format!(
            "{}: {} = new {}({});",
            spec.field_name,
            spec.class_name,
            spec.class_name,
            args.join(", ")
        )
    };
    match matching_fields.split_first() {
        Some((first, rest)) => {
            let old = extract_span(text, &first.span).ok_or_else(|| {
                DeclumpError::internal(format!("stale field span in {}", class.file))
            })?;
            edits.push(Edit::replace(&class.file, first.span, old, field_decl));
            for field in rest {
                let line = full_line_span(text, &field.span);
                let old = extract_span(text, &line).ok_or_else(|| {
                    DeclumpError::internal(format!("stale field span in {}", class.file))
                })?;
                edits.push(Edit::delete(&class.file, line, old));
                deleted.entry(class.file.clone()).or_default().push(line);
            }
        }
        None => {
            let indent = format!("{}    ", line_indent(text, class.header_offset));
            edits.push(Edit::insert(
                &class.file,
                class.body_insert_offset,
                format!("{}{}\n", indent, field_decl),
            ));
        }
    }

    // Constructor surgery.
    let mut removed_param_replacements: HashMap<String, String> = HashMap::new();
    if let Some(ctor) = ctor {
        let removed: HashSet<usize> = info
            .defining_params
            .iter()
            .filter(|(name, _)| selected.iter().any(|k| &k.name == *name))
            .map(|(_, &idx)| idx)
            .collect();
        for (name, &idx) in &info.defining_params {
            if selected.iter().any(|k| &k.name == name) {
                if let Some(param) = ctor.params.get(idx) {
                    removed_param_replacements.insert(
                        param.param.key.name.clone(),
                        format!("{}.{}", spec.field_name, name),
                    );
                }
            }
        }

        let old_list = extract_span(text, &ctor.param_list_span).ok_or_else(|| {
            DeclumpError::internal(format!("stale parameter list span in {}", class.file))
        })?;
        let mut parts: Vec<String> = ctor
            .params
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, p)| p.text.clone())
            .collect();
        parts.push(spec.field_decl_text());
        edits.push(Edit::replace(
            &class.file,
            ctor.param_list_span,
            old_list,
            parts.join(", "),
        ));

        if let Some(body) = &ctor.body {
            // Self-assignments of the form `this.x = x;` become redundant
            // once the field and parameter merge into the target.
            for assignment in &body.assignments {
                if !selected.iter().any(|k| k.name == assignment.lhs_field) {
                    continue;
                }
                let AssignmentRhs::Param(rhs_param) = &assignment.rhs else {
                    continue;
                };
                let rhs_normalized = rhs_param.strip_prefix('_').unwrap_or(rhs_param);
                let defines = info
                    .defining_params
                    .get(&assignment.lhs_field)
                    .and_then(|&i| ctor.params.get(i))
                    .map(|p| p.param.key.name == rhs_normalized)
                    .unwrap_or(false);
                if defines {
                    let line = full_line_span(text, &assignment.span);
                    let old = extract_span(text, &line).ok_or_else(|| {
                        DeclumpError::internal(format!(
                            "stale assignment span in {}",
                            class.file
                        ))
                    })?;
                    edits.push(Edit::delete(&class.file, line, old));
                    deleted.entry(class.file.clone()).or_default().push(line);
                }
            }

            let statement = format!("this.{} = {};", spec.field_name, spec.field_name);
            match &body.super_call {
                Some(super_span) => {
                    let indent = line_indent(text, super_span.start);
                    edits.push(Edit::insert(
                        &class.file,
                        super_span.end,
                        format!("\n{}{}", indent, statement),
                    ));
                }
                None => {
                    let indent = format!("{}    ", line_indent(text, body.span.start));
                    edits.push(Edit::insert(
                        &class.file,
                        body.span.start,
                        format!("\n{}{}", indent, statement),
                    ));
                }
            }
        }

        // References to removed parameters route through the new one.
        for (i, param) in ctor.params.iter().enumerate() {
            if !removed.contains(&i) {
                continue;
            }
            let Some(replacement) = removed_param_replacements.get(&param.param.key.name)
            else {
                continue;
            };
            for usage in &param.usages {
                if usage_is_deleted(usage, &deleted) {
                    continue;
                }
                push_usage_edit(model, usage, replacement.clone(), edits);
            }
        }

        rewrite_call_sites(model, ctor, &removed, spec, Some(info), ui, edits)?;
    }

    // Field references route through the new field.
    for field in &matching_fields {
        for usage in &field.usages {
            if usage_is_deleted(usage, &deleted) {
                continue;
            }
            let replacement = match &usage.receiver {
                Some(_) => usage_replacement(usage, &spec.field_name, &field.field.key.name),
                None => format!("this.{}.{}", spec.field_name, field.field.key.name),
            };
            push_usage_edit(model, usage, replacement, edits);
        }
    }
    if let Some(ctor) = ctor {
        for param in &ctor.params {
            let Some(promoted) = &param.promoted else {
                continue;
            };
            if !selected.contains(&promoted.key) {
                continue;
            }
            for usage in &param.usages {
                if usage_is_deleted(usage, &deleted) {
                    continue;
                }
                let replacement = match &usage.receiver {
                    Some(_) => usage_replacement(usage, &spec.field_name, &promoted.key.name),
                    None => format!("{}.{}", spec.field_name, promoted.key.name),
                };
                push_usage_edit(model, usage, replacement, edits);
            }
        }
    }

    Ok(())
}

/// Route a consumer function (non-constructor) through the target:
/// extracted parameters leave the signature, the target parameter is
/// appended, parameter references become accesses on it, and the
/// function's call sites are rewritten.
pub fn rewrite_function_consumer(
    model: &SourceModel,
    function: &FunctionDecl,
    selected: &BTreeSet<PropertyKey>,
    spec: &TargetSpec,
    ui: &dyn SelectionUi,
    edits: &mut EditSet,
) -> Result<()> {
    let text = model
        .file_text(&function.file)
        .ok_or_else(|| DeclumpError::FileNotFound {
            path: function.file.clone(),
        })?;

    if let Some(edit) = import_edit(model, &function.file, spec) {
        if !edits.edits().contains(&edit) {
            edits.push(edit);
        }
    }

    let removed: HashSet<usize> = function
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| selected.contains(&p.param.key))
        .map(|(i, _)| i)
        .collect();

    let old_list = extract_span(text, &function.param_list_span).ok_or_else(|| {
        DeclumpError::internal(format!("stale parameter list span in {}", function.file))
    })?;
    let mut parts: Vec<String> = function
        .params
        .iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(i))
        .map(|(_, p)| p.text.clone())
        .collect();
    parts.push(spec.field_decl_text());
    edits.push(Edit::replace(
        &function.file,
        function.param_list_span,
        old_list,
        parts.join(", "),
    ));

    for (i, param) in function.params.iter().enumerate() {
        if !removed.contains(&i) {
            continue;
        }
        let replacement = format!("{}.{}", spec.field_name, param.param.key.name);
        for usage in &param.usages {
            push_usage_edit(model, usage, replacement.clone(), edits);
        }
    }

    rewrite_call_sites(model, function, &removed, spec, None, ui, edits)
}

// ============================================================================
// Tests
// ============================================================================
