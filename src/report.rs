//! Report envelope in the data-clumps-type-context interchange format.
//!
//! Detection results serialize to a versioned JSON document so external
//! tooling can consume findings without touching the source model. Field
//! names follow the interchange format's camelCase-with-underscores mix,
//! hence the explicit `rename` attributes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::Clump;
use crate::error::Result;
use crate::model::{DeclRef, SourceModel};
use crate::property::PropertyKey;
use crate::text::byte_offset_to_position;

pub const REPORT_VERSION: &str = "1.0.0";
pub const DETECTOR_NAME: &str = "declump";
pub const TARGET_LANGUAGE: &str = "typescript";

// ============================================================================
// Envelope types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "startLine")]
    pub start_line: u32,
    #[serde(rename = "startColumn")]
    pub start_column: u32,
    #[serde(rename = "endLine")]
    pub end_line: u32,
    #[serde(rename = "endColumn")]
    pub end_column: u32,
}

/// One clumped variable as it appears on the originating declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableContext {
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_text: String,
    pub modifiers: Vec<String>,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataClumpContext {
    pub key: String,
    pub probability: f64,
    pub from_file_path: String,
    pub from_declaration: String,
    pub to_file_path: String,
    pub to_declaration: String,
    pub data_clump_type: String,
    pub auto_refactorable: bool,
    pub data_clump_data: BTreeMap<String, VariableContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub amount_data_clumps: usize,
    pub amount_files_with_data_clumps: usize,
    pub fields_to_fields: usize,
    pub parameters_to_fields: usize,
    pub parameters_to_parameters: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_name: Option<String>,
    pub number_of_files: usize,
    pub number_of_classes: usize,
    pub number_of_functions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_version: String,
    pub report_timestamp: String,
    pub target_language: String,
    pub detector: DetectorInfo,
    pub data_clumps: BTreeMap<String, DataClumpContext>,
    pub report_summary: ReportSummary,
    pub project_info: ProjectInfo,
}

// ============================================================================
// Construction
// ============================================================================

impl Report {
    /// Assemble the envelope for a detection run over `model`.
    pub fn new(model: &SourceModel, clumps: &[Clump], project_name: Option<String>) -> Report {
        let mut data_clumps = BTreeMap::new();
        let mut summary = ReportSummary::default();
        let mut files_with_clumps = BTreeSet::new();

        for clump in clumps {
            let entry = clump_context(model, clump);
            files_with_clumps.insert(entry.from_file_path.clone());
            files_with_clumps.insert(entry.to_file_path.clone());
            match clump.kind {
                crate::detect::ClumpKind::FieldsToFields => summary.fields_to_fields += 1,
                crate::detect::ClumpKind::ParametersToFields => summary.parameters_to_fields += 1,
                crate::detect::ClumpKind::ParametersToParameters => {
                    summary.parameters_to_parameters += 1
                }
            }
            data_clumps.insert(entry.key.clone(), entry);
        }
        summary.amount_data_clumps = data_clumps.len();
        summary.amount_files_with_data_clumps = files_with_clumps.len();

        Report {
            report_version: REPORT_VERSION.to_string(),
            report_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            target_language: TARGET_LANGUAGE.to_string(),
            detector: DetectorInfo {
                name: DETECTOR_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            data_clumps,
            report_summary: summary,
            project_info: ProjectInfo {
                project_name,
                number_of_files: model.files.len(),
                number_of_classes: model.classes.len(),
                number_of_functions: model.functions.len(),
            },
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn clump_context(model: &SourceModel, clump: &Clump) -> DataClumpContext {
    let from_file = side_file(model, clump.origin);
    let to_file = side_file(model, clump.other);
    let mut data = BTreeMap::new();
    for key in &clump.properties {
        let variable = variable_context(model, clump.origin, key);
        data.insert(variable.key.clone(), variable);
    }
    DataClumpContext {
        key: format!(
            "{}-{}-{}",
            clump.origin_qualified_name,
            clump.other_qualified_name,
            clump.kind.as_str()
        ),
        probability: 1.0,
        from_file_path: from_file,
        from_declaration: clump.origin_qualified_name.clone(),
        to_file_path: to_file,
        to_declaration: clump.other_qualified_name.clone(),
        data_clump_type: clump.kind.as_str().to_string(),
        auto_refactorable: clump.auto_refactorable,
        data_clump_data: data,
    }
}

fn side_file(model: &SourceModel, side: DeclRef) -> String {
    match side {
        DeclRef::Class(id) => model.class(id).map(|c| c.file.clone()),
        DeclRef::Function(id) => model.function(id).map(|f| f.file.clone()),
    }
    .unwrap_or_default()
}

/// Locate one clumped property on the originating declaration: fields
/// report their own span, parameters and promoted fields report the
/// parameter list they live in.
fn variable_context(model: &SourceModel, side: DeclRef, key: &PropertyKey) -> VariableContext {
    let (file, span, name, type_text, modifiers) = match side {
        DeclRef::Class(id) => {
            let class = model.class(id);
            let located = class.and_then(|c| {
                if let Some(field) = c.fields.iter().find(|f| &f.field.key == key) {
                    let mut mods = vec![field.field.visibility.keyword().to_string()];
                    mods.extend(field.field.modifiers.iter().map(|m| m.keyword().to_string()));
                    return Some((
                        c.file.clone(),
                        field.span,
                        field.field.stored_name.clone(),
                        field.field.type_text.clone(),
                        mods,
                    ));
                }
                let ctor = c.constructor.and_then(|id| model.function(id))?;
                let param = ctor
                    .params
                    .iter()
                    .find(|p| p.promoted.is_some() && &p.param.key == key)?;
                let promoted = param.promoted.as_ref()?;
                let mut mods = vec![promoted.visibility.keyword().to_string()];
                mods.extend(promoted.modifiers.iter().map(|m| m.keyword().to_string()));
                Some((
                    c.file.clone(),
                    ctor.param_list_span,
                    promoted.stored_name.clone(),
                    promoted.type_text.clone(),
                    mods,
                ))
            });
            match located {
                Some(found) => found,
                None => fallback_location(key),
            }
        }
        DeclRef::Function(id) => {
            let located = model.function(id).and_then(|f| {
                let param = f.params.iter().find(|p| &p.param.key == key)?;
                Some((
                    f.file.clone(),
                    f.param_list_span,
                    param.param.stored_name.clone(),
                    param.param.type_text.clone(),
                    Vec::new(),
                ))
            });
            match located {
                Some(found) => found,
                None => fallback_location(key),
            }
        }
    };

    let text = model.file_text(&file).unwrap_or("");
    let (start_line, start_column) = byte_offset_to_position(text, span.start);
    let (end_line, end_column) = byte_offset_to_position(text, span.end);
    VariableContext {
        key: key.name.clone(),
        name,
        type_text,
        modifiers,
        position: Position {
            start_line,
            start_column,
            end_line,
            end_column,
        },
    }
}

fn fallback_location(
    key: &PropertyKey,
) -> (String, crate::edit::Span, String, String, Vec<String>) {
    (
        String::new(),
        crate::edit::Span::point(0),
        key.name.clone(),
        key.type_set_display(),
        Vec::new(),
    )
}

// ============================================================================
// Tests
// ============================================================================
