//! Selection UI trait for mode-agnostic user interaction.
//!
//! The refactoring planner asks three kinds of question: which properties
//! and target to extract to, whether a conflicting accessor on a reused
//! target may be kept, and what literal to use when no default value can be
//! derived for a call-site argument. `SelectionUi` abstracts these behind
//! an object-safe trait so the planner works the same under a terminal,
//! an IDE plugin, or a test script.

use std::collections::VecDeque;
use std::sync::Mutex;

use thiserror::Error;

use crate::property::PropertyKey;

/// Error type for interaction operations.
#[derive(Error, Debug)]
pub enum InteractionError {
    /// User cancelled the operation.
    #[error("operation cancelled by user")]
    Cancelled,

    /// No interactive channel is available (CI, piped input).
    #[error("interactive input unavailable")]
    Unavailable,

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for interaction operations.
pub type InteractionResult<T> = Result<T, InteractionError>;

/// Everything the UI needs to present an extraction decision.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// The clumped properties, preselected.
    pub properties: Vec<PropertyKey>,
    /// Suggested name for a newly extracted class.
    pub suggested_class_name: String,
    /// Suggested path for the new class's file.
    pub suggested_file: String,
    /// Qualified names of existing classes eligible as targets.
    pub usable_classes: Vec<String>,
}

/// The target the user settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractChoice {
    /// Materialize a new class.
    NewClass { name: String, file: String },
    /// Reuse an existing class by qualified name.
    Existing { qualified_name: String },
}

/// Trait for abstracting the refactoring dialogue.
///
/// Object-safe; the planner holds it as `&dyn SelectionUi`.
pub trait SelectionUi: Send + Sync {
    /// Present an extraction decision.
    ///
    /// Returns `Ok(None)` when the user declines the refactoring entirely.
    fn select_extraction(
        &self,
        request: &ExtractionRequest,
    ) -> InteractionResult<Option<ExtractChoice>>;

    /// Ask whether an accessor already defined on a reused target class may
    /// be kept as-is instead of synthesizing a fresh one.
    fn confirm_accessor_reuse(&self, class: &str, accessor: &str) -> InteractionResult<bool>;

    /// Ask for a literal default value for `property` when rewriting the
    /// call site described by `context`. `Ok(None)` means the user declined.
    fn provide_default_value(
        &self,
        property: &str,
        context: &str,
    ) -> InteractionResult<Option<String>>;
}

// ============================================================================
// Implementations
// ============================================================================

/// UI for non-interactive runs: accepts every suggestion, declines every
/// question that would need human judgement.
#[derive(Debug, Default)]
pub struct NonInteractiveUi;

impl SelectionUi for NonInteractiveUi {
    fn select_extraction(
        &self,
        request: &ExtractionRequest,
    ) -> InteractionResult<Option<ExtractChoice>> {
        Ok(Some(ExtractChoice::NewClass {
            name: request.suggested_class_name.clone(),
            file: request.suggested_file.clone(),
        }))
    }

    fn confirm_accessor_reuse(&self, _class: &str, _accessor: &str) -> InteractionResult<bool> {
        Ok(false)
    }

    fn provide_default_value(
        &self,
        _property: &str,
        _context: &str,
    ) -> InteractionResult<Option<String>> {
        Ok(None)
    }
}

/// Scripted UI for tests: answers are queued up front and consumed in order.
///
/// An empty queue falls back to the `NonInteractiveUi` behavior for that
/// question.
#[derive(Debug, Default)]
pub struct ScriptedUi {
    choices: Mutex<VecDeque<Option<ExtractChoice>>>,
    confirmations: Mutex<VecDeque<bool>>,
    defaults: Mutex<VecDeque<Option<String>>>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        ScriptedUi::default()
    }

    /// Queue an answer for the next `select_extraction` call.
    pub fn push_choice(&self, choice: Option<ExtractChoice>) {
        self.choices.lock().expect("lock poisoned").push_back(choice);
    }

    /// Queue an answer for the next `confirm_accessor_reuse` call.
    pub fn push_confirmation(&self, answer: bool) {
        self.confirmations
            .lock()
            .expect("lock poisoned")
            .push_back(answer);
    }

    /// Queue an answer for the next `provide_default_value` call.
    pub fn push_default(&self, value: Option<String>) {
        self.defaults.lock().expect("lock poisoned").push_back(value);
    }
}

impl SelectionUi for ScriptedUi {
    fn select_extraction(
        &self,
        request: &ExtractionRequest,
    ) -> InteractionResult<Option<ExtractChoice>> {
        match self.choices.lock().expect("lock poisoned").pop_front() {
            Some(choice) => Ok(choice),
            None => NonInteractiveUi.select_extraction(request),
        }
    }

    fn confirm_accessor_reuse(&self, class: &str, accessor: &str) -> InteractionResult<bool> {
        match self.confirmations.lock().expect("lock poisoned").pop_front() {
            Some(answer) => Ok(answer),
            None => NonInteractiveUi.confirm_accessor_reuse(class, accessor),
        }
    }

    fn provide_default_value(
        &self,
        property: &str,
        context: &str,
    ) -> InteractionResult<Option<String>> {
        match self.defaults.lock().expect("lock poisoned").pop_front() {
            Some(value) => Ok(value),
            None => NonInteractiveUi.provide_default_value(property, context),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
