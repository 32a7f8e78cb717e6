//! Typed in-memory source model.
//!
//! The model is the boundary between declump and whatever frontend parsed
//! the source: the host constructs a `SourceModel` (directly or from a JSON
//! dump), and every analysis and refactoring step works against it. The
//! model is an owned value with explicit create/mutate/drop; nothing in the
//! crate holds global state.
//!
//! Declarations carry byte spans into the file texts they came from. A
//! refactoring plan is applied atomically through the edit IR; applying
//! bumps the model version and invalidates declarations in touched files,
//! so stale spans are never silently reused.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::edit::{EditSet, Span};
use crate::error::Result;
use crate::property::{Classfield, Parameter};

// ============================================================================
// Identifiers
// ============================================================================

/// Stable class identifier within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class_{}", self.0)
    }
}

/// Stable function identifier within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn_{}", self.0)
    }
}

/// Reference to either kind of property-bearing declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclRef {
    Class(ClassId),
    Function(FunctionId),
}

impl fmt::Display for DeclRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclRef::Class(id) => write!(f, "{}", id),
            DeclRef::Function(id) => write!(f, "{}", id),
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// One source file's path and current text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

/// A reference to a field or parameter inside some expression.
///
/// `span` covers the whole access expression (`this._x`, `order.x`, or a
/// bare `x` for parameters), which is the unit the rewriter replaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub file: String,
    pub span: Span,
    /// Receiver text (`this`, a variable name); `None` for bare identifiers.
    pub receiver: Option<String>,
}

/// A field declaration inside a class body.
///
/// `span` covers the whole declaration statement including its line
/// terminator, so deleting it removes the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub field: Classfield,
    pub span: Span,
    /// Initializer expression text, if the field has a default.
    pub initializer: Option<String>,
    pub usages: Vec<Usage>,
}

/// A parameter declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDecl {
    pub param: Parameter,
    /// Full declared text (`private _x: number = 0`), used when parameter
    /// lists are rebuilt.
    pub text: String,
    /// Set when a constructor parameter is promoted to a field.
    pub promoted: Option<Classfield>,
    /// Default value expression text, if any.
    pub initializer: Option<String>,
    pub usages: Vec<Usage>,
}

/// What the right-hand side of a constructor assignment resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRhs {
    /// A reference to a parameter of the enclosing function.
    Param(String),
    /// A reference to a field of the enclosing class.
    Field(String),
    /// Anything else, kept as text.
    Other(String),
}

/// A `this.f = <expr>;` statement in a function body.
///
/// `span` covers the whole statement including its line terminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub span: Span,
    /// Normalized name of the assigned field (leading `_` stripped).
    pub lhs_field: String,
    pub rhs: AssignmentRhs,
}

/// A function body's statement region and the facts rewriting needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionBody {
    /// Statement region between the braces (exclusive of `{` and `}`).
    pub span: Span,
    /// Span of the `super(...);` statement, if present.
    pub super_call: Option<Span>,
    pub assignments: Vec<Assignment>,
}

/// One call of a function or constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    /// Span of the argument list between the parentheses.
    pub arg_list_span: Span,
    /// Argument expression texts, positionally.
    pub args: Vec<String>,
}

/// A class declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub id: ClassId,
    pub name: String,
    pub qualified_name: String,
    pub file: String,
    pub span: Span,
    pub is_interface: bool,
    pub is_exported: bool,
    pub is_abstract: bool,
    pub fields: Vec<FieldDecl>,
    pub constructor: Option<FunctionId>,
    pub methods: Vec<FunctionId>,
    /// Names of `get`/`set` accessors the class defines.
    pub accessors: Vec<String>,
    /// Qualified names of extended classes.
    pub superclasses: Vec<String>,
    /// Qualified names of implemented interfaces.
    pub interfaces: Vec<String>,
    /// Offset of the leading keyword, where `export ` would be inserted.
    pub header_offset: usize,
    /// Offset just before the closing brace, where new members go.
    pub body_insert_offset: usize,
}

/// A function or method declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub id: FunctionId,
    pub name: String,
    pub qualified_name: String,
    pub file: String,
    pub span: Span,
    /// Span of the parameter list between the parentheses.
    pub param_list_span: Span,
    pub params: Vec<ParamDecl>,
    pub is_constructor: bool,
    pub containing_class: Option<ClassId>,
    pub body: Option<FunctionBody>,
    pub call_sites: Vec<CallSite>,
}

// ============================================================================
// Source Model
// ============================================================================

/// The whole analyzed program: files, declarations, and a version counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceModel {
    pub files: Vec<SourceFile>,
    pub classes: Vec<ClassDecl>,
    pub functions: Vec<FunctionDecl>,
    /// Bumped on every applied edit set.
    pub version: u64,
    #[serde(skip)]
    invalidated: HashSet<DeclRef>,
}

impl SourceModel {
    /// Create an empty model.
    pub fn new() -> Self {
        SourceModel::default()
    }

    /// Load a model from its JSON dump.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    // ------------------------------------------------------------------
    // Construction (host/builder side)
    // ------------------------------------------------------------------

    /// Register a file and its text.
    pub fn add_file(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.push(SourceFile {
            path: path.into(),
            text: text.into(),
        });
    }

    /// Add a class, assigning it the next free id.
    ///
    /// The caller fills in everything but `id`; the value passed in the
    /// `id` field is overwritten.
    pub fn add_class(&mut self, mut class: ClassDecl) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        class.id = id;
        self.classes.push(class);
        id
    }

    /// Add a function, assigning it the next free id and linking it to its
    /// containing class (as constructor or method).
    pub fn add_function(&mut self, mut function: FunctionDecl) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        function.id = id;
        if let Some(class_id) = function.containing_class {
            if let Some(class) = self.classes.get_mut(class_id.0 as usize) {
                if function.is_constructor {
                    class.constructor = Some(id);
                } else {
                    class.methods.push(id);
                }
            }
        }
        self.functions.push(function);
        id
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// The class with the given id, if it exists and is still valid.
    pub fn class(&self, id: ClassId) -> Option<&ClassDecl> {
        if self.invalidated.contains(&DeclRef::Class(id)) {
            return None;
        }
        self.classes.get(id.0 as usize)
    }

    /// The function with the given id, if it exists and is still valid.
    pub fn function(&self, id: FunctionId) -> Option<&FunctionDecl> {
        if self.invalidated.contains(&DeclRef::Function(id)) {
            return None;
        }
        self.functions.get(id.0 as usize)
    }

    /// Resolve a class by qualified name.
    pub fn class_by_qualified_name(&self, qualified_name: &str) -> Option<&ClassDecl> {
        self.classes
            .iter()
            .find(|c| c.qualified_name == qualified_name && self.is_valid(DeclRef::Class(c.id)))
    }

    /// Resolve a function by qualified name.
    pub fn function_by_qualified_name(&self, qualified_name: &str) -> Option<&FunctionDecl> {
        self.functions
            .iter()
            .find(|f| f.qualified_name == qualified_name && self.is_valid(DeclRef::Function(f.id)))
    }

    /// Current text of a file.
    pub fn file_text(&self, path: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.text.as_str())
    }

    /// All class fields of a class, including constructor-promoted
    /// parameters.
    pub fn classfields(&self, class: &ClassDecl) -> Vec<Classfield> {
        let mut fields: Vec<Classfield> = class.fields.iter().map(|f| f.field.clone()).collect();
        if let Some(ctor_id) = class.constructor {
            if let Some(ctor) = self.function(ctor_id) {
                for param in &ctor.params {
                    if let Some(promoted) = &param.promoted {
                        fields.push(promoted.clone());
                    }
                }
            }
        }
        fields
    }

    /// Whether a declaration still exists in this model version.
    pub fn is_valid(&self, decl: DeclRef) -> bool {
        if self.invalidated.contains(&decl) {
            return false;
        }
        match decl {
            DeclRef::Class(id) => (id.0 as usize) < self.classes.len(),
            DeclRef::Function(id) => (id.0 as usize) < self.functions.len(),
        }
    }

    /// Mark a declaration as gone; later lookups return `None`.
    pub fn invalidate(&mut self, decl: DeclRef) {
        self.invalidated.insert(decl);
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Apply an edit set atomically.
    ///
    /// On success the version is bumped and every declaration living in a
    /// touched or created file is invalidated, since its spans no longer
    /// describe the new text. On failure the model is unchanged.
    pub fn apply(&mut self, edits: &EditSet) -> Result<()> {
        let mut texts: HashMap<String, String> = self
            .files
            .iter()
            .map(|f| (f.path.clone(), f.text.clone()))
            .collect();
        edits.apply(&mut texts).map_err(crate::error::DeclumpError::from)?;

        let mut touched: HashSet<&str> = edits.edits().iter().map(|e| e.file.as_str()).collect();
        for nf in edits.new_files() {
            touched.insert(nf.path.as_str());
        }

        for file in &mut self.files {
            if let Some(new_text) = texts.remove(&file.path) {
                file.text = new_text;
            }
        }
        for (path, text) in texts {
            self.files.push(SourceFile { path, text });
        }

        let stale: Vec<DeclRef> = self
            .classes
            .iter()
            .filter(|c| touched.contains(c.file.as_str()))
            .map(|c| DeclRef::Class(c.id))
            .chain(
                self.functions
                    .iter()
                    .filter(|f| touched.contains(f.file.as_str()))
                    .map(|f| DeclRef::Function(f.id)),
            )
            .collect();
        for decl in stale {
            self.invalidate(decl);
        }

        self.version += 1;
        Ok(())
    }
}

/// Span of the first occurrence of `snippet` in `text`.
///
/// Convenience for hosts and tests that build models from literal sources.
pub fn span_of(text: &str, snippet: &str) -> Option<Span> {
    text.find(snippet)
        .map(|start| Span::new(start, start + snippet.len()))
}

// ============================================================================
// Tests
// ============================================================================
