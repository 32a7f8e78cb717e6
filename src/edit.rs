//! Edit IR: spans, anchored replacements, and atomic edit sets.
//!
//! Refactoring steps never mutate file text directly. They plan `Edit`s
//! (span replacements verified by a SHA-256 pre-image hash) collected into
//! an `EditSet`, which applies all-or-nothing: every edit is validated
//! against the untouched file texts before any byte changes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Content Hash
// ============================================================================

/// Hash type for pre-image verification (SHA-256, hex-encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA-256 hash of the given bytes, returning hex-encoded string.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Span
// ============================================================================

/// Byte offsets into file content, half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// An empty span at `offset` (insertion point).
    pub fn point(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span overlaps with another.
    ///
    /// Adjacent spans (one ends where another starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Edits
// ============================================================================

/// A single anchored replacement in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// Path of the file to edit (model-relative).
    pub file: String,
    /// Byte range to replace.
    pub span: Span,
    /// Replacement text (empty for deletion).
    pub replacement: String,
    /// SHA-256 of the bytes in `span` at planning time.
    pub expected_before: ContentHash,
}

impl Edit {
    /// Plan a replacement of `old_text` (the current content of `span`).
    pub fn replace(
        file: impl Into<String>,
        span: Span,
        old_text: &str,
        replacement: impl Into<String>,
    ) -> Self {
        Edit {
            file: file.into(),
            span,
            replacement: replacement.into(),
            expected_before: ContentHash::compute(old_text.as_bytes()),
        }
    }

    /// Plan an insertion at `offset`.
    pub fn insert(file: impl Into<String>, offset: usize, text: impl Into<String>) -> Self {
        Edit {
            file: file.into(),
            span: Span::point(offset),
            replacement: text.into(),
            expected_before: ContentHash::compute(b""),
        }
    }

    /// Plan a deletion of `old_text` (the current content of `span`).
    pub fn delete(file: impl Into<String>, span: Span, old_text: &str) -> Self {
        Edit::replace(file, span, old_text, "")
    }
}

/// A file created by the refactoring (the extracted class's new home).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    pub path: String,
    pub text: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Failures detected while validating or applying an edit set.
#[derive(Debug, Error)]
pub enum EditError {
    /// Two edits in the same file cover overlapping byte ranges.
    #[error("overlapping edits in {file}: {first} and {second}")]
    Overlap {
        file: String,
        first: Span,
        second: Span,
    },

    /// Content at the span no longer matches the planned pre-image.
    #[error("pre-image mismatch in {file} at {span}")]
    PreimageMismatch { file: String, span: Span },

    /// Edit span exceeds the file length.
    #[error("edit span {span} out of bounds in {file} (len {file_len})")]
    OutOfBounds {
        file: String,
        span: Span,
        file_len: usize,
    },

    /// Edit targets a file the model does not contain.
    #[error("unknown file: {path}")]
    UnknownFile { path: String },

    /// A planned new file collides with an existing path.
    #[error("new file collides with existing path: {path}")]
    DuplicateNewFile { path: String },
}

// ============================================================================
// Edit Set
// ============================================================================

/// An ordered collection of edits and new files, applied atomically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditSet {
    edits: Vec<Edit>,
    new_files: Vec<NewFile>,
}

impl EditSet {
    /// Create an empty edit set.
    pub fn new() -> Self {
        EditSet::default()
    }

    /// Add an edit.
    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Add a new file.
    pub fn add_new_file(&mut self, file: NewFile) {
        self.new_files.push(file);
    }

    /// Whether the set contains no edits and no new files.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.new_files.is_empty()
    }

    /// Number of edits (new files not counted).
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// The planned edits, in insertion order.
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// The planned new files.
    pub fn new_files(&self) -> &[NewFile] {
        &self.new_files
    }

    /// Validate the whole set against the given file texts.
    ///
    /// Checks file existence, span bounds, pre-image hashes, overlap between
    /// edits in the same file, and new-file collisions. Does not mutate.
    pub fn validate(
        &self,
        files: &HashMap<String, String>,
    ) -> std::result::Result<(), EditError> {
        for nf in &self.new_files {
            if files.contains_key(&nf.path) {
                return Err(EditError::DuplicateNewFile {
                    path: nf.path.clone(),
                });
            }
        }

        let mut per_file: HashMap<&str, Vec<&Edit>> = HashMap::new();
        for edit in &self.edits {
            let text = files
                .get(&edit.file)
                .ok_or_else(|| EditError::UnknownFile {
                    path: edit.file.clone(),
                })?;
            if edit.span.end > text.len() {
                return Err(EditError::OutOfBounds {
                    file: edit.file.clone(),
                    span: edit.span,
                    file_len: text.len(),
                });
            }
            let before = &text[edit.span.start..edit.span.end];
            if ContentHash::compute(before.as_bytes()) != edit.expected_before {
                return Err(EditError::PreimageMismatch {
                    file: edit.file.clone(),
                    span: edit.span,
                });
            }
            per_file.entry(edit.file.as_str()).or_default().push(edit);
        }

        for (file, mut edits) in per_file {
            edits.sort_by_key(|e| (e.span.start, e.span.end));
            for pair in edits.windows(2) {
                if pair[0].span.overlaps(&pair[1].span) {
                    return Err(EditError::Overlap {
                        file: file.to_string(),
                        first: pair[0].span,
                        second: pair[1].span,
                    });
                }
            }
        }

        Ok(())
    }

    /// Apply the set to the given file texts, all-or-nothing.
    ///
    /// On any validation failure nothing is mutated. Edits within a file are
    /// applied back-to-front so earlier spans stay valid; insertions at the
    /// same offset keep their planning order.
    pub fn apply(
        &self,
        files: &mut HashMap<String, String>,
    ) -> std::result::Result<(), EditError> {
        self.validate(files)?;

        let mut per_file: HashMap<&str, Vec<(usize, &Edit)>> = HashMap::new();
        for (idx, edit) in self.edits.iter().enumerate() {
            per_file
                .entry(edit.file.as_str())
                .or_default()
                .push((idx, edit));
        }

        for (file, mut edits) in per_file {
            // Back-to-front; later planning order applied first at equal
            // offsets so earlier edits end up first in the text.
            edits.sort_by(|(ai, a), (bi, b)| {
                (b.span.start, b.span.end, bi).cmp(&(a.span.start, a.span.end, ai))
            });
            let text = files.get_mut(file).ok_or_else(|| EditError::UnknownFile {
                path: file.to_string(),
            })?;
            for (_, edit) in edits {
                text.replace_range(edit.span.start..edit.span.end, &edit.replacement);
            }
        }

        for nf in &self.new_files {
            files.insert(nf.path.clone(), nf.text.clone());
        }

        Ok(())
    }

    /// Merge another edit set into this one.
    pub fn extend(&mut self, other: EditSet) {
        self.edits.extend(other.edits);
        self.new_files.extend(other.new_files);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(p, t)| (p.to_string(), t.to_string()))
            .collect()
    }

    mod span {
        use super::*;

        #[test]
        fn overlap_rules() {
            let a = Span::new(0, 5);
            let b = Span::new(5, 10);
            let c = Span::new(3, 7);
            assert!(!a.overlaps(&b));
            assert!(a.overlaps(&c));
            assert!(c.overlaps(&b));
        }

        #[test]
        fn empty_spans_at_same_offset_do_not_overlap() {
            let a = Span::point(4);
            let b = Span::point(4);
            assert!(!a.overlaps(&b));
        }

        #[test]
        fn contains_includes_boundaries() {
            let outer = Span::new(2, 10);
            assert!(outer.contains(&Span::new(2, 10)));
            assert!(outer.contains(&Span::new(4, 6)));
            assert!(!outer.contains(&Span::new(1, 6)));
        }
    }

    mod apply {
        use super::*;

        #[test]
        fn single_replacement() {
            let mut fs = files(&[("a.ts", "let x = 1;")]);
            let mut set = EditSet::new();
            set.push(Edit::replace("a.ts", Span::new(4, 5), "x", "y"));
            set.apply(&mut fs).expect("apply succeeds");
            assert_eq!(fs["a.ts"], "let y = 1;");
        }

        #[test]
        fn multiple_edits_applied_back_to_front() {
            let mut fs = files(&[("a.ts", "aaa bbb ccc")]);
            let mut set = EditSet::new();
            set.push(Edit::replace("a.ts", Span::new(0, 3), "aaa", "X"));
            set.push(Edit::replace("a.ts", Span::new(8, 11), "ccc", "Z"));
            set.apply(&mut fs).expect("apply succeeds");
            assert_eq!(fs["a.ts"], "X bbb Z");
        }

        #[test]
        fn insertions_at_same_offset_keep_planning_order() {
            let mut fs = files(&[("a.ts", "body")]);
            let mut set = EditSet::new();
            set.push(Edit::insert("a.ts", 0, "first "));
            set.push(Edit::insert("a.ts", 0, "second "));
            set.apply(&mut fs).expect("apply succeeds");
            assert_eq!(fs["a.ts"], "first second body");
        }

        #[test]
        fn new_file_is_created() {
            let mut fs = files(&[("a.ts", "")]);
            let mut set = EditSet::new();
            set.add_new_file(NewFile {
                path: "point.ts".to_string(),
                text: "export class Point {}\n".to_string(),
            });
            set.apply(&mut fs).expect("apply succeeds");
            assert_eq!(fs["point.ts"], "export class Point {}\n");
        }
    }

    mod atomicity {
        use super::*;

        #[test]
        fn overlap_rejects_whole_set() {
            let mut fs = files(&[("a.ts", "aaa bbb")]);
            let mut set = EditSet::new();
            set.push(Edit::replace("a.ts", Span::new(0, 5), "aaa b", "X"));
            set.push(Edit::replace("a.ts", Span::new(3, 7), " bbb", "Y"));
            let err = set.apply(&mut fs).expect_err("overlap detected");
            assert!(matches!(err, EditError::Overlap { .. }));
            assert_eq!(fs["a.ts"], "aaa bbb");
        }

        #[test]
        fn preimage_mismatch_rejects_whole_set() {
            let mut fs = files(&[("a.ts", "let x = 1;")]);
            let mut set = EditSet::new();
            set.push(Edit::replace("a.ts", Span::new(0, 3), "let", "const"));
            set.push(Edit::replace("a.ts", Span::new(4, 5), "z", "y"));
            let err = set.apply(&mut fs).expect_err("stale pre-image detected");
            assert!(matches!(err, EditError::PreimageMismatch { .. }));
            assert_eq!(fs["a.ts"], "let x = 1;");
        }

        #[test]
        fn unknown_file_rejects_whole_set() {
            let mut fs = files(&[("a.ts", "x")]);
            let mut set = EditSet::new();
            set.push(Edit::insert("missing.ts", 0, "y"));
            let err = set.apply(&mut fs).expect_err("unknown file detected");
            assert!(matches!(err, EditError::UnknownFile { .. }));
        }

        #[test]
        fn new_file_collision_rejects_whole_set() {
            let mut fs = files(&[("a.ts", "x")]);
            let mut set = EditSet::new();
            set.push(Edit::insert("a.ts", 0, "y"));
            set.add_new_file(NewFile {
                path: "a.ts".to_string(),
                text: String::new(),
            });
            let err = set.apply(&mut fs).expect_err("collision detected");
            assert!(matches!(err, EditError::DuplicateNewFile { .. }));
            assert_eq!(fs["a.ts"], "x");
        }

        #[test]
        fn out_of_bounds_rejects_whole_set() {
            let mut fs = files(&[("a.ts", "ab")]);
            let mut set = EditSet::new();
            set.push(Edit::replace("a.ts", Span::new(0, 10), "ab", "c"));
            let err = set.apply(&mut fs).expect_err("bounds checked");
            assert!(matches!(err, EditError::OutOfBounds { .. }));
        }
    }
}
