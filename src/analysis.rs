//! Whole-model batch analysis.
//!
//! Walks every valid declaration in deterministic order, runs detection,
//! and folds the findings into a report. Pair findings are deduplicated:
//! a clump between A and B surfaces once, attributed to whichever side
//! was visited first.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::DeclumpConfig;
use crate::detect::{Clump, Detector};
use crate::error::Result;
use crate::index::StructuralIndex;
use crate::model::{DeclRef, SourceModel};
use crate::report::Report;

pub struct FullAnalysis<'a> {
    model: &'a SourceModel,
    config: DeclumpConfig,
}

impl<'a> FullAnalysis<'a> {
    pub fn new(model: &'a SourceModel, config: DeclumpConfig) -> Result<Self> {
        let config = config.normalized()?;
        Ok(FullAnalysis { model, config })
    }

    /// Detect clumps across the whole model.
    ///
    /// Classes are visited before free functions, each in declaration
    /// order, so output is stable for a given model.
    pub fn detect_all(&self) -> Vec<Clump> {
        let mut index = StructuralIndex::build(self.model, self.config.min_properties);
        let mut detector = Detector::new(self.model, &mut index, &self.config);

        let mut seen: BTreeSet<(String, String, String)> = BTreeSet::new();
        let mut clumps = Vec::new();
        let declarations: Vec<DeclRef> = self
            .model
            .classes
            .iter()
            .map(|c| DeclRef::Class(c.id))
            .chain(self.model.functions.iter().map(|f| DeclRef::Function(f.id)))
            .collect();

        for decl in declarations {
            if !self.model.is_valid(decl) {
                continue;
            }
            for clump in detector.detect(decl) {
                let mut pair = [
                    clump.origin_qualified_name.clone(),
                    clump.other_qualified_name.clone(),
                ];
                pair.sort();
                let [first, second] = pair;
                let key = (first, second, clump.kind.as_str().to_string());
                if seen.insert(key) {
                    debug!(
                        from = %clump.origin_qualified_name,
                        to = %clump.other_qualified_name,
                        kind = clump.kind.as_str(),
                        "data clump found"
                    );
                    clumps.push(clump);
                }
            }
        }
        info!(count = clumps.len(), "analysis complete");
        clumps
    }

    /// Run detection and wrap the findings in the report envelope.
    pub fn report(&self, project_name: Option<String>) -> Report {
        let clumps = self.detect_all();
        Report::new(self.model, &clumps, project_name)
    }
}

// ============================================================================
// Tests
// ============================================================================
