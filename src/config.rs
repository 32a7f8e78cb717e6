//! Detection and refactoring configuration.

use serde::{Deserialize, Serialize};

use crate::error::{DeclumpError, Result};

/// Default minimum number of shared properties for a clump.
pub const DEFAULT_MIN_PROPERTIES: usize = 3;

/// Tunable knobs for detection and extraction.
///
/// `include_modifiers_in_extraction` only has an effect when
/// `include_modifiers_in_detection` is also set; a candidate set found while
/// ignoring modifiers cannot be materialized modifier-faithfully. The
/// `normalized` constructor enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclumpConfig {
    /// Minimum number of shared properties for a group to count as a clump.
    /// Must be at least 2.
    pub min_properties: usize,
    /// Require matching modifiers (static, readonly, ...) when comparing
    /// class fields during detection.
    pub include_modifiers_in_detection: bool,
    /// Carry modifiers over onto the extracted class's properties.
    pub include_modifiers_in_extraction: bool,
}

impl Default for DeclumpConfig {
    fn default() -> Self {
        DeclumpConfig {
            min_properties: DEFAULT_MIN_PROPERTIES,
            include_modifiers_in_detection: false,
            include_modifiers_in_extraction: false,
        }
    }
}

impl DeclumpConfig {
    /// Validate and normalize a configuration.
    ///
    /// Rejects `min_properties < 2` and clears
    /// `include_modifiers_in_extraction` when detection modifiers are off.
    pub fn normalized(mut self) -> Result<Self> {
        if self.min_properties < 2 {
            return Err(DeclumpError::invalid_args(format!(
                "min_properties must be at least 2, got {}",
                self.min_properties
            )));
        }
        if !self.include_modifiers_in_detection {
            self.include_modifiers_in_extraction = false;
        }
        Ok(self)
    }
}
