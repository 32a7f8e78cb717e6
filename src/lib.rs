//! Declump: data clump detection and extract-class refactoring.
//!
//! A static-analysis engine that finds groups of fields or parameters
//! recurring together across declarations (the "data clump" smell) and
//! plans semi-automatic extract-class refactorings over a typed source
//! model:
//! - Structural property index with incremental updates
//! - Hierarchy-aware clump detection
//! - Extract-class planner producing atomic edit sets
//! - data-clumps-type-context report output

pub mod analysis;
pub mod config;
pub mod detect;
pub mod edit;
pub mod error;
pub mod index;
pub mod interaction;
pub mod model;
pub mod property;
pub mod refactor;
pub mod report;
pub mod text;
