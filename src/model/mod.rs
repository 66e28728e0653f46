//! Core data types for dependencies, advisories, and scan results.
//!
//! This module contains the fundamental types used throughout depscan:
//!
//! - [`Dependency`] - A single package reference parsed from a manifest
//! - [`Ecosystem`] - The package universe a dependency belongs to
//! - [`VulnerabilityRecord`] - One advisory affecting a dependency
//! - [`QueryOutcome`] - The per-dependency result of an advisory query
//! - [`ScanResult`] - Aggregated, ordered scan results
//!
//! # Example
//!
//! ```
//! use depscan::{Dependency, Ecosystem};
//!
//! let dep = Dependency::new("requests", "2.25.0", Ecosystem::Pip);
//! assert_eq!(dep.to_string(), "requests@2.25.0 (pip)");
//! ```

mod dependency;
mod outcome;
mod scan;
mod vulnerability;

pub use dependency::*;
pub use outcome::*;
pub use scan::*;
pub use vulnerability::*;
