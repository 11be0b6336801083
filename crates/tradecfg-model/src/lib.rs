//! tradecfg configuration model
//!
//! The hierarchical trading configuration every command operates on.
//!
//! # Core Concepts
//!
//! - [`ConfigDocument`]: JSON tree of engines → groups → logics → fields
//! - [`LeafPath`]: address of one field value (`A/G1/POWER/grid`)
//! - [`EngineId`], [`GroupId`], [`LogicRef`], [`FieldName`]: typed identifiers
//! - [`FieldSpec`]: registry entry with bounds, default and risk class
//! - [`ContentHash`]: Blake3 fingerprint of a document's canonical form
//!
//! # Example
//!
//! ```rust,ignore
//! use tradecfg_model::{ConfigDocument, LeafPath};
//!
//! let mut doc = ConfigDocument::from_json(&text)?;
//! let grid: LeafPath = "A/G1/POWER/grid".parse()?;
//! let previous = doc.set(&grid, serde_json::json!(500))?;
//! ```

#![warn(unreachable_pub)]

mod document;
pub mod fields;
mod hash;
mod ids;
mod path;

pub use document::{ConfigDocument, DocumentError};
pub use fields::{canonical_field, field_spec, number_value, FieldKind, FieldSpec, RiskClass};
pub use hash::{ContentHash, HashError};
pub use ids::{EngineId, FieldName, GroupId, IdError, LogicRef, MAX_GROUP};
pub use path::{LeafPath, PathError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
