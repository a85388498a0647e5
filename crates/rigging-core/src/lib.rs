//! Core types for rigging: the unit contract, phased group orchestration,
//! process descriptions, working-directory configuration and the shared
//! error taxonomy.
//!
//! This crate has no process, console or filesystem-locking code; those live
//! in `rigging-runtime`.
#![deny(unsafe_code)]

pub mod config;
pub mod description;
pub mod error;
pub mod group;
pub mod paths;
pub mod unit;

pub use config::{DEFAULT_LEASE_TTL, RiggingConfig};
pub use description::Description;
pub use error::{ApplicationError, Error, Result};
pub use group::{Group, SharedUnit};
pub use paths::{PathError, ensure_dir, temp_root};
pub use unit::ManageableUnit;
