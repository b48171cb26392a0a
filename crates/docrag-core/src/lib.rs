//! docrag-core - Core types and traits for the docrag system
//!
//! This crate provides the foundational types, deterministic identity
//! scheme, traits, and error handling used throughout the docrag system.

pub mod config;
pub mod error;
pub mod identity;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{DocragError, Result};
pub use traits::*;
pub use types::*;
