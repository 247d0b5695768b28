//! Domain layer for deploy-forge
//!
//! CDD Principle: Domain Model - Pure business logic for deployment artifact generation
//! - Contains the core value objects: validated domains, environment kinds, variable maps
//! - Independent of infrastructure concerns like file systems or terminal output
//! - Expresses the ubiquitous language of env-file and compose generation

pub mod model;

// Re-export main domain types for convenience
pub use model::*;
