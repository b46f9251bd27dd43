//! ds-core: Core abstractions and configuration for dropship
//!
//! This crate provides the deployment target model, the error taxonomy,
//! configuration loading, the persisted state store and the resolver seam
//! used by the deploy pipeline and the CLI.

pub mod config;
pub mod error;
pub mod resolver;
pub mod state;
pub mod types;

pub use error::{DeployError, DeployFailure};
pub use types::{AuthMethod, DeploymentTarget, Secret, Stage};
