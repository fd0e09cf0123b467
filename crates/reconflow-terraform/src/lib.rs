//! Terraform backend for ReconFlow
//!
//! Renders account resource graphs as Terraform JSON and drives the
//! `terraform` CLI through init, plan and apply.
//!
//! # Requirements
//!
//! - `terraform` must be installed (or its path configured)

pub mod cli;
pub mod error;
pub mod provider;
pub mod renderer;

pub use cli::{PLAN_FILE, Terraform, parse_plan};
pub use error::{Result, TerraformError};
pub use provider::TerraformProvider;
pub use renderer::{CONFIG_FILE, TerraformRenderer};
