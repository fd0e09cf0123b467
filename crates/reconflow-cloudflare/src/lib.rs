//! Cloudflare resources for ReconFlow
//!
//! Turns declared Cloudflare zones, DNS records and workers into per-account
//! resource graphs and drives them through plan/apply.
//!
//! # Example
//!
//! ```ignore
//! use reconflow_cloudflare::{CloudflareIntegration, RunOptions};
//!
//! let integration = CloudflareIntegration { source, secrets, content, renderer, provider };
//! let report = integration.run(&RunOptions::default(), &errors).await?;
//! std::process::exit(report.outcome.exit_code() as i32);
//! ```

pub mod account;
pub mod builder;
pub mod integration;

pub use account::{backend_config, build_client, provider_config, state_key};
pub use builder::{BuildFailure, BuildOutput, SpecBuilder};
pub use integration::{CloudflareIntegration, DEFAULT_INTEGRATION, RunOptions, RunReport, validate};
