//! Terraform error types

use reconflow_core::ReconcileError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerraformError {
    #[error("terraform binary not found: {0}")]
    BinaryNotFound(String),

    #[error("terraform {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unreadable plan output: {0}")]
    InvalidPlan(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TerraformError {
    /// Attribute to `account`, as a retryable backend failure
    pub fn into_backend(self, account: &str) -> ReconcileError {
        ReconcileError::backend(account, self)
    }

    /// Attribute to `account`, as a failed mutation
    pub fn into_execution(self, account: &str) -> ReconcileError {
        ReconcileError::execution(account, self)
    }
}

pub type Result<T> = std::result::Result<T, TerraformError>;
