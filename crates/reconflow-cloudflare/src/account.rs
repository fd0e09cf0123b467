//! Account → backend and provider configuration

use reconflow_core::{
    AccountClient, BackendConfig, CloudflareAccount, ProviderConfig, ReconcileError, Result,
    SecretReader,
};
use serde_json::json;
use std::collections::BTreeMap;

pub const PROVIDER_NAME: &str = "cloudflare";
pub const PROVIDER_SOURCE: &str = "cloudflare/cloudflare";

/// State object key for one account
pub fn state_key(integration: &str, account: &str) -> String {
    format!("{}-{}.tfstate", integration, account)
}

/// S3 state backend for `account`, credentials resolved through `secrets`
pub fn backend_config(
    integration: &str,
    account: &CloudflareAccount,
    secrets: &dyn SecretReader,
) -> Result<BackendConfig> {
    let state = account.terraform_state.as_ref().ok_or_else(|| {
        ReconcileError::InvalidConfig(format!(
            "Cloudflare account '{}' does not define a terraform state",
            account.name
        ))
    })?;

    let settings = BTreeMap::from([
        ("bucket".to_string(), json!(state.bucket)),
        ("key".to_string(), json!(state_key(integration, &account.name))),
        ("region".to_string(), json!(state.region)),
        ("access_key".to_string(), json!(secrets.read(&state.access_key_id)?)),
        ("secret_key".to_string(), json!(secrets.read(&state.secret_access_key)?)),
    ]);

    Ok(BackendConfig {
        kind: "s3".to_string(),
        settings,
    })
}

pub fn provider_config(
    account: &CloudflareAccount,
    secrets: &dyn SecretReader,
) -> Result<ProviderConfig> {
    let credentials = &account.api_credentials;

    let settings = BTreeMap::from([
        ("email".to_string(), json!(secrets.read(&credentials.email)?)),
        ("api_token".to_string(), json!(secrets.read(&credentials.api_token)?)),
        ("account_id".to_string(), json!(secrets.read(&credentials.account_id)?)),
    ]);

    Ok(ProviderConfig {
        name: PROVIDER_NAME.to_string(),
        source: PROVIDER_SOURCE.to_string(),
        version: account.provider_version.clone(),
        settings,
    })
}

/// Client for one account with both configurations resolved
pub fn build_client(
    integration: &str,
    account: &CloudflareAccount,
    secrets: &dyn SecretReader,
) -> Result<AccountClient> {
    let provider = provider_config(account, secrets)?;
    let backend = backend_config(integration, account, secrets)?;
    Ok(AccountClient::new(&account.name, backend, provider))
}
