//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce required identifiers (project id, chain id, contract address)
//! - Validate value ranges (timeouts > 0, parseable amounts, URL schemes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use url::Url;

use crate::config::schema::{AppConfig, WalletMode};
use crate::contract::units::parse_native;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `chain.chain_id`.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate a deserialized configuration.
///
/// Collects every problem so the operator can fix them in one pass.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app.project_id.trim().is_empty() {
        errors.push(err(
            "app.project_id",
            "required; set it in the config file or via PRESALE_PROJECT_ID",
        ));
    }

    if config.chain.chain_id == 0 {
        errors.push(err("chain.chain_id", "required; must be a non-zero chain id"));
    }

    match Url::parse(&config.chain.rpc_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(err(
            "chain.rpc_url",
            format!("unsupported scheme '{}'; expected http or https", url.scheme()),
        )),
        Err(e) => errors.push(err("chain.rpc_url", format!("invalid URL: {}", e))),
    }

    if config.chain.rpc_timeout_secs == 0 {
        errors.push(err("chain.rpc_timeout_secs", "must be greater than zero"));
    }

    if config.contract.address.trim().is_empty() {
        errors.push(err("contract.address", "required; the presale contract address"));
    } else if config.contract.address.parse::<Address>().is_err() {
        errors.push(err(
            "contract.address",
            format!("'{}' is not a valid address", config.contract.address),
        ));
    }

    if let Err(e) = parse_native(&config.contract.min_purchase) {
        errors.push(err(
            "contract.min_purchase",
            format!("'{}' is not a valid amount: {}", config.contract.min_purchase, e),
        ));
    }

    if config.wallet.mode != WalletMode::Injected {
        match Url::parse(&config.wallet.relay_url) {
            Ok(url) if url.scheme() == "ws" || url.scheme() == "wss" => {}
            Ok(url) => errors.push(err(
                "wallet.relay_url",
                format!("unsupported scheme '{}'; expected ws or wss", url.scheme()),
            )),
            Err(e) => errors.push(err("wallet.relay_url", format!("invalid URL: {}", e))),
        }
    }

    if config.wallet.pairing_timeout_secs == 0 {
        errors.push(err("wallet.pairing_timeout_secs", "must be greater than zero"));
    }

    if config.wallet.request_timeout_secs == 0 {
        errors.push(err("wallet.request_timeout_secs", "must be greater than zero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
