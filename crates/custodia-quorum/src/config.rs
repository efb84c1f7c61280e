//! Ledger configuration

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use custodia_common::AuditSeverity;
use serde::{Deserialize, Serialize};

/// Who may trigger execution once quorum is met
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionPolicy {
    /// Any currently authorized principal
    #[default]
    AnyMember,
    /// Only the proposer, who must still be authorized
    ProposerOnly,
}

impl FromStr for ExecutionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any-member" | "any_member" => Ok(ExecutionPolicy::AnyMember),
            "proposer-only" | "proposer_only" => Ok(ExecutionPolicy::ProposerOnly),
            other => anyhow::bail!("unknown execution policy: {}", other),
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Execution trigger policy
    pub execution_policy: ExecutionPolicy,
    /// File journal location; in-memory journal when unset
    pub journal_path: Option<PathBuf>,
    /// Audit events below this severity are dropped
    pub audit_min_severity: AuditSeverity,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            execution_policy: ExecutionPolicy::AnyMember,
            journal_path: None,
            audit_min_severity: AuditSeverity::Info,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from `.env` and `CUSTODIA_*` environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(val) = lookup("CUSTODIA_EXECUTION_POLICY") {
            cfg.execution_policy = val
                .parse()
                .context("CUSTODIA_EXECUTION_POLICY")?;
        }
        if let Some(val) = lookup("CUSTODIA_JOURNAL_PATH") {
            if !val.trim().is_empty() {
                cfg.journal_path = Some(PathBuf::from(val));
            }
        }
        if let Some(val) = lookup("CUSTODIA_AUDIT_MIN_SEVERITY") {
            cfg.audit_min_severity = val
                .parse()
                .map_err(anyhow::Error::msg)
                .context("CUSTODIA_AUDIT_MIN_SEVERITY")?;
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.execution_policy, ExecutionPolicy::AnyMember);
        assert!(cfg.journal_path.is_none());
        assert_eq!(cfg.audit_min_severity, AuditSeverity::Info);
    }

    #[test]
    fn test_overrides() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("CUSTODIA_EXECUTION_POLICY", "proposer-only"),
            ("CUSTODIA_JOURNAL_PATH", "/var/lib/custodia/ledger.jsonl"),
            ("CUSTODIA_AUDIT_MIN_SEVERITY", "warning"),
        ]))
        .unwrap();
        assert_eq!(cfg.execution_policy, ExecutionPolicy::ProposerOnly);
        assert_eq!(
            cfg.journal_path,
            Some(PathBuf::from("/var/lib/custodia/ledger.jsonl"))
        );
        assert_eq!(cfg.audit_min_severity, AuditSeverity::Warning);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(LedgerConfig::from_lookup(lookup(&[("CUSTODIA_EXECUTION_POLICY", "anyone")])).is_err());
        assert!(LedgerConfig::from_lookup(lookup(&[("CUSTODIA_AUDIT_MIN_SEVERITY", "loud")])).is_err());
    }
}
