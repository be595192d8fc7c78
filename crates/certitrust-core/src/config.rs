// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Secrets are never configuration values: the issuer section names *where*
// the private key comes from, and loading fails closed when it is absent.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CertiTrustError, Result};

/// Where the issuer's Ed25519 private key is read from at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeySource {
    /// Environment variable holding PEM, base64-of-PEM, or base64 PKCS#8 DER.
    Env { var: String },
    /// File holding the same encodings as `Env`.
    File { path: PathBuf },
    /// age passphrase-encrypted file; the passphrase comes from `passphrase_env`.
    Sealed { path: PathBuf, passphrase_env: String },
}

impl Default for KeySource {
    fn default() -> Self {
        KeySource::Env {
            var: "CERTITRUST_ISSUER_KEY".into(),
        }
    }
}

/// Identity of this process when it issues documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Identifier written into every proof (max 255 bytes).
    pub issuer_id: String,
    pub key: KeySource,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            issuer_id: "certitrust-issuer".into(),
            key: KeySource::default(),
        }
    }
}

/// A public key the verifier accepts proofs from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedIssuer {
    pub issuer_id: String,
    /// Raw 32-byte Ed25519 public key, hex encoded.
    pub public_key_hex: String,
}

/// Forensic threshold policy and timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Scores strictly below this are `Verified`.
    pub low_threshold: f64,
    /// Scores at or above this are `Rejected(ForensicFlag)`.
    pub high_threshold: f64,
    /// Budget for one forensic analyzer call.
    pub forensic_timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.35,
            high_threshold: 0.75,
            forensic_timeout_ms: 5_000,
        }
    }
}

/// External forensic detector, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForensicConfig {
    /// Program and arguments. The image is written to stdin; one float in
    /// `[0, 1]` is expected on stdout.
    pub command: Option<Vec<String>>,
}

/// Audit chain storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// SQLite database path. Defaults to `audit.db` in the data directory.
    pub database: Option<PathBuf>,
}

/// Complete process configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub issuer: IssuerConfig,
    pub trusted_issuers: Vec<TrustedIssuer>,
    pub verification: VerificationConfig,
    pub forensic: ForensicConfig,
    pub audit: AuditConfig,
}

impl AppConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let v = &self.verification;
        let in_unit = |x: f64| (0.0..=1.0).contains(&x);
        if !in_unit(v.low_threshold) || !in_unit(v.high_threshold) {
            return Err(CertiTrustError::Config(
                "forensic thresholds must lie in [0, 1]".into(),
            ));
        }
        if v.low_threshold > v.high_threshold {
            return Err(CertiTrustError::Config(format!(
                "low_threshold {} exceeds high_threshold {}",
                v.low_threshold, v.high_threshold
            )));
        }
        if v.forensic_timeout_ms == 0 {
            return Err(CertiTrustError::Config(
                "forensic_timeout_ms must be positive".into(),
            ));
        }

        check_issuer_id(&self.issuer.issuer_id)?;
        for trusted in &self.trusted_issuers {
            check_issuer_id(&trusted.issuer_id)?;
            let key = hex::decode(&trusted.public_key_hex).map_err(|e| {
                CertiTrustError::Config(format!(
                    "public key for {} is not hex: {e}",
                    trusted.issuer_id
                ))
            })?;
            if key.len() != 32 {
                return Err(CertiTrustError::Config(format!(
                    "public key for {} must be 32 bytes, got {}",
                    trusted.issuer_id,
                    key.len()
                )));
            }
        }

        if let Some(command) = &self.forensic.command {
            if command.is_empty() {
                return Err(CertiTrustError::Config(
                    "forensic.command must name a program".into(),
                ));
            }
        }
        Ok(())
    }
}

fn check_issuer_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 255 {
        return Err(CertiTrustError::Config(format!(
            "issuer id must be 1..=255 bytes, got {}",
            id.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut config = AppConfig::default();
        config.verification.low_threshold = 0.9;
        config.verification.high_threshold = 0.1;
        assert!(matches!(config.validate(), Err(CertiTrustError::Config(_))));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = AppConfig::default();
        config.verification.high_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_trusted_key_is_rejected() {
        let mut config = AppConfig::default();
        config.trusted_issuers.push(TrustedIssuer {
            issuer_id: "other".into(),
            public_key_hex: "00ff".into(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "issuer": {
                "issuer_id": "registrar",
                "key": { "source": "file", "path": "/etc/certitrust/issuer.pem" }
            }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.issuer.issuer_id, "registrar");
        assert_eq!(
            config.issuer.key,
            KeySource::File {
                path: "/etc/certitrust/issuer.pem".into()
            }
        );
        assert_eq!(config.verification, VerificationConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.forensic.command = Some(vec!["python3".into(), "detector.py".into()]);
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let json = r#"{
            "verification": { "low_threshold": 0.2 },
            "issuer": { "issuer_id": "registrar" }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.verification.low_threshold, 0.2);
        assert_eq!(config.verification.high_threshold, 0.75);
        assert_eq!(config.verification.forensic_timeout_ms, 5_000);
        assert_eq!(config.issuer.issuer_id, "registrar");
        assert_eq!(config.issuer.key, KeySource::default());
        config.validate().unwrap();
    }
}
