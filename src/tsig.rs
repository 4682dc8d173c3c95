// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TSIG credential loading and signer construction.
//!
//! Two key file formats are accepted:
//! 1. **BIND key clause** (as written by `tsig-keygen` / `rndc-confgen`):
//!    ```text
//!    key "sync-key" {
//!        algorithm hmac-sha256;
//!        secret "base64secret==";
//!    };
//!    ```
//! 2. **Raw secret**: the file holds only the secret. Its bytes are the HMAC key as
//!    they are, unless [`SecretEncoding::Base64`] is configured, in which case the
//!    trimmed contents are base64-decoded. The algorithm comes from configuration.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::Name;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::constants::TSIG_FUDGE_TIME_SECS;
use crate::errors::ConfigError;

/// HMAC algorithms supported for TSIG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAlgorithm {
    /// hmac-md5 (legacy, still the BIND default for old keys)
    HmacMd5,
    /// hmac-sha1
    HmacSha1,
    /// hmac-sha224
    HmacSha224,
    /// hmac-sha256
    #[default]
    HmacSha256,
    /// hmac-sha384
    HmacSha384,
    /// hmac-sha512
    HmacSha512,
}

impl KeyAlgorithm {
    /// BIND spelling of the algorithm.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HmacMd5 => "hmac-md5",
            Self::HmacSha1 => "hmac-sha1",
            Self::HmacSha224 => "hmac-sha224",
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha384 => "hmac-sha384",
            Self::HmacSha512 => "hmac-sha512",
        }
    }

    fn to_hickory(self) -> TsigAlgorithm {
        match self {
            Self::HmacMd5 => TsigAlgorithm::HmacMd5,
            Self::HmacSha1 => TsigAlgorithm::HmacSha1,
            Self::HmacSha224 => TsigAlgorithm::HmacSha224,
            Self::HmacSha256 => TsigAlgorithm::HmacSha256,
            Self::HmacSha384 => TsigAlgorithm::HmacSha384,
            Self::HmacSha512 => TsigAlgorithm::HmacSha512,
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        // BIND also accepts the fully qualified form, e.g. "hmac-md5.sig-alg.reg.int."
        let normalized = s.trim().trim_end_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "hmac-md5" | "hmac-md5.sig-alg.reg.int" => Ok(Self::HmacMd5),
            "hmac-sha1" => Ok(Self::HmacSha1),
            "hmac-sha224" => Ok(Self::HmacSha224),
            "hmac-sha256" => Ok(Self::HmacSha256),
            "hmac-sha384" => Ok(Self::HmacSha384),
            "hmac-sha512" => Ok(Self::HmacSha512),
            _ => bail!(
                "Unsupported TSIG algorithm '{s}'. Supported algorithms: hmac-md5, hmac-sha1, hmac-sha224, hmac-sha256, hmac-sha384, hmac-sha512"
            ),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the contents of a raw secret file are turned into key bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretEncoding {
    /// File bytes are the key
    #[default]
    Raw,
    /// File holds base64 text
    Base64,
}

/// Shared secret used to sign updates and zone transfers.
///
/// The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Key name as configured on the DNS server
    pub key_name: String,
    /// HMAC algorithm
    pub algorithm: KeyAlgorithm,
    secret: Vec<u8>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_name", &self.key_name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Build a credential from already-decoded secret bytes.
    #[must_use]
    pub fn new(key_name: impl Into<String>, algorithm: KeyAlgorithm, secret: Vec<u8>) -> Self {
        Self {
            key_name: key_name.into(),
            algorithm,
            secret,
        }
    }

    /// Load a credential from a key file.
    ///
    /// `key_name` always wins over a name found in the file, since it is the name the
    /// server was configured with. `fallback_algorithm` and `encoding` apply only to
    /// raw secret files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKeyFile`] if the file cannot be read, is empty,
    /// or holds a BIND key clause that cannot be parsed.
    pub fn from_key_file(
        path: &Path,
        key_name: &str,
        fallback_algorithm: KeyAlgorithm,
        encoding: SecretEncoding,
    ) -> Result<Self, ConfigError> {
        std::fs::read(path)
            .context("Failed to read key file")
            .and_then(|bytes| Self::from_key_bytes(&bytes, key_name, fallback_algorithm, encoding))
            .map_err(|e| ConfigError::InvalidKeyFile {
                path: path.display().to_string(),
                reason: format!("{e:#}"),
            })
    }

    /// Parse key file contents. See [`Credential::from_key_file`].
    ///
    /// # Errors
    ///
    /// Returns an error when the contents are unusable.
    pub fn from_key_bytes(
        bytes: &[u8],
        key_name: &str,
        fallback_algorithm: KeyAlgorithm,
        encoding: SecretEncoding,
    ) -> Result<Self> {
        if let Ok(text) = std::str::from_utf8(bytes) {
            if looks_like_key_clause(text) {
                let parsed = parse_key_clause(text)?;
                if !parsed.name.is_empty() && !parsed.name.eq_ignore_ascii_case(key_name) {
                    tracing::warn!(
                        file_key_name = %parsed.name,
                        key_name = %key_name,
                        "Key name in key file differs from configured key name, using configured name"
                    );
                }
                return Ok(Self::new(key_name, parsed.algorithm, parsed.secret));
            }
        }

        let secret = match encoding {
            SecretEncoding::Raw => bytes.to_vec(),
            SecretEncoding::Base64 => {
                let text = std::str::from_utf8(bytes).context("Base64 key file is not text")?;
                BASE64
                    .decode(text.trim())
                    .context("Failed to decode base64 key file")?
            }
        };
        if secret.is_empty() {
            bail!("key file is empty");
        }
        Ok(Self::new(key_name, fallback_algorithm, secret))
    }

    /// Create a TSIG signer for this credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the key name is not a valid DNS name or hickory rejects the
    /// key material.
    pub fn signer(&self) -> Result<TSigner> {
        let name = Name::from_str(&self.key_name)
            .with_context(|| format!("Invalid TSIG key name '{}'", self.key_name))?;

        TSigner::new(
            self.secret.clone(),
            self.algorithm.to_hickory(),
            name,
            u16::try_from(TSIG_FUDGE_TIME_SECS).unwrap_or(300),
        )
        .context("Failed to create TSIG signer")
    }
}

struct KeyClause {
    name: String,
    algorithm: KeyAlgorithm,
    secret: Vec<u8>,
}

fn looks_like_key_clause(text: &str) -> bool {
    text.trim_start().starts_with("key") && text.contains('{')
}

/// Parse a BIND key clause:
///
/// ```text
/// key "name" { algorithm algo; secret "secret"; };
/// ```
fn parse_key_clause(content: &str) -> Result<KeyClause> {
    let header = content
        .split('{')
        .next()
        .context("Failed to parse key clause header")?;
    let name = header
        .trim()
        .trim_start_matches("key")
        .trim()
        .trim_matches('"')
        .to_string();

    let body = content
        .split_once('{')
        .and_then(|(_, rest)| rest.rsplit_once('}'))
        .map(|(body, _)| body)
        .context("Key clause is missing its braces")?;

    let mut algorithm = None;
    let mut secret = None;
    for statement in body.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(value) = statement.strip_prefix("algorithm") {
            algorithm = Some(KeyAlgorithm::from_str(value.trim().trim_matches('"'))?);
        } else if let Some(value) = statement.strip_prefix("secret") {
            let encoded = value.trim().trim_matches('"');
            let decoded = BASE64
                .decode(encoded)
                .context("Failed to decode TSIG secret")?;
            secret = Some(decoded);
        }
    }

    let algorithm = algorithm.context("Failed to parse algorithm from key file")?;
    let secret = secret.context("Failed to parse secret from key file")?;
    if secret.is_empty() {
        bail!("TSIG secret is empty");
    }

    Ok(KeyClause {
        name,
        algorithm,
        secret,
    })
}

#[cfg(test)]
#[path = "tsig_tests.rs"]
mod tsig_tests;
