// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! License files, feature tokens and license discovery
//!
//! A license is a small TOML document:
//!
//! ```toml
//! product = "meshpress"
//! customer = "ACME Industrial"
//! expires = "2027-01-31"
//! tokens = ["import", "repair", "tessellate", "optimize", "export"]
//! ```
//!
//! Discovery checks, in order: an explicit path, the `MESHPRESS_LICENSE`
//! environment variable, `meshpress.lic` in the working directory, and
//! finally a lease file cached from a license server.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_LICENSE: &str = "MESHPRESS_LICENSE";
pub const DEFAULT_LICENSE_FILE: &str = "meshpress.lic";
pub const DEFAULT_SERVER_HOST: &str = "licenserver";
pub const DEFAULT_SERVER_PORT: u16 = 27005;

/// Feature tokens a pipeline run tries to acquire.
pub mod tokens {
    pub const IMPORT: &str = "import";
    pub const REPAIR: &str = "repair";
    pub const TESSELLATE: &str = "tessellate";
    pub const OPTIMIZE: &str = "optimize";
    pub const EXPORT: &str = "export";

    pub const ALL: [&str; 5] = [IMPORT, REPAIR, TESSELLATE, OPTIMIZE, EXPORT];
}

#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("no license file found")]
    NotFound,

    #[error("license expired on {0}")]
    Expired(NaiveDate),

    #[error("license does not include token '{0}'")]
    UnknownToken(String),

    #[error("token '{0}' has not been acquired")]
    NotAcquired(String),

    #[error("malformed license file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to read license: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk license document.
#[derive(Debug, Deserialize)]
struct LicenseFile {
    product: String,
    customer: Option<String>,
    expires: Option<String>,
    #[serde(default)]
    tokens: Vec<String>,
    seats: Option<u32>,
}

/// A parsed and validated license.
#[derive(Debug, Clone)]
pub struct License {
    pub product: String,
    pub customer: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub tokens: Vec<String>,
    pub seats: Option<u32>,
    pub source: PathBuf,
}

impl License {
    pub fn from_file(path: &Path) -> Result<License, LicenseError> {
        let text = std::fs::read_to_string(path)?;
        let parsed: LicenseFile =
            toml::from_str(&text).map_err(|e| LicenseError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let expiry = match &parsed.expires {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                    LicenseError::Malformed {
                        path: path.to_path_buf(),
                        reason: format!("bad expiry date '{raw}': {e}"),
                    }
                })?,
            ),
            None => None,
        };

        Ok(License {
            product: parsed.product,
            customer: parsed.customer,
            expiry,
            tokens: parsed.tokens,
            seats: parsed.seats,
            source: path.to_path_buf(),
        })
    }

    /// Expired strictly after the expiry day.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match self.expiry {
            Some(expiry) => today > expiry,
            None => false,
        }
    }

    pub fn offers(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }
}

/// License server coordinates. The server is consulted through a lease file
/// it leaves on the machine, not over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseServerConfig {
    pub host: String,
    pub port: u16,
    /// Flexible licenses may be borrowed across seats.
    #[serde(default)]
    pub flexible: bool,
    /// Directory holding lease files. Defaults to the system temp directory.
    #[serde(default)]
    pub lease_dir: Option<PathBuf>,
}

impl LicenseServerConfig {
    pub fn new(host: &str, port: u16, flexible: bool) -> Self {
        Self {
            host: host.to_string(),
            port,
            flexible,
            lease_dir: None,
        }
    }

    pub fn lease_path(&self) -> PathBuf {
        let dir = self
            .lease_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        dir.join(format!("meshpress-{}-{}.lease", self.host, self.port))
    }
}

/// Locate and parse a license. Explicit paths and the environment variable
/// fail hard on parse errors; the absence of any source is `NotFound`.
pub fn discover(
    explicit: Option<&Path>,
    server: Option<&LicenseServerConfig>,
) -> Result<License, LicenseError> {
    if let Some(path) = explicit {
        log::debug!("loading license from {}", path.display());
        return License::from_file(path);
    }

    if let Ok(raw) = std::env::var(ENV_LICENSE) {
        if !raw.is_empty() {
            log::debug!("loading license from ${ENV_LICENSE}={raw}");
            return License::from_file(Path::new(&raw));
        }
    }

    let cwd_file = Path::new(DEFAULT_LICENSE_FILE);
    if cwd_file.exists() {
        log::debug!("loading license from ./{DEFAULT_LICENSE_FILE}");
        return License::from_file(cwd_file);
    }

    if let Some(server) = server {
        let lease = server.lease_path();
        if lease.exists() {
            log::info!(
                "using license lease from {}:{} ({})",
                server.host,
                server.port,
                lease.display()
            );
            return License::from_file(&lease);
        }
        log::debug!(
            "no lease from {}:{} at {}",
            server.host,
            server.port,
            lease.display()
        );
    }

    Err(LicenseError::NotFound)
}
