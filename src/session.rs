// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! Engine session: license state, feature tokens and interface logging

use crate::license::{self, License, LicenseError, LicenseServerConfig};
use std::path::PathBuf;

/// Options for bringing up a session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub license_file: Option<PathBuf>,
    pub license_server: Option<LicenseServerConfig>,
}

/// A running engine session.
///
/// Holds the loaded license, the set of acquired feature tokens and the
/// interface logging switch. Interface logging routes engine chatter through
/// the global `log` facade; turning it off silences the engine without
/// touching pipeline progress output.
pub struct Session {
    version: String,
    license: Option<License>,
    server: Option<LicenseServerConfig>,
    acquired: Vec<String>,
    interface_logging: bool,
    saved_level: log::LevelFilter,
}

impl Session {
    pub fn initialize(config: SessionConfig) -> Session {
        let version = env!("CARGO_PKG_VERSION").to_string();
        log::info!("meshpress engine {version}");

        let license = match license::discover(
            config.license_file.as_deref(),
            config.license_server.as_ref(),
        ) {
            Ok(license) => {
                log::info!(
                    "license for '{}' loaded from {}",
                    license.product,
                    license.source.display()
                );
                Some(license)
            }
            Err(LicenseError::NotFound) => {
                log::warn!("no license found");
                None
            }
            Err(e) => {
                log::warn!("failed to load license: {e}");
                None
            }
        };

        Session {
            version,
            license,
            server: config.license_server,
            acquired: Vec::new(),
            interface_logging: true,
            saved_level: log::max_level(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn license(&self) -> Option<&License> {
        self.license.as_ref()
    }

    pub fn interface_logging(&self) -> bool {
        self.interface_logging
    }

    /// Toggle engine interface logging. Off saves the current level and
    /// silences the `log` facade; on restores the saved level.
    pub fn set_interface_logging(&mut self, enabled: bool) {
        if enabled == self.interface_logging {
            return;
        }
        if enabled {
            log::set_max_level(self.saved_level);
        } else {
            self.saved_level = log::max_level();
            log::set_max_level(log::LevelFilter::Off);
        }
        self.interface_logging = enabled;
    }

    /// Run `f` with interface logging off, restoring the previous state.
    pub fn with_quiet_interface<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let was = self.interface_logging;
        self.set_interface_logging(false);
        let out = f();
        self.set_interface_logging(was);
        out
    }

    /// Point the session at a license server. When no license is loaded yet
    /// this retries discovery through the server's lease.
    pub fn configure_license_server(&mut self, host: &str, port: u16, flexible: bool) {
        log::info!("license server set to {host}:{port} (flexible: {flexible})");
        self.server = Some(LicenseServerConfig::new(host, port, flexible));
        if self.license.is_none() {
            match license::discover(None, self.server.as_ref()) {
                Ok(license) => {
                    log::info!(
                        "license for '{}' leased from {host}:{port}",
                        license.product
                    );
                    self.license = Some(license);
                }
                Err(e) => log::debug!("license server lookup failed: {e}"),
            }
        }
    }

    /// A usable license is loaded and has not expired.
    pub fn check_license(&self) -> bool {
        match &self.license {
            Some(license) => {
                let today = chrono::Utc::now().date_naive();
                if license.is_expired(today) {
                    if let Some(expiry) = license.expiry {
                        log::warn!("license expired on {expiry}");
                    }
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Acquire one feature token from the loaded license.
    pub fn need_token(&mut self, name: &str) -> Result<(), LicenseError> {
        let Some(license) = &self.license else {
            return Err(LicenseError::NotFound);
        };
        let today = chrono::Utc::now().date_naive();
        if let Some(expiry) = license.expiry {
            if today > expiry {
                return Err(LicenseError::Expired(expiry));
            }
        }
        if !license.offers(name) {
            return Err(LicenseError::UnknownToken(name.to_string()));
        }
        if !self.acquired.iter().any(|t| t == name) {
            log::debug!("token '{name}' acquired");
            self.acquired.push(name.to_string());
        }
        Ok(())
    }

    /// Try to acquire each token, warning and continuing on failure. A
    /// missing token degrades the run later instead of aborting it here.
    pub fn acquire_tokens(&mut self, names: &[&str]) {
        for &name in names {
            if let Err(e) = self.need_token(name) {
                log::warn!("failed to add token '{name}': {e}");
            }
        }
    }

    /// Acquire the standard pipeline token set.
    pub fn acquire_default_tokens(&mut self) {
        self.acquire_tokens(&license::tokens::ALL);
    }

    pub fn has_token(&self, name: &str) -> bool {
        self.acquired.iter().any(|t| t == name)
    }

    pub fn acquired_tokens(&self) -> &[String] {
        &self.acquired
    }

    /// Gate an operation on a previously acquired token.
    pub fn require_token(&self, name: &str) -> Result<(), LicenseError> {
        if self.has_token(name) {
            Ok(())
        } else {
            Err(LicenseError::NotAcquired(name.to_string()))
        }
    }
}
