// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meshpress Inc.

//! License discovery and token gating across a session's lifetime

use anyhow::Result;
use meshpress::license::{self, LicenseError, LicenseServerConfig};
use meshpress::session::{Session, SessionConfig};
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_file(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path)?;
    f.write_all(body.as_bytes())?;
    Ok(path)
}

#[test]
fn test_server_lease_fallback_after_failed_check() -> Result<()> {
    let dir = tempfile::tempdir()?;

    // The lease file a license server would have left behind
    write_file(
        dir.path(),
        "meshpress-licenserver-27005.lease",
        "product = \"meshpress\"\ntokens = [\"import\", \"export\"]\n",
    )?;

    // No local license anywhere
    let mut session = Session::initialize(SessionConfig {
        license_file: Some(dir.path().join("absent.lic")),
        license_server: None,
    });
    assert!(!session.check_license());

    // Pointing at the server picks the lease up, like the relicensing path
    // in the CLI
    let server = LicenseServerConfig {
        host: "licenserver".to_string(),
        port: 27005,
        flexible: true,
        lease_dir: Some(dir.path().to_path_buf()),
    };
    let mut relicensed = Session::initialize(SessionConfig {
        license_file: None,
        license_server: Some(server),
    });
    assert!(relicensed.check_license());

    relicensed.acquire_default_tokens();
    assert!(relicensed.has_token(license::tokens::IMPORT));
    assert!(relicensed.has_token(license::tokens::EXPORT));
    // Tokens the lease does not offer stay unacquired
    assert!(!relicensed.has_token(license::tokens::OPTIMIZE));
    assert!(relicensed
        .require_token(license::tokens::OPTIMIZE)
        .is_err());
    Ok(())
}

#[test]
fn test_expired_license_blocks_acquisition() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "old.lic",
        "product = \"meshpress\"\nexpires = \"2020-01-01\"\ntokens = [\"import\"]\n",
    )?;

    let mut session = Session::initialize(SessionConfig {
        license_file: Some(path),
        license_server: None,
    });
    assert!(!session.check_license());

    match session.need_token(license::tokens::IMPORT) {
        Err(LicenseError::Expired(date)) => {
            assert_eq!(date.to_string(), "2020-01-01");
        }
        other => panic!("expected Expired, got {other:?}"),
    }
    assert!(!session.has_token(license::tokens::IMPORT));
    Ok(())
}

#[test]
fn test_partial_license_degrades_instead_of_aborting() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "viewer.lic",
        "product = \"meshpress\"\ntokens = [\"import\"]\n",
    )?;

    let mut session = Session::initialize(SessionConfig {
        license_file: Some(path),
        license_server: None,
    });

    // Acquiring the full set only warns about the missing ones
    session.acquire_default_tokens();
    assert_eq!(session.acquired_tokens(), ["import"]);

    // The gate still rejects what was never acquired
    match session.require_token(license::tokens::EXPORT) {
        Err(LicenseError::NotAcquired(name)) => assert_eq!(name, "export"),
        other => panic!("expected NotAcquired, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_quiet_interface_restores_logging_state() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "full.lic", "product = \"meshpress\"\n")?;

    let mut session = Session::initialize(SessionConfig {
        license_file: Some(path),
        license_server: None,
    });
    assert!(session.interface_logging());

    let answer = session.with_quiet_interface(|| 42);
    assert_eq!(answer, 42);
    assert!(session.interface_logging());

    // Nesting under an already quiet interface stays quiet afterwards
    session.set_interface_logging(false);
    session.with_quiet_interface(|| ());
    assert!(!session.interface_logging());
    Ok(())
}
