//! Integration tests for the Sonet group messaging engine.
//!
//! This crate has no protocol code. It exercises end-to-end flows across
//! `sonet-crypto` and `sonet-mls` and provides the shared fixtures below.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p sonet-integration-tests
//! ```
//!
//! Set `RUST_LOG=sonet_mls=debug` to see epoch transitions.

use std::sync::Once;

use sonet_mls::{CipherSuite, KeyPackage, KeyPackageBundle, MlsConfig, MlsProtocol, Result};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fresh key package for the default cipher suite.
pub fn key_package() -> Result<KeyPackage> {
    Ok(KeyPackageBundle::generate(CipherSuite::default(), b"")?.key_package)
}

/// An engine with `group_id` already created.
pub fn engine_with_group(
    config: MlsConfig,
    group_id: &[u8],
) -> std::result::Result<MlsProtocol, Box<dyn std::error::Error>> {
    init_tracing();
    let engine = MlsProtocol::new(config)?;
    engine.create_group(group_id, CipherSuite::default(), b"")?;
    Ok(engine)
}
