//! Server-side TLS identity for the device-facing listener (spec.md §6
//! "TLS required ... certificate validation of the client is off").
//!
//! Devices connect expecting TLS against what they believe is the vendor
//! cloud; they carry no client certificate and perform no hostname
//! validation of their own, so the acceptor only needs one thing: a
//! `TlsAcceptor` built from the configured cert/key PEM files. None of the
//! teacher crates terminate TLS server-side (`zc_mqtt_channel::tls` and
//! `cync_mqtt::tls` are both TLS *clients* dialing a broker), so this is
//! built directly on `tokio-rustls`/`rustls`/`rustls-pemfile` — the
//! standard pairing for a tokio TLS listener, noted in DESIGN.md.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;
use crate::error::{CyncError, CyncResult};

/// Build a `TlsAcceptor` from the cert/key files named in `config`.
pub fn build_acceptor(config: &TlsConfig) -> CyncResult<TlsAcceptor> {
    let certs = load_certs(&config.cert_file)?;
    let key = load_key(&config.key_file)?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| CyncError::ConfigInvalid(format!("invalid TLS cert/key pair: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &str) -> CyncResult<Vec<CertificateDer<'static>>> {
    let contents = std::fs::read(path)
        .map_err(|e| CyncError::ConfigInvalid(format!("failed to read cert file '{path}': {e}")))?;
    let certs = rustls_pemfile::certs(&mut contents.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CyncError::ConfigInvalid(format!("failed to parse cert file '{path}': {e}")))?;
    if certs.is_empty() {
        return Err(CyncError::ConfigInvalid(format!(
            "no certificates found in '{path}'"
        )));
    }
    Ok(certs)
}

fn load_key(path: &str) -> CyncResult<PrivateKeyDer<'static>> {
    let contents = std::fs::read(path)
        .map_err(|e| CyncError::ConfigInvalid(format!("failed to read key file '{path}': {e}")))?;
    rustls_pemfile::private_key(&mut contents.as_slice())
        .map_err(|e| CyncError::ConfigInvalid(format!("failed to parse key file '{path}': {e}")))?
        .ok_or_else(|| CyncError::ConfigInvalid(format!("no private key found in '{path}'")))
}
