//! TLS provisioning
//!
//! Builds the shared acceptor used by AUTH TLS and protected data transfers.

use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::CertificateDer;

use crate::error::StartupError;

/// Loads a PEM certificate chain and private key into a `TlsAcceptor`.
pub fn load_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, StartupError> {
    let cert_file = File::open(cert_path)
        .map_err(|e| StartupError::Tls(format!("open {}: {}", cert_path.display(), e)))?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<_, _>>()
        .map_err(|e| StartupError::Tls(format!("read {}: {}", cert_path.display(), e)))?;
    if certs.is_empty() {
        return Err(StartupError::Tls(format!(
            "no certificate found in {}",
            cert_path.display()
        )));
    }

    let key_file = File::open(key_path)
        .map_err(|e| StartupError::Tls(format!("open {}: {}", key_path.display(), e)))?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .map_err(|e| StartupError::Tls(format!("read {}: {}", key_path.display(), e)))?
        .ok_or_else(|| {
            StartupError::Tls(format!("no private key found in {}", key_path.display()))
        })?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| StartupError::Tls(e.to_string()))?;

    info!("TLS enabled with certificate {}", cert_path.display());
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_files_are_reported() {
        let result = load_tls_acceptor(
            &PathBuf::from("does/not/exist.pem"),
            &PathBuf::from("does/not/exist.key"),
        );
        assert!(matches!(result, Err(StartupError::Tls(_))));
    }

    #[test]
    fn test_file_without_certificates() {
        let path = std::env::temp_dir().join("rax-ftp-proxy-empty-cert.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();
        let result = load_tls_acceptor(&path, &path);
        assert!(matches!(result, Err(StartupError::Tls(msg)) if msg.contains("no certificate")));
        let _ = std::fs::remove_file(&path);
    }
}
