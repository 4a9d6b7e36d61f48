//! TLS mutual authentication material for network backends.
//!
//! Only the resulting configuration matters to the rest of the crate; the
//! files are read and checked once, up front, so that a broken certificate is
//! reported as a configuration problem at startup instead of as a network
//! failure on first use.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Protocol versions a network backend may negotiate. Nothing older than
/// TLS 1.2 is ever offered.
pub const PROTOCOL_VERSIONS: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12, &rustls::version::TLS13];

/// TLS file paths as they appear in configuration, possibly incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsPaths {
    pub ca_cert: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}
impl TlsPaths {
    /// Either all three paths, none of them, or a configuration error.
    pub fn resolve(&self) -> Result<Option<TlsMaterial>> {
        match (&self.ca_cert, &self.cert, &self.key) {
            (None, None, None) => Ok(None),
            (Some(ca_cert), Some(cert), Some(key)) => Ok(Some(TlsMaterial {
                ca_cert: ca_cert.clone(),
                cert: cert.clone(),
                key: key.clone(),
            })),
            _ => exn::bail!(ErrorKind::Configuration(
                "TLS requires all of CA certificate, client certificate and client key".to_string()
            )),
        }
    }
}

/// A complete CA certificate, client certificate and client key triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca_cert: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Validated TLS material.
///
/// The Redis client only accepts raw PEM and builds its own connector from
/// it, so the [`ClientConfig`] built here serves to reject unusable material
/// up front; nothing connects with it.
#[derive(Clone)]
pub struct TlsSettings {
    config: Arc<ClientConfig>,
    pub(crate) ca_pem: Vec<u8>,
    pub(crate) cert_pem: Vec<u8>,
    pub(crate) key_pem: Vec<u8>,
}
impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("TlsSettings").field("config", &self.config).finish_non_exhaustive()
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).or_raise(|| ErrorKind::Configuration(format!("unable to read {what} {}", path.display())))
}

fn invalid(what: &str, path: &Path) -> ErrorKind {
    ErrorKind::Configuration(format!("invalid {what} {}", path.display()))
}

/// Read the three PEM files and build a client configuration that trusts only
/// the given CA and authenticates with the given certificate/key pair.
pub fn load(material: &TlsMaterial) -> Result<TlsSettings> {
    let ca_pem = read_pem(&material.ca_cert, "CA certificate")?;
    let cert_pem = read_pem(&material.cert, "client certificate")?;
    let key_pem = read_pem(&material.key, "client key")?;

    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(&ca_pem) {
        let cert = cert.or_raise(|| invalid("CA certificate", &material.ca_cert))?;
        roots.add(cert).or_raise(|| invalid("CA certificate", &material.ca_cert))?;
    }
    if roots.is_empty() {
        exn::bail!(invalid("CA certificate", &material.ca_cert));
    }

    let chain = CertificateDer::pem_slice_iter(&cert_pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .or_raise(|| invalid("client certificate", &material.cert))?;
    if chain.is_empty() {
        exn::bail!(invalid("client certificate", &material.cert));
    }
    let key = PrivateKeyDer::from_pem_slice(&key_pem).or_raise(|| invalid("client key", &material.key))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    check_key_pair(&provider, &chain, &key, material)?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(PROTOCOL_VERSIONS)
        .or_raise(|| ErrorKind::Configuration("unsupported TLS protocol versions".to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .or_raise(|| invalid("client certificate/key pair", &material.cert))?;
    tracing::debug!(ca = %material.ca_cert.display(), cert = %material.cert.display(), "Loaded TLS client configuration");
    Ok(TlsSettings {
        config: Arc::new(config),
        ca_pem,
        cert_pem,
        key_pem,
    })
}

fn check_key_pair(
    provider: &CryptoProvider,
    chain: &[CertificateDer<'static>],
    key: &PrivateKeyDer<'static>,
    material: &TlsMaterial,
) -> Result<()> {
    let signing_key = provider
        .key_provider
        .load_private_key(key.clone_key())
        .or_raise(|| invalid("client key", &material.key))?;
    CertifiedKey::new(chain.to_vec(), signing_key)
        .keys_match()
        .or_raise(|| ErrorKind::Configuration(format!(
            "client key {} does not match client certificate {}",
            material.key.display(),
            material.cert.display()
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/tls").join(name)
    }

    fn paths(ca: bool, cert: bool, key: bool) -> TlsPaths {
        TlsPaths {
            ca_cert: ca.then(|| PathBuf::from("/etc/vigil/ca.pem")),
            cert: cert.then(|| PathBuf::from("/etc/vigil/cert.pem")),
            key: key.then(|| PathBuf::from("/etc/vigil/key.pem")),
        }
    }

    #[test]
    fn test_resolve_absent() {
        assert_eq!(paths(false, false, false).resolve().unwrap(), None);
    }

    #[test]
    fn test_resolve_complete() {
        let material = paths(true, true, true).resolve().unwrap().unwrap();
        assert_eq!(material.ca_cert, PathBuf::from("/etc/vigil/ca.pem"));
        assert_eq!(material.key, PathBuf::from("/etc/vigil/key.pem"));
    }

    #[rstest]
    #[case(true, false, false)]
    #[case(false, true, false)]
    #[case(false, false, true)]
    #[case(true, true, false)]
    #[case(true, false, true)]
    #[case(false, true, true)]
    fn test_resolve_partial(#[case] ca: bool, #[case] cert: bool, #[case] key: bool) {
        let err = paths(ca, cert, key).resolve().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
    }

    #[test]
    fn test_load_missing_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let material = TlsMaterial {
            ca_cert: temp_dir.path().join("ca.pem"),
            cert: temp_dir.path().join("cert.pem"),
            key: temp_dir.path().join("key.pem"),
        };
        let err = load(&material).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Configuration(msg) if msg.contains("ca.pem")));
    }

    #[test]
    fn test_load_garbage_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let material = TlsMaterial {
            ca_cert: temp_dir.path().join("ca.pem"),
            cert: temp_dir.path().join("cert.pem"),
            key: temp_dir.path().join("key.pem"),
        };
        for path in [&material.ca_cert, &material.cert, &material.key] {
            std::fs::write(path, b"this is not PEM").unwrap();
        }
        let err = load(&material).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
    }

    #[test]
    fn test_load_valid_material() {
        let material = TlsMaterial {
            ca_cert: fixture("ca.pem"),
            cert: fixture("client.pem"),
            key: fixture("client.key"),
        };
        let settings = load(&material).unwrap();
        assert!(settings.config.client_auth_cert_resolver.has_certs());
        assert!(!format!("{settings:?}").contains("PRIVATE KEY"));
    }

    #[test]
    fn test_load_mismatched_key() {
        let material = TlsMaterial {
            ca_cert: fixture("ca.pem"),
            cert: fixture("client.pem"),
            key: fixture("other.key"),
        };
        let err = load(&material).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Configuration(msg) if msg.contains("other.key") && msg.contains("does not match")));
    }

    #[test]
    fn test_load_client_certificate_as_key() {
        let material = TlsMaterial {
            ca_cert: fixture("ca.pem"),
            cert: fixture("client.pem"),
            key: fixture("client.pem"),
        };
        let err = load(&material).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Configuration(msg) if msg.contains("client key")));
    }
}
