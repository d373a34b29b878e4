//! TLS connection options and client certificates.
//!
//! [`CertificateConfigurator`] folds client-certificate descriptors into a
//! [`TlsConnectOptions`]. Lists only ever grow: a single entry is promoted
//! to a list when a second one arrives, so certificates can be layered
//! across calls. [`TlsConnectOptions::apply_to_builder`] then hands the
//! result to BoringSSL.

use crate::base::neterror::NetError;
use boring::pkcs12::Pkcs12;
use boring::pkey::PKey;
use boring::ssl::{SslConnectorBuilder, SslVerifyMode, SslVersion};
use boring::x509::X509;
use bytes::Bytes;
use std::fmt;
use zeroize::Zeroizing;

/// A passphrase that is zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(..)")
    }
}

/// One value or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionList<T> {
    Single(T),
    Multiple(Vec<T>),
}

impl<T> OptionList<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OptionList::Single(v) => std::slice::from_ref(v),
            OptionList::Multiple(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Append `value` to an optional list, creating the list or promoting a
/// single existing entry as needed.
pub fn append_option<T>(slot: &mut Option<OptionList<T>>, value: T) {
    *slot = Some(match slot.take() {
        None => OptionList::Multiple(vec![value]),
        Some(OptionList::Single(existing)) => OptionList::Multiple(vec![existing, value]),
        Some(OptionList::Multiple(mut items)) => {
            items.push(value);
            OptionList::Multiple(items)
        }
    });
}

/// A PKCS#12 container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfxEntry {
    pub buffer: Bytes,
    pub passphrase: Option<Passphrase>,
}

/// A PEM private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub pem: Bytes,
    pub passphrase: Option<Passphrase>,
}

/// Client-certificate descriptor supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCertificate {
    P12 {
        buffer: Bytes,
        passphrase: Option<Passphrase>,
    },
    Pem {
        cert: Bytes,
        key: Option<Bytes>,
        passphrase: Option<Passphrase>,
    },
}

impl ClientCertificate {
    pub fn p12(buffer: impl Into<Bytes>, passphrase: Option<&str>) -> Self {
        ClientCertificate::P12 {
            buffer: buffer.into(),
            passphrase: passphrase.map(Passphrase::new),
        }
    }

    pub fn pem(cert: impl Into<Bytes>, key: Option<Bytes>, passphrase: Option<&str>) -> Self {
        ClientCertificate::Pem {
            cert: cert.into(),
            key,
            passphrase: passphrase.map(Passphrase::new),
        }
    }
}

/// Options for the TLS handshake of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConnectOptions {
    pub pfx: Option<OptionList<PfxEntry>>,
    pub cert: Option<OptionList<Bytes>>,
    pub key: Option<OptionList<KeyEntry>>,
    /// Verify the server certificate chain and host name.
    pub reject_unauthorized: bool,
}

impl Default for TlsConnectOptions {
    fn default() -> Self {
        Self {
            pfx: None,
            cert: None,
            key: None,
            reject_unauthorized: true,
        }
    }
}

/// Translates client-certificate descriptors into TLS options.
pub struct CertificateConfigurator;

impl CertificateConfigurator {
    pub fn configure(certificate: &ClientCertificate, options: &mut TlsConnectOptions) {
        match certificate {
            ClientCertificate::P12 { buffer, passphrase } => {
                append_option(
                    &mut options.pfx,
                    PfxEntry {
                        buffer: buffer.clone(),
                        passphrase: passphrase.clone(),
                    },
                );
            }
            ClientCertificate::Pem {
                cert,
                key,
                passphrase,
            } => {
                append_option(&mut options.cert, cert.clone());
                if let Some(key) = key {
                    append_option(
                        &mut options.key,
                        KeyEntry {
                            pem: key.clone(),
                            passphrase: passphrase.clone(),
                        },
                    );
                }
            }
        }
    }

    /// Options for a connection presenting all of `certificates`.
    pub fn build(certificates: &[ClientCertificate], reject_unauthorized: bool) -> TlsConnectOptions {
        let mut options = TlsConnectOptions {
            reject_unauthorized,
            ..TlsConnectOptions::default()
        };
        for certificate in certificates {
            Self::configure(certificate, &mut options);
        }
        options
    }
}

impl TlsConnectOptions {
    pub fn has_client_identity(&self) -> bool {
        self.pfx.is_some() || self.cert.is_some()
    }

    /// Apply these options to an SSL connector builder.
    ///
    /// BoringSSL presents one identity per connection: the first PKCS#12
    /// container, else the first PEM certificate and key. Every further
    /// certificate is sent as part of the chain.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        builder
            .set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(|_| NetError::SslProtocolError)?;
        // The default transport speaks HTTP/1.1 only.
        builder
            .set_alpn_protos(b"\x08http/1.1")
            .map_err(|_| NetError::SslProtocolError)?;

        if self.reject_unauthorized {
            builder.set_verify(SslVerifyMode::PEER);
        } else {
            builder.set_verify(SslVerifyMode::NONE);
        }

        let mut has_leaf = false;

        for entry in self.pfx.iter().flat_map(|l| l.as_slice()) {
            let pass = entry.passphrase.as_ref().map(|p| p.as_str()).unwrap_or("");
            let parsed = Pkcs12::from_der(&entry.buffer)
                .and_then(|p12| p12.parse(pass))
                .map_err(|e| {
                    tracing::debug!(error = %e, "unreadable pkcs12 client certificate");
                    NetError::SslClientAuthCertBadFormat
                })?;
            if has_leaf {
                builder
                    .add_extra_chain_cert(parsed.cert)
                    .map_err(|_| NetError::BadSslClientAuthCert)?;
            } else {
                builder
                    .set_certificate(&parsed.cert)
                    .map_err(|_| NetError::BadSslClientAuthCert)?;
                builder
                    .set_private_key(&parsed.pkey)
                    .map_err(|_| NetError::BadSslClientAuthCert)?;
                has_leaf = true;
            }
            if let Some(chain) = parsed.chain {
                for cert in chain {
                    builder
                        .add_extra_chain_cert(cert)
                        .map_err(|_| NetError::BadSslClientAuthCert)?;
                }
            }
        }

        let pem_leaf = !has_leaf;
        for pem in self.cert.iter().flat_map(|l| l.as_slice()) {
            let certs = X509::stack_from_pem(pem).map_err(|e| {
                tracing::debug!(error = %e, "unreadable pem client certificate");
                NetError::SslClientAuthCertBadFormat
            })?;
            if certs.is_empty() {
                return Err(NetError::SslClientAuthCertBadFormat);
            }
            for cert in certs {
                if has_leaf {
                    builder
                        .add_extra_chain_cert(cert)
                        .map_err(|_| NetError::BadSslClientAuthCert)?;
                } else {
                    builder
                        .set_certificate(&cert)
                        .map_err(|_| NetError::BadSslClientAuthCert)?;
                    has_leaf = true;
                }
            }
        }

        if pem_leaf && has_leaf {
            let entry = self
                .key
                .as_ref()
                .and_then(|l| l.as_slice().first())
                .ok_or(NetError::SslClientAuthCertNoPrivateKey)?;
            let key = match &entry.passphrase {
                Some(pass) => PKey::private_key_from_pem_passphrase(&entry.pem, pass.as_str().as_bytes()),
                None => PKey::private_key_from_pem(&entry.pem),
            }
            .map_err(|e| {
                tracing::debug!(error = %e, "unreadable client certificate key");
                NetError::SslClientAuthCertBadFormat
            })?;
            builder
                .set_private_key(&key)
                .map_err(|_| NetError::BadSslClientAuthCert)?;
            builder
                .check_private_key()
                .map_err(|_| NetError::BadSslClientAuthCert)?;
        }

        Ok(())
    }

    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        host.trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_err()
    }
}
