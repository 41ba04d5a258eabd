//! TLS client-identity construction: one PEM file containing both a
//! certificate chain and its private key, loaded as the client identity APNs
//! authenticates against.

use std::sync::Arc;

use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore};

use crate::error::{Error, Result};

/// A parsed client certificate and private key, ready to present during the
/// TLS handshake.
#[derive(Clone)]
pub struct Identity {
    cert_chain: Vec<Certificate>,
    key: PrivateKey,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("cert_chain_len", &self.cert_chain.len())
            .finish()
    }
}

impl Identity {
    /// Parses a single PEM buffer containing a leaf certificate (plus any
    /// intermediate chain certificates) followed by its private key, in
    /// either PKCS#8 or traditional RSA/EC encoding.
    pub fn from_pem(buf: &[u8]) -> Result<Identity> {
        let mut reader = std::io::Cursor::new(buf);
        let certs = rustls_pemfile::certs(&mut reader).map_err(Error::tls)?;
        if certs.is_empty() {
            return Err(Error::builder("no certificate found in PEM identity"));
        }
        let cert_chain = certs.into_iter().map(Certificate).collect();

        let key = Identity::parse_private_key(buf)?;
        Ok(Identity { cert_chain, key })
    }

    fn parse_private_key(buf: &[u8]) -> Result<PrivateKey> {
        let mut reader = std::io::Cursor::new(buf);
        let pkcs8 = rustls_pemfile::pkcs8_private_keys(&mut reader).map_err(Error::tls)?;
        if let Some(key) = pkcs8.into_iter().next() {
            return Ok(PrivateKey(key));
        }

        let mut reader = std::io::Cursor::new(buf);
        let rsa = rustls_pemfile::rsa_private_keys(&mut reader).map_err(Error::tls)?;
        if let Some(key) = rsa.into_iter().next() {
            return Ok(PrivateKey(key));
        }

        Err(Error::builder("no private key found in PEM identity"))
    }

    pub(crate) fn into_parts(self) -> (Vec<Certificate>, PrivateKey) {
        (self.cert_chain, self.key)
    }
}

/// Builds the `rustls::ClientConfig` a connection's TLS handshake uses: the
/// platform/webpki root store to validate APNs's server certificate, the
/// caller's [`Identity`] as client authentication, and ALPN pinned to `h2`
/// (APNs requires HTTP/2, so there is nothing to negotiate down to).
pub(crate) fn client_config(identity: Identity) -> Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    let (cert_chain, key) = identity.into_parts();
    let mut config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_client_auth_cert(cert_chain, key)
        .map_err(Error::tls)?;
    config.alpn_protocols = vec![b"h2".to_vec()];

    Ok(Arc::new(config))
}
