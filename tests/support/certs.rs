//! TLS configs for the integration tests: a private CA, a server cert it
//! signed, and a client cert it signed for mutual TLS — everything under
//! `tests/support/testdata`, generated once with the system `openssl` CLI,
//! not at test time.

use std::sync::Arc;

use rustls::{Certificate, PrivateKey, RootCertStore, ServerConfig};

const CA: &[u8] = include_bytes!("testdata/ca.pem");
const SERVER_CERT: &[u8] = include_bytes!("testdata/server.pem");
const SERVER_KEY: &[u8] = include_bytes!("testdata/server.key");
const CLIENT_CERT: &[u8] = include_bytes!("testdata/test_client.pem");
const CLIENT_KEY: &[u8] = include_bytes!("testdata/test_client.key");

fn parse_certs(pem: &[u8]) -> Vec<Certificate> {
    let mut reader = std::io::Cursor::new(pem);
    rustls_pemfile::certs(&mut reader)
        .expect("valid PEM certificates")
        .into_iter()
        .map(Certificate)
        .collect()
}

fn parse_key(pem: &[u8]) -> PrivateKey {
    let mut reader = std::io::Cursor::new(pem);
    let keys = rustls_pemfile::pkcs8_private_keys(&mut reader).expect("valid PKCS#8 key");
    PrivateKey(keys.into_iter().next().expect("one private key"))
}

fn ca_root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    for cert in parse_certs(CA) {
        roots.add(&cert).expect("CA cert adds to root store");
    }
    roots
}

/// The client-side `rustls::ClientConfig` tests hand directly to
/// `Connection::create`/`Pool::create`, bypassing `aapns::tls::client_config`
/// (which pins trust to the public Web PKI) so it trusts our test CA
/// instead.
pub fn client_tls_config() -> Arc<rustls::ClientConfig> {
    let mut config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(ca_root_store())
        .with_client_auth_cert(parse_certs(CLIENT_CERT), parse_key(CLIENT_KEY))
        .expect("client config with client auth cert");
    config.alpn_protocols = vec![b"h2".to_vec()];
    Arc::new(config)
}

/// The server side of the same pair, requiring client certificates signed
/// by the same CA (mutual TLS, as a real APNs endpoint would).
pub fn server_tls_config() -> Arc<ServerConfig> {
    let verifier = rustls::server::AllowAnyAuthenticatedClient::new(ca_root_store());
    let mut config = ServerConfig::builder()
        .with_safe_defaults()
        .with_client_cert_verifier(Arc::new(verifier))
        .with_single_cert(parse_certs(SERVER_CERT), parse_key(SERVER_KEY))
        .expect("server config with server cert");
    config.alpn_protocols = vec![b"h2".to_vec()];
    Arc::new(config)
}
