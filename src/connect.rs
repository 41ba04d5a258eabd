//! TCP + TLS dial used by [`Connection::create`](crate::connection::Connection::create).

use std::sync::Arc;

use rustls::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::{
    config::Origin,
    error::{Error, Result},
};

/// Opens a TCP connection to `origin`, performs the TLS handshake with
/// `tls_config`, and confirms the peer negotiated ALPN `h2` — APNs requires
/// HTTP/2, so anything else is a configuration error worth failing fast on.
pub(crate) async fn dial(
    origin: &Origin,
    tls_config: Arc<rustls::ClientConfig>,
) -> Result<TlsStream<TcpStream>> {
    let tcp = TcpStream::connect((origin.host(), origin.port()))
        .await
        .map_err(Error::io)?;
    tcp.set_nodelay(true).map_err(Error::io)?;

    let server_name = ServerName::try_from(origin.host())
        .map_err(|_| Error::builder("invalid DNS name in origin host"))?;

    let connector = TlsConnector::from(tls_config);
    let tls = connector
        .connect(server_name, tcp)
        .await
        .map_err(Error::tls)?;

    let (_, session) = tls.get_ref();
    if session.alpn_protocol() != Some(b"h2") {
        return Err(Error::tls(std::io::Error::other(
            "peer did not negotiate ALPN h2",
        )));
    }

    Ok(tls)
}
