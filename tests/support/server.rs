//! A minimal in-process APNs stand-in: TLS + HTTP/2 over a loopback socket,
//! driven by an `Action` closure so each test can script exactly the
//! responses/resets/backpressure it wants to observe.

use std::sync::Arc;

use bytes::Bytes;
use h2::Reason;
use rustls::ServerConfig;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tokio_rustls::TlsAcceptor;

/// What the fake server does with one accepted request.
pub enum Action {
    Respond { status: u16, apns_id: &'static str, body: Vec<u8> },
    Reset(Reason),
    /// Accepts the stream and then never responds, so the caller can
    /// exercise cancellation of a still-pending request.
    Hang,
}

#[derive(Default, Clone, Copy)]
pub struct ServerSettings {
    pub max_concurrent_streams: Option<u32>,
}

pub struct Server {
    pub addr: std::net::SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn start<F>(tls_config: Arc<ServerConfig>, settings: ServerSettings, respond: F) -> Server
where
    F: Fn(&http::Request<()>) -> Action + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local_addr");
    let acceptor = TlsAcceptor::from(tls_config);
    let respond = Arc::new(respond);

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => return,
                accepted = listener.accept() => {
                    let Ok((tcp, _)) = accepted else { return };
                    let acceptor = acceptor.clone();
                    let respond = respond.clone();
                    tokio::spawn(serve_connection(tcp, acceptor, settings, respond));
                }
            }
        }
    });

    Server {
        addr,
        shutdown: Some(shutdown_tx),
        handle,
    }
}

async fn serve_connection<F>(
    tcp: tokio::net::TcpStream,
    acceptor: TlsAcceptor,
    settings: ServerSettings,
    respond: Arc<F>,
) where
    F: Fn(&http::Request<()>) -> Action + Send + Sync + 'static,
{
    let Ok(tls) = acceptor.accept(tcp).await else { return };

    let mut builder = h2::server::Builder::new();
    if let Some(max) = settings.max_concurrent_streams {
        builder.max_concurrent_streams(max);
    }

    let Ok(mut connection) = builder.handshake::<_, Bytes>(tls).await else { return };

    while let Some(Ok((request, respond_handle))) = connection.accept().await {
        tokio::spawn(serve_one(request, respond_handle, respond.clone()));
    }
}

async fn serve_one<F>(
    request: http::Request<h2::RecvStream>,
    mut respond_handle: h2::server::SendResponse<Bytes>,
    respond: Arc<F>,
) where
    F: Fn(&http::Request<()>) -> Action,
{
    let (parts, mut body) = request.into_parts();
    while let Some(chunk) = body.data().await {
        if let Ok(chunk) = chunk {
            let _ = body.flow_control().release_capacity(chunk.len());
        }
    }
    let probe = http::Request::from_parts(parts, ());

    match (respond)(&probe) {
        Action::Respond {
            status,
            apns_id,
            body,
        } => {
            let response = http::Response::builder()
                .status(status)
                .header("apns-id", apns_id)
                .body(())
                .expect("valid response head");
            if let Ok(mut send_stream) = respond_handle.send_response(response, false) {
                let _ = send_stream.send_data(Bytes::from(body), true);
            }
        }
        Action::Reset(reason) => {
            respond_handle.send_reset(reason);
        }
        Action::Hang => {
            // Leave the stream open without responding.
        }
    }
}
