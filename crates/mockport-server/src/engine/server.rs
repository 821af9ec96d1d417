//! Mock listener accept loop.

use super::MockEngine;
use crate::config::Protocol;
use crate::proxy::create_tls_acceptor;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

pub struct MockServer {
    engine: Arc<MockEngine>,
    tls_acceptor: Option<TlsAcceptor>,
}

impl MockServer {
    /// Fails when the listener is configured for HTTPS and the certificate
    /// cannot be loaded.
    pub fn new(engine: Arc<MockEngine>) -> Result<Self, anyhow::Error> {
        let listen = &engine.config().listen;
        let tls_acceptor = if listen.protocol == Protocol::Https {
            let tls = listen.tls.as_ref().ok_or_else(|| {
                anyhow::anyhow!("TLS configuration required for HTTPS listener")
            })?;
            Some(create_tls_acceptor(&tls.cert_path, &tls.key_path)?)
        } else {
            None
        };
        Ok(Self {
            engine,
            tls_acceptor,
        })
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listen = &self.engine.config().listen;
        let listener = TcpListener::bind((listen.host.as_str(), listen.port)).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let protocol = if self.tls_acceptor.is_some() {
            Protocol::Https
        } else {
            Protocol::Http
        };
        info!(
            "Mock listener on {}://{}/mock/{{shortId}}/",
            protocol.as_str(),
            listener.local_addr()?
        );

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let engine = Arc::clone(&self.engine);

            match self.tls_acceptor.clone() {
                Some(acceptor) => {
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => serve_connection(tls_stream, engine, remote_addr).await,
                            Err(err) => error!("TLS handshake failed from {}: {}", remote_addr, err),
                        }
                    });
                }
                None => {
                    tokio::spawn(serve_connection(stream, engine, remote_addr));
                }
            }
        }
    }
}

async fn serve_connection<S>(stream: S, engine: Arc<MockEngine>, remote_addr: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let engine = Arc::clone(&engine);
        async move { Ok::<_, Infallible>(engine.handle(req, remote_addr).await) }
    });

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        debug!("Error serving connection from {}: {}", remote_addr, err);
    }
}
