use std::future::Future;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    address::{DestinationAddress, ToSocketDestination},
    connection::{CloseReason, Connection, ConnectionOptions, DetachedStream},
    error::ProxyError,
    transport::{TcpConnector, TransportConnector},
    AsyncSocket,
};

/// The protocol specific part of tunnelling through a proxy: drive every
/// request/response phase on `connection` until the proxy relays to `remote`.
pub trait ProxyHandshake: Send + Sync {
    fn negotiate<S: AsyncSocket>(
        &self,
        remote: &DestinationAddress,
        connection: &mut Connection<S>,
    ) -> impl Future<Output = Result<(), ProxyError>> + Send;
}

/// Outcome of one connection attempt. Holds the tunnelled stream on success
/// and the cause on failure, never both.
pub struct ConnectState<S> {
    stream: Option<DetachedStream<S>>,
    cause: Option<ProxyError>,
}

impl<S> ConnectState<S> {
    fn succeeded(stream: DetachedStream<S>) -> Self {
        ConnectState {
            stream: Some(stream),
            cause: None,
        }
    }

    fn failed(cause: ProxyError) -> Self {
        ConnectState {
            stream: None,
            cause: Some(cause),
        }
    }

    pub fn success(&self) -> bool {
        self.stream.is_some()
    }

    pub fn cause(&self) -> Option<&ProxyError> {
        self.cause.as_ref()
    }

    pub fn into_stream(self) -> Option<DetachedStream<S>> {
        self.stream
    }

    pub fn into_result(self) -> Result<DetachedStream<S>, ProxyError> {
        match (self.stream, self.cause) {
            (Some(stream), _) => Ok(stream),
            (None, Some(cause)) => Err(cause),
            (None, None) => Err(ProxyError::Closed),
        }
    }
}

/// Connects to a destination through a proxy: opens the proxy connection,
/// runs the handshake, then either detaches the socket for the caller or
/// closes it.
pub struct ProxyConnector<H, C = TcpConnector> {
    proxy_addr: DestinationAddress,
    handshake: H,
    transport: C,
    options: ConnectionOptions,
}

impl<H: ProxyHandshake> ProxyConnector<H> {
    pub fn new(
        proxy_addr: impl ToSocketDestination,
        handshake: H,
    ) -> Result<Self, ProxyError> {
        Ok(ProxyConnector {
            proxy_addr: proxy_addr.to_destination_address()?,
            handshake,
            transport: TcpConnector::default(),
            options: ConnectionOptions::default(),
        })
    }
}

impl<H: ProxyHandshake, C: TransportConnector> ProxyConnector<H, C> {
    pub fn with_transport<T: TransportConnector>(self, transport: T) -> ProxyConnector<H, T> {
        ProxyConnector {
            proxy_addr: self.proxy_addr,
            handshake: self.handshake,
            transport,
            options: self.options,
        }
    }

    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn proxy_addr(&self) -> &DestinationAddress {
        &self.proxy_addr
    }

    /// Never fails outright; the cause of a failed attempt is carried by the
    /// returned [`ConnectState`].
    pub async fn connect(
        &self,
        remote: impl ToSocketDestination,
        cancel: &CancellationToken,
    ) -> ConnectState<C::Stream> {
        if cancel.is_cancelled() {
            return ConnectState::failed(ProxyError::Cancelled);
        }
        let remote = match remote.to_destination_address() {
            Ok(remote) => remote,
            Err(e) => return ConnectState::failed(e.into()),
        };

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ConnectState::failed(ProxyError::Cancelled),
            stream = self.transport.connect(&self.proxy_addr) => stream,
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("unable to reach proxy {}: {}", self.proxy_addr, e);
                return ConnectState::failed(ProxyError::Transport(e));
            }
        };

        let mut connection = Connection::new(stream, self.options.clone(), cancel.child_token());
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProxyError::Cancelled),
            result = self.handshake.negotiate(&remote, &mut connection) => result,
        };

        match result {
            Ok(()) => {
                debug!("tunnel to {} via {} established", remote, self.proxy_addr);
                ConnectState::succeeded(connection.detach())
            }
            Err(cause) => {
                warn!(
                    "proxy handshake with {} for {} failed: {}",
                    self.proxy_addr, remote, cause
                );
                if let Err(e) = connection.close(CloseReason::ProtocolError).await {
                    debug!("error while closing proxy connection: {}", e);
                }
                ConnectState::failed(cause)
            }
        }
    }
}
