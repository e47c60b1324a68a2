use std::{future::Future, io, time::Duration};

use log::debug;
use tokio::net::TcpStream;

use crate::{address::DestinationAddress, AsyncSocket};

/// Opens the raw connection to the proxy itself.
pub trait TransportConnector: Send + Sync {
    type Stream: AsyncSocket;

    fn connect(
        &self,
        endpoint: &DestinationAddress,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub nodelay: bool,
    pub connect_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            nodelay: true,
            connect_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    options: ConnectOptions,
}

impl TcpConnector {
    pub fn new(options: ConnectOptions) -> Self {
        TcpConnector { options }
    }

    async fn open(endpoint: &DestinationAddress) -> io::Result<TcpStream> {
        match endpoint {
            DestinationAddress::Domain(host, port) => {
                TcpStream::connect((host.as_str(), *port)).await
            }
            DestinationAddress::Ip(addr) => TcpStream::connect(addr).await,
        }
    }
}

/// Bounds `connect` by `timeout`; an elapsed timer is an
/// [`io::ErrorKind::TimedOut`] error.
pub(crate) async fn connect_within<T>(
    timeout: Option<Duration>,
    connect: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "proxy connect timed out"))?,
        None => connect.await,
    }
}

impl TransportConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, endpoint: &DestinationAddress) -> io::Result<TcpStream> {
        debug!("connecting to proxy {}", endpoint);
        let stream = connect_within(self.options.connect_timeout, Self::open(endpoint)).await?;
        stream.set_nodelay(self.options.nodelay)?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_by_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = DestinationAddress::Ip(listener.local_addr().unwrap());
        let connector = TcpConnector::default();
        let (stream, accepted) = tokio::join!(connector.connect(&addr), listener.accept());
        let stream = stream.unwrap();
        assert!(stream.nodelay().unwrap());
        assert_eq!(stream.local_addr().unwrap(), accepted.unwrap().1);
    }

    #[tokio::test]
    async fn options_are_applied() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = DestinationAddress::Ip(listener.local_addr().unwrap());
        let connector = TcpConnector::new(ConnectOptions {
            nodelay: false,
            connect_timeout: Some(Duration::from_secs(5)),
        });
        let (stream, accepted) = tokio::join!(connector.connect(&addr), listener.accept());
        accepted.unwrap();
        assert!(!stream.unwrap().nodelay().unwrap());
    }

    #[tokio::test]
    async fn stalled_connect_times_out() {
        let result = connect_within(
            Some(Duration::from_millis(10)),
            std::future::pending::<io::Result<TcpStream>>(),
        )
        .await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::TimedOut);

        let ready = connect_within(Some(Duration::from_secs(5)), async { Ok(7u8) }).await;
        assert_eq!(ready.unwrap(), 7);
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = DestinationAddress::Ip(listener.local_addr().unwrap());
        drop(listener);
        assert!(TcpConnector::default().connect(&addr).await.is_err());
    }
}
