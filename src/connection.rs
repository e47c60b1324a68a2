use std::{
    io,
    pin::Pin,
    task::{ready, Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{CodecError, ProxyError},
    filter::BoxedFilter,
    writer::{MessageWriter, ProtocolWriter},
    AsyncSocket,
};

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Bytes reserved in the receive buffer before each read.
    pub receive_buffer_size: usize,
    /// Upper bound for bytes buffered while waiting for one complete frame.
    pub max_package_length: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            receive_buffer_size: 4 * 1024,
            max_package_length: 1024 * 1024,
        }
    }
}

/// Why a connection was closed. Failed handshakes, cancelled ones included,
/// always close with `ProtocolError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ProtocolError,
    LocalClosing,
}

/// A socket driven by the handshake layer: outbound bytes go through a
/// [`ProtocolWriter`], inbound bytes accumulate until a pipeline filter frames
/// them into packages.
pub struct Connection<S> {
    reader: ReadHalf<S>,
    writer: ProtocolWriter<WriteHalf<S>>,
    buffer: BytesMut,
    options: ConnectionOptions,
    cancel: CancellationToken,
    closed: bool,
}

impl<S: AsyncSocket> Connection<S> {
    pub fn new(stream: S, options: ConnectionOptions, cancel: CancellationToken) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Connection {
            reader,
            writer: ProtocolWriter::new(writer),
            buffer: BytesMut::with_capacity(options.receive_buffer_size),
            options,
            cancel,
            closed: false,
        }
    }

    pub async fn send(&self, data: &[u8]) -> Result<(), ProxyError> {
        self.writer.write(data, &self.cancel).await
    }

    pub async fn send_message<M, E>(&self, encoder: &E, message: &M) -> Result<(), ProxyError>
    where
        E: MessageWriter<M>,
    {
        self.writer
            .write_message(encoder, message, &self.cancel)
            .await
    }

    pub async fn send_many<'m, M, E, I>(&self, encoder: &E, messages: I) -> Result<(), ProxyError>
    where
        M: 'm,
        E: MessageWriter<M>,
        I: IntoIterator<Item = &'m M>,
    {
        self.writer
            .write_many(encoder, messages, &self.cancel)
            .await
    }

    /// Frames inbound bytes with `filter`, and with whichever filter each
    /// decoded package hands over after it.
    pub fn package_stream<P>(&mut self, filter: BoxedFilter<P>) -> PackageStream<'_, S, P> {
        PackageStream {
            connection: self,
            filter: Some(filter),
        }
    }

    pub async fn close(self, reason: CloseReason) -> Result<(), ProxyError> {
        debug!("closing proxy connection: {:?}", reason);
        self.writer.dispose().await;
        Ok(())
    }

    /// Hands the socket back for plain byte traffic. Bytes received past the
    /// last decoded frame are replayed first.
    pub fn detach(self) -> DetachedStream<S> {
        debug!(
            "detaching proxy connection with {} buffered bytes",
            self.buffer.len()
        );
        DetachedStream {
            inner: self.reader.unsplit(self.writer.into_inner()),
            buffered: self.buffer.freeze(),
        }
    }

    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<usize>> {
        self.buffer.reserve(self.options.receive_buffer_size);
        tokio_util::io::poll_read_buf(Pin::new(&mut self.reader), cx, &mut self.buffer)
    }
}

/// Forward-only stream of decoded packages. Ends when the peer closes the
/// connection, or after the first decoding error.
pub struct PackageStream<'a, S, P> {
    connection: &'a mut Connection<S>,
    filter: Option<BoxedFilter<P>>,
}

impl<S: AsyncSocket, P> PackageStream<'_, S, P> {
    pub fn connection(&self) -> &Connection<S> {
        &*self.connection
    }

    /// Next package, or [`ProxyError::Closed`] if the stream ended first.
    pub async fn receive(&mut self) -> Result<P, ProxyError> {
        self.next().await.unwrap_or(Err(ProxyError::Closed))
    }
}

impl<S: AsyncSocket, P> Stream for PackageStream<'_, S, P> {
    type Item = Result<P, ProxyError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(filter) = this.filter.as_mut() else {
                return Poll::Ready(None);
            };
            match filter.filter(&mut this.connection.buffer) {
                Ok(Some(decoded)) => {
                    if let Some(next) = decoded.next {
                        this.filter = Some(next);
                    }
                    return Poll::Ready(Some(Ok(decoded.package)));
                }
                Ok(None) => {}
                Err(e) => {
                    this.filter = None;
                    return Poll::Ready(Some(Err(e.into())));
                }
            }

            if this.connection.closed {
                return Poll::Ready(None);
            }
            let max = this.connection.options.max_package_length;
            if this.connection.buffer.len() >= max {
                this.filter = None;
                return Poll::Ready(Some(Err(CodecError::PackageTooLarge(max).into())));
            }
            match ready!(this.connection.poll_fill(cx)) {
                Ok(0) => {
                    this.connection.closed = true;
                    return Poll::Ready(None);
                }
                Ok(_) => {}
                Err(e) => {
                    this.filter = None;
                    return Poll::Ready(Some(Err(e.into())));
                }
            }
        }
    }
}

/// A proxied socket after the handshake; reads drain bytes buffered during
/// the handshake before touching the socket.
pub struct DetachedStream<S> {
    inner: S,
    buffered: Bytes,
}

impl<S> DetachedStream<S> {
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_parts(self) -> (S, Bytes) {
        (self.inner, self.buffered)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for DetachedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.buffered.is_empty() {
            let n = buf.remaining().min(this.buffered.len());
            buf.put_slice(&this.buffered.split_to(n));
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for DetachedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
