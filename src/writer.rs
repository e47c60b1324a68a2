use std::io;

use bytes::BytesMut;
use log::debug;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use crate::error::{CodecError, ProxyError};

/// Encodes messages of type `M` into an outbound buffer.
pub trait MessageWriter<M> {
    fn write_message(&self, message: &M, buf: &mut BytesMut) -> Result<(), CodecError>;
}

struct WriterState<W> {
    sink: W,
    disposed: bool,
}

/// Serializes writers on one sink: a logical write (raw bytes, a message or a
/// batch of messages) is encoded and flushed while holding the lock, so two
/// writes never interleave on the wire.
///
/// Once the sink is closed by the peer, or a write is cancelled half way, the
/// writer is disposed and further writes are dropped silently. A write whose
/// cancellation token has fired still fails with [`ProxyError::Cancelled`].
pub struct ProtocolWriter<W> {
    state: Mutex<WriterState<W>>,
}

impl<W: AsyncWrite + Unpin + Send> ProtocolWriter<W> {
    pub fn new(sink: W) -> Self {
        ProtocolWriter {
            state: Mutex::new(WriterState {
                sink,
                disposed: false,
            }),
        }
    }

    pub async fn write(&self, data: &[u8], cancel: &CancellationToken) -> Result<(), ProxyError> {
        self.write_with(
            |buf| {
                buf.extend_from_slice(data);
                Ok(())
            },
            cancel,
        )
        .await
    }

    pub async fn write_message<M, E>(
        &self,
        encoder: &E,
        message: &M,
        cancel: &CancellationToken,
    ) -> Result<(), ProxyError>
    where
        E: MessageWriter<M>,
    {
        self.write_with(|buf| encoder.write_message(message, buf), cancel)
            .await
    }

    pub async fn write_many<'m, M, E, I>(
        &self,
        encoder: &E,
        messages: I,
        cancel: &CancellationToken,
    ) -> Result<(), ProxyError>
    where
        M: 'm,
        E: MessageWriter<M>,
        I: IntoIterator<Item = &'m M>,
    {
        self.write_with(
            |buf| {
                messages
                    .into_iter()
                    .try_for_each(|message| encoder.write_message(message, buf))
            },
            cancel,
        )
        .await
    }

    /// Runs `encode` against a scratch buffer and flushes the result, all
    /// under the lock. Nothing reaches the sink if `encode` fails.
    pub async fn write_with<F>(
        &self,
        encode: F,
        cancel: &CancellationToken,
    ) -> Result<(), ProxyError>
    where
        F: FnOnce(&mut BytesMut) -> Result<(), CodecError>,
    {
        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
            state = self.state.lock() => state,
        };
        if state.disposed {
            return Ok(());
        }

        let mut buf = BytesMut::new();
        encode(&mut buf)?;

        let flushed = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = flush(&mut state.sink, &buf) => Some(result),
        };
        let Some(result) = flushed else {
            state.disposed = true;
            return Err(ProxyError::Cancelled);
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if is_closed(&e) => {
                debug!("sink closed, disposing writer: {}", e);
                state.disposed = true;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Marks the writer disposed and shuts the sink down. Waits for an in
    /// flight write to finish first.
    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        if state.disposed {
            return;
        }
        state.disposed = true;
        if let Err(e) = state.sink.shutdown().await {
            debug!("shutdown failed while disposing writer: {}", e);
        }
    }

    pub async fn is_disposed(&self) -> bool {
        self.state.lock().await.disposed
    }

    pub fn into_inner(self) -> W {
        self.state.into_inner().sink
    }
}

async fn flush<W: AsyncWrite + Unpin>(sink: &mut W, buf: &[u8]) -> io::Result<()> {
    sink.write_all(buf).await?;
    sink.flush().await
}

fn is_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::WriteZero
    )
}
