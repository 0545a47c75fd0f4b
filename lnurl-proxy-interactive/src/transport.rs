use crate::{InteractiveError, Result, WithdrawRequest, WithdrawResponse, WithdrawStream};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Maximum size of one JSON frame (withdraw messages are far smaller).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Frames read ahead of the consumer before the reader task waits.
const INCOMING_BUFFER: usize = 8;

/// Proxy side of an issuer connection.
pub type ServerStream<S> = FramedStream<S, WithdrawRequest, WithdrawResponse>;

/// Issuer side of a proxy connection.
pub type ClientStream<S> = FramedStream<S, WithdrawResponse, WithdrawRequest>;

/// Length-prefixed JSON messages over a byte stream.
///
/// Every frame is a 4-byte big-endian length followed by that many bytes of
/// JSON. A background task owns the read half so that a peer hang-up is
/// noticed even while nobody is calling [`recv`](Self::recv); it cancels
/// [`disconnected`](Self::disconnected) on EOF or a read error.
pub struct FramedStream<S, In, Out> {
    writer: WriteHalf<S>,
    incoming: mpsc::Receiver<Result<In>>,
    disconnected: CancellationToken,
    reader: JoinHandle<()>,
    _out: PhantomData<fn(Out)>,
}

impl<S, In, Out> FramedStream<S, In, Out>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    In: DeserializeOwned + Send + 'static,
    Out: Serialize,
{
    /// Wrap a connected byte stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(stream: S) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        let (tx, incoming) = mpsc::channel(INCOMING_BUFFER);
        let disconnected = CancellationToken::new();
        let reader = tokio::spawn(read_loop(read_half, tx, disconnected.clone()));

        Self {
            writer,
            incoming,
            disconnected,
            reader,
            _out: PhantomData,
        }
    }

    /// Serialize and write one frame.
    pub async fn send_frame(&mut self, msg: &Out) -> Result<()> {
        let bytes = serde_json::to_vec(msg)?;
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(InteractiveError::Protocol(format!(
                "Frame too large: {} bytes (max {})",
                bytes.len(),
                MAX_FRAME_SIZE
            )));
        }

        let len = (bytes.len() as u32).to_be_bytes();
        self.writer
            .write_all(&len)
            .await
            .map_err(|e| InteractiveError::Transport(format!("Failed to send length: {}", e)))?;
        self.writer
            .write_all(&bytes)
            .await
            .map_err(|e| InteractiveError::Transport(format!("Failed to send frame: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| InteractiveError::Transport(format!("Failed to flush: {}", e)))?;
        Ok(())
    }

    /// Wait for the next frame.
    pub async fn recv_frame(&mut self) -> Result<In> {
        match self.incoming.recv().await {
            Some(frame) => frame,
            None => Err(InteractiveError::Transport("connection closed".to_string())),
        }
    }

    /// Token cancelled once the peer has hung up.
    pub fn disconnected_token(&self) -> CancellationToken {
        self.disconnected.clone()
    }

    /// Shut down the write half, signalling EOF to the peer.
    pub async fn close(&mut self) -> Result<()> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| InteractiveError::Transport(format!("Failed to close: {}", e)))
    }
}

impl<S, In, Out> Drop for FramedStream<S, In, Out> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl<S> WithdrawStream for ServerStream<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&mut self, msg: WithdrawResponse) -> Result<()> {
        self.send_frame(&msg).await
    }

    async fn recv(&mut self) -> Result<WithdrawRequest> {
        self.recv_frame().await
    }

    fn disconnected(&self) -> CancellationToken {
        self.disconnected_token()
    }
}

async fn read_loop<S, In>(
    mut reader: ReadHalf<S>,
    tx: mpsc::Sender<Result<In>>,
    disconnected: CancellationToken,
) where
    S: AsyncRead,
    In: DeserializeOwned,
{
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(bytes)) => serde_json::from_slice::<In>(&bytes).map_err(InteractiveError::from),
            Ok(None) => {
                tracing::debug!("peer closed the stream");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "stream read failed");
                let _ = tx.send(Err(e)).await;
                break;
            }
        };

        if tx.send(frame).await.is_err() {
            break;
        }
    }

    disconnected.cancel();
}

/// Read one frame; `None` on a clean EOF at a frame boundary.
async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(InteractiveError::Transport(format!(
                "Failed to read length: {}",
                e
            )))
        }
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    // Validate length to prevent memory exhaustion
    if len > MAX_FRAME_SIZE {
        return Err(InteractiveError::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| InteractiveError::Transport(format!("Failed to read frame: {}", e)))?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frames_cross_in_both_directions() {
        let (a, b) = duplex(1024);
        let mut proxy: ServerStream<_> = FramedStream::new(a);
        let mut issuer: ClientStream<_> = FramedStream::new(b);

        issuer.send_frame(&WithdrawRequest::paid()).await.unwrap();
        assert_eq!(proxy.recv().await.unwrap(), WithdrawRequest::paid());

        let invoice = WithdrawResponse::Invoice {
            invoice: "lnbc1".to_string(),
        };
        proxy.send(invoice.clone()).await.unwrap();
        assert_eq!(issuer.recv_frame().await.unwrap(), invoice);
    }

    #[tokio::test]
    async fn test_peer_hangup_cancels_token() {
        let (a, b) = duplex(1024);
        let proxy: ServerStream<_> = FramedStream::new(a);
        let token = proxy.disconnected();
        assert!(!token.is_cancelled());

        drop(b);
        tokio::time::timeout(std::time::Duration::from_secs(1), token.cancelled())
            .await
            .expect("disconnect must be observed");
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (a, mut b) = duplex(1024);
        let mut proxy: ServerStream<_> = FramedStream::new(a);

        b.write_all(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes())
            .await
            .unwrap();

        let err = proxy.recv().await.unwrap_err();
        assert!(matches!(err, InteractiveError::Protocol(_)));
        proxy.disconnected().cancelled().await;
    }

    #[tokio::test]
    async fn test_garbage_frame_is_serialization_error() {
        let (a, mut b) = duplex(1024);
        let mut proxy: ServerStream<_> = FramedStream::new(a);

        let body = b"{\"type\":\"nope\"}";
        b.write_all(&(body.len() as u32).to_be_bytes()).await.unwrap();
        b.write_all(body).await.unwrap();

        let err = proxy.recv().await.unwrap_err();
        assert!(matches!(err, InteractiveError::Serialization(_)));
    }
}
