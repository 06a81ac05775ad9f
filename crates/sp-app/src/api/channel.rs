use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use futures::{Stream, StreamExt};
use log::{info, warn};
use sp_core::JobUpdate;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use crate::error::{AppError, Result};

/// Stream of pushed [`JobUpdate`]s for one job.
///
/// The stream ends when the socket closes or fails and cannot be restarted.
/// Dropping it stops the socket reader.
pub struct StatusChannel {
    rx: UnboundedReceiver<JobUpdate>,
    reader: Option<JoinHandle<()>>,
}

impl StatusChannel {
    /// Open the push channel at `url` and start forwarding updates.
    ///
    /// Gives up with [`AppError::ChannelTimeout`] when the handshake does not
    /// finish within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let (mut socket, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| AppError::ChannelTimeout(timeout))??;
        info!("Status channel open: {}", url);

        let (tx, rx) = unbounded_channel();
        let url = url.to_string();

        let reader = tokio::spawn(async move {
            while let Some(frame) = socket.next().await {
                let update = match frame {
                    Ok(Message::Text(text)) => decode_frame(text.as_bytes()),
                    Ok(Message::Binary(bytes)) => decode_frame(&bytes),
                    Ok(Message::Close(reason)) => {
                        info!("Status channel {} closed: {:?}", url, reason);
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Status channel {} failed: {}", url, e);
                        break;
                    }
                };

                if let Some(update) = update {
                    if tx.send(update).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(Self {
            rx,
            reader: Some(reader),
        })
    }

    /// Channel fed by the returned sender instead of a socket.
    pub fn detached() -> (UnboundedSender<JobUpdate>, Self) {
        let (tx, rx) = unbounded_channel();
        (tx, Self::from_receiver(rx))
    }

    pub fn from_receiver(rx: UnboundedReceiver<JobUpdate>) -> Self {
        Self { rx, reader: None }
    }

    pub async fn recv(&mut self) -> Option<JobUpdate> {
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.rx.close();
    }
}

impl Stream for StatusChannel {
    type Item = JobUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<JobUpdate>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for StatusChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parse one pushed frame. Malformed payloads are logged and dropped.
pub fn decode_frame(payload: &[u8]) -> Option<JobUpdate> {
    match serde_json::from_slice(payload) {
        Ok(update) => Some(update),
        Err(e) => {
            warn!("Dropping malformed status update: {}", e);
            None
        }
    }
}
