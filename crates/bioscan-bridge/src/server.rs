//! Bridge session loop.
//!
//! One session serves one UI surface over any byte stream pair (the child
//! process's pipes, or stdin/stdout in headless mode). Requests are handled
//! strictly one at a time; device notifications raised meanwhile are queued
//! by the broadcast channel and written between responses.
//!
//! ```text
//! UI stdout ──▶ FramedRead<BridgeCodec> ──▶ Dispatcher ──▶ BiometricService
//! UI stdin  ◀── FramedWrite<BridgeCodec> ◀── responses + DeviceEvent pushes
//! ```

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use bioscan_biometric::DeviceEvent;
use bioscan_core::ErrorKind;
use bioscan_hardware::DriverShim;

use crate::codec::{BridgeCodec, Inbound};
use crate::dispatcher::Dispatcher;
use crate::error::{BridgeError, Result};
use crate::protocol::{BridgeResponse, Notification};

/// Counters for one finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests: u64,
    pub rejected: u64,
    pub notifications: u64,
    pub lagged: u64,
}

/// Serves the capability bridge to a UI surface.
#[derive(Debug)]
pub struct BridgeServer<S: DriverShim> {
    dispatcher: Dispatcher<S>,
}

impl<S: DriverShim> BridgeServer<S> {
    pub fn new(dispatcher: Dispatcher<S>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    /// Serve until the UI closes its end of `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`](crate::BridgeError) when the underlying
    /// stream fails or a response cannot be written. Bad requests are
    /// answered, not returned.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<SessionStats>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut requests = FramedRead::new(reader, BridgeCodec::new());
        let mut responses = FramedWrite::new(writer, BridgeCodec::new());
        let mut events = self.dispatcher.service().subscribe();
        let mut events_open = true;
        let mut stats = SessionStats::default();

        info!(backend = self.dispatcher.service().backend(), "Bridge session started");

        loop {
            tokio::select! {
                biased;

                event = events.recv(), if events_open => match event {
                    Ok(event) => {
                        push(&mut responses, &event).await?;
                        stats.notifications += 1;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Device notifications dropped");
                        stats.lagged += skipped;
                    }
                    Err(RecvError::Closed) => events_open = false,
                },

                inbound = requests.next() => match inbound {
                    Some(Ok(Inbound::Request(request))) => {
                        stats.requests += 1;
                        let response = self.dispatcher.dispatch(request).await;
                        respond(&mut responses, response).await?;
                    }
                    Some(Ok(Inbound::Rejected(rejection))) => {
                        stats.rejected += 1;
                        warn!(kind = %rejection.kind, message = %rejection.message, "Request rejected");
                        responses.send(BridgeResponse::from(rejection)).await?;
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
            }
        }

        // Flush notifications raised by the last request.
        loop {
            match events.try_recv() {
                Ok(event) => {
                    push(&mut responses, &event).await?;
                    stats.notifications += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => stats.lagged += skipped,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        info!(
            requests = stats.requests,
            rejected = stats.rejected,
            notifications = stats.notifications,
            "Bridge session ended"
        );
        Ok(stats)
    }
}

/// Write a response. One that does not fit in a frame is answered with an
/// `InternalError` for the same id so the session keeps going.
async fn respond<W>(responses: &mut FramedWrite<W, BridgeCodec>, response: BridgeResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let id = response.id();
    match responses.send(response).await {
        Err(BridgeError::FrameTooLarge { size, max_size }) => {
            error!(?id, size, max_size, "Response exceeds frame limit");
            let failure = BridgeResponse::failure(
                id,
                ErrorKind::Internal,
                format!("Response too large: {size} bytes (max: {max_size})"),
            );
            responses.send(failure).await
        }
        sent => sent,
    }
}

async fn push<W>(responses: &mut FramedWrite<W, BridgeCodec>, event: &DeviceEvent) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let notification = Notification::from(event);
    debug!(event = ?notification.event, device_id = %event.descriptor().id(), "Pushing notification");
    responses.send(notification).await
}
