//! One observer's socket, from admission through eviction.
//!
//! The reader forwards inbound text to the session service. The writer drains
//! the connection's outbound queue and sends pings. Whichever side fails first
//! asks the service to evict; eviction cancels the connection token, which
//! stops the other side.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use jamoveo_session::{Admission, Connection, EvictReason, Frame, SessionHandle};
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::heartbeat::{self, HeartbeatPolicy, Liveness};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_FRAMES_IGNORED_TOTAL, WS_FRAMES_RECEIVED_TOTAL,
};

/// How long the writer gets to flush its close frame after eviction.
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Run the socket for an admitted connection until it is evicted.
#[instrument(skip_all, fields(
    conn_id = %admission.connection.id(),
    user = %admission.connection.identity().username,
))]
pub async fn run_ws_session(
    socket: WebSocket,
    admission: Admission,
    session: SessionHandle,
    policy: HeartbeatPolicy,
) {
    let Admission {
        connection,
        outbound,
    } = admission;
    let started = Instant::now();
    let (sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(write_loop(
        sink,
        outbound,
        Arc::clone(&connection),
        session.clone(),
        policy,
    ));

    if let Some(reason) = read_loop(&mut stream, &connection, &session).await {
        if let Err(e) = session.evict(connection.id(), reason).await {
            debug!(error = %e, "eviction not delivered");
        }
    }
    connection.close();

    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    info!(
        duration_secs = started.elapsed().as_secs(),
        "socket closed"
    );
}

/// Forward inbound frames until the peer leaves or the connection is evicted.
///
/// `None` means the connection was already evicted elsewhere.
async fn read_loop(
    stream: &mut SplitStream<WebSocket>,
    connection: &Connection,
    session: &SessionHandle,
) -> Option<EvictReason> {
    let cancel = connection.cancel_token();
    loop {
        let msg = tokio::select! {
            () = cancel.cancelled() => return None,
            msg = stream.next() => msg,
        };

        let text = match msg {
            None | Some(Ok(Message::Close(_))) => {
                debug!("peer closed");
                return Some(EvictReason::Closed);
            }
            Some(Err(e)) => {
                debug!(error = %e, "socket read failed");
                return Some(EvictReason::TransportError);
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                connection.mark_alive();
                continue;
            }
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => text.to_owned(),
                Err(_) => {
                    connection.mark_alive();
                    counter!(WS_FRAMES_IGNORED_TOTAL).increment(1);
                    debug!(len = data.len(), "non-UTF-8 binary frame ignored");
                    continue;
                }
            },
        };

        connection.mark_alive();
        counter!(WS_FRAMES_RECEIVED_TOTAL).increment(1);
        if session.submit(connection.id(), text).await.is_err() {
            debug!("session service gone");
            return None;
        }
    }
}

/// Drain the outbound queue to the socket and keep the peer pinged.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Frame>,
    connection: Arc<Connection>,
    session: SessionHandle,
    policy: HeartbeatPolicy,
) {
    let cancel = connection.cancel_token();
    let mut ping = tokio::time::interval(policy.interval);
    // The first tick completes immediately.
    let _ = ping.tick().await;

    let failure = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break None;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break None };
                if sink.send(Message::Text((&*frame).into())).await.is_err() {
                    break Some(EvictReason::TransportError);
                }
            }
            _ = ping.tick() => {
                if heartbeat::probe(&connection, policy.timeout) == Liveness::Dead {
                    warn!(
                        silent_secs = connection.last_seen_elapsed().as_secs(),
                        "peer unresponsive"
                    );
                    break Some(EvictReason::HeartbeatTimeout);
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break Some(EvictReason::TransportError);
                }
            }
        }
    };

    if let Some(reason) = failure {
        if let Err(e) = session.evict(connection.id(), reason).await {
            debug!(error = %e, "eviction not delivered");
        }
        let _ = sink.close().await;
    }
}
