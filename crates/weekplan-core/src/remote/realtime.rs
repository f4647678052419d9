//! Realtime change subscription
//!
//! Keeps one websocket open to the realtime endpoint, joins the user's task
//! channel and forwards row changes. The connection is not re-established
//! after it drops; the consumer sees a terminal `Closed` event instead.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::error::{RemoteError, RemoteResult};
use super::message::{task_topic, Frame, ServerEvent};
use super::{ChangeEvent, ChangeStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for the join reply
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between keep-alive frames
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Buffered change events before the socket task waits on the consumer
const EVENT_BUFFER: usize = 64;

/// Open a subscription on a background task
pub(crate) fn subscribe(url: String, user_id: &str, access_token: String) -> ChangeStream {
    let (event_tx, stream) = ChangeStream::channel(EVENT_BUFFER);
    let topic = task_topic(user_id);
    let user_id = user_id.to_string();

    let task = tokio::spawn(async move {
        let error = match run_subscription(&url, &topic, &user_id, &access_token, &event_tx).await
        {
            Ok(()) => None,
            Err(e) => {
                warn!("Realtime subscription for {} ended: {}", topic, e);
                Some(e.to_string())
            }
        };
        let _ = event_tx.send(ChangeEvent::Closed { error }).await;
    });

    stream.with_task(task)
}

/// Connect, join, then forward changes until the channel ends
async fn run_subscription(
    url: &str,
    topic: &str,
    user_id: &str,
    access_token: &str,
    event_tx: &mpsc::Sender<ChangeEvent>,
) -> RemoteResult<()> {
    debug!("Connecting to realtime endpoint");
    let (ws_stream, _response) = tokio::time::timeout(JOIN_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| RemoteError::Network("Timed out connecting to realtime endpoint".into()))??;
    let (mut write, mut read) = ws_stream.split();

    let mut next_ref: u64 = 1;
    let join_ref = next_ref;
    send_frame(&mut write, &Frame::join(topic, user_id, access_token, join_ref)).await?;
    next_ref += 1;

    wait_for_join(&mut read, join_ref).await?;
    info!("Subscribed to {}", topic);

    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                send_frame(&mut write, &Frame::heartbeat(next_ref)).await?;
                next_ref += 1;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ServerEvent::decode(&text) {
                        Ok(ServerEvent::Change { kind, task_id }) => {
                            debug!("Remote change {:?} for task {:?}", kind, task_id);
                            if event_tx.send(ChangeEvent::Changed { kind, task_id }).await.is_err() {
                                // Consumer went away
                                write.close().await.ok();
                                return Ok(());
                            }
                        }
                        Ok(ServerEvent::Error(details)) => {
                            return Err(RemoteError::Subscription(details));
                        }
                        Ok(ServerEvent::Close) => {
                            write.close().await.ok();
                            return Ok(());
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!("Ignoring undecodable realtime frame: {}", e);
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
}

/// Wait for the reply to our join frame
async fn wait_for_join(read: &mut SplitStream<Socket>, join_ref: u64) -> RemoteResult<()> {
    let join_ref = join_ref.to_string();
    let deadline = tokio::time::Instant::now() + JOIN_TIMEOUT;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(RemoteError::Subscription(
                "Timed out waiting for join reply".to_string(),
            ));
        }

        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ServerEvent::Reply { reference, ok, response }) = ServerEvent::decode(&text) {
                            if reference.as_deref() != Some(join_ref.as_str()) {
                                continue;
                            }
                            if ok {
                                return Ok(());
                            }
                            return Err(RemoteError::Subscription(response.to_string()));
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(RemoteError::Subscription(
                            "Connection closed during join".to_string(),
                        ));
                    }
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
            _ = tokio::time::sleep(remaining) => {
                return Err(RemoteError::Subscription(
                    "Timed out waiting for join reply".to_string(),
                ));
            }
        }
    }
}

async fn send_frame(write: &mut SplitSink<Socket, Message>, frame: &Frame) -> RemoteResult<()> {
    let text = frame
        .encode()
        .map_err(|e| RemoteError::Decode(e.to_string()))?;
    write.send(Message::Text(text)).await?;
    Ok(())
}
