use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use roster_config::shared::PushConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, Uri};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::auth::TokenVerifier;
use crate::concurrency::shutdown::{ShutdownRx, wait_for_shutdown};
use crate::error::{ErrorKind, RosterResult};
use crate::fanout::FanoutChannel;
use crate::roster_error;
use crate::types::PushFrame;

/// Query parameter carrying the bearer token.
const TOKEN_QUERY_PARAM: &str = "token";

/// How long a rejected peer gets to acknowledge the close frame.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// How long a peer has to complete the websocket upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type FrameSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Outcome of writing one message to a subscriber.
enum SendOutcome {
    Sent,
    Failed(WsError),
    /// Shutdown was requested while the write was pending.
    Interrupted,
}

/// Lifecycle of a push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// The websocket handshake is in progress.
    Connecting,
    /// The token was verified.
    Authenticated,
    /// Registered with the fan-out channel and receiving frames.
    Open,
    Closed,
}

impl SubscriberState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberState::Connecting => "connecting",
            SubscriberState::Authenticated => "authenticated",
            SubscriberState::Open => "open",
            SubscriberState::Closed => "closed",
        }
    }
}

fn transition(state: &mut SubscriberState, next: SubscriberState) {
    debug!(from = state.as_str(), to = next.as_str(), "push connection state changed");
    *state = next;
}

#[derive(Debug)]
struct ConnectionContext {
    channel: FanoutChannel,
    verifier: Arc<dyn TokenVerifier>,
    path: String,
}

/// Websocket listener serving the fan-out channel.
#[derive(Debug)]
pub struct PushServer {
    listener: TcpListener,
    context: Arc<ConnectionContext>,
}

impl PushServer {
    /// Binds the listener on `config.host:config.port`. Port 0 picks a free port.
    pub async fn bind(
        config: &PushConfig,
        channel: FanoutChannel,
        verifier: Arc<dyn TokenVerifier>,
    ) -> RosterResult<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;

        Ok(Self {
            listener,
            context: Arc::new(ConnectionContext {
                channel,
                verifier,
                path: config.path.clone(),
            }),
        })
    }

    pub fn local_addr(&self) -> RosterResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Spawns the accept loop.
    ///
    /// On shutdown the listener stops accepting and every open subscriber is sent a close
    /// frame before the returned handle resolves.
    pub fn start(self, shutdown_rx: ShutdownRx) -> PushServerHandle {
        let handle = tokio::spawn(self.serve(shutdown_rx));

        PushServerHandle { handle }
    }

    async fn serve(self, mut shutdown_rx: ShutdownRx) -> RosterResult<()> {
        info!(addr = ?self.listener.local_addr().ok(), path = %self.context.path, "push server started");

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown_rx) => break,

                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(err) = result {
                        warn!(error = %err, "push connection task failed");
                    }
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let span = info_span!("push_connection", %peer);
                        connections.spawn(
                            handle_connection(stream, self.context.clone(), shutdown_rx.clone())
                                .instrument(span),
                        );
                    }
                    Err(err) => warn!(error = %err, "accepting push connection failed"),
                },
            }
        }

        while let Some(result) = connections.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "push connection task failed");
            }
        }

        info!("push server stopped");

        Ok(())
    }
}

/// Handle to a running [`PushServer`].
#[derive(Debug)]
pub struct PushServerHandle {
    handle: JoinHandle<RosterResult<()>>,
}

impl PushServerHandle {
    /// Waits for the server to stop after shutdown was signaled.
    pub async fn wait(self) -> RosterResult<()> {
        self.handle.await.map_err(|err| {
            roster_error!(ErrorKind::PushServerPanic, "Push server panicked", err)
        })?
    }
}

async fn handle_connection(
    stream: TcpStream,
    context: Arc<ConnectionContext>,
    mut shutdown_rx: ShutdownRx,
) {
    let mut state = SubscriberState::Connecting;

    let mut request_uri: Option<Uri> = None;
    let callback = |request: &Request, response: Response| {
        if request.uri().path() != context.path {
            let mut error = ErrorResponse::new(Some("Not Found".to_string()));
            *error.status_mut() = StatusCode::NOT_FOUND;
            return Err(error);
        }

        request_uri = Some(request.uri().clone());
        Ok(response)
    };

    let handshake = tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        tokio_tungstenite::accept_hdr_async(stream, callback),
    );
    let mut ws = tokio::select! {
        biased;

        _ = wait_for_shutdown(&mut shutdown_rx) => {
            debug!("push handshake abandoned, server shutting down");
            return;
        }

        result = handshake => match result {
            Ok(Ok(ws)) => ws,
            Ok(Err(err)) => {
                debug!(error = %err, "push handshake failed");
                return;
            }
            Err(_) => {
                debug!("push handshake timed out");
                return;
            }
        },
    };

    let Some(token) = request_uri.as_ref().and_then(token_from_query) else {
        info!("push connection rejected, missing token");
        reject(&mut ws, "Unauthorized").await;
        transition(&mut state, SubscriberState::Closed);
        return;
    };

    let claims = match context.verifier.verify(&token) {
        Ok(claims) => claims,
        Err(err) => {
            info!(error = %err, "push connection rejected, invalid token");
            reject(&mut ws, "Invalid token").await;
            transition(&mut state, SubscriberState::Closed);
            return;
        }
    };
    transition(&mut state, SubscriberState::Authenticated);

    let username = claims.username.clone();
    let (subscriber_id, mut frames) = context.channel.register(claims);
    transition(&mut state, SubscriberState::Open);
    info!(subscriber_id, %username, "push subscriber connected");

    let (mut write, mut read) = ws.split();

    let connected = match serde_json::to_string(&PushFrame::Connected) {
        Ok(connected) => connected,
        Err(err) => {
            warn!(error = %err, "serializing connected frame failed");
            context.channel.remove(subscriber_id);
            return;
        }
    };

    match send_until_shutdown(&mut write, Message::Text(connected.into()), &mut shutdown_rx).await
    {
        SendOutcome::Sent => {}
        SendOutcome::Failed(err) => {
            debug!(error = %err, "sending connected frame failed");
            context.channel.remove(subscriber_id);
            transition(&mut state, SubscriberState::Closed);
            return;
        }
        SendOutcome::Interrupted => {
            close_going_away(&mut write).await;
            context.channel.remove(subscriber_id);
            transition(&mut state, SubscriberState::Closed);
            return;
        }
    }

    loop {
        tokio::select! {
            biased;

            _ = wait_for_shutdown(&mut shutdown_rx) => {
                close_going_away(&mut write).await;
                break;
            }

            frame = frames.recv() => match frame {
                Some(frame) => {
                    let message = Message::Text(frame.to_string().into());
                    match send_until_shutdown(&mut write, message, &mut shutdown_rx).await {
                        SendOutcome::Sent => {}
                        SendOutcome::Failed(err) => {
                            debug!(error = %err, "sending frame failed");
                            break;
                        }
                        SendOutcome::Interrupted => {
                            debug!(subscriber_id, "subscriber stalled during shutdown");
                            close_going_away(&mut write).await;
                            break;
                        }
                    }
                }
                // Removed from the registry.
                None => break,
            },

            message = read.next() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(error = %err, "reading from subscriber failed");
                    break;
                }
            },
        }
    }

    context.channel.remove(subscriber_id);
    transition(&mut state, SubscriberState::Closed);
    info!(subscriber_id, %username, "push subscriber disconnected");
}

/// Writes one message, giving up as soon as shutdown is requested.
///
/// A peer that stops reading fills the socket buffer and leaves the write pending forever.
async fn send_until_shutdown(
    write: &mut FrameSink,
    message: Message,
    shutdown_rx: &mut ShutdownRx,
) -> SendOutcome {
    tokio::select! {
        biased;

        _ = wait_for_shutdown(shutdown_rx) => SendOutcome::Interrupted,

        result = write.send(message) => match result {
            Ok(()) => SendOutcome::Sent,
            Err(err) => SendOutcome::Failed(err),
        },
    }
}

/// Sends a going-away close frame, bounded by the grace period.
async fn close_going_away(write: &mut FrameSink) {
    let frame = CloseFrame {
        code: CloseCode::Away,
        reason: "Server shutting down".to_string().into(),
    };

    match tokio::time::timeout(CLOSE_GRACE_PERIOD, write.send(Message::Close(Some(frame)))).await
    {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(error = %err, "sending close frame failed"),
        Err(_) => debug!("subscriber did not accept the close frame in time"),
    }
}

/// Closes the connection with a policy violation and waits briefly for the peer to answer.
async fn reject(ws: &mut WebSocketStream<TcpStream>, reason: &str) {
    let frame = CloseFrame {
        code: CloseCode::Policy,
        reason: reason.to_string().into(),
    };

    match tokio::time::timeout(CLOSE_GRACE_PERIOD, ws.close(Some(frame))).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            debug!(error = %err, "sending close frame failed");
            return;
        }
        Err(_) => {
            debug!("rejected peer did not accept the close frame in time");
            return;
        }
    }

    let _ = tokio::time::timeout(CLOSE_GRACE_PERIOD, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
}

fn token_from_query(uri: &Uri) -> Option<String> {
    let query = uri.query()?;

    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_read_from_the_query() {
        let uri: Uri = "/ws/notifications?foo=1&token=abc%2Edef".parse().unwrap();
        let empty: Uri = "/ws/notifications?token=".parse().unwrap();
        let missing: Uri = "/ws/notifications".parse().unwrap();

        assert_eq!(token_from_query(&uri).as_deref(), Some("abc.def"));
        assert_eq!(token_from_query(&empty), None);
        assert_eq!(token_from_query(&missing), None);
    }
}
