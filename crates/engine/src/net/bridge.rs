//! Transport thread: owns the socket, the HTTP client and a current-thread
//! tokio runtime. The render thread only ever sees fully decoded
//! [`TransportEvent`]s, pulled without blocking through [`TransportHandle::poll`].

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::app::{decode_sprite, load_sprite_file, LoadedSprite, SpriteError, SpriteRole};
use crate::config::{SpriteSource, ViewerConfig};

use super::protocol::{decode_message, decode_snapshot, InboundMessage, ViewRequest};

const TRANSPORT_THREAD_NAME: &str = "worldview-transport";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build transport runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("failed to spawn transport thread: {0}")]
    SpawnThread(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Stream,
    Fallback,
}

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    Error { message: String },
    Message {
        message: InboundMessage,
        origin: MessageOrigin,
    },
    SpriteLoaded {
        role: SpriteRole,
        sprite: Arc<LoadedSprite>,
    },
}

impl TransportEvent {
    fn kind(&self) -> &'static str {
        match self {
            TransportEvent::Connected => "connected",
            TransportEvent::Disconnected { .. } => "disconnected",
            TransportEvent::Error { .. } => "error",
            TransportEvent::Message { message, .. } => message.kind(),
            TransportEvent::SpriteLoaded { .. } => "sprite_loaded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    View(ViewRequest),
    Shutdown,
}

/// Destination for outbound view subscriptions.
pub trait ViewSink {
    /// Returns `false` when the view was dropped instead of sent.
    fn send_viewport(&mut self, view: ViewRequest) -> bool;
}

/// Sending half of the event channel. A full channel evicts its oldest
/// event so the newest snapshot always reaches the render thread.
#[derive(Debug, Clone)]
struct EventSink {
    tx: Sender<TransportEvent>,
    evict: Receiver<TransportEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    fn emit(&self, event: TransportEvent) {
        let mut pending = event;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(event)) => {
                    if let Ok(oldest) = self.evict.try_recv() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(kind = oldest.kind(), "transport_event_dropped_channel_full");
                    }
                    pending = event;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

pub struct TransportHandle {
    events: Receiver<TransportEvent>,
    commands: UnboundedSender<TransportCommand>,
    connected: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    thread: Option<thread::JoinHandle<()>>,
}

impl TransportHandle {
    /// Drains pending events without blocking.
    pub fn poll(&self) -> Vec<TransportEvent> {
        self.events.try_iter().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Events discarded because the channel was full, since the last call.
    pub fn take_dropped_events(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.commands.send(TransportCommand::Shutdown);
        if thread.join().is_err() {
            warn!("transport_thread_panicked");
        }
        self.connected.store(false, Ordering::Release);
        info!("transport_stopped");
    }
}

impl ViewSink for TransportHandle {
    fn send_viewport(&mut self, view: ViewRequest) -> bool {
        if !self.is_connected() {
            debug!(?view, "view_dropped_not_connected");
            return false;
        }
        self.commands.send(TransportCommand::View(view)).is_ok()
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn spawn_transport(config: &ViewerConfig) -> Result<TransportHandle, TransportError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(TransportError::Runtime)?;
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(TransportError::HttpClient)?;

    let (event_tx, event_rx) = crossbeam_channel::bounded(config.event_buffer.max(1));
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let connected = Arc::new(AtomicBool::new(false));
    let dropped = Arc::new(AtomicU64::new(0));
    let sink = EventSink {
        tx: event_tx,
        evict: event_rx.clone(),
        dropped: Arc::clone(&dropped),
    };
    let config = config.clone();
    let thread_connected = Arc::clone(&connected);

    let thread = thread::Builder::new()
        .name(TRANSPORT_THREAD_NAME.to_string())
        .spawn(move || {
            runtime.block_on(run_transport(config, http, sink, command_rx, thread_connected));
        })
        .map_err(TransportError::SpawnThread)?;

    Ok(TransportHandle {
        events: event_rx,
        commands: command_tx,
        connected,
        dropped,
        thread: Some(thread),
    })
}

async fn run_transport(
    config: ViewerConfig,
    http: reqwest::Client,
    sink: EventSink,
    mut commands: UnboundedReceiver<TransportCommand>,
    connected: Arc<AtomicBool>,
) {
    // Side fetches live on the same runtime and are cancelled when it drops.
    tokio::spawn(load_sprites(
        http.clone(),
        config.sprite_source.clone(),
        sink.clone(),
    ));
    if config.fallback_fetch {
        tokio::spawn(fetch_fallback_snapshot(
            http,
            config.snapshot_url.clone(),
            sink.clone(),
        ));
    }

    run_stream(&config.stream_url, &sink, &mut commands, &connected).await;
    connected.store(false, Ordering::Release);
    // Keep the runtime alive for the side fetches until the owner shuts down.
    wait_for_shutdown(&mut commands).await;
}

async fn run_stream(
    url: &str,
    sink: &EventSink,
    commands: &mut UnboundedReceiver<TransportCommand>,
    connected: &AtomicBool,
) {
    info!(url = %url, "transport_connecting");
    let connect = tokio::select! {
        result = tokio_tungstenite::connect_async(url) => result,
        _ = wait_for_shutdown(commands) => return,
    };
    let socket = match connect {
        Ok((socket, _response)) => socket,
        Err(error) => {
            warn!(url = %url, error = %error, "transport_connect_failed");
            sink.emit(TransportEvent::Error {
                message: error.to_string(),
            });
            return;
        }
    };

    connected.store(true, Ordering::Release);
    info!(url = %url, "transport_connected");
    sink.emit(TransportEvent::Connected);

    let (mut write, mut read) = socket.split();
    let reason = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => forward_text(&text, sink),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => forward_text(&text, sink),
                    Err(error) => warn!(error = %error, "transport_binary_frame_not_utf8"),
                },
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|frame| format!("{} {}", frame.code, frame.reason))
                        .unwrap_or_else(|| "closed".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(error = %error, "transport_socket_error");
                    sink.emit(TransportEvent::Error {
                        message: error.to_string(),
                    });
                    break error.to_string();
                }
                None => break "stream ended".to_string(),
            },
            command = commands.recv() => match command {
                Some(TransportCommand::View(view)) => {
                    debug!(x = view.x, y = view.y, w = view.w, h = view.h, "view_sent");
                    if let Err(error) = write.send(Message::Text(view.to_json())).await {
                        warn!(error = %error, "view_send_failed");
                    }
                }
                Some(TransportCommand::Shutdown) | None => {
                    connected.store(false, Ordering::Release);
                    let _ = write.send(Message::Close(None)).await;
                    info!("transport_closed_by_viewer");
                    return;
                }
            },
        }
    };

    connected.store(false, Ordering::Release);
    info!(reason = %reason, "transport_disconnected");
    sink.emit(TransportEvent::Disconnected { reason });
}

async fn wait_for_shutdown(commands: &mut UnboundedReceiver<TransportCommand>) {
    while let Some(command) = commands.recv().await {
        if command == TransportCommand::Shutdown {
            return;
        }
    }
}

fn forward_text(text: &str, sink: &EventSink) {
    match decode_message(text) {
        Ok(message) => sink.emit(TransportEvent::Message {
            message,
            origin: MessageOrigin::Stream,
        }),
        Err(error) => warn!(error = %error, bytes = text.len(), "transport_message_dropped"),
    }
}

async fn fetch_fallback_snapshot(http: reqwest::Client, url: String, sink: EventSink) {
    let body = match fetch_json(&http, &url).await {
        Ok(body) => body,
        Err(error) => {
            warn!(url = %url, error = %error, "fallback_fetch_failed");
            return;
        }
    };
    match decode_snapshot(body) {
        Ok(snapshot) => {
            info!(url = %url, "fallback_snapshot_loaded");
            sink.emit(TransportEvent::Message {
                message: InboundMessage::Snapshot(Arc::new(snapshot)),
                origin: MessageOrigin::Fallback,
            });
        }
        Err(error) => warn!(url = %url, error = %error, "fallback_snapshot_invalid"),
    }
}

async fn fetch_json(http: &reqwest::Client, url: &str) -> Result<Value, reqwest::Error> {
    http.get(url).send().await?.error_for_status()?.json().await
}

async fn load_sprites(http: reqwest::Client, source: SpriteSource, sink: EventSink) {
    for role in SpriteRole::ALL {
        let result = match &source {
            SpriteSource::Remote(base) => fetch_sprite(&http, base, role).await,
            SpriteSource::Directory(dir) => load_sprite_file(&dir.join(role.file_name())),
        };
        match result {
            Ok(sprite) => {
                debug!(?role, width = sprite.width(), height = sprite.height(), "sprite_loaded");
                sink.emit(TransportEvent::SpriteLoaded {
                    role,
                    sprite: Arc::new(sprite),
                });
            }
            Err(error) => warn!(?role, error = %error, "sprite_load_failed_using_placeholder"),
        }
    }
}

async fn fetch_sprite(
    http: &reqwest::Client,
    base: &str,
    role: SpriteRole,
) -> Result<LoadedSprite, SpriteError> {
    let url = format!("{base}{}", role.file_name());
    let fetch_error = |source| SpriteError::Fetch {
        url: url.clone(),
        source,
    };
    let response = http
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(fetch_error)?;
    let bytes = response.bytes().await.map_err(fetch_error)?;
    decode_sprite(&bytes)
}
