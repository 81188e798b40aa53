//! Player service: the controller's executor
//!
//! The [`SessionController`] runs as an actor on a dedicated thread with a
//! current-thread tokio runtime. One `select!` loop serializes:
//!
//! - commands from transports ([`PlayerHandle`]), each answered on a oneshot
//! - events posted by playback sessions from their worker threads
//! - the status throttle timer, armed only on the broadcaster's
//!   not-pending to pending edge
//!
//! Dropping every handle, or [`PlayerHandle::shutdown`], stops the active
//! session and ends the thread.

use crate::audio::sink::AudioBackend;
use crate::config::Config;
use crate::controller::session_controller::{RequestOutcome, SessionController};
use crate::error::{Error, Result};
use crate::playback::events::SessionEventReceiver;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info};
use wavplayer_common::StatusSnapshot;

/// Commands queued to the service
const COMMAND_CHANNEL_CAPACITY: usize = 32;

enum Command {
    NewSong {
        file_id: String,
        start_offset_ms: i64,
        reply: oneshot::Sender<RequestOutcome>,
    },
    Stop {
        reply: oneshot::Sender<RequestOutcome>,
    },
    CurrentStatus {
        reply: oneshot::Sender<Option<StatusSnapshot>>,
    },
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<StatusSnapshot>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable client of the player service
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<Command>,
}

impl PlayerHandle {
    /// Play `file_id` from `start_offset_ms` (negative: in the future)
    pub async fn new_song_request(&self, file_id: impl Into<String>, start_offset_ms: i64) -> Result<RequestOutcome> {
        let file_id = file_id.into();
        self.request(|reply| Command::NewSong {
            file_id,
            start_offset_ms,
            reply,
        })
        .await
    }

    pub async fn stop_play_request(&self) -> Result<RequestOutcome> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Last broadcast status (or the pending one before the first broadcast)
    pub async fn current_status(&self) -> Result<Option<StatusSnapshot>> {
        self.request(|reply| Command::CurrentStatus { reply }).await
    }

    /// Receive every status broadcast from now on
    pub async fn subscribe_status(&self) -> Result<broadcast::Receiver<StatusSnapshot>> {
        self.request(|reply| Command::Subscribe { reply }).await
    }

    /// Stop the active session and end the service.
    ///
    /// Calling it on a service that already ended is not an error.
    pub async fn shutdown(&self) -> Result<()> {
        match self.request(|reply| Command::Shutdown { reply }).await {
            Ok(()) | Err(Error::Internal(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| Error::Internal("player service is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Internal("player service dropped the request".to_string()))
    }
}

/// Controller actor state
pub struct PlayerService {
    controller: SessionController,
    commands: mpsc::Receiver<Command>,
    events: SessionEventReceiver,
    throttle: Duration,
}

impl PlayerService {
    /// Build the controller from `config` and start the service thread.
    ///
    /// # Errors
    /// - `Config` if the audio directory is unusable
    /// - `Io` if the thread cannot be spawned
    pub fn spawn(backend: Arc<dyn AudioBackend>, config: &Config) -> Result<(PlayerHandle, JoinHandle<()>)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(
            backend,
            config.wav_dir.clone(),
            config.audio_device.clone(),
            config.playback,
            config.player_uuid.clone(),
            events_tx,
        )?;

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let service = PlayerService {
            controller,
            commands: commands_rx,
            events: events_rx,
            throttle: config.status.throttle(),
        };

        let thread = std::thread::Builder::new()
            .name("player-service".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to build player service runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(service.run());
            })?;

        Ok((PlayerHandle { commands: commands_tx }, thread))
    }

    async fn run(mut self) {
        info!(
            "Player service started (player uuid {}, status throttle {} ms)",
            self.controller.player_uuid(),
            self.throttle.as_millis()
        );

        let throttle_timer = tokio::time::sleep(self.throttle);
        tokio::pin!(throttle_timer);
        let mut armed = false;

        if self.controller.initialize() {
            throttle_timer.as_mut().reset(Instant::now() + self.throttle);
            armed = true;
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All player handles dropped");
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(event) = self.events.recv() => {
                    if self.controller.on_session_event(event) && !armed {
                        throttle_timer.as_mut().reset(Instant::now() + self.throttle);
                        armed = true;
                    }
                }
                () = &mut throttle_timer, if armed => {
                    armed = false;
                    self.controller.flush_status();
                }
            }
        }

        self.controller.shutdown();
        info!("Player service stopped");
    }

    /// Returns `false` when the service must stop
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::NewSong {
                file_id,
                start_offset_ms,
                reply,
            } => {
                let outcome = self.controller.new_song_request(&file_id, start_offset_ms);
                let _ = reply.send(outcome);
            }
            Command::Stop { reply } => {
                let outcome = self.controller.stop_play_request();
                let _ = reply.send(outcome);
            }
            Command::CurrentStatus { reply } => {
                let _ = reply.send(self.controller.current_status());
            }
            Command::Subscribe { reply } => {
                let _ = reply.send(self.controller.subscribe_status());
            }
            Command::Shutdown { reply } => {
                self.controller.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }
}
