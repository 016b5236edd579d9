//! The state actor: sole owner of the client registry and channel directory.
//! Every structural mutation arrives as one `StateCommand` over an mpsc
//! channel and is handled serially, so compound check-then-mutate sequences
//! are atomic without any lock. Shutdown is just one more command on the same
//! channel, whether it comes from a signal, the inactivity monitor, or a
//! test.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use log::{error, info};
use tokio::sync::{mpsc, watch};

use crate::broadcast::broadcast_event;
use crate::config::Config;
use crate::directory::ChannelDirectory;
use crate::processor;
use crate::protocol::{Event, ServerFrame};
use crate::registry::{ClientId, ClientInfo, ClientRegistry};

pub const STATE_CHANNEL_SIZE: usize = 256;

#[derive(Debug)]
pub enum StateCommand {
    /// A connection was accepted; register its state and outbound channel.
    Connect {
        id: ClientId,
        addr: SocketAddr,
        tx_outbound: mpsc::Sender<String>,
    },
    /// One non-empty frame read from the connection.
    Line { id: ClientId, line: String },
    /// The connection's read loop ended; run full cleanup.
    Disconnect { id: ClientId },
    /// Periodic sample from the inactivity monitor.
    IdleTick,
    /// Graceful shutdown request.
    Shutdown { reason: ShutdownReason },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShutdownReason {
    Signal,
    Inactive,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal => write!(f, "termination signal"),
            ShutdownReason::Inactive => write!(f, "inactivity timeout"),
        }
    }
}

pub struct ServerState {
    registry: ClientRegistry,
    directory: ChannelDirectory,
    config: Config,
    last_activity: Instant,
    shutdown_tx: watch::Sender<bool>,
}

impl ServerState {
    pub fn new(config: Config, shutdown_tx: watch::Sender<bool>) -> Self {
        ServerState {
            registry: ClientRegistry::new(),
            directory: ChannelDirectory::new(),
            config,
            last_activity: Instant::now(),
            shutdown_tx,
        }
    }

    /// Runs until a shutdown command is handled or every command sender is
    /// gone. Shutdown destroys all client state, which closes every session's
    /// outbound channel and ends it, and raises the flag the acceptor watches.
    pub async fn run(mut self, mut rx: mpsc::Receiver<StateCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                StateCommand::Connect {
                    id,
                    addr,
                    tx_outbound,
                } => {
                    info!("[{id}] client connected: {addr}");
                    self.registry.insert(ClientInfo::new(id, addr, tx_outbound));
                    self.last_activity = Instant::now();
                }
                StateCommand::Line { id, line } => {
                    self.last_activity = Instant::now();
                    if let Some(client) = self.registry.get_mut(id) {
                        client.touch();
                    }
                    let result = processor::process_line(
                        &mut self.registry,
                        &mut self.directory,
                        &self.config.limits,
                        id,
                        &line,
                    );
                    if result.disconnect {
                        self.cleanup_client(id);
                    }
                    self.cleanup_dropped(result.dropped);
                }
                StateCommand::Disconnect { id } => {
                    self.cleanup_client(id);
                    self.last_activity = Instant::now();
                }
                StateCommand::IdleTick => {
                    if self.registry.is_empty()
                        && self.last_activity.elapsed() >= self.config.idle.shutdown_after()
                    {
                        info!(
                            "no clients connected for {}s, shutting down",
                            self.config.idle.shutdown_after_secs
                        );
                        self.graceful_shutdown(ShutdownReason::Inactive);
                        break;
                    }
                }
                StateCommand::Shutdown { reason } => {
                    self.graceful_shutdown(reason);
                    break;
                }
            }
        }
    }

    /// Full disconnect cleanup: remove the connection from every channel it
    /// belongs to (notifying the remaining members), then destroy its state.
    /// Dropping the state closes the outbound channel, which ends the
    /// connection's writer task and closes the transport.
    fn cleanup_client(&mut self, id: ClientId) {
        let Some(mut info) = self.registry.remove(id) else {
            return;
        };
        let nickname = info.display_name().to_owned();
        let mut channels: Vec<String> = info.channels.drain().collect();
        channels.sort();

        let mut dropped = Vec::new();
        for channel in &channels {
            self.directory.remove_member(channel, id);
            dropped.extend(broadcast_event(
                &self.registry,
                &self.directory,
                channel,
                Event::UserLeft {
                    nickname: nickname.clone(),
                    channel: channel.clone(),
                },
                None,
            ));
        }
        info!("[{id}] client {nickname} disconnected");
        self.cleanup_dropped(dropped);
    }

    /// Cleans up members whose outbound channel failed during a fan-out.
    /// Each cleanup broadcasts `user_left` itself, which can surface further
    /// failures; keep going until none remain.
    fn cleanup_dropped(&mut self, mut dropped: Vec<ClientId>) {
        while let Some(id) = dropped.pop() {
            if self.registry.get(id).is_none() {
                continue;
            }
            error!("[{id}] write failed, disconnecting");
            self.cleanup_client(id);
        }
    }

    /// Best-effort shutdown notice to every connected client, then full
    /// cleanup for each, then the shutdown flag that stops the acceptor.
    fn graceful_shutdown(&mut self, reason: ShutdownReason) {
        info!("shutting down gracefully ({reason})");
        let notice = ServerFrame::success("Server is shutting down. Goodbye!").to_line();
        for id in self.registry.ids() {
            if let Some(client) = self.registry.get(id) {
                let _ = client.tx_outbound.try_send(notice.clone());
            }
        }
        for id in self.registry.ids() {
            self.cleanup_client(id);
        }
        let _ = self.shutdown_tx.send(true);
        info!("server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::{Duration, timeout};

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn spawn_actor() -> (
        mpsc::Sender<StateCommand>,
        watch::Receiver<bool>,
        tokio::task::JoinHandle<()>,
    ) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(STATE_CHANNEL_SIZE);
        let state = ServerState::new(Config::default(), shutdown_tx);
        let handle = tokio::spawn(state.run(rx));
        (tx, shutdown_rx, handle)
    }

    async fn connect(
        tx: &mpsc::Sender<StateCommand>,
        id: ClientId,
    ) -> mpsc::Receiver<String> {
        let (tx_outbound, rx_outbound) = mpsc::channel(32);
        tx.send(StateCommand::Connect {
            id,
            addr: addr(),
            tx_outbound,
        })
        .await
        .unwrap();
        rx_outbound
    }

    async fn next_frame(rx: &mut mpsc::Receiver<String>) -> Value {
        let line = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("frame within 1s")
            .expect("channel open");
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn shutdown_notifies_and_disconnects_everyone() {
        let (tx, shutdown_rx, handle) = spawn_actor().await;
        let mut rx1 = connect(&tx, 1).await;

        tx.send(StateCommand::Shutdown {
            reason: ShutdownReason::Signal,
        })
        .await
        .unwrap();
        handle.await.unwrap();

        let frame = next_frame(&mut rx1).await;
        assert_eq!(frame["success"], true);
        assert_eq!(frame["message"], "Server is shutting down. Goodbye!");
        // State destroyed: the outbound channel is closed behind the notice.
        assert_eq!(rx1.try_recv(), Err(TryRecvError::Disconnected));
        assert!(*shutdown_rx.borrow(), "shutdown flag raised");
    }

    #[tokio::test]
    async fn disconnect_cleanup_notifies_channel_members() {
        let (tx, _shutdown_rx, _handle) = spawn_actor().await;
        let mut rx1 = connect(&tx, 1).await;
        let mut rx2 = connect(&tx, 2).await;

        for id in [1, 2] {
            tx.send(StateCommand::Line {
                id,
                line: "/join".to_owned(),
            })
            .await
            .unwrap();
        }
        let _ = next_frame(&mut rx1).await; // join response
        let _ = next_frame(&mut rx1).await; // user_joined for client 2
        let _ = next_frame(&mut rx2).await; // join response

        tx.send(StateCommand::Disconnect { id: 2 }).await.unwrap();
        let frame = next_frame(&mut rx1).await;
        assert_eq!(frame["event"], "user_left");
        assert_eq!(frame["channel"], "#general");
    }

    #[tokio::test]
    async fn quit_line_runs_full_cleanup() {
        let (tx, _shutdown_rx, _handle) = spawn_actor().await;
        let mut rx1 = connect(&tx, 1).await;
        tx.send(StateCommand::Line {
            id: 1,
            line: "/quit".to_owned(),
        })
        .await
        .unwrap();

        let frame = next_frame(&mut rx1).await;
        assert_eq!(frame["message"], "Goodbye!");
        // Cleanup dropped the client state, closing the outbound channel.
        assert!(
            timeout(Duration::from_secs(1), rx1.recv())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn idle_tick_ignores_active_registry() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(STATE_CHANNEL_SIZE);
        let mut config = Config::default();
        config.idle.shutdown_after_secs = 0; // expire immediately when empty
        let state = ServerState::new(config, shutdown_tx);
        let handle = tokio::spawn(state.run(rx));

        let _rx1 = connect(&tx, 1).await;
        tx.send(StateCommand::IdleTick).await.unwrap();
        tx.send(StateCommand::Disconnect { id: 1 }).await.unwrap();
        assert!(!*shutdown_rx.borrow(), "one client connected, no shutdown");

        // Registry now empty and the window (zero) has elapsed.
        tx.send(StateCommand::IdleTick).await.unwrap();
        handle.await.unwrap();
        assert!(*shutdown_rx.borrow());
    }
}
