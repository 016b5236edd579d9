//! Server assembly: bind the listener, spawn the state actor, the inactivity
//! monitor, the signal forwarder and the acceptor pool, then wait for the
//! whole thing to wind down.

use std::net::SocketAddr;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use crate::acceptor::run_acceptor;
use crate::config::Config;
use crate::errors::ServerError;
use crate::monitor::run_inactivity_monitor;
use crate::state::{STATE_CHANNEL_SIZE, ServerState, ShutdownReason, StateCommand};

pub struct Server {
    listener: TcpListener,
    config: Config,
}

/// Binds the listening socket. A failure here is a startup error: the caller
/// exits with status 1 without ever entering the accept loop.
pub async fn bind(config: Config) -> Result<Server, ServerError> {
    let addr = format!("{}:{}", config.network.bind_address, config.network.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Startup { addr, source })?;
    Ok(Server { listener, config })
}

impl Server {
    /// The actually-bound address; with port 0 this is where the ephemeral
    /// port landed.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs until graceful shutdown completes (termination signal or
    /// inactivity timeout). All connections are gone when this returns.
    pub async fn run(self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = mpsc::channel(STATE_CHANNEL_SIZE);

        let state = ServerState::new(self.config.clone(), shutdown_tx);
        let actor = tokio::spawn(state.run(state_rx));

        let monitor = tokio::spawn(run_inactivity_monitor(
            self.config.idle.poll_interval(),
            state_tx.clone(),
        ));

        let signal_tx = state_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received shutdown signal");
                    let _ = signal_tx
                        .send(StateCommand::Shutdown {
                            reason: ShutdownReason::Signal,
                        })
                        .await;
                }
                Err(e) => error!("failed to listen for shutdown signal: {e}"),
            }
        });

        run_acceptor(self.listener, &self.config.pool, state_tx, shutdown_rx).await;

        let _ = actor.await;
        monitor.abort();
        let _ = monitor.await;
    }
}
