//! Connection acceptance: a fixed-size worker pool fed by a bounded queue of
//! accepted connections. When all workers are busy and the queue is full, the
//! acceptor waits on the queue; overflow connections are never served on the
//! accept path itself.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc, watch};

use crate::config::PoolConfig;
use crate::session::handle_session;
use crate::state::StateCommand;

type ConnectionQueue = Arc<Mutex<mpsc::Receiver<(TcpStream, SocketAddr)>>>;

/// Accepts connections until the shutdown flag is raised, then drains the
/// worker pool. Dropping the listener on return closes the listening socket.
pub async fn run_acceptor(
    listener: TcpListener,
    pool: &PoolConfig,
    state_tx: mpsc::Sender<StateCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (conn_tx, conn_rx) = mpsc::channel::<(TcpStream, SocketAddr)>(pool.queue_depth.max(1));
    let conn_rx: ConnectionQueue = Arc::new(Mutex::new(conn_rx));

    let mut workers = Vec::with_capacity(pool.workers);
    for worker_id in 0..pool.workers.max(1) {
        workers.push(tokio::spawn(connection_worker(
            worker_id,
            conn_rx.clone(),
            state_tx.clone(),
        )));
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, addr)) => {
                        debug!("new connection from {addr}");
                        if conn_tx.send((socket, addr)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("error accepting connection: {e}");
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                info!("acceptor stopping");
                break;
            }
        }
    }

    // Closing the queue lets idle workers exit. Busy workers finish their
    // current session first; at shutdown those sessions end as soon as the
    // state actor destroys their client state.
    drop(conn_tx);
    for worker in workers {
        let _ = worker.await;
    }
}

/// One pool worker: pulls the next accepted connection and serves it to
/// completion before taking another.
async fn connection_worker(
    worker_id: usize,
    conn_rx: ConnectionQueue,
    state_tx: mpsc::Sender<StateCommand>,
) {
    loop {
        let next = {
            let mut rx = conn_rx.lock().await;
            rx.recv().await
        };
        let Some((socket, addr)) = next else {
            break;
        };
        debug!("[worker {worker_id}] serving {addr}");
        handle_session(socket, addr, state_tx.clone()).await;
    }
}
