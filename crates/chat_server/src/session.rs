//! Per-connection handling: a read loop that frames newline-delimited lines
//! for the state actor, and a writer loop that owns the write half. The two
//! halves only meet through the actor, so a slow socket never stalls state
//! mutations.

use log::{debug, error, info};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::registry::{ClientId, next_client_id};
use crate::state::StateCommand;

// Per-connection outbound queue. A client that stops draining it for this
// many frames is treated as disconnected by the broadcast path.
pub const OUTBOUND_CHANNEL_SIZE: usize = 32;

/// Drives one connection from accept to disconnect.
///
/// The session ends when either half finishes: the reader on a zero-length
/// read or I/O error, the writer once the actor destroys this client's state
/// (quit, broadcast failure, server shutdown) and thereby closes the outbound
/// channel. Returning drops the socket, which closes the transport.
pub async fn handle_session(
    socket: TcpStream,
    addr: std::net::SocketAddr,
    state_tx: mpsc::Sender<StateCommand>,
) {
    let id = next_client_id();
    let (tx_outbound, rx_outbound) = mpsc::channel::<String>(OUTBOUND_CHANNEL_SIZE);

    if state_tx
        .send(StateCommand::Connect {
            id,
            addr,
            tx_outbound,
        })
        .await
        .is_err()
    {
        // Actor already gone: the server is past shutdown.
        return;
    }

    let (read_half, write_half) = io::split(socket);
    tokio::select! {
        () = client_reader_task(read_half, id, &state_tx) => {}
        () = client_writer_task(write_half, id, rx_outbound) => {}
    }

    // Ask the actor to clean up; idempotent if it already ran cleanup and
    // closed the outbound channel.
    let _ = state_tx.send(StateCommand::Disconnect { id }).await;
}

/// Reads newline-delimited frames and forwards each non-empty one to the
/// state actor. A zero-length read or I/O error ends the loop.
async fn client_reader_task(
    reader: ReadHalf<TcpStream>,
    id: ClientId,
    state_tx: &mpsc::Sender<StateCommand>,
) {
    let mut buffered_reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match buffered_reader.read_line(&mut line).await {
            Ok(0) => {
                info!("[{id}] client disconnected");
                break;
            }
            Err(e) => {
                error!("[{id}] read error: {e}");
                break;
            }
            Ok(_) => {
                let frame = line.trim();
                if frame.is_empty() {
                    continue;
                }
                debug!(">> incoming [{id}] # {frame}");
                let command = StateCommand::Line {
                    id,
                    line: frame.to_owned(),
                };
                if state_tx.send(command).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Owns the write half: drains the outbound queue onto the socket, then
/// flushes the transport. A write failure is this connection's problem
/// alone; ending the loop lets the session run disconnect cleanup.
async fn client_writer_task(
    mut writer: WriteHalf<TcpStream>,
    id: ClientId,
    mut rx_outbound: mpsc::Receiver<String>,
) {
    while let Some(line) = rx_outbound.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!("[{id}] failed to write frame: {e}");
            return;
        }
    }
    // Outbound channel closed: the client's state is gone. Flush and send
    // FIN before the session drops the socket.
    let _ = writer.shutdown().await;
}
