//! Event fan-out. The membership snapshot is taken from the directory, the
//! event is serialized once, and delivery goes through each member's outbound
//! channel: the state actor never blocks on a socket write.

use log::{debug, error};

use crate::directory::ChannelDirectory;
use crate::protocol::{Event, ServerFrame};
use crate::registry::{ClientId, ClientRegistry};

/// Delivers `event` to every member of `channel`, excluding `exclude`.
/// Returns the members whose outbound channel rejected the frame; each one is
/// an implicit disconnect the caller must clean up. A failed member never
/// aborts delivery to the rest.
pub fn broadcast_event(
    registry: &ClientRegistry,
    directory: &ChannelDirectory,
    channel: &str,
    event: Event,
    exclude: Option<ClientId>,
) -> Vec<ClientId> {
    let members = directory.member_snapshot(channel);
    if members.is_empty() {
        return Vec::new();
    }

    let line = ServerFrame::Event(event).to_line();
    let mut dropped = Vec::new();

    for id in members {
        if exclude == Some(id) {
            continue;
        }
        let Some(client) = registry.get(id) else {
            continue;
        };
        if client.tx_outbound.try_send(line.clone()).is_err() {
            error!("[{id}] outbound channel gone, treating as disconnect");
            dropped.push(id);
        }
    }

    debug!("broadcast to {channel}: {}", line.trim_end());
    dropped
}

/// Sends one frame to a single client. Delivery failures are left to the
/// connection's own cleanup path.
pub fn send_to_client(registry: &ClientRegistry, id: ClientId, frame: &ServerFrame) {
    if let Some(client) = registry.get(id) {
        let _ = client.tx_outbound.try_send(frame.to_line());
    }
}
