//! The command processor: decodes one frame, dispatches to the matching
//! handler, mutates registry and directory, and emits the direct response
//! plus any broadcasts. Runs inside the state actor, so every handler is one
//! atomic step with respect to all other connections.

use log::{debug, info};

use crate::broadcast::{broadcast_event, send_to_client};
use crate::commands::Command;
use crate::config::LimitsConfig;
use crate::directory::ChannelDirectory;
use crate::errors::CommandError;
use crate::protocol::{CommandEnvelope, Event, ServerFrame, unix_timestamp};
use crate::registry::{ClientId, ClientRegistry};

pub const HELP_TEXT: &str = "
=== CHAT SERVER HELP ===

Available Commands:
  /nick <nickname>     - Set your nickname
  /list                - List all channels and user counts
  /join [<channel>]    - Join a channel (default: #general)
  /leave [<channel>]   - Leave channel (or all channels if none specified)
  /quit                - Disconnect from server
  /help                - Show this help message

Examples:
  /nick alice          - Set nickname to 'alice'
  /join #general       - Join #general channel
  /join programming    - Join #programming channel (# added automatically)
  /leave #general      - Leave #general channel
  /leave               - Leave all channels
  Hello everyone!      - Send message to current channels

Tips:
  - Set a nickname before joining channels
  - You can be in multiple channels at once
  - Regular messages (without /) are sent to all your channels
";

/// What one processed frame did beyond its own responses.
#[derive(Debug, Default, PartialEq)]
pub struct ProcessResult {
    /// The sender asked to quit; the caller runs full disconnect cleanup.
    pub disconnect: bool,
    /// Members whose outbound channel failed during a broadcast: implicit
    /// disconnects the caller must clean up.
    pub dropped: Vec<ClientId>,
}

impl ProcessResult {
    fn dropped(dropped: Vec<ClientId>) -> Self {
        ProcessResult {
            disconnect: false,
            dropped,
        }
    }
}

/// Entry point for one non-empty frame from `id`.
///
/// A structured envelope with a non-empty `nickname` updates the stored
/// nickname before dispatch; a line that fails JSON decode is dispatched as a
/// bare command string with no nickname update.
pub fn process_line(
    registry: &mut ClientRegistry,
    directory: &mut ChannelDirectory,
    limits: &LimitsConfig,
    id: ClientId,
    line: &str,
) -> ProcessResult {
    let command_text = match serde_json::from_str::<CommandEnvelope>(line) {
        Ok(envelope) => {
            if !envelope.is_command() {
                return ProcessResult::default();
            }
            if !envelope.nickname.is_empty() {
                if let Some(client) = registry.get_mut(id) {
                    client.nickname = Some(envelope.nickname.clone());
                }
            }
            envelope.command
        }
        Err(_) => line.to_owned(),
    };

    if registry.get(id).is_none() {
        return ProcessResult::default();
    }
    let Some(command) = Command::parse(command_text.trim()) else {
        return ProcessResult::default();
    };
    debug!("[{id}] dispatching {command:?}");

    match command {
        Command::Nick(arg) => handle_nick(registry, directory, limits, id, arg),
        Command::List => handle_list(registry, directory, id),
        Command::Join(arg) => handle_join(registry, directory, id, arg),
        Command::Leave(arg) => handle_leave(registry, directory, id, arg),
        Command::Quit => handle_quit(registry, id),
        Command::Help => handle_help(registry, id),
        Command::Say(text) => handle_say(registry, directory, id, text),
        Command::Unknown(verb) => reply_error(registry, id, CommandError::UnknownCommand(verb)),
    }
}

fn reply_error(registry: &ClientRegistry, id: ClientId, error: CommandError) -> ProcessResult {
    send_to_client(registry, id, &ServerFrame::error(error.to_string()));
    ProcessResult::default()
}

fn handle_nick(
    registry: &mut ClientRegistry,
    directory: &ChannelDirectory,
    limits: &LimitsConfig,
    id: ClientId,
    arg: Option<String>,
) -> ProcessResult {
    let Some(new_nick) = arg else {
        return reply_error(
            registry,
            id,
            CommandError::Validation("Usage: /nick <nickname>".to_owned()),
        );
    };
    if new_nick.chars().count() > limits.max_nickname_length {
        return reply_error(
            registry,
            id,
            CommandError::Validation(format!(
                "Nickname too long (max {} characters)",
                limits.max_nickname_length
            )),
        );
    }
    if registry.nickname_in_use(&new_nick, id) {
        return reply_error(
            registry,
            id,
            CommandError::Conflict(format!("Nickname '{new_nick}' is already in use")),
        );
    }

    let Some(client) = registry.get_mut(id) else {
        return ProcessResult::default();
    };
    let old_nick = client.nickname.replace(new_nick.clone());
    let channels = sorted_channels(client.channels.iter());

    send_to_client(
        registry,
        id,
        &ServerFrame::success(format!("Nickname set to '{new_nick}'")),
    );
    info!("[{id}] nickname set to '{new_nick}'");

    // A client that was already in channels announces the change to each of
    // them; a first-time nickname stays silent.
    let mut dropped = Vec::new();
    if let Some(old_nickname) = old_nick {
        for channel in &channels {
            dropped.extend(broadcast_event(
                registry,
                directory,
                channel,
                Event::NickChange {
                    old_nickname: old_nickname.clone(),
                    new_nickname: new_nick.clone(),
                    channel: channel.clone(),
                },
                Some(id),
            ));
        }
    }
    ProcessResult::dropped(dropped)
}

fn handle_list(
    registry: &ClientRegistry,
    directory: &ChannelDirectory,
    id: ClientId,
) -> ProcessResult {
    let frame = ServerFrame::Event(Event::ChannelList {
        channels: directory.summaries(),
    });
    send_to_client(registry, id, &frame);
    ProcessResult::default()
}

fn handle_join(
    registry: &mut ClientRegistry,
    directory: &mut ChannelDirectory,
    id: ClientId,
    arg: Option<String>,
) -> ProcessResult {
    let channel = match arg {
        Some(name) => ChannelDirectory::normalize(&name),
        None => directory.default_channel().to_owned(),
    };

    let already_member = registry
        .get(id)
        .is_some_and(|c| c.channels.contains(&channel));
    if already_member {
        return reply_error(
            registry,
            id,
            CommandError::Conflict(format!("You are already in {channel}")),
        );
    }

    let Some(client) = registry.get_mut(id) else {
        return ProcessResult::default();
    };
    client.channels.insert(channel.clone());
    let nickname = client.display_name().to_owned();
    directory.add_member(&channel, id);

    send_to_client(
        registry,
        id,
        &ServerFrame::success(format!("Joined channel {channel}")),
    );
    info!("[{id}] {nickname} joined {channel}");

    let dropped = broadcast_event(
        registry,
        directory,
        &channel,
        Event::UserJoined {
            nickname,
            channel: channel.clone(),
        },
        Some(id),
    );
    ProcessResult::dropped(dropped)
}

fn handle_leave(
    registry: &mut ClientRegistry,
    directory: &mut ChannelDirectory,
    id: ClientId,
    arg: Option<String>,
) -> ProcessResult {
    match arg {
        Some(name) => {
            let channel = ChannelDirectory::normalize(&name);
            let member = registry
                .get(id)
                .is_some_and(|c| c.channels.contains(&channel));
            if !member {
                return reply_error(
                    registry,
                    id,
                    CommandError::State(format!("You are not in {channel}")),
                );
            }
            ProcessResult::dropped(leave_channel(registry, directory, id, &channel))
        }
        None => {
            // No argument: leave every joined channel, not just the default.
            let channels = registry
                .get(id)
                .map(|c| sorted_channels(c.channels.iter()))
                .unwrap_or_default();
            let mut dropped = Vec::new();
            for channel in &channels {
                dropped.extend(leave_channel(registry, directory, id, channel));
            }
            ProcessResult::dropped(dropped)
        }
    }
}

/// Removes `id` from `channel` in both structures, responds with the
/// per-channel success, and notifies the remaining members. The leaver is
/// already out of the member set when the fan-out snapshot is taken, so no
/// explicit exclusion is needed.
fn leave_channel(
    registry: &mut ClientRegistry,
    directory: &mut ChannelDirectory,
    id: ClientId,
    channel: &str,
) -> Vec<ClientId> {
    directory.remove_member(channel, id);
    let Some(client) = registry.get_mut(id) else {
        return Vec::new();
    };
    client.channels.remove(channel);
    let nickname = client.display_name().to_owned();

    send_to_client(
        registry,
        id,
        &ServerFrame::success(format!("Left channel {channel}")),
    );
    info!("[{id}] {nickname} left {channel}");

    broadcast_event(
        registry,
        directory,
        channel,
        Event::UserLeft {
            nickname,
            channel: channel.to_owned(),
        },
        None,
    )
}

fn handle_quit(registry: &ClientRegistry, id: ClientId) -> ProcessResult {
    send_to_client(registry, id, &ServerFrame::success("Goodbye!"));
    ProcessResult {
        disconnect: true,
        dropped: Vec::new(),
    }
}

fn handle_help(registry: &ClientRegistry, id: ClientId) -> ProcessResult {
    send_to_client(registry, id, &ServerFrame::success(HELP_TEXT));
    ProcessResult::default()
}

fn handle_say(
    registry: &ClientRegistry,
    directory: &ChannelDirectory,
    id: ClientId,
    text: String,
) -> ProcessResult {
    let Some(client) = registry.get(id) else {
        return ProcessResult::default();
    };
    let Some(nickname) = client.nickname.clone() else {
        return reply_error(
            registry,
            id,
            CommandError::State("Please set a nickname first with /nick <nickname>".to_owned()),
        );
    };
    let channels = sorted_channels(client.channels.iter());
    if channels.is_empty() {
        return reply_error(
            registry,
            id,
            CommandError::State("Please join a channel first with /join <channel>".to_owned()),
        );
    }

    let timestamp = unix_timestamp();
    let mut dropped = Vec::new();
    for channel in &channels {
        dropped.extend(broadcast_event(
            registry,
            directory,
            channel,
            Event::Message {
                nickname: nickname.clone(),
                channel: channel.clone(),
                message: text.clone(),
                timestamp,
            },
            Some(id),
        ));
    }
    debug!("[{id}] message from {nickname}: {text}");
    ProcessResult::dropped(dropped)
}

fn sorted_channels<'a>(names: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut channels: Vec<String> = names.cloned().collect();
    channels.sort();
    channels
}
