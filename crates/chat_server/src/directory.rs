//! Channel name -> member set. Pure data plus accessors, mutated only inside
//! the state actor.

use std::collections::{HashMap, HashSet};

use crate::protocol::ChannelSummary;
use crate::registry::ClientId;

pub const DEFAULT_CHANNEL: &str = "#general";

/// Channels are created on first join and destroyed when their member set
/// becomes empty, except the default channel, which is created at startup and
/// never destroyed.
#[derive(Debug)]
pub struct ChannelDirectory {
    channels: HashMap<String, HashSet<ClientId>>,
    default_channel: String,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        let default_channel = DEFAULT_CHANNEL.to_owned();
        let mut channels = HashMap::new();
        channels.insert(default_channel.clone(), HashSet::new());
        ChannelDirectory {
            channels,
            default_channel,
        }
    }

    /// Channel names are entered with or without the leading marker;
    /// `general` and `#general` are the same channel.
    pub fn normalize(name: &str) -> String {
        if name.starts_with('#') {
            name.to_owned()
        } else {
            format!("#{name}")
        }
    }

    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn member_count(&self, name: &str) -> usize {
        self.channels.get(name).map_or(0, HashSet::len)
    }

    /// Adds `id` to the channel, creating it on first join. Returns `false`
    /// if `id` is already a member.
    pub fn add_member(&mut self, name: &str, id: ClientId) -> bool {
        self.channels.entry(name.to_owned()).or_default().insert(id)
    }

    /// Removes `id` from the channel, deleting the channel once its member
    /// set is empty unless it is the default channel. Returns `false` if `id`
    /// was not a member.
    pub fn remove_member(&mut self, name: &str, id: ClientId) -> bool {
        let Some(members) = self.channels.get_mut(name) else {
            return false;
        };
        let removed = members.remove(&id);
        if members.is_empty() && name != self.default_channel {
            self.channels.remove(name);
        }
        removed
    }

    /// Membership snapshot for one fan-out, taken before any write happens.
    pub fn member_snapshot(&self, name: &str) -> Vec<ClientId> {
        self.channels
            .get(name)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// One `/list` entry per known channel, sorted by name. The default
    /// channel is always present, possibly with zero members.
    pub fn summaries(&self) -> Vec<ChannelSummary> {
        let mut entries: Vec<ChannelSummary> = self
            .channels
            .iter()
            .map(|(name, members)| ChannelSummary {
                name: name.clone(),
                users: members.len(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

impl Default for ChannelDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_prefixes_marker_once() {
        assert_eq!(ChannelDirectory::normalize("general"), "#general");
        assert_eq!(ChannelDirectory::normalize("#general"), "#general");
    }

    #[test]
    fn channel_created_on_first_join_and_deleted_when_empty() {
        let mut directory = ChannelDirectory::new();
        assert!(!directory.contains("#rust"));

        assert!(directory.add_member("#rust", 1));
        assert!(directory.contains("#rust"));
        assert!(!directory.add_member("#rust", 1), "duplicate join");

        assert!(directory.remove_member("#rust", 1));
        assert!(!directory.contains("#rust"), "empty channel is deleted");
        assert!(!directory.remove_member("#rust", 1), "already gone");
    }

    #[test]
    fn default_channel_survives_becoming_empty() {
        let mut directory = ChannelDirectory::new();
        directory.add_member(DEFAULT_CHANNEL, 1);
        directory.remove_member(DEFAULT_CHANNEL, 1);
        assert!(directory.contains(DEFAULT_CHANNEL));
        assert_eq!(directory.member_count(DEFAULT_CHANNEL), 0);
    }

    #[test]
    fn summaries_include_empty_default_channel() {
        let mut directory = ChannelDirectory::new();
        directory.add_member("#rust", 1);
        directory.add_member("#rust", 2);

        let summaries = directory.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, DEFAULT_CHANNEL);
        assert_eq!(summaries[0].users, 0);
        assert_eq!(summaries[1].name, "#rust");
        assert_eq!(summaries[1].users, 2);
    }
}
