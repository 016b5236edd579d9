use thiserror::Error;

/// A failure while handling one client command. None of these are fatal to
/// the process: each one is rendered into an error response on the wire
/// (`Display` is the exact message sent back) and the connection stays open.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Malformed or missing command arguments.
    #[error("{0}")]
    Validation(String),

    /// The command collides with live state (nickname taken, duplicate join).
    #[error("{0}")]
    Conflict(String),

    /// A precondition is unmet (chatting without a nickname or channel).
    #[error("{0}")]
    State(String),

    #[error("Unknown command: /{0}")]
    UnknownCommand(String),
}

#[derive(Error, Debug)]
pub enum ServerError {
    /// Bind/listen failure. Fatal: the binary exits with status 1.
    #[error("failed to bind {addr}: {source}")]
    Startup {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Read/write failure on one connection. Tears down that connection only.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}
