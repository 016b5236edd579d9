pub mod acceptor;
pub mod broadcast;
pub mod commands;
pub mod config;
pub mod directory;
pub mod errors;
pub mod monitor;
pub mod processor;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod state;
