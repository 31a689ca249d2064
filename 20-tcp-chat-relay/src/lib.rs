//! Line-oriented TCP chat relay.
//!
//! Clients connect, send one line with their display name, and from then on
//! every line they send is relayed to all other connected clients as
//! `"<name>: <line>"`. There are no rooms, no history and no acknowledgements.
//!
//! - [`server`] accepts connections and spawns a task per client.
//! - [`session`] is the per-client state machine: naming, relaying, teardown.
//! - [`registry`] is the lock-guarded set of named sessions and owns broadcast.
//! - [`protocol`] holds the newline framing and message formatting.
//! - [`client`] is the terminal client; [`cli`] parses both modes.

pub mod cli;
pub mod client;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
