//! culvert-tunnel — the peer table and packet pipeline glue above
//! culvert-core.
//!
//! The handshake subsystem installs sessions and drains lifecycle events;
//! the event loop feeds datagrams, frames, and clock ticks. This crate
//! never touches a socket, a TUN device, or the system clock.

pub mod config;
pub mod event;
pub mod peer;
pub mod tunnel;

pub use config::{Mode, SessionConfig, TunnelConfig};
pub use event::Event;
pub use peer::{PeerId, PeerStats};
pub use tunnel::{Inbound, Tunnel};
