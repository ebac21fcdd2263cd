//! culvert-core — packet buffers, the cipher registry, and the cipher-suite
//! method providers shared by the tunnel pipeline.
//!
//! Everything here is synchronous and sans-I/O: the embedding event loop
//! owns the sockets and the virtual interface, and hands packets (and the
//! current time) down to this crate.

pub mod buffer;
pub mod cipher;
pub mod common;
pub mod error;
pub mod mac;
pub mod method;

pub use buffer::Buffer;
pub use common::{SessionParams, Timestamp};
pub use error::{DecryptFailure, PacketError};
pub use method::{Decrypted, Method, Session};
