//! Shared types for the webchannel client and object-channel implementations.

pub mod error;
pub mod protocol;

pub use error::*;
pub use protocol::*;
