//! # Types
//!
//! Small value types shared by the symbol codec, the store and the hosts.

pub mod address;
pub mod handles;

// Re-export all public types
pub use address::Address;
pub use handles::{MapHandle, PinToken, TableHandle};
