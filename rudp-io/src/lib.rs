//! Network I/O and Platform Abstraction
//!
//! This crate provides the primitives the rudp protocol core is built on:
//! endpoint addresses, a non-blocking UDP socket wrapper, and timing
//! utilities for the fixed-cadence update loop.

pub mod addr;
pub mod socket;
pub mod time;

pub use addr::Address;
pub use socket::{Socket, SocketError};
pub use time::{SendPacer, Ticker};
