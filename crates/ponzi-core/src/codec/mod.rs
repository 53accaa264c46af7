//! Wire formats.
//!
//! | Module | Format | Used by |
//! |--------|--------|---------|
//! | [`iex`] | Upstream batch JSON | [`crate::fetcher`] |
//! | [`transport`] | Tagged binary (`prost`) | [`crate::remote`], cache snapshots |

pub mod iex;
pub mod transport;

pub use iex::{decode_charts, decode_quotes};
pub use transport::{decode, encode, WireMessage};
