//! Seeded parameter sweeps of the propose/pause policy over the reference host.

mod cancel;
mod config;
mod error;
mod harness;
mod host;
mod record;
mod roster;
mod stats;
mod trial;

pub use cancel::*;
pub use config::*;
pub use error::*;
pub use harness::*;
pub use host::*;
pub use record::*;
pub use roster::*;
pub use stats::*;
pub use trial::*;
