//! Turn scoring, opponent tracking and the propose/pause policy, plus a
//! reference host loop. Keep this crate free of IO.

pub mod agents;
pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod policy;
pub mod rng;
pub mod scoring;
pub mod tracker;

pub use agents::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use item::*;
pub use policy::*;
pub use rng::*;
pub use scoring::*;
pub use tracker::*;
