//! Strata Core - Sample-accurate audio region compositing

pub mod analysis;
pub mod config;
pub mod curve;
pub mod events;
pub mod fade;
pub mod gc;
pub mod region;
pub mod source;
pub mod types;

pub use types::*;
