//! Schema module - Configuration, gene records, recordings and run summaries.

mod action;
mod config;
mod goal;
mod network;
mod progress;
mod recording;

pub use action::*;
pub use config::*;
pub use goal::*;
pub use network::*;
pub use progress::*;
pub use recording::*;
