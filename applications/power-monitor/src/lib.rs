pub mod api;
pub mod config;
pub mod db;
pub mod debounce;
pub mod error;
pub mod features;
pub mod frequency;
pub mod gates;
pub mod heartbeat;
pub mod listener;
pub mod memory;
pub mod monitor;
pub mod predictor;
pub mod reading;
pub mod redpanda;
pub mod repositories;
pub mod store;

// Re-export commonly used items
pub use config::Config;
pub use error::{AppError, Result};
pub use monitor::{AnomalyOutcome, Collaborators, Identification, IdentificationOutcome, Monitor};
pub use reading::{Reading, Window};
