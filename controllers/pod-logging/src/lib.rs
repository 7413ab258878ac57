//! Pod Logging Controller
//!
//! Watches Pods through a shared informer and logs every pod that is
//! created, updated or deleted. No reconciliation is performed.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod controller;
pub mod error;
pub mod factory;
pub mod handler;
pub mod informer;
pub mod signal;

pub use config::Config;
pub use controller::PodLoggingController;
pub use error::{ControllerError, InformerError};
pub use factory::InformerFactory;
pub use handler::label_str_from_label_map;
pub use signal::{StopHandle, StopSignal, stop_channel};
