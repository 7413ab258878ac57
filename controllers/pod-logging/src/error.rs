//! Controller-specific error types.
//!
//! This module defines error types for the Pod Logging Controller and the
//! informer it consumes that are not covered by upstream library errors.

use thiserror::Error;
use kube::Error as KubeError;

/// Errors returned by an [`Informer`](crate::informer::Informer).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InformerError {
    /// `run` was called on an informer that is already running or has run
    #[error("informer already started")]
    AlreadyStarted,

    /// The informer has stopped and no longer delivers events
    #[error("informer has stopped")]
    Stopped,
}

/// Errors that can occur in the Pod Logging Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Event handler registration failed
    #[error("Event handler registration failed: {0}")]
    HandlerRegistration(#[from] InformerError),

    /// The pod cache did not synchronize before the stop signal
    #[error("failed to sync")]
    CacheSync,

    /// An informer stopped watching before the stop signal
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
