//! Main controller implementation.
//!
//! This module contains the `PodLoggingController` that subscribes to pod
//! add, update and delete notifications and logs them.

use crate::error::ControllerError;
use crate::factory::InformerFactory;
use crate::handler::PodEventLogger;
use crate::informer::{Informer, wait_for_cache_sync};
use crate::signal::StopSignal;
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use tracing::{info, warn};

/// Logs the name and namespace of pods that are added, updated or deleted.
#[derive(Debug)]
pub struct PodLoggingController {
    informer_factory: Arc<InformerFactory>,
    pod_informer: Arc<Informer<Pod>>,
}

impl PodLoggingController {
    /// Creates a controller and registers its pod event handler.
    pub fn new(informer_factory: Arc<InformerFactory>) -> Result<Self, ControllerError> {
        let pod_informer = informer_factory.pods();
        pod_informer.add_event_handler(PodEventLogger)?;

        Ok(Self {
            informer_factory,
            pod_informer,
        })
    }

    /// Starts the shared informers and waits for the pod cache to synchronize.
    ///
    /// Fails with [`ControllerError::CacheSync`] if `stop` fires first.
    pub async fn run(&self, stop: StopSignal) -> Result<(), ControllerError> {
        self.informer_factory.start(&stop);

        if !wait_for_cache_sync(&stop, &[Arc::clone(&self.pod_informer)]).await {
            return Err(ControllerError::CacheSync);
        }

        info!("Pod cache synchronized");
        Ok(())
    }

    /// Blocks until `stop` fires.
    ///
    /// Fails with [`ControllerError::Watch`] if the pod informer terminates
    /// while the stop signal is still down.
    pub async fn wait(&self, stop: &StopSignal) -> Result<(), ControllerError> {
        tokio::select! {
            () = stop.stopped() => Ok(()),
            () = self.pod_informer.terminated() => {
                if stop.is_stopped() {
                    return Ok(());
                }
                warn!("Pod informer terminated before shutdown");
                Err(ControllerError::Watch("pod event stream ended".to_string()))
            }
        }
    }
}
