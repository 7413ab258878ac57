//! Shared informer factory.
//!
//! Hands out one shared informer per resource type and starts every informer
//! created so far on [`InformerFactory::start`].

use crate::informer::{EventStream, Informer};
use crate::signal::StopSignal;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use kube_runtime::{WatchStreamExt, watcher};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info};

type PodSource = Box<dyn Fn() -> EventStream<Pod> + Send + Sync>;

/// Creates and starts shared informers.
pub struct InformerFactory {
    pod_source: PodSource,
    resync_period: Option<Duration>,
    pods: Mutex<Option<Arc<Informer<Pod>>>>,
    pods_started: AtomicBool,
}

impl InformerFactory {
    /// Creates a factory watching the given namespace, or all namespaces when `None`.
    pub fn new(client: Client, namespace: Option<String>, resync_period: Option<Duration>) -> Self {
        let pods: Api<Pod> = match namespace.as_deref() {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        Self::with_pod_source(
            move || {
                watcher(pods.clone(), watcher::Config::default())
                    .default_backoff()
                    .boxed()
            },
            resync_period,
        )
    }

    /// Creates a factory whose pod informer reads from `source`.
    pub fn with_pod_source<F>(source: F, resync_period: Option<Duration>) -> Self
    where
        F: Fn() -> EventStream<Pod> + Send + Sync + 'static,
    {
        Self {
            pod_source: Box::new(source),
            resync_period,
            pods: Mutex::new(None),
            pods_started: AtomicBool::new(false),
        }
    }

    /// Returns the shared pod informer, creating it on first use.
    pub fn pods(&self) -> Arc<Informer<Pod>> {
        let mut pods = self.pods.lock().unwrap_or_else(PoisonError::into_inner);
        let informer = pods.get_or_insert_with(|| Arc::new(Informer::new("Pod", (self.pod_source)())));
        Arc::clone(informer)
    }

    /// Starts every informer created so far that is not already running.
    pub fn start(&self, stop: &StopSignal) {
        let pods = self.pods.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(informer) = pods else {
            return;
        };
        if self.pods_started.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Starting shared informers");
        let stop = stop.clone();
        let resync_period = self.resync_period;
        tokio::spawn(async move {
            if let Err(e) = informer.run(stop, resync_period).await {
                error!("Pod informer failed: {}", e);
            }
        });
    }
}

impl fmt::Debug for InformerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InformerFactory")
            .field("resync_period", &self.resync_period)
            .field("pods_started", &self.pods_started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
