//! Shared informer built on kube_runtime's watcher and reflector.
//!
//! The watcher performs the list-watch networking and relists on failure,
//! the reflector store keeps the local cache. This module turns the raw
//! watcher events into add, update and delete callbacks and exposes the
//! initial cache synchronization signal.

use crate::error::InformerError;
use crate::signal::StopSignal;
use futures::StreamExt;
use futures::stream::BoxStream;
use kube::Resource;
use kube_runtime::reflector::{self, ObjectRef, Store, store::Writer};
use kube_runtime::watcher;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Stream of raw watcher events feeding an informer.
pub type EventStream<K> = BoxStream<'static, watcher::Result<watcher::Event<K>>>;

/// Callbacks invoked by an [`Informer`] for every change it observes.
///
/// Handlers are called sequentially from the informer's run task. A handler
/// must not register further handlers from inside a callback.
pub trait ResourceEventHandler<K>: Send + Sync {
    /// Called when an object appears. `is_in_initial_list` is true for objects
    /// delivered by the first list and for replays to late handlers.
    fn on_add(&self, obj: &K, is_in_initial_list: bool);

    /// Called when a cached object changes, and for every cached object on resync.
    fn on_update(&self, old: &K, new: &K);

    /// Called when an object is deleted or vanished during a relist.
    fn on_delete(&self, obj: &K);
}

type SharedHandler<K> = Arc<dyn ResourceEventHandler<K>>;

/// Watches one resource type, caches it and notifies registered handlers.
pub struct Informer<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    resource_name: String,
    store: Store<K>,
    // Taken by `run`, which may only happen once
    pending: Mutex<Option<(Writer<K>, EventStream<K>)>>,
    handlers: RwLock<Vec<SharedHandler<K>>>,
    started: AtomicBool,
    synced: AtomicBool,
    // Only written while holding the `handlers` write guard
    stopped: AtomicBool,
    terminated: watch::Sender<bool>,
}

impl<K> Informer<K>
where
    K: Resource + Clone + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    /// Creates an informer that will consume `events` once started.
    pub fn new(resource_name: impl Into<String>, events: EventStream<K>) -> Self {
        let (store, writer) = reflector::store();
        Self {
            resource_name: resource_name.into(),
            store,
            pending: Mutex::new(Some((writer, events))),
            handlers: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            terminated: watch::channel(false).0,
        }
    }

    /// Registers an event handler.
    ///
    /// A handler added to a running informer first receives an add for every
    /// object already in the cache.
    pub fn add_event_handler<H>(&self, handler: H) -> Result<(), InformerError>
    where
        H: ResourceEventHandler<K> + 'static,
    {
        let handler: SharedHandler<K> = Arc::new(handler);
        // Holding the write guard keeps `run` from applying events or
        // stopping until the replay and registration are done
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if self.stopped.load(Ordering::Acquire) {
            return Err(InformerError::Stopped);
        }
        if self.started.load(Ordering::Acquire) {
            for obj in self.store.state() {
                handler.on_add(&obj, true);
            }
        }
        handlers.push(handler);
        debug!("Registered {} event handler ({} total)", self.resource_name, handlers.len());
        Ok(())
    }

    /// Returns true once the first complete list has reached the cache.
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Read handle to the local cache.
    pub fn store(&self) -> Store<K> {
        self.store.clone()
    }

    /// Resolves once `run` has returned or its task was dropped.
    pub async fn terminated(&self) {
        let mut rx = self.terminated.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|terminated| *terminated).await;
    }

    /// Resolves true once the cache is synced, false if the informer
    /// terminated before syncing.
    async fn wait_synced(&self) -> bool {
        self.store.wait_until_ready().await.is_ok()
    }

    /// Consumes the event stream until it ends or `stop` fires.
    ///
    /// With a non-zero `resync_period` every cached object is redelivered as
    /// an update once per period.
    pub async fn run(
        &self,
        stop: StopSignal,
        resync_period: Option<Duration>,
    ) -> Result<(), InformerError> {
        let (mut writer, mut events) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(InformerError::AlreadyStarted)?;
        let _exit = MarkStoppedOnExit { informer: self };
        self.started.store(true, Ordering::Release);
        info!("Starting {} informer", self.resource_name);

        let mut resync = resync_period.filter(|period| !period.is_zero()).map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut listing: Option<HashSet<ObjectRef<K>>> = None;

        loop {
            tokio::select! {
                () = stop.stopped() => {
                    debug!("{} informer received stop signal", self.resource_name);
                    break;
                }
                () = next_tick(&mut resync) => self.resync(),
                event = events.next() => match event {
                    Some(Ok(event)) => {
                        {
                            // Registration waits until the event is both
                            // delivered and cached
                            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
                            self.dispatch(&handlers, &event, &mut listing);
                            writer.apply_watcher_event(&event);
                        }
                        if matches!(event, watcher::Event::InitDone) && !self.synced.swap(true, Ordering::AcqRel) {
                            info!("{} informer cache synced ({} objects)", self.resource_name, self.store.state().len());
                        }
                    }
                    Some(Err(e)) => warn!("{} watch error: {}", self.resource_name, e),
                    None => {
                        info!("{} event stream ended", self.resource_name);
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Translates one watcher event into handler calls. Must run before the
    /// event is applied to the cache so the previous state is still visible.
    fn dispatch(
        &self,
        handlers: &[SharedHandler<K>],
        event: &watcher::Event<K>,
        listing: &mut Option<HashSet<ObjectRef<K>>>,
    ) {
        match event {
            watcher::Event::Apply(obj) => {
                self.notify_applied(handlers, obj, false);
            }
            watcher::Event::Delete(obj) => {
                for handler in handlers {
                    handler.on_delete(obj);
                }
            }
            watcher::Event::Init => {
                debug!("{} informer listing", self.resource_name);
                *listing = Some(HashSet::new());
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = listing.as_mut() {
                    seen.insert(ObjectRef::from_obj(obj));
                }
                self.notify_applied(handlers, obj, !self.has_synced());
            }
            watcher::Event::InitDone => {
                let seen = listing.take().unwrap_or_default();
                for obj in self.store.state() {
                    if !seen.contains(&ObjectRef::from_obj(&*obj)) {
                        for handler in handlers {
                            handler.on_delete(&obj);
                        }
                    }
                }
            }
        }
    }

    fn notify_applied(&self, handlers: &[SharedHandler<K>], obj: &K, is_in_initial_list: bool) {
        match self.store.get(&ObjectRef::from_obj(obj)) {
            Some(old) => {
                for handler in handlers {
                    handler.on_update(&old, obj);
                }
            }
            None => {
                for handler in handlers {
                    handler.on_add(obj, is_in_initial_list);
                }
            }
        }
    }

    fn resync(&self) {
        let handlers = self.handlers();
        let objects = self.store.state();
        debug!("Resyncing {} {} objects", objects.len(), self.resource_name);
        for obj in objects {
            for handler in &handlers {
                handler.on_update(&obj, &obj);
            }
        }
    }

    fn handlers(&self) -> Vec<SharedHandler<K>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<K> Informer<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    fn mark_stopped(&self) {
        let _handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        self.stopped.store(true, Ordering::Release);
        self.terminated.send_replace(true);
    }
}

/// Marks the informer stopped when `run` returns, panics or is dropped.
struct MarkStoppedOnExit<'a, K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    informer: &'a Informer<K>,
}

impl<K> Drop for MarkStoppedOnExit<'_, K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.informer.mark_stopped();
    }
}

impl<K> fmt::Debug for Informer<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Informer")
            .field("resource_name", &self.resource_name)
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("synced", &self.synced.load(Ordering::Relaxed))
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Waits until every informer has synced its cache.
///
/// Returns false if `stop` fires first or an informer terminates before syncing.
pub async fn wait_for_cache_sync<K>(stop: &StopSignal, informers: &[Arc<Informer<K>>]) -> bool
where
    K: Resource + Clone + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let synced = futures::future::join_all(informers.iter().map(|informer| informer.wait_synced()));
    tokio::select! {
        results = synced => results.into_iter().all(|synced| synced),
        () = stop.stopped() => false,
    }
}
