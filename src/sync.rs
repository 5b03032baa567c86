//! Offline sync manager.
//!
//! Guarantees that document mutations requested while offline, or that
//! fail transiently, are not lost. Mutations queue in FIFO order, persist
//! to a journal after every change, and replay against the document store
//! when connectivity returns. Subscribers receive a status snapshot on
//! every change for UI display.
//!
//! Replay rules:
//! - one drain runs at a time, in FIFO order over a queue snapshot
//! - a failed operation keeps its place and its retry count increments
//! - an operation that exhausts its retry budget moves to a bounded
//!   dead-letter list instead of blocking the operations behind it
//! - operations enqueued while a drain is running survive the rebuild
//! - a drain overlapped by clear_queue() or destroy() finishes its
//!   store writes but cannot resurrect operations they removed
//!
//! Locks are always taken queue before status, and subscriber callbacks
//! run with no lock held.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::journal::{decode_queue, encode_queue, Journal, QUEUE_KEY};
use crate::models::{OperationKind, QueuedOperation, SyncStatus};
use crate::store::DocumentStore;

type Callback = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

/// Removes its subscriber when asked. Dropping the handle without calling
/// [`SubscriptionHandle::unsubscribe`] leaves the subscription active.
pub struct SubscriptionHandle {
    id: u64,
    subscribers: Weak<Mutex<Vec<Subscriber>>>,
}

impl SubscriptionHandle {
    /// Remove the subscriber. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().unwrap().retain(|s| s.id != self.id);
        }
    }
}

pub struct SyncManager {
    config: SyncConfig,
    store: Arc<dyn DocumentStore>,
    connectivity: Arc<dyn Connectivity>,
    journal: Arc<dyn Journal>,

    queue: Mutex<Vec<QueuedOperation>>,
    dead: Mutex<Vec<QueuedOperation>>,
    status: Mutex<SyncStatus>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    next_subscriber_id: AtomicU64,

    draining: AtomicBool,
    destroyed: AtomicBool,
    // Serializes encode+write pairs so a later queue state can never be
    // overwritten in the journal by an earlier one.
    persist_lock: tokio::sync::Mutex<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncManager {
    // ============ Construction ============

    /// Restore the queue from the journal and start the background tasks.
    ///
    /// A journal read failure degrades to an empty queue with a warning.
    /// The manager still has to come up so new writes can queue.
    pub async fn new(
        config: SyncConfig,
        store: Arc<dyn DocumentStore>,
        connectivity: Arc<dyn Connectivity>,
        journal: Arc<dyn Journal>,
    ) -> Arc<Self> {
        let queue = match journal.get(QUEUE_KEY).await {
            Ok(Some(raw)) => decode_queue(&raw),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "journal unreadable, starting with empty sync queue");
                Vec::new()
            }
        };
        if !queue.is_empty() {
            info!(pending = queue.len(), "restored sync queue from journal");
        }

        let status = SyncStatus {
            is_online: connectivity.is_online(),
            is_syncing: false,
            queued_operations: queue.len(),
            dead_letters: 0,
            last_sync_attempt: None,
            last_successful_sync: None,
        };

        let manager = Arc::new(Self {
            config,
            store,
            connectivity,
            journal,
            queue: Mutex::new(queue),
            dead: Mutex::new(Vec::new()),
            status: Mutex::new(status),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscriber_id: AtomicU64::new(0),
            draining: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            persist_lock: tokio::sync::Mutex::new(()),
            tasks: Mutex::new(Vec::new()),
        });

        manager.spawn_reconnect_watcher();
        manager.spawn_drain_timer();
        manager
    }

    // ============ Background tasks ============

    fn spawn_reconnect_watcher(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let mut watch = self.connectivity.watch();
        let handle = tokio::spawn(async move {
            while watch.changed().await.is_ok() {
                let online = *watch.borrow_and_update();
                let Some(manager) = weak.upgrade() else { break };
                manager.refresh_status(|status| status.is_online = online);
                if online {
                    debug!("connectivity restored, draining sync queue");
                    manager.spawn_drain();
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    /// Periodic retry sweep. The first tick fires immediately, which also
    /// flushes a queue restored from the journal at startup.
    fn spawn_drain_timer(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = Duration::from_secs(self.config.drain_interval_secs);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else { break };
                let pending = manager.queue.lock().unwrap().len();
                if pending > 0 && manager.connectivity.is_online() {
                    manager.spawn_drain();
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    /// Runs the drain on its own task, untracked by `tasks`, so the
    /// aborts in [`SyncManager::destroy`] never cancel a replay
    /// mid-write.
    fn spawn_drain(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.process_sync_queue().await;
        });
    }

    // ============ Mutation API ============

    /// Create or replace a document. Applied directly when online, queued
    /// when offline or when the direct write fails.
    pub async fn save_document(
        self: &Arc<Self>,
        collection: &str,
        document_id: &str,
        fields: Value,
    ) {
        self.mutate(OperationKind::Create, collection, document_id, Some(fields))
            .await;
    }

    /// Shallow-merge fields into a document.
    pub async fn update_document(
        self: &Arc<Self>,
        collection: &str,
        document_id: &str,
        fields: Value,
    ) {
        self.mutate(OperationKind::Update, collection, document_id, Some(fields))
            .await;
    }

    /// Delete a document.
    pub async fn delete_document(self: &Arc<Self>, collection: &str, document_id: &str) {
        self.mutate(OperationKind::Delete, collection, document_id, None)
            .await;
    }

    async fn mutate(
        self: &Arc<Self>,
        kind: OperationKind,
        collection: &str,
        document_id: &str,
        payload: Option<Value>,
    ) {
        if self.connectivity.is_online() {
            match self
                .apply(kind, collection, document_id, payload.as_ref())
                .await
            {
                Ok(()) => return,
                Err(err) => {
                    debug!(error = %err, collection, document_id, "direct write failed, queueing");
                }
            }
        }
        self.queue_operation(kind, collection, document_id, payload)
            .await;
    }

    /// Append a mutation to the durable queue. Returns the operation id.
    pub async fn queue_operation(
        self: &Arc<Self>,
        kind: OperationKind,
        collection: &str,
        document_id: &str,
        payload: Option<Value>,
    ) -> String {
        let operation = QueuedOperation::new(
            kind,
            collection,
            document_id,
            payload,
            self.config.max_retries,
        );
        let id = operation.id.clone();
        debug!(id = %id, kind = %kind, collection, document_id, "queueing operation");

        self.queue.lock().unwrap().push(operation);
        self.persist_queue().await;
        self.refresh_status(|_| {});

        if self.connectivity.is_online() {
            self.spawn_drain();
        }
        id
    }

    // ============ Queue processing ============

    /// Drain the queue against the store. No-ops when a drain is already
    /// running or the queue is empty.
    pub async fn process_sync_queue(&self) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("drain already in progress");
            return;
        }
        if self.queue.lock().unwrap().is_empty() {
            self.draining.store(false, Ordering::SeqCst);
            return;
        }

        let snapshot: Vec<QueuedOperation> = self.queue.lock().unwrap().clone();
        let snapshot_ids: HashSet<String> = snapshot.iter().map(|op| op.id.clone()).collect();
        info!(pending = snapshot.len(), "draining sync queue");
        self.refresh_status(|status| {
            status.is_syncing = true;
            status.last_sync_attempt = Some(Utc::now());
        });

        let mut survivors: Vec<QueuedOperation> = Vec::new();
        let mut dead: Vec<QueuedOperation> = Vec::new();
        let mut succeeded = 0usize;

        for mut operation in snapshot {
            let result = self
                .apply(
                    operation.kind,
                    &operation.collection,
                    &operation.document_id,
                    operation.payload.as_ref(),
                )
                .await;
            match result {
                Ok(()) => succeeded += 1,
                Err(err) => {
                    operation.retry_count += 1;
                    if operation.retry_count < operation.max_retries {
                        debug!(
                            id = %operation.id,
                            retry = operation.retry_count,
                            error = %err,
                            "replay failed, keeping operation queued"
                        );
                        survivors.push(operation);
                    } else {
                        warn!(
                            id = %operation.id,
                            retries = operation.retry_count,
                            error = %err,
                            "operation exhausted retries, moving to dead letters"
                        );
                        dead.push(operation);
                    }
                }
            }
        }

        let newly_dead = dead.len();
        if newly_dead > 0 {
            let mut dead_list = self.dead.lock().unwrap();
            dead_list.extend(dead);
            let cap = self.config.dead_letter_cap;
            if dead_list.len() > cap {
                let excess = dead_list.len() - cap;
                dead_list.drain(..excess);
            }
        }

        // Rebuild: failed snapshot operations keep their place, then
        // anything that arrived while the drain was running. A survivor
        // only returns while its entry is still live, so a clear_queue()
        // issued mid-drain stays final.
        let guard = self.persist_lock.lock().await;
        if self.destroyed.load(Ordering::SeqCst) {
            // destroy() journaled its closing snapshot. Leave it be.
            drop(guard);
            self.draining.store(false, Ordering::SeqCst);
            return;
        }
        {
            let mut queue = self.queue.lock().unwrap();
            let mut survivors_by_id: HashMap<String, QueuedOperation> = survivors
                .into_iter()
                .map(|op| (op.id.clone(), op))
                .collect();
            let rebuilt: Vec<QueuedOperation> = queue
                .drain(..)
                .filter_map(|op| {
                    if snapshot_ids.contains(&op.id) {
                        survivors_by_id.remove(&op.id)
                    } else {
                        Some(op)
                    }
                })
                .collect();
            *queue = rebuilt;
        }
        self.write_queue_to_journal().await;
        drop(guard);

        self.refresh_status(|status| {
            status.is_syncing = false;
            status.dead_letters += newly_dead;
            if succeeded > 0 {
                status.last_successful_sync = Some(Utc::now());
            }
        });
        self.draining.store(false, Ordering::SeqCst);
    }

    /// Drain now, regardless of timers. Waits for the drain to finish.
    pub async fn force_sync(&self) {
        self.process_sync_queue().await;
    }

    async fn apply(
        &self,
        kind: OperationKind,
        collection: &str,
        document_id: &str,
        payload: Option<&Value>,
    ) -> anyhow::Result<()> {
        let empty = Value::Object(Map::new());
        let fields = payload.unwrap_or(&empty);
        match kind {
            OperationKind::Create => self.store.upsert(collection, document_id, fields).await,
            OperationKind::Update => self.store.merge(collection, document_id, fields).await,
            OperationKind::Delete => self.store.remove(collection, document_id).await,
        }
    }

    // ============ Status and lifecycle ============

    /// Register a status listener. Fires on every status change until the
    /// returned handle unsubscribes or the manager is destroyed.
    pub fn on_sync_status_change<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        SubscriptionHandle {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Current status snapshot.
    pub fn sync_status(&self) -> SyncStatus {
        self.status.lock().unwrap().clone()
    }

    /// Pending operations, oldest first.
    pub fn queued_operations(&self) -> Vec<QueuedOperation> {
        self.queue.lock().unwrap().clone()
    }

    /// Operations dropped after exhausting their retry budget, oldest
    /// first, capped at `dead_letter_cap`.
    pub fn dead_letters(&self) -> Vec<QueuedOperation> {
        self.dead.lock().unwrap().clone()
    }

    /// Drop every pending operation without applying it.
    pub async fn clear_queue(&self) {
        let dropped = {
            let mut queue = self.queue.lock().unwrap();
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        if dropped > 0 {
            warn!(dropped, "cleared sync queue without applying");
        }
        self.persist_queue().await;
        self.refresh_status(|_| {});
    }

    /// Persist and shut down. Idempotent. Pending operations stay in the
    /// journal so the next manager picks them up. A drain in flight
    /// finishes its store writes but skips its rebuild, so the snapshot
    /// written here stands.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        for handle in self.tasks.lock().unwrap().drain(..) {
            handle.abort();
        }
        self.persist_queue().await;
        self.queue.lock().unwrap().clear();
        self.subscribers.lock().unwrap().clear();
        debug!("sync manager destroyed");
    }

    /// Write the live queue to the journal. Failures degrade to
    /// memory-only queueing with a warning. The next successful persist
    /// rewrites the full snapshot and heals the journal.
    async fn persist_queue(&self) {
        let _guard = self.persist_lock.lock().await;
        self.write_queue_to_journal().await;
    }

    /// Caller must hold `persist_lock`.
    async fn write_queue_to_journal(&self) {
        let encoded = {
            let queue = self.queue.lock().unwrap();
            encode_queue(&queue)
        };
        match encoded {
            Ok(encoded) => {
                if let Err(err) = self.journal.set(QUEUE_KEY, &encoded).await {
                    warn!(error = %err, "failed to persist sync queue");
                }
            }
            Err(err) => warn!(error = %err, "failed to encode sync queue"),
        }
    }

    /// Apply a change to the status, recompute the queue length, then
    /// notify subscribers with the lock released.
    fn refresh_status(&self, apply: impl FnOnce(&mut SyncStatus)) {
        let snapshot = {
            let queued = self.queue.lock().unwrap().len();
            let mut status = self.status.lock().unwrap();
            apply(&mut status);
            status.queued_operations = queued;
            status.clone()
        };
        self.notify(&snapshot);
    }

    fn notify(&self, status: &SyncStatus) {
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|s| Arc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            callback(status);
        }
    }
}
