//! The event hub: fan-out with rehydration.
//!
//! The hub keeps the latest descriptor, connection state, and radio state
//! per device, and a bounded queue per subscriber. `publish` is
//! non-blocking for every subscriber: a full queue drops its oldest entry
//! rather than stalling the publisher or the other subscribers.
//!
//! On attach a subscriber's queue is pre-loaded with a full snapshot --
//! descriptor, connection state, radio state, in that order for every
//! known device -- so a client that just (re)connected converges without
//! diffing against unknown prior state.
//!
//! When a device disconnects, any of its `StateChanged` events still
//! queued and undelivered are superseded: the disconnect must not be
//! observably followed by a stale "still transmitting" report.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Notify, mpsc};

use rigbridge_core::{BridgeEvent, ConnectionState, DeviceId, RadioDescriptor, RadioState};

/// Default per-subscriber queue depth.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Latest known facts about one device.
#[derive(Debug, Clone, Default)]
struct DeviceSnapshot {
    descriptor: Option<RadioDescriptor>,
    connection: Option<(ConnectionState, Option<String>)>,
    radio: Option<RadioState>,
}

struct SubscriberQueue {
    events: Mutex<VecDeque<BridgeEvent>>,
    notify: Notify,
    capacity: usize,
    /// Events dropped because this subscriber lagged.
    dropped: AtomicU64,
}

impl SubscriberQueue {
    fn push(&self, event: BridgeEvent) {
        {
            let mut events = self.events.lock().unwrap();
            if events.len() >= self.capacity {
                events.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            events.push_back(event);
        }
        self.notify.notify_one();
    }

    /// Drop queued, undelivered `StateChanged` events for a device.
    fn supersede_state_events(&self, id: &DeviceId) {
        let mut events = self.events.lock().unwrap();
        events.retain(|e| !matches!(e, BridgeEvent::StateChanged { id: eid, .. } if eid == id));
    }
}

struct HubInner {
    devices: BTreeMap<DeviceId, DeviceSnapshot>,
    subscribers: HashMap<u64, Arc<SubscriberQueue>>,
    next_subscriber: u64,
}

/// Shared, thread-safe broadcast point for the whole plane.
pub struct EventHub {
    inner: Mutex<HubInner>,
    queue_capacity: usize,
}

impl Default for EventHub {
    fn default() -> Self {
        EventHub::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        EventHub {
            inner: Mutex::new(HubInner {
                devices: BTreeMap::new(),
                subscribers: HashMap::new(),
                next_subscriber: 1,
            }),
            queue_capacity,
        }
    }

    /// Publish an event to every subscriber.
    ///
    /// Synchronous and non-blocking: the per-subscriber work is a queue
    /// push; a slow subscriber loses its own oldest events and nothing
    /// else.
    pub fn publish(&self, event: BridgeEvent) {
        let mut inner = self.inner.lock().unwrap();

        let mut supersede_for: Option<DeviceId> = None;
        match &event {
            BridgeEvent::DeviceDiscovered { descriptor } => {
                let snap = inner.devices.entry(descriptor.id.clone()).or_default();
                snap.descriptor = Some(descriptor.clone());
            }
            BridgeEvent::DeviceRemoved { id } => {
                inner.devices.remove(id);
            }
            BridgeEvent::ConnectionStateChanged { id, state, error } => {
                let snap = inner.devices.entry(id.clone()).or_default();
                snap.connection = Some((*state, error.clone()));
                if matches!(state, ConnectionState::Disconnected | ConnectionState::Error) {
                    supersede_for = Some(id.clone());
                }
            }
            BridgeEvent::StateChanged { id, state } => {
                let snap = inner.devices.entry(id.clone()).or_default();
                snap.radio = Some(state.clone());
            }
            BridgeEvent::Digital(_) => {}
        }

        for queue in inner.subscribers.values() {
            if let Some(id) = &supersede_for {
                queue.supersede_state_events(id);
            }
            queue.push(event.clone());
        }
    }

    /// Attach a subscriber; its queue starts with the rehydration snapshot.
    pub fn attach(self: &Arc<Self>) -> SubscriberHandle {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;

        let queue = Arc::new(SubscriberQueue {
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: self.queue_capacity.max(snapshot_len(&inner.devices)),
            dropped: AtomicU64::new(0),
        });

        // Rehydrate: per device, descriptor then connection then state.
        // Holding the hub lock here means no live event can interleave
        // with the snapshot.
        for snap in inner.devices.values() {
            if let Some(descriptor) = &snap.descriptor {
                queue.push(BridgeEvent::DeviceDiscovered {
                    descriptor: descriptor.clone(),
                });
            }
            if let Some((state, error)) = &snap.connection {
                if let Some(descriptor) = &snap.descriptor {
                    queue.push(BridgeEvent::ConnectionStateChanged {
                        id: descriptor.id.clone(),
                        state: *state,
                        error: error.clone(),
                    });
                }
            }
            if let (Some(descriptor), Some(radio)) = (&snap.descriptor, &snap.radio) {
                queue.push(BridgeEvent::StateChanged {
                    id: descriptor.id.clone(),
                    state: radio.clone(),
                });
            }
        }

        inner.subscribers.insert(id, Arc::clone(&queue));
        tracing::debug!(subscriber = id, "hub subscriber attached");

        SubscriberHandle {
            id,
            queue,
            hub: Arc::clone(self),
        }
    }

    /// Detach a subscriber explicitly. Dropping the handle does this too.
    pub fn detach(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.subscribers.remove(&id).is_some() {
            tracing::debug!(subscriber = id, "hub subscriber detached");
        }
    }

    /// Number of currently-attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    /// An `mpsc` sink whose events are forwarded into `publish`.
    ///
    /// Used by components (discovery listeners, the digital-mode bridge)
    /// that should not depend on this crate directly.
    pub fn sink(self: &Arc<Self>) -> mpsc::Sender<BridgeEvent> {
        let (tx, mut rx) = mpsc::channel::<BridgeEvent>(64);
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                hub.publish(event);
            }
        });
        tx
    }
}

/// Worst-case snapshot size so rehydration never self-truncates.
fn snapshot_len(devices: &BTreeMap<DeviceId, DeviceSnapshot>) -> usize {
    devices.len() * 3
}

/// One attached subscriber's receive side.
pub struct SubscriberHandle {
    id: u64,
    queue: Arc<SubscriberQueue>,
    hub: Arc<EventHub>,
}

impl SubscriberHandle {
    /// This subscriber's opaque id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Await the next event.
    pub async fn recv(&mut self) -> BridgeEvent {
        loop {
            if let Some(event) = self.queue.events.lock().unwrap().pop_front() {
                return event;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Pop an event if one is queued.
    pub fn try_recv(&mut self) -> Option<BridgeEvent> {
        self.queue.events.lock().unwrap().pop_front()
    }

    /// Events this subscriber lost to queue overflow.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.hub.detach(self.id);
    }
}
