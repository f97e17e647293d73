// Event bus - delivers scheduler events to listeners when they actually happen
//
// The scheduler runs up to SCHEDULE_AHEAD_TIME ahead of the audio clock, so
// events are not handed to listeners when generated. Each emitted event is
// pushed through a lock-free ringbuffer to a delivery thread, which holds it
// until `event.time - audio_now` has elapsed on the wall clock.

use crate::messaging::event::{EventKind, PlayerEvent};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default ringbuffer capacity between emitters and the delivery thread
pub const DEFAULT_BUS_CAPACITY: usize = 4096;

// Upper bound on how long the delivery thread sleeps without checking
// for new work or shutdown
const MAX_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Something the scheduler can publish events to
pub trait EventSink: Send + Sync {
    /// Publish `event`; `audio_now` is the audio clock at generation time
    fn emit(&self, event: PlayerEvent, audio_now: f64);

    /// Drop deliveries that have not happened yet
    fn cancel_pending(&self) {}
}

pub type Listener = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(u64, Listener)>>,
}

type SharedRegistry = Arc<Mutex<ListenerRegistry>>;

fn lock_registry(registry: &Mutex<ListenerRegistry>) -> MutexGuard<'_, ListenerRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancel token returned by `EventBus::on`
///
/// Dropping the token leaves the listener registered; call `cancel`.
#[derive(Debug, Clone)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    /// Unregister the listener. Safe to call more than once.
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = lock_registry(&registry);
            if let Some(listeners) = registry.listeners.get_mut(&self.kind) {
                listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("next_id", &self.next_id)
            .field("kinds", &self.listeners.len())
            .finish()
    }
}

/// An event waiting for its delivery instant
struct Delivery {
    due: Instant,
    seq: u64,
    generation: u64,
    event: PlayerEvent,
}

impl PartialEq for Delivery {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Delivery {}

impl PartialOrd for Delivery {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delivery {
    // Earliest due first; emission order breaks ties
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Time-delayed fan-out of player events to registered listeners
pub struct EventBus {
    registry: SharedRegistry,
    producer: Mutex<HeapProd<Delivery>>,
    generation: Arc<AtomicU64>,
    seq: AtomicU64,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Create a bus whose pending-delivery ringbuffer holds `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        let (producer, consumer) = HeapRb::<Delivery>::new(capacity.max(1)).split();

        let registry: SharedRegistry = Arc::default();
        let generation = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = {
            let registry = Arc::clone(&registry);
            let generation = Arc::clone(&generation);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("event-bus".to_string())
                .spawn(move || delivery_loop(consumer, registry, generation, shutdown))
        };

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Event bus: failed to spawn delivery thread: {}", e);
                None
            }
        };

        Self {
            registry,
            producer: Mutex::new(producer),
            generation,
            seq: AtomicU64::new(0),
            shutdown,
            worker,
        }
    }

    /// Register `listener` for events of `kind`
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let mut registry = lock_registry(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));

        Subscription {
            kind,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        lock_registry(&self.registry)
            .listeners
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: PlayerEvent, audio_now: f64) {
        let delay = (event.time() - audio_now).max(0.0);
        let delivery = Delivery {
            due: Instant::now() + Duration::from_secs_f64(delay),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            generation: self.generation.load(Ordering::Acquire),
            event,
        };

        let pushed = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_push(delivery);

        if pushed.is_err() {
            log::warn!("Event bus: delivery buffer full, dropping {:?}", event.kind());
            return;
        }

        if let Some(worker) = &self.worker {
            worker.thread().unpark();
        }
    }

    fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        log::debug!("Event bus: pending deliveries cancelled");
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
    }
}

fn delivery_loop(
    mut consumer: HeapCons<Delivery>,
    registry: SharedRegistry,
    generation: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
) {
    let mut pending: BinaryHeap<Reverse<Delivery>> = BinaryHeap::new();

    while !shutdown.load(Ordering::Acquire) {
        while let Some(delivery) = consumer.try_pop() {
            pending.push(Reverse(delivery));
        }

        let current_generation = generation.load(Ordering::Acquire);
        let now = Instant::now();

        while let Some(Reverse(next)) = pending.peek() {
            if next.generation == current_generation && next.due > now {
                break;
            }
            let Some(Reverse(delivery)) = pending.pop() else {
                break;
            };
            if delivery.generation == current_generation {
                dispatch(&registry, &delivery.event);
            }
        }

        let wait = pending
            .peek()
            .map_or(MAX_IDLE_WAIT, |Reverse(next)| {
                next.due.saturating_duration_since(Instant::now())
            })
            .min(MAX_IDLE_WAIT);

        if !wait.is_zero() {
            thread::park_timeout(wait);
        }
    }
}

fn dispatch(registry: &Mutex<ListenerRegistry>, event: &PlayerEvent) {
    // Listeners run outside the lock so they may subscribe or cancel
    let listeners: Vec<Listener> = lock_registry(registry)
        .listeners
        .get(&event.kind())
        .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
        .unwrap_or_default();

    for listener in listeners {
        listener(event);
    }
}
