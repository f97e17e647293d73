// Messaging - scheduler → observer event delivery

pub mod bus;
pub mod event;
pub mod queue;

pub use bus::{EventBus, EventSink, Listener, Subscription};
pub use event::{EventKind, PlayerEvent};
pub use queue::{DEFAULT_QUEUE_CAPACITY, EventQueue};
