//! Core logic for pushcheck.
//!
//! # Architecture
//!
//! - [`subscription`] - Listener registries with RAII [`Subscription`] handles
//! - [`correlator`] - Matches a directly requested value against one delivered by an event
//! - [`poller`] - Fixed-interval, bounded polling with cancellation
//! - [`device`] - The platform notification API seam ([`NotificationsApi`])
//! - [`loopback`] - In-process device implementation used by tests and dry runs
//!
//! Callbacks may fire on any task. Shared slots are guarded by a mutex and
//! every wait primitive is bounded by a timeout, an attempt cap, or a
//! [`CancellationToken`].

pub mod correlator;
pub mod device;
pub mod loopback;
pub mod poller;
pub mod subscription;

pub use correlator::{CorrelationError, CorrelationOutcome, Correlator, Settled};
pub use device::{DeviceError, NotificationsApi};
pub use loopback::{LoopbackBuilder, LoopbackDevice};
pub use poller::{PollOutcome, PollPolicy, poll_for, poll_until};
pub use subscription::{EventEmitter, LatestEvent, Subscription};

pub use pushcheck_types;
pub use tokio_util::sync::CancellationToken;
