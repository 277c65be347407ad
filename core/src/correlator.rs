//! Direct-call / event-channel correlation.
//!
//! A [`Correlator`] holds two slots for the same logical value: one filled by
//! the caller after a direct request ([`Correlator::record_direct`]) and one
//! filled from an out-of-band callback ([`Correlator::record_event`]). After a
//! bounded wait the caller gets both back as a [`Settled`] and decides what
//! agreement means.
//!
//! | Wait | Returns |
//! |------|---------|
//! | [`Correlator::settle`] | after the full delay, regardless of arrivals |
//! | [`Correlator::settle_or_arrival`] | on the first event, or after the timeout |

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("a direct value was already recorded for this case")]
    DirectAlreadyRecorded,
}

struct Slots<T> {
    direct: Option<T>,
    event: Option<T>,
    events_seen: usize,
}

struct Inner<T> {
    slots: Mutex<Slots<T>>,
    arrived: Notify,
}

impl<T> Inner<T> {
    fn slots(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pairs a directly requested value with one delivered by an event.
///
/// Clones share state, so one clone can live inside a listener callback while
/// the check holds another.
pub struct Correlator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Correlator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Correlator<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(Slots {
                    direct: None,
                    event: None,
                    events_seen: 0,
                }),
                arrived: Notify::new(),
            }),
        }
    }
}

impl<T: Clone + Send + 'static> Correlator<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the value obtained from the direct call. Allowed once per case.
    pub fn record_direct(&self, value: T) -> Result<(), CorrelationError> {
        let mut slots = self.inner.slots();
        if slots.direct.is_some() {
            return Err(CorrelationError::DirectAlreadyRecorded);
        }
        slots.direct = Some(value);
        Ok(())
    }

    /// Store a value delivered by the event channel, replacing any earlier one.
    pub fn record_event(&self, value: T) {
        {
            let mut slots = self.inner.slots();
            slots.event = Some(value);
            slots.events_seen += 1;
        }
        self.inner.arrived.notify_waiters();
    }

    /// Callback suitable for an event listener; records every event it sees.
    pub fn event_recorder(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let correlator = self.clone();
        move |value: &T| correlator.record_event(value.clone())
    }

    /// Current contents of both slots, without waiting.
    #[must_use]
    pub fn snapshot(&self) -> Settled<T> {
        let slots = self.inner.slots();
        Settled {
            direct: slots.direct.clone(),
            event: slots.event.clone(),
            events_seen: slots.events_seen,
        }
    }

    /// Wait the full `delay`, then report both slots.
    ///
    /// The delay is flat: an event that never comes (e.g. because the direct
    /// call failed) costs exactly `delay`, and so does one that came early.
    pub async fn settle(&self, delay: Duration) -> Settled<T> {
        tokio::time::sleep(delay).await;
        self.snapshot()
    }

    /// Wait until an event has been recorded or `timeout` elapses, then report
    /// both slots.
    pub async fn settle_or_arrival(&self, timeout: Duration) -> Settled<T> {
        let notified = self.inner.arrived.notified();
        tokio::pin!(notified);
        // Register before checking so an event landing in between still wakes us.
        notified.as_mut().enable();

        if self.inner.slots().event.is_none() {
            let _ = tokio::time::timeout(timeout, notified).await;
        }
        self.snapshot()
    }
}

/// How the two slots compare once settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationOutcome {
    /// Both present and structurally equal.
    Matched,
    /// Both present and different.
    Mismatched,
    /// The direct call produced a value but no event arrived.
    EventMissing,
    /// An event arrived but there is no direct value to compare it with.
    DirectMissing,
    /// Neither side produced a value.
    BothAbsent,
}

impl CorrelationOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Mismatched => "mismatched",
            Self::EventMissing => "event missing",
            Self::DirectMissing => "direct value missing",
            Self::BothAbsent => "both absent",
        }
    }
}

/// Both slots after a settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled<T> {
    pub direct: Option<T>,
    pub event: Option<T>,
    /// Number of events recorded so far (only the last one is kept).
    pub events_seen: usize,
}

impl<T: PartialEq> Settled<T> {
    /// Structural equality of the two slots.
    ///
    /// Two empty slots compare equal: a failed direct call means no event was
    /// expected either. Use [`Settled::outcome`] to tell that case apart.
    #[must_use]
    pub fn matches(&self) -> bool {
        self.direct == self.event
    }

    #[must_use]
    pub fn outcome(&self) -> CorrelationOutcome {
        match (&self.direct, &self.event) {
            (Some(direct), Some(event)) if direct == event => CorrelationOutcome::Matched,
            (Some(_), Some(_)) => CorrelationOutcome::Mismatched,
            (Some(_), None) => CorrelationOutcome::EventMissing,
            (None, Some(_)) => CorrelationOutcome::DirectMissing,
            (None, None) => CorrelationOutcome::BothAbsent,
        }
    }
}
