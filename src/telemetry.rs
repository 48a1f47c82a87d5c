//! Periodic republishing of every client's latest gaze as one `Gaze:` tick.
//!
//! The timer re-arms itself after each tick finishes rather than firing at a
//! fixed rate, so a slow tick pushes the next one back. Ticks are only ever
//! sent once: a lost tick is replaced by the next, fresher one.

use crate::{
    dispatcher::CommandDispatcher, message::Command, state::SharedState, transport::Publisher,
};
use log::{trace, warn};
use std::time::{Duration, Instant};

/// A one-shot deadline that is re-armed by hand after every firing.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryTimer {
    period: Duration,
    next_due: Instant,
}

impl TelemetryTimer {
    /// A timer that is due straight away.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: Instant::now() + period,
        }
    }

    /// Whether a tick should fire at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Schedules the next firing one period after `now`.
    pub fn rearm(&mut self, now: Instant) {
        self.next_due = now + self.period;
    }

    /// How long until the timer is due, zero if it already is.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// The configured tick period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Turns the shared state into periodic `Gaze:` ticks on the broadcast
/// channel.
pub struct TelemetryAggregator {
    state: SharedState,
    timer: TelemetryTimer,
    ticks: u64,
    dropped: u64,
}

impl TelemetryAggregator {
    /// An aggregator over `state` that ticks every `period`.
    pub fn new(state: SharedState, period: Duration) -> Self {
        Self {
            state,
            timer: TelemetryTimer::new(period),
            ticks: 0,
            dropped: 0,
        }
    }

    /// Builds the tick for the current state.
    pub fn snapshot(&self) -> Command {
        Command::Gaze(self.state.lock().snapshot())
    }

    /// Fires if the timer is due. Returns whether a tick was attempted.
    pub fn poll<P: Publisher>(&mut self, dispatcher: &mut CommandDispatcher<P>) -> bool {
        if !self.timer.is_due(Instant::now()) {
            return false;
        }
        self.fire(dispatcher);
        true
    }

    /// Sends one tick, best effort, then re-arms the timer. Returns whether
    /// the send went through.
    pub fn fire<P: Publisher>(&mut self, dispatcher: &mut CommandDispatcher<P>) -> bool {
        // The snapshot copies the state, so the lock is not held while sending
        let tick = self.snapshot().to_string();
        let sent = match dispatcher.send_best_effort(&tick) {
            Ok(()) => {
                trace!("{}", tick);
                self.ticks += 1;
                true
            }
            Err(e) => {
                warn!("dropped telemetry tick: {}", e);
                self.dropped += 1;
                false
            }
        };
        self.timer.rearm(Instant::now());
        sent
    }

    /// Time left before the next tick is due.
    pub fn remaining(&self) -> Duration {
        self.timer.remaining(Instant::now())
    }

    /// Ticks sent and ticks dropped so far.
    pub fn counts(&self) -> (u64, u64) {
        (self.ticks, self.dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        broadcast::{BindPolicy, BroadcastChannel},
        dispatcher::RetryPolicy,
        message::Inbound,
        transport::mock::MockPublisher,
    };
    use std::collections::HashSet;

    fn dispatcher(publisher: &MockPublisher) -> CommandDispatcher<MockPublisher> {
        let bind = BindPolicy {
            delay: Duration::ZERO,
            max_attempts: None,
        };
        CommandDispatcher::new(
            BroadcastChannel::open(publisher.clone(), &bind).unwrap(),
            RetryPolicy {
                retries: 5,
                delay: Duration::ZERO,
            },
        )
    }

    fn entries(tick: &str) -> HashSet<String> {
        tick.strip_prefix("Gaze: ")
            .unwrap()
            .split_terminator(';')
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn tick_carries_every_client() {
        let state = SharedState::new();
        state
            .lock()
            .apply("clientA".into(), Inbound::Gaze("1.0,2.0,3.0".to_owned()));
        state
            .lock()
            .apply("clientB".into(), Inbound::Gaze("0,0,0".to_owned()));

        let publisher = MockPublisher::default();
        let mut dispatcher = dispatcher(&publisher);
        let mut aggregator = TelemetryAggregator::new(state, Duration::from_millis(100));
        assert!(aggregator.fire(&mut dispatcher));

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].ends_with(';'));
        assert_eq!(
            entries(&sent[0]),
            HashSet::from([
                "clientA/1.0,2.0,3.0".to_owned(),
                "clientB/0,0,0".to_owned()
            ])
        );
    }

    #[test]
    fn empty_state_still_ticks() {
        let publisher = MockPublisher::default();
        let mut dispatcher = dispatcher(&publisher);
        let mut aggregator = TelemetryAggregator::new(SharedState::new(), Duration::ZERO);
        assert!(aggregator.poll(&mut dispatcher));
        assert_eq!(publisher.sent(), vec!["Gaze: "]);
    }

    #[test]
    fn waits_for_the_period() {
        let publisher = MockPublisher::default();
        let mut dispatcher = dispatcher(&publisher);
        let mut aggregator =
            TelemetryAggregator::new(SharedState::new(), Duration::from_secs(60));
        assert!(!aggregator.poll(&mut dispatcher));
        assert!(publisher.sent().is_empty());
    }

    #[test]
    fn failures_never_retry_and_never_stop_the_next_tick() {
        let publisher = MockPublisher::failing_sends();
        let mut dispatcher = dispatcher(&publisher);
        let mut aggregator = TelemetryAggregator::new(SharedState::new(), Duration::ZERO);

        assert!(!aggregator.fire(&mut dispatcher));
        assert!(!aggregator.fire(&mut dispatcher));

        let calls = publisher.calls.lock().unwrap();
        assert_eq!(calls.sends, 2);
        // The best-effort path never rebinds
        assert_eq!(calls.binds, 1);
        drop(calls);
        assert_eq!(aggregator.counts(), (0, 2));
    }

    #[test]
    fn timer_rearms_from_completion() {
        let period = Duration::from_millis(100);
        let mut timer = TelemetryTimer::new(period);
        let now = Instant::now();
        assert!(!timer.is_due(now));

        let late = now + Duration::from_millis(250);
        assert!(timer.is_due(late));
        timer.rearm(late);
        assert!(!timer.is_due(late + Duration::from_millis(99)));
        assert!(timer.is_due(late + period));
        assert_eq!(timer.remaining(late), period);
    }
}
