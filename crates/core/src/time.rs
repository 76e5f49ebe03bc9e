use chrono::{DateTime, Duration, TimeZone, Utc};

/// Timestamp used by [`Clock::Fixed`] in tests: 2025-06-15 15:06:40 UTC.
pub const FIXED_TEST_TIMESTAMP: i64 = 1_750_000_000;

/// Source of the current instant.
///
/// Domain types never call [`Utc::now`] directly. They take a `Clock`
/// so tests can pin time to a known instant and step it forward
/// explicitly, which keeps inactivity and staleness rules
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Wall-clock time.
    Default,
    /// A pinned instant that only moves when [`Clock::advance`] is called.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Current instant according to this clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    /// Pins the clock to `at`.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Clock::Fixed(at)
    }

    /// Moves a fixed clock forward by `delta`. No effect on `Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(at) = self {
            *at += delta;
        }
    }

    /// How much time has passed since `earlier`.
    #[must_use]
    pub fn elapsed_since(&self, earlier: DateTime<Utc>) -> Duration {
        self.now() - earlier
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::Default
    }
}

/// The instant behind [`FIXED_TEST_TIMESTAMP`].
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_opt(FIXED_TEST_TIMESTAMP, 0)
        .single()
        .unwrap_or_default()
}

/// A clock pinned to [`fixed_now`]. Test helper.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::Fixed(fixed_now())
}
