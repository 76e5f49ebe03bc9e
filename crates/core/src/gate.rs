//! Single-flight quiz gate.
//!
//! At most one tab may be generating or showing a quiz at any moment.
//! The gate is the one place that rule lives: it is a state machine
//! with three phases and no way to occupy two of them at once.
//!
//! ```text
//! Idle ──begin_generation──▶ Generating ──activate──▶ Active
//!   ▲                            │                      │
//!   └────── fail_generation ─────┘        complete ─────┘
//! ```
//!
//! Generation runs outside the lock holder's control, so each claim
//! carries a [`GenerationTicket`]. A result that comes back with a
//! ticket the gate no longer recognizes is stale and must be dropped.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::TabId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GateError {
    #[error("tab {holder} already holds the quiz gate")]
    AlreadyHeld { holder: TabId },
}

/// Token for one generation attempt. Monotonically increasing, never
/// reused within a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationTicket(u64);

#[derive(Debug, Clone, PartialEq)]
enum GatePhase {
    Idle,
    Generating {
        tab: TabId,
        ticket: GenerationTicket,
    },
    Active {
        tab: TabId,
        subject: String,
        since: DateTime<Utc>,
    },
}

/// The process-wide quiz lock.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizGate {
    phase: GatePhase,
    issued: u64,
}

impl QuizGate {
    #[must_use]
    pub fn new() -> Self {
        QuizGate {
            phase: GatePhase::Idle,
            issued: 0,
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, GatePhase::Idle)
    }

    #[must_use]
    pub fn is_generating(&self) -> bool {
        matches!(self.phase, GatePhase::Generating { .. })
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.phase, GatePhase::Active { .. })
    }

    /// Tab holding the gate in either engaged phase.
    #[must_use]
    pub fn holder(&self) -> Option<TabId> {
        match &self.phase {
            GatePhase::Idle => None,
            GatePhase::Generating { tab, .. } | GatePhase::Active { tab, .. } => Some(*tab),
        }
    }

    /// Tab showing a quiz right now, if any.
    #[must_use]
    pub fn active_tab(&self) -> Option<TabId> {
        match &self.phase {
            GatePhase::Active { tab, .. } => Some(*tab),
            _ => None,
        }
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        match &self.phase {
            GatePhase::Active { subject, .. } => Some(subject),
            _ => None,
        }
    }

    #[must_use]
    pub fn active_since(&self) -> Option<DateTime<Utc>> {
        match &self.phase {
            GatePhase::Active { since, .. } => Some(*since),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_ticket(&self) -> Option<GenerationTicket> {
        match &self.phase {
            GatePhase::Generating { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }

    /// True when `ticket` belongs to the generation attempt the gate
    /// is still waiting on.
    #[must_use]
    pub fn is_current(&self, ticket: GenerationTicket) -> bool {
        self.current_ticket() == Some(ticket)
    }

    /// Short name of the current phase, for log lines.
    #[must_use]
    pub fn phase_name(&self) -> &'static str {
        match &self.phase {
            GatePhase::Idle => "idle",
            GatePhase::Generating { .. } => "generating",
            GatePhase::Active { .. } => "active",
        }
    }

    /// Claims the gate for a generation attempt on behalf of `tab`.
    ///
    /// A tab that already holds the gate may claim again; the old
    /// attempt is superseded and its ticket invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::AlreadyHeld`] when a different tab holds
    /// the gate.
    pub fn begin_generation(&mut self, tab: TabId) -> Result<GenerationTicket, GateError> {
        if let Some(holder) = self.holder() {
            if holder != tab {
                return Err(GateError::AlreadyHeld { holder });
            }
        }
        self.issued += 1;
        let ticket = GenerationTicket(self.issued);
        self.phase = GatePhase::Generating { tab, ticket };
        Ok(ticket)
    }

    /// Releases the gate after a failed generation attempt.
    ///
    /// Returns `false` (and changes nothing) when `ticket` is stale,
    /// meaning a newer claim has already replaced the attempt.
    pub fn fail_generation(&mut self, ticket: GenerationTicket) -> bool {
        if self.is_current(ticket) {
            self.phase = GatePhase::Idle;
            return true;
        }
        false
    }

    /// Moves the gate to `Active` for `tab`, recording the quiz
    /// subject. Re-activating from the same tab refreshes the subject
    /// but keeps the original start instant.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::AlreadyHeld`] when a different tab holds
    /// the gate.
    pub fn activate(
        &mut self,
        tab: TabId,
        subject: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), GateError> {
        let since = match &self.phase {
            GatePhase::Idle => now,
            GatePhase::Generating { tab: holder, .. } => {
                if *holder != tab {
                    return Err(GateError::AlreadyHeld { holder: *holder });
                }
                now
            }
            GatePhase::Active { tab: holder, since, .. } => {
                if *holder != tab {
                    return Err(GateError::AlreadyHeld { holder: *holder });
                }
                *since
            }
        };
        self.phase = GatePhase::Active {
            tab,
            subject: subject.into(),
            since,
        };
        Ok(())
    }

    /// Releases an active quiz on behalf of the tab showing it.
    ///
    /// Returns whether the release was allowed. `false` means `tab`
    /// does not hold an active quiz and the gate is unchanged.
    pub fn complete(&mut self, tab: TabId) -> bool {
        if self.active_tab() == Some(tab) {
            self.phase = GatePhase::Idle;
            return true;
        }
        false
    }

    /// Drops the gate if `tab` holds it in any phase. Used when a tab
    /// disappears.
    pub fn release_if_held_by(&mut self, tab: TabId) -> bool {
        if self.holder() == Some(tab) {
            self.phase = GatePhase::Idle;
            return true;
        }
        false
    }

    /// Forces the gate back to idle. Returns whether it was engaged.
    pub fn reset(&mut self) -> bool {
        let engaged = !self.is_idle();
        self.phase = GatePhase::Idle;
        engaged
    }
}

impl Default for QuizGate {
    fn default() -> Self {
        QuizGate::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    const TAB_A: TabId = TabId::new(1);
    const TAB_B: TabId = TabId::new(2);

    #[test]
    fn gate_starts_idle() {
        let gate = QuizGate::new();
        assert!(gate.is_idle());
        assert_eq!(gate.holder(), None);
        assert_eq!(gate.phase_name(), "idle");
    }

    #[test]
    fn only_one_tab_can_claim_the_gate() {
        let mut gate = QuizGate::new();
        gate.begin_generation(TAB_A).unwrap();
        assert_eq!(
            gate.begin_generation(TAB_B),
            Err(GateError::AlreadyHeld { holder: TAB_A })
        );
        assert_eq!(gate.holder(), Some(TAB_A));
    }

    #[test]
    fn activation_is_refused_while_another_tab_holds() {
        let mut gate = QuizGate::new();
        gate.begin_generation(TAB_A).unwrap();
        assert_eq!(
            gate.activate(TAB_B, "Biology", fixed_now()),
            Err(GateError::AlreadyHeld { holder: TAB_A })
        );
    }

    #[test]
    fn generating_and_active_are_mutually_exclusive() {
        let mut gate = QuizGate::new();
        gate.begin_generation(TAB_A).unwrap();
        assert!(gate.is_generating() && !gate.is_active());

        gate.activate(TAB_A, "Biology", fixed_now()).unwrap();
        assert!(gate.is_active() && !gate.is_generating());
        assert_eq!(gate.subject(), Some("Biology"));
        assert_eq!(gate.active_tab(), Some(TAB_A));
    }

    #[test]
    fn reclaim_by_the_same_tab_supersedes_the_old_ticket() {
        let mut gate = QuizGate::new();
        let first = gate.begin_generation(TAB_A).unwrap();
        let second = gate.begin_generation(TAB_A).unwrap();
        assert_ne!(first, second);
        assert!(!gate.is_current(first));
        assert!(gate.is_current(second));
    }

    #[test]
    fn stale_failure_does_not_release_a_newer_claim() {
        let mut gate = QuizGate::new();
        let first = gate.begin_generation(TAB_A).unwrap();
        let second = gate.begin_generation(TAB_A).unwrap();

        assert!(!gate.fail_generation(first));
        assert!(gate.is_generating());

        assert!(gate.fail_generation(second));
        assert!(gate.is_idle());
    }

    #[test]
    fn fallback_can_activate_straight_from_idle() {
        let mut gate = QuizGate::new();
        gate.activate(TAB_A, "History", fixed_now()).unwrap();
        assert!(gate.is_active());
    }

    #[test]
    fn completion_is_owner_only() {
        let mut gate = QuizGate::new();
        gate.activate(TAB_A, "Biology", fixed_now()).unwrap();

        assert!(!gate.complete(TAB_B));
        assert!(gate.is_active());

        assert!(gate.complete(TAB_A));
        assert!(gate.is_idle());
    }

    #[test]
    fn redisplay_keeps_the_original_start_instant() {
        let mut gate = QuizGate::new();
        let t0 = fixed_now();
        gate.activate(TAB_A, "Biology", t0).unwrap();
        gate.activate(TAB_A, "Chemistry", t0 + chrono::Duration::minutes(2))
            .unwrap();
        assert_eq!(gate.active_since(), Some(t0));
        assert_eq!(gate.subject(), Some("Chemistry"));
    }

    #[test]
    fn release_clears_any_phase_held_by_the_tab() {
        let mut gate = QuizGate::new();
        gate.begin_generation(TAB_A).unwrap();
        assert!(!gate.release_if_held_by(TAB_B));
        assert!(gate.release_if_held_by(TAB_A));
        assert!(gate.is_idle());

        gate.activate(TAB_B, "Biology", fixed_now()).unwrap();
        assert!(gate.release_if_held_by(TAB_B));
        assert!(gate.is_idle());
    }

    #[test]
    fn reset_reports_whether_the_gate_was_engaged() {
        let mut gate = QuizGate::new();
        assert!(!gate.reset());
        gate.begin_generation(TAB_A).unwrap();
        assert!(gate.reset());
        assert!(gate.is_idle());
    }
}
