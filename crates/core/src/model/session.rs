use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::ids::SessionId;

/// Why session data was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session subject cannot be empty")]
    EmptySubject,
    #[error("session ended before it started")]
    InvalidTimeRange,
    #[error("correct answers ({correct}) exceed total answers ({total})")]
    CountMismatch { correct: u32, total: u32 },
}

/// Counters accumulated over one study session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    quiz_count: u32,
    correct_answers: u32,
    total_answers: u32,
    videos_watched: u32,
}

impl SessionStats {
    #[must_use]
    pub fn new() -> Self {
        SessionStats::default()
    }

    /// Rebuilds counters from a persisted row.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CountMismatch`] when more answers are
    /// marked correct than were given at all.
    pub fn from_persisted(
        quiz_count: u32,
        correct_answers: u32,
        total_answers: u32,
        videos_watched: u32,
    ) -> Result<Self, SessionError> {
        if correct_answers > total_answers {
            return Err(SessionError::CountMismatch {
                correct: correct_answers,
                total: total_answers,
            });
        }
        Ok(SessionStats {
            quiz_count,
            correct_answers,
            total_answers,
            videos_watched,
        })
    }

    pub(crate) fn record_quiz_shown(&mut self) {
        self.quiz_count = self.quiz_count.saturating_add(1);
    }

    pub(crate) fn record_answer(&mut self, correct: bool) {
        self.total_answers = self.total_answers.saturating_add(1);
        if correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
        }
    }

    pub(crate) fn record_video(&mut self) {
        self.videos_watched = self.videos_watched.saturating_add(1);
    }

    #[must_use]
    pub fn quiz_count(&self) -> u32 {
        self.quiz_count
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn total_answers(&self) -> u32 {
        self.total_answers
    }

    #[must_use]
    pub fn videos_watched(&self) -> u32 {
        self.videos_watched
    }

    /// Share of answers that were correct, or `None` before the first
    /// answer.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        if self.total_answers == 0 {
            return None;
        }
        Some(f64::from(self.correct_answers) / f64::from(self.total_answers))
    }
}

/// A live study session.
///
/// Activity timestamps drive the inactivity timeout: every recorded
/// quiz, answer, or watched video refreshes `last_activity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySession {
    id: SessionId,
    subject: String,
    started_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    stats: SessionStats,
}

impl StudySession {
    /// Opens a session for `subject` at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptySubject`] when the subject is
    /// blank.
    pub fn start(subject: impl Into<String>, now: DateTime<Utc>) -> Result<Self, SessionError> {
        let subject = subject.into().trim().to_string();
        if subject.is_empty() {
            return Err(SessionError::EmptySubject);
        }
        Ok(StudySession {
            id: SessionId::generate(),
            subject,
            started_at: now,
            last_activity: now,
            stats: SessionStats::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity
    }

    pub fn record_quiz_shown(&mut self, now: DateTime<Utc>) {
        self.stats.record_quiz_shown();
        self.last_activity = now;
    }

    pub fn record_answer(&mut self, correct: bool, now: DateTime<Utc>) {
        self.stats.record_answer(correct);
        self.last_activity = now;
    }

    pub fn record_video(&mut self, now: DateTime<Utc>) {
        self.stats.record_video();
        self.last_activity = now;
    }

    /// Closes the session and produces the summary to persist.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTimeRange`] when `ended_at`
    /// precedes the session start.
    pub fn into_summary(self, ended_at: DateTime<Utc>) -> Result<SessionSummary, SessionError> {
        if ended_at < self.started_at {
            return Err(SessionError::InvalidTimeRange);
        }
        Ok(SessionSummary {
            session_id: self.id,
            subject: self.subject,
            started_at: self.started_at,
            ended_at,
            stats: self.stats,
        })
    }
}

/// The durable record of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    session_id: SessionId,
    subject: String,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    stats: SessionStats,
}

impl SessionSummary {
    /// Rebuilds a summary from a persisted row.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptySubject`] for a blank subject and
    /// [`SessionError::InvalidTimeRange`] when the end precedes the
    /// start.
    pub fn from_persisted(
        session_id: SessionId,
        subject: impl Into<String>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        stats: SessionStats,
    ) -> Result<Self, SessionError> {
        let subject = subject.into().trim().to_string();
        if subject.is_empty() {
            return Err(SessionError::EmptySubject);
        }
        if ended_at < started_at {
            return Err(SessionError::InvalidTimeRange);
        }
        Ok(SessionSummary {
            session_id,
            subject,
            started_at,
            ended_at,
            stats,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}
