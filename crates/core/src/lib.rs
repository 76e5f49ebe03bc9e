//! Domain logic for the study gate: the quiz lock, transcript
//! accumulation, retry scheduling, and short-video detection.
//!
//! Everything here is synchronous and side-effect free. Time comes in
//! through [`Clock`] or explicit instants, storage and transport live
//! in the other crates.

#![forbid(unsafe_code)]

pub mod gate;
pub mod model;
pub mod platform;
pub mod retry;
pub mod time;
pub mod transcript;

pub use gate::{GateError, GenerationTicket, QuizGate};
pub use model::{
    GateSettings, QuizQuestion, SessionId, SessionStats, SessionSummary, StudySession, TabId,
    VideoContext, VideoId,
};
pub use platform::{Platform, ShortPage};
pub use retry::{DEFAULT_RETRY_SKIP, RetryQueue};
pub use time::Clock;
pub use transcript::TranscriptAccumulator;
