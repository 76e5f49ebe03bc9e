//! Domain types shared across the workspace.

pub mod ids;
pub mod question;
pub mod session;
pub mod settings;
pub mod video;

pub use ids::{ParseIdError, SessionId, TabId, VideoId};
pub use question::{
    AnswerExplanations, QuestionDraft, QuestionError, QuestionKind, QuizQuestion,
};
pub use session::{SessionError, SessionStats, SessionSummary, StudySession};
pub use settings::{DEFAULT_QUIZ_FREQUENCY, GateSettings, GateSettingsDraft, SettingsError};
pub use video::{VideoContext, VideoMetadata};
