use tokio::sync::{mpsc, oneshot};

use gate_core::gate::GenerationTicket;
use gate_core::model::{QuizQuestion, SessionId, SessionSummary, TabId, VideoContext};

use crate::error::{CoordinatorError, GenerationError};

/// Push notification delivered to a registered tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabSignal {
    /// Another tab is running a quiz. Stop playback and cover the feed.
    Block(BlockNotice),
    /// The quiz finished. The tab may resume.
    Unblock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNotice {
    pub reason: BlockReason,
    pub subject: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BlockReason {
    QuizInProgress,
}

/// Answer to a tab's state probe, used to reconcile after missed
/// signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateView {
    pub is_blocked: bool,
    pub is_active_quiz_tab: bool,
    pub subject: Option<String>,
    pub elapsed: Option<chrono::Duration>,
}

/// Outcome of submitting an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReceipt {
    /// False when the submitting tab does not own the active quiz. The
    /// submission changed nothing in that case.
    pub allowed: bool,
    pub correct: bool,
}

pub(crate) enum Command {
    RegisterTab {
        tab: TabId,
        signals: mpsc::Sender<TabSignal>,
        reply: oneshot::Sender<()>,
    },
    UnregisterTab {
        tab: TabId,
        reply: oneshot::Sender<()>,
    },
    RequestQuiz {
        tab: TabId,
        subject: String,
        context: VideoContext,
        reply: oneshot::Sender<Result<QuizQuestion, CoordinatorError>>,
    },
    GenerationResolved {
        ticket: GenerationTicket,
        outcome: Result<QuizQuestion, GenerationError>,
        reply: oneshot::Sender<Result<QuizQuestion, CoordinatorError>>,
    },
    MarkDisplayed {
        tab: TabId,
        subject: String,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    SubmitAnswer {
        tab: TabId,
        correct: bool,
        reply: oneshot::Sender<AnswerReceipt>,
    },
    CheckState {
        tab: TabId,
        reply: oneshot::Sender<GateView>,
    },
    StartSession {
        subject: String,
        reply: oneshot::Sender<Result<SessionId, CoordinatorError>>,
    },
    EndSession {
        reply: oneshot::Sender<Result<Option<SessionSummary>, CoordinatorError>>,
    },
    ForceEndSession {
        reply: oneshot::Sender<()>,
    },
    VideoWatched {
        tab: TabId,
        reply: oneshot::Sender<()>,
    },
    SessionExpired {
        session: SessionId,
    },
}
