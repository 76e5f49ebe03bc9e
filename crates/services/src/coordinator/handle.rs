use tokio::sync::{mpsc, oneshot};

use gate_core::model::{QuizQuestion, SessionId, SessionSummary, TabId, VideoContext};

use crate::coordinator::protocol::{AnswerReceipt, Command, GateView, TabSignal};
use crate::error::CoordinatorError;

/// Cloneable client for the coordinator task.
///
/// Every method is one round trip over the command queue, so calls
/// from different tabs interleave at command granularity and observe
/// a consistent gate.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    /// Adds `tab` to the registry. Block and unblock signals arrive on
    /// the `signals` channel from now on; re-registering replaces the
    /// channel.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ChannelClosed`] when the
    /// coordinator is gone.
    pub async fn register_tab(
        &self,
        tab: TabId,
        signals: mpsc::Sender<TabSignal>,
    ) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::RegisterTab { tab, signals, reply }, rx)
            .await
    }

    /// Removes `tab` from the registry, releasing the quiz gate if the
    /// tab held it.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ChannelClosed`] when the
    /// coordinator is gone.
    pub async fn unregister_tab(&self, tab: TabId) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::UnregisterTab { tab, reply }, rx).await
    }

    /// Claims the quiz gate for `tab` and asks the generator for a
    /// question. The gate stays claimed on success; call
    /// [`mark_displayed`](Self::mark_displayed) once the quiz is on
    /// screen, or it will block nobody.
    ///
    /// # Errors
    ///
    /// Returns the gate refusal when another tab holds it,
    /// [`CoordinatorError::Generation`] when the generator fails (the
    /// gate is released), and [`CoordinatorError::Superseded`] when a
    /// newer request from the same tab replaced this one.
    pub async fn request_quiz(
        &self,
        tab: TabId,
        subject: impl Into<String>,
        context: VideoContext,
    ) -> Result<QuizQuestion, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::RequestQuiz {
                tab,
                subject: subject.into(),
                context,
                reply,
            },
            rx,
        )
        .await?
    }

    /// Records that `tab` now shows a quiz for `subject` and blocks
    /// every other tab. Also the entry point for fallback questions
    /// that never went through [`request_quiz`](Self::request_quiz).
    ///
    /// # Errors
    ///
    /// Returns the gate refusal when another tab holds it.
    pub async fn mark_displayed(
        &self,
        tab: TabId,
        subject: impl Into<String>,
    ) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::MarkDisplayed {
                tab,
                subject: subject.into(),
                reply,
            },
            rx,
        )
        .await?
    }

    /// Submits the answer for the quiz `tab` is showing.
    ///
    /// Not an error path: a tab that does not own the active quiz gets
    /// a receipt with `allowed: false` and nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ChannelClosed`] when the
    /// coordinator is gone.
    pub async fn submit_answer(
        &self,
        tab: TabId,
        correct: bool,
    ) -> Result<AnswerReceipt, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::SubmitAnswer { tab, correct, reply }, rx)
            .await
    }

    /// Reads the gate as `tab` should see it. Used on registration and
    /// periodically while blocked to repair missed signals.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ChannelClosed`] when the
    /// coordinator is gone.
    pub async fn check_state(&self, tab: TabId) -> Result<GateView, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::CheckState { tab, reply }, rx).await
    }

    /// Opens a study session for `subject`, replacing any session that
    /// is still running.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Session`] when the subject is
    /// blank. The running session, if any, is untouched in that case.
    pub async fn start_session(
        &self,
        subject: impl Into<String>,
    ) -> Result<SessionId, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(
            Command::StartSession {
                subject: subject.into(),
                reply,
            },
            rx,
        )
        .await?
    }

    /// Ends the current session, clears the gate, and unblocks every
    /// tab. `None` when no session was running.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Session`] when the summary cannot
    /// be built. The gate is cleared regardless.
    pub async fn end_session(&self) -> Result<Option<SessionSummary>, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::EndSession { reply }, rx).await?
    }

    /// Tears the session down without reporting a summary, for logout
    /// and similar paths. Never fails on session state: gate cleared,
    /// tabs unblocked, summary persisted best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ChannelClosed`] when the
    /// coordinator is gone.
    pub async fn force_end_session(&self) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::ForceEndSession { reply }, rx).await
    }

    /// Counts one watched short toward the current session's stats.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::ChannelClosed`] when the
    /// coordinator is gone.
    pub async fn video_watched(&self, tab: TabId) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.call(Command::VideoWatched { tab, reply }, rx).await
    }

    async fn call<T>(
        &self,
        command: Command,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, CoordinatorError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }
}
