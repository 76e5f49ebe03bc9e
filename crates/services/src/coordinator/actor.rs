use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gate_core::gate::{GenerationTicket, QuizGate};
use gate_core::model::{
    QuizQuestion, SessionId, SessionSummary, StudySession, TabId, VideoContext,
};
use gate_core::time::Clock;
use storage::repository::SessionStore;

use crate::coordinator::handle::CoordinatorHandle;
use crate::coordinator::protocol::{
    AnswerReceipt, BlockNotice, BlockReason, Command, GateView, TabSignal,
};
use crate::error::{CoordinatorError, GenerationError};
use crate::generation::QuizGenerator;

/// Sessions left alone this long are closed out automatically.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

const COMMAND_BUFFER: usize = 64;
const SIGNAL_BUFFER: usize = 16;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub session_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

/// Starts the coordinator task and returns a handle to it.
///
/// The task owns the quiz gate, the tab registry, and the current
/// study session, and is meant to live for the whole process. All
/// mutation goes through its command queue, so gate transitions are
/// serialized without locks.
pub fn spawn_coordinator(
    config: CoordinatorConfig,
    generator: Arc<dyn QuizGenerator>,
    sessions: Arc<dyn SessionStore>,
    clock: Clock,
) -> CoordinatorHandle {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let actor = Coordinator {
        gate: QuizGate::new(),
        tabs: HashMap::new(),
        session: None,
        cleanup: None,
        generator,
        sessions,
        clock,
        config,
        tx: tx.clone(),
    };
    tokio::spawn(actor.run(rx));
    CoordinatorHandle::new(tx)
}

/// Creates the signal channel a tab hands over at registration.
#[must_use]
pub fn signal_channel() -> (mpsc::Sender<TabSignal>, mpsc::Receiver<TabSignal>) {
    mpsc::channel(SIGNAL_BUFFER)
}

struct Coordinator {
    gate: QuizGate,
    tabs: HashMap<TabId, mpsc::Sender<TabSignal>>,
    session: Option<StudySession>,
    cleanup: Option<JoinHandle<()>>,
    generator: Arc<dyn QuizGenerator>,
    sessions: Arc<dyn SessionStore>,
    clock: Clock,
    config: CoordinatorConfig,
    /// Feeds generation results and expiry timers back into the
    /// command queue.
    tx: mpsc::Sender<Command>,
}

impl Coordinator {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        debug!("coordinator started");
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        self.disarm_cleanup();
        debug!("coordinator stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::RegisterTab { tab, signals, reply } => {
                self.register_tab(tab, signals);
                let _ = reply.send(());
            }
            Command::UnregisterTab { tab, reply } => {
                self.unregister_tab(tab);
                let _ = reply.send(());
            }
            Command::RequestQuiz {
                tab,
                subject,
                context,
                reply,
            } => self.request_quiz(tab, subject, context, reply),
            Command::GenerationResolved {
                ticket,
                outcome,
                reply,
            } => self.generation_resolved(ticket, outcome, reply),
            Command::MarkDisplayed { tab, subject, reply } => {
                let _ = reply.send(self.mark_displayed(tab, subject));
            }
            Command::SubmitAnswer { tab, correct, reply } => {
                let _ = reply.send(self.submit_answer(tab, correct));
            }
            Command::CheckState { tab, reply } => {
                let _ = reply.send(self.view_for(tab));
            }
            Command::StartSession { subject, reply } => {
                let _ = reply.send(self.start_session(subject).await);
            }
            Command::EndSession { reply } => {
                let _ = reply.send(self.end_session().await);
            }
            Command::ForceEndSession { reply } => {
                self.force_end().await;
                let _ = reply.send(());
            }
            Command::VideoWatched { tab, reply } => {
                self.video_watched(tab);
                let _ = reply.send(());
            }
            Command::SessionExpired { session } => self.session_expired(session).await,
        }
    }

    fn register_tab(&mut self, tab: TabId, signals: mpsc::Sender<TabSignal>) {
        debug!(%tab, "tab registered");
        self.tabs.insert(tab, signals);
    }

    fn unregister_tab(&mut self, tab: TabId) {
        if self.tabs.remove(&tab).is_none() {
            return;
        }
        debug!(%tab, "tab unregistered");
        if self.gate.release_if_held_by(tab) {
            warn!(%tab, "tab left while holding the quiz gate");
            self.broadcast(TabSignal::Unblock, None);
        }
    }

    fn request_quiz(
        &mut self,
        tab: TabId,
        subject: String,
        context: VideoContext,
        reply: oneshot::Sender<Result<QuizQuestion, CoordinatorError>>,
    ) {
        let ticket = match self.gate.begin_generation(tab) {
            Ok(ticket) => ticket,
            Err(err) => {
                debug!(%tab, holder = ?self.gate.holder(), "quiz request refused");
                let _ = reply.send(Err(err.into()));
                return;
            }
        };
        debug!(%tab, subject, "quiz generation started");

        // The generator may be slow or hang on the network, so it runs
        // off the coordinator task and reports back with its ticket.
        let generator = Arc::clone(&self.generator);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = generator.generate(&subject, &context).await;
            let _ = tx
                .send(Command::GenerationResolved {
                    ticket,
                    outcome,
                    reply,
                })
                .await;
        });
    }

    fn generation_resolved(
        &mut self,
        ticket: GenerationTicket,
        outcome: Result<QuizQuestion, GenerationError>,
        reply: oneshot::Sender<Result<QuizQuestion, CoordinatorError>>,
    ) {
        if !self.gate.is_current(ticket) {
            debug!(?ticket, "stale generation result dropped");
            let _ = reply.send(Err(CoordinatorError::Superseded));
            return;
        }
        match outcome {
            // The gate stays in its generating phase until the caller
            // confirms the quiz is on screen via mark_displayed.
            Ok(question) => {
                let _ = reply.send(Ok(question));
            }
            Err(err) => {
                self.gate.fail_generation(ticket);
                warn!(error = %err, "quiz generation failed");
                let _ = reply.send(Err(CoordinatorError::Generation(err)));
            }
        }
    }

    fn mark_displayed(&mut self, tab: TabId, subject: String) -> Result<(), CoordinatorError> {
        let now = self.clock.now();
        self.gate.activate(tab, subject.clone(), now)?;
        info!(%tab, subject, "quiz displayed, blocking other tabs");
        if let Some(session) = self.session.as_mut() {
            session.record_quiz_shown(now);
        }
        self.broadcast(
            TabSignal::Block(BlockNotice {
                reason: BlockReason::QuizInProgress,
                subject,
            }),
            Some(tab),
        );
        Ok(())
    }

    fn submit_answer(&mut self, tab: TabId, correct: bool) -> AnswerReceipt {
        if !self.gate.complete(tab) {
            debug!(%tab, "answer rejected, tab does not own the active quiz");
            return AnswerReceipt {
                allowed: false,
                correct,
            };
        }
        info!(%tab, correct, "quiz answered, unblocking");
        if let Some(session) = self.session.as_mut() {
            session.record_answer(correct, self.clock.now());
        }
        self.broadcast(TabSignal::Unblock, None);
        AnswerReceipt {
            allowed: true,
            correct,
        }
    }

    fn view_for(&self, tab: TabId) -> GateView {
        let active_tab = self.gate.active_tab();
        GateView {
            is_blocked: self.gate.is_active() && active_tab != Some(tab),
            is_active_quiz_tab: active_tab == Some(tab),
            subject: self.gate.subject().map(str::to_string),
            elapsed: self
                .gate
                .active_since()
                .map(|since| self.clock.elapsed_since(since)),
        }
    }

    async fn start_session(&mut self, subject: String) -> Result<SessionId, CoordinatorError> {
        let session = StudySession::start(subject, self.clock.now())?;
        let id = session.id();
        if let Some(previous) = self.session.take() {
            info!(session = %previous.id(), "closing previous session first");
            self.end_gating();
            self.close_out(previous, "replaced").await;
        }
        info!(session = %id, subject = session.subject(), "study session started");
        self.session = Some(session);
        self.arm_cleanup(id);
        Ok(id)
    }

    async fn end_session(&mut self) -> Result<Option<SessionSummary>, CoordinatorError> {
        self.disarm_cleanup();
        self.end_gating();
        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        let id = session.id();
        let summary = session.into_summary(self.clock.now())?;
        if let Err(err) = self.sessions.append_summary(&summary).await {
            warn!(session = %id, error = %err, "failed to persist session summary");
        }
        info!(session = %id, "study session ended");
        Ok(Some(summary))
    }

    async fn force_end(&mut self) {
        self.disarm_cleanup();
        self.end_gating();
        if let Some(session) = self.session.take() {
            self.close_out(session, "forced").await;
        }
    }

    async fn session_expired(&mut self, session: SessionId) {
        if self.session.as_ref().map(StudySession::id) != Some(session) {
            debug!(%session, "expiry for a session that is no longer current");
            return;
        }
        info!(%session, "study session expired");
        self.disarm_cleanup();
        self.end_gating();
        if let Some(expired) = self.session.take() {
            self.close_out(expired, "expired").await;
        }
    }

    fn video_watched(&mut self, tab: TabId) {
        debug!(%tab, "short watched");
        if let Some(session) = self.session.as_mut() {
            session.record_video(self.clock.now());
        }
    }

    /// Best-effort teardown of a session that ends without its caller
    /// waiting for the summary.
    async fn close_out(&mut self, session: StudySession, reason: &str) {
        let id = session.id();
        match session.into_summary(self.clock.now()) {
            Ok(summary) => {
                if let Err(err) = self.sessions.append_summary(&summary).await {
                    warn!(session = %id, error = %err, "failed to persist session summary");
                }
                info!(session = %id, reason, "study session closed");
            }
            Err(err) => warn!(session = %id, error = %err, "failed to summarize session"),
        }
    }

    /// Clears the gate and tells every tab to resume. Safe to call
    /// with an idle gate.
    fn end_gating(&mut self) {
        if self.gate.reset() {
            debug!("quiz gate cleared");
        }
        self.broadcast(TabSignal::Unblock, None);
    }

    /// Delivers a signal to every registered tab except `except`.
    ///
    /// A tab whose channel is gone or full is pruned on the spot; the
    /// rest of the fan-out is never aborted.
    fn broadcast(&mut self, signal: TabSignal, except: Option<TabId>) {
        let mut unreachable = Vec::new();
        for (tab, signals) in &self.tabs {
            if Some(*tab) == except {
                continue;
            }
            if signals.try_send(signal.clone()).is_err() {
                unreachable.push(*tab);
            }
        }
        for tab in unreachable {
            warn!(%tab, "tab unreachable, pruning");
            self.unregister_tab(tab);
        }
    }

    fn arm_cleanup(&mut self, session: SessionId) {
        self.disarm_cleanup();
        let timeout = self.config.session_timeout;
        let tx = self.tx.clone();
        self.cleanup = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(Command::SessionExpired { session }).await;
        }));
    }

    fn disarm_cleanup(&mut self) {
        if let Some(timer) = self.cleanup.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use gate_core::gate::GateError;
    use gate_core::time::fixed_clock;
    use storage::repository::Storage;

    const TAB_A: TabId = TabId::new(1);
    const TAB_B: TabId = TabId::new(2);
    const TAB_C: TabId = TabId::new(3);

    enum Script {
        Ok(QuizQuestion),
        Fail,
        Stall {
            entered: Arc<Notify>,
            release: Arc<Notify>,
            question: QuizQuestion,
        },
    }

    struct ScriptedGenerator {
        scripts: Mutex<VecDeque<Script>>,
    }

    #[async_trait]
    impl QuizGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _subject: &str,
            _context: &VideoContext,
        ) -> Result<QuizQuestion, GenerationError> {
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(Script::Ok(question)) => Ok(question),
                Some(Script::Stall {
                    entered,
                    release,
                    question,
                }) => {
                    entered.notify_one();
                    release.notified().await;
                    Ok(question)
                }
                Some(Script::Fail) | None => Err(GenerationError::EmptyResponse),
            }
        }
    }

    fn scripted(scripts: Vec<Script>) -> Arc<ScriptedGenerator> {
        Arc::new(ScriptedGenerator {
            scripts: Mutex::new(scripts.into()),
        })
    }

    fn question() -> QuizQuestion {
        QuizQuestion::true_false("Water boils at 100C at sea level.", true, "At one atmosphere.")
            .unwrap()
    }

    fn boot(generator: Arc<dyn QuizGenerator>) -> CoordinatorHandle {
        spawn_coordinator(
            CoordinatorConfig::default(),
            generator,
            Storage::in_memory().sessions,
            fixed_clock(),
        )
    }

    async fn register(handle: &CoordinatorHandle, tab: TabId) -> mpsc::Receiver<TabSignal> {
        let (tx, rx) = signal_channel();
        handle.register_tab(tab, tx).await.unwrap();
        rx
    }

    #[tokio::test]
    async fn gate_is_exclusive_until_answered() {
        let handle = boot(scripted(vec![Script::Ok(question())]));
        let _a_rx = register(&handle, TAB_A).await;
        let mut b_rx = register(&handle, TAB_B).await;

        let q = handle
            .request_quiz(TAB_A, "Biology", VideoContext::default())
            .await
            .unwrap();
        let refused = handle
            .request_quiz(TAB_B, "Biology", VideoContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            refused,
            CoordinatorError::Gate(GateError::AlreadyHeld { holder: TAB_A })
        ));

        handle.mark_displayed(TAB_A, "Biology").await.unwrap();
        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Block(_)));

        let receipt = handle
            .submit_answer(TAB_A, q.is_correct(0))
            .await
            .unwrap();
        assert!(receipt.allowed);
        assert!(receipt.correct);
        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Unblock));
    }

    #[tokio::test]
    async fn failed_generation_releases_the_gate() {
        let handle = boot(scripted(vec![Script::Fail, Script::Ok(question())]));
        let _a_rx = register(&handle, TAB_A).await;
        let _b_rx = register(&handle, TAB_B).await;

        let err = handle
            .request_quiz(TAB_A, "Math", VideoContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Generation(_)));

        handle
            .request_quiz(TAB_B, "Math", VideoContext::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fallback_display_blocks_even_after_failure() {
        let handle = boot(scripted(vec![Script::Fail]));
        let _a_rx = register(&handle, TAB_A).await;
        let mut b_rx = register(&handle, TAB_B).await;

        handle
            .request_quiz(TAB_A, "Math", VideoContext::default())
            .await
            .unwrap_err();
        handle.mark_displayed(TAB_A, "Math").await.unwrap();
        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Block(_)));

        let view = handle.check_state(TAB_B).await.unwrap();
        assert!(view.is_blocked);
        assert!(!view.is_active_quiz_tab);
        assert_eq!(view.subject.as_deref(), Some("Math"));

        let own = handle.check_state(TAB_A).await.unwrap();
        assert!(!own.is_blocked);
        assert!(own.is_active_quiz_tab);
    }

    #[tokio::test]
    async fn newer_request_supersedes_the_pending_one() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let handle = boot(scripted(vec![
            Script::Stall {
                entered: Arc::clone(&entered),
                release: Arc::clone(&release),
                question: question(),
            },
            Script::Ok(question()),
        ]));
        let _a_rx = register(&handle, TAB_A).await;

        let first = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle
                    .request_quiz(TAB_A, "Biology", VideoContext::default())
                    .await
            })
        };
        entered.notified().await;

        handle
            .request_quiz(TAB_A, "Biology", VideoContext::default())
            .await
            .unwrap();

        release.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(first, Err(CoordinatorError::Superseded)));
    }

    #[tokio::test]
    async fn answers_from_other_tabs_are_not_allowed() {
        let handle = boot(scripted(vec![Script::Ok(question())]));
        let _a_rx = register(&handle, TAB_A).await;
        let _b_rx = register(&handle, TAB_B).await;

        handle
            .request_quiz(TAB_A, "Biology", VideoContext::default())
            .await
            .unwrap();
        handle.mark_displayed(TAB_A, "Biology").await.unwrap();

        let receipt = handle.submit_answer(TAB_B, true).await.unwrap();
        assert!(!receipt.allowed);

        let view = handle.check_state(TAB_A).await.unwrap();
        assert!(view.is_active_quiz_tab);
    }

    #[tokio::test]
    async fn unreachable_tabs_are_pruned_without_aborting_the_fanout() {
        let handle = boot(scripted(vec![Script::Ok(question())]));
        let _a_rx = register(&handle, TAB_A).await;
        let b_rx = register(&handle, TAB_B).await;
        let mut c_rx = register(&handle, TAB_C).await;
        drop(b_rx);

        handle
            .request_quiz(TAB_A, "Biology", VideoContext::default())
            .await
            .unwrap();
        handle.mark_displayed(TAB_A, "Biology").await.unwrap();
        assert!(matches!(c_rx.recv().await.unwrap(), TabSignal::Block(_)));

        handle.submit_answer(TAB_A, true).await.unwrap();
        assert!(matches!(c_rx.recv().await.unwrap(), TabSignal::Unblock));
    }

    #[tokio::test]
    async fn unregistering_the_quiz_tab_unblocks_everyone() {
        let handle = boot(scripted(vec![Script::Ok(question())]));
        let _a_rx = register(&handle, TAB_A).await;
        let mut b_rx = register(&handle, TAB_B).await;

        handle
            .request_quiz(TAB_A, "Biology", VideoContext::default())
            .await
            .unwrap();
        handle.mark_displayed(TAB_A, "Biology").await.unwrap();
        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Block(_)));

        handle.unregister_tab(TAB_A).await.unwrap();
        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Unblock));

        let view = handle.check_state(TAB_B).await.unwrap();
        assert!(!view.is_blocked);
    }

    #[tokio::test]
    async fn reregistering_a_tab_replaces_its_signal_channel() {
        let handle = boot(scripted(vec![Script::Ok(question())]));
        let _a_rx = register(&handle, TAB_A).await;
        let mut old_rx = register(&handle, TAB_B).await;
        let mut new_rx = register(&handle, TAB_B).await;

        handle
            .request_quiz(TAB_A, "Biology", VideoContext::default())
            .await
            .unwrap();
        handle.mark_displayed(TAB_A, "Biology").await.unwrap();

        assert!(matches!(new_rx.recv().await.unwrap(), TabSignal::Block(_)));
        assert!(old_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn session_collects_stats_and_persists_on_end() {
        let storage = Storage::in_memory();
        let handle = spawn_coordinator(
            CoordinatorConfig::default(),
            scripted(vec![Script::Ok(question())]),
            Arc::clone(&storage.sessions),
            fixed_clock(),
        );
        let _a_rx = register(&handle, TAB_A).await;

        let id = handle.start_session("Biology").await.unwrap();
        handle.video_watched(TAB_A).await.unwrap();
        handle.video_watched(TAB_A).await.unwrap();
        handle
            .request_quiz(TAB_A, "Biology", VideoContext::default())
            .await
            .unwrap();
        handle.mark_displayed(TAB_A, "Biology").await.unwrap();
        handle.submit_answer(TAB_A, true).await.unwrap();

        let summary = handle.end_session().await.unwrap().unwrap();
        assert_eq!(summary.session_id(), id);
        assert_eq!(summary.stats().videos_watched(), 2);
        assert_eq!(summary.stats().quiz_count(), 1);
        assert_eq!(summary.stats().correct_answers(), 1);
        assert_eq!(summary.stats().total_answers(), 1);

        let stored = storage.sessions.recent_summaries(5).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].subject(), "Biology");

        assert!(handle.end_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ending_a_session_clears_a_quiz_in_flight() {
        let handle = boot(scripted(vec![Script::Ok(question())]));
        let _a_rx = register(&handle, TAB_A).await;
        let mut b_rx = register(&handle, TAB_B).await;

        handle.start_session("History").await.unwrap();
        handle
            .request_quiz(TAB_A, "History", VideoContext::default())
            .await
            .unwrap();
        handle.mark_displayed(TAB_A, "History").await.unwrap();
        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Block(_)));

        handle.end_session().await.unwrap();
        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Unblock));

        let view = handle.check_state(TAB_A).await.unwrap();
        assert!(!view.is_active_quiz_tab);
        assert!(!view.is_blocked);
    }

    #[tokio::test]
    async fn rejected_session_start_keeps_the_current_session() {
        let handle = boot(scripted(vec![]));

        let id = handle.start_session("Biology").await.unwrap();
        let err = handle.start_session("   ").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Session(_)));

        let summary = handle.end_session().await.unwrap().unwrap();
        assert_eq!(summary.session_id(), id);
    }

    #[tokio::test]
    async fn force_end_always_unblocks() {
        let handle = boot(scripted(vec![]));
        let mut a_rx = register(&handle, TAB_A).await;

        handle.force_end_session().await.unwrap();
        assert!(matches!(a_rx.recv().await.unwrap(), TabSignal::Unblock));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire_and_unblock() {
        let handle = spawn_coordinator(
            CoordinatorConfig {
                session_timeout: Duration::from_secs(60),
            },
            scripted(vec![Script::Ok(question())]),
            Storage::in_memory().sessions,
            Clock::default(),
        );
        let _a_rx = register(&handle, TAB_A).await;
        let mut b_rx = register(&handle, TAB_B).await;

        handle.start_session("Biology").await.unwrap();
        handle
            .request_quiz(TAB_A, "Biology", VideoContext::default())
            .await
            .unwrap();
        handle.mark_displayed(TAB_A, "Biology").await.unwrap();
        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Block(_)));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(matches!(b_rx.recv().await.unwrap(), TabSignal::Unblock));
        assert!(handle.end_session().await.unwrap().is_none());
        let view = handle.check_state(TAB_A).await.unwrap();
        assert!(!view.is_active_quiz_tab);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_new_session_rearms_the_expiry_timer() {
        let storage = Storage::in_memory();
        let handle = spawn_coordinator(
            CoordinatorConfig {
                session_timeout: Duration::from_secs(60),
            },
            scripted(vec![]),
            Arc::clone(&storage.sessions),
            Clock::default(),
        );

        let first = handle.start_session("Biology").await.unwrap();
        tokio::time::sleep(Duration::from_secs(40)).await;
        let second = handle.start_session("Chemistry").await.unwrap();
        assert_ne!(first, second);

        // the first session's timer would have fired at t=60 here
        tokio::time::sleep(Duration::from_secs(40)).await;
        let summary = handle.end_session().await.unwrap().unwrap();
        assert_eq!(summary.session_id(), second);

        let stored = storage.sessions.recent_summaries(5).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].subject(), "Chemistry");
        assert_eq!(stored[1].subject(), "Biology");
    }
}
