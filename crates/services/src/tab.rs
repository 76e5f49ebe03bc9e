//! Per-tab gate agent.
//!
//! One `TabAgent` runs per browsing surface. It watches page events,
//! counts shorts against the quiz frequency, claims the quiz gate at
//! the right moments, and applies block and unblock signals from the
//! coordinator to its own screen and player.

use std::mem;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use gate_core::model::{
    GateSettings, QuizQuestion, TabId, VideoContext, VideoId, VideoMetadata,
};
use gate_core::platform::Platform;
use gate_core::retry::{DEFAULT_RETRY_SKIP, RetryQueue};
use gate_core::time::Clock;
use gate_core::transcript::TranscriptAccumulator;
use storage::repository::Storage;

use crate::coordinator::{CoordinatorHandle, TabSignal, signal_channel};
use crate::error::{CoordinatorError, TabError};
use crate::generation::QuestionBank;

/// How often a blocked tab re-checks the gate in case an unblock
/// signal was lost.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

/// Playback control surface of the page the tab is showing.
pub trait VideoPlayer: Send + Sync {
    fn is_paused(&self) -> bool;
    fn pause(&mut self);
    fn resume(&mut self);
}

/// What the tab is rendering over the feed.
#[derive(Debug)]
pub enum ScreenState {
    Watching,
    Blocked { subject: String },
    Quiz {
        question: QuizQuestion,
        origin: QuestionOrigin,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOrigin {
    Generated,
    Fallback,
    Retry,
}

impl QuestionOrigin {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            QuestionOrigin::Generated => "generated",
            QuestionOrigin::Fallback => "fallback",
            QuestionOrigin::Retry => "retry",
        }
    }
}

/// Page-level happenings fed in by the platform observer or the
/// embedder.
#[derive(Debug, Clone, PartialEq)]
pub enum TabEvent {
    ShortOpened { platform: Platform, video: VideoId },
    MetadataExtracted(VideoMetadata),
    Captions(String),
    Progress {
        position_secs: f64,
        duration_secs: f64,
    },
    VideoEnded,
    AnswerSelected(usize),
    LeftShorts,
}

#[derive(Debug, Clone)]
pub struct TabConfig {
    /// Study subject quizzes for this tab are generated about.
    pub subject: String,
    pub retry_skip: u32,
    pub reconcile_every: Duration,
}

impl TabConfig {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            retry_skip: DEFAULT_RETRY_SKIP,
            reconcile_every: DEFAULT_RECONCILE_INTERVAL,
        }
    }
}

pub struct TabAgent {
    tab: TabId,
    config: TabConfig,
    coordinator: CoordinatorHandle,
    storage: Storage,
    bank: QuestionBank,
    clock: Clock,
    player: Box<dyn VideoPlayer>,
    screen: ScreenState,
    signals: mpsc::Receiver<TabSignal>,
    current_video: Option<VideoId>,
    platform: Option<Platform>,
    metadata: Option<VideoMetadata>,
    transcript: Option<TranscriptAccumulator>,
    live_caption: String,
    retry: RetryQueue,
    /// Whether playback should restart when the current overlay goes
    /// away. False when the user had paused the video themselves.
    resume_on_clear: bool,
}

impl TabAgent {
    /// Registers the tab with the coordinator and reconciles against
    /// the current gate, so a tab opened mid-quiz starts out blocked.
    ///
    /// # Errors
    ///
    /// Returns `TabError` when the coordinator is unreachable.
    pub async fn register(
        tab: TabId,
        config: TabConfig,
        coordinator: CoordinatorHandle,
        storage: Storage,
        clock: Clock,
        player: Box<dyn VideoPlayer>,
    ) -> Result<Self, TabError> {
        let (signal_tx, signal_rx) = signal_channel();
        coordinator.register_tab(tab, signal_tx).await?;
        let retry = RetryQueue::new(config.retry_skip);
        let mut agent = TabAgent {
            tab,
            config,
            coordinator,
            storage,
            bank: QuestionBank::new(),
            clock,
            player,
            screen: ScreenState::Watching,
            signals: signal_rx,
            current_video: None,
            platform: None,
            metadata: None,
            transcript: None,
            live_caption: String::new(),
            retry,
            resume_on_clear: false,
        };
        agent.reconcile().await?;
        Ok(agent)
    }

    #[must_use]
    pub fn tab(&self) -> TabId {
        self.tab
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.config.subject
    }

    #[must_use]
    pub fn screen(&self) -> &ScreenState {
        &self.screen
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self.screen, ScreenState::Blocked { .. })
    }

    /// The question on screen, if a quiz is showing.
    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match &self.screen {
            ScreenState::Quiz { question, .. } => Some(question),
            _ => None,
        }
    }

    /// Applies pending coordinator signals, then processes one event.
    ///
    /// # Errors
    ///
    /// Returns `TabError` for storage failures or a lost coordinator.
    /// Losing a race for the quiz gate is not an error.
    pub async fn handle_event(&mut self, event: TabEvent) -> Result<(), TabError> {
        self.drain_signals();
        match event {
            TabEvent::ShortOpened { platform, video } => self.open_short(platform, video).await?,
            TabEvent::MetadataExtracted(metadata) => self.metadata = Some(metadata),
            TabEvent::Captions(text) => self.observe_captions(&text),
            TabEvent::Progress {
                position_secs,
                duration_secs,
            } => {
                if let Some(transcript) = self.transcript.as_mut() {
                    transcript.observe_progress(position_secs, duration_secs);
                }
            }
            TabEvent::VideoEnded => {
                if let Some(transcript) = self.transcript.as_mut() {
                    transcript.mark_complete();
                }
            }
            TabEvent::AnswerSelected(choice) => self.answer(choice).await?,
            TabEvent::LeftShorts => self.left_shorts(),
        }
        Ok(())
    }

    /// Drives the agent from a live event stream. Returns when the
    /// stream closes, unregistering the tab on the way out.
    ///
    /// # Errors
    ///
    /// Returns `TabError` when event handling fails.
    pub async fn run(mut self, mut events: mpsc::Receiver<TabEvent>) -> Result<(), TabError> {
        // Swap the signal receiver into a local so the select arms do
        // not hold a borrow of the agent while the handlers need one.
        let mut signals = {
            let (closed_tx, closed_rx) = mpsc::channel(1);
            drop(closed_tx);
            mem::replace(&mut self.signals, closed_rx)
        };

        let mut reconcile = tokio::time::interval(self.config.reconcile_every);
        reconcile.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                signal = signals.recv() => match signal {
                    Some(signal) => self.apply_signal(signal),
                    None => break,
                },
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => break,
                },
                _ = reconcile.tick(), if self.is_blocked() => {
                    self.reconcile().await?;
                }
            }
        }

        match self.coordinator.unregister_tab(self.tab).await {
            Ok(()) | Err(CoordinatorError::ChannelClosed) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn open_short(&mut self, platform: Platform, video: VideoId) -> Result<(), TabError> {
        if !matches!(self.screen, ScreenState::Watching) {
            debug!(tab = %self.tab, "short opened while not watching, ignored");
            return Ok(());
        }
        if self.current_video.as_ref() == Some(&video) {
            return Ok(());
        }
        debug!(tab = %self.tab, %platform, %video, "short opened");
        self.platform = Some(platform);
        self.metadata = None;
        self.live_caption.clear();
        self.current_video = Some(video);

        if let Err(err) = self.coordinator.video_watched(self.tab).await {
            warn!(tab = %self.tab, error = %err, "failed to report a watched short");
        }

        let settings = self.load_settings().await;
        if !settings.enabled() {
            return Ok(());
        }
        let count = self.storage.views.record_view(self.tab).await?;
        if count < settings.quiz_frequency() {
            return Ok(());
        }
        self.storage.views.reset_views(self.tab).await?;
        self.quiz_opportunity().await;
        Ok(())
    }

    async fn quiz_opportunity(&mut self) {
        if self.retry.due() {
            if let Err(err) = self
                .coordinator
                .mark_displayed(self.tab, self.config.subject.clone())
                .await
            {
                self.contention("retry display refused", &err);
                return;
            }
            if let Some(question) = self.retry.pop_due() {
                info!(tab = %self.tab, "retrying a previously missed question");
                self.show(question, QuestionOrigin::Retry);
            }
            return;
        }

        self.retry.tick();
        let context = self.build_context();
        match self
            .coordinator
            .request_quiz(self.tab, self.config.subject.clone(), context)
            .await
        {
            Ok(question) => self.mark_and_show(question, QuestionOrigin::Generated).await,
            Err(CoordinatorError::Generation(err)) => {
                warn!(tab = %self.tab, error = %err, "generation failed, using a canned question");
                let Some(question) = self.bank.question_for(&self.config.subject) else {
                    warn!(tab = %self.tab, "question bank is empty, skipping this quiz");
                    return;
                };
                self.mark_and_show(question, QuestionOrigin::Fallback).await;
            }
            Err(err) => self.contention("quiz request refused", &err),
        }
    }

    async fn mark_and_show(&mut self, question: QuizQuestion, origin: QuestionOrigin) {
        match self
            .coordinator
            .mark_displayed(self.tab, self.config.subject.clone())
            .await
        {
            Ok(()) => self.show(question, origin),
            Err(err) => self.contention("quiz display refused", &err),
        }
    }

    fn show(&mut self, question: QuizQuestion, origin: QuestionOrigin) {
        self.capture_pause();
        info!(tab = %self.tab, origin = origin.label(), "quiz on screen");
        self.screen = ScreenState::Quiz { question, origin };
    }

    async fn answer(&mut self, choice: usize) -> Result<(), TabError> {
        let ScreenState::Quiz { question, .. } = &self.screen else {
            debug!(tab = %self.tab, "answer with no quiz on screen, ignored");
            return Ok(());
        };
        let correct = question.is_correct(choice);
        let missed = if correct { None } else { Some(question.clone()) };
        if let Some(explanation) = question.explanation_for(choice) {
            debug!(tab = %self.tab, explanation, "answer explanation");
        }

        let receipt = self.coordinator.submit_answer(self.tab, correct).await?;
        if !receipt.allowed {
            warn!(tab = %self.tab, "answer was not accepted, reconciling");
            self.restore_watching();
            self.reconcile().await?;
            return Ok(());
        }

        if let Some(question) = missed {
            self.retry.record_miss(question);
        }
        info!(tab = %self.tab, correct, "quiz answered");
        self.restore_watching();
        Ok(())
    }

    fn observe_captions(&mut self, text: &str) {
        let Some(video) = self.current_video.clone() else {
            return;
        };
        self.live_caption = text.to_string();
        let now = self.clock.now();
        let replace = match &self.transcript {
            Some(acc) => acc.video_id() != &video || acc.is_stale(now),
            None => true,
        };
        if replace {
            self.transcript = Some(TranscriptAccumulator::new(video, now));
        }
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.observe(text, now);
        }
    }

    fn left_shorts(&mut self) {
        debug!(tab = %self.tab, "left the shorts surface");
        self.current_video = None;
        self.platform = None;
        self.metadata = None;
        self.transcript = None;
        self.live_caption.clear();
    }

    fn build_context(&self) -> VideoContext {
        let transcript = match &self.transcript {
            Some(acc) => acc.best_transcript(&self.live_caption),
            None => self.live_caption.clone(),
        };
        VideoContext::from_parts(self.metadata.as_ref(), transcript)
    }

    async fn load_settings(&self) -> GateSettings {
        match self.storage.settings.get_settings().await {
            Ok(Some(settings)) => settings,
            Ok(None) => GateSettings::default(),
            Err(err) => {
                warn!(tab = %self.tab, error = %err, "failed to load settings, using defaults");
                GateSettings::default()
            }
        }
    }

    /// Re-reads the gate and repairs the screen. Covers signals lost
    /// to a full channel or to the tab being away.
    async fn reconcile(&mut self) -> Result<(), TabError> {
        let view = self.coordinator.check_state(self.tab).await?;
        if view.is_blocked {
            self.apply_block(view.subject.unwrap_or_default());
        } else if !view.is_active_quiz_tab {
            self.apply_unblock();
        }
        Ok(())
    }

    fn drain_signals(&mut self) {
        while let Ok(signal) = self.signals.try_recv() {
            self.apply_signal(signal);
        }
    }

    fn apply_signal(&mut self, signal: TabSignal) {
        match signal {
            TabSignal::Block(notice) => self.apply_block(notice.subject),
            TabSignal::Unblock => self.apply_unblock(),
        }
    }

    fn apply_block(&mut self, subject: String) {
        match &mut self.screen {
            ScreenState::Blocked { subject: current } => *current = subject,
            ScreenState::Watching => {
                info!(tab = %self.tab, subject, "blocked while another tab runs a quiz");
                self.capture_pause();
                self.screen = ScreenState::Blocked { subject };
            }
            ScreenState::Quiz { .. } => {
                warn!(tab = %self.tab, "replacing a stale quiz with the block screen");
                self.screen = ScreenState::Blocked { subject };
            }
        }
    }

    fn apply_unblock(&mut self) {
        match &self.screen {
            ScreenState::Blocked { .. } => {
                info!(tab = %self.tab, "unblocked");
                self.restore_watching();
            }
            ScreenState::Quiz { .. } => {
                info!(tab = %self.tab, "quiz dismissed by the coordinator");
                self.restore_watching();
            }
            ScreenState::Watching => {}
        }
    }

    /// Pauses playback, remembering whether the video was playing so
    /// clearing the overlay does not restart a video the user had
    /// paused themselves.
    fn capture_pause(&mut self) {
        if matches!(self.screen, ScreenState::Watching) {
            self.resume_on_clear = !self.player.is_paused();
            self.player.pause();
        }
    }

    fn restore_watching(&mut self) {
        self.screen = ScreenState::Watching;
        if self.resume_on_clear {
            self.player.resume();
        }
        self.resume_on_clear = false;
    }

    fn contention(&self, what: &str, err: &CoordinatorError) {
        if err.is_contention() {
            debug!(tab = %self.tab, what, "lost the race for the quiz gate");
        } else {
            warn!(tab = %self.tab, what, error = %err, "coordination failed");
        }
    }
}
