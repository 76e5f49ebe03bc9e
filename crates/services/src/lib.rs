#![forbid(unsafe_code)]

pub mod coordinator;
pub mod error;
pub mod generation;
pub mod observer;
pub mod tab;

pub use gate_core::Clock;

pub use coordinator::{
    AnswerReceipt, BlockNotice, BlockReason, CoordinatorConfig, CoordinatorHandle,
    DEFAULT_SESSION_TIMEOUT, GateView, TabSignal, signal_channel, spawn_coordinator,
};
pub use error::{CoordinatorError, GenerationError, TabError};
pub use generation::{GeneratorConfig, OpenAiGenerator, QuestionBank, QuizGenerator};
pub use observer::{DEFAULT_NAVIGATION_DEBOUNCE, ObserverConfig, run_platform_observer};
pub use tab::{
    DEFAULT_RECONCILE_INTERVAL, QuestionOrigin, ScreenState, TabAgent, TabConfig, TabEvent,
    VideoPlayer,
};
