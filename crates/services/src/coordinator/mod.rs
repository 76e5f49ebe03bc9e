//! Process-wide quiz coordination.
//!
//! One coordinator task owns the quiz gate, the tab registry, and the
//! study session. Tabs talk to it through a [`CoordinatorHandle`]; it
//! talks back through the per-tab signal channel handed over at
//! registration.

mod actor;
mod handle;
mod protocol;

pub use actor::{
    CoordinatorConfig, DEFAULT_SESSION_TIMEOUT, signal_channel, spawn_coordinator,
};
pub use handle::CoordinatorHandle;
pub use protocol::{AnswerReceipt, BlockNotice, BlockReason, GateView, TabSignal};
