//! Pure rules deciding which chat messages enter the queue and what happens to them later.

pub mod classifier;
pub mod decision;

pub use classifier::{classify, should_enqueue, EnqueueVerdict, SkipReason, MAX_CLOCK_SKEW_SECS};
pub use decision::{decide_reply, DeferReason, DropReason, ReplyDecision};
