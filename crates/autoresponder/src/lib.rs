pub mod engine;
pub mod scheduler;

pub use engine::{AutoresponderEngine, EngineError, EnqueueOutcome, TickReport};
pub use scheduler::Scheduler;
