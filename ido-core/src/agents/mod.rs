//! Long-running agents: session aggregation, supervision, cleanup.

pub mod cleanup;
pub mod session;
pub mod supervisor;

pub use cleanup::{CleanupAgent, CleanupStats};
pub use session::{SessionAgent, SessionStats};
pub use supervisor::{ActivitySupervisor, SupervisorReview, Titled};
