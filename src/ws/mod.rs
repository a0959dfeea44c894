pub mod connctx;
pub mod registry;
pub mod session;

pub use connctx::{ConnCtx, ConnectionHandle, Outbound};
pub use registry::{RegistryStats, SessionRegistry};
pub use session::{JoinOutcome, LeaveOutcome, LockState, Session, CHANGE_LOG_CAPACITY};
