// Procedure framework
//
// The contract a persistent procedure is driven through: child requests and
// step outcomes, region locks, durable records, and a reference executor
// that suspends parents on their children and resumes them after a restart.

pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod lock;
pub mod store;
pub mod types;

pub use error::{ProcedureError, StoreError};
pub use executor::{ProcedureExecutor, ProcedureStatus};
pub use lifecycle::{Lifecycle, LifecycleEvent, ProcedurePhase};
pub use lock::{LockStatus, RegionLockManager};
pub use store::{FileSystemStore, InMemoryStore, ProcedureRecord, ProcedureStore, ScheduledChild};
pub use types::{
    AssignRequest, AssignTarget, ChildOutcome, ChildProcedure, ProcedureId, ProcedureKind,
    StepOutcome, TableOperationType, TerminalOutcome, UnassignRequest,
};
