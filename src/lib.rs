// Region Mover Library - persistent region move procedures
// This exposes the core components for testing and integration

pub mod cluster;
pub mod config;
pub mod procedure;
pub mod region_move;
pub mod telemetry;

// Re-export key types for easy access
pub use cluster::{ClusterEnv, InMemoryCluster, RegionInfo, RegionState, ServerName, TableName, TableState};
pub use config::{ExecutorConfig, MoverConfig, ObservabilityConfig, StoreConfig};
pub use procedure::{
    ChildOutcome, ChildProcedure, FileSystemStore, InMemoryStore, ProcedureError, ProcedureExecutor,
    ProcedureId, ProcedurePhase, ProcedureStatus, ProcedureStore, StepOutcome, TerminalOutcome,
};
pub use region_move::{MoveError, MovePlan, MoveRegionProcedure, MoveRegionState};
pub use telemetry::{create_procedure_span, generate_correlation_id, init_telemetry};
