// Region move workflow
//
// A three-state persistent procedure: revalidate, unassign from the source,
// assign to the destination (or an auto-selected server).

pub mod checks;
pub mod error;
pub mod plan;
pub mod procedure;

pub use checks::{check_online, preflight_checks};
pub use error::{ErrorClass, MoveError};
pub use plan::MovePlan;
pub use procedure::{MoveRegionProcedure, MoveRegionState, MoveRegionStateData};
