// Cluster metadata collaborators
//
// Identity types for servers, tables and regions, plus the environment
// trait through which procedures read liveness and table/region state.

pub mod memory;
pub mod traits;
pub mod types;

pub use memory::InMemoryCluster;
pub use traits::ClusterEnv;
pub use types::{RegionInfo, RegionState, ServerName, TableName, TableState};

#[cfg(test)]
pub use traits::MockClusterEnv;
