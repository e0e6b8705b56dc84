// Traits for dependency injection - cluster metadata is passed explicitly
// into every procedure step rather than reached through globals

#[cfg(test)]
use mockall::automock;

use super::types::{RegionInfo, RegionState, ServerName, TableName, TableState};

/// Read-only view of the control plane and its metadata registries
#[cfg_attr(test, automock)]
pub trait ClusterEnv {
    /// The cluster has been started and not yet told to shut down
    fn is_cluster_up(&self) -> bool;

    /// The control-plane leader is stopping or aborting
    fn is_stopping(&self) -> bool;

    /// Startup has finished (catalog and namespace tables are online)
    fn is_initialized(&self) -> bool;

    /// Liveness of a region server
    fn is_server_online(&self, server: &ServerName) -> bool;

    /// State of a table, `None` if the table does not exist
    fn table_state(&self, table: &TableName) -> Option<TableState>;

    /// State of a region, `None` if the region is unknown
    fn region_state(&self, region: &RegionInfo) -> Option<RegionState>;
}
