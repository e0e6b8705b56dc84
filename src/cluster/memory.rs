// In-memory cluster metadata - backs embedded use and tests

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::traits::ClusterEnv;
use super::types::{RegionInfo, RegionState, ServerName, TableName, TableState};

#[derive(Debug)]
struct ClusterSnapshot {
    cluster_up: bool,
    stopping: bool,
    initialized: bool,
    online_servers: HashSet<ServerName>,
    tables: HashMap<TableName, TableState>,
    regions: HashMap<String, RegionState>,
}

/// Cluster metadata held entirely in memory.
///
/// Starts as an up, initialized cluster with no servers, tables or regions.
#[derive(Debug)]
pub struct InMemoryCluster {
    inner: RwLock<ClusterSnapshot>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ClusterSnapshot {
                cluster_up: true,
                stopping: false,
                initialized: true,
                online_servers: HashSet::new(),
                tables: HashMap::new(),
                regions: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ClusterSnapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ClusterSnapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_cluster_up(&self, up: bool) {
        self.write().cluster_up = up;
    }

    pub fn set_stopping(&self, stopping: bool) {
        self.write().stopping = stopping;
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.write().initialized = initialized;
    }

    pub fn add_server(&self, server: ServerName) {
        self.write().online_servers.insert(server);
    }

    pub fn remove_server(&self, server: &ServerName) {
        self.write().online_servers.remove(server);
    }

    pub fn set_table_state(&self, table: TableName, state: TableState) {
        self.write().tables.insert(table, state);
    }

    pub fn drop_table(&self, table: &TableName) {
        self.write().tables.remove(table);
    }

    pub fn set_region_state(&self, region: &RegionInfo, state: RegionState) {
        self.write().regions.insert(region.encoded_name(), state);
    }

    pub fn forget_region(&self, region: &RegionInfo) {
        self.write().regions.remove(&region.encoded_name());
    }
}

impl ClusterEnv for InMemoryCluster {
    fn is_cluster_up(&self) -> bool {
        self.read().cluster_up
    }

    fn is_stopping(&self) -> bool {
        self.read().stopping
    }

    fn is_initialized(&self) -> bool {
        self.read().initialized
    }

    fn is_server_online(&self, server: &ServerName) -> bool {
        self.read().online_servers.contains(server)
    }

    fn table_state(&self, table: &TableName) -> Option<TableState> {
        self.read().tables.get(table).copied()
    }

    fn region_state(&self, region: &RegionInfo) -> Option<RegionState> {
        self.read().regions.get(&region.encoded_name()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_cluster_tracks_metadata() {
        let cluster = InMemoryCluster::new();
        let server = ServerName::new("rs1", 16020, 1);
        let table = TableName::new("default", "orders");
        let region = RegionInfo::new(table.clone(), b"", b"", 7);

        assert!(cluster.is_cluster_up());
        assert!(cluster.is_initialized());
        assert!(!cluster.is_server_online(&server));
        assert_eq!(cluster.table_state(&table), None);
        assert_eq!(cluster.region_state(&region), None);

        cluster.add_server(server.clone());
        cluster.set_table_state(table.clone(), TableState::Enabled);
        cluster.set_region_state(&region, RegionState::Open);

        assert!(cluster.is_server_online(&server));
        assert_eq!(cluster.table_state(&table), Some(TableState::Enabled));
        assert_eq!(cluster.region_state(&region), Some(RegionState::Open));

        cluster.remove_server(&server);
        cluster.drop_table(&table);
        cluster.forget_region(&region);

        assert!(!cluster.is_server_online(&server));
        assert_eq!(cluster.table_state(&table), None);
        assert_eq!(cluster.region_state(&region), None);
    }

    #[test]
    fn test_split_daughters_keep_separate_state() {
        let cluster = InMemoryCluster::new();
        let table = TableName::new("default", "t");
        let left = RegionInfo::new(table.clone(), b"", b"k", 0x6a4);
        let right = RegionInfo::new(table, b"k", b"", 0x6a4);

        cluster.set_region_state(&left, RegionState::Open);
        cluster.set_region_state(&right, RegionState::Closed);

        assert_eq!(cluster.region_state(&left), Some(RegionState::Open));
        assert_eq!(cluster.region_state(&right), Some(RegionState::Closed));
    }
}
