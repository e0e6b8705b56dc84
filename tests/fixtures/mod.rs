/// Shared cluster, plan and store fixtures for the region move integration tests
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use region_mover::procedure::{ProcedureRecord, StoreError};
use region_mover::{
    ChildProcedure, InMemoryCluster, InMemoryStore, MovePlan, ProcedureExecutor, ProcedureId,
    ProcedureStore, RegionInfo, RegionState, ServerName, TableName, TableState,
};

#[allow(dead_code)]
pub fn source() -> ServerName {
    ServerName::new("rs1.example.org", 16020, 1_700_000_000_001)
}

#[allow(dead_code)]
pub fn destination() -> ServerName {
    ServerName::new("rs2.example.org", 16020, 1_700_000_000_002)
}

#[allow(dead_code)]
pub fn user_region(region_id: u64) -> RegionInfo {
    RegionInfo::new(TableName::new("default", "orders"), b"a", b"m", region_id)
}

/// A running, initialized cluster with both servers online and `regions`
/// open on enabled tables
#[allow(dead_code)]
pub fn healthy_cluster(regions: &[&RegionInfo]) -> InMemoryCluster {
    let cluster = InMemoryCluster::new();
    cluster.add_server(source());
    cluster.add_server(destination());
    for region in regions {
        cluster.set_table_state(region.table.clone(), TableState::Enabled);
        cluster.set_region_state(region, RegionState::Open);
    }
    cluster
}

#[allow(dead_code)]
pub fn plan(region: &RegionInfo, destination: Option<ServerName>) -> MovePlan {
    MovePlan::new(region.clone(), source(), destination)
}

/// The single child `parent` is currently waiting on
#[allow(dead_code)]
pub fn only_child<S: ProcedureStore>(
    executor: &ProcedureExecutor<InMemoryCluster, S>,
    parent: ProcedureId,
) -> (ProcedureId, ChildProcedure) {
    let children = executor.children_of(parent);
    assert_eq!(children.len(), 1, "expected exactly one pending child, got {:?}", children);
    (children[0].id, children[0].request.clone())
}

/// Store that fails chosen writes with an IO error, delegating the rest
#[allow(dead_code)]
#[derive(Default)]
pub struct FailingStore {
    inner: InMemoryStore,
    saves: AtomicUsize,
    fail_save_at: AtomicUsize,
    fail_next_delete: AtomicBool,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th save from now (1 is the next one)
    pub fn fail_save_in(&self, n: usize) {
        let done = self.saves.load(Ordering::SeqCst);
        self.fail_save_at.store(done + n, Ordering::SeqCst);
    }

    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }

    fn disk_full() -> StoreError {
        StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }
}

#[async_trait]
impl ProcedureStore for FailingStore {
    async fn save(&self, record: &ProcedureRecord) -> Result<(), StoreError> {
        let attempt = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_save_at.load(Ordering::SeqCst) {
            return Err(Self::disk_full());
        }
        self.inner.save(record).await
    }

    async fn load(&self, id: &ProcedureId) -> Result<Option<ProcedureRecord>, StoreError> {
        self.inner.load(id).await
    }

    async fn load_all(&self) -> Result<Vec<ProcedureRecord>, StoreError> {
        self.inner.load_all().await
    }

    async fn delete(&self, id: &ProcedureId) -> Result<(), StoreError> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(Self::disk_full());
        }
        self.inner.delete(id).await
    }
}
