use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

use super::error::ProcedureError;
use super::lifecycle::{Lifecycle, LifecycleEvent, ProcedurePhase};
use super::lock::{LockStatus, RegionLockManager};
use super::store::{ProcedureRecord, ProcedureStore, ScheduledChild};
use super::types::{
    ChildOutcome, ChildProcedure, ProcedureId, ProcedureKind, StepOutcome, TerminalOutcome,
};
use crate::cluster::{ClusterEnv, RegionInfo};
use crate::config::ExecutorConfig;
use crate::region_move::{MoveRegionProcedure, MoveRegionState};
use crate::telemetry::{create_procedure_span, generate_correlation_id};

/// Snapshot of one procedure as seen by callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureStatus {
    pub id: ProcedureId,
    /// The state the procedure runs next, or the one it finished in
    pub state: MoveRegionState,
    pub phase: ProcedurePhase,
    /// Children that must finish before the procedure moves on
    pub pending_children: usize,
    pub outcome: Option<TerminalOutcome>,
}

struct ProcedureSlot {
    procedure: MoveRegionProcedure,
    state: MoveRegionState,
    lifecycle: Lifecycle,
    pending_children: Vec<ProcedureId>,
    outcome: Option<TerminalOutcome>,
    holds_lock: bool,
}

impl ProcedureSlot {
    fn new(id: ProcedureId, procedure: MoveRegionProcedure, state: MoveRegionState) -> Self {
        Self {
            procedure,
            state,
            lifecycle: Lifecycle::new(id),
            pending_children: Vec::new(),
            outcome: None,
            holds_lock: false,
        }
    }

    fn status(&self, id: ProcedureId) -> ProcedureStatus {
        ProcedureStatus {
            id,
            state: self.state,
            phase: self.lifecycle.phase(),
            pending_children: self.lifecycle.pending_children(),
            outcome: self.outcome.clone(),
        }
    }

    fn record(
        &self,
        id: ProcedureId,
        children: &HashMap<ProcedureId, ScheduledChild>,
    ) -> Result<ProcedureRecord, ProcedureError> {
        Ok(ProcedureRecord {
            id,
            kind: ProcedureKind::MoveRegion,
            region: self.procedure.region().clone(),
            state_id: self.state.state_id(),
            state_data: self.procedure.serialize_state_data()?,
            pending_children: self
                .pending_children
                .iter()
                .filter_map(|child| children.get(child).cloned())
                .collect(),
            outcome: self.outcome.clone(),
            lock_held: self.holds_lock,
            last_persisted: Utc::now(),
        })
    }
}

/// Reference executor driving move procedures one step at a time.
///
/// Children are not run here: they are registered and exposed through
/// [`ProcedureExecutor::pending_children`], and whoever runs them reports
/// back with [`ProcedureExecutor::complete_child`]. Every state change is
/// persisted before it is applied in memory, so a failed write leaves the
/// procedure where it was and [`ProcedureExecutor::recover`] can resume from
/// the store after a crash.
pub struct ProcedureExecutor<E, S> {
    env: E,
    store: S,
    config: ExecutorConfig,
    locks: RegionLockManager,
    procedures: HashMap<ProcedureId, ProcedureSlot>,
    children: HashMap<ProcedureId, ScheduledChild>,
    finished: HashMap<ProcedureId, ProcedureStatus>,
}

impl<E: ClusterEnv, S: ProcedureStore> ProcedureExecutor<E, S> {
    pub fn new(env: E, store: S, config: ExecutorConfig) -> Self {
        Self {
            env,
            store,
            config,
            locks: RegionLockManager::new(),
            procedures: HashMap::new(),
            children: HashMap::new(),
            finished: HashMap::new(),
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist a new procedure. It does not run until [`Self::run`] is called.
    pub async fn submit(
        &mut self,
        procedure: MoveRegionProcedure,
    ) -> Result<ProcedureId, ProcedureError> {
        let id = ProcedureId::new();
        let state = procedure.initial_state();
        let slot = ProcedureSlot::new(id, procedure, state);

        self.store.save(&slot.record(id, &self.children)?).await?;
        info!(
            procedure_id = %id,
            procedure = %slot.procedure,
            state = %state,
            "Submitted procedure"
        );
        self.procedures.insert(id, slot);
        Ok(id)
    }

    /// Run a procedure until it suspends, parks or finishes. Lock waiters
    /// released along the way run too.
    pub async fn run(&mut self, id: ProcedureId) -> Result<ProcedurePhase, ProcedureError> {
        if !self.procedures.contains_key(&id) && !self.finished.contains_key(&id) {
            return Err(ProcedureError::NotFound(id));
        }
        self.drive(VecDeque::from([id])).await?;
        self.phase_of(id)
    }

    /// Report that a child reached a terminal state. The parent resumes once
    /// its last pending child is done.
    pub async fn complete_child(
        &mut self,
        child_id: ProcedureId,
        outcome: ChildOutcome,
    ) -> Result<ProcedurePhase, ProcedureError> {
        let child = self
            .children
            .get(&child_id)
            .ok_or(ProcedureError::UnknownChild(child_id))?;
        let parent = child.parent;
        let slot = self
            .procedures
            .get(&parent)
            .ok_or(ProcedureError::NotFound(parent))?;

        let mut record = slot.record(parent, &self.children)?;
        record.pending_children.retain(|pending| pending.id != child_id);
        if record.pending_children.is_empty() && record.outcome.is_some() {
            self.store.delete(&parent).await?;
        } else {
            self.store.save(&record).await?;
        }

        let Some(child) = self.children.remove(&child_id) else {
            return Err(ProcedureError::UnknownChild(child_id));
        };
        match &outcome {
            ChildOutcome::Succeeded => {
                debug!(procedure_id = %parent, child_id = %child_id, child = %child.request, "Child procedure succeeded");
            }
            ChildOutcome::Failed { reason } => {
                // the child owns its failure handling; the parent only sequences
                warn!(
                    procedure_id = %parent,
                    child_id = %child_id,
                    child = %child.request,
                    reason = %reason,
                    "Child procedure failed"
                );
            }
        }

        let slot = self
            .procedures
            .get_mut(&parent)
            .ok_or(ProcedureError::NotFound(parent))?;
        slot.pending_children.retain(|pending| *pending != child_id);
        match slot.lifecycle.handle(LifecycleEvent::ChildFinished) {
            ProcedurePhase::Finished => {
                let waiter = self.retire(parent);
                self.drive(waiter.into_iter().collect()).await?;
            }
            ProcedurePhase::Runnable => {
                self.drive(VecDeque::from([parent])).await?;
            }
            _ => {}
        }
        self.phase_of(parent)
    }

    /// Ask a procedure to abort. Returns whether the procedure accepted.
    pub fn abort(&self, id: ProcedureId) -> Result<bool, ProcedureError> {
        let slot = self
            .procedures
            .get(&id)
            .ok_or(ProcedureError::NotFound(id))?;
        let accepted = slot.procedure.abort(&self.env);
        if !accepted {
            info!(procedure_id = %id, procedure = %slot.procedure, "Abort refused");
        }
        Ok(accepted)
    }

    pub fn status(&self, id: ProcedureId) -> Option<ProcedureStatus> {
        self.procedures
            .get(&id)
            .map(|slot| slot.status(id))
            .or_else(|| self.finished.get(&id).cloned())
    }

    /// The procedure currently holding `region`'s lock
    pub fn lock_holder(&self, region: &RegionInfo) -> Option<ProcedureId> {
        self.locks.holder(&region.encoded_name())
    }

    /// Every child waiting to be run, across all parents
    pub fn pending_children(&self) -> Vec<ScheduledChild> {
        self.children.values().cloned().collect()
    }

    /// Children of `parent` in the order they were scheduled
    pub fn children_of(&self, parent: ProcedureId) -> Vec<ScheduledChild> {
        self.procedures
            .get(&parent)
            .map(|slot| {
                slot.pending_children
                    .iter()
                    .filter_map(|child| self.children.get(child).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Retry every procedure parked on cluster initialization. Returns how
    /// many were retried; they park again if the cluster is still not ready.
    pub async fn wake_waiting(&mut self) -> Result<usize, ProcedureError> {
        let parked: VecDeque<ProcedureId> = self
            .procedures
            .iter()
            .filter(|(_, slot)| slot.lifecycle.phase() == ProcedurePhase::WaitingForInit)
            .map(|(id, _)| *id)
            .collect();
        let count = parked.len();
        if count > 0 {
            info!(count, "Retrying procedures parked on initialization");
        }
        self.drive(parked).await?;
        Ok(count)
    }

    /// Rebuild an executor from every unfinished record in `store`.
    ///
    /// Procedures resume at their persisted state with their pending children
    /// re-registered. Locks are re-acquired before anything runs, so a
    /// procedure that held its region lock keeps it over earlier waiters.
    pub async fn recover(env: E, store: S, config: ExecutorConfig) -> Result<Self, ProcedureError> {
        let records = store.load_all().await?;
        let mut executor = Self::new(env, store, config);
        let mut done = Vec::new();

        let (holders, others): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|record| record.lock_held);

        for record in holders.into_iter().chain(others) {
            let id = record.id;
            let procedure = match record.kind {
                ProcedureKind::MoveRegion => {
                    MoveRegionProcedure::deserialize_state_data(record.region, &record.state_data)?
                }
            };
            let state = MoveRegionState::from_state_id(record.state_id)?;
            let mut slot = ProcedureSlot::new(id, procedure, state);

            if record.lock_held {
                if let LockStatus::Acquired = executor.locks.try_acquire(&slot.procedure.lock_key(), id) {
                    slot.holds_lock = true;
                }
            }

            let pending = record.pending_children.len();
            for child in record.pending_children {
                slot.pending_children.push(child.id);
                executor.children.insert(child.id, child);
            }

            slot.outcome = record.outcome;
            if slot.outcome.is_some() {
                slot.lifecycle.handle(LifecycleEvent::Finishing { children: pending });
                if pending == 0 {
                    done.push(id);
                }
            } else if pending > 0 {
                slot.lifecycle.handle(LifecycleEvent::Suspended { children: pending });
            }

            info!(
                procedure_id = %id,
                procedure = %slot.procedure,
                state = %state,
                pending_children = pending,
                "Recovered procedure"
            );
            executor.procedures.insert(id, slot);
        }

        for id in done {
            executor.finish(id).await?;
        }
        Ok(executor)
    }

    fn phase_of(&self, id: ProcedureId) -> Result<ProcedurePhase, ProcedureError> {
        self.status(id)
            .map(|status| status.phase)
            .ok_or(ProcedureError::NotFound(id))
    }

    async fn drive(&mut self, mut queue: VecDeque<ProcedureId>) -> Result<(), ProcedureError> {
        while let Some(id) = queue.pop_front() {
            if let Some(waiter) = self.run_once(id).await? {
                queue.push_back(waiter);
            }
        }
        Ok(())
    }

    /// Step one procedure until it stops. Returns a lock waiter to resume if
    /// the procedure finished.
    async fn run_once(&mut self, id: ProcedureId) -> Result<Option<ProcedureId>, ProcedureError> {
        let Self {
            env,
            store,
            config,
            locks,
            procedures,
            children,
            ..
        } = &mut *self;
        let env: &E = env;
        let Some(slot) = procedures.get_mut(&id) else {
            return Ok(None);
        };

        match slot.lifecycle.phase() {
            ProcedurePhase::WaitingForChildren | ProcedurePhase::Finished => return Ok(None),
            ProcedurePhase::WaitingForInit | ProcedurePhase::WaitingForLock => {
                slot.lifecycle.handle(LifecycleEvent::Resumed);
            }
            ProcedurePhase::Runnable => {}
        }

        if slot.procedure.wait_initialized(env) {
            debug!(procedure_id = %id, "Cluster not initialized, parking procedure");
            slot.lifecycle.handle(LifecycleEvent::InitializationPending);
            return Ok(None);
        }

        if !slot.holds_lock {
            let key = slot.procedure.lock_key();
            match locks.holder(&key) {
                Some(holder) if holder != id => {
                    locks.try_acquire(&key, id);
                    info!(
                        procedure_id = %id,
                        holder = %holder,
                        region = %key,
                        "Region lock held by another procedure, waiting"
                    );
                    slot.lifecycle.handle(LifecycleEvent::LockContended);
                    return Ok(None);
                }
                _ => {
                    let mut record = slot.record(id, children)?;
                    record.lock_held = true;
                    store.save(&record).await?;
                    locks.try_acquire(&key, id);
                    slot.holds_lock = true;
                }
            }
        }

        let correlation_id = generate_correlation_id();
        let procedure_id = id.to_string();
        let region = slot.procedure.lock_key();

        for _ in 0..config.max_steps_per_run {
            if slot.procedure.wait_initialized(env) {
                debug!(procedure_id = %id, "Cluster not initialized, parking procedure");
                slot.lifecycle.handle(LifecycleEvent::InitializationPending);
                return Ok(None);
            }

            let span = create_procedure_span(
                "execute_from_state",
                Some(&procedure_id),
                Some(&region),
                Some(&correlation_id),
            );
            let step = span.in_scope(|| slot.procedure.execute_from_state(env, slot.state));

            let (next, requests, terminal) = match step {
                StepOutcome::Continue { next, children } => (next, children, None),
                StepOutcome::Terminal { outcome, children } => (slot.state, children, Some(outcome)),
            };
            let scheduled = schedule_children(id, requests);
            let count = scheduled.len();

            if terminal.is_some() && count == 0 {
                store.delete(&id).await?;
                slot.outcome = terminal;
                slot.lifecycle.handle(LifecycleEvent::Finishing { children: 0 });
                return Ok(self.retire(id));
            }

            // nothing below runs unless the step is durable
            let mut record = slot.record(id, children)?;
            record.state_id = next.state_id();
            record.pending_children = scheduled.clone();
            record.outcome = terminal.clone();
            store.save(&record).await?;

            slot.state = next;
            slot.pending_children = scheduled.iter().map(|child| child.id).collect();
            for child in scheduled {
                children.insert(child.id, child);
            }

            match terminal {
                Some(outcome) => {
                    slot.outcome = Some(outcome);
                    slot.lifecycle.handle(LifecycleEvent::Finishing { children: count });
                    return Ok(None);
                }
                None if count > 0 => {
                    slot.lifecycle.handle(LifecycleEvent::Suspended { children: count });
                    return Ok(None);
                }
                None => {}
            }
        }

        debug!(
            procedure_id = %id,
            max_steps = config.max_steps_per_run,
            "Step limit reached, yielding"
        );
        Ok(None)
    }

    /// Delete a finished procedure's record, then retire it
    async fn finish(&mut self, id: ProcedureId) -> Result<Option<ProcedureId>, ProcedureError> {
        self.store.delete(&id).await?;
        Ok(self.retire(id))
    }

    /// Drop a finished procedure whose record is already gone: release its
    /// lock and keep its final status. Returns the next lock waiter, if any.
    fn retire(&mut self, id: ProcedureId) -> Option<ProcedureId> {
        let slot = self.procedures.remove(&id)?;

        let waiter = if slot.holds_lock {
            self.locks.release(&slot.procedure.lock_key(), id)
        } else {
            None
        };

        let status = slot.status(id);
        match &status.outcome {
            Some(TerminalOutcome::Failed { reason }) => {
                warn!(procedure_id = %id, procedure = %slot.procedure, reason = %reason, "Procedure failed");
            }
            Some(outcome) => {
                info!(
                    procedure_id = %id,
                    procedure = %slot.procedure,
                    success = outcome.is_success(),
                    outcome = ?outcome,
                    "Procedure finished"
                );
            }
            None => {}
        }
        self.finished.insert(id, status);
        waiter
    }
}

fn schedule_children(parent: ProcedureId, requests: Vec<ChildProcedure>) -> Vec<ScheduledChild> {
    requests
        .into_iter()
        .map(|request| {
            let id = ProcedureId::new();
            debug!(
                procedure_id = %parent,
                child_id = %id,
                child = %request,
                operation = ?request.operation_type(),
                "Scheduled child procedure"
            );
            ScheduledChild { id, parent, request }
        })
        .collect()
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, RegionInfo, RegionState, ServerName, TableName, TableState};
    use crate::procedure::InMemoryStore;
    use crate::region_move::MovePlan;

    fn cluster_with_region() -> (InMemoryCluster, RegionInfo) {
        let cluster = InMemoryCluster::new();
        let table = TableName::new("default", "orders");
        let region = RegionInfo::new(table.clone(), b"a", b"m", 42);
        cluster.set_table_state(table, TableState::Enabled);
        cluster.set_region_state(&region, RegionState::Open);
        cluster.add_server(ServerName::new("rs1", 16020, 1));
        (cluster, region)
    }

    fn plan(region: &RegionInfo) -> MovePlan {
        MovePlan::new(
            region.clone(),
            ServerName::new("rs1", 16020, 1),
            Some(ServerName::new("rs2", 16020, 2)),
        )
    }

    #[tokio::test]
    async fn test_run_suspends_on_unassign_child() {
        let (cluster, region) = cluster_with_region();
        let procedure = MoveRegionProcedure::new(&cluster, plan(&region), true).unwrap();
        let mut executor = ProcedureExecutor::new(cluster, InMemoryStore::new(), ExecutorConfig::default());

        let id = executor.submit(procedure).await.unwrap();
        assert_eq!(executor.run(id).await.unwrap(), ProcedurePhase::WaitingForChildren);

        let children = executor.children_of(id);
        assert_eq!(children.len(), 1);
        assert!(matches!(children[0].request, ChildProcedure::Unassign(_)));

        let record = executor.store().load(&id).await.unwrap().unwrap();
        assert_eq!(record.state_id, MoveRegionState::Assign.state_id());
        assert_eq!(record.pending_children, children);
        assert!(record.lock_held);
    }

    #[tokio::test]
    async fn test_step_limit_yields_runnable_procedure() {
        let (cluster, region) = cluster_with_region();
        let procedure = MoveRegionProcedure::new(&cluster, plan(&region), false).unwrap();
        let config = ExecutorConfig { max_steps_per_run: 1 };
        let mut executor = ProcedureExecutor::new(cluster, InMemoryStore::new(), config);

        let id = executor.submit(procedure).await.unwrap();
        assert_eq!(executor.status(id).unwrap().state, MoveRegionState::Prepare);

        assert_eq!(executor.run(id).await.unwrap(), ProcedurePhase::Runnable);
        assert_eq!(executor.status(id).unwrap().state, MoveRegionState::Unassign);
        assert!(executor.children_of(id).is_empty());

        assert_eq!(executor.run(id).await.unwrap(), ProcedurePhase::WaitingForChildren);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_rejected() {
        let (cluster, _) = cluster_with_region();
        let mut executor = ProcedureExecutor::new(cluster, InMemoryStore::new(), ExecutorConfig::default());
        let missing = ProcedureId::new();

        assert!(matches!(executor.run(missing).await, Err(ProcedureError::NotFound(_))));
        assert!(matches!(executor.abort(missing), Err(ProcedureError::NotFound(_))));
        assert!(matches!(
            executor.complete_child(missing, ChildOutcome::Succeeded).await,
            Err(ProcedureError::UnknownChild(_))
        ));
        assert!(executor.status(missing).is_none());
    }
}
