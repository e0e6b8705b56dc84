// Move-region procedure - unassign from the source, then assign to the
// destination, holding the region lock for the whole procedure

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, trace, warn};

use crate::cluster::{ClusterEnv, RegionInfo, ServerName, TableName};
use crate::procedure::{
    AssignRequest, ChildProcedure, StepOutcome, TableOperationType, TerminalOutcome,
    UnassignRequest,
};

use super::checks::{check_online, preflight_checks};
use super::error::MoveError;
use super::plan::MovePlan;

/// Persisted states of a region move. The discriminants are the state ids
/// written to the procedure store and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveRegionState {
    Prepare = 1,
    Unassign = 2,
    Assign = 3,
}

impl MoveRegionState {
    pub fn state_id(self) -> i32 {
        self as i32
    }

    pub fn from_state_id(state_id: i32) -> Result<Self, MoveError> {
        match state_id {
            1 => Ok(MoveRegionState::Prepare),
            2 => Ok(MoveRegionState::Unassign),
            3 => Ok(MoveRegionState::Assign),
            other => Err(MoveError::UnknownState(other)),
        }
    }
}

impl fmt::Display for MoveRegionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveRegionState::Prepare => "MOVE_REGION_PREPARE",
            MoveRegionState::Unassign => "MOVE_REGION_UNASSIGN",
            MoveRegionState::Assign => "MOVE_REGION_ASSIGN",
        };
        f.write_str(name)
    }
}

/// Persisted payload. The region is not included; it is restored from the
/// procedure record that owns this payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRegionStateData {
    pub source_server: ServerName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_server: Option<ServerName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRegionProcedure {
    plan: MovePlan,
    /// Preflight checks already ran at construction
    checked: bool,
}

impl MoveRegionProcedure {
    /// Build a move for `plan`.
    ///
    /// With `check` set, preflight and online checks run now and their
    /// errors are returned to the caller. Without it (e.g. when reopening a
    /// region, where failing here could wedge the caller) the procedure
    /// starts in `Prepare` and runs the same checks once it holds the lock.
    pub fn new(env: &dyn ClusterEnv, plan: MovePlan, check: bool) -> Result<Self, MoveError> {
        if check {
            preflight_checks(env, plan.region().table())?;
            check_online(env, plan.region())?;
        }
        Ok(Self {
            plan,
            checked: check,
        })
    }

    pub fn plan(&self) -> &MovePlan {
        &self.plan
    }

    pub fn region(&self) -> &RegionInfo {
        self.plan.region()
    }

    pub fn table_name(&self) -> &TableName {
        self.plan.region().table()
    }

    pub fn table_operation_type(&self) -> TableOperationType {
        TableOperationType::RegionEdit
    }

    /// Key of the exclusive region lock held for the procedure's lifetime
    pub fn lock_key(&self) -> String {
        self.plan.region().encoded_name()
    }

    pub fn initial_state(&self) -> MoveRegionState {
        if self.checked {
            MoveRegionState::Unassign
        } else {
            MoveRegionState::Prepare
        }
    }

    /// Advance by one state. Never blocks on children: they are returned in
    /// the outcome and the executor resumes this procedure once they finish.
    pub fn execute_from_state(
        &self,
        env: &dyn ClusterEnv,
        state: MoveRegionState,
    ) -> StepOutcome<MoveRegionState> {
        trace!(procedure = %self, state = %state, "execute state");
        match state {
            MoveRegionState::Prepare => self.prepare(env),
            MoveRegionState::Unassign => self.unassign(env),
            MoveRegionState::Assign => self.assign(),
        }
    }

    fn prepare(&self, env: &dyn ClusterEnv) -> StepOutcome<MoveRegionState> {
        match self.revalidate(env) {
            Ok(()) => StepOutcome::Continue {
                next: MoveRegionState::Unassign,
                children: Vec::new(),
            },
            Err(e) => {
                warn!(procedure = %self, error = %e, "Move FAILED revalidation");
                StepOutcome::Terminal {
                    outcome: TerminalOutcome::Failed {
                        reason: e.to_string(),
                    },
                    children: Vec::new(),
                }
            }
        }
    }

    /// Same checks as construction, plus source liveness, now that the
    /// region lock is held
    fn revalidate(&self, env: &dyn ClusterEnv) -> Result<(), MoveError> {
        preflight_checks(env, self.table_name())?;
        check_online(env, self.region())?;
        if !env.is_server_online(self.plan.source()) {
            return Err(MoveError::SourceOffline(self.plan.source().clone()));
        }
        Ok(())
    }

    fn unassign(&self, env: &dyn ClusterEnv) -> StepOutcome<MoveRegionState> {
        match check_online(env, self.region()) {
            Ok(()) => {}
            Err(e) if !e.is_retryable() => {
                info!(
                    region = %self.region().encoded_name(),
                    procedure = %self,
                    reason = %e,
                    "Skipping move, region is not online"
                );
                return StepOutcome::Terminal {
                    outcome: TerminalOutcome::Skipped {
                        reason: e.to_string(),
                    },
                    children: Vec::new(),
                };
            }
            Err(e) => {
                warn!(procedure = %self, error = %e, "Move FAILED online check");
                return StepOutcome::Terminal {
                    outcome: TerminalOutcome::Failed {
                        reason: e.to_string(),
                    },
                    children: Vec::new(),
                };
            }
        }

        let unassign = ChildProcedure::Unassign(UnassignRequest {
            region: self.region().clone(),
            source: self.plan.source().clone(),
            destination: self.plan.destination().cloned(),
            force: true,
        });
        StepOutcome::Continue {
            next: MoveRegionState::Assign,
            children: vec![unassign],
        }
    }

    fn assign(&self) -> StepOutcome<MoveRegionState> {
        let assign = ChildProcedure::Assign(AssignRequest {
            region: self.region().clone(),
            target: self.plan.destination().cloned().into(),
        });
        StepOutcome::Terminal {
            outcome: TerminalOutcome::Success,
            children: vec![assign],
        }
    }

    /// Nothing to undo: the only effects are the children, which roll back
    /// on their own
    pub fn rollback_state(
        &self,
        _env: &dyn ClusterEnv,
        _state: MoveRegionState,
    ) -> Result<(), MoveError> {
        Ok(())
    }

    /// A running move cannot be aborted; children may already be acting on
    /// the region
    pub fn abort(&self, _env: &dyn ClusterEnv) -> bool {
        false
    }

    /// Whether this procedure must wait for cluster initialization before
    /// running.
    pub fn wait_initialized(&self, env: &dyn ClusterEnv) -> bool {
        let table = self.table_name();
        if table.is_meta() {
            // meta is moved as part of bringing the cluster up
            return false;
        }
        if table.is_namespace_registry() {
            // an unassign leaves the namespace table offline; if the leader
            // restarts then, initialization waits on this very procedure
            return false;
        }
        !env.is_initialized()
    }

    pub fn serialize_state_data(&self) -> Result<Vec<u8>, MoveError> {
        let data = MoveRegionStateData {
            source_server: self.plan.source().clone(),
            destination_server: self.plan.destination().cloned(),
        };
        Ok(serde_json::to_vec(&data)?)
    }

    /// Rebuild a procedure from its payload and the region restored from the
    /// owning record. Checks are not re-run here.
    pub fn deserialize_state_data(region: RegionInfo, data: &[u8]) -> Result<Self, MoveError> {
        let data: MoveRegionStateData = serde_json::from_slice(data)?;
        Ok(Self {
            plan: MovePlan::new(region, data.source_server, data.destination_server),
            checked: false,
        })
    }
}

impl fmt::Display for MoveRegionProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MoveRegionProcedure {}", self.plan)
    }
}
