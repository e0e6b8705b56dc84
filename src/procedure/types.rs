// Core types for the procedure framework contract

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::cluster::{RegionInfo, ServerName};

/// Identity of a procedure (parent or child) inside one executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcedureId(pub Uuid);

impl ProcedureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcedureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Procedure kinds the executor knows how to rehydrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcedureKind {
    MoveRegion,
}

/// What a procedure does to its table, used by table-level scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableOperationType {
    RegionEdit,
    RegionAssign,
    RegionUnassign,
}

/// Close a region on its current holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnassignRequest {
    pub region: RegionInfo,
    pub source: ServerName,
    pub destination: Option<ServerName>,
    /// Close even if the source is mid-transition
    pub force: bool,
}

/// Where an assign should place its region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignTarget {
    Server(ServerName),
    /// Let the assignment manager pick a server
    AutoSelect,
}

impl From<Option<ServerName>> for AssignTarget {
    fn from(destination: Option<ServerName>) -> Self {
        match destination {
            Some(server) => AssignTarget::Server(server),
            None => AssignTarget::AutoSelect,
        }
    }
}

/// Open a region on a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRequest {
    pub region: RegionInfo,
    pub target: AssignTarget,
}

/// Child procedures a parent may schedule. The set is closed: the executor
/// only runs the kinds listed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildProcedure {
    Unassign(UnassignRequest),
    Assign(AssignRequest),
}

impl ChildProcedure {
    pub fn region(&self) -> &RegionInfo {
        match self {
            ChildProcedure::Unassign(request) => &request.region,
            ChildProcedure::Assign(request) => &request.region,
        }
    }

    pub fn operation_type(&self) -> TableOperationType {
        match self {
            ChildProcedure::Unassign(_) => TableOperationType::RegionUnassign,
            ChildProcedure::Assign(_) => TableOperationType::RegionAssign,
        }
    }
}

impl fmt::Display for ChildProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildProcedure::Unassign(request) => write!(
                f,
                "Unassign region={} source={} force={}",
                request.region, request.source, request.force
            ),
            ChildProcedure::Assign(AssignRequest { region, target }) => match target {
                AssignTarget::Server(server) => write!(f, "Assign region={} target={}", region, server),
                AssignTarget::AutoSelect => write!(f, "Assign region={} target=auto", region),
            },
        }
    }
}

/// How a procedure ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalOutcome {
    Success,
    /// Nothing to do; not an error
    Skipped { reason: String },
    /// Refused or failed without retry
    Failed { reason: String },
}

impl TerminalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalOutcome::Success)
    }
}

/// Result of advancing a state machine by one state.
///
/// Children listed in either variant must all reach a terminal state before
/// the parent runs again (`Continue`) or is considered finished (`Terminal`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<S> {
    Continue { next: S, children: Vec<ChildProcedure> },
    Terminal { outcome: TerminalOutcome, children: Vec<ChildProcedure> },
}

impl<S> StepOutcome<S> {
    pub fn children(&self) -> &[ChildProcedure] {
        match self {
            StepOutcome::Continue { children, .. } => children,
            StepOutcome::Terminal { children, .. } => children,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepOutcome::Terminal { .. })
    }
}

/// What a child reported when it finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildOutcome {
    Succeeded,
    Failed { reason: String },
}
