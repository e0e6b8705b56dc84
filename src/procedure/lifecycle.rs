use serde::{Deserialize, Serialize};
use statig::prelude::*;

use super::types::ProcedureId;

/// Events the executor feeds into a procedure's lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    InitializationPending,
    LockContended,
    Resumed,
    /// A step scheduled children and will continue once they finish
    Suspended { children: usize },
    /// A step reached a terminal outcome; finish once its children do
    Finishing { children: usize },
    ChildFinished,
}

/// Coarse lifecycle phase reported by the status API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcedurePhase {
    Runnable,
    WaitingForInit,
    WaitingForLock,
    WaitingForChildren,
    Finished,
}

pub struct ProcedureLifecycle {
    procedure_id: ProcedureId,
}

#[state_machine(initial = "State::runnable()", state(derive(Debug, Clone, PartialEq, Eq)))]
impl ProcedureLifecycle {
    #[state]
    fn runnable(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::InitializationPending => {
                tracing::debug!(procedure_id = %self.procedure_id, "Waiting for cluster initialization");
                Transition(State::waiting_for_init())
            }
            LifecycleEvent::LockContended => Transition(State::waiting_for_lock()),
            LifecycleEvent::Suspended { children } if *children > 0 => {
                Transition(State::waiting_for_children(*children, false))
            }
            LifecycleEvent::Finishing { children } if *children > 0 => {
                Transition(State::waiting_for_children(*children, true))
            }
            LifecycleEvent::Finishing { .. } => Transition(State::finished()),
            _ => Handled,
        }
    }

    #[state]
    fn waiting_for_init(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Resumed => Transition(State::runnable()),
            _ => Handled,
        }
    }

    #[state]
    fn waiting_for_lock(event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Resumed => Transition(State::runnable()),
            _ => Handled,
        }
    }

    #[state]
    fn waiting_for_children(
        &mut self,
        pending: &mut usize,
        finish_when_done: &mut bool,
        event: &LifecycleEvent,
    ) -> Outcome<State> {
        match event {
            LifecycleEvent::ChildFinished => {
                *pending = pending.saturating_sub(1);
                tracing::debug!(
                    procedure_id = %self.procedure_id,
                    pending = *pending,
                    "Child procedure finished"
                );
                if *pending > 0 {
                    Handled
                } else if *finish_when_done {
                    Transition(State::finished())
                } else {
                    Transition(State::runnable())
                }
            }
            _ => Handled,
        }
    }

    #[state]
    fn finished(event: &LifecycleEvent) -> Outcome<State> {
        let _ = event;
        Handled
    }
}

/// Lifecycle tracker for one procedure inside the executor
pub struct Lifecycle {
    machine: StateMachine<ProcedureLifecycle>,
}

impl Lifecycle {
    pub fn new(procedure_id: ProcedureId) -> Self {
        Self {
            machine: ProcedureLifecycle { procedure_id }.state_machine(),
        }
    }

    pub fn handle(&mut self, event: LifecycleEvent) -> ProcedurePhase {
        self.machine.handle(&event);
        self.phase()
    }

    pub fn phase(&self) -> ProcedurePhase {
        match self.machine.state() {
            State::Runnable { .. } => ProcedurePhase::Runnable,
            State::WaitingForInit { .. } => ProcedurePhase::WaitingForInit,
            State::WaitingForLock { .. } => ProcedurePhase::WaitingForLock,
            State::WaitingForChildren { .. } => ProcedurePhase::WaitingForChildren,
            State::Finished { .. } => ProcedurePhase::Finished,
        }
    }

    pub fn pending_children(&self) -> usize {
        match self.machine.state() {
            State::WaitingForChildren { pending, .. } => *pending,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_waits_for_every_child_before_resuming() {
        let mut lifecycle = Lifecycle::new(ProcedureId::new());
        assert_eq!(lifecycle.phase(), ProcedurePhase::Runnable);

        let phase = lifecycle.handle(LifecycleEvent::Suspended { children: 2 });
        assert_eq!(phase, ProcedurePhase::WaitingForChildren);
        assert_eq!(lifecycle.pending_children(), 2);

        assert_eq!(
            lifecycle.handle(LifecycleEvent::Resumed),
            ProcedurePhase::WaitingForChildren
        );
        assert_eq!(
            lifecycle.handle(LifecycleEvent::ChildFinished),
            ProcedurePhase::WaitingForChildren
        );
        assert_eq!(
            lifecycle.handle(LifecycleEvent::ChildFinished),
            ProcedurePhase::Runnable
        );
    }

    #[test]
    fn test_lifecycle_finishes_after_terminal_children() {
        let mut lifecycle = Lifecycle::new(ProcedureId::new());

        lifecycle.handle(LifecycleEvent::Finishing { children: 1 });
        assert_eq!(lifecycle.phase(), ProcedurePhase::WaitingForChildren);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::ChildFinished),
            ProcedurePhase::Finished
        );
        assert_eq!(
            lifecycle.handle(LifecycleEvent::Resumed),
            ProcedurePhase::Finished
        );

        let mut immediate = Lifecycle::new(ProcedureId::new());
        assert_eq!(
            immediate.handle(LifecycleEvent::Finishing { children: 0 }),
            ProcedurePhase::Finished
        );
    }

    #[test]
    fn test_lifecycle_parks_on_init_and_lock() {
        let mut lifecycle = Lifecycle::new(ProcedureId::new());

        assert_eq!(
            lifecycle.handle(LifecycleEvent::InitializationPending),
            ProcedurePhase::WaitingForInit
        );
        assert_eq!(lifecycle.handle(LifecycleEvent::Resumed), ProcedurePhase::Runnable);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::LockContended),
            ProcedurePhase::WaitingForLock
        );
        assert_eq!(
            lifecycle.handle(LifecycleEvent::ChildFinished),
            ProcedurePhase::WaitingForLock
        );
        assert_eq!(lifecycle.handle(LifecycleEvent::Resumed), ProcedurePhase::Runnable);
    }
}
