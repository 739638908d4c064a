use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::LifecycleError, models::params::GenerationParameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    NotStarted,
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (NotStarted, Pending)
                | (Pending, Running)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

/// Status and timestamps of one phase (generation or execution) of a request.
/// Each phase is its own state machine; they advance independently.
/// Only [`PhaseState::transition`] changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub(crate) status: RunStatus,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            status: RunStatus::NotStarted,
            started_at: None,
            finished_at: None,
        }
    }
}

impl PhaseState {
    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub(crate) fn transition(&mut self, next: RunStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        match next {
            RunStatus::Running => self.started_at = Some(Utc::now()),
            s if s.is_terminal() => self.finished_at = Some(Utc::now()),
            _ => {}
        }
        self.status = next;
        Ok(())
    }
}

/// One user request for a workload against an analyzed schema.
///
/// Generation transitions belong to [`crate::lifecycle`]; the execution phase
/// is advanced by whichever collaborator runs the generated queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: Uuid,
    pub name: String,
    pub parameters: GenerationParameters,
    /// Source key of the schema the workload targets.
    pub schema_source: String,
    pub generated_count: usize,
    pub executed_count: usize,
    pub(crate) generation: PhaseState,
    pub(crate) execution: PhaseState,
    pub created_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub result_file_path: Option<PathBuf>,
    pub result_csv_path: Option<PathBuf>,
}

impl GenerationRequest {
    pub fn new(
        name: impl Into<String>,
        parameters: GenerationParameters,
        schema_source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parameters,
            schema_source: schema_source.into(),
            generated_count: 0,
            executed_count: 0,
            generation: PhaseState::default(),
            execution: PhaseState::default(),
            created_at: Utc::now(),
            error_message: None,
            result_file_path: None,
            result_csv_path: None,
        }
    }

    pub fn generation(&self) -> &PhaseState {
        &self.generation
    }

    pub fn execution(&self) -> &PhaseState {
        &self.execution
    }

    /// Whether the generated queries are a partial workload.
    pub fn is_partial(&self) -> bool {
        self.generation.status != RunStatus::Completed && self.generated_count > 0
    }

    pub fn begin_execution(&mut self) -> Result<(), LifecycleError> {
        if self.execution.status == RunStatus::NotStarted {
            self.execution.transition(RunStatus::Pending)?;
        }
        self.execution.transition(RunStatus::Running)
    }

    pub fn record_executed(&mut self) {
        self.executed_count += 1;
    }

    pub fn finish_execution(
        &mut self,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<(), LifecycleError> {
        self.execution.transition(status)?;
        if let Some(error) = error {
            self.error_message = Some(error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest::new("nightly", GenerationParameters::plain(10, 7), "pg:test")
    }

    #[test]
    fn test_new_request_is_not_started() {
        let req = request();
        assert_eq!(req.generation.status, RunStatus::NotStarted);
        assert_eq!(req.execution.status, RunStatus::NotStarted);
        assert_eq!(req.generated_count, 0);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [RunStatus::Completed, RunStatus::Failed, RunStatus::Cancelled] {
            for next in [
                RunStatus::NotStarted,
                RunStatus::Pending,
                RunStatus::Running,
                RunStatus::Completed,
                RunStatus::Failed,
                RunStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_cancel_only_from_pending_or_running() {
        assert!(!RunStatus::NotStarted.can_transition_to(RunStatus::Cancelled));
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Cancelled));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Cancelled));
    }

    #[test]
    fn test_phase_timestamps() {
        let mut phase = PhaseState::default();
        phase.transition(RunStatus::Pending).unwrap();
        assert!(phase.started_at.is_none());
        phase.transition(RunStatus::Running).unwrap();
        assert!(phase.started_at.is_some());
        assert!(phase.finished_at.is_none());
        phase.transition(RunStatus::Completed).unwrap();
        assert!(phase.finished_at.is_some());

        let err = phase.transition(RunStatus::Running).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: RunStatus::Completed,
                to: RunStatus::Running
            }
        );
    }

    #[test]
    fn test_execution_phase_is_independent() {
        let mut req = request();
        req.generation.transition(RunStatus::Pending).unwrap();
        req.generation.transition(RunStatus::Running).unwrap();
        req.generation.transition(RunStatus::Completed).unwrap();
        req.execution.transition(RunStatus::Pending).unwrap();
        assert_eq!(req.generation.status, RunStatus::Completed);
        assert_eq!(req.execution.status, RunStatus::Pending);

        req.begin_execution().unwrap();
        req.record_executed();
        req.finish_execution(RunStatus::Completed, None).unwrap();
        assert_eq!(req.executed_count, 1);
        assert!(req.execution.finished_at.is_some());
    }

    #[test]
    fn test_execution_moves_only_through_transitions() {
        let mut req = request();
        assert_eq!(req.execution().status(), RunStatus::NotStarted);

        let err = req
            .finish_execution(RunStatus::Completed, Some("skipped".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: RunStatus::NotStarted,
                to: RunStatus::Completed
            }
        );
        assert_eq!(req.execution().status(), RunStatus::NotStarted);
        assert!(req.error_message.is_none());

        req.begin_execution().unwrap();
        assert_eq!(req.execution().status(), RunStatus::Running);
        assert!(req.execution().started_at().is_some());
        req.finish_execution(RunStatus::Failed, Some("timeout".to_string()))
            .unwrap();
        assert_eq!(req.execution().status(), RunStatus::Failed);
        assert!(req.execution().finished_at().is_some());
        assert_eq!(req.generation().status(), RunStatus::NotStarted);
        assert_eq!(req.error_message.as_deref(), Some("timeout"));
    }
}
