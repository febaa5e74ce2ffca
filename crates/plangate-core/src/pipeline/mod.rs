//! The request-orchestration pipeline.
//!
//! Runs one validated request through profile selection, workspace
//! preparation, the solver process, solution processing, and the validator
//! process, and assembles the response envelope. Enforces the per-request
//! state machine:
//!
//! ```text
//! Received -> Validated -> ProfileSelected -> WorkspacePrepared
//!   -> SolverInvoked -> { SolverFailed | SolverSucceeded }
//!   -> { ParseFailed | ValidatorInvoked }
//!   -> { ValidationFailed | Completed }
//! ```
//!
//! The workspace is dropped on entry to any terminal state, success or
//! failure, because it is owned by the pipeline call frame.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

use crate::process::{ProcessError, ProcessResult, run_process};
use crate::request::PlanningRequest;
use crate::response::{self, ResponseEnvelope};
use crate::solution::{ParseStatus, SolutionProcessor};
use crate::solver::{SolverPaths, SolverProfile, select_profile};
use crate::workspace::Workspace;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Immutable pipeline configuration, shared read-only across requests.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub solver_paths: SolverPaths,
    /// Path to the plan validator executable.
    pub validator: PathBuf,
    /// Wall-clock limit for one solver run.
    pub solver_timeout: Duration,
    /// Wall-clock limit for one validator run.
    pub validator_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Failure taxonomy
// ---------------------------------------------------------------------------

/// Which external process a timeout or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Solver,
    Validator,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Solver => write!(f, "solver"),
            Stage::Validator => write!(f, "validator"),
        }
    }
}

/// Terminal failures of one request after input validation.
///
/// Everything here except `Internal` is reported to the client with a 200
/// status and an `error` string in the body; clients inspect the body, not
/// the status code. The `Display` strings are the client-visible messages.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The solver exited nonzero. Often legitimate ("no plan found"), so
    /// the captured output is the message.
    #[error("{output}")]
    Solver { output: String },

    /// The solution processor reported `err`, independent of the solver's
    /// exit code.
    #[error("Parsing failed. Please check your domain and problem for syntax errors.")]
    Parse { status: ParseStatus },

    /// The validator exited nonzero.
    #[error("{output}")]
    Validation { output: String },

    /// An external process exceeded its wall-clock limit and was killed.
    #[error("{stage} exceeded the {limit_secs}s time limit")]
    Timeout { stage: Stage, limit_secs: u64 },

    /// Infrastructure failure (spawn, temp files, I/O). Maps to HTTP 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn stage_error(stage: Stage, err: ProcessError) -> SolveError {
    match err {
        ProcessError::Timeout { limit_secs, .. } => SolveError::Timeout { stage, limit_secs },
        other => SolveError::Internal(
            anyhow::Error::new(other).context(format!("{stage} process failed")),
        ),
    }
}

// ---------------------------------------------------------------------------
// Per-request state machine
// ---------------------------------------------------------------------------

/// States a request moves through. Tracked for observability; the pipeline
/// drives the transitions in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validated,
    ProfileSelected,
    WorkspacePrepared,
    SolverInvoked,
    SolverFailed,
    SolverSucceeded,
    ParseFailed,
    ValidatorInvoked,
    ValidationFailed,
    Completed,
}

impl RequestState {
    /// Check whether `from -> to` is an edge of the request state graph.
    pub fn is_valid_transition(from: RequestState, to: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (from, to),
            (Received, Validated)
                | (Validated, ProfileSelected)
                | (ProfileSelected, WorkspacePrepared)
                | (WorkspacePrepared, SolverInvoked)
                | (SolverInvoked, SolverFailed)
                | (SolverInvoked, SolverSucceeded)
                | (SolverSucceeded, ParseFailed)
                | (SolverSucceeded, ValidatorInvoked)
                | (ValidatorInvoked, ValidationFailed)
                | (ValidatorInvoked, Completed)
        )
    }

    /// Terminal states release the workspace on entry.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::SolverFailed
                | RequestState::ParseFailed
                | RequestState::ValidationFailed
                | RequestState::Completed
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Received => "received",
            RequestState::Validated => "validated",
            RequestState::ProfileSelected => "profile_selected",
            RequestState::WorkspacePrepared => "workspace_prepared",
            RequestState::SolverInvoked => "solver_invoked",
            RequestState::SolverFailed => "solver_failed",
            RequestState::SolverSucceeded => "solver_succeeded",
            RequestState::ParseFailed => "parse_failed",
            RequestState::ValidatorInvoked => "validator_invoked",
            RequestState::ValidationFailed => "validation_failed",
            RequestState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Tracks the current state and logs each transition.
struct StateTracker {
    state: RequestState,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            state: RequestState::Received,
        }
    }

    fn advance(&mut self, to: RequestState) {
        debug_assert!(
            RequestState::is_valid_transition(self.state, to),
            "invalid request state transition: {} -> {}",
            self.state,
            to
        );
        tracing::debug!(from = %self.state, to = %to, "request state transition");
        self.state = to;
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The solve-and-validate pipeline.
///
/// Holds only immutable configuration and the solution-processor seam, so a
/// single instance serves concurrent requests without any shared mutable
/// state. Everything request-scoped (profile, workspace, process results)
/// lives on the call frame of [`SolvePipeline::solve_and_validate`].
pub struct SolvePipeline {
    config: PipelineConfig,
    processor: Arc<dyn SolutionProcessor>,
}

impl SolvePipeline {
    pub fn new(config: PipelineConfig, processor: Arc<dyn SolutionProcessor>) -> Self {
        Self { config, processor }
    }

    /// Run one validated request to a terminal state.
    ///
    /// The solver strictly precedes solution processing, which strictly
    /// precedes the validator. The workspace files are deleted when this
    /// function returns, whatever the outcome.
    pub async fn solve_and_validate(
        &self,
        request: &PlanningRequest,
    ) -> Result<ResponseEnvelope, SolveError> {
        let mut state = StateTracker::new();
        state.advance(RequestState::Validated);

        let profile = select_profile(request.mode.as_deref(), &self.config.solver_paths);
        state.advance(RequestState::ProfileSelected);

        let mut workspace = Workspace::create().context("failed to allocate workspace files")?;
        workspace
            .write_inputs(&request.domain, &request.problem)
            .context("failed to write workspace inputs")?;
        state.advance(RequestState::WorkspacePrepared);

        state.advance(RequestState::SolverInvoked);
        let solver_output = match self.run_solver(&profile, &workspace).await {
            Ok(output) => output,
            Err(err) => {
                state.advance(RequestState::SolverFailed);
                return Err(err);
            }
        };
        state.advance(RequestState::SolverSucceeded);

        let outcome = self
            .processor
            .process(
                workspace.domain_path(),
                workspace.problem_path(),
                workspace.plan_path(),
                &solver_output,
            )
            .await
            .context("solution processor failed")?;

        if outcome.status == ParseStatus::Err {
            tracing::info!("solution processor reported a parse failure");
            state.advance(RequestState::ParseFailed);
            return Err(SolveError::Parse {
                status: ParseStatus::Err,
            });
        }

        state.advance(RequestState::ValidatorInvoked);
        let validator_output = match self.run_validator(&workspace).await {
            Ok(output) => output,
            Err(err) => {
                state.advance(RequestState::ValidationFailed);
                return Err(err);
            }
        };

        let envelope = response::assemble(outcome.fields, &validator_output);
        state.advance(RequestState::Completed);
        Ok(envelope)
    }

    /// Run the selected solver against the workspace files.
    ///
    /// Returns the captured output on a zero exit; a nonzero exit becomes
    /// [`SolveError::Solver`] with the normalized output as the message.
    async fn run_solver(
        &self,
        profile: &SolverProfile,
        workspace: &Workspace,
    ) -> Result<String, SolveError> {
        let mut args = vec![
            "--domain".to_string(),
            workspace.domain_path().display().to_string(),
            "--problem".to_string(),
            workspace.problem_path().display().to_string(),
            "--output".to_string(),
            workspace.plan_path().display().to_string(),
        ];
        if let Some((flag, value)) = &profile.extra_flag {
            args.push(flag.clone());
            args.push(value.clone());
        }

        tracing::info!(solver = %profile.executable.display(), "invoking solver");
        let result = run_process(&profile.executable, &args, self.config.solver_timeout)
            .await
            .map_err(|err| stage_error(Stage::Solver, err))?;

        match result {
            ProcessResult {
                exit_code: Some(0),
                output,
            } => Ok(output),
            ProcessResult { exit_code, output } => {
                tracing::info!(?exit_code, "solver reported failure");
                Err(SolveError::Solver {
                    output: response::normalize_field(&output),
                })
            }
        }
    }

    /// Run the validator on the plan the solver produced.
    async fn run_validator(&self, workspace: &Workspace) -> Result<String, SolveError> {
        let args = vec![
            workspace.domain_path().display().to_string(),
            workspace.problem_path().display().to_string(),
            workspace.plan_path().display().to_string(),
        ];

        tracing::info!(validator = %self.config.validator.display(), "invoking validator");
        let result = run_process(&self.config.validator, &args, self.config.validator_timeout)
            .await
            .map_err(|err| stage_error(Stage::Validator, err))?;

        match result {
            ProcessResult {
                exit_code: Some(0),
                output,
            } => Ok(output),
            ProcessResult { exit_code, output } => {
                tracing::info!(?exit_code, "validator rejected the plan");
                Err(SolveError::Validation {
                    output: response::normalize_field(&output),
                })
            }
        }
    }
}
