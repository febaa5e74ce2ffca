//! Solution processing: turning raw solver output into structured plan data.
//!
//! The pipeline only depends on the [`SolutionProcessor`] trait; the stage
//! after a successful solver run hands it the three workspace paths plus the
//! solver's captured text and receives a field map tagged ok or err. The
//! default implementation reads the plan file the solver wrote.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Status tag of a parse attempt. `Err` is a terminal request failure even
/// when the solver process itself exited cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    Ok,
    Err,
}

impl ParseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseStatus::Ok => "ok",
            ParseStatus::Err => "err",
        }
    }
}

/// Structured result of processing a solution.
///
/// `fields` always contains a `parse_status` entry consistent with
/// `status`; on success it also carries the plan-content fields that end up
/// in the response envelope.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub status: ParseStatus,
    pub fields: Map<String, Value>,
}

impl ParseOutcome {
    /// A successful outcome carrying plan-content fields.
    pub fn ok(mut fields: Map<String, Value>) -> Self {
        fields.insert(
            "parse_status".to_string(),
            Value::String(ParseStatus::Ok.as_str().to_string()),
        );
        Self {
            status: ParseStatus::Ok,
            fields,
        }
    }

    /// A failed outcome. Carries only the status tag.
    pub fn err() -> Self {
        let mut fields = Map::new();
        fields.insert(
            "parse_status".to_string(),
            Value::String(ParseStatus::Err.as_str().to_string()),
        );
        Self {
            status: ParseStatus::Err,
            fields,
        }
    }
}

/// Interface for extracting structured plan data after a solver run.
///
/// Object-safe so the service can hold an `Arc<dyn SolutionProcessor>` and
/// tests can substitute failing or canned implementations.
#[async_trait]
pub trait SolutionProcessor: Send + Sync {
    /// Process the solver's results.
    ///
    /// `domain`, `problem`, and `plan` are the workspace file paths the
    /// solver ran against; `solver_output` is its captured combined text.
    /// An `Err` return is an infrastructure failure; a parse failure is
    /// reported through [`ParseOutcome::status`].
    async fn process(
        &self,
        domain: &Path,
        problem: &Path,
        plan: &Path,
        solver_output: &str,
    ) -> Result<ParseOutcome>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn SolutionProcessor) {}
};

/// Default processor: parses the plan file written by the solver.
///
/// Plan files from the supported solvers are one parenthesized action per
/// line, optionally followed by `;`-prefixed comment lines such as
/// `; cost = 12`. Anything else makes the parse fail.
#[derive(Debug, Default)]
pub struct PlanFileProcessor;

#[async_trait]
impl SolutionProcessor for PlanFileProcessor {
    async fn process(
        &self,
        _domain: &Path,
        _problem: &Path,
        plan: &Path,
        _solver_output: &str,
    ) -> Result<ParseOutcome> {
        let text = match tokio::fs::read_to_string(plan).await {
            Ok(text) => text,
            // An unreadable plan file is a parse failure, not an
            // infrastructure error: the solver claimed success but left
            // nothing usable behind.
            Err(_) => return Ok(ParseOutcome::err()),
        };

        Ok(parse_plan_text(&text))
    }
}

/// Parse plan-file text into a [`ParseOutcome`].
fn parse_plan_text(text: &str) -> ParseOutcome {
    let mut actions = Vec::new();
    let mut cost = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix(';') {
            if cost.is_none() {
                cost = parse_cost_comment(comment);
            }
            continue;
        }
        if line.starts_with('(') && line.ends_with(')') {
            actions.push(Value::String(line.to_string()));
            continue;
        }
        // A non-comment line that is not a parenthesized action means the
        // file is not a plan.
        return ParseOutcome::err();
    }

    if actions.is_empty() {
        return ParseOutcome::err();
    }

    let mut fields = Map::new();
    fields.insert("length".to_string(), Value::from(actions.len()));
    fields.insert("plan".to_string(), Value::Array(actions));
    if let Some(cost) = cost {
        fields.insert("cost".to_string(), Value::from(cost));
    }
    ParseOutcome::ok(fields)
}

/// Extract the cost from a `cost = N` comment, if that is what it is.
fn parse_cost_comment(comment: &str) -> Option<i64> {
    let rest = comment.trim().strip_prefix("cost")?;
    let rest = rest.trim_start().strip_prefix('=')?;
    rest.trim().split_whitespace().next()?.parse().ok()
}
