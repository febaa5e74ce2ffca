//! Per-request workspace: three scoped temporary files.
//!
//! Each request owns exactly one [`Workspace`] holding the domain, problem,
//! and plan files the external processes operate on. The files are named
//! temp files so their paths can be handed to two successive child
//! processes; deletion is tied to `Drop`, so every exit path (solver crash,
//! parse failure, validator failure, panic, client disconnect) releases
//! them.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// The three ephemeral files owned by a single request.
#[derive(Debug)]
pub struct Workspace {
    domain: NamedTempFile,
    problem: NamedTempFile,
    plan: NamedTempFile,
}

impl Workspace {
    /// Allocate the three files in the system temp directory.
    pub fn create() -> io::Result<Self> {
        Ok(Self {
            domain: NamedTempFile::new()?,
            problem: NamedTempFile::new()?,
            plan: NamedTempFile::new()?,
        })
    }

    /// Write the decoded domain and problem text and force both files to
    /// disk. The solver reads these paths from a separate process, so the
    /// contents must be durable before this function returns.
    pub fn write_inputs(&mut self, domain: &str, problem: &str) -> io::Result<()> {
        write_durable(self.domain.as_file_mut(), domain)?;
        write_durable(self.problem.as_file_mut(), problem)?;
        Ok(())
    }

    /// Path of the domain file. Stable for the life of the workspace.
    pub fn domain_path(&self) -> &Path {
        self.domain.path()
    }

    /// Path of the problem file. Stable for the life of the workspace.
    pub fn problem_path(&self) -> &Path {
        self.problem.path()
    }

    /// Path of the plan output file the solver writes and the validator
    /// reads. Stable for the life of the workspace.
    pub fn plan_path(&self) -> &Path {
        self.plan.path()
    }
}

fn write_durable(file: &mut std::fs::File, contents: &str) -> io::Result<()> {
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    file.sync_all()
}
