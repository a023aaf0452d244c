//! The edit workflow: generate, stage, review, approve, apply.
//!
//! Targets are processed strictly one after another. Each file's content is
//! generated in full before it is staged, so a failed or cancelled
//! generation never leaves a partial entry behind. The staging area is
//! cleaned up on every return path.

use crate::approval::{ApprovalGate, Decision};
use crate::error::WorkflowError;
use crate::llm::{self, ContentProvider};
use crate::process::ProcessRunner;
use crate::staging::StagingArea;
use std::fs;
use std::future::Future;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Destination file for content read from standard input.
pub const STDIN_OUTPUT_NAME: &str = "output.txt";

/// A file to refactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Path(PathBuf),
    /// Content comes from standard input and has no file of its own.
    Stdin,
}

impl Target {
    /// `-` means standard input.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Target::Stdin
        } else {
            Target::Path(PathBuf::from(arg))
        }
    }

    pub fn label(&self) -> String {
        match self {
            Target::Path(path) => path.display().to_string(),
            Target::Stdin => "stdin".to_string(),
        }
    }

    /// Where the refactored content is written.
    pub fn destination(&self, output_dir: Option<&Path>) -> PathBuf {
        match (self, output_dir) {
            (Target::Stdin, Some(dir)) => dir.join(STDIN_OUTPUT_NAME),
            (Target::Stdin, None) => PathBuf::from(STDIN_OUTPUT_NAME),
            (Target::Path(path), Some(dir)) => match path.file_name() {
                Some(name) => dir.join(name),
                None => dir.join(path),
            },
            (Target::Path(path), None) => path.clone(),
        }
    }

    fn read<R: Read>(&self, input: &mut R) -> io::Result<String> {
        match self {
            Target::Path(path) => fs::read_to_string(path),
            Target::Stdin => {
                let mut content = String::new();
                input.read_to_string(&mut content)?;
                Ok(content)
            }
        }
    }
}

/// What to edit and how.
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub instructions: String,
    pub targets: Vec<Target>,
    pub model: Option<String>,
    /// Write results under this directory instead of over the originals.
    pub output_dir: Option<PathBuf>,
    /// Echo generated text while it arrives.
    pub stream: bool,
}

/// How a workflow that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Number of files written.
    Applied(usize),
    /// The user declined; nothing was written.
    Rejected,
}

pub struct EditWorkflow<'a> {
    provider: &'a dyn ContentProvider,
    runner: &'a dyn ProcessRunner,
    gate: ApprovalGate,
    colors: bool,
    staging_parent: Option<PathBuf>,
}

impl<'a> EditWorkflow<'a> {
    pub fn new(provider: &'a dyn ContentProvider, runner: &'a dyn ProcessRunner, gate: ApprovalGate) -> Self {
        Self {
            provider,
            runner,
            gate,
            colors: false,
            staging_parent: None,
        }
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// Creates staging directories under `parent` instead of the system temp dir.
    pub fn staging_in(mut self, parent: impl Into<PathBuf>) -> Self {
        self.staging_parent = Some(parent.into());
        self
    }

    /// Runs the whole workflow.
    ///
    /// `input` supplies stdin targets and the approval answer, `out`
    /// receives progress, diffs and the prompt. A generation still running
    /// when `cancel` completes is abandoned; if `cancel` is already complete
    /// no generation starts. Completing `cancel` at the approval prompt
    /// discards the staged changes.
    pub async fn run<R, W, C>(
        &self,
        request: &EditRequest,
        input: R,
        out: &mut W,
        cancel: C,
    ) -> Result<EditOutcome, WorkflowError>
    where
        R: BufRead + Send + 'static,
        W: Write + Send,
        C: Future<Output = ()>,
    {
        if request.instructions.trim().is_empty() {
            return Err(WorkflowError::EmptyInstructions);
        }
        if request.targets.is_empty() {
            return Err(WorkflowError::NoTargets);
        }

        let mut area = match &self.staging_parent {
            Some(parent) => StagingArea::create_in(parent)?,
            None => StagingArea::create()?,
        };

        let result = self.drive(&mut area, request, input, out, cancel).await;

        if let Err(e) = area.cleanup() {
            warn!("{}", e);
        }
        result
    }

    async fn drive<R, W, C>(
        &self,
        area: &mut StagingArea,
        request: &EditRequest,
        mut input: R,
        out: &mut W,
        cancel: C,
    ) -> Result<EditOutcome, WorkflowError>
    where
        R: BufRead + Send + 'static,
        W: Write + Send,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        writeln!(
            out,
            "Processing {} files with the following instructions:\n{}\n",
            request.targets.len(),
            request.instructions
        )?;

        for target in &request.targets {
            let label = target.label();
            writeln!(out, "Processing file: {}", label)?;

            let content = target.read(&mut input).map_err(|source| WorkflowError::ReadInput {
                file: label.clone(),
                source,
            })?;

            let echo: Option<&mut (dyn Write + Send)> = if request.stream { Some(&mut *out) } else { None };
            let generated = tokio::select! {
                biased;
                _ = &mut cancel => {
                    warn!("Cancelled while generating {}", label);
                    return Err(WorkflowError::Cancelled { file: label.clone() });
                }
                result = llm::generate(
                    self.provider,
                    &request.instructions,
                    &label,
                    &content,
                    request.model.clone(),
                    echo,
                ) => result.map_err(|source| WorkflowError::Provider {
                    file: label.clone(),
                    source,
                })?,
            };

            let destination = target.destination(request.output_dir.as_deref());
            let is_new = *target == Target::Stdin || !destination.exists();
            if area.collides(&destination) {
                writeln!(
                    out,
                    "Warning: {} has the same file name as an earlier file; its staged copy replaces the earlier one",
                    destination.display()
                )?;
            }
            area.stage(&destination, generated, is_new)?;
            info!("Staged {} for {}", destination.display(), label);

            writeln!(out, "✓ Processed {}", label)?;
        }

        writeln!(out, "\nReview of changes:")?;
        area.show_diff(self.runner, self.colors, out)?;

        match self.gate.confirm(input, out, cancel.as_mut()).await? {
            Decision::Cancelled => {
                writeln!(out, "Changes not applied.")?;
                Err(WorkflowError::Interrupted)
            }
            Decision::Rejected => {
                writeln!(out, "Changes not applied.")?;
                Ok(EditOutcome::Rejected)
            }
            Decision::Approved => {
                let applied = area.apply_changes(out)?;
                writeln!(out, "All changes applied successfully.")?;
                Ok(EditOutcome::Applied(applied))
            }
        }
    }
}
