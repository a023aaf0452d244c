//! Staged file edits.
//!
//! Proposed file contents are written to a private scratch directory first,
//! rendered as a diff against the files on disk, and only written to their
//! real paths once the caller approves:
//!
//! 1. [`StagingArea::create`] allocates a fresh temporary directory
//! 2. [`StagingArea::stage`] records each proposed file, in order
//! 3. [`StagingArea::show_diff`] renders every entry against its original
//! 4. [`StagingArea::apply_changes`] overwrites the real paths, in order
//! 5. [`StagingArea::cleanup`] removes the scratch directory
//!
//! The in-memory content of an entry is authoritative. The scratch file only
//! exists so an external `diff` can compare two real files.
//!
//! Scratch files are named after the basename of the original path, so two
//! originals sharing a basename share one scratch file and the later stage
//! overwrites it. [`StagingArea::collides`] lets callers warn about this, and
//! diff rendering rewrites a shared scratch file before comparing it.
//!
//! Applying is not transactional across files. A failure on file N leaves
//! files before it committed and never attempts the files after it; the
//! returned [`StagingError::Apply`] says which path failed and how many
//! were written.

use crate::error::StagingError;
use crate::output;
use crate::process::ProcessRunner;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;
use tracing::{debug, info, warn};

const STAGING_PREFIX: &str = "llm-tool-staging-";
const DIFF_PROGRAM: &str = "diff";
const FALLBACK_SCRATCH_NAME: &str = "stdin";

/// One file's proposed replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    /// Where the content goes on apply.
    pub original_path: PathBuf,
    /// Scratch copy inside the staging directory.
    pub staged_path: PathBuf,
    /// Full replacement text.
    pub content: String,
    /// True when there is no existing file to compare against.
    pub is_new: bool,
}

/// Scratch space holding proposed file contents pending approval.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    entries: Vec<StagedEntry>,
}

impl StagingArea {
    /// Allocates a uniquely named staging directory under the system temp dir.
    pub fn create() -> Result<Self, StagingError> {
        Self::create_in(&std::env::temp_dir())
    }

    /// Allocates a uniquely named staging directory under `parent`.
    pub fn create_in(parent: &Path) -> Result<Self, StagingError> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(StagingError::CreateDir)?;
        info!("Created staging directory {}", dir.path().display());

        Ok(Self {
            dir,
            entries: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Staged entries in staging order.
    pub fn entries(&self) -> &[StagedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scratch location for `original_path`.
    pub fn scratch_path(&self, original_path: &Path) -> PathBuf {
        let name = original_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| FALLBACK_SCRATCH_NAME.into());
        self.dir.path().join(name)
    }

    /// Whether staging `original_path` would overwrite the scratch file of a
    /// different, already staged original.
    pub fn collides(&self, original_path: &Path) -> bool {
        let scratch = self.scratch_path(original_path);
        self.entries
            .iter()
            .any(|e| e.staged_path == scratch && e.original_path != original_path)
    }

    /// Writes `content` to a scratch file and appends a new entry.
    ///
    /// Staging the same path twice appends a second entry; apply runs in
    /// order, so the last one wins. A failed write leaves earlier entries
    /// untouched.
    pub fn stage(
        &mut self,
        original_path: impl Into<PathBuf>,
        content: impl Into<String>,
        is_new: bool,
    ) -> Result<&StagedEntry, StagingError> {
        let original_path = original_path.into();
        let content = content.into();
        let staged_path = self.scratch_path(&original_path);

        if self.collides(&original_path) {
            warn!(
                "{} shares scratch file {} with an earlier staged file",
                original_path.display(),
                staged_path.display()
            );
        }

        write_scratch(&staged_path, &content)?;
        debug!(
            "Staged {} at {} ({} bytes, new: {})",
            original_path.display(),
            staged_path.display(),
            content.len(),
            is_new
        );

        self.entries.push(StagedEntry {
            original_path,
            staged_path,
            content,
            is_new,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Renders every entry in staging order.
    ///
    /// New files are shown as a full addition and their original path is
    /// never read. Existing files go through `diff -u` when it is installed
    /// (colored first when `colors` is set), otherwise both versions are
    /// printed in full.
    pub fn show_diff<W: Write>(
        &self,
        runner: &dyn ProcessRunner,
        colors: bool,
        out: &mut W,
    ) -> Result<(), StagingError> {
        for entry in &self.entries {
            if entry.is_new {
                writeln!(out, "New file: {}", entry.original_path.display())
                    .and_then(|_| out.write_all(output::addition(&entry.content, colors).as_bytes()))
                    .map_err(StagingError::Output)?;
                continue;
            }

            writeln!(out, "\nDiff for {}:", entry.original_path.display())
                .map_err(StagingError::Output)?;

            if self.is_shared(entry) {
                write_scratch(&entry.staged_path, &entry.content)?;
            }

            if runner.program_exists(DIFF_PROGRAM) {
                external_diff(entry, runner, colors, out)?;
            } else {
                debug!("{} not found, using manual diff", DIFF_PROGRAM);
                manual_diff(entry, out)?;
            }
        }
        Ok(())
    }

    /// Writes every entry's content to its original path, in staging order.
    ///
    /// Returns the number of files written.
    pub fn apply_changes<W: Write>(&self, out: &mut W) -> Result<usize, StagingError> {
        let total = self.entries.len();

        for (applied, entry) in self.entries.iter().enumerate() {
            let path = &entry.original_path;

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|source| apply_error(entry, applied, total, source))?;
            }
            fs::write(path, &entry.content)
                .map_err(|source| apply_error(entry, applied, total, source))?;

            info!("Applied staged content to {}", path.display());
            writeln!(out, "Applied changes to: {}", path.display()).map_err(StagingError::Output)?;
        }

        Ok(total)
    }

    /// Removes the staging directory and everything in it.
    ///
    /// Consumes the area. If it is dropped without calling this (an early
    /// return or a panic), the directory is removed on drop instead.
    pub fn cleanup(self) -> Result<(), StagingError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(StagingError::Cleanup)?;
        debug!("Removed staging directory {}", path.display());
        Ok(())
    }

    fn is_shared(&self, entry: &StagedEntry) -> bool {
        self.entries
            .iter()
            .any(|e| e.staged_path == entry.staged_path && e.original_path != entry.original_path)
    }
}

fn write_scratch(path: &Path, content: &str) -> Result<(), StagingError> {
    let write_err = |source| StagingError::WriteScratch {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, content).map_err(write_err)
}

fn apply_error(entry: &StagedEntry, applied: usize, total: usize, source: std::io::Error) -> StagingError {
    StagingError::Apply {
        path: entry.original_path.clone(),
        applied,
        total,
        source,
    }
}

/// Exit 0 means identical and 1 means different. Anything else is a failure.
fn diff_completed(output: &Output) -> bool {
    matches!(output.status.code(), Some(0) | Some(1))
}

fn external_diff<W: Write>(
    entry: &StagedEntry,
    runner: &dyn ProcessRunner,
    colors: bool,
    out: &mut W,
) -> Result<(), StagingError> {
    let original = entry.original_path.to_string_lossy();
    let staged = entry.staged_path.to_string_lossy();

    if colors {
        match runner.run(DIFF_PROGRAM, &["--color=always", "-u", &original, &staged]) {
            Ok(output) if diff_completed(&output) => {
                return out.write_all(&output.stdout).map_err(StagingError::Output);
            }
            Ok(output) => debug!("Colored diff exited with {}, retrying without color", output.status),
            Err(e) => debug!("Colored diff failed: {}, retrying without color", e),
        }
    }

    let output = runner
        .run(DIFF_PROGRAM, &["-u", &original, &staged])
        .map_err(|e| StagingError::DiffTool {
            path: entry.original_path.clone(),
            reason: e.to_string(),
        })?;

    if !diff_completed(&output) {
        return Err(StagingError::DiffTool {
            path: entry.original_path.clone(),
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    out.write_all(&output.stdout).map_err(StagingError::Output)
}

/// Prints the original and the staged content in full, one after the other.
fn manual_diff<W: Write>(entry: &StagedEntry, out: &mut W) -> Result<(), StagingError> {
    let original =
        fs::read_to_string(&entry.original_path).map_err(|source| StagingError::ReadOriginal {
            path: entry.original_path.clone(),
            source,
        })?;

    let path = entry.original_path.display();
    let mut rendered = format!("--- original {}\n{}", path, original);
    if !original.ends_with('\n') {
        rendered.push('\n');
    }
    rendered.push_str(&format!("+++ staged {}\n{}", path, entry.content));
    if !entry.content.ends_with('\n') {
        rendered.push('\n');
    }

    out.write_all(rendered.as_bytes()).map_err(StagingError::Output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{MockProcessRunner, exit};
    use anyhow::Result;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn area() -> (tempfile::TempDir, StagingArea) {
        let temp = tempfile::tempdir().unwrap();
        let area = StagingArea::create_in(temp.path()).unwrap();
        (temp, area)
    }

    fn render(area: &StagingArea, runner: &dyn ProcessRunner) -> String {
        let mut out = Vec::new();
        area.show_diff(runner, false, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Runner standing in for `diff`: prints the staged file as it is on
    /// disk at call time and reports "files differ".
    struct StagedFileEcho;

    impl ProcessRunner for StagedFileEcho {
        fn run(&self, _program: &str, args: &[&str]) -> Result<Output> {
            let staged = args.last().unwrap();
            Ok(Output {
                status: ExitStatus::from_raw(1 << 8),
                stdout: fs::read(staged)?,
                stderr: vec![],
            })
        }

        fn program_exists(&self, _program: &str) -> bool {
            true
        }
    }

    // =========================================================================
    // create / stage
    // =========================================================================

    #[test]
    fn test_create_allocates_distinct_directories() {
        let temp = tempfile::tempdir().unwrap();
        let first = StagingArea::create_in(temp.path()).unwrap();
        let second = StagingArea::create_in(temp.path()).unwrap();

        assert!(first.dir().is_dir());
        assert!(second.dir().is_dir());
        assert_ne!(first.dir(), second.dir());
        assert!(first.is_empty());
    }

    #[test]
    fn test_create_fails_without_writable_parent() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("does-not-exist");

        let err = StagingArea::create_in(&missing).unwrap_err();
        assert!(matches!(err, StagingError::CreateDir(_)));
    }

    #[test]
    fn test_stage_writes_scratch_file_named_after_basename() {
        let (_temp, mut area) = area();

        let entry = area.stage("src/deep/lib.rs", "fn main() {}", false).unwrap().clone();

        assert_eq!(entry.original_path, PathBuf::from("src/deep/lib.rs"));
        assert_eq!(entry.staged_path, area.dir().join("lib.rs"));
        assert_eq!(entry.content, "fn main() {}");
        assert!(!entry.is_new);
        assert_eq!(fs::read_to_string(&entry.staged_path).unwrap(), "fn main() {}");
    }

    #[test]
    fn test_stage_preserves_order() {
        let (_temp, mut area) = area();
        area.stage("c.txt", "3", true).unwrap();
        area.stage("a.txt", "1", true).unwrap();
        area.stage("b.txt", "2", true).unwrap();

        let order: Vec<_> = area.entries().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(order, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_restaging_same_path_appends_and_last_wins_on_apply() {
        let (temp, mut area) = area();
        let target = temp.path().join("same.txt");

        area.stage(&target, "first", true).unwrap();
        area.stage(&target, "second", true).unwrap();
        assert_eq!(area.len(), 2);

        area.apply_changes(&mut Vec::new()).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
    }

    #[test]
    fn test_duplicate_basename_keeps_in_memory_content() {
        let (_temp, mut area) = area();

        area.stage("one/config.toml", "first", false).unwrap();
        assert!(area.collides(Path::new("two/config.toml")));
        assert!(!area.collides(Path::new("one/config.toml")));
        area.stage("two/config.toml", "second", false).unwrap();

        assert_eq!(area.entries()[0].content, "first");
        assert_eq!(area.entries()[1].content, "second");
        assert_eq!(area.entries()[0].staged_path, area.entries()[1].staged_path);
    }

    #[test]
    fn test_failed_stage_aborts_and_keeps_earlier_entries() {
        let (_temp, mut area) = area();
        // A directory where the second scratch file should go makes its write fail.
        fs::create_dir(area.dir().join("b.txt")).unwrap();

        let mut staged = 0;
        let mut failure = None;
        for (name, content) in [("a.txt", "A"), ("b.txt", "B"), ("c.txt", "C")] {
            match area.stage(name, content, true) {
                Ok(_) => staged += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        assert_eq!(staged, 1);
        assert!(matches!(failure, Some(StagingError::WriteScratch { .. })));
        assert_eq!(area.len(), 1);
        assert_eq!(area.entries()[0].content, "A");
        assert!(!area.dir().join("c.txt").exists());
    }

    // =========================================================================
    // show_diff
    // =========================================================================

    #[test]
    fn test_new_file_is_rendered_as_addition_without_reading_original() {
        let (temp, mut area) = area();
        let missing = temp.path().join("brand").join("new.txt");
        area.stage(&missing, "hello", true).unwrap();

        let runner = MockProcessRunner::new(vec![]);
        let output = render(&area, &runner);

        assert!(output.contains("New file:"));
        assert!(output.contains("+hello"));
        assert!(runner.calls().is_empty());
        assert!(!missing.exists());
    }

    #[test]
    fn test_show_diff_follows_staging_order() {
        let (temp, mut area) = area();
        let existing = temp.path().join("existing.txt");
        fs::write(&existing, "old body\n").unwrap();

        area.stage("zeta.txt", "zeta body", true).unwrap();
        area.stage(&existing, "new body", false).unwrap();
        area.stage("alpha.txt", "alpha body", true).unwrap();

        let output = render(&area, &MockProcessRunner::missing_program());

        let zeta = output.find("zeta body").unwrap();
        let existing_pos = output.find("new body").unwrap();
        let alpha = output.find("alpha body").unwrap();
        assert!(zeta < existing_pos && existing_pos < alpha);
    }

    #[test]
    fn test_manual_fallback_prints_both_versions_labelled() {
        let (temp, mut area) = area();
        let existing = temp.path().join("a.txt");
        fs::write(&existing, "OLD-BODY").unwrap();
        area.stage(&existing, "NEW-BODY", false).unwrap();

        let output = render(&area, &MockProcessRunner::missing_program());

        let original = output.find("--- original").unwrap();
        let old = output.find("OLD-BODY").unwrap();
        let staged = output.find("+++ staged").unwrap();
        let new = output.find("NEW-BODY").unwrap();
        assert!(original < old && old < staged && staged < new);
    }

    #[test]
    fn test_manual_fallback_reports_unreadable_original() {
        let (temp, mut area) = area();
        area.stage(temp.path().join("gone.txt"), "new", false).unwrap();

        let mut out = Vec::new();
        let err = area
            .show_diff(&MockProcessRunner::missing_program(), false, &mut out)
            .unwrap_err();
        assert!(matches!(err, StagingError::ReadOriginal { .. }));
    }

    #[test]
    fn test_external_diff_differ_status_is_not_an_error() {
        let (temp, mut area) = area();
        let existing = temp.path().join("a.txt");
        fs::write(&existing, "old\n").unwrap();
        area.stage(&existing, "new\n", false).unwrap();

        let runner = MockProcessRunner::new(vec![exit(1, "-old\n+new\n", "")]);
        let output = render(&area, &runner);

        assert!(output.contains("-old\n+new\n"));
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "diff");
        assert_eq!(calls[0].1[0], "-u");
    }

    #[test]
    fn test_colored_diff_failure_falls_back_to_plain() {
        let (temp, mut area) = area();
        let existing = temp.path().join("a.txt");
        fs::write(&existing, "old\n").unwrap();
        area.stage(&existing, "new\n", false).unwrap();

        let runner = MockProcessRunner::new(vec![
            exit(2, "", "diff: unrecognized option '--color=always'"),
            exit(1, "plain diff\n", ""),
        ]);
        let mut out = Vec::new();
        area.show_diff(&runner, true, &mut out).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1[0], "--color=always");
        assert_eq!(calls[1].1[0], "-u");
        assert!(String::from_utf8(out).unwrap().contains("plain diff"));
    }

    #[test]
    fn test_diff_invocation_failure_is_surfaced() {
        let (temp, mut area) = area();
        let existing = temp.path().join("a.txt");
        fs::write(&existing, "old\n").unwrap();
        area.stage(&existing, "new\n", false).unwrap();

        let runner = MockProcessRunner::new(vec![exit(2, "", "diff: crashed")]);
        let mut out = Vec::new();
        let err = area.show_diff(&runner, false, &mut out).unwrap_err();

        match err {
            StagingError::DiffTool { path, reason } => {
                assert_eq!(path, existing);
                assert!(reason.contains("crashed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shared_scratch_is_rewritten_before_each_diff() {
        let (temp, mut area) = area();
        for dir in ["one", "two"] {
            fs::create_dir(temp.path().join(dir)).unwrap();
            fs::write(temp.path().join(dir).join("mod.rs"), "old").unwrap();
        }
        area.stage(temp.path().join("one/mod.rs"), "first proposal", false).unwrap();
        area.stage(temp.path().join("two/mod.rs"), "second proposal", false).unwrap();

        let output = render(&area, &StagedFileEcho);

        let first = output.find("first proposal").unwrap();
        let second = output.find("second proposal").unwrap();
        assert!(first < second);
    }

    // =========================================================================
    // apply_changes
    // =========================================================================

    #[test]
    fn test_apply_replaces_existing_file() {
        let (temp, mut area) = area();
        let target = temp.path().join("a.txt");
        fs::write(&target, "old").unwrap();
        area.stage(&target, "new", false).unwrap();

        let mut out = Vec::new();
        let applied = area.apply_changes(&mut out).unwrap();

        assert_eq!(applied, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        assert!(String::from_utf8(out).unwrap().contains("Applied changes to:"));
    }

    #[test]
    fn test_apply_creates_missing_parent_directories() {
        let (temp, mut area) = area();
        let target = temp.path().join("x").join("y").join("new.rs");
        area.stage(&target, "pub fn f() {}", true).unwrap();

        area.apply_changes(&mut Vec::new()).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "pub fn f() {}");
    }

    #[test]
    fn test_apply_stops_at_first_failure_without_rollback() {
        let (temp, mut area) = area();
        let first = temp.path().join("first.txt");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let second = blocker.join("second.txt");
        let third = temp.path().join("third.txt");

        area.stage(&first, "1", true).unwrap();
        area.stage(&second, "2", true).unwrap();
        area.stage(&third, "3", true).unwrap();

        let err = area.apply_changes(&mut Vec::new()).unwrap_err();

        match err {
            StagingError::Apply { path, applied, total, .. } => {
                assert_eq!(path, second);
                assert_eq!(applied, 1);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read_to_string(&first).unwrap(), "1");
        assert!(!third.exists());
    }

    // =========================================================================
    // cleanup
    // =========================================================================

    #[test]
    fn test_cleanup_removes_directory() {
        let (_temp, mut area) = area();
        area.stage("a.txt", "content", true).unwrap();
        let dir = area.dir().to_path_buf();

        area.cleanup().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_cleanup_after_failed_stage_removes_directory() {
        let (_temp, mut area) = area();
        fs::create_dir(area.dir().join("b.txt")).unwrap();
        area.stage("a.txt", "A", true).unwrap();
        assert!(area.stage("b.txt", "B", true).is_err());
        let dir = area.dir().to_path_buf();

        area.cleanup().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let (_temp, mut area) = area();
        area.stage("a.txt", "content", true).unwrap();
        let dir = area.dir().to_path_buf();

        drop(area);
        assert!(!dir.exists());
    }
}
