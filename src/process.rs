//! External process execution.
//!
//! The staging area shells out to `diff` and reviews shell out to `git`.
//! Both go through [`ProcessRunner`] so tests can script the outcomes
//! without spawning real processes.

use anyhow::Result;
use std::process::{Command, Output};
use tracing::debug;

/// Trait for running system processes.
pub trait ProcessRunner: Send + Sync {
    /// Executes a command and returns its captured output.
    fn run(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Checks if a program exists in PATH.
    fn program_exists(&self, program: &str) -> bool;
}

/// Default process runner using std::process::Command.
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        debug!("Running {} {:?}", program, args);
        let mut cmd = Command::new(program);
        cmd.args(args);
        Ok(cmd.output()?)
    }

    fn program_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::sync::Mutex;

    /// Scripted process runner. Each call pops the next queued result and
    /// records the invocation.
    pub struct MockProcessRunner {
        outputs: Mutex<Vec<Result<Output>>>,
        pub calls: Mutex<Vec<(String, Vec<String>)>>,
        exists: bool,
    }

    impl MockProcessRunner {
        pub fn new(outputs: Vec<Result<Output>>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
                exists: true,
            }
        }

        pub fn missing_program() -> Self {
            Self {
                exists: false,
                ..Self::new(vec![])
            }
        }

        pub fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProcessRunner for MockProcessRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
            self.calls.lock().unwrap().push((
                program.to_string(),
                args.iter().map(|a| a.to_string()).collect(),
            ));
            self.outputs
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(anyhow!("no scripted output left")))
        }

        fn program_exists(&self, _program: &str) -> bool {
            self.exists
        }
    }

    /// Output with the given exit code.
    pub fn exit(code: i32, stdout: &str, stderr: &str) -> Result<Output> {
        Ok(Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        })
    }
}
