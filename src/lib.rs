//! llm-tool - ask, review and refactor with interchangeable LLM backends.
//!
//! The interesting part is the staged edit workflow. Proposed file contents
//! are generated one file at a time, written to a private staging
//! directory, shown as a diff against the files on disk and only written
//! back after the user approves.
//!
//! # Architecture
//!
//! - [`config`] - TOML configuration and environment overrides
//! - [`llm`] - the [`llm::ContentProvider`] capability and its backends
//! - [`staging`] - the staging area: stage, diff, apply, clean up
//! - [`approval`] - the yes/no gate in front of apply
//! - [`workflow`] - drives a whole edit from targets to outcome
//! - [`history`] - chat history carried between `ask` invocations
//! - [`git`] - diff collection for reviews
//! - [`commands`] - handlers behind the CLI subcommands
//! - [`process`], [`http_client`], [`providers`] - injection seams for
//!   processes, HTTP and time
//!
//! # Example
//!
//! ```no_run
//! use llm_tool::approval::ApprovalGate;
//! use llm_tool::llm::mock::MockProvider;
//! use llm_tool::process::SystemProcessRunner;
//! use llm_tool::workflow::{EditRequest, EditWorkflow, Target};
//!
//! # async fn run() -> Result<(), llm_tool::error::WorkflowError> {
//! let provider = MockProvider::new();
//! let workflow = EditWorkflow::new(&provider, &SystemProcessRunner, ApprovalGate::new(false));
//! let request = EditRequest {
//!     instructions: "add a license header".to_string(),
//!     targets: vec![Target::from_arg("src/main.rs")],
//!     ..EditRequest::default()
//! };
//!
//! let input = std::io::BufReader::new(std::io::stdin());
//! let mut out = std::io::stdout();
//! workflow.run(&request, input, &mut out, std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```

pub mod approval;
pub mod commands;
pub mod config;
pub mod error;
pub mod git;
pub mod history;
pub mod http_client;
pub mod llm;
pub mod logging;
pub mod output;
pub mod process;
pub mod providers;
pub mod staging;
pub mod workflow;
