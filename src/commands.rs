//! Command handlers behind the CLI.

use crate::approval::ApprovalGate;
use crate::config::Config;
use crate::error::WorkflowError;
use crate::git;
use crate::history::ChatHistory;
use crate::http_client::ReqwestHttpClient;
use crate::llm::{self, CompletionRequest, ContentProvider, gateway, prompts};
use crate::process::SystemProcessRunner;
use crate::providers::SystemTimeProvider;
use crate::workflow::{EditOutcome, EditRequest, EditWorkflow, Target};
use anyhow::{Context, Result, bail};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// Backend selection flags shared by `ask`, `review` and `edit`.
#[derive(Debug, Clone, Default)]
pub struct ProviderArgs {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub datasource: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EditArgs {
    pub instructions: String,
    pub files: Vec<String>,
    pub yes: bool,
    pub output_dir: Option<PathBuf>,
    pub stream: bool,
}

fn provider_for(config: &mut Config, args: &ProviderArgs) -> Result<Box<dyn ContentProvider>> {
    if let Some(datasource) = args.datasource.clone().filter(|d| !d.is_empty()) {
        config.gateway.datasource = Some(datasource);
    }
    let name = config.provider_name(args.provider.as_deref()).to_string();
    Ok(llm::select_provider(&name, config)?)
}

/// Streams the answer to `prompt` to stdout.
pub async fn ask(mut config: Config, args: ProviderArgs, prompt: &str) -> Result<()> {
    let provider = provider_for(&mut config, &args)?;
    let mut request = CompletionRequest::prompt(prompt).with_model(args.model.clone());

    let history = if provider.keeps_history() {
        let path = ChatHistory::path_for(&Config::get_config_dir()?, provider.name());
        let model = args.model.clone().unwrap_or_default();
        let history = ChatHistory::load(&path, &model).unwrap_or_else(|e| {
            warn!("Could not load chat history: {:#}", e);
            ChatHistory {
                model: model.clone(),
                ..ChatHistory::default()
            }
        });
        let mut messages = history.messages.clone();
        messages.append(&mut request.messages);
        request.messages = messages;
        Some((path, history))
    } else {
        None
    };

    let mut stdout = io::stdout();
    let answer = llm::collect_stream(provider.stream(&request).await?, &mut stdout).await?;
    writeln!(stdout)?;

    if let Some((path, mut history)) = history {
        history.record_exchange(prompt, &answer);
        if let Err(e) = history.save(&path, &SystemTimeProvider) {
            warn!("Could not save chat history: {:#}", e);
        }
    }
    Ok(())
}

/// Reviews the diff against `branch`.
pub async fn review(mut config: Config, args: ProviderArgs, branch: &str, repo: Option<&str>) -> Result<()> {
    let provider = provider_for(&mut config, &args)?;

    let diff = git::get_diff(&SystemProcessRunner, branch, repo).context("failed to get diff")?;
    if diff.trim().is_empty() {
        bail!("no diff found between current branch and {}", branch);
    }
    info!("Reviewing {} bytes of diff against {}", diff.len(), branch);

    let request = CompletionRequest::prompt(prompts::review_prompt(&diff))
        .with_system(prompts::REVIEW_SYSTEM)
        .with_model(args.model.clone());

    let mut stdout = io::stdout();
    writeln!(stdout, "\n=== Code Review ===")?;
    if provider.cites_sources() {
        let answer = provider.complete_cited(&request).await?;
        write!(stdout, "{}", answer.text)?;
        if !answer.sources.is_empty() {
            write!(stdout, "{}", gateway::format_sources(&answer.sources))?;
        }
    } else {
        llm::collect_stream(provider.stream(&request).await?, &mut stdout).await?;
    }
    writeln!(stdout, "\n=== End of Review ===")?;
    Ok(())
}

/// Runs the staged edit workflow on the terminal. Ctrl-C cancels a
/// generation in progress or an unanswered approval prompt.
pub async fn edit(mut config: Config, args: ProviderArgs, edit: EditArgs) -> Result<()> {
    let targets: Vec<Target> = if edit.files.is_empty() {
        if io::stdin().is_terminal() {
            return Err(WorkflowError::NoTargets.into());
        }
        vec![Target::Stdin]
    } else {
        edit.files.iter().map(|f| Target::from_arg(f)).collect()
    };

    let provider = provider_for(&mut config, &args)?;
    let request = EditRequest {
        instructions: edit.instructions,
        targets,
        model: args.model,
        output_dir: edit.output_dir,
        stream: edit.stream,
    };

    let runner = SystemProcessRunner;
    let workflow = EditWorkflow::new(provider.as_ref(), &runner, ApprovalGate::new(edit.yes))
        .with_colors(config.color.use_colors());

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let input = io::BufReader::new(io::stdin());
    let mut out = io::stdout();
    match workflow.run(&request, input, &mut out, cancel).await? {
        EditOutcome::Applied(count) => info!("Applied {} files", count),
        EditOutcome::Rejected => info!("Changes rejected"),
    }
    Ok(())
}

pub fn config_path() -> Result<()> {
    println!("{}", Config::get_config_path()?.display());
    Ok(())
}

pub fn config_show(config: &Config) -> Result<()> {
    config.show_config_info()?;
    Ok(())
}

/// Config as stored on disk, without environment overrides, so saving
/// never persists a key that only came from the environment.
fn stored_config() -> Result<Config> {
    Ok(Config::load_from(&Config::get_config_path()?)?)
}

pub fn set_api_key(provider: &str, key: &str) -> Result<()> {
    let mut config = stored_config()?;
    config.set_api_key(provider, key.to_string())?;
    println!("✅ API key for {} saved successfully", provider);
    Ok(())
}

pub async fn setup_gateway(email: &str, token: &str, endpoint: Option<&str>) -> Result<()> {
    if email.is_empty() || token.is_empty() {
        bail!("both email and token are required");
    }

    let mut config = stored_config()?;
    let endpoint = endpoint
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| config.gateway.endpoint.clone());

    let reply = gateway::setup_token(&ReqwestHttpClient::new(), &endpoint, email, token)
        .await
        .context("failed to set up token")?;
    println!("Token setup successful: {}", reply);

    config.gateway.email = Some(email.to_string());
    config.gateway.token = Some(token.to_string());
    config.gateway.endpoint = endpoint;
    config.save().context("failed to save config")?;
    println!("Gateway credentials saved to config file");
    Ok(())
}

pub fn clear_history(config: &Config, provider: Option<&str>) -> Result<()> {
    let name = provider.filter(|p| !p.is_empty()).unwrap_or(&config.default_provider);
    let path = ChatHistory::path_for(&Config::get_config_dir()?, name);
    if ChatHistory::clear(&path)? {
        println!("Cleared chat history for {}", name);
    } else {
        println!("No chat history for {}", name);
    }
    Ok(())
}
