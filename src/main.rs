use clap::{Arg, ArgAction, ArgMatches, Command};
use llm_tool::commands::{self, EditArgs, ProviderArgs};
use llm_tool::config::Config;
use llm_tool::logging;
use std::path::PathBuf;
use tracing::info;

fn provider_args(with_datasource: bool) -> Vec<Arg> {
    let mut args = vec![
        Arg::new("provider")
            .short('p')
            .long("provider")
            .help("LLM provider (openai, gemini, gateway, mock)")
            .value_name("PROVIDER"),
        Arg::new("model")
            .short('m')
            .long("model")
            .help("Model to use (defaults to config)")
            .value_name("MODEL"),
    ];
    if with_datasource {
        args.push(
            Arg::new("datasource")
                .short('d')
                .long("datasource")
                .help("Datasource to use (gateway only)")
                .value_name("NAME"),
        );
    }
    args
}

fn cli() -> Command {
    Command::new("llm-tool")
        .about("Ask, review and refactor with interchangeable LLM backends")
        .long_about(
            "llm-tool sends prompts to OpenAI, Gemini or a chat gateway. Edits are staged \
             and shown as a diff before anything is written.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show progress logging on stderr")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("ask")
                .about("Ask a question and stream the answer")
                .arg(Arg::new("prompt").help("The question to ask").required(true))
                .args(provider_args(true)),
        )
        .subcommand(
            Command::new("review")
                .about("Review the git diff against a branch")
                .arg(Arg::new("branch").help("Branch to compare against").required(true))
                .arg(
                    Arg::new("repo")
                        .short('r')
                        .long("repo")
                        .help("Repository directory (defaults to the current directory)")
                        .value_name("DIR"),
                )
                .args(provider_args(true)),
        )
        .subcommand(
            Command::new("edit")
                .about("Edit or refactor files; changes are staged for review before being applied")
                .arg(Arg::new("instructions").help("Refactoring instructions").required(true))
                .arg(
                    Arg::new("files")
                        .help("Files to edit; '-' or piped input reads stdin")
                        .num_args(0..),
                )
                .args(provider_args(true))
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .help("Apply changes without confirmation")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Output directory for refactored files")
                        .value_name("DIR"),
                )
                .arg(
                    Arg::new("stream")
                        .long("stream")
                        .help("Print generated text as it arrives")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage configuration")
                .subcommand_required(true)
                .subcommand(Command::new("path").about("Print the config file path"))
                .subcommand(Command::new("show").about("Show configuration status"))
                .subcommand(
                    Command::new("set-api-key")
                        .about("Store an API key (openai or gemini)")
                        .arg(Arg::new("provider").required(true))
                        .arg(Arg::new("key").required(true)),
                )
                .subcommand(
                    Command::new("setup-gateway")
                        .about("Register gateway credentials")
                        .arg(Arg::new("email").short('e').long("email").required(true))
                        .arg(Arg::new("token").short('t').long("token").required(true))
                        .arg(Arg::new("endpoint").long("endpoint").value_name("URL")),
                )
                .subcommand(
                    Command::new("clear-history")
                        .about("Delete stored chat history")
                        .arg(Arg::new("provider").short('p').long("provider")),
                ),
        )
}

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn provider_from(matches: &ArgMatches) -> ProviderArgs {
    ProviderArgs {
        provider: string(matches, "provider"),
        model: string(matches, "model"),
        datasource: string(matches, "datasource"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("ask", sub)) => {
            let prompt = string(sub, "prompt").unwrap_or_default();
            commands::ask(Config::load()?, provider_from(sub), &prompt).await
        }
        Some(("review", sub)) => {
            let branch = string(sub, "branch").unwrap_or_default();
            let repo = string(sub, "repo");
            commands::review(Config::load()?, provider_from(sub), &branch, repo.as_deref()).await
        }
        Some(("edit", sub)) => {
            let edit = EditArgs {
                instructions: string(sub, "instructions").unwrap_or_default(),
                files: sub
                    .get_many::<String>("files")
                    .unwrap_or_default()
                    .cloned()
                    .collect(),
                yes: sub.get_flag("yes"),
                output_dir: string(sub, "output").map(PathBuf::from),
                stream: sub.get_flag("stream"),
            };
            info!("Editing {} files", edit.files.len());
            commands::edit(Config::load()?, provider_from(sub), edit).await
        }
        Some(("config", sub)) => match sub.subcommand() {
            Some(("path", _)) => commands::config_path(),
            Some(("show", _)) => commands::config_show(&Config::load()?),
            Some(("set-api-key", args)) => {
                let provider = string(args, "provider").unwrap_or_default();
                let key = string(args, "key").unwrap_or_default();
                commands::set_api_key(&provider, &key)
            }
            Some(("setup-gateway", args)) => {
                let email = string(args, "email").unwrap_or_default();
                let token = string(args, "token").unwrap_or_default();
                let endpoint = string(args, "endpoint");
                commands::setup_gateway(&email, &token, endpoint.as_deref()).await
            }
            Some(("clear-history", args)) => {
                commands::clear_history(&Config::load()?, string(args, "provider").as_deref())
            }
            _ => unreachable!("subcommand_required"),
        },
        _ => unreachable!("subcommand_required"),
    }
}
