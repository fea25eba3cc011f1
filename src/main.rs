use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gitscribe::ai;
use gitscribe::config::{self, AIProvider, Config};
use gitscribe::git::{self, RepoContext};
use gitscribe::{ChangelogGenerator, ChangelogTarget, ChangelogWriter, GenerateError};

#[derive(Parser)]
#[command(
    name = "gitscribe",
    version,
    about = "Generate markdown changelogs from git commits or staged changes with an AI agent"
)]
struct Cli {
    /// Path to the git repository (defaults to the current directory)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory the changelogs are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    provider: Option<AIProvider>,

    #[arg(long, global = true)]
    model: Option<String>,

    /// Maximum number of model round-trips per changelog
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a changelog for an existing commit
    Commit { commit_id: String },
    /// Generate a changelog for the staged (uncommitted) changes
    Staged,
    /// Prompt for repository and target interactively
    Interactive,
}

struct Session {
    generator: ChangelogGenerator,
    config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::get_config_path()?,
    };
    let loaded = Config::load_if_present(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    let needs_default = loaded.is_none();
    let mut config = loaded.unwrap_or_default();
    apply_overrides(&mut config, &cli);
    if !config.display.color_output {
        colored::control::set_override(false);
    }

    println!("{}", "=".repeat(80));
    println!("{}", "🤖 AI Changelog Generator".green().bold());
    println!("{}", "=".repeat(80));

    let api_key = match config.api_key() {
        Ok(key) => key,
        Err(e) => {
            let var = config.ai.provider.api_key_var();
            eprintln!("\n{}  {}", "⚠️ Warning:".yellow().bold(), e);
            eprintln!("Please set it with your API key:");
            eprintln!("export {}='your-api-key-here'  # Linux/Mac", var);
            eprintln!("$env:{}='your-api-key-here'  # PowerShell", var);
            std::process::exit(1);
        }
    };

    if needs_default {
        Config::create_default(&config_path)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;
        println!("Created default config file at {:?}", config_path);
    }

    if !git::git_available() {
        eprintln!("{}: git executable not found on PATH", "Error".red().bold());
        std::process::exit(1);
    }

    let model = ai::build_model(&config.ai, api_key).context("Failed to set up the model client")?;
    let generator = ChangelogGenerator::new(model, ChangelogWriter::new(&config.output.directory))
        .with_max_iterations(config.agent.max_iterations);
    let session = Session { generator, config };

    let repo = match &cli.repo {
        Some(path) => Some(RepoContext::select(path)?),
        None => None,
    };

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Commit { commit_id } => {
            let target = ChangelogTarget::parse_commit(&commit_id)?;
            let repo = repo_or_current(repo)?;
            if !run_once(&session, target, &repo).await {
                std::process::exit(1);
            }
        }
        Command::Staged => {
            let repo = repo_or_current(repo)?;
            if !run_once(&session, ChangelogTarget::staged_now(), &repo).await {
                std::process::exit(1);
            }
        }
        Command::Interactive => interactive(&session, repo).await?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gitscribe={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(provider) = cli.provider {
        if provider != config.ai.provider && cli.model.is_none() {
            config.ai.model = provider.default_model().to_string();
        }
        config.ai.provider = provider;
    }
    if let Some(model) = &cli.model {
        config.ai.model = model.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(max_iterations) = cli.max_iterations {
        config.agent.max_iterations = max_iterations.clamp(1, 100);
    }
}

fn repo_or_current(repo: Option<RepoContext>) -> Result<RepoContext> {
    let repo = repo.unwrap_or_else(RepoContext::current_dir);
    repo.validate()?;
    Ok(repo)
}

/// Runs one changelog generation and reports the result. Returns whether a file was written.
async fn run_once(session: &Session, target: ChangelogTarget, repo: &RepoContext) -> bool {
    match &target {
        ChangelogTarget::Commit(id) => {
            println!("\n🚀 Generating changelog for commit: {}", id.cyan())
        }
        ChangelogTarget::Staged(_) => {
            println!("\n🚀 Generating changelog for STAGED changes (uncommitted)")
        }
    }
    println!("📁 Repository: {}\n", repo.describe());

    let runner = repo.runner(session.config.agent.git_timeout());
    match session.generator.generate(&target, &runner).await {
        Ok(generated) => {
            if session.config.display.print_changelog {
                print_changelog(&target, generated.document.markdown());
            }
            if !generated.outcome.tool_failures.is_empty() {
                println!(
                    "{} {} tool call(s) reported errors",
                    "Note:".yellow(),
                    generated.outcome.tool_failures.len()
                );
            }
            println!("\n{} Changelog saved to: {}", "✓".green(), generated.path.display());
            true
        }
        Err(GenerateError::Output { source, document }) => {
            // Keep the generated text visible even though it couldn't be saved.
            print_changelog(&target, document.markdown());
            eprintln!("{}: {}", "Error saving changelog".red().bold(), source);
            false
        }
        Err(e) => {
            eprintln!("{}: {}", "Error generating changelog".red().bold(), e);
            false
        }
    }
}

fn print_changelog(target: &ChangelogTarget, markdown: &str) {
    let title = if target.is_staged() {
        "Generated Changelog (Staged Changes):"
    } else {
        "Generated Changelog:"
    };
    println!("\n{}", "=".repeat(80));
    println!("{}", title.bold());
    println!("{}", "=".repeat(80));
    println!("{}", markdown);
    println!("{}", "=".repeat(80));
}

/// Reads one trimmed line. `None` on end of input.
fn prompt(message: &str) -> Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn ask_repository() -> Result<Option<RepoContext>> {
    loop {
        println!("\n{}", "=".repeat(80));
        let Some(input) =
            prompt("Enter the path to git repository (or press Enter for current directory): ")?
        else {
            return Ok(None);
        };

        let selected = if input.is_empty() {
            repo_or_current(None)
        } else {
            RepoContext::select(&input)
        };
        match selected {
            Ok(repo) => {
                println!("{} Using repository: {}", "✓".green(), repo.describe());
                return Ok(Some(repo));
            }
            Err(e) => eprintln!("{} Error: {}", "❌".red(), e),
        }
    }
}

enum MenuChoice {
    Staged,
    Commit(String),
    MissingCommit,
    Invalid,
}

fn ask_target() -> Result<Option<MenuChoice>> {
    println!("\nWhat would you like to analyze?");
    println!("1. Staged changes (uncommitted, ready to commit)");
    println!("2. Existing commit (using commit ID)");
    let Some(choice) = prompt("\nEnter choice (1 or 2): ")? else {
        return Ok(None);
    };

    Ok(Some(match choice.as_str() {
        "1" => MenuChoice::Staged,
        "2" => match prompt("\nEnter commit ID to generate changelog for: ")? {
            Some(id) if !id.is_empty() => MenuChoice::Commit(id),
            _ => MenuChoice::MissingCommit,
        },
        _ => MenuChoice::Invalid,
    }))
}

async fn interactive(session: &Session, repo: Option<RepoContext>) -> Result<()> {
    let mut repo = match repo {
        Some(repo) => repo,
        None => match ask_repository()? {
            Some(repo) => repo,
            None => return Ok(()),
        },
    };
    println!("{}", "=".repeat(80));

    let mut first = true;
    loop {
        if !first {
            match prompt("\n\nGenerate another changelog? (y/n): ")? {
                Some(answer) if answer.eq_ignore_ascii_case("y") => {}
                _ => break,
            }
            if matches!(
                prompt("Use a different repository? (y/n): ")?,
                Some(answer) if answer.eq_ignore_ascii_case("y")
            ) {
                match prompt("Enter the path to git repository: ")? {
                    Some(path) if !path.is_empty() => match RepoContext::select(&path) {
                        Ok(selected) => {
                            repo = selected;
                            println!(
                                "{} Switched to repository: {}",
                                "✓".green(),
                                repo.describe()
                            );
                        }
                        Err(e) => {
                            eprintln!("{} Error: Invalid git repository path: {}", "❌".red(), e);
                            continue;
                        }
                    },
                    Some(_) => {}
                    None => break,
                }
            }
        }

        match ask_target()? {
            Some(MenuChoice::Staged) => {
                run_once(session, ChangelogTarget::staged_now(), &repo).await;
            }
            Some(MenuChoice::Commit(id)) => match ChangelogTarget::parse_commit(&id) {
                Ok(target) => {
                    run_once(session, target, &repo).await;
                }
                Err(e) => eprintln!("{} Error: {}", "❌".red(), e),
            },
            Some(MenuChoice::MissingCommit) if first => {
                println!("No commit ID provided. Exiting.");
                return Ok(());
            }
            Some(MenuChoice::Invalid) if first => {
                println!("Invalid choice. Exiting.");
                return Ok(());
            }
            Some(MenuChoice::Invalid) => println!("Invalid choice."),
            Some(MenuChoice::MissingCommit) => {}
            None => break,
        }
        first = false;
    }

    println!("\n{} Done! Thank you for using AI Changelog Generator.", "✓".green());
    Ok(())
}
