//! tell - convert English to shell commands.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tell_cli::config::{self, Config};
use tell_cli::logging::{self, LogConfig, LogFormat};
use tell_cli::render::{self, OutputFormat};
use tell_core::{AnthropicClient, GenerateOptions, Generator, HistoryFilter, HistoryStore};

/// TELL: Terminal English Language Liaison.
#[derive(Parser, Debug)]
#[command(name = "tell")]
#[command(about = "Convert English to shell commands")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging and usage output on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace logging (includes dependencies)
    #[arg(long, global = true)]
    trace: bool,

    /// Set log level for specific targets (e.g., "history=debug").
    /// Targets are prefixed with "tell::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", global = true)]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a natural language description into a shell command
    Prompt(PromptArgs),
    /// Show command history, optionally filtered by a search query
    #[command(args_conflicts_with_subcommands = true)]
    History(HistoryArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct PromptArgs {
    /// What you want to do, in plain English
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,

    /// Continue from the most recent successful command
    #[arg(short = 'c', long = "continue")]
    continue_last: bool,

    /// Output format: text|json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Print only the command, never the explanation
    #[arg(short, long)]
    no_explain: bool,

    /// Target shell (e.g., zsh, bash, fish)
    #[arg(short, long)]
    shell: Option<String>,

    /// Describe the current directory to the model
    #[arg(long)]
    context: bool,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    /// Substring to search for in prompts and commands
    query: Option<String>,

    /// Maximum number of entries to show
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    /// Number of entries to skip
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Show only favorite entries
    #[arg(short, long)]
    favorites: bool,

    #[command(subcommand)]
    action: Option<HistoryAction>,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// Show complete details of a history entry
    Show { id: i64 },
    /// Toggle the favorite status of a history entry
    Favorite { id: i64 },
    /// Delete a history entry
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create the default configuration file
    Init,
    /// Print the configuration file location
    Path,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", render::error_message(&e));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        &cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    match cli.command {
        Command::Prompt(args) => {
            let config = load_config(cli.config.as_ref())?;
            run_prompt(&config, &log_config, args)
        }
        Command::History(args) => {
            let config = load_config(cli.config.as_ref())?;
            run_history(&config, args)
        }
        Command::Config { action } => run_config(cli.config, action),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn open_store(config: &Config) -> Result<HistoryStore> {
    let path = config.resolved_db_path()?;
    let store = HistoryStore::open(&path, &config.store_options())
        .with_context(|| format!("could not open history database {}", path.display()))?;
    Ok(store)
}

fn run_prompt(config: &Config, log_config: &LogConfig, args: PromptArgs) -> Result<()> {
    let prompt = args.text.join(" ");
    let client = AnthropicClient::new(&config.api_key(), &config.llm_model, config.max_tokens)?;

    // History is a convenience; a broken database must not block generation
    let store = match open_store(config) {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(target: "tell::history", "History disabled: {:#}", e);
            None
        }
    };

    let options = GenerateOptions {
        continue_last: args.continue_last,
        context_dir: if args.context {
            Some(std::env::current_dir().context("could not read current directory")?)
        } else {
            None
        },
    };

    let generator = Generator::new(client, store.as_ref(), config.prompt_settings(args.shell));
    let parent = generator.resolve_parent(&options)?;
    if let Some(parent) = &parent {
        eprintln!("Continuing from previous command: {}", parent.command);
    }
    let generation = generator.generate_from(&prompt, parent, &options)?;

    if log_config.is_verbose() {
        eprintln!("Model: {}", generation.usage.model);
        eprintln!(
            "Tokens used: input={}, output={}",
            generation.usage.input_tokens, generation.usage.output_tokens
        );
    }

    let output = render::response(&generation.response, args.format, args.no_explain)?;
    println!("{}", output);
    Ok(())
}

fn run_history(config: &Config, args: HistoryArgs) -> Result<()> {
    let store = open_store(config)?;

    match args.action {
        Some(HistoryAction::Show { id }) => {
            let entry = store.get(id)?;
            println!("{}", render::history_entry(&entry));
        }
        Some(HistoryAction::Favorite { id }) => {
            let entry = store.get(id)?;
            let favorite = !entry.favorite;
            store.set_favorite(id, favorite)?;
            if favorite {
                println!("Entry {} marked as favorite.", id);
            } else {
                println!("Entry {} unmarked as favorite.", id);
            }
        }
        Some(HistoryAction::Delete { id }) => {
            store.delete(id)?;
            println!("Entry {} deleted.", id);
        }
        None => {
            let filter = HistoryFilter::with_query(
                args.query.as_deref(),
                args.limit,
                args.offset,
                args.favorites,
            )?;
            let entries = store.list(&filter)?;
            println!("{}", render::history_list(&entries));
        }
    }
    Ok(())
}

fn run_config(path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => config::config_path()?,
    };

    match action {
        ConfigAction::Show => {
            let config = if path.exists() {
                Config::load_from(&path)?
            } else {
                Config::default()
            };
            print!("{}", config);
        }
        ConfigAction::Init => {
            Config::init_at(&path)?;
            println!("Created default configuration at {}", path.display());
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(())
}
