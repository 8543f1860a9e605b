//! taskbus CLI - drive the task event pipeline and inspect its search index

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

use commands::{
  PublishArgs, cmd_clear, cmd_config_init, cmd_config_show, cmd_publish, cmd_replay, cmd_search, cmd_stats, cmd_tasks,
  cmd_tokenize, cmd_words, load_config,
};
use logging::init_logging;

#[derive(Parser)]
#[command(name = "taskbus")]
#[command(about = "Task event bus with incremental search indexing")]
#[command(after_help = "\
QUICK START:
  taskbus config init                               # Write .taskbus/taskbus.toml
  taskbus publish writing.submit --id 1 --text \"..\" # Publish and index one event
  taskbus search --type writing rust ownership      # AND query over writings

COMMON WORKFLOWS:
  taskbus replay events.jsonl                       # Publish a file of events
  taskbus words --prefix ru                         # Admin word list
  taskbus stats                                     # Index statistics")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show the effective configuration
  #[command(long_about = "Show the current effective configuration.\n\n\
    Displays which config file is being used and its contents as TOML.")]
  Show,

  /// Write a commented config template to .taskbus/taskbus.toml
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Print the word frequency map of a text
  Tokenize {
    text: String,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Publish one task event through the pipeline and save the index
  #[command(after_help = "\
EXAMPLES:
  taskbus publish writing.submit --type writing --id 7 --text \"Deep dive\"
  taskbus publish linker.bulk-approve --bulk items.json --path /linker/queue
  taskbus publish forum.reply --id 3 --text \"draft\" --failure

The bulk file is a JSON array of {\"type\", \"id\", \"text\"} objects.")]
  Publish {
    #[command(flatten)]
    args: PublishArgs,
  },

  /// Publish every event in a JSON Lines file (Ctrl-C stops early)
  #[command(after_help = "\
Each line is an object with \"task\", and optionally \"path\", \"user_id\",
\"outcome\" (success|failure) and \"data\" (index payload, actor, link_url,
target_user_ids, extra).")]
  Replay { file: PathBuf },

  /// Entities of one type containing every query word
  Search {
    /// Entity type (comment, writing, linker, imagepost)
    #[arg(short = 't', long = "type")]
    entity_type: String,
    #[arg(required = true)]
    words: Vec<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Dictionary words with their usage counts
  Words {
    #[arg(short, long)]
    prefix: Option<String>,
    #[arg(short, long, default_value = "50")]
    limit: usize,
    #[arg(short, long, default_value = "0")]
    offset: usize,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Index statistics per entity type
  Stats {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Drop one entity type's associations and watermarks
  Clear {
    #[arg(short = 't', long = "type")]
    entity_type: String,
  },

  /// Registered task kinds and their capabilities
  Tasks,

  #[command(after_help = "\
CONFIG LOCATIONS:
  Directory: .taskbus/taskbus.toml
  User:      ~/.config/taskbus/config.toml")]
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let runtime_config = load_config();
  let _guard = init_logging(&runtime_config.config.daemon);

  match cli.command {
    Commands::Tokenize { text, json } => cmd_tokenize(&text, json),
    Commands::Publish { args } => cmd_publish(&runtime_config, args).await,
    Commands::Replay { file } => cmd_replay(&runtime_config, &file).await,
    Commands::Search {
      entity_type,
      words,
      json,
    } => cmd_search(&runtime_config, &entity_type, &words.join(" "), json).await,
    Commands::Words {
      prefix,
      limit,
      offset,
      json,
    } => cmd_words(&runtime_config, prefix, limit, offset, json).await,
    Commands::Stats { json } => cmd_stats(&runtime_config, json).await,
    Commands::Clear { entity_type } => cmd_clear(&runtime_config, &entity_type).await,
    Commands::Tasks => cmd_tasks(),
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(),
      ConfigCommand::Init { force } => cmd_config_init(force),
    },
  }
}
