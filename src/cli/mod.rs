//! CLI commands for cram.

pub mod drive;
pub mod flashcards;
pub mod guidance;
pub mod guide;
pub mod material;
pub mod plan;
pub mod setting;
pub mod topic;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::Result;
use crate::llm::CompletionClient;

/// cram - interview preparation tracker
#[derive(Parser)]
#[command(name = "cram")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.cram/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage study materials
    Material {
        #[command(subcommand)]
        command: MaterialCommands,
    },

    /// Manage topics within a material
    Topic {
        #[command(subcommand)]
        command: TopicCommands,
    },

    /// Get or generate study guidance for a topic
    Guidance {
        /// Topic ID
        topic_id: i64,

        /// Regenerate even when a cached version exists
        #[arg(long)]
        force: bool,

        /// Extra context folded into the prompt
        #[arg(long)]
        context: Option<String>,
    },

    /// Get or generate compiled study notes for a topic
    Notes {
        /// Topic ID
        topic_id: i64,

        /// Regenerate even when a cached version exists
        #[arg(long)]
        force: bool,

        /// Extra context folded into the prompt
        #[arg(long)]
        context: Option<String>,
    },

    /// Index a cloud folder: list files and record metadata
    Index {
        /// Folder ID
        folder_id: String,
    },

    /// Extract text and topics from indexed files
    Extract {
        /// Folder ID
        folder_id: String,

        /// Reprocess files that were already extracted
        #[arg(long)]
        force: bool,
    },

    /// Compile a study guide from extracted topics
    Guide {
        /// Folder ID
        folder_id: String,

        /// Guide flavor: concise or ds_mid
        #[arg(long, default_value = "concise")]
        kind: String,

        /// Print the latest compiled guide instead of compiling
        #[arg(long)]
        show: bool,
    },

    /// Compile a flashcard deck from processed files
    Flashcards {
        /// Folder ID
        folder_id: String,

        /// Print the latest deck instead of compiling
        #[arg(long)]
        show: bool,
    },

    /// Show a study plan for a material
    Plan {
        /// Material ID
        material_id: i64,

        /// Spread topics over a day-by-day schedule ending before the date
        #[arg(long)]
        schedule: bool,
    },

    /// Read or write a setting
    Setting {
        /// Setting key
        key: String,

        /// Value to store; omit to read
        value: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MaterialCommands {
    /// Add a study material
    Add {
        /// Company name
        #[arg(long, default_value = "")]
        company: String,

        /// Position title
        #[arg(long)]
        position: String,

        /// Interview date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Skip generating starter topics
        #[arg(long)]
        no_topics: bool,
    },

    /// List materials with topic progress
    List,

    /// Show one material and its topics
    Show {
        /// Material ID
        id: i64,
    },

    /// Delete a material and everything under it
    Delete {
        /// Material ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum TopicCommands {
    /// Add a topic to a material
    Add {
        /// Material ID
        material_id: i64,

        /// Topic name
        name: String,

        /// Category path, e.g. "ML > Supervised"
        #[arg(long)]
        category: Option<String>,

        /// Priority: high, medium or low
        #[arg(long, default_value = "medium")]
        priority: String,
    },

    /// Update topic fields; omitted fields keep their value
    Update {
        /// Topic ID
        id: i64,

        #[arg(long)]
        name: Option<String>,

        /// Priority: high, medium or low
        #[arg(long)]
        priority: Option<String>,

        /// Status: pending, in_progress or completed
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a topic
    Delete {
        /// Topic ID
        id: i64,
    },

    /// Generate starter topics for a material
    Generate {
        /// Material ID
        material_id: i64,
    },
}

/// Shared handles the command modules work against.
pub struct Context {
    pub config: AppConfig,
    pub db: Database,
    pub client: CompletionClient,
}

impl Context {
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        let db = Database::open(&config.db_path)?;
        let client = CompletionClient::from_config(&config.providers);
        Ok(Self { config, db, client })
    }
}

/// Dispatch a parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let ctx = Context::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Material { command } => material::run(&ctx, command).await,
        Commands::Topic { command } => topic::run(&ctx, command).await,
        Commands::Guidance {
            topic_id,
            force,
            context,
        } => guidance::run_guidance(&ctx, topic_id, force, context.as_deref()).await,
        Commands::Notes {
            topic_id,
            force,
            context,
        } => guidance::run_notes(&ctx, topic_id, force, context.as_deref()).await,
        Commands::Index { folder_id } => drive::run_index(&ctx, &folder_id).await,
        Commands::Extract { folder_id, force } => {
            drive::run_extract(&ctx, &folder_id, force).await
        }
        Commands::Guide {
            folder_id,
            kind,
            show,
        } => guide::run(&ctx, &folder_id, &kind, show).await,
        Commands::Flashcards { folder_id, show } => {
            flashcards::run(&ctx, &folder_id, show).await
        }
        Commands::Plan {
            material_id,
            schedule,
        } => plan::run(&ctx, material_id, schedule),
        Commands::Setting { key, value } => setting::run(&ctx, &key, value.as_deref()),
    }
}
