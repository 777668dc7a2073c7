//! CLI module for docqa
//!
//! Command-line parsing with clap and colored output with owo-colors. The
//! commands are thin callers of [`RagPipeline`](crate::rag::RagPipeline).

pub mod commands;
pub mod init;
pub mod output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// docqa - ask questions about your documents
///
/// Builds a retrieval index over PDF or text files and answers questions
/// with a language model, citing the passages it used.
#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    about = "Ask questions about PDF and text documents",
    after_help = "EXAMPLES:\n    \
                  docqa init                                  # Scaffold docqa.toml and data directories\n    \
                  docqa index pdf_data/manual.pdf             # Build and save an index\n    \
                  docqa ask --file manual.pdf \"Question?\"     # Answer one question\n    \
                  docqa chat --text-dir --sources             # Interactive session over ./texts"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "docqa.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create docqa.toml, .env.example and the data directories
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (ollama or openai)
        #[arg(long, default_value = "ollama")]
        provider: String,
    },

    /// Build and save an index, replacing any saved one
    Index {
        /// PDF or text files to index
        #[arg(required_unless_present = "text_dir", conflicts_with = "text_dir")]
        files: Vec<PathBuf>,

        /// Index the merged text directory instead of files
        #[arg(long)]
        text_dir: bool,

        /// Store directory (required when indexing several files)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Answer a single question
    Ask {
        /// The question
        question: String,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Interactive question session (/clear, /history, /quit)
    Chat {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Show what a saved index contains
    Inspect {
        /// Store directory
        #[arg(long)]
        store: PathBuf,
    },

    /// List the documents available for indexing
    Files,
}

/// Which document set a question is asked against.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// A file name in the PDF directory, or a path to a PDF/text file
    #[arg(short, long)]
    pub file: Option<String>,

    /// The merged text directory
    #[arg(long)]
    pub text_dir: bool,
}

/// Per-question options.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct QueryArgs {
    /// Number of chunks to retrieve (defaults to rag.top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Model name from [models] (defaults to rag.default_model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the retrieved source passages
    #[arg(short, long)]
    pub sources: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
