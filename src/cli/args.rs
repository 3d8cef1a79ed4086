//! Command-line argument parsing for CourseBuddy
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Backend, Config};
use crate::documents::IdScheme;
use crate::rag::retrieval::StrategyKind;

/// CourseBuddy - answer course FAQ questions with hybrid retrieval
#[derive(Parser, Debug)]
#[command(name = "coursebuddy")]
#[command(version)]
#[command(about = "Retrieval-augmented answers over course FAQ documents", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Search store backend
    #[arg(long, value_enum, global = true)]
    pub backend: Option<Backend>,

    /// Collection name
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only print results)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Retrieval flags shared by search, ask and evaluate
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RetrievalArgs {
    /// Retrieval strategy
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyKind>,

    /// Number of results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Restrict results to one course
    #[arg(long)]
    pub course: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load documents, provision the collection and index them
    Ingest {
        /// Document sources (files or URLs); defaults to the configured ones
        #[arg(value_name = "SOURCE")]
        sources: Vec<String>,

        /// Point id scheme
        #[arg(long, value_enum)]
        ids: Option<IdScheme>,
    },

    /// Retrieve matching documents without calling the language model
    Search {
        /// Query text
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Print the assembled context instead of the match list
        #[arg(long)]
        context: bool,
    },

    /// Answer a question from the course documents
    Ask {
        /// Question text
        question: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Print the prompt and exit without calling the model
        #[arg(long)]
        dry_run: bool,
    },

    /// Measure hit rate and MRR over a ground-truth file
    Evaluate {
        /// JSON array of {question, course, document_question}
        ground_truth: PathBuf,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Evaluate every strategy instead of the configured one
        #[arg(long)]
        all: bool,
    },

    /// Display current configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Apply global flag overrides to a loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(backend) = self.backend {
            config.store.backend = backend;
        }
        if let Some(collection) = &self.collection {
            config.store.collection = collection.clone();
        }
    }
}

impl RetrievalArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(strategy) = self.strategy {
            config.retrieval.strategy = strategy;
        }
        if let Some(limit) = self.limit {
            config.retrieval.limit = limit;
        }
        if let Some(course) = &self.course {
            config.retrieval.course = Some(course.clone());
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show scores and ranks
    pub fn show_details(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["coursebuddy", "-q", "config"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["coursebuddy", "config"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["coursebuddy", "-v", "config"]).verbosity(), Verbosity::Verbose);
        assert_eq!(
            parse(&["coursebuddy", "config", "-vv"]).verbosity(),
            Verbosity::VeryVerbose
        );
    }

    #[test]
    fn test_search_flags() {
        let args = parse(&[
            "coursebuddy",
            "search",
            "When can I start the course?",
            "--strategy",
            "prefetch-rerank",
            "--limit",
            "5",
            "--course",
            "data-engineering-zoomcamp",
        ]);

        match args.command {
            Commands::Search { query, retrieval, context } => {
                assert_eq!(query, "When can I start the course?");
                assert_eq!(retrieval.strategy, Some(StrategyKind::PrefetchRerank));
                assert_eq!(retrieval.limit, Some(5));
                assert_eq!(retrieval.course.as_deref(), Some("data-engineering-zoomcamp"));
                assert!(!context);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_ingest_sources_and_ids() {
        let args = parse(&["coursebuddy", "ingest", "a.json", "b.json", "--ids", "sequential"]);
        match args.command {
            Commands::Ingest { sources, ids } => {
                assert_eq!(sources, vec!["a.json", "b.json"]);
                assert_eq!(ids, Some(IdScheme::Sequential));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let args = parse(&[
            "coursebuddy",
            "--backend",
            "memory",
            "--collection",
            "faq",
            "ask",
            "Can I join late?",
            "-s",
            "dense",
        ]);

        let mut config = Config::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.store.backend, Backend::Memory);
        assert_eq!(config.store.collection, "faq");

        if let Commands::Ask { retrieval, dry_run, .. } = &args.command {
            retrieval.apply(&mut config);
            assert!(!dry_run);
        }
        assert_eq!(config.retrieval.strategy, StrategyKind::Dense);
        assert_eq!(config.retrieval.limit, 5);
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Args::try_parse_from(["coursebuddy"]).is_err());
    }

    #[test]
    fn test_verbosity_methods() {
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Normal.show_progress());
        assert!(!Verbosity::Normal.show_details());
        assert!(Verbosity::Verbose.show_details());
        assert_eq!(Verbosity::VeryVerbose.as_str(), "very_verbose");
    }
}
