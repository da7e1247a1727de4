//! CLI interface for tripsquad
//!
//! Defines the commands and global flags using clap's derive API.

use crate::workers::BudgetLevel;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Multi-agent travel planner
///
/// A designer, a cost analyst and a fact checker collaborate on each trip,
/// sharing what they learn through a partitioned memory.
#[derive(Parser, Debug)]
#[command(name = "tripsquad")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan a trip and print the result
    Plan(PlanArgs),

    /// Work with the shared memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Show memory status and orchestrator metrics
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Where to go
    #[arg(long)]
    pub destination: String,

    /// Trip length in days
    #[arg(long)]
    pub duration: Option<u32>,

    /// Total budget for the whole party
    #[arg(long)]
    pub budget: Option<f64>,

    #[arg(long)]
    pub travelers: Option<u32>,

    /// budget, midrange or luxury
    #[arg(long, default_value = "midrange")]
    pub level: BudgetLevel,

    #[arg(long)]
    pub user: Option<String>,

    /// Repeat for several interests
    #[arg(long = "interest")]
    pub interests: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum MemoryAction {
    /// Store a record
    Add {
        /// trip, destination, user_preference, research, cultural, budget or agent_insight
        #[arg(long)]
        kind: String,

        #[arg(long)]
        content: String,

        #[arg(long, default_value = "cli")]
        source: String,

        #[arg(long)]
        destination: Option<String>,

        #[arg(long)]
        user: Option<String>,

        /// Record id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Search stored records
    Query {
        text: String,

        /// "all" or a record kind
        #[arg(long, default_value = "all")]
        kind: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List partitions and their sizes
    Partitions {
        /// Print the fragments stored in this partition instead
        #[arg(long)]
        show: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["tripsquad", "status"]);
        assert!(matches!(cli.command, Command::Status));
        assert!(!cli.json);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["tripsquad", "--json", "--log", "debug", "status"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
    }

    #[test]
    fn test_plan_command() {
        let cli = Cli::parse_from([
            "tripsquad",
            "plan",
            "--destination",
            "Tokyo",
            "--duration",
            "5",
            "--level",
            "luxury",
            "--interest",
            "food",
            "--interest",
            "temples",
        ]);
        if let Command::Plan(args) = cli.command {
            assert_eq!(args.destination, "Tokyo");
            assert_eq!(args.duration, Some(5));
            assert_eq!(args.budget, None);
            assert_eq!(args.level, BudgetLevel::Luxury);
            assert_eq!(args.interests, vec!["food", "temples"]);
        } else {
            panic!("Expected Plan command");
        }
    }

    #[test]
    fn test_plan_rejects_unknown_level() {
        let result = Cli::try_parse_from([
            "tripsquad",
            "plan",
            "--destination",
            "Tokyo",
            "--level",
            "extravagant",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_add() {
        let cli = Cli::parse_from([
            "tripsquad",
            "memory",
            "add",
            "--kind",
            "destination",
            "--content",
            "Etiquette: bow when greeting.",
            "--destination",
            "Tokyo",
        ]);
        if let Command::Memory {
            action:
                MemoryAction::Add {
                    kind,
                    source,
                    destination,
                    id,
                    ..
                },
        } = cli.command
        {
            assert_eq!(kind, "destination");
            assert_eq!(source, "cli");
            assert_eq!(destination.as_deref(), Some("Tokyo"));
            assert!(id.is_none());
        } else {
            panic!("Expected memory add");
        }
    }

    #[test]
    fn test_memory_query_defaults_to_all() {
        let cli = Cli::parse_from(["tripsquad", "memory", "query", "tokyo food", "-l", "3"]);
        if let Command::Memory {
            action: MemoryAction::Query { text, kind, limit },
        } = cli.command
        {
            assert_eq!(text, "tokyo food");
            assert_eq!(kind, "all");
            assert_eq!(limit, Some(3));
        } else {
            panic!("Expected memory query");
        }
    }

    #[test]
    fn test_memory_partitions_show() {
        let cli = Cli::parse_from(["tripsquad", "memory", "partitions"]);
        assert!(matches!(
            cli.command,
            Command::Memory {
                action: MemoryAction::Partitions { show: None }
            }
        ));

        let cli = Cli::parse_from([
            "tripsquad",
            "memory",
            "partitions",
            "--show",
            "tripsquad_knowledge_trips",
        ]);
        if let Command::Memory {
            action: MemoryAction::Partitions { show },
        } = cli.command
        {
            assert_eq!(show.as_deref(), Some("tripsquad_knowledge_trips"));
        } else {
            panic!("Expected memory partitions command");
        }
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["tripsquad", "config", "show"]);
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
