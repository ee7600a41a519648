//! Anitemp CLI: browse templates and compose videos from the command line.
//!
//! Usage:
//!   anitemp compose <TEMPLATE>   Compose a template into an MP4
//!   anitemp templates            List templates from the content store
//!   anitemp transitions          List the transition catalog
//!   anitemp check                Check engine availability and config

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use anitemp_common::config::AppConfig;

mod commands;
mod store;

#[derive(Parser)]
#[command(
    name = "anitemp",
    about = "Template-based short video composition",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/anitemp/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a template into a single MP4
    Compose {
        /// Template JSON file, or a template id to fetch from the content store
        template: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Replace a segment's media with a local file (ID=PATH)
        #[arg(long = "replace", value_parser = parse_assignment)]
        replacements: Vec<(u32, String)>,

        /// Set a segment's transition (ID=TAG, empty TAG clears it)
        #[arg(long = "transition", value_parser = parse_assignment)]
        transitions: Vec<(u32, String)>,

        /// Set a segment's overlay text (ID=TEXT)
        #[arg(long = "text", value_parser = parse_assignment)]
        texts: Vec<(u32, String)>,

        /// Skip transitions and concatenate normalized segments directly
        #[arg(long)]
        direct: bool,
    },

    /// List templates from the content store
    Templates {
        /// Category id ("all" for every category)
        #[arg(long, default_value = "all")]
        category: String,

        /// Case-insensitive match on title and tags
        #[arg(long, default_value = "")]
        search: String,

        /// Print raw JSON records
        #[arg(long)]
        json: bool,
    },

    /// List the transition catalog
    Transitions,

    /// Check engine availability and configuration
    Check,
}

/// Parse `ID=VALUE`.
fn parse_assignment(raw: &str) -> Result<(u32, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got {raw:?}"))?;
    let id = id
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid segment id {id:?}: {e}"))?;
    Ok((id, value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    anitemp_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Compose {
            template,
            output,
            replacements,
            transitions,
            texts,
            direct,
        } => {
            commands::compose::run(
                &config,
                template,
                output,
                replacements,
                transitions,
                texts,
                direct,
            )
            .await
        }
        Commands::Templates {
            category,
            search,
            json,
        } => commands::templates::run(&config, category, search, json).await,
        Commands::Transitions => commands::transitions::run(&config),
        Commands::Check => commands::check::run(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("2=clips/me.mp4").unwrap(),
            (2, "clips/me.mp4".to_string())
        );
        assert_eq!(parse_assignment("3=").unwrap(), (3, String::new()));
        assert_eq!(
            parse_assignment("1=a=b").unwrap(),
            (1, "a=b".to_string())
        );
        assert!(parse_assignment("clip.mp4").is_err());
        assert!(parse_assignment("x=clip.mp4").is_err());
    }

    #[test]
    fn test_cli_parses_repeated_flags() {
        let cli = Cli::try_parse_from([
            "anitemp",
            "compose",
            "tpl.json",
            "--replace",
            "1=a.mp4",
            "--replace",
            "2=b.mp4",
            "--transition",
            "2=fade",
            "-o",
            "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Compose {
                replacements,
                transitions,
                output,
                direct,
                ..
            } => {
                assert_eq!(replacements.len(), 2);
                assert_eq!(transitions, vec![(2, "fade".to_string())]);
                assert_eq!(output, PathBuf::from("out"));
                assert!(!direct);
            }
            _ => panic!("expected compose"),
        }
    }
}
