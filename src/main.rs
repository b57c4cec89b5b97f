//! # TraceWriter CLI (`tw`)
//!
//! ## Usage
//!
//! ```bash
//! tw --config ./config/tw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tw init` | Create the SQLite database and the `state` table |
//! | `tw detect <file>` | Print the shape of a document |
//! | `tw group <input>` | Group an ungrouped archive into threads |
//! | `tw import <file>` | Import a preprocessed or annotated document |
//! | `tw annotate <thread-id> --gap IDX=TEXT` | Annotate gaps of a thread |
//! | `tw show <thread-id>` | Print a thread with its annotations |
//! | `tw stats` | Totals and annotation progress |
//! | `tw export` | Write the annotated export |
//! | `tw serve` | Run the state endpoint |
//!
//! ## Examples
//!
//! ```bash
//! tw group ./raw/properties.json -o ./data/preprocessed.json --min-emails 3
//! tw import ./data/preprocessed.json
//! tw annotate prop_7250_franklin_thread_0 --gap 0="called escrow" --gap 2="sent disclosures"
//! tw export -o ./out/annotated.json --annotator alice
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `tracewriter=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tracewriter::{annotate, config, export, group, import, migrate, server, show, stats};

/// TraceWriter CLI: annotate the work between emails of a property archive.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. `detect` and `group` run without one.
#[derive(Parser)]
#[command(
    name = "tw",
    about = "TraceWriter: annotate the off-screen work between emails",
    version,
    long_about = "TraceWriter groups a property transaction email archive into threads, \
    lets you annotate what happened in the gap between each pair of consecutive emails, \
    and exports the result as an annotated dataset."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/tw.toml`.
    #[arg(long, global = true, default_value = "./config/tw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `state` table. Idempotent.
    Init,

    /// Print the shape of a JSON document: `preprocessed` or `annotated`.
    ///
    /// A document is annotated if any email carries `_annotation_after`,
    /// even as null.
    Detect {
        /// Path to the JSON document.
        file: PathBuf,
    },

    /// Group an ungrouped archive into threads (preprocessed shape).
    Group {
        /// Ungrouped archive: properties with a flat `emails` list.
        input: PathBuf,

        /// Output file. Writes to stdout if omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Drop properties with fewer emails than this.
        /// Defaults to `[grouping].min_emails`.
        #[arg(long)]
        min_emails: Option<usize>,
    },

    /// Import a preprocessed or annotated document.
    ///
    /// Replaces the stored hierarchy. Annotations carried by an annotated
    /// export are merged in, overwriting existing text for the same gaps.
    Import {
        /// Path to the JSON document.
        file: PathBuf,
    },

    /// Set annotations on gaps of one thread.
    Annotate {
        /// Thread identifier.
        thread_id: String,

        /// Gap annotation as `INDEX=TEXT`. Gap `i` follows email `i`.
        /// Repeatable. An empty TEXT clears the gap.
        #[arg(long = "gap", value_parser = parse_gap, required = true)]
        gaps: Vec<(usize, String)>,
    },

    /// Print a thread with the annotation of every gap.
    Show {
        /// Thread identifier.
        thread_id: String,
    },

    /// Show totals and annotation progress.
    Stats,

    /// Write the annotated export of the stored session.
    Export {
        /// Output file. Writes to stdout if omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Attribution label. Defaults to `[export].annotator`.
        #[arg(long)]
        annotator: Option<String>,
    },

    /// Run the state endpoint on `[server].bind`.
    Serve,
}

/// Parse an `INDEX=TEXT` pair for `--gap`.
fn parse_gap(s: &str) -> Result<(usize, String), String> {
    let (index, text) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid INDEX=TEXT: no '=' found in '{}'", s))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("invalid gap index '{}': expected a non-negative integer", index))?;
    Ok((index, text.to_string()))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tracewriter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that don't require config
    match &cli.command {
        Commands::Detect { file } => return import::run_detect(file),
        Commands::Group {
            input,
            output,
            min_emails,
        } => {
            // An absent file means defaults; a broken one is still an error.
            let cfg = if cli.config.exists() {
                config::load_config(&cli.config)?
            } else {
                config::Config::minimal()
            };
            let min_emails = min_emails.unwrap_or(cfg.grouping.min_emails);
            return group::run_group(input, output.as_deref(), min_emails);
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Annotate { thread_id, gaps } => {
            annotate::run_annotate(&cfg, &thread_id, gaps).await?;
        }
        Commands::Show { thread_id } => {
            show::run_show(&cfg, &thread_id).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { output, annotator } => {
            export::run_export(&cfg, output.as_deref(), annotator).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Detect { .. } | Commands::Group { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gap() {
        assert_eq!(parse_gap("2=called escrow").unwrap(), (2, "called escrow".to_string()));
        assert_eq!(parse_gap("0=a=b").unwrap(), (0, "a=b".to_string()));
        assert_eq!(parse_gap("1=").unwrap(), (1, String::new()));
        assert!(parse_gap("x=text").is_err());
        assert!(parse_gap("-1=text").is_err());
        assert!(parse_gap("no separator").is_err());
    }

    #[test]
    fn test_cli_parses_annotate() {
        let cli = Cli::try_parse_from(["tw", "annotate", "t1", "--gap", "0=a", "--gap", "3=b"]).unwrap();
        match cli.command {
            Commands::Annotate { thread_id, gaps } => {
                assert_eq!(thread_id, "t1");
                assert_eq!(gaps, vec![(0, "a".to_string()), (3, "b".to_string())]);
            }
            _ => panic!("expected annotate"),
        }
    }
}
