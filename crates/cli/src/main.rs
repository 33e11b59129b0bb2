use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use umsatz_core::{render, Directive};
use umsatz_import::{ImportConfig, Importer};

#[derive(Parser, Debug)]
#[command(name = "umsatz")]
#[command(about = "Turn German bank CSV exports into ledger transactions", long_about = None)]
struct Cli {
    /// Importer configuration file
    #[arg(short, long, global = true, default_value = "umsatz.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which importer handles each file
    Identify { files: Vec<PathBuf> },
    /// Extract transactions and balance assertions
    Extract {
        #[arg(long, value_enum, default_value_t = Format::Beancount)]
        format: Format,
        files: Vec<PathBuf>,
    },
    /// Show account, date and archive name for each file
    File { files: Vec<PathBuf> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Beancount,
    Json,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ImportConfig::from_path(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let base_dir = cli.config.parent().unwrap_or(Path::new("."));
    let importers = config
        .build(base_dir)
        .context("Failed to set up importers")?;
    tracing::debug!("{} importers configured", importers.len());

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Identify { files } => {
            for path in &files {
                if let Some(importer) = find(&importers, path) {
                    writeln!(out, "{}\t{}", path.display(), importer.name())?;
                }
            }
        }
        Commands::Extract { format, files } => {
            let mut directives: Vec<Directive> = Vec::new();
            for path in &files {
                let Some(importer) = find(&importers, path) else {
                    continue;
                };
                let extraction = importer
                    .extract(path)
                    .with_context(|| format!("Failed to extract {}", path.display()))?;
                directives.extend(extraction.directives());
            }
            match format {
                Format::Beancount => render(&mut out, &directives)?,
                Format::Json => {
                    serde_json::to_writer_pretty(&mut out, &directives)?;
                    writeln!(out)?;
                }
            }
        }
        Commands::File { files } => {
            for path in &files {
                let Some(importer) = find(&importers, path) else {
                    continue;
                };
                let date = importer
                    .file_date(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    path.display(),
                    importer.file_account(),
                    date.map(|d| d.to_string()).unwrap_or_default(),
                    importer.file_name(path).unwrap_or_default()
                )?;
            }
        }
    }
    Ok(())
}

/// First importer that recognises `path`.
fn find<'a>(importers: &'a [Importer], path: &Path) -> Option<&'a Importer> {
    let found = importers.iter().find(|importer| importer.identify(path));
    if found.is_none() {
        tracing::warn!("No importer recognises {}", path.display());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn extract_defaults_to_beancount() {
        let cli = Cli::parse_from(["umsatz", "extract", "a.csv", "b.csv"]);
        assert_eq!(cli.config, PathBuf::from("umsatz.toml"));
        match cli.command {
            Commands::Extract { format, files } => {
                assert_eq!(format, Format::Beancount);
                assert_eq!(files.len(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::parse_from([
            "umsatz", "file", "--config", "/etc/umsatz.toml", "x.csv",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/umsatz.toml"));
        assert!(matches!(cli.command, Commands::File { .. }));
    }

    #[test]
    fn json_format_flag() {
        let cli = Cli::parse_from(["umsatz", "extract", "--format", "json", "a.csv"]);
        assert!(matches!(
            cli.command,
            Commands::Extract {
                format: Format::Json,
                ..
            }
        ));
    }
}
