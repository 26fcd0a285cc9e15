// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use scrapport_bridges::ExportFormat;
use scrapport_core::IconMode;

/// Scrapbox to Notion migration and Markdown export
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long = "config", global = true)]
    pub config_file: Option<PathBuf>,

    /// Scrapbox project name (overrides config and SCRAPBOX_PROJECT)
    #[arg(short, long, global = true)]
    pub project: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Migrate every page of a Scrapbox project into a Notion database
    Migrate(MigrateArgs),

    /// Export a Scrapbox project to Markdown or raw text files
    Export(ExportArgs),

    /// Turn `[Title]` text in published pages into page mentions
    RestoreLinks(RestoreArgs),
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Convert and report without writing to Notion
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of pages to process
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Publish pages even when the title already exists in Notion
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Do not restore internal links after publishing
    #[arg(long)]
    pub no_restore_links: bool,

    /// How `[name.icon]` notation is rendered
    #[arg(long, value_enum, default_value_t = IconStyle::Image)]
    pub icons: IconStyle,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Directory the project folder is written into
    #[arg(short, long, default_value = "export")]
    pub output_dir: PathBuf,

    /// Output file format
    #[arg(short = 'F', long, value_enum, default_value_t = FileFormat::Md)]
    pub format: FileFormat,

    /// Keep files that already exist
    #[arg(long)]
    pub skip_existing: bool,

    /// Maximum number of pages to export
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Report the links that would be restored without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Only rewrite these pages (repeatable)
    #[arg(long = "page")]
    pub pages: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IconStyle {
    Image,
    Text,
}

impl From<IconStyle> for IconMode {
    fn from(style: IconStyle) -> Self {
        match style {
            IconStyle::Image => IconMode::Image,
            IconStyle::Text => IconMode::Text,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Md,
    Txt,
}

impl From<FileFormat> for ExportFormat {
    fn from(format: FileFormat) -> Self {
        match format {
            FileFormat::Md => ExportFormat::Markdown,
            FileFormat::Txt => ExportFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from([
            "scrapport", "-v", "migrate", "--dry-run", "--limit", "5", "--icons", "text",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Migrate(args) => {
                assert!(args.dry_run);
                assert_eq!(args.limit, Some(5));
                assert_eq!(args.icons, IconStyle::Text);
                assert!(!args.no_skip_existing);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_restore_links_scope() {
        let cli = Cli::try_parse_from([
            "scrapport", "restore-links", "--page", "Home", "--page", "Notes", "--project", "p",
        ])
        .unwrap();
        assert_eq!(cli.project.as_deref(), Some("p"));
        match cli.command {
            Commands::RestoreLinks(args) => assert_eq!(args.pages, vec!["Home", "Notes"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_export_defaults() {
        let cli = Cli::try_parse_from(["scrapport", "export"]).unwrap();
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.output_dir, PathBuf::from("export"));
                assert_eq!(ExportFormat::from(args.format), ExportFormat::Markdown);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
