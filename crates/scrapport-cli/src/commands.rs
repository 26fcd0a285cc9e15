// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subcommand handlers; each returns `false` when any page failed

use anyhow::{Context, Result};
use scrapport_bridges::{
    ExportSettings, LinkRestorer, MigrateOptions, Migrator, NotionClient, PageExporter,
    RestoreOptions, ScrapboxClient,
};
use tracing::info;

use crate::cli::{ExportArgs, MigrateArgs, RestoreArgs};
use crate::config::Config;

fn scrapbox_client(config: &Config) -> ScrapboxClient {
    let mut client = ScrapboxClient::new(config.project());
    if let Some(sid) = &config.scrapbox.connect_sid {
        client = client.with_session(sid.as_str());
    }
    if let Some(host) = &config.scrapbox.host {
        client = client.with_base_url(host.as_str());
    }
    client
}

fn notion_client(config: &Config) -> NotionClient {
    NotionClient::new(
        config.notion.api_key.as_deref().unwrap_or_default(),
        config.notion.database_id.as_deref().unwrap_or_default(),
    )
}

pub async fn migrate(config: &Config, args: &MigrateArgs) -> Result<bool> {
    config.validate(true, true)?;
    let source = scrapbox_client(config);
    let destination = notion_client(config);

    let mut options = MigrateOptions {
        dry_run: args.dry_run,
        limit: args.limit,
        skip_existing: !args.no_skip_existing,
        restore_links: !args.no_restore_links,
        ..MigrateOptions::for_project(config.project())
    };
    options.blocks.icon_mode = args.icons.into();
    options.parse.host = source.base_url().to_string();
    options.blocks.host = source.base_url().to_string();

    let summary = Migrator::new(&source, &destination, options)
        .run()
        .await
        .context("Migration failed")?;
    summary.log();
    Ok(!summary.has_failures())
}

pub async fn export(config: &Config, args: &ExportArgs) -> Result<bool> {
    config.validate(true, false)?;
    let source = scrapbox_client(config);

    let mut settings = ExportSettings::new(&args.output_dir, config.project());
    settings.format = args.format.into();
    settings.skip_existing = args.skip_existing;
    settings.limit = args.limit;
    settings.parse.host = source.base_url().to_string();
    settings.exporter.host = source.base_url().to_string();

    let summary = PageExporter::new(&source, settings)
        .run()
        .await
        .with_context(|| format!("Export to {} failed", args.output_dir.display()))?;
    summary.log();
    Ok(!summary.has_failures())
}

pub async fn restore_links(config: &Config, args: &RestoreArgs) -> Result<bool> {
    config.validate(false, true)?;
    let destination = notion_client(config);

    let options = RestoreOptions {
        dry_run: args.dry_run,
        page_titles: (!args.pages.is_empty()).then(|| args.pages.clone()),
    };
    if options.dry_run {
        info!("dry run: no blocks will be changed");
    }

    let stats = LinkRestorer::new(&destination, options)
        .run()
        .await
        .context("Link restoration failed")?;
    stats.log();
    Ok(stats.errors == 0)
}
