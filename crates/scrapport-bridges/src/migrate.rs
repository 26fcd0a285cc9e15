// SPDX-License-Identifier: AGPL-3.0-or-later
//! Page migration: fetch, convert, publish, then restore links
//!
//! Pages are processed one at a time in listing order. A failure is recorded
//! against its page and the run moves on. Link restoration runs once, after
//! every page of the run has been published.

use std::collections::{HashMap, HashSet};

use scrapport_core::batch::{chunk_by_node_count, parse_part_title, part_title, PAGE_BLOCK_LIMIT};
use scrapport_core::{
    extract_tags, BlockConverter, BlockOptions, NotationParser, PageConverter, PageMeta,
    ParseOptions,
};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::restore::{LinkRestorer, RestoreOptions, RestoreStats};
use crate::submit::submit_tree;
use crate::traits::{Destination, NewPage, Source, SourcePage};

/// Configuration for a migration run
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Convert and report without writing to the destination
    pub dry_run: bool,
    /// Stop after this many source pages
    pub limit: Option<usize>,
    /// Leave pages already present in the destination alone
    pub skip_existing: bool,
    /// Restore internal links once all pages are published
    pub restore_links: bool,
    pub parse: ParseOptions,
    pub blocks: BlockOptions,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: None,
            skip_existing: true,
            restore_links: true,
            parse: ParseOptions::default(),
            blocks: BlockOptions::default(),
        }
    }
}

impl MigrateOptions {
    pub fn for_project(project: impl Into<String>) -> Self {
        let project = project.into();
        let mut options = Self {
            parse: ParseOptions::for_project(project.clone()),
            ..Self::default()
        };
        options.blocks.project_name = Some(project);
        options
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStatus {
    /// Published as one page per id (several when split)
    Created { page_ids: Vec<String> },
    /// Would have been published as `parts` pages
    DryRun { parts: usize },
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    pub title: String,
    pub status: PageStatus,
    /// Blocks produced for the page, nested ones included
    pub nodes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<PageOutcome>,
    pub restore: Option<RestoreStats>,
}

impl MigrationSummary {
    fn record(&mut self, outcome: PageOutcome) {
        self.total += 1;
        match outcome.status {
            PageStatus::Created { .. } | PageStatus::DryRun { .. } => self.successful += 1,
            PageStatus::Skipped => self.skipped += 1,
            PageStatus::Failed { .. } => self.failed += 1,
        }
        self.results.push(outcome);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Titles of every page created in this run, split parts included
    fn created_titles(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|outcome| match &outcome.status {
                PageStatus::Created { page_ids } => Some((outcome.title.as_str(), page_ids.len())),
                _ => None,
            })
            .flat_map(|(title, parts)| (1..=parts).map(move |i| part_title(title, i, parts)))
            .collect()
    }

    pub fn log(&self) {
        info!(
            total = self.total,
            successful = self.successful,
            failed = self.failed,
            skipped = self.skipped,
            "migration finished"
        );
        for outcome in &self.results {
            if let PageStatus::Failed { error } = &outcome.status {
                error!(page = %outcome.title, error = %error, "page failed");
            }
        }
        if let Some(restore) = &self.restore {
            restore.log();
        }
    }
}

/// Destination titles, with split pages grouped by base title
#[derive(Debug, Default)]
struct PublishedTitles {
    whole: HashSet<String>,
    parts: HashMap<(String, usize), HashSet<usize>>,
}

impl PublishedTitles {
    fn insert(&mut self, title: &str) {
        if let Some((base, index, total)) = parse_part_title(title) {
            self.parts
                .entry((base.to_string(), total))
                .or_default()
                .insert(index);
        }
        self.whole.insert(title.to_string());
    }

    /// Present as a single page, or as a complete set of parts
    fn contains(&self, title: &str) -> bool {
        self.whole.contains(title)
            || self
                .parts
                .iter()
                .any(|((base, total), found)| base == title && found.len() == *total)
    }
}

pub struct Migrator<'a, S: ?Sized, D: ?Sized> {
    source: &'a S,
    destination: &'a D,
    options: MigrateOptions,
    parser: NotationParser,
    converter: BlockConverter,
}

impl<'a, S, D> Migrator<'a, S, D>
where
    S: Source + ?Sized,
    D: Destination + ?Sized,
{
    pub fn new(source: &'a S, destination: &'a D, options: MigrateOptions) -> Self {
        Self {
            source,
            destination,
            parser: NotationParser::new(options.parse.clone()),
            converter: BlockConverter::new(options.blocks.clone()),
            options,
        }
    }

    /// Migrate every listed page; only a failure to list the source is fatal
    pub async fn run(&self) -> Result<MigrationSummary> {
        let mut pages = self.source.list_pages().await?;
        if let Some(limit) = self.options.limit {
            pages.truncate(limit);
        }
        info!(project = self.source.project(), pages = pages.len(), dry_run = self.options.dry_run, "starting migration");

        let published = self.published_titles().await;
        let mut summary = MigrationSummary::default();

        for (position, page) in pages.iter().enumerate() {
            info!(page = %page.title, position = position + 1, total = pages.len(), "migrating");
            let outcome = if published.contains(&page.title) {
                info!(page = %page.title, "already published, skipping");
                PageOutcome {
                    title: page.title.clone(),
                    status: PageStatus::Skipped,
                    nodes: 0,
                }
            } else {
                self.migrate_page(page).await
            };
            summary.record(outcome);
        }

        if self.options.restore_links && !self.options.dry_run && summary.successful > 0 {
            let options = RestoreOptions {
                dry_run: false,
                page_titles: Some(summary.created_titles()),
            };
            match LinkRestorer::new(self.destination, options).run().await {
                Ok(stats) => summary.restore = Some(stats),
                Err(err) => error!(error = %err, "link restoration failed"),
            }
        }

        Ok(summary)
    }

    async fn published_titles(&self) -> PublishedTitles {
        let mut titles = PublishedTitles::default();
        if !self.options.skip_existing {
            return titles;
        }
        match self.destination.list_pages().await {
            Ok(pages) => pages.iter().for_each(|p| titles.insert(&p.title)),
            Err(err) => warn!(error = %err, "could not list destination pages, nothing will be skipped"),
        }
        titles
    }

    async fn migrate_page(&self, page: &SourcePage) -> PageOutcome {
        match self.publish(page).await {
            Ok((status, nodes)) => PageOutcome {
                title: page.title.clone(),
                status,
                nodes,
            },
            Err(err) => {
                error!(page = %page.title, error = %err, "migration failed");
                PageOutcome {
                    title: page.title.clone(),
                    status: PageStatus::Failed {
                        error: err.to_string(),
                    },
                    nodes: 0,
                }
            }
        }
    }

    async fn publish(&self, page: &SourcePage) -> Result<(PageStatus, usize)> {
        let text = self.source.page_text(&page.title).await?;
        let lines = self.parser.parse(&text);
        let meta = PageMeta {
            title: page.title.clone(),
            created: page.created,
            updated: page.updated,
            tags: extract_tags(&lines),
        };
        let converted = self.converter.convert(&lines, &meta)?;
        let nodes = converted.node_count();
        debug!(page = %page.title, target = self.converter.target().name(), nodes, "converted");

        let mut parts = chunk_by_node_count(converted.blocks, PAGE_BLOCK_LIMIT);
        if parts.is_empty() {
            parts.push(Vec::new());
        }
        let total = parts.len();
        if total > 1 {
            info!(page = %page.title, nodes, parts = total, "splitting large page");
        }

        if self.options.dry_run {
            info!(page = %page.title, nodes, parts = total, "dry run");
            return Ok((PageStatus::DryRun { parts: total }, nodes));
        }

        let source_url = self.source.page_url(&page.title);
        let mut page_ids = Vec::with_capacity(total);
        for (index, blocks) in parts.iter().enumerate() {
            let new_page = NewPage {
                title: part_title(&page.title, index + 1, total),
                source_url: source_url.clone(),
                created: page.created,
                tags: meta.tags.clone(),
            };
            let page_id = match self.destination.create_page(&new_page).await {
                Ok(page_id) => page_id,
                Err(err) => {
                    self.discard(&page.title, &page_ids).await;
                    return Err(err);
                }
            };
            page_ids.push(page_id.clone());
            if let Err(err) = submit_tree(self.destination, &page_id, blocks).await {
                self.discard(&page.title, &page_ids).await;
                return Err(err);
            }
        }

        info!(page = %page.title, nodes, "published");
        Ok((PageStatus::Created { page_ids }, nodes))
    }

    /// Archive the pages of a failed publish so a later run does not skip a half-written page
    async fn discard(&self, title: &str, page_ids: &[String]) {
        for page_id in page_ids {
            match self.destination.archive_page(page_id).await {
                Ok(()) => warn!(page = %title, %page_id, "archived incomplete page"),
                Err(err) => error!(page = %title, %page_id, error = %err, "could not archive incomplete page"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDestination, FakeSource};
    use pretty_assertions::assert_eq;

    fn options() -> MigrateOptions {
        MigrateOptions::for_project("proj")
    }

    #[tokio::test]
    async fn test_migrates_pages_and_properties() {
        let source = FakeSource::default().with_page("Home", "Home\nhello #alpha\n link");
        let destination = FakeDestination::default();

        let summary = Migrator::new(&source, &destination, options()).run().await.unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.successful, 1);
        let created = destination.created();
        assert_eq!(created[0].title, "Home");
        assert_eq!(created[0].source_url, "https://scrapbox.io/proj/Home");
        assert_eq!(created[0].tags, vec!["alpha".to_string()]);
        assert!(!destination.appends().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_run() {
        let source = FakeSource::default()
            .with_page("Broken", "x")
            .with_page("Fine", "y")
            .with_broken("Broken");
        let destination = FakeDestination::default();

        let summary = Migrator::new(&source, &destination, options()).run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.successful, 1);
        assert!(summary.has_failures());
        assert!(matches!(summary.results[0].status, PageStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_existing_pages_are_skipped() {
        let source = FakeSource::default().with_page("Home", "x").with_page("New", "y");
        let destination = FakeDestination::default().with_page("p0", "Home");

        let summary = Migrator::new(&source, &destination, options()).run().await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(destination.created().len(), 1);
        assert_eq!(destination.created()[0].title, "New");
    }

    #[tokio::test]
    async fn test_dry_run_and_limit() {
        let source = FakeSource::default()
            .with_page("A", "a")
            .with_page("B", "b")
            .with_page("C", "c");
        let destination = FakeDestination::default();
        let options = MigrateOptions {
            dry_run: true,
            limit: Some(2),
            ..options()
        };

        let summary = Migrator::new(&source, &destination, options).run().await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.results[1].status, PageStatus::DryRun { parts: 1 });
        assert!(destination.created().is_empty());
        assert!(summary.restore.is_none());
    }

    #[tokio::test]
    async fn test_large_page_is_split_into_parts() {
        let text: Vec<String> = (0..1500).map(|i| format!("line {i}")).collect();
        let source = FakeSource::default().with_page("Log", &text.join("\n"));
        let destination = FakeDestination::default();

        let summary = Migrator::new(&source, &destination, options()).run().await.unwrap();

        let titles: Vec<String> = destination.created().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Log - 1/2".to_string(), "Log - 2/2".to_string()]);
        assert!(matches!(&summary.results[0].status, PageStatus::Created { page_ids } if page_ids.len() == 2));
    }

    #[tokio::test]
    async fn test_partial_page_is_archived_and_retried_next_run() {
        let text: Vec<String> = (0..150).map(|i| format!("line {i}")).collect();
        let source = FakeSource::default().with_page("Long", &text.join("\n"));
        let destination = FakeDestination::default().with_failing_append(2);

        let summary = Migrator::new(&source, &destination, options()).run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(matches!(&summary.results[0].status, PageStatus::Failed { error } if error.contains("validation")));
        assert_eq!(destination.archived(), vec!["page-1".to_string()]);
        assert!(destination.list_pages().await.unwrap().is_empty());

        let rerun = Migrator::new(&source, &destination, options()).run().await.unwrap();
        assert_eq!(rerun.skipped, 0);
        assert_eq!(rerun.successful, 1);
    }

    #[tokio::test]
    async fn test_links_are_restored_after_all_pages() {
        let source = FakeSource::default()
            .with_page("First", "see [Second]")
            .with_page("Second", "back to [First]");
        let destination = FakeDestination::default();

        let summary = Migrator::new(&source, &destination, options()).run().await.unwrap();

        let restore = summary.restore.unwrap();
        assert_eq!(restore.links_restored, 2);
        assert_eq!(destination.updates().len(), 2);
    }

    #[test]
    fn test_split_page_counts_as_published_only_when_complete() {
        let mut titles = PublishedTitles::default();
        titles.insert("Log - 1/2");
        assert!(!titles.contains("Log"));
        titles.insert("Log - 2/2");
        assert!(titles.contains("Log"));
        assert!(!titles.contains("Other"));
    }
}
