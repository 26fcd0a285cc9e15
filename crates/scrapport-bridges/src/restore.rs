// SPDX-License-Identifier: AGPL-3.0-or-later
//! Link restoration against a live destination
//!
//! Phase one lists every destination page into a [`TitleIndex`]; phase two
//! reads each page's block tree, plans the rewrite in the core and applies
//! it block by block. One page failing never stops the others.

use std::collections::{BTreeMap, HashSet};

use scrapport_core::batch::parse_part_title;
use scrapport_core::restore::{plan_rewrite, RewritePlan, StoredBlock, TitleIndex};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::traits::{Destination, PageSummary};

/// Configuration for a restoration run
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Plan and report only
    pub dry_run: bool,
    /// Restrict the rewrite to these titles; split pages match by base title too
    pub page_titles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreStats {
    pub pages_processed: usize,
    pub links_found: usize,
    pub links_restored: usize,
    pub errors: usize,
    /// Unresolved link titles keyed by the page they appear on
    pub unresolved: BTreeMap<String, Vec<String>>,
}

impl RestoreStats {
    pub fn log(&self) {
        info!(
            pages = self.pages_processed,
            found = self.links_found,
            restored = self.links_restored,
            errors = self.errors,
            "link restoration finished"
        );
        for (page, titles) in &self.unresolved {
            warn!(page = %page, unresolved = ?titles, "links without a destination page");
        }
    }
}

/// Build the title index; a split page is reachable by its base title through part 1
pub fn index_pages(pages: &[PageSummary]) -> TitleIndex {
    let mut index = TitleIndex::new();
    for page in pages {
        match parse_part_title(&page.title) {
            Some((base, 1, _)) => index.insert(base, page.id.as_str()),
            Some(_) => {}
            None => index.insert(page.title.as_str(), page.id.as_str()),
        }
    }
    index
}

pub struct LinkRestorer<'a, D: ?Sized> {
    destination: &'a D,
    options: RestoreOptions,
}

impl<'a, D> LinkRestorer<'a, D>
where
    D: Destination + ?Sized,
{
    pub fn new(destination: &'a D, options: RestoreOptions) -> Self {
        Self {
            destination,
            options,
        }
    }

    /// Run both phases over the destination
    pub async fn run(&self) -> Result<RestoreStats> {
        let pages = self.destination.list_pages().await?;
        let index = index_pages(&pages);
        info!(pages = pages.len(), indexed = index.len(), "built title index");

        let scope: Option<HashSet<&str>> = self
            .options
            .page_titles
            .as_ref()
            .map(|titles| titles.iter().map(String::as_str).collect());

        let mut stats = RestoreStats::default();
        for page in pages.iter().filter(|p| in_scope(scope.as_ref(), &p.title)) {
            match self.restore_page(page, &index).await {
                Ok(plan) => {
                    stats.pages_processed += 1;
                    stats.links_found += plan.links_found;
                    stats.links_restored += plan.links_restored();
                    if !plan.unresolved.is_empty() {
                        stats.unresolved.insert(page.title.clone(), plan.unresolved);
                    }
                }
                Err(err) => {
                    error!(page = %page.title, error = %err, "link restoration failed");
                    stats.errors += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn restore_page(&self, page: &PageSummary, index: &TitleIndex) -> Result<RewritePlan> {
        let blocks = self.collect_blocks(&page.id).await?;
        let plan = plan_rewrite(&blocks, index);
        if plan.is_empty() {
            debug!(page = %page.title, found = plan.links_found, "nothing to restore");
            return Ok(plan);
        }

        if self.options.dry_run {
            for edit in &plan.edits {
                info!(page = %page.title, link = %edit.old_text, target = %edit.page_id, "would restore link");
            }
            return Ok(plan);
        }

        for rewrite in &plan.rewrites {
            self.destination
                .update_block(&rewrite.block_id, &rewrite.update_body())
                .await?;
        }
        info!(page = %page.title, restored = plan.links_restored(), "restored links");
        Ok(plan)
    }

    /// Every text block under `root`, depth first
    async fn collect_blocks(&self, root: &str) -> Result<Vec<StoredBlock>> {
        let mut blocks = Vec::new();
        let mut pending = vec![root.to_string()];

        while let Some(parent) = pending.pop() {
            let children = self.destination.list_children(&parent).await?;
            for child in children.iter().rev() {
                if child.get("has_children").and_then(Value::as_bool) == Some(true) {
                    if let Some(id) = child.get("id").and_then(Value::as_str) {
                        pending.push(id.to_string());
                    }
                }
            }
            blocks.extend(children.iter().filter_map(StoredBlock::from_json));
        }
        Ok(blocks)
    }
}

fn in_scope(scope: Option<&HashSet<&str>>, title: &str) -> bool {
    let Some(scope) = scope else {
        return true;
    };
    scope.contains(title)
        || parse_part_title(title).is_some_and(|(base, _, _)| scope.contains(base))
}
