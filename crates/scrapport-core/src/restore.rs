// SPDX-License-Identifier: AGPL-3.0-or-later
//! Link restoration planning
//!
//! Internal links survive block conversion as literal `[title]` text. Once the
//! target pages exist, this module finds those spans in existing rich text and
//! plans their replacement with page mentions. Nothing here talks to a server;
//! callers fetch blocks, plan, and apply the returned rewrites.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};
use tracing::warn;

use crate::ast::LineKind;
use crate::blocks::{Mention, RichText};
use crate::notation::bracket::{fragment_parts, resolve};
use crate::traits::ParseOptions;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("valid link regex"));

/// Block types whose body is a `rich_text` array this planner can rewrite
pub const TEXT_BLOCK_TYPES: &[&str] = &[
    "paragraph",
    "heading_1",
    "heading_2",
    "heading_3",
    "bulleted_list_item",
    "numbered_list_item",
    "quote",
    "callout",
    "to_do",
    "toggle",
];

/// Title to page-id lookup
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    titles: HashMap<String, String>,
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later insertions win when two pages share a title
    pub fn insert(&mut self, title: impl Into<String>, page_id: impl Into<String>) {
        let title = title.into();
        let page_id = page_id.into();
        if let Some(previous) = self.titles.get(&title) {
            if *previous != page_id {
                warn!(%title, %previous, replacement = %page_id, "duplicate page title");
            }
        }
        self.titles.insert(title, page_id);
    }

    pub fn resolve(&self, title: &str) -> Option<&str> {
        self.titles.get(title).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl<T: Into<String>, U: Into<String>> FromIterator<(T, U)> for TitleIndex {
    fn from_iter<I: IntoIterator<Item = (T, U)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (title, page_id) in iter {
            index.insert(title, page_id);
        }
        index
    }
}

/// A block read back from the destination
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlock {
    pub id: String,
    pub block_type: String,
    pub rich_text: Vec<RichText>,
    pub has_children: bool,
}

impl StoredBlock {
    /// Parse a Notion block object; `None` for blocks without rewritable text
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let block_type = value.get("type")?.as_str()?.to_string();
        let has_children = value
            .get("has_children")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !TEXT_BLOCK_TYPES.contains(&block_type.as_str()) {
            return None;
        }
        let runs = value.get(&block_type)?.get("rich_text")?.clone();
        let rich_text = serde_json::from_value(runs).ok()?;
        Some(Self {
            id,
            block_type,
            rich_text,
            has_children,
        })
    }
}

/// One bracketed title replaced by a mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEdit {
    pub block_id: String,
    /// Index of the run in the block's original rich text
    pub run_index: usize,
    pub old_text: String,
    pub title: String,
    pub page_id: String,
}

/// New rich text for a block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRewrite {
    pub block_id: String,
    pub block_type: String,
    pub rich_text: Vec<RichText>,
}

impl BlockRewrite {
    /// Body of the block update request
    pub fn update_body(&self) -> Value {
        let mut body = serde_json::Map::new();
        body.insert(
            self.block_type.clone(),
            json!({ "rich_text": self.rich_text }),
        );
        Value::Object(body)
    }
}

/// Everything to change on one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewritePlan {
    pub edits: Vec<LinkEdit>,
    pub rewrites: Vec<BlockRewrite>,
    /// Titles that had no matching page, in order of appearance
    pub unresolved: Vec<String>,
    /// Candidate links seen, resolved or not
    pub links_found: usize,
}

impl RewritePlan {
    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty()
    }

    pub fn links_restored(&self) -> usize {
        self.edits.len()
    }

    fn merge(&mut self, other: RewritePlan) {
        self.edits.extend(other.edits);
        self.rewrites.extend(other.rewrites);
        self.unresolved.extend(other.unresolved);
        self.links_found += other.links_found;
    }
}

/// Plan mention replacements for a set of blocks
pub fn plan_rewrite(blocks: &[StoredBlock], index: &TitleIndex) -> RewritePlan {
    let mut plan = RewritePlan::default();
    for block in blocks {
        plan.merge(plan_block(block, index));
    }
    plan
}

fn plan_block(block: &StoredBlock, index: &TitleIndex) -> RewritePlan {
    let mut plan = RewritePlan::default();
    if !block.rich_text.iter().all(round_trippable) {
        return plan;
    }

    let mut runs = Vec::with_capacity(block.rich_text.len());
    for (run_index, run) in block.rich_text.iter().enumerate() {
        let Some(content) = scannable_text(run) else {
            runs.push(run.clone());
            continue;
        };
        let annotations = run.annotations().cloned().unwrap_or_default();

        let mut pieces = Vec::new();
        let mut last = 0;
        for caps in LINK_RE.captures_iter(content) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let title = inner.as_str();
            let double = content[..whole.start()].ends_with('[') && content[whole.end()..].starts_with(']');
            if double || !is_restorable(title) {
                continue;
            }

            plan.links_found += 1;
            let Some(page_id) = index.resolve(title) else {
                plan.unresolved.push(title.to_string());
                continue;
            };

            if whole.start() > last {
                pieces.push(RichText::styled(
                    &content[last..whole.start()],
                    annotations.clone(),
                    None,
                ));
            }
            pieces.push(RichText::page_mention(page_id, annotations.clone()));
            plan.edits.push(LinkEdit {
                block_id: block.id.clone(),
                run_index,
                old_text: whole.as_str().to_string(),
                title: title.to_string(),
                page_id: page_id.to_string(),
            });
            last = whole.end();
        }

        if pieces.is_empty() {
            runs.push(run.clone());
            continue;
        }
        if last < content.len() {
            pieces.push(RichText::styled(&content[last..], annotations, None));
        }
        runs.extend(pieces);
    }

    if !plan.edits.is_empty() {
        plan.rewrites.push(BlockRewrite {
            block_id: block.id.clone(),
            block_type: block.block_type.clone(),
            rich_text: runs,
        });
    }
    plan
}

/// Text of runs that may contain restorable links: no link, no code, not a mention
fn scannable_text(run: &RichText) -> Option<&str> {
    match run {
        RichText::Text { text, annotations } if text.link.is_none() && !annotations.code => {
            Some(&text.content)
        }
        _ => None,
    }
}

fn round_trippable(run: &RichText) -> bool {
    match run {
        RichText::Text { .. } | RichText::Equation { .. } => true,
        RichText::Mention { mention, .. } => !matches!(mention, Mention::Unsupported),
        RichText::Unsupported => false,
    }
}

/// Only plain internal links qualify; URLs, images, icons and decorations do not
pub fn is_restorable(title: &str) -> bool {
    matches!(
        resolve(title, &ParseOptions::default()),
        LineKind::InternalLink { .. }
    ) && fragment_parts(title).is_none()
}
