// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scrapport Core - Scrapbox notation parsing and conversion
//!
//! This crate provides:
//! - A line-oriented parser for Scrapbox notation with bracket disambiguation
//! - A block converter producing nested Notion blocks
//! - A Markdown exporter with content-addressed image assets
//! - Batching helpers and link-restoration planning for migrated pages
//!
//! Everything here is synchronous and does no I/O; network clients live in
//! `scrapport-bridges`.

pub mod ast;
pub mod batch;
pub mod blocks;
pub mod formats;
pub mod notation;
pub mod restore;
pub mod traits;

pub use ast::{BackgroundColor, Decoration, Inline, LineKind, PageMeta, ParsedLine};
pub use blocks::{Annotations, BlockKind, OutputBlock, RichText};
pub use formats::{
    BlockConverter, BlockOptions, ConvertedPage, ExportOptions, IconMode, MarkdownExport,
    MarkdownExporter,
};
pub use notation::{extract_tags, parse, NotationParser};
pub use restore::{plan_rewrite, RewritePlan, StoredBlock, TitleIndex};
pub use traits::{ConversionError, PageConverter, ParseOptions, Result, TargetFormat};
