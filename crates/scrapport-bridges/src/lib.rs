// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scrapport Bridges - the I/O side of Scrapport
//!
//! Clients for the Scrapbox and Notion REST APIs, and the drivers built on
//! them:
//! - Migration of a Scrapbox project into a Notion database
//! - Link restoration across published pages
//! - Markdown export to the local file system

pub mod error;
pub mod export;
pub mod migrate;
pub mod notion;
pub mod restore;
pub mod scrapbox;
pub mod submit;
pub mod traits;

#[cfg(test)]
mod testing;

pub use error::{BridgeError, Result};
pub use export::{ExportFormat, ExportSettings, ExportSummary, PageExporter};
pub use migrate::{MigrateOptions, MigrationSummary, Migrator, PageOutcome, PageStatus};
pub use notion::NotionClient;
pub use restore::{LinkRestorer, RestoreOptions, RestoreStats};
pub use scrapbox::ScrapboxClient;
pub use submit::submit_tree;
pub use traits::{Destination, NewPage, PageSummary, Source, SourcePage};
