// SPDX-License-Identifier: AGPL-3.0-or-later
//! Markdown file export
//!
//! Writes `<output>/<project>/<title>.md` per page with downloaded images in
//! an `assets/` directory next to the pages.

use std::path::{Path, PathBuf};

use scrapport_core::formats::markdown::sanitize_filename;
use scrapport_core::{
    extract_tags, ExportOptions, MarkdownExporter, NotationParser, PageConverter, PageMeta,
    ParseOptions,
};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::traits::{Source, SourcePage};

/// Output file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Markdown,
    /// Raw page text, unchanged
    Text,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Text => "txt",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    pub format: ExportFormat,
    /// Leave files that already exist untouched
    pub skip_existing: bool,
    pub limit: Option<usize>,
    pub exporter: ExportOptions,
    pub parse: ParseOptions,
}

impl ExportSettings {
    pub fn new(output_dir: impl Into<PathBuf>, project: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: ExportFormat::default(),
            skip_existing: false,
            limit: None,
            exporter: ExportOptions {
                project_name: Some(project.to_string()),
                ..ExportOptions::default()
            },
            parse: ParseOptions::for_project(project),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub total: usize,
    pub exported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub assets_downloaded: usize,
    pub assets_failed: usize,
    /// `(title, error)` for every failed page
    pub failures: Vec<(String, String)>,
}

impl ExportSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn log(&self) {
        info!(
            total = self.total,
            exported = self.exported,
            skipped = self.skipped,
            failed = self.failed,
            assets = self.assets_downloaded,
            "export finished"
        );
        if self.assets_failed > 0 {
            warn!(count = self.assets_failed, "some assets could not be downloaded");
        }
    }
}

pub struct PageExporter<'a, S: ?Sized> {
    source: &'a S,
    settings: ExportSettings,
    parser: NotationParser,
    exporter: MarkdownExporter,
}

impl<'a, S> PageExporter<'a, S>
where
    S: Source + ?Sized,
{
    pub fn new(source: &'a S, settings: ExportSettings) -> Self {
        Self {
            source,
            parser: NotationParser::new(settings.parse.clone()),
            exporter: MarkdownExporter::new(settings.exporter.clone()),
            settings,
        }
    }

    /// Directory the project's pages are written to
    pub fn project_dir(&self) -> PathBuf {
        self.settings
            .output_dir
            .join(sanitize_filename(self.source.project()))
    }

    pub fn page_path(&self, title: &str) -> PathBuf {
        self.project_dir().join(format!(
            "{}.{}",
            sanitize_filename(title),
            self.settings.format.extension()
        ))
    }

    pub async fn run(&self) -> Result<ExportSummary> {
        let mut pages = self.source.list_pages().await?;
        if let Some(limit) = self.settings.limit {
            pages.truncate(limit);
        }
        let project_dir = self.project_dir();
        fs::create_dir_all(&project_dir).await?;
        info!(dir = %project_dir.display(), pages = pages.len(), "exporting");

        let mut summary = ExportSummary::default();
        for page in &pages {
            summary.total += 1;
            let path = self.page_path(&page.title);
            if self.settings.skip_existing && fs::try_exists(&path).await? {
                debug!(page = %page.title, "file exists, skipping");
                summary.skipped += 1;
                continue;
            }
            match self.export_page(page, &path, &mut summary).await {
                Ok(()) => summary.exported += 1,
                Err(err) => {
                    error!(page = %page.title, error = %err, "export failed");
                    summary.failed += 1;
                    summary.failures.push((page.title.clone(), err.to_string()));
                }
            }
        }
        Ok(summary)
    }

    async fn export_page(&self, page: &SourcePage, path: &Path, summary: &mut ExportSummary) -> Result<()> {
        let text = self.source.page_text(&page.title).await?;
        let contents = match self.settings.format {
            ExportFormat::Text => text,
            ExportFormat::Markdown => {
                let lines = self.parser.parse(&text);
                let meta = PageMeta {
                    title: page.title.clone(),
                    created: page.created,
                    updated: page.updated,
                    tags: extract_tags(&lines),
                };
                let export = self.exporter.convert(&lines, &meta)?;
                self.download_assets(&export.assets, summary).await?;
                self.exporter.document(&meta, &export)
            }
        };
        fs::write(path, contents).await?;
        debug!(page = %page.title, path = %path.display(), "wrote page");
        Ok(())
    }

    /// A failed download leaves a broken image reference but never fails the page
    async fn download_assets(
        &self,
        assets: &[scrapport_core::formats::markdown::AssetRequest],
        summary: &mut ExportSummary,
    ) -> Result<()> {
        if assets.is_empty() {
            return Ok(());
        }
        let dir = self.project_dir().join(&self.settings.exporter.assets_dir);
        fs::create_dir_all(&dir).await?;

        for asset in assets {
            let target = dir.join(&asset.filename);
            if fs::try_exists(&target).await? {
                continue;
            }
            match self.source.fetch_file(&asset.url).await {
                Ok(bytes) => {
                    fs::write(&target, bytes).await?;
                    summary.assets_downloaded += 1;
                }
                Err(err) => {
                    warn!(url = %asset.url, error = %err, "asset download failed");
                    summary.assets_failed += 1;
                }
            }
        }
        Ok(())
    }
}
