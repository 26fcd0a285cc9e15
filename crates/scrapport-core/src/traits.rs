// SPDX-License-Identifier: AGPL-3.0-or-later
//! Converter trait, shared options and the core error type

use crate::ast::{PageMeta, ParsedLine};

/// Error type for conversion
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid page metadata: {0}")]
    InvalidMetadata(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Default Scrapbox host used to build source URLs
pub const DEFAULT_HOST: &str = "https://scrapbox.io";

/// Configuration for parsing
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Source project; enables fragment-link resolution
    pub project_name: Option<String>,
    /// Columns per indentation unit (a tab always counts as one unit)
    pub indent_width: usize,
    /// Scheme and host used for source URLs
    pub host: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            project_name: None,
            indent_width: 1,
            host: DEFAULT_HOST.to_string(),
        }
    }
}

impl ParseOptions {
    pub fn for_project(project_name: impl Into<String>) -> Self {
        Self {
            project_name: Some(project_name.into()),
            ..Self::default()
        }
    }

    /// Canonical URL of a page in `project`
    pub fn page_url(&self, project: &str, title: &str) -> String {
        page_url(&self.host, project, title)
    }
}

/// `{host}/{project}/{title}` with spaces turned into underscores and the rest percent-encoded
pub fn page_url(host: &str, project: &str, title: &str) -> String {
    format!(
        "{}/{}/{}",
        host.trim_end_matches('/'),
        urlencoding::encode(project),
        urlencoding::encode(&title.replace(' ', "_"))
    )
}

/// Output targets a converter can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    NotionBlocks,
    Markdown,
}

impl TargetFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotionBlocks => "notion",
            Self::Markdown => "markdown",
        }
    }
}

/// Converter trait: turn parsed lines into a target representation
pub trait PageConverter: Send + Sync {
    type Output;

    /// The target this converter produces
    fn target(&self) -> TargetFormat;

    /// Convert one page
    fn convert(&self, lines: &[ParsedLine], meta: &PageMeta) -> Result<Self::Output>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_encodes_title() {
        assert_eq!(
            page_url("https://scrapbox.io/", "proj", "Hello World"),
            "https://scrapbox.io/proj/Hello_World"
        );
        assert_eq!(
            page_url(DEFAULT_HOST, "proj", "日本"),
            "https://scrapbox.io/proj/%E6%97%A5%E6%9C%AC"
        );
    }

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert_eq!(options.indent_width, 1);
        assert!(options.project_name.is_none());
        assert_eq!(ParseOptions::for_project("p").project_name.as_deref(), Some("p"));
    }
}
