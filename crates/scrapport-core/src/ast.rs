// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parsed representation of Scrapbox notation
//!
//! The parser produces exactly one [`ParsedLine`] per source line. Notation is
//! resolved into a closed [`LineKind`] plus a run of [`Inline`] elements, so the
//! converters never look at raw bracket syntax again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::{ConversionError, Result};

/// One classified source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLine {
    /// The untouched source line (without the line break)
    pub original: String,
    pub kind: LineKind,
    /// Semantic payload with notation stripped; meaning depends on `kind`
    pub content: String,
    /// Leading indentation units; never capped at parse time
    pub indent_level: usize,
    /// Inline elements of the line body, empty for code and table lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inlines: Vec<Inline>,
}

impl ParsedLine {
    pub fn new(original: impl Into<String>, kind: LineKind, content: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            kind,
            content: content.into(),
            indent_level: 0,
            inlines: Vec::new(),
        }
    }

    pub fn with_indent(mut self, indent_level: usize) -> Self {
        self.indent_level = indent_level;
        self
    }

    pub fn with_inlines(mut self, inlines: Vec<Inline>) -> Self {
        self.inlines = inlines;
        self
    }

    /// URL carried by URL, image and source-link lines
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            LineKind::UrlBare { url }
            | LineKind::UrlWithText { url, .. }
            | LineKind::Image { url, .. }
            | LineKind::InternalFragmentLink { url, .. }
            | LineKind::CrossProjectLink { url, .. }
            | LineKind::Location { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn link_text(&self) -> Option<&str> {
        match &self.kind {
            LineKind::UrlWithText { link_text, .. } => Some(link_text),
            _ => None,
        }
    }

    pub fn icon_project(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Icon { project, .. } => project.as_deref(),
            _ => None,
        }
    }

    pub fn icon_page_name(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Icon { page_name, .. } => Some(page_name),
            _ => None,
        }
    }

    pub fn code_language(&self) -> Option<&str> {
        match &self.kind {
            LineKind::CodeBlockHeader { language, .. } => Some(language),
            _ => None,
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        match &self.kind {
            LineKind::TableHeader { name } => Some(name),
            _ => None,
        }
    }
}

/// Semantic role of a line (or of a single bracket span)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineKind {
    Paragraph,
    /// Heading with level 2-4
    Heading { level: u8 },
    /// Indented text line
    BulletItem,
    Quote,
    Callout,
    /// `$ cmd` or `% cmd`
    CommandLine { prompt: char },
    CodeBlockHeader { filename: String, language: String },
    CodeBlockLine,
    TableHeader { name: String },
    TableRow { cells: Vec<String> },
    UrlBare { url: String },
    UrlWithText { url: String, link_text: String },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link: Option<String>,
        #[serde(default)]
        large: bool,
    },
    Icon {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
        page_name: String,
        repeat: u32,
    },
    InternalLink { title: String },
    InternalFragmentLink { title: String, fragment: String, url: String },
    CrossProjectLink {
        project: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fragment: Option<String>,
        url: String,
    },
    /// `[$ expr $]`
    Formula { expression: String },
    /// `[N35.6,E139.7,Z14 label]`; coordinates are signed decimal degrees
    Location {
        latitude: String,
        longitude: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zoom: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        url: String,
    },
    DecoratedText { decoration: Decoration, content: Vec<Inline> },
    InlineCode,
    Hashtag,
    Blank,
}

impl LineKind {
    /// Whether this kind belongs to a code or table region
    pub fn is_region_line(&self) -> bool {
        matches!(self, Self::CodeBlockLine | Self::TableRow { .. })
    }
}

/// Inline element inside a line body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text { text: String },
    Code { code: String },
    Hashtag { tag: String },
    /// A resolved bracket span; `raw` keeps the source including brackets
    Notation { raw: String, kind: LineKind },
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Plain text with all notation removed
    pub fn plain_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Code { code } => code.clone(),
            Self::Hashtag { tag } => format!("#{tag}"),
            Self::Notation { raw, kind } => match kind {
                LineKind::DecoratedText { content, .. } => plain_text(content),
                LineKind::UrlBare { url } | LineKind::Image { url, .. } => url.clone(),
                LineKind::UrlWithText { link_text, .. } => link_text.clone(),
                LineKind::Icon { page_name, .. } => page_name.clone(),
                LineKind::InternalLink { title } => title.clone(),
                LineKind::InternalFragmentLink {
                    title, fragment, ..
                } => format!("{title}#{fragment}"),
                LineKind::CrossProjectLink { project, title, .. } => format!("/{project}/{title}"),
                LineKind::Formula { expression } => expression.clone(),
                LineKind::Location {
                    latitude,
                    longitude,
                    label,
                    ..
                } => label
                    .clone()
                    .unwrap_or_else(|| format!("{latitude},{longitude}")),
                _ => raw.clone(),
            },
        }
    }
}

/// Concatenated plain text of an inline run
pub fn plain_text(inlines: &[Inline]) -> String {
    inlines.iter().map(Inline::plain_text).collect()
}

/// Style set applied by a decoration span such as `[*/ text]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decoration {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundColor>,
}

impl Decoration {
    pub const fn bold() -> Self {
        Self {
            bold: true,
            italic: false,
            strikethrough: false,
            underline: false,
            background: None,
        }
    }

    /// Apply one decoration sigil; returns false for characters that are not sigils
    pub fn apply_sigil(&mut self, sigil: char) -> bool {
        match sigil {
            '*' => self.bold = true,
            '/' => self.italic = true,
            '-' => self.strikethrough = true,
            '_' => self.underline = true,
            '!' => self.background = Some(BackgroundColor::Red),
            '#' => self.background = Some(BackgroundColor::Green),
            '%' => self.background = Some(BackgroundColor::Blue),
            _ => return false,
        }
        true
    }

    /// Union of two style sets; the inner background wins
    pub fn merge(self, inner: Self) -> Self {
        Self {
            bold: self.bold || inner.bold,
            italic: self.italic || inner.italic,
            strikethrough: self.strikethrough || inner.strikethrough,
            underline: self.underline || inner.underline,
            background: inner.background.or(self.background),
        }
    }
}

/// The fixed background palette reachable from notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundColor {
    Red,
    Green,
    Blue,
}

impl BackgroundColor {
    /// CSS colour used when the target has no native coloured span
    pub const fn css(&self) -> &'static str {
        match self {
            Self::Red => "#ffebee",
            Self::Green => "#e8f5e9",
            Self::Blue => "#e3f2fd",
        }
    }
}

/// Source page metadata handed to the converters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PageMeta {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Reject metadata the converters cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ConversionError::InvalidMetadata(
                "page title is empty".to_string(),
            ));
        }
        if let (Some(created), Some(updated)) = (self.created, self.updated) {
            if updated < created {
                return Err(ConversionError::InvalidMetadata(format!(
                    "page '{}' was updated ({updated}) before it was created ({created})",
                    self.title
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plain_text_strips_notation() {
        let inlines = vec![
            Inline::text("see "),
            Inline::Notation {
                raw: "[Home]".to_string(),
                kind: LineKind::InternalLink {
                    title: "Home".to_string(),
                },
            },
            Inline::text(" and "),
            Inline::Hashtag {
                tag: "tag".to_string(),
            },
        ];
        assert_eq!(plain_text(&inlines), "see Home and #tag");
    }

    #[test]
    fn test_decoration_sigils() {
        let mut deco = Decoration::default();
        assert!(deco.apply_sigil('*'));
        assert!(deco.apply_sigil('%'));
        assert!(!deco.apply_sigil('x'));
        assert!(deco.bold);
        assert_eq!(deco.background, Some(BackgroundColor::Blue));
    }

    #[test]
    fn test_accessors() {
        let line = ParsedLine::new(
            "[https://x.test/a text]",
            LineKind::UrlWithText {
                url: "https://x.test/a".to_string(),
                link_text: "text".to_string(),
            },
            "text",
        );
        assert_eq!(line.url(), Some("https://x.test/a"));
        assert_eq!(line.link_text(), Some("text"));
        assert_eq!(line.code_language(), None);
    }

    #[test]
    fn test_meta_validation() {
        assert!(PageMeta::new("  ").validate().is_err());
        assert!(PageMeta::new("Title").validate().is_ok());

        let meta = PageMeta {
            title: "Backwards".to_string(),
            created: Utc.timestamp_opt(2_000, 0).single(),
            updated: Utc.timestamp_opt(1_000, 0).single(),
            tags: Vec::new(),
        };
        assert!(matches!(
            meta.validate(),
            Err(ConversionError::InvalidMetadata(_))
        ));
    }
}
