// SPDX-License-Identifier: AGPL-3.0-or-later
//! Target-neutral output blocks and Notion rich text
//!
//! [`RichText`] mirrors the Notion rich-text object so the same type is used for
//! building new pages and for reading existing blocks back.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use unicode_segmentation::UnicodeSegmentation;

use crate::ast::{BackgroundColor, Decoration};
use crate::traits::Result;

/// Deepest nesting level a block may sit at (root = 0)
pub const MAX_NESTING_DEPTH: usize = 2;

/// Maximum UTF-16 length of a single rich-text run
pub const MAX_TEXT_LENGTH: usize = 2000;

/// Most rows a table may be created with; the header row is one of them
pub const TABLE_CREATE_ROW_LIMIT: usize = 99;

/// Emoji used for callout blocks
pub const CALLOUT_EMOJI: &str = "💡";

/// Languages accepted by Notion code blocks
pub const NOTION_LANGUAGES: &[&str] = &[
    "abap", "arduino", "bash", "basic", "c", "clojure", "coffeescript", "c++", "c#", "css",
    "dart", "diff", "docker", "elixir", "elm", "erlang", "flow", "fortran", "f#", "gherkin",
    "glsl", "go", "graphql", "groovy", "haskell", "html", "java", "javascript", "json", "julia",
    "kotlin", "latex", "less", "lisp", "livescript", "lua", "makefile", "markdown", "markup",
    "matlab", "mermaid", "nix", "objective-c", "ocaml", "pascal", "perl", "php", "plain text",
    "powershell", "prolog", "protobuf", "python", "r", "reason", "ruby", "rust", "sass",
    "scala", "scheme", "scss", "shell", "sql", "swift", "typescript", "vb.net", "verilog",
    "vhdl", "visual basic", "webassembly", "xml", "yaml", "java/c/c++/c#",
];

/// Map any language name onto one Notion accepts
pub fn notion_language(language: &str) -> &'static str {
    NOTION_LANGUAGES
        .iter()
        .find(|l| l.eq_ignore_ascii_case(language))
        .copied()
        .unwrap_or("plain text")
}

/// A block in the converted tree
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBlock {
    pub kind: BlockKind,
    /// Body text; the caption for images and bookmarks
    pub rich_text: Vec<RichText>,
    pub children: Vec<OutputBlock>,
    /// Depth in the tree, root = 0
    pub nesting_depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph,
    /// Notion heading level (1-3)
    Heading { level: u8 },
    ListItem,
    Code { language: String },
    Quote,
    Callout { emoji: String },
    Image { url: String },
    Bookmark { url: String },
    Table { width: usize, rows: Vec<Vec<Vec<RichText>>> },
}

impl OutputBlock {
    pub fn new(kind: BlockKind, rich_text: Vec<RichText>) -> Self {
        Self {
            kind,
            rich_text,
            children: Vec::new(),
            nesting_depth: 0,
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockKind::Paragraph, vec![RichText::plain(text)])
    }

    /// Notion block type name
    pub fn block_type(&self) -> &'static str {
        match &self.kind {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading { level: 1 } => "heading_1",
            BlockKind::Heading { level: 2 } => "heading_2",
            BlockKind::Heading { .. } => "heading_3",
            BlockKind::ListItem => "bulleted_list_item",
            BlockKind::Code { .. } => "code",
            BlockKind::Quote => "quote",
            BlockKind::Callout { .. } => "callout",
            BlockKind::Image { .. } => "image",
            BlockKind::Bookmark { .. } => "bookmark",
            BlockKind::Table { .. } => "table",
        }
    }

    /// Whether Notion allows nested children under this block
    pub fn accepts_children(&self) -> bool {
        matches!(
            self.kind,
            BlockKind::Paragraph
                | BlockKind::ListItem
                | BlockKind::Quote
                | BlockKind::Callout { .. }
        )
    }

    /// Blocks submitted for this subtree, table rows included
    pub fn node_count(&self) -> usize {
        let rows = match &self.kind {
            BlockKind::Table { rows, .. } => rows.len(),
            _ => 0,
        };
        1 + rows + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Levels of nesting below this block in one request, table rows included
    pub fn depth(&self) -> usize {
        match &self.kind {
            BlockKind::Table { rows, .. } if !rows.is_empty() => 1,
            _ => self
                .children
                .iter()
                .map(|child| child.depth() + 1)
                .max()
                .unwrap_or(0),
        }
    }

    /// Cut a table down to its first `keep` rows
    ///
    /// Returns the truncated table and the `table_row` objects of the rows
    /// left over, to be appended under the table once it exists. `None` for
    /// anything that is not a table longer than `keep`.
    pub fn split_table(&self, keep: usize) -> Result<Option<(OutputBlock, Vec<Value>)>> {
        let BlockKind::Table { width, rows } = &self.kind else {
            return Ok(None);
        };
        if rows.len() <= keep {
            return Ok(None);
        }
        let (head, rest) = rows.split_at(keep);
        let rest = rest.iter().map(|cells| table_row_json(cells)).collect::<Result<Vec<_>>>()?;
        let table = OutputBlock {
            kind: BlockKind::Table {
                width: *width,
                rows: head.to_vec(),
            },
            ..self.clone()
        };
        Ok(Some((table, rest)))
    }

    /// Plain text of the body runs
    pub fn plain_text(&self) -> String {
        self.rich_text.iter().filter_map(RichText::text_content).collect()
    }

    /// Notion block object including all children
    pub fn to_json(&self) -> Result<Value> {
        self.to_json_with(true)
    }

    /// Notion block object; nested children are omitted when `include_children` is false
    pub fn to_json_with(&self, include_children: bool) -> Result<Value> {
        let runs = serde_json::to_value(&self.rich_text)?;
        let mut body = match &self.kind {
            BlockKind::Paragraph
            | BlockKind::Heading { .. }
            | BlockKind::ListItem
            | BlockKind::Quote => json!({ "rich_text": runs }),
            BlockKind::Code { language } => json!({
                "rich_text": runs,
                "language": notion_language(language),
            }),
            BlockKind::Callout { emoji } => json!({
                "rich_text": runs,
                "icon": { "type": "emoji", "emoji": emoji },
            }),
            BlockKind::Image { url } => json!({
                "type": "external",
                "external": { "url": url },
                "caption": runs,
            }),
            BlockKind::Bookmark { url } => json!({ "url": url, "caption": runs }),
            BlockKind::Table { width, rows } => {
                let rows = rows.iter().map(|cells| table_row_json(cells)).collect::<Result<Vec<_>>>()?;
                json!({
                    "table_width": width,
                    "has_column_header": true,
                    "has_row_header": false,
                    "children": rows,
                })
            }
        };

        if include_children && !self.children.is_empty() {
            if let Value::Object(map) = &mut body {
                let children = self.children.iter().map(Self::to_json).collect::<Result<Vec<_>>>()?;
                map.insert("children".to_string(), Value::Array(children));
            }
        }

        let block_type = self.block_type();
        let mut object = Map::new();
        object.insert("object".to_string(), json!("block"));
        object.insert("type".to_string(), json!(block_type));
        object.insert(block_type.to_string(), body);
        Ok(Value::Object(object))
    }
}

/// `table_row` block object for one row of cells
pub fn table_row_json(cells: &[Vec<RichText>]) -> Result<Value> {
    let cells = cells
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(json!({
        "object": "block",
        "type": "table_row",
        "table_row": { "cells": cells },
    }))
}

/// Notion rich-text object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichText {
    Text {
        text: TextContent,
        #[serde(default)]
        annotations: Annotations,
    },
    Mention {
        mention: Mention,
        #[serde(default)]
        annotations: Annotations,
    },
    /// Inline LaTeX
    Equation {
        equation: Equation,
        #[serde(default)]
        annotations: Annotations,
    },
    /// Anything newer this client does not model
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equation {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mention {
    Page { page: PageId },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageId {
    pub id: String,
}

impl RichText {
    pub fn plain(content: impl Into<String>) -> Self {
        Self::styled(content, Annotations::default(), None)
    }

    pub fn styled(content: impl Into<String>, annotations: Annotations, link: Option<String>) -> Self {
        Self::Text {
            text: TextContent {
                content: content.into(),
                link: link.map(|url| Link { url }),
            },
            annotations,
        }
    }

    /// Page mention carrying the given annotations
    pub fn page_mention(page_id: impl Into<String>, annotations: Annotations) -> Self {
        Self::Mention {
            mention: Mention::Page {
                page: PageId { id: page_id.into() },
            },
            annotations,
        }
    }

    pub fn equation(expression: impl Into<String>) -> Self {
        Self::Equation {
            equation: Equation {
                expression: expression.into(),
            },
            annotations: Annotations::default(),
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(&text.content),
            _ => None,
        }
    }

    pub fn link_url(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => text.link.as_ref().map(|l| l.url.as_str()),
            _ => None,
        }
    }

    pub fn annotations(&self) -> Option<&Annotations> {
        match self {
            Self::Text { annotations, .. }
            | Self::Mention { annotations, .. }
            | Self::Equation { annotations, .. } => Some(annotations),
            Self::Unsupported => None,
        }
    }

    pub fn is_mention(&self) -> bool {
        matches!(self, Self::Mention { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Color::is_unknown")]
    pub color: Color,
}

impl Annotations {
    pub fn code() -> Self {
        Self {
            code: true,
            ..Self::default()
        }
    }

    /// Layer a decoration on top of these annotations
    pub fn with_decoration(&self, decoration: &Decoration) -> Self {
        Self {
            bold: self.bold || decoration.bold,
            italic: self.italic || decoration.italic,
            strikethrough: self.strikethrough || decoration.strikethrough,
            underline: self.underline || decoration.underline,
            code: self.code,
            color: decoration
                .background
                .map(Color::from)
                .unwrap_or_else(|| self.color.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    #[default]
    Default,
    Gray,
    Brown,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Red,
    GrayBackground,
    BrownBackground,
    OrangeBackground,
    YellowBackground,
    GreenBackground,
    BlueBackground,
    PurpleBackground,
    PinkBackground,
    RedBackground,
    /// A colour added to Notion after this list; never written back
    #[serde(other)]
    Unknown,
}

impl Color {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<BackgroundColor> for Color {
    fn from(color: BackgroundColor) -> Self {
        match color {
            BackgroundColor::Red => Self::RedBackground,
            BackgroundColor::Green => Self::GreenBackground,
            BackgroundColor::Blue => Self::BlueBackground,
        }
    }
}

/// Length in UTF-16 code units, the unit Notion limits are expressed in
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Split text into pieces of at most `max` UTF-16 units without breaking graphemes
///
/// A single grapheme longer than `max` is split on char boundaries instead.
pub fn split_utf16(text: &str, max: usize) -> Vec<String> {
    let max = max.max(2);
    if utf16_len(text) <= max {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for grapheme in text.graphemes(true) {
        let len = utf16_len(grapheme);
        if current_len + len > max && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if len > max {
            for ch in grapheme.chars() {
                let ch_len = ch.len_utf16();
                if current_len + ch_len > max {
                    pieces.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(ch);
                current_len += ch_len;
            }
            continue;
        }
        current.push_str(grapheme);
        current_len += len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
