// SPDX-License-Identifier: AGPL-3.0-or-later
//! Block converter: parsed lines to a nested Notion block tree

use tracing::debug;

use crate::ast::{Inline, LineKind, PageMeta, ParsedLine};
use crate::blocks::{
    split_utf16, utf16_len, Annotations, BlockKind, Equation, OutputBlock, RichText, CALLOUT_EMOJI,
    MAX_NESTING_DEPTH, MAX_TEXT_LENGTH,
};
use crate::formats::{segments, Segment};
use crate::traits::{PageConverter, Result, TargetFormat, DEFAULT_HOST};

/// How `[name.icon]` is rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IconMode {
    /// External image of the icon page
    #[default]
    Image,
    /// The icon's page name as plain text
    Text,
}

/// Configuration for block conversion
#[derive(Debug, Clone)]
pub struct BlockOptions {
    pub icon_mode: IconMode,
    /// Maximum UTF-16 length of a rich-text run or code block
    pub max_text_len: usize,
    /// Project used for icons that do not name one
    pub project_name: Option<String>,
    pub host: String,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            icon_mode: IconMode::default(),
            max_text_len: MAX_TEXT_LENGTH,
            project_name: None,
            host: DEFAULT_HOST.to_string(),
        }
    }
}

/// An image referenced by the page, for callers that re-host images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub url: String,
}

/// Result of converting one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedPage {
    pub blocks: Vec<OutputBlock>,
    pub images: Vec<PendingImage>,
}

impl ConvertedPage {
    pub fn node_count(&self) -> usize {
        crate::batch::count_nodes(&self.blocks)
    }
}

/// Converts parsed lines into Notion blocks
#[derive(Debug, Clone, Default)]
pub struct BlockConverter {
    options: BlockOptions,
}

impl BlockConverter {
    pub fn new(options: BlockOptions) -> Self {
        Self { options }
    }

    /// Convert without metadata checks
    pub fn convert_lines(&self, lines: &[ParsedLine]) -> ConvertedPage {
        let mut images = Vec::new();
        let mut tree = TreeBuilder::default();

        for segment in segments(lines) {
            let indent = match segment {
                Segment::Line(line) => line.indent_level,
                Segment::Code { header, .. } | Segment::Table { header, .. } => header.indent_level,
            };
            for block in self.segment_blocks(segment, &mut images) {
                tree.push(indent, block);
            }
        }

        let blocks = tree.finish();
        debug!(
            blocks = blocks.len(),
            images = images.len(),
            "converted page to blocks"
        );
        ConvertedPage { blocks, images }
    }

    fn segment_blocks(&self, segment: Segment<'_>, images: &mut Vec<PendingImage>) -> Vec<OutputBlock> {
        match segment {
            Segment::Code { header, lines } => {
                let code: Vec<&str> = lines.iter().map(|l| l.content.as_str()).collect();
                self.code_blocks(header.code_language().unwrap_or("plain text"), &code.join("\n"))
            }
            Segment::Table { header, rows } => self.table_blocks(header, rows),
            Segment::Line(line) => self.line_blocks(line, images),
        }
    }

    /// One code block per chunk; every chunk keeps the language
    fn code_blocks(&self, language: &str, code: &str) -> Vec<OutputBlock> {
        split_utf16(code, self.options.max_text_len)
            .into_iter()
            .map(|chunk| {
                OutputBlock::new(
                    BlockKind::Code {
                        language: language.to_string(),
                    },
                    vec![RichText::plain(chunk)],
                )
            })
            .collect()
    }

    fn table_blocks(&self, header: &ParsedLine, rows: &[ParsedLine]) -> Vec<OutputBlock> {
        let mut blocks = Vec::new();
        if let Some(name) = header.table_name() {
            let bold = Annotations {
                bold: true,
                ..Annotations::default()
            };
            blocks.push(OutputBlock::new(
                BlockKind::Paragraph,
                vec![RichText::styled(name, bold, None)],
            ));
        }

        let cells: Vec<&[String]> = rows
            .iter()
            .filter_map(|row| match &row.kind {
                LineKind::TableRow { cells } => Some(cells.as_slice()),
                _ => None,
            })
            .collect();
        let width = cells.iter().map(|r| r.len()).max().unwrap_or(0);
        if width == 0 {
            return blocks;
        }

        let rows = cells
            .iter()
            .map(|row| {
                (0..width)
                    .map(|i| match row.get(i).map(String::as_str) {
                        Some(text) if !text.is_empty() => self.plain_runs(text),
                        _ => Vec::new(),
                    })
                    .collect()
            })
            .collect();
        blocks.push(OutputBlock::new(BlockKind::Table { width, rows }, Vec::new()));
        blocks
    }

    fn line_blocks(&self, line: &ParsedLine, images: &mut Vec<PendingImage>) -> Vec<OutputBlock> {
        let text_kind = if line.indent_level > 0 {
            BlockKind::ListItem
        } else {
            BlockKind::Paragraph
        };

        let block = match &line.kind {
            LineKind::Blank => return Vec::new(),
            LineKind::CodeBlockHeader { language, .. } => return self.code_blocks(language, ""),
            LineKind::CommandLine { prompt } => {
                return self.code_blocks("shell", &format!("{prompt} {}", line.content));
            }
            LineKind::Heading { level } => OutputBlock::new(
                BlockKind::Heading {
                    level: (*level).min(3),
                },
                self.line_runs(line, images),
            ),
            LineKind::Quote => OutputBlock::new(BlockKind::Quote, self.line_runs(line, images)),
            LineKind::Callout => OutputBlock::new(
                BlockKind::Callout {
                    emoji: CALLOUT_EMOJI.to_string(),
                },
                self.line_runs(line, images),
            ),
            LineKind::UrlBare { url } => {
                OutputBlock::new(BlockKind::Bookmark { url: url.clone() }, Vec::new())
            }
            LineKind::UrlWithText { url, link_text } => OutputBlock::new(
                BlockKind::Bookmark { url: url.clone() },
                self.plain_runs(link_text),
            ),
            LineKind::Image { url, link, .. } => {
                push_image(images, url);
                let caption = link
                    .iter()
                    .map(|l| RichText::styled(l.clone(), Annotations::default(), Some(l.clone())))
                    .collect();
                OutputBlock::new(BlockKind::Image { url: url.clone() }, caption)
            }
            LineKind::Icon {
                project, page_name, ..
            } => match self.icon_url(project.as_deref(), page_name) {
                Some(url) => OutputBlock::new(BlockKind::Image { url }, Vec::new()),
                None => OutputBlock::new(text_kind, self.plain_runs(page_name)),
            },
            _ => OutputBlock::new(text_kind, self.line_runs(line, images)),
        };
        vec![block]
    }

    fn line_runs(&self, line: &ParsedLine, images: &mut Vec<PendingImage>) -> Vec<RichText> {
        if line.inlines.is_empty() {
            return self.plain_runs(&line.content);
        }
        let mut runs = Vec::new();
        self.push_runs(&line.inlines, &Annotations::default(), &mut runs, images);
        runs.into_iter().flat_map(|run| self.split_run(run)).collect()
    }

    fn plain_runs(&self, text: &str) -> Vec<RichText> {
        self.split_run(RichText::plain(text))
    }

    fn push_runs(
        &self,
        inlines: &[Inline],
        base: &Annotations,
        out: &mut Vec<RichText>,
        images: &mut Vec<PendingImage>,
    ) {
        for inline in inlines {
            let (text, annotations, link) = match inline {
                Inline::Text { text } => (text.clone(), base.clone(), None),
                Inline::Code { code } => (
                    code.clone(),
                    Annotations {
                        code: true,
                        ..base.clone()
                    },
                    None,
                ),
                Inline::Hashtag { tag } => (format!("#{tag}"), base.clone(), None),
                Inline::Notation {
                    kind: LineKind::DecoratedText {
                        decoration,
                        content,
                    },
                    ..
                } => {
                    self.push_runs(content, &base.with_decoration(decoration), out, images);
                    continue;
                }
                Inline::Notation {
                    kind: LineKind::Formula { expression },
                    ..
                } => {
                    out.push(RichText::Equation {
                        equation: Equation {
                            expression: expression.clone(),
                        },
                        annotations: base.clone(),
                    });
                    continue;
                }
                Inline::Notation { raw, kind } => {
                    let (text, link) = self.notation_text(raw, kind, images);
                    (text, base.clone(), link)
                }
            };
            out.push(RichText::styled(text, annotations, link));
        }
    }

    /// Display text and link target of an inline bracket
    fn notation_text(
        &self,
        raw: &str,
        kind: &LineKind,
        images: &mut Vec<PendingImage>,
    ) -> (String, Option<String>) {
        match kind {
            LineKind::UrlBare { url } => (url.clone(), Some(url.clone())),
            LineKind::UrlWithText { url, link_text } => (link_text.clone(), Some(url.clone())),
            LineKind::Image { url, link, .. } => {
                push_image(images, url);
                (url.clone(), Some(link.clone().unwrap_or_else(|| url.clone())))
            }
            LineKind::Icon {
                project, page_name, ..
            } => (
                page_name.clone(),
                self.icon_url(project.as_deref(), page_name),
            ),
            // Kept bracketed so links can be restored once target pages exist
            LineKind::InternalLink { title } => (format!("[{title}]"), None),
            LineKind::InternalFragmentLink {
                title,
                fragment,
                url,
            } => (format!("{title}#{fragment}"), Some(url.clone())),
            LineKind::CrossProjectLink {
                project,
                title,
                fragment,
                url,
            } => {
                let text = match fragment {
                    Some(fragment) => format!("/{project}/{title}#{fragment}"),
                    None => format!("/{project}/{title}"),
                };
                (text, Some(url.clone()))
            }
            LineKind::Location {
                latitude,
                longitude,
                label,
                url,
                ..
            } => (
                label
                    .clone()
                    .unwrap_or_else(|| format!("{latitude},{longitude}")),
                Some(url.clone()),
            ),
            _ => (raw.to_string(), None),
        }
    }

    fn icon_url(&self, project: Option<&str>, page_name: &str) -> Option<String> {
        if self.options.icon_mode != IconMode::Image {
            return None;
        }
        let project = project.or(self.options.project_name.as_deref())?;
        Some(format!(
            "{}/api/pages/{}/{}/icon",
            self.options.host.trim_end_matches('/'),
            urlencoding::encode(project),
            urlencoding::encode(page_name)
        ))
    }

    fn split_run(&self, run: RichText) -> Vec<RichText> {
        let RichText::Text { text, annotations } = &run else {
            return vec![run];
        };
        if utf16_len(&text.content) <= self.options.max_text_len {
            return vec![run];
        }
        let link = text.link.as_ref().map(|l| l.url.clone());
        split_utf16(&text.content, self.options.max_text_len)
            .into_iter()
            .map(|piece| RichText::styled(piece, annotations.clone(), link.clone()))
            .collect()
    }
}

impl PageConverter for BlockConverter {
    type Output = ConvertedPage;

    fn target(&self) -> TargetFormat {
        TargetFormat::NotionBlocks
    }

    fn convert(&self, lines: &[ParsedLine], meta: &PageMeta) -> Result<ConvertedPage> {
        meta.validate()?;
        Ok(self.convert_lines(lines))
    }
}

fn push_image(images: &mut Vec<PendingImage>, url: &str) {
    if !images.iter().any(|i| i.url == url) {
        images.push(PendingImage {
            url: url.to_string(),
        });
    }
}

/// Builds the block tree from (indent, block) pairs in document order
#[derive(Default)]
struct TreeBuilder {
    roots: Vec<OutputBlock>,
    /// Open ancestors with their effective indent, innermost last
    stack: Vec<(usize, OutputBlock)>,
}

impl TreeBuilder {
    fn push(&mut self, indent: usize, mut block: OutputBlock) {
        let indent = indent.min(MAX_NESTING_DEPTH);
        while let Some((top_indent, top)) = self.stack.last() {
            if *top_indent < indent && top.accepts_children() {
                break;
            }
            self.close_top();
        }
        block.nesting_depth = self.stack.len();
        self.stack.push((indent, block));
    }

    fn close_top(&mut self) {
        if let Some((_, block)) = self.stack.pop() {
            match self.stack.last_mut() {
                Some((_, parent)) => parent.children.push(block),
                None => self.roots.push(block),
            }
        }
    }

    fn finish(mut self) -> Vec<OutputBlock> {
        while !self.stack.is_empty() {
            self.close_top();
        }
        self.roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::Color;
    use crate::notation::parse;
    use pretty_assertions::assert_eq;

    fn convert(text: &str) -> ConvertedPage {
        BlockConverter::default().convert_lines(&parse(text, Some("proj")))
    }

    fn depths(blocks: &[OutputBlock], out: &mut Vec<usize>) {
        for block in blocks {
            out.push(block.nesting_depth);
            depths(&block.children, out);
        }
    }

    #[test]
    fn test_nesting_is_capped() {
        let page = convert("a\n b\n  c\n   d\n    e");
        let mut found = Vec::new();
        depths(&page.blocks, &mut found);
        assert_eq!(found, vec![0, 1, 2, 2, 2]);
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].children[0].children.len(), 3);
    }

    #[test]
    fn test_blank_lines_produce_nothing() {
        let page = convert("a\n\n\nb");
        assert_eq!(page.blocks.len(), 2);
    }

    #[test]
    fn test_heading_and_list() {
        let page = convert("[* Title]\n item\n[*** Deep]");
        assert_eq!(page.blocks[0].block_type(), "heading_2");
        // headings take no children, so the item stays at the root
        assert_eq!(page.blocks[1].block_type(), "bulleted_list_item");
        assert_eq!(page.blocks[1].nesting_depth, 0);
        assert_eq!(page.blocks[2].block_type(), "heading_3");
    }

    #[test]
    fn test_code_block_is_one_block() {
        let page = convert("code:main.rs\n fn main() {\n     [not a link]\n }");
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(
            page.blocks[0].kind,
            BlockKind::Code {
                language: "rust".to_string()
            }
        );
        assert_eq!(page.blocks[0].plain_text(), "fn main() {\n    [not a link]\n}");
    }

    #[test]
    fn test_long_code_is_split_with_same_language() {
        let body: String = (0..300).map(|i| format!(" line {i:04} of code\n")).collect();
        let page = convert(&format!("code:py\n{body}"));
        assert!(page.blocks.len() > 1);
        for block in &page.blocks {
            assert_eq!(
                block.kind,
                BlockKind::Code {
                    language: "python".to_string()
                }
            );
            assert!(utf16_len(&block.plain_text()) <= MAX_TEXT_LENGTH);
        }
    }

    #[test]
    fn test_urls_become_bookmarks_and_images() {
        let page = convert("https://example.com\n[https://example.com Site]\n[https://x.test/a.png]");
        assert_eq!(page.blocks[0].block_type(), "bookmark");
        assert_eq!(page.blocks[1].plain_text(), "Site");
        assert_eq!(
            page.blocks[2].kind,
            BlockKind::Image {
                url: "https://x.test/a.png".to_string()
            }
        );
        assert_eq!(page.images.len(), 1);
    }

    #[test]
    fn test_inline_annotations() {
        let page = convert("plain [*/ loud] `code` [! warn]");
        let runs = &page.blocks[0].rich_text;
        let loud = runs
            .iter()
            .find(|r| r.text_content() == Some("loud"))
            .and_then(RichText::annotations)
            .unwrap();
        assert!(loud.bold && loud.italic);
        let code = runs
            .iter()
            .find(|r| r.text_content() == Some("code"))
            .and_then(RichText::annotations)
            .unwrap();
        assert!(code.code);
        let warn = runs
            .iter()
            .find(|r| r.text_content() == Some("warn"))
            .and_then(RichText::annotations)
            .unwrap();
        assert_eq!(warn.color, Color::RedBackground);
    }

    #[test]
    fn test_internal_links_stay_bracketed() {
        let page = convert("see [Other Page] and [/help-jp/Syntax]");
        let runs = &page.blocks[0].rich_text;
        assert_eq!(runs[1].text_content(), Some("[Other Page]"));
        assert_eq!(runs[1].link_url(), None);
        assert_eq!(
            runs[3].link_url(),
            Some("https://scrapbox.io/help-jp/Syntax")
        );
    }

    #[test]
    fn test_formula_and_location_runs() {
        let page = convert("area [$ \\pi r^2 $] near [N35.68,E139.76,Z14 Tokyo]");
        let runs = &page.blocks[0].rich_text;
        assert_eq!(runs[1], RichText::equation("\\pi r^2"));
        assert_eq!(
            page.blocks[0].to_json().unwrap()["paragraph"]["rich_text"][1]["equation"]["expression"],
            "\\pi r^2"
        );
        assert_eq!(runs[3].text_content(), Some("Tokyo"));
        assert_eq!(
            runs[3].link_url(),
            Some("https://www.google.com/maps?q=35.68,139.76&z=14")
        );
    }

    #[test]
    fn test_icon_modes() {
        let lines = parse("[takker.icon]", None);
        let image = BlockConverter::new(BlockOptions {
            project_name: Some("proj".to_string()),
            ..BlockOptions::default()
        })
        .convert_lines(&lines);
        assert_eq!(
            image.blocks[0].kind,
            BlockKind::Image {
                url: "https://scrapbox.io/api/pages/proj/takker/icon".to_string()
            }
        );

        let text = BlockConverter::new(BlockOptions {
            icon_mode: IconMode::Text,
            ..BlockOptions::default()
        })
        .convert_lines(&lines);
        assert_eq!(text.blocks[0].plain_text(), "takker");
    }

    #[test]
    fn test_table_rows_are_padded() {
        let page = convert("table:scores\n name\tscore\n alice\n bob\t3");
        assert_eq!(page.blocks[0].plain_text(), "scores");
        match &page.blocks[1].kind {
            BlockKind::Table { width, rows } => {
                assert_eq!(*width, 2);
                assert_eq!(rows.len(), 3);
                assert!(rows.iter().all(|r| r.len() == 2));
                assert!(rows[1][1].is_empty());
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn test_long_text_runs_are_split() {
        let converter = BlockConverter::new(BlockOptions {
            max_text_len: 10,
            ..BlockOptions::default()
        });
        let page = converter.convert_lines(&parse(&"x".repeat(25), None));
        assert_eq!(page.blocks[0].rich_text.len(), 3);
    }

    #[test]
    fn test_convert_rejects_bad_meta() {
        let lines = parse("a", None);
        assert!(BlockConverter::default()
            .convert(&lines, &PageMeta::new(""))
            .is_err());
    }

    #[test]
    fn test_command_line_is_shell_code() {
        let page = convert("$ cargo fmt");
        assert_eq!(
            page.blocks[0].kind,
            BlockKind::Code {
                language: "shell".to_string()
            }
        );
        assert_eq!(page.blocks[0].plain_text(), "$ cargo fmt");
    }
}
