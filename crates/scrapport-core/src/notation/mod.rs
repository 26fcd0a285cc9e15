// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scrapbox notation parser
//!
//! Line-oriented: every input line yields exactly one [`ParsedLine`], in order.
//! Code and table regions are tracked across lines; everything else is
//! classified from the line alone.

pub mod bracket;
pub mod inline;

use std::collections::BTreeSet;

use crate::ast::{plain_text, Inline, LineKind, ParsedLine};
use crate::traits::ParseOptions;

pub use bracket::{is_image_url, is_url, resolve};
pub use inline::tokenize;

/// Parse page text with default options
pub fn parse(text: &str, project_name: Option<&str>) -> Vec<ParsedLine> {
    let options = ParseOptions {
        project_name: project_name.map(str::to_string),
        ..ParseOptions::default()
    };
    NotationParser::new(options).parse(text)
}

/// Scrapbox notation parser
#[derive(Debug, Clone, Default)]
pub struct NotationParser {
    options: ParseOptions,
}

impl NotationParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a whole page into one line per input line
    pub fn parse(&self, text: &str) -> Vec<ParsedLine> {
        let mut region = Region::None;
        text.split('\n')
            .map(|line| self.parse_line(line, &mut region))
            .collect()
    }

    fn parse_line(&self, raw: &str, region: &mut Region) -> ParsedLine {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let (indent, ws_chars) = measure_indent(line, self.options.indent_width);
        let body = skip_chars(line, ws_chars);

        match region {
            Region::Code { opener, base } if indent > *opener => {
                let base = *base.get_or_insert(ws_chars);
                let code = skip_chars(line, ws_chars.min(base));
                return ParsedLine::new(raw, LineKind::CodeBlockLine, code).with_indent(indent);
            }
            Region::Table { opener } if indent > *opener => {
                let cells: Vec<String> = body.split('\t').map(str::to_string).collect();
                return ParsedLine::new(raw, LineKind::TableRow { cells }, body)
                    .with_indent(indent);
            }
            _ => {}
        }

        *region = Region::None;
        self.classify(raw, body, indent, region)
    }

    fn classify(&self, raw: &str, body: &str, indent: usize, region: &mut Region) -> ParsedLine {
        if body.trim().is_empty() {
            return ParsedLine::new(raw, LineKind::Blank, "").with_indent(indent);
        }

        if let Some((level, text)) = heading(body) {
            let inlines = tokenize(text, &self.options);
            return ParsedLine::new(raw, LineKind::Heading { level }, plain_text(&inlines))
                .with_indent(indent)
                .with_inlines(inlines);
        }

        if let Some(filename) = body.strip_prefix("code:").map(str::trim) {
            if !filename.is_empty() {
                *region = Region::Code {
                    opener: indent,
                    base: None,
                };
                let language = detect_language(filename);
                return ParsedLine::new(
                    raw,
                    LineKind::CodeBlockHeader {
                        filename: filename.to_string(),
                        language,
                    },
                    filename,
                )
                .with_indent(indent);
            }
        }

        if let Some(name) = body.strip_prefix("table:").map(str::trim) {
            if !name.is_empty() {
                *region = Region::Table { opener: indent };
                return ParsedLine::new(
                    raw,
                    LineKind::TableHeader {
                        name: name.to_string(),
                    },
                    name,
                )
                .with_indent(indent);
            }
        }

        if let Some((kind, text)) = prefix_marker(body) {
            let inlines = tokenize(text, &self.options);
            return ParsedLine::new(raw, kind, plain_text(&inlines))
                .with_indent(indent)
                .with_inlines(inlines);
        }

        let inlines = tokenize(body, &self.options);
        let kind = match inlines.as_slice() {
            [Inline::Notation { kind, .. }] => kind.clone(),
            [Inline::Code { .. }] => LineKind::InlineCode,
            [Inline::Hashtag { .. }] => LineKind::Hashtag,
            _ if is_url(body.trim()) && !body.trim().contains(char::is_whitespace) => {
                LineKind::UrlBare {
                    url: body.trim().to_string(),
                }
            }
            _ if indent > 0 => LineKind::BulletItem,
            _ => LineKind::Paragraph,
        };
        let content = match &kind {
            LineKind::UrlBare { url } => url.clone(),
            _ => plain_text(&inlines),
        };

        ParsedLine::new(raw, kind, content)
            .with_indent(indent)
            .with_inlines(inlines)
    }
}

/// Multi-line region currently open
#[derive(Debug, Clone, Copy)]
enum Region {
    None,
    /// `base` is the whitespace width of the first code line
    Code { opener: usize, base: Option<usize> },
    Table { opener: usize },
}

/// Returns (indent units, leading whitespace chars)
fn measure_indent(line: &str, indent_width: usize) -> (usize, usize) {
    let width = indent_width.max(1);
    let mut columns = 0;
    let mut chars = 0;
    for ch in line.chars() {
        match ch {
            ' ' | '\u{3000}' => columns += 1,
            '\t' => columns += width,
            _ => break,
        }
        chars += 1;
    }
    (columns / width, chars)
}

fn skip_chars(line: &str, count: usize) -> &str {
    match line.char_indices().nth(count) {
        Some((idx, _)) => &line[idx..],
        None if count == 0 => line,
        None => "",
    }
}

/// `[* text]` .. `[*** text]` spanning the whole body
fn heading(body: &str) -> Option<(u8, &str)> {
    let inner = body.strip_prefix('[')?.strip_suffix(']')?;
    let stars = inner.chars().take_while(|&c| c == '*').count();
    if !(1..=3).contains(&stars) {
        return None;
    }
    let text = inner[stars..].strip_prefix(|c: char| c.is_whitespace())?;
    if text.trim().is_empty() || !brackets_balanced(inner) {
        return None;
    }
    Some((stars as u8 + 1, text.trim()))
}

fn brackets_balanced(text: &str) -> bool {
    let mut depth: i32 = 0;
    for ch in text.chars() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn prefix_marker(body: &str) -> Option<(LineKind, &str)> {
    if let Some(text) = body.strip_prefix('>') {
        return Some((LineKind::Quote, text.strip_prefix(' ').unwrap_or(text)));
    }
    if let Some(text) = body.strip_prefix("? ") {
        return Some((LineKind::Callout, text));
    }
    for prompt in ['$', '%'] {
        if let Some(text) = body.strip_prefix(prompt).and_then(|t| t.strip_prefix(' ')) {
            return Some((LineKind::CommandLine { prompt }, text));
        }
    }
    None
}

/// Language name from a `code:` filename or bare language name
pub fn detect_language(filename: &str) -> String {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => filename,
    };
    let language = match ext.to_ascii_lowercase().as_str() {
        "py" | "python" => "python",
        "js" | "javascript" => "javascript",
        "ts" | "typescript" => "typescript",
        "java" => "java",
        "cpp" | "cc" | "c++" => "c++",
        "c" | "h" => "c",
        "cs" | "c#" => "c#",
        "rb" | "ruby" => "ruby",
        "go" => "go",
        "rs" | "rust" => "rust",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kotlin" => "kotlin",
        "sh" | "shell" => "shell",
        "bash" => "bash",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "xml" => "xml",
        "html" => "html",
        "css" => "css",
        "sql" => "sql",
        "md" | "markdown" => "markdown",
        _ => "plain text",
    };
    language.to_string()
}

/// Sorted, de-duplicated hashtags of a page (code and table lines excluded)
pub fn extract_tags(lines: &[ParsedLine]) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for line in lines.iter().filter(|l| !l.kind.is_region_line()) {
        collect_tags(&line.inlines, &mut tags);
    }
    tags.into_iter().collect()
}

fn collect_tags(inlines: &[Inline], tags: &mut BTreeSet<String>) {
    for inline in inlines {
        match inline {
            Inline::Hashtag { tag } => {
                tags.insert(tag.clone());
            }
            Inline::Notation {
                kind: LineKind::DecoratedText { content, .. },
                ..
            } => collect_tags(content, tags),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<LineKind> {
        parse(text, None).into_iter().map(|l| l.kind).collect()
    }

    #[test]
    fn test_one_line_per_input_line() {
        let text = "a\n\nb\n";
        let lines = parse(text, None);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3].kind, LineKind::Blank);
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(
            kinds("[* One]\n[** Two]\n[*** Three]"),
            vec![
                LineKind::Heading { level: 2 },
                LineKind::Heading { level: 3 },
                LineKind::Heading { level: 4 },
            ]
        );
        // Four stars is a bold decoration, not a heading
        assert!(matches!(
            kinds("[**** Four]")[0],
            LineKind::DecoratedText { .. }
        ));
    }

    #[test]
    fn test_heading_needs_whole_line() {
        let lines = parse("[* a] and [b]", None);
        assert_eq!(lines[0].kind, LineKind::Paragraph);
    }

    #[test]
    fn test_code_block_region() {
        let lines = parse("code:script.py\n  x = 1\n    y = 2\nafter", None);
        assert_eq!(
            lines[0].kind,
            LineKind::CodeBlockHeader {
                filename: "script.py".to_string(),
                language: "python".to_string(),
            }
        );
        assert_eq!(lines[1].kind, LineKind::CodeBlockLine);
        assert_eq!(lines[1].content, "x = 1");
        assert_eq!(lines[2].content, "  y = 2");
        assert_eq!(lines[3].kind, LineKind::Paragraph);
    }

    #[test]
    fn test_code_block_ends_at_opener_indent() {
        let lines = parse(" code:py\n  [not a link]\n next", None);
        assert_eq!(lines[1].kind, LineKind::CodeBlockLine);
        assert_eq!(lines[1].content, "[not a link]");
        assert_eq!(lines[2].kind, LineKind::BulletItem);
        assert_eq!(lines[2].indent_level, 1);
    }

    #[test]
    fn test_table_region() {
        let lines = parse("table:scores\n a\tb\n 1\t2\nend", None);
        assert_eq!(
            lines[0].kind,
            LineKind::TableHeader {
                name: "scores".to_string()
            }
        );
        assert_eq!(
            lines[1].kind,
            LineKind::TableRow {
                cells: vec!["a".to_string(), "b".to_string()]
            }
        );
        assert_eq!(lines[3].kind, LineKind::Paragraph);
    }

    #[test]
    fn test_prefix_markers() {
        assert_eq!(
            kinds("> quoted\n? hint\n$ ls -la\n% make"),
            vec![
                LineKind::Quote,
                LineKind::Callout,
                LineKind::CommandLine { prompt: '$' },
                LineKind::CommandLine { prompt: '%' },
            ]
        );
        assert_eq!(parse("> quoted", None)[0].content, "quoted");
    }

    #[test]
    fn test_whole_line_notations() {
        assert_eq!(
            kinds("https://example.com\n`code`\n#tag\n[Page]"),
            vec![
                LineKind::UrlBare {
                    url: "https://example.com".to_string()
                },
                LineKind::InlineCode,
                LineKind::Hashtag,
                LineKind::InternalLink {
                    title: "Page".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_indentation_units() {
        let lines = parse("a\n b\n\tc\n   d", None);
        let levels: Vec<usize> = lines.iter().map(|l| l.indent_level).collect();
        assert_eq!(levels, vec![0, 1, 1, 3]);

        let wide = NotationParser::new(ParseOptions {
            indent_width: 2,
            ..ParseOptions::default()
        });
        let levels: Vec<usize> = wide
            .parse("a\n  b\n\tc")
            .iter()
            .map(|l| l.indent_level)
            .collect();
        assert_eq!(levels, vec![0, 1, 1]);
    }

    #[test]
    fn test_extract_tags() {
        let lines = parse("#alpha text\n[* #beta]\ncode:x\n #gamma\nmore #alpha", None);
        assert_eq!(extract_tags(&lines), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_tags_next_to_each_other() {
        let lines = parse("intro\n#alpha #beta\noutro", None);
        assert_eq!(extract_tags(&lines), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_code_block_then_paragraph() {
        let lines = parse("code:py\n  x=1\n  y=2\nnext", None);
        let code: Vec<&str> = lines
            .iter()
            .filter(|l| l.kind == LineKind::CodeBlockLine)
            .map(|l| l.content.as_str())
            .collect();
        assert_eq!(code, vec!["x=1", "y=2"]);
        assert_eq!(lines[3].kind, LineKind::Paragraph);
        assert_eq!(lines[3].content, "next");
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("main.rs"), "rust");
        assert_eq!(detect_language("py"), "python");
        assert_eq!(detect_language("notes.txt"), "plain text");
        assert_eq!(detect_language("config.yml"), "yaml");
    }

    #[test]
    fn test_crlf_is_preserved_in_original() {
        let lines = parse("a\r\nb", None);
        assert_eq!(lines[0].original, "a\r");
        assert_eq!(lines[0].content, "a");
    }
}
