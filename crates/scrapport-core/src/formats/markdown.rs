// SPDX-License-Identifier: AGPL-3.0-or-later
//! Markdown exporter
//!
//! Renders parsed lines to GitHub-flavoured Markdown. Images are rewritten to
//! local asset paths and reported back so the caller can download them.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::ast::{Decoration, Inline, LineKind, PageMeta, ParsedLine};
use crate::blocks::CALLOUT_EMOJI;
use crate::formats::{segments, Segment};
use crate::traits::{page_url, PageConverter, Result, TargetFormat, DEFAULT_HOST};

static EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([a-zA-Z0-9]+)(?:\?|$)").expect("valid extension regex"));

/// Text that Markdown would read as a heading, list item or quote at line start
static BLOCK_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:#{1,6}|[-*+>]|\d{1,9}[.)])(?:[ \t]|$)").expect("valid block marker regex")
});

/// Configuration for Markdown export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub host: String,
    /// Enables fully-qualified links for internal references and icons
    pub project_name: Option<String>,
    /// Directory image assets are referenced from, relative to the page file
    pub assets_dir: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            project_name: None,
            assets_dir: "assets".to_string(),
        }
    }
}

/// An image to download next to the exported page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub url: String,
    pub filename: String,
    /// Path used in the markup
    pub relative_path: String,
}

/// Markup plus the assets it references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownExport {
    pub markup: String,
    pub assets: Vec<AssetRequest>,
}

/// Markdown exporter
#[derive(Debug, Clone, Default)]
pub struct MarkdownExporter {
    options: ExportOptions,
}

impl MarkdownExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Render the page body; one output line per source line outside code and table regions
    pub fn export_lines(&self, lines: &[ParsedLine]) -> MarkdownExport {
        let mut render = Render {
            options: &self.options,
            assets: Vec::new(),
        };
        let mut out: Vec<String> = Vec::new();

        for segment in segments(lines) {
            match segment {
                Segment::Code { header, lines } => {
                    let code: Vec<&str> = lines.iter().map(|l| l.content.as_str()).collect();
                    out.push(render_code(header, &code));
                }
                Segment::Table { rows, .. } => {
                    if let Some(table) = render_table(rows) {
                        out.push(table);
                    }
                }
                Segment::Line(line) => out.push(render.line(line)),
            }
        }

        MarkdownExport {
            markup: out.join("\n"),
            assets: render.assets,
        }
    }

    /// Full file contents: a title heading followed by the body
    pub fn document(&self, meta: &PageMeta, export: &MarkdownExport) -> String {
        format!("# {}\n\n{}", meta.title, export.markup)
    }
}

impl PageConverter for MarkdownExporter {
    type Output = MarkdownExport;

    fn target(&self) -> TargetFormat {
        TargetFormat::Markdown
    }

    fn convert(&self, lines: &[ParsedLine], meta: &PageMeta) -> Result<MarkdownExport> {
        meta.validate()?;
        Ok(self.export_lines(lines))
    }
}

struct Render<'a> {
    options: &'a ExportOptions,
    assets: Vec<AssetRequest>,
}

impl Render<'_> {
    /// Indented lines become list items at their nesting level, whatever their kind
    fn line(&mut self, line: &ParsedLine) -> String {
        let body = self.body(line);
        if line.indent_level == 0 || line.kind == LineKind::Blank {
            return body;
        }
        format!("{}- {body}", "  ".repeat(line.indent_level - 1))
    }

    fn body(&mut self, line: &ParsedLine) -> String {
        let mut output = String::new();
        match &line.kind {
            LineKind::Blank => {}
            LineKind::Heading { level } => {
                output.push_str(&"#".repeat(usize::from(*level)));
                output.push(' ');
                self.inlines(&mut output, &line.inlines);
            }
            LineKind::Quote => {
                output.push_str("> ");
                self.inlines(&mut output, &line.inlines);
            }
            LineKind::Callout => {
                output.push_str("> ");
                output.push_str(CALLOUT_EMOJI);
                output.push(' ');
                self.inlines(&mut output, &line.inlines);
            }
            LineKind::CommandLine { prompt } => {
                output.push_str(&code_span(&format!("{prompt} {}", line.content)));
            }
            LineKind::UrlBare { url } => {
                output.push('<');
                output.push_str(url);
                output.push('>');
            }
            _ if line.inlines.is_empty() => output.push_str(&escape_block_marker(&line.content)),
            _ => {
                self.inlines(&mut output, &line.inlines);
                if matches!(line.inlines.first(), Some(Inline::Text { .. })) {
                    output = escape_block_marker(&output);
                }
            }
        }
        output
    }

    fn inlines(&mut self, output: &mut String, inlines: &[Inline]) {
        for inline in inlines {
            match inline {
                Inline::Text { text } => output.push_str(text),
                Inline::Code { code } => output.push_str(&code_span(code)),
                Inline::Hashtag { tag } => {
                    output.push('#');
                    output.push_str(tag);
                }
                Inline::Notation { raw, kind } => self.notation(output, raw, kind),
            }
        }
    }

    fn notation(&mut self, output: &mut String, raw: &str, kind: &LineKind) {
        match kind {
            LineKind::DecoratedText {
                decoration,
                content,
            } => {
                let mut inner = String::new();
                self.inlines(&mut inner, content);
                output.push_str(&decorate(inner, decoration));
            }
            LineKind::UrlBare { url } => {
                output.push('<');
                output.push_str(url);
                output.push('>');
            }
            LineKind::UrlWithText { url, link_text } => {
                output.push_str(&format!("[{link_text}]({url})"));
            }
            LineKind::Image { url, link, .. } => {
                let path = self.asset(url);
                let image = format!("![]({path})");
                match link {
                    Some(link) => output.push_str(&format!("[{image}]({link})")),
                    None => output.push_str(&image),
                }
            }
            LineKind::Icon {
                project,
                page_name,
                repeat,
            } => match project.as_deref().or(self.options.project_name.as_deref()) {
                Some(project) => {
                    let url = format!(
                        "{}/api/pages/{}/{}/icon",
                        self.options.host.trim_end_matches('/'),
                        urlencoding::encode(project),
                        urlencoding::encode(page_name)
                    );
                    for _ in 0..*repeat {
                        output.push_str(&format!("![{page_name}]({url})"));
                    }
                }
                None => output.push_str(page_name),
            },
            LineKind::InternalLink { title } => match &self.options.project_name {
                Some(project) => {
                    let url = page_url(&self.options.host, project, title);
                    output.push_str(&format!("[{title}]({url})"));
                }
                None => output.push_str(title),
            },
            LineKind::InternalFragmentLink {
                title,
                fragment,
                url,
            } => output.push_str(&format!("[{title}#{fragment}]({url})")),
            LineKind::CrossProjectLink {
                project,
                title,
                url,
                ..
            } => output.push_str(&format!("[/{project}/{title}]({url})")),
            LineKind::Formula { expression } => output.push_str(&format!("${expression}$")),
            LineKind::Location {
                latitude,
                longitude,
                label,
                url,
                ..
            } => {
                let text = label
                    .clone()
                    .unwrap_or_else(|| format!("{latitude},{longitude}"));
                output.push_str(&format!("[{text}]({url})"));
            }
            _ => output.push_str(raw),
        }
    }

    fn asset(&mut self, url: &str) -> String {
        let filename = asset_filename(url);
        let relative_path = format!("{}/{}", self.options.assets_dir.trim_end_matches('/'), filename);
        if !self.assets.iter().any(|a| a.url == url) {
            self.assets.push(AssetRequest {
                url: url.to_string(),
                filename,
                relative_path: relative_path.clone(),
            });
        }
        relative_path
    }
}

/// Wrappers nest innermost first; the background span is always outermost
fn decorate(text: String, decoration: &Decoration) -> String {
    if text.is_empty() {
        return text;
    }
    let mut text = text;
    if decoration.bold {
        text = format!("**{text}**");
    }
    if decoration.italic {
        text = format!("*{text}*");
    }
    if decoration.strikethrough {
        text = format!("~~{text}~~");
    }
    if decoration.underline {
        text = format!("<u>{text}</u>");
    }
    if let Some(color) = decoration.background {
        text = format!(
            "<span style=\"background-color: {}\">{text}</span>",
            color.css()
        );
    }
    text
}

fn escape_block_marker(text: &str) -> String {
    let Some(marker) = BLOCK_MARKER_RE.find(text) else {
        return text.to_string();
    };
    // `1.` escapes the dot, everything else the first character
    let at = if text.starts_with(|c: char| c.is_ascii_digit()) {
        marker.as_str().trim_end().len() - 1
    } else {
        0
    };
    let mut escaped = text.to_string();
    escaped.insert(at, '\\');
    escaped
}

fn code_span(code: &str) -> String {
    if code.contains('`') {
        format!("`` {code} ``")
    } else {
        format!("`{code}`")
    }
}

fn render_code(header: &ParsedLine, code: &[&str]) -> String {
    let prefix = "  ".repeat(header.indent_level.saturating_sub(1));
    let language = match header.code_language() {
        Some("plain text") | None => "",
        Some(language) => language,
    };
    let longest_run = code
        .iter()
        .flat_map(|line| line.split(|c: char| c != '`'))
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);

    let mut output = format!("{prefix}{fence}{language}\n");
    for line in code {
        output.push_str(&prefix);
        output.push_str(line);
        output.push('\n');
    }
    output.push_str(&prefix);
    output.push_str(&fence);
    output
}

fn render_table(rows: &[ParsedLine]) -> Option<String> {
    let rows: Vec<&Vec<String>> = rows
        .iter()
        .filter_map(|row| match &row.kind {
            LineKind::TableRow { cells } => Some(cells),
            _ => None,
        })
        .collect();
    let width = rows.iter().map(|r| r.len()).max().filter(|w| *w > 0)?;

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|c| {
                row.get(c)
                    .map(|cell| cell.trim().replace('|', "\\|"))
                    .unwrap_or_default()
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", " --- |".repeat(width)));
        }
    }
    Some(lines.join("\n"))
}

/// Content-addressed asset name: 12 hex chars of SHA-256(url) plus the URL's extension
pub fn asset_filename(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    let extension = EXTENSION_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map_or("jpg", |m| m.as_str());
    format!("{}.{}", &digest[..12], extension)
}

/// File-system safe page title
pub fn sanitize_filename(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();
    let trimmed: String = replaced
        .trim_matches(|c| c == '.' || c == ' ')
        .chars()
        .take(200)
        .collect();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}
