// SPDX-License-Identifier: AGPL-3.0-or-later
//! Converters from parsed lines to each supported target

pub mod markdown;
pub mod notion;

pub use markdown::{ExportOptions, MarkdownExport, MarkdownExporter};
pub use notion::{BlockConverter, BlockOptions, ConvertedPage, IconMode};

use crate::ast::{LineKind, ParsedLine};

/// A line, or a code/table region grouped with its header
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'a> {
    Line(&'a ParsedLine),
    Code {
        header: &'a ParsedLine,
        lines: &'a [ParsedLine],
    },
    Table {
        header: &'a ParsedLine,
        rows: &'a [ParsedLine],
    },
}

/// Group region lines under their headers
pub fn segments(lines: &[ParsedLine]) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let is_code = match line.kind {
            LineKind::CodeBlockHeader { .. } => true,
            LineKind::TableHeader { .. } => false,
            _ => {
                out.push(Segment::Line(line));
                i += 1;
                continue;
            }
        };

        let start = i + 1;
        let end = lines[start..]
            .iter()
            .position(|l| {
                if is_code {
                    l.kind != LineKind::CodeBlockLine
                } else {
                    !matches!(l.kind, LineKind::TableRow { .. })
                }
            })
            .map_or(lines.len(), |offset| start + offset);

        out.push(if is_code {
            Segment::Code {
                header: line,
                lines: &lines[start..end],
            }
        } else {
            Segment::Table {
                header: line,
                rows: &lines[start..end],
            }
        });
        i = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::parse;

    #[test]
    fn test_segments_group_regions() {
        let lines = parse("intro\ncode:a.rs\n fn x() {}\n let y;\ntable:t\n a\tb\noutro", None);
        let segs = segments(&lines);
        assert_eq!(segs.len(), 4);
        assert!(matches!(segs[1], Segment::Code { lines, .. } if lines.len() == 2));
        assert!(matches!(segs[2], Segment::Table { rows, .. } if rows.len() == 1));
        assert!(matches!(segs[3], Segment::Line(l) if l.content == "outro"));
    }

    #[test]
    fn test_stray_region_lines_stay_lines() {
        let lines = vec![ParsedLine::new(" x", LineKind::CodeBlockLine, "x")];
        assert!(matches!(segments(&lines)[..], [Segment::Line(_)]));
    }
}
