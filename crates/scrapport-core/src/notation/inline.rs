// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inline tokenizer for line bodies

use crate::ast::Inline;
use crate::notation::bracket::{resolve, resolve_double};
use crate::traits::ParseOptions;

/// Split a line body into text, code spans, hashtags and resolved brackets
///
/// Brackets are matched innermost-first: a `[` only opens a span when the next
/// bracket character is a `]`. Unclosed brackets stay literal text.
pub fn tokenize(body: &str, options: &ParseOptions) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut text = String::new();
    let mut prev: Option<char> = None;
    let mut pos = 0;

    while let Some(ch) = body[pos..].chars().next() {
        let rest = &body[pos..];

        if let Some((inline, consumed)) = match_token(rest, prev, options) {
            flush_text(&mut text, &mut out);
            out.push(inline);
            pos += consumed;
            prev = body[..pos].chars().next_back();
            continue;
        }

        text.push(ch);
        prev = Some(ch);
        pos += ch.len_utf8();
    }

    flush_text(&mut text, &mut out);
    out
}

fn match_token(rest: &str, prev: Option<char>, options: &ParseOptions) -> Option<(Inline, usize)> {
    if let Some(after) = rest.strip_prefix('`') {
        let end = after.find('`')?;
        return Some((
            Inline::Code {
                code: after[..end].to_string(),
            },
            end + 2,
        ));
    }

    if let Some(after) = rest.strip_prefix("[[") {
        if let Some(end) = after.find("]]") {
            let inner = &after[..end];
            if !inner.trim().is_empty() && !inner.contains(['[', ']']) {
                let consumed = end + 4;
                return Some((
                    Inline::Notation {
                        raw: rest[..consumed].to_string(),
                        kind: resolve_double(inner, options),
                    },
                    consumed,
                ));
            }
        }
    }

    if let Some(after) = rest.strip_prefix('[') {
        let end = after.find(['[', ']'])?;
        if !after[end..].starts_with(']') || after[..end].trim().is_empty() {
            return None;
        }
        let consumed = end + 2;
        return Some((
            Inline::Notation {
                raw: rest[..consumed].to_string(),
                kind: resolve(&after[..end], options),
            },
            consumed,
        ));
    }

    if let Some(after) = rest.strip_prefix('#') {
        if prev.is_some_and(|c| !c.is_whitespace()) {
            return None;
        }
        let len = after
            .find(|c: char| c.is_whitespace() || c == '[' || c == ']')
            .unwrap_or(after.len());
        if len == 0 {
            return None;
        }
        return Some((
            Inline::Hashtag {
                tag: after[..len].to_string(),
            },
            len + 1,
        ));
    }

    None
}

fn flush_text(text: &mut String, out: &mut Vec<Inline>) {
    if !text.is_empty() {
        out.push(Inline::Text {
            text: std::mem::take(text),
        });
    }
}
