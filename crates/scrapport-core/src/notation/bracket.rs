// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bracket disambiguation
//!
//! Classifies the text between one pair of square brackets. Rules are tried in
//! a fixed order and the first match wins:
//!
//! 1. icon (`name.icon`, `project/name.icon`, optional `*N` repeat)
//! 2. location `N35.6,E139.7` with optional `,Z14` zoom and label
//! 3. formula `$ expr $`
//! 4. URL forms (bare URL, image URL, URL plus text, image with link)
//! 5. decoration (a run of style sigils followed by a space)
//! 6. fragment link `title#fragment` (only when a project is known)
//! 7. cross-project link `/project/page`
//! 8. internal link (fallback)

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{Decoration, LineKind};
use crate::notation::inline::tokenize;
use crate::traits::{page_url, ParseOptions};

static ICON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/?(?:([^/\s]+)/)?([^/*]+?)\.icon(?:\*(\d+))?$").expect("valid icon regex")
});

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([NS])(\d+(?:\.\d+)?),([EW])(\d+(?:\.\d+)?)(?:,Z(\d+))?(?:\s+(.*\S))?\s*$")
        .expect("valid location regex")
});

static PROJECT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid project regex"));

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp"];

const IMAGE_HOSTS: &[&str] = &["gyazo.com", "i.gyazo.com"];

/// Classify bracket content (without the brackets)
pub fn resolve(content: &str, options: &ParseOptions) -> LineKind {
    icon(content)
        .or_else(|| location(content))
        .or_else(|| formula(content))
        .or_else(|| url_notation(content))
        .or_else(|| decoration(content, options))
        .or_else(|| fragment_link(content, options))
        .or_else(|| cross_project_link(content, options))
        .unwrap_or_else(|| LineKind::InternalLink {
            title: content.to_string(),
        })
}

/// Classify `[[content]]`: a large image for image URLs, bold text otherwise
pub fn resolve_double(content: &str, options: &ParseOptions) -> LineKind {
    let trimmed = content.trim();
    if is_url(trimmed) && is_image_url(trimmed) && !trimmed.contains(char::is_whitespace) {
        return LineKind::Image {
            url: trimmed.to_string(),
            link: None,
            large: true,
        };
    }
    LineKind::DecoratedText {
        decoration: Decoration::bold(),
        content: tokenize(content, options),
    }
}

/// `true` for `http://` and `https://` URLs with a non-empty remainder
pub fn is_url(token: &str) -> bool {
    ["https://", "http://"]
        .iter()
        .any(|scheme| token.len() > scheme.len() && token.starts_with(scheme))
}

/// Image detection by path extension or by a known image host
pub fn is_image_url(url: &str) -> bool {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = after_scheme.split(['/', '?', '#']).next().unwrap_or_default();
    if IMAGE_HOSTS.contains(&host.to_ascii_lowercase().as_str()) {
        return true;
    }

    let path = after_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    path.rsplit_once('.').is_some_and(|(stem, ext)| {
        stem.contains('/') && IMAGE_EXTENSIONS.contains(&ext)
    })
}

/// Split `title#fragment` when both sides are non-empty
pub fn fragment_parts(content: &str) -> Option<(&str, &str)> {
    let (title, fragment) = content.split_once('#')?;
    if title.trim().is_empty() || fragment.trim().is_empty() || title.starts_with('/') {
        return None;
    }
    Some((title, fragment))
}

fn icon(content: &str) -> Option<LineKind> {
    let caps = ICON_RE.captures(content)?;
    let page_name = caps.get(2)?.as_str();
    if page_name.trim().is_empty() {
        return None;
    }
    let repeat = caps
        .get(3)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1);

    Some(LineKind::Icon {
        project: caps.get(1).map(|m| m.as_str().to_string()),
        page_name: page_name.to_string(),
        repeat,
    })
}

fn location(content: &str) -> Option<LineKind> {
    let caps = LOCATION_RE.captures(content)?;
    let signed = |hemisphere: &str, degrees: &str, negative: &str| {
        if hemisphere == negative {
            format!("-{degrees}")
        } else {
            degrees.to_string()
        }
    };
    let latitude = signed(caps.get(1)?.as_str(), caps.get(2)?.as_str(), "S");
    let longitude = signed(caps.get(3)?.as_str(), caps.get(4)?.as_str(), "W");
    let zoom = caps.get(5).and_then(|m| m.as_str().parse::<u32>().ok());

    let mut url = format!("https://www.google.com/maps?q={latitude},{longitude}");
    if let Some(zoom) = zoom {
        url.push_str(&format!("&z={zoom}"));
    }
    Some(LineKind::Location {
        latitude,
        longitude,
        zoom,
        label: caps.get(6).map(|m| m.as_str().to_string()),
        url,
    })
}

fn formula(content: &str) -> Option<LineKind> {
    let expression = content.strip_prefix("$ ")?.strip_suffix(" $")?.trim();
    if expression.is_empty() {
        return None;
    }
    Some(LineKind::Formula {
        expression: expression.to_string(),
    })
}

fn url_notation(content: &str) -> Option<LineKind> {
    let trimmed = content.trim();
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let (&first, &last) = (tokens.first()?, tokens.last()?);

    if tokens.len() == 1 {
        if !is_url(first) {
            return None;
        }
        return Some(if is_image_url(first) {
            LineKind::Image {
                url: first.to_string(),
                link: None,
                large: false,
            }
        } else {
            LineKind::UrlBare {
                url: first.to_string(),
            }
        });
    }

    if tokens.len() == 2 && is_url(first) && is_url(last) {
        match (is_image_url(first), is_image_url(last)) {
            (true, false) => return Some(image_with_link(first, last)),
            (false, true) => return Some(image_with_link(last, first)),
            _ => {}
        }
    }

    if is_url(first) {
        let link_text = trimmed.strip_prefix(first).unwrap_or_default().trim();
        return Some(LineKind::UrlWithText {
            url: first.to_string(),
            link_text: link_text.to_string(),
        });
    }

    if is_url(last) {
        let link_text = trimmed.strip_suffix(last).unwrap_or_default().trim();
        if is_sigil_run(link_text) {
            return None;
        }
        return Some(LineKind::UrlWithText {
            url: last.to_string(),
            link_text: link_text.to_string(),
        });
    }

    None
}

fn image_with_link(image: &str, link: &str) -> LineKind {
    LineKind::Image {
        url: image.to_string(),
        link: Some(link.to_string()),
        large: false,
    }
}

fn is_sigil_run(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| Decoration::default().apply_sigil(c))
}

fn decoration(content: &str, options: &ParseOptions) -> Option<LineKind> {
    let (sigils, rest) = content.split_once(' ')?;
    if !is_sigil_run(sigils) {
        return None;
    }

    let mut style = Decoration::default();
    for sigil in sigils.chars() {
        style.apply_sigil(sigil);
    }

    // `[* / text]` folds into a single style set
    if let Some(LineKind::DecoratedText {
        decoration: inner,
        content,
    }) = decoration(rest, options)
    {
        return Some(LineKind::DecoratedText {
            decoration: style.merge(inner),
            content,
        });
    }

    Some(LineKind::DecoratedText {
        decoration: style,
        content: tokenize(rest, options),
    })
}

fn fragment_link(content: &str, options: &ParseOptions) -> Option<LineKind> {
    let project = options.project_name.as_deref()?;
    let (title, fragment) = fragment_parts(content)?;
    Some(LineKind::InternalFragmentLink {
        title: title.to_string(),
        fragment: fragment.to_string(),
        url: format!("{}#{}", options.page_url(project, title), fragment),
    })
}

fn cross_project_link(content: &str, options: &ParseOptions) -> Option<LineKind> {
    let (project, page) = content.strip_prefix('/')?.split_once('/')?;
    if !PROJECT_NAME_RE.is_match(project) || page.trim().is_empty() {
        return None;
    }

    let (title, fragment) = match page.split_once('#') {
        Some((title, fragment)) if !title.is_empty() && !fragment.is_empty() => {
            (title, Some(fragment))
        }
        _ => (page, None),
    };

    let mut url = page_url(&options.host, project, title);
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }

    Some(LineKind::CrossProjectLink {
        project: project.to_string(),
        title: title.to_string(),
        fragment: fragment.map(str::to_string),
        url,
    })
}
