//! Behance RSS feed parsing
//!
//! Only the handful of elements the sync needs are read. The feed is
//! scanned as text: `<item>` blocks, then `title`, `link`, `description`
//! and `category` inside each. CDATA sections are unwrapped, other text is
//! entity-decoded.

/// One `<item>` of the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub category: Option<String>,
}

impl FeedEntry {
    /// Behance project ID: the digits in `/gallery/{id}/`
    pub fn gallery_id(&self) -> Option<&str> {
        let start = self.link.find("/gallery/")? + "/gallery/".len();
        let rest = &self.link[start..];
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .map(|end| &rest[..end])?;

        if digits.is_empty() || !rest[digits.len()..].starts_with('/') {
            return None;
        }
        Some(digits)
    }

    /// First `src="…"` in the description
    pub fn cover_url(&self) -> Option<&str> {
        let start = self.description.find("src=\"")? + "src=\"".len();
        let rest = &self.description[start..];
        let end = rest.find('"')?;
        Some(&rest[..end]).filter(|url| !url.is_empty())
    }
}

/// Parse every `<item>` in an RSS document
pub fn parse_feed(xml: &str) -> Vec<FeedEntry> {
    element_bodies(xml, "item")
        .into_iter()
        .map(|item| FeedEntry {
            title: element_text(item, "title")
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            link: element_text(item, "link").unwrap_or_default(),
            description: element_text(item, "description").unwrap_or_default(),
            category: element_text(item, "category").filter(|category| !category.is_empty()),
        })
        .collect()
}

/// Whether a body looks like XML at all
///
/// Behance answers some requests with an HTML challenge page.
pub fn looks_like_xml(body: &str) -> bool {
    body.contains("<?xml") || body.contains("<rss")
}

/// Raw inner text of every `<name>` element, in document order
fn element_bodies<'a>(xml: &'a str, name: &str) -> Vec<&'a str> {
    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let mut bodies = Vec::new();
    let mut cursor = 0;

    while let Some(found) = xml[cursor..].find(&open) {
        let name_end = cursor + found + open.len();
        let boundary = xml[name_end..].chars().next();
        if !matches!(boundary, Some('>' | '/' | ' ' | '\t' | '\r' | '\n')) {
            cursor = name_end;
            continue;
        }

        let Some(tag_close) = xml[name_end..].find('>').map(|i| name_end + i) else {
            break;
        };
        if xml[..tag_close].ends_with('/') {
            bodies.push("");
            cursor = tag_close + 1;
            continue;
        }

        let body_start = tag_close + 1;
        let Some(body_end) = find_close(&xml[body_start..], &close).map(|i| body_start + i) else {
            break;
        };
        bodies.push(&xml[body_start..body_end]);
        cursor = body_end + close.len();
    }

    bodies
}

/// Offset of `close`, ignoring anything inside CDATA sections
fn find_close(body: &str, close: &str) -> Option<usize> {
    let mut cursor = 0;
    loop {
        let next_close = body[cursor..].find(close).map(|i| cursor + i)?;
        match body[cursor..].find("<![CDATA[").map(|i| cursor + i) {
            Some(cdata) if cdata < next_close => {
                let cdata_end = body[cdata..].find("]]>").map(|i| cdata + i)?;
                cursor = cdata_end + 3;
            }
            _ => return Some(next_close),
        }
    }
}

fn element_text(xml: &str, name: &str) -> Option<String> {
    element_bodies(xml, name).first().map(|raw| unwrap_text(raw))
}

fn unwrap_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
    {
        return inner.trim().to_string();
    }
    html_escape::decode_html_entities(trimmed).into_owned()
}
