//! RSS/Atom feed connector.
//!
//! Fetches a feed URL over HTTP and parses RSS 2.0 / RSS 1.0 (RDF) /
//! Atom 1.0 into normalized [`FeedEntry`] values, one canonical shape
//! regardless of dialect. A feed that cannot be fetched or whose XML is
//! malformed is a fatal [`PipelineError::FeedParse`] for the whole call;
//! an individual entry missing its link/id is still yielded (with an
//! empty `external_id`) so the pipeline can count it as skipped.
//!
//! Dialect field mapping:
//!
//! | Normalized | RSS | Atom |
//! |------------|-----|------|
//! | `external_id` | `<link>`, else `<guid>` | `<link href>`, else `<id>` |
//! | `content` | `<content:encoded>` | `<content>` |
//! | `summary` | `<description>` | `<summary>` |
//! | `published_at` | `<pubDate>`, `<dc:date>` | `<published>`, else `<updated>` |
//!
//! Dates are parsed as RFC 2822 then RFC 3339; entries without a usable
//! date get the current time (the ingest-time substitution the pipeline
//! expects).

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::FeedConfig;
use crate::error::PipelineError;
use crate::models::FeedEntry;

/// Fetch and parse one feed. HTTP failures and malformed XML are fatal
/// for the call.
pub async fn fetch_feed(config: &FeedConfig, url: &str) -> Result<Vec<FeedEntry>, PipelineError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| PipelineError::FeedParse(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::FeedParse(format!("fetch failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::FeedParse(format!(
            "HTTP {} from {}",
            status, url
        )));
    }

    let xml = response
        .text()
        .await
        .map_err(|e| PipelineError::FeedParse(format!("read failed: {}", e)))?;

    parse_feed(&xml)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Dialect {
    Rss,
    Atom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Guid,
    Content,
    Summary,
    Published,
    Updated,
}

/// Element-to-field mapping inside an item/entry, by local name (namespace
/// prefixes like `content:` and `dc:` are already stripped).
fn field_for(dialect: Dialect, name: &[u8]) -> Option<Field> {
    match (dialect, name) {
        (Dialect::Rss, b"title") => Some(Field::Title),
        (Dialect::Rss, b"link") => Some(Field::Link),
        (Dialect::Rss, b"guid") => Some(Field::Guid),
        (Dialect::Rss, b"encoded") => Some(Field::Content),
        (Dialect::Rss, b"description") => Some(Field::Summary),
        (Dialect::Rss, b"pubDate") => Some(Field::Published),
        (Dialect::Rss, b"date") => Some(Field::Published),
        (Dialect::Atom, b"title") => Some(Field::Title),
        (Dialect::Atom, b"id") => Some(Field::Guid),
        (Dialect::Atom, b"content") => Some(Field::Content),
        (Dialect::Atom, b"summary") => Some(Field::Summary),
        (Dialect::Atom, b"published") => Some(Field::Published),
        (Dialect::Atom, b"updated") => Some(Field::Updated),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct EntryBuilder {
    title: String,
    link: String,
    guid: String,
    content: String,
    summary: String,
    published: String,
    updated: String,
}

impl EntryBuilder {
    fn buf(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Guid => &mut self.guid,
            Field::Content => &mut self.content,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        }
    }

    fn finish(self) -> FeedEntry {
        let link = self.link.trim();
        let guid = self.guid.trim();
        let external_id = if !link.is_empty() { link } else { guid };

        let published_at = parse_date(&self.published)
            .or_else(|| parse_date(&self.updated))
            .unwrap_or_else(|| Utc::now().timestamp());

        FeedEntry {
            external_id: external_id.to_string(),
            title: self.title.trim().to_string(),
            content: non_empty(self.content),
            summary: non_empty(self.summary),
            published_at,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_date(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.timestamp())
        .ok()
}

/// Extract `href` from an Atom `<link>` element when its `rel` is absent
/// or `"alternate"`.
fn atom_link_href(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel_ok = true;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"href" => {
                href = Some(String::from_utf8_lossy(attr.value.as_ref()).into_owned());
            }
            b"rel" => {
                rel_ok = attr.value.as_ref() == b"alternate";
            }
            _ => {}
        }
    }
    if rel_ok {
        href
    } else {
        None
    }
}

/// Parse a feed document into entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, PipelineError> {
    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut dialect: Option<Dialect> = None;
    let mut in_item = false;
    let mut builder = EntryBuilder::default();
    // Currently-open capture target and the element name that closes it,
    // so markup nested inside (e.g. xhtml content) keeps accumulating.
    let mut current: Option<(Field, Vec<u8>)> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();

                if dialect.is_none() {
                    dialect = Some(match name.as_slice() {
                        b"rss" | b"channel" | b"RDF" => Dialect::Rss,
                        b"feed" => Dialect::Atom,
                        _ => {
                            return Err(PipelineError::FeedParse(
                                "not an RSS or Atom feed".to_string(),
                            ))
                        }
                    });
                }
                let dialect = dialect.expect("set on first element");

                match name.as_slice() {
                    b"item" | b"entry" => {
                        in_item = true;
                        builder = EntryBuilder::default();
                        current = None;
                    }
                    _ if in_item && current.is_none() => {
                        if dialect == Dialect::Atom && name.as_slice() == b"link" {
                            if builder.link.is_empty() {
                                if let Some(href) = atom_link_href(&e) {
                                    builder.link = href;
                                }
                            }
                        } else if let Some(field) = field_for(dialect, &name) {
                            current = Some((field, name));
                        }
                    }
                    _ => {}
                }
            }
            Ok(quick_xml::events::Event::Empty(e)) => {
                let name = e.local_name();
                if in_item
                    && dialect == Some(Dialect::Atom)
                    && name.as_ref() == b"link"
                    && builder.link.is_empty()
                {
                    if let Some(href) = atom_link_href(&e) {
                        builder.link = href;
                    }
                }
            }
            Ok(quick_xml::events::Event::Text(t)) => {
                if let Some((field, _)) = &current {
                    let text = t
                        .unescape()
                        .map_err(|e| PipelineError::FeedParse(e.to_string()))?;
                    builder.buf(*field).push_str(&text);
                }
            }
            Ok(quick_xml::events::Event::CData(t)) => {
                if let Some((field, _)) = &current {
                    builder
                        .buf(*field)
                        .push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"item" | b"entry" if in_item => {
                        in_item = false;
                        current = None;
                        entries.push(std::mem::take(&mut builder).finish());
                    }
                    n => {
                        let closes_capture =
                            matches!(&current, Some((_, open)) if open.as_slice() == n);
                        if closes_capture {
                            current = None;
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(PipelineError::FeedParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if dialect.is_none() {
        return Err(PipelineError::FeedParse(
            "not an RSS or Atom feed".to_string(),
        ));
    }

    Ok(entries)
}
