// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Feed-acquisition collaborator: turns a feed URL into a structured feed the
//! tree builder consumes, and discovers feed URLs behind ordinary web pages.
//! The builder only sees the [`FeedFetcher`] trait; the HTTP + syndication
//! parsing implementation lives here.

use std::io::Read;

use log::debug;
use ureq::Agent;
use url::Url;

use crate::FeedDoorError;

/// Structured feed consumed by the tree builder.
#[derive(Debug, Clone)]
pub struct Feed {
    /// Feed title, used as the feed directory name.
    pub title: String,
    /// Entries in feed order.
    pub items: Vec<FeedItem>,
}

/// One feed entry with the fields the tree exposes.
#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    /// Entry title, used as the item directory name.
    pub title: String,
    /// Entry summary text.
    pub description: String,
    /// Rendered entry content.
    pub content: String,
    /// Entry permalink.
    pub link: String,
    /// Globally-unique identifier string.
    pub guid: String,
    /// Enclosure URLs in feed order.
    pub enclosures: Vec<String>,
    /// Published time, seconds since the Unix epoch, when the feed carries one.
    pub published: Option<u32>,
}

/// Fetch and parse one feed source.
pub trait FeedFetcher {
    /// Produce the structured feed behind `url`, or a feed-classified error.
    fn fetch(&self, url: &str) -> Result<Feed, FeedDoorError>;
}

/// HTTP implementation backed by a `ureq` agent and the syndication parser.
pub struct HttpFeedFetcher {
    agent: Agent,
}

impl HttpFeedFetcher {
    /// Create a fetcher with a fresh agent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: Agent::new(),
        }
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedFetcher for HttpFeedFetcher {
    fn fetch(&self, url: &str) -> Result<Feed, FeedDoorError> {
        debug!("fetching feed {url}");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| FeedDoorError::Feed {
                url: url.to_owned(),
                reason: err.to_string(),
            })?;
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|err| FeedDoorError::Feed {
                url: url.to_owned(),
                reason: err.to_string(),
            })?;
        let parsed =
            feed_rs::parser::parse(body.as_slice()).map_err(|err| FeedDoorError::Feed {
                url: url.to_owned(),
                reason: err.to_string(),
            })?;
        Ok(feed_from_model(parsed))
    }
}

fn feed_from_model(model: feed_rs::model::Feed) -> Feed {
    let title = model.title.map(|t| t.content).unwrap_or_default();
    let items = model.entries.into_iter().map(item_from_entry).collect();
    Feed { title, items }
}

fn item_from_entry(entry: feed_rs::model::Entry) -> FeedItem {
    let mut enclosures: Vec<String> = entry
        .links
        .iter()
        .filter(|link| link.rel.as_deref() == Some("enclosure"))
        .map(|link| link.href.clone())
        .collect();
    for media in &entry.media {
        for content in &media.content {
            if let Some(url) = &content.url {
                enclosures.push(url.to_string());
            }
        }
    }
    FeedItem {
        title: entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_default(),
        description: entry
            .summary
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_default(),
        content: entry
            .content
            .as_ref()
            .and_then(|c| c.body.clone())
            .unwrap_or_default(),
        link: entry
            .links
            .first()
            .map(|link| link.href.clone())
            .unwrap_or_default(),
        guid: entry.id,
        enclosures,
        published: entry
            .published
            .map(|when| when.timestamp().clamp(0, i64::from(u32::MAX)) as u32),
    }
}

const FEED_CONTENT_TYPES: [&str; 3] = [
    "application/rss+xml",
    "application/atom+xml",
    "application/xml",
];

/// Resolve an arbitrary URL to a feed URL. A feed content-type passes the URL
/// through unchanged; an HTML page is scanned for an alternate feed link,
/// resolved against the page URL; anything else is an error.
pub fn resolve_feed_url(agent: &Agent, url: &str) -> Result<String, FeedDoorError> {
    debug!("finding feed for {url}");
    let response = agent.get(url).call().map_err(|err| FeedDoorError::Feed {
        url: url.to_owned(),
        reason: err.to_string(),
    })?;
    let content_type = response.content_type().to_owned();
    if FEED_CONTENT_TYPES.contains(&content_type.as_str()) {
        debug!("url is a feed (content-type {content_type})");
        return Ok(url.to_owned());
    }
    if content_type == "text/html" {
        let body = response.into_string().map_err(|err| FeedDoorError::Feed {
            url: url.to_owned(),
            reason: err.to_string(),
        })?;
        let href = scan_feed_link(&body).ok_or_else(|| FeedDoorError::Feed {
            url: url.to_owned(),
            reason: "no feed link found".to_owned(),
        })?;
        debug!("feed link found: {href}");
        let resolved = Url::parse(url)
            .and_then(|base| base.join(&href))
            .map_err(|err| FeedDoorError::Feed {
                url: url.to_owned(),
                reason: err.to_string(),
            })?;
        return Ok(resolved.into());
    }
    Err(FeedDoorError::Feed {
        url: url.to_owned(),
        reason: format!("no feed found (content-type {content_type})"),
    })
}

/// Scan an HTML document for `<link rel="alternate" type=feed href=…>`.
fn scan_feed_link(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let mut at = 0;
    while let Some(found) = lower[at..].find("<link") {
        let start = at + found;
        let Some(close) = lower[start..].find('>') else {
            return None;
        };
        let end = start + close;
        let tag = &html[start..end];
        let tag_lower = &lower[start..end];
        at = end;

        let rel_alternate = attr_value(tag, tag_lower, "rel")
            .is_some_and(|rel| rel.eq_ignore_ascii_case("alternate"));
        let feed_type = attr_value(tag, tag_lower, "type").is_some_and(|ty| {
            FEED_CONTENT_TYPES.contains(&ty.to_ascii_lowercase().as_str())
        });
        if rel_alternate && feed_type {
            if let Some(href) = attr_value(tag, tag_lower, "href") {
                if !href.is_empty() {
                    return Some(href.to_owned());
                }
            }
        }
    }
    None
}

/// Extract a quoted attribute value from a single tag. `tag_lower` is the
/// byte-aligned lowercase twin of `tag` used for case-insensitive matching.
fn attr_value<'a>(tag: &'a str, tag_lower: &str, name: &str) -> Option<&'a str> {
    let mut search = 0;
    loop {
        let idx = tag_lower[search..].find(name)? + search;
        let after = idx + name.len();
        search = after;
        let boundary = tag[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_whitespace());
        if !boundary {
            continue;
        }
        let rest = tag[after..].trim_start();
        let Some(value) = rest.strip_prefix('=') else {
            continue;
        };
        let value = value.trim_start();
        let mut chars = value.chars();
        let quote = chars.next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let inner = &value[1..];
        let closing = inner.find(quote)?;
        return Some(&inner[..closing]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<title>Example Feed</title>
<item>
  <title>First Post</title>
  <description>Short text</description>
  <link>http://example.org/first</link>
  <guid>http://example.org/first</guid>
  <pubDate>Tue, 09 Jan 2024 12:00:00 GMT</pubDate>
  <enclosure url="http://example.org/first.mp3" length="123" type="audio/mpeg"/>
</item>
<item>
  <title>Second Post</title>
  <description>More text</description>
  <link>http://example.org/second</link>
  <guid>tag:example.org,2024:second</guid>
</item>
</channel></rss>"#;

    #[test]
    fn rss_fixture_maps_to_feed_items() {
        let parsed = feed_rs::parser::parse(RSS_FIXTURE.as_bytes()).unwrap();
        let feed = feed_from_model(parsed);
        assert_eq!(feed.title, "Example Feed");
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title, "First Post");
        assert_eq!(first.description, "Short text");
        assert_eq!(first.link, "http://example.org/first");
        assert_eq!(first.guid, "http://example.org/first");
        assert_eq!(first.enclosures, vec!["http://example.org/first.mp3"]);
        assert!(first.published.is_some());

        let second = &feed.items[1];
        assert_eq!(second.guid, "tag:example.org,2024:second");
        assert!(second.enclosures.is_empty());
    }

    #[test]
    fn scan_finds_alternate_feed_link() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/style.css">
            <LINK REL="alternate" TYPE="application/rss+xml" HREF="/feed.xml">
        </head><body></body></html>"#;
        assert_eq!(scan_feed_link(html), Some("/feed.xml".to_owned()));
    }

    #[test]
    fn scan_ignores_non_feed_links() {
        let html = r#"<html><head>
            <link rel="alternate" type="text/html" href="/mobile">
            <link rel="icon" href="/favicon.ico">
        </head></html>"#;
        assert_eq!(scan_feed_link(html), None);
    }

    #[test]
    fn attr_matching_skips_prefixed_names() {
        let tag = r#"<link hreflang="en" rel="alternate" type="application/atom+xml" href="https://example.org/atom""#;
        let lower = tag.to_ascii_lowercase();
        assert_eq!(
            attr_value(tag, &lower, "href"),
            Some("https://example.org/atom")
        );
        assert_eq!(attr_value(tag, &lower, "rel"), Some("alternate"));
    }

    #[test]
    fn attr_matching_allows_spaced_equals() {
        let tag = r#"<link rel = "alternate" type= 'application/rss+xml' href ="/r.xml""#;
        let lower = tag.to_ascii_lowercase();
        assert_eq!(attr_value(tag, &lower, "rel"), Some("alternate"));
        assert_eq!(attr_value(tag, &lower, "type"), Some("application/rss+xml"));
        assert_eq!(attr_value(tag, &lower, "href"), Some("/r.xml"));
    }
}
