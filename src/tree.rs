// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Tree builder: turns an ordered list of feed sources into the immutable
//! node tree the server shares across connections. Identity assignment lives
//! here too: qid paths are content-independent FNV-1a hashes of the logical
//! name or URL, so a rebuilt tree keeps the same paths, while item versions
//! are stamped from the build time, so every run is a fresh qid generation.

use std::hash::Hasher;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fnv::FnvHasher;
use log::debug;

use crate::feed::{FeedFetcher, FeedItem};
use crate::fetch::ContentFetcher;
use crate::node::{FsNode, NodeMeta};
use crate::FeedDoorError;

/// Owner identity stamped on every node of the tree.
#[derive(Debug, Clone)]
pub struct Owner {
    /// Owner name.
    pub uid: String,
    /// Group name.
    pub gid: String,
}

impl Owner {
    /// Create an owner identity.
    #[must_use]
    pub fn new(uid: &str, gid: &str) -> Self {
        Self {
            uid: uid.to_owned(),
            gid: gid.to_owned(),
        }
    }

    fn meta(&self, name: &str, atime: u32, mtime: u32) -> NodeMeta {
        NodeMeta {
            name: name.to_owned(),
            uid: self.uid.clone(),
            gid: self.gid.clone(),
            muid: self.uid.clone(),
            atime,
            mtime,
        }
    }
}

/// Build the root directory over the given feed sources. Fail-fast: a single
/// unusable source aborts the whole build, there are no partial trees.
pub fn build_root(
    sources: &[String],
    owner: &Owner,
    feeds: &dyn FeedFetcher,
    content: &Arc<dyn ContentFetcher>,
) -> Result<Arc<FsNode>, FeedDoorError> {
    let build_time = unix_now();
    let mut children = Vec::with_capacity(sources.len());
    for url in sources {
        children.push(feed_dir(url, owner, feeds, content, build_time)?);
    }
    Ok(Arc::new(FsNode::directory(
        0,
        hash_name("/"),
        owner.meta("/", build_time, build_time),
        children,
    )))
}

fn feed_dir(
    url: &str,
    owner: &Owner,
    feeds: &dyn FeedFetcher,
    content: &Arc<dyn ContentFetcher>,
    build_time: u32,
) -> Result<Arc<FsNode>, FeedDoorError> {
    let feed = feeds.fetch(url)?;
    debug!("feed '{}': {} items", feed.title, feed.items.len());
    let children = feed
        .items
        .iter()
        .map(|item| item_dir(item, owner, content, build_time))
        .collect();
    Ok(Arc::new(FsNode::directory(
        0,
        hash_name(url),
        owner.meta(&feed.title, build_time, build_time),
        children,
    )))
}

fn item_dir(
    item: &FeedItem,
    owner: &Owner,
    content: &Arc<dyn ContentFetcher>,
    build_time: u32,
) -> Arc<FsNode> {
    let version = build_time;
    let times = item.published.unwrap_or(build_time);
    let fields: [(&str, &str); 5] = [
        ("title", &item.title),
        ("description", &item.description),
        ("content", &item.content),
        ("link", &item.link),
        ("guid", &item.guid),
    ];
    // Field qid paths hash only the field name; same-named files of different
    // items share a path value and are told apart by tree position.
    let mut children: Vec<Arc<FsNode>> = fields
        .iter()
        .map(|(name, value)| {
            Arc::new(FsNode::static_file(
                version,
                hash_name(name),
                owner.meta(name, times, times),
                value.as_bytes().to_vec(),
            ))
        })
        .collect();

    // A media GUID takes precedence; enclosures are only considered when the
    // GUID does not qualify.
    if is_media_url(&item.guid) {
        debug!("adding guid {} as media file", item.guid);
        children.push(media_child(&item.guid, version, times, owner, content));
    } else {
        for enclosure in &item.enclosures {
            if is_media_url(enclosure) {
                debug!("adding enclosure {enclosure} as media file");
                children.push(media_child(enclosure, version, times, owner, content));
            }
        }
    }

    Arc::new(FsNode::directory(
        version,
        hash_name(&item.link),
        owner.meta(&item.title, times, times),
        children,
    ))
}

fn media_child(
    url: &str,
    version: u32,
    times: u32,
    owner: &Owner,
    content: &Arc<dyn ContentFetcher>,
) -> Arc<FsNode> {
    let name = final_segment(url);
    Arc::new(FsNode::media_file(
        version,
        hash_name(&name),
        owner.meta(&name, times, times),
        url.to_owned(),
        content.clone(),
    ))
}

/// Content-independent 64-bit FNV-1a hash of a logical name or URL.
fn hash_name(name: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_bytes());
    hasher.finish()
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn is_media_url(url: &str) -> bool {
    media_type(extension(url).to_ascii_lowercase().as_str()).is_some()
}

/// MIME type of an audio/video file extension; everything else is `None`.
fn media_type(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "oga" | "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "avi" => "video/x-msvideo",
        "m4v" | "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mpeg" | "mpg" => "video/mpeg",
        "ogv" => "video/ogg",
        "webm" => "video/webm",
        _ => return None,
    })
}

fn extension(url: &str) -> &str {
    let path = path_portion(url);
    match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => ext,
        _ => "",
    }
}

/// Final path segment of a URL, used as a media file's display name.
fn final_segment(url: &str) -> String {
    let path = path_portion(url).trim_end_matches('/');
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_owned()
}

fn path_portion(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Feed, FeedFetcher, FeedItem};
    use crate::FeedDoorError;
    use std::collections::HashMap;

    struct StubFeeds {
        feeds: HashMap<String, Feed>,
    }

    impl StubFeeds {
        fn single(url: &str, feed: Feed) -> Self {
            let mut feeds = HashMap::new();
            feeds.insert(url.to_owned(), feed);
            Self { feeds }
        }
    }

    impl FeedFetcher for StubFeeds {
        fn fetch(&self, url: &str) -> Result<Feed, FeedDoorError> {
            self.feeds.get(url).cloned().ok_or(FeedDoorError::Feed {
                url: url.to_owned(),
                reason: "unreachable".to_owned(),
            })
        }
    }

    struct NullContent;

    impl ContentFetcher for NullContent {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedDoorError> {
            Err(FeedDoorError::Fetch {
                url: url.to_owned(),
                reason: "no network in tests".to_owned(),
            })
        }
    }

    fn content() -> Arc<dyn ContentFetcher> {
        Arc::new(NullContent)
    }

    fn item(title: &str, link: &str, guid: &str, enclosures: &[&str]) -> FeedItem {
        FeedItem {
            title: title.to_owned(),
            description: format!("about {title}"),
            content: format!("<p>{title}</p>"),
            link: link.to_owned(),
            guid: guid.to_owned(),
            enclosures: enclosures.iter().map(|e| (*e).to_owned()).collect(),
            published: None,
        }
    }

    fn sample_feed() -> Feed {
        Feed {
            title: "Example Feed".to_owned(),
            items: vec![
                item("First", "http://example.org/first", "guid-first", &[]),
                item("Second", "http://example.org/second", "guid-second", &[]),
            ],
        }
    }

    fn build(feed: Feed) -> Arc<FsNode> {
        let url = "http://example.org/feed.xml".to_owned();
        let feeds = StubFeeds::single(&url, feed);
        build_root(
            &[url],
            &Owner::new("nobody", "nogroup"),
            &feeds,
            &content(),
        )
        .unwrap()
    }

    #[test]
    fn builds_expected_hierarchy() {
        let root = build(sample_feed());
        assert!(root.is_directory());
        assert_eq!(root.children().len(), 1);

        let feed = &root.children()[0];
        assert_eq!(feed.name(), "Example Feed");
        assert_eq!(feed.children().len(), 2);

        let first = &feed.children()[0];
        assert_eq!(first.name(), "First");
        let names: Vec<&str> = first.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["title", "description", "content", "link", "guid"]);

        let title = first.walk_child("title").unwrap();
        assert_eq!(title.read_at(0, 64).unwrap(), b"First");
        assert_eq!(title.stat().length, 5);
    }

    #[test]
    fn colliding_field_paths_resolve_by_position() {
        let root = build(sample_feed());
        let feed = &root.children()[0];
        let first_title = feed.children()[0].walk_child("title").unwrap();
        let second_title = feed.children()[1].walk_child("title").unwrap();
        // Same field name, same qid path — position must disambiguate.
        assert_eq!(first_title.qid().path(), second_title.qid().path());
        assert_eq!(first_title.read_at(0, 64).unwrap(), b"First");
        assert_eq!(second_title.read_at(0, 64).unwrap(), b"Second");
    }

    #[test]
    fn guid_media_takes_precedence_over_enclosures() {
        let feed = Feed {
            title: "Casts".to_owned(),
            items: vec![item(
                "Episode",
                "http://example.org/ep",
                "http://example.org/media/ep.mp3",
                &["http://example.org/alt.ogg"],
            )],
        };
        let root = build(feed);
        let entry = &root.children()[0].children()[0];
        let media: Vec<&str> = entry.children()[5..].iter().map(|c| c.name()).collect();
        assert_eq!(media, ["ep.mp3"]);
    }

    #[test]
    fn enclosures_used_when_guid_is_not_media() {
        let feed = Feed {
            title: "Casts".to_owned(),
            items: vec![item(
                "Episode",
                "http://example.org/ep",
                "tag:example.org,2024:ep",
                &[
                    "http://example.org/a.mp3",
                    "http://example.org/cover.png",
                    "http://example.org/b.ogv?track=2",
                ],
            )],
        };
        let root = build(feed);
        let entry = &root.children()[0].children()[0];
        let media: Vec<&str> = entry.children()[5..].iter().map(|c| c.name()).collect();
        assert_eq!(media, ["a.mp3", "b.ogv"]);
    }

    #[test]
    fn qid_paths_are_stable_across_rebuilds() {
        let first = build(sample_feed());
        let second = build(sample_feed());
        assert_eq!(first.qid().path(), second.qid().path());
        assert_eq!(
            first.children()[0].qid().path(),
            second.children()[0].qid().path()
        );
        assert_eq!(
            first.children()[0].children()[1].qid().path(),
            second.children()[0].children()[1].qid().path()
        );
    }

    #[test]
    fn item_version_tracks_build_time() {
        // Versions are stamped from the build time, so a rebuilt tree gets a
        // fresh qid generation even for unchanged items.
        let before = unix_now();
        let root = build(sample_feed());
        let after = unix_now();
        let entry = &root.children()[0].children()[0];
        let version = entry.qid().version();
        assert!(version >= before && version <= after);
        for child in entry.children() {
            assert_eq!(child.qid().version(), version);
        }
    }

    #[test]
    fn any_bad_source_aborts_the_build() {
        let good = "http://example.org/feed.xml".to_owned();
        let bad = "http://example.org/broken.xml".to_owned();
        let feeds = StubFeeds::single(&good, sample_feed());
        let result = build_root(
            &[good, bad],
            &Owner::new("nobody", "nogroup"),
            &feeds,
            &content(),
        );
        assert!(matches!(result, Err(FeedDoorError::Feed { .. })));
    }

    #[test]
    fn media_names_come_from_the_final_path_segment() {
        assert_eq!(final_segment("http://example.org/a/b/ep.mp3"), "ep.mp3");
        assert_eq!(final_segment("http://example.org/ep.mp3?track=2"), "ep.mp3");
        assert_eq!(extension("http://example.org/ep.MP3"), "MP3");
        assert!(is_media_url("http://example.org/ep.MP3"));
        assert!(is_media_url("http://example.org/x/show.m4a"));
        assert!(!is_media_url("http://example.org/x/page.html"));
        assert!(!is_media_url("http://example.org/plain"));
    }
}
