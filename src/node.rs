// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Filesystem node model: one closed sum over the three node kinds the tree
//! is built from. Directories and static files are immutable after
//! construction; a media file owns the single piece of mutable state in the
//! whole tree, its lazily-fetched content buffer.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use ninep_wire::{Qid, QidType, Stat, DMDIR};

use crate::fetch::ContentFetcher;
use crate::FeedDoorError;

/// Access mode for every node this server exposes.
const MODE_READ_ALL: u32 = 0o555;

/// Fixed metadata carried by every node.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    /// Display name, the path component clients walk by.
    pub name: String,
    /// Owner name.
    pub uid: String,
    /// Group name.
    pub gid: String,
    /// Name of the last modifier (the owner for this read-only tree).
    pub muid: String,
    /// Access time, seconds since the Unix epoch.
    pub atime: u32,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: u32,
}

/// A node in the immutable feed tree, shared across all connections.
pub struct FsNode {
    qid: Qid,
    meta: NodeMeta,
    kind: NodeKind,
}

enum NodeKind {
    Directory {
        children: Vec<Arc<FsNode>>,
    },
    StaticFile {
        data: Vec<u8>,
    },
    MediaFile {
        url: String,
        fetcher: Arc<dyn ContentFetcher>,
        content: Mutex<MediaState>,
    },
}

enum MediaState {
    Unfetched,
    Fetched(Arc<Vec<u8>>),
}

impl fmt::Debug for FsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsNode")
            .field("name", &self.meta.name)
            .field("qid", &self.qid)
            .finish_non_exhaustive()
    }
}

impl FsNode {
    /// Construct a directory node with the given identity and ordered children.
    #[must_use]
    pub fn directory(version: u32, path: u64, meta: NodeMeta, children: Vec<Arc<FsNode>>) -> Self {
        Self {
            qid: Qid::new(QidType::DIRECTORY, version, path),
            meta,
            kind: NodeKind::Directory { children },
        }
    }

    /// Construct a static file node over an in-memory buffer.
    #[must_use]
    pub fn static_file(version: u32, path: u64, meta: NodeMeta, data: Vec<u8>) -> Self {
        Self {
            qid: Qid::new(QidType::FILE, version, path),
            meta,
            kind: NodeKind::StaticFile { data },
        }
    }

    /// Construct a media file node whose content is fetched on first open.
    #[must_use]
    pub fn media_file(
        version: u32,
        path: u64,
        meta: NodeMeta,
        url: String,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        Self {
            qid: Qid::new(QidType::FILE, version, path),
            meta,
            kind: NodeKind::MediaFile {
                url,
                fetcher,
                content: Mutex::new(MediaState::Unfetched),
            },
        }
    }

    /// Identity of this node. Pure; stable for the tree's lifetime.
    #[must_use]
    pub fn qid(&self) -> Qid {
        self.qid
    }

    /// Display name exposed as the path component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Whether this node is a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Current content length. Zero for directories and unfetched media.
    #[must_use]
    pub fn length(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { .. } => 0,
            NodeKind::StaticFile { data } => data.len() as u64,
            NodeKind::MediaFile { content, .. } => match &*lock_content(content) {
                MediaState::Unfetched => 0,
                MediaState::Fetched(bytes) => bytes.len() as u64,
            },
        }
    }

    /// Metadata snapshot of this node.
    #[must_use]
    pub fn stat(&self) -> Stat {
        let mode = if self.is_directory() {
            MODE_READ_ALL | DMDIR
        } else {
            MODE_READ_ALL
        };
        Stat {
            qid: self.qid,
            mode,
            atime: self.meta.atime,
            mtime: self.meta.mtime,
            length: self.length(),
            name: self.meta.name.clone(),
            uid: self.meta.uid.clone(),
            gid: self.meta.gid.clone(),
            muid: self.meta.muid.clone(),
        }
    }

    /// Resolve one child by display name. Files are terminal: walking past
    /// them fails regardless of the requested name.
    pub fn walk_child(&self, name: &str) -> Result<Arc<FsNode>, FeedDoorError> {
        match &self.kind {
            NodeKind::Directory { children } => children
                .iter()
                .find(|child| child.meta.name == name)
                .cloned()
                .ok_or_else(|| FeedDoorError::NotFound(name.to_owned())),
            _ => Err(FeedDoorError::NotDirectory(self.meta.name.clone())),
        }
    }

    /// Prepare the node for reading. A no-op for directories and static
    /// files; for media this triggers the one-shot remote fetch. The content
    /// lock is held across the fetch, so concurrent opens of the same node
    /// serialize and exactly one download happens; a failure leaves the node
    /// unfetched and the next open retries.
    pub fn open(&self) -> Result<(), FeedDoorError> {
        let NodeKind::MediaFile {
            url,
            fetcher,
            content,
        } = &self.kind
        else {
            return Ok(());
        };
        let mut state = lock_content(content);
        if matches!(*state, MediaState::Fetched(_)) {
            return Ok(());
        }
        debug!("materializing media {url}");
        let bytes = fetcher.fetch(url)?;
        *state = MediaState::Fetched(Arc::new(bytes));
        Ok(())
    }

    /// Read up to `count` bytes starting at `offset`. Reads at or past the
    /// end of content return an empty buffer, not an error.
    pub fn read_at(&self, offset: u64, count: u32) -> Result<Vec<u8>, FeedDoorError> {
        match &self.kind {
            NodeKind::Directory { .. } => {
                Err(FeedDoorError::IsDirectory(self.meta.name.clone()))
            }
            NodeKind::StaticFile { data } => Ok(window(data, offset, count)),
            NodeKind::MediaFile { content, .. } => match &*lock_content(content) {
                MediaState::Fetched(bytes) => Ok(window(bytes, offset, count)),
                MediaState::Unfetched => Err(FeedDoorError::Io(format!(
                    "media '{}' not materialized",
                    self.meta.name
                ))),
            },
        }
    }

    /// Ordered children of a directory; empty for file variants.
    #[must_use]
    pub fn children(&self) -> &[Arc<FsNode>] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            _ => &[],
        }
    }
}

fn lock_content(content: &Mutex<MediaState>) -> MutexGuard<'_, MediaState> {
    match content.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn window(data: &[u8], offset: u64, count: u32) -> Vec<u8> {
    let len = data.len() as u64;
    if offset >= len {
        return Vec::new();
    }
    let end = offset.saturating_add(u64::from(count)).min(len);
    data[offset as usize..end as usize].to_vec()
}
