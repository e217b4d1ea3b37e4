// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! FeedDoor serves syndicated (RSS/Atom) feeds as a read-only 9P2000 file
//! tree: one directory per feed, one directory per entry, five text files per
//! entry (`title`, `description`, `content`, `link`, `guid`), plus a media
//! file whose bytes are downloaded lazily on first open when the entry
//! carries audio/video content.
//!
//! The tree is built once at startup and shared read-only across all
//! connections; each connection owns a [`session::Session`] (its fid table)
//! constructed from the shared root.

use std::sync::Arc;

use ninep_wire::{
    Codec, CodecError, OpenMode, Qid, Request, RequestBody, ResponseBody, Stat, MAX_MSIZE, NOFID,
    VERSION,
};
use thiserror::Error;

pub mod feed;
pub mod fetch;
pub mod fids;
pub mod node;
pub mod server;
pub mod session;
pub mod tree;

use node::FsNode;
use session::Session;

/// Errors surfaced by FeedDoor operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedDoorError {
    /// Client proposed a protocol version without the supported prefix.
    #[error("unsupported protocol version '{0}'")]
    VersionMismatch(String),
    /// Operation referenced a fid with no binding.
    #[error("unknown fid {0}")]
    UnknownFid(u32),
    /// Stat referenced a fid with no binding.
    #[error("fid {0} has no stat")]
    NoStat(u32),
    /// Walk component has no matching child.
    #[error("'{0}' not found")]
    NotFound(String),
    /// Walk attempted to descend through a file.
    #[error("'{0}' is not a directory")]
    NotDirectory(String),
    /// Read attempted on a directory.
    #[error("cannot read directory '{0}'")]
    IsDirectory(String),
    /// Open requested a write-capable mode on the read-only tree.
    #[error("'{0}' is read-only")]
    ReadOnly(String),
    /// A remote media fetch failed; the node stays unfetched for retry.
    #[error("fetch of {url} failed: {reason}")]
    Fetch {
        /// Resource that could not be downloaded.
        url: String,
        /// Human-readable failure description.
        reason: String,
    },
    /// A feed source could not be fetched or parsed; fatal at build time.
    #[error("feed {url} unusable: {reason}")]
    Feed {
        /// Feed source that could not be used.
        url: String,
        /// Human-readable failure description.
        reason: String,
    },
    /// Unexpected fault reading materialized content.
    #[error("read failed: {0}")]
    Io(String),
    /// Frame could not be decoded or encoded; fatal to the connection.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// Error reply received by a client-side connection.
    #[error("{0}")]
    Remote(String),
}

/// Shared server state: the immutable feed tree.
#[derive(Debug, Clone)]
pub struct FeedDoor {
    root: Arc<FsNode>,
}

impl FeedDoor {
    /// Wrap a built tree root.
    #[must_use]
    pub fn new(root: Arc<FsNode>) -> Self {
        Self { root }
    }

    /// Borrow the shared root node.
    #[must_use]
    pub fn root(&self) -> &Arc<FsNode> {
        &self.root
    }

    /// Construct the dispatcher for one new connection.
    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(self.root.clone())
    }

    /// Create an in-process connection for tests and tooling.
    #[must_use]
    pub fn connect(&self) -> InProcessConnection {
        InProcessConnection::new(self.session())
    }
}

/// Client-side handle that drives a [`Session`] through encoded frames,
/// exercising the same codec path a TCP client would.
#[derive(Debug)]
pub struct InProcessConnection {
    session: Session,
    codec: Codec,
    next_tag: u16,
    negotiated_msize: u32,
}

impl InProcessConnection {
    fn new(session: Session) -> Self {
        Self {
            session,
            codec: Codec::default(),
            next_tag: 1,
            negotiated_msize: MAX_MSIZE,
        }
    }

    fn next_tag(&mut self) -> u16 {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1);
        tag
    }

    fn transact(&mut self, body: RequestBody) -> Result<ResponseBody, FeedDoorError> {
        let tag = self.next_tag();
        let request = Request { tag, body };
        let encoded = self.codec.encode_request(&request)?;
        let reply = self.session.handle_frame(&encoded)?;
        let response = self.codec.decode_response(&reply)?;
        debug_assert_eq!(response.tag, tag);
        match response.body {
            ResponseBody::Error { ename } => Err(FeedDoorError::Remote(ename)),
            other => Ok(other),
        }
    }

    /// Negotiate the default protocol version.
    pub fn version(&mut self, msize: u32) -> Result<u32, FeedDoorError> {
        self.version_as(msize, VERSION)
    }

    /// Negotiate an explicit version string.
    pub fn version_as(&mut self, msize: u32, version: &str) -> Result<u32, FeedDoorError> {
        let response = self.transact(RequestBody::Version {
            msize,
            version: version.to_owned(),
        })?;
        let ResponseBody::Version { msize, .. } = response else {
            unreachable!("version response must be Rversion");
        };
        self.negotiated_msize = msize;
        Ok(msize)
    }

    /// Attach `fid` to the tree root.
    pub fn attach(&mut self, fid: u32, uname: &str) -> Result<Qid, FeedDoorError> {
        let response = self.transact(RequestBody::Attach {
            fid,
            afid: NOFID,
            uname: uname.to_owned(),
            aname: String::new(),
        })?;
        let ResponseBody::Attach { qid } = response else {
            unreachable!("attach response must be Rattach");
        };
        Ok(qid)
    }

    /// Walk from `fid` to `newfid` following the supplied path components.
    pub fn walk(
        &mut self,
        fid: u32,
        newfid: u32,
        path: &[String],
    ) -> Result<Vec<Qid>, FeedDoorError> {
        let response = self.transact(RequestBody::Walk {
            fid,
            newfid,
            wnames: path.to_vec(),
        })?;
        let ResponseBody::Walk { qids } = response else {
            unreachable!("walk response must be Rwalk");
        };
        Ok(qids)
    }

    /// Open `fid` with the given mode.
    pub fn open(&mut self, fid: u32, mode: OpenMode) -> Result<(Qid, u32), FeedDoorError> {
        let response = self.transact(RequestBody::Open { fid, mode })?;
        let ResponseBody::Open { qid, iounit } = response else {
            unreachable!("open response must be Ropen");
        };
        Ok((qid, iounit))
    }

    /// Read bytes from an opened fid.
    pub fn read(&mut self, fid: u32, offset: u64, count: u32) -> Result<Vec<u8>, FeedDoorError> {
        let response = self.transact(RequestBody::Read { fid, offset, count })?;
        let ResponseBody::Read { data } = response else {
            unreachable!("read response must be Rread");
        };
        Ok(data)
    }

    /// Request the stat record of `fid`.
    pub fn stat(&mut self, fid: u32) -> Result<Stat, FeedDoorError> {
        let response = self.transact(RequestBody::Stat { fid })?;
        let ResponseBody::Stat { stat } = response else {
            unreachable!("stat response must be Rstat");
        };
        Ok(stat)
    }

    /// Release `fid`.
    pub fn clunk(&mut self, fid: u32) -> Result<(), FeedDoorError> {
        let response = self.transact(RequestBody::Clunk { fid })?;
        let ResponseBody::Clunk = response else {
            unreachable!("clunk response must be Rclunk");
        };
        Ok(())
    }

    /// Message size negotiated for this connection.
    #[must_use]
    pub fn negotiated_msize(&self) -> u32 {
        self.negotiated_msize
    }
}
