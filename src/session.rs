// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Per-connection request dispatcher. One `Session` is constructed for every
//! accepted connection from the shared root and a fresh fid table; the seven
//! protocol operations are implemented here against the node model. The
//! dispatcher is variant-agnostic: walk, open, and read go through the node
//! capability set, so directories, static files, and media files all share
//! one handle lifecycle.

use std::sync::Arc;

use log::debug;
use ninep_wire::{Codec, OpenMode, Qid, RequestBody, Response, ResponseBody, Stat, VERSION};

use crate::fids::FidTable;
use crate::node::FsNode;
use crate::FeedDoorError;

/// Dispatcher for one connection: fid table plus the shared tree root.
#[derive(Debug)]
pub struct Session {
    root: Arc<FsNode>,
    fids: FidTable,
    codec: Codec,
}

impl Session {
    /// Create a session over the shared root with an empty fid table.
    #[must_use]
    pub fn new(root: Arc<FsNode>) -> Self {
        Self {
            root,
            fids: FidTable::new(),
            codec: Codec::default(),
        }
    }

    /// Decode one request frame, dispatch it, and encode the reply. Operation
    /// failures become `Rerror` replies carrying the request tag; codec
    /// failures are connection-fatal and bubble up.
    pub fn handle_frame(&self, frame: &[u8]) -> Result<Vec<u8>, FeedDoorError> {
        let request = self.codec.decode_request(frame)?;
        let body = match self.dispatch(&request.body) {
            Ok(body) => body,
            Err(FeedDoorError::Codec(err)) => return Err(FeedDoorError::Codec(err)),
            Err(err) => {
                debug!("request tag {} failed: {err}", request.tag);
                ResponseBody::Error {
                    ename: err.to_string(),
                }
            }
        };
        let response = Response {
            tag: request.tag,
            body,
        };
        Ok(self.codec.encode_response(&response)?)
    }

    /// Dispatch one structured request to its handler.
    pub fn dispatch(&self, request: &RequestBody) -> Result<ResponseBody, FeedDoorError> {
        match request {
            RequestBody::Version { msize, version } => {
                self.version(*msize, version)
                    .map(|msize| ResponseBody::Version {
                        msize,
                        version: VERSION.to_string(),
                    })
            }
            RequestBody::Attach { fid, .. } => {
                self.attach(*fid).map(|qid| ResponseBody::Attach { qid })
            }
            RequestBody::Walk {
                fid,
                newfid,
                wnames,
            } => self
                .walk(*fid, *newfid, wnames)
                .map(|qids| ResponseBody::Walk { qids }),
            RequestBody::Open { fid, mode } => self
                .open(*fid, *mode)
                .map(|qid| ResponseBody::Open { qid, iounit: 0 }),
            RequestBody::Read { fid, offset, count } => self
                .read(*fid, *offset, *count)
                .map(|data| ResponseBody::Read { data }),
            RequestBody::Clunk { fid } => {
                self.clunk(*fid);
                Ok(ResponseBody::Clunk)
            }
            RequestBody::Stat { fid } => {
                self.stat(*fid).map(|stat| ResponseBody::Stat { stat })
            }
        }
    }

    /// Negotiate the protocol version: anything with the `9P2000` prefix is
    /// accepted, the reply carries the fixed version string and the client's
    /// msize unmodified.
    pub fn version(&self, msize: u32, version: &str) -> Result<u32, FeedDoorError> {
        if !version.starts_with(VERSION) {
            return Err(FeedDoorError::VersionMismatch(version.to_owned()));
        }
        Ok(msize)
    }

    /// Bind a fid to the tree root. Any caller is accepted.
    pub fn attach(&self, fid: u32) -> Result<Qid, FeedDoorError> {
        self.fids.bind(fid, self.root.clone());
        Ok(self.root.qid())
    }

    /// Metadata snapshot of the node bound to `fid`.
    pub fn stat(&self, fid: u32) -> Result<Stat, FeedDoorError> {
        let node = self
            .fids
            .lookup(fid)
            .map_err(|_| FeedDoorError::NoStat(fid))?;
        Ok(node.stat())
    }

    /// Resolve `wnames` one component at a time from the node bound to `fid`.
    /// The destination fid is bound only when every component resolves; a
    /// partial resolution returns the qids of the resolved prefix and leaves
    /// `newfid` untouched. An empty sequence clones the source binding.
    pub fn walk(
        &self,
        fid: u32,
        newfid: u32,
        wnames: &[String],
    ) -> Result<Vec<Qid>, FeedDoorError> {
        let mut node = self.fids.lookup(fid)?;
        let mut qids = Vec::with_capacity(wnames.len());
        for name in wnames {
            match node.walk_child(name) {
                Ok(next) => {
                    qids.push(next.qid());
                    node = next;
                }
                Err(err) => {
                    debug!("walk stopped at '{name}': {err}");
                    return Ok(qids);
                }
            }
        }
        self.fids.bind(newfid, node);
        Ok(qids)
    }

    /// Prepare the node bound to `fid` for reading. Write-capable modes are
    /// rejected, the tree is read-only. For media this triggers the lazy
    /// fetch; a fetch failure surfaces here and the next open retries.
    pub fn open(&self, fid: u32, mode: OpenMode) -> Result<Qid, FeedDoorError> {
        let node = self.fids.lookup(fid)?;
        if mode.allows_write() {
            return Err(FeedDoorError::ReadOnly(node.name().to_owned()));
        }
        node.open()?;
        Ok(node.qid())
    }

    /// Read up to `count` bytes at `offset` from the node bound to `fid`.
    pub fn read(&self, fid: u32, offset: u64, count: u32) -> Result<Vec<u8>, FeedDoorError> {
        let node = self.fids.lookup(fid)?;
        node.read_at(offset, count)
    }

    /// Drop the binding of `fid` unconditionally.
    pub fn clunk(&self, fid: u32) {
        self.fids.unbind(fid);
    }
}
