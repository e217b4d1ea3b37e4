// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Per-connection fid table. Fids are client-chosen integers; the table maps
//! them onto shared tree nodes and guards the map so pipelined requests on
//! one connection may touch it concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::node::FsNode;
use crate::FeedDoorError;

/// Mapping from client-chosen fids to bound nodes.
#[derive(Debug, Default)]
pub struct FidTable {
    entries: Mutex<HashMap<u32, Arc<FsNode>>>,
}

impl FidTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fid to a node, replacing any previous binding.
    pub fn bind(&self, fid: u32, node: Arc<FsNode>) {
        self.lock().insert(fid, node);
    }

    /// Look up the node bound to a fid.
    pub fn lookup(&self, fid: u32) -> Result<Arc<FsNode>, FeedDoorError> {
        self.lock()
            .get(&fid)
            .cloned()
            .ok_or(FeedDoorError::UnknownFid(fid))
    }

    /// Drop a fid's binding. A no-op when the fid is unbound.
    pub fn unbind(&self, fid: u32) {
        self.lock().remove(&fid);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Arc<FsNode>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeMeta;
    use std::thread;

    fn leaf(name: &str) -> Arc<FsNode> {
        let meta = NodeMeta {
            name: name.to_owned(),
            uid: "nobody".to_owned(),
            gid: "nogroup".to_owned(),
            muid: "nobody".to_owned(),
            atime: 0,
            mtime: 0,
        };
        Arc::new(FsNode::static_file(0, 1, meta, Vec::new()))
    }

    #[test]
    fn bind_overwrites_previous_binding() {
        let table = FidTable::new();
        table.bind(1, leaf("a"));
        table.bind(1, leaf("b"));
        assert_eq!(table.lookup(1).unwrap().name(), "b");
    }

    #[test]
    fn lookup_of_unbound_fid_fails() {
        let table = FidTable::new();
        assert!(matches!(
            table.lookup(7),
            Err(FeedDoorError::UnknownFid(7))
        ));
    }

    #[test]
    fn unbind_is_idempotent() {
        let table = FidTable::new();
        table.bind(1, leaf("a"));
        table.unbind(1);
        table.unbind(1);
        assert!(table.lookup(1).is_err());
    }

    #[test]
    fn concurrent_bindings_do_not_interfere() {
        let table = Arc::new(FidTable::new());
        let mut handles = Vec::new();
        for i in 0..4u32 {
            let table = table.clone();
            handles.push(thread::spawn(move || {
                for j in 0..50u32 {
                    let fid = i * 100 + j;
                    table.bind(fid, leaf(&format!("n{fid}")));
                    assert!(table.lookup(fid).is_ok());
                    table.unbind(fid);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread failed");
        }
    }
}
