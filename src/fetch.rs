// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Remote-content collaborator used by media materialization. The node layer
//! only sees the [`ContentFetcher`] trait; tests substitute stub fetchers.

use std::io::Read;

use log::debug;
use ureq::Agent;

use crate::FeedDoorError;

/// Fetch the complete byte content of a remote resource.
pub trait ContentFetcher: Send + Sync {
    /// Download `url` and return its bytes, or a fetch-classified error.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedDoorError>;
}

/// HTTP implementation backed by a `ureq` agent.
pub struct HttpContentFetcher {
    agent: Agent,
}

impl HttpContentFetcher {
    /// Create a fetcher with a fresh agent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: Agent::new(),
        }
    }
}

impl Default for HttpContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentFetcher for HttpContentFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedDoorError> {
        debug!("fetching {url}");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| FeedDoorError::Fetch {
                url: url.to_owned(),
                reason: err.to_string(),
            })?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| FeedDoorError::Fetch {
                url: url.to_owned(),
                reason: err.to_string(),
            })?;
        Ok(bytes)
    }
}
