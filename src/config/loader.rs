//! The route table loader: an injected external collaborator (spec §1
//! treats configuration storage as external) that returns a serialized
//! route table on demand. This crate ships one concrete implementation,
//! reading a JSON file from disk, since it has no real key/value store to
//! integrate with.

use std::path::PathBuf;

use async_trait::async_trait;

#[async_trait]
pub trait RouteTableLoader: Send + Sync {
    /// Returns the raw, not-yet-parsed route table JSON.
    async fn load(&self) -> Result<String, String>;
}

pub struct FileRouteTableLoader {
    path: PathBuf,
}

impl FileRouteTableLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileRouteTableLoader { path: path.into() }
    }
}

#[async_trait]
impl RouteTableLoader for FileRouteTableLoader {
    async fn load(&self) -> Result<String, String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| format!("failed to read route table at {:?}: {e}", self.path))
    }
}
