//! Storage catalog traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ObjectEntry;

/// Narrow view of an object store holding backup archives.
///
/// This is the only seam through which the engine touches the network.
#[async_trait]
pub trait BackupCatalog: Send + Sync {
    /// Adapter name, used in logs.
    fn name(&self) -> &str;

    /// List every object under `prefix`.
    ///
    /// Implementations must exhaust pagination before returning; a partial
    /// listing must surface as an error, never as a shorter vector.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>>;

    /// Delete a single object.
    async fn delete(&self, key: &str) -> Result<()>;
}
