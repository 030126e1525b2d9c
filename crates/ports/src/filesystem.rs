//! Filesystem boundary contract.

use crate::BoxFuture;
use gc_metrics_shared::{RequestContext, Result};
use std::path::PathBuf;

/// Boundary contract for reading the metrics sink.
pub trait FileSystemPort: Send + Sync {
    /// Read a whole UTF-8 text file.
    ///
    /// A missing file is `Ok(None)`; other failures are errors.
    fn read_file_text(
        &self,
        ctx: &RequestContext,
        path: PathBuf,
    ) -> BoxFuture<'_, Result<Option<Box<str>>>>;
}
