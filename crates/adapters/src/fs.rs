//! Local filesystem adapter.

use gc_metrics_ports::{BoxFuture, FileSystemPort};
use gc_metrics_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::io;
use std::path::PathBuf;

/// Local filesystem adapter using async IO.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    max_file_size_bytes: Option<u64>,
}

impl LocalFileSystem {
    /// Build a filesystem adapter with an optional max file size.
    #[must_use]
    pub const fn new(max_file_size_bytes: Option<u64>) -> Self {
        Self {
            max_file_size_bytes,
        }
    }
}

impl FileSystemPort for LocalFileSystem {
    fn read_file_text(
        &self,
        ctx: &RequestContext,
        path: PathBuf,
    ) -> BoxFuture<'_, Result<Option<Box<str>>>> {
        let ctx = ctx.clone();
        let max_file_size_bytes = self.max_file_size_bytes;
        Box::pin(async move {
            ctx.ensure_not_cancelled("fs.read_file_text")?;
            let display_path = path.to_string_lossy().to_string();

            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(error) => {
                    return Err(ErrorEnvelope::from(error).with_metadata("path", display_path));
                },
            };
            if !metadata.is_file() {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    "path is not a file",
                )
                .with_metadata("path", display_path));
            }
            if let Some(limit) = max_file_size_bytes
                && metadata.len() > limit
            {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    "file exceeds max size",
                )
                .with_metadata("path", display_path)
                .with_metadata("maxBytes", limit.to_string()));
            }

            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => Ok(Some(contents.into_boxed_str())),
                // Removed between the stat and the read.
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(error) => Err(ErrorEnvelope::from(error).with_metadata("path", display_path)),
            }
        })
    }
}
