//! Staged image attachment for the in-progress turn.
//!
//! At most one attachment exists at a time; staging a new one replaces the
//! previous. The preview handle is a release-tracked resource: whoever
//! shows it to the user can hold it until the draft is submitted, cleared,
//! or abandoned, and release happens exactly once via `Drop`.

use emberchat_core::error::ValidationError;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// The attachment size limit: 5 MiB.
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// A locally-viewable handle for a staged image preview: a temp file
/// holding the staged bytes, deleted when the handle is released.
///
/// Releasing is tied to `Drop`, so the handle cannot leak or be released
/// twice regardless of how the owning turn ends.
pub struct PreviewHandle {
    file: Option<NamedTempFile>,
    live: Arc<AtomicUsize>,
}

impl PreviewHandle {
    fn new(bytes: &[u8], live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        // The preview is a display nicety; staging still succeeds if the
        // temp file cannot be written.
        let file = match write_preview(bytes) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(error = %e, "could not write preview file");
                None
            }
        };
        Self { file, live }
    }

    /// Path to the viewable preview file, if the write succeeded.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path())
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        // Dropping the inner NamedTempFile deletes the file.
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!("released attachment preview");
    }
}

fn write_preview(bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("emberchat-preview-")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// An image staged for the next turn but not yet sent or persisted.
pub struct PendingAttachment {
    bytes: Vec<u8>,
    filename: String,
    media_type: String,
    preview: PreviewHandle,
}

impl PendingAttachment {
    /// The buffered raw bytes. Base64 encoding for transport happens at
    /// the orchestrator boundary, not here.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

/// Owns the staged attachment for one compose box.
pub struct AttachmentLifecycle {
    staged: Option<PendingAttachment>,
    live_previews: Arc<AtomicUsize>,
    max_bytes: u64,
}

impl AttachmentLifecycle {
    pub fn new() -> Self {
        Self::with_limit(MAX_ATTACHMENT_BYTES)
    }

    /// Use a non-default size limit (from configuration).
    pub fn with_limit(max_bytes: u64) -> Self {
        Self {
            staged: None,
            live_previews: Arc::new(AtomicUsize::new(0)),
            max_bytes,
        }
    }

    /// Validate and stage an image, replacing any previous attachment.
    ///
    /// Rejections happen before any I/O: non-image media types and
    /// oversized files never leave the compose box.
    pub fn stage(
        &mut self,
        bytes: Vec<u8>,
        media_type: &str,
        filename: &str,
    ) -> Result<(), ValidationError> {
        if !media_type.starts_with("image/") {
            return Err(ValidationError::UnsupportedMediaType(media_type.to_string()));
        }
        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(ValidationError::AttachmentTooLarge {
                actual: size,
                limit: self.max_bytes,
            });
        }

        // Replaces (and thereby releases) any previously staged attachment
        let preview = PreviewHandle::new(&bytes, self.live_previews.clone());
        self.staged = Some(PendingAttachment {
            bytes,
            filename: filename.to_string(),
            media_type: media_type.to_string(),
            preview,
        });
        debug!(filename, size, "staged attachment");
        Ok(())
    }

    /// Discard the staged attachment, releasing its preview. Idempotent.
    pub fn clear(&mut self) {
        self.staged = None;
    }

    pub fn staged(&self) -> Option<&PendingAttachment> {
        self.staged.as_ref()
    }

    pub fn has_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Number of preview handles not yet released. At most one here, but
    /// exposed as a count so leak tests can assert across cycles.
    pub fn live_previews(&self) -> usize {
        self.live_previews.load(Ordering::SeqCst)
    }
}

impl Default for AttachmentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
