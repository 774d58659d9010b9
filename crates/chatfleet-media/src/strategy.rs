// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-kind ingestion strategies.
//!
//! Deferred strategies stage bytes locally and let the send path upload them.
//! Eager strategies upload immediately through the live session.

use std::io::Cursor;

use async_trait::async_trait;
use chatfleet_core::{ChatSession, FleetError, UploadMeta};
use image::ImageReader;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::descriptor::{MediaDescriptor, MediaInput, MediaKind};
use crate::store::TransientStore;

/// Everything a strategy may need besides the attachment itself.
pub struct MediaContext<'a> {
    pub store: &'a TransientStore,
    /// Live session of the sending tenant. Required by eager strategies only.
    pub session: Option<&'a dyn ChatSession>,
}

/// Normalizes one kind of attachment into a [`MediaDescriptor`].
#[async_trait]
pub trait MediaStrategy: Send + Sync {
    fn kind(&self) -> MediaKind;

    async fn ingest(
        &self,
        input: MediaInput,
        ctx: &MediaContext<'_>,
    ) -> Result<MediaDescriptor, FleetError>;
}

/// SHA-256 of `bytes`, hex encoded.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Pixel dimensions when the bytes are a recognized image format.
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    reader.format()?;
    reader.into_dimensions().ok()
}

/// Stages bytes in the transient store and returns the local path.
pub struct DeferredStrategy {
    kind: MediaKind,
}

impl DeferredStrategy {
    pub fn image() -> Self {
        Self {
            kind: MediaKind::Image,
        }
    }

    pub fn file() -> Self {
        Self {
            kind: MediaKind::File,
        }
    }
}

#[async_trait]
impl MediaStrategy for DeferredStrategy {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn ingest(
        &self,
        input: MediaInput,
        ctx: &MediaContext<'_>,
    ) -> Result<MediaDescriptor, FleetError> {
        let ext = input.extension();
        let path = ctx.store.write(&input.bytes, ext.as_deref()).await?;

        let mut descriptor = MediaDescriptor::empty(self.kind, input.bytes.len() as u64);
        descriptor.checksum = Some(checksum(&input.bytes));
        descriptor.file_path = Some(path);
        descriptor.width = input.width;
        descriptor.height = input.height;

        if self.kind == MediaKind::Image {
            match image_dimensions(&input.bytes) {
                Some((w, h)) => {
                    descriptor.width = Some(w);
                    descriptor.height = Some(h);
                }
                None => debug!(filename = %input.filename, "image format not recognized"),
            }
        }
        Ok(descriptor)
    }
}

/// Uploads through the live session; the staged file never outlives the call.
pub struct EagerUploadStrategy {
    kind: MediaKind,
}

impl EagerUploadStrategy {
    pub fn video() -> Self {
        Self {
            kind: MediaKind::Video,
        }
    }

    pub fn audio() -> Self {
        Self {
            kind: MediaKind::Audio,
        }
    }
}

#[async_trait]
impl MediaStrategy for EagerUploadStrategy {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn ingest(
        &self,
        input: MediaInput,
        ctx: &MediaContext<'_>,
    ) -> Result<MediaDescriptor, FleetError> {
        let session = ctx.session.ok_or_else(|| FleetError::Media {
            message: format!("{} upload requires a live session", self.kind),
            source: None,
        })?;

        let ext = input.extension();
        let path = ctx.store.write(&input.bytes, ext.as_deref()).await?;
        let size = input.bytes.len() as u64;
        let sum = checksum(&input.bytes);
        let meta = UploadMeta {
            kind: self.kind.to_string(),
            filename: input.filename.clone(),
            thread_id: input.thread_id.clone(),
            is_group: input.is_group,
            size,
            local_path: Some(path.clone()),
        };

        let uploaded = session.upload(input.bytes, meta).await;
        ctx.store.remove(&path).await;
        let remote = uploaded.inspect_err(|e| {
            warn!(kind = %self.kind, error = %e, "media upload failed");
        })?;

        let mut descriptor = MediaDescriptor::empty(self.kind, size);
        descriptor.url = remote.url;
        descriptor.file_id = remote.file_id;
        descriptor.thumbnail = remote.thumbnail;
        descriptor.checksum = Some(sum);
        descriptor.duration_ms = remote.duration_ms.or(input.duration_ms);
        descriptor.width = remote.width.or(input.width);
        descriptor.height = remote.height.or(input.height);
        Ok(descriptor)
    }
}
