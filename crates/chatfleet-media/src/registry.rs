// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strategy registry keyed by [`MediaKind`].

use std::collections::HashMap;
use std::sync::Arc;

use chatfleet_core::{ChatSession, FleetError};
use tracing::debug;

use crate::descriptor::{MediaDescriptor, MediaInput, MediaKind};
use crate::store::TransientStore;
use crate::strategy::{DeferredStrategy, EagerUploadStrategy, MediaContext, MediaStrategy};

/// Dispatches attachments to the strategy registered for their kind.
pub struct MediaRegistry {
    store: TransientStore,
    strategies: HashMap<MediaKind, Arc<dyn MediaStrategy>>,
}

impl MediaRegistry {
    /// An empty registry staging files in `store`.
    pub fn new(store: TransientStore) -> Self {
        Self {
            store,
            strategies: HashMap::new(),
        }
    }

    /// Registry with the built-in strategies: deferred image/file, eager video/audio.
    pub fn with_defaults(store: TransientStore) -> Self {
        let mut registry = Self::new(store);
        registry.register(Arc::new(DeferredStrategy::image()));
        registry.register(Arc::new(DeferredStrategy::file()));
        registry.register(Arc::new(EagerUploadStrategy::video()));
        registry.register(Arc::new(EagerUploadStrategy::audio()));
        registry
    }

    /// Registers (or replaces) the strategy for its kind.
    pub fn register(&mut self, strategy: Arc<dyn MediaStrategy>) {
        let kind = strategy.kind();
        if self.strategies.insert(kind, strategy).is_some() {
            debug!(%kind, "replaced media strategy");
        }
    }

    pub fn supports(&self, kind: MediaKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    pub fn store(&self) -> &TransientStore {
        &self.store
    }

    /// Ingests one attachment. `session` is needed for eager kinds.
    pub async fn ingest(
        &self,
        kind: MediaKind,
        input: MediaInput,
        session: Option<&dyn ChatSession>,
    ) -> Result<MediaDescriptor, FleetError> {
        let strategy = self.strategies.get(&kind).ok_or_else(|| FleetError::Media {
            message: format!("no media strategy registered for {kind}"),
            source: None,
        })?;
        let ctx = MediaContext {
            store: &self.store,
            session,
        };
        strategy.ingest(input, &ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatfleet_test_utils::StubSession;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn image_is_deferred_with_dimensions() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = MediaRegistry::with_defaults(TransientStore::new(tmp.path()));

        let bytes = png_bytes(3, 2);
        let len = bytes.len() as u64;
        let out = registry
            .ingest(MediaKind::Image, MediaInput::new(bytes, "a.png", "U1"), None)
            .await
            .unwrap();

        assert_eq!(out.kind, MediaKind::Image);
        assert_eq!((out.width, out.height), (Some(3), Some(2)));
        assert_eq!(out.size, len);
        assert_eq!(out.checksum.as_ref().map(String::len), Some(64));
        let path = out.file_path.unwrap();
        assert!(path.exists(), "deferred file stays for the send path");
        assert!(out.url.is_none());
    }

    #[tokio::test]
    async fn file_is_deferred_without_dimensions() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = MediaRegistry::with_defaults(TransientStore::new(tmp.path()));
        let out = registry
            .ingest(MediaKind::File, MediaInput::new(b"%PDF".to_vec(), "r.pdf", "U1"), None)
            .await
            .unwrap();
        assert!(out.file_path.unwrap().to_string_lossy().ends_with(".pdf"));
        assert_eq!(out.width, None);
    }

    #[tokio::test]
    async fn video_uploads_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = MediaRegistry::with_defaults(TransientStore::new(tmp.path()));
        let session = StubSession::new("ACC1");

        let mut input = MediaInput::new(vec![0u8; 16], "clip.mp4", "G1");
        input.duration_ms = Some(4_000);
        let out = registry
            .ingest(MediaKind::Video, input, Some(&session as &dyn ChatSession))
            .await
            .unwrap();

        assert!(out.url.is_some());
        assert_eq!(out.duration_ms, Some(4_000));
        assert_eq!(session.calls("upload"), 1);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_upload_still_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = MediaRegistry::with_defaults(TransientStore::new(tmp.path()));
        let session = StubSession::new("ACC1");
        session.fail_method("upload");

        let err = registry
            .ingest(
                MediaKind::Audio,
                MediaInput::new(vec![1, 2], "v.aac", "U1"),
                Some(&session as &dyn ChatSession),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Remote { .. }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn eager_kind_without_session_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = MediaRegistry::with_defaults(TransientStore::new(tmp.path()));
        let err = registry
            .ingest(MediaKind::Video, MediaInput::new(vec![1], "c.mp4", "U1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Media { .. }));
    }

    struct Fixed;

    #[async_trait]
    impl MediaStrategy for Fixed {
        fn kind(&self) -> MediaKind {
            MediaKind::Audio
        }

        async fn ingest(
            &self,
            input: MediaInput,
            _ctx: &MediaContext<'_>,
        ) -> Result<MediaDescriptor, FleetError> {
            let mut d = MediaDescriptor::empty(MediaKind::Audio, input.bytes.len() as u64);
            d.url = Some("mem://fixed".into());
            Ok(d)
        }
    }

    #[tokio::test]
    async fn custom_strategy_replaces_builtin() {
        let tmp = tempfile::tempdir().unwrap();
        let mut registry = MediaRegistry::new(TransientStore::new(tmp.path()));
        assert!(!registry.supports(MediaKind::Audio));
        registry.register(Arc::new(Fixed));
        let out = registry
            .ingest(MediaKind::Audio, MediaInput::new(vec![1], "x", "U1"), None)
            .await
            .unwrap();
        assert_eq!(out.url.as_deref(), Some("mem://fixed"));
    }
}
