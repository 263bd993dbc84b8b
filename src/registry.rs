//! Font registration, deduplication, and entry accessors.
//!
//! The `FontRegistry` deduplicates fonts by the face name the backend
//! *actually resolves*, not the one the caller asked for: two descriptors
//! that materialize to the same physical face end up sharing one native
//! identity and one captured metrics blob, even when registered
//! concurrently from multiple threads. Registrations are permanent for the
//! registry's lifetime; the store is append-only with no eviction.
//!
//! Registration is double-checked: the common case (face already
//! registered) is a lock-free map read, and only the rare first-time insert
//! race is serialized by the registration lock.

use crate::attributes::FontAttributes;
use crate::backend::FontBackend;
use crate::context_pool::ContextPool;
use crate::error::RegisterError;
use crate::hooks::StreamHook;
use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Opaque, stable handle to a registered font entry.
///
/// Handles are indices into the registry's append-only entry arena: they
/// stay valid, and keep referring to the same entry, for as long as the
/// registry lives. `FaceId` is `Copy` and freely shareable across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceId(u32);

/// A registered font: the owned native identity plus the metrics captured
/// at registration time. Immutable once inserted.
struct FontEntry<B: FontBackend> {
    font: B::FontId,
    metrics: Arc<[u8]>,
}

/// Deduplicating font store keyed by resolved canonical face name.
pub struct FontRegistry<B: FontBackend> {
    backend: Arc<B>,
    pool: ContextPool<B>,
    /// Canonical face name → entry handle. Read lock-free on the hot path;
    /// a stale miss is resolved by the double-checked slow path.
    faces: DashMap<String, FaceId>,
    /// Append-only entry arena indexed by `FaceId`.
    entries: RwLock<Vec<FontEntry<B>>>,
    /// Serializes the re-check + insert sequence of `register`.
    registration_lock: Mutex<()>,
}

impl<B: FontBackend> FontRegistry<B> {
    /// Create an empty registry over the given backend, with its own
    /// context pool.
    pub fn new(backend: Arc<B>) -> Self {
        FontRegistry {
            pool: ContextPool::new(Arc::clone(&backend)),
            backend,
            faces: DashMap::new(),
            entries: RwLock::new(Vec::new()),
            registration_lock: Mutex::new(()),
        }
    }

    /// Register the font described by `attrs`, or reuse the existing entry
    /// if the backend resolves it to an already-registered face.
    ///
    /// The probe queries run through `context` when supplied; otherwise a
    /// context is borrowed from the pool for the duration of the call. A
    /// caller-supplied context keeps the new font bound afterwards; callers
    /// that care about the previous binding should restore it via the value
    /// `select_font` returned when they bound it.
    ///
    /// # Returns
    /// A stable handle to the entry for the resolved face. On failure the
    /// registry is unchanged and no native identity is retained.
    pub fn register(
        &self,
        attrs: &FontAttributes,
        context: Option<&mut B::Context>,
    ) -> Result<FaceId, RegisterError> {
        let font = self.backend.create_font(attrs).map_err(|reason| {
            warn!("FontRegistry: backend refused descriptor for '{}'", attrs.face);
            RegisterError::CreationFailure {
                face: attrs.face.clone(),
                reason,
            }
        })?;

        // The resolved font's metrics decide the registry key, so they are
        // captured before any lookup.
        let metrics = self.with_context(context, |ctx| {
            self.backend.bind(ctx, font);
            self.backend.query_outline_metrics(ctx)
        });

        let Some(metrics) = metrics else {
            self.backend.destroy_font(font);
            warn!(
                "FontRegistry: no outline metrics for '{}', dropping created font",
                attrs.face
            );
            return Err(RegisterError::MetricsUnavailable {
                face: attrs.face.clone(),
            });
        };

        let face = self.backend.face_name(&metrics);

        // Fast path: the face is usually registered already.
        if let Some(id) = self.faces.get(face.as_str()).map(|r| *r) {
            self.backend.destroy_font(font);
            debug!("FontRegistry: '{}' already registered as {:?}", face, id);
            return Ok(id);
        }

        // Slow path: a concurrent registrar may have inserted this face
        // after the lookup above, so re-check under the registration lock.
        // The key computed above is reused verbatim.
        let _registration = self.registration_lock.lock();
        if let Some(id) = self.faces.get(face.as_str()).map(|r| *r) {
            self.backend.destroy_font(font);
            debug!(
                "FontRegistry: lost registration race for '{}', reusing {:?}",
                face, id
            );
            return Ok(id);
        }

        let id = {
            let mut entries = self.entries.write();
            let id = FaceId(entries.len() as u32);
            entries.push(FontEntry {
                font,
                metrics: metrics.into(),
            });
            id
        };
        self.faces.insert(face.clone(), id);
        info!("FontRegistry: registered '{}' as {:?}", face, id);
        Ok(id)
    }

    /// Read-only view of the metric bytes captured when the entry was
    /// registered. Byte-identical across calls for the same handle.
    ///
    /// # Panics
    /// Panics if `id` did not come from this registry.
    pub fn get_metrics(&self, id: FaceId) -> Arc<[u8]> {
        Arc::clone(&self.entries.read()[id.0 as usize].metrics)
    }

    /// Copy raw font-table bytes of the entry into `out`.
    ///
    /// # Arguments
    /// * `table` - Table tag (backend-defined; 0 for the whole file where
    ///   supported)
    /// * `offset` - Byte offset into the table
    /// * `context` - Caller context, or `None` to borrow from the pool
    ///
    /// # Returns
    /// Number of bytes written into `out`; 0 on failure or absence.
    ///
    /// # Panics
    /// Panics if `id` did not come from this registry.
    pub fn get_table_data(
        &self,
        id: FaceId,
        table: u32,
        offset: u32,
        out: &mut [u8],
        context: Option<&mut B::Context>,
    ) -> usize {
        let font = self.font_of(id);
        let n = self.with_context(context, |ctx| {
            self.backend.bind(ctx, font);
            self.backend.query_table_data(ctx, table, offset, out)
        });
        debug!(
            "FontRegistry: table {:#010x} +{} of {:?} -> {} bytes",
            table, offset, id, n
        );
        n
    }

    /// Map each character of `text` to a glyph index in the entry's font.
    ///
    /// Unmappable characters are marked in-band with the backend's
    /// `MISSING_GLYPH` sentinel rather than failing the call; the result
    /// always has one index per input `char`.
    ///
    /// # Panics
    /// Panics if `id` did not come from this registry.
    pub fn get_glyph_indices(
        &self,
        id: FaceId,
        text: &str,
        context: Option<&mut B::Context>,
    ) -> Vec<B::GlyphId> {
        let font = self.font_of(id);
        self.with_context(context, |ctx| {
            self.backend.bind(ctx, font);
            self.backend.map_text_to_glyphs(ctx, text)
        })
    }

    /// Bind the entry's native identity into `context` for subsequent
    /// external rendering calls.
    ///
    /// # Returns
    /// The identity previously bound to the context, if any, so the caller
    /// can restore it afterwards.
    ///
    /// # Panics
    /// Panics if `id` did not come from this registry.
    pub fn select_font(&self, id: FaceId, context: &mut B::Context) -> Option<B::FontId> {
        self.backend.bind(context, self.font_of(id))
    }

    /// Data-streaming hook for the entry, for rasterizers that pull raw
    /// font bytes directly. No stream source is attached to any entry
    /// today.
    pub fn stream_hook(&self, _id: FaceId) -> Option<&dyn StreamHook> {
        None
    }

    /// Index of the entry's face within its underlying font resource.
    /// Always 0 until font collections are routed through the streaming
    /// hookup.
    pub fn face_index(&self, _id: FaceId) -> u32 {
        0
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registry's context pool, for callers that need a context of
    /// their own (e.g. to hold a `select_font` binding across calls).
    pub fn pool(&self) -> &ContextPool<B> {
        &self.pool
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn font_of(&self, id: FaceId) -> B::FontId {
        self.entries.read()[id.0 as usize].font
    }

    /// Run `op` with the caller's context, or with a pool borrow that is
    /// returned on every exit path.
    fn with_context<R>(
        &self,
        caller: Option<&mut B::Context>,
        op: impl FnOnce(&mut B::Context) -> R,
    ) -> R {
        match caller {
            Some(context) => op(context),
            None => op(&mut self.pool.claim()),
        }
    }
}

impl<B: FontBackend> Drop for FontRegistry<B> {
    fn drop(&mut self) {
        // Entries never die while the registry lives; the identities they
        // own go back to the backend only here.
        for entry in self.entries.get_mut().drain(..) {
            self.backend.destroy_font(entry.font);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{FaceSpec, HeadlessBackend, MISSING_GLYPH};
    use std::thread;
    use test_log::test;

    const CMAP: u32 = 0x636D6170;

    fn registry() -> (Arc<HeadlessBackend>, FontRegistry<HeadlessBackend>) {
        let backend = Arc::new(
            HeadlessBackend::new()
                .with_face(
                    FaceSpec::new("Arial")
                        .alias("arial")
                        .alias("Helv")
                        .coverage("AB")
                        .table(CMAP, vec![10, 20, 30, 40]),
                )
                .with_face(FaceSpec::new("Times New Roman").alias("Times").coverage("AXY"))
                .with_face(FaceSpec::new("Fixedsys").bitmap_only()),
        );
        let registry = FontRegistry::new(Arc::clone(&backend));
        (backend, registry)
    }

    #[test]
    fn sequential_reregistration_reuses_the_entry() {
        let (backend, registry) = registry();

        let first = registry.register(&FontAttributes::named("Arial"), None).unwrap();
        let second = registry.register(&FontAttributes::named("Arial"), None).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        // Both calls created a probe font; the redundant one was destroyed.
        assert_eq!(backend.fonts_created(), 2);
        assert_eq!(backend.fonts_destroyed(), 1);
        assert_eq!(backend.fonts_live(), 1);
    }

    #[test]
    fn aliased_descriptors_share_one_entry() {
        let (_backend, registry) = registry();

        let requested = registry.register(&FontAttributes::named("arial"), None).unwrap();
        let aliased = registry.register(&FontAttributes::named("Helv"), None).unwrap();

        assert_eq!(requested, aliased);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_faces_get_independent_entries() {
        let (_backend, registry) = registry();

        let arial = registry.register(&FontAttributes::named("Arial"), None).unwrap();
        let times = registry.register(&FontAttributes::named("Times New Roman"), None).unwrap();

        assert_ne!(arial, times);
        assert_eq!(registry.len(), 2);
        assert_ne!(registry.get_metrics(arial), registry.get_metrics(times));
    }

    #[test]
    fn metrics_are_byte_identical_across_calls() {
        let (_backend, registry) = registry();
        let id = registry.register(&FontAttributes::named("Arial"), None).unwrap();

        assert_eq!(registry.get_metrics(id), registry.get_metrics(id));
    }

    #[test]
    fn creation_failure_mutates_nothing() {
        let (backend, registry) = registry();

        let err = registry
            .register(&FontAttributes::named("Wingdings"), None)
            .unwrap_err();

        assert!(matches!(err, RegisterError::CreationFailure { .. }));
        assert!(registry.is_empty());
        assert_eq!(backend.fonts_created(), 0);
    }

    #[test]
    fn metrics_failure_destroys_the_created_font() {
        let (backend, registry) = registry();

        let err = registry
            .register(&FontAttributes::named("Fixedsys"), None)
            .unwrap_err();

        assert!(matches!(err, RegisterError::MetricsUnavailable { .. }));
        assert!(registry.is_empty());
        assert_eq!(backend.fonts_created(), 1);
        assert_eq!(backend.fonts_destroyed(), 1);
        assert_eq!(backend.fonts_live(), 0);
        // The pool context claimed for the probe came back.
        assert_eq!(registry.pool().idle_count(), 1);
    }

    #[test]
    fn concurrent_identical_registrations_insert_once() {
        let (backend, registry) = registry();
        const THREADS: usize = 8;

        let ids: Vec<FaceId> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| s.spawn(|| registry.register(&FontAttributes::named("Arial"), None).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.len(), 1);
        // Every thread created a probe font, but exactly one was retained.
        assert_eq!(backend.fonts_created(), THREADS);
        assert_eq!(backend.fonts_destroyed(), THREADS - 1);
        assert_eq!(backend.fonts_live(), 1);
    }

    #[test]
    fn caller_supplied_context_bypasses_the_pool() {
        let (backend, registry) = registry();

        let mut ctx = backend.allocate_context().unwrap();
        registry
            .register(&FontAttributes::named("Arial"), Some(&mut ctx))
            .unwrap();

        assert_eq!(backend.contexts_allocated(), 1); // only ours
        assert_eq!(registry.pool().idle_count(), 0);
        backend.release_context(ctx);
    }

    #[test]
    fn glyph_indices_mark_missing_characters_in_band() {
        let (_backend, registry) = registry();
        let id = registry.register(&FontAttributes::named("Arial"), None).unwrap();

        // Arial covers 'A' and 'B' but not 'X'.
        let indices = registry.get_glyph_indices(id, "AXB", None);

        assert_eq!(indices.len(), 3);
        assert_eq!(indices[0], 1);
        assert_eq!(indices[1], MISSING_GLYPH);
        assert_eq!(indices[2], 2);
    }

    #[test]
    fn table_data_copies_into_the_caller_buffer() {
        let (_backend, registry) = registry();
        let id = registry.register(&FontAttributes::named("Arial"), None).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(registry.get_table_data(id, CMAP, 0, &mut buf, None), 4);
        assert_eq!(&buf[..4], &[10, 20, 30, 40]);

        assert_eq!(registry.get_table_data(id, CMAP, 2, &mut buf, None), 2);
        assert_eq!(&buf[..2], &[30, 40]);

        assert_eq!(registry.get_table_data(id, 0xBEEF, 0, &mut buf, None), 0);
    }

    #[test]
    fn select_font_returns_the_previous_binding() {
        let (_backend, registry) = registry();
        let arial = registry.register(&FontAttributes::named("Arial"), None).unwrap();
        let times = registry.register(&FontAttributes::named("Times"), None).unwrap();

        let mut ctx = registry.pool().claim();
        assert_eq!(registry.select_font(arial, &mut ctx), None);
        let prev_arial = registry.select_font(times, &mut ctx).unwrap();
        let prev_times = registry.select_font(arial, &mut ctx).unwrap();
        assert_ne!(prev_arial, prev_times);
    }

    #[test]
    fn stream_hooks_are_unattached_stubs() {
        let (_backend, registry) = registry();
        let id = registry.register(&FontAttributes::named("Arial"), None).unwrap();

        assert!(registry.stream_hook(id).is_none());
        assert_eq!(registry.face_index(id), 0);
    }

    #[test]
    fn drop_balances_every_backend_resource() {
        let (backend, registry) = registry();
        registry.register(&FontAttributes::named("Arial"), None).unwrap();
        registry.register(&FontAttributes::named("Times"), None).unwrap();
        registry.register(&FontAttributes::named("Helv"), None).unwrap();

        drop(registry);

        assert_eq!(backend.fonts_created(), backend.fonts_destroyed());
        assert_eq!(backend.fonts_live(), 0);
        assert_eq!(backend.contexts_allocated(), backend.contexts_released());
    }

    #[test]
    #[should_panic]
    fn foreign_handle_panics() {
        let (_backend, registry) = registry();
        registry.get_metrics(FaceId(99));
    }
}
