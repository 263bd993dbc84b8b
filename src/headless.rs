//! Deterministic in-process font backend.
//!
//! `HeadlessBackend` stands in for a platform text stack when none is
//! available: faces are declared up front, metric blobs are synthesized
//! deterministically, and every native call is counted. The counters make
//! resource pairing observable, which the registry and pool tests lean on.

use crate::attributes::FontAttributes;
use crate::backend::FontBackend;
use anyhow::{anyhow, Result};
use log::warn;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Glyph index marking characters absent from the bound face.
pub const MISSING_GLYPH: u16 = 0xFFFF;

/// Declaration of one face the headless subsystem can resolve.
#[derive(Debug, Clone)]
pub struct FaceSpec {
    canonical: String,
    aliases: Vec<String>,
    glyphs: HashMap<char, u16>,
    tables: HashMap<u32, Vec<u8>>,
    outline: bool,
}

impl FaceSpec {
    /// A face resolving to the given canonical name, with outline metrics
    /// and no glyph coverage yet.
    pub fn new(canonical: &str) -> Self {
        FaceSpec {
            canonical: canonical.to_string(),
            aliases: Vec::new(),
            glyphs: HashMap::new(),
            tables: HashMap::new(),
            outline: true,
        }
    }

    /// Add a requested name that resolves to this face.
    pub fn alias(mut self, requested: &str) -> Self {
        self.aliases.push(requested.to_string());
        self
    }

    /// Declare glyph coverage: the i-th character of `coverage` maps to
    /// glyph index `i + 1` (index 0 is reserved for `.notdef`, as in real
    /// font tables).
    pub fn coverage(mut self, coverage: &str) -> Self {
        for (i, ch) in coverage.chars().enumerate() {
            self.glyphs.insert(ch, i as u16 + 1);
        }
        self
    }

    /// Attach a raw table.
    pub fn table(mut self, tag: u32, data: Vec<u8>) -> Self {
        self.tables.insert(tag, data);
        self
    }

    /// Mark the face bitmap-only: it resolves, but outline metrics are
    /// unavailable.
    pub fn bitmap_only(mut self) -> Self {
        self.outline = false;
        self
    }
}

/// Query context of the headless subsystem: just a slot remembering which
/// font is currently bound.
#[derive(Debug, Default)]
pub struct HeadlessContext {
    bound: Option<u32>,
}

/// Deterministic font backend with instrumentation counters.
pub struct HeadlessBackend {
    faces: Vec<FaceSpec>,
    /// Live font handles → index into `faces`.
    live: Mutex<HashMap<u32, usize>>,
    next_font: AtomicU32,
    deny_contexts: AtomicBool,
    fonts_created: AtomicUsize,
    fonts_destroyed: AtomicUsize,
    contexts_allocated: AtomicUsize,
    contexts_released: AtomicUsize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        HeadlessBackend {
            faces: Vec::new(),
            live: Mutex::new(HashMap::new()),
            next_font: AtomicU32::new(1),
            deny_contexts: AtomicBool::new(false),
            fonts_created: AtomicUsize::new(0),
            fonts_destroyed: AtomicUsize::new(0),
            contexts_allocated: AtomicUsize::new(0),
            contexts_released: AtomicUsize::new(0),
        }
    }

    /// Add a resolvable face.
    pub fn with_face(mut self, face: FaceSpec) -> Self {
        self.faces.push(face);
        self
    }

    /// Make all further `allocate_context` calls fail, to exercise the
    /// fatal pool-exhaustion path.
    pub fn deny_further_contexts(&self) {
        self.deny_contexts.store(true, Ordering::Relaxed);
    }

    /// Fonts created over the backend's lifetime.
    pub fn fonts_created(&self) -> usize {
        self.fonts_created.load(Ordering::Relaxed)
    }

    /// Fonts destroyed over the backend's lifetime.
    pub fn fonts_destroyed(&self) -> usize {
        self.fonts_destroyed.load(Ordering::Relaxed)
    }

    /// Fonts currently alive (created and not yet destroyed).
    pub fn fonts_live(&self) -> usize {
        self.live.lock().len()
    }

    /// Contexts handed out over the backend's lifetime.
    pub fn contexts_allocated(&self) -> usize {
        self.contexts_allocated.load(Ordering::Relaxed)
    }

    /// Contexts returned over the backend's lifetime.
    pub fn contexts_released(&self) -> usize {
        self.contexts_released.load(Ordering::Relaxed)
    }

    /// Face bound to the context, if the binding is still alive.
    fn bound_face(&self, context: &HeadlessContext) -> Option<&FaceSpec> {
        let font = context.bound?;
        let idx = *self.live.lock().get(&font)?;
        self.faces.get(idx)
    }

    fn resolve(&self, requested: &str) -> Option<usize> {
        self.faces.iter().position(|face| {
            face.canonical.eq_ignore_ascii_case(requested)
                || face
                    .aliases
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(requested))
        })
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FontBackend for HeadlessBackend {
    type FontId = u32;
    type Context = HeadlessContext;
    type GlyphId = u16;

    const MISSING_GLYPH: u16 = MISSING_GLYPH;

    fn create_font(&self, attrs: &FontAttributes) -> Result<u32> {
        let idx = self
            .resolve(&attrs.face)
            .ok_or_else(|| anyhow!("no face resolves '{}'", attrs.face))?;

        let font = self.next_font.fetch_add(1, Ordering::Relaxed);
        self.live.lock().insert(font, idx);
        self.fonts_created.fetch_add(1, Ordering::Relaxed);
        Ok(font)
    }

    fn allocate_context(&self) -> Result<HeadlessContext> {
        if self.deny_contexts.load(Ordering::Relaxed) {
            return Err(anyhow!("context allocation denied"));
        }
        self.contexts_allocated.fetch_add(1, Ordering::Relaxed);
        Ok(HeadlessContext::default())
    }

    fn release_context(&self, _context: HeadlessContext) {
        self.contexts_released.fetch_add(1, Ordering::Relaxed);
    }

    fn bind(&self, context: &mut HeadlessContext, font: u32) -> Option<u32> {
        context.bound.replace(font)
    }

    fn query_outline_metrics(&self, context: &HeadlessContext) -> Option<Vec<u8>> {
        let face = self.bound_face(context)?;
        if !face.outline {
            return None;
        }

        // Blob layout: u16 name length, name bytes, then em square and
        // vertical metrics. Stable per face, so repeated captures are
        // byte-identical.
        let name = face.canonical.as_bytes();
        let mut blob = Vec::with_capacity(2 + name.len() + 6);
        blob.extend_from_slice(&(name.len() as u16).to_le_bytes());
        blob.extend_from_slice(name);
        blob.extend_from_slice(&2048u16.to_le_bytes()); // units per em
        blob.extend_from_slice(&1638u16.to_le_bytes()); // ascent
        blob.extend_from_slice(&410u16.to_le_bytes()); // descent
        Some(blob)
    }

    fn face_name(&self, metrics: &[u8]) -> String {
        let len = metrics
            .get(..2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
            .unwrap_or(0);
        metrics
            .get(2..2 + len)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    fn query_table_data(
        &self,
        context: &HeadlessContext,
        table: u32,
        offset: u32,
        out: &mut [u8],
    ) -> usize {
        let Some(face) = self.bound_face(context) else {
            return 0;
        };
        let Some(data) = face.tables.get(&table) else {
            return 0;
        };
        let Some(slice) = data.get(offset as usize..) else {
            return 0;
        };

        let n = slice.len().min(out.len());
        out[..n].copy_from_slice(&slice[..n]);
        n
    }

    fn map_text_to_glyphs(&self, context: &HeadlessContext, text: &str) -> Vec<u16> {
        match self.bound_face(context) {
            Some(face) => text
                .chars()
                .map(|ch| face.glyphs.get(&ch).copied().unwrap_or(MISSING_GLYPH))
                .collect(),
            None => text.chars().map(|_| MISSING_GLYPH).collect(),
        }
    }

    fn destroy_font(&self, font: u32) {
        if self.live.lock().remove(&font).is_some() {
            self.fonts_destroyed.fetch_add(1, Ordering::Relaxed);
        } else {
            warn!("HeadlessBackend: destroy of unknown font handle {}", font);
        }
    }
}
