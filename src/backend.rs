//! Native text-rendering subsystem contract.
//!
//! This module defines the `FontBackend` trait, a thin call contract over a
//! platform text stack (GDI, Core Text, fontconfig+freetype, etc.). The
//! registry never touches a platform API directly: it materializes fonts,
//! borrows query contexts, and reads metrics, tables, and glyph indices
//! exclusively through this trait.

use crate::attributes::FontAttributes;
use anyhow::Result;
use std::fmt::Debug;

/// Platform text-subsystem trait.
///
/// Implementors provide thin wrappers around native font APIs, handling:
/// - Font materialization from an attribute descriptor
/// - Query-context allocation and release
/// - Binding a font identity to a context
/// - Metric, table, and glyph-index queries against the bound font
///
/// The `FontRegistry` uses this trait to implement shared deduplication and
/// context pooling. All calls are synchronous and bounded; cancellation and
/// timeouts, if needed, are the caller's concern.
pub trait FontBackend: Send + Sync {
    /// Native font identity handle (e.g. an `HFONT` or a `CTFont` ref).
    ///
    /// The registry holds exactly one identity per canonical face and is
    /// the sole owner: identities it retains are destroyed only when the
    /// registry itself is dropped.
    type FontId: Copy + Eq + Debug + Send + Sync;

    /// Reusable query context (e.g. a memory DC) a font is bound to before
    /// metric, table, or glyph queries.
    type Context: Send;

    /// Glyph index type (e.g. `u16` for TrueType glyph ids).
    type GlyphId: Copy + Eq + Debug + Send;

    /// Sentinel index marking characters the bound font cannot map.
    const MISSING_GLYPH: Self::GlyphId;

    /// Materialize a font identity from the requested attributes.
    ///
    /// # Returns
    /// The new identity, or an error if the subsystem rejects the
    /// descriptor. The caller owns the returned identity and must
    /// eventually pass it to `destroy_font`.
    fn create_font(&self, attrs: &FontAttributes) -> Result<Self::FontId>;

    /// Allocate a fresh query context.
    fn allocate_context(&self) -> Result<Self::Context>;

    /// Release a context previously obtained from `allocate_context`.
    fn release_context(&self, context: Self::Context);

    /// Bind a font identity to a context for subsequent queries.
    ///
    /// # Returns
    /// The identity previously bound to this context, if any, so callers
    /// can restore it.
    fn bind(&self, context: &mut Self::Context, font: Self::FontId) -> Option<Self::FontId>;

    /// Query the outline/text metrics of the font bound to `context`.
    ///
    /// # Returns
    /// An opaque metrics blob, or `None` if the bound font has no outline
    /// metrics (e.g. a bitmap-only face). The blob layout is
    /// backend-defined; `face_name` knows how to read it.
    fn query_outline_metrics(&self, context: &Self::Context) -> Option<Vec<u8>>;

    /// Extract the resolved typeface name from a metrics blob this backend
    /// produced. This is the name of the font the subsystem actually
    /// resolved, which may differ from the requested one.
    fn face_name(&self, metrics: &[u8]) -> String;

    /// Copy raw font-table bytes from the font bound to `context`.
    ///
    /// # Arguments
    /// * `table` - Table tag (0 for the whole font file, where supported)
    /// * `offset` - Byte offset into the table
    /// * `out` - Caller buffer receiving the data
    ///
    /// # Returns
    /// Number of bytes written into `out`; 0 on failure or if the table is
    /// absent.
    fn query_table_data(
        &self,
        context: &Self::Context,
        table: u32,
        offset: u32,
        out: &mut [u8],
    ) -> usize;

    /// Map each character of `text` to a glyph index in the font bound to
    /// `context`.
    ///
    /// # Returns
    /// One index per input `char`, with `MISSING_GLYPH` marking characters
    /// the font cannot map. The call itself never fails.
    fn map_text_to_glyphs(&self, context: &Self::Context, text: &str) -> Vec<Self::GlyphId>;

    /// Destroy a font identity created by `create_font`.
    fn destroy_font(&self, font: Self::FontId);
}
