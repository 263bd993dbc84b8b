//! Deduplicating font-resource cache with pooled query contexts.
//!
//! This crate sits between a text-layout caller and a native
//! text-rendering subsystem. Given a requested font description it returns
//! a stable handle for the font the subsystem *actually* resolved, so that
//! requests resolving to the same physical face share one native identity
//! and one cached metrics blob, including under concurrent registration.
//! Metric, table, and glyph-index queries run through reusable query
//! contexts, borrowed from an internal pool or supplied by the caller.
//!
//! The native subsystem is abstracted behind the [`FontBackend`] trait;
//! [`HeadlessBackend`] is a deterministic in-process implementation for
//! headless operation and tests.
//!
//! # Example
//! ```
//! use font_registry::{FaceSpec, FontAttributes, FontRegistry, HeadlessBackend};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(
//!     HeadlessBackend::new().with_face(FaceSpec::new("Arial").alias("Helv").coverage("AB")),
//! );
//! let registry = FontRegistry::new(Arc::clone(&backend));
//!
//! // Different requested names, same resolved face: one shared entry.
//! let requested = registry.register(&FontAttributes::named("arial"), None)?;
//! let aliased = registry.register(&FontAttributes::named("Helv"), None)?;
//! assert_eq!(requested, aliased);
//!
//! let metrics = registry.get_metrics(requested);
//! assert!(!metrics.is_empty());
//! # Ok::<(), font_registry::RegisterError>(())
//! ```

pub mod attributes;
pub mod backend;
pub mod context_pool;
pub mod error;
pub mod headless;
pub mod hooks;
pub mod registry;

pub use attributes::{FontAttributes, RenderQuality, StyleFlags};
pub use backend::FontBackend;
pub use context_pool::{ContextPool, PooledContext};
pub use error::RegisterError;
pub use headless::{FaceSpec, HeadlessBackend};
pub use hooks::{NoStream, StreamHook};
pub use registry::{FaceId, FontRegistry};
