// src/attributes.rs

//! Requested-font descriptor types.
//!
//! `FontAttributes` describes the font a caller *asks* for. It is read-only
//! input to registration and is not retained afterward: the registry keys
//! entries on the face the backend actually resolves, which may differ from
//! the requested name.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Style flags of a requested font.
    ///
    /// These can be combined (e.g. `StyleFlags::ITALIC | StyleFlags::UNDERLINE`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StyleFlags: u8 {
        const ITALIC    = 1 << 0;
        const UNDERLINE = 1 << 1;
        const STRIKEOUT = 1 << 2;
    }
}

/// Rendering hint forwarded to the native subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderQuality {
    /// Let the subsystem pick.
    #[default]
    Default,
    /// Grayscale antialiasing.
    Antialiased,
    /// Subpixel antialiasing.
    Subpixel,
}

/// Requested font description, as handed over by a text-layout caller.
///
/// Descriptors cross process and configuration boundaries in the enclosing
/// system, hence the serde derives. Missing fields deserialize to their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontAttributes {
    /// Requested typeface name. The resolved face may differ.
    pub face: String,
    /// Point size.
    pub size_pt: f64,
    /// Weight on the usual 100..=900 scale (400 = regular, 700 = bold).
    pub weight: u16,
    /// Style flags (italic, underline, strikeout).
    pub style: StyleFlags,
    /// Rendering hint.
    pub quality: RenderQuality,
}

impl Default for FontAttributes {
    fn default() -> Self {
        FontAttributes {
            face: String::new(),
            size_pt: 12.0,
            weight: 400,
            style: StyleFlags::empty(),
            quality: RenderQuality::Default,
        }
    }
}

impl FontAttributes {
    /// Descriptor for the named face with default size, weight, and style.
    pub fn named(face: &str) -> Self {
        FontAttributes {
            face: face.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_regular_twelve_point() {
        let attrs = FontAttributes::default();
        assert_eq!(attrs.size_pt, 12.0);
        assert_eq!(attrs.weight, 400);
        assert_eq!(attrs.style, StyleFlags::empty());
        assert_eq!(attrs.quality, RenderQuality::Default);
    }

    #[test]
    fn descriptor_round_trips_through_serde() {
        let attrs = FontAttributes {
            face: "Arial".to_string(),
            size_pt: 10.5,
            weight: 700,
            style: StyleFlags::ITALIC | StyleFlags::UNDERLINE,
            quality: RenderQuality::Subpixel,
        };

        let json = serde_json::to_string(&attrs).expect("serialize");
        let back: FontAttributes = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, attrs);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let back: FontAttributes = serde_json::from_str(r#"{"face":"Consolas"}"#).expect("deserialize");
        assert_eq!(back.face, "Consolas");
        assert_eq!(back.size_pt, 12.0);
        assert_eq!(back.weight, 400);
    }
}
