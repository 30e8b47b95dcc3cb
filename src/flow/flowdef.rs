// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! JSON flow definition schema types.
//!
//! Flow definitions follow the NMOS IS-04 flow schema. The core stores the
//! document byte-for-byte as `flow.json` and never interprets it; only the
//! [`crate::MxlInstance`] facade parses it to derive flow creation
//! parameters.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::time::Rational;

/// Complete flow definition structure following the NMOS IS-04 schema.
///
/// The `format` URN selects the kind-specific fields, which serde flattens
/// into the same JSON object.
///
/// # Examples
///
/// ```
/// use mxl::flowdef::FlowDef;
///
/// let json = r#"{
///     "id": "12345678-1234-1234-1234-123456789abc",
///     "format": "urn:x-nmos:format:video",
///     "label": "My Video Flow",
///     "description": "1080p60 video",
///     "media_type": "video/raw",
///     "grain_rate": {"numerator": 60, "denominator": 1},
///     "frame_width": 1920,
///     "frame_height": 1080,
///     "interlace_mode": "progressive",
///     "colorspace": "BT709",
///     "components": []
/// }"#;
///
/// let flow_def: FlowDef = serde_json::from_str(json).unwrap();
/// assert_eq!(flow_def.label, "My Video Flow");
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FlowDef {
    /// Unique identifier for this flow (UUID).
    pub id: uuid::Uuid,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Arbitrary key-value tags for organization.
    #[serde(default)]
    pub tags: HashMap<String, Vec<String>>,
    /// Short human-readable label.
    #[serde(default)]
    pub label: String,
    /// List of parent flow IDs (for derived flows).
    #[serde(default)]
    pub parents: Vec<String>,
    /// MIME media type (e.g., "video/raw").
    pub media_type: String,
    /// Format-specific details, selected by the `format` URN.
    #[serde(flatten)]
    pub details: FlowDefDetails,
}

/// Format-specific flow definition details, tagged by the NMOS `format`
/// URN.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "format")]
pub enum FlowDefDetails {
    /// Video flow definition.
    #[serde(rename = "urn:x-nmos:format:video")]
    Video(FlowDefVideo),
    /// Audio flow definition.
    #[serde(rename = "urn:x-nmos:format:audio")]
    Audio(FlowDefAudio),
}

/// Video flow definition details.
///
/// Specifies video-specific parameters like dimensions, frame rate, and
/// color format.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FlowDefVideo {
    /// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
    pub grain_rate: Rational,
    /// Frame width in pixels.
    pub frame_width: u32,
    /// Frame height in pixels (or field height for interlaced).
    pub frame_height: u32,
    /// Interlacing mode.
    pub interlace_mode: InterlaceMode,
    /// Colorspace identifier (e.g., "BT709", "BT2020").
    pub colorspace: String,
    /// Video component descriptions (Y, Cb, Cr, etc.).
    pub components: Vec<Component>,
}

/// Video interlacing mode.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterlaceMode {
    /// Progressive scan (non-interlaced).
    #[serde(rename = "progressive")]
    Progressive,
    /// Interlaced with top field first.
    #[serde(rename = "interlaced_tff")]
    InterlacedTff,
    /// Interlaced with bottom field first.
    #[serde(rename = "interlaced_bff")]
    InterlacedBff,
}

impl FromStr for InterlaceMode {
    type Err = ();

    /// Parses an interlace mode string: "progressive", "interlaced_tff",
    /// or "interlaced_bff".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "progressive" => Ok(Self::Progressive),
            "interlaced_tff" => Ok(Self::InterlacedTff),
            "interlaced_bff" => Ok(Self::InterlacedBff),
            _ => Err(()),
        }
    }
}

/// Audio flow definition details.
///
/// Specifies audio-specific parameters like sample rate and channel count.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FlowDefAudio {
    /// Sample rate as a rational number (typically 48000/1 Hz).
    pub sample_rate: Rational,
    /// Number of audio channels.
    pub channel_count: u32,
    /// Bit depth per sample (e.g., 24 for 24-bit audio).
    pub bit_depth: u8,
}

/// Video component description (Y, Cb, Cr, alpha, etc.).
///
/// Describes a single component plane in a video frame, including its
/// dimensions and bit depth.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Component {
    /// Component name (e.g., "Y", "Cb", "Cr", "A").
    pub name: String,
    /// Component width in pixels.
    pub width: u32,
    /// Component height in pixels.
    pub height: u32,
    /// Bit depth of this component.
    pub bit_depth: u8,
}
