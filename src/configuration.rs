use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::element::StandardFont;
use crate::error::{ContextError, ErrorKind};

/// The unit in which the coordinates and sizes of the elements are expressed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
    Px,
}

impl Unit {
    /// How many PDF points make up one unit.
    pub fn points_per_unit(&self) -> f32 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
            Unit::Px => 72.0 / 96.0,
        }
    }

    pub fn to_points(&self, value: f32) -> f32 {
        value * self.points_per_unit()
    }
}

/// The size of the pages, before the orientation is applied.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PageFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    /// Width and height in document units.
    Custom([f32; 2]),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// The descriptive entries written to the Info dictionary of the PDF.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: String,
    pub creator: String,
}

/// Everything about a document that is not content: page geometry, unit system,
/// initial text state and output options. Every field falls back to its default
/// when absent from the JSON representation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentConfiguration {
    pub page_format: PageFormat,
    pub orientation: Orientation,
    pub unit: Unit,
    pub font: StandardFont,
    /// Font size in points, independently of `unit`.
    pub font_size: f32,
    /// Distance between consecutive baselines as a multiple of the font size.
    pub line_height_factor: f32,
    pub text_color: [f32; 3],
    /// Whether the content and image streams are compressed when saving.
    pub compress: bool,
    pub metadata: Metadata,
    /// The PDF document identifier. A random one is generated when the document is created if absent.
    pub identifier: Option<String>,
}

impl Default for DocumentConfiguration {
    fn default() -> Self {
        DocumentConfiguration {
            page_format: PageFormat::A4,
            orientation: Orientation::Portrait,
            unit: Unit::Mm,
            font: StandardFont::Helvetica,
            font_size: 16.0,
            line_height_factor: 1.15,
            text_color: [0.0, 0.0, 0.0],
            compress: true,
            metadata: Metadata::default(),
            identifier: None,
        }
    }
}

impl DocumentConfiguration {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error(
                    ErrorKind::Configuration,
                    format!(
                        "Failed to read the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;
        let configuration: DocumentConfiguration =
            serde_json::from_str(&configuration_file_contents).map_err(|error| {
                ContextError::with_error(
                    ErrorKind::Configuration,
                    format!(
                        "Failed to parse the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;

        Ok(configuration)
    }

    /// The page width and height in points, with the orientation applied.
    pub fn page_size_in_points(&self) -> (f32, f32) {
        let (short_side, long_side) = match self.page_format {
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (419.53, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Custom([width, height]) => {
                // Normalized to portrait, the orientation decides the final sides
                let (width, height) = (self.unit.to_points(width), self.unit.to_points(height));
                (width.min(height), width.max(height))
            }
        };

        match self.orientation {
            Orientation::Portrait => (short_side, long_side),
            Orientation::Landscape => (long_side, short_side),
        }
    }
}
