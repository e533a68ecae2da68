use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ErrorKind};

/// The 14 standard Type1 fonts every PDF reader ships with, so that no font program needs to be embedded.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
    #[serde(rename = "Helvetica-Bold")]
    HelveticaBold,
    #[serde(rename = "Helvetica-Oblique")]
    HelveticaOblique,
    #[serde(rename = "Helvetica-BoldOblique")]
    HelveticaBoldOblique,
    #[serde(rename = "Times-Roman")]
    TimesRoman,
    #[serde(rename = "Times-Bold")]
    TimesBold,
    #[serde(rename = "Times-Italic")]
    TimesItalic,
    #[serde(rename = "Times-BoldItalic")]
    TimesBoldItalic,
    Courier,
    #[serde(rename = "Courier-Bold")]
    CourierBold,
    #[serde(rename = "Courier-Oblique")]
    CourierOblique,
    #[serde(rename = "Courier-BoldOblique")]
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

impl StandardFont {
    /// The PostScript name used as `BaseFont` in the font dictionary.
    pub fn base_font_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
            StandardFont::Symbol => "Symbol",
            StandardFont::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Symbolic fonts carry their own built-in encoding and must not be given `WinAnsiEncoding`.
    pub fn is_symbolic(&self) -> bool {
        matches!(self, StandardFont::Symbol | StandardFont::ZapfDingbats)
    }
}

/// The encoding of an image source. The declared format decides how the data is decoded.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.as_str())
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = ContextError;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_ascii_uppercase().as_str() {
            "PNG" => Ok(ImageFormat::Png),
            "JPEG" | "JPG" => Ok(ImageFormat::Jpeg),
            _ => Err(ContextError::with_context(
                ErrorKind::ImageDecode,
                format!("Unsupported image format {:?}", format),
            )),
        }
    }
}

impl TryFrom<String> for ImageFormat {
    type Error = ContextError;

    fn try_from(format: String) -> Result<Self, Self::Error> {
        format.parse()
    }
}

impl From<ImageFormat> for String {
    fn from(format: ImageFormat) -> Self {
        format.as_str().to_string()
    }
}

/// A run of text, positioned by its baseline origin in document units measured from the top-left corner of the page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub content: String,
    pub x: f32,
    pub y: f32,
    /// The font in effect when the text was added.
    pub font: StandardFont,
    /// The font size in points.
    pub font_size: f32,
    /// The RGB fill color, each component in `0.0..=1.0`.
    pub color: [f32; 3],
}

/// An image placed by its top-left corner and scaled to the given size, all in document units.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    /// A filesystem path or a `data:` URI. It is only resolved when the document is saved.
    pub source: String,
    pub format: ImageFormat,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single item of page content.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
}

impl Element {
    pub fn as_text(&self) -> Option<&TextElement> {
        match self {
            Element::Text(text_element) => Some(text_element),
            Element::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageElement> {
        match self {
            Element::Image(image_element) => Some(image_element),
            Element::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_format_parses_case_insensitively() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("Jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn unknown_image_format_is_rejected() {
        let error = "GIF".parse::<ImageFormat>().unwrap_err();
        assert_eq!(error.kind, ErrorKind::ImageDecode);
    }

    #[test]
    fn standard_fonts_deserialize_from_postscript_names() {
        let font: StandardFont = serde_json::from_str("\"Times-BoldItalic\"").unwrap();
        assert_eq!(font, StandardFont::TimesBoldItalic);
        assert_eq!(font.base_font_name(), "Times-BoldItalic");
    }
}
