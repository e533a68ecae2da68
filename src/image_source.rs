use base64::Engine as _;

use crate::element::ImageFormat;
use crate::error::{ContextError, ErrorKind};

/// The color space of the samples of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
}

impl ColorSpace {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
            ColorSpace::DeviceCmyk => "DeviceCMYK",
        }
    }
}

/// How the bytes of a loaded image are to be interpreted by a PDF reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Uncompressed 8-bit samples, row after row.
    Samples,
    /// A complete JPEG file, embedded as-is.
    DctDecode,
}

/// An image read from its source and converted to something a PDF image `XObject` can carry.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub encoding: ImageEncoding,
    pub data: Vec<u8>,
    /// The 8-bit alpha samples, only present if the image has any transparent pixel.
    pub soft_mask: Option<Vec<u8>>,
    /// Set for Adobe CMYK JPEGs, whose samples are stored inverted and need a reversed `Decode` array.
    pub inverted_samples: bool,
}

impl LoadedImage {
    /// Reads the image source, which is either a `data:` URI or a filesystem path, and decodes it
    /// as the declared format. The declared format is never second-guessed from the data.
    pub fn resolve(source: &str, format: ImageFormat) -> Result<Self, ContextError> {
        let image_bytes = read_source_bytes(source)?;
        log::debug!(
            "Read {} bytes of {} data from {:?}",
            image_bytes.len(),
            format,
            truncate_source(source)
        );

        match format {
            ImageFormat::Png => Self::from_png_bytes(&image_bytes, source),
            ImageFormat::Jpeg => Self::from_jpeg_bytes(image_bytes, source),
        }
    }

    fn from_png_bytes(image_bytes: &[u8], source: &str) -> Result<Self, ContextError> {
        let dynamic_image = decode(image_bytes, image::ImageFormat::Png, source)?;
        let color_type = dynamic_image.color();

        let soft_mask = if color_type.has_alpha() {
            let alpha_samples: Vec<u8> = dynamic_image
                .to_rgba8()
                .pixels()
                .map(|pixel| pixel.0[3])
                .collect();
            // A fully opaque alpha channel would only add weight to the document
            if alpha_samples.iter().all(|alpha| *alpha == u8::MAX) {
                None
            } else {
                Some(alpha_samples)
            }
        } else {
            None
        };

        let (color_space, data) = if color_type.has_color() {
            (ColorSpace::DeviceRgb, dynamic_image.to_rgb8().into_raw())
        } else {
            (ColorSpace::DeviceGray, dynamic_image.to_luma8().into_raw())
        };

        Ok(LoadedImage {
            width: dynamic_image.width(),
            height: dynamic_image.height(),
            color_space,
            encoding: ImageEncoding::Samples,
            data,
            soft_mask,
            inverted_samples: false,
        })
    }

    fn from_jpeg_bytes(image_bytes: Vec<u8>, source: &str) -> Result<Self, ContextError> {
        // The color space comes from the frame header, the decoder would convert CMYK to RGB
        let jpeg_frame = read_jpeg_frame(&image_bytes).ok_or_else(|| {
            ContextError::with_context(
                ErrorKind::ImageDecode,
                format!("No frame header found in the JPEG image {:?}", truncate_source(source)),
            )
        })?;
        let color_space = match jpeg_frame.components {
            1 => ColorSpace::DeviceGray,
            3 => ColorSpace::DeviceRgb,
            4 => ColorSpace::DeviceCmyk,
            components => {
                return Err(ContextError::with_context(
                    ErrorKind::ImageDecode,
                    format!(
                        "Unsupported JPEG component count {} in {:?}, expected 1, 3 or 4",
                        components,
                        truncate_source(source)
                    ),
                ))
            }
        };

        // Decoding validates the data and yields the dimensions, the original bytes are what gets embedded
        let dynamic_image = decode(&image_bytes, image::ImageFormat::Jpeg, source)?;

        Ok(LoadedImage {
            width: dynamic_image.width(),
            height: dynamic_image.height(),
            color_space,
            encoding: ImageEncoding::DctDecode,
            data: image_bytes,
            soft_mask: None,
            inverted_samples: color_space == ColorSpace::DeviceCmyk && jpeg_frame.adobe,
        })
    }
}

/// What the header segments of a JPEG file say about its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    components: u8,
    /// Whether an Adobe `APP14` segment precedes the frame.
    adobe: bool,
}

/// Walks the marker segments of a JPEG file up to its first start-of-frame segment.
fn read_jpeg_frame(bytes: &[u8]) -> Option<JpegFrame> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut adobe = false;
    let mut position = 2;
    while position + 1 < bytes.len() {
        if bytes[position] != 0xFF {
            return None;
        }
        let marker = bytes[position + 1];
        match marker {
            // Fill byte before the actual marker
            0xFF => {
                position += 1;
                continue;
            }
            // Standalone markers, they carry no length
            0x01 | 0xD0..=0xD8 => {
                position += 2;
                continue;
            }
            // Scan data or the end of the image, the frame should have come before
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = usize::from(u16::from_be_bytes([
            *bytes.get(position + 2)?,
            *bytes.get(position + 3)?,
        ]));
        let segment = bytes.get(position + 4..position + 2 + length)?;
        match marker {
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            // Every start-of-frame marker but DHT, JPG and DAC
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return Some(JpegFrame {
                    components: *segment.get(5)?,
                    adobe,
                });
            }
            _ => {}
        }
        position += 2 + length;
    }

    None
}

fn decode(
    image_bytes: &[u8],
    format: image::ImageFormat,
    source: &str,
) -> Result<image::DynamicImage, ContextError> {
    image::load_from_memory_with_format(image_bytes, format).map_err(|error| {
        ContextError::with_error(
            ErrorKind::ImageDecode,
            format!(
                "Failed to decode the image {:?} as {:?}",
                truncate_source(source),
                format
            ),
            &error,
        )
    })
}

/// Retrieves the raw bytes behind an image source.
fn read_source_bytes(source: &str) -> Result<Vec<u8>, ContextError> {
    if let Some(data_uri) = source.strip_prefix("data:") {
        let (header, payload) = data_uri.split_once(',').ok_or_else(|| {
            ContextError::with_context(
                ErrorKind::ImageSource,
                "Malformed data URI, it has no payload separator",
            )
        })?;
        if !header.ends_with(";base64") {
            return Err(ContextError::with_context(
                ErrorKind::ImageSource,
                format!("Only base64 data URIs are supported, found {:?}", header),
            ));
        }

        return base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|error| {
                ContextError::with_error(
                    ErrorKind::ImageSource,
                    "Failed to decode the base64 payload of the data URI",
                    &error,
                )
            });
    }

    std::fs::read(source).map_err(|error| {
        ContextError::with_error(
            ErrorKind::ImageSource,
            format!("Failed to read the image {:?}", source),
            &error,
        )
    })
}

/// Data URIs can be arbitrarily long, keep only their beginning for messages.
fn truncate_source(source: &str) -> String {
    const MAXIMUM_LENGTH: usize = 64;
    if source.chars().count() <= MAXIMUM_LENGTH {
        source.to_string()
    } else {
        let truncated: String = source.chars().take(MAXIMUM_LENGTH).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use std::io::Cursor;

    fn encode(image: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, format).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn opaque_png_has_no_soft_mask() {
        let png_bytes = encode(
            image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 10]))),
            image::ImageFormat::Png,
        );
        let loaded_image = LoadedImage::from_png_bytes(&png_bytes, "memory").unwrap();

        assert_eq!((loaded_image.width, loaded_image.height), (4, 3));
        assert_eq!(loaded_image.color_space, ColorSpace::DeviceRgb);
        assert_eq!(loaded_image.encoding, ImageEncoding::Samples);
        assert_eq!(loaded_image.data.len(), 4 * 3 * 3);
        assert!(loaded_image.soft_mask.is_none());
    }

    #[test]
    fn translucent_png_keeps_its_alpha_channel() {
        let png_bytes = encode(
            image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                2,
                2,
                image::Rgba([0, 0, 255, 128]),
            )),
            image::ImageFormat::Png,
        );
        let loaded_image = LoadedImage::from_png_bytes(&png_bytes, "memory").unwrap();

        assert_eq!(loaded_image.soft_mask, Some(vec![128; 4]));
    }

    #[test]
    fn grayscale_png_stays_gray() {
        let png_bytes = encode(
            image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(5, 5, image::Luma([90]))),
            image::ImageFormat::Png,
        );
        let loaded_image = LoadedImage::from_png_bytes(&png_bytes, "memory").unwrap();

        assert_eq!(loaded_image.color_space, ColorSpace::DeviceGray);
        assert_eq!(loaded_image.data, vec![90; 25]);
    }

    #[test]
    fn jpeg_bytes_are_embedded_unchanged() {
        let jpeg_bytes = encode(
            image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 6, image::Rgb([1, 2, 3]))),
            image::ImageFormat::Jpeg,
        );
        let loaded_image = LoadedImage::from_jpeg_bytes(jpeg_bytes.clone(), "memory").unwrap();

        assert_eq!((loaded_image.width, loaded_image.height), (8, 6));
        assert_eq!(loaded_image.encoding, ImageEncoding::DctDecode);
        assert_eq!(loaded_image.data, jpeg_bytes);
    }

    /// A JPEG header up to its frame segment, with an optional Adobe segment before it.
    fn jpeg_header(components: u8, adobe: bool) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        if adobe {
            bytes.extend([0xFF, 0xEE, 0x00, 0x0E]);
            bytes.extend(b"Adobe");
            bytes.extend([0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x02]);
        }
        bytes.extend([0xFF, 0xC0, 0x00, 8 + 3 * components, 0x08, 0x00, 0x10, 0x00, 0x10, components]);
        for component in 1..=components {
            bytes.extend([component, 0x11, 0x00]);
        }
        bytes
    }

    #[test]
    fn jpeg_frame_gives_the_component_count() {
        assert_eq!(
            read_jpeg_frame(&jpeg_header(4, true)),
            Some(JpegFrame { components: 4, adobe: true })
        );
        assert_eq!(
            read_jpeg_frame(&jpeg_header(1, false)),
            Some(JpegFrame { components: 1, adobe: false })
        );
        assert_eq!(read_jpeg_frame(b"not a jpeg"), None);
        // Truncated in the middle of the frame segment
        assert_eq!(read_jpeg_frame(&jpeg_header(3, false)[..8]), None);
    }

    #[test]
    fn encoded_color_jpeg_has_three_components() {
        let jpeg_bytes = encode(
            image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 8, image::Rgb([9, 80, 200]))),
            image::ImageFormat::Jpeg,
        );

        assert_eq!(read_jpeg_frame(&jpeg_bytes).map(|frame| frame.components), Some(3));
        let loaded_image = LoadedImage::from_jpeg_bytes(jpeg_bytes, "memory").unwrap();
        assert_eq!(loaded_image.color_space, ColorSpace::DeviceRgb);
        assert!(!loaded_image.inverted_samples);
    }

    #[test]
    fn unsupported_jpeg_component_count_is_a_decode_error() {
        let error = LoadedImage::from_jpeg_bytes(jpeg_header(2, false), "memory").unwrap_err();

        assert_eq!(error.kind, ErrorKind::ImageDecode);
        assert!(error.context.contains("component count 2"));
    }

    #[test]
    fn declared_format_must_match_the_data() {
        let jpeg_bytes = encode(
            image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2)),
            image::ImageFormat::Jpeg,
        );
        let error = LoadedImage::from_png_bytes(&jpeg_bytes, "memory").unwrap_err();

        assert_eq!(error.kind, ErrorKind::ImageDecode);
    }

    #[test]
    fn data_uri_sources_are_decoded() {
        let png_bytes = encode(
            image::DynamicImage::ImageRgb8(image::RgbImage::new(3, 1)),
            image::ImageFormat::Png,
        );
        let source = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png_bytes)
        );
        let loaded_image = LoadedImage::resolve(&source, ImageFormat::Png).unwrap();

        assert_eq!((loaded_image.width, loaded_image.height), (3, 1));
    }

    #[test]
    fn missing_file_is_an_image_source_error() {
        let error = LoadedImage::resolve("missing.png", ImageFormat::Png).unwrap_err();

        assert_eq!(error.kind, ErrorKind::ImageSource);
        assert!(error.context.contains("missing.png"));
    }

    #[test]
    fn non_base64_data_uri_is_rejected() {
        let error = LoadedImage::resolve("data:image/png,%89PNG", ImageFormat::Png).unwrap_err();
        assert_eq!(error.kind, ErrorKind::ImageSource);
    }
}
