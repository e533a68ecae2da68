use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use std::{
    collections::BTreeMap,
    io::BufWriter,
    mem,
};
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization as _;

use crate::configuration::Metadata;
use crate::element::StandardFont;
use crate::error::{ContextError, ErrorKind};
use crate::image_source::{ColorSpace, ImageEncoding, LoadedImage};

/// Named reference to an image `XObject` which has already been inserted into the document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XObjectReference(String);

impl XObjectReference {
    /// Creates a new reference for an `XObject` from a number.
    pub fn new(index: usize) -> Self {
        Self(format!("Im{index}"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A block of text to be drawn on a page, already expressed in PDF points with the origin
/// in the bottom-left corner of the page.
#[derive(Debug, Clone)]
pub struct TextPlacement<'a> {
    pub font: StandardFont,
    pub font_size: f32,
    pub color: [f32; 3],
    /// The baseline origin of the first line.
    pub origin: [f32; 2],
    /// The distance between two consecutive baselines.
    pub leading: f32,
    pub lines: &'a [&'a str],
}

/// The representation of a PDF page: its size and the content stream operations drawn onto it,
/// together with the resources these operations refer to.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    operations: Vec<Operation>,
    /// The resource names of the fonts used in the page.
    fonts: Vec<String>,
    images: Vec<XObjectReference>,
}

impl PdfPage {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

/// This struct represents the actual PDF document on a high-level. It is an interface to the underlying
/// `lopdf::Document` which keeps track of the pages, the fonts and the images in use, so that
/// the rest of the crate never has to handle PDF objects directly.
pub struct PdfDocument {
    /// The underlying PDF document: this is a low-level interface and shouldn't be directly interacted with
    /// unless strictly necessary, anyway this is why it is exposed to the user.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used to in order to set the PDF `ID` tag.
    pub identifier: String,
    metadata: Metadata,
    pages: Vec<PdfPage>,
    /// The association between the fonts and their resource names (`F1`, `F2`...).
    fonts: BTreeMap<StandardFont, String>,
    /// The association between the image resource names and the objects they are stored in.
    images: BTreeMap<XObjectReference, lopdf::ObjectId>,
}

impl PdfDocument {
    /// Create a new `PdfDocument` by defaulting the underlying PDF document to version 1.5
    /// of the PDF specification and customly specifying the PDF identifier.
    pub fn new(pdf_document_identifier: String) -> Self {
        PdfDocument {
            inner_document: lopdf::Document::with_version("1.5"),
            identifier: pdf_document_identifier,
            metadata: Metadata::default(),
            pages: Vec::new(),
            fonts: BTreeMap::new(),
            images: BTreeMap::new(),
        }
    }

    pub fn set_metadata(&mut self, metadata: &Metadata) {
        self.metadata = metadata.clone();
    }

    /// Adds an empty page of the given width and height in points and returns its index,
    /// which is to be passed to the functions drawing onto the page.
    pub fn add_page(&mut self, page_width: f32, page_height: f32) -> usize {
        self.pages.push(PdfPage {
            width: page_width,
            height: page_height,
            operations: Vec::new(),
            fonts: Vec::new(),
            images: Vec::new(),
        });

        self.pages.len() - 1
    }

    pub fn pages(&self) -> &[PdfPage] {
        &self.pages
    }

    /// Writes the lines of text onto the given page. The first line starts at the origin, the others
    /// follow it downwards, each one `leading` points below the previous.
    pub fn write_text(
        &mut self,
        page_index: usize,
        text_placement: &TextPlacement<'_>,
    ) -> Result<(), ContextError> {
        let font_name = self.font_resource_name(text_placement.font);

        let [x, y] = text_placement.origin;
        let [r, g, b] = text_placement.color;
        let mut operations = vec![
            Operation::new("BT", vec![]), // Begin text section
            Operation::new(
                "Tf",
                vec![font_name.clone().into(), text_placement.font_size.into()],
            ),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("TL", vec![text_placement.leading.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
        ];
        for (line_index, line) in text_placement.lines.iter().enumerate() {
            if line_index > 0 {
                // Move to the start of the next line, `TL` below
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(
                    encode_win_ansi(line),
                    StringFormat::Literal,
                )],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        let pdf_page = self.get_mut_page(page_index)?;
        if !pdf_page.fonts.contains(&font_name) {
            pdf_page.fonts.push(font_name);
        }
        pdf_page.operations.extend(operations);

        Ok(())
    }

    /// Inserts the image into the document as an `XObject` and returns the reference under which
    /// it can be placed on any number of pages.
    pub fn add_image(&mut self, loaded_image: &LoadedImage) -> XObjectReference {
        use lopdf::Object::*;

        let mut image_dictionary = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("XObject".into())),
            ("Subtype", Name("Image".into())),
            ("Width", Integer(i64::from(loaded_image.width))),
            ("Height", Integer(i64::from(loaded_image.height))),
            (
                "ColorSpace",
                Name(loaded_image.color_space.pdf_name().into()),
            ),
            ("BitsPerComponent", Integer(8)),
        ]);
        if loaded_image.inverted_samples {
            let components = match loaded_image.color_space {
                ColorSpace::DeviceGray => 1,
                ColorSpace::DeviceRgb => 3,
                ColorSpace::DeviceCmyk => 4,
            };
            let decode_ranges = (0..components)
                .flat_map(|_| [Integer(1), Integer(0)])
                .collect();
            image_dictionary.set("Decode", Array(decode_ranges));
        }

        if let Some(alpha_samples) = &loaded_image.soft_mask {
            let soft_mask_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", Name("XObject".into())),
                ("Subtype", Name("Image".into())),
                ("Width", Integer(i64::from(loaded_image.width))),
                ("Height", Integer(i64::from(loaded_image.height))),
                ("ColorSpace", Name("DeviceGray".into())),
                ("BitsPerComponent", Integer(8)),
            ]);
            let soft_mask_id = self
                .inner_document
                .add_object(lopdf::Stream::new(soft_mask_dictionary, alpha_samples.clone()));
            image_dictionary.set("SMask", Reference(soft_mask_id));
        }

        let image_stream = match loaded_image.encoding {
            ImageEncoding::Samples => {
                lopdf::Stream::new(image_dictionary, loaded_image.data.clone())
            }
            ImageEncoding::DctDecode => {
                image_dictionary.set("Filter", Name("DCTDecode".into()));
                // Already compressed, deflating it again would only hide the filter
                lopdf::Stream::new(image_dictionary, loaded_image.data.clone())
                    .with_compression(false)
            }
        };
        let image_id = self.inner_document.add_object(image_stream);

        let image_reference = XObjectReference::new(self.images.len() + 1);
        self.images.insert(image_reference.clone(), image_id);
        log::debug!(
            "Inserted a {}x{} image as {:?}",
            loaded_image.width,
            loaded_image.height,
            image_reference.name()
        );

        image_reference
    }

    /// Draws a previously added image onto the page, stretched over the rectangle
    /// `[x, y, width, height]` whose origin is its bottom-left corner, in points.
    pub fn place_image(
        &mut self,
        page_index: usize,
        image_reference: &XObjectReference,
        rectangle: [f32; 4],
    ) -> Result<(), ContextError> {
        if !self.images.contains_key(image_reference) {
            return Err(ContextError::with_context(
                ErrorKind::Layout,
                format!("Failed to find the image {:?}", image_reference.name()),
            ));
        }

        let [x, y, width, height] = rectangle;
        let pdf_page = self.get_mut_page(page_index)?;
        // The image space is the unit square, the transformation matrix stretches and moves it
        pdf_page.operations.extend(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![image_reference.name().into()]),
            Operation::new("Q", vec![]),
        ]);
        if !pdf_page.images.contains(image_reference) {
            pdf_page.images.push(image_reference.clone());
        }

        Ok(())
    }

    /// Write the pages, the fonts and the document information to the underlying PDF document and finalize it.
    /// This is to be called exactly once, after all the content has been added.
    pub fn write_all(
        &mut self,
        instance_id: &str,
        creation_date: &OffsetDateTime,
    ) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        let timestamp = to_pdf_timestamp_format(creation_date);
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", Name("False".into())),
            ("CreationDate", text_string(&timestamp)),
            ("ModDate", text_string(&timestamp)),
            ("Title", text_string(&self.metadata.title)),
            ("Author", text_string(&self.metadata.author)),
            ("Subject", text_string(&self.metadata.subject)),
            ("Keywords", text_string(&self.metadata.keywords)),
            ("Creator", text_string(&self.metadata.creator)),
            (
                "Producer",
                text_string(concat!("pagecraft ", env!("CARGO_PKG_VERSION"))),
            ),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        // Each font used anywhere gets a single dictionary shared by all the pages
        let mut font_ids = BTreeMap::<std::string::String, lopdf::ObjectId>::new();
        for (font, font_name) in self.fonts.iter() {
            let mut font_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", Name("Font".into())),
                ("Subtype", Name("Type1".into())),
                ("BaseFont", Name(font.base_font_name().into())),
            ]);
            if !font.is_symbolic() {
                font_dictionary.set("Encoding", Name("WinAnsiEncoding".into()));
            }
            let font_id = self.inner_document.add_object(font_dictionary);
            font_ids.insert(font_name.clone(), font_id);
        }

        let pages_id = self.inner_document.new_object_id();
        let mut page_ids = Vec::<lopdf::Object>::new();

        for (index, page) in self.pages.iter().enumerate() {
            let mut resources = lopdf::Dictionary::new();
            if !page.fonts.is_empty() {
                let mut fonts_dictionary = lopdf::Dictionary::new();
                for font_name in &page.fonts {
                    let font_id = font_ids.get(font_name).ok_or_else(|| {
                        ContextError::with_context(
                            ErrorKind::Layout,
                            format!("Failed to find the font {:?} used in page {}", font_name, index + 1),
                        )
                    })?;
                    fonts_dictionary.set(font_name.clone(), Reference(*font_id));
                }
                resources.set("Font", Dictionary(fonts_dictionary));
            }
            if !page.images.is_empty() {
                let mut xobjects_dictionary = lopdf::Dictionary::new();
                for image_reference in &page.images {
                    let image_id = self.images.get(image_reference).ok_or_else(|| {
                        ContextError::with_context(
                            ErrorKind::Layout,
                            format!(
                                "Failed to find the image {:?} used in page {}",
                                image_reference.name(),
                                index + 1
                            ),
                        )
                    })?;
                    xobjects_dictionary.set(image_reference.name(), Reference(*image_id));
                }
                resources.set("XObject", Dictionary(xobjects_dictionary));
            }

            let content = lopdf::content::Content {
                operations: page.operations.clone(),
            };
            let encoded_content = content.encode().map_err(|error| {
                ContextError::with_error(
                    ErrorKind::Encoding,
                    format!("Failed to encode the content of page {}", index + 1),
                    &error,
                )
            })?;
            let content_id = self
                .inner_document
                .add_object(lopdf::Stream::new(lopdf::Dictionary::new(), encoded_content));

            let media_box: Vec<lopdf::Object> =
                vec![0.into(), 0.into(), page.width.into(), page.height.into()];
            let page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", Name("Page".into())),
                ("Parent", Reference(pages_id)),
                ("MediaBox", Array(media_box.clone())),
                ("CropBox", Array(media_box)),
                ("Rotate", Integer(0)),
                ("Resources", Dictionary(resources)),
                ("Contents", Reference(content_id)),
            ]);
            let page_id = self.inner_document.add_object(page_dictionary);
            page_ids.push(Reference(page_id));
        }

        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Pages".into())),
            ("Count", Integer(page_ids.len() as i64)),
            ("Kids", Array(page_ids)),
        ]);
        self.inner_document
            .objects
            .insert(pages_id, Dictionary(pages));

        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Catalog".into())),
            ("PageLayout", Name("OneColumn".into())),
            ("PageMode", Name("UseNone".into())),
            ("Pages", Reference(pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document
            .trailer
            .set("Root", Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                String(self.identifier.clone().into_bytes(), Literal),
                String(instance_id.as_bytes().to_vec(), Literal),
            ]),
        );

        Ok(())
    }

    /// Drops the unreferenced objects, renumbers the remaining ones and compresses the streams
    /// which allow it. Only meaningful after `write_all`.
    pub fn optimize(&mut self) {
        self.inner_document.prune_objects();
        self.inner_document.renumber_objects();
        self.inner_document.compress();
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Encoding,
                "Error while saving the PDF document to bytes",
                &error,
            )
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    /// The resource name of the font, registering it on first use.
    fn font_resource_name(&mut self, font: StandardFont) -> String {
        let next_font_name = format!("F{}", self.fonts.len() + 1);
        self.fonts.entry(font).or_insert(next_font_name).clone()
    }

    fn get_mut_page(&mut self, page_index: usize) -> Result<&mut PdfPage, ContextError> {
        self.pages.get_mut(page_index).ok_or_else(|| {
            ContextError::with_context(
                ErrorKind::Layout,
                format!("Failed to find the page with index {}", page_index),
            )
        })
    }
}

/// Encodes the text for a simple font with `WinAnsiEncoding`, after normalizing it in the NFC form.
/// Latin-1 characters keep their code, the typographic characters of the `0x80..=0x9F` range are
/// remapped, and anything else is replaced by a question mark.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.nfc()
        .map(|character| match character {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => character as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => {
                log::warn!(
                    "Unable to encode the character {:?} with WinAnsiEncoding, replacing it",
                    character
                );
                b'?'
            }
        })
        .collect()
}

/// Encodes a string for the document information. ASCII is written as it is, which PDFDocEncoding
/// agrees with, while anything else becomes UTF-16BE preceded by its byte order mark.
pub fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }

    let utf16_bytes = [0xFE, 0xFF]
        .into_iter()
        .chain(value.encode_utf16().flat_map(u16::to_be_bytes))
        .collect();
    Object::String(utf16_bytes, StringFormat::Hexadecimal)
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}
