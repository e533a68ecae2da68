use rand::{distributions::Alphanumeric, Rng as _};
use std::collections::HashMap;
use std::path::Path;
use time::OffsetDateTime;

use crate::configuration::DocumentConfiguration;
use crate::element::{Element, ImageElement, ImageFormat, StandardFont, TextElement};
use crate::error::{ContextError, ErrorKind};
use crate::image_source::LoadedImage;
use crate::pdf::{PdfDocument, TextPlacement, XObjectReference};

/// A page of the document and the elements placed onto it, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    elements: Vec<Element>,
}

impl Page {
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

/// The state captured by every text element at the moment it is added.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TextState {
    font: StandardFont,
    font_size: f32,
    color: [f32; 3],
}

/// An in-memory, page-based document. Elements are only ever appended, and they are rendered in
/// the same order in which they were added. The document is turned into a PDF file by `save`,
/// which leaves it untouched so that it can be saved again.
#[derive(Debug, Clone)]
pub struct Document {
    configuration: DocumentConfiguration,
    pages: Vec<Page>,
    text_state: TextState,
    identifier: String,
    instance_id: String,
    creation_date: OffsetDateTime,
}

impl Document {
    /// Creates an empty document with a single blank A4 portrait page, measured in millimeters.
    pub fn create() -> Self {
        Self::with_configuration(DocumentConfiguration::default())
    }

    pub fn with_configuration(configuration: DocumentConfiguration) -> Self {
        let identifier = configuration
            .identifier
            .clone()
            .unwrap_or_else(random_identifier);
        let text_state = TextState {
            font: configuration.font,
            font_size: configuration.font_size,
            color: configuration.text_color,
        };
        log::debug!("Created the document {:?}", identifier);

        Document {
            configuration,
            pages: vec![Page::default()],
            text_state,
            identifier,
            instance_id: random_identifier(),
            creation_date: OffsetDateTime::now_utc(),
        }
    }

    /// Appends a run of text whose baseline starts at `(x, y)`, in document units from the top-left
    /// corner of the current page. Line breaks in the content start new lines below the first one.
    /// No bounds checking is done, text placed outside of the page is simply not visible.
    pub fn add_text<S: Into<String>>(&mut self, content: S, x: f32, y: f32) {
        let text_element = TextElement {
            content: content.into(),
            x,
            y,
            font: self.text_state.font,
            font_size: self.text_state.font_size,
            color: self.text_state.color,
        };
        log::debug!("Adding {:?}", text_element);
        self.push_element(Element::Text(text_element));
    }

    /// Appends an image whose top-left corner is at `(x, y)`, scaled to `width` by `height`, all in document units.
    /// The source is not accessed until the document is saved.
    pub fn add_image<S: Into<String>>(
        &mut self,
        source: S,
        format: ImageFormat,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) {
        let image_element = ImageElement {
            source: source.into(),
            format,
            x,
            y,
            width,
            height,
        };
        log::debug!("Adding {:?}", image_element);
        self.push_element(Element::Image(image_element));
    }

    /// Starts a new page, the elements added from now on are placed onto it.
    pub fn add_page(&mut self) {
        self.pages.push(Page::default());
        log::debug!("Started page {}", self.pages.len());
    }

    pub fn set_font(&mut self, font: StandardFont) {
        self.text_state.font = font;
    }

    /// Sets the font size in points used by the text added from now on.
    pub fn set_font_size(&mut self, font_size: f32) {
        self.text_state.font_size = font_size;
    }

    /// Sets the RGB color, each component in `0.0..=1.0`, used by the text added from now on.
    pub fn set_text_color(&mut self, color: [f32; 3]) {
        self.text_state.color = color;
    }

    /// All the elements of the document, page after page, in the order they were added.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.pages.iter().flat_map(|page| page.elements.iter())
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn configuration(&self) -> &DocumentConfiguration {
        &self.configuration
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Renders the document into a finalized `PdfDocument`. The image sources are read at this point,
    /// and each distinct source is embedded only once however many times it is placed.
    /// Elements with a NaN or infinite position or size are left out, with a warning.
    pub fn to_pdf_document(&self) -> Result<PdfDocument, ContextError> {
        let mut pdf_document = PdfDocument::new(self.identifier.clone());
        pdf_document.set_metadata(&self.configuration.metadata);

        let unit = self.configuration.unit;
        let (page_width, page_height) = self.configuration.page_size_in_points();
        let mut embedded_images = HashMap::<(&str, ImageFormat), XObjectReference>::new();

        for page in self.pages.iter() {
            let page_index = pdf_document.add_page(page_width, page_height);

            for element in page.elements.iter() {
                match element {
                    Element::Text(text_element) => {
                        // The PDF origin is the bottom-left corner of the page
                        let origin = [
                            unit.to_points(text_element.x),
                            page_height - unit.to_points(text_element.y),
                        ];
                        let leading =
                            text_element.font_size * self.configuration.line_height_factor;
                        let numbers = [origin[0], origin[1], text_element.font_size, leading];
                        if !all_finite(numbers.iter().chain(text_element.color.iter())) {
                            log::warn!("Skipping {:?}, it has a non-finite number", text_element);
                            continue;
                        }

                        let lines: Vec<&str> = text_element
                            .content
                            .split('\n')
                            .map(|line| line.strip_suffix('\r').unwrap_or(line))
                            .collect();
                        pdf_document.write_text(
                            page_index,
                            &TextPlacement {
                                font: text_element.font,
                                font_size: text_element.font_size,
                                color: text_element.color,
                                origin,
                                leading,
                                lines: &lines,
                            },
                        )?;
                    }
                    Element::Image(image_element) => {
                        let width = unit.to_points(image_element.width);
                        let height = unit.to_points(image_element.height);
                        let rectangle = [
                            unit.to_points(image_element.x),
                            page_height - unit.to_points(image_element.y) - height,
                            width,
                            height,
                        ];
                        if !all_finite(rectangle.iter()) {
                            log::warn!("Skipping {:?}, it has a non-finite number", image_element);
                            continue;
                        }

                        let source_key = (image_element.source.as_str(), image_element.format);
                        let image_reference = match embedded_images.get(&source_key) {
                            Some(image_reference) => image_reference.clone(),
                            None => {
                                let loaded_image =
                                    LoadedImage::resolve(&image_element.source, image_element.format)?;
                                let image_reference = pdf_document.add_image(&loaded_image);
                                embedded_images.insert(source_key, image_reference.clone());
                                image_reference
                            }
                        };
                        pdf_document.place_image(page_index, &image_reference, rectangle)?;
                    }
                }
            }
        }

        pdf_document.write_all(&self.instance_id, &self.creation_date)?;
        if self.configuration.compress {
            pdf_document.optimize();
        }

        Ok(pdf_document)
    }

    /// Renders the document and returns the bytes of the PDF file.
    pub fn save_to_bytes(&self) -> Result<Vec<u8>, ContextError> {
        self.to_pdf_document()?.save_to_bytes()
    }

    /// Renders the document and writes it to the given path, replacing any existing file.
    /// The file is only written once the whole document has been rendered, so a failure
    /// (such as a missing image) leaves the filesystem as it was.
    pub fn save<P: AsRef<Path>>(&self, output_path: P) -> Result<(), ContextError> {
        let output_path = output_path.as_ref();
        let pdf_document_bytes = self.save_to_bytes()?;
        std::fs::write(output_path, &pdf_document_bytes).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Io,
                format!("Failed to write the PDF document to {:?}", output_path),
                &error,
            )
        })?;
        log::info!(
            "Saved {} pages ({} bytes) to {:?}",
            self.pages.len(),
            pdf_document_bytes.len(),
            output_path
        );

        Ok(())
    }

    fn push_element(&mut self, element: Element) {
        // There is always at least one page, `create` starts with one and pages are never removed
        if let Some(current_page) = self.pages.last_mut() {
            current_page.elements.push(element);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::create()
    }
}

/// NaN and infinities have no representation in a content stream, unlike merely off-page positions.
fn all_finite<'a>(mut numbers: impl Iterator<Item = &'a f32>) -> bool {
    numbers.all(|number| number.is_finite())
}

/// A 32 characters long alphanumeric identifier, the length the PDF `ID` entries are expected to have.
fn random_identifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
