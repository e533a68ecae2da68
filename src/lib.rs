//! Pagecraft assembles PDF documents out of text and images placed at given coordinates.
//!
//! The entry point is the `Document` struct: it is created blank, receives its elements through
//! `add_text` and `add_image` (plus a few text state and pagination helpers), and is finally written
//! to disk with `save`. The elements are only a description of the content, nothing is read
//! or encoded before the document is saved.
//!
//! ```no_run
//! use pagecraft::{Document, ImageFormat};
//!
//! let mut document = Document::create();
//! document.add_text("Hello World!", 10.0, 10.0);
//! document.add_image("test.png", ImageFormat::Png, 10.0, 20.0, 50.0, 50.0);
//! document.save("myDocument.pdf")?;
//! # Ok::<(), pagecraft::error::ContextError>(())
//! ```

/// The module where the `Document` interface is presented.
///
/// # Introduction
///
/// A `Document` is an ordered list of pages, each one an ordered list of elements. Coordinates and
/// sizes are expressed in the unit of its `DocumentConfiguration` (millimeters by default), with
/// the origin in the top-left corner of the page. The conversion into a PDF happens in `to_pdf_document`,
/// which `save` and `save_to_bytes` rely upon.
pub mod document;

/// The content types a document is made of: text runs, images and their formats, and the standard fonts.
pub mod element;

/// This module contains the `ContextError` type which is the error type used throughout this library.
///
/// Every error carries an `ErrorKind`, a human readable context, and the message of the
/// error it was caused by, if any. It implements `std::fmt::Display` so it can be printed as is.
pub mod error;

/// The page geometry, unit system, initial text state and metadata of a document, loadable from JSON.
pub mod configuration;

/// Reading image sources, either files or `data:` URIs, and decoding them into embeddable images.
pub mod image_source;

/// The module where the `PdfDocument` interface for writing PDF documents is presented.
///
/// `PdfDocument` wraps a `lopdf::Document` and exposes the few capabilities the rest of the crate
/// needs: adding pages, writing text with the standard fonts, embedding and placing images, and
/// serializing the result. It works exclusively in PDF points with the origin in the bottom-left
/// corner of the page.
pub mod pdf;

/// JSON descriptions of documents, replayed onto a `Document` operation by operation.
pub mod recipe;

pub use configuration::DocumentConfiguration;
pub use document::Document;
pub use element::{Element, ImageFormat, StandardFont};
