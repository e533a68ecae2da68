use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::configuration::DocumentConfiguration;
use crate::document::Document;
use crate::element::{ImageFormat, StandardFont};
use crate::error::{ContextError, ErrorKind};

/// One step of the assembly of a document, mirroring the methods of `Document`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    Text {
        content: String,
        x: f32,
        y: f32,
    },
    Image {
        source: String,
        format: ImageFormat,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    AddPage,
    SetFont {
        font: StandardFont,
    },
    SetFontSize {
        size: f32,
    },
    SetTextColor {
        color: [f32; 3],
    },
}

/// A document described as its configuration followed by the operations which build it.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub configuration: DocumentConfiguration,
    pub operations: Vec<Operation>,
    /// The directory relative image paths are resolved against, set when the recipe is read from a file.
    #[serde(skip)]
    pub base_directory: Option<PathBuf>,
}

impl Recipe {
    pub fn from_path(recipe_path: &Path) -> Result<Recipe, ContextError> {
        let recipe_content = std::fs::read_to_string(recipe_path).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Configuration,
                format!("Unable to read the recipe {:?}", recipe_path),
                &error,
            )
        })?;
        let mut recipe: Recipe = serde_json::from_str(&recipe_content).map_err(|error| {
            ContextError::with_error(
                ErrorKind::Configuration,
                format!("Unable to parse the recipe {:?}", recipe_path),
                &error,
            )
        })?;
        recipe.base_directory = recipe_path.parent().map(Path::to_path_buf);

        Ok(recipe)
    }

    /// Replays the operations, in order, onto a new document.
    pub fn assemble(&self) -> Document {
        let mut document = Document::with_configuration(self.configuration.clone());

        for operation in self.operations.iter() {
            match operation {
                Operation::Text { content, x, y } => document.add_text(content.clone(), *x, *y),
                Operation::Image {
                    source,
                    format,
                    x,
                    y,
                    width,
                    height,
                } => document.add_image(
                    self.resolve_source(source),
                    *format,
                    *x,
                    *y,
                    *width,
                    *height,
                ),
                Operation::AddPage => document.add_page(),
                Operation::SetFont { font } => document.set_font(*font),
                Operation::SetFontSize { size } => document.set_font_size(*size),
                Operation::SetTextColor { color } => document.set_text_color(*color),
            }
        }

        document
    }

    fn resolve_source(&self, source: &str) -> String {
        match &self.base_directory {
            Some(base_directory)
                if !source.starts_with("data:") && Path::new(source).is_relative() =>
            {
                base_directory.join(source).to_string_lossy().into_owned()
            }
            _ => source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_RECIPE: &str = r#"{
        "operations": [
            { "type": "text", "content": "Hello World!", "x": 10, "y": 10 },
            { "type": "image", "source": "test.png", "format": "PNG", "x": 10, "y": 20, "width": 50, "height": 50 }
        ]
    }"#;

    #[test]
    fn recipe_without_configuration_uses_the_defaults() {
        let recipe: Recipe = serde_json::from_str(REFERENCE_RECIPE).unwrap();

        assert_eq!(recipe.configuration, DocumentConfiguration::default());
        assert_eq!(recipe.operations.len(), 2);
    }

    #[test]
    fn relative_sources_are_resolved_against_the_base_directory() {
        let mut recipe: Recipe = serde_json::from_str(REFERENCE_RECIPE).unwrap();
        recipe.base_directory = Some(PathBuf::from("assets"));

        let document = recipe.assemble();
        let image_element = document.elements().nth(1).unwrap().as_image().unwrap();
        assert_eq!(Path::new(&image_element.source), Path::new("assets").join("test.png"));
    }

    #[test]
    fn unknown_operations_are_rejected() {
        let error = serde_json::from_str::<Recipe>(r#"{ "operations": [{ "type": "rotate" }] }"#)
            .unwrap_err();
        assert!(error.to_string().contains("rotate"));
    }
}
