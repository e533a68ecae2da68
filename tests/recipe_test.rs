use std::io::Write as _;

use pagecraft::configuration::Unit;
use pagecraft::error::ErrorKind;
use pagecraft::recipe::{Operation, Recipe};
use pagecraft::{Document, ImageFormat, StandardFont};

#[test]
fn recipe_replays_into_the_same_elements_as_direct_calls() {
    let recipe: Recipe = serde_json::from_str(
        r#"{
            "configuration": { "unit": "pt", "fontSize": 12 },
            "operations": [
                { "type": "setFont", "font": "Times-Roman" },
                { "type": "text", "content": "Hello World!", "x": 10, "y": 10 },
                { "type": "addPage" },
                { "type": "setTextColor", "color": [0.5, 0.5, 0.5] },
                { "type": "setFontSize", "size": 8 },
                { "type": "image", "source": "test.png", "format": "png", "x": 10, "y": 20, "width": 50, "height": 50 },
                { "type": "text", "content": "caption", "x": 10, "y": 80 }
            ]
        }"#,
    )
    .unwrap();
    let replayed = recipe.assemble();

    let mut direct = Document::with_configuration(recipe.configuration.clone());
    direct.set_font(StandardFont::TimesRoman);
    direct.add_text("Hello World!", 10.0, 10.0);
    direct.add_page();
    direct.set_text_color([0.5, 0.5, 0.5]);
    direct.set_font_size(8.0);
    direct.add_image("test.png", ImageFormat::Png, 10.0, 20.0, 50.0, 50.0);
    direct.add_text("caption", 10.0, 80.0);

    assert_eq!(replayed.configuration().unit, Unit::Pt);
    assert_eq!(replayed.page_count(), 2);
    assert!(replayed.elements().eq(direct.elements()));
}

#[test]
fn recipe_file_resolves_images_next_to_it() {
    let directory = tempfile::tempdir().unwrap();
    image::RgbImage::from_pixel(6, 6, image::Rgb([0, 0, 0]))
        .save(directory.path().join("test.png"))
        .unwrap();
    let recipe_path = directory.path().join("recipe.json");
    let mut recipe_file = std::fs::File::create(&recipe_path).unwrap();
    recipe_file
        .write_all(
            br#"{ "operations": [
                { "type": "text", "content": "Hello World!", "x": 10, "y": 10 },
                { "type": "image", "source": "test.png", "format": "PNG", "x": 10, "y": 20, "width": 50, "height": 50 }
            ] }"#,
        )
        .unwrap();

    let recipe = Recipe::from_path(&recipe_path).unwrap();
    assert_eq!(
        recipe.operations[0],
        Operation::Text {
            content: "Hello World!".into(),
            x: 10.0,
            y: 10.0
        }
    );

    let output_path = directory.path().join("myDocument.pdf");
    recipe.assemble().save(&output_path).unwrap();
    assert!(std::fs::metadata(&output_path).unwrap().len() > 0);
}

#[test]
fn malformed_recipe_is_a_configuration_error() {
    let directory = tempfile::tempdir().unwrap();
    let recipe_path = directory.path().join("recipe.json");
    std::fs::write(&recipe_path, "{ \"operations\": [ { \"type\": \"text\" } ] }").unwrap();

    let error = Recipe::from_path(&recipe_path).unwrap_err();
    assert_eq!(error.kind, ErrorKind::Configuration);
    assert!(error.context.contains("recipe.json"));
}
