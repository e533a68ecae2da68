use clap::Parser;
use std::path::PathBuf;

use pagecraft::{error::ContextError, recipe::Recipe, Document, ImageFormat};

/// Assembles a PDF document, either from a JSON recipe or, when none is given,
/// from a greeting and a single image.
#[derive(Parser, Debug)]
#[command(version, long_about = None)]
struct CliArguments {
    /// The JSON recipe describing the document.
    #[arg(short = 'r', long = "recipe", value_name = "json_file")]
    recipe_path: Option<PathBuf>,
    /// The image placed below the greeting when no recipe is given.
    #[arg(short = 'i', long = "image", value_name = "image_file", default_value = "test.png")]
    image_source: String,
    /// The format of the image, PNG or JPEG.
    #[arg(short = 'f', long = "format", value_name = "format", default_value = "PNG")]
    image_format: ImageFormat,
    /// The path of the output PDF file.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "file_path",
        default_value = "myDocument.pdf"
    )]
    output_file_path: PathBuf,
    /// Log every assembly step.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    let arguments = CliArguments::parse();
    env_logger::builder()
        .filter_level(if arguments.verbose {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        })
        .init();
    log::debug!("{:?}", arguments);

    let document = match &arguments.recipe_path {
        Some(recipe_path) => Recipe::from_path(recipe_path)?.assemble(),
        None => {
            let mut document = Document::create();
            document.add_text("Hello World!", 10.0, 10.0);
            document.add_image(
                arguments.image_source.clone(),
                arguments.image_format,
                10.0,
                20.0,
                50.0,
                50.0,
            );
            document
        }
    };

    document.save(&arguments.output_file_path)
}
