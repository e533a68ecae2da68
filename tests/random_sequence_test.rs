use rand::Rng as _;
use std::ops::Range;

use pagecraft::{Document, Element, ImageFormat};

struct RandomSequenceConfiguration {
    sequences_to_generate: u32,
    maximum_number_of_elements: usize,
    maximum_string_length: usize,
    element_position_range: Range<f32>,
}

enum Call {
    Text(String, f32, f32),
    Image(String, ImageFormat, [f32; 4]),
}

fn random_call(rng: &mut rand::rngs::ThreadRng, configuration: &RandomSequenceConfiguration) -> Call {
    let x = rng.gen_range(configuration.element_position_range.clone());
    let y = rng.gen_range(configuration.element_position_range.clone());
    if rng.gen_bool(0.6) {
        let length = rng.gen_range(1..=configuration.maximum_string_length);
        Call::Text(rand_utf8::rand_utf8(rng, length).to_string(), x, y)
    } else {
        let format = if rng.gen_bool(0.5) {
            ImageFormat::Png
        } else {
            ImageFormat::Jpeg
        };
        let size = [x, y, rng.gen_range(0.0..300.0), rng.gen_range(0.0..300.0)];
        Call::Image(format!("image-{}.bin", rng.gen_range(0..10)), format, size)
    }
}

#[test]
fn random_call_sequences_are_recorded_in_order() {
    let configuration = RandomSequenceConfiguration {
        sequences_to_generate: 30,
        maximum_number_of_elements: 120,
        maximum_string_length: 80,
        element_position_range: -50.0..600.0,
    };
    let mut rng = rand::thread_rng();

    for _ in 0..configuration.sequences_to_generate {
        let calls: Vec<Call> = (0..rng.gen_range(1..configuration.maximum_number_of_elements))
            .map(|_| random_call(&mut rng, &configuration))
            .collect();

        let mut document = Document::create();
        for (index, call) in calls.iter().enumerate() {
            match call {
                Call::Text(content, x, y) => document.add_text(content.clone(), *x, *y),
                Call::Image(source, format, [x, y, width, height]) => {
                    document.add_image(source.clone(), *format, *x, *y, *width, *height)
                }
            }
            assert_eq!(document.elements().count(), index + 1);
        }

        for (element, call) in document.elements().zip(calls.iter()) {
            match (element, call) {
                (Element::Text(text_element), Call::Text(content, x, y)) => {
                    assert_eq!(&text_element.content, content);
                    assert_eq!((text_element.x, text_element.y), (*x, *y));
                }
                (Element::Image(image_element), Call::Image(source, format, rectangle)) => {
                    assert_eq!(&image_element.source, source);
                    assert_eq!(image_element.format, *format);
                    assert_eq!(
                        [
                            image_element.x,
                            image_element.y,
                            image_element.width,
                            image_element.height
                        ],
                        *rectangle
                    );
                }
                (element, _) => panic!("{element:?} was recorded out of order"),
            }
        }
    }
}

#[test]
fn random_text_always_renders() {
    let mut rng = rand::thread_rng();
    let mut document = Document::create();
    for _ in 0..50 {
        let length = rng.gen_range(1..=40);
        document.add_text(
            rand_utf8::rand_utf8(&mut rng, length).to_string(),
            rng.gen_range(0.0..210.0),
            rng.gen_range(0.0..297.0),
        );
    }

    let pdf_bytes = document.save_to_bytes().unwrap();
    let pdf_document = lopdf::Document::load_mem(&pdf_bytes).unwrap();
    assert_eq!(pdf_document.get_pages().len(), 1);
}
