//! 通过crate公共API走一遍编码与解码路径（不涉及网络）。

use std::io::Cursor;
use waste_classify::image::encoder::FEATURE_LEN;
use waste_classify::image::FeatureEncoder;
use waste_classify::scoring::ResponseDecoder;
use waste_classify::{ClassifyError, Label};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([((x * 3 + y) % 256) as u8, (y % 256) as u8, ((x + y * 5) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[test]
fn any_decodable_image_yields_fixed_length_features() {
    for (w, h) in [(16, 16), (100, 60), (640, 480), (256, 256)] {
        let features = FeatureEncoder::encode(&png_bytes(w, h)).unwrap();
        assert_eq!(features.len(), FEATURE_LEN, "size {}x{}", w, h);
    }
}

#[test]
fn jpeg_input_also_supported() {
    let img = image::RgbImage::from_fn(80, 80, |x, _| image::Rgb([(x * 3) as u8, 90, 40]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .unwrap();

    let features = FeatureEncoder::encode(&buf.into_inner()).unwrap();
    assert_eq!(features.len(), FEATURE_LEN);
}

#[test]
fn tiny_image_fails_with_dimension_error() {
    let result = FeatureEncoder::encode(&png_bytes(4, 4));
    assert!(matches!(result, Err(ClassifyError::Dimension(_))));
}

#[test]
fn endpoint_response_variants_decode_consistently() {
    // 同一个预测在实际部署中出现过的四种返回形态
    let variants = [
        r#"{"result": [1]}"#,
        r#"{"result": [1.0]}"#,
        r#"{"result": ["1.0"]}"#,
        r#""{\"result\": [1]}""#,
    ];

    for variant in variants {
        let result = ResponseDecoder::decode_text(variant);
        assert_eq!(result.label, Label::Recyclable, "variant {}", variant);
        assert_eq!(result.raw_value, 1, "variant {}", variant);
    }
}

#[test]
fn decoder_never_panics_on_hostile_input() {
    let inputs: &[&[u8]] = &[
        b"",
        b"null",
        b"[]",
        b"\"\"",
        b"{\"result\": {}}",
        b"{\"result\": [null]}",
        b"{\"result\": [[1]]}",
        &[0xff, 0x00, 0x80],
    ];

    for input in inputs {
        let result = ResponseDecoder::decode(input);
        assert_eq!(result.label, Label::Error);
        assert!(result.detail.as_deref().is_some_and(|d| !d.is_empty()));
    }
}

#[test]
fn feature_vector_serializes_to_plain_array() {
    let features = FeatureEncoder::encode(&png_bytes(32, 32)).unwrap();
    let json = serde_json::to_value(&features).unwrap();
    assert_eq!(json.as_array().unwrap().len(), FEATURE_LEN);
}
