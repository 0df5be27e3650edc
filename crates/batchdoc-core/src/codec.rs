//! [`ImageCodec`] backed by the `image` crate

use crate::error::CollaboratorError;
use crate::imaging::{self, flatten_onto_white};
use crate::services::{Bitmap, ImageCodec, ImageFormat, JpegPage, ServiceResult};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Quality used when an edit or filter keeps the source format
pub const EDIT_QUALITY: u8 = 95;
/// Quality of pages placed into an image PDF
pub const PDF_PAGE_QUALITY: u8 = 80;

/// Map a 0.0..=1.0 quality onto the encoder's 1..=100
pub fn quality_percent(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> ServiceResult<Bitmap> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| CollaboratorError::Codec(format!("Failed to decode image: {}", e)))?
            .to_rgba8();
        Ok(Bitmap {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        })
    }

    fn encode(&self, bitmap: &Bitmap, format: ImageFormat, quality: u8) -> ServiceResult<Vec<u8>> {
        let codec_err = |e: image::ImageError| CollaboratorError::Codec(e.to_string());
        let mut out = Vec::new();

        match format {
            ImageFormat::Jpeg => {
                let mut flat = bitmap.clone();
                flatten_onto_white(&mut flat);
                let rgb: Vec<u8> = flat
                    .rgba
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
                    .write_image(&rgb, bitmap.width, bitmap.height, ExtendedColorType::Rgb8)
                    .map_err(codec_err)?;
            }
            ImageFormat::Png => PngEncoder::new(&mut out)
                .write_image(&bitmap.rgba, bitmap.width, bitmap.height, ExtendedColorType::Rgba8)
                .map_err(codec_err)?,
            ImageFormat::Webp => WebPEncoder::new_lossless(&mut out)
                .write_image(&bitmap.rgba, bitmap.width, bitmap.height, ExtendedColorType::Rgba8)
                .map_err(codec_err)?,
        }

        Ok(out)
    }
}

/// Decode, scale to fit the bounds and re-encode as JPEG
pub fn resize_to_jpeg(
    codec: &dyn ImageCodec,
    bytes: &[u8],
    max_width: Option<u32>,
    max_height: Option<u32>,
    quality: u8,
) -> ServiceResult<JpegPage> {
    let bitmap = codec.decode(bytes)?;
    let (w, h) = imaging::fit_within(bitmap.width, bitmap.height, max_width, max_height);
    let resized = imaging::resize(bitmap, w, h);
    let jpeg = codec.encode(&resized, ImageFormat::Jpeg, quality)?;
    Ok(JpegPage {
        jpeg,
        width: resized.width,
        height: resized.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn checker(width: u32, height: u32) -> Bitmap {
        let mut bitmap = Bitmap::solid(width, height, [0, 0, 0, 255]);
        for (i, px) in bitmap.rgba.chunks_exact_mut(4).enumerate() {
            if i % 2 == 0 {
                px[..3].copy_from_slice(&[250, 120, 10]);
            }
        }
        bitmap
    }

    #[test]
    fn test_png_is_lossless() {
        let codec = ImageCrateCodec;
        let bitmap = checker(5, 3);
        let png = codec.encode(&bitmap, ImageFormat::Png, 50).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(codec.decode(&png).unwrap(), bitmap);
    }

    #[test]
    fn test_webp_keeps_alpha() {
        let codec = ImageCrateCodec;
        let bitmap = Bitmap::solid(4, 4, [10, 20, 30, 0]);
        let webp = codec.encode(&bitmap, ImageFormat::Webp, 90).unwrap();
        assert_eq!(&webp[8..12], b"WEBP");
        assert_eq!(codec.decode(&webp).unwrap().pixel(0, 0).map(|p| p[3]), Some(0));
    }

    #[test]
    fn test_jpeg_flattens_onto_white() {
        let codec = ImageCrateCodec;
        let bitmap = Bitmap::solid(8, 8, [0, 0, 0, 0]);
        let jpeg = codec.encode(&bitmap, ImageFormat::Jpeg, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let [r, g, b, a] = codec.decode(&jpeg).unwrap().pixel(4, 4).unwrap();
        assert!(r > 240 && g > 240 && b > 240);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let err = ImageCrateCodec.decode(b"definitely not pixels").unwrap_err();
        assert!(matches!(err, CollaboratorError::Codec(_)));
    }

    #[test]
    fn test_resize_to_jpeg_fits_bounds() {
        let codec = ImageCrateCodec;
        let png = codec.encode(&checker(40, 20), ImageFormat::Png, 100).unwrap();
        let page = resize_to_jpeg(&codec, &png, Some(10), None, 80).unwrap();
        assert_eq!((page.width, page.height), (10, 5));
        assert_eq!(&page.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_quality_percent() {
        assert_eq!(quality_percent(0.92), 92);
        assert_eq!(quality_percent(0.0), 1);
        assert_eq!(quality_percent(3.0), 100);
    }
}
