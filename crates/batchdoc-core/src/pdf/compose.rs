//! Build a PDF with one image per A4 page

use super::save;
use crate::error::CollaboratorError;
use crate::services::JpegPage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

/// A4 in points
pub const A4_WIDTH: f32 = 595.28;
pub const A4_HEIGHT: f32 = 841.89;

/// Size of an image scaled to fit the page, aspect ratio kept
pub fn fit_to_page(width: u32, height: u32, page_width: f32, page_height: f32) -> (f32, f32) {
    if width == 0 || height == 0 {
        return (0.0, 0.0);
    }
    let image_ratio = width as f32 / height as f32;
    let page_ratio = page_width / page_height;
    if image_ratio > page_ratio {
        (page_width, page_width / image_ratio)
    } else {
        (page_height * image_ratio, page_height)
    }
}

/// Each JPEG becomes a page, anchored at the top-left corner
pub fn images_to_pdf(images: &[JpegPage]) -> Result<Vec<u8>, CollaboratorError> {
    if images.is_empty() {
        return Err(CollaboratorError::UnsupportedStructure(
            "No images to convert".into(),
        ));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for image in images {
        let xobject = Stream::new(
            Dictionary::from_iter(vec![
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(image.width as i64)),
                ("Height", Object::Integer(image.height as i64)),
                ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
                ("Filter", Object::Name(b"DCTDecode".to_vec())),
            ]),
            image.jpeg.clone(),
        )
        .with_compression(false);
        let image_id = doc.add_object(xobject);

        let (w, h) = fit_to_page(image.width, image.height, A4_WIDTH, A4_HEIGHT);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(w),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(h),
                        Object::Integer(0),
                        Object::Real(A4_HEIGHT - h),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| CollaboratorError::UnsupportedStructure(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let resources = Dictionary::from_iter(vec![(
            "XObject",
            Object::Dictionary(Dictionary::from_iter(vec![(
                "Im0",
                Object::Reference(image_id),
            )])),
        )]);

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(A4_WIDTH),
                    Object::Real(A4_HEIGHT),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ]);
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(kids.len() as i64)),
        ("Kids", Object::Array(kids)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    save(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_jpeg(width: u32, height: u32) -> JpegPage {
        use image::codecs::jpeg::JpegEncoder;
        let pixels = vec![200u8; (width * height * 3) as usize];
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 80)
            .encode(&pixels, width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        JpegPage {
            jpeg,
            width,
            height,
        }
    }

    #[test]
    fn test_fit_wide_and_tall_images() {
        let (w, h) = fit_to_page(2000, 1000, A4_WIDTH, A4_HEIGHT);
        assert_eq!(w, A4_WIDTH);
        assert!((h - A4_WIDTH / 2.0).abs() < 0.01);

        let (w, h) = fit_to_page(1000, 4000, A4_WIDTH, A4_HEIGHT);
        assert_eq!(h, A4_HEIGHT);
        assert!((w - A4_HEIGHT / 4.0).abs() < 0.01);
    }

    #[test]
    fn test_one_page_per_image() {
        let pdf = images_to_pdf(&[tiny_jpeg(8, 8), tiny_jpeg(16, 4), tiny_jpeg(4, 16)]).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_no_images_fails() {
        assert!(images_to_pdf(&[]).is_err());
    }
}
