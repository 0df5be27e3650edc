//! Pixel transforms on decoded bitmaps
//!
//! Brightness and invert map onto `imageops`. Grayscale (channel average),
//! sepia, contrast, vintage and the 3x3 box blur use their own per-channel
//! formulas. Editor adjustments follow the CSS filter functions of the same
//! name so previews and exports agree.

use crate::services::Bitmap;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Offset applied by the brightness filter
const BRIGHTNESS_STEP: i32 = 50;
/// Strength of the contrast filter
const CONTRAST_STEP: f32 = 50.0;

fn to_image(bitmap: Bitmap) -> RgbaImage {
    let (w, h) = (bitmap.width, bitmap.height);
    RgbaImage::from_raw(w, h, bitmap.rgba).unwrap_or_else(|| RgbaImage::new(w, h))
}

fn from_image(image: RgbaImage) -> Bitmap {
    Bitmap {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    }
}

/// Largest size within `max_w` x `max_h` keeping aspect ratio; never upscales
pub fn fit_within(width: u32, height: u32, max_w: Option<u32>, max_h: Option<u32>) -> (u32, u32) {
    let ratio = width as f64 / height.max(1) as f64;
    let (mut w, mut h) = (width as f64, height as f64);
    if let Some(max_w) = max_w {
        if w > max_w as f64 {
            w = max_w as f64;
            h = w / ratio;
        }
    }
    if let Some(max_h) = max_h {
        if h > max_h as f64 {
            h = max_h as f64;
            w = h * ratio;
        }
    }
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

pub fn resize(bitmap: Bitmap, width: u32, height: u32) -> Bitmap {
    if bitmap.width == width && bitmap.height == height {
        return bitmap;
    }
    from_image(imageops::resize(
        &to_image(bitmap),
        width.max(1),
        height.max(1),
        FilterType::Lanczos3,
    ))
}

/// Rotate clockwise by `degrees`.
///
/// Quarter turns are exact and swap dimensions. Other angles rotate about the
/// centre into a canvas of the original size; uncovered pixels are
/// transparent.
pub fn rotate(bitmap: Bitmap, degrees: i32) -> Bitmap {
    let image = to_image(bitmap);
    let rotated = match degrees.rem_euclid(360) {
        0 => image,
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        270 => imageops::rotate270(&image),
        other => rotate_free(&image, other as f64),
    };
    from_image(rotated)
}

fn rotate_free(image: &RgbaImage, degrees: f64) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);

    RgbaImage::from_fn(w, h, |x, y| {
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        let sx = dx * cos + dy * sin + cx;
        let sy = -dx * sin + dy * cos + cy;
        if sx >= 0.0 && sy >= 0.0 && (sx as u32) < w && (sy as u32) < h {
            *image.get_pixel(sx as u32, sy as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

pub fn flip(bitmap: Bitmap, horizontal: bool) -> Bitmap {
    let image = to_image(bitmap);
    from_image(if horizontal {
        imageops::flip_horizontal(&image)
    } else {
        imageops::flip_vertical(&image)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Crop, clamped to the bitmap; an empty rectangle leaves it unchanged
pub fn crop(bitmap: Bitmap, rect: CropRect) -> Bitmap {
    let x = rect.x.min(bitmap.width);
    let y = rect.y.min(bitmap.height);
    let width = rect.width.min(bitmap.width - x);
    let height = rect.height.min(bitmap.height - y);
    if width == 0 || height == 0 {
        return bitmap;
    }
    let image = to_image(bitmap);
    from_image(imageops::crop_imm(&image, x, y, width, height).to_image())
}

/// Blend transparent pixels onto white and make the result opaque
pub fn flatten_onto_white(bitmap: &mut Bitmap) {
    for px in bitmap.rgba.chunks_exact_mut(4) {
        let alpha = px[3] as f32 / 255.0;
        for c in &mut px[..3] {
            *c = (*c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        }
        px[3] = 255;
    }
}

/// Batch filter presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Grayscale,
    Sepia,
    Invert,
    Brightness,
    Contrast,
    Vintage,
    Blur,
}

impl Filter {
    pub const ALL: [Filter; 7] = [
        Filter::Grayscale,
        Filter::Sepia,
        Filter::Invert,
        Filter::Brightness,
        Filter::Contrast,
        Filter::Vintage,
        Filter::Blur,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::Grayscale => "grayscale",
            Filter::Sepia => "sepia",
            Filter::Invert => "invert",
            Filter::Brightness => "brightness",
            Filter::Contrast => "contrast",
            Filter::Vintage => "vintage",
            Filter::Blur => "blur",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown filter: {}", s))
    }
}

fn clamp(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// Apply a filter preset in place; alpha is untouched
pub fn apply_filter(bitmap: &mut Bitmap, filter: Filter) {
    match filter {
        Filter::Blur => box_blur(bitmap),
        Filter::Brightness => {
            with_image_mut(bitmap, |image| imageops::colorops::brighten_in_place(image, BRIGHTNESS_STEP))
        }
        Filter::Invert => with_image_mut(bitmap, |image| imageops::invert(image)),
        Filter::Grayscale | Filter::Sepia | Filter::Contrast | Filter::Vintage => {
            map_channels(bitmap, filter)
        }
    }
}

/// Borrow the pixels as an image buffer without copying
fn with_image_mut<F>(bitmap: &mut Bitmap, f: F)
where
    F: FnOnce(&mut ImageBuffer<Rgba<u8>, &mut [u8]>),
{
    let (w, h) = (bitmap.width, bitmap.height);
    if let Some(mut image) = ImageBuffer::from_raw(w, h, bitmap.rgba.as_mut_slice()) {
        f(&mut image);
    }
}

fn map_channels(bitmap: &mut Bitmap, filter: Filter) {
    let contrast_factor =
        (259.0 * (CONTRAST_STEP + 255.0)) / (255.0 * (259.0 - CONTRAST_STEP));

    for px in bitmap.rgba.chunks_exact_mut(4) {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        let out = match filter {
            Filter::Grayscale => {
                let avg = (r + g + b) / 3.0;
                [avg, avg, avg]
            }
            Filter::Sepia => [
                r * 0.393 + g * 0.769 + b * 0.189,
                r * 0.349 + g * 0.686 + b * 0.168,
                r * 0.272 + g * 0.534 + b * 0.131,
            ],
            Filter::Contrast => [
                contrast_factor * (r - 128.0) + 128.0,
                contrast_factor * (g - 128.0) + 128.0,
                contrast_factor * (b - 128.0) + 128.0,
            ],
            Filter::Vintage => [
                r * 0.4 + g * 0.8 + b * 0.2,
                r * 0.35 + g * 0.7 + b * 0.15,
                r * 0.3 + g * 0.5 + b * 0.1,
            ],
            Filter::Brightness | Filter::Invert | Filter::Blur => [r, g, b],
        };
        px[0] = clamp(out[0]);
        px[1] = clamp(out[1]);
        px[2] = clamp(out[2]);
    }
}

/// 3x3 box blur of the colour channels; the one pixel border is kept
fn box_blur(bitmap: &mut Bitmap) {
    let (w, h) = (bitmap.width as usize, bitmap.height as usize);
    if w < 3 || h < 3 {
        return;
    }
    let source = bitmap.rgba.clone();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = (y * w + x) * 4;
            for c in 0..3 {
                let mut sum = 0u32;
                for sy in y - 1..=y + 1 {
                    for sx in x - 1..=x + 1 {
                        sum += source[(sy * w + sx) * 4 + c] as u32;
                    }
                }
                bitmap.rgba[idx + c] = (sum / 9) as u8;
            }
        }
    }
}

/// Slider values of the editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    /// -100..=100, percent offset
    pub brightness: i32,
    /// -100..=100, percent offset
    pub contrast: i32,
    /// 0..=200 percent
    pub saturation: u32,
    /// 0..=10 px
    pub blur: u32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 0,
            saturation: 100,
            blur: 0,
        }
    }
}

impl Adjustments {
    pub fn is_identity(&self) -> bool {
        *self == Adjustments::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(-100..=100).contains(&self.brightness) {
            return Err(format!("brightness {} outside -100..=100", self.brightness));
        }
        if !(-100..=100).contains(&self.contrast) {
            return Err(format!("contrast {} outside -100..=100", self.contrast));
        }
        if self.saturation > 200 {
            return Err(format!("saturation {} above 200", self.saturation));
        }
        if self.blur > 10 {
            return Err(format!("blur {} above 10", self.blur));
        }
        Ok(())
    }
}

/// Brightness, contrast and saturation per channel, then blur
pub fn adjust(bitmap: Bitmap, adjustments: &Adjustments) -> Bitmap {
    if adjustments.is_identity() {
        return bitmap;
    }
    let mut bitmap = bitmap;

    let brightness = (100 + adjustments.brightness) as f32 / 100.0;
    let contrast = (100 + adjustments.contrast) as f32 / 100.0;
    let s = adjustments.saturation as f32 / 100.0;

    for px in bitmap.rgba.chunks_exact_mut(4) {
        let mut rgb = [px[0] as f32, px[1] as f32, px[2] as f32];
        for v in rgb.iter_mut() {
            *v = ((*v * brightness) - 127.5) * contrast + 127.5;
        }
        let [r, g, b] = rgb;
        let out = [
            (0.213 + 0.787 * s) * r + (0.715 - 0.715 * s) * g + (0.072 - 0.072 * s) * b,
            (0.213 - 0.213 * s) * r + (0.715 + 0.285 * s) * g + (0.072 - 0.072 * s) * b,
            (0.213 - 0.213 * s) * r + (0.715 - 0.715 * s) * g + (0.072 + 0.928 * s) * b,
        ];
        px[0] = clamp(out[0].round());
        px[1] = clamp(out[1].round());
        px[2] = clamp(out[2].round());
    }

    if adjustments.blur > 0 {
        let image = to_image(bitmap);
        bitmap = from_image(imageops::blur(&image, adjustments.blur as f32));
    }
    bitmap
}

/// Everything the editor applies to one image, in application order:
/// rotate, flip, crop, filter, adjustments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditRecipe {
    /// Multiple of 90, clockwise
    pub rotation: i32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub crop: Option<CropRect>,
    pub filter: Option<Filter>,
    pub adjustments: Adjustments,
}

impl EditRecipe {
    pub fn validate(&self) -> Result<(), String> {
        if self.rotation % 90 != 0 {
            return Err(format!("editor rotation {} is not a multiple of 90", self.rotation));
        }
        self.adjustments.validate()
    }

    pub fn apply(&self, bitmap: Bitmap) -> Bitmap {
        let mut bitmap = rotate(bitmap, self.rotation);
        if self.flip_horizontal {
            bitmap = flip(bitmap, true);
        }
        if self.flip_vertical {
            bitmap = flip(bitmap, false);
        }
        if let Some(rect) = self.crop {
            bitmap = crop(bitmap, rect);
        }
        if let Some(filter) = self.filter {
            apply_filter(&mut bitmap, filter);
        }
        adjust(bitmap, &self.adjustments)
    }
}
