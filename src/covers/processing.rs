//! Image inspection for cover candidates: decode dimensions and reject
//! placeholder artwork by size, aspect ratio, and dominant-color heuristics.

use image::GenericImageView;

/// Minimum usable cover size; anything smaller is a thumbnail or a stub.
const MIN_WIDTH: u32 = 120;
const MIN_HEIGHT: u32 = 160;
/// High-resolution threshold per the cover pipeline contract.
pub const HIGH_RES_WIDTH: u32 = 800;
pub const HIGH_RES_HEIGHT: u32 = 1200;
/// Book covers are portrait; ratios outside this band look like banners or
/// provider placeholders.
const MIN_ASPECT: f64 = 0.4;
const MAX_ASPECT: f64 = 1.05;
/// Fraction of near-white (or single dominant color) pixels that flags a
/// placeholder.
const DOMINANT_FRACTION: f64 = 0.92;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedImage {
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    pub fn is_high_resolution(&self) -> bool {
        self.width >= HIGH_RES_WIDTH && self.height >= HIGH_RES_HEIGHT
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageVerdict {
    Accepted(ProcessedImage),
    /// Decodable but rejected; the string names the tripped heuristic.
    Placeholder(String),
    Undecodable,
}

/// Decode and judge a candidate cover.
pub fn inspect(bytes: &[u8]) -> ImageVerdict {
    let image = match image::load_from_memory(bytes) {
        Ok(image) => image,
        Err(_) => return ImageVerdict::Undecodable,
    };
    let (width, height) = image.dimensions();
    if width < MIN_WIDTH || height < MIN_HEIGHT {
        return ImageVerdict::Placeholder(format!("too small ({width}x{height})"));
    }
    let aspect = width as f64 / height as f64;
    if !(MIN_ASPECT..=MAX_ASPECT).contains(&aspect) {
        return ImageVerdict::Placeholder(format!("aspect ratio {aspect:.2}"));
    }
    let dominant = dominant_color_fraction(&image);
    if dominant >= DOMINANT_FRACTION {
        return ImageVerdict::Placeholder(format!(
            "dominant color covers {:.0}% of pixels",
            dominant * 100.0
        ));
    }
    ImageVerdict::Accepted(ProcessedImage { width, height })
}

/// Share of sampled pixels belonging to the most common coarse color bucket.
/// Real covers have art and typography; placeholders are one flat field.
fn dominant_color_fraction(image: &image::DynamicImage) -> f64 {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let step_x = (width / 32).max(1);
    let step_y = (height / 32).max(1);

    let mut counts: std::collections::HashMap<(u8, u8, u8), u32> =
        std::collections::HashMap::new();
    let mut total = 0u32;
    for y in (0..height).step_by(step_y as usize) {
        for x in (0..width).step_by(step_x as usize) {
            let pixel = rgb.get_pixel(x, y);
            // 32-level buckets per channel
            let bucket = (pixel[0] >> 3, pixel[1] >> 3, pixel[2] >> 3);
            *counts.entry(bucket).or_insert(0) += 1;
            total += 1;
        }
    }
    let max = counts.values().copied().max().unwrap_or(0);
    if total == 0 {
        return 1.0;
    }
    max as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png_bytes(image: ImageBuffer<Rgb<u8>, Vec<u8>>) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn flat_white(width: u32, height: u32) -> Vec<u8> {
        png_bytes(ImageBuffer::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        png_bytes(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn rejects_tiny_images() {
        assert!(matches!(
            inspect(&flat_white(60, 80)),
            ImageVerdict::Placeholder(reason) if reason.contains("too small")
        ));
    }

    #[test]
    fn rejects_flat_white_placeholder() {
        assert!(matches!(
            inspect(&flat_white(400, 600)),
            ImageVerdict::Placeholder(reason) if reason.contains("dominant color")
        ));
    }

    #[test]
    fn rejects_landscape_banners() {
        assert!(matches!(
            inspect(&gradient(1200, 400)),
            ImageVerdict::Placeholder(reason) if reason.contains("aspect")
        ));
    }

    #[test]
    fn accepts_real_looking_cover() {
        match inspect(&gradient(800, 1200)) {
            ImageVerdict::Accepted(processed) => {
                assert_eq!(processed.width, 800);
                assert!(processed.is_high_resolution());
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn medium_cover_is_accepted_but_not_high_res() {
        match inspect(&gradient(400, 600)) {
            ImageVerdict::Accepted(processed) => assert!(!processed.is_high_resolution()),
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_undecodable() {
        assert_eq!(inspect(b"not an image"), ImageVerdict::Undecodable);
    }
}
