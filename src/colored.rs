// SPDX-License-Identifier: MPL-2.0

use image::{Rgba, RgbaImage};

/// Converts a normalized RGB color to an opaque 8-bit pixel.
pub fn pixel(color: [f32; 3]) -> Rgba<u8> {
    let [r, g, b] = color.map(|c| (u8::MAX as f32 * c.clamp(0.0, 1.0)).round() as u8);
    Rgba([r, g, b, u8::MAX])
}

/// Generate a background image from a color.
pub fn single(color: [f32; 3], width: u32, height: u32) -> RgbaImage {
    image::ImageBuffer::from_pixel(width, height, pixel(color))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_clamped_and_rounded() {
        assert_eq!(pixel([0.0, 0.5, 1.0]), Rgba([0, 128, 255, 255]));
        assert_eq!(pixel([-1.0, 2.0, 0.2]), Rgba([0, 255, 51, 255]));
    }

    #[test]
    fn single_fills_every_pixel() {
        let img = single([1.0, 0.0, 0.0], 3, 2);
        assert_eq!(img.dimensions(), (3, 2));
        assert!(img.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }
}
