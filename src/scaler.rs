// SPDX-License-Identifier: MPL-2.0

//! Background scaling methods such as fit, stretch, and zoom.

use cosmic_livewall_config::{Appearance, ScalingMode};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

/// Where a scaled source lands on the canvas.
///
/// Offsets are relative to the canvas origin and are negative on an axis
/// where the scaled source overflows the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f64,
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

impl Placement {
    fn centered(scale: f64, source: (u32, u32), canvas: (u32, u32)) -> Self {
        let width = f64::from(source.0) * scale;
        let height = f64::from(source.1) * scale;
        Self {
            scale,
            width,
            height,
            x: (f64::from(canvas.0) - width) / 2.0,
            y: (f64::from(canvas.1) - height) / 2.0,
        }
    }
}

/// Scale-to-fill: the source covers the whole canvas and the overflowing axis
/// is cropped evenly on both sides.
#[must_use]
pub fn cover(source: (u32, u32), canvas: (u32, u32)) -> Placement {
    let ratio = (f64::from(canvas.0) / f64::from(source.0.max(1)))
        .max(f64::from(canvas.1) / f64::from(source.1.max(1)));
    Placement::centered(ratio, source, canvas)
}

/// Scale-to-fit: the whole source is visible and the canvas is letterboxed.
#[must_use]
pub fn contain(source: (u32, u32), canvas: (u32, u32)) -> Placement {
    let ratio = (f64::from(canvas.0) / f64::from(source.0.max(1)))
        .min(f64::from(canvas.1) / f64::from(source.1.max(1)));
    Placement::centered(ratio, source, canvas)
}

/// Draws `img` onto a canvas of the given size cleared to the background
/// color, using the configured scaling mode and filter.
pub fn render(img: &DynamicImage, width: u32, height: u32, appearance: &Appearance) -> RgbaImage {
    let mut canvas = crate::colored::single(appearance.background, width, height);
    let filter: FilterType = appearance.filter_method.into();
    let source = (img.width(), img.height());

    match appearance.scaling_mode {
        ScalingMode::Zoom => place(&mut canvas, img, cover(source, (width, height)), filter),
        ScalingMode::Fit => place(&mut canvas, img, contain(source, (width, height)), filter),
        ScalingMode::Stretch => {
            let stretched = image::imageops::resize(img, width, height, filter);
            image::imageops::replace(&mut canvas, &stretched, 0, 0);
        }
    }

    canvas
}

/// Draws the part of `img` that lands on the canvas.
///
/// Only the visible window of the source is resized, so the intermediate
/// image is never larger than the canvas whatever the scale.
fn place(canvas: &mut RgbaImage, img: &DynamicImage, placement: Placement, filter: FilterType) {
    let (canvas_width, canvas_height) = canvas.dimensions();

    let Some((src_x, dst_x, src_width, dst_width)) = visible_span(
        placement.x,
        placement.width,
        placement.scale,
        img.width(),
        canvas_width,
    ) else {
        return;
    };

    let Some((src_y, dst_y, src_height, dst_height)) = visible_span(
        placement.y,
        placement.height,
        placement.scale,
        img.height(),
        canvas_height,
    ) else {
        return;
    };

    let window = image::imageops::crop_imm(img, src_x, src_y, src_width, src_height).to_image();

    let resized = if (dst_width, dst_height) == window.dimensions() {
        window
    } else {
        image::imageops::resize(&window, dst_width, dst_height, filter)
    };

    image::imageops::overlay(canvas, &resized, i64::from(dst_x), i64::from(dst_y));
}

/// Intersects one axis of a placed source with the canvas.
///
/// Returns `(source offset, canvas offset, source length, canvas length)` in
/// whole pixels, or `None` if nothing is visible.
fn visible_span(
    offset: f64,
    length: f64,
    scale: f64,
    source_len: u32,
    canvas_len: u32,
) -> Option<(u32, u32, u32, u32)> {
    if source_len == 0 || canvas_len == 0 || scale <= 0.0 {
        return None;
    }

    let start = offset.max(0.0).round();
    let end = (offset + length).min(f64::from(canvas_len)).round();
    if end <= start {
        return None;
    }

    let src_start = ((start - offset) / scale).floor();
    let src_end = ((end - offset) / scale).ceil();

    let src_start = (src_start.max(0.0) as u32).min(source_len - 1);
    let src_end = (src_end.max(0.0) as u32).clamp(src_start + 1, source_len);

    Some((
        src_start,
        start as u32,
        src_end - src_start,
        (end - start) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmic_livewall_config::FilterMethod;
    use image::Rgba;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn cover_landscape_source_on_portrait_canvas() {
        let p = cover((800, 600), (1080, 1920));
        assert_close(p.scale, 3.2);
        assert_close(p.width, 2560.0);
        assert_close(p.height, 1920.0);
        assert_close(p.x, -740.0);
        assert_close(p.y, 0.0);
    }

    #[test]
    fn cover_fills_height_and_crops_width_symmetrically() {
        let p = cover((1920, 1080), (1080, 1920));
        assert_close(p.height, 1920.0);
        assert_close(p.y, 0.0);
        assert!(p.width > 1080.0);
        let overflow_left = -p.x;
        let overflow_right = p.width + p.x - 1080.0;
        assert_close(overflow_left, overflow_right);
    }

    #[test]
    fn cover_portrait_source_on_landscape_canvas() {
        let p = cover((600, 800), (1920, 1080));
        assert_close(p.width, 1920.0);
        assert_close(p.x, 0.0);
        assert!(p.height > 1080.0);
        assert!(p.y < 0.0);
    }

    #[test]
    fn cover_never_leaves_a_gap() {
        let sources = [(1, 1), (800, 600), (600, 800), (1920, 1080), (7, 3000)];
        let canvases = [(1080, 1920), (1920, 1080), (500, 500), (3840, 2160)];
        for source in sources {
            for canvas in canvases {
                let p = cover(source, canvas);
                assert!(p.x <= 1e-9 && p.y <= 1e-9, "{source:?} on {canvas:?}");
                assert!(p.width + 2.0 * p.x >= f64::from(canvas.0) - 1e-6);
                assert!(p.height + 2.0 * p.y >= f64::from(canvas.1) - 1e-6);
                // one axis matches the canvas exactly
                let fills_x = (p.width - f64::from(canvas.0)).abs() < 1e-6;
                let fills_y = (p.height - f64::from(canvas.1)).abs() < 1e-6;
                assert!(fills_x || fills_y, "{source:?} on {canvas:?}");
            }
        }
    }

    #[test]
    fn contain_letterboxes() {
        let p = contain((1920, 1080), (1080, 1920));
        assert_close(p.width, 1080.0);
        assert_close(p.x, 0.0);
        assert!(p.y > 0.0);
    }

    #[test]
    fn render_clears_to_background_before_drawing() {
        let red = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255])));
        let appearance = Appearance::default()
            .scaling_mode(ScalingMode::Fit)
            .filter_method(FilterMethod::Nearest)
            .background([0.0, 0.0, 1.0]);

        let canvas = render(&red, 4, 4, &appearance);
        assert_eq!(canvas.dimensions(), (4, 4));
        // letterbox bands above and below the 4x2 source
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
        assert_eq!(*canvas.get_pixel(3, 3), Rgba([0, 0, 255, 255]));
        assert_eq!(*canvas.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn render_zoom_covers_the_canvas() {
        let mut source = RgbaImage::from_pixel(4, 2, Rgba([0, 255, 0, 255]));
        // mark the left column, which must be cropped away on a square canvas
        for y in 0..2 {
            source.put_pixel(0, y, Rgba([255, 255, 255, 255]));
        }
        let appearance = Appearance::default().filter_method(FilterMethod::Nearest);

        let canvas = render(&DynamicImage::ImageRgba8(source), 2, 2, &appearance);
        assert!(canvas.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn extreme_aspect_ratio_only_resizes_the_visible_window() {
        // 1x400: red top half, blue bottom half; scale 2000 on a square canvas
        let mut source = RgbaImage::from_pixel(1, 400, Rgba([255, 0, 0, 255]));
        for y in 200..400 {
            source.put_pixel(0, y, Rgba([0, 0, 255, 255]));
        }
        let appearance = Appearance::default().filter_method(FilterMethod::Nearest);

        let p = cover((1, 400), (2000, 2000));
        assert_close(p.scale, 2000.0);

        let canvas = render(&DynamicImage::ImageRgba8(source), 2000, 2000, &appearance);
        assert_eq!(canvas.dimensions(), (2000, 2000));
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(1999, 500), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(0, 1999), Rgba([0, 0, 255, 255]));
        assert_eq!(*canvas.get_pixel(1000, 1500), Rgba([0, 0, 255, 255]));
        assert!(
            canvas
                .pixels()
                .all(|p| *p == Rgba([255, 0, 0, 255]) || *p == Rgba([0, 0, 255, 255]))
        );
    }

    #[test]
    fn visible_span_is_bounded_by_the_canvas() {
        // 16x1024 source on a 4K canvas: 240x scale, only ~9 rows visible
        let p = cover((16, 1024), (3840, 2160));
        let (src_y, dst_y, src_h, dst_h) =
            visible_span(p.y, p.height, p.scale, 1024, 2160).unwrap();
        assert_eq!((dst_y, dst_h), (0, 2160));
        assert!(src_h <= 11, "{src_h} rows");
        assert!(src_y + src_h <= 1024);

        let (src_x, dst_x, src_w, dst_w) = visible_span(p.x, p.width, p.scale, 16, 3840).unwrap();
        assert_eq!((src_x, dst_x, src_w, dst_w), (0, 0, 16, 3840));
    }

    #[test]
    fn visible_span_of_a_letterboxed_axis_keeps_the_whole_source() {
        let p = contain((1920, 1080), (1080, 1920));
        let (src_y, dst_y, src_h, dst_h) =
            visible_span(p.y, p.height, p.scale, 1080, 1920).unwrap();
        assert_eq!((src_y, src_h), (0, 1080));
        assert_eq!(dst_y, 656);
        assert_eq!(dst_h, 608);
    }

    #[test]
    fn render_stretch_ignores_aspect_ratio() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([9, 9, 9, 255])));
        let appearance = Appearance::default()
            .scaling_mode(ScalingMode::Stretch)
            .filter_method(FilterMethod::Nearest);

        let canvas = render(&source, 5, 3, &appearance);
        assert!(canvas.pixels().all(|p| *p == Rgba([9, 9, 9, 255])));
    }
}
