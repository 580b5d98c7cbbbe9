// SPDX-License-Identifier: MPL-2.0

use crate::wallpaper::WallpaperLayer;
use image::RgbaImage;
use sctk::{
    reexports::client::protocol::wl_shm,
    shell::WaylandSurface,
    shm::slot::{Buffer, CreateBufferError, SlotPool},
};

/// Copies `image` into a new XRGB8888 buffer from `pool`.
pub fn canvas(pool: &mut SlotPool, image: &RgbaImage) -> Result<Buffer, CreateBufferError> {
    let (width, height) = image.dimensions();
    let stride = width as i32 * 4;

    let (buffer, canvas) =
        pool.create_buffer(width as i32, height as i32, stride, wl_shm::Format::Xrgb8888)?;

    xrgb888_canvas(canvas, image);

    Ok(buffer)
}

/// Attaches `buffer` to the layer surface and commits it.
pub fn layer_surface(layer: &WallpaperLayer, buffer: &Buffer, buffer_damage: (i32, i32)) {
    let wl_surface = layer.layer.wl_surface();

    // Damage the entire window
    wl_surface.damage_buffer(0, 0, buffer_damage.0, buffer_damage.1);

    // Attach and commit to present.
    if let Err(why) = buffer.attach_to(wl_surface) {
        tracing::error!(?why, "buffer attachment failed");
    }

    wl_surface.commit();
}

/// Draws the image on an 8-bit canvas.
pub fn xrgb888_canvas(canvas: &mut [u8], image: &RgbaImage) {
    for (dest, pixel) in canvas.chunks_exact_mut(4).zip(image.pixels()) {
        let [r, g, b, _] = pixel.0;

        let r = u32::from(r) << 16;
        let g = u32::from(g) << 8;
        let b = u32::from(b);

        dest.copy_from_slice(&(r | g | b).to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn packs_pixels_little_endian_xrgb() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([0x11, 0x22, 0x33, 0xff]));
        image.put_pixel(1, 0, Rgba([0xff, 0x00, 0x80, 0x00]));

        let mut canvas = [0u8; 8];
        xrgb888_canvas(&mut canvas, &image);

        assert_eq!(canvas, [0x33, 0x22, 0x11, 0x00, 0x80, 0x00, 0xff, 0x00]);
    }
}
