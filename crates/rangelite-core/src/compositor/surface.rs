//! Off-screen RGBA raster surface with Porter-Duff compositing.

use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// How a drawn layer combines with what is already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    /// Layer over existing content.
    SourceOver,
    /// Layer only shows where existing content is transparent.
    DestinationOver,
}

/// Surface sized to an image's natural dimensions, initially fully transparent.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Draws `layer` at the origin. Pixels outside the surface are clipped.
    pub fn draw(&mut self, layer: &RgbaImage, op: CompositeOp) {
        let w = self.width().min(layer.width());
        let h = self.height().min(layer.height());
        for y in 0..h {
            for x in 0..w {
                let src = *layer.get_pixel(x, y);
                let dst = *self.pixels.get_pixel(x, y);
                let out = match op {
                    CompositeOp::SourceOver => over(src, dst),
                    CompositeOp::DestinationOver => over(dst, src),
                };
                self.pixels.put_pixel(x, y, out);
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }

    /// Flattens onto opaque black, as an alpha-less export does.
    pub fn flatten(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let p = self.pixels.get_pixel(x, y);
            let a = p[3] as u32;
            Rgb([
                ((p[0] as u32 * a + 127) / 255) as u8,
                ((p[1] as u32 * a + 127) / 255) as u8,
                ((p[2] as u32 * a + 127) / 255) as u8,
            ])
        })
    }
}

/// `top` over `base`, straight (non-premultiplied) alpha.
fn over(top: Rgba<u8>, base: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 255 || base[3] == 0 {
        return top;
    }
    if top[3] == 0 {
        return base;
    }

    let ta = top[3] as f32 / 255.0;
    let ba = base[3] as f32 / 255.0;
    let out_a = ta + ba * (1.0 - ta);
    let channel = |i: usize| {
        let t = top[i] as f32 / 255.0;
        let b = base[i] as f32 / 255.0;
        let c = (t * ta + b * ba * (1.0 - ta)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    #[test]
    fn source_over_replaces_with_opaque_layer() {
        let mut s = Surface::new(2, 1);
        s.draw(&RgbaImage::from_pixel(2, 1, BLUE), CompositeOp::SourceOver);
        s.draw(&RgbaImage::from_pixel(2, 1, RED), CompositeOp::SourceOver);
        assert_eq!(s.pixel(0, 0), RED);
    }

    #[test]
    fn destination_over_only_fills_transparent_pixels() {
        let mut s = Surface::new(2, 1);
        let mut half = RgbaImage::from_pixel(2, 1, CLEAR);
        half.put_pixel(0, 0, RED);
        s.draw(&half, CompositeOp::SourceOver);
        s.draw(&RgbaImage::from_pixel(2, 1, BLUE), CompositeOp::DestinationOver);
        assert_eq!(s.pixel(0, 0), RED);
        assert_eq!(s.pixel(1, 0), BLUE);
    }

    #[test]
    fn half_alpha_blends() {
        let mut s = Surface::new(1, 1);
        s.draw(&RgbaImage::from_pixel(1, 1, BLUE), CompositeOp::SourceOver);
        s.draw(
            &RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 128])),
            CompositeOp::SourceOver,
        );
        let p = s.pixel(0, 0);
        assert_eq!(p[3], 255);
        assert!((120..=136).contains(&p[0]), "{:?}", p);
        assert!((119..=135).contains(&p[2]), "{:?}", p);
    }

    #[test]
    fn larger_layer_is_clipped() {
        let mut s = Surface::new(1, 1);
        s.draw(&RgbaImage::from_pixel(3, 3, RED), CompositeOp::SourceOver);
        assert_eq!(s.into_rgba().dimensions(), (1, 1));
    }

    #[test]
    fn flatten_onto_black() {
        let mut s = Surface::new(2, 1);
        let mut layer = RgbaImage::from_pixel(2, 1, CLEAR);
        layer.put_pixel(0, 0, Rgba([200, 100, 50, 255]));
        s.draw(&layer, CompositeOp::SourceOver);
        let flat = s.flatten();
        assert_eq!(*flat.get_pixel(0, 0), Rgb([200, 100, 50]));
        assert_eq!(*flat.get_pixel(1, 0), Rgb([0, 0, 0]));
    }
}
