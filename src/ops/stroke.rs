//! Freehand stroke rasterization — round-capped capsule segments for the
//! brush and eraser, with hardness-controlled edge feathering.

use egui::Pos2;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// How a stroke segment composites onto the raster.
#[derive(Clone, Copy, Debug)]
pub enum StrokeMode {
    /// Normal painting: blend the stroke color over the surface.
    Paint(Rgba<u8>),
    /// Destination-out erasing.  The surface is opaque by invariant, so
    /// subtracted coverage is immediately backfilled with the background
    /// color — erasing blends toward background, it never paints black.
    Erase(Rgba<u8>),
}

/// Distance from (px, py) to the segment a→b.
#[inline]
fn dist_to_segment(px: f32, py: f32, a: Pos2, b: Pos2) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let cx = a.x + t * dx;
    let cy = a.y + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// 1.0 at `x <= edge_in`, 0.0 at `x >= edge_out`, smooth in between.
#[inline]
pub fn smoothstep(edge_out: f32, edge_in: f32, x: f32) -> f32 {
    if edge_out <= edge_in {
        return if x <= edge_in { 1.0 } else { 0.0 };
    }
    let t = ((edge_out - x) / (edge_out - edge_in)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Feather band width beyond the nominal stroke radius for a given hardness
/// (both in [0,1]): zero at hardness 1, growing to 0.8 × the full stroke
/// width at hardness 0.
#[inline]
pub fn feather_radius(width: f32, hardness: f32) -> f32 {
    (1.0 - hardness.clamp(0.0, 1.0)) * 0.8 * width
}

/// Effective stroke opacity after the hardness adjustment.  Soft strokes
/// spread their ink over the feather band, so their body opacity is reduced —
/// with a floor that keeps even the softest stroke visible.
#[inline]
pub fn effective_opacity(opacity: f32, hardness: f32) -> f32 {
    let h = hardness.clamp(0.0, 1.0);
    if h >= 1.0 {
        opacity
    } else if h <= 0.0 {
        (opacity * 0.7).max(0.3)
    } else {
        (opacity * (h + 0.3)).max(0.5).min(1.0)
    }
}

/// Rasterize one round-capped stroke segment from `a` to `b`.
///
/// `width` is the full stroke width in canvas pixels; `hardness` and
/// `opacity` are in [0,1].  A zero-length segment paints a single round dot,
/// which is how stroke begin marks its first point.
pub fn draw_segment(
    img: &mut RgbaImage,
    a: Pos2,
    b: Pos2,
    width: f32,
    hardness: f32,
    opacity: f32,
    mode: StrokeMode,
) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || width <= 0.0 {
        return;
    }

    let radius = width * 0.5;
    let feather = feather_radius(width, hardness);
    let alpha = effective_opacity(opacity, hardness);
    if alpha <= 0.0 {
        return;
    }

    // Half-pixel pad on both edges for anti-aliasing
    let inner = (radius - 0.5).max(0.0);
    let outer = radius + feather + 0.5;

    // Bounding box of the capsule, clamped to the raster
    let x0 = ((a.x.min(b.x) - outer).floor() as i32).max(0) as usize;
    let y0 = ((a.y.min(b.y) - outer).floor() as i32).max(0) as usize;
    let x1 = ((a.x.max(b.x) + outer).ceil() as i32).min(w as i32) as usize;
    let y1 = ((a.y.max(b.y) + outer).ceil() as i32).min(h as i32) as usize;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let src = match mode {
        StrokeMode::Paint(c) => c,
        StrokeMode::Erase(bg) => bg,
    };

    let row_bytes = w as usize * 4;
    let buf: &mut [u8] = &mut *img;

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                let d = dist_to_segment(px, py, a, b);
                let cov = smoothstep(outer, inner, d);
                if cov <= 0.0 {
                    continue;
                }
                let k = cov * alpha;
                let o = x * 4;
                for c in 0..3 {
                    let dst = row[o + c] as f32;
                    row[o + c] = (src[c] as f32 * k + dst * (1.0 - k)).round() as u8;
                }
                row[o + 3] = 255;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn dot_marks_the_seed_pixel() {
        let mut img = RgbaImage::from_pixel(20, 20, WHITE);
        let p = Pos2::new(10.0, 10.0);
        draw_segment(&mut img, p, p, 4.0, 1.0, 1.0, StrokeMode::Paint(BLACK));
        assert_eq!(*img.get_pixel(10, 10), BLACK);
        // Far corner untouched
        assert_eq!(*img.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn segment_covers_its_midpoint() {
        let mut img = RgbaImage::from_pixel(40, 20, WHITE);
        draw_segment(
            &mut img,
            Pos2::new(5.0, 10.0),
            Pos2::new(35.0, 10.0),
            6.0,
            1.0,
            1.0,
            StrokeMode::Paint(BLACK),
        );
        assert_eq!(*img.get_pixel(20, 10), BLACK);
        // Above the stroke band stays white
        assert_eq!(*img.get_pixel(20, 2), WHITE);
    }

    #[test]
    fn erase_blends_toward_background() {
        let bg = Rgba([139, 0, 0, 255]);
        let mut img = RgbaImage::from_pixel(20, 20, BLACK);
        let p = Pos2::new(10.0, 10.0);
        draw_segment(&mut img, p, p, 8.0, 1.0, 1.0, StrokeMode::Erase(bg));
        assert_eq!(*img.get_pixel(10, 10), bg);
    }

    #[test]
    fn surface_stays_opaque() {
        let mut img = RgbaImage::from_pixel(16, 16, WHITE);
        let p = Pos2::new(8.0, 8.0);
        draw_segment(&mut img, p, p, 6.0, 0.0, 0.5, StrokeMode::Paint(BLACK));
        assert!(img.pixels().all(|px| px[3] == 255));
    }

    #[test]
    fn soft_brush_reaches_further_than_hard() {
        // Leftmost touched pixel on the stroke's center row
        let leftmost = |hardness: f32| {
            let mut img = RgbaImage::from_pixel(60, 60, WHITE);
            let p = Pos2::new(30.0, 30.0);
            draw_segment(&mut img, p, p, 10.0, hardness, 1.0, StrokeMode::Paint(BLACK));
            (0..30).find(|&x| *img.get_pixel(x, 30) != WHITE)
        };
        // The feathered stroke's ink starts further from the center
        assert!(leftmost(0.0).unwrap() < leftmost(1.0).unwrap());
    }

    #[test]
    fn hardness_opacity_floors() {
        assert_eq!(effective_opacity(1.0, 1.0), 1.0);
        // Hardness 0 floors at 0.3
        assert_eq!(effective_opacity(0.1, 0.0), 0.3);
        // Mid hardness floors at 0.5
        assert_eq!(effective_opacity(0.2, 0.5), 0.5);
        // High opacity keeps its scaled value
        let v = effective_opacity(1.0, 0.5);
        assert!((v - 0.8).abs() < 1e-6);
    }
}
