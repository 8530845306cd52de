//! Shape primitives — SDF-based rasterization of the drag-to-draw shapes
//! (line, rectangle, ellipse, triangle) with anti-aliased fill and outline.

use egui::Pos2;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::stroke::smoothstep;

/// Shape primitives drawn from an anchor to the current drag point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Line,
    Rectangle,
    Ellipse,
    Triangle,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Line => "Line",
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Ellipse => "Ellipse",
            ShapeKind::Triangle => "Triangle",
        }
    }
}

/// A fully-specified shape, ready to rasterize.  `start` is the drag anchor,
/// `end` the current pointer position; the drag rect may be inverted on
/// either axis.
#[derive(Clone, Copy, Debug)]
pub struct ShapeSpec {
    pub kind: ShapeKind,
    pub start: Pos2,
    pub end: Pos2,
    pub stroke_color: Rgba<u8>,
    pub fill_color: Rgba<u8>,
    pub stroke_width: f32,
    pub fill_enabled: bool,
}

// ============================================================================
// SDF functions — return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for an ellipse (approximation): normalise the point to circle space
/// and scale the distance back by the local gradient.
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    if rx <= 0.0 || ry <= 0.0 {
        return f32::MAX;
    }
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

/// Signed distance to a simple polygon (sign from the crossing test, so the
/// vertex winding does not matter).
fn sdf_polygon(verts: &[(f32, f32)], px: f32, py: f32) -> f32 {
    let n = verts.len();
    let mut d = (px - verts[0].0) * (px - verts[0].0) + (py - verts[0].1) * (py - verts[0].1);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].0 - verts[i].0;
        let ey = verts[j].1 - verts[i].1;
        let wx = px - verts[i].0;
        let wy = py - verts[i].1;
        let t = if ex * ex + ey * ey <= f32::EPSILON {
            0.0
        } else {
            ((wx * ex + wy * ey) / (ex * ex + ey * ey)).clamp(0.0, 1.0)
        };
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        let c1 = py >= verts[i].1;
        let c2 = py < verts[j].1;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

/// Distance from (px, py) to the segment a→b (unsigned).
#[inline]
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// SDF for `spec` at canvas coordinates (px, py), relative to the drag rect.
fn shape_sdf(spec: &ShapeSpec, px: f32, py: f32) -> f32 {
    let cx = (spec.start.x + spec.end.x) * 0.5;
    let cy = (spec.start.y + spec.end.y) * 0.5;
    let hx = (spec.end.x - spec.start.x).abs() * 0.5;
    let hy = (spec.end.y - spec.start.y).abs() * 0.5;
    let lx = px - cx;
    let ly = py - cy;
    match spec.kind {
        ShapeKind::Rectangle => sdf_box(lx, ly, hx, hy),
        ShapeKind::Ellipse => sdf_ellipse(lx, ly, hx, hy),
        // Apex at the top-center of the drag rect, base along the bottom
        ShapeKind::Triangle => sdf_polygon(&[(0.0, -hy), (-hx, hy), (hx, hy)], lx, ly),
        ShapeKind::Line => {
            sdf_line_segment(px, py, spec.start.x, spec.start.y, spec.end.x, spec.end.y)
        }
    }
}

// ============================================================================
// Rasterization
// ============================================================================

/// Source-over blend of `src` (with alpha `k` in [0,1]) onto one RGBA pixel.
/// Correct for both the opaque base raster and the transparent preview
/// overlay.
#[inline]
fn blend_pixel(dst: &mut [u8], src: Rgba<u8>, k: f32) {
    let k = k * (src[3] as f32 / 255.0);
    if k <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = k + da * (1.0 - k);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let s = src[c] as f32;
        let d = dst[c] as f32;
        dst[c] = ((s * k + d * da * (1.0 - k)) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Rasterize `spec` onto `img`: optional interior fill, then the outline band
/// on top.  The line kind is outline-only with round caps.
pub fn draw_shape(img: &mut RgbaImage, spec: &ShapeSpec) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let outline_half = (spec.stroke_width * 0.5).max(0.0);
    let pad = outline_half + 2.0;
    let x0 = ((spec.start.x.min(spec.end.x) - pad).floor() as i32).max(0) as usize;
    let y0 = ((spec.start.y.min(spec.end.y) - pad).floor() as i32).max(0) as usize;
    let x1 = ((spec.start.x.max(spec.end.x) + pad).ceil() as i32).min(w as i32) as usize;
    let y1 = ((spec.start.y.max(spec.end.y) + pad).ceil() as i32).min(h as i32) as usize;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let fill = spec.fill_enabled && spec.kind != ShapeKind::Line;
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
                let d = shape_sdf(spec, px, py);

                let o = x * 4;
                if fill {
                    let cov = smoothstep(0.5, -0.5, d);
                    if cov > 0.001 {
                        blend_pixel(&mut row[o..o + 4], spec.fill_color, cov);
                    }
                }
                // Outline band straddles the SDF zero contour; for the line
                // kind the unsigned distance gives a solid round-capped band.
                let band = match spec.kind {
                    ShapeKind::Line => d - outline_half,
                    _ => d.abs() - outline_half,
                };
                let cov = smoothstep(0.5, -0.5, band);
                if cov > 0.001 {
                    blend_pixel(&mut row[o..o + 4], spec.stroke_color, cov);
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLUE: Rgba<u8> = Rgba([20, 40, 200, 255]);
    const PINK: Rgba<u8> = Rgba([255, 182, 193, 255]);

    fn spec(kind: ShapeKind, fill: bool) -> ShapeSpec {
        ShapeSpec {
            kind,
            start: Pos2::new(10.0, 10.0),
            end: Pos2::new(50.0, 40.0),
            stroke_color: BLUE,
            fill_color: PINK,
            stroke_width: 2.0,
            fill_enabled: fill,
        }
    }

    #[test]
    fn rectangle_outline_hits_edges_not_center() {
        let mut img = RgbaImage::from_pixel(64, 64, WHITE);
        draw_shape(&mut img, &spec(ShapeKind::Rectangle, false));
        // On the top edge
        assert_eq!(*img.get_pixel(30, 10), BLUE);
        // Interior unfilled
        assert_eq!(*img.get_pixel(30, 25), WHITE);
    }

    #[test]
    fn rectangle_fill_covers_interior() {
        let mut img = RgbaImage::from_pixel(64, 64, WHITE);
        draw_shape(&mut img, &spec(ShapeKind::Rectangle, true));
        assert_eq!(*img.get_pixel(30, 25), PINK);
        assert_eq!(*img.get_pixel(30, 10), BLUE);
        // Outside untouched
        assert_eq!(*img.get_pixel(5, 5), WHITE);
    }

    #[test]
    fn inverted_drag_normalizes() {
        let mut img = RgbaImage::from_pixel(64, 64, WHITE);
        let mut s = spec(ShapeKind::Rectangle, true);
        std::mem::swap(&mut s.start, &mut s.end);
        draw_shape(&mut img, &s);
        assert_eq!(*img.get_pixel(30, 25), PINK);
    }

    #[test]
    fn ellipse_inscribes_drag_rect() {
        let mut img = RgbaImage::from_pixel(64, 64, WHITE);
        draw_shape(&mut img, &spec(ShapeKind::Ellipse, true));
        // Center filled
        assert_eq!(*img.get_pixel(30, 25), PINK);
        // Drag-rect corner lies outside the ellipse
        assert_eq!(*img.get_pixel(11, 11), WHITE);
    }

    #[test]
    fn triangle_apex_is_top_center() {
        let mut img = RgbaImage::from_pixel(64, 64, WHITE);
        draw_shape(&mut img, &spec(ShapeKind::Triangle, true));
        // Just under the apex (30, 10)
        assert_eq!(*img.get_pixel(30, 14), PINK);
        // Top corners of the drag rect are outside the triangle
        assert_eq!(*img.get_pixel(12, 12), WHITE);
        assert_eq!(*img.get_pixel(48, 12), WHITE);
        // Bottom edge region is inside
        assert_eq!(*img.get_pixel(30, 38), PINK);
    }

    #[test]
    fn line_is_stroke_only() {
        let mut img = RgbaImage::from_pixel(64, 64, WHITE);
        let mut s = spec(ShapeKind::Line, true); // fill flag must be ignored
        s.stroke_width = 4.0;
        draw_shape(&mut img, &s);
        // On the segment
        assert_eq!(*img.get_pixel(30, 25), BLUE);
        // Off the segment, inside what would be the rect interior
        assert_eq!(*img.get_pixel(40, 15), WHITE);
    }

    #[test]
    fn preview_overlay_alpha_composites() {
        // Drawing onto a transparent overlay must leave alpha only where drawn
        let mut overlay = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 0]));
        draw_shape(&mut overlay, &spec(ShapeKind::Rectangle, true));
        assert_eq!(overlay.get_pixel(30, 25)[3], 255);
        assert_eq!(overlay.get_pixel(5, 5)[3], 0);
    }
}
