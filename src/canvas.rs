//! Canvas state — the persistent raster backing store, the shape-preview
//! overlay, and the screen↔canvas coordinate mapping.

use egui::{Color32, Pos2, Rect};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Convert an egui color to an image-crate pixel.
#[inline]
pub fn to_rgba(c: Color32) -> Rgba<u8> {
    Rgba([c.r(), c.g(), c.b(), c.a()])
}

/// Convert an image-crate pixel to an egui color.
#[inline]
pub fn to_color32(p: Rgba<u8>) -> Color32 {
    Color32::from_rgba_unmultiplied(p[0], p[1], p[2], p[3])
}

/// The drawing surface: one fixed-size, always-opaque RGBA raster, plus an
/// optional transparent preview overlay used by the shape tools during a
/// drag (the base raster is untouched until the shape commits).
///
/// Invariant: every pixel of `pixels` has alpha 255.  Anything that clears
/// coverage repaints the configured background color in the same operation.
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
    pub background: Rgba<u8>,
    /// Present only while a shape drag is in flight.
    pub preview: Option<RgbaImage>,
    /// Bumped on every visible mutation; the app re-uploads the composite
    /// texture when this moves.
    pub dirty_generation: u64,
}

impl CanvasState {
    /// Create an opaque canvas filled with `background`.  A zero dimension
    /// is a construction failure — the app must not run without a surface.
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err(format!("invalid canvas size {}x{}", width, height));
        }
        let background = Rgba([background[0], background[1], background[2], 255]);
        Ok(Self {
            width,
            height,
            pixels: RgbaImage::from_pixel(width, height, background),
            background,
            preview: None,
            dirty_generation: 0,
        })
    }

    pub fn mark_dirty(&mut self) {
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }

    /// Repaint the whole raster with the background color.
    pub fn clear(&mut self) {
        let bg = self.background;
        for p in self.pixels.pixels_mut() {
            *p = bg;
        }
        self.mark_dirty();
    }

    /// Change the background color.  The original repaints immediately, so
    /// existing artwork on the old background is replaced wholesale.
    pub fn set_background(&mut self, color: Rgba<u8>) {
        self.background = Rgba([color[0], color[1], color[2], 255]);
        self.clear();
    }

    // ---- preview overlay ---------------------------------------------------

    /// Open (or reset) the transparent shape-preview overlay.
    pub fn open_preview(&mut self) {
        self.preview = Some(RgbaImage::from_pixel(
            self.width,
            self.height,
            Rgba([0, 0, 0, 0]),
        ));
        self.mark_dirty();
    }

    /// Wipe the overlay back to fully transparent, keeping it open.
    pub fn clear_preview(&mut self) {
        if let Some(p) = self.preview.as_mut() {
            for px in p.pixels_mut() {
                *px = Rgba([0, 0, 0, 0]);
            }
            self.dirty_generation = self.dirty_generation.wrapping_add(1);
        }
    }

    /// Drop the overlay without committing it.
    pub fn discard_preview(&mut self) {
        if self.preview.take().is_some() {
            self.mark_dirty();
        }
    }

    // ---- composition -------------------------------------------------------

    /// Base raster with the preview overlay composited on top.  Image layers
    /// are stamped over this by the layer manager; the result feeds both the
    /// display texture and PNG export.
    pub fn composite_base(&self) -> RgbaImage {
        let mut out = self.pixels.clone();
        if let Some(overlay) = self.preview.as_ref() {
            overlay_onto(&mut out, overlay);
        }
        out
    }

    // ---- coordinate mapping ------------------------------------------------

    /// Map a pointer position to canvas pixel coordinates.
    ///
    /// `display_rect` is where the canvas is shown on screen; the backing
    /// store may differ in resolution, so the position relative to the
    /// rect's top-left is scaled per-axis by backing/displayed.  Touch input
    /// arrives through the same path: egui folds the primary contact point
    /// into its pointer state.  Best-effort by design: positions outside the
    /// rect map to out-of-bounds coordinates the tools clamp or ignore, and
    /// degenerate rects fall back to a 1:1 scale — this never fails.
    pub fn screen_to_canvas(&self, screen: Pos2, display_rect: Rect) -> Pos2 {
        let sx = if display_rect.width() > 0.0 {
            self.width as f32 / display_rect.width()
        } else {
            1.0
        };
        let sy = if display_rect.height() > 0.0 {
            self.height as f32 / display_rect.height()
        } else {
            1.0
        };
        Pos2::new(
            (screen.x - display_rect.min.x) * sx,
            (screen.y - display_rect.min.y) * sy,
        )
    }

    /// Inverse of [`Self::screen_to_canvas`], used when drawing selection
    /// chrome over the displayed canvas.
    pub fn canvas_to_screen(&self, p: Pos2, display_rect: Rect) -> Pos2 {
        let sx = if self.width > 0 {
            display_rect.width() / self.width as f32
        } else {
            1.0
        };
        let sy = if self.height > 0 {
            display_rect.height() / self.height as f32
        } else {
            1.0
        };
        Pos2::new(
            display_rect.min.x + p.x * sx,
            display_rect.min.y + p.y * sy,
        )
    }
}

/// Source-over composite of a transparent overlay onto an opaque base of the
/// same dimensions.
fn overlay_onto(base: &mut RgbaImage, overlay: &RgbaImage) {
    debug_assert_eq!(base.dimensions(), overlay.dimensions());
    let row_bytes = base.width() as usize * 4;
    let src: &[u8] = overlay.as_raw();
    let dst: &mut [u8] = &mut *base;

    dst.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let srow = &src[y * row_bytes..(y + 1) * row_bytes];
            for x in 0..row.len() / 4 {
                let o = x * 4;
                let a = srow[o + 3] as f32 / 255.0;
                if a <= 0.0 {
                    continue;
                }
                for c in 0..3 {
                    let s = srow[o + c] as f32;
                    let d = row[o + c] as f32;
                    row[o + c] = (s * a + d * (1.0 - a)).round() as u8;
                }
                // Base stays opaque
                row[o + 3] = 255;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: Rgba<u8> = Rgba([139, 0, 0, 255]);

    #[test]
    fn construction_rejects_zero_dimensions() {
        assert!(CanvasState::new(0, 10, BG).is_err());
        assert!(CanvasState::new(10, 0, BG).is_err());
        assert!(CanvasState::new(10, 10, BG).is_ok());
    }

    #[test]
    fn new_canvas_is_opaque_background() {
        let canvas = CanvasState::new(8, 8, Rgba([139, 0, 0, 0])).unwrap();
        // Alpha is forced to 255 even when the given background was not
        assert!(canvas.pixels.pixels().all(|p| *p == BG));
    }

    #[test]
    fn clear_repaints_background() {
        let mut canvas = CanvasState::new(8, 8, BG).unwrap();
        canvas.pixels.put_pixel(3, 3, Rgba([0, 255, 0, 255]));
        canvas.clear();
        assert!(canvas.pixels.pixels().all(|p| *p == BG));
    }

    #[test]
    fn preview_composites_over_base_without_touching_it() {
        let mut canvas = CanvasState::new(8, 8, BG).unwrap();
        canvas.open_preview();
        canvas
            .preview
            .as_mut()
            .unwrap()
            .put_pixel(2, 2, Rgba([0, 0, 255, 255]));

        let composite = canvas.composite_base();
        assert_eq!(*composite.get_pixel(2, 2), Rgba([0, 0, 255, 255]));
        // Base raster untouched
        assert_eq!(*canvas.pixels.get_pixel(2, 2), BG);

        canvas.discard_preview();
        assert_eq!(*canvas.composite_base().get_pixel(2, 2), BG);
    }

    #[test]
    fn coordinate_mapping_scales_by_backing_ratio() {
        let canvas = CanvasState::new(200, 100, BG).unwrap();
        // Displayed at half resolution, offset by (10, 20)
        let rect = Rect::from_min_size(Pos2::new(10.0, 20.0), egui::Vec2::new(100.0, 50.0));
        let p = canvas.screen_to_canvas(Pos2::new(60.0, 45.0), rect);
        assert_eq!(p, Pos2::new(100.0, 50.0));

        // Round trip
        let back = canvas.canvas_to_screen(p, rect);
        assert!((back.x - 60.0).abs() < 1e-4 && (back.y - 45.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_display_rect_maps_best_effort() {
        let canvas = CanvasState::new(10, 10, BG).unwrap();
        let rect = Rect::from_min_size(Pos2::ZERO, egui::Vec2::ZERO);
        // No panic, 1:1 fallback
        let p = canvas.screen_to_canvas(Pos2::new(3.0, 4.0), rect);
        assert_eq!(p, Pos2::new(3.0, 4.0));
    }
}
