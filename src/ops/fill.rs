//! Flood fill — iterative, 4-connected region recoloring with tolerance.

use image::{Rgba, RgbaImage};

/// Returns true when every RGB channel of `a` and `b` differs by at most
/// `tolerance`.  The alpha channel does not participate: the drawing surface
/// is opaque by invariant, and the original behavior compared RGB only.
#[inline]
pub fn colors_match(a: Rgba<u8>, b: Rgba<u8>, tolerance: u8) -> bool {
    let t = tolerance as i16;
    (a[0] as i16 - b[0] as i16).abs() <= t
        && (a[1] as i16 - b[1] as i16).abs() <= t
        && (a[2] as i16 - b[2] as i16).abs() <= t
}

/// Flood-fill the contiguous region around `seed` with `fill_color`.
///
/// Reads the seed pixel's color and recolors the maximal 4-connected region
/// matching it within `tolerance` (per-channel absolute difference).  The
/// fill is written at full opacity.  Returns `false` without touching the
/// raster when the seed is out of bounds or its color already matches
/// `fill_color` within tolerance.
///
/// Traversal is an explicit Vec stack of packed flat indices — never
/// recursion, which could overflow on rasters whose region depth exceeds the
/// thread stack.  The mask doubles as the visited set and is applied to the
/// pixel buffer in a single write pass at the end.
pub fn flood_fill(
    img: &mut RgbaImage,
    seed_x: u32,
    seed_y: u32,
    fill_color: Rgba<u8>,
    tolerance: u8,
) -> bool {
    let (w, h) = img.dimensions();
    if seed_x >= w || seed_y >= h {
        return false;
    }

    let target = *img.get_pixel(seed_x, seed_y);

    // Seed already the fill color (within tolerance) — nothing to do.
    if colors_match(target, fill_color, tolerance) {
        return false;
    }

    let wu = w as usize;
    let hu = h as usize;
    let flat: &[u8] = img.as_raw();

    // Inline pixel fetch from the flat RGBA buffer
    #[inline(always)]
    fn pix(flat: &[u8], idx: usize) -> Rgba<u8> {
        let o = idx * 4;
        Rgba([flat[o], flat[o + 1], flat[o + 2], flat[o + 3]])
    }

    // mask doubles as the visited array and the output
    let mut mask = vec![0u8; wu * hu];
    let mut stack: Vec<u32> = Vec::with_capacity(4096);

    let seed_idx = seed_y as usize * wu + seed_x as usize;
    mask[seed_idx] = 255;
    stack.push(seed_idx as u32);

    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        let x = idx % wu;
        let y = idx / wu;

        // Check 4 neighbors, push unvisited matching ones
        if x > 0 {
            let ni = idx - 1;
            if mask[ni] == 0 && colors_match(pix(flat, ni), target, tolerance) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        if x + 1 < wu {
            let ni = idx + 1;
            if mask[ni] == 0 && colors_match(pix(flat, ni), target, tolerance) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        if y > 0 {
            let ni = idx - wu;
            if mask[ni] == 0 && colors_match(pix(flat, ni), target, tolerance) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        if y + 1 < hu {
            let ni = idx + wu;
            if mask[ni] == 0 && colors_match(pix(flat, ni), target, tolerance) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
    }

    // Single write pass over the raster
    let out: &mut [u8] = &mut *img;
    for (i, &m) in mask.iter().enumerate() {
        if m != 0 {
            let o = i * 4;
            out[o] = fill_color[0];
            out[o + 1] = fill_color[1];
            out[o + 2] = fill_color[2];
            out[o + 3] = 255;
        }
    }

    true
}
