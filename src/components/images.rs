//! Image layers — placed raster images floating above the drawing surface,
//! each with an independent move/scale/rotate/flip transform, manipulated
//! through corner/edge handles with inverse-transform hit-testing.

use std::sync::Arc;

use egui::{CursorIcon, Pos2, Vec2};
use image::RgbaImage;
use rayon::prelude::*;
use uuid::Uuid;

/// Layers can never be resized below this edge length.
pub const MIN_LAYER_SIZE: f32 = 20.0;

/// Visual size of a resize handle square (canvas units).
pub const HANDLE_SIZE: f32 = 8.0;

/// Diagonal outward offset of the rotate handles from each corner.
pub const ROTATE_HANDLE_OFFSET: f32 = 25.0;

/// Extra hit radius beyond the handle size, so small handles stay usable.
pub const HANDLE_HIT_SLACK: f32 = 8.0;

/// Wrap an angle into [0, 360).
#[inline]
pub fn normalize_degrees(deg: f32) -> f32 {
    let d = deg % 360.0;
    if d < 0.0 { d + 360.0 } else { d }
}

/// Rotate `v` by `deg` degrees.  This one helper is used by hit-testing,
/// gesture math, compositing, and chrome drawing alike — the sign convention
/// must never diverge between them or hit-testing silently breaks under
/// rotation.
#[inline]
pub fn rotate_vec(v: Vec2, deg: f32) -> Vec2 {
    let (sin, cos) = deg.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

#[inline]
fn angle_degrees(v: Vec2) -> f32 {
    v.y.atan2(v.x).to_degrees()
}

// ============================================================================
// HANDLES
// ============================================================================

/// Interaction handles of a selected layer: four rotate handles floating
/// outside the corners, four corner resize handles, four edge-midpoint
/// resize handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerHandle {
    RotateNw,
    RotateNe,
    RotateSw,
    RotateSe,
    ResizeNw,
    ResizeNe,
    ResizeSw,
    ResizeSe,
    ResizeN,
    ResizeS,
    ResizeW,
    ResizeE,
}

impl LayerHandle {
    /// Hit-test order: rotate handles first, then corners, then edges —
    /// rotation wins wherever hit radii overlap.
    pub const ALL: [LayerHandle; 12] = [
        LayerHandle::RotateNw,
        LayerHandle::RotateNe,
        LayerHandle::RotateSw,
        LayerHandle::RotateSe,
        LayerHandle::ResizeNw,
        LayerHandle::ResizeNe,
        LayerHandle::ResizeSw,
        LayerHandle::ResizeSe,
        LayerHandle::ResizeN,
        LayerHandle::ResizeS,
        LayerHandle::ResizeW,
        LayerHandle::ResizeE,
    ];

    pub fn is_rotate(self) -> bool {
        matches!(
            self,
            LayerHandle::RotateNw
                | LayerHandle::RotateNe
                | LayerHandle::RotateSw
                | LayerHandle::RotateSe
        )
    }

    /// Handle center in the layer's local frame (origin at layer center,
    /// half-extents hw/hh).
    pub fn local_pos(self, hw: f32, hh: f32) -> Vec2 {
        let r = ROTATE_HANDLE_OFFSET;
        match self {
            LayerHandle::RotateNw => Vec2::new(-hw - r, -hh - r),
            LayerHandle::RotateNe => Vec2::new(hw + r, -hh - r),
            LayerHandle::RotateSw => Vec2::new(-hw - r, hh + r),
            LayerHandle::RotateSe => Vec2::new(hw + r, hh + r),
            LayerHandle::ResizeNw => Vec2::new(-hw, -hh),
            LayerHandle::ResizeNe => Vec2::new(hw, -hh),
            LayerHandle::ResizeSw => Vec2::new(-hw, hh),
            LayerHandle::ResizeSe => Vec2::new(hw, hh),
            LayerHandle::ResizeN => Vec2::new(0.0, -hh),
            LayerHandle::ResizeS => Vec2::new(0.0, hh),
            LayerHandle::ResizeW => Vec2::new(-hw, 0.0),
            LayerHandle::ResizeE => Vec2::new(hw, 0.0),
        }
    }

    pub fn cursor_icon(self) -> CursorIcon {
        match self {
            h if h.is_rotate() => CursorIcon::Grab,
            LayerHandle::ResizeNw | LayerHandle::ResizeSe => CursorIcon::ResizeNwSe,
            LayerHandle::ResizeNe | LayerHandle::ResizeSw => CursorIcon::ResizeNeSw,
            LayerHandle::ResizeN | LayerHandle::ResizeS => CursorIcon::ResizeVertical,
            _ => CursorIcon::ResizeHorizontal,
        }
    }
}

// ============================================================================
// LAYER
// ============================================================================

/// One placed image: decoded source pixels plus the current transform.
/// The transform is non-destructive — the source is never resampled until
/// compositing.
#[derive(Clone)]
pub struct ImageLayer {
    pub id: Uuid,
    /// Decoded source at natural resolution, shared with no one but cheap to
    /// clone alongside the layer.
    pub pixels: Arc<RgbaImage>,
    /// Top-left corner in canvas coordinates (unrotated frame).
    pub position: Pos2,
    pub size: Vec2,
    /// Size at placement time; scale_percent is relative to this.
    pub original_size: Vec2,
    pub scale_percent: f32,
    /// Always in [0, 360).
    pub rotation_degrees: f32,
    pub opacity_percent: f32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub selected: bool,
}

impl ImageLayer {
    fn new(pixels: Arc<RgbaImage>, position: Pos2, size: Vec2) -> Self {
        Self {
            id: Uuid::new_v4(),
            pixels,
            position,
            size,
            original_size: size,
            scale_percent: 100.0,
            rotation_degrees: 0.0,
            opacity_percent: 100.0,
            flip_horizontal: false,
            flip_vertical: false,
            selected: false,
        }
    }

    pub fn center(&self) -> Pos2 {
        self.position + self.size * 0.5
    }

    pub fn set_rotation(&mut self, deg: f32) {
        self.rotation_degrees = normalize_degrees(deg);
    }

    /// Canvas point → local frame: subtract the center, undo the rotation,
    /// undo the flips.
    pub fn to_local(&self, p: Pos2) -> Vec2 {
        let mut v = rotate_vec(p - self.center(), -self.rotation_degrees);
        if self.flip_horizontal {
            v.x = -v.x;
        }
        if self.flip_vertical {
            v.y = -v.y;
        }
        v
    }

    /// Local frame → canvas: the forward transform used for drawing.
    pub fn to_canvas(&self, local: Vec2) -> Pos2 {
        let mut v = local;
        if self.flip_horizontal {
            v.x = -v.x;
        }
        if self.flip_vertical {
            v.y = -v.y;
        }
        self.center() + rotate_vec(v, self.rotation_degrees)
    }

    /// Containment test against the axis-aligned half-extent box in the
    /// local frame.
    pub fn contains(&self, p: Pos2) -> bool {
        let l = self.to_local(p);
        l.x.abs() <= self.size.x * 0.5 && l.y.abs() <= self.size.y * 0.5
    }

    /// Which handle, if any, is under the canvas point.  Tested in the local
    /// frame with a circular tolerance, rotate handles first.
    pub fn handle_at(&self, p: Pos2) -> Option<LayerHandle> {
        let l = self.to_local(p);
        let hw = self.size.x * 0.5;
        let hh = self.size.y * 0.5;
        let radius = HANDLE_SIZE + HANDLE_HIT_SLACK;
        LayerHandle::ALL
            .into_iter()
            .find(|h| (l - h.local_pos(hw, hh)).length() <= radius)
    }

    /// Re-derive the displayed size from `scale_percent`, keeping the
    /// top-left anchored (panel-driven scaling, not a handle gesture).
    pub fn apply_scale_percent(&mut self, percent: f32) {
        self.scale_percent = percent.max(1.0);
        self.size = self.original_size * (self.scale_percent / 100.0);
    }
}

// ============================================================================
// GESTURE SESSION
// ============================================================================

/// Layer state captured at gesture start; resize and rotate are always
/// computed fresh from this, never incrementally.
#[derive(Clone, Copy, Debug)]
struct OriginalState {
    position: Pos2,
    size: Vec2,
    rotation: f32,
}

#[derive(Clone, Copy, Debug)]
enum GestureMode {
    Move { grab: Vec2 },
    Resize { handle: LayerHandle },
    Rotate { start_angle: f32 },
}

/// Present only while a pointer button is down over a layer or handle.
struct TransformSession {
    layer_index: usize,
    mode: GestureMode,
    start: Pos2,
    original: OriginalState,
}

// ============================================================================
// MANAGER
// ============================================================================

/// Partial transform update from the side panel (non-gesture control).
#[derive(Clone, Copy, Debug, Default)]
pub struct LayerTransformUpdate {
    pub scale_percent: Option<f32>,
    pub rotation_degrees: Option<f32>,
    pub opacity_percent: Option<f32>,
}

/// Owns the ordered layer list (later = painted on top) and resolves pointer
/// interaction into select/move/resize/rotate gestures.
#[derive(Default)]
pub struct ImageLayerManager {
    pub layers: Vec<ImageLayer>,
    session: Option<TransformSession>,
}

impl ImageLayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.layers.iter().position(|l| l.selected)
    }

    pub fn selected(&self) -> Option<&ImageLayer> {
        self.layers.iter().find(|l| l.selected)
    }

    pub fn selected_mut(&mut self) -> Option<&mut ImageLayer> {
        self.layers.iter_mut().find(|l| l.selected)
    }

    pub fn gesture_active(&self) -> bool {
        self.session.is_some()
    }

    /// Place a decoded image: scaled down (aspect preserved) to fit within
    /// half the displayed canvas extent if it exceeds that, centered on the
    /// canvas, appended on top, and selected.
    pub fn add_layer(
        &mut self,
        pixels: RgbaImage,
        display_size: Vec2,
        canvas_size: Vec2,
    ) -> &ImageLayer {
        let natural = Vec2::new(pixels.width() as f32, pixels.height() as f32);
        let max = display_size * 0.5;
        let mut size = natural;
        if size.x > max.x || size.y > max.y {
            let ratio = (max.x / size.x).min(max.y / size.y);
            size *= ratio;
        }
        let position = Pos2::new(
            (canvas_size.x - size.x) * 0.5,
            (canvas_size.y - size.y) * 0.5,
        );

        self.deselect_all();
        let mut layer = ImageLayer::new(Arc::new(pixels), position, size);
        layer.selected = true;
        self.layers.push(layer);
        self.layers.last().expect("layer was just pushed")
    }

    fn deselect_all(&mut self) {
        for l in &mut self.layers {
            l.selected = false;
        }
    }

    /// Topmost layer containing the point.
    pub fn hit_test(&self, p: Pos2) -> Option<usize> {
        self.layers.iter().rposition(|l| l.contains(p))
    }

    /// Select the topmost layer at `p` (deselecting the rest), or deselect
    /// everything on a miss.
    pub fn select_at(&mut self, p: Pos2) -> Option<usize> {
        let hit = self.hit_test(p);
        for (i, l) in self.layers.iter_mut().enumerate() {
            l.selected = Some(i) == hit;
        }
        hit
    }

    /// Pointer-down in image mode.  Starts a transform session on a handle,
    /// a move session on a layer body, or deselects on empty canvas.
    /// Returns true when the visible state changed.
    pub fn pointer_down(&mut self, p: Pos2) -> bool {
        // A selected layer's handles take priority over everything beneath
        if let Some(i) = self.selected_index()
            && let Some(handle) = self.layers[i].handle_at(p)
        {
            self.begin_session(i, handle_mode(&self.layers[i], handle, p), p);
            return true;
        }

        if let Some(i) = self.select_at(p) {
            let layer = &self.layers[i];
            // A freshly selected layer may have been hit right on a handle
            let mode = match layer.handle_at(p) {
                Some(handle) => handle_mode(layer, handle, p),
                None => GestureMode::Move {
                    grab: p - layer.position,
                },
            };
            self.begin_session(i, mode, p);
            true
        } else {
            // Clicked empty canvas — deselection already done by select_at
            self.session = None;
            true
        }
    }

    fn begin_session(&mut self, layer_index: usize, mode: GestureMode, start: Pos2) {
        let layer = &self.layers[layer_index];
        self.session = Some(TransformSession {
            layer_index,
            mode,
            start,
            original: OriginalState {
                position: layer.position,
                size: layer.size,
                rotation: layer.rotation_degrees,
            },
        });
    }

    /// Pointer-move while a session is active.  Returns true when a layer
    /// changed.  Without a session this is a silent no-op.
    pub fn pointer_move(&mut self, p: Pos2, canvas_size: Vec2) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let orig = session.original;
        let start = session.start;
        let index = session.layer_index;
        let mode = session.mode;
        let Some(layer) = self.layers.get_mut(index) else {
            return false;
        };

        match mode {
            GestureMode::Rotate { start_angle } => {
                let center = orig.position + orig.size * 0.5;
                let current = angle_degrees(p - center);
                layer.set_rotation(orig.rotation + (current - start_angle));
            }
            GestureMode::Resize { handle } => {
                resize_from(layer, orig, handle, p - start);
            }
            GestureMode::Move { grab } => {
                let target = p - grab;
                layer.position = Pos2::new(
                    target.x.min(canvas_size.x - layer.size.x).max(0.0),
                    target.y.min(canvas_size.y - layer.size.y).max(0.0),
                );
            }
        }
        true
    }

    /// Pointer-up: consume the session.  Returns true when a gesture was in
    /// flight (the caller recomposites and snapshots).
    pub fn pointer_up(&mut self) -> bool {
        self.session.take().is_some()
    }

    /// Hover feedback: the cursor to show at `p` when no button is down.
    pub fn hover_cursor(&self, p: Pos2) -> Option<CursorIcon> {
        if let Some(sel) = self.selected() {
            if let Some(h) = sel.handle_at(p) {
                return Some(h.cursor_icon());
            }
        }
        self.hit_test(p).map(|_| CursorIcon::Move)
    }

    /// Arrow-key nudge of the selected layer, clamped to canvas bounds.
    pub fn nudge_selected(&mut self, delta: Vec2, canvas_size: Vec2) -> bool {
        let Some(layer) = self.selected_mut() else {
            return false;
        };
        let target = layer.position + delta;
        layer.position = Pos2::new(
            target.x.min(canvas_size.x - layer.size.x).max(0.0),
            target.y.min(canvas_size.y - layer.size.y).max(0.0),
        );
        true
    }

    pub fn remove_selected(&mut self) -> bool {
        if let Some(i) = self.selected_index() {
            self.layers.remove(i);
            self.session = None;
            true
        } else {
            false
        }
    }

    pub fn clear_all(&mut self) {
        self.layers.clear();
        self.session = None;
    }

    /// Panel-driven partial transform of the selected layer.
    pub fn update_transform(&mut self, update: LayerTransformUpdate) -> bool {
        let Some(layer) = self.selected_mut() else {
            return false;
        };
        if let Some(scale) = update.scale_percent {
            layer.apply_scale_percent(scale);
        }
        if let Some(rot) = update.rotation_degrees {
            layer.set_rotation(rot);
        }
        if let Some(op) = update.opacity_percent {
            layer.opacity_percent = op.clamp(0.0, 100.0);
        }
        true
    }

    pub fn flip_selected_horizontal(&mut self) -> bool {
        match self.selected_mut() {
            Some(l) => {
                l.flip_horizontal = !l.flip_horizontal;
                true
            }
            None => false,
        }
    }

    pub fn flip_selected_vertical(&mut self) -> bool {
        match self.selected_mut() {
            Some(l) => {
                l.flip_vertical = !l.flip_vertical;
                true
            }
            None => false,
        }
    }

    /// Back to placement state: scale 100, no rotation, full opacity, no
    /// flips.
    pub fn reset_selected_transform(&mut self) -> bool {
        match self.selected_mut() {
            Some(l) => {
                l.apply_scale_percent(100.0);
                l.rotation_degrees = 0.0;
                l.opacity_percent = 100.0;
                l.flip_horizontal = false;
                l.flip_vertical = false;
                true
            }
            None => false,
        }
    }

    // ---- compositing -------------------------------------------------------

    /// Stamp every layer (in z-order) onto `base`: translate to center,
    /// rotate, flip, sample the source scaled to the current size, apply the
    /// layer opacity.  `base` stays opaque.
    pub fn composite_over(&self, base: &mut RgbaImage) {
        for layer in &self.layers {
            composite_layer(base, layer);
        }
    }

    /// Burn all layers into the raster and empty the layer list.
    pub fn flatten_into(&mut self, base: &mut RgbaImage) -> bool {
        if self.layers.is_empty() {
            return false;
        }
        self.composite_over(base);
        self.clear_all();
        true
    }
}

/// Session mode for a hit handle: rotate sessions record the starting
/// pointer angle around the layer center.
fn handle_mode(layer: &ImageLayer, handle: LayerHandle, p: Pos2) -> GestureMode {
    if handle.is_rotate() {
        GestureMode::Rotate {
            start_angle: angle_degrees(p - layer.center()),
        }
    } else {
        GestureMode::Resize { handle }
    }
}

/// Recompute the layer rect from the gesture-start state, the dragged
/// handle, and the raw pointer delta; the opposite edge/corner stays fixed.
/// Sizes clamp to the minimum after the position math, like the original.
fn resize_from(layer: &mut ImageLayer, orig: OriginalState, handle: LayerHandle, d: Vec2) {
    let mut w = orig.size.x;
    let mut h = orig.size.y;
    let mut x = orig.position.x;
    let mut y = orig.position.y;

    match handle {
        LayerHandle::ResizeNw => {
            w -= d.x;
            h -= d.y;
            x += d.x;
            y += d.y;
        }
        LayerHandle::ResizeNe => {
            w += d.x;
            h -= d.y;
            y += d.y;
        }
        LayerHandle::ResizeSw => {
            w -= d.x;
            h += d.y;
            x += d.x;
        }
        LayerHandle::ResizeSe => {
            w += d.x;
            h += d.y;
        }
        LayerHandle::ResizeN => {
            h -= d.y;
            y += d.y;
        }
        LayerHandle::ResizeS => {
            h += d.y;
        }
        LayerHandle::ResizeW => {
            w -= d.x;
            x += d.x;
        }
        LayerHandle::ResizeE => {
            w += d.x;
        }
        _ => return, // rotate handles never reach here
    }

    layer.size = Vec2::new(w.max(MIN_LAYER_SIZE), h.max(MIN_LAYER_SIZE));
    layer.position = Pos2::new(x, y);
}

/// Bilinear sample from the source, transparent outside its bounds (gives
/// soft layer edges).
#[inline]
fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> [f32; 4] {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= img.width() as i32 || sy >= img.height() as i32 {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        out[c] = lerp(top, bot, fy);
    }
    out
}

fn composite_layer(base: &mut RgbaImage, layer: &ImageLayer) {
    let (bw, bh) = base.dimensions();
    let hw = layer.size.x * 0.5;
    let hh = layer.size.y * 0.5;
    if hw <= 0.0 || hh <= 0.0 {
        return;
    }
    let opacity = (layer.opacity_percent / 100.0).clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }

    // Axis-aligned bounds of the rotated rect, padded for AA, clamped
    let corners = [
        layer.to_canvas(Vec2::new(-hw, -hh)),
        layer.to_canvas(Vec2::new(hw, -hh)),
        layer.to_canvas(Vec2::new(hw, hh)),
        layer.to_canvas(Vec2::new(-hw, hh)),
    ];
    let min_x = corners.iter().map(|c| c.x).fold(f32::MAX, f32::min) - 1.0;
    let min_y = corners.iter().map(|c| c.y).fold(f32::MAX, f32::min) - 1.0;
    let max_x = corners.iter().map(|c| c.x).fold(f32::MIN, f32::max) + 1.0;
    let max_y = corners.iter().map(|c| c.y).fold(f32::MIN, f32::max) + 1.0;

    let x0 = (min_x.floor() as i32).max(0) as usize;
    let y0 = (min_y.floor() as i32).max(0) as usize;
    let x1 = (max_x.ceil() as i32).min(bw as i32) as usize;
    let y1 = (max_y.ceil() as i32).min(bh as i32) as usize;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let src = layer.pixels.as_ref();
    let sw = src.width() as f32;
    let sh = src.height() as f32;
    let row_bytes = bw as usize * 4;
    let buf: &mut [u8] = &mut *base;

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                let l = layer.to_local(Pos2::new(px, py));
                if l.x.abs() > hw || l.y.abs() > hh {
                    continue;
                }
                // Local box → source pixel coordinates
                let u = (l.x + hw) / layer.size.x * sw - 0.5;
                let v = (l.y + hh) / layer.size.y * sh - 0.5;
                let s = bilinear_sample(src, u, v);
                let k = (s[3] / 255.0) * opacity;
                if k <= 0.0 {
                    continue;
                }
                let o = x * 4;
                for c in 0..3 {
                    let dst = row[o + c] as f32;
                    row[o + c] = (s[c] * k + dst * (1.0 - k)).round().clamp(0.0, 255.0) as u8;
                }
                row[o + 3] = 255;
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn source(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([10, 200, 10, 255]))
    }

    fn manager_with_layer(size: Vec2) -> ImageLayerManager {
        let mut m = ImageLayerManager::new();
        m.add_layer(
            source(size.x as u32, size.y as u32),
            Vec2::new(1600.0, 1200.0), // generous display bound: no downscale
            Vec2::new(800.0, 600.0),
        );
        m
    }

    #[test]
    fn placement_fits_half_display_and_centers() {
        let mut m = ImageLayerManager::new();
        // 1000×500 source against a 400×300 display → bound 200×150,
        // ratio = min(200/1000, 150/500) = 0.2 → 200×100
        m.add_layer(
            source(1000, 500),
            Vec2::new(400.0, 300.0),
            Vec2::new(800.0, 600.0),
        );
        let l = m.selected().expect("new layer is selected");
        assert_eq!(l.size, Vec2::new(200.0, 100.0));
        assert_eq!(l.position, Pos2::new(300.0, 250.0));
        assert_eq!(l.scale_percent, 100.0);
    }

    #[test]
    fn new_layer_steals_selection() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        m.add_layer(
            source(50, 50),
            Vec2::new(1600.0, 1200.0),
            Vec2::new(800.0, 600.0),
        );
        assert_eq!(m.layers.len(), 2);
        assert!(!m.layers[0].selected);
        assert!(m.layers[1].selected);
    }

    #[test]
    fn rotation_always_normalizes() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        let l = m.selected_mut().unwrap();
        l.set_rotation(350.0 + 30.0);
        assert_eq!(l.rotation_degrees, 20.0);
        l.set_rotation(-90.0);
        assert_eq!(l.rotation_degrees, 270.0);
        l.set_rotation(720.0);
        assert_eq!(l.rotation_degrees, 0.0);
    }

    #[test]
    fn hit_test_agrees_with_forward_transform() {
        for &theta in &[0.0f32, 45.0, 90.0, 180.0, 270.0] {
            let mut m = manager_with_layer(Vec2::new(120.0, 60.0));
            {
                let l = m.selected_mut().unwrap();
                l.set_rotation(theta);
                l.flip_horizontal = true;
            }
            let l = m.selected().unwrap();
            // A point mapped into the visible interior via the forward
            // transform must hit...
            let inside = l.to_canvas(Vec2::new(20.0, 10.0));
            assert!(l.contains(inside), "interior point missed at θ={theta}");
            // ...and one mapped outside the half-extents must not.
            let outside = l.to_canvas(Vec2::new(80.0, 0.0));
            assert!(!l.contains(outside), "exterior point hit at θ={theta}");
        }
    }

    #[test]
    fn topmost_layer_wins_hit_test() {
        let mut m = ImageLayerManager::new();
        let display = Vec2::new(1600.0, 1200.0);
        let canvas = Vec2::new(800.0, 600.0);
        m.add_layer(source(100, 100), display, canvas);
        m.add_layer(source(100, 100), display, canvas); // same center spot
        let center = Pos2::new(400.0, 300.0);
        assert_eq!(m.hit_test(center), Some(1));
    }

    #[test]
    fn rotate_handles_are_probed_before_resize() {
        // The precedence mechanism is the fixed probe order
        assert!(LayerHandle::ALL[..4].iter().all(|h| h.is_rotate()));
        assert!(LayerHandle::ALL[4..].iter().all(|h| !h.is_rotate()));

        // And a point inside a rotate handle's radius resolves to rotate,
        // even probed from the side nearest the corner resize handle.
        let m = manager_with_layer(Vec2::new(24.0, 24.0));
        let l = m.selected().unwrap();
        let hw = 12.0;
        let rotate_center = LayerHandle::RotateSe.local_pos(hw, hw);
        let toward_corner = Vec2::new(-10.0, -10.0); // back toward (hw, hh)
        let probe = l.to_canvas(rotate_center + toward_corner * (14.0 / toward_corner.length()));
        assert_eq!(l.handle_at(probe), Some(LayerHandle::RotateSe));
    }

    #[test]
    fn overlapping_handle_radii_resolve_by_probe_order() {
        // On a small layer the NW corner and N edge handles' hit circles
        // overlap; a point inside both resolves to the earlier entry.
        let m = manager_with_layer(Vec2::new(24.0, 24.0));
        let l = m.selected().unwrap();
        let probe = l.to_canvas(Vec2::new(-6.0, -12.0)); // 6 units from each
        assert_eq!(l.handle_at(probe), Some(LayerHandle::ResizeNw));
    }

    #[test]
    fn drag_moves_and_clamps_to_canvas() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        let canvas = Vec2::new(800.0, 600.0);
        let l = m.selected().unwrap();
        let body = l.center();

        assert!(m.pointer_down(body));
        // Drag far past the top-left corner — position clamps to 0,0
        m.pointer_move(Pos2::new(-500.0, -500.0), canvas);
        assert!(m.pointer_up());
        let l = m.selected().unwrap();
        assert_eq!(l.position, Pos2::new(0.0, 0.0));

        // And past the bottom-right — clamps to canvas − size
        let body = m.selected().unwrap().center();
        assert!(m.pointer_down(body));
        m.pointer_move(Pos2::new(5000.0, 5000.0), canvas);
        m.pointer_up();
        let l = m.selected().unwrap();
        assert_eq!(l.position, Pos2::new(700.0, 500.0));
    }

    #[test]
    fn resize_clamps_to_minimum_size() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        let grab = {
            let l = m.selected().unwrap();
            l.position + l.size // bottom-right corner handle
        };
        assert!(m.pointer_down(Pos2::new(grab.x, grab.y)));
        // Drag the SE corner way past the NW corner
        m.pointer_move(Pos2::new(grab.x - 400.0, grab.y - 400.0), Vec2::new(800.0, 600.0));
        m.pointer_up();
        let l = m.selected().unwrap();
        assert_eq!(l.size, Vec2::new(MIN_LAYER_SIZE, MIN_LAYER_SIZE));
    }

    #[test]
    fn rotate_gesture_accumulates_from_original() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        {
            let l = m.selected_mut().unwrap();
            l.set_rotation(350.0);
        }
        let (center, handle_pos) = {
            let l = m.selected().unwrap();
            let hw = l.size.x * 0.5;
            (
                l.center(),
                l.to_canvas(LayerHandle::RotateSe.local_pos(hw, hw)),
            )
        };
        assert!(m.pointer_down(handle_pos));

        // Swing the pointer 30° clockwise around the center
        let start_angle = angle_degrees(handle_pos - center);
        let r = (handle_pos - center).length();
        let a = (start_angle + 30.0).to_radians();
        let target = center + Vec2::new(a.cos(), a.sin()) * r;
        m.pointer_move(target, Vec2::new(800.0, 600.0));
        m.pointer_up();

        let got = m.selected().unwrap().rotation_degrees;
        assert!((got - 20.0).abs() < 0.5, "350 + 30 should wrap to 20, got {got}");
    }

    #[test]
    fn empty_click_deselects_and_gesture_ends() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        assert!(m.pointer_down(Pos2::new(5.0, 5.0)));
        assert!(m.selected().is_none());
        assert!(!m.pointer_up(), "no session after a deselect click");
    }

    #[test]
    fn move_without_down_is_ignored() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        let before = m.selected().unwrap().position;
        assert!(!m.pointer_move(Pos2::new(0.0, 0.0), Vec2::new(800.0, 600.0)));
        assert_eq!(m.selected().unwrap().position, before);
    }

    #[test]
    fn composite_respects_opacity_and_bounds() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        {
            let l = m.selected_mut().unwrap();
            l.opacity_percent = 50.0;
        }
        let mut base = RgbaImage::from_pixel(800, 600, Rgba([0, 0, 0, 255]));
        m.composite_over(&mut base);

        // Center of the layer: half-blend of green over black
        let p = *base.get_pixel(400, 300);
        assert!((p[1] as i32 - 100).abs() <= 2, "expected ~50% green, got {:?}", p);
        assert_eq!(p[3], 255);
        // Far corner untouched
        assert_eq!(*base.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn flatten_burns_layers_and_clears_list() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        let mut base = RgbaImage::from_pixel(800, 600, Rgba([0, 0, 0, 255]));
        assert!(m.flatten_into(&mut base));
        assert!(m.is_empty());
        assert_eq!(*base.get_pixel(400, 300), Rgba([10, 200, 10, 255]));
        assert!(!m.flatten_into(&mut base), "second flatten is a no-op");
    }

    #[test]
    fn update_transform_partial_fields() {
        let mut m = manager_with_layer(Vec2::new(100.0, 100.0));
        assert!(m.update_transform(LayerTransformUpdate {
            scale_percent: Some(50.0),
            rotation_degrees: None,
            opacity_percent: Some(25.0),
        }));
        let l = m.selected().unwrap();
        assert_eq!(l.size, Vec2::new(50.0, 50.0));
        assert_eq!(l.rotation_degrees, 0.0);
        assert_eq!(l.opacity_percent, 25.0);

        assert!(m.reset_selected_transform());
        let l = m.selected().unwrap();
        assert_eq!(l.size, Vec2::new(100.0, 100.0));
        assert_eq!(l.opacity_percent, 100.0);
    }
}
