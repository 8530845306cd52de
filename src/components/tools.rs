//! Tools — the closed tool set, its settings groups, and the per-tool
//! stroke state machine driven by pointer begin/continue/end.

use egui::{Color32, Pos2, Ui};

use crate::canvas::{CanvasState, to_rgba};
use crate::components::history::HistoryManager;
use crate::log_info;
use crate::ops::{self, ShapeKind, ShapeSpec, StrokeMode};

/// The closed set of tools.  Exactly one is active at a time; `Image` is the
/// interaction mode that routes pointer input to the layer manager instead
/// of the raster tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Bucket,
    Line,
    Rectangle,
    Ellipse,
    Triangle,
    Image,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Bucket => "Bucket",
            Tool::Line => "Line",
            Tool::Rectangle => "Rectangle",
            Tool::Ellipse => "Ellipse",
            Tool::Triangle => "Triangle",
            Tool::Image => "Image",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[
            Tool::Brush,
            Tool::Eraser,
            Tool::Bucket,
            Tool::Line,
            Tool::Rectangle,
            Tool::Ellipse,
            Tool::Triangle,
            Tool::Image,
        ]
    }

    /// The drag-to-draw shape this tool commits, if it is a shape tool.
    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            Tool::Line => Some(ShapeKind::Line),
            Tool::Rectangle => Some(ShapeKind::Rectangle),
            Tool::Ellipse => Some(ShapeKind::Ellipse),
            Tool::Triangle => Some(ShapeKind::Triangle),
            _ => None,
        }
    }
}

// ============================================================================
// SETTINGS GROUPS — read at stroke time, mutated through the panel or the
// explicit accessors, never through ambient globals.
// ============================================================================

/// Brush and eraser settings (the eraser shares size/opacity/hardness).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSettings {
    pub color: Color32,
    pub size: f32,
    pub opacity_percent: f32,
    pub hardness_percent: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            color: Color32::from_rgb(0xFF, 0x69, 0xB4),
            size: 5.0,
            opacity_percent: 100.0,
            hardness_percent: 100.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeSettings {
    pub stroke_color: Color32,
    pub fill_color: Color32,
    pub stroke_width: f32,
    pub fill_enabled: bool,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            stroke_color: Color32::from_rgb(0xFF, 0x69, 0xB4),
            fill_color: Color32::from_rgb(0xFF, 0xB6, 0xC1),
            stroke_width: 2.0,
            fill_enabled: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketSettings {
    /// Maximum per-channel color difference still considered matching.
    pub tolerance: u8,
}

impl Default for BucketSettings {
    fn default() -> Self {
        Self { tolerance: 10 }
    }
}

// ============================================================================
// STROKE STATE MACHINE
// ============================================================================

/// Transient per-stroke state, valid only between begin and end.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum StrokeState {
    #[default]
    Idle,
    Freehand {
        last: Pos2,
    },
    Shape {
        kind: ShapeKind,
        anchor: Pos2,
    },
}

/// The tool dispatcher: holds the active tool, the settings groups, and the
/// in-flight stroke state.
#[derive(Default)]
pub struct ToolsPanel {
    active: Tool,
    brush: BrushSettings,
    shape: ShapeSettings,
    bucket: BucketSettings,
    state: StrokeState,
}

impl ToolsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_tool(&self) -> Tool {
        self.active
    }

    pub fn stroke_active(&self) -> bool {
        self.state != StrokeState::Idle
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    pub fn brush_mut(&mut self) -> &mut BrushSettings {
        &mut self.brush
    }

    pub fn shape(&self) -> &ShapeSettings {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut ShapeSettings {
        &mut self.shape
    }

    pub fn bucket(&self) -> &BucketSettings {
        &self.bucket
    }

    pub fn bucket_mut(&mut self) -> &mut BucketSettings {
        &mut self.bucket
    }

    /// Switch the active tool, force-ending any stroke the previous tool
    /// left in flight: freehand marks are already on the raster and get
    /// snapshotted, an uncommitted shape preview is discarded.
    pub fn set_active_tool(
        &mut self,
        tool: Tool,
        canvas: &mut CanvasState,
        history: &mut HistoryManager,
    ) {
        if tool == self.active {
            return;
        }
        match self.state {
            StrokeState::Freehand { .. } => history.request_snapshot(),
            StrokeState::Shape { .. } => canvas.discard_preview(),
            StrokeState::Idle => {}
        }
        self.state = StrokeState::Idle;
        self.active = tool;
        log_info!("Tool switched to {}", tool.label());
    }

    // ---- stroke lifecycle --------------------------------------------------

    /// Pointer-down: first visible mark plus stroke-state setup.
    pub fn begin(&mut self, p: Pos2, canvas: &mut CanvasState, history: &mut HistoryManager) {
        match self.active {
            Tool::Brush | Tool::Eraser => {
                self.stroke_segment(canvas, p, p);
                self.state = StrokeState::Freehand { last: p };
                canvas.mark_dirty();
            }
            Tool::Bucket => {
                // Fill happens entirely on begin; continue/end do nothing
                if p.x < 0.0 || p.y < 0.0 {
                    return;
                }
                let filled = ops::flood_fill(
                    &mut canvas.pixels,
                    p.x.floor() as u32,
                    p.y.floor() as u32,
                    to_rgba(self.brush.color),
                    self.bucket.tolerance,
                );
                if filled {
                    canvas.mark_dirty();
                    history.request_snapshot();
                }
            }
            Tool::Line | Tool::Rectangle | Tool::Ellipse | Tool::Triangle => {
                let kind = self.active.shape_kind().expect("shape tool has a kind");
                canvas.open_preview();
                self.state = StrokeState::Shape { kind, anchor: p };
            }
            // Image-mode pointer input belongs to the layer manager
            Tool::Image => {}
        }
    }

    /// Pointer-move: extend the stroke.  Without a preceding begin this is a
    /// defensive no-op, not an error.
    pub fn continue_stroke(&mut self, p: Pos2, canvas: &mut CanvasState) {
        match self.state {
            StrokeState::Idle => {}
            StrokeState::Freehand { last } => {
                self.stroke_segment(canvas, last, p);
                self.state = StrokeState::Freehand { last: p };
                canvas.mark_dirty();
            }
            StrokeState::Shape { kind, anchor } => {
                // Redraw the whole preview; the base raster stays untouched
                canvas.clear_preview();
                let spec = self.shape_spec(kind, anchor, p);
                if let Some(preview) = canvas.preview.as_mut() {
                    ops::draw_shape(preview, &spec);
                }
                canvas.mark_dirty();
            }
        }
    }

    /// Pointer-up or leave: finalize the stroke and schedule a snapshot.
    pub fn end(&mut self, p: Pos2, canvas: &mut CanvasState, history: &mut HistoryManager) {
        let state = std::mem::take(&mut self.state);
        match state {
            StrokeState::Idle => {}
            StrokeState::Freehand { last } => {
                self.stroke_segment(canvas, last, p);
                canvas.mark_dirty();
                history.request_snapshot();
            }
            StrokeState::Shape { kind, anchor } => {
                let spec = self.shape_spec(kind, anchor, p);
                ops::draw_shape(&mut canvas.pixels, &spec);
                canvas.discard_preview();
                canvas.mark_dirty();
                history.request_snapshot();
            }
        }
    }

    fn stroke_segment(&self, canvas: &mut CanvasState, a: Pos2, b: Pos2) {
        let mode = match self.active {
            Tool::Eraser => StrokeMode::Erase(canvas.background),
            _ => StrokeMode::Paint(to_rgba(self.brush.color)),
        };
        ops::draw_segment(
            &mut canvas.pixels,
            a,
            b,
            self.brush.size,
            self.brush.hardness_percent / 100.0,
            self.brush.opacity_percent / 100.0,
            mode,
        );
    }

    fn shape_spec(&self, kind: ShapeKind, anchor: Pos2, p: Pos2) -> ShapeSpec {
        ShapeSpec {
            kind,
            start: anchor,
            end: p,
            stroke_color: to_rgba(self.shape.stroke_color),
            fill_color: to_rgba(self.shape.fill_color),
            stroke_width: self.shape.stroke_width,
            fill_enabled: self.shape.fill_enabled,
        }
    }

    // ---- options UI --------------------------------------------------------

    /// Per-tool option widgets for the side panel.
    pub fn ui(&mut self, ui: &mut Ui) {
        match self.active {
            Tool::Brush | Tool::Eraser => {
                if self.active == Tool::Brush {
                    ui.horizontal(|ui| {
                        ui.label("Color");
                        ui.color_edit_button_srgba(&mut self.brush.color);
                    });
                }
                ui.add(egui::Slider::new(&mut self.brush.size, 1.0..=100.0).text("Size"));
                ui.add(
                    egui::Slider::new(&mut self.brush.opacity_percent, 1.0..=100.0)
                        .text("Opacity %"),
                );
                ui.add(
                    egui::Slider::new(&mut self.brush.hardness_percent, 0.0..=100.0)
                        .text("Hardness %"),
                );
            }
            Tool::Bucket => {
                ui.horizontal(|ui| {
                    ui.label("Fill color");
                    ui.color_edit_button_srgba(&mut self.brush.color);
                });
                let mut tol = self.bucket.tolerance as f32;
                ui.add(egui::Slider::new(&mut tol, 0.0..=128.0).text("Tolerance"));
                self.bucket.tolerance = tol.round() as u8;
            }
            Tool::Line => {
                ui.horizontal(|ui| {
                    ui.label("Stroke");
                    ui.color_edit_button_srgba(&mut self.shape.stroke_color);
                });
                ui.add(egui::Slider::new(&mut self.shape.stroke_width, 1.0..=50.0).text("Width"));
            }
            Tool::Rectangle | Tool::Ellipse | Tool::Triangle => {
                ui.horizontal(|ui| {
                    ui.label("Stroke");
                    ui.color_edit_button_srgba(&mut self.shape.stroke_color);
                });
                ui.add(egui::Slider::new(&mut self.shape.stroke_width, 1.0..=50.0).text("Width"));
                ui.checkbox(&mut self.shape.fill_enabled, "Fill");
                if self.shape.fill_enabled {
                    ui.horizontal(|ui| {
                        ui.label("Fill color");
                        ui.color_edit_button_srgba(&mut self.shape.fill_color);
                    });
                }
            }
            Tool::Image => {
                ui.label("Click an image to select it; drag to move, use the");
                ui.label("corner handles to resize and the outer handles to rotate.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::time::Duration;

    const BG: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn setup() -> (ToolsPanel, CanvasState, HistoryManager) {
        (
            ToolsPanel::new(),
            CanvasState::new(64, 64, BG).unwrap(),
            HistoryManager::with_limits(50, Duration::ZERO),
        )
    }

    #[test]
    fn brush_stroke_marks_raster_and_requests_snapshot() {
        let (mut tools, mut canvas, mut history) = setup();
        tools.begin(Pos2::new(10.0, 10.0), &mut canvas, &mut history);
        tools.continue_stroke(Pos2::new(30.0, 10.0), &mut canvas);
        tools.end(Pos2::new(30.0, 30.0), &mut canvas, &mut history);

        assert_ne!(*canvas.pixels.get_pixel(10, 10), BG);
        assert_ne!(*canvas.pixels.get_pixel(20, 10), BG);
        assert!(history.has_pending());
        assert!(!tools.stroke_active());
    }

    #[test]
    fn continue_and_end_without_begin_are_noops() {
        let (mut tools, mut canvas, mut history) = setup();
        let before = canvas.pixels.clone();
        tools.continue_stroke(Pos2::new(5.0, 5.0), &mut canvas);
        tools.end(Pos2::new(6.0, 6.0), &mut canvas, &mut history);
        assert_eq!(canvas.pixels.as_raw(), before.as_raw());
        assert!(!history.has_pending());
    }

    #[test]
    fn eraser_restores_background() {
        let (mut tools, mut canvas, mut history) = setup();
        // Paint a black blob first
        tools.brush_mut().color = Color32::BLACK;
        tools.brush_mut().size = 10.0;
        tools.begin(Pos2::new(20.0, 20.0), &mut canvas, &mut history);
        tools.end(Pos2::new(20.0, 20.0), &mut canvas, &mut history);
        assert_ne!(*canvas.pixels.get_pixel(20, 20), BG);

        tools.set_active_tool(Tool::Eraser, &mut canvas, &mut history);
        tools.begin(Pos2::new(20.0, 20.0), &mut canvas, &mut history);
        tools.end(Pos2::new(20.0, 20.0), &mut canvas, &mut history);
        assert_eq!(*canvas.pixels.get_pixel(20, 20), BG);
    }

    #[test]
    fn shape_preview_leaves_base_untouched_until_commit() {
        let (mut tools, mut canvas, mut history) = setup();
        tools.set_active_tool(Tool::Rectangle, &mut canvas, &mut history);

        tools.begin(Pos2::new(8.0, 8.0), &mut canvas, &mut history);
        tools.continue_stroke(Pos2::new(40.0, 40.0), &mut canvas);
        // Mid-drag: preview holds the shape, base raster is clean
        assert!(canvas.preview.is_some());
        assert!(canvas.pixels.pixels().all(|p| *p == BG));

        tools.end(Pos2::new(40.0, 40.0), &mut canvas, &mut history);
        assert!(canvas.preview.is_none());
        // Outline committed onto the base
        assert_ne!(*canvas.pixels.get_pixel(24, 8), BG);
        assert!(history.has_pending());
    }

    #[test]
    fn bucket_fills_on_begin_only() {
        let (mut tools, mut canvas, mut history) = setup();
        tools.set_active_tool(Tool::Bucket, &mut canvas, &mut history);
        tools.brush_mut().color = Color32::BLACK;

        tools.begin(Pos2::new(32.0, 32.0), &mut canvas, &mut history);
        assert!(canvas.pixels.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
        assert!(history.has_pending());

        // continue/end change nothing
        let before = canvas.pixels.clone();
        tools.continue_stroke(Pos2::new(5.0, 5.0), &mut canvas);
        tools.end(Pos2::new(5.0, 5.0), &mut canvas, &mut history);
        assert_eq!(canvas.pixels.as_raw(), before.as_raw());
    }

    #[test]
    fn bucket_noop_when_color_already_matches() {
        let (mut tools, mut canvas, mut history) = setup();
        tools.set_active_tool(Tool::Bucket, &mut canvas, &mut history);
        tools.brush_mut().color = Color32::WHITE; // canvas is already white
        tools.begin(Pos2::new(32.0, 32.0), &mut canvas, &mut history);
        assert!(!history.has_pending(), "no-op fill must not snapshot");
    }

    #[test]
    fn tool_switch_discards_inflight_shape_preview() {
        let (mut tools, mut canvas, mut history) = setup();
        tools.set_active_tool(Tool::Ellipse, &mut canvas, &mut history);
        tools.begin(Pos2::new(10.0, 10.0), &mut canvas, &mut history);
        tools.continue_stroke(Pos2::new(30.0, 30.0), &mut canvas);
        assert!(canvas.preview.is_some());

        tools.set_active_tool(Tool::Brush, &mut canvas, &mut history);
        assert!(canvas.preview.is_none());
        assert!(!tools.stroke_active());
        assert!(canvas.pixels.pixels().all(|p| *p == BG));
    }
}
