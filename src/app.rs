//! Application shell — the eframe frame loop that routes pointer input to
//! the drawing tools or the image-layer manager, keeps the composite texture
//! fresh, and hosts the toolbar and option panels.

use std::time::Duration;

use eframe::egui;
use egui::{
    Color32, ColorImage, Context, CursorIcon, Key, Pos2, Rect, Sense, Shape, Stroke,
    TextureFilter, TextureHandle, TextureOptions, Vec2,
};

use crate::canvas::{CanvasState, to_rgba};
use crate::components::images::{HANDLE_SIZE, LayerHandle};
use crate::components::{
    HistoryManager, ImageLayerManager, LayerTransformUpdate, NoticeKind, Notices, Tool, ToolsPanel,
};
use crate::io::{self, ImportError};
use crate::{log_err, log_info};

/// Backing-store resolution of the drawing surface.
pub const CANVAS_WIDTH: u32 = 960;
pub const CANVAS_HEIGHT: u32 = 640;

/// Default surface background (the original's dark red).
const DEFAULT_BACKGROUND: Color32 = Color32::from_rgb(0x8B, 0x00, 0x00);

/// Grid overlay spacing in canvas units.
const GRID_STEP: f32 = 20.0;
const GRID_COLOR: Color32 = Color32::from_rgba_premultiplied(128, 114, 112, 128);

const SELECTION_COLOR: Color32 = Color32::from_rgb(0x00, 0x7A, 0xCC);
const ROTATE_HANDLE_COLOR: Color32 = Color32::from_rgb(0xFF, 0x6B, 0x35);

pub struct SketchFEApp {
    canvas: CanvasState,
    tools: ToolsPanel,
    history: HistoryManager,
    images: ImageLayerManager,
    notices: Notices,

    /// Cached upload of the current composite.
    texture: Option<TextureHandle>,
    uploaded_generation: u64,
    /// Canvas display size of the previous frame, used as the placement
    /// bound for imports triggered from the toolbar.
    last_display_size: Vec2,
    /// Last mapped pointer position of an in-flight drag (release fallback).
    last_pointer: Option<Pos2>,

    show_grid: bool,
    background_edit: Color32,
}

impl SketchFEApp {
    /// Fails fast when the backing surface cannot be constructed — the app
    /// must never run without a raster.
    pub fn new() -> Result<Self, String> {
        let canvas = CanvasState::new(CANVAS_WIDTH, CANVAS_HEIGHT, to_rgba(DEFAULT_BACKGROUND))?;
        let mut history = HistoryManager::new();
        // Baseline entry so the first stroke can be undone back to empty
        history.request_snapshot();
        history.flush(&canvas.pixels);

        log_info!("Canvas ready at {}x{}", CANVAS_WIDTH, CANVAS_HEIGHT);
        Ok(Self {
            canvas,
            tools: ToolsPanel::new(),
            history,
            images: ImageLayerManager::new(),
            notices: Notices::new(),
            texture: None,
            uploaded_generation: 0,
            last_display_size: Vec2::new(CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32),
            last_pointer: None,
            show_grid: false,
            background_edit: DEFAULT_BACKGROUND,
        })
    }

    fn canvas_size(&self) -> Vec2 {
        Vec2::new(self.canvas.width as f32, self.canvas.height as f32)
    }

    // ---- commands ----------------------------------------------------------

    fn undo(&mut self) {
        if self.history.undo(&mut self.canvas.pixels) {
            self.canvas.mark_dirty();
            self.notices.push(NoticeKind::Info, "Undid last change");
        }
    }

    fn redo(&mut self) {
        if self.history.redo(&mut self.canvas.pixels) {
            self.canvas.mark_dirty();
            self.notices.push(NoticeKind::Info, "Redid change");
        }
    }

    fn clear_canvas(&mut self) {
        self.canvas.clear();
        self.history.request_snapshot();
        self.notices.push(NoticeKind::Info, "Canvas cleared");
    }

    fn import_image(&mut self) {
        let Some(path) = io::pick_import_path() else {
            return;
        };
        match io::load_image_file(&path) {
            Ok(pixels) => {
                self.images
                    .add_layer(pixels, self.last_display_size, self.canvas_size());
                // Jump into image mode so the new layer is immediately
                // manipulable
                self.tools
                    .set_active_tool(Tool::Image, &mut self.canvas, &mut self.history);
                self.canvas.mark_dirty();
                self.notices.push(NoticeKind::Success, "Image added");
            }
            Err(ImportError::Rejected(msg)) => {
                self.notices.push(NoticeKind::Warning, msg);
            }
            Err(ImportError::Failed(msg)) => {
                log_err!("Import failed: {}", msg);
                self.notices.push(NoticeKind::Error, msg);
            }
        }
    }

    fn export_png(&mut self) {
        let Some(path) = io::pick_export_path() else {
            return;
        };
        let mut composite = self.canvas.composite_base();
        self.images.composite_over(&mut composite);
        match io::export_png(&path, &composite) {
            Ok(()) => self
                .notices
                .push(NoticeKind::Success, format!("Exported {}", path.display())),
            Err(msg) => {
                log_err!("Export failed: {}", msg);
                self.notices.push(NoticeKind::Error, msg);
            }
        }
    }

    // ---- input -------------------------------------------------------------

    fn handle_canvas_pointer(&mut self, response: &egui::Response, display_rect: Rect) {
        let image_mode = self.tools.active_tool() == Tool::Image;
        let mapped = response
            .interact_pointer_pos()
            .map(|pos| self.canvas.screen_to_canvas(pos, display_rect));

        if let Some(p) = mapped {
            if response.drag_started() {
                self.last_pointer = Some(p);
                if image_mode {
                    if self.images.pointer_down(p) {
                        self.canvas.mark_dirty();
                    }
                } else {
                    self.tools.begin(p, &mut self.canvas, &mut self.history);
                }
            } else if response.dragged() && self.last_pointer != Some(p) {
                // dragged() stays true on frames without movement; only a
                // changed position extends the stroke (repeated blending at
                // one spot would darken semi-transparent strokes)
                self.last_pointer = Some(p);
                if image_mode {
                    if self.images.pointer_move(p, self.canvas_size()) {
                        self.canvas.mark_dirty();
                    }
                } else {
                    self.tools.continue_stroke(p, &mut self.canvas);
                }
            }
        }

        if response.drag_released() {
            // The release frame may no longer report an interact position;
            // fall back to the last one seen during the drag
            let p = mapped.or(self.last_pointer.take());
            if let Some(p) = p {
                if image_mode {
                    if self.images.pointer_up() {
                        self.canvas.mark_dirty();
                    }
                } else {
                    self.tools.end(p, &mut self.canvas, &mut self.history);
                }
            }
            self.last_pointer = None;
        }
    }

    fn handle_keyboard(&mut self, ctx: &Context) {
        if ctx.wants_keyboard_input() {
            return;
        }

        let (undo, redo) = ctx.input(|i| {
            (
                i.modifiers.command && i.key_pressed(Key::Z),
                i.modifiers.command && i.key_pressed(Key::Y),
            )
        });
        if undo {
            self.undo();
        }
        if redo {
            self.redo();
        }

        if self.tools.active_tool() != Tool::Image {
            return;
        }

        let (delete, up, down, left, right) = ctx.input(|i| {
            (
                i.key_pressed(Key::Delete) || i.key_pressed(Key::Backspace),
                i.key_pressed(Key::ArrowUp),
                i.key_pressed(Key::ArrowDown),
                i.key_pressed(Key::ArrowLeft),
                i.key_pressed(Key::ArrowRight),
            )
        });

        if delete && self.images.remove_selected() {
            self.canvas.mark_dirty();
            self.notices.push(NoticeKind::Success, "Image removed");
        }
        let nudge = Vec2::new(
            (right as i8 - left as i8) as f32,
            (down as i8 - up as i8) as f32,
        );
        if nudge != Vec2::ZERO && self.images.nudge_selected(nudge, self.canvas_size()) {
            self.canvas.mark_dirty();
        }
    }

    // ---- display -----------------------------------------------------------

    /// Recomposite and (re-)upload the display texture when anything visible
    /// changed since the last upload.
    fn refresh_texture(&mut self, ctx: &Context) {
        let generation = self.canvas.dirty_generation;
        if self.texture.is_some() && self.uploaded_generation == generation {
            return;
        }
        let mut composite = self.canvas.composite_base();
        self.images.composite_over(&mut composite);
        let color_image = ColorImage::from_rgba_unmultiplied(
            [self.canvas.width as usize, self.canvas.height as usize],
            composite.as_raw(),
        );
        let options = TextureOptions {
            magnification: TextureFilter::Linear,
            minification: TextureFilter::Linear,
            ..Default::default()
        };
        if let Some(tex) = self.texture.as_mut() {
            tex.set(color_image, options);
        } else {
            self.texture = Some(ctx.load_texture("canvas_composite", color_image, options));
        }
        self.uploaded_generation = generation;
    }

    fn draw_grid(&self, painter: &egui::Painter, display_rect: Rect) {
        let stroke = Stroke::new(1.0, GRID_COLOR);
        let step_x = GRID_STEP * display_rect.width() / self.canvas.width as f32;
        let step_y = GRID_STEP * display_rect.height() / self.canvas.height as f32;

        let mut x = display_rect.min.x;
        while x <= display_rect.max.x + 0.5 {
            painter.line_segment(
                [
                    Pos2::new(x, display_rect.min.y),
                    Pos2::new(x, display_rect.max.y),
                ],
                stroke,
            );
            x += step_x;
        }
        let mut y = display_rect.min.y;
        while y <= display_rect.max.y + 0.5 {
            painter.line_segment(
                [
                    Pos2::new(display_rect.min.x, y),
                    Pos2::new(display_rect.max.x, y),
                ],
                stroke,
            );
            y += step_y;
        }
    }

    /// Dashed bounding outline plus resize/rotate handles for the selected
    /// layer, drawn in screen space via the layer's own forward transform so
    /// the chrome follows rotation and flips exactly.
    fn draw_selection_chrome(&self, painter: &egui::Painter, display_rect: Rect) {
        let Some(layer) = self.images.selected() else {
            return;
        };
        let hw = layer.size.x * 0.5;
        let hh = layer.size.y * 0.5;
        let to_screen =
            |local: Vec2| self.canvas.canvas_to_screen(layer.to_canvas(local), display_rect);

        // Dashed border
        let corners = [
            to_screen(Vec2::new(-hw, -hh)),
            to_screen(Vec2::new(hw, -hh)),
            to_screen(Vec2::new(hw, hh)),
            to_screen(Vec2::new(-hw, hh)),
        ];
        let border = Stroke::new(2.0, SELECTION_COLOR);
        for i in 0..4 {
            painter.extend(Shape::dashed_line(
                &[corners[i], corners[(i + 1) % 4]],
                border,
                5.0,
                5.0,
            ));
        }

        let display_scale = display_rect.width() / self.canvas.width as f32;

        // Corner resize handles: small squares in the layer frame
        let half = HANDLE_SIZE * 0.5;
        for handle in [
            LayerHandle::ResizeNw,
            LayerHandle::ResizeNe,
            LayerHandle::ResizeSw,
            LayerHandle::ResizeSe,
        ] {
            let c = handle.local_pos(hw, hh);
            let square = vec![
                to_screen(c + Vec2::new(-half, -half)),
                to_screen(c + Vec2::new(half, -half)),
                to_screen(c + Vec2::new(half, half)),
                to_screen(c + Vec2::new(-half, half)),
            ];
            painter.add(Shape::convex_polygon(
                square,
                SELECTION_COLOR,
                Stroke::new(1.0, Color32::WHITE),
            ));
        }

        // Rotate handles: circles floating off the corners
        for handle in [
            LayerHandle::RotateNw,
            LayerHandle::RotateNe,
            LayerHandle::RotateSw,
            LayerHandle::RotateSe,
        ] {
            let center = to_screen(handle.local_pos(hw, hh));
            let radius = (half + 2.0) * display_scale;
            painter.circle_filled(center, radius, ROTATE_HANDLE_COLOR);
            painter.circle_stroke(center, radius, Stroke::new(1.0, Color32::WHITE));
        }
    }

    fn update_hover_cursor(&self, ctx: &Context, response: &egui::Response, display_rect: Rect) {
        if self.tools.active_tool() != Tool::Image {
            return;
        }
        if self.images.gesture_active() {
            ctx.output_mut(|o| o.cursor_icon = CursorIcon::Grabbing);
            return;
        }
        if let Some(pos) = response.hover_pos() {
            let p = self.canvas.screen_to_canvas(pos, display_rect);
            if let Some(icon) = self.images.hover_cursor(p) {
                ctx.output_mut(|o| o.cursor_icon = icon);
            }
        }
    }

    // ---- panels ------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for &tool in Tool::all() {
                let selected = self.tools.active_tool() == tool;
                if ui.selectable_label(selected, tool.label()).clicked() && !selected {
                    self.tools
                        .set_active_tool(tool, &mut self.canvas, &mut self.history);
                }
            }

            ui.separator();

            let can_undo = self.history.can_undo();
            if ui
                .add_enabled(can_undo, egui::Button::new("Undo"))
                .clicked()
            {
                self.undo();
            }
            let can_redo = self.history.can_redo();
            if ui
                .add_enabled(can_redo, egui::Button::new("Redo"))
                .clicked()
            {
                self.redo();
            }

            ui.separator();

            if ui.button("Clear").clicked() {
                self.clear_canvas();
            }
            ui.toggle_value(&mut self.show_grid, "Grid");
            ui.label("Background");
            if ui
                .color_edit_button_srgba(&mut self.background_edit)
                .changed()
            {
                self.canvas.set_background(to_rgba(self.background_edit));
                self.history.request_snapshot();
            }

            ui.separator();

            if ui.button("Import image…").clicked() {
                self.import_image();
            }
            if ui.button("Export PNG…").clicked() {
                self.export_png();
            }
        });
    }

    fn layer_panel(&mut self, ui: &mut egui::Ui) {
        ui.separator();
        ui.heading("Layer");

        let Some(layer) = self.images.selected() else {
            if self.images.is_empty() {
                ui.label("No images placed yet.");
            } else {
                ui.label("Click an image to select it.");
            }
            return;
        };

        let mut scale = layer.scale_percent;
        let mut rotation = layer.rotation_degrees;
        let mut opacity = layer.opacity_percent;

        let mut update = LayerTransformUpdate::default();
        if ui
            .add(egui::Slider::new(&mut scale, 10.0..=300.0).text("Scale %"))
            .changed()
        {
            update.scale_percent = Some(scale);
        }
        if ui
            .add(egui::Slider::new(&mut rotation, 0.0..=359.9).text("Rotation °"))
            .changed()
        {
            update.rotation_degrees = Some(rotation);
        }
        if ui
            .add(egui::Slider::new(&mut opacity, 0.0..=100.0).text("Opacity %"))
            .changed()
        {
            update.opacity_percent = Some(opacity);
        }
        let any_change = update.scale_percent.is_some()
            || update.rotation_degrees.is_some()
            || update.opacity_percent.is_some();
        if any_change && self.images.update_transform(update) {
            self.canvas.mark_dirty();
        }

        ui.horizontal(|ui| {
            if ui.button("Flip H").clicked() && self.images.flip_selected_horizontal() {
                self.canvas.mark_dirty();
            }
            if ui.button("Flip V").clicked() && self.images.flip_selected_vertical() {
                self.canvas.mark_dirty();
            }
            if ui.button("Reset").clicked() && self.images.reset_selected_transform() {
                self.canvas.mark_dirty();
            }
        });

        ui.horizontal(|ui| {
            if ui.button("Remove").clicked() && self.images.remove_selected() {
                self.canvas.mark_dirty();
                self.notices.push(NoticeKind::Success, "Image removed");
            }
            if ui.button("Flatten onto canvas").clicked()
                && self.images.flatten_into(&mut self.canvas.pixels)
            {
                self.canvas.mark_dirty();
                self.history.request_snapshot();
                self.notices.push(NoticeKind::Success, "Layers flattened");
            }
        });

        if !self.images.is_empty() && ui.button("Clear all images").clicked() {
            self.images.clear_all();
            self.canvas.mark_dirty();
        }
    }

    fn central_canvas(&mut self, ui: &mut egui::Ui, ctx: &Context) {
        // Fit the canvas into the available space, preserving aspect ratio
        let avail = ui.available_rect_before_wrap();
        let scale = (avail.width() / self.canvas.width as f32)
            .min(avail.height() / self.canvas.height as f32)
            .max(0.01);
        let display_size = self.canvas_size() * scale;
        let display_rect = Rect::from_center_size(avail.center(), display_size);
        self.last_display_size = display_size;

        let response = ui.allocate_rect(display_rect, Sense::click_and_drag());
        self.handle_canvas_pointer(&response, display_rect);

        self.refresh_texture(ctx);

        let painter = ui.painter_at(avail);
        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                display_rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        if self.show_grid {
            self.draw_grid(&painter, display_rect);
        }
        if self.tools.active_tool() == Tool::Image {
            self.draw_selection_chrome(&painter, display_rect);
        }
        self.update_hover_cursor(ctx, &response, display_rect);
    }
}

impl eframe::App for SketchFEApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        // Debounced history capture rides the frame loop; keep frames coming
        // while one is pending
        if self.history.tick(&self.canvas.pixels) {
            log_info!("History snapshot committed ({} entries)", self.history.len());
        }
        if self.history.has_pending() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        self.handle_keyboard(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui);
        });

        egui::SidePanel::left("tool_options")
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Tool options");
                self.tools.ui(ui);
                if self.tools.active_tool() == Tool::Image {
                    self.layer_panel(ui);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.central_canvas(ui, ctx);
        });

        self.notices.show(ctx);
    }
}
