// ============================================================================
// COMPONENTS MODULE — Stateful building blocks of the SketchFE session
// ============================================================================
//
//   tools.rs    — tool set, settings groups, stroke state machine
//   history.rs  — bounded snapshot undo/redo with debounced capture
//   images.rs   — floating image layers and their gesture handling
//   notices.rs  — transient toast notifications
// ============================================================================

pub mod history;
pub mod images;
pub mod notices;
pub mod tools;

pub use history::HistoryManager;
pub use images::{ImageLayer, ImageLayerManager, LayerHandle, LayerTransformUpdate};
pub use notices::{NoticeKind, Notices};
pub use tools::{BrushSettings, BucketSettings, ShapeSettings, Tool, ToolsPanel};
