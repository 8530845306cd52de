//! SketchFE — a single-canvas raster sketch tool: freehand brush and
//! eraser, flood fill, drag-to-draw shapes with live preview, floating image
//! layers with move/scale/rotate/flip gestures, and bounded snapshot
//! undo/redo.

pub mod app;
pub mod canvas;
pub mod components;
pub mod io;
pub mod logger;
pub mod ops;

pub use app::SketchFEApp;
pub use canvas::CanvasState;
pub use components::{HistoryManager, ImageLayerManager, Tool, ToolsPanel};
