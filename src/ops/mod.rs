// ============================================================================
// OPS MODULE — Pure raster algorithms for SketchFE
// ============================================================================
//
//   fill.rs    — iterative 4-connected flood fill with color tolerance
//   stroke.rs  — round-capped capsule segments for brush/eraser strokes
//   shapes.rs  — SDF rasterization of line/rectangle/ellipse/triangle
//
// Everything in here operates on plain `image::RgbaImage` buffers and has no
// UI or state dependencies, so it is all unit-testable in isolation.
// ============================================================================

pub mod fill;
pub mod shapes;
pub mod stroke;

pub use fill::flood_fill;
pub use shapes::{ShapeKind, ShapeSpec, draw_shape};
pub use stroke::{StrokeMode, draw_segment};
