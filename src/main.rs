// GUI-subsystem binary on Windows: no console window is allocated.
#![windows_subsystem = "windows"]

use eframe::egui;
use sketchfe::SketchFEApp;
use sketchfe::{log_err, logger};

fn main() -> Result<(), eframe::Error> {
    // Initialize session log (overwrites previous session's log)
    logger::init();

    // Surface construction is the one fatal failure: never run without a
    // raster
    let app = match SketchFEApp::new() {
        Ok(app) => app,
        Err(e) => {
            log_err!("Startup failed: {}", e);
            eprintln!("SketchFE failed to start: {}", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("SketchFE"),
        ..Default::default()
    };

    eframe::run_native("SketchFE", options, Box::new(move |_cc| Box::new(app)))
}
