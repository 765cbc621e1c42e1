//! User interface for restyle.
//!
//! A single native window built on eframe/egui that drives the
//! [`Controller`](crate::controller::Controller).
//!
//! # Architecture
//!
//! - [`rendering`]: texture bookkeeping and image layout helpers
//! - [`studio`]: the `eframe::App` implementation
//!
//! # Usage
//!
//! ```ignore
//! use restyle_core::{ui, Config};
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! ui::run_studio(Config::load(), runtime.handle().clone())?;
//! ```

mod rendering;
mod studio;

pub use rendering::TextureSlot;
pub use studio::StyleStudio;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::{AppError, Result};
use crate::gemini::GenerationClient;
use eframe::egui;
use tokio::runtime::Handle;

/// Opens the studio window and blocks until it is closed.
///
/// Generation requests run on `runtime`; the window itself runs on the
/// calling thread.
///
/// # Errors
///
/// Returns [`AppError::Ui`] if the window cannot be created.
pub fn run_studio(config: Config, runtime: Handle) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Restyle")
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([720.0, 480.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Restyle",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            let controller = Controller::new(GenerationClient::new(config), runtime);
            Ok(Box::new(StyleStudio::new(cc.egui_ctx.clone(), controller)) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}
