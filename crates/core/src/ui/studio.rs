//! Main studio application.
//!
//! `StyleStudio` implements `eframe::App`: a control panel on the left
//! (image picker, preset styles, prompt, generate) and the output area on
//! the right rendering the controller's current [`ViewState`].

use super::rendering::{fit_size, show_fitted, TextureSlot};
use crate::controller::{Controller, LifecycleState, ViewState};
use crate::error::Result;
use crate::image_processing::{MediaType, Preview, SelectedImage};
use crate::presets::STYLE_PRESETS;
use directories::UserDirs;
use eframe::egui;
use rfd::FileDialog;
use std::path::{Path, PathBuf};

const PANEL_WIDTH: f32 = 320.0;
const THUMBNAIL_HEIGHT: f32 = 220.0;

/// The restyle window.
pub struct StyleStudio {
    controller: Controller,

    // Prompt field contents, mirrored into the controller on every edit
    prompt_input: String,

    // Textures
    preview_texture: TextureSlot,
    result_texture: TextureSlot,
    result_preview: Option<Preview>,
    result_key: u64,

    // Status line under the controls (load errors, download location)
    notice: Option<String>,
    download_dir: PathBuf,
}

impl StyleStudio {
    /// Creates the studio around `controller`, wiring its notifications to
    /// repaints of `ctx`.
    pub fn new(ctx: egui::Context, mut controller: Controller) -> Self {
        let repaint_ctx = ctx.clone();
        controller.subscribe(move |state| {
            tracing::debug!(?state, "lifecycle changed");
            repaint_ctx.request_repaint();
        });
        controller.on_completion(move || ctx.request_repaint());

        let prompt_input = controller.prompt().to_string();

        Self {
            controller,
            prompt_input,
            preview_texture: TextureSlot::default(),
            result_texture: TextureSlot::default(),
            result_preview: None,
            result_key: 0,
            notice: None,
            download_dir: default_download_dir(),
        }
    }

    fn select_image(&mut self, loaded: Result<SelectedImage>) {
        match loaded {
            Ok(image) => {
                self.notice = None;
                self.controller.select_image(image);
                self.refresh_result();
            }
            Err(e) => {
                tracing::warn!("could not load image: {e}");
                self.notice = Some(e.to_string());
            }
        }
    }

    fn pick_image(&mut self) {
        let picked = FileDialog::new()
            .set_title("Choose an image")
            .add_filter("Images", MediaType::EXTENSIONS)
            .pick_file();

        if let Some(path) = picked {
            self.select_image(SelectedImage::from_path(path));
        }
    }

    /// Accepts the first file dropped onto the window.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.first().cloned());
        let Some(file) = dropped else {
            return;
        };

        if let Some(path) = file.path {
            self.select_image(SelectedImage::from_path(path));
        } else if let Some(bytes) = file.bytes {
            self.select_image(SelectedImage::from_dropped(file.name, &file.mime, bytes.to_vec()));
        }
    }

    /// Re-decodes the result preview after the controller's result changed.
    fn refresh_result(&mut self) {
        self.result_preview = None;
        if let Some(result) = self.controller.result() {
            self.result_key += 1;
            match result.preview() {
                Ok(preview) => self.result_preview = Some(preview),
                Err(e) => tracing::warn!("result cannot be previewed: {e}"),
            }
        }
    }

    fn generate(&mut self) {
        self.notice = None;
        self.controller.set_prompt(self.prompt_input.clone());
        self.controller.generate();
        self.refresh_result();
    }

    fn download(&mut self) {
        match self.controller.download(&self.download_dir) {
            Ok(Some(path)) => self.notice = Some(format!("Saved to {}", path.display())),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("download failed: {e}");
                self.notice = Some(format!("Could not save image: {}", e));
            }
        }
    }

    /// Renders the left control panel.
    fn render_controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Restyle");
        ui.label("Turn a photo into a new style with Gemini.");
        ui.separator();

        // Image
        ui.label(egui::RichText::new("1. Image").strong());
        if ui.button("Upload image…").clicked() {
            self.pick_image();
        }

        let source = self
            .controller
            .selected_image()
            .and_then(|image| image.preview().map(|preview| (image.id(), preview)));
        match self.preview_texture.sync(ctx, "selected-preview", source) {
            Some(texture) => {
                let size = fit_size(
                    texture.size_vec2(),
                    egui::vec2(ui.available_width(), THUMBNAIL_HEIGHT),
                );
                ui.add(egui::Image::new((texture.id(), size)));
            }
            None => {
                ui.label(egui::RichText::new("or drop a PNG, JPEG or WEBP file here").weak());
            }
        }
        let mut remove_clicked = false;
        if let Some(image) = self.controller.selected_image() {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(image.file_name()).small());
                remove_clicked = ui.small_button("Remove").clicked();
            });
        }
        if remove_clicked {
            self.notice = None;
            self.controller.clear_image();
            self.refresh_result();
        }

        ui.add_space(8.0);
        ui.separator();

        // Style
        ui.label(egui::RichText::new("2. Style").strong());
        ui.horizontal_wrapped(|ui| {
            for preset in STYLE_PRESETS {
                if ui
                    .selectable_value(&mut self.prompt_input, preset.to_string(), *preset)
                    .clicked()
                {
                    self.controller.set_prompt(*preset);
                }
            }
        });

        ui.label("Or describe your own:");
        let response = ui.add(
            egui::TextEdit::multiline(&mut self.prompt_input)
                .desired_rows(3)
                .desired_width(f32::INFINITY)
                .hint_text("e.g., Make it look like a stained glass window"),
        );
        if response.changed() {
            self.controller.set_prompt(self.prompt_input.clone());
        }

        ui.add_space(8.0);
        ui.separator();

        // Generate
        let loading = self.controller.is_loading();
        let label = if loading { "Generating…" } else { "Generate" };
        if ui
            .add_enabled(!loading, egui::Button::new(label).min_size(egui::vec2(ui.available_width(), 32.0)))
            .clicked()
        {
            self.generate();
        }

        if let Some(notice) = &self.notice {
            ui.add_space(6.0);
            ui.label(egui::RichText::new(notice).small());
        }
    }

    /// Renders the output area for the current view state.
    fn render_output(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let mut download_clicked = false;

        match self.controller.view() {
            ViewState::Empty => {
                self.result_texture.release();
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new("Upload an image to get started").weak());
                });
            }
            ViewState::Ready => {
                self.result_texture.release();
                ui.centered_and_justified(|ui| {
                    ui.label(
                        egui::RichText::new("Pick a style and press Generate. Your styled image will appear here.")
                            .weak(),
                    );
                });
            }
            ViewState::Loading => {
                self.result_texture.release();
                ui.centered_and_justified(|ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Generating your image…");
                    });
                });
            }
            ViewState::Result(_) => {
                ui.horizontal(|ui| {
                    ui.heading("Result");
                    if ui.button("Download").clicked() {
                        download_clicked = true;
                    }
                });
                ui.separator();

                let source = self.result_preview.as_ref().map(|preview| (self.result_key, preview));
                match self.result_texture.sync(ctx, "result", source) {
                    Some(texture) => show_fitted(ui, texture),
                    None => {
                        ui.label("The image is ready but cannot be previewed. Download it to view.");
                    }
                }
            }
            ViewState::Error(message) => {
                self.result_texture.release();
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new(format!("Error: {}", message)).color(egui::Color32::RED));
                });
            }
        }

        if download_clicked {
            self.download();
        }
    }
}

impl eframe::App for StyleStudio {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply finished requests before drawing
        if self.controller.poll() {
            self.refresh_result();
        }

        self.handle_dropped_files(ctx);

        egui::SidePanel::left("controls")
            .resizable(false)
            .exact_width(PANEL_WIDTH)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_controls(ui, ctx);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_output(ui, ctx);
        });

        // Keep the spinner animating while a request is in flight
        if self.controller.lifecycle() == LifecycleState::Loading {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

fn default_download_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
