//! Rendering helpers for the studio window.
//!
//! Holds the GPU texture bookkeeping for previews and results, plus a small
//! layout helper for fitting images into the available space.

use crate::image_processing::Preview;
use eframe::egui;

/// A texture tied to the id of the image it was uploaded from.
///
/// Re-syncing with a different id drops the old [`egui::TextureHandle`],
/// which frees the GPU texture. Syncing with `None` releases it outright.
#[derive(Default)]
pub struct TextureSlot {
    current: Option<(u64, egui::TextureHandle)>,
}

impl TextureSlot {
    /// Makes the slot hold a texture for `source`, uploading only when the
    /// id changed. Returns the texture to draw, if any.
    pub fn sync(
        &mut self,
        ctx: &egui::Context,
        name: &str,
        source: Option<(u64, &Preview)>,
    ) -> Option<&egui::TextureHandle> {
        match source {
            Some((id, preview)) => {
                let stale = self.current.as_ref().is_none_or(|(current, _)| *current != id);
                if stale {
                    let color_image =
                        egui::ColorImage::from_rgba_unmultiplied(preview.size, &preview.rgba);
                    let texture = ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR);
                    self.current = Some((id, texture));
                }
            }
            None => self.release(),
        }
        self.current.as_ref().map(|(_, texture)| texture)
    }

    pub fn release(&mut self) {
        self.current = None;
    }
}

/// Scales `image_size` down (never up) so it fits inside `available`,
/// keeping the aspect ratio.
pub fn fit_size(image_size: egui::Vec2, available: egui::Vec2) -> egui::Vec2 {
    if image_size.x <= 0.0 || image_size.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let scale = (available.x / image_size.x)
        .min(available.y / image_size.y)
        .min(1.0)
        .max(0.0);
    image_size * scale
}

/// Draws `texture` centered in the remaining space of `ui`.
pub fn show_fitted(ui: &mut egui::Ui, texture: &egui::TextureHandle) {
    let size = fit_size(texture.size_vec2(), ui.available_size());
    ui.centered_and_justified(|ui| {
        ui.add(egui::Image::new((texture.id(), size)));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_size_shrinks_to_the_tighter_axis() {
        let fitted = fit_size(egui::vec2(800.0, 400.0), egui::vec2(400.0, 400.0));
        assert_eq!(fitted, egui::vec2(400.0, 200.0));
    }

    #[test]
    fn fit_size_never_upscales() {
        let fitted = fit_size(egui::vec2(100.0, 50.0), egui::vec2(1000.0, 1000.0));
        assert_eq!(fitted, egui::vec2(100.0, 50.0));
    }

    #[test]
    fn fit_size_handles_empty_images() {
        assert_eq!(
            fit_size(egui::vec2(0.0, 10.0), egui::vec2(100.0, 100.0)),
            egui::Vec2::ZERO
        );
    }
}
