// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 界面配色: Dark / Light / Ocean

use egui_macroquad::egui::{self, Color32};
use macroquad::color::Color;

use crate::config::Theme;
use crate::pipeline::StatusKind;

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color, // 视频区域底色
    pub panel: Color32,
    pub text: Color32,
    pub accent: Color32,
    pub error: Color32,
    pub success: Color32,
    pub info: Color32,
    pub neutral: Color32,
    dark: bool,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                background: Color::from_rgba(20, 20, 30, 255),
                panel: Color32::from_rgb(30, 30, 46),
                text: Color32::from_rgb(230, 240, 250),
                accent: Color32::from_rgb(0x4F, 0xC3, 0xF7),
                error: Color32::from_rgb(0xFF, 0x6B, 0x6B),
                success: Color32::from_rgb(0x69, 0xF0, 0xAE),
                info: Color32::from_rgb(0x4F, 0xC3, 0xF7),
                neutral: Color32::from_rgb(0xB0, 0xB0, 0xC0),
                dark: true,
            },
            Theme::Light => Self {
                background: Color::from_rgba(235, 236, 240, 255),
                panel: Color32::from_rgb(248, 249, 250),
                text: Color32::from_rgb(33, 37, 41),
                accent: Color32::from_rgb(0x34, 0x98, 0xDB),
                error: Color32::from_rgb(0xE7, 0x4C, 0x3C),
                success: Color32::from_rgb(0x2E, 0xCC, 0x71),
                info: Color32::from_rgb(0x34, 0x98, 0xDB),
                neutral: Color32::from_rgb(0x56, 0x65, 0x73),
                dark: false,
            },
            Theme::Ocean => Self {
                background: Color::from_rgba(8, 28, 44, 255),
                panel: Color32::from_rgb(13, 42, 64),
                text: Color32::from_rgb(224, 247, 250),
                accent: Color32::from_rgb(0x26, 0xC6, 0xDA),
                error: Color32::from_rgb(0xFF, 0x8A, 0x80),
                success: Color32::from_rgb(0x64, 0xFF, 0xDA),
                info: Color32::from_rgb(0x80, 0xD8, 0xFF),
                neutral: Color32::from_rgb(0x90, 0xA4, 0xAE),
                dark: true,
            },
        }
    }

    pub fn status_color(&self, kind: StatusKind) -> Color32 {
        match kind {
            StatusKind::Error => self.error,
            StatusKind::Success => self.success,
            StatusKind::Info => self.info,
            StatusKind::Neutral => self.neutral,
        }
    }

    pub fn visuals(&self) -> egui::Visuals {
        let mut visuals = if self.dark {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        visuals.panel_fill = self.panel;
        visuals.window_fill = self.panel;
        visuals.override_text_color = Some(self.text);
        visuals.selection.bg_fill = self.accent.gamma_multiply(0.6);
        visuals.selection.stroke = egui::Stroke::new(1.5, self.accent);
        visuals.widgets.hovered.bg_stroke = egui::Stroke::new(1.5, self.accent);
        visuals
    }
}
