// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 工具栏 / 视频控制条 / 状态栏

use egui_macroquad::egui;

use super::theme::Palette;
use crate::controller::{Controls, ModelState};
use crate::input::{get_camera_devices, VideoDevice};
use crate::pipeline::Status;

const SPEEDS: [f32; 6] = [0.25, 0.5, 1.0, 1.5, 2.0, 4.0];

/// 本帧界面快照 (绘制期间不借用控制器)
pub struct PanelView {
    pub controls: Controls,
    pub status: Status,
    pub info: String,
    pub model_state: ModelState,
    pub current_frame: u64,
    pub frame_count: Option<u64>,
    pub speed: f32,
    pub theme_name: &'static str,
    pub render_fps: f64,
}

/// 用户在面板上触发的操作
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PanelActions {
    pub open_image: Option<String>,
    pub open_video: Option<String>,
    pub start_camera: Option<u32>,
    pub toggle_pause: bool,
    pub stop: bool,
    pub cycle_theme: bool,
    pub step_backward: bool,
    pub step_forward: bool,
    pub seek: Option<u64>,
    pub speed: Option<f32>,
}

pub struct ControlPanel {
    pub path_input: String,
    pub video_devices: Vec<VideoDevice>,
    pub selected_device: u32,
    seek_target: f32,
    seek_dragging: bool,
}

impl ControlPanel {
    pub fn new(camera_index: u32) -> Self {
        Self {
            path_input: String::new(),
            video_devices: get_camera_devices(),
            selected_device: camera_index,
            seek_target: 0.0,
            seek_dragging: false,
        }
    }

    /// 顶部工具栏 + 视频控制条, 返回操作与面板高度
    pub fn show_toolbar(
        &mut self,
        ctx: &egui::Context,
        view: &PanelView,
        palette: &Palette,
    ) -> (PanelActions, f32) {
        let mut actions = PanelActions::default();
        let controls = view.controls;

        let response = egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.label("📂");
                ui.add(
                    egui::TextEdit::singleline(&mut self.path_input)
                        .hint_text("path to an image or video file")
                        .desired_width(280.0),
                );
                let path = self.path_input.trim().to_string();
                let has_path = !path.is_empty();

                if ui
                    .add_enabled(controls.open_image && has_path, egui::Button::new("🖼 Open Image"))
                    .clicked()
                {
                    actions.open_image = Some(path.clone());
                }
                if ui
                    .add_enabled(controls.open_video && has_path, egui::Button::new("🎬 Open Video"))
                    .clicked()
                {
                    actions.open_video = Some(path);
                }

                ui.separator();

                let selected_text = self
                    .video_devices
                    .iter()
                    .find(|d| d.index as u32 == self.selected_device)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| format!("Camera #{}", self.selected_device));
                egui::ComboBox::from_id_salt("camera_device")
                    .selected_text(selected_text)
                    .show_ui(ui, |ui| {
                        for device in &self.video_devices {
                            ui.selectable_value(
                                &mut self.selected_device,
                                device.index as u32,
                                &device.name,
                            );
                        }
                    });
                if ui
                    .add_enabled(controls.start_camera, egui::Button::new("📷 Camera"))
                    .clicked()
                {
                    actions.start_camera = Some(self.selected_device);
                }

                ui.separator();

                let pause_icon = if controls.pause_label == "Resume" { "▶" } else { "⏸" };
                if ui
                    .add_enabled(
                        controls.pause,
                        egui::Button::new(format!("{} {}", pause_icon, controls.pause_label)),
                    )
                    .clicked()
                {
                    actions.toggle_pause = true;
                }
                if ui
                    .add_enabled(controls.stop, egui::Button::new("⏹ Stop"))
                    .clicked()
                {
                    actions.stop = true;
                }

                ui.separator();
                if ui
                    .button(format!("🎨 {}", view.theme_name))
                    .on_hover_text("Switch theme (T)")
                    .clicked()
                {
                    actions.cycle_theme = true;
                }
            });

            if controls.seek {
                self.transport_row(ui, view, palette, &mut actions);
            }
            ui.add_space(4.0);
        });

        (actions, response.response.rect.height())
    }

    /// 视频控制条: 跳转 / 单步 / 倍速
    fn transport_row(
        &mut self,
        ui: &mut egui::Ui,
        view: &PanelView,
        palette: &Palette,
        actions: &mut PanelActions,
    ) {
        let controls = view.controls;
        ui.horizontal(|ui| {
            if ui
                .add_enabled(controls.step, egui::Button::new("⏮"))
                .on_hover_text("Previous frame (←)")
                .clicked()
            {
                actions.step_backward = true;
            }
            if ui
                .add_enabled(controls.step, egui::Button::new("⏭"))
                .on_hover_text("Next frame (→)")
                .clicked()
            {
                actions.step_forward = true;
            }

            let last = view.frame_count.unwrap_or(1).saturating_sub(1).max(1) as f32;
            if !self.seek_dragging {
                self.seek_target = (view.current_frame.saturating_sub(1) as f32).min(last);
            }
            let slider = ui.add(
                egui::Slider::new(&mut self.seek_target, 0.0..=last)
                    .show_value(false)
                    .step_by(1.0),
            );
            self.seek_dragging = slider.dragged();
            if slider.drag_stopped() || (slider.changed() && !slider.dragged()) {
                actions.seek = Some(self.seek_target.round() as u64);
            }
            ui.colored_label(
                palette.accent,
                format!("{} / {}", view.current_frame, view.frame_count.unwrap_or(0)),
            );

            ui.separator();
            egui::ComboBox::from_id_salt("playback_speed")
                .selected_text(format!("{:.2}x", view.speed))
                .show_ui(ui, |ui| {
                    for speed in SPEEDS {
                        if ui
                            .selectable_label((speed - view.speed).abs() < f32::EPSILON, format!("{:.2}x", speed))
                            .clicked()
                        {
                            actions.speed = Some(speed);
                        }
                    }
                });
        });
    }

    /// 底部状态栏: 状态 (按分类着色) + 信息 + 帧率
    pub fn show_status_bar(&self, ctx: &egui::Context, view: &PanelView, palette: &Palette) -> f32 {
        let response = egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.colored_label(palette.status_color(view.status.kind()), view.status.to_string());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("{:.0} FPS", view.render_fps));
                    ui.separator();
                    ui.label(&view.info);
                });
            });
        });
        response.response.rect.height()
    }

    /// 模型加载提示
    pub fn show_model_loading(&self, ctx: &egui::Context, view: &PanelView) {
        if view.model_state != ModelState::Loading {
            return;
        }
        egui::Window::new("Loading model")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading the detection model, capture is disabled until it is ready.");
                });
            });
    }

    /// 阻塞式提示框, 点击 OK 后返回 true
    pub fn show_alert(&self, ctx: &egui::Context, message: &str, palette: &Palette) -> bool {
        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.colored_label(palette.error, message);
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        dismissed
    }
}
