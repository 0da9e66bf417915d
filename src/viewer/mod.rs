// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 查看器窗口 (macroquad + egui)
///
/// 每个 UI 帧: `update` (取出工作线程事件, 更新纹理) → `draw` (视频区域) →
/// `draw_egui` (工具栏 / 状态栏 / 提示框) → `handle_input` (快捷键)
pub mod control_panel;
pub mod theme;

use std::borrow::Cow;
use std::time::Instant;

use anyhow::{anyhow, Result};
use fast_image_resize as fr;
use image::RgbaImage;
use macroquad::prelude::*;

use crate::config::{Theme, ViewerConfig};
use crate::controller::{Controller, ModelState};
use crate::input::MediaSource;
use control_panel::{ControlPanel, PanelActions, PanelView};
use theme::Palette;

/// 纹理边长上限 (macroquad 纹理尺寸为 u16)
const MAX_TEXTURE_SIDE: u32 = 8192;

pub struct ViewerApp {
    controller: Controller,
    config: ViewerConfig,
    config_path: String,
    palette: Palette,
    panel: ControlPanel,

    texture: Option<Texture2D>,
    shown_serial: u64,

    // 启动参数指定的输入源, 模型就绪后打开
    pending_source: Option<MediaSource>,
    alert: Option<String>,

    // 面板高度 (上一帧)
    toolbar_height: f32,
    status_height: f32,

    wants_keyboard: bool,

    render_count: u64,
    render_last: Instant,
    render_fps: f64,
}

impl ViewerApp {
    pub fn new(controller: Controller, config: ViewerConfig, config_path: impl Into<String>) -> Self {
        let palette = Palette::for_theme(config.theme);
        egui_macroquad::cfg(|ctx| ctx.set_visuals(palette.visuals()));
        let panel = ControlPanel::new(config.camera_index);

        Self {
            controller,
            config,
            config_path: config_path.into(),
            palette,
            panel,
            texture: None,
            shown_serial: 0,
            pending_source: None,
            alert: None,
            toolbar_height: 0.0,
            status_height: 0.0,
            wants_keyboard: false,
            render_count: 0,
            render_last: Instant::now(),
            render_fps: 0.0,
        }
    }

    /// 模型加载完成后自动打开
    pub fn open_when_ready(&mut self, source: MediaSource) {
        if let MediaSource::Video(path) | MediaSource::Image(path) = &source {
            self.panel.path_input = path.display().to_string();
        }
        self.pending_source = Some(source);
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn update(&mut self) {
        self.controller.pump();

        if let Some(alert) = self.controller.take_alert() {
            self.alert = Some(alert);
        }

        match self.controller.model_state() {
            ModelState::Ready => {
                if let Some(source) = self.pending_source.take() {
                    self.open(source);
                }
            }
            ModelState::Failed(_) => {
                self.pending_source = None;
            }
            ModelState::Loading => {}
        }

        self.update_texture();
    }

    /// 只在收到新帧时更新纹理; 分辨率变化时重建
    fn update_texture(&mut self) {
        let Some(frame) = self.controller.frame() else {
            self.texture = None;
            return;
        };
        let serial = self.controller.frame_serial();
        if self.texture.is_some() && serial == self.shown_serial {
            return;
        }
        self.shown_serial = serial;

        let image = match texture_image(&frame.image) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("⚠️ 帧无法上传为纹理: {}", e);
                self.texture = None;
                return;
            }
        };
        let (width, height) = (image.width() as u16, image.height() as u16);
        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != width as f32 || tex.height() != height as f32,
            None => true,
        };

        if needs_rebuild {
            let texture = Texture2D::from_rgba8(width, height, image.as_raw());
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            let img = Image {
                bytes: image.into_owned().into_raw(),
                width,
                height,
            };
            tex.update(&img);
        }
    }

    pub fn draw(&mut self) {
        clear_background(self.palette.background);

        let area_top = self.toolbar_height;
        let area_w = screen_width();
        let area_h = (screen_height() - self.toolbar_height - self.status_height).max(0.0);
        self.controller.set_display_area(area_w, area_h);

        if let (Some(texture), Some((w, h))) = (&self.texture, self.controller.display_size()) {
            let x = (area_w - w) / 2.0;
            let y = area_top + (area_h - h) / 2.0;
            draw_texture_ex(
                texture,
                x,
                y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(w, h)),
                    ..Default::default()
                },
            );
        }

        // FPS统计
        self.render_count += 1;
        let now = Instant::now();
        if now.duration_since(self.render_last).as_secs() >= 1 {
            self.render_fps =
                self.render_count as f64 / now.duration_since(self.render_last).as_secs_f64();
            self.render_count = 0;
            self.render_last = now;
        }
    }

    pub fn draw_egui(&mut self) {
        let view = self.panel_view();
        let palette = self.palette;
        let mut actions = PanelActions::default();
        let mut dismissed = false;

        egui_macroquad::ui(|ctx| {
            self.wants_keyboard = ctx.wants_keyboard_input();

            let (toolbar_actions, toolbar_height) = self.panel.show_toolbar(ctx, &view, &palette);
            actions = toolbar_actions;
            self.toolbar_height = toolbar_height;
            self.status_height = self.panel.show_status_bar(ctx, &view, &palette);

            self.panel.show_model_loading(ctx, &view);
            if let Some(message) = &self.alert {
                dismissed = self.panel.show_alert(ctx, message, &palette);
            }
        });
        egui_macroquad::draw();

        if dismissed {
            self.alert = None;
        }
        self.apply_actions(actions);
    }

    pub fn handle_input(&mut self) {
        if self.wants_keyboard || self.alert.is_some() {
            return;
        }

        let mut actions = PanelActions::default();
        if is_key_pressed(KeyCode::Space) {
            actions.toggle_pause = true;
        }
        if is_key_pressed(KeyCode::Escape) {
            actions.stop = true;
        }
        if is_key_pressed(KeyCode::Left) {
            actions.step_backward = true;
        }
        if is_key_pressed(KeyCode::Right) {
            actions.step_forward = true;
        }
        if is_key_pressed(KeyCode::T) {
            actions.cycle_theme = true;
        }
        self.apply_actions(actions);
    }

    /// 关闭窗口前停止会话
    pub fn shutdown(&mut self) {
        self.controller.shutdown();
    }

    fn panel_view(&self) -> PanelView {
        let session = self.controller.session();
        PanelView {
            controls: self.controller.controls(),
            status: self.controller.status().clone(),
            info: self.controller.info_text(),
            model_state: self.controller.model_state().clone(),
            current_frame: session.map(|s| s.current_frame()).unwrap_or(0),
            frame_count: session.and_then(|s| s.info).and_then(|i| i.frame_count),
            speed: self.controller.speed(),
            theme_name: self.config.theme.name(),
            render_fps: self.render_fps,
        }
    }

    fn apply_actions(&mut self, actions: PanelActions) {
        let controls = self.controller.controls();

        if let Some(path) = actions.open_image {
            self.open(MediaSource::Image(path.into()));
        }
        if let Some(path) = actions.open_video {
            self.open(MediaSource::Video(path.into()));
        }
        if let Some(index) = actions.start_camera {
            self.open(MediaSource::Camera(index));
        }
        if actions.toggle_pause && controls.pause {
            self.controller.toggle_pause();
        }
        if actions.stop && controls.stop {
            self.controller.stop_current();
        }
        if actions.step_backward && controls.step {
            self.controller.step_backward();
        }
        if actions.step_forward && controls.step {
            self.controller.step_forward();
        }
        if let Some(frame) = actions.seek {
            if let Err(e) = self.controller.seek(frame) {
                log::warn!("⚠️ 跳转失败: {}", e);
            }
        }
        if let Some(speed) = actions.speed {
            self.controller.set_speed(speed);
        }
        if actions.cycle_theme {
            self.set_theme(self.config.theme.next());
        }
    }

    fn open(&mut self, source: MediaSource) {
        let name = source.display_name();
        if let Err(e) = self.controller.open_source(source) {
            log::warn!("⚠️ 无法打开 {}: {}", name, e);
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        self.config.theme = theme;
        self.palette = Palette::for_theme(theme);
        let visuals = self.palette.visuals();
        egui_macroquad::cfg(|ctx| ctx.set_visuals(visuals));
        log::info!("🎨 主题切换: {}", theme.name());
        self.config.save(&self.config_path);
    }
}

/// 超过纹理上限的帧先等比缩小, 其余原样返回
pub fn texture_image(image: &RgbaImage) -> Result<Cow<'_, RgbaImage>> {
    let (w0, h0) = image.dimensions();
    if w0 <= MAX_TEXTURE_SIDE && h0 <= MAX_TEXTURE_SIDE {
        return Ok(Cow::Borrowed(image));
    }

    let ratio = MAX_TEXTURE_SIDE as f32 / w0.max(h0) as f32;
    let w_new = ((w0 as f32 * ratio).round() as u32).clamp(1, MAX_TEXTURE_SIDE);
    let h_new = ((h0 as f32 * ratio).round() as u32).clamp(1, MAX_TEXTURE_SIDE);

    let src_image =
        fr::images::Image::from_vec_u8(w0, h0, image.as_raw().clone(), fr::PixelType::U8x4)
            .map_err(|e| anyhow!("源图像创建失败: {:?}", e))?;
    let mut dst_image = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x4);
    fr::Resizer::new()
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .map_err(|e| anyhow!("缩放失败: {:?}", e))?;

    RgbaImage::from_raw(w_new, h_new, dst_image.into_vec())
        .map(Cow::Owned)
        .ok_or_else(|| anyhow!("缩放结果尺寸不匹配"))
}

/// 窗口配置
pub fn window_conf() -> Conf {
    Conf {
        window_title: "YOLO Vision".to_owned(),
        window_width: 1280,
        window_height: 800,
        high_dpi: true,
        window_resizable: true,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_image_keeps_normal_frames() {
        let image = RgbaImage::new(640, 480);
        assert!(matches!(texture_image(&image).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_texture_image_downscales_oversized_frames() {
        let image = RgbaImage::from_pixel(70_000, 10, image::Rgba([255, 0, 0, 255]));
        let scaled = texture_image(&image).unwrap();
        assert_eq!(scaled.width(), MAX_TEXTURE_SIDE);
        assert_eq!(scaled.height(), 1);
        assert_eq!(scaled.as_raw().len(), (MAX_TEXTURE_SIDE * 4) as usize);
        assert_eq!(scaled.get_pixel(100, 0).0, [255, 0, 0, 255]);
    }
}
