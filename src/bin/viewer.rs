// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// YOLO Vision 桌面查看器
///
/// 线程结构:
/// 1. 模型加载线程: 启动时后台加载 ONNX 模型 (完成前禁止打开输入源)
/// 2. 工作线程:     每个会话一个, 负责采集 → 检测 → 标注
/// 3. 主线程:       macroquad 事件循环, 控制器 + egui 界面
use std::sync::Arc;

use clap::Parser;
use env_logger::Env;
use macroquad::prelude::*;

use yolo_vision::detection::Annotator;
use yolo_vision::models::loader;
use yolo_vision::viewer::{window_conf, ViewerApp};
use yolo_vision::{Args, Controller, MediaCaptureProvider};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.resolve();
    config.print_summary();

    log::info!("🚀 YOLO Vision 启动");
    let model_rx = loader::spawn(config.clone());
    let annotator = Arc::new(Annotator::from_font_file(&config.font_path));
    let controller = Controller::new(
        Arc::new(MediaCaptureProvider::from_config(&config)),
        config.clone(),
        annotator,
        model_rx,
    );

    // 关闭窗口时先停止会话再退出
    prevent_quit();
    let mut app = ViewerApp::new(controller, config, args.config.clone());
    if let Some(source) = args.initial_source() {
        log::info!("📹 模型就绪后打开: {}", source.display_name());
        app.open_when_ready(source);
    }

    loop {
        app.update();
        app.draw();
        app.draw_egui();
        app.handle_input();

        if is_quit_requested() {
            break;
        }
        next_frame().await;
    }

    app.shutdown();
    log::info!("👋 YOLO Vision 退出");
}
