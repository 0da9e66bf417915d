// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 无界面检测: 单个输入源经工作线程处理, 每个标注帧保存为 PNG
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;

use yolo_vision::detection::Annotator;
use yolo_vision::models::YOLOv8;
use yolo_vision::pipeline::{FrameExporter, Worker, WorkerSettings};
use yolo_vision::{
    gen_time_string, MediaCaptureProvider, MediaSource, SessionId, SharedDetector, ViewerConfig,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO Vision - 无界面检测", long_about = None)]
struct Args {
    /// JSON 配置文件路径
    #[arg(long, default_value = "viewer.json")]
    config: String,

    /// ONNX 检测模型路径
    #[arg(short, long)]
    model: Option<String>,

    /// 图片/视频文件
    #[arg(short, long)]
    input: Option<String>,

    /// 摄像头索引
    #[arg(short, long)]
    camera: Option<u32>,

    /// 输出目录 (默认 runs/<时间戳>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 最多保存的帧数
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let source = match (&args.input, args.camera) {
        (Some(path), _) => MediaSource::from_path(path),
        (None, Some(index)) => MediaSource::Camera(index),
        (None, None) => bail!("either --input or --camera is required"),
    };

    let mut config = ViewerConfig::load(&args.config);
    if let Some(model) = &args.model {
        config.model_path = model.clone();
    }
    config.print_summary();

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("runs").join(gen_time_string("-")));
    std::fs::create_dir_all(&output)
        .with_context(|| format!("cannot create output directory {}", output.display()))?;

    let t = Instant::now();
    let detector: SharedDetector = Arc::new(YOLOv8::new(&config)?);
    log::info!("✅ 模型加载完成 ({:.2}s)", t.elapsed().as_secs_f64());

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let mut handle = Worker::new(
        SessionId::default().next(),
        source.clone(),
        Arc::new(MediaCaptureProvider::from_config(&config)),
        detector,
        events_tx,
    )
    .with_annotator(Arc::new(Annotator::from_font_file(&config.font_path)))
    .with_settings(WorkerSettings::from_config(&config))
    .spawn()?;

    log::info!("📹 输入源: {} → {}", source.display_name(), output.display());
    let mut exporter = FrameExporter::new(output, args.max_frames);
    exporter.run(&events_rx, &mut handle, config.stop_timeout())?;
    Ok(())
}
