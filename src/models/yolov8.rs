// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型 (ONNX Runtime)
// 包含: 模型加载、预处理、推理、后处理

use std::sync::Mutex;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{s, Array, Array4, ArrayView2, Axis, Ix2};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use regex::Regex;

use crate::config::ViewerConfig;
use crate::detection::types::non_max_suppression;
use crate::detection::{BBox, Detection, Detector};

const CXYWH_OFFSET: usize = 4;
const PAD_VALUE: f32 = 144.0 / 255.0;

/// YOLOv8 检测模型
pub struct YOLOv8 {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_size: u32,
    conf: f32,
    iou: f32,
    names: Vec<String>,
    name: String,
}

impl YOLOv8 {
    /// 从配置加载模型
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&config.model_path)
            .with_context(|| format!("无法加载模型 {}", config.model_path))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow!("模型没有输入"))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| anyhow!("模型没有输出"))?;

        // class names
        let names = match session.metadata().and_then(|meta| meta.custom("names")) {
            Ok(Some(raw)) => parse_names(&raw),
            _ => {
                log::warn!("⚠️ 模型缺少 names 元数据, 使用 class_<id>");
                Vec::new()
            }
        };

        let name = std::path::Path::new(&config.model_path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolov8".to_string());

        let model = Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_size: config.input_size,
            conf: config.conf_threshold,
            iou: config.iou_threshold,
            names,
            name,
        };
        model.summary();
        Ok(model)
    }

    pub fn summary(&self) {
        log::info!(
            "📦 模型: {} | 输入: {}x{} | 类别: {} | conf: {:.2} | iou: {:.2}",
            self.name,
            self.input_size,
            self.input_size,
            self.names.len(),
            self.conf,
            self.iou
        );
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn conf(&self) -> f32 {
        self.conf
    }

    pub fn iou(&self) -> f32 {
        self.iou
    }
}

impl Detector for YOLOv8 {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let t_pre = Instant::now();
        let (xs, ratio) = letterbox(image, self.input_size)?;
        let pre_ms = t_pre.elapsed().as_secs_f64() * 1000.0;

        let t_run = Instant::now();
        let preds = {
            let session = self
                .session
                .lock()
                .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
            let outputs = session.run(ort::inputs![self.input_name.as_str() => xs.view()]?)?;
            let preds = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
            if preds.ndim() != 3 {
                anyhow::bail!("unexpected output shape {:?}", preds.shape());
            }
            preds.slice(s![0, .., ..]).to_owned().into_dimensionality::<Ix2>()?
        };
        let run_ms = t_run.elapsed().as_secs_f64() * 1000.0;

        let t_post = Instant::now();
        let ys = decode_predictions(
            preds.view(),
            ratio,
            (image.width() as f32, image.height() as f32),
            self.conf,
            self.iou,
            &self.names,
        );
        log::debug!(
            "[{}] 预处理 {:.1}ms | 推理 {:.1}ms | 后处理 {:.1}ms | {} 个目标",
            self.name,
            pre_ms,
            run_ms,
            t_post.elapsed().as_secs_f64() * 1000.0,
            ys.len()
        );
        Ok(ys)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 等比缩放到左上角, 其余区域填充灰色; 返回 NCHW 张量 ([0,1]) 与缩放比例
pub fn letterbox(image: &RgbImage, size: u32) -> Result<(Array4<f32>, f32)> {
    let (w0, h0) = image.dimensions();
    if w0 == 0 || h0 == 0 {
        anyhow::bail!("empty image");
    }
    let ratio = (size as f32 / w0 as f32).min(size as f32 / h0 as f32);
    let w_new = ((w0 as f32 * ratio).round() as u32).clamp(1, size);
    let h_new = ((h0 as f32 * ratio).round() as u32).clamp(1, size);

    let src_image =
        fr::images::Image::from_vec_u8(w0, h0, image.as_raw().clone(), fr::PixelType::U8x3)
            .map_err(|e| anyhow!("源图像创建失败: {:?}", e))?;
    let mut dst_image = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
    fr::Resizer::new()
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .map_err(|e| anyhow!("缩放失败: {:?}", e))?;

    let s = size as usize;
    let mut xs = Array::from_elem((1, 3, s, s), PAD_VALUE);
    let w_new = w_new as usize;
    for (i, rgb) in dst_image.buffer().chunks_exact(3).enumerate() {
        let (x, y) = (i % w_new, i / w_new);
        xs[[0, 0, y, x]] = rgb[0] as f32 / 255.0;
        xs[[0, 1, y, x]] = rgb[1] as f32 / 255.0;
        xs[[0, 2, y, x]] = rgb[2] as f32 / 255.0;
    }

    Ok((xs, ratio))
}

/// 解码 `[4 + nc, N]` 输出: 逐个 anchor 取最大类别, 过滤置信度, 还原到原图坐标, NMS
pub fn decode_predictions(
    preds: ArrayView2<f32>,
    ratio: f32,
    (width_original, height_original): (f32, f32),
    conf: f32,
    iou: f32,
    names: &[String],
) -> Vec<Detection> {
    let mut ys = Vec::new();
    if preds.nrows() <= CXYWH_OFFSET {
        return ys;
    }

    for pred in preds.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..]);

        let Some((id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };

        if confidence < conf {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        let x = (cx - w / 2.).max(0.0).min(width_original);
        let y = (cy - h / 2.).max(0.0).min(height_original);

        let label = names
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", id));
        ys.push(Detection::new(
            id,
            label,
            confidence,
            BBox::from_xywh(x, y, w, h).clamp_to(width_original, height_original),
        ));
    }

    non_max_suppression(&mut ys, iou);
    ys
}

/// 解析 `names` 元数据: `{0: 'person', 1: 'bicycle', ...}`
pub fn parse_names(raw: &str) -> Vec<String> {
    let re = match Regex::new(r#"(['"])([-()\w '"]+)(['"])"#) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    re.captures_iter(raw)
        .filter_map(|cap| cap.get(2))
        .map(|name| name.as_str().to_string())
        .collect()
}
