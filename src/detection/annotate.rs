// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测结果标注 (Annotator)
//! 职责: 在原图上绘制检测框 + `label: conf` 标签

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::types::Detection;

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 18.0;
const LABEL_PADDING: i32 = 3;

// 按类别循环使用的高亮配色
const BRIGHT_COLORS: [(u8, u8, u8); 12] = [
    (50, 205, 50),   // 绿色
    (255, 0, 0),     // 红色
    (0, 0, 255),     // 蓝色
    (255, 255, 0),   // 黄色
    (255, 0, 255),   // 品红
    (0, 255, 255),   // 青色
    (255, 128, 0),   // 橙色
    (255, 0, 128),   // 粉红
    (128, 255, 0),   // 黄绿
    (0, 128, 255),   // 天蓝
    (255, 255, 255), // 白色
    (128, 0, 255),   // 紫色
];

pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Annotator {
    /// 从字体文件创建; 字体缺失时只画框不画文字
    pub fn from_font_file(path: &str) -> Self {
        let font = match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    log::info!("✅ 标注字体加载成功: {}", path);
                    Some(font)
                }
                Err(e) => {
                    log::warn!("⚠️ 标注字体解析失败: {}", e);
                    None
                }
            },
            Err(_) => {
                log::warn!("⚠️ 未找到标注字体文件: {}, 仅绘制检测框", path);
                None
            }
        };
        Self::with_font(font)
    }

    pub fn with_font(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(LABEL_SCALE),
        }
    }

    /// 不带字体 (测试/无界面场景)
    pub fn boxes_only() -> Self {
        Self::with_font(None)
    }

    pub fn color_for(class_id: usize) -> Rgb<u8> {
        let (r, g, b) = BRIGHT_COLORS[class_id % BRIGHT_COLORS.len()];
        Rgb([r, g, b])
    }

    /// 在图像上绘制所有检测结果
    pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection]) {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return;
        }

        for det in detections {
            let bbox = det.bbox.clamp_to(w as f32, h as f32);
            let x1 = bbox.x1 as i32;
            let y1 = bbox.y1 as i32;
            let bw = bbox.width() as u32;
            let bh = bbox.height() as u32;
            if bw == 0 || bh == 0 {
                continue;
            }

            let color = Self::color_for(det.class_id);

            // 边框 (向内收缩画多层实现线宽)
            for t in 0..BOX_THICKNESS {
                let inner_w = bw.saturating_sub(2 * t as u32);
                let inner_h = bh.saturating_sub(2 * t as u32);
                if inner_w == 0 || inner_h == 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    image,
                    Rect::at(x1 + t, y1 + t).of_size(inner_w, inner_h),
                    color,
                );
            }

            if let Some(font) = &self.font {
                let caption = det.caption();
                let (tw, th) = text_size(self.scale, font, &caption);
                let tag_w = tw + 2 * LABEL_PADDING as u32;
                let tag_h = th + 2 * LABEL_PADDING as u32;

                // 标签放在框上方, 超出图像顶部时放到框内
                let tag_y = if y1 - tag_h as i32 >= 0 {
                    y1 - tag_h as i32
                } else {
                    y1
                };

                draw_filled_rect_mut(image, Rect::at(x1, tag_y).of_size(tag_w, tag_h), darken(color));
                draw_text_mut(
                    image,
                    Rgb([255, 255, 255]),
                    x1 + LABEL_PADDING,
                    tag_y + LABEL_PADDING,
                    self.scale,
                    font,
                    &caption,
                );
            }
        }
    }
}

// 标签背景比框线略暗
fn darken(color: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = color.0;
    Rgb([
        (r as u16 * 4 / 5) as u8,
        (g as u16 * 4 / 5) as u8,
        (b as u16 * 4 / 5) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;

    #[test]
    fn test_draws_box_edges_only() {
        let mut img = RgbImage::new(64, 48);
        let det = Detection::new(0, "person", 0.9, BBox::new(10.0, 10.0, 40.0, 30.0));
        Annotator::boxes_only().annotate(&mut img, &[det]);

        let green = Annotator::color_for(0);
        assert_eq!(*img.get_pixel(10, 10), green);
        assert_eq!(*img.get_pixel(11, 20), green); // 第二层边框
        assert_eq!(*img.get_pixel(25, 20), Rgb([0, 0, 0])); // 框内不填充
    }

    #[test]
    fn test_out_of_bounds_box_is_clamped() {
        let mut img = RgbImage::new(32, 32);
        let det = Detection::new(3, "car", 0.5, BBox::new(-20.0, -20.0, 100.0, 100.0));
        Annotator::boxes_only().annotate(&mut img, &[det]);
        assert_eq!(*img.get_pixel(0, 0), Annotator::color_for(3));
    }

    #[test]
    fn test_degenerate_box_is_skipped() {
        let mut img = RgbImage::new(16, 16);
        let det = Detection::new(1, "cat", 0.5, BBox::new(5.0, 5.0, 5.0, 12.0));
        Annotator::boxes_only().annotate(&mut img, &[det]);
        assert!(img.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
