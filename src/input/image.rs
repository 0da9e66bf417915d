// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 静态图片输入 - 单帧采集句柄

use std::path::Path;

use ::image::RgbImage;

use super::{Capture, SourceInfo};
use crate::error::{MediaError, MediaResult};

/// 图片采集: 打开时解码, 第一次 read 返回整张图, 之后流结束
pub struct ImageCapture {
    frame: Option<RgbImage>,
    info: SourceInfo,
}

impl ImageCapture {
    pub fn open(path: &Path) -> MediaResult<Self> {
        let name = path.display().to_string();
        if !path.exists() {
            return Err(MediaError::unavailable(name, "file not found"));
        }

        let img = ::image::open(path).map_err(|e| MediaError::ImageDecode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgb = img.to_rgb8();
        log::info!("🖼️ 图片解码完成: {} ({}x{})", name, rgb.width(), rgb.height());

        Ok(Self::from_image(rgb))
    }

    pub fn from_image(frame: RgbImage) -> Self {
        let info = SourceInfo {
            width: frame.width(),
            height: frame.height(),
            frame_count: Some(1),
            fps: None,
        };
        Self {
            frame: Some(frame),
            info,
        }
    }
}

impl Capture for ImageCapture {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read(&mut self) -> MediaResult<Option<RgbImage>> {
        Ok(self.frame.take())
    }

    fn position(&self) -> u64 {
        if self.frame.is_some() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(8, 4, ::image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();

        let mut capture = ImageCapture::open(&path).unwrap();
        assert_eq!(capture.info().width, 8);
        assert_eq!(capture.info().height, 4);

        let frame = capture.read().unwrap().unwrap();
        assert_eq!(frame.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(capture.position(), 1);
        assert!(capture.read().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = ImageCapture::open(Path::new("/definitely/not/here.png"))
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = ImageCapture::open(&path).err().unwrap();
        assert!(matches!(err, MediaError::ImageDecode { .. }));
    }
}
