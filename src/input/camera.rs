// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 摄像头设备 - 平台相关的设备地址与设备枚举
//!
//! DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

/// 视频设备信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDevice {
    pub name: String,
    pub index: usize,
}

/// 格式化摄像头地址 - 根据平台选择
pub fn format_camera_url(index: u32, name: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        let _ = index;
        format!("video={}", name)
    }
    #[cfg(target_os = "macos")]
    {
        let _ = name;
        format!("{}", index)
    }
    #[cfg(target_os = "linux")]
    {
        let _ = name;
        format!("/dev/video{}", index)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        let _ = name;
        format!("{}", index)
    }
}

/// FFmpeg 输入格式名
pub fn camera_input_format() -> &'static str {
    #[cfg(target_os = "windows")]
    let format = "dshow"; // DirectShow

    #[cfg(target_os = "macos")]
    let format = "avfoundation"; // AVFoundation

    #[cfg(target_os = "linux")]
    let format = "v4l2"; // Video4Linux2

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    let format = "video4linux2"; // 默认

    format
}

/// 获取可用的摄像头设备列表
#[cfg(feature = "ffmpeg")]
pub fn get_camera_devices() -> Vec<VideoDevice> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => {
            log::info!("✅ 找到 {} 个视频设备", devices.len());
            devices
                .into_iter()
                .enumerate()
                .map(|(index, name)| VideoDevice { name, index })
                .collect()
        }
        Err(e) => {
            log::warn!("⚠️ 获取摄像头列表失败: {}", e);
            default_devices()
        }
    }
}

/// 获取可用的摄像头设备列表 (无 FFmpeg 时只返回默认设备)
#[cfg(not(feature = "ffmpeg"))]
pub fn get_camera_devices() -> Vec<VideoDevice> {
    default_devices()
}

fn default_devices() -> Vec<VideoDevice> {
    vec![VideoDevice {
        name: "Default camera".to_string(),
        index: 0,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_camera_url() {
        assert_eq!(format_camera_url(2, "ignored"), "/dev/video2");
        assert_eq!(camera_input_format(), "v4l2");
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn test_default_device_without_ffmpeg() {
        let devices = get_camera_devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].index, 0);
    }
}
