use std::time::Duration;

use image::GrayImage;

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    /// 从灰度图构造帧（测试与合成图形用）
    pub fn from_gray(gray: &GrayImage, timestamp_ms: u64, frame_number: u64) -> Self {
        let mut data = Vec::with_capacity(gray.len() * 4);
        for px in gray.as_raw() {
            data.push(*px);
            data.push(*px);
            data.push(*px);
            data.push(255);
        }
        Self::new(gray.width(), gray.height(), data, timestamp_ms, frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// RGBA → 灰度（整数权重 299/587/114）
    pub fn to_gray(&self) -> GrayImage {
        let gray: Vec<u8> = self
            .data
            .chunks_exact(4)
            .map(|rgba| {
                let r = rgba[0] as u32;
                let g = rgba[1] as u32;
                let b = rgba[2] as u32;
                ((r * 299 + g * 587 + b * 114) / 1000) as u8
            })
            .collect();
        GrayImage::from_raw(self.width, self.height, gray).expect("Invalid frame data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_frame_creation() {
        let data = vec![255u8; 100 * 100 * 4]; // 100x100 white image
        let frame = Frame::new(100, 100, data, 1000, 30);

        assert_eq!(frame.width, 100);
        assert_eq!(frame.height, 100);
        assert_eq!(frame.pixel_count(), 10000);
        assert_eq!(frame.timestamp.as_millis(), 1000);
        assert_eq!(frame.frame_number, 30);
    }

    #[test]
    fn test_to_gray_weights() {
        // Pure red: (255*299)/1000 = 76
        let mut data = vec![0u8; 4];
        data[0] = 255;
        data[3] = 255;
        let frame = Frame::new(1, 1, data, 0, 0);
        let gray = frame.to_gray();
        assert_eq!(gray.get_pixel(0, 0), &Luma([76u8]));
    }

    #[test]
    fn test_gray_round_trip() {
        let mut gray = GrayImage::new(8, 8);
        gray.put_pixel(3, 4, Luma([200]));
        let frame = Frame::from_gray(&gray, 0, 0);
        let back = frame.to_gray();
        assert_eq!(back.get_pixel(3, 4), &Luma([200u8]));
        assert_eq!(back.get_pixel(0, 0), &Luma([0u8]));
    }
}
