// 该文件是 Headcount （数人头） 项目的一部分。
// src/frame.rs - NHWC 帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{Rgb, RgbImage, imageops};

const RGB_CHANNELS: usize = 3;
// letterbox 填充颜色
const LETTERBOX_FILL: u8 = 114;

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

/// 由解码后的图像构造模型输入帧
pub trait FromRgbImage {
  fn from_rgb_image(image: &RgbImage) -> Self;
}

#[derive(Debug, Clone)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> From<Vec<u8>> for RgbNhwcFrame<W, H> {
  fn from(data: Vec<u8>) -> Self {
    if data.len() != (RGB_CHANNELS * W as usize * H as usize) {
      panic!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        RGB_CHANNELS * W as usize * H as usize,
        data.len()
      );
    }

    Self {
      data: data.into_boxed_slice(),
    }
  }
}

#[cfg(test)]
impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  /// 取 (x, y) 处的像素
  fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = ((y as usize) * (W as usize) + x as usize) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }
}

impl<const W: u32, const H: u32> AsNhwcFrame for RgbNhwcFrame<W, H> {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

/// 按比例缩放后居中放置，四周以灰色填充
impl<const W: u32, const H: u32> FromRgbImage for RgbNhwcFrame<W, H> {
  fn from_rgb_image(image: &RgbImage) -> Self {
    let (src_w, src_h) = image.dimensions();
    let ratio = (W as f32 / src_w as f32).min(H as f32 / src_h as f32);
    let new_w = ((src_w as f32 * ratio).round() as u32).clamp(1, W);
    let new_h = ((src_h as f32 * ratio).round() as u32).clamp(1, H);

    let resized = if (new_w, new_h) == (src_w, src_h) {
      image.clone()
    } else {
      imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle)
    };

    let mut canvas = RgbImage::from_pixel(W, H, Rgb([LETTERBOX_FILL; 3]));
    let pad_x = (W - new_w) / 2;
    let pad_y = (H - new_h) / 2;
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    // RgbImage 的原始数据即为 HWC 排列
    RgbNhwcFrame::from(canvas.into_raw())
  }
}
