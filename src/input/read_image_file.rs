// 该文件是 Headcount （数人头） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::marker::PhantomData;
use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

use crate::frame::FromRgbImage;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("无法打开图片文件 {0}: {1}")]
  IoError(String, std::io::Error),
  #[error("无法解码图片文件 {0}: {1}")]
  ImageLoadError(String, image::ImageError),
  #[error("图片尺寸为零: {0}")]
  EmptyImage(String),
}

/// 单张图片输入，只产生一帧
pub struct ImageFileInput {
  image: Option<RgbImage>,
}

impl ImageFileInput {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let name = path.display().to_string();

    let image = ImageReader::open(path)
      .map_err(|e| ImageFileInputError::IoError(name.clone(), e))?
      .with_guessed_format()
      .map_err(|e| ImageFileInputError::IoError(name.clone(), e))?
      .decode()
      .map_err(|e| ImageFileInputError::ImageLoadError(name.clone(), e))?
      .to_rgb8();

    if image.width() == 0 || image.height() == 0 {
      return Err(ImageFileInputError::EmptyImage(name));
    }

    debug!("图片 {} 尺寸: {}x{}", name, image.width(), image.height());

    Ok(ImageFileInput { image: Some(image) })
  }

  pub fn into_frames<F: FromRgbImage>(self) -> ImageFileFrames<F> {
    ImageFileFrames {
      inner: self,
      _phantom: PhantomData,
    }
  }
}

pub struct ImageFileFrames<F> {
  inner: ImageFileInput,
  _phantom: PhantomData<F>,
}

impl<F: FromRgbImage> Iterator for ImageFileFrames<F> {
  type Item = F;

  fn next(&mut self) -> Option<Self::Item> {
    self.inner.image.take().map(|image| F::from_rgb_image(&image))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::{AsNhwcFrame, RgbNhwcFrame};
  use image::Rgb;

  #[test]
  fn yields_exactly_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("0.png");
    RgbImage::from_pixel(16, 16, Rgb([1, 2, 3])).save(&path).unwrap();

    let mut frames = ImageFileInput::open(&path)
      .unwrap()
      .into_frames::<RgbNhwcFrame<16, 16>>();
    let frame = frames.next().unwrap();
    assert_eq!(&frame.as_nhwc()[..3], &[1, 2, 3]);
    assert!(frames.next().is_none());
  }

  #[test]
  fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ImageFileInput::open(dir.path().join("missing.jpg"))
      .err()
      .unwrap();
    assert!(matches!(err, ImageFileInputError::IoError(..)));
  }

  #[test]
  fn garbage_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"definitely not a jpeg").unwrap();

    let err = ImageFileInput::open(&path).err().unwrap();
    assert!(matches!(err, ImageFileInputError::ImageLoadError(..)));
  }
}
