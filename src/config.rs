// 该文件是 Headcount （数人头） 项目的一部分。
// src/config.rs - 运行配置
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

use std::path::PathBuf;

pub const DEFAULT_MODEL_URL: &str = "yolo26:model/best.rknn";
pub const DEFAULT_IMAGE_DIR: &str = "test_images";
pub const DEFAULT_OUTPUT_PATH: &str = "output/result.json";
// 测试图片目录中应有 0.jpg ~ 54.jpg 共 55 张图片
pub const DEFAULT_MAX_IMAGE_INDEX: u32 = 54;

/// 一次运行所需的全部配置，运行期间不可变
#[derive(Debug, Clone)]
pub struct Config {
  /// 模型 URL，例如 `yolo26:model/best.rknn`
  pub model: url::Url,
  /// 未指定图片时随机选取的图片目录
  pub image_dir: PathBuf,
  /// 随机图片编号上界（包含）
  pub max_image_index: u32,
  /// 结果 JSON 文件路径
  pub output: PathBuf,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      model: url::Url::parse(DEFAULT_MODEL_URL).expect("默认模型 URL 无效"),
      image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
      max_image_index: DEFAULT_MAX_IMAGE_INDEX,
      output: PathBuf::from(DEFAULT_OUTPUT_PATH),
    }
  }
}
