// 该文件是 Headcount （数人头） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

use headcount::config::{
  Config, DEFAULT_IMAGE_DIR, DEFAULT_MAX_IMAGE_INDEX, DEFAULT_MODEL_URL, DEFAULT_OUTPUT_PATH,
};

/// 统计单张图片中的人头数量，结果写入 JSON 文件
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 待检测图片路径，省略时从图片目录随机选取
  #[arg(value_name = "IMAGE")]
  pub image: Option<String>,

  /// 模型 URL，例如 yolo26:model/best.rknn?conf=0.25
  #[arg(long, default_value = DEFAULT_MODEL_URL, value_name = "MODEL")]
  pub model: Url,

  /// 随机选取图片的目录
  #[arg(long, default_value = DEFAULT_IMAGE_DIR, value_name = "DIR")]
  pub image_dir: PathBuf,

  /// 随机图片编号上界（包含）
  #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_INDEX, value_name = "N")]
  pub max_index: u32,

  /// 结果 JSON 文件路径
  #[arg(long, default_value = DEFAULT_OUTPUT_PATH, value_name = "OUTPUT")]
  pub output: PathBuf,
}

impl Args {
  pub fn config(&self) -> Config {
    Config {
      model: self.model.clone(),
      image_dir: self.image_dir.clone(),
      max_image_index: self.max_index,
      output: self.output.clone(),
    }
  }
}
