// 该文件是 Headcount （数人头） 项目的一部分。
// src/input/request.rs - 推理请求解析
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

use rand::Rng;

use crate::config::Config;

/// 图片路径的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
  /// 命令行显式指定
  Explicit,
  /// 从图片目录中随机选取，附带选中的编号
  Random(u32),
}

/// 一次推理请求，启动时解析一次，之后不再改变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
  image_path: String,
  source: RequestSource,
}

impl InferenceRequest {
  /// 有显式路径时原样使用，否则随机选取 `<image_dir>/<n>.jpg`
  pub fn resolve(explicit: Option<String>, config: &Config) -> Self {
    Self::resolve_with_rng(explicit, config, &mut rand::thread_rng())
  }

  pub fn resolve_with_rng<R: Rng>(
    explicit: Option<String>,
    config: &Config,
    rng: &mut R,
  ) -> Self {
    match explicit {
      Some(image_path) => InferenceRequest {
        image_path,
        source: RequestSource::Explicit,
      },
      None => {
        let index = rng.gen_range(0..=config.max_image_index);
        let image_path = config
          .image_dir
          .join(format!("{}.jpg", index))
          .to_string_lossy()
          .into_owned();
        InferenceRequest {
          image_path,
          source: RequestSource::Random(index),
        }
      }
    }
  }

  pub fn image_path(&self) -> &str {
    &self.image_path
  }

  pub fn source(&self) -> RequestSource {
    self.source
  }
}
