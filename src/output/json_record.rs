// 该文件是 Headcount （数人头） 项目的一部分。
// src/output/json_record.rs - JSON 结果记录输出
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::output::{InferenceResult, Render};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("I/O 错误: {0}: {1}")]
  IoError(String, std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

/// 将结果写入固定的 JSON 文件，每次整体覆盖
pub struct JsonRecordOutput {
  path: PathBuf,
}

impl JsonRecordOutput {
  /// 创建输出，父目录不存在时一并创建
  pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, JsonRecordError> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)
        .map_err(|e| JsonRecordError::IoError(parent.display().to_string(), e))?;
    }

    Ok(JsonRecordOutput { path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Render<InferenceResult> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, result: &InferenceResult) -> Result<(), Self::Error> {
    let data = serde_json::to_vec(result)?;
    std::fs::write(&self.path, data)
      .map_err(|e| JsonRecordError::IoError(self.path.display().to_string(), e))?;

    info!("结果已写入: {}", self.path.display());
    Ok(())
  }
}
