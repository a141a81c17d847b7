// 该文件是 Headcount （数人头） 项目的一部分。
// src/output.rs - 输出定义
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

use std::process::ExitCode;

use serde::{Deserialize, Serialize};

pub trait Render<Output> {
  type Error;
  fn render_result(&self, result: &Output) -> Result<(), Self::Error>;
}

/// 一次运行的结果，只会产生其中一种
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InferenceResult {
  Success { head_count: usize, image_used: String },
  Failure { error: String },
}

impl InferenceResult {
  pub fn success(head_count: usize, image_used: impl Into<String>) -> Self {
    InferenceResult::Success {
      head_count,
      image_used: image_used.into(),
    }
  }

  pub fn failure(error: impl Into<String>) -> Self {
    InferenceResult::Failure {
      error: error.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, InferenceResult::Success { .. })
  }

  /// 进程退出码：成功为 0，失败为 1
  pub fn exit_status(&self) -> u8 {
    match self {
      InferenceResult::Success { .. } => 0,
      InferenceResult::Failure { .. } => 1,
    }
  }
}

impl From<&InferenceResult> for ExitCode {
  fn from(result: &InferenceResult) -> Self {
    ExitCode::from(result.exit_status())
  }
}

mod json_record;
pub use self::json_record::{JsonRecordError, JsonRecordOutput};
