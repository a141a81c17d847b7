// 该文件是 Headcount （数人头） 项目的一部分。
// src/task.rs - 人头统计任务
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

use anyhow::Context;
use tracing::{error, info};

use crate::{
  frame::FromRgbImage,
  input::{ImageFileInput, InferenceRequest},
  model::{DetectResult, Model},
  output::{InferenceResult, Render},
};

pub trait Task<I, L, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, loader: L, output: O) -> Result<Self::Output, Self::Error>;
}

/// 加载模型、推理一次、统计检测框数量并写出结果
///
/// 模型加载、图片读取、推理以及写出成功结果时的任何错误都会被收拢为
/// `InferenceResult::Failure`，写入同一个输出。只有失败结果本身无法写出时才返回错误。
pub struct HeadCountTask;

impl HeadCountTask {
  fn count<M, L, LE>(request: &InferenceRequest, load_model: L) -> anyhow::Result<usize>
  where
    L: FnOnce() -> Result<M, LE>,
    LE: std::error::Error + Send + Sync + 'static,
    M: Model<Output = DetectResult>,
    M::Input: FromRgbImage,
    M::Error: std::error::Error + Send + Sync + 'static,
  {
    info!("正在加载模型...");
    let model = load_model().context("模型加载失败")?;

    info!("读取图片: {}", request.image_path());
    let frame = ImageFileInput::open(request.image_path())?
      .into_frames::<M::Input>()
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;

    let now = std::time::Instant::now();
    let result = model.infer(&frame).context("推理失败")?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    Ok(result.len())
  }
}

impl<'r, M, L, LE, O> Task<&'r InferenceRequest, L, O> for HeadCountTask
where
  L: FnOnce() -> Result<M, LE>,
  LE: std::error::Error + Send + Sync + 'static,
  M: Model<Output = DetectResult>,
  M::Input: FromRgbImage,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<InferenceResult>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = InferenceResult;
  type Error = O::Error;

  fn run_task(
    self,
    request: &'r InferenceRequest,
    load_model: L,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    let attempt = Self::count(request, load_model).and_then(|head_count| {
      info!("检测到 {} 个人头", head_count);
      let record = InferenceResult::success(head_count, request.image_path());
      output.render_result(&record).context("无法写入结果")?;
      Ok(record)
    });

    match attempt {
      Ok(record) => Ok(record),
      Err(err) => {
        let message = format!("{:#}", err);
        error!("统计失败: {}", message);
        let record = InferenceResult::failure(message);
        output.render_result(&record)?;
        Ok(record)
      }
    }
  }
}
