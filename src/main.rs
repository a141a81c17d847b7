// 该文件是 Headcount （数人头） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use headcount::{
  FromUrl,
  input::{InferenceRequest, RequestSource},
  model::{Yolo26Builder, Yolo26Error, Yolo26Frame},
  output::JsonRecordOutput,
  task::{HeadCountTask, Task},
};

fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let config = args.config();

  info!("模型: {}", config.model);
  info!("输出文件: {}", config.output.display());

  let output = JsonRecordOutput::create(&config.output)?;

  let request = InferenceRequest::resolve(args.image, &config);
  match request.source() {
    RequestSource::Explicit => info!("输入图片: {}", request.image_path()),
    RequestSource::Random(index) => info!(
      "未指定图片，随机选取第 {} 张: {}",
      index,
      request.image_path()
    ),
  }

  let model_url = config.model;
  let record = HeadCountTask.run_task(
    &request,
    || -> Result<_, Yolo26Error> { Yolo26Builder::from_url(&model_url)?.build::<Yolo26Frame>() },
    output,
  )?;

  if !record.is_success() {
    warn!("本次统计失败，详见输出文件");
  }
  Ok(ExitCode::from(&record))
}
