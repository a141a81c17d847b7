// 该文件是 Headcount （数人头） 项目的一部分。
// src/model/yolo26.rs - YOLO26 检测模型（RKNN）
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

use rknpu::{Context, InitFlags, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{AsNhwcFrame, RgbNhwcFrame},
  model::{DetectItem, DetectResult, Model},
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_INPUT_W: f32 = 640.0;
const YOLO26_INPUT_H: f32 = 640.0;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];
// 与训练框架推理时的默认置信度一致
const YOLO26_SCORE_THRESH: f32 = 0.25;
// 单张图片最多保留的检测数
const YOLO26_MAX_DET: usize = 300;

/// YOLO26 的输入帧：640x640 RGB NHWC
pub type Yolo26Frame = RgbNhwcFrame<640, 640>;

pub struct Yolo26<Frame> {
  context: Context,
  score_threshold: f32,
  max_det: usize,
  _phantom: std::marker::PhantomData<Frame>,
}

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}: {1}")]
  ModelLoadError(String, std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型输出异常: {0}")]
  OutputMismatch(String),
}

impl From<rknpu::Error> for Yolo26Error {
  fn from(err: rknpu::Error) -> Self {
    Yolo26Error::RknnError(err)
  }
}

impl Yolo26Error {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    Yolo26Error::ModelInvalid(msg.to_string(), e)
  }
}

pub struct Yolo26Builder {
  model_path: String,
  score_threshold: f32,
  max_det: usize,
}

impl FromUrlWithScheme for Yolo26Builder {
  const SCHEME: &'static str = "yolo26";
}

impl FromUrl for Yolo26Builder {
  type Error = Yolo26Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolo26Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let model_path = urlencoding::decode(url.path())
      .map_err(|e| Yolo26Error::ModelPathError(format!("模型路径解码失败: {}", e)))?
      .into_owned();
    if model_path.is_empty() {
      return Err(Yolo26Error::ModelPathError(format!("模型路径为空: {}", url)));
    }

    let mut score_threshold = YOLO26_SCORE_THRESH;
    let mut max_det = YOLO26_MAX_DET;
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "conf" => {
          score_threshold = v
            .parse::<f32>()
            .ok()
            .filter(|t| (0.0..=1.0).contains(t))
            .ok_or_else(|| Yolo26Error::ModelPathError(format!("无效的置信度阈值: {}", v)))?;
        }
        "max_det" => {
          max_det = v
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| Yolo26Error::ModelPathError(format!("无效的最大检测数: {}", v)))?;
        }
        _ => {}
      }
    }

    Ok(Yolo26Builder {
      model_path,
      score_threshold,
      max_det,
    })
  }
}

impl Yolo26Builder {
  pub fn build<Frame>(self) -> Result<Yolo26<Frame>, Yolo26Error> {
    info!("加载模型文件: {}", self.model_path);
    let mode_data = std::fs::read(&self.model_path)
      .map_err(|e| Yolo26Error::ModelLoadError(self.model_path.clone(), e))?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, InitFlags::default())?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(Yolo26Error::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输出数量", e))?;

    if num_inputs != YOLO26_NUM_INPUTS {
      let msg = format!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLO26_NUM_INPUTS, num_inputs
      );
      error!("{}", msg);
      return Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel));
    }

    if num_outputs != YOLO26_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输出数量为 {}, 实际为 {}",
        YOLO26_NUM_OUTPUTS, num_outputs
      );
      error!("{}", msg);
      return Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel));
    }

    info!(
      "模型加载完成，置信度阈值 {}，最大检测数 {}",
      self.score_threshold, self.max_det
    );

    Ok(Yolo26 {
      context,
      score_threshold: self.score_threshold,
      max_det: self.max_det,
      _phantom: std::marker::PhantomData,
    })
  }
}

/// 根据张量大小区分回归和分类输出
/// 返回 (reg, cls, 类别数)
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  spatial: usize,
  head_idx: usize,
) -> Result<(&'a [f32], &'a [f32], usize), Yolo26Error> {
  let reg_expected = 4 * spatial;
  let is_cls = |t: &[f32]| !t.is_empty() && t.len() % spatial == 0;

  if tensor1.len() == reg_expected && is_cls(tensor2) {
    Ok((tensor1, tensor2, tensor2.len() / spatial))
  } else if tensor2.len() == reg_expected && is_cls(tensor1) {
    debug!("检测头 {}: 输出顺序交换", head_idx);
    Ok((tensor2, tensor1, tensor1.len() / spatial))
  } else {
    let msg = format!(
      "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}, 期望回归: {}",
      head_idx,
      tensor1.len(),
      tensor2.len(),
      reg_expected
    );
    error!("{}", msg);
    Err(Yolo26Error::OutputMismatch(msg))
  }
}

/// 解码三个检测头的输出，每个检测头占两个张量（回归、分类，顺序不定）
///
/// 任一检测头缺失或大小不符都视为推理失败。结果按分数降序，最多保留 `max_det` 个。
fn decode_heads(
  tensors: &[&[f32]],
  score_threshold: f32,
  max_det: usize,
) -> Result<DetectResult, Yolo26Error> {
  if tensors.len() != YOLO26_NUM_OUTPUTS as usize {
    return Err(Yolo26Error::OutputMismatch(format!(
      "预期输出张量数量为 {}, 实际为 {}",
      YOLO26_NUM_OUTPUTS,
      tensors.len()
    )));
  }

  let mut items = Vec::new();

  for (head_idx, (&(map_h, map_w), stride)) in
    YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate()
  {
    let spatial = map_h * map_w;
    let (reg, cls, num_classes) =
      match_reg_cls_tensors(tensors[head_idx * 2], tensors[head_idx * 2 + 1], spatial, head_idx)?;

    for h in 0..map_h {
      for w in 0..map_w {
        let idx = h * map_w + w;

        let (score, class_id) = {
          let mut max_logit = f32::MIN;
          let mut cls_idx = 0usize;
          for c in 0..num_classes {
            let logit = cls[c * spatial + idx];
            if logit > max_logit {
              max_logit = logit;
              cls_idx = c;
            }
          }
          (sigmoid(max_logit), cls_idx as u32)
        };

        if score <= score_threshold {
          continue;
        }

        let dl = reg[idx];
        let dt = reg[spatial + idx];
        let dr = reg[2 * spatial + idx];
        let db = reg[3 * spatial + idx];

        let grid_x = (w as f32) + 0.5;
        let grid_y = (h as f32) + 0.5;

        let xmin = ((grid_x - dl) * stride).clamp(0.0, YOLO26_INPUT_W);
        let ymin = ((grid_y - dt) * stride).clamp(0.0, YOLO26_INPUT_H);
        let xmax = ((grid_x + dr) * stride).clamp(0.0, YOLO26_INPUT_W);
        let ymax = ((grid_y + db) * stride).clamp(0.0, YOLO26_INPUT_H);

        items.push(DetectItem {
          class_id,
          score,
          bbox: [
            xmin / YOLO26_INPUT_W,
            ymin / YOLO26_INPUT_H,
            xmax / YOLO26_INPUT_W,
            ymax / YOLO26_INPUT_H,
          ],
        });
      }
    }
  }

  items.sort_by(|a, b| b.score.total_cmp(&a.score));
  if items.len() > max_det {
    debug!("检测数 {} 超过上限，保留前 {} 个", items.len(), max_det);
    items.truncate(max_det);
  }

  debug!("检测到 {} 个目标", items.len());
  Ok(DetectResult::from(items))
}

impl<Frame> Yolo26<Frame> {
  fn postprocess(&self, output: rknpu::Output) -> Result<DetectResult, Yolo26Error> {
    debug!("后处理模型输出");
    let tensors = (0..YOLO26_NUM_OUTPUTS as usize)
      .map(|i| {
        output.get_f32(i).map_err(|e| {
          error!("获取第 {} 个输出失败: {}", i, e);
          Yolo26Error::RknnError(e)
        })
      })
      .collect::<Result<Vec<&[f32]>, _>>()?;

    decode_heads(&tensors, self.score_threshold, self.max_det)
  }
}

impl<Frame: AsNhwcFrame> Model for Yolo26<Frame> {
  type Input = Frame;
  type Output = DetectResult;
  type Error = Yolo26Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    self.context.set_input(
      0,
      input.as_nhwc(),
      rknpu::TensorFormat::NHWC,
      TensorType::UInt8,
    )?;

    debug!("执行模型推理");
    self.context.run()?;

    let output = self.context.get_outputs()?;
    self.postprocess(output)
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
  use super::*;

  const COLD: f32 = -10.0;
  const HOT: f32 = 4.0;

  struct Head {
    reg: Vec<f32>,
    cls: Vec<f32>,
    spatial: usize,
  }

  impl Head {
    fn new(size: usize, num_classes: usize) -> Self {
      let spatial = size * size;
      Head {
        reg: vec![1.0; 4 * spatial],
        cls: vec![COLD; num_classes * spatial],
        spatial,
      }
    }

    fn hot(mut self, cell: usize, class: usize) -> Self {
      self.cls[class * self.spatial + cell] = HOT;
      self
    }
  }

  fn heads(num_classes: usize) -> [Head; 3] {
    [
      Head::new(80, num_classes),
      Head::new(40, num_classes),
      Head::new(20, num_classes),
    ]
  }

  fn flatten(heads: &[Head; 3], swapped: bool) -> Vec<&[f32]> {
    heads
      .iter()
      .flat_map(|h| {
        if swapped {
          [h.cls.as_slice(), h.reg.as_slice()]
        } else {
          [h.reg.as_slice(), h.cls.as_slice()]
        }
      })
      .collect()
  }

  #[test]
  fn single_class_model_counts_hot_cells() {
    let [a, b, c] = heads(1);
    let heads = [a.hot(0, 0).hot(6399, 0), b.hot(810, 0), c];
    let result = decode_heads(&flatten(&heads, false), YOLO26_SCORE_THRESH, YOLO26_MAX_DET).unwrap();

    assert_eq!(result.len(), 3);
    assert!(result.items.iter().all(|item| item.class_id == 0));
  }

  #[test]
  fn swapped_outputs_and_multi_class() {
    let [a, b, c] = heads(80);
    let heads = [a, b, c.hot(210, 17)];
    let result = decode_heads(&flatten(&heads, true), YOLO26_SCORE_THRESH, YOLO26_MAX_DET).unwrap();

    assert_eq!(result.len(), 1);
    let item = &result.items[0];
    assert_eq!(item.class_id, 17);
    // 第 210 个单元位于 (10, 10)，stride 32，距离均为 1
    let expected = [9.5 * 32.0 / 640.0, 9.5 * 32.0 / 640.0, 11.5 * 32.0 / 640.0, 11.5 * 32.0 / 640.0];
    for (got, want) in item.bbox.iter().zip(expected) {
      assert!((got - want).abs() < 1e-5);
    }
  }

  #[test]
  fn boxes_are_clamped_to_input() {
    let [a, b, c] = heads(1);
    let mut a = a.hot(0, 0);
    a.reg[0] = 100.0;
    let result = decode_heads(&flatten(&[a, b, c], false), YOLO26_SCORE_THRESH, YOLO26_MAX_DET).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].bbox[0], 0.0);
  }

  #[test]
  fn threshold_filters_low_scores() {
    let [a, b, c] = heads(1);
    let mut a = a;
    a.cls[5] = 0.0;
    let heads = [a, b, c];
    let tensors = flatten(&heads, false);

    assert_eq!(decode_heads(&tensors, 0.25, YOLO26_MAX_DET).unwrap().len(), 1);
    assert!(decode_heads(&tensors, 0.6, YOLO26_MAX_DET).unwrap().is_empty());
  }

  #[test]
  fn mismatched_head_fails_decoding() {
    let [a, b, c] = heads(1);
    let bogus = [0.0f32; 7];
    let heads = [a.hot(1, 0), b.hot(1, 0), c.hot(1, 0)];
    let mut tensors = flatten(&heads, false);
    tensors[2] = &bogus;
    tensors[3] = &bogus;

    let err = decode_heads(&tensors, YOLO26_SCORE_THRESH, YOLO26_MAX_DET).unwrap_err();
    assert!(matches!(err, Yolo26Error::OutputMismatch(_)));
    assert!(err.to_string().contains("检测头 1"));
  }

  #[test]
  fn missing_head_fails_decoding() {
    let heads = heads(1);
    let tensors = flatten(&heads, false);

    assert!(matches!(
      decode_heads(&tensors[..4], YOLO26_SCORE_THRESH, YOLO26_MAX_DET),
      Err(Yolo26Error::OutputMismatch(_))
    ));
  }

  #[test]
  fn detections_are_capped_by_score() {
    let [mut a, b, c] = heads(1);
    // 400 个单元超过阈值，分数随编号递增
    for cell in 0..400 {
      a.cls[cell] = 1.0 + cell as f32 * 0.01;
    }
    let heads = [a, b, c];
    let tensors = flatten(&heads, false);

    let result = decode_heads(&tensors, YOLO26_SCORE_THRESH, YOLO26_MAX_DET).unwrap();
    assert_eq!(result.len(), 300);
    assert!(result.items.windows(2).all(|w| w[0].score >= w[1].score));
    // 分数最低的 100 个单元被丢弃
    let lowest_kept = sigmoid(1.0 + 100.0 * 0.01);
    assert!(result.items.iter().all(|item| item.score >= lowest_kept - 1e-6));

    let result = decode_heads(&tensors, YOLO26_SCORE_THRESH, 5).unwrap();
    assert_eq!(result.len(), 5);
    assert!((result.items[0].score - sigmoid(1.0 + 399.0 * 0.01)).abs() < 1e-6);
  }

  /// 直接返回给定原始输出的模型，用于检查解码失败在任务层面的表现
  struct RawOutputModel {
    tensors: Vec<Vec<f32>>,
  }

  impl Model for RawOutputModel {
    type Input = RgbNhwcFrame<32, 32>;
    type Output = DetectResult;
    type Error = Yolo26Error;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      let tensors = self.tensors.iter().map(Vec::as_slice).collect::<Vec<_>>();
      decode_heads(&tensors, YOLO26_SCORE_THRESH, YOLO26_MAX_DET)
    }
  }

  #[test]
  fn malformed_output_produces_failure_record() {
    use crate::{
      config::Config,
      input::InferenceRequest,
      output::{InferenceResult, JsonRecordOutput},
      task::{HeadCountTask, Task},
    };

    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("0.jpg");
    image::RgbImage::from_pixel(48, 32, image::Rgb([10, 20, 30]))
      .save(&image_path)
      .unwrap();
    let output_path = dir.path().join("output").join("result.json");

    let [a, b, c] = heads(1);
    let mut tensors = [a.hot(0, 0), b.hot(0, 0), c]
      .into_iter()
      .flat_map(|h| [h.reg, h.cls])
      .collect::<Vec<_>>();
    tensors[5].truncate(3);

    let request = InferenceRequest::resolve(
      Some(image_path.to_string_lossy().into_owned()),
      &Config::default(),
    );
    let record = HeadCountTask
      .run_task(
        &request,
        || Ok::<_, Yolo26Error>(RawOutputModel { tensors }),
        JsonRecordOutput::create(&output_path).unwrap(),
      )
      .unwrap();

    let InferenceResult::Failure { error } = &record else {
      panic!("expected failure record, got {:?}", record);
    };
    assert!(error.contains("推理失败"));
    assert!(error.contains("检测头 2"));

    let written: InferenceResult =
      serde_json::from_slice(&std::fs::read(&output_path).unwrap()).unwrap();
    assert_eq!(written, record);
  }

  #[test]
  fn builder_from_url() {
    let url = Url::parse("yolo26:model/best.rknn?conf=0.4").unwrap();
    let builder = Yolo26Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "model/best.rknn");
    assert!((builder.score_threshold - 0.4).abs() < f32::EPSILON);
    assert_eq!(builder.max_det, YOLO26_MAX_DET);

    let url = Url::parse("yolo26:///opt/models/head.rknn?max_det=50").unwrap();
    let builder = Yolo26Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/opt/models/head.rknn");
    assert_eq!(builder.score_threshold, YOLO26_SCORE_THRESH);
    assert_eq!(builder.max_det, 50);
  }

  #[test]
  fn builder_decodes_escaped_path() {
    let url = Url::parse("yolo26:my%20models/best.rknn").unwrap();
    let builder = Yolo26Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "my models/best.rknn");

    let url = Url::parse("yolo26:///opt/%E6%A8%A1%E5%9E%8B/head.rknn").unwrap();
    let builder = Yolo26Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/opt/模型/head.rknn");
  }

  #[test]
  fn builder_rejects_bad_urls() {
    let wrong_scheme = Url::parse("onnx:model/best.onnx").unwrap();
    assert!(matches!(
      Yolo26Builder::from_url(&wrong_scheme),
      Err(Yolo26Error::ModelPathError(_))
    ));

    let bad_conf = Url::parse("yolo26:model/best.rknn?conf=abc").unwrap();
    assert!(matches!(
      Yolo26Builder::from_url(&bad_conf),
      Err(Yolo26Error::ModelPathError(_))
    ));

    for bad_max_det in ["yolo26:model/best.rknn?max_det=0", "yolo26:model/best.rknn?max_det=-1"] {
      let url = Url::parse(bad_max_det).unwrap();
      assert!(matches!(
        Yolo26Builder::from_url(&url),
        Err(Yolo26Error::ModelPathError(_))
      ));
    }
  }

  #[test]
  fn missing_model_file_fails_to_build() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("best.rknn");
    let url = Url::parse(&format!("yolo26://{}", path.display())).unwrap();
    let err = Yolo26Builder::from_url(&url)
      .unwrap()
      .build::<Yolo26Frame>()
      .err()
      .unwrap();
    assert!(matches!(err, Yolo26Error::ModelLoadError(..)));
    assert!(err.to_string().contains("best.rknn"));
  }
}
