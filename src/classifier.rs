//! 基于向量的类别分类器
//!
//! 分类器是一个 softmax 线性模型，训练后用 bincode 序列化到文件，运行时通过
//! [`SharedClassifier`] 只加载一次。

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 根据向量预测类别
pub trait Classifier: Send + Sync {
    fn predict(&self, embedding: &[f32]) -> Result<String>;
}

/// 训练参数
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    /// L2 正则化系数
    pub l2: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self { epochs: 200, learning_rate: 0.5, l2: 1e-4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearClassifier {
    labels: Vec<String>,
    /// 类别数 * 维度
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl LinearClassifier {
    pub fn new(labels: Vec<String>, weights: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::InvalidParameter {
                name: "labels",
                message: "must not be empty".to_string(),
            });
        }
        if weights.nrows() != labels.len() {
            return Err(Error::DimensionMismatch { expected: labels.len(), found: weights.nrows() });
        }
        if bias.len() != labels.len() {
            return Err(Error::DimensionMismatch { expected: labels.len(), found: bias.len() });
        }
        Ok(Self { labels, weights, bias })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// 输入向量的维度
    pub fn dim(&self) -> usize {
        self.weights.ncols()
    }

    fn decision(&self, x: ArrayView1<f32>) -> Array1<f32> {
        self.weights.dot(&x) + &self.bias
    }

    /// 从文件加载分类器
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }

    /// 保存分类器到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// 使用全量梯度下降训练 softmax 回归
    ///
    /// 每轮结束后调用 `on_epoch(epoch, loss)`
    pub fn train<F>(samples: &[(&[f32], &str)], conf: &TrainConfig, mut on_epoch: F) -> Result<Self>
    where
        F: FnMut(usize, f32),
    {
        let Some((first, _)) = samples.first() else {
            return Err(Error::EmptyInput);
        };
        let dim = first.len();

        // 标签按字典序排列，保证同样的数据得到同样的模型
        let labels = samples.iter().map(|(_, l)| l.to_string()).collect::<BTreeSet<_>>();
        let labels = labels.into_iter().collect::<Vec<_>>();
        let n = samples.len();
        let c = labels.len();

        let mut flat = Vec::with_capacity(n * dim);
        let mut y = Vec::with_capacity(n);
        for (x, label) in samples {
            if x.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, found: x.len() });
            }
            flat.extend_from_slice(x);
            y.push(labels.binary_search_by(|l| l.as_str().cmp(label)).unwrap_or(0));
        }
        let x = Array2::from_shape_vec((n, dim), flat)
            .map_err(|e| Error::InvalidParameter { name: "samples", message: e.to_string() })?;

        let mut weights = Array2::<f32>::zeros((c, dim));
        let mut bias = Array1::<f32>::zeros(c);
        for epoch in 0..conf.epochs {
            let mut probs = x.dot(&weights.t()) + &bias;
            softmax_rows(&mut probs);

            let mut loss = 0.0;
            for (i, &label) in y.iter().enumerate() {
                loss -= probs[[i, label]].max(f32::MIN_POSITIVE).ln();
                probs[[i, label]] -= 1.0;
            }
            loss /= n as f32;

            let grad_w = probs.t().dot(&x) / n as f32 + &weights * conf.l2;
            let grad_b = probs.sum_axis(Axis(0)) / n as f32;
            weights.scaled_add(-conf.learning_rate, &grad_w);
            bias.scaled_add(-conf.learning_rate, &grad_b);

            on_epoch(epoch, loss);
        }

        Self::new(labels, weights, bias)
    }

    /// 在给定样本上的准确率
    pub fn accuracy(&self, samples: &[(&[f32], &str)]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let correct = samples
            .iter()
            .filter(|(x, label)| self.predict(x).map(|p| p == *label).unwrap_or(false))
            .count();
        correct as f32 / samples.len() as f32
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, embedding: &[f32]) -> Result<String> {
        if embedding.len() != self.dim() {
            return Err(Error::DimensionMismatch { expected: self.dim(), found: embedding.len() });
        }
        let scores = self.decision(ArrayView1::from(embedding));
        let best = scores
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
                Some((_, b)) if b >= s => best,
                _ if s.is_nan() => best,
                _ => Some((i, s)),
            })
            .ok_or_else(|| Error::Classifier("no finite decision score".to_string()))?;
        Ok(self.labels[best.0].clone())
    }
}

fn softmax_rows(m: &mut Array2<f32>) {
    for mut row in m.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        }
    }
}

/// 按比例随机划分训练集和测试集，返回两组下标
pub fn train_test_split(n: usize, test_size: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx = (0..n).collect::<Vec<_>>();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((n as f32) * test_size.clamp(0.0, 1.0)).ceil() as usize;
    let n_test = n_test.min(n.saturating_sub(1));
    let train = idx.split_off(n_test);
    (train, idx)
}

/// 进程内共享的分类器句柄
///
/// 第一次调用 [`SharedClassifier::get`] 时加载，并发的调用方会等待同一次加载。
/// 加载结果（包括加载失败）只计算一次，之后不再改变。
#[derive(Debug)]
pub struct SharedClassifier {
    path: PathBuf,
    cell: OnceLock<Option<Arc<LinearClassifier>>>,
}

impl SharedClassifier {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), cell: OnceLock::new() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Option<Arc<LinearClassifier>> {
        self.cell
            .get_or_init(|| {
                if !self.path.exists() {
                    warn!("分类器文件不存在：{}，将使用关键词分类", self.path.display());
                    return None;
                }
                match LinearClassifier::load(&self.path) {
                    Ok(classifier) => {
                        info!(
                            "分类器加载成功：{} 个类别，维度 {}",
                            classifier.labels().len(),
                            classifier.dim()
                        );
                        Some(Arc::new(classifier))
                    }
                    Err(e) => {
                        warn!("分类器加载失败：{e}，将使用关键词分类");
                        None
                    }
                }
            })
            .clone()
    }
}
