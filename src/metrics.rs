use std::collections::HashSet;

use linfa::DatasetBase;
use linfa::metrics::SilhouetteScore;
use ndarray::{Array1, ArrayView2};
use serde::Serialize;

use crate::error::{Error, Result};

/// 平均轮廓系数，范围 -1 ~ 1
///
/// 标签数量必须在 2 到 n - 1 之间，否则轮廓系数没有定义
pub fn silhouette_score(data: ArrayView2<f32>, labels: &[usize]) -> Result<f32> {
    let n = data.nrows();
    if labels.len() != n {
        return Err(Error::DimensionMismatch { expected: n, found: labels.len() });
    }
    let m = labels.iter().collect::<HashSet<_>>().len();
    if m < 2 || m >= n {
        return Err(Error::Degenerate("silhouette requires 2 <= n_labels <= n_samples - 1"));
    }

    let score = DatasetBase::new(data, Array1::from(labels.to_vec())).silhouette_score()?;
    if !score.is_finite() {
        return Err(Error::Degenerate("silhouette is not finite"));
    }
    Ok(score)
}

/// 聚类结果的规模分布
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStatistics {
    pub total_clusters: usize,
    pub total_images: usize,
    pub avg_size: f32,
    pub min: usize,
    pub max: usize,
    pub median: f32,
    pub std: f32,
    /// 1 - std / median，越接近 1 越均衡
    pub balance_score: f32,
}

impl ClusterStatistics {
    pub fn from_sizes(sizes: &[usize]) -> Self {
        if sizes.is_empty() {
            return Self {
                total_clusters: 0,
                total_images: 0,
                avg_size: 0.0,
                min: 0,
                max: 0,
                median: 0.0,
                std: 0.0,
                balance_score: 0.0,
            };
        }

        let mut sorted = sizes.to_vec();
        sorted.sort_unstable();
        let total_images = sorted.iter().sum::<usize>();
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f32 / 2.0
        } else {
            sorted[mid] as f32
        };
        let as_f32 = sorted.iter().map(|&s| s as f32).collect::<Vec<_>>();
        let std = crate::utils::std_dev(&as_f32);

        Self {
            total_clusters: sorted.len(),
            total_images,
            avg_size: total_images as f32 / sorted.len() as f32,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median,
            std,
            balance_score: if median > 0.0 { 1.0 - std / median } else { 0.0 },
        }
    }
}
