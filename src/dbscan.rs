//! DBSCAN 密度聚类
//!
//! 核心点：邻域半径 eps 内（含自身）至少有 min_samples 个点。
//! 从核心点出发可达的点组成一个聚类，其余点标记为 [`NOISE`]。

use linfa::ParamGuard;
use linfa::traits::Transformer;
use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::utils::{euclidean, percentile};

/// 噪声点的标签
pub const NOISE: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct Dbscan {
    /// 邻域半径
    eps: f32,
    /// 核心点的最小邻居数量，包含点自身
    min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f32, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// 返回每个点的聚类标签，噪声为 [`NOISE`]
    ///
    /// linfa 要求 min_points 至少为 2。`min_samples` 为 1 时每个点都是核心点，
    /// 因此按 2 运行后把剩下的孤立点各自作为一个聚类。
    pub fn fit_predict(&self, data: ArrayView2<f32>) -> Result<Vec<usize>> {
        if data.nrows() == 0 {
            return Err(Error::EmptyInput);
        }
        if !(self.eps > 0.0) {
            return Err(Error::InvalidParameter {
                name: "eps",
                message: format!("must be positive, got {}", self.eps),
            });
        }
        if self.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1".to_string(),
            });
        }

        let labels = linfa_clustering::Dbscan::params(self.min_samples.max(2))
            .tolerance(self.eps)
            .check()?
            .transform(&data);

        let mut next = labels.iter().flatten().max().map_or(0, |&m| m + 1);
        let labels = labels
            .iter()
            .map(|label| match label {
                Some(c) => *c,
                None if self.min_samples == 1 => {
                    next += 1;
                    next - 1
                }
                None => NOISE,
            })
            .collect();
        Ok(labels)
    }
}

/// 由 k 近邻距离分布估算邻域半径
///
/// 对每个点取到第 `k` 个最近点（含自身）的距离，再取这些距离的 `q` 百分位数
pub fn estimate_eps(data: ArrayView2<f32>, k: usize, q: f32) -> Result<f32> {
    let n = data.nrows();
    if n < 2 {
        return Err(Error::InsufficientData { valid: n, required: 2 });
    }
    let k = k.clamp(1, n);

    let kth = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut d = (0..n).map(|j| euclidean(data.row(i), data.row(j))).collect::<Vec<_>>();
            d.sort_by(f32::total_cmp);
            d[k - 1]
        })
        .collect::<Vec<_>>();

    percentile(&kth, q).ok_or(Error::EmptyInput)
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn blobs_with_outlier() -> Array2<f32> {
        let v = vec![
            0.0, 0.0, 0.1, 0.0, 0.0, 0.1, 0.1, 0.1, // A
            5.0, 5.0, 5.1, 5.0, 5.0, 5.1, 5.1, 5.1, // B
            50.0, 50.0, // 离群点
        ];
        Array2::from_shape_vec((9, 2), v).unwrap()
    }

    #[test]
    fn test_dbscan_clusters_and_noise() {
        let data = blobs_with_outlier();
        let labels = Dbscan::new(0.5, 2).fit_predict(data.view()).unwrap();

        assert!(labels[..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..8].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
        assert_ne!(labels[0], NOISE);
        assert_eq!(labels[8], NOISE);
    }

    #[test]
    fn test_dbscan_all_noise() {
        let data = blobs_with_outlier();
        let labels = Dbscan::new(0.01, 2).fit_predict(data.view()).unwrap();
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn test_dbscan_invalid_params() {
        let data = blobs_with_outlier();
        for (eps, min_samples) in [(0.0, 2), (f32::NAN, 2), (1.0, 0)] {
            assert!(matches!(
                Dbscan::new(eps, min_samples).fit_predict(data.view()),
                Err(Error::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_dbscan_min_samples_one() {
        let data = blobs_with_outlier();
        let labels = Dbscan::new(0.5, 1).fit_predict(data.view()).unwrap();

        assert!(labels[..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..8].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
        // 孤立点自成一类
        assert_ne!(labels[8], NOISE);
        assert!(!labels[..8].contains(&labels[8]));
    }

    #[test]
    fn test_estimate_eps() {
        let data = blobs_with_outlier();
        // k = 1 时最近的点是自身
        assert_eq!(estimate_eps(data.view(), 1, 75.0).unwrap(), 0.0);

        let eps = estimate_eps(data.view(), 2, 75.0).unwrap();
        assert!((eps - 0.1).abs() < 1e-5, "eps = {eps}");
    }
}
