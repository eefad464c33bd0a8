//! 选择每个类别的聚类数量

use log::debug;
use ndarray::ArrayView2;

use crate::config::{ClusterOptions, KSearchKind};
use crate::kmeans::{KMeansConfig, kmeans};
use crate::metrics::silhouette_score;

/// 聚类数量的候选范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KRange {
    pub min_k: usize,
    pub max_k: usize,
    /// 无法搜索时使用的聚类数量
    pub floor: usize,
}

impl KRange {
    /// 根据有效样本数量计算候选范围
    ///
    /// 上限为 `min(max_k, n / k_divisor)`，并且不超过 `n - 1`
    pub fn for_population(n: usize, opts: &ClusterOptions) -> Self {
        let max_k = opts.max_k.min(n / opts.k_divisor.max(1)).min(n.saturating_sub(1));
        Self { min_k: opts.min_k, max_k, floor: opts.k_floor }
    }

    pub fn is_empty(&self) -> bool {
        self.min_k > self.max_k
    }

    /// 范围为空时的取值
    fn fallback(&self) -> usize {
        self.floor.max(self.max_k)
    }
}

pub trait ClusterCountSearch: Send + Sync {
    fn find_k(&self, data: ArrayView2<f32>, range: &KRange) -> usize;
}

/// 根据配置创建搜索方式
pub fn from_options(opts: &ClusterOptions) -> Box<dyn ClusterCountSearch> {
    match opts.k_search {
        KSearchKind::Silhouette => Box::new(SilhouetteSearch::from(opts)),
        KSearchKind::Heuristic => Box::new(HeuristicSearch { k_divisor: opts.k_divisor }),
    }
}

/// 对每个候选数量使用多个随机种子运行 KMeans，取平均轮廓系数最高的数量
#[derive(Debug, Clone)]
pub struct SilhouetteSearch {
    pub seeds: Vec<u64>,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f32,
}

impl From<&ClusterOptions> for SilhouetteSearch {
    fn from(opts: &ClusterOptions) -> Self {
        Self {
            seeds: opts.seeds.clone(),
            n_init: opts.explore_n_init,
            max_iter: opts.explore_max_iter,
            tol: opts.tol,
        }
    }
}

impl SilhouetteSearch {
    /// 某个聚类数量在所有种子上的平均轮廓系数，没有任何有效结果时返回 `None`
    fn average_score(&self, data: ArrayView2<f32>, k: usize) -> Option<f32> {
        let scores = self
            .seeds
            .iter()
            .filter_map(|&seed| {
                let conf = KMeansConfig::new(k)
                    .n_init(self.n_init)
                    .max_iter(self.max_iter)
                    .tol(self.tol)
                    .seed(seed);
                let state = kmeans(data, &conf).ok()?;
                if state.n_labels() < 2 {
                    return None;
                }
                silhouette_score(data, &state.assignments).ok()
            })
            .collect::<Vec<_>>();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f32>() / scores.len() as f32)
    }
}

impl ClusterCountSearch for SilhouetteSearch {
    fn find_k(&self, data: ArrayView2<f32>, range: &KRange) -> usize {
        let n = data.nrows();
        if n < range.min_k {
            return range.floor;
        }
        if range.is_empty() {
            return range.fallback();
        }

        let mut best: Option<(usize, f32)> = None;
        for k in range.min_k..=range.max_k {
            let Some(score) = self.average_score(data, k) else {
                debug!("k = {k} 没有有效的聚类结果");
                continue;
            };
            debug!("k = {k}, 平均轮廓系数 = {score:.4}");
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((k, score));
            }
        }
        best.map(|(k, _)| k).unwrap_or(range.floor)
    }
}

/// 直接按样本数量估算：`clamp(n / k_divisor, min_k, max_k)`
#[derive(Debug, Clone)]
pub struct HeuristicSearch {
    pub k_divisor: usize,
}

impl ClusterCountSearch for HeuristicSearch {
    fn find_k(&self, data: ArrayView2<f32>, range: &KRange) -> usize {
        let n = data.nrows();
        if n < range.min_k {
            return range.floor;
        }
        if range.is_empty() {
            return range.fallback();
        }
        (n / self.k_divisor.max(1)).clamp(range.min_k, range.max_k)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn blobs(centers: &[[f32; 2]], per_blob: usize) -> Array2<f32> {
        let mut v = vec![];
        for c in centers {
            for i in 0..per_blob {
                let d = i as f32 * 0.05;
                v.extend_from_slice(&[c[0] + d, c[1] - d]);
            }
        }
        Array2::from_shape_vec((centers.len() * per_blob, 2), v).unwrap()
    }

    #[test]
    fn test_range_for_population() {
        let opts = ClusterOptions::default();
        assert_eq!(KRange::for_population(7, &opts), KRange { min_k: 2, max_k: 2, floor: 1 });
        assert_eq!(KRange::for_population(100, &opts).max_k, 8);
        assert!(KRange::for_population(4, &opts).is_empty());
        assert_eq!(KRange::for_population(2, &opts).max_k, 0);
    }

    #[test]
    fn test_silhouette_finds_three_blobs() {
        let data = blobs(&[[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]], 5);
        let search = SilhouetteSearch::from(&ClusterOptions::default());
        let range = KRange { min_k: 2, max_k: 5, floor: 1 };
        assert_eq!(search.find_k(data.view(), &range), 3);
    }

    #[test]
    fn test_silhouette_degenerate() {
        let search = SilhouetteSearch::from(&ClusterOptions::default());

        // 所有点相同，没有有效的轮廓系数
        let data = Array2::from_elem((6, 2), 1.0f32);
        assert_eq!(search.find_k(data.view(), &KRange { min_k: 2, max_k: 3, floor: 1 }), 1);

        // 样本数量小于下限
        let data = blobs(&[[0.0, 0.0]], 1);
        assert_eq!(search.find_k(data.view(), &KRange { min_k: 2, max_k: 3, floor: 1 }), 1);

        // 范围为空
        let data = blobs(&[[0.0, 0.0]], 4);
        assert_eq!(search.find_k(data.view(), &KRange { min_k: 2, max_k: 1, floor: 1 }), 1);
    }

    #[test]
    fn test_heuristic() {
        let search = HeuristicSearch { k_divisor: 3 };
        let data = blobs(&[[0.0, 0.0]], 12);
        assert_eq!(search.find_k(data.view(), &KRange { min_k: 2, max_k: 8, floor: 1 }), 4);
        assert_eq!(search.find_k(data.view(), &KRange { min_k: 2, max_k: 3, floor: 1 }), 3);
        let data = blobs(&[[0.0, 0.0]], 1);
        assert_eq!(search.find_k(data.view(), &KRange { min_k: 2, max_k: 3, floor: 1 }), 1);
    }

    #[test]
    fn test_from_options() {
        let mut opts = ClusterOptions::default();
        opts.k_search = KSearchKind::Heuristic;
        let search = from_options(&opts);
        let data = blobs(&[[0.0, 0.0]], 9);
        assert_eq!(search.find_k(data.view(), &KRange::for_population(9, &opts)), 3);
    }
}
