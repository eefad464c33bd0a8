//! 在 KMeans 和 DBSCAN 之间选择聚类结果
//!
//! 每种方式的结果都是一个显式的 [`Attempt`]，失败的尝试会被记录并跳过，
//! 后尝试的方式只有在轮廓系数严格更高时才会替换之前的结果。

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};
use ndarray::{ArrayView2, Axis};

use crate::config::ClusterOptions;
use crate::dbscan::{Dbscan, NOISE, estimate_eps};
use crate::error::{Error, Result};
use crate::kmeans::{KMeansConfig, kmeans};
use crate::metrics::silhouette_score;

/// 聚类编号 -> 成员下标
pub type Clusters = BTreeMap<usize, Vec<usize>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// KMeans
    Centroid,
    /// DBSCAN
    Density,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Centroid => write!(f, "KMeans"),
            Strategy::Density => write!(f, "DBSCAN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub clusters: Clusters,
    /// 轮廓系数
    pub score: f32,
}

#[derive(Debug)]
pub struct Attempt {
    pub strategy: Strategy,
    pub outcome: Result<Partition>,
}

/// 对一个类别的有效向量进行聚类，返回的成员下标为矩阵的行号
///
/// 结果总是非空的，所有方式都失败时整个类别作为一个聚类
pub fn select_clusters(data: ArrayView2<f32>, k: usize, opts: &ClusterOptions) -> Clusters {
    let n = data.nrows();
    if n == 0 {
        return Clusters::new();
    }
    if k < 2 {
        return single_cluster(n);
    }

    let mut attempts =
        vec![Attempt { strategy: Strategy::Centroid, outcome: centroid_attempt(data, k, opts) }];
    if n >= opts.dbscan_min_points {
        attempts
            .push(Attempt { strategy: Strategy::Density, outcome: density_attempt(data, opts) });
    }

    let mut best: Option<(Strategy, Partition)> = None;
    for Attempt { strategy, outcome } in attempts {
        match outcome {
            Ok(partition) => {
                debug!("{strategy}：{} 个聚类，轮廓系数 {:.4}", partition.clusters.len(), partition.score);
                if best.as_ref().is_none_or(|(_, b)| partition.score > b.score) {
                    best = Some((strategy, partition));
                }
            }
            Err(e) => warn!("{strategy} 聚类失败：{e}"),
        }
    }

    match best {
        Some((strategy, partition)) => {
            info!("使用 {strategy} 的结果：{} 个聚类，轮廓系数 {:.4}", partition.clusters.len(), partition.score);
            partition.clusters
        }
        None => {
            warn!("所有聚类方式都失败，{n} 张图片归为一个聚类");
            single_cluster(n)
        }
    }
}

/// 所有成员归为编号 0 的聚类
pub fn single_cluster(n: usize) -> Clusters {
    Clusters::from([(0, (0..n).collect())])
}

/// 使用每个随机种子运行 KMeans，保留轮廓系数最高的结果
pub fn centroid_attempt(
    data: ArrayView2<f32>,
    k: usize,
    opts: &ClusterOptions,
) -> Result<Partition> {
    let mut best: Option<Partition> = None;
    let mut last_error = None;
    for &seed in &opts.seeds {
        let conf = KMeansConfig::new(k)
            .n_init(opts.n_init)
            .max_iter(opts.max_iter)
            .tol(opts.tol)
            .seed(seed);
        let result = kmeans(data, &conf).and_then(|state| {
            silhouette_score(data, &state.assignments).map(|score| (state, score))
        });
        match result {
            Ok((state, score)) => {
                if best.as_ref().is_none_or(|b| score > b.score) {
                    best = Some(Partition { clusters: group_labels(&state.assignments), score });
                }
            }
            Err(e) => {
                debug!("种子 {seed} 的 KMeans 结果无效：{e}");
                last_error = Some(e);
            }
        }
    }
    best.ok_or_else(|| {
        last_error.unwrap_or(Error::InvalidParameter {
            name: "seeds",
            message: "empty".to_string(),
        })
    })
}

/// DBSCAN 聚类，噪声点并入最大的聚类
pub fn density_attempt(data: ArrayView2<f32>, opts: &ClusterOptions) -> Result<Partition> {
    let n = data.nrows();
    if n < opts.dbscan_min_points {
        return Err(Error::InsufficientData { valid: n, required: opts.dbscan_min_points });
    }

    let neighbors = opts.dbscan_neighbors.min(n.saturating_sub(1));
    let eps = estimate_eps(data, neighbors, opts.dbscan_eps_percentile)?;
    let min_samples = opts.dbscan_min_samples_floor.max(n / opts.dbscan_min_samples_divisor.max(1));
    debug!("DBSCAN 参数：eps = {eps:.4}, min_samples = {min_samples}");
    let labels = Dbscan::new(eps, min_samples).fit_predict(data)?;

    let mut clusters = group_labels(&labels);
    if clusters.len() <= 1 {
        return Err(Error::Rejected(format!("{} non-noise clusters", clusters.len())));
    }
    let singletons = clusters.values().filter(|m| m.len() == 1).count();
    if singletons as f32 > n as f32 / 2.0 {
        return Err(Error::Rejected(format!(
            "{singletons} of {n} points are in singleton clusters"
        )));
    }

    let core = (0..n).filter(|&i| labels[i] != NOISE).collect::<Vec<_>>();
    let core_labels = core.iter().map(|&i| labels[i]).collect::<Vec<_>>();
    let score = silhouette_score(data.select(Axis(0), &core).view(), &core_labels).unwrap_or(0.0);

    let noise = (0..n).filter(|&i| labels[i] == NOISE).collect::<Vec<_>>();
    if !noise.is_empty() {
        debug!("{} 个噪声点并入最大的聚类", noise.len());
        attach_to_largest(&mut clusters, noise);
    }

    Ok(Partition { clusters, score })
}

/// 按标签分组，编号按标签大小重新从 0 开始，忽略噪声
pub fn group_labels(labels: &[usize]) -> Clusters {
    let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        if label != NOISE {
            by_label.entry(label).or_default().push(i);
        }
    }
    by_label.into_values().enumerate().collect()
}

/// 最大的聚类，大小相同时取编号最小的
pub fn largest_cluster(clusters: &Clusters) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (&id, members) in clusters {
        if best.is_none_or(|(_, size)| members.len() > size) {
            best = Some((id, members.len()));
        }
    }
    best.map(|(id, _)| id)
}

/// 将成员追加到最大的聚类中，没有聚类时新建编号 0 的聚类
pub fn attach_to_largest<I: IntoIterator<Item = usize>>(clusters: &mut Clusters, members: I) {
    let id = largest_cluster(clusters).unwrap_or(0);
    clusters.entry(id).or_default().extend(members);
}
