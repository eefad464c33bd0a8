use std::collections::HashSet;

use linfa::traits::{Fit, Predict};
use linfa::{DatasetBase, ParamGuard};
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2, ArrayView2};
use rand_xoshiro::Xoshiro256Plus;
use rand_xoshiro::rand_core::SeedableRng;

use crate::error::{Error, Result};

/// KMeans 参数
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// 聚类中心数量
    pub k: usize,
    /// 单次初始化的最大迭代次数
    pub max_iter: usize,
    /// 收敛阈值
    pub tol: f32,
    /// 初始化次数，取距离和最小的一次
    pub n_init: usize,
    /// 随机种子
    pub seed: u64,
}

impl KMeansConfig {
    pub fn new(k: usize) -> Self {
        Self { k, max_iter: 300, tol: 1e-4, n_init: 10, seed: 42 }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone)]
pub struct KMeansState {
    /// 聚类中心，k * dim
    pub centroids: Array2<f32>,
    /// 每个点所属的聚类中心
    pub assignments: Vec<usize>,
    /// 所有点到所属中心的距离平方和
    pub inertia: f32,
    /// 每个聚类中心包含的点数量
    pub centroid_frequency: Vec<usize>,
}

impl KMeansState {
    /// 非空聚类的数量
    pub fn n_labels(&self) -> usize {
        self.centroid_frequency.iter().filter(|&&c| c > 0).count()
    }
}

/// 使用 linfa 的 KMeans（kmeans++ 初始化）进行聚类
///
/// 随机数生成器由 `seed` 初始化，同样的数据和参数总是得到同样的结果
pub fn kmeans(data: ArrayView2<f32>, conf: &KMeansConfig) -> Result<KMeansState> {
    let n = data.nrows();
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    if conf.k == 0 || conf.k > n {
        return Err(Error::InvalidClusterCount { requested: conf.k, n_items: n });
    }
    // kmeans++ 需要至少 k 个不同的点才能选出 k 个中心
    if distinct_rows(data) < conf.k {
        return Err(Error::Degenerate("fewer distinct points than clusters"));
    }

    let rng = Xoshiro256Plus::seed_from_u64(conf.seed);
    let model = KMeans::params_with_rng(conf.k, rng)
        .n_runs(conf.n_init.max(1))
        .max_n_iterations(conf.max_iter.max(1) as u64)
        .tolerance(conf.tol)
        .check()?
        .fit(&DatasetBase::from(data))?;

    let inertia = model.inertia();
    if !inertia.is_finite() {
        return Err(Error::Degenerate("kmeans produced a non-finite inertia"));
    }

    let assignments: Array1<usize> = model.predict(&data);
    let mut centroid_frequency = vec![0; conf.k];
    assignments.iter().for_each(|&a| centroid_frequency[a] += 1);

    Ok(KMeansState {
        centroids: model.centroids().to_owned(),
        assignments: assignments.to_vec(),
        inertia,
        centroid_frequency,
    })
}

fn distinct_rows(data: ArrayView2<f32>) -> usize {
    data.rows()
        .into_iter()
        .map(|row| row.iter().map(|x| (x + 0.0).to_bits()).collect::<Vec<_>>())
        .collect::<HashSet<_>>()
        .len()
}

/// 计算不平衡因子，1 表示完全平衡
pub fn imbalance_factor(hist: &[usize]) -> f32 {
    let (mut tot, mut uf) = (0.0, 0.0);
    for h in hist {
        let h = *h as f32;
        tot += h;
        uf += h.powf(2.0);
    }
    if tot == 0.0 {
        return 0.0;
    }
    uf * hist.len() as f32 / tot.powf(2.0)
}
