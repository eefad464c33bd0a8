//! 向量清洗：剔除无效向量，截断离群值，标准化

use std::collections::HashMap;

use log::debug;
use ndarray::{Array2, Axis};

use crate::error::{Error, Result};
use crate::utils::{percentile, std_dev};

/// 至少需要多少个有效向量才能进行聚类
pub const MIN_VALID_VECTORS: usize = 2;

/// 向量被剔除的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// 没有向量
    Missing,
    /// 维度与本次运行的维度不一致
    DimensionMismatch { expected: usize, found: usize },
    /// 包含 NaN 或 Inf
    NonFinite,
    /// 标准差过小，通常意味着上游编码失败
    Degenerate,
}

/// 本次运行的向量维度：出现次数最多的长度，次数相同时取最先出现的
pub fn run_dimension<'a, I>(embeddings: I) -> Option<usize>
where
    I: IntoIterator<Item = Option<&'a [f32]>>,
{
    let mut counts: HashMap<usize, (usize, usize)> = HashMap::new();
    for (order, len) in embeddings.into_iter().flatten().map(<[f32]>::len).enumerate() {
        if len == 0 {
            continue;
        }
        counts.entry(len).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, oa)), (_, (cb, ob))| ca.cmp(cb).then(ob.cmp(oa)))
        .map(|(len, _)| len)
}

/// 检查单个向量是否可用
pub fn check_embedding(
    embedding: Option<&[f32]>,
    dim: usize,
    min_std: f32,
) -> std::result::Result<&[f32], Rejection> {
    let v = embedding.ok_or(Rejection::Missing)?;
    if v.len() != dim {
        return Err(Rejection::DimensionMismatch { expected: dim, found: v.len() });
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(Rejection::NonFinite);
    }
    if std_dev(v) < min_std {
        return Err(Rejection::Degenerate);
    }
    Ok(v)
}

/// 清洗后的向量矩阵
#[derive(Debug, Clone)]
pub struct Sanitized {
    /// 有效向量组成的 n * dim 矩阵
    pub matrix: Array2<f32>,
    /// 有效向量在输入中的下标，与矩阵的行一一对应
    pub valid: Vec<usize>,
    /// 被剔除的向量下标
    pub invalid: Vec<usize>,
    /// 截断使用的绝对值上限
    pub clip_bound: f32,
}

/// 剔除无效向量，并按全局百分位数截断每个分量的绝对值
///
/// 有效向量少于 2 个时返回 [`Error::InsufficientData`]，由调用方退回单一聚类
pub fn sanitize(
    batch: &[Option<&[f32]>],
    dim: usize,
    min_std: f32,
    clip_percentile: f32,
) -> Result<Sanitized> {
    let mut valid = vec![];
    let mut invalid = vec![];
    let mut flat = Vec::with_capacity(batch.len() * dim);
    for (i, embedding) in batch.iter().enumerate() {
        match check_embedding(*embedding, dim, min_std) {
            Ok(v) => {
                valid.push(i);
                flat.extend_from_slice(v);
            }
            Err(reason) => {
                debug!("剔除第 {i} 个向量：{reason:?}");
                invalid.push(i);
            }
        }
    }

    if valid.len() < MIN_VALID_VECTORS {
        return Err(Error::InsufficientData { valid: valid.len(), required: MIN_VALID_VECTORS });
    }

    let abs = flat.iter().map(|x| x.abs()).collect::<Vec<_>>();
    let clip_bound = percentile(&abs, clip_percentile).unwrap_or(f32::INFINITY);
    let mut matrix = Array2::from_shape_vec((valid.len(), dim), flat)
        .map_err(|e| Error::InvalidParameter { name: "embedding", message: e.to_string() })?;
    matrix.mapv_inplace(|x| x.clamp(-clip_bound, clip_bound));

    Ok(Sanitized { matrix, valid, invalid, clip_bound })
}

/// 按列标准化为零均值、单位方差，方差为 0 的列只做中心化
pub fn standardize(matrix: &mut Array2<f32>) {
    if matrix.nrows() == 0 {
        return;
    }
    let Some(mean) = matrix.mean_axis(Axis(0)) else {
        return;
    };
    let std = matrix.std_axis(Axis(0), 0.0);
    *matrix -= &mean;
    for mut row in matrix.rows_mut() {
        row.zip_mut_with(&std, |x, &s| {
            if s > f32::EPSILON {
                *x /= s;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors(n: usize, dim: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| (0..dim).map(|j| ((i * dim + j) % 7) as f32 / 7.0 - 0.5).collect()).collect()
    }

    #[test]
    fn test_run_dimension() {
        let a = vec![0.0; 4];
        let b = vec![0.0; 3];
        let dim = run_dimension([Some(&b[..]), Some(&a[..]), None, Some(&a[..])]);
        assert_eq!(dim, Some(4));
        let dim = run_dimension([Some(&b[..]), Some(&a[..])]);
        assert_eq!(dim, Some(3));
        assert_eq!(run_dimension([None, None]), None);
    }

    #[test]
    fn test_check_embedding() {
        let good = vec![0.1, 0.5, -0.3];
        assert!(check_embedding(Some(&good[..]), 3, 1e-6).is_ok());
        assert_eq!(check_embedding(None, 3, 1e-6), Err(Rejection::Missing));
        assert_eq!(
            check_embedding(Some(&good[..]), 4, 1e-6),
            Err(Rejection::DimensionMismatch { expected: 4, found: 3 })
        );
        let nan = vec![0.1, f32::NAN, 0.2];
        let inf = vec![0.1, f32::INFINITY, 0.2];
        let zero = vec![0.0; 3];
        assert_eq!(check_embedding(Some(&nan[..]), 3, 1e-6), Err(Rejection::NonFinite));
        assert_eq!(check_embedding(Some(&inf[..]), 3, 1e-6), Err(Rejection::NonFinite));
        assert_eq!(check_embedding(Some(&zero[..]), 3, 1e-6), Err(Rejection::Degenerate));
    }

    #[test]
    fn test_sanitize_drops_invalid() {
        let data = vectors(4, 5);
        let zero = vec![0.0; 5];
        let batch =
            vec![Some(&data[0][..]), None, Some(&zero[..]), Some(&data[1][..]), Some(&data[2][..])];
        let s = sanitize(&batch, 5, 1e-6, 99.0).unwrap();
        assert_eq!(s.valid, vec![0, 3, 4]);
        assert_eq!(s.invalid, vec![1, 2]);
        assert_eq!(s.matrix.dim(), (3, 5));
    }

    #[test]
    fn test_sanitize_insufficient() {
        let data = vectors(1, 5);
        let batch = vec![Some(&data[0][..]), None];
        match sanitize(&batch, 5, 1e-6, 99.0) {
            Err(Error::InsufficientData { valid, required }) => {
                assert_eq!(valid, 1);
                assert_eq!(required, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_outlier_is_clipped_not_dropped() {
        let mut data = vectors(10, 10);
        data[3][7] = 1000.0;
        let batch = data.iter().map(|v| Some(&v[..])).collect::<Vec<_>>();

        let abs = data.iter().flatten().map(|x| x.abs()).collect::<Vec<_>>();
        let bound = percentile(&abs, 99.0).unwrap();
        assert!(bound < 1000.0);

        let s = sanitize(&batch, 10, 1e-6, 99.0).unwrap();
        assert_eq!(s.valid.len(), 10);
        assert!(s.invalid.is_empty());
        assert_eq!(s.clip_bound, bound);
        assert_eq!(s.matrix[[3, 7]], bound);
        assert!(s.matrix.iter().all(|x| x.abs() <= bound));
    }

    #[test]
    fn test_standardize() {
        let mut m = Array2::from_shape_vec((3, 2), vec![1.0, 5.0, 2.0, 5.0, 3.0, 5.0]).unwrap();
        standardize(&mut m);
        let mean = m.mean_axis(Axis(0)).unwrap();
        assert!(mean.iter().all(|x| x.abs() < 1e-6));
        assert!((m.column(0).std(0.0) - 1.0).abs() < 1e-5);
        // 方差为 0 的列只做中心化
        assert!(m.column(1).iter().all(|x| *x == 0.0));
    }
}
