use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs =
        ProjectDirs::from("", "imcluster", "imcluster").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap_or(".")
}

/// 选择聚类数量的方式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KSearchKind {
    /// 多随机种子的轮廓系数搜索
    Silhouette,
    /// 按类别大小直接估算
    Heuristic,
}

/// 聚类引擎的全部可调参数
///
/// 作为库使用时通过 `ClusterOptions::default()` 获取默认值，与命令行默认值一致
#[derive(Parser, Debug, Clone)]
pub struct ClusterOptions {
    /// 向量标准差低于该值视为无效向量
    #[arg(long, value_name = "STD", default_value_t = 1e-6)]
    pub min_std: f32,
    /// 向量截断使用的百分位数
    #[arg(long, value_name = "PERCENTILE", default_value_t = 99.0)]
    pub clip_percentile: f32,
    /// 类别中少于该数量的图片时不进行聚类
    #[arg(long, value_name = "N", default_value_t = 2)]
    pub min_category_size: usize,

    /// 聚类数量的选择方式
    #[arg(long, value_enum, default_value_t = KSearchKind::Silhouette)]
    pub k_search: KSearchKind,
    /// 聚类数量下限
    #[arg(long, value_name = "K", default_value_t = 2)]
    pub min_k: usize,
    /// 聚类数量上限
    #[arg(long, value_name = "K", default_value_t = 8)]
    pub max_k: usize,
    /// 每个聚类平均至少包含的有效图片数量，用于限制聚类数量上限
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub k_divisor: usize,
    /// 退化情况下使用的聚类数量
    #[arg(long, value_name = "K", default_value_t = 1)]
    pub k_floor: usize,

    /// KMeans 使用的随机种子列表
    #[arg(
        long,
        value_name = "SEEDS",
        value_delimiter = ',',
        default_values_t = [42u64, 123, 456, 789]
    )]
    pub seeds: Vec<u64>,
    /// 搜索聚类数量时每个种子的初始化次数
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub explore_n_init: usize,
    /// 搜索聚类数量时的最大迭代次数
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub explore_max_iter: usize,
    /// 最终聚类时每个种子的初始化次数
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub n_init: usize,
    /// 最终聚类的最大迭代次数
    #[arg(long, value_name = "N", default_value_t = 300)]
    pub max_iter: usize,
    /// KMeans 的收敛阈值
    #[arg(long, value_name = "TOL", default_value_t = 1e-4)]
    pub tol: f32,

    /// 至少包含多少有效向量才尝试 DBSCAN
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub dbscan_min_points: usize,
    /// 估算邻域半径时使用的近邻数量（包含点自身）
    #[arg(long, value_name = "K", default_value_t = 5)]
    pub dbscan_neighbors: usize,
    /// 邻域半径取 k 近邻距离分布的百分位数
    #[arg(long, value_name = "PERCENTILE", default_value_t = 75.0)]
    pub dbscan_eps_percentile: f32,
    /// 核心点最小邻居数 = 样本数 / 该值
    #[arg(long, value_name = "N", default_value_t = 25)]
    pub dbscan_min_samples_divisor: usize,
    /// 核心点最小邻居数的下限
    #[arg(long, value_name = "N", default_value_t = 2)]
    pub dbscan_min_samples_floor: usize,

    /// 小于该数量的聚类会被并入最大的聚类
    #[arg(long, value_name = "N", default_value_t = 2)]
    pub min_cluster_size: usize,
    /// 关键词的最小长度
    #[arg(long, value_name = "LEN", default_value_t = 3)]
    pub keyword_min_len: usize,
    /// 计算一致性时单词的最小长度
    #[arg(long, value_name = "LEN", default_value_t = 4)]
    pub coherence_min_len: usize,
    /// 一致性的放大系数
    #[arg(long, value_name = "SCALE", default_value_t = 2.0)]
    pub coherence_scale: f32,
    /// 每个聚类输出的关键词数量
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub top_keywords: usize,
    /// 每张图片贡献的置信度
    #[arg(long, value_name = "SCALE", default_value_t = 10.0)]
    pub confidence_scale: f32,
    /// 置信度上限
    #[arg(long, value_name = "SCORE", default_value_t = 85.0)]
    pub max_confidence: f32,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self::parse_from(["imcluster"])
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imcluster", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imcluster 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 对图片记录进行分类和聚类
    Cluster(ClusterCommand),
    /// 训练类别分类器
    Train(TrainCommand),
    /// 查看图片记录和分类器的状态
    Inspect(InspectCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回分类器文件的路径
    pub fn classifier(&self) -> PathBuf {
        self.path.join("classifier.bin")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = ClusterOptions::default();
        assert_eq!(opts.seeds, vec![42, 123, 456, 789]);
        assert_eq!(opts.min_k, 2);
        assert_eq!(opts.max_k, 8);
        assert_eq!(opts.k_search, KSearchKind::Silhouette);
        assert_eq!(opts.dbscan_min_samples_divisor, 25);
    }

    #[test]
    fn test_seed_list_parsing() {
        let opts = ClusterOptions::parse_from(["imcluster", "--seeds", "1,2,3", "--max-k", "4"]);
        assert_eq!(opts.seeds, vec![1, 2, 3]);
        assert_eq!(opts.max_k, 4);
    }
}
