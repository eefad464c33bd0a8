use thiserror::Error;

/// imcluster 的错误类型
///
/// 聚类过程中的错误只在单次尝试的范围内传播，引擎会记录日志并退回到更粗粒度的分组，
/// 只有分类器的读写会把错误返回给调用方。
#[derive(Debug, Error)]
pub enum Error {
    /// 输入为空
    #[error("empty input")]
    EmptyInput,

    /// 有效向量数量不足
    #[error("insufficient data: {valid} valid vectors, at least {required} required")]
    InsufficientData { valid: usize, required: usize },

    /// 聚类数量与数据集不匹配
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidClusterCount { requested: usize, n_items: usize },

    /// 向量维度不一致
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// 参数非法
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// 结果退化，例如只有一个标签时轮廓系数没有定义
    #[error("degenerate result: {0}")]
    Degenerate(&'static str),

    /// 聚类结果被质量检查拒绝
    #[error("rejected: {0}")]
    Rejected(String),

    /// 分类器无法给出预测
    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("kmeans: {0}")]
    KMeans(#[from] linfa_clustering::KMeansError),

    #[error("kmeans parameters: {0}")]
    KMeansParams(#[from] linfa_clustering::KMeansParamsError),

    #[error("dbscan parameters: {0}")]
    DbscanParams(#[from] linfa_clustering::DbscanParamsError),

    #[error(transparent)]
    Linfa(#[from] linfa::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
