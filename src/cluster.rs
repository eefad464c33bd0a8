use serde::{Deserialize, Serialize};

use crate::metrics::ClusterStatistics;
use crate::record::ImageRecord;

/// 聚类中的一张图片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub path: String,
    pub caption: String,
}

impl From<&ImageRecord> for ImageSummary {
    fn from(record: &ImageRecord) -> Self {
        Self { path: record.path.clone(), caption: record.display_caption().to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterQuality {
    /// 关键词重复程度，0 ~ 1
    pub coherence: f32,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    pub id: usize,
    pub name: String,
    /// 0 ~ 100
    pub confidence: f32,
    pub quality: ClusterQuality,
    pub keywords: Vec<String>,
    pub images: Vec<ImageSummary>,
}

impl ClusterDescriptor {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// 一个类别下的全部聚类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryClusters {
    pub category: String,
    pub clusters: Vec<ClusterDescriptor>,
}

impl CategoryClusters {
    /// 类别中的图片总数
    pub fn total(&self) -> usize {
        self.clusters.iter().map(ClusterDescriptor::len).sum()
    }

    pub fn statistics(&self) -> ClusterStatistics {
        let sizes = self.clusters.iter().map(ClusterDescriptor::len).collect::<Vec<_>>();
        ClusterStatistics::from_sizes(&sizes)
    }
}
