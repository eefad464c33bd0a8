//! 聚类流程：去重，划分类别，在每个类别内清洗向量、选择聚类数量、聚类、命名、合并

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::classifier::Classifier;
use crate::cluster::{CategoryClusters, ClusterDescriptor, ClusterQuality, ImageSummary};
use crate::config::ClusterOptions;
use crate::error::Error;
use crate::kmeans::imbalance_factor;
use crate::merge::{merge_clusters, sort_categories};
use crate::naming::{analyze_quality, describe_cluster};
use crate::record::{ImageRecord, coalesce};
use crate::router::CategoryRouter;
use crate::sanitize::{check_embedding, run_dimension, sanitize, standardize};
use crate::search::{self, ClusterCountSearch, KRange};
use crate::strategy::{Clusters, attach_to_largest, select_clusters, single_cluster};

pub struct ClusterEngine {
    opts: ClusterOptions,
    classifier: Option<Arc<dyn Classifier>>,
    search: Box<dyn ClusterCountSearch>,
}

impl ClusterEngine {
    pub fn new(opts: ClusterOptions) -> Self {
        let search = search::from_options(&opts);
        Self { opts, classifier: None, search }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// 替换选择聚类数量的方式
    pub fn with_search(mut self, search: Box<dyn ClusterCountSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.opts
    }

    /// 去重后为每条记录分配类别，类别按首次出现的顺序排列
    pub fn assign_categories<'a>(
        &self,
        records: &'a [ImageRecord],
    ) -> Vec<(String, Vec<&'a ImageRecord>)> {
        let unique = coalesce(records);
        let dim = run_dimension(unique.iter().map(|r| r.embedding.as_deref()));
        let router = CategoryRouter::new(self.classifier.as_deref());

        let mut categories: Vec<(String, Vec<&ImageRecord>)> = vec![];
        let mut position: HashMap<String, usize> = HashMap::new();
        for record in unique {
            let embedding = dim.and_then(|dim| {
                check_embedding(record.embedding.as_deref(), dim, self.opts.min_std).ok()
            });
            let category = router.route(record, embedding);
            match position.get(&category) {
                Some(&i) => categories[i].1.push(record),
                None => {
                    position.insert(category.clone(), categories.len());
                    categories.push((category, vec![record]));
                }
            }
        }
        categories
    }

    /// 对所有记录进行分类和聚类
    ///
    /// 只有输入为空时结果为空，其余情况下每条去重后的记录恰好出现在一个聚类中
    pub fn run(&self, records: &[ImageRecord]) -> Vec<CategoryClusters> {
        if records.is_empty() {
            return vec![];
        }
        let dim = run_dimension(coalesce(records).iter().map(|r| r.embedding.as_deref()));
        let categories = self.assign_categories(records);
        info!(
            "{} 张图片分为 {} 个类别",
            categories.iter().map(|(_, m)| m.len()).sum::<usize>(),
            categories.len()
        );

        let mut result = categories
            .into_iter()
            .map(|(category, members)| {
                let clusters = self.cluster_category(&category, &members, dim);
                let clusters = self.describe(&category, &members, clusters);
                CategoryClusters { category, clusters: merge_clusters(clusters, &self.opts) }
            })
            .collect::<Vec<_>>();
        sort_categories(&mut result);
        result
    }

    /// 类别内的聚类，成员下标对应 `members`
    fn cluster_category(
        &self,
        category: &str,
        members: &[&ImageRecord],
        dim: Option<usize>,
    ) -> Clusters {
        let n = members.len();
        if n < self.opts.min_category_size {
            debug!("{category}：只有 {n} 张图片，不进行聚类");
            return single_cluster(n);
        }
        let Some(dim) = dim else {
            warn!("{category}：没有可用的向量");
            return single_cluster(n);
        };

        let batch = members.iter().map(|r| r.embedding.as_deref()).collect::<Vec<_>>();
        let sanitized = sanitize(&batch, dim, self.opts.min_std, self.opts.clip_percentile);
        let mut sanitized = match sanitized {
            Ok(sanitized) => sanitized,
            Err(Error::InsufficientData { valid, .. }) => {
                warn!("{category}：只有 {valid} 个有效向量，归为一个聚类");
                return single_cluster(n);
            }
            Err(e) => {
                warn!("{category}：向量清洗失败：{e}");
                return single_cluster(n);
            }
        };
        standardize(&mut sanitized.matrix);

        let range = KRange::for_population(sanitized.valid.len(), &self.opts);
        let k = self.search.find_k(sanitized.matrix.view(), &range);
        info!(
            "{category}：{} 个有效向量，{} 个无效，聚类数量 {k}",
            sanitized.valid.len(),
            sanitized.invalid.len()
        );

        let mut clusters = select_clusters(sanitized.matrix.view(), k, &self.opts)
            .into_iter()
            .map(|(id, rows)| {
                (id, rows.into_iter().map(|row| sanitized.valid[row]).collect::<Vec<_>>())
            })
            .collect::<Clusters>();
        if !sanitized.invalid.is_empty() {
            attach_to_largest(&mut clusters, sanitized.invalid);
        }

        let sizes = clusters.values().map(Vec::len).collect::<Vec<_>>();
        debug!("{category}：聚类大小 {sizes:?}，不平衡因子 {:.2}", imbalance_factor(&sizes));
        clusters
    }

    fn describe(
        &self,
        category: &str,
        members: &[&ImageRecord],
        clusters: Clusters,
    ) -> Vec<ClusterDescriptor> {
        clusters
            .into_iter()
            .filter(|(_, indices)| !indices.is_empty())
            .map(|(id, indices)| {
                let records = indices.iter().map(|&i| members[i]).collect::<Vec<_>>();
                let captions = records.iter().map(|r| r.display_caption()).collect::<Vec<_>>();
                let name = describe_cluster(id, category, &captions, &self.opts);
                ClusterDescriptor {
                    id,
                    name: name.name,
                    confidence: name.confidence,
                    quality: ClusterQuality {
                        coherence: analyze_quality(&captions, &self.opts),
                        size: records.len(),
                    },
                    keywords: name.keywords,
                    images: records.into_iter().map(ImageSummary::from).collect(),
                }
            })
            .collect()
    }
}
