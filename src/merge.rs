//! 合并同名聚类和过小的聚类，并对结果排序

use std::collections::HashMap;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::cluster::{CategoryClusters, ClusterDescriptor, ClusterQuality};
use crate::config::ClusterOptions;
use crate::utils::round_to;

static TRAILING_COUNTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d+\)$").expect("invalid regex"));
static TRAILING_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d+$").expect("invalid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("invalid regex"));

/// 去掉名称末尾的 `(2)` 计数和序号，并合并连续空白
pub fn normalize_cluster_name(name: &str) -> String {
    let name = TRAILING_COUNTER.replace(name, "");
    let name = TRAILING_ORDINAL.replace(&name, "");
    WHITESPACE.replace_all(&name, " ").trim().to_string()
}

/// 将一组聚类合并为一个，编号取第一个聚类的编号
///
/// 一致性按图片数量加权平均
fn merge_group(
    name: String,
    group: Vec<ClusterDescriptor>,
    opts: &ClusterOptions,
) -> Option<ClusterDescriptor> {
    let mut group = group.into_iter();
    let mut merged = group.next()?;
    merged.name = name;
    let mut weighted = merged.quality.coherence * merged.len() as f32;
    for other in group {
        weighted += other.quality.coherence * other.len() as f32;
        for keyword in other.keywords {
            if !merged.keywords.contains(&keyword) {
                merged.keywords.push(keyword);
            }
        }
        merged.images.extend(other.images);
    }

    let size = merged.len();
    merged.keywords.truncate(opts.top_keywords);
    merged.quality = ClusterQuality {
        coherence: if size > 0 { round_to(weighted / size as f32, 2) } else { 0.0 },
        size,
    };
    merged.confidence = round_to((size as f32 * opts.confidence_scale).min(opts.max_confidence), 1);
    Some(merged)
}

/// 合并一个类别内的聚类
///
/// 1. 名称规范化后相同的聚类合并
/// 2. 小于 `min_cluster_size` 的聚类并入最大的聚类，全部过小时合并为一个
/// 3. 按一致性、大小降序排列
pub fn merge_clusters(
    clusters: Vec<ClusterDescriptor>,
    opts: &ClusterOptions,
) -> Vec<ClusterDescriptor> {
    let mut order: Vec<(String, Vec<ClusterDescriptor>)> = vec![];
    let mut position: HashMap<String, usize> = HashMap::new();
    for cluster in clusters {
        let name = normalize_cluster_name(&cluster.name);
        match position.get(&name) {
            Some(&i) => order[i].1.push(cluster),
            None => {
                position.insert(name.clone(), order.len());
                order.push((name, vec![cluster]));
            }
        }
    }
    let merged = order
        .into_iter()
        .filter_map(|(name, group)| merge_group(name, group, opts))
        .collect::<Vec<_>>();

    let (mut survivors, small): (Vec<_>, Vec<_>) =
        merged.into_iter().partition(|c| c.len() >= opts.min_cluster_size);
    if !small.is_empty() {
        debug!("{} 个过小的聚类被合并", small.len());
        if survivors.is_empty() {
            let name = small[0].name.clone();
            survivors.extend(merge_group(name, small, opts));
        } else {
            let mut target = 0;
            for (i, c) in survivors.iter().enumerate() {
                if c.len() > survivors[target].len() {
                    target = i;
                }
            }
            let largest = survivors.remove(target);
            let name = largest.name.clone();
            let mut group = vec![largest];
            group.extend(small);
            if let Some(cluster) = merge_group(name, group, opts) {
                survivors.insert(target, cluster);
            }
        }
    }

    sort_clusters(&mut survivors);
    survivors
}

/// 按一致性降序、大小降序排列，保持稳定
pub fn sort_clusters(clusters: &mut [ClusterDescriptor]) {
    clusters.sort_by(|a, b| {
        b.quality.coherence.total_cmp(&a.quality.coherence).then(b.len().cmp(&a.len()))
    });
}

/// 按图片总数降序排列类别，保持稳定
pub fn sort_categories(categories: &mut [CategoryClusters]) {
    categories.sort_by_key(|c| std::cmp::Reverse(c.total()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ImageSummary;

    fn cluster(
        id: usize,
        name: &str,
        size: usize,
        coherence: f32,
        keywords: &[&str],
    ) -> ClusterDescriptor {
        ClusterDescriptor {
            id,
            name: name.to_string(),
            confidence: 0.0,
            quality: ClusterQuality { coherence, size },
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            images: (0..size)
                .map(|i| ImageSummary { path: format!("{name}/{i}.jpg"), caption: String::new() })
                .collect(),
        }
    }

    #[test]
    fn test_normalize_cluster_name() {
        assert_eq!(normalize_cluster_name("Water Collection (2)"), "Water Collection");
        assert_eq!(normalize_cluster_name("Nature Group 3"), "Nature Group");
        assert_eq!(normalize_cluster_name("  Water   Collection "), "Water Collection");
        assert_eq!(normalize_cluster_name("Water & Ocean"), "Water & Ocean");
    }

    #[test]
    fn test_merge_weighted_coherence() {
        let opts = ClusterOptions::default();
        let merged = merge_clusters(
            vec![
                cluster(3, "Water Collection", 5, 0.8, &["water", "wave"]),
                cluster(7, "Water Collection (2)", 3, 0.4, &["wave", "lake", "boat"]),
            ],
            &opts,
        );
        assert_eq!(merged.len(), 1);
        let c = &merged[0];
        assert_eq!(c.id, 3);
        assert_eq!(c.name, "Water Collection");
        assert_eq!(c.len(), 8);
        assert_eq!(c.quality.size, 8);
        assert!((c.quality.coherence - 0.65).abs() < 1e-6);
        assert_eq!(c.keywords, vec!["water", "wave", "lake"]);
        assert_eq!(c.confidence, 80.0);
    }

    #[test]
    fn test_small_clusters_fold_into_largest() {
        let opts = ClusterOptions::default();
        let merged = merge_clusters(
            vec![
                cluster(0, "Beach", 3, 0.5, &[]),
                cluster(1, "Forest", 4, 0.2, &[]),
                cluster(2, "Lonely", 1, 1.0, &[]),
            ],
            &opts,
        );
        assert_eq!(merged.len(), 2);
        let forest = merged.iter().find(|c| c.name == "Forest").unwrap();
        assert_eq!(forest.len(), 5);
        assert_eq!(forest.quality.coherence, 0.36);
        assert_eq!(merged.iter().map(ClusterDescriptor::len).sum::<usize>(), 8);
    }

    #[test]
    fn test_all_small_become_one() {
        let opts = ClusterOptions::default();
        let small = vec![cluster(0, "A", 1, 0.0, &[]), cluster(1, "B", 1, 0.0, &[])];
        let merged = merge_clusters(small, &opts);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, 0);
        assert_eq!(merged[0].len(), 2);

        let single = merge_clusters(vec![cluster(0, "Cat Animals", 1, 0.0, &["cat"])], &opts);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].len(), 1);
    }

    #[test]
    fn test_sort_order() {
        let mut clusters = vec![
            cluster(0, "a", 2, 0.1, &[]),
            cluster(1, "b", 5, 0.9, &[]),
            cluster(2, "c", 3, 0.9, &[]),
            cluster(3, "d", 4, 0.1, &[]),
        ];
        sort_clusters(&mut clusters);
        assert_eq!(clusters.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3, 0]);

        let category = |name: &str, size: usize| CategoryClusters {
            category: name.to_string(),
            clusters: vec![cluster(0, name, size, 0.0, &[])],
        };
        let mut categories =
            vec![category("Small", 2), category("Big", 6), category("Also Small", 2)];
        sort_categories(&mut categories);
        assert_eq!(
            categories.iter().map(|c| c.category.as_str()).collect::<Vec<_>>(),
            vec!["Big", "Small", "Also Small"]
        );
    }
}
