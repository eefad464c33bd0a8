//! 根据图片描述为聚类命名，并评估聚类的一致性

use std::collections::HashMap;

use crate::config::ClusterOptions;
use crate::utils::{contains_term, round_to, title_case, tokenize};

pub const STOP_WORDS: &[&str] =
    &["the", "and", "with", "that", "this", "are", "is", "image", "photo", "picture", "shows"];

/// 主题名称及其关键词，按优先级排列
pub const THEMES: &[(&str, &[&str])] = &[
    ("Water & Ocean", &["ocean", "sea", "water", "beach", "wave", "lake", "river"]),
    ("Clothing & Fashion", &["shirt", "dress", "clothes", "clothing", "wearing", "fashion"]),
    ("Markets & Shopping", &["market", "vendor", "stall", "shopping", "store"]),
    ("Vehicles & Transportation", &["car", "vehicle", "truck", "motorcycle", "driving"]),
    ("People & Portraits", &["person", "man", "woman", "people", "human", "face"]),
    ("Art & Paintings", &["painting"]),
    ("Nature & Landscapes", &["tree", "forest", "nature", "landscape", "outdoor"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterName {
    pub name: String,
    pub keywords: Vec<String>,
    /// 0 ~ 100，保留一位小数
    pub confidence: f32,
}

fn non_empty<'a>(captions: &[&'a str]) -> Vec<&'a str> {
    captions.iter().copied().filter(|c| !c.trim().is_empty()).collect()
}

/// 长度不小于 `min_len` 且不在停用词中的词语
fn qualifying_tokens(captions: &[&str], min_len: usize) -> Vec<String> {
    captions
        .iter()
        .flat_map(|c| tokenize(c))
        .filter(|t| t.chars().count() >= min_len && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// 按出现次数降序排列，次数相同时按首次出现的顺序
pub fn ranked_tokens(captions: &[&str], min_len: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (order, token) in qualifying_tokens(captions, min_len).into_iter().enumerate() {
        counts.entry(token).or_insert((0, order)).0 += 1;
    }
    let mut ranked = counts.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|(_, (ca, oa)), (_, (cb, ob))| cb.cmp(ca).then(oa.cmp(ob)));
    ranked.into_iter().map(|(token, (count, _))| (token, count)).collect()
}

/// 第一个在描述中出现的主题
pub fn match_theme(captions: &[&str]) -> Option<&'static str> {
    let tokens = captions.iter().flat_map(|c| tokenize(c)).collect::<Vec<_>>();
    THEMES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| contains_term(&tokens, k)))
        .map(|(theme, _)| *theme)
}

/// 生成聚类名称、关键词和置信度
///
/// 置信度按成员数量计算，描述为空的成员同样计入
pub fn describe_cluster(
    id: usize,
    category: &str,
    captions: &[&str],
    opts: &ClusterOptions,
) -> ClusterName {
    let members = captions.len();
    let captions = non_empty(captions);
    let ranked = ranked_tokens(&captions, opts.keyword_min_len);
    let keywords =
        ranked.iter().take(opts.top_keywords).map(|(t, _)| t.clone()).collect::<Vec<_>>();

    let name = match (match_theme(&captions), ranked.first()) {
        (Some(theme), _) => theme.to_string(),
        (None, Some((top, _))) => {
            let top = title_case(top);
            if top.eq_ignore_ascii_case(category) { top } else { format!("{top} {category}") }
        }
        (None, None) => format!("{category} Group {}", id + 1),
    };

    let confidence = (members as f32 * opts.confidence_scale).min(opts.max_confidence);
    ClusterName { name, keywords, confidence: round_to(confidence, 1) }
}

/// 一致性：较长词语的重复程度，保留两位小数
pub fn analyze_quality(captions: &[&str], opts: &ClusterOptions) -> f32 {
    let tokens = qualifying_tokens(&non_empty(captions), opts.coherence_min_len);
    if tokens.is_empty() {
        return 0.0;
    }
    let mut unique = tokens.clone();
    unique.sort_unstable();
    unique.dedup();
    let repetition = 1.0 - unique.len() as f32 / tokens.len() as f32;
    round_to((repetition * opts.coherence_scale).min(1.0), 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_tokens() {
        let ranked = ranked_tokens(&["a red boat", "the red car", "a boat and a car"], 3);
        assert_eq!(
            ranked,
            vec![("red".to_string(), 2), ("boat".to_string(), 2), ("car".to_string(), 2)]
        );
        // 停用词和短词被过滤
        assert!(ranked_tokens(&["this is the image"], 3).is_empty());
    }

    #[test]
    fn test_theme_priority() {
        assert_eq!(match_theme(&["a man on the beach"]), Some("Water & Ocean"));
        assert_eq!(match_theme(&["a man in a forest"]), Some("People & Portraits"));
        assert_eq!(match_theme(&["a tall tree"]), Some("Nature & Landscapes"));
        // 整词匹配，carpet 不是 car
        assert_eq!(match_theme(&["a red carpet"]), None);
    }

    #[test]
    fn test_describe_cluster() {
        let opts = ClusterOptions::default();

        let name = describe_cluster(0, "Food", &["a slice of pizza", "pizza with cheese"], &opts);
        assert_eq!(name.name, "Pizza Food");
        assert_eq!(name.keywords, vec!["pizza", "slice", "cheese"]);
        assert_eq!(name.confidence, 20.0);

        let name = describe_cluster(0, "Animals", &["a cat"], &opts);
        assert_eq!(name.name, "Cat Animals");

        let name = describe_cluster(2, "General", &["", "  "], &opts);
        assert_eq!(name.name, "General Group 3");
        assert!(name.keywords.is_empty());
    }

    #[test]
    fn test_duplicate_words_collapse() {
        let opts = ClusterOptions::default();
        let name = describe_cluster(0, "Food", &["food on a plate", "more food"], &opts);
        assert_eq!(name.name, "Food");
    }

    #[test]
    fn test_confidence_is_capped() {
        let opts = ClusterOptions::default();
        let captions = vec!["a cat"; 20];
        assert_eq!(describe_cluster(0, "Animals", &captions, &opts).confidence, 85.0);
    }

    #[test]
    fn test_analyze_quality() {
        let opts = ClusterOptions::default();
        assert_eq!(analyze_quality(&[], &opts), 0.0);
        assert_eq!(analyze_quality(&["a cat"], &opts), 0.0);
        // 4 个词，2 个不同：(1 - 2 / 4) * 2 = 1.0
        assert_eq!(analyze_quality(&["green forest", "green forest"], &opts), 1.0);
        // 3 个词，3 个不同
        assert_eq!(analyze_quality(&["green forest river"], &opts), 0.0);
        // 5 个词，4 个不同：(1 - 4 / 5) * 2 = 0.4
        assert_eq!(analyze_quality(&["green forest", "green river lake"], &opts), 0.4);
    }
}
