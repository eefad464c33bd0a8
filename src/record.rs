use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 一条图片记录，由外部存储提供的只读快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// 图片路径，作为唯一标识
    #[serde(alias = "image_path")]
    pub path: String,
    /// 主描述
    #[serde(default)]
    pub caption: String,
    /// 自动生成的次级描述，存在时优先使用
    #[serde(default, alias = "blip_caption")]
    pub secondary_caption: Option<String>,
    /// 描述文本的语义向量
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// 预先标注的类别，仅用于训练分类器
    #[serde(default)]
    pub category: Option<String>,
}

impl ImageRecord {
    pub fn new<P: Into<String>, C: Into<String>>(path: P, caption: C) -> Self {
        Self {
            path: path.into(),
            caption: caption.into(),
            secondary_caption: None,
            embedding: None,
            category: None,
        }
    }

    pub fn with_secondary_caption<S: Into<String>>(mut self, caption: S) -> Self {
        self.secondary_caption = Some(caption.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    /// 展示用的描述：次级描述非空时优先，否则使用主描述
    pub fn display_caption(&self) -> &str {
        match self.secondary_caption.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => &self.caption,
        }
    }
}

/// 按路径去重：保留第一次出现的位置，内容取最后一次出现的记录
pub fn coalesce(records: &[ImageRecord]) -> Vec<&ImageRecord> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<&ImageRecord> = Vec::with_capacity(records.len());
    for record in records {
        match position.get(record.path.as_str()) {
            Some(&i) => unique[i] = record,
            None => {
                position.insert(record.path.as_str(), unique.len());
                unique.push(record);
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_caption() {
        let record = ImageRecord::new("a.jpg", "a dog");
        assert_eq!(record.display_caption(), "a dog");

        let record = record.with_secondary_caption("a brown dog on grass");
        assert_eq!(record.display_caption(), "a brown dog on grass");

        let record = ImageRecord::new("b.jpg", "a cat").with_secondary_caption("  ");
        assert_eq!(record.display_caption(), "a cat");
    }

    #[test]
    fn test_coalesce_last_wins() {
        let records = vec![
            ImageRecord::new("a.jpg", "first"),
            ImageRecord::new("b.jpg", "other"),
            ImageRecord::new("a.jpg", "second"),
        ];
        let unique = coalesce(&records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].path, "a.jpg");
        assert_eq!(unique[0].caption, "second");
        assert_eq!(unique[1].path, "b.jpg");
    }

    #[test]
    fn test_deserialize_aliases() {
        let json = r#"{
            "image_path": "x.jpg",
            "caption": "a boat",
            "blip_caption": "a red boat",
            "embedding": [0.1, 0.2]
        }"#;
        let record: ImageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.path, "x.jpg");
        assert_eq!(record.display_caption(), "a red boat");
        assert_eq!(record.embedding, Some(vec![0.1, 0.2]));
        assert_eq!(record.category, None);
    }
}
