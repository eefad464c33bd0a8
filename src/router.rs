//! 粗粒度类别划分
//!
//! 优先使用分类器预测，其次按关键词打分，最后归入 [`DEFAULT_CATEGORY`]。

use log::warn;

use crate::classifier::Classifier;
use crate::record::ImageRecord;
use crate::utils::{contains_term, tokenize};

/// 兜底类别
pub const DEFAULT_CATEGORY: &str = "General";

/// 类别关键词表，顺序即平局时的优先级
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Animals",
        &[
            "cat", "dog", "horse", "cow", "bird", "elephant", "sheep", "animal", "pet", "zoo",
            "farm",
            "wildlife", "kitten", "puppy",
        ],
    ),
    (
        "People",
        &[
            "man", "woman", "person", "boy", "girl", "child", "baby", "people", "human", "family",
            "group", "crowd",
        ],
    ),
    (
        "Food",
        &[
            "food", "meal", "eating", "cake", "pizza", "sandwich", "fruit", "vegetable", "dinner",
            "lunch", "breakfast", "cooking", "kitchen", "restaurant",
        ],
    ),
    (
        "Vehicles",
        &[
            "car", "bus", "train", "truck", "motorcycle", "bike", "airplane", "boat", "vehicle",
            "driving", "transportation",
        ],
    ),
    (
        "Nature",
        &[
            "tree", "flower", "garden", "forest", "mountain", "beach", "ocean", "sky", "sunset",
            "landscape", "outdoor", "park",
        ],
    ),
    (
        "Buildings",
        &[
            "building", "house", "church", "bridge", "architecture", "city", "street", "road",
            "construction",
        ],
    ),
    (
        "Sports",
        &[
            "tennis", "baseball", "football", "basketball", "soccer", "sport", "game", "playing",
            "ball", "field",
        ],
    ),
    (
        "Electronics",
        &[
            "computer", "phone", "television", "laptop", "screen", "device", "electronic",
            "technology",
        ],
    ),
    (
        "Furniture",
        &[
            "chair", "table", "bed", "sofa", "furniture", "room", "living", "bedroom", "sitting",
        ],
    ),
    ("Clothes", &["shirt", "dress", "hat", "shoes", "clothing", "wearing", "fashion"]),
];

/// 分类器训练使用的类别
pub const TRAINING_CATEGORIES: &[&str] = &[
    "animals", "people", "buildings", "nature", "food", "vehicles", "technology", "sports",
    "indoor", "outdoor", "landscape", "furniture", "clothes", "toys", "documents", "instruments",
    "art", "transportation", "pets", "plants", "bathroom", "kitchen", "office", "electronics",
    "sky", "water", "celebration", "market", "street", "child", "drinks", "interior", "workspace",
];

/// 关键词到训练标签的映射，按顺序取第一个命中的
pub const LABEL_KEYWORDS: &[(&str, &str)] = &[
    ("cat", "animals"), ("dog", "animals"), ("horse", "animals"), ("cow", "animals"),
    ("bird", "animals"), ("elephant", "animals"), ("sheep", "animals"), ("giraffe", "animals"),
    ("zebra", "animals"), ("bear", "animals"), ("monkey", "animals"), ("rabbit", "animals"),
    ("lion", "animals"), ("duck", "animals"), ("fish", "animals"), ("goat", "animals"),
    ("chicken", "animals"), ("fox", "animals"),
    ("chair", "furniture"), ("table", "furniture"), ("couch", "furniture"), ("sofa", "furniture"),
    ("bed", "furniture"), ("bench", "furniture"), ("cabinet", "furniture"), ("drawer", "furniture"),
    ("shelf", "furniture"), ("bookshelf", "furniture"), ("dresser", "furniture"),
    ("toilet", "bathroom"), ("sink", "bathroom"), ("bathtub", "bathroom"), ("shower", "bathroom"),
    ("towel", "bathroom"),
    ("fridge", "kitchen"), ("microwave", "kitchen"), ("oven", "kitchen"), ("stove", "kitchen"),
    ("kettle", "kitchen"), ("blender", "kitchen"), ("toaster", "kitchen"), ("pan", "kitchen"),
    ("pot", "kitchen"), ("dish", "kitchen"),
    ("laptop", "office"), ("computer", "office"), ("keyboard", "office"), ("mouse", "office"),
    ("printer", "office"), ("notebook", "office"), ("pen", "office"),
    ("car", "vehicles"), ("bus", "vehicles"), ("train", "vehicles"), ("truck", "vehicles"),
    ("motorcycle", "vehicles"), ("bike", "vehicles"), ("airplane", "vehicles"),
    ("boat", "vehicles"),
    ("pizza", "food"), ("cake", "celebration"), ("sandwich", "food"), ("apple", "food"),
    ("banana", "food"), ("orange", "food"), ("burger", "food"), ("salad", "food"),
    ("ice cream", "food"), ("bread", "food"),
    ("tree", "plants"), ("plant", "plants"), ("flower", "plants"), ("leaf", "plants"),
    ("grass", "plants"), ("mountain", "nature"), ("river", "water"), ("lake", "water"),
    ("sea", "water"), ("cloud", "sky"), ("sky", "sky"), ("beach", "nature"), ("forest", "nature"),
    ("shirt", "clothes"), ("pants", "clothes"), ("dress", "clothes"), ("jacket", "clothes"),
    ("shoes", "clothes"), ("hat", "clothes"), ("skirt", "clothes"), ("suit", "clothes"),
    ("teddy", "toys"), ("ball", "toys"), ("lego", "toys"), ("doll", "toys"), ("game", "toys"),
    ("man", "people"), ("woman", "people"), ("child", "child"), ("boy", "child"), ("girl", "child"),
    ("balloon", "celebration"), ("birthday", "celebration"), ("fireworks", "celebration"),
    ("party", "celebration"),
    ("phone", "electronics"), ("tablet", "electronics"), ("tv", "electronics"),
    ("camera", "electronics"),
    ("guitar", "instruments"), ("piano", "instruments"), ("violin", "instruments"),
    ("drum", "instruments"),
    ("painting", "art"), ("sculpture", "art"), ("drawing", "art"), ("statue", "art"),
    ("building", "buildings"), ("market", "market"), ("street", "street"),
    ("document", "documents"),
    ("paper", "documents"),
    ("glass of", "drinks"), ("cup of", "drinks"), ("coffee", "drinks"), ("tea", "drinks"),
    ("drink", "drinks"), ("beverage", "drinks"), ("bottle", "drinks"), ("mug", "drinks"),
    ("room", "interior"), ("bedroom", "interior"), ("living room", "interior"),
    ("closet", "interior"),
    ("wardrobe", "interior"), ("interior", "interior"), ("hanging clothes", "interior"),
    ("desk", "workspace"), ("computer setup", "workspace"), ("home office", "workspace"),
    ("workstation", "workspace"), ("office desk", "workspace"), ("monitor", "workspace"),
];

/// 去掉类别名末尾的括号部分，例如 `Food (2)` -> `Food`
pub fn normalize_category(name: &str) -> &str {
    match name.split_once('(') {
        Some((head, _)) => head.trim(),
        None => name.trim(),
    }
}

/// 按关键词命中次数打分，得分最高的类别胜出，平局时取表中靠前的
pub fn category_from_caption(caption: &str) -> Option<&'static str> {
    let tokens = tokenize(caption);
    if tokens.is_empty() {
        return None;
    }
    let mut best: Option<(&'static str, usize)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let hits = keywords.iter().filter(|k| contains_term(&tokens, k)).count();
        if hits > 0 && best.is_none_or(|(_, b)| hits > b) {
            best = Some((*category, hits));
        }
    }
    best.map(|(c, _)| c)
}

/// 训练分类器时使用的标签：预标注的类别优先，否则取关键词表中第一个命中的
pub fn training_label(record: &ImageRecord) -> Option<&'static str> {
    if let Some(category) = record.category.as_deref() {
        let category = normalize_category(category).to_lowercase();
        if let Some(c) = TRAINING_CATEGORIES.iter().find(|c| **c == category) {
            return Some(*c);
        }
    }
    let tokens = tokenize(record.display_caption());
    LABEL_KEYWORDS
        .iter()
        .find(|(keyword, _)| contains_term(&tokens, keyword))
        .map(|(_, label)| *label)
        .filter(|label| TRAINING_CATEGORIES.contains(label))
}

/// 类别路由器，分类器句柄在构造时注入，之后只读
pub struct CategoryRouter<'a> {
    classifier: Option<&'a dyn Classifier>,
}

impl<'a> CategoryRouter<'a> {
    pub fn new(classifier: Option<&'a dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// 为一条记录分配类别
    ///
    /// `embedding` 为已经通过检查的向量，无效向量应传入 `None`
    pub fn route(&self, record: &ImageRecord, embedding: Option<&[f32]>) -> String {
        if let (Some(classifier), Some(embedding)) = (self.classifier, embedding) {
            match classifier.predict(embedding) {
                Ok(label) if !normalize_category(&label).is_empty() => {
                    return normalize_category(&label).to_string();
                }
                Ok(_) => warn!("分类器对 {} 返回了空类别", record.path),
                Err(e) => warn!("分类器预测 {} 失败：{e}", record.path),
            }
        }
        category_from_caption(record.display_caption()).unwrap_or(DEFAULT_CATEGORY).to_string()
    }
}
