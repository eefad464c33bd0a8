use indicatif::ProgressStyle;
use ndarray::ArrayView1;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .expect("invalid progress bar template")
}

/// 按 numpy 默认的线性插值方式计算百分位数，`q` 的范围为 0 ~ 100
///
/// 输入为空时返回 `None`
pub fn percentile(values: &[f32], q: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[inline]
pub fn euclidean(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    squared_euclidean(a, b).sqrt()
}

#[inline]
pub fn squared_euclidean(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// 总体标准差（ddof = 0）
pub fn std_dev(v: &[f32]) -> f32 {
    if v.is_empty() {
        return 0.0;
    }
    let n = v.len() as f32;
    let mean = v.iter().sum::<f32>() / n;
    (v.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n).sqrt()
}

/// 四舍五入到指定小数位
pub fn round_to(x: f32, decimals: i32) -> f32 {
    let scale = 10f32.powi(decimals);
    (x * scale).round() / scale
}

/// 首字母大写，其余小写
pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// 小写化后按空白切分，并去掉首尾的标点
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// 在分词结果中查找一个词或短语，允许末尾的 s / es 复数形式
///
/// 只按整词匹配，不做子串匹配，`fisherman` 不会命中 `man`，`scarf` 不会命中 `car`
pub fn contains_term(tokens: &[String], term: &str) -> bool {
    let parts: Vec<&str> = term.split_whitespace().collect();
    if parts.is_empty() || parts.len() > tokens.len() {
        return false;
    }
    tokens.windows(parts.len()).any(|window| {
        window.iter().zip(parts.iter()).all(|(token, part)| word_matches(token, part))
    })
}

fn word_matches(token: &str, word: &str) -> bool {
    match token.strip_prefix(word) {
        Some("") | Some("s") | Some("es") => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolation() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 100.0), Some(4.0));
        assert_eq!(percentile(&v, 50.0), Some(2.5));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("beach"), "Beach");
        assert_eq!(title_case("FOREST"), "Forest");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_contains_term() {
        let tokens = tokenize("Two cars parked near a scarf shop, living room.");
        assert!(contains_term(&tokens, "car"));
        assert!(!contains_term(&tokens, "scar"));
        assert!(contains_term(&tokens, "living room"));
        assert!(!contains_term(&tokens, "man"));
        assert!(!contains_term(&tokenize("a fisherman on a dock"), "man"));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.654, 2), 0.65);
        assert_eq!(round_to(42.06, 1), 42.1);
    }
}
