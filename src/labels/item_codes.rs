use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn item_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\d+").expect("item code pattern"))
}

/// 从 8-K 的 items 字段提取 item code，例如 "2.01,9.01" -> {2.01, 9.01}
pub fn extract_item_codes(items: &str) -> BTreeSet<String> {
    item_code_re()
        .find_iter(items)
        .map(|m| m.as_str().to_string())
        .collect()
}
