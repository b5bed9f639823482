use crate::model::Cik;
use crate::storage::entity::company;
use std::collections::{BTreeSet, HashMap, HashSet};

pub const DEFAULT_BLOCKED_ORGANIZATIONS: [&str; 1] = ["united states"];

/// trim + 小写 + 折叠空白
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 公司名称索引：规范化后的 title 排序数组（前缀二分查找）+ ticker 精确表
#[derive(Debug, Default)]
pub struct CompanyIndex {
    titles: Vec<(String, Cik)>,
    tickers: HashMap<String, Vec<Cik>>,
    blocked: HashSet<String>,
}

impl CompanyIndex {
    pub fn build<I, S>(companies: &[company::Model], blocked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut titles: Vec<(String, Cik)> = companies
            .iter()
            .map(|c| (normalize_text(&c.title), c.cik))
            .filter(|(t, _)| !t.is_empty())
            .collect();
        titles.sort();

        let mut tickers: HashMap<String, Vec<Cik>> = HashMap::new();
        for c in companies {
            let Some(ticker) = c.ticker.as_deref() else {
                continue;
            };
            let ticker = normalize_text(ticker);
            if !ticker.is_empty() {
                tickers.entry(ticker).or_default().push(c.cik);
            }
        }

        Self {
            titles,
            tickers,
            blocked: blocked
                .into_iter()
                .map(|b| normalize_text(b.as_ref()))
                .filter(|b| !b.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty() && self.tickers.is_empty()
    }

    /// organization 需已规范化
    pub fn match_organization(&self, organization: &str) -> BTreeSet<Cik> {
        let mut out = BTreeSet::new();
        if organization.is_empty() || self.blocked.contains(organization) {
            return out;
        }

        let start = self
            .titles
            .partition_point(|(t, _)| t.as_str() < organization);
        for (title, cik) in &self.titles[start..] {
            if !title.starts_with(organization) {
                break;
            }
            if at_token_boundary(title, organization.len()) {
                out.insert(*cik);
            }
        }

        if let Some(ciks) = self.tickers.get(organization) {
            out.extend(ciks.iter().copied());
        }
        out
    }

    /// 原始的 ';' 分隔 organizations 字段
    pub fn match_field(&self, raw: &str) -> BTreeSet<Cik> {
        raw.split(';')
            .map(normalize_text)
            .filter(|o| !o.is_empty())
            .flat_map(|o| self.match_organization(&o))
            .collect()
    }
}

/// "apple" 命中 "apple inc"，不命中 "applebee's"
fn at_token_boundary(title: &str, prefix_len: usize) -> bool {
    match title[prefix_len..].chars().next() {
        None => true,
        Some(c) => !c.is_alphanumeric(),
    }
}
