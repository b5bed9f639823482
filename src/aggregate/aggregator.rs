use crate::model::Cik;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyAggregate {
    pub cik: Cik,
    pub total_score: i64,
    pub article_count: i64,
    /// None：有文章分但实验里没有该公司的标签
    pub label: Option<i32>,
}

/// 按公司求和（不是平均），结果按 cik 升序
pub fn aggregate_scores<I>(scores: I, labels: &HashMap<Cik, i32>) -> Vec<CompanyAggregate>
where
    I: IntoIterator<Item = (Cik, i32)>,
{
    let mut totals: BTreeMap<Cik, (i64, i64)> = BTreeMap::new();
    for (cik, score) in scores {
        let entry = totals.entry(cik).or_insert((0, 0));
        entry.0 += score as i64;
        entry.1 += 1;
    }
    totals
        .into_iter()
        .map(|(cik, (total_score, article_count))| CompanyAggregate {
            cik,
            total_score,
            article_count,
            label: labels.get(&cik).copied(),
        })
        .collect()
}
