use crate::config::{ExperimentConfig, NegativeStrategy};
use crate::model::{shift_days, Cik, FilingEvent};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};

/// 正例的一条触发依据（一份披露中的一个匹配 item code）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvidence {
    pub accession_number: String,
    pub filing_date: NaiveDate,
    pub primary_document: String,
    pub item_code: String,
}

/// 返回 (开区间起点, 闭区间终点)：filing_date 需满足 start < d <= end
pub fn horizon_bounds(predict_date: NaiveDate, horizon_days: i64) -> (NaiveDate, NaiveDate) {
    (predict_date, shift_days(predict_date, horizon_days))
}

pub fn qualifying_evidence(
    filings: &[FilingEvent],
    predict_date: NaiveDate,
    horizon_days: i64,
    triggers: &BTreeSet<String>,
) -> Vec<TriggerEvidence> {
    let (after, until) = horizon_bounds(predict_date, horizon_days);
    let mut out = Vec::new();
    for f in filings {
        if f.filing_date <= after || f.filing_date > until {
            continue;
        }
        for code in f.item_codes.intersection(triggers) {
            out.push(TriggerEvidence {
                accession_number: f.accession_number.clone(),
                filing_date: f.filing_date,
                primary_document: f.primary_document.clone(),
                item_code: code.clone(),
            });
        }
    }
    out
}

/// 有 seed 时可复现；无 seed 时每次重新抽样
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// 无放回均匀抽样。候选按 cik 排序后再抽，保证同 seed 同候选集得到同一结果。
pub fn sample_uniform(candidates: &BTreeSet<Cik>, target: usize, rng: &mut StdRng) -> BTreeSet<Cik> {
    let ordered: Vec<Cik> = candidates.iter().copied().collect();
    if target >= ordered.len() {
        return candidates.clone();
    }
    ordered.choose_multiple(rng, target).copied().collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub pairs: Vec<(Cik, Cik)>,
    pub unmatched: Vec<Cik>,
}

/// 新闻量配对：每个正例在 ln(1+n) 空间里选最近且差值 < max_log_diff 的未使用负例，
/// 最多 per_positive 个。正例按新闻量降序处理。
pub fn match_by_news_volume(
    positive_counts: &BTreeMap<Cik, u64>,
    negative_counts: &BTreeMap<Cik, u64>,
    per_positive: usize,
    max_log_diff: f64,
) -> MatchOutcome {
    let mut pool: Vec<(f64, Cik)> = negative_counts
        .iter()
        .map(|(cik, n)| ((*n as f64).ln_1p(), *cik))
        .collect();
    pool.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut order: Vec<(Cik, u64)> = positive_counts.iter().map(|(c, n)| (*c, *n)).collect();
    order.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut outcome = MatchOutcome::default();
    for (positive, count) in order {
        let target = (count as f64).ln_1p();
        let mut matched = 0usize;
        while matched < per_positive {
            let Some(idx) = nearest_within(&pool, target, max_log_diff) else {
                break;
            };
            let (_, negative) = pool.remove(idx);
            outcome.pairs.push((positive, negative));
            matched += 1;
        }
        if matched == 0 {
            outcome.unmatched.push(positive);
        }
    }
    outcome
}

fn nearest_within(pool: &[(f64, Cik)], target: f64, max_log_diff: f64) -> Option<usize> {
    let insert = pool.partition_point(|(v, _)| *v < target);
    let mut best: Option<(f64, usize)> = None;
    let mut consider = |idx: usize| {
        let diff = (pool[idx].0 - target).abs();
        if diff < max_log_diff && best.map_or(true, |(d, _)| diff < d) {
            best = Some((diff, idx));
        }
    };

    let mut right = insert;
    while right < pool.len() && pool[right].0 - target < max_log_diff {
        consider(right);
        right += 1;
    }
    let mut left = insert;
    while left > 0 && target - pool[left - 1].0 < max_log_diff {
        consider(left - 1);
        left -= 1;
    }
    best.map(|(_, idx)| idx)
}

#[derive(Debug, Clone, Default)]
pub struct LabelPlan {
    pub positives: BTreeMap<Cik, Vec<TriggerEvidence>>,
    pub negatives: BTreeSet<Cik>,
    pub requested_negatives: usize,
    /// 有触发披露但不在候选全集（新闻窗口）内
    pub skipped_outside_universe: usize,
    /// 因 max_positive_samples 被抽掉的正例
    pub capped_positives: usize,
    /// 新闻量配对失败而丢弃的正例
    pub unmatched_positives: Vec<Cik>,
}

impl LabelPlan {
    pub fn negative_shortfall(&self) -> usize {
        self.requested_negatives.saturating_sub(self.negatives.len())
    }

    /// 按 cik 排序，正负例不重叠
    pub fn labels(&self) -> Vec<(Cik, i32)> {
        let mut rows: Vec<(Cik, i32)> = self
            .positives
            .keys()
            .map(|c| (*c, 1))
            .chain(self.negatives.iter().map(|c| (*c, 0)))
            .collect();
        rows.sort_unstable();
        rows
    }
}

/// 纯计算：根据披露与候选全集生成标签方案，不触碰存储
pub fn plan_labels(
    cfg: &ExperimentConfig,
    filings: &BTreeMap<Cik, Vec<FilingEvent>>,
    universe: &BTreeSet<Cik>,
    news_counts: &BTreeMap<Cik, u64>,
) -> LabelPlan {
    let triggers = cfg.trigger_codes();
    let mut plan = LabelPlan::default();

    for (cik, company_filings) in filings {
        let evidence = qualifying_evidence(company_filings, cfg.predict_date, cfg.horizon_days, &triggers);
        if evidence.is_empty() {
            continue;
        }
        if !universe.contains(cik) {
            plan.skipped_outside_universe += 1;
            continue;
        }
        plan.positives.insert(*cik, evidence);
    }

    let mut rng = seeded_rng(cfg.seed);

    if let Some(max) = cfg.max_positive_samples {
        if plan.positives.len() > max {
            let all: BTreeSet<Cik> = plan.positives.keys().copied().collect();
            let keep = sample_uniform(&all, max, &mut rng);
            plan.capped_positives = all.len() - keep.len();
            plan.positives.retain(|cik, _| keep.contains(cik));
        }
    }

    let per_positive = cfg.neg_multiplier as usize;
    let candidates: BTreeSet<Cik> = universe
        .iter()
        .filter(|c| !plan.positives.contains_key(c))
        .copied()
        .collect();

    match cfg.negative_strategy {
        NegativeStrategy::Uniform => {
            plan.requested_negatives = per_positive * plan.positives.len();
            plan.negatives = sample_uniform(&candidates, plan.requested_negatives, &mut rng);
        }
        NegativeStrategy::NewsVolumeMatched { max_log_diff } => {
            plan.requested_negatives = per_positive * plan.positives.len();
            if per_positive == 0 {
                return plan;
            }
            let count_of = |c: &Cik| news_counts.get(c).copied().unwrap_or(0);
            let positive_counts: BTreeMap<Cik, u64> =
                plan.positives.keys().map(|c| (*c, count_of(c))).collect();
            let negative_counts: BTreeMap<Cik, u64> =
                candidates.iter().map(|c| (*c, count_of(c))).collect();
            let outcome =
                match_by_news_volume(&positive_counts, &negative_counts, per_positive, max_log_diff);
            for cik in &outcome.unmatched {
                plan.positives.remove(cik);
            }
            plan.negatives = outcome.pairs.iter().map(|(_, n)| *n).collect();
            plan.unmatched_positives = outcome.unmatched;
        }
    }

    plan
}
