use crate::error::{PipelineError, Result};
use crate::model::Cik;
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_K_VALUES: [u32; 10] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCompany {
    pub cik: Cik,
    pub total_score: i64,
    pub label: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub k: u32,
    pub top_ciks: Vec<Cik>,
    pub top_scores: Vec<i64>,
    pub positives_in_top: usize,
    pub total_positives: usize,
    pub recall: f64,
    pub precision: f64,
}

/// 去重、去掉非正数并升序；未指定 K 时用默认列表，
/// 指定了却没有正数 K、或 K 超出 i32 存储范围时报错
pub fn sanitize_k_values(raw: &[i64]) -> Result<Vec<u32>> {
    if raw.is_empty() {
        return Ok(DEFAULT_K_VALUES.to_vec());
    }
    let mut ks = Vec::with_capacity(raw.len());
    for k in raw.iter().copied().filter(|k| *k > 0) {
        if k > i64::from(i32::MAX) {
            return Err(PipelineError::invalid(format!(
                "K value {k} exceeds {}",
                i32::MAX
            )));
        }
        ks.push(k as u32);
    }
    ks.sort_unstable();
    ks.dedup();
    if ks.is_empty() {
        return Err(PipelineError::invalid(
            "at least one positive K value must be provided",
        ));
    }
    Ok(ks)
}

pub fn ranking_order(a_score: i64, a_cik: Cik, b_score: i64, b_cik: Cik) -> Ordering {
    b_score.cmp(&a_score).then(a_cik.cmp(&b_cik))
}

/// 总分降序，同分 cik 升序；label 为空的行不参与排名
pub fn rank_companies<I>(rows: I) -> Vec<RankedCompany>
where
    I: IntoIterator<Item = (Cik, i64, Option<i32>)>,
{
    let mut ranked: Vec<RankedCompany> = rows
        .into_iter()
        .filter_map(|(cik, total_score, label)| {
            label.map(|label| RankedCompany {
                cik,
                total_score,
                label,
            })
        })
        .collect();
    ranked.sort_by(|a, b| ranking_order(a.total_score, a.cik, b.total_score, b.cik));
    ranked
}

/// ranked 需已排好序
pub fn compute_metrics(ranked: &[RankedCompany], k_values: &[u32]) -> Vec<MetricRow> {
    let total_positives = ranked.iter().filter(|r| r.label == 1).count();
    k_values
        .iter()
        .map(|&k| {
            let take = (k as usize).min(ranked.len());
            let top = &ranked[..take];
            let positives_in_top = top.iter().filter(|r| r.label == 1).count();
            let recall = if total_positives == 0 {
                0.0
            } else {
                positives_in_top as f64 / total_positives as f64
            };
            let precision = if take == 0 {
                0.0
            } else {
                positives_in_top as f64 / take as f64
            };
            MetricRow {
                k,
                top_ciks: top.iter().map(|r| r.cik).collect(),
                top_scores: top.iter().map(|r| r.total_score).collect(),
                positives_in_top,
                total_positives,
                recall,
                precision,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_is_broken_by_cik_ascending() {
        // A=30 (10, 正), B=50 (8, 负), C=40 (8, 正)
        let ranked = rank_companies(vec![(30, 10, Some(1)), (50, 8, Some(0)), (40, 8, Some(1))]);
        let rows = compute_metrics(&ranked, &[2]);
        let m = &rows[0];
        assert_eq!(m.top_ciks, vec![30, 40]);
        assert_eq!(m.top_scores, vec![10, 8]);
        assert_eq!(m.positives_in_top, 2);
        assert_eq!(m.total_positives, 2);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.precision, 1.0);
    }

    #[test]
    fn k_beyond_population_uses_actual_size() {
        let ranked = rank_companies((1..=5).map(|c| (c, 10 - c, Some((c % 2) as i32))));
        let m = &compute_metrics(&ranked, &[100])[0];
        assert_eq!(m.top_ciks.len(), 5);
        assert_eq!(m.positives_in_top, 3);
        assert_eq!(m.precision, 3.0 / 5.0);
        assert_eq!(m.recall, 1.0);
    }

    #[test]
    fn zero_positives_gives_zero_recall() {
        let ranked = rank_companies(vec![(1, 3, Some(0)), (2, 2, Some(0))]);
        let m = &compute_metrics(&ranked, &[1])[0];
        assert_eq!(m.total_positives, 0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.precision, 0.0);
    }

    #[test]
    fn null_labels_are_excluded() {
        let ranked = rank_companies(vec![(1, 100, None), (2, 5, Some(1))]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(compute_metrics(&ranked, &[1])[0].top_ciks, vec![2]);
    }

    #[test]
    fn metrics_are_monotone_in_k() {
        let ranked = rank_companies((1..=40).map(|c| (c, (c * 7 % 13) as i64, Some((c % 3 == 0) as i32))));
        let rows = compute_metrics(&ranked, &sanitize_k_values(&[5, 10, 20, 40, 80]).unwrap());
        for pair in rows.windows(2) {
            assert!(pair[0].positives_in_top <= pair[1].positives_in_top);
            assert!(pair[0].recall <= pair[1].recall);
        }
    }

    #[test]
    fn k_values_are_cleaned() {
        assert_eq!(sanitize_k_values(&[20, -1, 0, 10, 20]).unwrap(), vec![10, 20]);
        assert_eq!(sanitize_k_values(&[]).unwrap(), DEFAULT_K_VALUES.to_vec());
    }

    #[test]
    fn explicit_k_values_without_a_positive_one_are_rejected() {
        assert!(matches!(sanitize_k_values(&[0]), Err(PipelineError::InvalidConfig(_))));
        assert!(matches!(sanitize_k_values(&[-5, 0]), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn k_values_must_fit_the_stored_column() {
        let max = i64::from(i32::MAX);
        assert_eq!(sanitize_k_values(&[max]).unwrap(), vec![i32::MAX as u32]);
        assert!(matches!(sanitize_k_values(&[10, max + 1]), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn empty_ranking_yields_zeroes() {
        let m = &compute_metrics(&[], &[10])[0];
        assert!(m.top_ciks.is_empty());
        assert_eq!((m.recall, m.precision), (0.0, 0.0));
    }
}
