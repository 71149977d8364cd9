use serde::Serialize;

use crate::models::{
    CustomerRiskRecord, DimensionSummaryRow, RenewalWindowBucket, TimeSeriesPoint, WaterfallStep,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRow {
    pub category: String,
    pub low_pct: f64,
    pub medium_pct: f64,
    pub high_pct: f64,
    pub low_mrr: f64,
    pub medium_mrr: f64,
    pub high_mrr: f64,
}

/// Share of each risk bucket in its row. A row with no customers yields
/// zeros instead of NaN.
pub fn distribution(rows: &[DimensionSummaryRow]) -> Vec<DistributionRow> {
    rows.iter()
        .map(|row| {
            let total = row.low + row.medium + row.high;
            let pct = |count: f64| {
                if total > 0.0 && total.is_finite() {
                    count / total * 100.0
                } else {
                    0.0
                }
            };
            DistributionRow {
                category: row.category.clone(),
                low_pct: pct(row.low),
                medium_pct: pct(row.medium),
                high_pct: pct(row.high),
                low_mrr: row.low_mrr,
                medium_mrr: row.medium_mrr,
                high_mrr: row.high_mrr,
            }
        })
        .collect()
}

/// Customers at or above `threshold`, optionally limited to one category,
/// ordered by impact (risk × MRR) descending. The sort is stable.
pub fn prioritized_queue<'a>(
    customers: &'a [CustomerRiskRecord],
    threshold: f64,
    category: Option<&str>,
) -> Vec<&'a CustomerRiskRecord> {
    let mut view: Vec<&CustomerRiskRecord> = customers
        .iter()
        .filter(|c| c.risk >= threshold)
        .filter(|c| category.map_or(true, |cat| c.matches_category(cat)))
        .collect();
    view.sort_by(|a, b| b.impact().total_cmp(&a.impact()));
    view
}

/// At-risk MRR for the selected renewal window; zero when it is not listed.
pub fn revenue_at_risk(buckets: &[RenewalWindowBucket], window: &str) -> f64 {
    buckets
        .iter()
        .find(|bucket| bucket.window == window)
        .map(|bucket| bucket.mrr_at_risk)
        .unwrap_or(0.0)
}

/// Upper bound for the logo-churn axis; never below zero.
pub fn churn_ceiling(trend: &[TimeSeriesPoint]) -> f64 {
    trend
        .iter()
        .map(|point| point.logo_churn_pct)
        .fold(0.0, f64::max)
}

/// `(min, max)` of the waterfall deltas, always spanning zero.
pub fn waterfall_bounds(steps: &[WaterfallStep]) -> (f64, f64) {
    steps.iter().fold((0.0_f64, 0.0_f64), |(lo, hi), step| {
        (lo.min(step.delta), hi.max(step.delta))
    })
}
