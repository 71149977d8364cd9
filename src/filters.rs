use serde::Serialize;

use crate::api::Query;
use crate::models::{Dimension, RENEWAL_WINDOWS};
use crate::normalize::coerce_number;

pub const MRR_CEILING: f64 = 999_999_999.0;
pub const RISK_CEILING: f64 = 100.0;
pub const RENEWAL_CEILING: f64 = 3650.0;
pub const ALL_REGIONS: &str = "Todas";

/// Server-side queue filters. Any change here triggers a (debounced) refetch.
///
/// Bounds are stored as entered; `NaN` marks an unparsable input and is
/// replaced by the documented default when parameters are built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueFilter {
    pub mrr_min: f64,
    pub mrr_max: f64,
    /// Also the client-side risk threshold of the prioritized view.
    pub risk_min: f64,
    pub risk_max: f64,
    pub renewal_min: f64,
    pub renewal_max: f64,
    pub region: String,
}

impl Default for QueueFilter {
    fn default() -> Self {
        Self {
            mrr_min: 0.0,
            mrr_max: MRR_CEILING,
            risk_min: 0.0,
            risk_max: RISK_CEILING,
            renewal_min: 0.0,
            renewal_max: RENEWAL_CEILING,
            region: ALL_REGIONS.to_string(),
        }
    }
}

/// Everything the user controls on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterState {
    pub queue: QueueFilter,
    pub dimension: Dimension,
    /// Category picked on a distribution chart; matched against segment,
    /// region or revenue band.
    pub category: Option<String>,
    pub window: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            queue: QueueFilter::default(),
            dimension: Dimension::Segment,
            category: None,
            window: RENEWAL_WINDOWS[0].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEdit {
    /// A queue filter changed; the queue must be refetched.
    Queue,
    /// Only the in-memory views change.
    View,
}

impl FilterState {
    /// Applies one `key=value` edit as typed by a user.
    ///
    /// Numeric values are not validated here; garbage is kept as `NaN` and
    /// defaulted by [`queue_params`].
    pub fn apply(&mut self, key: &str, value: &str) -> Option<FilterEdit> {
        let q = &mut self.queue;
        let edit = match key.trim() {
            "mrr_min" => set_bound(&mut q.mrr_min, value),
            "mrr_max" => set_bound(&mut q.mrr_max, value),
            "risco_min" | "risk_min" | "threshold" => set_bound(&mut q.risk_min, value),
            "risco_max" | "risk_max" => set_bound(&mut q.risk_max, value),
            "renovacao_min" | "renewal_min" => set_bound(&mut q.renewal_min, value),
            "renovacao_max" | "renewal_max" => set_bound(&mut q.renewal_max, value),
            "uf" | "estado" | "region" => {
                let value = value.trim();
                q.region = if value.is_empty() {
                    ALL_REGIONS.to_string()
                } else {
                    value.to_string()
                };
                FilterEdit::Queue
            }
            "dim" | "dimension" => {
                self.set_dimension(Dimension::parse(value)?);
                FilterEdit::View
            }
            "category" | "cat" => {
                let value = value.trim();
                self.category = (!value.is_empty()).then(|| value.to_string());
                FilterEdit::View
            }
            "window" | "janela" => {
                self.window = value.trim().to_string();
                FilterEdit::View
            }
            _ => return None,
        };
        Some(edit)
    }

    /// Switching dimension clears the category picked on the previous one.
    pub fn set_dimension(&mut self, dimension: Dimension) {
        if self.dimension != dimension {
            self.dimension = dimension;
            self.category = None;
        }
    }

    /// Sanitized risk threshold used by the prioritized view.
    pub fn threshold(&self) -> f64 {
        sanitize(self.queue.risk_min, 0.0, 0.0, RISK_CEILING)
    }
}

fn set_bound(slot: &mut f64, raw: &str) -> FilterEdit {
    *slot = parse_bound(raw);
    FilterEdit::Queue
}

/// Text input to a bound; unparsable text becomes `NaN`.
pub fn parse_bound(raw: &str) -> f64 {
    coerce_number(&serde_json::Value::String(raw.to_string())).unwrap_or(f64::NAN)
}

/// Non-finite input becomes `default`, then the result is clamped.
pub fn sanitize(value: f64, default: f64, floor: f64, ceiling: f64) -> f64 {
    let value = if value.is_finite() { value } else { default };
    value.clamp(floor, ceiling)
}

/// Sanitized `/queue` parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueParams {
    pub limit: usize,
    pub offset: usize,
    pub mrr_min: f64,
    pub mrr_max: f64,
    pub risk_min: f64,
    pub risk_max: f64,
    pub renewal_min: f64,
    pub renewal_max: f64,
    pub region: Option<String>,
}

/// Builds the parameters for one `/queue` request. Pure and deterministic.
///
/// Each bound is defaulted and clamped into its range, then a minimum above
/// its maximum is pulled down to the maximum.
pub fn queue_params(filter: &QueueFilter, offset: usize, limit: usize) -> QueueParams {
    let (mrr_min, mrr_max) = range(filter.mrr_min, filter.mrr_max, MRR_CEILING);
    let (risk_min, risk_max) = range(filter.risk_min, filter.risk_max, RISK_CEILING);
    let (renewal_min, renewal_max) =
        range(filter.renewal_min, filter.renewal_max, RENEWAL_CEILING);

    let region = filter.region.trim();
    let region = (!region.is_empty()
        && region != ALL_REGIONS
        && !region.eq_ignore_ascii_case("all"))
    .then(|| region.to_string());

    QueueParams {
        limit,
        offset,
        mrr_min,
        mrr_max,
        risk_min,
        risk_max,
        renewal_min,
        renewal_max,
        region,
    }
}

fn range(min: f64, max: f64, ceiling: f64) -> (f64, f64) {
    let min = sanitize(min, 0.0, 0.0, ceiling);
    let max = sanitize(max, ceiling, 0.0, ceiling);
    (min.min(max), max)
}

impl QueueParams {
    pub fn to_query(&self) -> Query {
        let mut query = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), self.offset.to_string()),
            ("mrr_min".to_string(), self.mrr_min.to_string()),
            ("mrr_max".to_string(), self.mrr_max.to_string()),
            ("risco_min".to_string(), self.risk_min.to_string()),
            ("risco_max".to_string(), self.risk_max.to_string()),
            ("renovacao_min".to_string(), self.renewal_min.to_string()),
            ("renovacao_max".to_string(), self.renewal_max.to_string()),
        ];
        if let Some(region) = &self.region {
            query.push(("uf".to_string(), region.clone()));
        }
        query
    }

    /// Same filters, different page window.
    pub fn at(&self, offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            ..self.clone()
        }
    }
}
