use std::collections::BTreeMap;

use serde::Serialize;

/// Placeholder shown for any text field the backend left blank.
pub const UNKNOWN: &str = "—";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRiskRecord {
    /// Rendering identity: fingerprint plus batch position. Not a business key.
    pub row_id: String,
    pub id: String,
    pub name: String,
    pub mrr: f64,
    pub risk: f64,
    pub renewal_days: u32,
    pub cluster: String,
    pub usage_trend: String,
    pub tickets_30d: Option<u32>,
    pub sla_pct: Option<f64>,
    pub nps: Option<f64>,
    pub reasons: Vec<String>,
    pub playbook: String,
    pub owner: String,
    pub segment: String,
    pub region: String,
    pub revenue_band: String,
}

impl CustomerRiskRecord {
    pub fn impact(&self) -> f64 {
        self.risk * self.mrr
    }

    pub fn tier(&self) -> RiskTier {
        RiskTier::from_score(self.risk)
    }

    pub fn matches_category(&self, category: &str) -> bool {
        self.segment == category || self.region == category || self.revenue_band == category
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub month: String,
    pub logo_churn_pct: f64,
    pub revenue_churn: f64,
    pub grr_pct: f64,
    pub nrr_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallStep {
    pub stage: String,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DimensionSummaryRow {
    pub category: String,
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub low_mrr: f64,
    pub medium_mrr: f64,
    pub high_mrr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpsByRisk {
    pub risk_bucket: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenewalWindowBucket {
    pub window: String,
    pub mrr_at_risk: f64,
    pub customers: u64,
}

/// Scalar metrics from `/kpis`. Unknown keys are kept as-is.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Kpis {
    pub values: BTreeMap<String, f64>,
}

impl Kpis {
    pub fn get(&self, key: &str) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    pub fn logo_churn_pct(&self) -> f64 {
        self.get("churn_logos_pct")
    }

    pub fn customers_at_risk(&self) -> f64 {
        self.get("clientes_em_risco")
    }

    pub fn save_rate_pct(&self) -> f64 {
        self.get("save_rate_pct")
    }

    pub fn nrr_pct(&self) -> f64 {
        self.get("nrr_pct")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One `/queue` response after normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueuePage {
    pub items: Vec<CustomerRiskRecord>,
    /// Matches across all pages server-side.
    pub total: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dimension {
    Segment,
    Region,
    RevenueBand,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Segment, Dimension::Region, Dimension::RevenueBand];

    pub fn query_value(self) -> &'static str {
        match self {
            Dimension::Segment => "segmento",
            Dimension::Region => "uf",
            Dimension::RevenueBand => "faixa",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Segment => "Segmento",
            Dimension::Region => "UF",
            Dimension::RevenueBand => "Faixa Faturamento",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Dimension::ALL
            .into_iter()
            .find(|dim| dim.query_value() == value || dim.label().to_lowercase() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            RiskTier::High
        } else if score >= 40.0 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "Baixo",
            RiskTier::Medium => "Médio",
            RiskTier::High => "Alto",
        }
    }
}

/// Renewal windows in display order.
pub const RENEWAL_WINDOWS: [&str; 3] = ["0–30", "31–60", "61–90"];
