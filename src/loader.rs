use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::api::{Endpoint, Transport};
use crate::error::FetchError;
use crate::models::{
    Dimension, DimensionSummaryRow, Kpis, NpsByRisk, RenewalWindowBucket, TimeSeriesPoint,
    WaterfallStep,
};
use crate::normalize;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DimensionSummaries {
    pub segment: Vec<DimensionSummaryRow>,
    pub region: Vec<DimensionSummaryRow>,
    pub revenue_band: Vec<DimensionSummaryRow>,
}

impl DimensionSummaries {
    pub fn get(&self, dimension: Dimension) -> &[DimensionSummaryRow] {
        match dimension {
            Dimension::Segment => &self.segment,
            Dimension::Region => &self.region,
            Dimension::RevenueBand => &self.revenue_band,
        }
    }
}

/// The slow-changing datasets, loaded once per session or refresh.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StaticDatasets {
    pub kpis: Kpis,
    pub trend: Vec<TimeSeriesPoint>,
    pub waterfall: Vec<WaterfallStep>,
    pub summaries: DimensionSummaries,
    pub nps_by_risk: Vec<NpsByRisk>,
    pub renewal: Vec<RenewalWindowBucket>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Endpoints that degraded to their empty default in this load.
    pub degraded: Vec<String>,
}

/// Fetches one endpoint; any failure becomes `fallback` and is recorded.
async fn fetch_or<T: Transport>(
    transport: &T,
    endpoint: Endpoint,
    fallback: Value,
) -> (Value, Option<FetchError>) {
    match transport.get_json(endpoint, &[]).await {
        Ok(body) => (body, None),
        Err(err) => (fallback, Some(err)),
    }
}

/// Issues all eight static requests concurrently and waits for every one to
/// settle. Failed endpoints degrade to empty values; this never errors.
#[instrument(skip(transport))]
pub async fn load_static<T: Transport>(transport: &T) -> StaticDatasets {
    let (kpis, trend, waterfall, by_segment, by_region, by_band, nps, renewal) = tokio::join!(
        fetch_or(transport, Endpoint::Kpis, json!({})),
        fetch_or(transport, Endpoint::Trend, json!([])),
        fetch_or(transport, Endpoint::Waterfall, json!([])),
        fetch_or(transport, Endpoint::Summary(Dimension::Segment), json!([])),
        fetch_or(transport, Endpoint::Summary(Dimension::Region), json!([])),
        fetch_or(transport, Endpoint::Summary(Dimension::RevenueBand), json!([])),
        fetch_or(transport, Endpoint::NpsByRisk, json!([])),
        fetch_or(transport, Endpoint::Renewal, json!([]))
    );

    let mut degraded = Vec::new();
    for (name, failure) in [
        ("/kpis", &kpis.1),
        ("/trend", &trend.1),
        ("/waterfall", &waterfall.1),
        ("/summary?dim=segmento", &by_segment.1),
        ("/summary?dim=uf", &by_region.1),
        ("/summary?dim=faixa", &by_band.1),
        ("/nps_risco", &nps.1),
        ("/renovacao", &renewal.1),
    ] {
        if let Some(err) = failure {
            warn!(endpoint = name, error = %err, "endpoint degraded to empty default");
            degraded.push(name.to_string());
        }
    }

    let datasets = StaticDatasets {
        kpis: normalize::kpis(&kpis.0),
        trend: normalize::list_of(&trend.0, normalize::trend_point),
        waterfall: normalize::list_of(&waterfall.0, normalize::waterfall_step),
        summaries: DimensionSummaries {
            segment: normalize::list_of(&by_segment.0, normalize::summary_row),
            region: normalize::list_of(&by_region.0, normalize::summary_row),
            revenue_band: normalize::list_of(&by_band.0, normalize::summary_row),
        },
        nps_by_risk: normalize::list_of(&nps.0, normalize::nps_row),
        renewal: normalize::list_of(&renewal.0, normalize::renewal_bucket),
        fetched_at: Some(Utc::now()),
        degraded,
    };

    debug!(
        kpis = datasets.kpis.values.len(),
        trend = datasets.trend.len(),
        waterfall = datasets.waterfall.len(),
        segment = datasets.summaries.segment.len(),
        region = datasets.summaries.region.len(),
        revenue_band = datasets.summaries.revenue_band.len(),
        nps = datasets.nps_by_risk.len(),
        renewal = datasets.renewal.len(),
        "static rows"
    );
    info!(degraded = datasets.degraded.len(), "static datasets loaded");
    datasets
}
