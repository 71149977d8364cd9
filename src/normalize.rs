// Turns raw `/api/churn` payloads into typed records.
//
// Every function here is total: missing, null, wrongly typed or non-finite
// inputs fall back to a default so callers can assume clean values.
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::models::{
    CustomerRiskRecord, DimensionSummaryRow, Kpis, NpsByRisk, RenewalWindowBucket,
    TimeSeriesPoint, WaterfallStep, UNKNOWN,
};

/// First non-null value among `keys`.
///
/// Drafts of the backend renamed a few fields (`churnRate` vs
/// `churn_logos_pct`, `cat` vs `categoria`), so lookups accept aliases.
pub fn field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !value.is_null())
}

/// Reads a JSON number, or a string holding one, as a finite `f64`.
///
/// - Trims whitespace around string values.
/// - Rejects NaN and infinities.
/// - Returns `None` for booleans, arrays, objects and unparsable text.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn num_or(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(coerce_number).unwrap_or(default)
}

pub fn opt_num(value: Option<&Value>) -> Option<f64> {
    value.and_then(coerce_number)
}

pub fn opt_count(value: Option<&Value>) -> Option<u32> {
    opt_num(value)
        .filter(|n| *n >= 0.0)
        .map(|n| n.round().min(u32::MAX as f64) as u32)
}

pub fn non_negative(value: Option<&Value>) -> f64 {
    num_or(value, 0.0).max(0.0)
}

/// Text value, or [`UNKNOWN`] when absent or blank. Numbers are rendered.
pub fn text_or_unknown(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Reason tags come either as an array or as one `;`-delimited string.
pub fn reason_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .filter(|tag| !tag.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(';')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

const MONTHS_PT: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// ISO dates (`2025-03-01` or `2025-03`) become short pt-BR month names;
/// anything else is kept verbatim.
pub fn month_label(value: Option<&Value>) -> String {
    let text = text_or_unknown(value);
    let date = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d"))
        .ok()
        .or_else(|| {
            text.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        });
    match date {
        Some(d) => MONTHS_PT[d.month0() as usize].to_string(),
        None => text,
    }
}

/// Maps each array element through `f`; non-arrays yield an empty list.
pub fn list_of<T>(value: &Value, f: impl Fn(&Value) -> T) -> Vec<T> {
    value
        .as_array()
        .map(|items| items.iter().map(f).collect())
        .unwrap_or_default()
}

/// Pseudo-identifier: `id`, else the display name, else `_`. Blank strings
/// count as missing.
pub fn identifier(raw: &Value) -> String {
    let present = ["id", "cliente"]
        .iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        });
    match present {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
        None => "_".to_string(),
    }
}

/// Queue item. `row_id` is left empty; the retriever assigns it.
pub fn customer(raw: &Value) -> CustomerRiskRecord {
    CustomerRiskRecord {
        row_id: String::new(),
        id: identifier(raw),
        name: text_or_unknown(field(raw, &["cliente", "nome"])),
        mrr: non_negative(raw.get("mrr")),
        risk: num_or(raw.get("risco"), 0.0),
        renewal_days: opt_count(raw.get("renovacao")).unwrap_or(0),
        cluster: text_or_unknown(raw.get("cluster")),
        usage_trend: text_or_unknown(field(raw, &["uso30", "uso"])),
        tickets_30d: opt_count(raw.get("tickets30")),
        sla_pct: opt_num(raw.get("sla")),
        nps: opt_num(raw.get("nps")),
        reasons: reason_tags(raw.get("motivos")),
        playbook: text_or_unknown(raw.get("playbook")),
        owner: text_or_unknown(raw.get("dono")),
        segment: text_or_unknown(raw.get("segmento")),
        region: text_or_unknown(raw.get("uf")),
        revenue_band: text_or_unknown(raw.get("faixa")),
    }
}

pub fn trend_point(raw: &Value) -> TimeSeriesPoint {
    TimeSeriesPoint {
        month: month_label(raw.get("mes")),
        logo_churn_pct: num_or(field(raw, &["churnRate", "churn_logos_pct"]), 0.0),
        revenue_churn: num_or(field(raw, &["revChurn", "revenue_churn"]), 0.0),
        grr_pct: num_or(field(raw, &["grr", "grr_pct"]), 0.0),
        nrr_pct: num_or(field(raw, &["nrr", "nrr_pct"]), 0.0),
    }
}

pub fn waterfall_step(raw: &Value) -> WaterfallStep {
    WaterfallStep {
        stage: text_or_unknown(raw.get("etapa")),
        delta: num_or(raw.get("valor"), 0.0),
    }
}

pub fn summary_row(raw: &Value) -> DimensionSummaryRow {
    DimensionSummaryRow {
        category: text_or_unknown(field(
            raw,
            &["cat", "categoria", "label", "segmento", "uf", "faixa"],
        )),
        low: non_negative(raw.get("baixo")),
        medium: non_negative(raw.get("medio")),
        high: non_negative(raw.get("alto")),
        low_mrr: num_or(field(raw, &["mrr_baixo", "baixo_mrr"]), 0.0),
        medium_mrr: num_or(field(raw, &["mrr_medio", "medio_mrr"]), 0.0),
        high_mrr: num_or(field(raw, &["mrr_alto", "alto_mrr"]), 0.0),
    }
}

pub fn nps_row(raw: &Value) -> NpsByRisk {
    NpsByRisk {
        risk_bucket: text_or_unknown(raw.get("risco")),
        score: num_or(raw.get("nps"), 0.0),
    }
}

pub fn renewal_bucket(raw: &Value) -> RenewalWindowBucket {
    RenewalWindowBucket {
        window: text_or_unknown(raw.get("janela")),
        mrr_at_risk: non_negative(raw.get("mrr")),
        customers: opt_count(raw.get("clientes")).map(u64::from).unwrap_or(0),
    }
}

/// Keeps every numeric entry of the `/kpis` object; other shapes give an
/// empty summary.
pub fn kpis(raw: &Value) -> Kpis {
    let values: BTreeMap<String, f64> = raw
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(key, value)| coerce_number(value).map(|n| (key.clone(), n)))
                .collect()
        })
        .unwrap_or_default();
    Kpis { values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn customer_with_garbage_fields_gets_defaults() {
        let raw = json!({
            "mrr": "abc",
            "risco": null,
            "renovacao": -3,
            "cluster": "",
            "tickets30": {"x": 1},
            "sla": true,
            "motivos": 42,
        });
        let record = customer(&raw);
        assert_eq!(record.id, "_");
        assert_eq!(record.name, UNKNOWN);
        assert_eq!(record.mrr, 0.0);
        assert_eq!(record.risk, 0.0);
        assert_eq!(record.renewal_days, 0);
        assert_eq!(record.cluster, UNKNOWN);
        assert_eq!(record.tickets_30d, None);
        assert_eq!(record.sla_pct, None);
        assert!(record.reasons.is_empty());
        assert_eq!(record.owner, UNKNOWN);
        assert_eq!(record.region, UNKNOWN);
    }

    #[test]
    fn customer_reads_populated_fields() {
        let raw = json!({
            "id": "C-1",
            "cliente": "Padaria Sol",
            "mrr": 1520.5,
            "risco": 82,
            "renovacao": 27,
            "cluster": "Queda de uso",
            "tickets30": 4,
            "sla": 91.5,
            "nps": 12,
            "motivos": ["uso em queda", "tickets"],
            "playbook": "Reunião executiva",
            "dono": "Ana",
            "segmento": "Varejo",
            "uf": "SP",
            "faixa": "Faixa 07",
        });
        let record = customer(&raw);
        assert_eq!(record.id, "C-1");
        assert_eq!(record.mrr, 1520.5);
        assert_eq!(record.risk, 82.0);
        assert_eq!(record.renewal_days, 27);
        assert_eq!(record.tickets_30d, Some(4));
        assert_eq!(record.sla_pct, Some(91.5));
        assert_eq!(record.reasons, vec!["uso em queda", "tickets"]);
        assert_eq!(record.revenue_band, "Faixa 07");
    }

    #[test]
    fn missing_id_falls_back_to_name() {
        let record = customer(&json!({"cliente": "Mercado Azul"}));
        assert_eq!(record.id, "Mercado Azul");
    }

    #[test]
    fn blank_id_falls_back_to_name() {
        let record = customer(&json!({"id": "", "cliente": "Mercado Azul"}));
        assert_eq!(record.id, "Mercado Azul");
        let record = customer(&json!({"id": "  ", "cliente": null}));
        assert_eq!(record.id, "_");
        assert_eq!(identifier(&json!({"id": 42, "cliente": "X"})), "42");
    }

    #[test]
    fn negative_mrr_is_floored() {
        assert_eq!(customer(&json!({"mrr": -10})).mrr, 0.0);
    }

    #[test]
    fn numeric_strings_are_accepted_and_non_finite_rejected() {
        assert_eq!(coerce_number(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(coerce_number(&json!("inf")), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!("")), None);
        assert_eq!(coerce_number(&json!([1])), None);
    }

    #[test]
    fn reason_tags_split_delimited_string() {
        let tags = reason_tags(Some(&json!("uso;; suporte ;nps")));
        assert_eq!(tags, vec!["uso", "suporte", "nps"]);
    }

    #[test]
    fn month_label_handles_iso_and_free_text() {
        assert_eq!(month_label(Some(&json!("2025-03-01"))), "mar");
        assert_eq!(month_label(Some(&json!("2025-12"))), "dez");
        assert_eq!(month_label(Some(&json!("2025-07-01T00:00:00Z"))), "jul");
        assert_eq!(month_label(Some(&json!("Q3"))), "Q3");
        assert_eq!(month_label(None), UNKNOWN);
    }

    #[test]
    fn trend_accepts_either_key_family() {
        let a = trend_point(&json!({"mes": "jan", "churnRate": 2.5, "grr": 90}));
        let b = trend_point(&json!({"mes": "jan", "churn_logos_pct": 2.5, "grr_pct": 90}));
        assert_eq!(a, b);
    }

    #[test]
    fn kpis_keep_numeric_entries_only() {
        let k = kpis(&json!({"nrr_pct": 104.2, "label": "x", "clientes_em_risco": "17"}));
        assert_eq!(k.nrr_pct(), 104.2);
        assert_eq!(k.customers_at_risk(), 17.0);
        assert_eq!(k.values.len(), 2);
        assert!(kpis(&json!([1, 2])).is_empty());
    }

    #[test]
    fn list_of_non_array_is_empty() {
        assert!(list_of(&json!({"items": []}), waterfall_step).is_empty());
    }
}
