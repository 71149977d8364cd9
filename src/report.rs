use std::fmt::Write;

use chrono::{DateTime, Utc};
use num_format::{Locale, ToFormattedString};

use crate::controller::{Dashboard, QueueMode};
use crate::derived;
use crate::models::{CustomerRiskRecord, UNKNOWN};

/// Whole reais with pt-BR grouping, e.g. `R$ 1.234.567`.
pub fn format_brl(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let whole = value.abs().round() as i64;
    let sign = if value < 0.0 && whole != 0 { "-" } else { "" };
    format!("{sign}R$ {}", whole.to_formatted_string(&Locale::pt))
}

pub fn format_pct(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{value:.1}%")
}

fn opt_or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn reasons(record: &CustomerRiskRecord) -> String {
    if record.reasons.is_empty() {
        UNKNOWN.to_string()
    } else {
        record.reasons.join(", ")
    }
}

pub fn queue_line(record: &CustomerRiskRecord) -> String {
    format!(
        "{} | {} | risco {} ({}) | {} dias | {} | {} | motivos: {} | playbook: {} | dono: {}",
        record.name,
        format_brl(record.mrr),
        record.risk,
        record.tier().label(),
        record.renewal_days,
        record.cluster,
        record.region,
        reasons(record),
        record.playbook,
        record.owner,
    )
}

/// Short console summary of the current dashboard state.
pub fn summary(dash: &Dashboard, top: usize) -> String {
    let mut output = String::new();
    let data = &dash.datasets;
    let kpis = &data.kpis;

    if dash.loading() {
        let _ = writeln!(output, "(atualizando…)");
    }
    if let Some(err) = &dash.error {
        let _ = writeln!(output, "! {err}");
    }
    let _ = writeln!(
        output,
        "Churn de logos {} | Clientes em risco {} | Save rate {} | NRR {}",
        format_pct(kpis.logo_churn_pct()),
        kpis.customers_at_risk(),
        format_pct(kpis.save_rate_pct()),
        format_pct(kpis.nrr_pct()),
    );
    let _ = writeln!(
        output,
        "Receita em risco ({}d): {}",
        dash.filters.window,
        format_brl(dash.revenue_at_risk())
    );

    let view = dash.queue_view();
    let position = match dash.mode {
        QueueMode::Paged => format!(
            "página {}/{}",
            dash.pager.page + 1,
            dash.pager.page_count().max(1)
        ),
        QueueMode::Walked => "lote completo".to_string(),
        QueueMode::Empty => "nada carregado".to_string(),
    };
    let _ = writeln!(
        output,
        "Fila: {} de {} carregados ({position}), {} acima do limiar {}",
        dash.customers.len(),
        dash.pager.total,
        view.len(),
        dash.filters.threshold(),
    );
    for record in view.iter().take(top) {
        let _ = writeln!(output, "  - {}", queue_line(record));
    }
    if view.is_empty() {
        let _ = writeln!(output, "  Nenhum registro com os filtros atuais.");
    }
    if !data.degraded.is_empty() {
        let _ = writeln!(output, "Sem dados de: {}", data.degraded.join(", "));
    }
    output
}

/// Markdown report of everything currently loaded.
pub fn build_report(dash: &Dashboard, generated_at: DateTime<Utc>, top: usize) -> String {
    let data = &dash.datasets;
    let mut output = String::new();

    let _ = writeln!(output, "# Churn Risk Report");
    let _ = writeln!(
        output,
        "Generated {} (data fetched {})",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        data.fetched_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    );
    if let Some(err) = &dash.error {
        let _ = writeln!(output);
        let _ = writeln!(output, "> **{err}**");
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## KPIs");
    if data.kpis.is_empty() {
        let _ = writeln!(output, "No KPI summary available.");
    } else {
        for (name, value) in &data.kpis.values {
            let _ = writeln!(output, "- {name}: {value:.2}");
        }
    }
    let _ = writeln!(
        output,
        "- Receita em risco ({}d): {}",
        dash.filters.window,
        format_brl(dash.revenue_at_risk())
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Trend");
    if data.trend.is_empty() {
        let _ = writeln!(output, "No trend data.");
    } else {
        let _ = writeln!(output, "| Mês | Churn logos | Churn receita | GRR | NRR |");
        let _ = writeln!(output, "|---|---|---|---|---|");
        for point in &data.trend {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} |",
                point.month,
                format_pct(point.logo_churn_pct),
                format_brl(point.revenue_churn),
                format_pct(point.grr_pct),
                format_pct(point.nrr_pct)
            );
        }
        let _ = writeln!(
            output,
            "Peak logo churn: {}",
            format_pct(derived::churn_ceiling(&data.trend))
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## MRR Waterfall");
    if data.waterfall.is_empty() {
        let _ = writeln!(output, "No waterfall data.");
    } else {
        for step in &data.waterfall {
            let _ = writeln!(output, "- {}: {}", step.stage, format_brl(step.delta));
        }
        let (lo, hi) = derived::waterfall_bounds(&data.waterfall);
        let _ = writeln!(output, "Range: {} to {}", format_brl(lo), format_brl(hi));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Distribution by {}", dash.filters.dimension.label());
    let distribution = dash.distribution_view();
    if distribution.is_empty() {
        let _ = writeln!(output, "No distribution data.");
    } else {
        for row in &distribution {
            let _ = writeln!(
                output,
                "- {}: baixo {} ({}), médio {} ({}), alto {} ({})",
                row.category,
                format_pct(row.low_pct),
                format_brl(row.low_mrr),
                format_pct(row.medium_pct),
                format_brl(row.medium_mrr),
                format_pct(row.high_pct),
                format_brl(row.high_mrr)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Renewal Windows");
    if data.renewal.is_empty() {
        let _ = writeln!(output, "No renewal data.");
    } else {
        for bucket in &data.renewal {
            let _ = writeln!(
                output,
                "- {}: {} across {} customers",
                bucket.window,
                format_brl(bucket.mrr_at_risk),
                bucket.customers
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## NPS by Risk");
    if data.nps_by_risk.is_empty() {
        let _ = writeln!(output, "No NPS data.");
    } else {
        for row in &data.nps_by_risk {
            let _ = writeln!(output, "- {}: {:.1}", row.risk_bucket, row.score);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Prioritized Queue");
    let view = dash.queue_view();
    if let Some(err) = &dash.error {
        let _ = writeln!(output, "Fila indisponível: {err}");
    }
    if view.is_empty() {
        if dash.error.is_none() {
            let _ = writeln!(output, "Nenhum registro com os filtros atuais.");
        }
    } else {
        let _ = writeln!(
            output,
            "| Cliente | MRR | Risco | Cluster | Renov. | Tickets 30d | %SLA | NPS | Motivos | Playbook | Dono |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|---|---|");
        for record in view.iter().take(top) {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                record.name,
                format_brl(record.mrr),
                record.risk,
                record.cluster,
                record.renewal_days,
                opt_or_dash(record.tickets_30d),
                opt_or_dash(record.sla_pct.map(format_pct)),
                opt_or_dash(record.nps),
                reasons(record),
                record.playbook,
                record.owner
            );
        }
    }

    if !data.degraded.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Unavailable Sources");
        for name in &data.degraded {
            let _ = writeln!(output, "- {name}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{queue_of, ScriptedTransport};
    use crate::api::Endpoint;
    use crate::config::ApiConfig;
    use crate::error::FetchError;
    use crate::filters::FilterState;

    #[test]
    fn brl_uses_dot_grouping_and_no_decimals() {
        assert_eq!(format_brl(1_234_567.4), "R$ 1.234.567");
        assert_eq!(format_brl(-150.0), "-R$ 150");
        assert_eq!(format_brl(f64::NAN), "R$ 0");
    }

    #[test]
    fn pct_has_one_decimal() {
        assert_eq!(format_pct(3.26), "3.3%");
        assert_eq!(format_pct(f64::INFINITY), "0.0%");
    }

    #[tokio::test]
    async fn report_lists_sections_and_queue() {
        let transport = ScriptedTransport::healthy().with_queue(queue_of(30));
        let mut dash = Dashboard::new(ApiConfig::default(), FilterState::default());
        dash.refresh(&transport).await;

        let report = build_report(&dash, Utc::now(), 5);
        assert!(report.contains("# Churn Risk Report"));
        assert!(report.contains("## MRR Waterfall"));
        assert!(report.contains("Receita em risco (0–30d): R$ 5.400"));
        assert!(report.contains("Varejo: baixo 50.0%"));
        assert!(report.contains("| Cliente | MRR | Risco |"));
        assert!(report.contains("Cliente 28"));
        assert!(!report.contains("## Unavailable Sources"));
    }

    #[tokio::test]
    async fn failed_walk_is_reported_not_shown_as_empty() {
        let transport = ScriptedTransport::healthy().with(
            Endpoint::Queue,
            Err(FetchError::Status {
                url: "/queue".to_string(),
                status: 500,
            }),
        );
        let mut dash = Dashboard::new(ApiConfig::default(), FilterState::default());
        dash.refresh(&transport).await;
        assert!(dash.error.is_some());

        let report = build_report(&dash, Utc::now(), 5);
        assert!(report.contains("> **Erro ao carregar dados: /queue returned 500**"));
        assert!(report.contains("Fila indisponível: Erro ao carregar dados"));
        assert!(!report.contains("Nenhum registro com os filtros atuais."));
        assert!(report.contains("## MRR Waterfall"));
        assert!(summary(&dash, 3).contains("! Erro ao carregar dados"));
    }

    #[tokio::test]
    async fn summary_names_the_queue_mode() {
        let transport = ScriptedTransport::healthy().with_queue(queue_of(120));
        let mut dash = Dashboard::new(ApiConfig::default(), FilterState::default());
        dash.refresh(&transport).await;
        assert!(summary(&dash, 3).contains("(lote completo)"));
        dash.next_page(&transport).await;
        assert!(summary(&dash, 3).contains("(página 2/3)"));
    }

    #[test]
    fn empty_dashboard_report_is_still_complete() {
        let dash = Dashboard::new(ApiConfig::default(), FilterState::default());
        let report = build_report(&dash, Utc::now(), 5);
        assert!(report.contains("No KPI summary available."));
        assert!(report.contains("Nenhum registro com os filtros atuais."));
        let text = summary(&dash, 3);
        assert!(text.contains("R$ 0"));
    }
}
