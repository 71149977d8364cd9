use std::io::Write;

use serde::Serialize;

use crate::models::CustomerRiskRecord;

#[derive(Serialize)]
struct ExportRow<'a> {
    row_id: &'a str,
    id: &'a str,
    cliente: &'a str,
    mrr: f64,
    risco: f64,
    impacto: f64,
    tier: &'static str,
    renovacao: u32,
    cluster: &'a str,
    uso30: &'a str,
    tickets30: Option<u32>,
    sla: Option<f64>,
    nps: Option<f64>,
    motivos: String,
    playbook: &'a str,
    dono: &'a str,
    segmento: &'a str,
    uf: &'a str,
    faixa: &'a str,
}

/// Writes the given rows as CSV with a header; returns the row count.
pub fn write_csv<W: Write>(records: &[&CustomerRiskRecord], out: W) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        writer.serialize(ExportRow {
            row_id: &record.row_id,
            id: &record.id,
            cliente: &record.name,
            mrr: record.mrr,
            risco: record.risk,
            impacto: record.impact(),
            tier: record.tier().label(),
            renovacao: record.renewal_days,
            cluster: &record.cluster,
            uso30: &record.usage_trend,
            tickets30: record.tickets_30d,
            sla: record.sla_pct,
            nps: record.nps,
            motivos: record.reasons.join(";"),
            playbook: &record.playbook,
            dono: &record.owner,
            segmento: &record.segment,
            uf: &record.region,
            faixa: &record.revenue_band,
        })?;
    }
    writer.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;
    use serde_json::json;

    #[test]
    fn exports_header_and_rows() {
        let record = normalize::customer(&json!({
            "id": "C-1",
            "cliente": "Padaria Sol",
            "mrr": 1000,
            "risco": 75,
            "motivos": ["uso", "suporte"],
        }));
        let mut buffer = Vec::new();
        let written = write_csv(&[&record], &mut buffer).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("row_id,id,cliente,mrr,risco,impacto,tier"));
        let row = lines.next().unwrap();
        assert!(row.contains("Padaria Sol"));
        assert!(row.contains("75000"));
        assert!(row.contains("Alto"));
        assert!(row.contains("uso;suporte"));
        assert!(lines.next().is_none());
    }
}
