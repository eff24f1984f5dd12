use crate::application::query::Estimate;
use crate::application::trend_matrix::TrendMatrix;
use crate::domain::estimation::table::{OutcomeEntry, OutcomeTable};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

/// Flat CSV form of an [`Estimate`]
#[derive(Debug, Serialize)]
struct EstimateRecord<'a> {
    entity: &'a str,
    as_of: String,
    state: String,
    outcome: &'a str,
    probability: f64,
    samples: usize,
    wins: usize,
    p_raw: Option<f64>,
    prior: f64,
    ci_low: Option<f64>,
    ci_high: Option<f64>,
    confidence: f64,
    quality: &'static str,
}

impl<'a> From<&'a Estimate> for EstimateRecord<'a> {
    fn from(e: &'a Estimate) -> Self {
        Self {
            entity: &e.entity,
            as_of: e.as_of.format("%Y-%m-%d").to_string(),
            state: e.state.to_string(),
            outcome: &e.outcome,
            probability: e.probability,
            samples: e.samples,
            wins: e.wins,
            p_raw: e.p_raw,
            prior: e.prior,
            ci_low: e.interval.map(|(lo, _)| lo),
            ci_high: e.interval.map(|(_, hi)| hi),
            confidence: e.confidence,
            quality: e.quality.as_str(),
        }
    }
}

/// `state,outcome,samples,wins,p_raw,p_shrunk` rows in canonical order
pub fn write_table_csv<W: Write>(table: &OutcomeTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for entry in table.entries() {
        wtr.serialize(&entry).context("Failed to write table row")?;
    }
    wtr.flush().context("Failed to flush table CSV")?;
    Ok(())
}

pub fn table_json(table: &OutcomeTable) -> Result<String> {
    let entries: Vec<OutcomeEntry> = table.entries();
    serde_json::to_string_pretty(&entries).context("Failed to serialize table")
}

pub fn write_estimates_csv<W: Write>(estimates: &[Estimate], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for estimate in estimates {
        wtr.serialize(EstimateRecord::from(estimate))
            .with_context(|| format!("Failed to write estimate for {}", estimate.entity))?;
    }
    wtr.flush().context("Failed to flush estimate CSV")?;
    Ok(())
}

pub fn estimates_json(estimates: &[Estimate]) -> Result<String> {
    serde_json::to_string_pretty(estimates).context("Failed to serialize estimates")
}

/// One row per entity: `p_up_<h>` and `n_<h>` per horizon, then the threshold.
/// Failed cells are left empty.
pub fn write_matrix_csv<W: Write>(matrix: &TrendMatrix, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["entity".to_string()];
    for h in &matrix.horizons {
        header.push(format!("p_up_{}", h));
        header.push(format!("n_{}", h));
    }
    header.push("threshold".to_string());
    wtr.write_record(&header).context("Failed to write matrix header")?;

    let cell = |v: Option<String>| v.unwrap_or_default();
    for row in &matrix.rows {
        let mut record = vec![row.entity.clone()];
        for h in &matrix.horizons {
            let c = row.cell(h);
            record.push(cell(c.and_then(|c| c.p_up()).map(|p| format!("{:.4}", p))));
            record.push(cell(c.and_then(|c| c.samples()).map(|n| n.to_string())));
        }
        record.push(cell(row.threshold.map(|t| format!("{:.2}", t))));
        wtr.write_record(&record)
            .with_context(|| format!("Failed to write matrix row {}", row.entity))?;
    }
    wtr.flush().context("Failed to flush matrix CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::rolling::window_manager::WindowQuality;
    use crate::application::trend_matrix::{TrendCell, TrendRow};
    use crate::domain::errors::EstimationError;
    use crate::domain::estimation::alphabet::{Label, OutcomeAlphabet};
    use crate::domain::estimation::counter::TransitionCounter;
    use crate::domain::estimation::shrinkage::{Prior, ShrinkageParams};
    use crate::domain::estimation::state::StateKey;
    use chrono::{TimeZone, Utc};

    fn table() -> OutcomeTable {
        let alphabet = OutcomeAlphabet::binary();
        let pairs = vec![
            (StateKey::new(vec![1, 0]), Label(1)),
            (StateKey::new(vec![1, 0]), Label(0)),
            (StateKey::new(vec![0, 0]), Label(1)),
        ];
        let counts = TransitionCounter::new(&alphabet).count(&pairs);
        OutcomeTable::build(counts, &alphabet, &ShrinkageParams::new(Prior::Uniform, 4.0))
    }

    fn estimate() -> Estimate {
        Estimate {
            entity: "SPX".to_string(),
            as_of: Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap(),
            state: StateKey::new(vec![1, 0, 1]),
            outcome: "1".to_string(),
            probability: 0.55,
            samples: 40,
            wins: 23,
            p_raw: Some(0.575),
            prior: 0.5,
            interval: Some((0.42, 0.68)),
            confidence: 2.0,
            quality: WindowQuality::Full,
        }
    }

    #[test]
    fn test_table_csv_has_canonical_rows() {
        let mut out = Vec::new();
        write_table_csv(&table(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "state,outcome,samples,wins,p_raw,p_shrunk");
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("\"(0,0)\",0,"));
        assert!(lines[3].starts_with("\"(1,0)\",0,2,1,0.5,0.5"));
    }

    #[test]
    fn test_table_json_round_trips_through_value() {
        let json = table_json(&table()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 4);
        assert_eq!(value[0]["state"], "(0,0)");
    }

    #[test]
    fn test_estimate_csv_flattens_interval() {
        let mut out = Vec::new();
        write_estimates_csv(&[estimate()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "entity,as_of,state,outcome,probability,samples,wins,p_raw,prior,ci_low,ci_high,confidence,quality"
        );
        assert_eq!(
            lines.next().unwrap(),
            "SPX,2024-05-31,\"(1,0,1)\",1,0.55,40,23,0.575,0.5,0.42,0.68,2.0,full"
        );
    }

    #[test]
    fn test_matrix_csv_leaves_failed_cells_empty() {
        let matrix = TrendMatrix {
            as_of: Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 0).unwrap(),
            horizons: vec!["daily".to_string(), "monthly".to_string()],
            rows: vec![TrendRow {
                entity: "SPX".to_string(),
                cells: vec![
                    TrendCell {
                        horizon: "daily".to_string(),
                        result: Ok(estimate()),
                    },
                    TrendCell {
                        horizon: "monthly".to_string(),
                        result: Err(EstimationError::InsufficientHistory { usable: 3, floor: 30 }),
                    },
                ],
                threshold: Some(0.55),
            }],
        };

        let mut out = Vec::new();
        write_matrix_csv(&matrix, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "entity,p_up_daily,n_daily,p_up_monthly,n_monthly,threshold");
        assert_eq!(lines[1], "SPX,0.5500,40,,,0.55");
    }
}
