//! CSV export for balance results and runway projections, grounded on the
//! teacher's `write_run_off_file`/`write_parameter_file` writers (`model.rs`)
//! and `Fdc::to_csv` (`utils.rs`).

use std::path::Path;

use csv::Writer;

use crate::error::ReportError;
use crate::orchestrator::BalanceResult;
use crate::runway::SystemRunway;

/// Writes the component-level breakdown of a [`BalanceResult`] to `destination`:
/// one row per inflow/outflow component, plus the headline totals.
pub fn write_balance_csv(result: &BalanceResult, destination: &Path) -> Result<(), ReportError> {
    let mut wtr = Writer::from_path(destination)?;
    wtr.write_record(["Category", "Component", "Value (m3)", "Quality", "Source"])?;

    for component in &result.inflows.component_details {
        wtr.write_record([
            "Inflow",
            component.name.as_str(),
            component.value_m3.to_string().as_str(),
            format!("{:?}", component.quality).as_str(),
            component.source_label.as_str(),
        ])?;
    }
    for component in &result.outflows.component_details {
        wtr.write_record([
            "Outflow",
            component.name.as_str(),
            component.value_m3.to_string().as_str(),
            format!("{:?}", component.quality).as_str(),
            component.source_label.as_str(),
        ])?;
    }

    wtr.write_record(["Total", "inflows", result.inflows.total_m3.to_string().as_str(), "", ""])?;
    wtr.write_record(["Total", "outflows", result.outflows.total_m3.to_string().as_str(), "", ""])?;
    wtr.write_record(["Total", "balance_error_m3", result.balance_error_m3.to_string().as_str(), "", ""])?;
    wtr.flush()?;
    Ok(())
}

/// Writes the monthly depletion timeline of a [`SystemRunway`] to `destination`.
pub fn write_runway_csv(runway: &SystemRunway, destination: &Path) -> Result<(), ReportError> {
    let mut wtr = Writer::from_path(destination)?;
    wtr.write_record(["Month", "Opening (m3)", "Closing (m3)", "Inflow (m3)", "Outflow (m3)", "Depleted"])?;

    for row in &runway.monthly_timeline {
        wtr.write_record([
            row.month.to_string(),
            row.opening_m3.to_string(),
            row.closing_m3.to_string(),
            row.inflow_m3.to_string(),
            row.outflow_m3.to_string(),
            row.is_depleted.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflows::{InflowComponent, InflowResult};
    use crate::kpi::KPIResult;
    use crate::orchestrator::{BalanceStatus, CalculationMode};
    use crate::outflows::{OutflowComponent, OutflowResult};
    use crate::period::Period;
    use crate::quality::{DataQualityFlags, DataQualityLevel};
    use crate::recycled::RecycledWaterResult;
    use crate::runway::{ConsumptionSource, MonthlyTimelineRow};
    use crate::storage::StorageChange;

    fn sample_result() -> BalanceResult {
        BalanceResult {
            period: Period::new(4, 2026).unwrap(),
            inflows: InflowResult {
                total_m3: 31_500.0,
                component_details: vec![InflowComponent {
                    name: "rainfall".into(),
                    value_m3: 5_000.0,
                    quality: DataQualityLevel::Measured,
                    source_label: "environmental".into(),
                    notes: None,
                }],
                quality: DataQualityLevel::Measured,
            },
            outflows: OutflowResult {
                total_m3: 56_810.0,
                component_details: vec![OutflowComponent {
                    name: "evaporation".into(),
                    value_m3: 1_750.0,
                    quality: DataQualityLevel::Calculated,
                    source_label: "environmental".into(),
                    notes: None,
                }],
                quality: DataQualityLevel::Calculated,
                tailings_moisture_pct_used: 45.0,
            },
            storage: StorageChange {
                facility_code: None,
                facility_name: "system".into(),
                opening_m3: 800_000.0,
                closing_m3: 774_690.0,
                capacity_m3: Some(1_000_000.0),
                source: DataQualityLevel::Calculated,
                facility_breakdown: Vec::new(),
            },
            recycled: RecycledWaterResult {
                total_m3: 6_000.0,
                quality: DataQualityLevel::Estimated,
                dirty_inflows_m3: 8_000.0,
            },
            balance_error_m3: 0.0,
            error_pct: 0.0,
            kpis: KPIResult {
                recycled_pct: 0.0,
                fresh_pct: 0.0,
                water_intensity_m3_per_tonne: 0.0,
                abstraction_m3: 0.0,
                abstraction_license_m3: None,
                abstraction_pct_of_license: None,
                abstraction_within_license: true,
                storage_days: None,
                rwd_intensity_measured: None,
                rwd_intensity_calculated: None,
                rwd_intensity_match: true,
                tailings_moisture_from_density: None,
                tailings_density_measured: None,
            },
            quality_flags: DataQualityFlags::new(),
            calculated_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            calculation_mode: CalculationMode::Internal,
            status: BalanceStatus::Green,
        }
    }

    #[test]
    fn writes_balance_csv_without_error() {
        let result = sample_result();
        let dest = std::env::temp_dir().join("water_balance_core_test_balance.csv");
        write_balance_csv(&result, &dest).expect("csv export should succeed");
        let contents = std::fs::read_to_string(&dest).expect("file should exist");
        assert!(contents.contains("rainfall"));
        assert!(contents.contains("balance_error_m3"));
        let _ = std::fs::remove_file(&dest);
    }

    #[test]
    fn writes_runway_csv_without_error() {
        let runway = SystemRunway {
            combined_days_remaining: 875.0,
            usable_storage_m3: 700_000.0,
            daily_net_fresh_demand_m3: 800.0,
            total_outflows_m3: 30_000.0,
            recycled_water_m3: 6_000.0,
            evaporation_loss_m3: 1_750.0,
            seepage_loss_m3: 500.0,
            consumption_source: ConsumptionSource::Outflows,
            facilities: Vec::new(),
            monthly_timeline: vec![MonthlyTimelineRow {
                month: 5,
                opening_m3: 800_000.0,
                closing_m3: 774_690.0,
                inflow_m3: 31_500.0,
                outflow_m3: 56_810.0,
                is_depleted: false,
            }],
        };
        let dest = std::env::temp_dir().join("water_balance_core_test_runway.csv");
        write_runway_csv(&runway, &dest).expect("csv export should succeed");
        let contents = std::fs::read_to_string(&dest).expect("file should exist");
        assert!(contents.contains("774690"));
        let _ = std::fs::remove_file(&dest);
    }
}
