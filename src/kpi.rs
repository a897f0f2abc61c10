use log::warn;

use crate::constants::ConstantsProvider;
use crate::inflows::{InflowResult, TONNES_MILLED};
use crate::outflows::{moisture_from_density, OutflowResult};
use crate::period::Period;
use crate::quality::DataQualityFlags;
use crate::recycled::RecycledWaterResult;
use crate::repository::MeterRepository;
use crate::storage::StorageChange;

const TAILINGS_DENSITY: &str = "tailings_density";
const RWD_VOLUME: &str = "rwd_1";
const RWD_INTENSITY: &str = "rwd_intensity";

/// Derived KPIs for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct KPIResult {
    pub recycled_pct: f64,
    pub fresh_pct: f64,
    pub water_intensity_m3_per_tonne: f64,
    pub abstraction_m3: f64,
    pub abstraction_license_m3: Option<f64>,
    pub abstraction_pct_of_license: Option<f64>,
    pub abstraction_within_license: bool,
    pub storage_days: Option<f64>,
    pub rwd_intensity_measured: Option<f64>,
    pub rwd_intensity_calculated: Option<f64>,
    pub rwd_intensity_match: bool,
    pub tailings_moisture_from_density: Option<f64>,
    pub tailings_density_measured: Option<f64>,
}

/// Computes KPIs from the four upstream results.
pub struct KPICalculator<'a> {
    constants: &'a dyn ConstantsProvider,
    meters: &'a dyn MeterRepository,
}

impl<'a> KPICalculator<'a> {
    pub fn new(constants: &'a dyn ConstantsProvider, meters: &'a dyn MeterRepository) -> Self {
        KPICalculator { constants, meters }
    }

    pub fn calculate(
        &self,
        period: Period,
        flags: &mut DataQualityFlags,
        inflows: &InflowResult,
        outflows: &OutflowResult,
        storage: &StorageChange,
        recycled: &RecycledWaterResult,
    ) -> KPIResult {
        let fresh_m3 = inflows.total_m3;
        let recycled_m3 = recycled.total_m3;
        let total_water = fresh_m3 + recycled_m3;

        let (recycled_pct, fresh_pct) = if total_water > 0.0 {
            let recycled_pct = recycled_m3 / total_water * 100.0;
            (recycled_pct, 100.0 - recycled_pct)
        } else {
            (0.0, 0.0)
        };

        let tonnes_milled = self.meters.get_monthly_value(period, TONNES_MILLED).unwrap_or(0.0);
        let water_intensity_m3_per_tonne = if tonnes_milled > 0.0 { total_water / tonnes_milled } else { 0.0 };

        let abstraction_m3 = inflows.abstraction_m3();
        let license = self.constants.abstraction_license_annual_m3();
        let (abstraction_license_m3, abstraction_pct_of_license, abstraction_within_license) = if license > 0.0 {
            let monthly_limit = license / 12.0;
            let pct = abstraction_m3 / monthly_limit * 100.0;
            (Some(monthly_limit), Some(pct), pct <= 100.0)
        } else {
            (None, None, true)
        };

        let daily_outflow = outflows.total_m3 / period.days_in_period() as f64;
        let storage_days = if daily_outflow > 0.0 { Some(storage.closing_m3 / daily_outflow) } else { None };

        let (rwd_intensity_measured, rwd_intensity_calculated, rwd_intensity_match) =
            self.rwd_intensity_cross_check(period, tonnes_milled, flags);

        let tailings_density_measured = self.meters.get_monthly_value(period, TAILINGS_DENSITY);
        let tailings_moisture_from_density =
            tailings_density_measured.and_then(|d| moisture_from_density(d, self.constants.tailings_solids_density()));

        KPIResult {
            recycled_pct,
            fresh_pct,
            water_intensity_m3_per_tonne,
            abstraction_m3,
            abstraction_license_m3,
            abstraction_pct_of_license,
            abstraction_within_license,
            storage_days,
            rwd_intensity_measured,
            rwd_intensity_calculated,
            rwd_intensity_match,
            tailings_moisture_from_density,
            tailings_density_measured,
        }
    }

    fn rwd_intensity_cross_check(
        &self,
        period: Period,
        tonnes_milled: f64,
        flags: &mut DataQualityFlags,
    ) -> (Option<f64>, Option<f64>, bool) {
        let measured = self.meters.get_monthly_value(period, RWD_INTENSITY);
        let rwd_volume = self.meters.get_monthly_value(period, RWD_VOLUME);

        let calculated = match (rwd_volume, tonnes_milled) {
            (Some(volume), tonnes) if tonnes > 0.0 => Some(volume / tonnes),
            _ => None,
        };

        let is_match = match (measured, calculated) {
            (Some(m), Some(c)) if m != 0.0 => {
                let pct_diff = ((m - c).abs() / m) * 100.0;
                let matched = pct_diff < 5.0;
                if !matched {
                    flags.add_warning(format!(
                        "rwd_intensity mismatch: measured {m:.3} vs calculated {c:.3} ({pct_diff:.1}% diff)"
                    ));
                    warn!("rwd_intensity cross-check failed for {period}: measured={m}, calculated={c}");
                }
                matched
            }
            _ => true,
        };

        (measured, calculated, is_match)
    }
}
