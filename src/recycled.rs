use crate::constants::ConstantsProvider;
use crate::period::Period;
use crate::quality::{DataQualityFlags, DataQualityLevel};
use crate::repository::MeterRepository;

const TOTAL_RECYCLED: &str = "total_recycled";
const TOTAL_CONSUMPTION: &str = "total_consumption";

/// Informational recycled-water total. Never added to the closure's IN
/// side; exposed only for the KPI calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct RecycledWaterResult {
    pub total_m3: f64,
    pub quality: DataQualityLevel,
    /// Dewatering volume reclassified as a dirty inflow when
    /// `classify_underground_as_fresh` is disabled. Zero otherwise.
    pub dirty_inflows_m3: f64,
}

/// Computes the recycled-water total.
pub struct RecycledCalculator<'a> {
    constants: &'a dyn ConstantsProvider,
    meters: &'a dyn MeterRepository,
}

impl<'a> RecycledCalculator<'a> {
    pub fn new(constants: &'a dyn ConstantsProvider, meters: &'a dyn MeterRepository) -> Self {
        RecycledCalculator { constants, meters }
    }

    pub fn calculate(&self, period: Period, flags: &mut DataQualityFlags, dewatering_m3: f64) -> RecycledWaterResult {
        let dirty_inflows_m3 = if self.constants.classify_underground_as_fresh() {
            0.0
        } else {
            dewatering_m3
        };

        if let Some(direct) = self.meters.get_monthly_value(period, TOTAL_RECYCLED) {
            if direct > 0.0 {
                flags.add_calculated("total_recycled");
                return RecycledWaterResult {
                    total_m3: direct,
                    quality: DataQualityLevel::Measured,
                    dirty_inflows_m3,
                };
            }
        }

        let tsf_return = self.tsf_return(period);
        let rwd_circulation = self.rwd_circulation(period);
        flags.add_estimated("total_recycled");

        RecycledWaterResult {
            total_m3: tsf_return + rwd_circulation,
            quality: DataQualityLevel::Estimated,
            dirty_inflows_m3,
        }
    }

    fn tsf_return(&self, period: Period) -> f64 {
        let plant_consumption = self.meters.get_monthly_value(period, TOTAL_CONSUMPTION).unwrap_or(0.0);
        plant_consumption * self.constants.tsf_return_water_pct() / 100.0
    }

    fn rwd_circulation(&self, period: Period) -> f64 {
        self.constants
            .rwd_circulation_columns()
            .iter()
            .filter_map(|column| self.meters.get_monthly_value(period, column))
            .sum()
    }
}
