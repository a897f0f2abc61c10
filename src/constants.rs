use std::collections::HashMap;

use crate::error::ConstantsError;

/// Surface types recognised by the runoff-coefficient table. A closed
/// set, so a keyed enum rather than a stringly-typed map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceType {
    OpenWater,
    BareTailings,
    Roads,
    Vegetated,
    NaturalBush,
}

impl SurfaceType {
    fn default_coefficient(self) -> f64 {
        match self {
            SurfaceType::OpenWater => 1.0,
            SurfaceType::BareTailings => 0.60,
            SurfaceType::Roads => 0.75,
            SurfaceType::Vegetated => 0.30,
            SurfaceType::NaturalBush => 0.20,
        }
    }
}

/// Read-only catalogue of site coefficients. The core never names a
/// concrete implementation; it only depends on this trait.
pub trait ConstantsProvider {
    fn evap_pan_coefficient(&self) -> f64;
    fn seepage_rate_lined_pct(&self) -> f64;
    fn seepage_rate_unlined_pct(&self) -> f64;
    fn ore_moisture_pct(&self) -> f64;
    fn tailings_moisture_pct(&self) -> f64;
    fn tailings_solids_density(&self) -> f64;
    fn dust_suppression_rate_l_per_t(&self) -> f64;
    fn mining_water_rate_m3_per_t(&self) -> f64;
    fn domestic_consumption_l_per_person_day(&self) -> f64;
    fn workforce(&self) -> f64;
    fn recovery_rate_pct(&self) -> f64;
    fn product_moisture_pct(&self) -> f64;
    fn tsf_return_water_pct(&self) -> f64;
    fn abstraction_license_annual_m3(&self) -> f64;
    fn runoff_enabled(&self) -> bool;
    fn runoff_coefficient(&self, surface: SurfaceType) -> f64;
    fn mining_consumption_enabled(&self) -> bool;
    fn domestic_consumption_enabled(&self) -> bool;
    fn classify_underground_as_fresh(&self) -> bool;
    fn reserve_storage_pct(&self) -> f64;
    fn min_balance_error_pct(&self) -> f64;
    /// Monthly rainfall seasonality table, indexed by `month - 1`.
    fn rainfall_mm_seasonal(&self, month: u32) -> f64;
    /// Monthly evaporation seasonality table, indexed by `month - 1`.
    fn evaporation_mm_seasonal(&self, month: u32) -> f64;

    /// Named river meter columns summed into `surface_water`. Site
    /// configuration, not hard-coded.
    fn surface_water_columns(&self) -> &[String];
    /// Named borehole meter columns summed into `groundwater`.
    fn groundwater_columns(&self) -> &[String];
    /// Named underground-pump meter columns summed into `dewatering`.
    fn dewatering_columns(&self) -> &[String];
    /// Named RWD-circulation meter columns summed by the recycled
    /// calculator's component-sum fallback.
    fn rwd_circulation_columns(&self) -> &[String];
}

/// The concrete, struct-backed [`ConstantsProvider`].
///
/// A named bag of site coefficients, each bounds-checked once at
/// construction time via [`StaticConstantsBuilder::build`] rather than on
/// every read, following the validated-newtype style of a bounded physical
/// parameter rather than a bag of untyped floats.
#[derive(Debug, Clone)]
pub struct StaticConstants {
    pub evap_pan_coefficient: f64,
    pub seepage_rate_lined_pct: f64,
    pub seepage_rate_unlined_pct: f64,
    pub ore_moisture_pct: f64,
    pub tailings_moisture_pct: f64,
    pub tailings_solids_density: f64,
    pub dust_suppression_rate_l_per_t: f64,
    pub mining_water_rate_m3_per_t: f64,
    pub domestic_consumption_l_per_person_day: f64,
    pub workforce: f64,
    pub recovery_rate_pct: f64,
    pub product_moisture_pct: f64,
    pub tsf_return_water_pct: f64,
    pub abstraction_license_annual_m3: f64,
    pub runoff_enabled: bool,
    pub runoff_coefficients: HashMap<SurfaceType, f64>,
    pub mining_consumption_enabled: bool,
    pub domestic_consumption_enabled: bool,
    pub classify_underground_as_fresh: bool,
    pub reserve_storage_pct: f64,
    pub min_balance_error_pct: f64,
    pub rainfall_mm_seasonal: [f64; 12],
    pub evaporation_mm_seasonal: [f64; 12],
    pub surface_water_columns: Vec<String>,
    pub groundwater_columns: Vec<String>,
    pub dewatering_columns: Vec<String>,
    pub rwd_circulation_columns: Vec<String>,
}

impl ConstantsProvider for StaticConstants {
    fn evap_pan_coefficient(&self) -> f64 {
        self.evap_pan_coefficient
    }
    fn seepage_rate_lined_pct(&self) -> f64 {
        self.seepage_rate_lined_pct
    }
    fn seepage_rate_unlined_pct(&self) -> f64 {
        self.seepage_rate_unlined_pct
    }
    fn ore_moisture_pct(&self) -> f64 {
        self.ore_moisture_pct
    }
    fn tailings_moisture_pct(&self) -> f64 {
        self.tailings_moisture_pct
    }
    fn tailings_solids_density(&self) -> f64 {
        self.tailings_solids_density
    }
    fn dust_suppression_rate_l_per_t(&self) -> f64 {
        self.dust_suppression_rate_l_per_t
    }
    fn mining_water_rate_m3_per_t(&self) -> f64 {
        self.mining_water_rate_m3_per_t
    }
    fn domestic_consumption_l_per_person_day(&self) -> f64 {
        self.domestic_consumption_l_per_person_day
    }
    fn workforce(&self) -> f64 {
        self.workforce
    }
    fn recovery_rate_pct(&self) -> f64 {
        self.recovery_rate_pct
    }
    fn product_moisture_pct(&self) -> f64 {
        self.product_moisture_pct
    }
    fn tsf_return_water_pct(&self) -> f64 {
        self.tsf_return_water_pct
    }
    fn abstraction_license_annual_m3(&self) -> f64 {
        self.abstraction_license_annual_m3
    }
    fn runoff_enabled(&self) -> bool {
        self.runoff_enabled
    }
    fn runoff_coefficient(&self, surface: SurfaceType) -> f64 {
        self.runoff_coefficients
            .get(&surface)
            .copied()
            .unwrap_or_else(|| surface.default_coefficient())
    }
    fn mining_consumption_enabled(&self) -> bool {
        self.mining_consumption_enabled
    }
    fn domestic_consumption_enabled(&self) -> bool {
        self.domestic_consumption_enabled
    }
    fn classify_underground_as_fresh(&self) -> bool {
        self.classify_underground_as_fresh
    }
    fn reserve_storage_pct(&self) -> f64 {
        self.reserve_storage_pct
    }
    fn min_balance_error_pct(&self) -> f64 {
        self.min_balance_error_pct
    }
    fn rainfall_mm_seasonal(&self, month: u32) -> f64 {
        self.rainfall_mm_seasonal[((month - 1) % 12) as usize]
    }
    fn evaporation_mm_seasonal(&self, month: u32) -> f64 {
        self.evaporation_mm_seasonal[((month - 1) % 12) as usize]
    }
    fn surface_water_columns(&self) -> &[String] {
        &self.surface_water_columns
    }
    fn groundwater_columns(&self) -> &[String] {
        &self.groundwater_columns
    }
    fn dewatering_columns(&self) -> &[String] {
        &self.dewatering_columns
    }
    fn rwd_circulation_columns(&self) -> &[String] {
        &self.rwd_circulation_columns
    }
}

/// Builder for [`StaticConstants`], validating bounded physical quantities
/// at `build()` time rather than trusting the caller to have checked them.
#[derive(Debug, Clone)]
pub struct StaticConstantsBuilder {
    constants: StaticConstants,
}

impl Default for StaticConstantsBuilder {
    fn default() -> Self {
        StaticConstantsBuilder {
            constants: StaticConstants {
                evap_pan_coefficient: 0.7,
                seepage_rate_lined_pct: 0.1,
                seepage_rate_unlined_pct: 0.5,
                ore_moisture_pct: 3.5,
                tailings_moisture_pct: 45.0,
                tailings_solids_density: 2.7,
                dust_suppression_rate_l_per_t: 1.0,
                mining_water_rate_m3_per_t: 0.05,
                domestic_consumption_l_per_person_day: 150.0,
                workforce: 2000.0,
                recovery_rate_pct: 2.0,
                product_moisture_pct: 8.0,
                tsf_return_water_pct: 75.0,
                abstraction_license_annual_m3: 0.0,
                runoff_enabled: false,
                runoff_coefficients: HashMap::new(),
                mining_consumption_enabled: false,
                domestic_consumption_enabled: true,
                classify_underground_as_fresh: true,
                reserve_storage_pct: 10.0,
                min_balance_error_pct: 5.0,
                rainfall_mm_seasonal: [0.0; 12],
                evaporation_mm_seasonal: [0.0; 12],
                surface_water_columns: Vec::new(),
                groundwater_columns: Vec::new(),
                dewatering_columns: Vec::new(),
                rwd_circulation_columns: Vec::new(),
            },
        }
    }
}

macro_rules! setter {
    ($name:ident, $field:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.constants.$field = value;
            self
        }
    };
}

impl StaticConstantsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(evap_pan_coefficient, evap_pan_coefficient, f64);
    setter!(seepage_rate_lined_pct, seepage_rate_lined_pct, f64);
    setter!(seepage_rate_unlined_pct, seepage_rate_unlined_pct, f64);
    setter!(ore_moisture_pct, ore_moisture_pct, f64);
    setter!(tailings_moisture_pct, tailings_moisture_pct, f64);
    setter!(tailings_solids_density, tailings_solids_density, f64);
    setter!(dust_suppression_rate_l_per_t, dust_suppression_rate_l_per_t, f64);
    setter!(mining_water_rate_m3_per_t, mining_water_rate_m3_per_t, f64);
    setter!(
        domestic_consumption_l_per_person_day,
        domestic_consumption_l_per_person_day,
        f64
    );
    setter!(workforce, workforce, f64);
    setter!(recovery_rate_pct, recovery_rate_pct, f64);
    setter!(product_moisture_pct, product_moisture_pct, f64);
    setter!(tsf_return_water_pct, tsf_return_water_pct, f64);
    setter!(abstraction_license_annual_m3, abstraction_license_annual_m3, f64);
    setter!(runoff_enabled, runoff_enabled, bool);
    setter!(mining_consumption_enabled, mining_consumption_enabled, bool);
    setter!(domestic_consumption_enabled, domestic_consumption_enabled, bool);
    setter!(classify_underground_as_fresh, classify_underground_as_fresh, bool);
    setter!(reserve_storage_pct, reserve_storage_pct, f64);
    setter!(min_balance_error_pct, min_balance_error_pct, f64);
    setter!(rainfall_mm_seasonal, rainfall_mm_seasonal, [f64; 12]);
    setter!(evaporation_mm_seasonal, evaporation_mm_seasonal, [f64; 12]);

    pub fn runoff_coefficient(mut self, surface: SurfaceType, value: f64) -> Self {
        self.constants.runoff_coefficients.insert(surface, value);
        self
    }

    pub fn surface_water_columns(mut self, columns: Vec<String>) -> Self {
        self.constants.surface_water_columns = columns;
        self
    }

    pub fn groundwater_columns(mut self, columns: Vec<String>) -> Self {
        self.constants.groundwater_columns = columns;
        self
    }

    pub fn dewatering_columns(mut self, columns: Vec<String>) -> Self {
        self.constants.dewatering_columns = columns;
        self
    }

    pub fn rwd_circulation_columns(mut self, columns: Vec<String>) -> Self {
        self.constants.rwd_circulation_columns = columns;
        self
    }

    /// Validate the bounded physical quantities and produce the finished
    /// [`StaticConstants`].
    pub fn build(self) -> Result<StaticConstants, ConstantsError> {
        Self::check("tailings_solids_density", self.constants.tailings_solids_density, 1.01, 10.0)?;
        Self::check("evap_pan_coefficient", self.constants.evap_pan_coefficient, 0.0, 2.0)?;
        Self::check(
            "seepage_rate_lined_pct",
            self.constants.seepage_rate_lined_pct,
            0.0,
            100.0,
        )?;
        Self::check(
            "seepage_rate_unlined_pct",
            self.constants.seepage_rate_unlined_pct,
            0.0,
            100.0,
        )?;
        Self::check("reserve_storage_pct", self.constants.reserve_storage_pct, 0.0, 100.0)?;
        Self::check(
            "min_balance_error_pct",
            self.constants.min_balance_error_pct,
            0.0,
            100.0,
        )?;
        Ok(self.constants)
    }

    fn check(name: &str, value: f64, min: f64, max: f64) -> Result<(), ConstantsError> {
        if value < min || value > max {
            return Err(ConstantsError::OutOfBounds {
                name: name.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_invalid_solids_density() {
        let err = StaticConstantsBuilder::new().tailings_solids_density(0.5).build();
        assert!(err.is_err());
    }

    #[test]
    fn runoff_coefficient_falls_back_to_documented_default() {
        let constants = StaticConstantsBuilder::new().build().unwrap();
        assert_eq!(constants.runoff_coefficient(SurfaceType::Roads), 0.75);
        assert_eq!(constants.runoff_coefficient(SurfaceType::OpenWater), 1.0);
    }

    #[test]
    fn runoff_coefficient_override_is_honoured() {
        let constants = StaticConstantsBuilder::new()
            .runoff_coefficient(SurfaceType::Roads, 0.5)
            .build()
            .unwrap();
        assert_eq!(constants.runoff_coefficient(SurfaceType::Roads), 0.5);
    }

    #[test]
    fn seasonal_table_wraps_month_index() {
        let mut rainfall = [0.0; 12];
        rainfall[0] = 50.0;
        let constants = StaticConstantsBuilder::new().rainfall_mm_seasonal(rainfall).build().unwrap();
        assert_eq!(constants.rainfall_mm_seasonal(1), 50.0);
    }
}
