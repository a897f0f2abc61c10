use crate::constants::ConstantsProvider;
use crate::period::Period;
use crate::quality::{DataQualityFlags, DataQualityLevel};
use crate::repository::{EnvironmentalRepository, FacilityRepository, MeterRepository};

const RAINFALL_MM: &str = "rainfall_mm";

pub const TONNES_MILLED: &str = "tonnes_milled";

/// One named inflow line item.
#[derive(Debug, Clone, PartialEq)]
pub struct InflowComponent {
    pub name: String,
    pub value_m3: f64,
    pub quality: DataQualityLevel,
    pub source_label: String,
    pub notes: Option<String>,
}

impl InflowComponent {
    fn new(
        name: impl Into<String>,
        value_m3: f64,
        quality: DataQualityLevel,
        source_label: impl Into<String>,
    ) -> Self {
        InflowComponent {
            name: name.into(),
            value_m3,
            quality,
            source_label: source_label.into(),
            notes: None,
        }
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes = Some(note.into());
        self
    }
}

/// Totalled fresh-inflow result for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct InflowResult {
    pub total_m3: f64,
    pub component_details: Vec<InflowComponent>,
    pub quality: DataQualityLevel,
}

impl InflowResult {
    fn component(&self, name: &str) -> f64 {
        self.component_details
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value_m3)
            .unwrap_or(0.0)
    }

    pub fn rainfall_m3(&self) -> f64 {
        self.component("rainfall")
    }

    pub fn abstraction_m3(&self) -> f64 {
        self.component("surface_water") + self.component("groundwater")
    }

    pub fn dewatering_m3(&self) -> f64 {
        self.component("dewatering")
    }

    pub fn ore_moisture_m3(&self) -> f64 {
        self.component("ore_moisture")
    }

    /// Anything not already captured by the named accessors above.
    pub fn other_m3(&self) -> f64 {
        let named = self.rainfall_m3() + self.abstraction_m3() + self.dewatering_m3() + self.ore_moisture_m3();
        (self.total_m3 - named).max(0.0)
    }
}

/// Computes the six named fresh-inflow components: rainfall, surface
/// water, groundwater, dewatering, ore moisture, and (when enabled) runoff.
pub struct InflowsCalculator<'a> {
    constants: &'a dyn ConstantsProvider,
    meters: &'a dyn MeterRepository,
    facilities: &'a dyn FacilityRepository,
    environmental: &'a dyn EnvironmentalRepository,
}

impl<'a> InflowsCalculator<'a> {
    pub fn new(
        constants: &'a dyn ConstantsProvider,
        meters: &'a dyn MeterRepository,
        facilities: &'a dyn FacilityRepository,
        environmental: &'a dyn EnvironmentalRepository,
    ) -> Self {
        InflowsCalculator {
            constants,
            meters,
            facilities,
            environmental,
        }
    }

    pub fn calculate(&self, period: Period, flags: &mut DataQualityFlags) -> InflowResult {
        let mut components = Vec::new();

        components.push(self.rainfall_inflow(period, flags));
        components.push(self.sum_meter_columns(
            "surface_water",
            self.constants.surface_water_columns(),
            period,
            flags,
        ));
        components.push(self.sum_meter_columns(
            "groundwater",
            self.constants.groundwater_columns(),
            period,
            flags,
        ));
        components.push(self.sum_meter_columns(
            "dewatering",
            self.constants.dewatering_columns(),
            period,
            flags,
        ));
        components.push(self.ore_moisture_inflow(period, flags));
        if self.constants.runoff_enabled() {
            components.push(self.runoff_inflow(period, flags));
        }

        let total_m3: f64 = components.iter().map(|c| c.value_m3).sum();
        let quality = DataQualityLevel::weakest(components.iter().map(|c| c.quality));

        InflowResult {
            total_m3,
            component_details: components,
            quality,
        }
    }

    fn rainfall_inflow(&self, period: Period, flags: &mut DataQualityFlags) -> InflowComponent {
        let rainfall_mm = self.environmental.get_monthly(period, RAINFALL_MM);
        let Some(rainfall_mm) = rainfall_mm else {
            flags.add_missing("rainfall");
            return InflowComponent::new("rainfall", 0.0, DataQualityLevel::Missing, "no reading");
        };

        let active_surface_area: f64 = self
            .facilities
            .list_active_facilities()
            .iter()
            .filter(|f| f.is_active() && f.surface_area_m2 > 0.0)
            .map(|f| f.surface_area_m2)
            .sum();

        let value = rainfall_mm * active_surface_area / 1000.0;
        InflowComponent::new("rainfall", value, DataQualityLevel::Measured, "environmental repository")
    }

    fn sum_meter_columns(
        &self,
        name: &str,
        columns: &[String],
        period: Period,
        flags: &mut DataQualityFlags,
    ) -> InflowComponent {
        if columns.is_empty() {
            flags.add_missing(name);
            return InflowComponent::new(name, 0.0, DataQualityLevel::Missing, "no configured columns");
        }

        let mut total = 0.0;
        let mut any_missing = false;
        for column in columns {
            match self.meters.get_monthly_value(period, column) {
                Some(value) => total += value,
                None => any_missing = true,
            }
        }

        if any_missing {
            flags.add_warning(format!("{name}: one or more meter columns missing, treated as 0"));
        }

        InflowComponent::new(name, total, DataQualityLevel::Measured, "meter repository")
    }

    fn ore_moisture_inflow(&self, period: Period, flags: &mut DataQualityFlags) -> InflowComponent {
        let Some(tonnes_milled) = self.meters.get_monthly_value(period, TONNES_MILLED) else {
            flags.add_missing("ore_moisture");
            return InflowComponent::new("ore_moisture", 0.0, DataQualityLevel::Missing, "tonnes_milled missing");
        };

        if tonnes_milled < 0.0 {
            flags.add_warning("tonnes_milled is negative, treated as missing for ore_moisture");
            flags.add_missing("ore_moisture");
            return InflowComponent::new("ore_moisture", 0.0, DataQualityLevel::Missing, "invalid tonnes_milled");
        }

        let value = tonnes_milled * self.constants.ore_moisture_pct() / 100.0;
        flags.add_calculated("ore_moisture");
        InflowComponent::new("ore_moisture", value, DataQualityLevel::Calculated, "tonnes_milled x ore_moisture_pct")
    }

    fn runoff_inflow(&self, period: Period, flags: &mut DataQualityFlags) -> InflowComponent {
        let rainfall_mm = self.environmental.get_monthly(period, RAINFALL_MM).unwrap_or(0.0);

        let catchment_area: f64 = self
            .facilities
            .list_active_facilities()
            .iter()
            .filter(|f| f.is_active())
            .map(|f| f.catchment_area_m2)
            .sum();

        if catchment_area <= 0.0 {
            flags.add_estimated("runoff");
            return InflowComponent::new("runoff", 0.0, DataQualityLevel::Estimated, "no catchment area configured");
        }

        let coeff = self.constants.runoff_coefficient(crate::constants::SurfaceType::BareTailings);
        let value = rainfall_mm * catchment_area * coeff / 1000.0;
        flags.add_calculated("runoff");
        InflowComponent::new("runoff", value, DataQualityLevel::Calculated, "rainfall x catchment x coefficient")
            .with_note(format!("coefficient {coeff}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::StaticConstantsBuilder;
    use crate::repository::{Facility, FacilityStatus};
    use std::collections::HashMap;

    struct FakeMeters(HashMap<(u32, i32, &'static str), f64>);

    impl MeterRepository for FakeMeters {
        fn get_monthly_value(&self, period: Period, column: &str) -> Option<f64> {
            self.0
                .iter()
                .find(|((m, y, c), _)| *m == period.month && *y == period.year && *c == column)
                .map(|(_, v)| *v)
        }
        fn list_columns(&self) -> Vec<String> {
            self.0.keys().map(|(_, _, c)| c.to_string()).collect()
        }
    }

    struct FakeFacilities(Vec<Facility>);

    impl FacilityRepository for FakeFacilities {
        fn list_active_facilities(&self) -> Vec<Facility> {
            self.0.clone()
        }
    }

    struct FakeEnvironmental(HashMap<(u32, i32, &'static str), f64>);

    impl crate::repository::EnvironmentalRepository for FakeEnvironmental {
        fn get_monthly(&self, period: Period, column: &str) -> Option<f64> {
            self.0
                .iter()
                .find(|((m, y, c), _)| *m == period.month && *y == period.year && *c == column)
                .map(|(_, v)| *v)
        }
    }

    fn facility(code: &str, surface_area: f64) -> Facility {
        Facility {
            code: code.to_string(),
            name: code.to_string(),
            status: FacilityStatus::Active,
            surface_area_m2: surface_area,
            capacity_m3: 1_000_000.0,
            current_volume_m3: 500_000.0,
            is_lined: true,
            catchment_area_m2: 0.0,
        }
    }

    #[test]
    fn missing_rainfall_flags_and_zeroes() {
        let constants = StaticConstantsBuilder::new().build().unwrap();
        let meters = FakeMeters(HashMap::new());
        let environmental = FakeEnvironmental(HashMap::new());
        let facilities = FakeFacilities(vec![facility("TSF1", 100_000.0)]);
        let mut flags = DataQualityFlags::new();
        let calc = InflowsCalculator::new(&constants, &meters, &facilities, &environmental);
        let result = calc.calculate(Period::new(1, 2026).unwrap(), &mut flags);
        assert_eq!(result.rainfall_m3(), 0.0);
        assert!(flags.missing_values().contains("rainfall"));
    }

    #[test]
    fn nominal_closure_matches_scenario_a() {
        let constants = StaticConstantsBuilder::new()
            .surface_water_columns(vec!["RiverA".into()])
            .groundwater_columns(vec!["BH1".into(), "BH2".into()])
            .dewatering_columns(vec!["UG1".into()])
            .build()
            .unwrap();
        let mut readings = HashMap::new();
        readings.insert((3, 2026, "RiverA"), 12_000.0);
        readings.insert((3, 2026, "BH1"), 1_500.0);
        readings.insert((3, 2026, "BH2"), 1_500.0);
        readings.insert((3, 2026, "UG1"), 8_000.0);
        readings.insert((3, 2026, TONNES_MILLED), 100_000.0);
        let meters = FakeMeters(readings);
        let mut env_readings = HashMap::new();
        env_readings.insert((3, 2026, RAINFALL_MM), 50.0);
        let environmental = FakeEnvironmental(env_readings);
        let facilities = FakeFacilities(vec![facility("TSF1", 100_000.0)]);
        let mut flags = DataQualityFlags::new();
        let calc = InflowsCalculator::new(&constants, &meters, &facilities, &environmental);
        let result = calc.calculate(Period::new(3, 2026).unwrap(), &mut flags);

        assert!((result.rainfall_m3() - 5_000.0).abs() < 1e-6);
        assert!((result.abstraction_m3() - 15_000.0).abs() < 1e-6);
        assert!((result.dewatering_m3() - 8_000.0).abs() < 1e-6);
        assert!((result.ore_moisture_m3() - 3_500.0).abs() < 1e-6);
        assert!((result.total_m3 - 31_500.0).abs() < 1e-3);
    }
}
