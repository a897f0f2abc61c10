use log::debug;

use crate::constants::ConstantsProvider;
use crate::inflows::TONNES_MILLED;
use crate::period::Period;
use crate::quality::{DataQualityFlags, DataQualityLevel};
use crate::repository::{EnvironmentalRepository, FacilityRepository, MeterRepository};

const TAILINGS_DENSITY: &str = "tailings_density";
const PGM_WET_TONNES: &str = "pgm_wet_tonnes";
const PGM_MOISTURE_PCT: &str = "pgm_moisture_pct";
const CHROMITE_WET_TONNES: &str = "chromite_wet_tonnes";
const CHROMITE_MOISTURE_PCT: &str = "chromite_moisture_pct";
const EVAPORATION_MM: &str = "evaporation_mm";

/// One named outflow line item, symmetric to [`crate::inflows::InflowComponent`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutflowComponent {
    pub name: String,
    pub value_m3: f64,
    pub quality: DataQualityLevel,
    pub source_label: String,
    pub notes: Option<String>,
}

impl OutflowComponent {
    fn new(
        name: impl Into<String>,
        value_m3: f64,
        quality: DataQualityLevel,
        source_label: impl Into<String>,
    ) -> Self {
        OutflowComponent {
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

#[derive(Debug, Clone, PartialEq)]
pub struct OutflowResult {
    pub total_m3: f64,
    pub component_details: Vec<OutflowComponent>,
    pub quality: DataQualityLevel,
    /// Tailings moisture percentage actually used for `tailings_lockup`,
    /// either density-derived or the constant fallback. Exposed so the KPI
    /// cross-check can compare against it.
    pub tailings_moisture_pct_used: f64,
}

impl OutflowResult {
    fn component(&self, name: &str) -> f64 {
        self.component_details
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value_m3)
            .unwrap_or(0.0)
    }

    pub fn evaporation_m3(&self) -> f64 {
        self.component("evaporation")
    }

    pub fn seepage_m3(&self) -> f64 {
        self.component("seepage")
    }
}

/// Given a measured slurry density, derives solids concentration by weight
/// and moisture percentage. Returns `None` when the density is outside
/// the physically valid range `1.0 < rho_s < rho_solids`.
pub fn moisture_from_density(slurry_density: f64, solids_density: f64) -> Option<f64> {
    if !(slurry_density > 1.0 && slurry_density < solids_density) {
        return None;
    }
    let cw = solids_density * (slurry_density - 1.0) / (slurry_density * (solids_density - 1.0));
    Some((1.0 - cw) * 100.0)
}

/// Computes the seven named outflow components: evaporation, seepage,
/// dust suppression, tailings lockup, mining and domestic consumption
/// (when enabled), and product moisture.
pub struct OutflowsCalculator<'a> {
    constants: &'a dyn ConstantsProvider,
    meters: &'a dyn MeterRepository,
    facilities: &'a dyn FacilityRepository,
    environmental: &'a dyn EnvironmentalRepository,
}

impl<'a> OutflowsCalculator<'a> {
    pub fn new(
        constants: &'a dyn ConstantsProvider,
        meters: &'a dyn MeterRepository,
        facilities: &'a dyn FacilityRepository,
        environmental: &'a dyn EnvironmentalRepository,
    ) -> Self {
        OutflowsCalculator {
            constants,
            meters,
            facilities,
            environmental,
        }
    }

    pub fn calculate(&self, period: Period, flags: &mut DataQualityFlags) -> OutflowResult {
        let active_facilities = self.facilities.list_active_facilities();

        let mut components = Vec::new();
        components.push(self.evaporation(period, &active_facilities, flags));
        components.push(self.seepage(&active_facilities, flags));

        let tonnes_milled = self.meters.get_monthly_value(period, TONNES_MILLED).unwrap_or(0.0);
        components.push(self.dust_suppression(tonnes_milled, flags));

        let (tailings_component, moisture_used) = self.tailings_lockup(period, tonnes_milled, flags);
        components.push(tailings_component);

        if self.constants.mining_consumption_enabled() {
            components.push(self.mining_consumption(tonnes_milled, flags));
        }
        if self.constants.domestic_consumption_enabled() {
            components.push(self.domestic_consumption(period, flags));
        }
        components.push(self.product_moisture(period, tonnes_milled, flags));

        let total_m3: f64 = components.iter().map(|c| c.value_m3).sum();
        let quality = DataQualityLevel::weakest(components.iter().map(|c| c.quality));

        OutflowResult {
            total_m3,
            component_details: components,
            quality,
            tailings_moisture_pct_used: moisture_used,
        }
    }

    fn evaporation(
        &self,
        period: Period,
        facilities: &[crate::repository::Facility],
        flags: &mut DataQualityFlags,
    ) -> OutflowComponent {
        let Some(evap_mm) = self.environmental.get_monthly(period, EVAPORATION_MM) else {
            flags.add_missing("evaporation");
            return OutflowComponent::new("evaporation", 0.0, DataQualityLevel::Missing, "no reading");
        };

        let pan_coeff = self.constants.evap_pan_coefficient();
        let mut total = 0.0;
        let mut clamped_any = false;
        for facility in facilities {
            let raw = evap_mm * pan_coeff * facility.surface_area_m2 / 1000.0;
            let clamped = raw.min(facility.current_volume_m3.max(0.0));
            if clamped < raw {
                clamped_any = true;
            }
            total += clamped;
        }

        if clamped_any {
            flags.add_warning("evaporation clamped to available facility volume on one or more facilities");
        }

        OutflowComponent::new("evaporation", total, DataQualityLevel::Calculated, "evap_mm x pan_coefficient, clamped")
    }

    fn seepage(&self, facilities: &[crate::repository::Facility], flags: &mut DataQualityFlags) -> OutflowComponent {
        if facilities.is_empty() {
            flags.add_missing("seepage");
            return OutflowComponent::new("seepage", 0.0, DataQualityLevel::Missing, "no active facilities");
        }

        let total: f64 = facilities
            .iter()
            .map(|f| {
                let rate_pct = if f.is_lined {
                    self.constants.seepage_rate_lined_pct()
                } else {
                    self.constants.seepage_rate_unlined_pct()
                };
                f.current_volume_m3.max(0.0) * rate_pct / 100.0
            })
            .sum();

        OutflowComponent::new("seepage", total, DataQualityLevel::Calculated, "current_volume x seepage rate")
    }

    fn dust_suppression(&self, tonnes_milled: f64, flags: &mut DataQualityFlags) -> OutflowComponent {
        if tonnes_milled <= 0.0 {
            return OutflowComponent::new("dust_suppression", 0.0, DataQualityLevel::Estimated, "tonnes_milled zero");
        }
        let value = tonnes_milled * self.constants.dust_suppression_rate_l_per_t() / 1000.0;
        flags.add_estimated("dust_suppression");
        OutflowComponent::new(
            "dust_suppression",
            value,
            DataQualityLevel::Estimated,
            "tonnes_milled x dust_suppression_rate",
        )
    }

    fn tailings_lockup(
        &self,
        period: Period,
        tonnes_milled: f64,
        flags: &mut DataQualityFlags,
    ) -> (OutflowComponent, f64) {
        let solids_density = self.constants.tailings_solids_density();
        let slurry_density = self.meters.get_monthly_value(period, TAILINGS_DENSITY);

        let (moisture_pct, quality, source) = match slurry_density.and_then(|d| moisture_from_density(d, solids_density)) {
            Some(pct) => (pct, DataQualityLevel::Calculated, "density-derived"),
            None => {
                if slurry_density.is_some() {
                    flags.add_warning("tailings_density out of physical bounds, falling back to constant moisture");
                }
                (self.constants.tailings_moisture_pct(), DataQualityLevel::Estimated, "constant moisture_pct")
            }
        };

        if tonnes_milled <= 0.0 {
            return (
                OutflowComponent::new("tailings_lockup", 0.0, quality, source),
                moisture_pct,
            );
        }

        let value = tonnes_milled * moisture_pct / 100.0;
        debug!("tailings_lockup: {tonnes_milled} t x {moisture_pct}% = {value} m3 ({source})");
        (
            OutflowComponent::new("tailings_lockup", value, quality, source)
                .with_note(format!("moisture_pct={moisture_pct:.2}")),
            moisture_pct,
        )
    }

    fn mining_consumption(&self, tonnes_milled: f64, flags: &mut DataQualityFlags) -> OutflowComponent {
        if tonnes_milled <= 0.0 {
            flags.add_missing("mining_consumption");
            return OutflowComponent::new("mining_consumption", 0.0, DataQualityLevel::Missing, "tonnes_milled zero");
        }
        let value = tonnes_milled * self.constants.mining_water_rate_m3_per_t();
        OutflowComponent::new(
            "mining_consumption",
            value,
            DataQualityLevel::Calculated,
            "tonnes_milled x mining_water_rate",
        )
    }

    fn domestic_consumption(&self, period: Period, _flags: &mut DataQualityFlags) -> OutflowComponent {
        let days = period.days_in_period() as f64;
        let value = self.constants.workforce() * days * self.constants.domestic_consumption_l_per_person_day() / 1000.0;
        OutflowComponent::new(
            "domestic_consumption",
            value,
            DataQualityLevel::Calculated,
            "workforce x days x l_per_person_day",
        )
    }

    fn product_moisture(&self, period: Period, tonnes_milled: f64, flags: &mut DataQualityFlags) -> OutflowComponent {
        if let Some(value) = self.product_moisture_from_meters(period) {
            flags.add_calculated("product_moisture");
            return OutflowComponent::new("product_moisture", value, DataQualityLevel::Calculated, "PGM+Chromite meters");
        }

        if tonnes_milled <= 0.0 {
            return OutflowComponent::new("product_moisture", 0.0, DataQualityLevel::Estimated, "tonnes_milled zero");
        }

        let value =
            tonnes_milled * self.constants.recovery_rate_pct() / 100.0 * self.constants.product_moisture_pct() / 100.0;
        flags.add_estimated("product_moisture");
        OutflowComponent::new(
            "product_moisture",
            value,
            DataQualityLevel::Estimated,
            "tonnes_milled x recovery_pct x product_moisture_pct",
        )
    }

    fn product_moisture_from_meters(&self, period: Period) -> Option<f64> {
        let pgm_wet = self.meters.get_monthly_value(period, PGM_WET_TONNES)?;
        let pgm_moisture = self.meters.get_monthly_value(period, PGM_MOISTURE_PCT)?;
        let mut total = pgm_wet * pgm_moisture / 100.0;

        if let (Some(chromite_wet), Some(chromite_moisture)) = (
            self.meters.get_monthly_value(period, CHROMITE_WET_TONNES),
            self.meters.get_monthly_value(period, CHROMITE_MOISTURE_PCT),
        ) {
            total += chromite_wet * chromite_moisture / 100.0;
        }

        Some(total)
    }
}
