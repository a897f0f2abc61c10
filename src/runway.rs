use chrono::NaiveDate;
use log::info;

use crate::constants::ConstantsProvider;
use crate::orchestrator::BalanceResult;
use crate::period::Period;
use crate::repository::{Facility, FacilityRepository, StorageHistoryRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionSource {
    Outflows,
    StorageHistory,
    Estimated,
}

impl ConsumptionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsumptionSource::Outflows => "outflows",
            ConsumptionSource::StorageHistory => "storage_history",
            ConsumptionSource::Estimated => "estimated",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacilityRunway {
    pub facility_code: String,
    pub facility_name: String,
    pub current_volume_m3: f64,
    pub capacity_m3: f64,
    pub utilization_pct: f64,
    pub monthly_consumption_m3: f64,
    pub days_remaining_conservative: f64,
    pub projected_empty_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTimelineRow {
    pub month: u32,
    pub opening_m3: f64,
    pub closing_m3: f64,
    pub inflow_m3: f64,
    pub outflow_m3: f64,
    pub is_depleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemRunway {
    pub combined_days_remaining: f64,
    pub usable_storage_m3: f64,
    pub daily_net_fresh_demand_m3: f64,
    pub total_outflows_m3: f64,
    pub recycled_water_m3: f64,
    pub evaporation_loss_m3: f64,
    pub seepage_loss_m3: f64,
    pub consumption_source: ConsumptionSource,
    pub facilities: Vec<FacilityRunway>,
    pub monthly_timeline: Vec<MonthlyTimelineRow>,
}

/// Projects a forward operational runway from current storage, reserve
/// margin and recent consumption, using the orchestrator's step-loop
/// accumulation shape.
pub struct RunwayProjector<'a> {
    constants: &'a dyn ConstantsProvider,
    facilities: &'a dyn FacilityRepository,
    history: &'a dyn StorageHistoryRepository,
}

impl<'a> RunwayProjector<'a> {
    pub fn new(
        constants: &'a dyn ConstantsProvider,
        facilities: &'a dyn FacilityRepository,
        history: &'a dyn StorageHistoryRepository,
    ) -> Self {
        RunwayProjector {
            constants,
            facilities,
            history,
        }
    }

    pub fn project(&self, period: Period, projection_months: u32, balance_result: Option<&BalanceResult>) -> SystemRunway {
        let facilities = self.facilities.list_active_facilities();
        let total_current: f64 = facilities.iter().map(|f| f.current_volume_m3).sum();
        let total_capacity: f64 = facilities.iter().map(|f| f.capacity_m3).sum();
        let reserve_pct = self.constants.reserve_storage_pct();

        let (daily_net_demand, consumption_source, evaporation_loss_m3, seepage_loss_m3, total_outflows_m3, recycled_water_m3) =
            self.daily_net_demand(period, balance_result);

        let usable_storage_m3 = (total_current - total_capacity * reserve_pct / 100.0).max(0.0);
        // Capped only to guard the degenerate near-zero-demand case from
        // reporting an implausibly large number of days; a genuine,
        // demand-backed projection (however large) is reported as-is.
        let combined_days_remaining = if daily_net_demand > 1e-9 {
            (usable_storage_m3 / daily_net_demand).round()
        } else {
            (projection_months * 31) as f64
        };

        let monthly_facility_consumption = self.monthly_facility_consumption(&facilities, period, consumption_source);

        let facility_runways: Vec<FacilityRunway> = facilities
            .iter()
            .map(|f| {
                let monthly_consumption = monthly_facility_consumption(f);
                let reserve_volume = f.capacity_m3 * reserve_pct / 100.0;
                let usable = (f.current_volume_m3 - reserve_volume).max(0.0);
                let days_remaining = if monthly_consumption > 0.0 {
                    usable / (monthly_consumption / 30.0)
                } else {
                    (projection_months * 31) as f64
                };
                let utilization_pct = if f.capacity_m3 > 0.0 { f.current_volume_m3 / f.capacity_m3 * 100.0 } else { 0.0 };
                let projected_empty_date = period.start_date().checked_add_signed(chrono::Duration::days(days_remaining as i64));

                FacilityRunway {
                    facility_code: f.code.clone(),
                    facility_name: f.name.clone(),
                    current_volume_m3: f.current_volume_m3,
                    capacity_m3: f.capacity_m3,
                    utilization_pct,
                    monthly_consumption_m3: monthly_consumption,
                    days_remaining_conservative: days_remaining.max(0.0),
                    projected_empty_date,
                }
            })
            .collect();

        let monthly_timeline =
            self.monthly_timeline(period, projection_months, total_current, total_capacity, daily_net_demand, recycled_water_m3 / 30.0);

        info!("runway projected for {period}: combined_days_remaining={combined_days_remaining}, source={}", consumption_source.as_str());

        SystemRunway {
            combined_days_remaining,
            usable_storage_m3,
            daily_net_fresh_demand_m3: daily_net_demand,
            total_outflows_m3,
            recycled_water_m3,
            evaporation_loss_m3,
            seepage_loss_m3,
            consumption_source,
            facilities: facility_runways,
            monthly_timeline,
        }
    }

    #[allow(clippy::type_complexity)]
    fn daily_net_demand(
        &self,
        period: Period,
        balance_result: Option<&BalanceResult>,
    ) -> (f64, ConsumptionSource, f64, f64, f64, f64) {
        if let Some(balance) = balance_result {
            let net = (balance.outflows.total_m3 - balance.recycled.total_m3) / 30.0;
            return (
                net.max(0.0),
                ConsumptionSource::Outflows,
                balance.outflows.evaporation_m3(),
                balance.outflows.seepage_m3(),
                balance.outflows.total_m3,
                balance.recycled.total_m3,
            );
        }

        if let Some(daily) = self.daily_demand_from_history(period) {
            return (daily, ConsumptionSource::StorageHistory, 0.0, 0.0, 0.0, 0.0);
        }

        let total_capacity: f64 = self.facilities.list_active_facilities().iter().map(|f| f.capacity_m3).sum();
        let estimated_monthly = total_capacity * 0.05;
        (estimated_monthly / 30.0, ConsumptionSource::Estimated, 0.0, 0.0, 0.0, 0.0)
    }

    fn daily_demand_from_history(&self, period: Period) -> Option<f64> {
        let facilities = self.facilities.list_active_facilities();
        let mut total_monthly = 0.0;
        let mut any_found = false;

        for facility in &facilities {
            let mut cursor = period;
            let mut closing = None;
            let mut opening = None;
            for i in 0..3 {
                cursor = cursor.previous();
                if i == 0 {
                    closing = self.history.get(&facility.code, cursor);
                }
                opening = self.history.get(&facility.code, cursor).or(opening);
            }
            if let (Some(closing), Some(opening)) = (closing, opening) {
                let delta = opening - closing;
                if delta > 0.0 {
                    total_monthly += delta / 3.0;
                    any_found = true;
                }
            }
        }

        if any_found {
            Some(total_monthly / 30.0)
        } else {
            None
        }
    }

    fn monthly_facility_consumption<'f>(
        &self,
        facilities: &'f [Facility],
        period: Period,
        source: ConsumptionSource,
    ) -> impl Fn(&Facility) -> f64 + 'f {
        let active_count = facilities.len().max(1) as f64;
        let system_monthly: f64 = match source {
            ConsumptionSource::Outflows | ConsumptionSource::StorageHistory => self
                .daily_demand_from_history(period)
                .map(|d| d * 30.0)
                .unwrap_or(0.0),
            ConsumptionSource::Estimated => 0.0,
        };
        let fallback_rate = 0.05;

        move |facility: &Facility| -> f64 {
            if system_monthly > 0.0 {
                system_monthly / active_count
            } else {
                facility.capacity_m3 * fallback_rate
            }
        }
    }

    fn monthly_timeline(
        &self,
        period: Period,
        months: u32,
        total_current: f64,
        total_capacity: f64,
        baseline_monthly_outflow: f64,
        baseline_recycled_daily: f64,
    ) -> Vec<MonthlyTimelineRow> {
        let facilities = self.facilities.list_active_facilities();
        let total_surface_area: f64 = facilities.iter().map(|f| f.surface_area_m2).sum();
        let reserve_pct = self.constants.reserve_storage_pct();
        let reserve_volume = total_capacity * reserve_pct / 100.0;

        // Per-facility volumes carried forward through the timeline so the
        // evaporation clamp is checked against each facility's own evolving
        // volume, not its volume at projection start, matching the clamp
        // applied in the outflows calculator.
        let mut facility_volumes: Vec<f64> = facilities.iter().map(|f| f.current_volume_m3).collect();

        let mut rows = Vec::with_capacity(months as usize);
        let mut opening = total_current;
        let mut cursor = period;

        for _ in 0..months {
            cursor = Period::new(if cursor.month == 12 { 1 } else { cursor.month + 1 }, if cursor.month == 12 {
                cursor.year + 1
            } else {
                cursor.year
            })
            .expect("month rollover always valid");

            let rainfall_mm = self.constants.rainfall_mm_seasonal(cursor.month);
            let evap_mm = self.constants.evaporation_mm_seasonal(cursor.month);

            let inflow = rainfall_mm * total_surface_area / 1000.0 + baseline_recycled_daily * 30.0;

            let mut evaporation_loss = 0.0;
            for (facility, volume) in facilities.iter().zip(facility_volumes.iter_mut()) {
                let raw = evap_mm * self.constants.evap_pan_coefficient() * facility.surface_area_m2 / 1000.0;
                let clamped = raw.min(volume.max(0.0));
                *volume = (*volume - clamped).max(0.0);
                evaporation_loss += clamped;
            }

            let outflow = baseline_monthly_outflow + evaporation_loss;

            let raw_closing = opening + inflow - outflow;
            let closing = raw_closing.max(0.0).min(if total_capacity > 0.0 { total_capacity } else { f64::MAX });
            let is_depleted = closing <= reserve_volume;

            rows.push(MonthlyTimelineRow {
                month: cursor.month,
                opening_m3: opening,
                closing_m3: closing,
                inflow_m3: inflow,
                outflow_m3: outflow,
                is_depleted,
            });

            opening = closing;
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::StaticConstantsBuilder;
    use crate::outflows::{OutflowComponent, OutflowResult};
    use crate::quality::DataQualityFlags;
    use crate::quality::DataQualityLevel;
    use crate::recycled::RecycledWaterResult;
    use crate::repository::FacilityStatus;
    use crate::storage::StorageChange;
    use crate::inflows::{InflowComponent, InflowResult};
    use crate::kpi::KPIResult;
    use crate::orchestrator::{BalanceStatus, CalculationMode};
    use std::collections::HashMap;

    struct FakeFacilities(Vec<Facility>);
    impl FacilityRepository for FakeFacilities {
        fn list_active_facilities(&self) -> Vec<Facility> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct FakeHistory(HashMap<(String, u32, i32), f64>);
    impl StorageHistoryRepository for FakeHistory {
        fn get(&self, facility_code: &str, period: Period) -> Option<f64> {
            self.0.get(&(facility_code.to_string(), period.month, period.year)).copied()
        }
        fn upsert(&mut self, facility_code: &str, period: Period, volume_m3: f64) {
            self.0.insert((facility_code.to_string(), period.month, period.year), volume_m3);
        }
    }

    fn facility(current: f64, capacity: f64) -> Facility {
        Facility {
            code: "TSF1".into(),
            name: "TSF1".into(),
            status: FacilityStatus::Active,
            surface_area_m2: 0.0,
            capacity_m3: capacity,
            current_volume_m3: current,
            is_lined: true,
            catchment_area_m2: 0.0,
        }
    }

    fn balance_result(outflows_total: f64, recycled_total: f64) -> BalanceResult {
        BalanceResult {
            period: Period::new(4, 2026).unwrap(),
            inflows: InflowResult {
                total_m3: 0.0,
                component_details: vec![InflowComponent {
                    name: "rainfall".into(),
                    value_m3: 0.0,
                    quality: DataQualityLevel::Measured,
                    source_label: "test".into(),
                    notes: None,
                }],
                quality: DataQualityLevel::Measured,
            },
            outflows: OutflowResult {
                total_m3: outflows_total,
                component_details: vec![OutflowComponent {
                    name: "evaporation".into(),
                    value_m3: outflows_total,
                    quality: DataQualityLevel::Calculated,
                    source_label: "test".into(),
                    notes: None,
                }],
                quality: DataQualityLevel::Calculated,
                tailings_moisture_pct_used: 45.0,
            },
            storage: StorageChange {
                facility_code: None,
                facility_name: "system".into(),
                opening_m3: 800_000.0,
                closing_m3: 800_000.0,
                capacity_m3: Some(1_000_000.0),
                source: DataQualityLevel::Calculated,
                facility_breakdown: Vec::new(),
            },
            recycled: RecycledWaterResult {
                total_m3: recycled_total,
                quality: DataQualityLevel::Estimated,
                dirty_inflows_m3: 0.0,
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
    fn matches_scenario_f() {
        let constants = StaticConstantsBuilder::new().reserve_storage_pct(10.0).build().unwrap();
        let facilities = FakeFacilities(vec![facility(800_000.0, 1_000_000.0)]);
        let history = FakeHistory::default();
        let projector = RunwayProjector::new(&constants, &facilities, &history);
        let balance = balance_result(30_000.0, 6_000.0);
        let runway = projector.project(Period::new(4, 2026).unwrap(), 12, Some(&balance));

        assert!((runway.usable_storage_m3 - 700_000.0).abs() < 1e-6);
        assert!((runway.daily_net_fresh_demand_m3 - 800.0).abs() < 1e-6);
        assert!((runway.combined_days_remaining - 875.0).abs() < 1.0);
        assert_eq!(runway.consumption_source, ConsumptionSource::Outflows);
    }

    #[test]
    fn evaporation_clamp_applies_symmetrically_in_timeline() {
        let mut evap = [0.0; 12];
        evap.iter_mut().for_each(|v| *v = 1000.0);
        let constants = StaticConstantsBuilder::new().evaporation_mm_seasonal(evap).build().unwrap();
        let facilities = FakeFacilities(vec![facility(10.0, 1_000_000.0)]);
        let history = FakeHistory::default();
        let projector = RunwayProjector::new(&constants, &facilities, &history);
        let runway = projector.project(Period::new(4, 2026).unwrap(), 1, None);
        assert!(runway.monthly_timeline[0].closing_m3 >= 0.0);
    }
}
