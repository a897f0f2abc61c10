use log::warn;

use crate::period::Period;
use crate::quality::{DataQualityFlags, DataQualityLevel};
use crate::repository::{Facility, FacilityRepository, StorageHistoryRepository};

/// Opening/closing storage for a facility or, when `facility_code` is
/// `None`, a system total with a per-facility breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub facility_code: Option<String>,
    pub facility_name: String,
    pub opening_m3: f64,
    pub closing_m3: f64,
    pub capacity_m3: Option<f64>,
    pub source: DataQualityLevel,
    pub facility_breakdown: Vec<StorageChange>,
}

impl StorageChange {
    pub fn delta_m3(&self) -> f64 {
        self.closing_m3 - self.opening_m3
    }
}

/// Computes opening/closing storage, in either balance-derived or
/// measured mode.
pub struct StorageCalculator<'a> {
    facilities: &'a dyn FacilityRepository,
    history: &'a dyn StorageHistoryRepository,
}

impl<'a> StorageCalculator<'a> {
    pub fn new(facilities: &'a dyn FacilityRepository, history: &'a dyn StorageHistoryRepository) -> Self {
        StorageCalculator { facilities, history }
    }

    /// `inflows_m3`/`outflows_m3` select balance-derived mode when both are
    /// `Some`; otherwise storage falls back to the measured mode.
    pub fn calculate(
        &self,
        period: Period,
        flags: &mut DataQualityFlags,
        inflows_m3: Option<f64>,
        outflows_m3: Option<f64>,
    ) -> StorageChange {
        let facilities = self.facilities.list_active_facilities();
        let openings = self.openings(&facilities, period, flags);
        let total_opening: f64 = openings.iter().map(|(_, o)| o).sum();
        let total_capacity: f64 = facilities.iter().map(|f| f.capacity_m3).sum();

        match (inflows_m3, outflows_m3) {
            (Some(inflows), Some(outflows)) => {
                self.balance_derived(&facilities, &openings, total_opening, total_capacity, inflows, outflows, flags)
            }
            _ => self.measured(&facilities, &openings, total_capacity, flags),
        }
    }

    fn openings(
        &self,
        facilities: &[Facility],
        period: Period,
        flags: &mut DataQualityFlags,
    ) -> Vec<(String, f64)> {
        let previous = period.previous();
        facilities
            .iter()
            .map(|f| {
                if let Some(closing) = self.history.get(&f.code, previous) {
                    (f.code.clone(), closing)
                } else if f.current_volume_m3 > 0.0 {
                    flags.add_estimated(format!("storage_opening_{}", f.code));
                    flags.add_warning(format!(
                        "no storage history for {}, using current_volume_m3 as opening",
                        f.code
                    ));
                    (f.code.clone(), f.current_volume_m3)
                } else {
                    flags.add_warning(format!("no storage history or current volume for {}, opening assumed 0", f.code));
                    (f.code.clone(), 0.0)
                }
            })
            .collect()
    }

    fn balance_derived(
        &self,
        facilities: &[Facility],
        openings: &[(String, f64)],
        total_opening: f64,
        total_capacity: f64,
        inflows: f64,
        outflows: f64,
        flags: &mut DataQualityFlags,
    ) -> StorageChange {
        let mut total_closing = total_opening + inflows - outflows;

        if total_closing < 0.0 {
            flags.add_warning("storage_negative: balance-derived closing storage below zero, clamped to 0");
            total_closing = 0.0;
        }
        if total_capacity > 0.0 && total_closing > total_capacity {
            flags.add_warning(format!(
                "storage_overflow: closing storage {:.1} exceeds total capacity {:.1} by {:.1}",
                total_closing,
                total_capacity,
                total_closing - total_capacity
            ));
        }

        let total_delta = total_closing - total_opening;
        let breakdown = self.distribute(facilities, openings, total_opening, total_delta);

        StorageChange {
            facility_code: None,
            facility_name: "system".to_string(),
            opening_m3: total_opening,
            closing_m3: total_closing,
            capacity_m3: Some(total_capacity),
            source: DataQualityLevel::Calculated,
            facility_breakdown: breakdown,
        }
    }

    fn measured(
        &self,
        facilities: &[Facility],
        openings: &[(String, f64)],
        total_capacity: f64,
        flags: &mut DataQualityFlags,
    ) -> StorageChange {
        let opening_by_code: std::collections::HashMap<&str, f64> =
            openings.iter().map(|(c, v)| (c.as_str(), *v)).collect();

        let breakdown: Vec<StorageChange> = facilities
            .iter()
            .map(|f| StorageChange {
                facility_code: Some(f.code.clone()),
                facility_name: f.name.clone(),
                opening_m3: *opening_by_code.get(f.code.as_str()).unwrap_or(&0.0),
                closing_m3: f.current_volume_m3,
                capacity_m3: Some(f.capacity_m3),
                source: DataQualityLevel::Measured,
                facility_breakdown: Vec::new(),
            })
            .collect();

        let total_opening: f64 = breakdown.iter().map(|b| b.opening_m3).sum();
        let total_closing: f64 = breakdown.iter().map(|b| b.closing_m3).sum();

        if total_capacity > 0.0 && total_closing > total_capacity {
            flags.add_warning("storage_overflow: measured closing storage exceeds total capacity");
        }

        StorageChange {
            facility_code: None,
            facility_name: "system".to_string(),
            opening_m3: total_opening,
            closing_m3: total_closing,
            capacity_m3: Some(total_capacity),
            source: DataQualityLevel::Measured,
            facility_breakdown: breakdown,
        }
    }

    /// Distributes `total_delta` across facilities proportionally to each
    /// facility's share of `total_opening`; falls back to an equal share
    /// when `total_opening` is zero. Proportional by opening volume, not
    /// capacity, matching the balance service's actual upsert behaviour
    /// rather than its docstring.
    fn distribute(
        &self,
        facilities: &[Facility],
        openings: &[(String, f64)],
        total_opening: f64,
        total_delta: f64,
    ) -> Vec<StorageChange> {
        let opening_by_code: std::collections::HashMap<&str, f64> =
            openings.iter().map(|(c, v)| (c.as_str(), *v)).collect();
        let count = facilities.len().max(1) as f64;

        facilities
            .iter()
            .map(|f| {
                let opening = *opening_by_code.get(f.code.as_str()).unwrap_or(&0.0);
                let share = if total_opening > 0.0 {
                    total_delta * opening / total_opening
                } else {
                    total_delta / count
                };
                StorageChange {
                    facility_code: Some(f.code.clone()),
                    facility_name: f.name.clone(),
                    opening_m3: opening,
                    closing_m3: (opening + share).max(0.0),
                    capacity_m3: Some(f.capacity_m3),
                    source: DataQualityLevel::Calculated,
                    facility_breakdown: Vec::new(),
                }
            })
            .collect()
    }
}

/// Persists the computed closing storage: upserts `storage_history` for
/// every facility. Non-fatal by policy — the orchestrator logs and
/// continues if this fails. A free function (not a method on
/// [`StorageCalculator`]) since it only needs the history repository,
/// avoiding a second borrow of it alongside the calculator's own
/// read-only reference.
pub fn record_all_facilities_history(history: &mut dyn StorageHistoryRepository, period: Period, change: &StorageChange) {
    for facility in &change.facility_breakdown {
        let Some(code) = &facility.facility_code else { continue };
        history.upsert(code, period, facility.closing_m3);
    }
    if change.facility_breakdown.is_empty() {
        warn!("record_all_facilities_history: no facility breakdown to persist for {period}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::FacilityStatus;
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

    fn facility(code: &str, current_volume: f64, capacity: f64) -> Facility {
        Facility {
            code: code.to_string(),
            name: code.to_string(),
            status: FacilityStatus::Active,
            surface_area_m2: 0.0,
            capacity_m3: capacity,
            current_volume_m3: current_volume,
            is_lined: true,
            catchment_area_m2: 0.0,
        }
    }

    #[test]
    fn opening_from_history_matches_scenario_d() {
        let facilities = FakeFacilities(vec![facility("TSF1", 90_000.0, 1_000_000.0)]);
        let mut history = FakeHistory::default();
        history.upsert("TSF1", Period::new(9, 2025).unwrap(), 95_000.0);
        let mut flags = DataQualityFlags::new();
        let calc = StorageCalculator::new(&facilities, &history);
        let result = calc.calculate(Period::new(10, 2025).unwrap(), &mut flags, None, None);
        assert_eq!(result.facility_breakdown[0].opening_m3, 95_000.0);
    }

    #[test]
    fn balance_derived_clamps_negative_closing() {
        let facilities = FakeFacilities(vec![facility("TSF1", 1_000.0, 1_000_000.0)]);
        let history = FakeHistory::default();
        let mut flags = DataQualityFlags::new();
        let calc = StorageCalculator::new(&facilities, &history);
        let result = calc.calculate(Period::new(1, 2026).unwrap(), &mut flags, Some(0.0), Some(100_000.0));
        assert_eq!(result.closing_m3, 0.0);
        assert!(flags.has_warning_containing("storage_negative"));
    }

    #[test]
    fn balance_derived_warns_on_overflow() {
        let facilities = FakeFacilities(vec![facility("TSF1", 900_000.0, 1_000_000.0)]);
        let history = FakeHistory::default();
        let mut flags = DataQualityFlags::new();
        let calc = StorageCalculator::new(&facilities, &history);
        let result = calc.calculate(Period::new(1, 2026).unwrap(), &mut flags, Some(500_000.0), Some(0.0));
        assert!(result.closing_m3 > result.capacity_m3.unwrap());
        assert!(flags.has_warning_containing("storage_overflow"));
    }

    #[test]
    fn distribution_is_proportional_to_opening_share() {
        let facilities = FakeFacilities(vec![
            facility("TSF1", 600_000.0, 1_000_000.0),
            facility("TSF2", 400_000.0, 1_000_000.0),
        ]);
        let history = FakeHistory::default();
        let mut flags = DataQualityFlags::new();
        let calc = StorageCalculator::new(&facilities, &history);
        let result = calc.calculate(Period::new(1, 2026).unwrap(), &mut flags, Some(0.0), Some(100_000.0));
        let tsf1 = result.facility_breakdown.iter().find(|b| b.facility_code.as_deref() == Some("TSF1")).unwrap();
        let tsf2 = result.facility_breakdown.iter().find(|b| b.facility_code.as_deref() == Some("TSF2")).unwrap();
        assert!((tsf1.delta_m3() - (-60_000.0)).abs() < 1e-6);
        assert!((tsf2.delta_m3() - (-40_000.0)).abs() < 1e-6);
    }
}
