use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::info;

use crate::constants::ConstantsProvider;
use crate::error::CalculationError;
use crate::inflows::{InflowResult, InflowsCalculator};
use crate::kpi::{KPICalculator, KPIResult};
use crate::outflows::{OutflowResult, OutflowsCalculator};
use crate::period::Period;
use crate::quality::DataQualityFlags;
use crate::recycled::{RecycledCalculator, RecycledWaterResult};
use crate::repository::{EnvironmentalRepository, FacilityRepository, MeterRepository, StorageHistoryRepository};
use crate::storage::{StorageCalculator, StorageChange};

/// Cache-key discriminator. All three modes compute identically today;
/// they exist to allow future divergence in what gets flagged without
/// breaking the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculationMode {
    Regulator,
    Internal,
    Audit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceStatus {
    Green,
    Red,
}

/// Top-level balance output for one period.
#[derive(Debug, Clone)]
pub struct BalanceResult {
    pub period: Period,
    pub inflows: InflowResult,
    pub outflows: OutflowResult,
    pub storage: StorageChange,
    pub recycled: RecycledWaterResult,
    pub balance_error_m3: f64,
    pub error_pct: f64,
    pub kpis: KPIResult,
    pub quality_flags: DataQualityFlags,
    pub calculated_at: DateTime<Utc>,
    pub calculation_mode: CalculationMode,
    pub status: BalanceStatus,
}

impl BalanceResult {
    pub fn is_balanced(&self, min_balance_error_pct: f64) -> bool {
        self.error_pct.abs() < min_balance_error_pct
    }
}

/// Drives the calculator sequence and owns the instance-level result
/// cache. No global state: every collaborator is threaded through the
/// constructor explicitly, and the cache lives on this instance rather
/// than behind a module-level singleton.
pub struct BalanceOrchestrator<'a> {
    constants: &'a dyn ConstantsProvider,
    meters: &'a dyn MeterRepository,
    facilities: &'a dyn FacilityRepository,
    environmental: &'a dyn EnvironmentalRepository,
    history: Mutex<&'a mut dyn StorageHistoryRepository>,
    cache: Mutex<HashMap<(i32, u32, CalculationMode), BalanceResult>>,
}

impl<'a> BalanceOrchestrator<'a> {
    pub fn new(
        constants: &'a dyn ConstantsProvider,
        meters: &'a dyn MeterRepository,
        facilities: &'a dyn FacilityRepository,
        environmental: &'a dyn EnvironmentalRepository,
        history: &'a mut dyn StorageHistoryRepository,
    ) -> Self {
        BalanceOrchestrator {
            constants,
            meters,
            facilities,
            environmental,
            history: Mutex::new(history),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn calculate_for_date(
        &self,
        month: u32,
        year: i32,
        mode: CalculationMode,
        force_recalculate: bool,
    ) -> Result<BalanceResult, CalculationError> {
        let period = Period::new(month, year)
            .map_err(|e| CalculationError::new("orchestrator", e.to_string()).with_detail("month", month.to_string()))?;
        self.calculate(period, mode, force_recalculate)
    }

    pub fn calculate(
        &self,
        period: Period,
        mode: CalculationMode,
        force_recalculate: bool,
    ) -> Result<BalanceResult, CalculationError> {
        let key = (period.year, period.month, mode);

        if !force_recalculate {
            let cache = self.cache.lock().expect("cache mutex poisoned");
            if let Some(cached) = cache.get(&key) {
                return Ok(cached.clone());
            }
        }

        let mut flags = DataQualityFlags::new();

        let inflows = InflowsCalculator::new(self.constants, self.meters, self.facilities, self.environmental)
            .calculate(period, &mut flags);
        let outflows = OutflowsCalculator::new(self.constants, self.meters, self.facilities, self.environmental)
            .calculate(period, &mut flags);

        let storage = self.with_history(|history| {
            StorageCalculator::new(self.facilities, history).calculate(
                period,
                &mut flags,
                Some(inflows.total_m3),
                Some(outflows.total_m3),
            )
        });

        let recycled =
            RecycledCalculator::new(self.constants, self.meters).calculate(period, &mut flags, inflows.dewatering_m3());

        let balance_error_m3 = inflows.total_m3 - outflows.total_m3 - storage.delta_m3();
        let error_pct = if inflows.total_m3 > 0.0 { balance_error_m3 / inflows.total_m3 * 100.0 } else { 0.0 };

        let kpis = KPICalculator::new(self.constants, self.meters).calculate(
            period,
            &mut flags,
            &inflows,
            &outflows,
            &storage,
            &recycled,
        );

        let status = if error_pct.abs() < self.constants.min_balance_error_pct() {
            BalanceStatus::Green
        } else {
            BalanceStatus::Red
        };

        self.persist_storage_history(period, &storage);

        let result = BalanceResult {
            period,
            inflows,
            outflows,
            storage,
            recycled,
            balance_error_m3,
            error_pct,
            kpis,
            quality_flags: flags,
            calculated_at: Utc::now(),
            calculation_mode: mode,
            status,
        };

        info!(
            "balance calculated for {period}: error_pct={:.3}, status={:?}",
            result.error_pct, result.status
        );

        let mut cache = self.cache.lock().expect("cache mutex poisoned");
        cache.insert(key, result.clone());
        Ok(result)
    }

    /// History persistence is the only write the core performs and is
    /// deliberately non-fatal: a failed upsert is logged and the in-memory
    /// result is still returned and cached.
    fn persist_storage_history(&self, period: Period, storage: &StorageChange) {
        self.with_history(|history| {
            crate::storage::record_all_facilities_history(history, period, storage);
        });
    }

    fn with_history<R>(&self, f: impl FnOnce(&mut dyn StorageHistoryRepository) -> R) -> R {
        let mut guard = self.history.lock().expect("history mutex poisoned");
        f(&mut **guard)
    }

    pub fn clear_cache(&self) {
        self.cache.lock().expect("cache mutex poisoned").clear();
    }

    pub fn get_cached(&self, period: Period, mode: CalculationMode) -> Option<BalanceResult> {
        self.cache
            .lock()
            .expect("cache mutex poisoned")
            .get(&(period.year, period.month, mode))
            .cloned()
    }
}
