//! Water balance calculation core for a mine-site water accounting system.
//!
//! The crate composes five calculators (inflows, outflows, storage,
//! recycled water, KPIs) behind a [`orchestrator::BalanceOrchestrator`],
//! plus a separate [`runway::RunwayProjector`] for forward depletion
//! projections. All collaborators (site constants, meter readings,
//! facility records, storage history, environmental data) are injected as
//! trait objects; this crate never names a concrete repository. The
//! [`report`] module exports a `BalanceResult`/`SystemRunway` to CSV for
//! downstream reporting.

pub mod constants;
pub mod error;
pub mod inflows;
pub mod kpi;
pub mod orchestrator;
pub mod outflows;
pub mod period;
pub mod quality;
pub mod recycled;
pub mod report;
pub mod repository;
pub mod runway;
pub mod storage;

pub use constants::{ConstantsProvider, StaticConstants, StaticConstantsBuilder, SurfaceType};
pub use error::{CalculationError, ConstantsError, PeriodError, ReportError};
pub use inflows::{InflowComponent, InflowResult, InflowsCalculator};
pub use kpi::{KPICalculator, KPIResult};
pub use orchestrator::{BalanceOrchestrator, BalanceResult, BalanceStatus, CalculationMode};
pub use outflows::{moisture_from_density, OutflowComponent, OutflowResult, OutflowsCalculator};
pub use period::Period;
pub use quality::{DataQualityFlags, DataQualityLevel};
pub use recycled::{RecycledCalculator, RecycledWaterResult};
pub use report::{write_balance_csv, write_runway_csv};
pub use repository::{
    EnvironmentalRepository, Facility, FacilityRepository, FacilityStatus, MeterRepository, StorageHistoryRepository,
};
pub use runway::{ConsumptionSource, FacilityRunway, MonthlyTimelineRow, RunwayProjector, SystemRunway};
pub use storage::{StorageCalculator, StorageChange};
