use crate::period::Period;

/// Operating status of a storage facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityStatus {
    Active,
    Decommissioned,
    Planned,
}

/// A storage facility (tailings storage facility, return water dam,
/// pollution control dam, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub code: String,
    pub name: String,
    pub status: FacilityStatus,
    pub surface_area_m2: f64,
    pub capacity_m3: f64,
    pub current_volume_m3: f64,
    pub is_lined: bool,
    pub catchment_area_m2: f64,
}

impl Facility {
    pub fn is_active(&self) -> bool {
        self.status == FacilityStatus::Active
    }
}

/// Read access to monthly meter/Excel-column values. Column names are
/// the keys from the accounting spreadsheet this system replaces:
/// `tonnes_milled`, `total_consumption`, `tailings_density`, and so on.
pub trait MeterRepository {
    /// The value recorded for `column` in `period`, or `None` if no reading
    /// exists (the calculator treats this as [`crate::quality::DataQualityLevel::Missing`]).
    fn get_monthly_value(&self, period: Period, column: &str) -> Option<f64>;

    /// All column names this repository has any data for, regardless of
    /// period. Used by calculators that need to discover a family of
    /// columns (e.g. `surface_water_sources.*`).
    fn list_columns(&self) -> Vec<String>;
}

/// Read access to the facility register.
pub trait FacilityRepository {
    fn list_active_facilities(&self) -> Vec<Facility>;
}

/// Read/write access to the monthly storage-volume ledger. `upsert`
/// replaces any existing row for the same `(facility_code, period)` pair.
pub trait StorageHistoryRepository {
    fn get(&self, facility_code: &str, period: Period) -> Option<f64>;
    fn upsert(&mut self, facility_code: &str, period: Period, volume_m3: f64);
}

/// Read access to rainfall/evaporation measurements. Falls back to a
/// [`crate::constants::ConstantsProvider`] seasonal table when no
/// measurement exists for the period.
pub trait EnvironmentalRepository {
    fn get_monthly(&self, period: Period, column: &str) -> Option<f64>;
}
