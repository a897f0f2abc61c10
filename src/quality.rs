use std::collections::HashSet;

/// Data provenance, ordered worst-to-best is the opposite of this
/// declaration order: `Measured > Calculated > Estimated > Missing`.
///
/// A small sum type rather than a class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataQualityLevel {
    Missing,
    Estimated,
    Calculated,
    Measured,
}

impl DataQualityLevel {
    /// The weakest of the component qualities, per the propagation rule in
    /// a composite result's quality is the minimum of its component
    /// qualities.
    pub fn weakest(levels: impl IntoIterator<Item = DataQualityLevel>) -> DataQualityLevel {
        levels.into_iter().min().unwrap_or(DataQualityLevel::Missing)
    }
}

/// Accumulates data-quality annotations across a single balance run.
///
/// A field name may appear in at most one of the four sets; the `add_*`
/// helpers enforce this by removing the name from the other three sets
/// before inserting it.
#[derive(Debug, Clone, Default)]
pub struct DataQualityFlags {
    missing_values: HashSet<String>,
    estimated_values: HashSet<String>,
    simulated_values: HashSet<String>,
    calculated_values: HashSet<String>,
    warnings: Vec<String>,
}

impl DataQualityFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn evict(&mut self, field: &str) {
        self.missing_values.remove(field);
        self.estimated_values.remove(field);
        self.simulated_values.remove(field);
        self.calculated_values.remove(field);
    }

    pub fn add_missing(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.evict(&field);
        self.missing_values.insert(field);
    }

    pub fn add_estimated(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.evict(&field);
        self.estimated_values.insert(field);
    }

    pub fn add_simulated(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.evict(&field);
        self.simulated_values.insert(field);
    }

    pub fn add_calculated(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.evict(&field);
        self.calculated_values.insert(field);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn missing_values(&self) -> &HashSet<String> {
        &self.missing_values
    }

    pub fn estimated_values(&self) -> &HashSet<String> {
        &self.estimated_values
    }

    pub fn simulated_values(&self) -> &HashSet<String> {
        &self.simulated_values
    }

    pub fn calculated_values(&self) -> &HashSet<String> {
        &self.calculated_values
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn has_warning_containing(&self, needle: &str) -> bool {
        self.warnings.iter().any(|w| w.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_places_measured_highest() {
        assert!(DataQualityLevel::Measured > DataQualityLevel::Calculated);
        assert!(DataQualityLevel::Calculated > DataQualityLevel::Estimated);
        assert!(DataQualityLevel::Estimated > DataQualityLevel::Missing);
    }

    #[test]
    fn weakest_picks_minimum() {
        let levels = [
            DataQualityLevel::Measured,
            DataQualityLevel::Estimated,
            DataQualityLevel::Calculated,
        ];
        assert_eq!(DataQualityLevel::weakest(levels), DataQualityLevel::Estimated);
    }

    #[test]
    fn a_field_moves_between_sets_not_duplicates() {
        let mut flags = DataQualityFlags::new();
        flags.add_missing("rainfall");
        flags.add_estimated("rainfall");
        assert!(!flags.missing_values().contains("rainfall"));
        assert!(flags.estimated_values().contains("rainfall"));
    }
}
