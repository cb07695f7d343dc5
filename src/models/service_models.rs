use std::cmp::Ordering;

use serde::Serialize;

use crate::error::{ErrorBody, StepOutcome};
use crate::models::container_models::ContainerRecord;
use crate::models::image_models::ImageRecord;

/// Comparable recency key for one version entry. Primary key is the
/// numeric dot-separated version, secondary key is the build timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionKey {
    components: Vec<u64>,
    build: u64,
    well_formed: bool,
}

impl VersionKey {
    /// Leading 'v'/'V' and any non-numeric, non-dot characters are
    /// stripped before the components are read. A version with no digits
    /// at all is malformed and sorts after every well-formed one. An
    /// absent or unparseable build counts as 0.
    pub fn parse(version: &str, build: Option<&str>) -> Self {
        let cleaned: String = version
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let components: Vec<u64> = cleaned
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u64>().unwrap_or(u64::MAX))
            .collect();
        let well_formed = !components.is_empty();
        let build = build
            .and_then(|b| b.trim().parse::<u64>().ok())
            .unwrap_or(0);
        VersionKey {
            components,
            build,
            well_formed,
        }
    }

    /// Ordering for a newest-first sort: `Less` means `self` sorts before
    /// `other`. Each component is compared as an integer, with shorter
    /// sequences zero-padded, so 1.10.0 is newer than 1.9.0. Equal keys
    /// report `Equal` and leave tie order to the (stable) sort.
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        match (self.well_formed, other.well_formed) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => return Ordering::Equal,
            (true, true) => {}
        }
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match b.cmp(&a) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        other.build.cmp(&self.build)
    }
}

/// One container (or image-only placeholder) representing one build of a
/// service.
#[derive(Debug, Clone, Serialize)]
pub struct VersionEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerRecord>,
    pub image: ImageRecord,
    pub is_running: bool,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
}

/// Ordered, deduplicated version history of one logical service.
/// Invariant: at most one entry has `is_running` at any settled point;
/// the rollback path enforces it by stopping siblings before a start.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceGroup {
    pub service_name: String,
    pub versions: Vec<VersionEntry>,
}

impl ServiceGroup {
    pub fn running_container_ids(&self) -> Vec<String> {
        self.versions
            .iter()
            .filter(|entry| entry.is_running)
            .filter_map(|entry| entry.container.as_ref().map(|c| c.id.clone()))
            .collect()
    }
}

/// First-class accounting for the two-phase rollback: every sibling stop
/// outcome, then the start outcome, reported distinctly. Best-effort by
/// contract; the runtime has no cross-container transaction.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackReport {
    pub service_name: String,
    pub target_container_id: String,
    pub stopped: Vec<StepOutcome>,
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_error: Option<ErrorBody>,
}

impl RollbackReport {
    pub fn fully_succeeded(&self) -> bool {
        self.started && self.stopped.iter().all(|step| step.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(version: &str) -> VersionKey {
        VersionKey::parse(version, None)
    }

    #[test]
    fn numeric_component_comparison_beats_lexicographic() {
        // v1.10.0 is newer than v1.9.0
        assert_eq!(
            key("v1.10.0").cmp_newest_first(&key("v1.9.0")),
            Ordering::Less
        );
        assert_eq!(
            key("v1.9.0").cmp_newest_first(&key("v1.10.0")),
            Ordering::Greater
        );
    }

    #[test]
    fn leading_v_and_noise_are_stripped() {
        assert_eq!(key("V2.0.0").cmp_newest_first(&key("2.0.0")), Ordering::Equal);
        assert_eq!(
            key("release-1.2.3").cmp_newest_first(&key("v1.2.3")),
            Ordering::Equal
        );
    }

    #[test]
    fn shorter_versions_are_zero_padded() {
        assert_eq!(key("1.2").cmp_newest_first(&key("1.2.0")), Ordering::Equal);
        assert_eq!(key("1.2.1").cmp_newest_first(&key("1.2")), Ordering::Less);
    }

    #[test]
    fn build_breaks_ties_descending() {
        let newer = VersionKey::parse("v1.1.0", Some("200"));
        let older = VersionKey::parse("v1.1.0", Some("150"));
        assert_eq!(newer.cmp_newest_first(&older), Ordering::Less);
        assert_eq!(older.cmp_newest_first(&newer), Ordering::Greater);
    }

    #[test]
    fn absent_build_sorts_last_among_equal_versions() {
        let with_build = VersionKey::parse("v1.1.0", Some("1"));
        let without = VersionKey::parse("v1.1.0", None);
        assert_eq!(with_build.cmp_newest_first(&without), Ordering::Less);
    }

    #[test]
    fn malformed_versions_sort_after_well_formed() {
        assert_eq!(key("latest").cmp_newest_first(&key("v0.0.1")), Ordering::Greater);
        assert_eq!(key("v0.0.1").cmp_newest_first(&key("latest")), Ordering::Less);
        // stable relative order among themselves
        assert_eq!(key("latest").cmp_newest_first(&key("main")), Ordering::Equal);
    }
}
