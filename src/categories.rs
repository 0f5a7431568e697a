/// Icon-category registry for the incidents feed.
///
/// The incidents endpoint reports the kind of each incident as a numeric
/// `iconCategory` code. This module is the single source of truth for the
/// code → label mapping and the presentation style attached to each
/// label; all other modules should look categories up here rather than
/// hardcoding codes.
///
/// Codes outside the registry map to nothing; the ingest layer turns
/// those into null so an unrecognized code can never fail a fetch.

// ---------------------------------------------------------------------------
// Category metadata
// ---------------------------------------------------------------------------

/// Metadata for one incident category.
pub struct IconCategory {
    /// Numeric `iconCategory` code as sent by the API.
    pub code: u64,
    /// Human-readable label written into the output records.
    pub label: &'static str,
    /// Map-marker icon name, for downstream presentation.
    pub icon: &'static str,
    /// Map-marker color, for downstream presentation.
    pub color: &'static str,
}

/// All incident categories the API documents, in code order. The gap
/// between 11 and 14 is the API's, not ours: codes 12 and 13 are not
/// assigned.
#[rustfmt::skip]
pub static ICON_CATEGORY_REGISTRY: &[IconCategory] = &[
    IconCategory { code: 0, label: "Unknown", icon: "question-circle", color: "gray" },
    IconCategory { code: 1, label: "Accident", icon: "car", color: "red" },
    IconCategory { code: 2, label: "Fog", icon: "cloud", color: "gray" },
    IconCategory {
        code: 3, label: "Dangerous Conditions", icon: "exclamation-triangle", color: "yellow",
    },
    IconCategory { code: 4, label: "Rain", icon: "cloud-rain", color: "blue" },
    IconCategory { code: 5, label: "Ice", icon: "snowflake", color: "lightblue" },
    IconCategory { code: 6, label: "Jam", icon: "road", color: "orange" },
    IconCategory { code: 7, label: "Lane Closed", icon: "minus-circle", color: "purple" },
    IconCategory { code: 8, label: "Road Closed", icon: "times-circle", color: "darkred" },
    IconCategory { code: 9, label: "Road Works", icon: "wrench", color: "blue" },
    IconCategory { code: 10, label: "Wind", icon: "wind", color: "lightgreen" },
    IconCategory { code: 11, label: "Flooding", icon: "tint", color: "blue" },
    IconCategory { code: 14, label: "Broken Down Vehicle", icon: "truck", color: "black" },
];

/// Looks up a category by numeric code. Returns `None` for unassigned codes.
pub fn find_category(code: u64) -> Option<&'static IconCategory> {
    ICON_CATEGORY_REGISTRY.iter().find(|c| c.code == code)
}

/// The label for a numeric code, if the code is assigned.
pub fn label_for_code(code: u64) -> Option<&'static str> {
    find_category(code).map(|c| c.label)
}

/// Looks up a category by its label, for presentation-side consumers that
/// only see the remapped records.
pub fn find_category_by_label(label: &str) -> Option<&'static IconCategory> {
    ICON_CATEGORY_REGISTRY.iter().find(|c| c.label == label)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicate_codes() {
        let mut seen = std::collections::HashSet::new();
        for category in ICON_CATEGORY_REGISTRY {
            assert!(
                seen.insert(category.code),
                "duplicate code {} in ICON_CATEGORY_REGISTRY",
                category.code
            );
        }
    }

    #[test]
    fn test_no_duplicate_labels() {
        let mut seen = std::collections::HashSet::new();
        for category in ICON_CATEGORY_REGISTRY {
            assert!(
                seen.insert(category.label),
                "duplicate label '{}' in ICON_CATEGORY_REGISTRY",
                category.label
            );
        }
    }

    #[test]
    fn test_registry_covers_documented_code_range() {
        // The API assigns 0 through 11 plus 14; 12 and 13 are unassigned.
        for code in 0..=11u64 {
            assert!(
                find_category(code).is_some(),
                "code {} should be in the registry",
                code
            );
        }
        assert!(find_category(12).is_none());
        assert!(find_category(13).is_none());
        assert!(find_category(14).is_some());
    }

    #[test]
    fn test_code_6_is_jam() {
        assert_eq!(label_for_code(6), Some("Jam"));
    }

    #[test]
    fn test_unassigned_code_returns_none() {
        assert_eq!(label_for_code(99), None);
    }

    #[test]
    fn test_every_category_has_a_style() {
        for category in ICON_CATEGORY_REGISTRY {
            assert!(
                !category.icon.is_empty() && !category.color.is_empty(),
                "category '{}' is missing icon or color",
                category.label
            );
        }
    }

    #[test]
    fn test_label_lookup_round_trips() {
        for category in ICON_CATEGORY_REGISTRY {
            let found = find_category_by_label(category.label)
                .expect("every registry label should be findable");
            assert_eq!(found.code, category.code);
        }
    }
}
