//! Capability catalog: the fixed universe of tools, their groups, and the
//! minimum scope each one needs.

use crate::BaseScope;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named bucket of related capabilities used for coarse-grained filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityGroup {
    Core,
    Json,
    Text,
    Stats,
    Vector,
    Geo,
    Io,
    Admin,
}

impl CapabilityGroup {
    /// Every group, in catalog order.
    pub const ALL: [CapabilityGroup; 8] = [
        CapabilityGroup::Core,
        CapabilityGroup::Json,
        CapabilityGroup::Text,
        CapabilityGroup::Stats,
        CapabilityGroup::Vector,
        CapabilityGroup::Geo,
        CapabilityGroup::Io,
        CapabilityGroup::Admin,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Json => "json",
            Self::Text => "text",
            Self::Stats => "stats",
            Self::Vector => "vector",
            Self::Geo => "geo",
            Self::Io => "io",
            Self::Admin => "admin",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.name() == name)
    }

    /// Capabilities belonging to this group.
    pub fn capabilities(self) -> &'static [&'static str] {
        match self {
            Self::Core => &[
                "read_query",
                "write_query",
                "create_table",
                "drop_table",
                "list_tables",
                "describe_table",
                "get_indexes",
                "create_index",
            ],
            Self::Json => &[
                "json_extract",
                "json_query",
                "json_validate",
                "json_insert",
                "json_update",
            ],
            Self::Text => &[
                "text_search",
                "regex_match",
                "fuzzy_search",
                "fts_search",
                "fts_create_index",
            ],
            Self::Stats => &[
                "stats_summary",
                "stats_percentile",
                "stats_histogram",
                "stats_correlation",
            ],
            Self::Vector => &[
                "vector_search",
                "vector_similarity",
                "vector_store",
                "vector_create_table",
            ],
            Self::Geo => &["geo_distance", "geo_nearby", "geo_bounding_box"],
            Self::Io => &["export_csv", "export_json", "import_csv", "import_json"],
            Self::Admin => &[
                "vacuum_database",
                "analyze_database",
                "integrity_check",
                "optimize_database",
                "backup_database",
                "restore_database",
                "pragma_set",
            ],
        }
    }

    /// The weakest base scope whose holders may see this group.
    pub fn tier(self) -> BaseScope {
        match self {
            Self::Io => BaseScope::Write,
            Self::Admin => BaseScope::Admin,
            _ => BaseScope::Read,
        }
    }
}

impl fmt::Display for CapabilityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A shortcut that expands to several capability groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaGroup {
    Starter,
    Analytics,
    Search,
    Spatial,
    Minimal,
    Full,
}

impl MetaGroup {
    pub const ALL: [MetaGroup; 6] = [
        MetaGroup::Starter,
        MetaGroup::Analytics,
        MetaGroup::Search,
        MetaGroup::Spatial,
        MetaGroup::Minimal,
        MetaGroup::Full,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Analytics => "analytics",
            Self::Search => "search",
            Self::Spatial => "spatial",
            Self::Minimal => "minimal",
            Self::Full => "full",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// The groups this shortcut stands for.
    pub fn groups(self) -> &'static [CapabilityGroup] {
        use CapabilityGroup::*;
        match self {
            Self::Starter => &[Core, Json, Text],
            Self::Analytics => &[Core, Json, Stats],
            Self::Search => &[Core, Text, Vector],
            Self::Spatial => &[Core, Geo],
            Self::Minimal => &[Core],
            Self::Full => &CapabilityGroup::ALL,
        }
    }
}

impl fmt::Display for MetaGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capabilities that never mutate data. Holders of `read` get exactly these.
pub const READ_ONLY_CAPABILITIES: &[&str] = &[
    "read_query",
    "list_tables",
    "describe_table",
    "get_indexes",
    "json_extract",
    "json_query",
    "json_validate",
    "text_search",
    "regex_match",
    "fuzzy_search",
    "fts_search",
    "stats_summary",
    "stats_percentile",
    "stats_histogram",
    "stats_correlation",
    "vector_search",
    "vector_similarity",
    "geo_distance",
    "geo_nearby",
    "geo_bounding_box",
];

pub fn is_read_only(capability: &str) -> bool {
    READ_ONLY_CAPABILITIES.contains(&capability)
}

/// Admin-only capabilities are exactly the members of the `admin` group.
pub fn is_admin_only(capability: &str) -> bool {
    CapabilityGroup::Admin.capabilities().contains(&capability)
}

/// Every known capability name, grouped in catalog order.
pub fn all_capabilities() -> impl Iterator<Item = &'static str> {
    CapabilityGroup::ALL
        .into_iter()
        .flat_map(|g| g.capabilities().iter().copied())
}

pub fn is_known(capability: &str) -> bool {
    group_of(capability).is_some()
}

pub fn group_of(capability: &str) -> Option<CapabilityGroup> {
    CapabilityGroup::ALL
        .into_iter()
        .find(|g| g.capabilities().contains(&capability))
}

/// The minimum base scope that unlocks `capability`.
///
/// Unknown names fall into the `write` tier, matching how
/// [`Scope::grants_capability`](crate::Scope::grants_capability) treats them.
pub fn required_scope(capability: &str) -> BaseScope {
    if is_read_only(capability) {
        BaseScope::Read
    } else if is_admin_only(capability) {
        BaseScope::Admin
    } else {
        BaseScope::Write
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn capability_names_are_unique() {
        let all: Vec<_> = all_capabilities().collect();
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), unique.len());
    }

    #[test]
    fn read_only_set_is_a_subset_of_the_catalog() {
        for name in READ_ONLY_CAPABILITIES {
            assert!(is_known(name), "{name} missing from catalog");
            assert!(!is_admin_only(name), "{name} is both read-only and admin-only");
        }
    }

    #[test]
    fn read_only_capabilities_live_in_read_or_write_tier_groups() {
        for name in READ_ONLY_CAPABILITIES {
            let group = group_of(name).unwrap();
            assert_ne!(group.tier(), BaseScope::Admin, "{name} in {group}");
        }
    }

    #[test]
    fn group_names_round_trip() {
        for group in CapabilityGroup::ALL {
            assert_eq!(CapabilityGroup::from_name(group.name()), Some(group));
        }
        assert_eq!(CapabilityGroup::from_name("nope"), None);
    }

    #[test]
    fn meta_group_names_do_not_shadow_groups() {
        for meta in MetaGroup::ALL {
            assert!(CapabilityGroup::from_name(meta.name()).is_none());
        }
    }

    #[test]
    fn starter_expands_to_core_json_text() {
        assert_eq!(
            MetaGroup::Starter.groups(),
            &[CapabilityGroup::Core, CapabilityGroup::Json, CapabilityGroup::Text]
        );
        assert_eq!(MetaGroup::Full.groups().len(), CapabilityGroup::ALL.len());
    }

    #[test]
    fn required_scope_by_tier() {
        assert_eq!(required_scope("read_query"), BaseScope::Read);
        assert_eq!(required_scope("write_query"), BaseScope::Write);
        assert_eq!(required_scope("vacuum_database"), BaseScope::Admin);
        assert_eq!(required_scope("not_a_tool"), BaseScope::Write);
    }

    #[test]
    fn group_serializes_snake_case() {
        let json = serde_json::to_string(&CapabilityGroup::Vector).unwrap();
        assert_eq!(json, "\"vector\"");
    }
}
