//! Deployment-time capability filter.
//!
//! A filter string is a comma-separated list of rules applied left to right:
//!
//! ```text
//! -admin,+vacuum_database     everything except the admin group, but keep vacuum
//! starter,-fts_create_index   only core+json+text, minus one tool
//! ```
//!
//! `-name` excludes and `+name` includes a capability, a group, or a meta-group.
//! An empty filter allows everything, including names the catalog does not
//! know about. A non-empty filter starts from the full catalog, unless its
//! first rule is a bare group or meta-group name, in which case it starts
//! from nothing and includes only that target.

use crate::capability::{self, CapabilityGroup, MetaGroup};
use serde::Serialize;
use std::collections::BTreeSet;

/// Environment variable holding the filter string.
pub const FILTER_ENV_VAR: &str = "DBGATE_TOOL_FILTER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Include,
    Exclude,
}

/// One parsed filter rule. Meta-groups are expanded to one rule per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterRule {
    pub kind: RuleKind,
    pub target: String,
    pub is_group: bool,
}

/// The set of capabilities a filter leaves enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enabled {
    /// No filter configured.
    AllowAll,
    /// An explicit filter; may well be empty.
    Only(BTreeSet<String>),
}

/// A parsed, immutable capability filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityFilter {
    raw: String,
    rules: Vec<FilterRule>,
    enabled: Enabled,
}

enum Target {
    Meta(MetaGroup),
    Group(CapabilityGroup),
    Capability(String),
}

impl Target {
    fn resolve(name: &str) -> Self {
        if let Some(meta) = MetaGroup::from_name(name) {
            Self::Meta(meta)
        } else if let Some(group) = CapabilityGroup::from_name(name) {
            Self::Group(group)
        } else {
            Self::Capability(name.to_string())
        }
    }

    fn is_group_like(&self) -> bool {
        !matches!(self, Self::Capability(_))
    }

    fn into_rules(self, kind: RuleKind) -> Vec<FilterRule> {
        match self {
            Self::Meta(meta) => meta
                .groups()
                .iter()
                .map(|g| FilterRule {
                    kind,
                    target: g.name().to_string(),
                    is_group: true,
                })
                .collect(),
            Self::Group(group) => vec![FilterRule {
                kind,
                target: group.name().to_string(),
                is_group: true,
            }],
            Self::Capability(name) => vec![FilterRule {
                kind,
                target: name,
                is_group: false,
            }],
        }
    }
}

impl Default for CapabilityFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl CapabilityFilter {
    /// A filter that enables every capability.
    pub fn allow_all() -> Self {
        Self {
            raw: String::new(),
            rules: Vec::new(),
            enabled: Enabled::AllowAll,
        }
    }

    /// Parse a filter string. `None`, `""` and whitespace-only input allow all.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Self::allow_all();
        }

        let mut tokens = raw.split(',').map(str::trim).filter(|t| !t.is_empty()).peekable();
        let mut rules = Vec::new();

        let whitelist = tokens.peek().and_then(|first| {
            if first.starts_with(['+', '-']) {
                return None;
            }
            let target = Target::resolve(first);
            target.is_group_like().then_some(target)
        });

        let mut enabled: BTreeSet<String> = match whitelist {
            Some(target) => {
                tokens.next();
                rules.extend(target.into_rules(RuleKind::Include));
                BTreeSet::new()
            }
            None => capability::all_capabilities().map(str::to_string).collect(),
        };

        for token in tokens {
            let (kind, name) = if let Some(name) = token.strip_prefix('-') {
                (RuleKind::Exclude, name.trim())
            } else if let Some(name) = token.strip_prefix('+') {
                (RuleKind::Include, name.trim())
            } else {
                tracing::warn!(token = %token, "ignoring capability filter rule without +/- prefix");
                continue;
            };
            if name.is_empty() {
                tracing::warn!(token = %token, "ignoring capability filter rule without a target");
                continue;
            }
            rules.extend(Target::resolve(name).into_rules(kind));
        }

        for rule in &rules {
            apply(&mut enabled, rule);
        }

        Self {
            raw: raw.to_string(),
            rules,
            enabled: Enabled::Only(enabled),
        }
    }

    /// Read the filter from [`FILTER_ENV_VAR`].
    pub fn from_env() -> Self {
        Self::parse(std::env::var(FILTER_ENV_VAR).ok().as_deref())
    }

    /// The filter string as configured (trimmed). Empty means allow-all.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn enabled(&self) -> &Enabled {
        &self.enabled
    }

    pub fn is_allow_all(&self) -> bool {
        matches!(self.enabled, Enabled::AllowAll)
    }

    /// The explicitly enabled names; empty for an allow-all filter.
    pub fn enabled_capabilities(&self) -> impl Iterator<Item = &str> {
        let set = match &self.enabled {
            Enabled::AllowAll => None,
            Enabled::Only(set) => Some(set),
        };
        set.into_iter().flatten().map(String::as_str)
    }

    pub fn is_enabled(&self, capability: &str) -> bool {
        match &self.enabled {
            Enabled::AllowAll => true,
            Enabled::Only(set) => set.contains(capability),
        }
    }

    /// Per-group counts for startup logging.
    pub fn summary(&self) -> FilterSummary {
        let groups: Vec<GroupSummary> = CapabilityGroup::ALL
            .into_iter()
            .map(|group| GroupSummary {
                group,
                enabled: group
                    .capabilities()
                    .iter()
                    .filter(|c| self.is_enabled(c))
                    .count(),
                total: group.capabilities().len(),
            })
            .collect();

        FilterSummary {
            allow_all: self.is_allow_all(),
            enabled: groups.iter().map(|g| g.enabled).sum(),
            total: groups.iter().map(|g| g.total).sum(),
            groups,
        }
    }
}

fn apply(enabled: &mut BTreeSet<String>, rule: &FilterRule) {
    let targets: Vec<&str> = if rule.is_group {
        CapabilityGroup::from_name(&rule.target)
            .map(|g| g.capabilities().to_vec())
            .unwrap_or_default()
    } else {
        vec![rule.target.as_str()]
    };

    for name in targets {
        match rule.kind {
            RuleKind::Include => {
                enabled.insert(name.to_string());
            }
            RuleKind::Exclude => {
                enabled.remove(name);
            }
        }
    }
}

/// Enabled/total counts for one group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub group: CapabilityGroup,
    pub enabled: usize,
    pub total: usize,
}

/// Catalog-wide view of a filter's effect.
#[derive(Debug, Clone, Serialize)]
pub struct FilterSummary {
    pub allow_all: bool,
    pub enabled: usize,
    pub total: usize,
    pub groups: Vec<GroupSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScopeSet;
    use crate::capability::{READ_ONLY_CAPABILITIES, all_capabilities};

    fn filter(raw: &str) -> CapabilityFilter {
        CapabilityFilter::parse(Some(raw))
    }

    #[test]
    fn absent_and_empty_filters_allow_everything() {
        for f in [CapabilityFilter::parse(None), filter(""), filter("   ")] {
            assert!(f.is_allow_all());
            assert_eq!(f.raw(), "");
            assert_eq!(f.enabled_capabilities().count(), 0);
            assert!(f.is_enabled("read_query"));
            assert!(f.is_enabled("some_tool_nobody_heard_of"));
        }
    }

    #[test]
    fn explicit_filter_that_excludes_everything_is_not_allow_all() {
        let f = filter("-full");
        assert!(!f.is_allow_all());
        assert_eq!(f.enabled_capabilities().count(), 0);
        assert!(!f.is_enabled("read_query"));
        assert!(!f.is_enabled("some_tool_nobody_heard_of"));
    }

    #[test]
    fn exclude_group() {
        let f = filter("-core");
        assert!(!f.is_enabled("read_query"));
        assert!(!f.is_enabled("write_query"));
        assert!(f.is_enabled("json_extract"));
    }

    #[test]
    fn later_rules_override_earlier_ones() {
        let f = filter("-admin,+vacuum_database");
        for name in CapabilityGroup::Admin.capabilities() {
            assert_eq!(f.is_enabled(name), *name == "vacuum_database", "{name}");
        }
        assert!(f.is_enabled("read_query"));

        let f = filter("+vacuum_database,-admin");
        assert!(!f.is_enabled("vacuum_database"));
    }

    #[test]
    fn rules_are_recorded_in_order() {
        let f = filter("-admin, +vacuum_database");
        assert_eq!(
            f.rules(),
            &[
                FilterRule {
                    kind: RuleKind::Exclude,
                    target: "admin".into(),
                    is_group: true
                },
                FilterRule {
                    kind: RuleKind::Include,
                    target: "vacuum_database".into(),
                    is_group: false
                },
            ]
        );
    }

    #[test]
    fn unknown_targets_are_recorded_but_change_nothing() {
        let f = filter("-no_such_tool");
        assert_eq!(f.rules().len(), 1);
        assert!(!f.rules()[0].is_group);
        assert_eq!(f.enabled_capabilities().count(), all_capabilities().count());
    }

    #[test]
    fn including_an_unknown_name_enables_it() {
        let f = filter("-full,+custom_report");
        assert!(f.is_enabled("custom_report"));
        assert_eq!(f.enabled_capabilities().collect::<Vec<_>>(), vec!["custom_report"]);
    }

    #[test]
    fn empty_and_unprefixed_tokens_are_ignored() {
        let f = filter("-json,,read_query, ,+");
        assert_eq!(f.rules().len(), 1);
        assert!(f.is_enabled("read_query"));
        assert!(!f.is_enabled("json_extract"));
    }

    #[test]
    fn meta_groups_expand_to_one_rule_per_group() {
        let f = filter("-starter");
        let targets: Vec<_> = f.rules().iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["core", "json", "text"]);
        assert!(f.rules().iter().all(|r| r.is_group && r.kind == RuleKind::Exclude));
        assert!(f.is_enabled("stats_summary"));
        assert!(!f.is_enabled("fts_search"));
    }

    #[test]
    fn bare_meta_group_first_selects_only_its_groups() {
        let f = filter("starter");
        let expected: BTreeSet<&str> = MetaGroup::Starter
            .groups()
            .iter()
            .flat_map(|g| g.capabilities().iter().copied())
            .collect();
        let enabled: BTreeSet<&str> = f.enabled_capabilities().collect();
        assert_eq!(enabled, expected);
    }

    #[test]
    fn bare_group_first_can_be_refined() {
        let f = filter("core,+json_extract,-drop_table");
        assert!(f.is_enabled("read_query"));
        assert!(f.is_enabled("json_extract"));
        assert!(!f.is_enabled("json_query"));
        assert!(!f.is_enabled("drop_table"));
    }

    #[test]
    fn bare_capability_first_does_not_switch_to_whitelist() {
        let f = filter("read_query,-admin");
        assert!(f.is_enabled("write_query"));
        assert!(!f.is_enabled("vacuum_database"));
    }

    #[test]
    fn starter_filter_combined_with_read_scope() {
        let f = filter("starter");
        let scopes = ScopeSet::parse("read");

        let effective: BTreeSet<&str> = scopes
            .accessible_capabilities()
            .into_iter()
            .filter(|c| f.is_enabled(c))
            .collect();

        let expected: BTreeSet<&str> = MetaGroup::Starter
            .groups()
            .iter()
            .flat_map(|g| g.capabilities().iter().copied())
            .filter(|c| READ_ONLY_CAPABILITIES.contains(c))
            .collect();

        assert_eq!(effective, expected);
        assert!(effective.contains("read_query"));
        assert!(!effective.contains("write_query"));
        assert!(!effective.contains("stats_summary"));
    }

    #[test]
    fn summary_counts() {
        let summary = filter("-admin,+vacuum_database").summary();
        assert!(!summary.allow_all);
        assert_eq!(summary.total, all_capabilities().count());
        let admin = summary
            .groups
            .iter()
            .find(|g| g.group == CapabilityGroup::Admin)
            .unwrap();
        assert_eq!(admin.enabled, 1);
        assert_eq!(summary.enabled, summary.total - admin.total + 1);

        let all = CapabilityFilter::allow_all().summary();
        assert!(all.allow_all);
        assert_eq!(all.enabled, all.total);
    }
}
