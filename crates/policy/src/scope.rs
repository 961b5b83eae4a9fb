//! Permission scopes and the scope hierarchy.
//!
//! Base scopes (`read`, `write`, `admin`) gate capability categories and imply
//! each other in that order. Resource scopes (`db:NAME`, `table:DB:TABLE`)
//! narrow which data a caller may touch but never unlock a capability on
//! their own.
//!
//! Base scopes are *not* narrowed by resource scopes: a token carrying `read`
//! may address every database and table, even when it also carries `db:x`.

use crate::capability::{self, CapabilityGroup};
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static DATABASE_SCOPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^db:([A-Za-z0-9_-]+)$").expect("database scope pattern is valid")
});

static TABLE_SCOPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^table:([A-Za-z0-9_-]+):([A-Za-z0-9_-]+)$").expect("table scope pattern is valid")
});

/// Base scopes advertised to clients.
pub const SUPPORTED_SCOPES: [&str; 3] = ["read", "write", "admin"];

/// A capability tier. Ordered so that `Admin > Write > Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseScope {
    Read,
    Write,
    Admin,
}

impl BaseScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    /// Whether holding `self` also confers `other`.
    pub fn implies(self, other: BaseScope) -> bool {
        self >= other
    }
}

impl fmt::Display for BaseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified scope string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Base(BaseScope),
    Database { name: String },
    Table { database: String, table: String },
    /// Anything else. Kept verbatim so it can be reported back to the caller.
    Invalid(String),
}

impl Scope {
    /// Classify a raw scope string. Never fails; unknown input is `Invalid`.
    pub fn classify(raw: &str) -> Self {
        match raw {
            "read" => return Self::Base(BaseScope::Read),
            "write" => return Self::Base(BaseScope::Write),
            "admin" => return Self::Base(BaseScope::Admin),
            _ => {}
        }

        if let Some(caps) = DATABASE_SCOPE.captures(raw) {
            return Self::Database {
                name: caps[1].to_string(),
            };
        }

        if let Some(caps) = TABLE_SCOPE.captures(raw) {
            return Self::Table {
                database: caps[1].to_string(),
                table: caps[2].to_string(),
            };
        }

        Self::Invalid(raw.to_string())
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }

    pub fn base(&self) -> Option<BaseScope> {
        match self {
            Self::Base(base) => Some(*base),
            _ => None,
        }
    }

    /// Whether this scope alone unlocks the named capability.
    pub fn grants_capability(&self, capability: &str) -> bool {
        match self {
            Self::Base(BaseScope::Admin) => true,
            Self::Base(BaseScope::Write) => !capability::is_admin_only(capability),
            Self::Base(BaseScope::Read) => capability::is_read_only(capability),
            Self::Database { .. } | Self::Table { .. } | Self::Invalid(_) => false,
        }
    }

    pub fn grants_database(&self, database: &str) -> bool {
        match self {
            Self::Base(_) => true,
            Self::Database { name } => name == database,
            Self::Table { .. } | Self::Invalid(_) => false,
        }
    }

    /// A `db:` scope covers every table in its database.
    pub fn grants_table(&self, database: &str, table: &str) -> bool {
        match self {
            Self::Base(_) => true,
            Self::Database { name } => name == database,
            Self::Table {
                database: db,
                table: t,
            } => db == database && t == table,
            Self::Invalid(_) => false,
        }
    }

    pub fn grants_resource(&self, resource: &Resource) -> bool {
        match resource {
            Resource::Database(db) => self.grants_database(db),
            Resource::Table { database, table } => self.grants_table(database, table),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(base) => write!(f, "{base}"),
            Self::Database { name } => write!(f, "db:{name}"),
            Self::Table { database, table } => write!(f, "table:{database}:{table}"),
            Self::Invalid(raw) => f.write_str(raw),
        }
    }
}

impl FromStr for Scope {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::classify(s))
    }
}

/// A data resource a capability call targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Database(String),
    Table { database: String, table: String },
}

impl Resource {
    pub fn database(name: impl Into<String>) -> Self {
        Self::Database(name.into())
    }

    pub fn table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Table {
            database: database.into(),
            table: table.into(),
        }
    }

    /// The narrowest scope that would grant this resource.
    pub fn required_scope(&self) -> Scope {
        match self {
            Self::Database(name) => Scope::Database { name: name.clone() },
            Self::Table { database, table } => Scope::Table {
                database: database.clone(),
                table: table.clone(),
            },
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(name) => f.write_str(name),
            Self::Table { database, table } => write!(f, "{database}.{table}"),
        }
    }
}

/// The ordered set of scopes a caller presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    scopes: Vec<Scope>,
}

impl ScopeSet {
    /// Parse a space-delimited scope string, skipping empty tokens.
    pub fn parse(raw: &str) -> Self {
        raw.split_whitespace().map(Scope::classify).collect()
    }

    pub fn from_strings<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        scopes
            .into_iter()
            .filter(|s| !s.as_ref().trim().is_empty())
            .map(|s| Scope::classify(s.as_ref().trim()))
            .collect()
    }

    /// Reject the set if any scope failed to classify.
    pub fn validate(&self) -> Result<()> {
        match self.scopes.iter().find(|s| !s.is_valid()) {
            Some(invalid) => Err(Error::InvalidScope(invalid.to_string())),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// The strongest base scope present, if any.
    pub fn highest_base(&self) -> Option<BaseScope> {
        self.scopes.iter().filter_map(Scope::base).max()
    }

    pub fn has_read(&self) -> bool {
        self.holds(BaseScope::Read)
    }

    pub fn has_write(&self) -> bool {
        self.holds(BaseScope::Write)
    }

    pub fn has_admin(&self) -> bool {
        self.holds(BaseScope::Admin)
    }

    fn holds(&self, wanted: BaseScope) -> bool {
        self.highest_base().is_some_and(|b| b.implies(wanted))
    }

    pub fn grants_capability(&self, capability: &str) -> bool {
        self.scopes.iter().any(|s| s.grants_capability(capability))
    }

    pub fn grants_database(&self, database: &str) -> bool {
        self.scopes.iter().any(|s| s.grants_database(database))
    }

    pub fn grants_table(&self, database: &str, table: &str) -> bool {
        self.scopes.iter().any(|s| s.grants_table(database, table))
    }

    pub fn grants_resource(&self, resource: &Resource) -> bool {
        self.scopes.iter().any(|s| s.grants_resource(resource))
    }

    /// Groups visible to the holder of these scopes.
    pub fn accessible_capability_groups(&self) -> BTreeSet<CapabilityGroup> {
        let Some(highest) = self.highest_base() else {
            return BTreeSet::new();
        };
        CapabilityGroup::ALL
            .into_iter()
            .filter(|g| highest.implies(g.tier()))
            .collect()
    }

    /// Capabilities the holder may invoke.
    pub fn accessible_capabilities(&self) -> BTreeSet<&'static str> {
        let read_only = self.has_read() && !self.has_write();
        self.accessible_capability_groups()
            .into_iter()
            .flat_map(|g| g.capabilities().iter().copied())
            .filter(|c| !read_only || capability::is_read_only(c))
            .collect()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.scopes.iter().map(ToString::to_string).collect()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = Scope>>(iter: T) -> Self {
        Self {
            scopes: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_strings().join(" "))
    }
}
