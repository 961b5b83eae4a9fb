mod config;
mod error;

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use oauth::{AccessGate, TokenClaims};
use policy::capability::is_known;
use policy::{CapabilityFilter, CapabilityGroup, Resource, Scope, ScopeSet};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

const CONFIG_FILE: &str = "dbgate.toml";

#[derive(Parser)]
#[command(name = "dbgate")]
#[command(about = "Inspect the access-control layer of a database tool server", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which tools the capability filter enables
    Tools {
        /// Filter string to use instead of the configured one
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Explain what a scope string grants
    Scopes {
        /// Space-delimited scopes, e.g. "read db:sales"
        scope: String,
        /// Decide access to this tool
        #[arg(long)]
        tool: Option<String>,
        /// Database the call targets
        #[arg(long)]
        database: Option<String>,
        /// Table the call targets
        #[arg(long, requires = "database")]
        table: Option<String>,
    },
    /// Fetch authorization server metadata
    Discover {
        /// Issuer to query instead of the configured one
        #[arg(long)]
        issuer: Option<String>,
    },
    /// Print the protected resource metadata document
    ResourceMetadata,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Tools { filter } => {
            let filter = match filter {
                Some(raw) => CapabilityFilter::parse(Some(&raw)),
                None => config.capability_filter(),
            };
            cmd_tools(&filter);
            Ok(())
        }
        Commands::Scopes {
            scope,
            tool,
            database,
            table,
        } => {
            let resource = match (database, table) {
                (Some(db), Some(table)) => Some(Resource::table(db, table)),
                (Some(db), None) => Some(Resource::database(db)),
                (None, _) => None,
            };
            cmd_scopes(&config, &scope, tool.as_deref(), resource.as_ref());
            Ok(())
        }
        Commands::Discover { issuer } => cmd_discover(&config, issuer.as_deref()).await,
        Commands::ResourceMetadata => {
            let doc = config.resource_metadata()?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
    }
}

/// A missing default config file means defaults; a missing explicit one is an error.
fn load_config(path: &Path) -> Result<Config> {
    if path == Path::new(CONFIG_FILE) && !path.exists() {
        tracing::debug!("no {CONFIG_FILE} found, using defaults");
        return Ok(Config::default());
    }
    let config = Config::load(path)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn cmd_tools(filter: &CapabilityFilter) {
    let summary = filter.summary();
    let raw = if filter.raw().trim().is_empty() {
        "(none)"
    } else {
        filter.raw()
    };

    println!("Filter: {raw}");
    if summary.allow_all {
        println!("All {} capabilities enabled\n", summary.total);
    } else {
        println!("{} of {} capabilities enabled\n", summary.enabled, summary.total);
    }

    println!("{:<8}  {:<7}  CAPABILITIES", "GROUP", "ENABLED");
    println!("{}", "-".repeat(80));
    for group in &summary.groups {
        let enabled: Vec<_> = group
            .group
            .capabilities()
            .iter()
            .copied()
            .filter(|cap| filter.is_enabled(cap))
            .collect();
        let count = format!("{}/{}", group.enabled, group.total);
        println!("{:<8}  {count:<7}  {}", group.group.name(), enabled.join(", "));
    }

    let extra: Vec<_> = filter.enabled_capabilities().filter(|c| !is_known(c)).collect();
    if !extra.is_empty() {
        println!("\nOutside the catalog: {}", extra.join(", "));
    }
}

fn cmd_scopes(config: &Config, raw: &str, tool: Option<&str>, resource: Option<&Resource>) {
    let scopes = ScopeSet::parse(raw);
    if let Err(e) = scopes.validate() {
        tracing::warn!(error = %e, "scope string contains invalid scopes");
    }

    println!("{:<24}  KIND", "SCOPE");
    println!("{}", "-".repeat(40));
    for scope in scopes.iter() {
        println!("{:<24}  {}", scope.to_string(), scope_kind(scope));
    }

    let highest = scopes
        .highest_base()
        .map_or_else(|| "none".to_string(), |b| b.to_string());
    println!("\nHighest base scope: {highest}");

    let groups: Vec<_> = scopes
        .accessible_capability_groups()
        .into_iter()
        .map(CapabilityGroup::name)
        .collect();
    println!("Accessible groups: {}", list_or_none(&groups));

    let claims = inspection_claims(config, &scopes);
    let gate = AccessGate::new(&config.auth.realm);

    let filter = config.capability_filter();
    let accessible = gate.visible_capabilities(Some(&claims));
    let visible = accessible.iter().filter(|cap| filter.is_enabled(cap)).count();
    println!(
        "Accessible capabilities: {} ({visible} enabled by the filter)",
        accessible.len()
    );

    let Some(tool) = tool else {
        return;
    };

    let target = resource.map_or_else(String::new, |r| format!(" on {r}"));
    if !filter.is_enabled(tool) {
        println!("\n{tool}: disabled by the capability filter");
        return;
    }
    match gate.authorize(Some(&claims), tool, resource) {
        Ok(()) => println!("\n{tool}{target}: allowed"),
        Err(e) => {
            println!("\n{tool}{target}: denied ({e})");
            if let Some(challenge) = e.www_authenticate() {
                println!("WWW-Authenticate: {challenge}");
            }
        }
    }
}

/// Claims standing in for a token that carries `scopes`.
fn inspection_claims(config: &Config, scopes: &ScopeSet) -> TokenClaims {
    let now = Utc::now();
    TokenClaims {
        subject: "dbgate-cli".to_string(),
        scopes: scopes.to_strings(),
        expires_at: now + chrono::Duration::hours(1),
        issued_at: now,
        issuer: config.auth.issuer.clone().unwrap_or_default(),
        audience: Vec::new(),
    }
}

async fn cmd_discover(config: &Config, issuer: Option<&str>) -> Result<()> {
    let discovery = config.discovery(issuer)?;
    println!("Fetching {}", discovery.metadata_url());

    let metadata = discovery.discover().await?;
    println!("{}", serde_json::to_string_pretty(&*metadata)?);
    Ok(())
}

fn scope_kind(scope: &Scope) -> &'static str {
    match scope {
        Scope::Base(_) => "base",
        Scope::Database { .. } => "database",
        Scope::Table { .. } => "table",
        Scope::Invalid(_) => "invalid",
    }
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_requires_database() {
        let err = Cli::try_parse_from(["dbgate", "scopes", "read", "--table", "orders"]);
        assert!(err.is_err());

        let cli = Cli::try_parse_from([
            "dbgate", "scopes", "read db:sales", "--tool", "read_query", "--database", "sales",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Scopes { tool: Some(ref t), database: Some(ref d), table: None, .. }
                if t == "read_query" && d == "sales"
        ));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["dbgate", "tools", "-v", "--config", "other.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }

    #[test]
    fn scope_kinds() {
        let kinds: Vec<_> = ScopeSet::parse("read db:sales table:sales:orders bogus")
            .iter()
            .map(scope_kind)
            .collect();
        assert_eq!(kinds, ["base", "database", "table", "invalid"]);
    }

    #[test]
    fn inspection_claims_carry_scopes_in_order() {
        let config = Config::default();
        let claims = inspection_claims(&config, &ScopeSet::parse("db:sales read"));
        assert_eq!(claims.scopes, ["db:sales", "read"]);
        assert!(!claims.is_expired());

        let gate = AccessGate::new(&config.auth.realm);
        let visible = gate.visible_capabilities(Some(&claims));
        assert!(visible.contains("read_query"));
        assert!(!visible.contains("write_query"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let explicit = std::env::temp_dir().join("dbgate-cli-test-missing/absent.toml");
        assert!(matches!(
            load_config(&explicit),
            Err(error::Error::Config(config::ConfigError::Io(_)))
        ));
    }
}
