use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use bastion_application::{DEFAULT_RETENTION_YEARS, ScopeEnforcementConfig};
use bastion_core::{AppError, TenantId};
use tracing_subscriber::EnvFilter;

const MASKING_SALT_MIN_LENGTH: usize = 16;

#[derive(Debug, Clone)]
pub struct AuditSinkConfig {
    pub urls: Vec<String>,
    pub timeout_ms: u64,
    pub max_attempts: u8,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: Option<String>,
    pub api_host: String,
    pub api_port: u16,
    pub scope: ScopeEnforcementConfig,
    pub masking_salt: String,
    pub default_retention_years: u16,
    pub fallback_path: PathBuf,
    pub sinks: AuditSinkConfig,
    pub dev_seed_tenants: Vec<TenantId>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        let mut config = Self::from_lookup(|name| env::var(name).ok())?;
        config.migrate_only = migrate_only;
        Ok(config)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let masking_salt = optional("AUDIT_MASKING_SALT")
            .ok_or_else(|| AppError::Validation("AUDIT_MASKING_SALT is required".to_owned()))?;
        if masking_salt.chars().count() < MASKING_SALT_MIN_LENGTH {
            return Err(AppError::Validation(format!(
                "AUDIT_MASKING_SALT must be at least {MASKING_SALT_MIN_LENGTH} characters"
            )));
        }

        let defaults = ScopeEnforcementConfig::default();
        let scope = ScopeEnforcementConfig {
            reason_min_length: parsed(&optional, "OVERRIDE_REASON_MIN_LENGTH")?
                .unwrap_or(defaults.reason_min_length),
            justification_min_length: parsed(&optional, "OVERRIDE_JUSTIFICATION_MIN_LENGTH")?
                .unwrap_or(defaults.justification_min_length),
            critical_path_prefixes: optional("CRITICAL_PATH_PREFIXES")
                .map(|value| comma_list(&value))
                .unwrap_or(defaults.critical_path_prefixes),
        };

        let dev_seed_tenants = optional("DEV_SEED_TENANTS")
            .map(|value| {
                comma_list(&value)
                    .into_iter()
                    .map(|tenant| {
                        TenantId::new(tenant).map_err(|error| {
                            AppError::Validation(format!("invalid DEV_SEED_TENANTS: {error}"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            migrate_only: false,
            database_url: optional("DATABASE_URL"),
            api_host: optional("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned()),
            api_port: parsed(&optional, "API_PORT")?.unwrap_or(3001),
            scope,
            masking_salt,
            default_retention_years: parsed(&optional, "AUDIT_DEFAULT_RETENTION_YEARS")?
                .unwrap_or(DEFAULT_RETENTION_YEARS),
            fallback_path: optional("AUDIT_FALLBACK_PATH")
                .map_or_else(|| PathBuf::from("audit-fallback.jsonl"), PathBuf::from),
            sinks: AuditSinkConfig {
                urls: optional("AUDIT_SINK_URLS")
                    .map(|value| comma_list(&value))
                    .unwrap_or_default(),
                timeout_ms: parsed(&optional, "AUDIT_SINK_TIMEOUT_MS")?.unwrap_or(2000),
                max_attempts: parsed(&optional, "AUDIT_SINK_MAX_ATTEMPTS")?.unwrap_or(3),
                retry_backoff_ms: parsed(&optional, "AUDIT_SINK_RETRY_BACKOFF_MS")?
                    .unwrap_or(200),
            },
            dev_seed_tenants,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parsed<T: FromStr>(
    optional: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, AppError>
where
    T::Err: std::fmt::Display,
{
    optional(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
        })
        .transpose()
}

fn comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
