use crate::Config;
use awsecssrv_cache::{memory::DEFAULT_LOCK_TTL, KeyFormat, DEFAULT_NAMESPACE};
use awsecssrv_core::{ServiceIdentity, Ttl};
use awsecssrv_ecs::{Profile, DEFAULT_PROFILE};
use awsecssrv_resolve::Config as ResolverConfig;
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use tracing::{debug, error};

/// The strings used to build a configuration.
pub trait Strings {
    /// Retrieves the value for the key `key`.
    ///
    /// `key` must be one of the `ENV_` values below.
    fn get(&self, key: &str) -> Result<Option<String>, EnvError>;
}

/// An implementation of `Strings` that reads the values from environment variables.
pub struct Env;

/// Errors produced when loading a `Config` struct.
#[derive(Clone, Debug, Error)]
pub enum EnvError {
    #[error("invalid environment variable")]
    InvalidEnvVar,
    #[error("no DEFAULT AWS profile configured")]
    NoDefaultProfile,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a valid duration")]
    NotADuration,
    #[error("not a number")]
    NotANumber,
    #[error("TTL must be a positive whole number of seconds, at most a week")]
    NotATtl,
    #[error("not a valid profile name")]
    NotAProfileName,
    #[error("not a valid cluster/service pair: {0}")]
    NotAService(String),
}

pub const ENV_CACHE_TTL: &str = "AWSECSSRV_CACHE_TTL";
pub const ENV_CACHE_NAMESPACE: &str = "AWSECSSRV_CACHE_NAMESPACE";
pub const ENV_CACHE_LOCK_TTL: &str = "AWSECSSRV_CACHE_LOCK_TTL";

/// A comma-separated list of AWS profile names.
///
/// Each profile `NAME` is configured by `AWSECSSRV_AWS_NAME_REGION`,
/// `AWSECSSRV_AWS_NAME_ACCESS_KEY_ID` and `AWSECSSRV_AWS_NAME_SECRET_ACCESS_KEY`.
pub const ENV_AWS_PROFILES: &str = "AWSECSSRV_AWS_PROFILES";

/// A comma-separated list of `cluster/service` pairs whose cache entries are
/// kept warm.
pub const ENV_WARM_SERVICES: &str = "AWSECSSRV_WARM_SERVICES";

const ENV_AWS_PREFIX: &str = "AWSECSSRV_AWS_";

// === impl Env ===

impl Strings for Env {
    fn get(&self, key: &str) -> Result<Option<String>, EnvError> {
        use std::env;

        match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => {
                error!("{key} is not encoded in Unicode");
                Err(EnvError::InvalidEnvVar)
            }
        }
    }
}

impl Env {
    pub fn try_config(&self) -> Result<Config, EnvError> {
        parse_config(self)
    }
}

// === Parsing ===

pub fn parse_config<S: Strings>(strings: &S) -> Result<Config, EnvError> {
    // Parse all the environment variables. `parse` will log any errors so
    // defer returning any errors until all of them have been parsed.
    let ttl = parse(strings, ENV_CACHE_TTL, parse_ttl);
    let namespace = strings.get(ENV_CACHE_NAMESPACE);
    let lock_ttl = parse(strings, ENV_CACHE_LOCK_TTL, parse_duration);
    let profile_names = parse(strings, ENV_AWS_PROFILES, parse_profile_names);
    let warm_services = parse(strings, ENV_WARM_SERVICES, parse_services);

    let profile_names = profile_names?.unwrap_or_else(|| vec![DEFAULT_PROFILE.to_string()]);
    if !profile_names.iter().any(|n| n == DEFAULT_PROFILE) {
        error!("{ENV_AWS_PROFILES} must include {DEFAULT_PROFILE}");
        return Err(EnvError::NoDefaultProfile);
    }
    let profiles = profile_names
        .iter()
        .map(|name| parse_profile(strings, name))
        .collect::<Vec<_>>()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let namespace = namespace?
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    let config = Config {
        resolver: ResolverConfig {
            ttl: ttl?.unwrap_or_default(),
            keys: KeyFormat::new(namespace),
        },
        lock_ttl: lock_ttl?.unwrap_or(DEFAULT_LOCK_TTL),
        profiles,
        warm_services: warm_services?.unwrap_or_default(),
    };
    debug!(?config, "Loaded configuration");
    Ok(config)
}

fn parse_profile<S: Strings>(strings: &S, name: &str) -> Result<Profile, EnvError> {
    let required = |field: &str| {
        let key = format!("{ENV_AWS_PREFIX}{name}_{field}");
        match strings.get(&key)? {
            Some(v) if !v.is_empty() => Ok(v),
            _ => {
                error!("{key} must be set");
                Err(EnvError::InvalidEnvVar)
            }
        }
    };

    let region = required("REGION");
    let access_key_id = required("ACCESS_KEY_ID");
    let secret_access_key = required("SECRET_ACCESS_KEY");
    Ok(Profile {
        name: name.to_string(),
        region: region?,
        access_key_id: access_key_id?,
        secret_access_key: secret_access_key?,
    })
}

pub(crate) fn parse<T, Parse>(
    strings: &dyn Strings,
    name: &str,
    parse: Parse,
) -> Result<Option<T>, EnvError>
where
    Parse: FnOnce(&str) -> Result<T, ParseError>,
{
    match strings.get(name)? {
        Some(ref s) => {
            let r = parse(s).map_err(|parse_error| {
                error!("{name}={s:?} is not valid: {parse_error}");
                EnvError::InvalidEnvVar
            })?;
            Ok(Some(r))
        }
        None => Ok(None),
    }
}

fn parse_number<T: FromStr>(s: &str) -> Result<T, ParseError> {
    s.parse().map_err(|_| ParseError::NotANumber)
}

pub(crate) fn parse_duration(s: &str) -> Result<Duration, ParseError> {
    use regex::Regex;

    let re = Regex::new(r"^\s*(\d+)(ms|s|m|h|d)?\s*$").map_err(|_| ParseError::NotADuration)?;
    let cap = re.captures(s).ok_or(ParseError::NotADuration)?;

    let magnitude: u64 = parse_number(&cap[1])?;
    let secs = |per: u64| {
        magnitude
            .checked_mul(per)
            .map(Duration::from_secs)
            .ok_or(ParseError::NotADuration)
    };
    match cap.get(2).map(|m| m.as_str()) {
        None if magnitude == 0 => Ok(Duration::from_secs(0)),
        Some("ms") => Ok(Duration::from_millis(magnitude)),
        Some("s") => secs(1),
        Some("m") => secs(60),
        Some("h") => secs(60 * 60),
        Some("d") => secs(60 * 60 * 24),
        _ => Err(ParseError::NotADuration),
    }
}

/// TTLs are stored by whole seconds, so sub-second precision is rejected
/// rather than truncated.
fn parse_ttl(s: &str) -> Result<Ttl, ParseError> {
    let d = parse_duration(s)?;
    if d.subsec_nanos() != 0 {
        return Err(ParseError::NotATtl);
    }
    Ttl::from_secs(d.as_secs()).ok_or(ParseError::NotATtl)
}

fn parse_profile_names(s: &str) -> Result<Vec<String>, ParseError> {
    let mut names = Vec::new();
    for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let valid = name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(ParseError::NotAProfileName);
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn parse_services(s: &str) -> Result<Vec<ServiceIdentity>, ParseError> {
    s.split(',')
        .map(str::trim)
        .filter(|svc| !svc.is_empty())
        .map(|svc| match svc.split_once('/') {
            Some((cluster, name))
                if !cluster.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(ServiceIdentity::new(cluster, name))
            }
            _ => Err(ParseError::NotAService(svc.to_string())),
        })
        .collect()
}

#[cfg(test)]
impl Strings for std::collections::HashMap<&'static str, &'static str> {
    fn get(&self, key: &str) -> Result<Option<String>, EnvError> {
        Ok(self.get(key).map(ToString::to_string))
    }
}
