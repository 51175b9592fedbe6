//! Access token minting for the CNCjs server.
//!
//! CNCjs accepts a websocket only if its URL carries a JSON Web Token signed
//! with the server's secret.  The relay signs its own token at startup.
//!
//! # Where the secret comes from (for beginners)
//!
//! CNCjs stores its secret in `~/.cncrc`, a JSON file, under `"secret"`.
//! When the relay runs on the same machine as the server it can read the
//! secret from there.  Otherwise pass it explicitly (`--secret`) or through
//! the `CNCJS_SECRET` environment variable.  The lookup order is:
//!
//! 1. the explicit value (command line or settings file),
//! 2. `CNCJS_SECRET`,
//! 3. `~/.cncrc` (`%USERPROFILE%\.cncrc` on Windows).

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable holding the CNCjs secret.
pub const SECRET_ENV: &str = "CNCJS_SECRET";

/// Name the relay identifies itself with in the token.
pub const TOKEN_NAME: &str = "cncjs-pendant";

/// Error type for token minting.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No secret was found anywhere.
    #[error("no CNCjs secret found: pass --secret, set CNCJS_SECRET, or add \"secret\" to {path}")]
    MissingSecret { path: PathBuf },

    /// `~/.cncrc` exists but could not be read.
    #[error("failed to read {path}: {source}")]
    RcRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `~/.cncrc` is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    RcParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The lifetime string is not a number with an optional unit.
    #[error("invalid access token lifetime \"{0}\" (expected e.g. 30d, 12h, 90m or 45s)")]
    InvalidLifetime(String),

    /// Signing failed.
    #[error("failed to sign access token: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

/// Claims carried by the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub name: String,
    /// Issued at, seconds since the Unix epoch.
    pub iat: u64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

#[derive(Deserialize)]
struct CncRc {
    secret: Option<String>,
}

/// Parses a token lifetime such as `30d`, `12h`, `90m`, `45s`, `2w` or a
/// bare number of seconds.
pub fn parse_lifetime(text: &str) -> Result<Duration, AuthError> {
    let invalid = || AuthError::InvalidLifetime(text.to_string());
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let amount: u64 = number.parse().map_err(|_| invalid())?;
    let seconds_per_unit = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    amount
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Returns the location of the CNCjs settings file for the current user.
pub fn cncrc_path() -> Option<PathBuf> {
    let home = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(home).map(|dir| PathBuf::from(dir).join(".cncrc"))
}

/// Resolves the secret from the explicit value, the environment and
/// `~/.cncrc`, in that order.
pub fn resolve_secret(explicit: Option<&str>) -> Result<String, AuthError> {
    let rc = cncrc_path().unwrap_or_else(|| PathBuf::from(".cncrc"));
    resolve_secret_from(explicit, std::env::var(SECRET_ENV).ok().as_deref(), &rc)
}

/// [`resolve_secret`] with the environment value and rc path supplied.
pub fn resolve_secret_from(
    explicit: Option<&str>,
    env: Option<&str>,
    rc_path: &Path,
) -> Result<String, AuthError> {
    let non_empty = |s: &&str| !s.is_empty();
    if let Some(secret) = explicit.filter(non_empty).or(env.filter(non_empty)) {
        return Ok(secret.to_string());
    }

    debug!(path = %rc_path.display(), "reading secret from CNCjs settings");
    let text = match std::fs::read_to_string(rc_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AuthError::MissingSecret {
                path: rc_path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(AuthError::RcRead {
                path: rc_path.to_path_buf(),
                source,
            })
        }
    };
    let rc: CncRc = serde_json::from_str(&text).map_err(|source| AuthError::RcParse {
        path: rc_path.to_path_buf(),
        source,
    })?;
    rc.secret
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::MissingSecret {
            path: rc_path.to_path_buf(),
        })
}

/// Signs an HS256 access token valid for `lifetime` from now.
pub fn mint_token(secret: &str, lifetime: Duration) -> Result<String, AuthError> {
    let iat = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    mint_token_at(secret, iat, lifetime)
}

fn mint_token_at(secret: &str, iat: u64, lifetime: Duration) -> Result<String, AuthError> {
    let claims = Claims {
        id: String::new(),
        name: TOKEN_NAME.to_string(),
        iat,
        exp: iat.saturating_add(lifetime.as_secs()),
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
