//! Personal access token records and the values derived from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

// ── Scope ────────────────────────────────────────────────────

/// Authorization tier of a PAT. Ordered by privilege: `Admin ⊇ Write ⊇ ReadOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatScope {
    ReadOnly,
    Write,
    Admin,
}

impl PatScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatScope::ReadOnly => "READ_ONLY",
            PatScope::Write => "WRITE",
            PatScope::Admin => "ADMIN",
        }
    }

    /// True if a credential carrying `self` may act where `required` is demanded.
    pub fn grants(&self, required: PatScope) -> bool {
        *self >= required
    }
}

impl fmt::Display for PatScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PatScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "READ_ONLY" => Ok(PatScope::ReadOnly),
            "WRITE" => Ok(PatScope::Write),
            "ADMIN" => Ok(PatScope::Admin),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

// ── Provenance ───────────────────────────────────────────────

/// Principal that caused a PAT to be issued.
///
/// Stored as text: `SYSTEM`, `OPERATOR`, `user:<uuid>` or `pat:<uuid>`.
/// `System` is reserved for the bootstrap credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreatedBy {
    System,
    Operator,
    User(Uuid),
    Token(Uuid),
}

impl CreatedBy {
    pub const SYSTEM: &'static str = "SYSTEM";
    pub const OPERATOR: &'static str = "OPERATOR";

    pub fn is_system(&self) -> bool {
        matches!(self, CreatedBy::System)
    }
}

impl fmt::Display for CreatedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatedBy::System => f.write_str(Self::SYSTEM),
            CreatedBy::Operator => f.write_str(Self::OPERATOR),
            CreatedBy::User(id) => write!(f, "user:{}", id),
            CreatedBy::Token(id) => write!(f, "pat:{}", id),
        }
    }
}

impl FromStr for CreatedBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::SYSTEM => return Ok(CreatedBy::System),
            Self::OPERATOR => return Ok(CreatedBy::Operator),
            _ => {}
        }
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("unrecognised principal '{}'", s))?;
        let id = Uuid::parse_str(id).map_err(|e| format!("bad principal id: {}", e))?;
        match kind {
            "user" => Ok(CreatedBy::User(id)),
            "pat" => Ok(CreatedBy::Token(id)),
            _ => Err(format!("unrecognised principal kind '{}'", kind)),
        }
    }
}

impl Serialize for CreatedBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Record ───────────────────────────────────────────────────

/// A stored personal access token. Holds only the hash of the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalAccessToken {
    pub id: Uuid,
    pub name: String,
    pub public_identifier: String,
    pub secret_hash: String,
    pub scope: PatScope,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: CreatedBy,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatStatus {
    Active,
    Revoked,
    Expired,
}

impl PatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatStatus::Active => "ACTIVE",
            PatStatus::Revoked => "REVOKED",
            PatStatus::Expired => "EXPIRED",
        }
    }
}

impl PersonalAccessToken {
    pub fn is_bootstrap(&self) -> bool {
        self.created_by.is_system()
    }

    /// Expired once `now` reaches `expires_at`; a token without expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    /// Revocation wins over expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> PatStatus {
        if self.revoked {
            PatStatus::Revoked
        } else if self.is_expired_at(now) {
            PatStatus::Expired
        } else {
            PatStatus::Active
        }
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> PatSummary {
        PatSummary {
            id: self.id,
            name: self.name.clone(),
            public_identifier: self.public_identifier.clone(),
            scope: self.scope,
            expires_at: self.expires_at,
            created_by: self.created_by,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            revoked: self.revoked,
            status: self.status_at(now),
        }
    }
}

/// Outward-facing view of a PAT. Never carries the hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatSummary {
    pub id: Uuid,
    pub name: String,
    pub public_identifier: String,
    pub scope: PatScope,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: CreatedBy,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub status: PatStatus,
}

// ── Listing filter ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatFilter {
    All,
    Active,
    Revoked,
    Expired,
    ByCreator(CreatedBy),
}

impl PatFilter {
    /// Build a filter from the `filter` / `created_by` query pair.
    pub fn parse(filter: Option<&str>, created_by: Option<&str>) -> Result<Self, String> {
        match filter.map(|f| f.trim().to_ascii_uppercase()).as_deref() {
            None | Some("") | Some("ALL") => Ok(PatFilter::All),
            Some("ACTIVE") => Ok(PatFilter::Active),
            Some("REVOKED") => Ok(PatFilter::Revoked),
            Some("EXPIRED") => Ok(PatFilter::Expired),
            Some("BY_CREATOR") => {
                let creator = created_by
                    .ok_or_else(|| "BY_CREATOR requires created_by".to_string())?
                    .parse::<CreatedBy>()?;
                Ok(PatFilter::ByCreator(creator))
            }
            Some(other) => Err(format!("unknown filter '{}'", other)),
        }
    }

    pub fn matches(&self, pat: &PersonalAccessToken, now: DateTime<Utc>) -> bool {
        match self {
            PatFilter::All => true,
            PatFilter::Active => pat.status_at(now) == PatStatus::Active,
            PatFilter::Revoked => pat.revoked,
            PatFilter::Expired => pat.status_at(now) == PatStatus::Expired,
            PatFilter::ByCreator(creator) => pat.created_by == *creator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pat(expires_at: Option<DateTime<Utc>>, revoked: bool) -> PersonalAccessToken {
        PersonalAccessToken {
            id: Uuid::new_v4(),
            name: "ci-bot".into(),
            public_identifier: "0123456789abcdef0123456789abcdef".into(),
            secret_hash: "$argon2id$stub".into(),
            scope: PatScope::Write,
            expires_at,
            created_by: CreatedBy::Operator,
            created_at: Utc::now(),
            last_used_at: None,
            revoked,
        }
    }

    #[test]
    fn test_scope_ordering() {
        assert!(PatScope::Admin.grants(PatScope::Write));
        assert!(PatScope::Admin.grants(PatScope::ReadOnly));
        assert!(PatScope::Write.grants(PatScope::ReadOnly));
        assert!(PatScope::ReadOnly.grants(PatScope::ReadOnly));
        assert!(!PatScope::ReadOnly.grants(PatScope::Write));
        assert!(!PatScope::Write.grants(PatScope::Admin));
    }

    #[test]
    fn test_scope_parse_is_lenient_on_case_and_dash() {
        assert_eq!("read-only".parse::<PatScope>().unwrap(), PatScope::ReadOnly);
        assert_eq!("Admin".parse::<PatScope>().unwrap(), PatScope::Admin);
        assert!("superuser".parse::<PatScope>().is_err());
    }

    #[test]
    fn test_created_by_text_form() {
        let id = Uuid::new_v4();
        for principal in [
            CreatedBy::System,
            CreatedBy::Operator,
            CreatedBy::User(id),
            CreatedBy::Token(id),
        ] {
            assert_eq!(principal.to_string().parse::<CreatedBy>().unwrap(), principal);
        }
        assert!("group:abc".parse::<CreatedBy>().is_err());
        assert!("user:not-a-uuid".parse::<CreatedBy>().is_err());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let p = pat(Some(now), false);
        assert!(p.is_expired_at(now));
        assert!(!p.is_expired_at(now - Duration::seconds(1)));
        assert!(!pat(None, false).is_expired_at(now + Duration::days(10_000)));
    }

    #[test]
    fn test_revoked_status_wins_over_expired() {
        let now = Utc::now();
        let p = pat(Some(now - Duration::hours(1)), true);
        assert_eq!(p.status_at(now), PatStatus::Revoked);
        assert!(!p.is_usable_at(now));
    }

    #[test]
    fn test_summary_omits_hash() {
        let json = serde_json::to_value(pat(None, false).summary_at(Utc::now())).unwrap();
        assert!(json.get("secretHash").is_none());
        assert_eq!(json["scope"], "WRITE");
        assert_eq!(json["createdBy"], "OPERATOR");
        assert_eq!(json["status"], "ACTIVE");
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(PatFilter::parse(None, None).unwrap(), PatFilter::All);
        assert_eq!(PatFilter::parse(Some("expired"), None).unwrap(), PatFilter::Expired);
        assert_eq!(
            PatFilter::parse(Some("BY_CREATOR"), Some("SYSTEM")).unwrap(),
            PatFilter::ByCreator(CreatedBy::System)
        );
        assert!(PatFilter::parse(Some("BY_CREATOR"), None).is_err());
        assert!(PatFilter::parse(Some("NEWEST"), None).is_err());
    }
}
