use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DirectoryError, Result};

// ---------------------------------------------------------------------------
// Ranking scopes
// ---------------------------------------------------------------------------

/// Kind of region a ranking is computed within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeType {
    Regional,
    SubRegional,
}

impl ScopeType {
    pub const ALL: [ScopeType; 2] = [ScopeType::Regional, ScopeType::SubRegional];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regional => "regional",
            Self::SubRegional => "sub-regional",
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "regional" => Ok(Self::Regional),
            "sub-regional" => Ok(Self::SubRegional),
            other => Err(DirectoryError::invalid(format!("unknown scope type: {other:?}"))),
        }
    }
}

impl TryFrom<String> for ScopeType {
    type Error = DirectoryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// One ranking context: a scope type plus the region instance it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub scope_type: ScopeType,
    pub scope_id: i64,
}

impl Scope {
    pub fn new(scope_type: ScopeType, scope_id: i64) -> Self {
        Self {
            scope_type,
            scope_id,
        }
    }

    pub fn regional(scope_id: i64) -> Self {
        Self::new(ScopeType::Regional, scope_id)
    }

    pub fn sub_regional(scope_id: i64) -> Self {
        Self::new(ScopeType::SubRegional, scope_id)
    }

    /// Key used for the per-scope advisory lock.
    pub fn lock_key(&self) -> String {
        format!("rankings:{}:{}", self.scope_type, self.scope_id)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope_type, self.scope_id)
    }
}

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(DirectoryError::invalid(format!(
                "latitude out of range: {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(DirectoryError::invalid(format!(
                "longitude out of range: {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Both-or-neither: a location either has a full point or none.
    pub fn from_optional(latitude: Option<f64>, longitude: Option<f64>) -> Result<Option<Self>> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).map(Some),
            (None, None) => Ok(None),
            _ => Err(DirectoryError::invalid(
                "latitude and longitude must be provided together",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Input guards
// ---------------------------------------------------------------------------

pub fn require_positive_limit(limit: i64) -> Result<i64> {
    if limit <= 0 {
        return Err(DirectoryError::invalid(format!("limit must be positive, got {limit}")));
    }
    Ok(limit)
}

pub fn require_positive_radius(radius_miles: f64) -> Result<f64> {
    if !radius_miles.is_finite() || radius_miles <= 0.0 {
        return Err(DirectoryError::invalid(format!(
            "radius must be a positive number of miles, got {radius_miles}"
        )));
    }
    Ok(radius_miles)
}

pub fn require_finite_score(score: f64) -> Result<f64> {
    if !score.is_finite() {
        return Err(DirectoryError::invalid(format!("composite score must be finite, got {score}")));
    }
    Ok(score)
}
