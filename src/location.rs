//! Best-effort device location for assistant queries
//!
//! A location lookup never blocks a turn for long and never fails it: the
//! caller gets either a hint string or a short notice explaining why the
//! query proceeds without one.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Whether both components are within their valid ranges
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Short form included in assistant requests
    #[must_use]
    pub fn hint(&self) -> String {
        format!("Lat: {:.2}, Lon: {:.2}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Why a location could not be determined
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable")]
    Unavailable,

    #[error("location request timed out")]
    Timeout,
}

impl LocationError {
    /// Notice shown to the user when a query goes out without location
    #[must_use]
    pub const fn notice(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Location permission denied. Proceeding without it.",
            Self::Unavailable => "Location information is unavailable. Proceeding without it.",
            Self::Timeout => "Location request timed out. Proceeding without it.",
        }
    }
}

/// Source of the device location
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Current position
    ///
    /// # Errors
    ///
    /// Returns error if the position cannot be determined
    async fn current(&self) -> Result<Coordinates, LocationError>;
}

/// Location configured up front
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// Provider for devices without positioning
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable)
    }
}

/// Outcome of a bounded location lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationLookup {
    Found(String),
    Skipped(LocationError),
}

impl LocationLookup {
    /// The hint to send, if one was found
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Found(hint) => Some(hint),
            Self::Skipped(_) => None,
        }
    }
}

/// Ask the provider for a location, giving up after `limit`
pub async fn lookup(provider: &dyn LocationProvider, limit: Duration) -> LocationLookup {
    match tokio::time::timeout(limit, provider.current()).await {
        Ok(Ok(coords)) => LocationLookup::Found(coords.hint()),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "location lookup failed");
            LocationLookup::Skipped(e)
        }
        Err(_) => {
            tracing::debug!(timeout_ms = limit.as_millis(), "location lookup timed out");
            LocationLookup::Skipped(LocationError::Timeout)
        }
    }
}
