//! Internal domain models for the catalog service.
//!
//! All API responses get converted into these types (or into
//! [`crate::model::Track`]) via the adapter.

use std::time::Duration;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    /// First profile image, if any
    pub image_url: Option<String>,
    /// Account tier ("premium", "free", ...) when the API reports it
    pub product: Option<String>,
}

impl UserProfile {
    /// Whether remote device playback is available for this account.
    ///
    /// `None` when the tier is unknown.
    pub fn has_premium(&self) -> Option<bool> {
        self.product.as_deref().map(|p| p.eq_ignore_ascii_case("premium"))
    }
}

/// A playback device registered with the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// Current playback state as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackSnapshot {
    pub device_id: Option<String>,
    pub track_uri: Option<String>,
    pub position: Duration,
    pub duration: Duration,
    pub is_playing: bool,
}

/// Errors from the catalog/playback API
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Not authorized - the token is missing, expired or revoked")]
    Unauthorized,

    #[error("Forbidden: {message}")]
    Forbidden {
        reason: Option<String>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl CatalogError {
    /// True when the account tier does not allow the requested command.
    pub fn is_premium_required(&self) -> bool {
        match self {
            CatalogError::Forbidden { reason, message } => {
                reason.as_deref() == Some("PREMIUM_REQUIRED")
                    || message.to_ascii_lowercase().contains("premium")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_required_detection() {
        let by_reason = CatalogError::Forbidden {
            reason: Some("PREMIUM_REQUIRED".into()),
            message: "Player command failed".into(),
        };
        assert!(by_reason.is_premium_required());

        let by_message = CatalogError::Forbidden {
            reason: None,
            message: "Player command failed: Premium required".into(),
        };
        assert!(by_message.is_premium_required());

        let other = CatalogError::Forbidden {
            reason: Some("UNKNOWN".into()),
            message: "Restricted device".into(),
        };
        assert!(!other.is_premium_required());
        assert!(!CatalogError::Unauthorized.is_premium_required());
    }

    #[test]
    fn test_has_premium() {
        let mut user = UserProfile {
            id: "u".into(),
            display_name: "U".into(),
            image_url: None,
            product: None,
        };
        assert_eq!(user.has_premium(), None);
        user.product = Some("free".into());
        assert_eq!(user.has_premium(), Some(false));
        user.product = Some("premium".into());
        assert_eq!(user.has_premium(), Some(true));
    }
}
