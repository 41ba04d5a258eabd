//! The APNs `reason` table for non-2xx responses.
//!
//! A non-2xx response carries a JSON body `{"reason": "<Name>"}`; [`ApnsReason::parse`]
//! maps the exact spelling to a typed variant, falling back to [`ApnsReason::Unknown`]
//! for anything APNs adds later that this table doesn't yet know about.

use std::fmt;

/// A typed APNs error reason, preserving the exact wire spelling for anything
/// this table doesn't recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApnsReason {
    BadCollapseId,
    BadDeviceToken,
    BadExpirationDate,
    BadMessageId,
    BadPriority,
    BadTopic,
    DeviceTokenNotForTopic,
    DuplicateHeaders,
    IdleTimeout,
    MissingDeviceToken,
    MissingTopic,
    PayloadEmpty,
    TopicDisallowed,
    BadCertificate,
    BadCertificateEnvironment,
    ExpiredProviderToken,
    Forbidden,
    InvalidProviderToken,
    MissingProviderToken,
    BadPath,
    MethodNotAllowed,
    Unregistered,
    PayloadTooLarge,
    TooManyProviderTokenUpdates,
    TooManyRequests,
    InternalServerError,
    ServiceUnavailable,
    Shutdown,
    /// A reason APNs returned that isn't in the table above, carried verbatim.
    Unknown(String),
}

impl ApnsReason {
    pub(crate) fn parse(reason: &str) -> ApnsReason {
        match reason {
            "BadCollapseId" => ApnsReason::BadCollapseId,
            "BadDeviceToken" => ApnsReason::BadDeviceToken,
            "BadExpirationDate" => ApnsReason::BadExpirationDate,
            "BadMessageId" => ApnsReason::BadMessageId,
            "BadPriority" => ApnsReason::BadPriority,
            "BadTopic" => ApnsReason::BadTopic,
            "DeviceTokenNotForTopic" => ApnsReason::DeviceTokenNotForTopic,
            "DuplicateHeaders" => ApnsReason::DuplicateHeaders,
            "IdleTimeout" => ApnsReason::IdleTimeout,
            "MissingDeviceToken" => ApnsReason::MissingDeviceToken,
            "MissingTopic" => ApnsReason::MissingTopic,
            "PayloadEmpty" => ApnsReason::PayloadEmpty,
            "TopicDisallowed" => ApnsReason::TopicDisallowed,
            "BadCertificate" => ApnsReason::BadCertificate,
            "BadCertificateEnvironment" => ApnsReason::BadCertificateEnvironment,
            "ExpiredProviderToken" => ApnsReason::ExpiredProviderToken,
            "Forbidden" => ApnsReason::Forbidden,
            "InvalidProviderToken" => ApnsReason::InvalidProviderToken,
            "MissingProviderToken" => ApnsReason::MissingProviderToken,
            "BadPath" => ApnsReason::BadPath,
            "MethodNotAllowed" => ApnsReason::MethodNotAllowed,
            "Unregistered" => ApnsReason::Unregistered,
            "PayloadTooLarge" => ApnsReason::PayloadTooLarge,
            "TooManyProviderTokenUpdates" => ApnsReason::TooManyProviderTokenUpdates,
            "TooManyRequests" => ApnsReason::TooManyRequests,
            "InternalServerError" => ApnsReason::InternalServerError,
            "ServiceUnavailable" => ApnsReason::ServiceUnavailable,
            "Shutdown" => ApnsReason::Shutdown,
            other => ApnsReason::Unknown(other.to_owned()),
        }
    }

    /// True for the one reason that means "wrong certificate environment" —
    /// the pool's canonical poison-pill outcome.
    pub(crate) fn is_bad_certificate_environment(&self) -> bool {
        matches!(self, ApnsReason::BadCertificateEnvironment)
    }
}

impl fmt::Display for ApnsReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApnsReason::Unknown(reason) => write!(f, "{reason}"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_reasons_with_exact_spelling() {
        assert_eq!(
            ApnsReason::parse("BadDeviceToken"),
            ApnsReason::BadDeviceToken
        );
        assert_eq!(
            ApnsReason::parse("BadCertificateEnvironment"),
            ApnsReason::BadCertificateEnvironment
        );
        assert_eq!(ApnsReason::parse("Shutdown"), ApnsReason::Shutdown);
    }

    #[test]
    fn unknown_reason_is_carried_verbatim() {
        let reason = ApnsReason::parse("SomeFutureReason");
        assert_eq!(
            reason,
            ApnsReason::Unknown("SomeFutureReason".to_owned())
        );
        assert_eq!(reason.to_string(), "SomeFutureReason");
    }

    #[test]
    fn only_bad_certificate_environment_is_the_poison_pill() {
        assert!(ApnsReason::BadCertificateEnvironment.is_bad_certificate_environment());
        assert!(!ApnsReason::BadDeviceToken.is_bad_certificate_environment());
    }
}
