//! Tokenized requests for missing order details.
//!
//! When staff put an order in `info_requested`, the requester receives a public
//! link carrying a random token. Only the SHA-256 hash of the token is stored,
//! so a database leak does not hand out working links. The link expires; a
//! submission through it must fill every requested field.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{ActorId, EmailAddress, InfoField, LinkMeDetails, OrderError, Timestamp};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// The plain link token handed to the requester. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct InfoRequestToken(String);

impl InfoRequestToken {
    /// Generates a fresh 64-hex-character token (two random v4 UUIDs).
    pub fn generate() -> Self {
        Self(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        ))
    }

    /// Wraps a token received from a public link.
    ///
    /// Returns `None` unless the value is 16 to 128 ASCII alphanumeric
    /// characters; anything else cannot have been issued here.
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        let ok = (16..=128).contains(&v.len()) && v.chars().all(|c| c.is_ascii_alphanumeric());
        ok.then_some(Self(v))
    }

    /// Returns the token text, for building the public link.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hash stored in place of the token.
    pub fn hash(&self) -> TokenHash {
        TokenHash(format!("{:x}", Sha256::digest(self.0.as_bytes())))
    }
}

impl std::fmt::Debug for InfoRequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InfoRequestToken(..)")
    }
}

/// Lowercase hex SHA-256 of an [`InfoRequestToken`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);

impl TokenHash {
    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// An open request for missing details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRequest {
    pub token_hash: TokenHash,
    /// Fields the requester must fill. Never empty.
    pub fields: BTreeSet<InfoField>,
    /// Message from staff shown on the form and in the e-mail.
    pub message: Option<String>,
    pub requested_by: ActorId,
    pub requested_at: Timestamp,
    pub expires_at: Timestamp,
}

impl InfoRequest {
    /// Opens a request and returns it with the plain token for the link.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NoFieldsRequested`] if `fields` is empty.
    pub fn issue(
        fields: impl IntoIterator<Item = InfoField>,
        message: Option<String>,
        requested_by: ActorId,
        now: Timestamp,
        ttl: chrono::Duration,
    ) -> Result<(InfoRequestToken, InfoRequest), OrderError> {
        let fields: BTreeSet<InfoField> = fields.into_iter().collect();
        if fields.is_empty() {
            return Err(OrderError::NoFieldsRequested);
        }
        let token = InfoRequestToken::generate();
        let request = InfoRequest {
            token_hash: token.hash(),
            fields,
            message: message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            requested_by,
            requested_at: now,
            expires_at: now.plus(ttl),
        };
        Ok((token, request))
    }

    /// Returns `true` once `now` reaches the expiry time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Validates `submission` and returns `details` with the requested fields
    /// filled in. Values for fields that were not requested are ignored.
    ///
    /// # Errors
    ///
    /// - [`OrderError::InfoRequestExpired`] if the link has expired.
    /// - [`OrderError::IncompleteSubmission`] if a requested field is blank.
    /// - [`OrderError::InvalidFieldValue`] if an e-mail or date does not parse.
    pub fn apply(
        &self,
        details: &LinkMeDetails,
        submission: &InfoSubmission,
        now: Timestamp,
    ) -> Result<LinkMeDetails, OrderError> {
        if self.is_expired(now) {
            return Err(OrderError::InfoRequestExpired {
                expired_at: self.expires_at,
            });
        }

        let missing: Vec<InfoField> = self
            .fields
            .iter()
            .copied()
            .filter(|f| submission.value(*f).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(OrderError::IncompleteSubmission { fields: missing });
        }

        let mut updated = details.clone();
        for field in &self.fields {
            // Presence checked above.
            let Some(value) = submission.value(*field) else {
                continue;
            };
            set_field(&mut updated, *field, value)?;
        }
        Ok(updated)
    }
}

fn set_field(details: &mut LinkMeDetails, field: InfoField, value: &str) -> Result<(), OrderError> {
    let text = || Some(value.to_string());
    let email = || {
        EmailAddress::parse(value).map(Some).ok_or_else(|| OrderError::InvalidFieldValue {
            field,
            reason: "not an e-mail address".into(),
        })
    };

    match field {
        InfoField::RequesterName => details.requester_name = text(),
        InfoField::RequesterEmail => details.requester_email = email()?,
        InfoField::RequesterPhone => details.requester_phone = text(),
        InfoField::DeliveryAddress => details.delivery_address = text(),
        InfoField::DeliveryPostalCode => details.delivery_postal_code = text(),
        InfoField::DeliveryCity => details.delivery_city = text(),
        InfoField::DesiredDeliveryDate => {
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                OrderError::InvalidFieldValue {
                    field,
                    reason: "expected a date as YYYY-MM-DD".into(),
                }
            })?;
            details.desired_delivery_date = Some(date);
        }
        InfoField::BillingContactName => details.billing_contact_name = text(),
        InfoField::BillingContactEmail => details.billing_contact_email = email()?,
        InfoField::BillingContactPhone => details.billing_contact_phone = text(),
    }
    Ok(())
}

/// Values typed by the requester on the public form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoSubmission {
    pub values: BTreeMap<InfoField, String>,
}

impl InfoSubmission {
    /// Returns the trimmed value for `field`, or `None` if absent or blank.
    pub fn value(&self, field: InfoField) -> Option<&str> {
        self.values
            .get(&field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl FromIterator<(InfoField, String)> for InfoSubmission {
    fn from_iter<T: IntoIterator<Item = (InfoField, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorId {
        ActorId::new("ops@example.com").unwrap()
    }

    fn open(fields: &[InfoField], now: Timestamp) -> (InfoRequestToken, InfoRequest) {
        InfoRequest::issue(
            fields.iter().copied(),
            Some("  Please complete delivery  ".into()),
            actor(),
            now,
            chrono::Duration::days(7),
        )
        .unwrap()
    }

    #[test]
    fn generated_tokens_are_unique_and_hash_to_hex() {
        let a = InfoRequestToken::generate();
        let b = InfoRequestToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
        let hash = a.hash();
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash.as_str().chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_eq!(a.hash(), InfoRequestToken::parse(a.as_str()).unwrap().hash());
    }

    #[test]
    fn token_parse_rejects_garbage() {
        assert!(InfoRequestToken::parse("short").is_none());
        assert!(InfoRequestToken::parse("../../etc/passwd-and-more").is_none());
    }

    #[test]
    fn token_debug_is_redacted() {
        let t = InfoRequestToken::generate();
        assert!(!format!("{t:?}").contains(t.as_str()));
    }

    #[test]
    fn issue_requires_fields_and_sets_expiry() {
        let now = Timestamp::now();
        let err = InfoRequest::issue([], None, actor(), now, chrono::Duration::days(1)).unwrap_err();
        assert_eq!(err, OrderError::NoFieldsRequested);

        let (_, req) = open(&[InfoField::DeliveryCity], now);
        assert_eq!(req.expires_at, now.plus(chrono::Duration::days(7)));
        assert_eq!(req.message.as_deref(), Some("Please complete delivery"));
    }

    #[test]
    fn apply_fills_requested_fields_only() {
        let now = Timestamp::now();
        let (_, req) = open(&[InfoField::DeliveryCity, InfoField::DesiredDeliveryDate], now);
        let submission: InfoSubmission = [
            (InfoField::DeliveryCity, " Lyon ".to_string()),
            (InfoField::DesiredDeliveryDate, "2026-11-03".to_string()),
            (InfoField::RequesterName, "Intruder".to_string()),
        ]
        .into_iter()
        .collect();

        let details = req.apply(&LinkMeDetails::default(), &submission, now).unwrap();
        assert_eq!(details.delivery_city.as_deref(), Some("Lyon"));
        assert_eq!(
            details.desired_delivery_date,
            NaiveDate::from_ymd_opt(2026, 11, 3)
        );
        assert_eq!(details.requester_name, None);
    }

    #[test]
    fn apply_reports_every_blank_field() {
        let now = Timestamp::now();
        let (_, req) = open(&[InfoField::DeliveryCity, InfoField::BillingContactName], now);
        let submission: InfoSubmission =
            [(InfoField::DeliveryCity, "   ".to_string())].into_iter().collect();

        let err = req.apply(&LinkMeDetails::default(), &submission, now).unwrap_err();
        assert_eq!(
            err,
            OrderError::IncompleteSubmission {
                fields: vec![InfoField::DeliveryCity, InfoField::BillingContactName]
            }
        );
    }

    #[test]
    fn apply_validates_emails_and_dates() {
        let now = Timestamp::now();
        let (_, req) = open(&[InfoField::BillingContactEmail], now);
        let bad: InfoSubmission =
            [(InfoField::BillingContactEmail, "nope".to_string())].into_iter().collect();
        assert!(matches!(
            req.apply(&LinkMeDetails::default(), &bad, now),
            Err(OrderError::InvalidFieldValue { field: InfoField::BillingContactEmail, .. })
        ));

        let (_, req) = open(&[InfoField::DesiredDeliveryDate], now);
        let bad: InfoSubmission =
            [(InfoField::DesiredDeliveryDate, "03/11/2026".to_string())].into_iter().collect();
        assert!(matches!(
            req.apply(&LinkMeDetails::default(), &bad, now),
            Err(OrderError::InvalidFieldValue { field: InfoField::DesiredDeliveryDate, .. })
        ));
    }

    #[test]
    fn expired_requests_are_refused() {
        let then = Timestamp::now();
        let (_, req) = open(&[InfoField::DeliveryCity], then);
        let later = then.plus(chrono::Duration::days(8));
        let submission: InfoSubmission =
            [(InfoField::DeliveryCity, "Lyon".to_string())].into_iter().collect();

        assert!(req.is_expired(later));
        assert_eq!(
            req.apply(&LinkMeDetails::default(), &submission, later),
            Err(OrderError::InfoRequestExpired { expired_at: req.expires_at })
        );
    }
}
