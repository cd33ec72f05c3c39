//! Requester, delivery and billing details attached to a LinkMe order.
//!
//! Orders created through a public selection often arrive with gaps (no
//! billing contact, no delivery date). Staff can ask the requester to fill the
//! gaps; [`InfoField`] names each fillable field.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::EmailAddress;

/// A single field of [`LinkMeDetails`] that can be requested from the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoField {
    /// Name of the person who placed the order.
    RequesterName,
    /// Where workflow e-mails are sent.
    RequesterEmail,
    /// Requester phone number.
    RequesterPhone,
    /// Street address for delivery.
    DeliveryAddress,
    /// Delivery postal code.
    DeliveryPostalCode,
    /// Delivery city.
    DeliveryCity,
    /// Requested delivery date, `YYYY-MM-DD`.
    DesiredDeliveryDate,
    /// Person to invoice.
    BillingContactName,
    /// Address invoices are sent to.
    BillingContactEmail,
    /// Billing contact phone number.
    BillingContactPhone,
}

impl InfoField {
    /// Every field, in form order.
    pub const ALL: [InfoField; 10] = [
        Self::RequesterName,
        Self::RequesterEmail,
        Self::RequesterPhone,
        Self::DeliveryAddress,
        Self::DeliveryPostalCode,
        Self::DeliveryCity,
        Self::DesiredDeliveryDate,
        Self::BillingContactName,
        Self::BillingContactEmail,
        Self::BillingContactPhone,
    ];

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequesterName => "requester_name",
            Self::RequesterEmail => "requester_email",
            Self::RequesterPhone => "requester_phone",
            Self::DeliveryAddress => "delivery_address",
            Self::DeliveryPostalCode => "delivery_postal_code",
            Self::DeliveryCity => "delivery_city",
            Self::DesiredDeliveryDate => "desired_delivery_date",
            Self::BillingContactName => "billing_contact_name",
            Self::BillingContactEmail => "billing_contact_email",
            Self::BillingContactPhone => "billing_contact_phone",
        }
    }

    /// Human-readable label used in e-mails and on the public form.
    pub fn label(self) -> &'static str {
        match self {
            Self::RequesterName => "Your name",
            Self::RequesterEmail => "Your e-mail address",
            Self::RequesterPhone => "Your phone number",
            Self::DeliveryAddress => "Delivery address",
            Self::DeliveryPostalCode => "Delivery postal code",
            Self::DeliveryCity => "Delivery city",
            Self::DesiredDeliveryDate => "Desired delivery date",
            Self::BillingContactName => "Billing contact name",
            Self::BillingContactEmail => "Billing contact e-mail",
            Self::BillingContactPhone => "Billing contact phone",
        }
    }
}

impl FromStr for InfoField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown field: {s}"))
    }
}

impl std::fmt::Display for InfoField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requester identity, delivery preferences and billing contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkMeDetails {
    pub requester_name: Option<String>,
    pub requester_email: Option<EmailAddress>,
    pub requester_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_postal_code: Option<String>,
    pub delivery_city: Option<String>,
    pub desired_delivery_date: Option<NaiveDate>,
    pub billing_contact_name: Option<String>,
    pub billing_contact_email: Option<EmailAddress>,
    pub billing_contact_phone: Option<String>,
}

impl LinkMeDetails {
    /// Returns `true` if `field` holds a value.
    pub fn has(&self, field: InfoField) -> bool {
        match field {
            InfoField::RequesterName => self.requester_name.is_some(),
            InfoField::RequesterEmail => self.requester_email.is_some(),
            InfoField::RequesterPhone => self.requester_phone.is_some(),
            InfoField::DeliveryAddress => self.delivery_address.is_some(),
            InfoField::DeliveryPostalCode => self.delivery_postal_code.is_some(),
            InfoField::DeliveryCity => self.delivery_city.is_some(),
            InfoField::DesiredDeliveryDate => self.desired_delivery_date.is_some(),
            InfoField::BillingContactName => self.billing_contact_name.is_some(),
            InfoField::BillingContactEmail => self.billing_contact_email.is_some(),
            InfoField::BillingContactPhone => self.billing_contact_phone.is_some(),
        }
    }

    /// Fields that are still unset, in form order.
    pub fn missing_fields(&self) -> Vec<InfoField> {
        InfoField::ALL
            .into_iter()
            .filter(|f| !self.has(*f))
            .collect()
    }

    /// Address used for requester notifications: the requester's own e-mail,
    /// falling back to the billing contact.
    pub fn notification_email(&self) -> Option<&EmailAddress> {
        self.requester_email
            .as_ref()
            .or(self.billing_contact_email.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_details_miss_every_field() {
        assert_eq!(LinkMeDetails::default().missing_fields(), InfoField::ALL.to_vec());
    }

    #[test]
    fn missing_fields_skips_set_ones() {
        let details = LinkMeDetails {
            requester_name: Some("Jane".into()),
            requester_email: EmailAddress::parse("jane@example.com"),
            ..Default::default()
        };
        let missing = details.missing_fields();
        assert!(!missing.contains(&InfoField::RequesterName));
        assert!(!missing.contains(&InfoField::RequesterEmail));
        assert!(missing.contains(&InfoField::DeliveryAddress));
    }

    #[test]
    fn notification_email_falls_back_to_billing() {
        let details = LinkMeDetails {
            billing_contact_email: EmailAddress::parse("billing@example.com"),
            ..Default::default()
        };
        assert_eq!(
            details.notification_email().map(EmailAddress::as_str),
            Some("billing@example.com")
        );
    }

    #[test]
    fn field_names_parse() {
        for f in InfoField::ALL {
            assert_eq!(f.as_str().parse::<InfoField>(), Ok(f));
        }
        assert_eq!(
            serde_json::to_string(&InfoField::DesiredDeliveryDate).unwrap(),
            "\"desired_delivery_date\""
        );
    }
}
