//! Sales channel of a LinkMe order.
//!
//! An order row carries two nullable keys: `created_by_affiliate_id` and
//! `linkme_selection_id`. At most one of them may be set; which one (if any)
//! decides where the order came from.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AffiliateId, OrderError, SelectionId};

/// Where an order was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderChannel {
    /// Created by an affiliate from their back-office.
    Affiliate {
        /// The affiliate that placed the order.
        affiliate_id: AffiliateId,
    },
    /// Created by an end customer through an affiliate's public selection.
    PublicSelection {
        /// The selection the customer ordered from.
        selection_id: SelectionId,
    },
    /// Entered by back-office staff.
    Manual,
}

impl OrderChannel {
    /// Derives the channel from the order's two nullable keys.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::ChannelConflict`] when both keys are set.
    pub fn derive(
        created_by_affiliate_id: Option<AffiliateId>,
        linkme_selection_id: Option<SelectionId>,
    ) -> Result<Self, OrderError> {
        match (created_by_affiliate_id, linkme_selection_id) {
            (Some(affiliate_id), None) => Ok(Self::Affiliate { affiliate_id }),
            (None, Some(selection_id)) => Ok(Self::PublicSelection { selection_id }),
            (None, None) => Ok(Self::Manual),
            (Some(_), Some(_)) => Err(OrderError::ChannelConflict),
        }
    }

    /// Splits the channel back into the two nullable keys stored on the order.
    pub fn keys(self) -> (Option<AffiliateId>, Option<SelectionId>) {
        match self {
            Self::Affiliate { affiliate_id } => (Some(affiliate_id), None),
            Self::PublicSelection { selection_id } => (None, Some(selection_id)),
            Self::Manual => (None, None),
        }
    }

    /// Returns the channel kind without its key.
    pub fn kind(self) -> ChannelKind {
        match self {
            Self::Affiliate { .. } => ChannelKind::Affiliate,
            Self::PublicSelection { .. } => ChannelKind::PublicSelection,
            Self::Manual => ChannelKind::Manual,
        }
    }
}

/// Channel without the identifying key; used for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Placed by an affiliate for one of its customers.
    Affiliate,
    /// Placed by a customer on an affiliate's public selection page.
    PublicSelection,
    /// Entered by staff.
    Manual,
}

impl ChannelKind {
    /// Stable machine key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Affiliate => "affiliate",
            Self::PublicSelection => "public_selection",
            Self::Manual => "manual",
        }
    }

    /// Label shown to staff in lists and e-mails.
    pub fn label(self) -> &'static str {
        match self {
            Self::Affiliate => "Affiliate order",
            Self::PublicSelection => "Public selection order",
            Self::Manual => "Manual order",
        }
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "affiliate" => Ok(Self::Affiliate),
            "public_selection" => Ok(Self::PublicSelection),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_covers_all_key_combinations() {
        let a = AffiliateId::new_random();
        let s = SelectionId::new_random();

        assert_eq!(
            OrderChannel::derive(Some(a), None),
            Ok(OrderChannel::Affiliate { affiliate_id: a })
        );
        assert_eq!(
            OrderChannel::derive(None, Some(s)),
            Ok(OrderChannel::PublicSelection { selection_id: s })
        );
        assert_eq!(OrderChannel::derive(None, None), Ok(OrderChannel::Manual));
        assert_eq!(
            OrderChannel::derive(Some(a), Some(s)),
            Err(OrderError::ChannelConflict)
        );
    }

    #[test]
    fn keys_round_trip_through_derive() {
        let channel = OrderChannel::PublicSelection {
            selection_id: SelectionId::new_random(),
        };
        let (a, s) = channel.keys();
        assert_eq!(OrderChannel::derive(a, s), Ok(channel));
    }

    #[test]
    fn kind_labels() {
        assert_eq!(OrderChannel::Manual.kind().label(), "Manual order");
        assert_eq!("public_selection".parse(), Ok(ChannelKind::PublicSelection));
        assert!("website".parse::<ChannelKind>().is_err());
    }
}
