//! Transfer notification decoding.
//!
//! A transfer arrives as an XML payment envelope. The paid amount is the first
//! decimal number found in the fee description (e.g. `￥5.00`). Any decoding
//! problem yields zero and is logged, so a malformed notification can never fail
//! the message handler.

use crate::core::money::split_leading_decimal;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, warn};

/// Sub-type flag marking a refund or other non-payment transfer.
pub const NON_PAYMENT_SUBTYPE: i32 = 3;

#[derive(Debug, Deserialize)]
struct PaymentEnvelope {
    appmsg: AppMessage,
}

#[derive(Debug, Deserialize)]
struct AppMessage {
    wcpayinfo: PaymentInfo,
}

#[derive(Debug, Deserialize)]
struct PaymentInfo {
    #[serde(default)]
    paysubtype: i32,
    #[serde(default)]
    feedesc: String,
}

/// Extracts the paid amount from a transfer notification payload.
///
/// Returns `Decimal::ZERO` when the payload is not a payment envelope, when the
/// sub-type marks a refund/non-payment, or when no positive number is present.
#[must_use]
pub fn extract_transfer_amount(payload: &str) -> Decimal {
    let envelope: PaymentEnvelope = match quick_xml::de::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Failed to decode transfer payload: {e}");
            return Decimal::ZERO;
        }
    };

    let info = envelope.appmsg.wcpayinfo;
    if info.paysubtype == NON_PAYMENT_SUBTYPE {
        debug!("Ignoring non-payment transfer (paysubtype {NON_PAYMENT_SUBTYPE})");
        return Decimal::ZERO;
    }

    let Some(number) = first_decimal(&info.feedesc) else {
        warn!("No amount found in fee description {:?}", info.feedesc);
        return Decimal::ZERO;
    };

    match Decimal::from_str(number) {
        Ok(amount) if amount > Decimal::ZERO => amount,
        Ok(_) => Decimal::ZERO,
        Err(e) => {
            warn!("Failed to parse transfer amount {number:?}: {e}");
            Decimal::ZERO
        }
    }
}

/// Finds the first `digits[.digits]` run in `text`.
fn first_decimal(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    split_leading_decimal(&text[start..]).map(|(number, _)| number)
}
