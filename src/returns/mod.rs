//! Statutory return generation and filing

pub mod compliance;
pub mod filing;
pub mod gstr1;
pub mod gstr3b;
pub mod period;

pub use compliance::{ComplianceStatus, DisplayStatus, ReturnSummary};
pub use filing::{FilingReceipt, ReturnService};
pub use gstr1::Gstr1Payload;
pub use gstr3b::Gstr3bPayload;
pub use period::ReturnPeriod;

use serde::{Deserialize, Serialize};

use crate::types::ReturnType;

/// Payload of either return type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "return_type", content = "data")]
pub enum ReturnPayload {
    #[serde(rename = "GSTR1")]
    Gstr1(Gstr1Payload),
    #[serde(rename = "GSTR3B")]
    Gstr3b(Gstr3bPayload),
}

impl ReturnPayload {
    pub fn return_type(&self) -> ReturnType {
        match self {
            ReturnPayload::Gstr1(_) => ReturnType::Gstr1,
            ReturnPayload::Gstr3b(_) => ReturnType::Gstr3b,
        }
    }

    pub fn period(&self) -> ReturnPeriod {
        match self {
            ReturnPayload::Gstr1(payload) => payload.period,
            ReturnPayload::Gstr3b(payload) => payload.period,
        }
    }

    pub fn gstin(&self) -> Option<&str> {
        match self {
            ReturnPayload::Gstr1(payload) => payload.gstin.as_deref(),
            ReturnPayload::Gstr3b(payload) => payload.gstin.as_deref(),
        }
    }
}

impl From<Gstr1Payload> for ReturnPayload {
    fn from(payload: Gstr1Payload) -> Self {
        ReturnPayload::Gstr1(payload)
    }
}

impl From<Gstr3bPayload> for ReturnPayload {
    fn from(payload: Gstr3bPayload) -> Self {
        ReturnPayload::Gstr3b(payload)
    }
}
