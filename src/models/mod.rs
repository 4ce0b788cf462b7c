pub mod gold;
pub mod messages;
pub mod silver;

// Re-export core models for easy access
pub use gold::{GoldHolding, GoldParty};
pub use messages::{HoldingUpdateMessage, PartyUpdateMessage, ScanRequestMessage};
pub use silver::{
    SilverGroupMark, SilverHerd, SilverHolding, SilverHoldingParty, SilverParty, SilverPartyRole,
};
