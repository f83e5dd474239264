//! Domain models for the generation service.

pub mod account;
pub mod parameters;
pub mod usage;

pub use account::{Account, BillingReferences, Credential, Preferences, Tier};
pub use parameters::{DocumentDesign, LengthTier, Tone};
pub use usage::{GenerationKind, UsageParameters, UsageRecord};
