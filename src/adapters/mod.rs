//! Vendor protocol adapters, one per printer family.

pub mod cc;
pub mod cc2;
pub(crate) mod fields;
pub mod moonraker;
