//! Board revision detection and channel to pin mapping
//!
//! The board revision is read once from the identification file and selects
//! which overlay tables apply on top of the universal base table.

mod mapping;
mod revision;

pub use mapping::{build_mapping, lookup_pin, overlay, PinMapping, MAX_REVISION};
pub use revision::{
    resolve_revision, revision_code, revision_for_code, revision_from_cpuinfo, Revision,
    CPUINFO_PATH, DEFAULT_REVISION,
};
