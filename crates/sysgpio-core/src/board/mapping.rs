//! Channel to pin mapping tables

use std::collections::BTreeMap;

use super::Revision;
use crate::error::{GpioError, Result};
use crate::types::{Channel, Pin};

/// Highest revision with an overlay table
pub const MAX_REVISION: Revision = 3;

/// Universal base table (26-pin header)
const BASE: &[(Channel, Pin)] = &[
    (3, 2),
    (5, 3),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 27),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
];

/// Early boards route channels 3, 5 and 13 to different pins
const REVISION_1: &[(Channel, Pin)] = &[(3, 0), (5, 1), (13, 21)];

const REVISION_2: &[(Channel, Pin)] = &[(3, 2), (5, 3), (13, 27)];

/// 40-pin header extension
const REVISION_3: &[(Channel, Pin)] = &[
    (29, 5),
    (31, 6),
    (32, 12),
    (33, 13),
    (35, 19),
    (36, 16),
    (37, 26),
    (38, 20),
    (40, 21),
];

/// Overlay entries introduced by `revision` (revision 0 is the base table)
pub fn overlay(revision: Revision) -> &'static [(Channel, Pin)] {
    match revision {
        0 => BASE,
        1 => REVISION_1,
        2 => REVISION_2,
        3 => REVISION_3,
        _ => &[],
    }
}

/// Resolved channel to pin table
///
/// Built once from the board revision and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinMapping {
    table: BTreeMap<Channel, Pin>,
}

impl PinMapping {
    /// Build the mapping for a board revision
    pub fn for_revision(revision: Revision) -> Self {
        build_mapping(revision)
    }

    /// Build a mapping from explicit entries (last entry wins on duplicates)
    pub fn from_entries(entries: impl IntoIterator<Item = (Channel, Pin)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
        }
    }

    /// Resolve a channel to its pin
    pub fn lookup(&self, channel: Channel) -> Result<Pin> {
        self.table
            .get(&channel)
            .copied()
            .ok_or(GpioError::UnknownChannel(channel))
    }

    /// Check if the channel is mapped
    pub fn contains(&self, channel: Channel) -> bool {
        self.table.contains_key(&channel)
    }

    /// Iterate over `(channel, pin)` pairs in channel order
    pub fn iter(&self) -> impl Iterator<Item = (Channel, Pin)> + '_ {
        self.table.iter().map(|(c, p)| (*c, *p))
    }

    /// Mapped channels in ascending order
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.table.keys().copied()
    }

    /// Number of mapped channels
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if no channel is mapped
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn apply(&mut self, entries: &[(Channel, Pin)]) {
        self.table.extend(entries.iter().copied());
    }
}

/// Merge the base table with every overlay up to and including `revision`
pub fn build_mapping(revision: Revision) -> PinMapping {
    let mut mapping = PinMapping::default();
    for r in 0..=revision.min(MAX_REVISION) {
        mapping.apply(overlay(r));
    }
    log::debug!(
        "Built pin mapping for revision {} ({} channels)",
        revision,
        mapping.len()
    );
    mapping
}

/// Resolve `channel` in `mapping`
pub fn lookup_pin(mapping: &PinMapping, channel: Channel) -> Result<Pin> {
    mapping.lookup(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_revision_0_is_base_table() {
        let mapping = build_mapping(0);
        assert_eq!(mapping.len(), BASE.len());
        assert_eq!(mapping.lookup(3).unwrap(), 2);
        assert_eq!(mapping.lookup(13).unwrap(), 27);
        assert!(!mapping.contains(40));
    }

    #[test]
    fn test_revision_1_overrides() {
        let mapping = build_mapping(1);
        assert_eq!(mapping.lookup(3).unwrap(), 0);
        assert_eq!(mapping.lookup(5).unwrap(), 1);
        assert_eq!(mapping.lookup(13).unwrap(), 21);
        assert_eq!(mapping.lookup(7).unwrap(), 4);
    }

    #[test]
    fn test_revision_3_full_header() {
        let mapping = build_mapping(3);
        assert_eq!(mapping.len(), BASE.len() + REVISION_3.len());
        assert_eq!(mapping.lookup(3).unwrap(), 2);
        assert_eq!(mapping.lookup(13).unwrap(), 27);
        assert_eq!(mapping.lookup(40).unwrap(), 21);
        assert_eq!(mapping.lookup(37).unwrap(), 26);
    }

    #[test]
    fn test_revision_above_max_uses_all_overlays() {
        assert_eq!(build_mapping(9), build_mapping(MAX_REVISION));
    }

    #[test]
    fn test_unknown_channel() {
        let mapping = build_mapping(3);
        match lookup_pin(&mapping, 30) {
            Err(GpioError::UnknownChannel(30)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(mapping.lookup(0).is_err());
        assert!(mapping.lookup(41).is_err());
    }

    #[test]
    fn test_table_ranges() {
        for r in 0..=MAX_REVISION {
            for (channel, pin) in overlay(r) {
                assert!((1..=40).contains(channel), "channel {}", channel);
                assert!(*pin <= 27, "pin {}", pin);
            }
        }
    }

    #[test]
    fn test_pins_unique_within_each_build() {
        for r in 0..=MAX_REVISION {
            let mapping = build_mapping(r);
            let pins: BTreeSet<Pin> = mapping.iter().map(|(_, p)| p).collect();
            assert_eq!(pins.len(), mapping.len(), "revision {}", r);
        }
    }

    proptest! {
        #[test]
        fn prop_lookup_is_stable(revision in 0u8..=MAX_REVISION, channel in 0u32..64) {
            let mapping = build_mapping(revision);
            let first = mapping.lookup(channel).ok();
            let second = mapping.lookup(channel).ok();
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.is_some(), mapping.contains(channel));
        }

        #[test]
        fn prop_next_revision_only_changes_its_overlay(revision in 0u8..MAX_REVISION) {
            let lower = build_mapping(revision);
            let upper = build_mapping(revision + 1);
            let touched: BTreeSet<Channel> =
                overlay(revision + 1).iter().map(|(c, _)| *c).collect();

            for (channel, pin) in lower.iter() {
                if !touched.contains(&channel) {
                    prop_assert_eq!(upper.lookup(channel).ok(), Some(pin));
                }
            }
            for (channel, pin) in upper.iter() {
                if touched.contains(&channel) {
                    prop_assert!(overlay(revision + 1).contains(&(channel, pin)));
                } else {
                    prop_assert!(lower.contains(channel));
                }
            }
        }
    }
}
