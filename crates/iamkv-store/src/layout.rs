use crate::config::StoreConfig;
use crate::envelope::RecordMarker;
use crate::error::{StoreError, StoreResult};
use crate::holder::HolderKind;

/// The part of a record's value stored in one tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub tier: HolderKind,
    pub payload: &'a str,
    pub capacity: usize,
}

/// How a value is spread across the two tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLayout<'a> {
    pub primary: Chunk<'a>,
    pub secondary: Option<Chunk<'a>>,
    pub marker: RecordMarker,
}

impl<'a> ChunkLayout<'a> {
    /// Split `value` into a primary chunk and, if it overflows the primary
    /// tier, a secondary chunk holding the remainder.
    ///
    /// The split falls on the last char boundary at or before the primary
    /// capacity, so for ASCII values the primary chunk is exactly full.
    /// Values longer than both capacities combined are rejected, as are
    /// values whose remainder no longer fits once the split has been moved
    /// back to a char boundary.
    pub fn split(value: &'a str, config: &StoreConfig) -> StoreResult<Self> {
        let max = config.max_value_len();
        if value.len() > max {
            return Err(StoreError::TooLarge {
                len: value.len(),
                max,
            });
        }

        let mut at = value.len().min(config.primary_capacity);
        while !value.is_char_boundary(at) {
            at -= 1;
        }
        let (head, tail) = value.split_at(at);

        if tail.len() > config.secondary_capacity {
            return Err(StoreError::TooLarge {
                len: value.len(),
                max,
            });
        }

        let secondary = (!tail.is_empty()).then_some(Chunk {
            tier: HolderKind::Secondary,
            payload: tail,
            capacity: config.secondary_capacity,
        });

        Ok(Self {
            primary: Chunk {
                tier: HolderKind::Primary,
                payload: head,
                capacity: config.primary_capacity,
            },
            secondary,
            marker: RecordMarker::for_value(value),
        })
    }

    pub fn spans_both_tiers(&self) -> bool {
        self.secondary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> StoreConfig {
        StoreConfig {
            primary_capacity: 8,
            secondary_capacity: 16,
            ..Default::default()
        }
    }

    #[test]
    fn short_value_stays_in_primary() {
        let config = small_config();
        let layout = ChunkLayout::split("cats", &config).unwrap();
        assert_eq!(layout.primary.payload, "cats");
        assert!(!layout.spans_both_tiers());
        assert_eq!(layout.marker.total_len, 4);
    }

    #[test]
    fn empty_value_is_a_single_empty_chunk() {
        let layout = ChunkLayout::split("", &small_config()).unwrap();
        assert_eq!(layout.primary.payload, "");
        assert!(layout.secondary.is_none());
    }

    #[test]
    fn exactly_full_primary_has_no_secondary() {
        let layout = ChunkLayout::split("12345678", &small_config()).unwrap();
        assert_eq!(layout.primary.payload, "12345678");
        assert!(layout.secondary.is_none());
    }

    #[test]
    fn overflow_goes_to_secondary() {
        let layout = ChunkLayout::split("123456789", &small_config()).unwrap();
        assert_eq!(layout.primary.payload, "12345678");
        let secondary = layout.secondary.unwrap();
        assert_eq!(secondary.payload, "9");
        assert_eq!(secondary.tier, HolderKind::Secondary);
        assert_eq!(secondary.capacity, 16);
    }

    #[test]
    fn every_length_up_to_capacity_splits_exactly() {
        let config = small_config();
        for len in 0..=config.max_value_len() {
            let value = "a".repeat(len);
            let layout = ChunkLayout::split(&value, &config).unwrap();
            let expected_primary = len.min(config.primary_capacity);
            assert_eq!(layout.primary.payload.len(), expected_primary);
            let secondary_len = layout.secondary.map_or(0, |c| c.payload.len());
            assert_eq!(secondary_len, len - expected_primary);
            assert!(secondary_len <= config.secondary_capacity);
        }
    }

    #[test]
    fn oversized_value_is_rejected() {
        let value = "a".repeat(25);
        let err = ChunkLayout::split(&value, &small_config()).unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { len: 25, max: 24 }));
    }

    #[test]
    fn split_never_cuts_a_code_point() {
        // "é" is two bytes; byte 8 falls inside the third one.
        let value = "abc\u{e9}\u{e9}\u{e9}";
        let layout = ChunkLayout::split(value, &small_config()).unwrap();
        assert_eq!(layout.primary.payload, "abc\u{e9}\u{e9}");
        assert_eq!(layout.primary.payload.len(), 7);
        assert_eq!(layout.secondary.unwrap().payload, "\u{e9}");
    }

    #[test]
    fn boundary_shift_that_overflows_secondary_is_rejected() {
        // 7 ASCII bytes, then a 2-byte char straddling the primary limit,
        // then 15 more bytes: 24 in total, but the remainder becomes 17.
        let value = format!("{}\u{e9}{}", "a".repeat(7), "b".repeat(15));
        assert_eq!(value.len(), 24);
        assert!(matches!(
            ChunkLayout::split(&value, &small_config()),
            Err(StoreError::TooLarge { .. })
        ));
    }
}
