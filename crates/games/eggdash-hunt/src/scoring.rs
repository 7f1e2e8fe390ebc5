use crate::entity::CollectibleKind;

/// Points for a plain egg.
pub const NORMAL_POINTS: u32 = 1;
/// Points for a golden egg.
pub const GOLDEN_POINTS: u32 = 5;
/// Points for a rainbow egg.
pub const RAINBOW_POINTS: u32 = 10;
/// Points for a thunder egg (which also boosts speed).
pub const THUNDER_POINTS: u32 = 1;

/// Total score for a batch of pickups.
pub fn score_pickups(kinds: &[CollectibleKind]) -> u32 {
    kinds.iter().map(|k| k.points()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_batch() {
        let kinds = [
            CollectibleKind::Normal,
            CollectibleKind::Golden,
            CollectibleKind::Rainbow,
            CollectibleKind::Thunder,
        ];
        assert_eq!(score_pickups(&kinds), 1 + 5 + 10 + 1);
    }

    #[test]
    fn empty_batch() {
        assert_eq!(score_pickups(&[]), 0);
    }
}
