//! Mining reward and difficulty schedule: a simple per-ten-block halving,
//! capped difficulty ramp. Exposed to the miner orchestrator (C8) so it can
//! stamp the right reward amount into the `miningReward` transaction it
//! builds for each candidate block.

use crate::transaction::round6;

/// `miningReward(i) = round(100 / 2^floor(i/10), 6)`.
pub fn reward_at_height(height: u64) -> f64 {
    let halvings = height / 10;
    round6(100.0 / 2f64.powi(halvings as i32))
}

/// `difficulty(i) = min(2 + floor(i/10), 5)`.
pub fn difficulty_at_height(height: u64) -> u32 {
    (2 + (height / 10) as u32).min(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_halves_every_ten_blocks() {
        assert_eq!(reward_at_height(0), 100.0);
        assert_eq!(reward_at_height(9), 100.0);
        assert_eq!(reward_at_height(10), 50.0);
        assert_eq!(reward_at_height(20), 25.0);
    }

    #[test]
    fn difficulty_ramps_then_caps_at_five() {
        assert_eq!(difficulty_at_height(0), 2);
        assert_eq!(difficulty_at_height(10), 3);
        assert_eq!(difficulty_at_height(30), 5);
        assert_eq!(difficulty_at_height(1000), 5);
    }
}
