use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;

use crate::models::RecordId;

/// Alphabet in ascending ASCII order, so identifiers sort chronologically.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const TIME_DIGITS: usize = 8;
const ENTROPY_DIGITS: usize = 12;

/// Generates 20-character push identifiers.
///
/// The first 8 characters encode the creation time in milliseconds and the
/// remaining 12 are random. Identifiers handed out by one generator are
/// strictly increasing, even when several are requested in the same
/// millisecond or the clock steps backwards.
#[derive(Debug, Default)]
pub(crate) struct PushIdGenerator {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    last_ms: i64,
    entropy: [u8; ENTROPY_DIGITS],
}

impl PushIdGenerator {
    pub(crate) fn next(&self) -> RecordId {
        self.next_at(Utc::now().timestamp_millis())
    }

    fn next_at(&self, now_ms: i64) -> RecordId {
        let mut state = self.state.lock();
        if now_ms > state.last_ms {
            state.last_ms = now_ms;
            state.entropy = random_entropy();
        } else if !increment(&mut state.entropy) {
            state.last_ms += 1;
        }
        RecordId::new(encode(state.last_ms, &state.entropy))
    }
}

fn encode(timestamp_ms: i64, entropy: &[u8; ENTROPY_DIGITS]) -> String {
    let mut chars = [b'-'; TIME_DIGITS + ENTROPY_DIGITS];
    let mut remaining = timestamp_ms.max(0) as u64;
    for slot in chars[..TIME_DIGITS].iter_mut().rev() {
        *slot = PUSH_CHARS[(remaining % 64) as usize];
        remaining /= 64;
    }
    for (slot, digit) in chars[TIME_DIGITS..].iter_mut().zip(entropy) {
        *slot = PUSH_CHARS[(*digit & 63) as usize];
    }
    chars.iter().map(|&byte| byte as char).collect()
}

/// Add one to the base-64 entropy digits. Returns `false` on wrap-around.
fn increment(entropy: &mut [u8; ENTROPY_DIGITS]) -> bool {
    for digit in entropy.iter_mut().rev() {
        if *digit >= 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return true;
        }
    }
    false
}

fn random_entropy() -> [u8; ENTROPY_DIGITS] {
    let mut rng = rand::rng();
    let mut entropy = [0u8; ENTROPY_DIGITS];
    for digit in entropy.iter_mut() {
        *digit = rng.random_range(0..64);
    }
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_twenty_url_safe_chars() {
        let id = PushIdGenerator::default().next();
        assert_eq!(id.as_str().len(), 20);
        assert!(id
            .as_str()
            .bytes()
            .all(|byte| PUSH_CHARS.contains(&byte)));
    }

    #[test]
    fn ids_increase_within_one_millisecond() {
        let generator = PushIdGenerator::default();
        let first = generator.next_at(1_700_000_000_000);
        let second = generator.next_at(1_700_000_000_000);
        let third = generator.next_at(1_700_000_000_001);
        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn ids_keep_increasing_when_clock_steps_back() {
        let generator = PushIdGenerator::default();
        let first = generator.next_at(1_700_000_000_500);
        let second = generator.next_at(1_700_000_000_100);
        assert!(first < second);
    }

    #[test]
    fn entropy_overflow_moves_timestamp_forward() {
        let generator = PushIdGenerator::default();
        let first = generator.next_at(42);
        generator.state.lock().entropy = [63; ENTROPY_DIGITS];
        let before = encode(42, &[63; ENTROPY_DIGITS]);
        let after = generator.next_at(42);
        assert!(first.as_str() < before.as_str());
        assert!(before.as_str() < after.as_str());
    }

    #[test]
    fn fresh_entropy_stays_in_alphabet_range() {
        let entropy = random_entropy();
        assert!(entropy.iter().all(|digit| *digit < 64));
        assert_ne!(random_entropy(), random_entropy());
    }

    #[test]
    fn timestamp_prefix_sorts_numerically() {
        let early = encode(63, &[0; ENTROPY_DIGITS]);
        let late = encode(64, &[0; ENTROPY_DIGITS]);
        assert!(early < late);
    }
}
