//! Record identifier generation.
//!
//! Identifiers look like `sw-1712345678901-0k3x9zq`:
//!
//! ```text
//! <prefix> - <unix millis> - <sequence base36><6 random base36 chars>
//! ```
//!
//! - **Timestamp**: wall-clock milliseconds, clamped so it never moves backwards within a process
//! - **Sequence**: counter within each millisecond, so ids from one process never repeat
//! - **Random**: six base36 characters (~2.2 billion values) separating concurrent submitters
//!
//! Nothing checks a generated id against the live index. Two processes
//! colliding on millisecond, sequence and random suffix is accepted as an
//! unhandled risk.
//!
//! # Thread Safety
//!
//! A global `parking_lot::Mutex` guards the timestamp and sequence, held only
//! long enough to advance them.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::Rng;
use snafu::Snafu;

use crate::record::RecordId;

/// Default identifier prefix.
pub const DEFAULT_ID_PREFIX: &str = "sw";

/// Length of the random part of the suffix.
const RANDOM_CHARS: usize = 6;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

struct GeneratorState {
    last_millis: u64,
    sequence: u64,
}

static GENERATOR_STATE: Mutex<GeneratorState> =
    Mutex::new(GeneratorState { last_millis: 0, sequence: 0 });

/// Errors from identifier generation.
#[derive(Debug, Snafu)]
pub enum IdError {
    /// System clock is before the Unix epoch.
    #[snafu(display("system clock is before Unix epoch"))]
    SystemClock,
}

/// Generates a fresh record identifier with the given prefix.
///
/// # Errors
///
/// Returns [`IdError::SystemClock`] if the system clock is before the Unix epoch.
///
/// # Example
///
/// ```no_run
/// # use heliowatch_types::id;
/// let a = id::generate("sw").unwrap();
/// let b = id::generate("sw").unwrap();
/// assert_ne!(a, b);
/// ```
pub fn generate(prefix: &str) -> Result<RecordId, IdError> {
    let now_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| IdError::SystemClock)?
        .as_millis() as u64;

    let (millis, sequence) = {
        let mut state = GENERATOR_STATE.lock();
        if now_millis > state.last_millis {
            state.last_millis = now_millis;
            state.sequence = 0;
        } else {
            // Same millisecond, or the clock stepped back.
            state.sequence += 1;
        }
        (state.last_millis, state.sequence)
    };

    let mut suffix = to_base36(sequence);
    let mut rng = rand::rng();
    for _ in 0..RANDOM_CHARS {
        suffix.push(char::from(BASE36[rng.random_range(0..BASE36.len())]));
    }

    Ok(RecordId::new(format!("{prefix}-{millis}-{suffix}")))
}

/// Extracts the millisecond timestamp from a generated identifier.
///
/// Returns `None` for identifiers that do not follow the generated layout.
pub fn extract_millis(id: &RecordId) -> Option<u64> {
    let mut parts = id.as_str().rsplitn(3, '-');
    let _suffix = parts.next()?;
    let millis = parts.next()?;
    parts.next()?;
    millis.parse().ok()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generated_id_layout() {
        let id = generate("sw").unwrap();
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "sw");
        assert!(parts[1].parse::<u64>().is_ok());
        assert!(parts[2].len() > RANDOM_CHARS);
        assert!(parts[2].bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn test_rapid_generation_never_collides() {
        let ids: HashSet<RecordId> = (0..10_000).map(|_| generate("sw").unwrap()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_concurrent_generation_never_collides() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..2_500).map(|_| generate("sw").unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id), "duplicate id generated");
            }
        }
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_extract_millis() {
        let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;
        let id = generate("report").unwrap();
        let millis = extract_millis(&id).unwrap();
        assert!(millis >= before);
        assert_eq!(extract_millis(&RecordId::new("legacy")), None);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
