// src/core/id.rs

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TIME_CHARS: usize = 9;
const COUNTER_CHARS: usize = 4;
const COUNTER_LIMIT: u64 = 36u64.pow(COUNTER_CHARS as u32);

/// Source of keys for pushed children.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Generates lowercase alphanumeric keys that sort by creation time.
///
/// A key is a base-36 millisecond timestamp, a base-36 counter that keeps
/// keys from one process strictly increasing within a millisecond, and a
/// random suffix that keeps keys from different processes apart.
pub struct PushIdGenerator {
    random_chars: usize,
    last: Mutex<(i64, u64)>,
}

impl PushIdGenerator {
    pub fn new(random_chars: usize) -> Self {
        Self {
            random_chars,
            last: Mutex::new((0, 0)),
        }
    }

    fn next_stamp(&self) -> (i64, u64) {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.lock();
        let (millis, counter) = *last;
        let next = if now > millis {
            (now, 0)
        } else if counter + 1 < COUNTER_LIMIT {
            (millis, counter + 1)
        } else {
            // Counter exhausted within one millisecond: borrow from the next one.
            (millis + 1, 0)
        };
        *last = next;
        next
    }
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new(8)
    }
}

impl IdGenerator for PushIdGenerator {
    fn generate(&self) -> String {
        let (millis, counter) = self.next_stamp();
        let mut key = String::with_capacity(TIME_CHARS + COUNTER_CHARS + self.random_chars);
        key.push_str(&base36(millis.max(0) as u64, TIME_CHARS));
        key.push_str(&base36(counter, COUNTER_CHARS));

        let mut rng = rand::thread_rng();
        for _ in 0..self.random_chars {
            key.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
        }
        key
    }
}

fn base36(mut n: u64, width: usize) -> String {
    let mut digits = vec![b'0'; width];
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    digits.into_iter().map(char::from).collect()
}
