//! Record timestamps.
//!
//! Wall-clock milliseconds plus a counter that breaks ties inside one
//! millisecond, stored as 12 big-endian bytes so BLOB order is write order.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Field order matters: the derived `Ord` compares `wall_ms` first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hlc {
    wall_ms: u64,
    counter: u32,
}

impl Hlc {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&self.wall_ms.to_be_bytes());
        buf[8..].copy_from_slice(&self.counter.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; 12]) -> Self {
        let (wall, counter) = bytes.split_at(8);
        Self {
            wall_ms: u64::from_be_bytes(wall.try_into().unwrap_or_default()),
            counter: u32::from_be_bytes(counter.try_into().unwrap_or_default()),
        }
    }
}

/// Hands out strictly increasing [`Hlc`] values for one connection.
#[derive(Default)]
pub struct HlcClock {
    last: Option<Hlc>,
}

impl HlcClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> Result<Hlc, CoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))?
            .as_millis() as u64;
        let next = match self.last {
            Some(last) if last.wall_ms >= now => Hlc::new(last.wall_ms, last.counter + 1),
            _ => Hlc::new(now, 0),
        };
        self.last = Some(next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_strictly_monotonic() {
        let mut clock = HlcClock::new();
        let mut prev = clock.tick().unwrap();
        for _ in 0..1000 {
            let next = clock.tick().unwrap();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn byte_order_matches_logical_order() {
        let stamps = [Hlc::new(10, 5), Hlc::new(10, 6), Hlc::new(11, 0)];
        for pair in stamps.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_bytes() < pair[1].to_bytes());
        }
        assert_eq!(Hlc::from_bytes(&stamps[0].to_bytes()), stamps[0]);
    }
}
