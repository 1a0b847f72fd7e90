//! Flow-control credit relay.
//!
//! A synthetic push frame consumes credit the requester never granted on the
//! reply stream. [`ThrottleDebt`] records that consumption and absorbs
//! incoming window updates until it is repaid, so the credit relayed upstream
//! never exceeds the credit received minus the bytes pushed.
//!
//! [`ThrottleTable`] records which state machine handles the Window and Reset
//! frames arriving against each stream the engine writes to.

use std::collections::HashMap;

use crate::stream::StreamKey;

/// Debt accumulated by synthetic emissions on one reply stream.
///
/// While locked, window updates only reduce the debt; unlocking relays any
/// surplus. While unlocked, updates first repay outstanding debt and the
/// remainder is relayed.
///
/// # Examples
///
/// ```
/// use http_push::ThrottleDebt;
///
/// let mut debt = ThrottleDebt::default();
/// debt.lock();
/// debt.charge(100);
/// assert_eq!(debt.unlock(), None);
/// assert_eq!(debt.on_window(60), None);
/// assert_eq!(debt.on_window(60), Some(20));
/// assert_eq!(debt.on_window(5), Some(5));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThrottleDebt {
    locked: bool,
    /// Positive: bytes still owed. Negative: credit withheld while locked.
    debt: i64,
}

impl ThrottleDebt {
    /// Withhold all credit until [`unlock`](Self::unlock).
    pub fn lock(&mut self) { self.locked = true; }

    /// Record `bytes` consumed without a matching grant.
    pub fn charge(&mut self, bytes: u32) { self.debt += i64::from(bytes); }

    /// Resume relaying, returning credit withheld beyond the debt.
    pub fn unlock(&mut self) -> Option<u32> {
        self.locked = false;
        if self.debt >= 0 {
            return None;
        }
        let surplus = self.debt.unsigned_abs();
        self.debt = 0;
        Some(u32::try_from(surplus).unwrap_or(u32::MAX))
    }

    /// Apply a window update, returning the credit to relay upstream.
    pub fn on_window(&mut self, update: u32) -> Option<u32> {
        let update = i64::from(update);
        if self.locked {
            self.debt -= update;
            return None;
        }
        if self.debt > 0 {
            let remainder = update - self.debt;
            if remainder < 0 {
                self.debt = -remainder;
                return None;
            }
            self.debt = 0;
            return relayable(remainder);
        }
        relayable(update)
    }

    #[must_use]
    pub fn is_locked(&self) -> bool { self.locked }

    /// Current signed debt.
    #[must_use]
    pub fn outstanding(&self) -> i64 { self.debt }
}

fn relayable(credit: i64) -> Option<u32> {
    u32::try_from(credit).ok().filter(|credit| *credit > 0)
}

/// State machine that owns a throttle registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ThrottleOwner {
    Inbound(StreamKey),
    Established(StreamKey),
}

/// Registrations of throttle handlers, keyed by the written stream.
#[derive(Debug, Default)]
pub struct ThrottleTable {
    owners: HashMap<StreamKey, ThrottleOwner>,
}

impl ThrottleTable {
    /// Route Window and Reset frames for `stream` to `owner`.
    pub fn add(&mut self, stream: StreamKey, owner: ThrottleOwner) { self.owners.insert(stream, owner); }

    pub fn remove(&mut self, stream: &StreamKey) -> Option<ThrottleOwner> { self.owners.remove(stream) }

    #[must_use]
    pub fn owner(&self, stream: &StreamKey) -> Option<&ThrottleOwner> { self.owners.get(stream) }

    #[must_use]
    pub fn len(&self) -> usize { self.owners.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.owners.is_empty() }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[test]
    fn unlocked_without_debt_relays_unchanged() {
        let mut debt = ThrottleDebt::default();
        assert_eq!(debt.on_window(42), Some(42));
        assert_eq!(debt.on_window(0), None);
    }

    #[rstest]
    #[case::short(40, None, 60)]
    #[case::exact(100, None, 0)]
    #[case::surplus(130, Some(30), 0)]
    fn debt_absorbs_first_updates(#[case] update: u32, #[case] relayed: Option<u32>, #[case] left: i64) {
        let mut debt = ThrottleDebt::default();
        debt.charge(100);
        assert_eq!(debt.on_window(update), relayed);
        assert_eq!(debt.outstanding(), left);
    }

    #[test]
    fn shortfall_accumulates_across_updates() {
        let mut debt = ThrottleDebt::default();
        debt.charge(100);
        assert_eq!(debt.on_window(30), None);
        assert_eq!(debt.on_window(30), None);
        assert_eq!(debt.outstanding(), 40);
        assert_eq!(debt.on_window(50), Some(10));
    }

    #[test]
    fn locked_updates_are_withheld_then_released() {
        let mut debt = ThrottleDebt::default();
        debt.lock();
        assert_eq!(debt.on_window(70), None);
        assert_eq!(debt.on_window(50), None);
        debt.charge(100);
        assert!(debt.is_locked());
        assert_eq!(debt.unlock(), Some(20));
        assert!(!debt.is_locked());
        assert_eq!(debt.outstanding(), 0);
    }

    #[test]
    fn unlock_keeps_unpaid_debt() {
        let mut debt = ThrottleDebt::default();
        debt.lock();
        debt.on_window(10);
        debt.charge(25);
        assert_eq!(debt.unlock(), None);
        assert_eq!(debt.outstanding(), 15);
        assert_eq!(debt.on_window(20), Some(5));
    }

    proptest! {
        #[test]
        fn relayed_credit_never_exceeds_received_minus_pushed(
            pushed in 0u32..10_000,
            locked_updates in proptest::collection::vec(0u32..5_000, 0..4),
            updates in proptest::collection::vec(0u32..5_000, 0..32),
        ) {
            let mut debt = ThrottleDebt::default();
            let mut received: i64 = 0;
            let mut relayed: i64 = 0;

            debt.lock();
            for update in locked_updates {
                received += i64::from(update);
                prop_assert_eq!(debt.on_window(update), None);
            }
            debt.charge(pushed);
            relayed += debt.unlock().map_or(0, i64::from);
            let pushed = i64::from(pushed);
            prop_assert!(relayed <= (received - pushed).max(0));

            for update in updates {
                received += i64::from(update);
                relayed += debt.on_window(update).map_or(0, i64::from);
                prop_assert!(relayed <= (received - pushed).max(0));
                if received >= pushed {
                    prop_assert_eq!(relayed, received - pushed);
                }
            }
        }
    }
}
