// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::packet::number::PacketNumber;

/// Duplicate detection for received packet numbers.
///
/// A 128-bit mask shadows the most recent packet numbers: bit zero is the
/// largest value seen so far and bit `i` records whether `largest - i` was
/// received. Anything older than the mask reaches is reported as `TooOld`
/// and dropped, since a packet that far behind has either been delivered
/// already or abandoned by the peer's loss recovery.
#[derive(Default, Debug)]
pub struct SlidingWindow {
    seen: Mask,
    largest: Option<PacketNumber>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlidingWindowError {
    Duplicate,
    TooOld,
}

type Mask = u128;

/// How many packet numbers the mask shadows, ending at the largest
pub const WINDOW_LEN: u64 = Mask::BITS as u64;

impl SlidingWindow {
    /// Reports whether `packet_number` was already recorded, without
    /// recording it
    pub fn check(&self, packet_number: PacketNumber) -> Result<(), SlidingWindowError> {
        let largest = match self.largest {
            Some(largest) => largest,
            None => return Ok(()),
        };

        match largest.checked_distance(packet_number) {
            // ahead of everything seen so far
            None => Ok(()),
            Some(age) if age >= WINDOW_LEN => Err(SlidingWindowError::TooOld),
            Some(age) => {
                if self.seen & (1 << age) != 0 {
                    Err(SlidingWindowError::Duplicate)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Records `packet_number`.
    ///
    /// Returns `Duplicate` if it was recorded before, or `TooOld` when it
    /// is beyond the reach of the mask and cannot be judged.
    pub fn insert(&mut self, packet_number: PacketNumber) -> Result<(), SlidingWindowError> {
        let largest = match self.largest {
            Some(largest) => largest,
            None => {
                self.largest = Some(packet_number);
                self.seen = 1;
                return Ok(());
            }
        };

        match largest.checked_distance(packet_number) {
            None => {
                let advance = packet_number
                    .checked_distance(largest)
                    .expect("the packet number is ahead of the largest");

                // slide the history up; a jump past the whole mask starts a
                // fresh one holding only the new largest
                self.seen = if advance < WINDOW_LEN {
                    (self.seen << advance) | 1
                } else {
                    1
                };
                self.largest = Some(packet_number);
                Ok(())
            }
            Some(age) if age >= WINDOW_LEN => Err(SlidingWindowError::TooOld),
            Some(age) => {
                let bit = 1 << age;
                if self.seen & bit != 0 {
                    return Err(SlidingWindowError::Duplicate);
                }
                self.seen |= bit;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{packet::number::PacketNumberSpace, varint::VarInt};
    use SlidingWindowError::*;

    fn pn(value: u64) -> PacketNumber {
        PacketNumberSpace::ApplicationData.new_packet_number(VarInt::new(value).unwrap())
    }

    /// Checking and inserting must always agree
    fn record(window: &mut SlidingWindow, value: u64) -> Result<(), SlidingWindowError> {
        let checked = window.check(pn(value));
        let inserted = window.insert(pn(value));
        assert_eq!(checked, inserted);
        inserted
    }

    #[test]
    fn reordered_arrivals_test() {
        let mut window = SlidingWindow::default();

        // arrivals out of order, with gaps filled late
        for value in [0, 1, 2, 5, 8, 7, 3, 6, 4] {
            assert_eq!(record(&mut window, value), Ok(()));
        }

        // every value delivered once is now a duplicate
        for value in 0..=8 {
            assert_eq!(record(&mut window, value), Err(Duplicate));
        }

        // the next value is still fresh
        assert_eq!(record(&mut window, 9), Ok(()));
    }

    #[test]
    fn window_reach_test() {
        let mut window = SlidingWindow::default();
        window.insert(pn(WINDOW_LEN)).unwrap();

        // the oldest value the mask still shadows
        assert_eq!(record(&mut window, 1), Ok(()));
        assert_eq!(record(&mut window, 1), Err(Duplicate));

        // one further back cannot be judged
        assert_eq!(record(&mut window, 0), Err(TooOld));
    }

    #[test]
    fn large_jump_resets_history_test() {
        let mut window = SlidingWindow::default();
        for value in 0..8 {
            window.insert(pn(value)).unwrap();
        }

        // jumping far ahead drops the old history entirely
        let far = WINDOW_LEN * 3;
        assert_eq!(record(&mut window, far), Ok(()));
        assert_eq!(record(&mut window, far), Err(Duplicate));
        assert_eq!(record(&mut window, 7), Err(TooOld));

        // values just behind the new largest are trackable again
        assert_eq!(record(&mut window, far - 1), Ok(()));
    }

    #[test]
    fn moderate_slide_keeps_history_test() {
        let mut window = SlidingWindow::default();
        window.insert(pn(10)).unwrap();
        window.insert(pn(12)).unwrap();

        // slide by a few positions; earlier entries stay visible
        window.insert(pn(40)).unwrap();
        assert_eq!(record(&mut window, 10), Err(Duplicate));
        assert_eq!(record(&mut window, 12), Err(Duplicate));
        assert_eq!(record(&mut window, 11), Ok(()));
    }
}
