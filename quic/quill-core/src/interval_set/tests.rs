// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use bolero::{check, generator::*};
use std::collections::BTreeSet;

fn interval(start: u64, end: u64) -> Interval<u64> {
    Interval::new(start, end)
}

#[test]
fn insert_merges_adjacent_test() {
    let mut set = IntervalSet::new();

    set.insert_value(0);
    set.insert_value(1);
    set.insert_value(2);
    assert_eq!(set.interval_len(), 1);

    set.insert_value(4);
    assert_eq!(set.interval_len(), 2);

    // filling the hole collapses everything into a single run
    set.insert_value(3);
    assert_eq!(set.interval_len(), 1);
    assert_eq!(set.count(), 5);
    assert_eq!(set.min_value(), Some(0));
    assert_eq!(set.max_value(), Some(4));
    set.check_integrity();
}

#[test]
fn insert_overlapping_test() {
    let mut set = IntervalSet::new();
    set.insert(interval(0, 3));
    set.insert(interval(8, 11));
    set.insert(interval(16, 19));

    set.insert(interval(2, 17));
    assert_eq!(set.interval_len(), 1);
    assert_eq!(set.get(0), Some(interval(0, 19)));
    set.check_integrity();
}

#[test]
fn remove_splits_test() {
    let mut set = IntervalSet::new();
    set.insert(interval(0, 9));

    set.remove(interval(3, 5));
    assert_eq!(set.interval_len(), 2);
    assert_eq!(set.get(0), Some(interval(0, 2)));
    assert_eq!(set.get(1), Some(interval(6, 9)));

    set.remove(interval(0, 9));
    assert!(set.is_empty());
    set.check_integrity();
}

#[test]
fn contains_interval_test() {
    let mut set = IntervalSet::new();
    set.insert(interval(4, 8));

    assert!(set.contains_interval(interval(4, 8)));
    assert!(set.contains_interval(interval(5, 6)));
    assert!(!set.contains_interval(interval(3, 8)));
    assert!(!set.contains_interval(interval(4, 9)));
    assert!(!set.contains(&3));
    assert!(set.contains(&4));
}

#[test]
fn pop_min_test() {
    let mut set = IntervalSet::new();
    set.insert(interval(5, 6));
    set.insert(interval(1, 2));

    assert_eq!(set.pop_min(), Some(interval(1, 2)));
    assert_eq!(set.pop_min(), Some(interval(5, 6)));
    assert_eq!(set.pop_min(), None);
}

#[derive(Clone, Copy, Debug, TypeGenerator)]
enum Operation {
    Insert { start: u8, len: u8 },
    Remove { start: u8, len: u8 },
}

/// Checks every operation sequence against a value-per-entry model set
#[test]
fn model_test() {
    check!()
        .with_type::<Vec<Operation>>()
        .for_each(|operations| {
            let mut subject: IntervalSet<u64> = IntervalSet::new();
            let mut model: BTreeSet<u64> = BTreeSet::new();

            for operation in operations {
                match *operation {
                    Operation::Insert { start, len } => {
                        let start = start as u64;
                        let end = start + len as u64;
                        subject.insert(interval(start, end));
                        model.extend(start..=end);
                    }
                    Operation::Remove { start, len } => {
                        let start = start as u64;
                        let end = start + len as u64;
                        subject.remove(interval(start, end));
                        for value in start..=end {
                            model.remove(&value);
                        }
                    }
                }

                subject.check_integrity();
            }

            assert_eq!(subject.count(), model.len() as u64);
            let mut values = model.iter();
            for interval in subject.intervals() {
                for value in interval.start..=interval.end {
                    assert_eq!(values.next(), Some(&value));
                }
            }
        });
}
