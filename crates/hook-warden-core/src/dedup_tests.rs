//! Tests for duplicate-delivery suppression.

use super::*;

#[test]
fn test_first_delivery_then_duplicate() {
    let dedup = MessageDeduplicator::default();
    let id = MessageId::new("m1").unwrap();

    assert_eq!(dedup.observe(&id), DeliveryDisposition::FirstDelivery);
    assert_eq!(dedup.observe(&id), DeliveryDisposition::Duplicate);
    assert_eq!(dedup.observe(&id), DeliveryDisposition::Duplicate);
    assert_eq!(dedup.len(), 1);
}

#[test]
fn test_distinct_ids_are_independent() {
    let dedup = MessageDeduplicator::default();
    let first = MessageId::new("m1").unwrap();
    let second = MessageId::new("m2").unwrap();

    assert_eq!(dedup.observe(&first), DeliveryDisposition::FirstDelivery);
    assert_eq!(dedup.observe(&second), DeliveryDisposition::FirstDelivery);
    assert_eq!(dedup.len(), 2);
}

#[test]
fn test_entries_evicted_after_retention_window() {
    let dedup = MessageDeduplicator::new(Duration::from_millis(30));
    let id = MessageId::new("m1").unwrap();

    assert_eq!(dedup.observe(&id), DeliveryDisposition::FirstDelivery);
    std::thread::sleep(Duration::from_millis(50));

    // Outside the window the id counts as new again, and the stale entry
    // is gone from the table.
    assert_eq!(dedup.observe(&id), DeliveryDisposition::FirstDelivery);
    assert_eq!(dedup.len(), 1);
}

#[test]
fn test_empty_table() {
    let dedup = MessageDeduplicator::default();
    assert!(dedup.is_empty());
    assert_eq!(dedup.len(), 0);
}
