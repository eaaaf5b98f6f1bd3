//! Scan cursor paging over a real connection: multi-page exhaustion and
//! the close-vs-natural-exhaustion split (the one area the unit tests in
//! `ignite-client::cursor` can't exercise, since they never issue a second
//! page request over the wire).

use ignite_client::request::scan::ScanQuery;
use ignite_core::Value;

use crate::fake_node::{self, FakeNode, ScanPage};

#[test]
fn scan_pages_through_multiple_round_trips_then_exhausts() {
    let node = FakeNode::start();
    {
        let mut script = node.script.lock().unwrap();
        script.scan_pages = vec![
            ScanPage { rows: vec![(Value::Int(1), Value::Int(10))], more: true },
            ScanPage { rows: vec![(Value::Int(2), Value::Int(20))], more: true },
            ScanPage { rows: vec![(Value::Int(3), Value::Int(30))], more: false },
        ];
    }

    let client = crate::connect(&node);
    let mut cursor = client.cache::<(), ()>("people").scan(&ScanQuery::new()).unwrap();

    let mut rows = Vec::new();
    while let Some(row) = cursor.next().unwrap() {
        rows.push(row);
    }

    assert_eq!(
        rows,
        vec![
            (Value::Int(1), Value::Int(10)),
            (Value::Int(2), Value::Int(20)),
            (Value::Int(3), Value::Int(30)),
        ]
    );
    // Natural exhaustion keeps returning None, never an error.
    assert_eq!(cursor.next().unwrap(), None);
}

#[test]
fn closing_a_cursor_before_exhaustion_issues_resource_close() {
    let node = FakeNode::start();
    {
        let mut script = node.script.lock().unwrap();
        script.scan_pages = vec![ScanPage { rows: vec![(Value::Int(1), Value::Int(10))], more: true }];
    }

    let client = crate::connect(&node);
    let mut cursor = client.cache::<(), ()>("people").scan(&ScanQuery::new()).unwrap();
    cursor.next().unwrap();
    cursor.close().unwrap();

    assert!(matches!(cursor.next(), Err(ignite_client::IgniteError::CursorClosed)));
    assert!(node
        .script
        .lock()
        .unwrap()
        .requests_seen
        .contains(&fake_node::op_code::RESOURCE_CLOSE));
}

#[test]
fn closing_an_already_exhausted_cursor_does_not_round_trip_again() {
    let node = FakeNode::start();
    {
        let mut script = node.script.lock().unwrap();
        script.scan_pages = vec![ScanPage { rows: vec![(Value::Int(1), Value::Int(10))], more: false }];
    }

    let client = crate::connect(&node);
    let mut cursor = client.cache::<(), ()>("people").scan(&ScanQuery::new()).unwrap();
    assert_eq!(cursor.next().unwrap(), Some((Value::Int(1), Value::Int(10))));
    assert_eq!(cursor.next().unwrap(), None);

    cursor.close().unwrap();
    assert!(!node
        .script
        .lock()
        .unwrap()
        .requests_seen
        .contains(&fake_node::op_code::RESOURCE_CLOSE));
}
