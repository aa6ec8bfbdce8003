// tests/debouncer.rs

use std::time::{Duration, Instant};

use devloop::types::{ChangeEvent, ChangeOp};
use devloop::watch::Debouncer;

const WINDOW: Duration = Duration::from_millis(100);

fn ops(debouncer: &mut Debouncer) -> Vec<(String, ChangeOp)> {
    debouncer
        .take()
        .events()
        .iter()
        .map(|e| (e.path.clone(), e.op))
        .collect()
}

#[test]
fn nothing_is_ready_until_the_window_passes_quietly() {
    let start = Instant::now();
    let mut debouncer = Debouncer::new(WINDOW);
    assert!(debouncer.deadline().is_none());

    debouncer.push(ChangeEvent::update("a.go"), start);
    debouncer.push(ChangeEvent::update("b.go"), start + Duration::from_millis(80));

    // The second event pushed the deadline out.
    assert!(debouncer.take_if_ready(start + Duration::from_millis(120)).is_none());
    assert_eq!(
        debouncer.deadline(),
        Some(start + Duration::from_millis(180))
    );

    let batch = debouncer
        .take_if_ready(start + Duration::from_millis(180))
        .expect("batch should be ready");
    assert_eq!(batch.len(), 2);
    assert!(debouncer.is_empty());
}

#[test]
fn atomic_save_becomes_update() {
    let now = Instant::now();
    let mut debouncer = Debouncer::new(WINDOW);
    debouncer.push(ChangeEvent::delete("main.go"), now);
    debouncer.push(ChangeEvent::create("main.go"), now);

    assert_eq!(ops(&mut debouncer), vec![("main.go".to_string(), ChangeOp::Update)]);
}

#[test]
fn update_then_delete_is_delete() {
    let now = Instant::now();
    let mut debouncer = Debouncer::new(WINDOW);
    debouncer.push(ChangeEvent::update("old.go"), now);
    debouncer.push(ChangeEvent::delete("old.go"), now);

    assert_eq!(ops(&mut debouncer), vec![("old.go".to_string(), ChangeOp::Delete)]);
}

#[test]
fn create_then_update_stays_create() {
    let now = Instant::now();
    let mut debouncer = Debouncer::new(WINDOW);
    debouncer.push(ChangeEvent::create("new.css"), now);
    debouncer.push(ChangeEvent::update("new.css"), now);
    debouncer.push(ChangeEvent::update("new.css"), now);

    assert_eq!(ops(&mut debouncer), vec![("new.css".to_string(), ChangeOp::Create)]);
}

#[test]
fn create_then_delete_disappears() {
    let now = Instant::now();
    let mut debouncer = Debouncer::new(WINDOW);
    debouncer.push(ChangeEvent::create("scratch.go"), now);
    debouncer.push(ChangeEvent::update("keep.css"), now);
    debouncer.push(ChangeEvent::delete("scratch.go"), now);

    assert_eq!(ops(&mut debouncer), vec![("keep.css".to_string(), ChangeOp::Update)]);
}

#[test]
fn a_path_can_come_back_after_cancelling_out() {
    let now = Instant::now();
    let mut debouncer = Debouncer::new(WINDOW);
    debouncer.push(ChangeEvent::create("x.go"), now);
    debouncer.push(ChangeEvent::delete("x.go"), now);
    debouncer.push(ChangeEvent::create("x.go"), now);

    assert_eq!(ops(&mut debouncer), vec![("x.go".to_string(), ChangeOp::Create)]);
}

#[test]
fn observation_order_is_kept_across_paths() {
    let now = Instant::now();
    let mut debouncer = Debouncer::new(WINDOW);
    for path in ["c", "a", "b"] {
        debouncer.push(ChangeEvent::update(path), now);
    }
    debouncer.push(ChangeEvent::update("a"), now);

    let paths: Vec<String> = ops(&mut debouncer).into_iter().map(|(p, _)| p).collect();
    assert_eq!(paths, vec!["c", "a", "b"]);
}
