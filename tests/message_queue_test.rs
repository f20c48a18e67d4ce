use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use traffic_light::MessageQueue;

const PRODUCERS: usize = 8;
const CONSUMERS: usize = 4;
const SENDS_PER_PRODUCER: usize = 2000;

#[test]
fn single_send_then_receive() {
    let queue = MessageQueue::new();
    queue.send(42);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.receive(), 42);
    assert!(queue.is_empty());
}

#[test]
fn receive_takes_newest_and_drains() {
    let queue = MessageQueue::new();
    queue.send("a");
    queue.send("b");
    queue.send("c");
    assert_eq!(queue.len(), 3);

    assert_eq!(queue.receive(), "c");
    assert!(queue.is_empty());
    assert_eq!(queue.receive_timeout(Duration::from_millis(20)), None);
}

#[test]
fn receive_timeout_on_empty_queue() {
    let queue: MessageQueue<u32> = MessageQueue::default();
    let start = Instant::now();
    assert_eq!(queue.receive_timeout(Duration::from_millis(30)), None);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[test]
fn receive_blocks_until_send() {
    let queue = MessageQueue::new();
    let producer = queue.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let sent_at = Instant::now();
        producer.send(7u32);
        sent_at
    });

    let start = Instant::now();
    assert_eq!(queue.receive(), 7);
    let received_at = Instant::now();
    let sent_at = handle.join().unwrap();

    assert!(received_at.duration_since(start) >= Duration::from_millis(90));
    assert!(received_at.saturating_duration_since(sent_at) < Duration::from_millis(50));
}

#[test]
fn receive_timeout_wakes_on_send() {
    let queue = MessageQueue::new();
    let producer = queue.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        producer.send(1u8);
    });

    assert_eq!(queue.receive_timeout(Duration::from_secs(5)), Some(1));
    handle.join().unwrap();
}

// Under contention a consumer only ever moves forward through each
// producer's sequence, since everything older than what it took was drained.
#[test]
fn concurrent_send_receive() {
    let queue: MessageQueue<(usize, usize)> = MessageQueue::new();
    let done = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut last_seen: HashMap<usize, usize> = HashMap::new();
                let mut received = 0;
                loop {
                    match queue.receive_timeout(Duration::from_millis(10)) {
                        Some((producer, seq)) => {
                            assert!(producer < PRODUCERS);
                            assert!(seq < SENDS_PER_PRODUCER);
                            if let Some(prev) = last_seen.insert(producer, seq) {
                                assert!(seq > prev, "producer {} went back from {} to {}", producer, prev, seq);
                            }
                            received += 1;
                        }
                        None if done.load(Ordering::Acquire) => return received,
                        None => {}
                    }
                }
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = queue.clone();
            thread::spawn(move || {
                for seq in 0..SENDS_PER_PRODUCER {
                    queue.send((producer, seq));
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let received: usize = consumers.into_iter().map(|c| c.join().unwrap()).sum();
    assert!(received > 0);
    assert!(received <= PRODUCERS * SENDS_PER_PRODUCER);
    assert!(queue.is_empty());

    queue.send((0, 0));
    assert_eq!(queue.receive(), (0, 0));
}
