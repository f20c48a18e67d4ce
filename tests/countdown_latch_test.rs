use std::thread;
use std::time::Duration;

use traffic_light::CountdownLatch;

#[test]
fn wait_returns_after_all_countdowns() {
    let latch = CountdownLatch::new(3);
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let latch = latch.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                latch.countdown();
            })
        })
        .collect();

    latch.wait();
    assert_eq!(latch.count(), 0);
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn wait_timeout_reports_unfinished_latch() {
    let latch = CountdownLatch::new(2);
    latch.countdown();
    assert!(!latch.wait_timeout(Duration::from_millis(20)));
    assert_eq!(latch.count(), 1);

    latch.countdown();
    assert!(latch.wait_timeout(Duration::from_millis(20)));
}

#[test]
fn countdown_stops_at_zero() {
    let latch = CountdownLatch::new(0);
    latch.countdown();
    assert_eq!(latch.count(), 0);
    latch.wait();
}
