//! Banner queue lifecycle on the virtual clock, plus the tokio-timer driver.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use feed_router::banner::{
    BannerCard, BannerEvent, BannerPhase, BannerQueue, BannerTimings, GestureOutcome,
    ManualScheduler, TimerScheduler, TokioScheduler,
};
use feed_router::model::{Alert, AlertType, Impact};

fn alert(id: &str) -> Alert {
    Alert::new(id, AlertType::Cpi, format!("CPI print {id}"), Impact::High, Utc::now())
        .with_source("BLS")
}

fn cards(ids: &[&str]) -> Vec<BannerCard> {
    ids.iter().map(|id| BannerCard::from(&alert(id))).collect()
}

fn queue() -> BannerQueue<ManualScheduler> {
    BannerQueue::new(BannerTimings::default(), ManualScheduler::new())
}

fn current_id<S: TimerScheduler>(q: &BannerQueue<S>) -> Option<String> {
    q.current().map(|c| c.id.clone())
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn three_alerts_play_in_arrival_order() {
    let mut q = queue();
    q.enqueue(cards(&["a1", "a2", "a3"]));
    assert_eq!(current_id(&q).as_deref(), Some("a1"));
    let backlog: Vec<_> = q.backlog().map(|c| c.id.clone()).collect();
    assert_eq!(backlog, vec!["a2", "a3"]);

    let mut shown = vec![current_id(&q).unwrap_or_default()];
    for _ in 0..2 {
        q.dismiss_current();
        let events = q.advance(ms(300 + 400));
        for ev in events {
            if let BannerEvent::Shown { card } = ev {
                shown.push(card.id);
            }
        }
    }
    assert_eq!(shown, vec!["a1", "a2", "a3"]);

    q.advance(ms(5_000 + 300));
    assert_eq!(q.phase(), BannerPhase::Idle);
    for id in ["a1", "a2", "a3"] {
        assert!(q.is_dismissed(id));
    }
}

#[test]
fn enqueue_during_dismissal_is_queued_not_shown() {
    let mut q = queue();
    q.enqueue(cards(&["a1"]));
    q.dismiss_current();
    assert!(q.enqueue(cards(&["a2"])).is_empty());
    assert_eq!(q.phase(), BannerPhase::Dismissing);

    let ev = q.advance(ms(300));
    assert_eq!(ev, vec![BannerEvent::Dismissed { id: "a1".into() }]);
    let ev = q.advance(ms(400));
    assert!(matches!(&ev[..], [BannerEvent::Shown { card }] if card.id == "a2"));
}

#[test]
fn at_most_one_current_and_no_backlog_repeats() {
    let mut q = queue();
    for round in 0..5 {
        q.enqueue(cards(&["x", "y", "x", "z", "y"]));
        let ids: Vec<_> = q.backlog().map(|c| c.id.as_str()).collect();
        let mut uniq = ids.clone();
        uniq.sort();
        uniq.dedup();
        assert_eq!(ids.len(), uniq.len(), "round {round}: {ids:?}");
        if let Some(cur) = q.current() {
            assert!(!ids.contains(&cur.id.as_str()));
        }
        q.advance(ms(1_700));
    }
}

#[test]
fn tap_dismisses_and_navigates() {
    let visited = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut q = queue();
    let sink = visited.clone();
    q.on_navigate(move |id| sink.lock().unwrap().push(id.to_string()));
    q.enqueue(cards(&["n1", "n2"]));

    let t0 = Instant::now();
    q.touch_start(t0);
    q.touch_move(1.0, -1.0);
    let (outcome, events) = q.touch_end(t0 + ms(90), 0.0);

    assert_eq!(outcome, GestureOutcome::Tap);
    assert!(events.contains(&BannerEvent::Navigate { id: "n1".into() }));
    assert_eq!(q.phase(), BannerPhase::Dismissing);
    assert_eq!(q.take_highlight().as_deref(), Some("n1"));
    assert_eq!(q.take_highlight(), None);
    assert_eq!(*visited.lock().unwrap(), vec!["n1".to_string()]);
}

#[test]
fn swipe_below_threshold_snaps_back_and_keeps_timer() {
    let mut q = queue();
    q.enqueue(cards(&["s1"]));
    q.advance(ms(1_000));

    let t0 = Instant::now();
    q.touch_start(t0);
    q.touch_move(0.0, -20.0);
    assert!(q.is_swiping());
    let (outcome, events) = q.touch_end(t0 + ms(150), -100.0);
    assert_eq!(outcome, GestureOutcome::SnapBack);
    assert!(events.is_empty());
    assert_eq!(q.phase(), BannerPhase::Showing);

    // Original countdown still runs.
    let ev = q.advance(ms(4_000));
    assert_eq!(ev, vec![BannerEvent::Dismissing { id: "s1".into() }]);
}

#[test]
fn swipe_past_threshold_dismisses_without_navigating() {
    let visited = Arc::new(Mutex::new(0usize));
    let mut q = queue();
    let sink = visited.clone();
    q.on_navigate(move |_| *sink.lock().unwrap() += 1);
    q.enqueue(cards(&["s1"]));

    let t0 = Instant::now();
    q.touch_start(t0);
    q.touch_move(0.0, -60.0);
    let (outcome, events) = q.touch_end(t0 + ms(100), 0.0);
    assert_eq!(outcome, GestureOutcome::Dismiss);
    assert_eq!(events, vec![BannerEvent::Dismissing { id: "s1".into() }]);
    assert_eq!(*visited.lock().unwrap(), 0);
    assert!(q.highlighted().is_none());
}

#[test]
fn reset_forgets_dismissed_ids() {
    let mut q = queue();
    q.enqueue(cards(&["r1"]));
    q.advance(ms(6_000));
    assert!(q.is_dismissed("r1"));
    q.reset();
    assert!(!q.is_dismissed("r1"));
    assert_eq!(q.enqueue(cards(&["r1"])).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn tokio_timers_drive_the_queue() {
    let (scheduler, mut fired) = TokioScheduler::new();
    let mut q = BannerQueue::new(BannerTimings::default(), scheduler);
    q.enqueue(cards(&["t1", "t2"]));

    let mut shown = vec!["t1".to_string()];
    while shown.len() < 2 {
        let Some(id) = fired.recv().await else { break };
        for ev in q.on_timer(id) {
            if let BannerEvent::Shown { card } = ev {
                shown.push(card.id);
            }
        }
    }
    assert_eq!(shown, vec!["t1", "t2"]);
    assert!(q.is_dismissed("t1"));
    assert_eq!(q.scheduler().live(), 1);
}
