//! Scheduler behaviour across whole sessions.
//!
//! Determinism: the same configuration always yields the same ordered
//! sequence of (event, time) pairs. Periodic bars never land on the open or
//! the close.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use proptest::prelude::*;
use simclock_core::time::{
    Frequency, Scheduler, SessionConfig, TimeEvent, TimeOfDay, TradingCalendar,
};

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn all_events() -> Vec<TimeEvent> {
    vec![
        TimeEvent::BeforeMarketOpen,
        TimeEvent::MarketOpen,
        TimeEvent::IntradayBar,
        TimeEvent::MarketClose,
        TimeEvent::AfterMarketClose,
    ]
}

// ──── concrete scenario ────

#[test]
fn first_periodic_event_after_open_is_one_step_later() {
    let session = SessionConfig::default()
        .with_market_open(TimeOfDay::hm(13, 30))
        .with_market_close(TimeOfDay::hm(20, 0))
        .with_intraday_frequency(Frequency::Min1);
    let scheduler = Scheduler::with_events(
        session,
        [TimeEvent::MarketOpen, TimeEvent::MarketClose, TimeEvent::IntradayBar],
    );
    let (event, time) = scheduler.next_event(at(2, 13, 30)).unwrap().unwrap();
    assert_eq!(event, TimeEvent::IntradayBar);
    assert_eq!(time, at(2, 13, 31));
}

// ──── full session ────

#[test]
fn one_day_of_five_minute_bars() {
    let session = SessionConfig::us_equities().with_intraday_frequency(Frequency::Min5);
    let scheduler = Scheduler::with_events(session, all_events());
    let day: Vec<(TimeEvent, NaiveDateTime)> = scheduler
        .upcoming(at(2, 0, 0), 200)
        .unwrap()
        .into_iter()
        .filter(|(_, t)| t.date() == at(2, 0, 0).date())
        .collect();

    assert_eq!(day.first(), Some(&(TimeEvent::BeforeMarketOpen, at(2, 13, 0))));
    assert_eq!(day[1], (TimeEvent::MarketOpen, at(2, 13, 30)));
    assert_eq!(day.last(), Some(&(TimeEvent::AfterMarketClose, at(2, 20, 30))));

    let bars: Vec<NaiveDateTime> = day
        .iter()
        .filter(|(e, _)| *e == TimeEvent::IntradayBar)
        .map(|(_, t)| *t)
        .collect();
    // 13:35 ..= 19:50 every five minutes; 19:55 is close - step
    assert_eq!(bars.len(), 76);
    assert_eq!(bars.first(), Some(&at(2, 13, 35)));
    assert_eq!(bars.last(), Some(&at(2, 19, 50)));
    assert!(!bars.contains(&at(2, 19, 55)));
}

#[test]
fn holidays_are_skipped() {
    let holiday = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let session = SessionConfig::us_equities()
        .with_calendar(TradingCalendar::weekdays().with_holidays([holiday]));
    let scheduler = Scheduler::with_events(session, [TimeEvent::MarketOpen]);
    // Friday 2024-01-12 after the open → Tuesday 2024-01-16
    let (_, time) = scheduler.next_event(at(12, 14, 0)).unwrap().unwrap();
    assert_eq!(time, at(16, 13, 30));
}

#[test]
fn same_config_same_sequence() {
    let build = || {
        let mut s = Scheduler::new(SessionConfig::us_equities());
        for e in all_events() {
            s.subscribe(e);
        }
        s.subscribe(TimeEvent::one_shot(at(3, 15, 0), "rebalance"));
        s
    };
    let a = build().upcoming(at(1, 0, 0), 2_000).unwrap();
    let b = build().upcoming(at(1, 0, 0), 2_000).unwrap();
    assert_eq!(a.len(), 2_000);
    assert_eq!(a, b);
    assert!(a.windows(2).all(|w| w[0].1 <= w[1].1));
}

// ──── properties ────

proptest! {
    #[test]
    fn next_event_is_strictly_later_and_on_the_grid(
        day in 1u32..28,
        minute_of_day in 0u32..(24 * 60),
        freq_idx in 0usize..6,
    ) {
        let frequency = Frequency::ALL[freq_idx];
        let session = SessionConfig::us_equities().with_intraday_frequency(frequency);
        let scheduler = Scheduler::with_events(session, all_events());
        let now = at(day, minute_of_day / 60, minute_of_day % 60);

        let batch = scheduler.next_events(now).unwrap().unwrap();
        prop_assert!(batch.time > now);
        prop_assert!(!batch.events.is_empty());
        let mut sorted = batch.events.clone();
        sorted.sort();
        prop_assert_eq!(&sorted, &batch.events);

        for event in &batch.events {
            if *event == TimeEvent::IntradayBar {
                let minutes = (batch.time.hour() * 60 + batch.time.minute()) as i64;
                let open = 13 * 60 + 30;
                let step = frequency.minutes().unwrap();
                prop_assert!(minutes >= open + step && minutes < 20 * 60 - step);
                prop_assert_eq!((minutes - open) % step, 0);
            }
        }
    }
}
