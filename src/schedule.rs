//! Timelapse scheduling: fixed-cadence shots until a deadline or Ctrl-C.
//!
//! The loop is deliberately simple: shoot, count, sleep, repeat. Two details
//! carry the correctness weight:
//!
//! - **Deadline checks bracket the shot.** A shot never *starts* at or after
//!   the stop time, and the deadline is re-checked after each shot so the
//!   loop does not sleep a full interval past it.
//! - **No catch-up.** A shot delayed past its nominal time does not trigger
//!   back-to-back compensating shots; the next sleep is always a full
//!   interval.
//!
//! Inter-shot sleeps go through [`CancelToken::wait`], so Ctrl-C ends the
//! run promptly with a graceful success/total summary instead of aborting
//! mid-actuation. The final tally always includes failed shots.

use crate::cancel::CancelToken;
use crate::shutter::{ShutterActuator, ShutterTransport};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime};
use std::time::Duration;

/// Timelapse parameters and running counters. Mutated only by [`run`];
/// `shot_count` increases monotonically.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub interval: Duration,
    /// Absent means run until cancelled.
    pub stop_at: Option<DateTime<Local>>,
    pub shot_count: u64,
    pub success_count: u64,
}

impl Schedule {
    pub fn new(interval: Duration, stop_at: Option<DateTime<Local>>) -> Self {
        Self {
            interval,
            stop_at,
            shot_count: 0,
            success_count: 0,
        }
    }
}

/// Parse an `HH:MM` stop time relative to `now`.
///
/// The time is taken as today; if that moment is more than 60 seconds in
/// the past it rolls to tomorrow. The one-minute grace window lets a run
/// started at 23:30:05 use `--stop-at 23:30`-style times a few seconds back
/// without silently scheduling a day-long shoot.
pub fn parse_stop_time_at(raw: &str, now: DateTime<Local>) -> Result<DateTime<Local>, String> {
    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| format!("invalid time '{raw}' — use HH:MM (e.g. 23:30)"))?;
    let candidate = now
        .date_naive()
        .and_time(time)
        .and_local_timezone(Local)
        .earliest()
        .ok_or_else(|| format!("time '{raw}' does not exist today (DST gap)"))?;
    if candidate - now < ChronoDuration::seconds(-60) {
        let tomorrow = candidate + ChronoDuration::days(1);
        tracing::info!(
            stop_at = %tomorrow.format("%Y-%m-%d %H:%M"),
            "stop time already passed today — assuming tomorrow"
        );
        Ok(tomorrow)
    } else {
        Ok(candidate)
    }
}

/// Clap-facing wrapper around [`parse_stop_time_at`].
pub fn parse_stop_time(raw: &str) -> Result<DateTime<Local>, String> {
    parse_stop_time_at(raw, Local::now())
}

fn deadline_reached(stop_at: Option<DateTime<Local>>) -> bool {
    match stop_at {
        Some(stop) => Local::now() >= stop,
        None => false,
    }
}

/// Drive the actuator at the schedule's cadence until the deadline passes or
/// the token cancels. Returns with the schedule's counters final.
pub fn run<T: ShutterTransport>(
    schedule: &mut Schedule,
    actuator: &mut ShutterActuator<T>,
    af: bool,
    cancel: &CancelToken,
) {
    match schedule.stop_at {
        Some(stop) => tracing::info!(
            interval = schedule.interval.as_secs_f64(),
            stop_at = %stop.format("%H:%M"),
            "starting timelapse"
        ),
        None => tracing::info!(
            interval = schedule.interval.as_secs_f64(),
            "starting timelapse — no stop time, Ctrl-C to finish"
        ),
    }

    // Session-start safety pass: release any shutter left stuck by a
    // previous run before the first press.
    actuator.recover();

    loop {
        if cancel.is_cancelled() {
            tracing::info!("cancelled");
            break;
        }
        if deadline_reached(schedule.stop_at) {
            tracing::info!("stop time reached");
            break;
        }

        schedule.shot_count += 1;
        let shot = schedule.shot_count;
        match schedule.stop_at {
            Some(stop) => {
                let remaining = stop - Local::now();
                tracing::info!(shot, remaining_secs = remaining.num_seconds(), "taking shot");
            }
            None => tracing::info!(shot, "taking shot"),
        }

        if actuator.take_shot(af) {
            schedule.success_count += 1;
            tracing::debug!(shot, "shot completed");
        } else {
            tracing::error!(shot, "shot failed");
            // Best-effort cleanup so the next cycle starts from Idle.
            actuator.recover();
        }

        if deadline_reached(schedule.stop_at) {
            tracing::info!("stop time reached");
            break;
        }
        if cancel.wait(schedule.interval) {
            tracing::info!("cancelled during wait");
            break;
        }
    }

    tracing::info!(
        successful = schedule.success_count,
        total = schedule.shot_count,
        "timelapse finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel;
    use crate::shutter::tests::FakeTransport;
    use chrono::TimeZone;

    fn actuator(transport: &FakeTransport) -> ShutterActuator<'_, FakeTransport> {
        ShutterActuator::new(transport, "/ccapi/ver100/shooting/control/shutterbutton/manual")
    }

    // =========================================================================
    // Stop time parsing
    // =========================================================================

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn future_time_stays_today() {
        let now = local(2026, 8, 27, 10, 0, 0);
        let stop = parse_stop_time_at("23:30", now).unwrap();
        assert_eq!(stop, local(2026, 8, 27, 23, 30, 0));
    }

    #[test]
    fn time_more_than_a_minute_past_rolls_to_tomorrow() {
        let now = local(2026, 8, 27, 10, 0, 0);
        let stop = parse_stop_time_at("06:30", now).unwrap();
        assert_eq!(stop, local(2026, 8, 28, 6, 30, 0));
    }

    #[test]
    fn time_within_grace_window_stays_today() {
        // 30 seconds in the past is within the 60 s grace window.
        let now = local(2026, 8, 27, 10, 0, 30);
        let stop = parse_stop_time_at("10:00", now).unwrap();
        assert_eq!(stop, local(2026, 8, 27, 10, 0, 0));
    }

    #[test]
    fn exactly_sixty_seconds_past_stays_today() {
        let now = local(2026, 8, 27, 10, 1, 0);
        let stop = parse_stop_time_at("10:00", now).unwrap();
        assert_eq!(stop, local(2026, 8, 27, 10, 0, 0));
    }

    #[test]
    fn bad_format_is_an_error() {
        let now = local(2026, 8, 27, 10, 0, 0);
        assert!(parse_stop_time_at("25:99", now).is_err());
        assert!(parse_stop_time_at("soon", now).is_err());
        assert!(parse_stop_time_at("10:00:00", now).is_err());
    }

    // =========================================================================
    // Run loop
    // =========================================================================

    #[test]
    fn deadline_before_first_shot_means_zero_shots() {
        let transport = FakeTransport::with_responses(&[200]); // initial recovery only
        let mut act = actuator(&transport);
        let (_tx, token) = cancel::manual();
        let stop = Local::now() - ChronoDuration::seconds(1);
        let mut schedule = Schedule::new(Duration::from_millis(10), Some(stop));
        run(&mut schedule, &mut act, false, &token);
        assert_eq!(schedule.shot_count, 0);
        assert_eq!(schedule.success_count, 0);
    }

    #[test]
    fn deadline_shorter_than_interval_takes_exactly_one_shot() {
        // Stop 80 ms out with a 300 ms interval: the first shot starts
        // before the deadline, the post-shot sleep crosses it, and no
        // second shot starts.
        let transport = FakeTransport::with_responses(&[200, 200, 200]); // recovery, press, release
        let mut act = actuator(&transport);
        let (_tx, token) = cancel::manual();
        let stop = Local::now() + ChronoDuration::milliseconds(80);
        let mut schedule = Schedule::new(Duration::from_millis(300), Some(stop));
        run(&mut schedule, &mut act, false, &token);
        assert_eq!(schedule.shot_count, 1);
        assert_eq!(schedule.success_count, 1);
    }

    #[test]
    fn failed_shots_stay_in_the_tally() {
        // Recovery ok; press rejected twice (shot 1 fails); post-failure
        // recovery ok; then the deadline passes during the sleep.
        let transport = FakeTransport::with_responses(&[200, 500, 500, 200]);
        let mut act = actuator(&transport);
        let (_tx, token) = cancel::manual();
        let stop = Local::now() + ChronoDuration::milliseconds(80);
        let mut schedule = Schedule::new(Duration::from_millis(300), Some(stop));
        run(&mut schedule, &mut act, false, &token);
        assert_eq!(schedule.shot_count, 1);
        assert_eq!(schedule.success_count, 0);
    }

    #[test]
    fn cancellation_during_sleep_ends_the_loop() {
        let transport = FakeTransport::with_responses(&[200, 200, 200]);
        let mut act = actuator(&transport);
        let (tx, token) = cancel::manual();
        // No deadline: only cancellation can end the run.
        let mut schedule = Schedule::new(Duration::from_secs(60), None);
        tx.send(()).unwrap(); // cancel before the first inter-shot sleep
        let start = std::time::Instant::now();
        run(&mut schedule, &mut act, false, &token);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(schedule.shot_count <= 1);
    }

    #[test]
    fn run_starts_with_a_recovery_pass() {
        let transport = FakeTransport::with_responses(&[200, 200, 200]);
        let mut act = actuator(&transport);
        let (_tx, token) = cancel::manual();
        let stop = Local::now() + ChronoDuration::milliseconds(50);
        let mut schedule = Schedule::new(Duration::from_millis(300), Some(stop));
        run(&mut schedule, &mut act, false, &token);
        let first = transport.sent.borrow()[0].clone();
        assert_eq!(first, serde_json::json!({"af": false, "action": "release"}));
    }
}
