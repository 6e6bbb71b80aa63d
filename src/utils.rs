use std::time::{Duration, Instant};

use chrono::Local;

/// Run timestamp used in output file names, e.g. `20240131154502`
pub fn run_timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// Sensor microseconds as `HH:MM:SS.mmm` of the sensor clock
pub fn format_sensor_time(timestamp_us: i64) -> String {
    let total_ms = timestamp_us.max(0) / 1000;
    let ms = total_ms % 1000;
    let secs = total_ms / 1000;
    format!("{:02}:{:02}:{:02}.{:03}", (secs / 3600) % 24, (secs / 60) % 60, secs % 60, ms)
}

/// Turns irregular repaints into fixed-rate task ticks.
///
/// The GUI repaints whenever it likes; `poll` reports at most one tick per
/// call, and only once a full frame period has passed since the last one.
#[derive(Debug)]
pub struct FrameClock {
    period: Duration,
    last_tick: Option<Instant>,
}

impl FrameClock {
    pub fn new(framerate: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / framerate.max(1.0));
        Self { period, last_tick: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Seconds since the previous tick if a tick is due at `now`
    pub fn poll(&mut self, now: Instant) -> Option<f64> {
        match self.last_tick {
            None => {
                self.last_tick = Some(now);
                Some(self.period.as_secs_f64())
            }
            Some(last) => {
                let since = now.saturating_duration_since(last);
                if since < self.period {
                    return None;
                }
                // catch up on one period, not on every missed one
                let next = if since >= self.period * 2 { now } else { last + self.period };
                self.last_tick = Some(next);
                Some(since.as_secs_f64())
            }
        }
    }

    /// Time until the next tick is due, for scheduling the repaint
    pub fn until_next(&self, now: Instant) -> Duration {
        match self.last_tick {
            None => Duration::ZERO,
            Some(last) => (last + self.period).saturating_duration_since(now),
        }
    }

    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sensor_time() {
        assert_eq!(format_sensor_time(3_723_004_000), "01:02:03.004");
    }

    #[test]
    fn ticks_at_most_once_per_period() {
        let mut clock = FrameClock::new(50.0);
        let t0 = Instant::now();
        assert!(clock.poll(t0).is_some());
        assert!(clock.poll(t0 + Duration::from_millis(5)).is_none());
        let dt = clock.poll(t0 + Duration::from_millis(20)).unwrap();
        assert!((dt - 0.02).abs() < 1e-9);
        assert!(clock.poll(t0 + Duration::from_millis(21)).is_none());
        assert_eq!(clock.until_next(t0 + Duration::from_millis(30)), Duration::from_millis(10));
    }

    #[test]
    fn long_stalls_do_not_burst() {
        let mut clock = FrameClock::new(50.0);
        let t0 = Instant::now();
        clock.poll(t0);
        assert!(clock.poll(t0 + Duration::from_millis(200)).is_some());
        assert!(clock.poll(t0 + Duration::from_millis(201)).is_none());
    }
}
