//! Slot computation for a (master, date, service duration) triple.
//!
//! Candidates are enumerated on a fixed grid anchored at opening time. The
//! grid intentionally discards gaps between bookings that do not fall on a
//! grid point: slot boundaries stay on a human-friendly cadence.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike};

/// Business-hours grid. Times are minutes from midnight.
#[derive(Debug, Clone, Copy)]
pub struct SlotGrid {
    pub open: u32,
    pub close: u32,
    pub step: u32,
    /// Same-day lead time: earliest bookable start is now + lead.
    pub lead: u32,
}

impl SlotGrid {
    pub fn new(work_start_hour: u32, work_end_hour: u32, step_minutes: u32, lead_minutes: u32) -> Self {
        SlotGrid {
            open: work_start_hour * 60,
            close: work_end_hour * 60,
            step: step_minutes,
            lead: lead_minutes,
        }
    }
}

/// An occupied [start, start+duration) span, minutes from midnight.
#[derive(Debug, Clone, Copy)]
pub struct BusyInterval {
    pub start: u32,
    pub duration: u32,
}

impl BusyInterval {
    pub fn from_time(start: NaiveTime, duration_minutes: i32) -> Self {
        BusyInterval {
            start: start.hour() * 60 + start.minute(),
            duration: duration_minutes.max(0) as u32,
        }
    }
}

/// Half-open interval intersection: [a1, a2) and [b1, b2) intersect iff
/// a1 < b2 && b1 < a2.
fn intersects(a1: u32, a2: u32, b1: u32, b2: u32) -> bool {
    a1 < b2 && b1 < a2
}

/// True when [start, start+duration) intersects any busy interval. The
/// orchestrator re-runs this check at commit time under the store lock.
pub fn conflicts(start: u32, duration: u32, busy: &[BusyInterval]) -> bool {
    let end = start + duration;
    busy
        .iter()
        .any(|b| intersects(start, end, b.start, b.start + b.duration))
}

/// Computes the ordered list of free start times for `date`.
///
/// A candidate is accepted when it lies within business hours, the service
/// fits before closing, it does not intersect any busy interval, and, for
/// today, it is no earlier than `now + lead` (rounded up to the next grid
/// point so offered slots stay grid-aligned).
///
/// An empty result is a normal outcome: the day is fully booked, or the
/// service does not fit the remaining window at all.
pub fn available_slots(
    grid: SlotGrid,
    service_duration: u32,
    date: NaiveDate,
    now: DateTime<FixedOffset>,
    busy: &[BusyInterval],
) -> Vec<NaiveTime> {
    let mut first = grid.open;

    if date == now.date_naive() {
        let floor = now.time().hour() * 60 + now.time().minute() + grid.lead;
        if floor > first {
            // Round up to the next grid point relative to opening.
            let offset = floor - grid.open;
            first = grid.open + offset.div_ceil(grid.step) * grid.step;
        }
    }

    let mut slots = Vec::new();
    let mut start = first;
    while start < grid.close {
        let end = start + service_duration;
        if end <= grid.close && !conflicts(start, service_duration, busy) {
            if let Some(t) = NaiveTime::from_hms_opt(start / 60, start % 60, 0) {
                slots.push(t);
            }
        }
        start += grid.step;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn grid() -> SlotGrid {
        // 9:00-19:00, hourly grid, 60 min lead
        SlotGrid::new(9, 19, 60, 60)
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600)
            .unwrap()
            .from_local_datetime(&date.and_hms_opt(h, m, 0).unwrap())
            .unwrap()
    }

    fn future_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 6, 10).unwrap()
    }

    #[test]
    fn empty_day_offers_full_grid() {
        let date = future_date();
        let now = at(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 12, 0);
        let slots = available_slots(grid(), 60, date, now, &[]);
        assert_eq!(slots.first(), Some(&t(9, 0)));
        assert_eq!(slots.last(), Some(&t(18, 0)));
        assert_eq!(slots.len(), 10);
    }

    #[test]
    fn booked_hour_is_excluded() {
        let date = future_date();
        let now = at(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 12, 0);
        let busy = [BusyInterval { start: 10 * 60, duration: 60 }];
        let slots = available_slots(grid(), 60, date, now, &busy);
        assert!(slots.contains(&t(9, 0)));
        assert!(!slots.contains(&t(10, 0)));
        assert!(slots.contains(&t(11, 0)));
    }

    #[test]
    fn late_same_day_yields_nothing() {
        // 18:30 today with 60 min lead: floor is 19:30, past closing.
        let date = future_date();
        let now = at(date, 18, 30);
        let slots = available_slots(grid(), 60, date, now, &[]);
        assert!(slots.is_empty());
    }

    #[test]
    fn same_day_floor_snaps_to_grid() {
        // 10:10 + 60 lead = 11:10, next grid point is 12:00.
        let date = future_date();
        let now = at(date, 10, 10);
        let slots = available_slots(grid(), 60, date, now, &[]);
        assert_eq!(slots.first(), Some(&t(12, 0)));
    }

    #[test]
    fn service_must_fit_before_closing() {
        let date = future_date();
        let now = at(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 12, 0);
        let slots = available_slots(grid(), 90, date, now, &[]);
        // 18:00 + 90 would end at 19:30, past closing.
        assert!(!slots.contains(&t(18, 0)));
        assert_eq!(slots.last(), Some(&t(17, 0)));
    }

    #[test]
    fn oversized_service_never_fits() {
        let date = future_date();
        let now = at(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 12, 0);
        let slots = available_slots(grid(), 11 * 60, date, now, &[]);
        assert!(slots.is_empty());
    }

    #[test]
    fn partial_overlap_blocks_the_slot() {
        // A 90-minute booking at 10:30 occupies [10:30, 12:00).
        let date = future_date();
        let now = at(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 12, 0);
        let busy = [BusyInterval { start: 10 * 60 + 30, duration: 90 }];
        let slots = available_slots(grid(), 60, date, now, &busy);
        assert!(!slots.contains(&t(10, 0)));
        assert!(!slots.contains(&t(11, 0)));
        assert!(slots.contains(&t(12, 0)));
    }

    #[test]
    fn adjacent_intervals_do_not_conflict() {
        // [10:00, 11:00) busy; a candidate ending exactly at 10:00 is fine.
        let date = future_date();
        let now = at(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 12, 0);
        let busy = [BusyInterval { start: 10 * 60, duration: 60 }];
        let slots = available_slots(grid(), 60, date, now, &busy);
        assert!(slots.contains(&t(9, 0)));
        assert!(slots.contains(&t(11, 0)));
    }

    #[test]
    fn candidates_never_overlap_existing_bookings() {
        // Randomized sweep: whatever the existing bookings look like, no
        // returned candidate may intersect any of them and every candidate
        // respects opening, closing, and grid alignment.
        let date = future_date();
        let now = at(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 12, 0);
        let g = SlotGrid::new(9, 19, 30, 60);

        let mut seed: u64 = 0x9e3779b97f4a7c15;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as u32
        };

        for _ in 0..200 {
            let mut busy = Vec::new();
            for _ in 0..(next() % 8) {
                let start = g.open + next() % (g.close - g.open);
                let duration = 15 + next() % 120;
                busy.push(BusyInterval { start, duration });
            }
            let duration = 15 + next() % 120;
            for slot in available_slots(g, duration, date, now, &busy) {
                let s = slot.hour() * 60 + slot.minute();
                assert!(s >= g.open);
                assert!(s + duration <= g.close);
                assert_eq!((s - g.open) % g.step, 0);
                for b in &busy {
                    assert!(
                        !intersects(s, s + duration, b.start, b.start + b.duration),
                        "slot {} overlaps booking at {} for {} min",
                        slot,
                        b.start,
                        b.duration
                    );
                }
            }
        }
    }

    #[test]
    fn idempotent_for_identical_input() {
        let date = future_date();
        let now = at(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 12, 0);
        let busy = [BusyInterval { start: 600, duration: 60 }];
        let a = available_slots(grid(), 60, date, now, &busy);
        let b = available_slots(grid(), 60, date, now, &busy);
        assert_eq!(a, b);
    }
}
