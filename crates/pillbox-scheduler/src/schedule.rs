use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;

use crate::{
    error::{Result, SchedulerError},
    types::{FirePlan, Firing, Frequency, ParityContext, ReminderPolicy, RepeatComponent},
};

/// Resolve every notification `policy` needs, starting strictly *after* `now`.
///
/// The result is expressed in `now`'s timezone; the policy's hour and minute
/// are wall-clock values in that zone. An instant equal to `now` counts as
/// past and rolls forward.
pub fn resolve<Tz: TimeZone>(
    policy: &ReminderPolicy,
    now: &DateTime<Tz>,
    parity: &ParityContext,
) -> Result<FirePlan<Tz>> {
    let time = time_of_day(policy)?;

    let (primary, secondary) = match policy.frequency {
        Frequency::Daily => (
            Firing {
                instant: next_daily(now, time),
                repeat: RepeatComponent::TimeOfDay,
            },
            None,
        ),

        Frequency::Weekly => {
            let day = required_day(policy)?;
            (
                Firing {
                    instant: next_weekly(now, day, time),
                    repeat: RepeatComponent::DayOfWeekAndTime,
                },
                None,
            )
        }

        Frequency::TwiceWeekly => {
            let [first, second] = required_days(policy)?;
            (
                Firing {
                    instant: next_weekly(now, first, time),
                    repeat: RepeatComponent::DayOfWeekAndTime,
                },
                Some(Firing {
                    instant: next_weekly(now, second, time),
                    repeat: RepeatComponent::DayOfWeekAndTime,
                }),
            )
        }

        Frequency::Biweekly => {
            let day = required_day(policy)?;
            let candidate = next_weekly(now, day, time);
            let instant = match policy.biweekly_anchor_date {
                Some(anchor) => align_to_anchor(candidate, anchor, time),
                None => skip_recently_acknowledged(candidate, now, time, parity),
            };
            (
                Firing {
                    instant,
                    repeat: RepeatComponent::None,
                },
                None,
            )
        }
    };

    Ok(FirePlan {
        frequency: policy.frequency,
        primary,
        secondary,
    })
}

/// The single instant shown as "next reminder": the earlier of the two
/// firings for a two-days-a-week policy, the only firing otherwise.
pub fn next_fire_instant<Tz: TimeZone>(
    policy: &ReminderPolicy,
    now: &DateTime<Tz>,
    parity: &ParityContext,
) -> Result<DateTime<Tz>> {
    resolve(policy, now, parity).map(|plan| plan.earliest())
}

fn time_of_day(policy: &ReminderPolicy) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(u32::from(policy.hour), u32::from(policy.minute), 0).ok_or_else(|| {
        SchedulerError::InvalidField(format!(
            "time {:02}:{:02} is out of range",
            policy.hour, policy.minute
        ))
    })
}

fn check_weekday(day: u8) -> Result<u8> {
    if (1..=7).contains(&day) {
        Ok(day)
    } else {
        Err(SchedulerError::InvalidField(format!(
            "day of week {day} is outside 1..=7"
        )))
    }
}

fn required_day(policy: &ReminderPolicy) -> Result<u8> {
    let day = policy.day_of_week.ok_or(SchedulerError::MissingField {
        field: "day_of_week",
        frequency: policy.frequency,
    })?;
    check_weekday(day)
}

fn required_days(policy: &ReminderPolicy) -> Result<[u8; 2]> {
    match policy.days_of_week.as_deref() {
        Some(&[first, second]) if first != second => {
            Ok([check_weekday(first)?, check_weekday(second)?])
        }
        _ => Err(SchedulerError::MissingField {
            field: "days_of_week",
            frequency: policy.frequency,
        }),
    }
}

/// Map a local date and wall-clock time onto `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant; times inside
/// a forward gap move one hour later.
fn at_local<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// Same wall-clock time, `days` calendar days after `instant`'s local date.
fn shift_days<Tz: TimeZone>(instant: &DateTime<Tz>, days: i64, time: NaiveTime) -> DateTime<Tz> {
    at_local(&instant.timezone(), instant.date_naive() + Duration::days(days), time)
}

fn next_daily<Tz: TimeZone>(now: &DateTime<Tz>, time: NaiveTime) -> DateTime<Tz> {
    let candidate = at_local(&now.timezone(), now.date_naive(), time);
    if candidate > *now {
        candidate
    } else {
        // Today's window has passed, advance to tomorrow.
        shift_days(&candidate, 1, time)
    }
}

/// `day` is an ISO weekday: 1 = Monday … 7 = Sunday.
fn next_weekly<Tz: TimeZone>(now: &DateTime<Tz>, day: u8, time: NaiveTime) -> DateTime<Tz> {
    let today = now.date_naive();
    let today_dow = i64::from(now.weekday().number_from_monday());
    let mut days_until = (i64::from(day) - today_dow).rem_euclid(7);

    if days_until == 0 && at_local(&now.timezone(), today, time) <= *now {
        days_until = 7;
    }
    at_local(&now.timezone(), today + Duration::days(days_until), time)
}

/// The anchor's week and every second week after (or before) it are on-weeks.
fn align_to_anchor<Tz: TimeZone>(
    candidate: DateTime<Tz>,
    anchor: NaiveDate,
    time: NaiveTime,
) -> DateTime<Tz> {
    let days_diff = (candidate.date_naive() - anchor).num_days();
    let weeks_diff = days_diff.div_euclid(7);
    if weeks_diff.rem_euclid(2) == 1 {
        debug!(%anchor, weeks_diff, "candidate falls in an off-week, moving one week out");
        shift_days(&candidate, 7, time)
    } else {
        candidate
    }
}

/// Without an anchor, an acknowledgment in the last seven days means the
/// current cycle is covered.
fn skip_recently_acknowledged<Tz: TimeZone>(
    candidate: DateTime<Tz>,
    now: &DateTime<Tz>,
    time: NaiveTime,
    parity: &ParityContext,
) -> DateTime<Tz> {
    match parity.last_acknowledged {
        Some(ack) if now.with_timezone(&Utc) - ack < Duration::days(7) => {
            debug!(last_acknowledged = %ack, "recent acknowledgment, skipping a week");
            shift_days(&candidate, 7, time)
        }
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Weekday};
    use chrono_tz::{Antarctica::Troll, Europe::Berlin};

    /// 2026-10-12 is a Monday.
    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    fn no_parity() -> ParityContext {
        ParityContext::default()
    }

    #[test]
    fn daily_later_today() {
        let next = next_fire_instant(&ReminderPolicy::daily(9, 0), &utc(12, 8, 0), &no_parity());
        assert_eq!(next.unwrap(), utc(12, 9, 0));
    }

    #[test]
    fn daily_rolls_to_tomorrow() {
        let next = next_fire_instant(&ReminderPolicy::daily(9, 0), &utc(12, 9, 30), &no_parity());
        assert_eq!(next.unwrap(), utc(13, 9, 0));
    }

    #[test]
    fn daily_exact_boundary_counts_as_past() {
        let next = next_fire_instant(&ReminderPolicy::daily(9, 0), &utc(12, 9, 0), &no_parity());
        assert_eq!(next.unwrap(), utc(13, 9, 0));
    }

    #[test]
    fn daily_always_within_next_24_hours() {
        let policy = ReminderPolicy::daily(6, 45);
        for hour in 0..24 {
            for minute in [0, 17, 44, 45, 46, 59] {
                let now = utc(14, hour, minute);
                let next = next_fire_instant(&policy, &now, &no_parity()).unwrap();
                assert!(next > now, "now: {now}");
                assert!(next - now <= Duration::hours(24), "now: {now}");
            }
        }
    }

    #[test]
    fn daily_uses_local_wall_clock() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = plus_two.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap();
        let next = next_fire_instant(&ReminderPolicy::daily(9, 0), &now, &no_parity()).unwrap();
        assert_eq!(next.with_timezone(&Utc), utc(12, 7, 0));
    }

    #[test]
    fn daily_rejects_out_of_range_time() {
        let mut policy = ReminderPolicy::daily(24, 0);
        let err = next_fire_instant(&policy, &utc(12, 8, 0), &no_parity()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidField(_)));

        policy.hour = 9;
        policy.minute = 60;
        let err = next_fire_instant(&policy, &utc(12, 8, 0), &no_parity()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidField(_)));
    }

    #[test]
    fn weekly_same_day_already_passed_goes_to_next_week() {
        // Wednesday 10:00, reminder Wednesday 08:00.
        let policy = ReminderPolicy::weekly(3, 8, 0);
        let next = next_fire_instant(&policy, &utc(14, 10, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(21, 8, 0));
    }

    #[test]
    fn weekly_same_day_still_ahead() {
        let policy = ReminderPolicy::weekly(3, 18, 0);
        let next = next_fire_instant(&policy, &utc(14, 10, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(14, 18, 0));
    }

    #[test]
    fn weekly_earlier_weekday_wraps() {
        // Wednesday now, reminder Monday → next Monday.
        let policy = ReminderPolicy::weekly(1, 9, 0);
        let next = next_fire_instant(&policy, &utc(14, 10, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(19, 9, 0));
    }

    #[test]
    fn weekly_sunday_is_seven() {
        let policy = ReminderPolicy::weekly(7, 9, 0);
        let next = next_fire_instant(&policy, &utc(12, 10, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(18, 9, 0));
        assert_eq!(next.weekday(), Weekday::Sun);
    }

    #[test]
    fn weekly_matches_weekday_and_stays_within_a_week() {
        for day in 1..=7u8 {
            let policy = ReminderPolicy::weekly(day, 12, 30);
            for now_day in 12..19 {
                for hour in [0, 12, 13, 23] {
                    let now = utc(now_day, hour, 30);
                    let next = next_fire_instant(&policy, &now, &no_parity()).unwrap();
                    assert_eq!(next.weekday().number_from_monday(), u32::from(day));
                    assert!(next > now);
                    assert!(next - now <= Duration::days(7));
                }
            }
        }
    }

    #[test]
    fn weekly_without_day_is_missing_field() {
        let mut policy = ReminderPolicy::weekly(3, 8, 0);
        policy.day_of_week = None;
        let err = next_fire_instant(&policy, &utc(14, 10, 0), &no_parity()).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::MissingField {
                field: "day_of_week",
                frequency: Frequency::Weekly
            }
        ));
    }

    #[test]
    fn weekly_rejects_day_zero() {
        let policy = ReminderPolicy::weekly(0, 8, 0);
        let err = next_fire_instant(&policy, &utc(14, 10, 0), &no_parity()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidField(_)));
    }

    #[test]
    fn twice_weekly_schedules_both_days() {
        // Monday now, Tuesday + Friday at 09:00.
        let policy = ReminderPolicy::twice_weekly([2, 5], 9, 0);
        let plan = resolve(&policy, &utc(12, 8, 0), &no_parity()).unwrap();

        assert_eq!(plan.primary.instant, utc(13, 9, 0));
        let secondary = plan.secondary.as_ref().unwrap();
        assert_eq!(secondary.instant, utc(16, 9, 0));
        assert!(plan
            .firings()
            .all(|f| f.repeat == RepeatComponent::DayOfWeekAndTime));
        assert_eq!(plan.earliest(), utc(13, 9, 0));
    }

    #[test]
    fn twice_weekly_earliest_ignores_listing_order() {
        // Saturday now: next Tuesday comes before next Friday.
        let policy = ReminderPolicy::twice_weekly([5, 2], 9, 0);
        let next = next_fire_instant(&policy, &utc(17, 12, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(20, 9, 0));
    }

    #[test]
    fn twice_weekly_needs_two_distinct_days() {
        for days in [vec![], vec![2], vec![2, 2], vec![1, 2, 3]] {
            let mut policy = ReminderPolicy::twice_weekly([2, 5], 9, 0);
            policy.days_of_week = Some(days.clone());
            let err = resolve(&policy, &utc(12, 8, 0), &no_parity()).unwrap_err();
            assert!(
                matches!(err, SchedulerError::MissingField { field: "days_of_week", .. }),
                "days: {days:?}"
            );
        }

        let mut policy = ReminderPolicy::twice_weekly([2, 5], 9, 0);
        policy.days_of_week = None;
        assert!(resolve(&policy, &utc(12, 8, 0), &no_parity()).is_err());
    }

    #[test]
    fn biweekly_anchor_week_is_on() {
        // Anchor Monday 2026-10-12, reminder Monday 09:00.
        let policy = ReminderPolicy::biweekly(1, 9, 0, Some(date(10, 12)));
        let plan = resolve(&policy, &utc(12, 8, 0), &no_parity()).unwrap();
        assert_eq!(plan.primary.instant, utc(12, 9, 0));
        assert_eq!(plan.primary.repeat, RepeatComponent::None);
        assert!(plan.secondary.is_none());
    }

    #[test]
    fn biweekly_skips_the_off_week() {
        let policy = ReminderPolicy::biweekly(1, 9, 0, Some(date(10, 12)));

        // Anchor Monday already passed: the week after is off, so D + 14.
        let next = next_fire_instant(&policy, &utc(12, 10, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(26, 9, 0));

        // Anywhere inside the off-week still lands on D + 14.
        let next = next_fire_instant(&policy, &utc(19, 8, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(26, 9, 0));
    }

    #[test]
    fn biweekly_after_second_on_week_skips_to_d_plus_28() {
        let policy = ReminderPolicy::biweekly(1, 9, 0, Some(date(10, 12)));
        let next = next_fire_instant(&policy, &utc(26, 10, 0), &no_parity()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 11, 9, 9, 0, 0).unwrap());
    }

    #[test]
    fn biweekly_anchor_in_the_future_keeps_parity() {
        // Anchor two weeks out; this week is an even distance away, so on.
        let policy = ReminderPolicy::biweekly(1, 9, 0, Some(date(10, 26)));
        let next = next_fire_instant(&policy, &utc(12, 8, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(12, 9, 0));

        // Anchor one week out: this week is off.
        let policy = ReminderPolicy::biweekly(1, 9, 0, Some(date(10, 19)));
        let next = next_fire_instant(&policy, &utc(12, 8, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(19, 9, 0));
    }

    #[test]
    fn biweekly_anchor_ignores_acknowledgments() {
        let policy = ReminderPolicy::biweekly(1, 9, 0, Some(date(10, 12)));
        let parity = ParityContext {
            last_acknowledged: Some(utc(12, 7, 0)),
        };
        let next = next_fire_instant(&policy, &utc(12, 8, 0), &parity).unwrap();
        assert_eq!(next, utc(12, 9, 0));
    }

    #[test]
    fn biweekly_without_anchor_uses_recent_acknowledgment() {
        let policy = ReminderPolicy::biweekly(1, 9, 0, None);

        // Never acknowledged: plain weekly candidate.
        let next = next_fire_instant(&policy, &utc(14, 8, 0), &no_parity()).unwrap();
        assert_eq!(next, utc(19, 9, 0));

        // Acknowledged two days ago: this cycle is covered.
        let parity = ParityContext {
            last_acknowledged: Some(utc(12, 9, 5)),
        };
        let next = next_fire_instant(&policy, &utc(14, 8, 0), &parity).unwrap();
        assert_eq!(next, utc(26, 9, 0));

        // Acknowledged more than a week ago: no shift.
        let parity = ParityContext {
            last_acknowledged: Some(utc(5, 9, 5)),
        };
        let next = next_fire_instant(&policy, &utc(14, 8, 0), &parity).unwrap();
        assert_eq!(next, utc(19, 9, 0));
    }

    #[test]
    fn biweekly_without_day_is_missing_field() {
        let mut policy = ReminderPolicy::biweekly(1, 9, 0, Some(date(10, 12)));
        policy.day_of_week = None;
        let err = resolve(&policy, &utc(12, 8, 0), &no_parity()).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::MissingField {
                frequency: Frequency::Biweekly,
                ..
            }
        ));
    }

    #[test]
    fn disabled_policy_still_resolves() {
        let mut policy = ReminderPolicy::daily(9, 0);
        policy.enabled = false;
        assert!(resolve(&policy, &utc(12, 8, 0), &no_parity()).is_ok());
    }

    // Berlin: clocks go forward 02:00 -> 03:00 on 2026-03-29 and back
    // 03:00 -> 02:00 on 2026-10-25.

    #[test]
    fn time_inside_spring_gap_moves_one_hour_later() {
        let now = Berlin.with_ymd_and_hms(2026, 3, 29, 0, 0, 0).unwrap();
        let next = next_fire_instant(&ReminderPolicy::daily(2, 30), &now, &no_parity()).unwrap();
        assert_eq!((next.hour(), next.minute()), (3, 30));
        assert_eq!(
            next.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2026, 3, 29, 1, 30, 0).unwrap()
        );
    }

    #[test]
    fn ambiguous_time_takes_earlier_instant() {
        let now = Berlin.with_ymd_and_hms(2026, 10, 25, 0, 0, 0).unwrap();
        let next = next_fire_instant(&ReminderPolicy::daily(2, 30), &now, &no_parity()).unwrap();
        assert_eq!((next.hour(), next.minute()), (2, 30));
        // 02:30 CEST, not 02:30 CET an hour later.
        assert_eq!(
            next.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2026, 10, 25, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn weekly_keeps_wall_clock_across_fall_back() {
        // Thursday 2026-10-22 is still summer time.
        let now = Berlin.with_ymd_and_hms(2026, 10, 22, 10, 0, 0).unwrap();
        let next = next_fire_instant(&ReminderPolicy::weekly(3, 9, 0), &now, &no_parity()).unwrap();
        assert_eq!(next.date_naive(), date(10, 28));
        assert_eq!((next.hour(), next.minute()), (9, 0));
        assert_eq!(
            next.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2026, 10, 28, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn biweekly_off_week_shift_keeps_wall_clock() {
        // Candidate Monday 10-19 (summer time) is an off-week; 10-26 is winter time.
        let policy = ReminderPolicy::biweekly(1, 9, 0, Some(date(10, 12)));
        let now = Berlin.with_ymd_and_hms(2026, 10, 13, 10, 0, 0).unwrap();
        let next = next_fire_instant(&policy, &now, &no_parity()).unwrap();
        assert_eq!(next.date_naive(), date(10, 26));
        assert_eq!((next.hour(), next.minute()), (9, 0));
        assert_eq!(
            next.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2026, 10, 26, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn gap_wider_than_an_hour_reads_time_as_utc() {
        // Troll jumps from +00 to +02 at 01:00 UTC on 2026-03-29, so local
        // 01:30 and 02:30 both fall in the gap.
        let now = Troll.with_ymd_and_hms(2026, 3, 29, 0, 0, 0).unwrap();
        let next = next_fire_instant(&ReminderPolicy::daily(1, 30), &now, &no_parity()).unwrap();
        assert_eq!(
            next.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2026, 3, 29, 1, 30, 0).unwrap()
        );
        assert_eq!((next.hour(), next.minute()), (3, 30));
    }
}
