use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Application, Status};

/// Pure aggregations over a snapshot of application records. Nothing here
/// touches the database or the clock: every function is total over its
/// input and returns empty/zero results for empty input.

const SALARY_BIN_WIDTH: i64 = 20_000;
const WEEKLY_WINDOW: usize = 8;

/// Stable palette key for a funnel stage. The presentation layer decides
/// what color this actually is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorToken {
    Blue,
    Accent,
    Green,
    Orange,
    Purple,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub label: &'static str,
    pub color: ColorToken,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelSummary {
    /// Applied, Phone Screen, Technical, Final Round, Offer — in that order.
    pub stages: Vec<FunnelStage>,
    /// Percentage of applied records that reached at least a phone screen.
    pub interview_rate: u32,
    pub rejected_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSlice {
    pub status: Status,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyBucket {
    pub week_start: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalaryBin {
    pub range_label: String,
    pub bin_start: i64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalaryHistogram {
    pub bins: Vec<SalaryBin>,
    pub average: f64,
}

// --- Stage predicates ---
//
// A record counts toward every stage it has reached, so one record may land
// in several buckets. Membership is an OR of two signals (milestone date
// present, status far enough along) because the two are edited
// independently and can disagree. The technical stage is the exception: it
// requires BOTH the interview date and a technical-or-later status. That
// asymmetry is long-standing product behavior; keep it.

fn reached_applied(app: &Application) -> bool {
    app.applied_date.is_some()
}

fn reached_phone_screen(app: &Application) -> bool {
    let status = app.status_or_default();
    (app.response_date.is_some() && status != Status::Rejected)
        || matches!(
            status,
            Status::PhoneScreen | Status::Technical | Status::FinalRound | Status::Offer
        )
}

fn reached_technical(app: &Application) -> bool {
    app.first_interview_date.is_some()
        && matches!(
            app.status_or_default(),
            Status::Technical | Status::FinalRound | Status::Offer
        )
}

fn reached_final_round(app: &Application) -> bool {
    matches!(app.status_or_default(), Status::FinalRound | Status::Offer)
}

fn reached_offer(app: &Application) -> bool {
    app.offer_date.is_some() || app.status_or_default() == Status::Offer
}

fn is_rejected(app: &Application) -> bool {
    app.status_or_default() == Status::Rejected || app.rejection_date.is_some()
}

/// round(100 * n / d), with 0 for an empty denominator. Capped at 100:
/// the numerator stage can outcount the denominator when records lack an
/// applied date, and the rate is a percentage either way.
fn rate(n: usize, d: usize) -> u32 {
    if d == 0 {
        return 0;
    }
    ((100.0 * n as f64 / d as f64).round() as u32).min(100)
}

pub fn compute_funnel(apps: &[Application]) -> FunnelSummary {
    let stage_defs: [(&'static str, ColorToken, fn(&Application) -> bool); 5] = [
        ("Applied", ColorToken::Blue, reached_applied),
        ("Phone Screen", ColorToken::Accent, reached_phone_screen),
        ("Technical", ColorToken::Green, reached_technical),
        ("Final Round", ColorToken::Orange, reached_final_round),
        ("Offer", ColorToken::Purple, reached_offer),
    ];

    let stages: Vec<FunnelStage> = stage_defs
        .iter()
        .map(|&(label, color, pred)| FunnelStage {
            label,
            color,
            count: apps.iter().filter(|a| pred(a)).count(),
        })
        .collect();

    let applied = stages[0].count;
    let phone_screen = stages[1].count;

    FunnelSummary {
        interview_rate: rate(phone_screen, applied),
        rejected_count: apps.iter().filter(|a| is_rejected(a)).count(),
        stages,
    }
}

/// Counts by literal status (missing status reads as `applied`). Only
/// statuses actually present appear, in enum order.
pub fn compute_status_distribution(apps: &[Application]) -> Vec<StatusSlice> {
    Status::ALL
        .iter()
        .filter_map(|&status| {
            let count = apps
                .iter()
                .filter(|a| a.status_or_default() == status)
                .count();
            (count > 0).then(|| StatusSlice {
                status,
                label: status.label(),
                count,
            })
        })
        .collect()
}

/// Monday on or before the given date.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Applications per week (Monday-start), trailing 8 weeks present in the
/// data. Weeks with no applications are absent, not zero — the series is
/// the most recent buckets, not a contiguous calendar.
pub fn compute_weekly_volume(apps: &[Application]) -> Vec<WeeklyBucket> {
    let mut by_week: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for app in apps {
        let Some(applied) = app.applied_date else {
            continue;
        };
        *by_week.entry(week_start(applied)).or_insert(0) += 1;
    }

    let mut series: Vec<WeeklyBucket> = by_week
        .into_iter()
        .map(|(week_start, count)| WeeklyBucket { week_start, count })
        .collect();
    if series.len() > WEEKLY_WINDOW {
        series.drain(..series.len() - WEEKLY_WINDOW);
    }
    series
}

fn bin_label(bin_start: i64) -> String {
    format!(
        "${}k-{}k",
        bin_start / 1000,
        (bin_start + SALARY_BIN_WIDTH) / 1000
    )
}

/// Fixed-width ($20k) histogram over every salary figure present. A record
/// contributes its min, its max, both, or nothing; no ordering between the
/// two is assumed.
pub fn compute_salary_histogram(apps: &[Application]) -> SalaryHistogram {
    let salaries: Vec<i64> = apps
        .iter()
        .flat_map(|a| [a.salary_min, a.salary_max])
        .flatten()
        .collect();

    if salaries.is_empty() {
        return SalaryHistogram {
            bins: Vec::new(),
            average: 0.0,
        };
    }

    let (min, max) = salaries
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let bin_count = (max - min).div_euclid(SALARY_BIN_WIDTH)
        + i64::from((max - min).rem_euclid(SALARY_BIN_WIDTH) != 0)
        + 1;
    let first_start = min.div_euclid(SALARY_BIN_WIDTH) * SALARY_BIN_WIDTH;

    let mut bins = Vec::new();
    for i in 0..bin_count {
        let bin_start = first_start + i * SALARY_BIN_WIDTH;
        let count = salaries
            .iter()
            .filter(|&&v| v >= bin_start && v < bin_start + SALARY_BIN_WIDTH)
            .count();
        if count > 0 {
            bins.push(SalaryBin {
                range_label: bin_label(bin_start),
                bin_start,
                count,
            });
        }
    }
    bins.sort_by_key(|b| b.bin_start);

    let average = salaries.iter().sum::<i64>() as f64 / salaries.len() as f64;

    SalaryHistogram { bins, average }
}
