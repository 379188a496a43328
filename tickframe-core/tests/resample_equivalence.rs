//! Batch/incremental resampling equivalence.
//!
//! Invariant: after any sequence of ticks, a target buffer maintained by
//! `resample_update` holds exactly the trailing rows of a full batch
//! `resample` over the same source data. Verified on random walks
//! (proptest) and on hand-built daily-to-weekly sessions.

use proptest::prelude::*;
use tickframe_core::{
    resample::{resample, resample_update},
    BarRecord, FeatureTable, RollingBuffer, Timeframe,
};

// 2024-01-02 00:00 UTC, a Tuesday
const T0: i64 = 1_704_153_600;

fn bar(date: i64, close: f64, volume: i64, cpl: bool) -> BarRecord {
    BarRecord {
        date,
        date_l: date,
        open: close - 0.3,
        high: close + 1.2,
        low: close - 1.1,
        close,
        volume,
        cpl,
    }
}

fn table_of(bars: &[BarRecord]) -> FeatureTable {
    FeatureTable::from_core_columns(
        bars.iter().map(|b| b.date).collect(),
        bars.iter().map(|b| b.date_l).collect(),
        bars.iter().map(|b| b.open).collect(),
        bars.iter().map(|b| b.high).collect(),
        bars.iter().map(|b| b.low).collect(),
        bars.iter().map(|b| b.close).collect(),
        bars.iter().map(|b| b.volume).collect(),
        bars.iter().map(|b| b.cpl).collect(),
    )
    .unwrap()
}

/// Random-walk minute bars. The last bar's completion flag varies so the
/// open-bucket path is exercised too.
fn arb_minute_bars() -> impl Strategy<Value = Vec<BarRecord>> {
    (10usize..150, prop::collection::vec(-100i64..100, 150), any::<bool>()).prop_map(
        |(n, steps, last_cpl)| {
            let mut price = 500.0;
            (0..n)
                .map(|i| {
                    price = (price + steps[i] as f64 * 0.05).max(1.0);
                    let cpl = i + 1 < n || last_cpl;
                    bar(T0 + 60 * i as i64, price, 10 + steps[i].unsigned_abs() as i64, cpl)
                })
                .collect()
        },
    )
}

proptest! {
    /// The incremental delta always equals the trailing row of a fresh
    /// batch resample of the same source, and only the trailing bucket may
    /// be incomplete.
    #[test]
    fn incremental_matches_batch_trailing_row(bars in arb_minute_bars()) {
        let source = RollingBuffer::from_table(Timeframe::M1, table_of(&bars));
        for target_tf in [Timeframe::M5, Timeframe::M30] {
            let batch = resample(source.table(), Timeframe::M1, target_tf).unwrap();
            let incr = resample_update(&source, target_tf).unwrap();
            prop_assert_eq!(incr, batch.row(batch.len() - 1));
            prop_assert!(batch.cpl()[..batch.len() - 1].iter().all(|&c| c));
        }
    }

    /// Per-bucket aggregates are exactly first/max/min/last/sum of the
    /// source rows sharing the bucket.
    #[test]
    fn buckets_aggregate_their_source_rows(bars in arb_minute_bars()) {
        let target_tf = Timeframe::M15;
        let dur = 900;
        let batch = resample(&table_of(&bars), Timeframe::M1, target_tf).unwrap();
        for i in 0..batch.len() {
            let row = batch.row(i);
            let members: Vec<&BarRecord> = bars
                .iter()
                .filter(|b| b.date.div_euclid(dur) == row.date.div_euclid(dur))
                .collect();
            prop_assert!(!members.is_empty());
            prop_assert_eq!(row.open, members[0].open);
            prop_assert_eq!(row.close, members[members.len() - 1].close);
            prop_assert_eq!(row.date_l, members[members.len() - 1].date_l);
            let high = members.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let low = members.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            prop_assert_eq!(row.high, high);
            prop_assert_eq!(row.low, low);
            prop_assert_eq!(row.volume, members.iter().map(|b| b.volume).sum::<i64>());
        }
    }

    /// Seed a target buffer from batch history, then tick the rest of the
    /// walk through `resample_update`. The target's rows must equal the
    /// trailing rows of a batch resample over everything.
    #[test]
    fn ticked_buffer_equals_batch_tail(bars in arb_minute_bars()) {
        let seed = (bars.len() / 2).max(5);
        let mut source = RollingBuffer::from_table(Timeframe::M1, table_of(&bars[..seed]));

        let target_tf = Timeframe::M5;
        let mut target = RollingBuffer::from_table(
            target_tf,
            resample(source.table(), Timeframe::M1, target_tf).unwrap(),
        );
        let capacity = target.len();

        for b in &bars[seed..] {
            source.update(b);
            let derived = resample_update(&source, target_tf).unwrap();
            target.update(&derived);
        }

        // the source capacity (seed >= 5 rows) always spans the bucket
        // being revised, so the ticked target must match a batch over the
        // complete walk
        let batch = resample(&table_of(&bars), Timeframe::M1, target_tf).unwrap();
        let n = batch.len();
        let keep = capacity.min(n);
        for i in 0..keep {
            prop_assert_eq!(target.table().row(capacity - keep + i), batch.row(n - keep + i));
        }
    }
}

#[test]
fn weekly_ticks_close_on_friday() {
    // Tue Jan 2 .. Fri Jan 5 2024, daily sessions at 21:00 UTC
    let days: Vec<BarRecord> = (0..4)
        .map(|i| bar(T0 + 75_600 + 86_400 * i, 470.0 + i as f64, 1_000, true))
        .collect();

    // Seed with the full prior session week (Mon Dec 25 .. Fri Dec 29 2023)
    // so the source buffer's capacity spans the weekly bucket under revision.
    let prior_week: Vec<BarRecord> = (0..5)
        .map(|i| bar(T0 - 8 * 86_400 + 75_600 + 86_400 * i, 468.0, 1_000, true))
        .collect();

    let mut source = RollingBuffer::from_table(Timeframe::D1, table_of(&prior_week));
    let mut target = RollingBuffer::from_table(
        Timeframe::W1,
        resample(source.table(), Timeframe::D1, Timeframe::W1).unwrap(),
    );

    for d in &days {
        source.update(d);
        target.update(&resample_update(&source, Timeframe::W1).unwrap());
    }

    let week = target.last_row();
    // Monday 00:00 UTC of that week
    assert_eq!(week.date, T0 - 86_400);
    assert_eq!(week.open, 470.0 - 0.3);
    assert_eq!(week.close, 473.0);
    assert_eq!(week.volume, 4_000);
    // last session was Friday Jan 5
    assert!(week.cpl);
}

#[test]
fn weekly_stays_open_midweek() {
    let days: Vec<BarRecord> = (0..3)
        .map(|i| bar(T0 + 75_600 + 86_400 * i, 470.0, 1_000, true))
        .collect();
    let source = RollingBuffer::from_table(Timeframe::D1, table_of(&days));
    let week = resample_update(&source, Timeframe::W1).unwrap();
    // last session is Thursday Jan 4
    assert!(!week.cpl);
}

#[test]
fn monthly_closes_on_last_business_day() {
    // Tue Jan 30 and Wed Jan 31 2024
    let jan30 = 1_706_572_800 + 75_600;
    let days = [bar(jan30, 480.0, 500, true), bar(jan30 + 86_400, 481.0, 600, true)];

    let mut source = RollingBuffer::from_table(Timeframe::D1, table_of(&days[..1]));
    let mut target = RollingBuffer::from_table(
        Timeframe::Mo1,
        resample(source.table(), Timeframe::D1, Timeframe::Mo1).unwrap(),
    );
    assert!(!target.last_row().cpl);

    source.update(&days[1]);
    target.update(&resample_update(&source, Timeframe::Mo1).unwrap());
    assert!(target.last_row().cpl);
    // bucket timestamp is the month start
    assert_eq!(target.last_row().date, 1_704_067_200);
}
