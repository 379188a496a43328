//! Resampler — derive coarser-timeframe bars from finer ones.
//!
//! The bucket key counts target-timeframe intervals since the Unix epoch
//! (weeks are shifted so buckets run Monday–Sunday; months use calendar
//! truncation instead of a fixed duration). Batch mode groups an entire
//! source table; incremental mode recomputes only the current bucket over
//! a bounded trailing window and must agree with batch over the same data.

use crate::bar::BarRecord;
use crate::buffer::RollingBuffer;
use crate::error::EngineError;
use crate::table::{utc, FeatureTable};
use crate::timeframe::{Timeframe, TimeframeCategory};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

/// Seconds from the Unix epoch (a Thursday) to the first Monday after it.
/// Adding this before dividing by the week length aligns bucket boundaries
/// to Monday 00:00 UTC.
pub const WEEK_EPOCH_OFFSET: i64 = 345_600;

const WEEK_SECS: i64 = 604_800;

/// Bucket key of a timestamp for a resample target.
///
/// Intraday: interval index since epoch. Weekly: week index whose
/// boundary falls on Sunday 00:00 UTC, so Mon-Fri sessions share a key.
/// Monthly: Unix seconds of the calendar month start (the key doubles
/// as the bucket timestamp). Daily has no bucket rule — daily bars come
/// from the ingestion side, never from resampling.
pub fn bucket_key(date_secs: i64, target: Timeframe) -> Result<i64, EngineError> {
    match target.category() {
        TimeframeCategory::Intraday => Ok(date_secs.div_euclid(target.duration_secs())),
        TimeframeCategory::Weekly => Ok((date_secs + WEEK_EPOCH_OFFSET).div_euclid(WEEK_SECS)),
        TimeframeCategory::Monthly => Ok(month_start_secs(date_secs)),
        TimeframeCategory::Daily => Err(EngineError::UnsupportedTimeframe(target)),
    }
}

/// Canonical timestamp of a bucket: interval start (intraday), the week's
/// Monday 00:00 UTC (weekly), or the month start (monthly).
pub fn bucket_date(key: i64, target: Timeframe) -> Result<i64, EngineError> {
    match target.category() {
        TimeframeCategory::Intraday => Ok(key * target.duration_secs()),
        TimeframeCategory::Weekly => Ok(key * WEEK_SECS + WEEK_EPOCH_OFFSET - WEEK_SECS),
        TimeframeCategory::Monthly => Ok(key),
        TimeframeCategory::Daily => Err(EngineError::UnsupportedTimeframe(target)),
    }
}

/// Unix seconds of the first instant of the timestamp's calendar month.
fn month_start_secs(secs: i64) -> i64 {
    let d = utc(secs).date_naive();
    let first = d.with_day(1).unwrap_or(d);
    first.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn is_friday(secs: i64) -> bool {
    utc(secs).weekday() == Weekday::Fri
}

/// Whether the timestamp falls on the last weekday of its calendar month.
/// Exchange holidays are not modelled.
fn is_last_business_day_of_month(secs: i64) -> bool {
    let d = utc(secs).date_naive();
    let next_first = if d.month() == 12 {
        NaiveDate::from_ymd_opt(d.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(d.year(), d.month() + 1, 1)
    };
    let Some(next_first) = next_first else {
        return false;
    };
    let mut last = match next_first.pred_opt() {
        Some(p) => p,
        None => return false,
    };
    while matches!(last.weekday(), Weekday::Sat | Weekday::Sun) {
        match last.pred_opt() {
            Some(p) => last = p,
            None => return false,
        }
    }
    d == last
}

/// The category rules only hold for these source/target pairings:
/// intraday targets need a 1-minute source, weekly/monthly targets a
/// daily source, and resampling onto the same timeframe is meaningless.
fn check_order(source_tf: Timeframe, target_tf: Timeframe) -> Result<(), EngineError> {
    let order_err = Err(EngineError::InvalidTimeframeOrder {
        from: source_tf,
        to: target_tf,
    });
    if source_tf == target_tf {
        return order_err;
    }
    if target_tf.is_intraday() && source_tf != Timeframe::M1 {
        return order_err;
    }
    if target_tf.is_outside_day() && source_tf != Timeframe::D1 {
        return order_err;
    }
    Ok(())
}

/// Per-bucket OHLCV aggregate: open=first, high=max, low=min, close=last,
/// volume=sum, date_l=last.
#[derive(Debug, Clone, Copy)]
struct BucketAgg {
    key: i64,
    date_l: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

/// Group source rows from `start` onward by bucket key. Source timestamps
/// are non-decreasing, so a single sequential pass groups stably in
/// key-increasing order.
fn aggregate_buckets(
    source: &FeatureTable,
    start: usize,
    target_tf: Timeframe,
) -> Result<Vec<BucketAgg>, EngineError> {
    let dates = source.dates();
    let dates_l = source.dates_l();
    let opens = source.opens();
    let highs = source.highs();
    let lows = source.lows();
    let closes = source.closes();
    let volumes = source.volumes();

    let mut buckets: Vec<BucketAgg> = Vec::new();
    for i in start..source.len() {
        let key = bucket_key(dates[i], target_tf)?;
        match buckets.last_mut() {
            Some(agg) if agg.key == key => {
                agg.high = agg.high.max(highs[i]);
                agg.low = agg.low.min(lows[i]);
                agg.close = closes[i];
                agg.volume += volumes[i];
                agg.date_l = dates_l[i];
            }
            _ => buckets.push(BucketAgg {
                key,
                date_l: dates_l[i],
                open: opens[i],
                high: highs[i],
                low: lows[i],
                close: closes[i],
                volume: volumes[i],
            }),
        }
    }
    Ok(buckets)
}

/// Completion of the final, possibly still-open bucket.
///
/// Intraday: the source's last bar must itself be complete and be the
/// final slot of the bucket (the next source interval maps to a new key).
/// Weekly: the last session day is the week-closing Friday. Monthly: the
/// last session day is the month's final business day. Checks run on
/// `date_l` (the session timestamp), matching the upstream data contract.
fn last_bucket_complete(
    source_tf: Timeframe,
    target_tf: Timeframe,
    last_key: i64,
    last_date_l: i64,
    source_last_cpl: bool,
) -> Result<bool, EngineError> {
    match target_tf.category() {
        TimeframeCategory::Intraday => {
            let next_slot = last_date_l + source_tf.duration_secs();
            Ok(source_last_cpl && bucket_key(next_slot, target_tf)? != last_key)
        }
        TimeframeCategory::Weekly => Ok(is_friday(last_date_l)),
        TimeframeCategory::Monthly => Ok(is_last_business_day_of_month(last_date_l)),
        TimeframeCategory::Daily => Err(EngineError::UnsupportedTimeframe(target_tf)),
    }
}

/// Full-batch resample of a source table into a coarser target table.
///
/// Every bucket except the last is complete; the last bucket's completion
/// is derived from the source's trailing state, never assumed.
pub fn resample(
    source: &FeatureTable,
    source_tf: Timeframe,
    target_tf: Timeframe,
) -> Result<FeatureTable, EngineError> {
    check_order(source_tf, target_tf)?;
    let buckets = aggregate_buckets(source, 0, target_tf)?;

    let n = buckets.len();
    let mut date = Vec::with_capacity(n);
    let mut date_l = Vec::with_capacity(n);
    let mut open = Vec::with_capacity(n);
    let mut high = Vec::with_capacity(n);
    let mut low = Vec::with_capacity(n);
    let mut close = Vec::with_capacity(n);
    let mut volume = Vec::with_capacity(n);
    let mut cpl = vec![true; n];

    for agg in &buckets {
        date.push(bucket_date(agg.key, target_tf)?);
        date_l.push(agg.date_l);
        open.push(agg.open);
        high.push(agg.high);
        low.push(agg.low);
        close.push(agg.close);
        volume.push(agg.volume);
    }

    if let Some(last) = buckets.last() {
        let src_last = source.len() - 1;
        cpl[n - 1] = last_bucket_complete(
            source_tf,
            target_tf,
            last.key,
            last.date_l,
            source.cpl()[src_last],
        )?;
    }

    FeatureTable::from_core_columns(date, date_l, open, high, low, close, volume, cpl)
}

/// Incremental resample: recompute only the current target bucket from a
/// bounded trailing window of the source buffer (two target buckets worth
/// of source bars, so the window always spans one full bucket).
///
/// Returns a bar-shaped delta for the caller to feed into the target
/// buffer's `update`; per-tick cost stays O(window), and the result is
/// identical to the trailing row of a full batch resample.
pub fn resample_update(
    source: &RollingBuffer,
    target_tf: Timeframe,
) -> Result<BarRecord, EngineError> {
    let source_tf = source.timeframe();
    check_order(source_tf, target_tf)?;

    let window = (2 * target_tf.duration_secs() / source_tf.duration_secs()).max(1) as usize;
    let start = source.len().saturating_sub(window);
    let buckets = aggregate_buckets(source.table(), start, target_tf)?;

    // The window is at least one source bar, so one bucket always exists.
    let last = buckets
        .last()
        .ok_or_else(|| EngineError::SchemaMismatch("resample source is empty".to_string()))?;

    let src_last = source.len() - 1;
    let cpl = last_bucket_complete(
        source_tf,
        target_tf,
        last.key,
        last.date_l,
        source.table().cpl()[src_last],
    )?;

    Ok(BarRecord {
        date: bucket_date(last.key, target_tf)?,
        date_l: last.date_l,
        open: last.open,
        high: last.high,
        low: last.low,
        close: last.close,
        volume: last.volume,
        cpl,
    })
}
