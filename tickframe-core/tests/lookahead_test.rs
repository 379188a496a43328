//! Look-ahead contamination tests.
//!
//! Invariant: no prepared feature value at row t may depend on bar data
//! from row t+1 or later, and a close-aligned realigned column at row t
//! may only carry source buckets that closed at or before t's own close.
//!
//! Method for units: prepare on a truncated series (rows 0..100) and on
//! the full series (rows 0..200), then assert the shared prefix is
//! identical. Any difference means future data leaked backwards.

use tickframe_core::{
    realign::realign_batch,
    resample::resample,
    units::{MovingAverages, Rsi},
    Align, Column, ComputationUnit, FeatureTable, RealignEntry, RollingBuffer, Timeframe,
};

// 2024-01-02 00:00 UTC
const T0: i64 = 1_704_153_600;

/// Deterministic pseudo-random minute walk using a simple LCG.
fn make_minute_table(n: usize) -> FeatureTable {
    let mut price = 100.0;
    let mut dates = Vec::with_capacity(n);
    let mut opens = Vec::with_capacity(n);
    let mut highs = Vec::with_capacity(n);
    let mut lows = Vec::with_capacity(n);
    let mut closes = Vec::with_capacity(n);
    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.01;
        price = (price + change).max(10.0);
        dates.push(T0 + 60 * i as i64);
        opens.push(price - 0.2);
        highs.push(price + 0.7);
        lows.push(price - 0.6);
        closes.push(price);
    }
    FeatureTable::from_core_columns(
        dates.clone(),
        dates,
        opens,
        highs,
        lows,
        closes,
        vec![100; n],
        vec![true; n],
    )
    .unwrap()
}

fn truncate(table: &FeatureTable, n: usize) -> FeatureTable {
    FeatureTable::from_core_columns(
        table.dates()[..n].to_vec(),
        table.dates_l()[..n].to_vec(),
        table.opens()[..n].to_vec(),
        table.highs()[..n].to_vec(),
        table.lows()[..n].to_vec(),
        table.closes()[..n].to_vec(),
        table.volumes()[..n].to_vec(),
        table.cpl()[..n].to_vec(),
    )
    .unwrap()
}

fn float_prefixes_match(full: &Column, short: &Column, n: usize) {
    let (full, short) = match (full.as_floats(), short.as_floats()) {
        (Some(f), Some(s)) => (f, s),
        _ => panic!("expected float columns"),
    };
    for i in 0..n {
        let same = (full[i].is_nan() && short[i].is_nan()) || full[i] == short[i];
        assert!(same, "row {i} diverges: full={} short={}", full[i], short[i]);
    }
}

#[test]
fn rsi_prefix_is_stable_under_extension() {
    let full_table = make_minute_table(200);
    let short_table = truncate(&full_table, 100);

    let mut unit = Rsi::new(14);
    let full = unit.prepare(&full_table).unwrap();
    let short = unit.prepare(&short_table).unwrap();
    float_prefixes_match(&full[0], &short[0], 100);
}

#[test]
fn moving_averages_prefix_is_stable_under_extension() {
    let full_table = make_minute_table(400);
    let short_table = truncate(&full_table, 250);

    let mut unit = MovingAverages::new();
    let full = unit.prepare(&full_table).unwrap();
    let short = unit.prepare(&short_table).unwrap();
    for (f, s) in full.iter().zip(&short) {
        float_prefixes_match(f, s, 250);
    }
}

/// A close-aligned realigned value at target row t must come from a
/// source bucket whose last constituent timestamp is <= t. Encoded value
/// = source row index, so the provenance of every copy is checkable.
#[test]
fn close_realignment_never_reads_open_buckets() {
    let minutes = make_minute_table(120);
    let m5 = resample(&minutes, Timeframe::M1, Timeframe::M5).unwrap();

    let mut source = RollingBuffer::from_table(Timeframe::M5, m5);
    let idx: Vec<f64> = (0..source.len()).map(|i| i as f64).collect();
    source.add_feature("probe", Column::Float(idx)).unwrap();

    let mut target = RollingBuffer::from_table(Timeframe::M1, minutes);
    let spec = [RealignEntry {
        align: Align::Close,
        feature: "probe".to_string(),
        from: Timeframe::M5,
        to: Timeframe::M1,
    }];
    realign_batch(&mut target, &source, &spec).unwrap();

    let probe = target
        .get_feature("probem5")
        .unwrap()
        .as_floats()
        .unwrap()
        .to_vec();
    let src_dates = source.table().dates().to_vec();
    for (i, &t) in target.table().dates().iter().enumerate() {
        if probe[i].is_nan() {
            continue;
        }
        let src_row = probe[i] as usize;
        let bucket_close = src_dates[src_row] + 300 - 60;
        assert!(
            bucket_close <= t,
            "minute {t} sees bucket ending {bucket_close}"
        );
    }
}

/// Open alignment references the bucket containing the target row; close
/// alignment lags one bucket behind until the row that closes the bucket,
/// where the two coincide.
#[test]
fn open_alignment_leads_close_alignment_by_one_bucket() {
    let minutes = make_minute_table(60);
    let m5 = resample(&minutes, Timeframe::M1, Timeframe::M5).unwrap();

    let mut source = RollingBuffer::from_table(Timeframe::M5, m5);
    let idx: Vec<f64> = (0..source.len()).map(|i| i as f64).collect();
    source.add_feature("probe", Column::Float(idx)).unwrap();

    let mut by_open = RollingBuffer::from_table(Timeframe::M1, make_minute_table(60));
    let mut by_close = RollingBuffer::from_table(Timeframe::M1, make_minute_table(60));
    let entry = |align| {
        [RealignEntry {
            align,
            feature: "probe".to_string(),
            from: Timeframe::M5,
            to: Timeframe::M1,
        }]
    };
    realign_batch(&mut by_open, &source, &entry(Align::Open)).unwrap();
    realign_batch(&mut by_close, &source, &entry(Align::Close)).unwrap();

    let open = by_open.get_feature("probem5").unwrap().as_floats().unwrap();
    let close = by_close.get_feature("probem5").unwrap().as_floats().unwrap();
    let dates = by_open.table().dates();
    for i in 0..60 {
        if close[i].is_nan() {
            continue;
        }
        let lead = if dates[i].rem_euclid(300) == 240 { 0.0 } else { 1.0 };
        assert_eq!(open[i], close[i] + lead, "row {i}");
    }
}
