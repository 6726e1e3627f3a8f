//! Benchmarks for swing extraction, pattern scanning and backtest replay.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pivotbt::prelude::*;

/// Generate deterministic pseudo-random candles
fn generate_candles(n: usize) -> Vec<Candle> {
  let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
  let mut candles = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;
    let v = 1_000.0 + ((i * 11) % 17) as f64 * 100.0;

    candles.push(Candle::new(start + Duration::hours(i as i64), o, h, l, c, v));
    price = c;
  }

  candles
}

fn bench_swings(c: &mut Criterion) {
  let candles = generate_candles(1000);
  let lookback = Period::new(5).unwrap();

  c.bench_function("swing_points_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(find_swing_points(black_box(&candles), lookback));
    })
  });
}

fn bench_all_patterns(c: &mut Criterion) {
  let candles = generate_candles(1000);

  let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("scan_all_patterns_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(scanner.scan(black_box(&candles)));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000].iter() {
    let candles = generate_candles(*size);

    group.bench_with_input(BenchmarkId::new("scan", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(scanner.scan(black_box(&candles)));
      })
    });
  }

  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let c1 = generate_candles(1000);
  let c2 = generate_candles(1000);
  let c3 = generate_candles(1000);
  let c4 = generate_candles(1000);

  let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();

  let instruments: Vec<(&str, &[Candle])> =
    vec![("SYM1", &c1), ("SYM2", &c2), ("SYM3", &c3), ("SYM4", &c4)];

  c.bench_function("parallel_scan_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(scan_parallel(black_box(&scanner), black_box(instruments.clone())));
    })
  });
}

fn bench_backtest(c: &mut Criterion) {
  let candles = generate_candles(1000);

  c.bench_function("backtest_pattern_signals_1000_bars", |b| {
    b.iter(|| {
      let mut data = MarketData::new();
      data.insert("SYM", InstrumentFeed::Single(candles.clone()));
      let mut backtester = Backtester::with_pattern_signals(data, Config::default()).unwrap();
      backtester.run().unwrap();
      black_box(backtester.into_report())
    })
  });
}

criterion_group!(
  benches,
  bench_swings,
  bench_all_patterns,
  bench_scaling,
  bench_parallel_scan,
  bench_backtest,
);

criterion_main!(benches);
