//! Entry-scorer hot path benchmark: one full analysis over a 200-bar window.

use chrono::TimeZone;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use confluence_core::entry::{EntryConfig, EntryRequest, EntryScorer};
use confluence_core::session::SessionRangeTracker;
use confluence_core::structure::{OrderBlockConfig, OrderBlockDetector};
use confluence_core::{Bar, TradeDirection};

fn window(n: usize) -> Vec<Bar> {
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.17).sin() * 3.0 + i as f64 * 0.01;
            let open = close - 0.2;
            Bar {
                symbol: "BENCH".to_string(),
                timestamp: base + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.6,
                low: open.min(close) - 0.6,
                close,
                volume: 1000.0 + (i % 7) as f64 * 150.0,
            }
        })
        .collect()
}

fn bench_analyze(c: &mut Criterion) {
    let scorer = EntryScorer::new(EntryConfig::default()).unwrap();
    let bars = window(200);
    let mut blocks = OrderBlockDetector::new(OrderBlockConfig::default());
    for end in 1..=bars.len() {
        blocks.update(&bars[..end], 1.2);
    }
    let sessions = SessionRangeTracker::new(Vec::new());
    let price = bars.last().unwrap().close;

    c.bench_function("entry_analyze_200_bars", |b| {
        b.iter(|| {
            let decision = scorer.analyze(
                &EntryRequest {
                    symbol: "BENCH",
                    direction: TradeDirection::Long,
                    price,
                    bars: black_box(&bars),
                    atr: Some(1.2),
                    original_signal_price: Some(price - 0.8),
                },
                &blocks,
                &sessions,
            );
            black_box(decision)
        })
    });
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);
