//! Cross-module scenarios driven through the public engine API.

use chrono::{NaiveTime, TimeZone, Utc};

use confluence_core::engine::SymbolEngine;
use confluence_core::entry::EntryRequest;
use confluence_core::exit::{AdvisoryInputs, ExitThresholds, ExitWeights};
use confluence_core::session::SessionSpec;
use confluence_core::{
    Bar, EngineConfig, ExitUrgency, PositionSnapshot, ReasonCode, Ticket, TradeDirection,
};

fn bar(day: u32, h: u32, m: u32, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        symbol: "EURUSD".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 1, day, h, m, 0).unwrap(),
        open,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

fn london_config() -> EngineConfig {
    EngineConfig {
        sessions: vec![SessionSpec {
            id: "london".to_string(),
            label: "London open".to_string(),
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            range_minutes: 30,
            confirmation_closes: 1,
            min_range_atr: 0.5,
            max_range_atr: 3.0,
        }],
        ..EngineConfig::default()
    }
}

/// Replay a growing window one bar at a time, collecting breakout signals.
fn replay(
    engine: &mut SymbolEngine,
    bars: &[Bar],
    atr: f64,
) -> Vec<confluence_core::session::RangeBreakoutSignal> {
    let mut breakouts = Vec::new();
    for end in 1..=bars.len() {
        breakouts.extend(engine.on_bar(&bars[..end], Some(atr)).breakouts);
    }
    breakouts
}

#[test]
fn london_opening_range_breakout_end_to_end() {
    let mut engine = SymbolEngine::new("EURUSD", &london_config()).unwrap();

    // 30 one-minute bars forming the 1.2000-1.2010 range, then a confirmed
    // close at 1.2015.
    let mut bars: Vec<Bar> = (0..30)
        .map(|m| bar(2, 8, m, 1.2005, 1.2010, 1.2000, 1.2005))
        .collect();
    bars.push(bar(2, 8, 30, 1.2008, 1.2016, 1.2008, 1.2015));

    let breakouts = replay(&mut engine, &bars, 0.001);
    assert_eq!(breakouts.len(), 1);
    let sig = &breakouts[0];
    assert_eq!(sig.direction, TradeDirection::Long);
    assert!((sig.stop - 1.2000).abs() < 1e-9);
    assert!((sig.target - (1.2015 + 2.0 * 0.0010)).abs() < 1e-9);

    // The confirmed breakout feeds the session sub-score: a long entry now
    // carries session confluence, a short is warned off.
    let request = EntryRequest {
        symbol: "EURUSD",
        direction: TradeDirection::Long,
        price: 1.2015,
        bars: &bars,
        atr: Some(0.001),
        original_signal_price: None,
    };
    let long = engine.analyze_entry(&request);
    let short = engine.analyze_entry(&EntryRequest {
        direction: TradeDirection::Short,
        ..request.clone()
    });
    assert!(long.has_reason(ReasonCode::SessionRangeConfluence));
    assert!(long.score > short.score);
}

#[test]
fn entry_analysis_is_idempotent_between_bars() {
    let mut engine = SymbolEngine::new("EURUSD", &london_config()).unwrap();
    let bars: Vec<Bar> = (0..60)
        .map(|m| {
            let drift = (m as f64 * 0.3).sin() * 0.002;
            bar(
                2,
                9,
                m,
                1.2000 + drift,
                1.2012 + drift,
                1.1998 + drift,
                1.2005 + drift,
            )
        })
        .collect();
    for end in 1..=bars.len() {
        engine.on_bar(&bars[..end], Some(0.001));
    }

    let request = EntryRequest {
        symbol: "EURUSD",
        direction: TradeDirection::Long,
        price: 1.2005,
        bars: &bars,
        atr: Some(0.001),
        original_signal_price: Some(1.2004),
    };
    let first = engine.analyze_entry(&request);
    let second = engine.analyze_entry(&request);
    assert_eq!(first, second);
}

#[test]
fn exit_urgency_tiers_are_ordered_for_fixed_detector_outputs() {
    // Only the giveback detector carries weight, so confluence equals its
    // strength and can be walked deterministically through every tier.
    let mut config = EngineConfig::default();
    config.exit.weights = ExitWeights {
        trend_flip: 0.0,
        rsi_extreme: 0.0,
        macd_cross: 0.0,
        bollinger_breach: 0.0,
        profit_giveback: 1.0,
        volume_climax: 0.0,
    };
    config.exit.thresholds = ExitThresholds {
        scale_out: 0.20,
        close_now: 0.50,
        emergency: 0.80,
    };
    let mut engine = SymbolEngine::new("EURUSD", &config).unwrap();

    let position = |pnl: f64| PositionSnapshot {
        ticket: Ticket(1),
        symbol: "EURUSD".to_string(),
        direction: TradeDirection::Long,
        entry_price: 100.0,
        current_price: 100.0 + pnl,
        volume: 1.0,
        unrealized_pnl: pnl,
        entry_time: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
    };
    let advisory = AdvisoryInputs::default();
    let bars: Vec<Bar> = Vec::new();

    // Establish a peak of 100, then bleed it down. Giveback strengths:
    // pnl 45 → giveback 0.55 → strength 0.10 (Hold)
    // pnl 30 → giveback 0.70 → strength 0.40 (ScaleOut)
    // pnl 15 → giveback 0.85 → strength 0.70 (CloseNow)
    // pnl  2 → giveback 0.98 → strength 0.96 (Emergency)
    engine.evaluate_exits(&[position(100.0)], &bars, &advisory);

    let mut urgencies = Vec::new();
    for pnl in [45.0, 30.0, 15.0, 2.0] {
        let decisions = engine.evaluate_exits(&[position(pnl)], &bars, &advisory);
        urgencies.push(decisions[0].urgency);
    }
    assert_eq!(
        urgencies,
        vec![
            ExitUrgency::Hold,
            ExitUrgency::ScaleOut,
            ExitUrgency::CloseNow,
            ExitUrgency::Emergency,
        ]
    );
    // Strictly ordered, as the thresholds demand.
    assert!(urgencies.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn structure_break_confluence_flows_into_entry_score() {
    let mut config = EngineConfig::default();
    config.order_blocks.swing_lookback = 2;
    config.order_blocks.min_move_atr = 2.0;
    let mut engine = SymbolEngine::new("EURUSD", &config).unwrap();

    // Swing low at 100.0, a bearish candle, then a bullish break closing
    // 3.5 ATRs above the level.
    let data: &[(f64, f64, f64, f64)] = &[
        (101.5, 102.0, 101.0, 101.2),
        (101.2, 101.6, 100.6, 100.8),
        (100.8, 101.2, 100.0, 100.9),
        (100.9, 101.8, 100.7, 101.5),
        (102.0, 102.2, 101.2, 101.5),
        (101.5, 103.8, 101.3, 103.5),
    ];
    let bars: Vec<Bar> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| bar(2, 9, i as u32, o, h, l, c))
        .collect();
    for end in 1..=bars.len() {
        engine.on_bar(&bars[..end], Some(1.0));
    }

    let long = engine.analyze_entry(&EntryRequest {
        symbol: "EURUSD",
        direction: TradeDirection::Long,
        price: 103.5,
        bars: &bars,
        atr: Some(1.0),
        original_signal_price: None,
    });
    assert!(long.has_reason(ReasonCode::StructureBreakConfirmed));

    let short = engine.analyze_entry(&EntryRequest {
        symbol: "EURUSD",
        direction: TradeDirection::Short,
        price: 103.5,
        bars: &bars,
        atr: Some(1.0),
        original_signal_price: None,
    });
    assert!(short.has_reason(ReasonCode::StructureBreakUnconfirmed));
    assert!(long.score > short.score);
}

#[test]
fn config_hash_is_stamped_into_decisions() {
    let engine = SymbolEngine::new("EURUSD", &london_config()).unwrap();
    let bars: Vec<Bar> = (0..40)
        .map(|m| bar(2, 9, m, 1.2005, 1.2010, 1.2000, 1.2005))
        .collect();
    let decision = engine.analyze_entry(&EntryRequest {
        symbol: "EURUSD",
        direction: TradeDirection::Long,
        price: 1.2005,
        bars: &bars,
        atr: Some(0.001),
        original_signal_price: None,
    });
    assert_eq!(decision.config_hash.0.len(), 64);
}
