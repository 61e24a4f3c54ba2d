//! Both execution surfaces fed from the reference feature builder.

use chrono::{Duration, TimeZone, Utc};

use signalgate_core::config::EngineConfig;
use signalgate_core::domain::{Bar, SignalKind};
use signalgate_core::features::{FeatureBuilder, FeatureConfig, FeatureSource};
use signalgate_core::surface::{
    compare, ExecutionSurface, IndicatorSurface, OrderAction, StrategySurface,
};

fn trending_waves(n: usize) -> Vec<Bar> {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
    let mut prev = 100.0_f64;
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 0.05 * x + 6.0 * (x / 15.0).sin() + 1.5 * (x / 3.0).cos();
            let open = prev;
            prev = close;
            Bar {
                index: i,
                timestamp: t0 + Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + 0.4,
                low: open.min(close) - 0.4,
                close,
                volume: if i % 17 == 0 { 4_000.0 } else { 1_000.0 },
                confirmed: true,
            }
        })
        .collect()
}

fn builder() -> FeatureBuilder {
    FeatureBuilder::new(FeatureConfig {
        min_calibration_bars: 60,
        ..Default::default()
    })
    .unwrap()
}

fn run_both(bars: &[Bar]) -> (IndicatorSurface, StrategySurface) {
    let features = builder().snapshots(bars);
    let config = EngineConfig::default();
    let mut indicator = IndicatorSurface::new(config.clone()).unwrap();
    let mut strategy = StrategySurface::new(config, 10.0).unwrap();
    for (bar, f) in bars.iter().zip(&features) {
        indicator.on_bar(bar, f);
        strategy.on_bar(bar, f);
    }
    (indicator, strategy)
}

#[test]
fn surfaces_emit_identical_streams() {
    let bars = trending_waves(600);
    let (indicator, strategy) = run_both(&bars);
    let report = compare(indicator.events(), strategy.events());
    assert!(report.is_identical(), "{:?}", report.first_divergence);
    assert_eq!(report.left_count, report.right_count);
}

#[test]
fn strategy_books_every_trade_event() {
    let bars = trending_waves(600);
    let (_, strategy) = run_both(&bars);
    let events = strategy.events();
    let trade_events = events.iter().filter(|e| e.is_trade_event()).count();
    let exits = events.iter().filter(|e| e.kind.is_exit()).count();

    assert_eq!(strategy.orders().len(), trade_events);
    assert_eq!(strategy.trades().len(), exits);
    for order in strategy.orders() {
        assert_eq!(order.quantity, 10.0);
        let expected = match order.tag {
            SignalKind::Buy | SignalKind::RevBuy => OrderAction::Buy,
            SignalKind::Exit => OrderAction::Sell,
            SignalKind::Short | SignalKind::RevShort => OrderAction::SellShort,
            SignalKind::Cover => OrderAction::BuyToCover,
            SignalKind::Consolidation => unreachable!("no orders for consolidation"),
        };
        assert_eq!(order.action, expected);
    }
    for trade in strategy.trades() {
        assert!(trade.exit_bar > trade.entry_bar);
        let expected = (trade.exit_price - trade.entry_price) * trade.side.sign() * trade.quantity;
        assert!((trade.pnl - expected).abs() < 1e-9);
        assert!(trade.mae <= 0.0 && trade.mfe >= 0.0);
    }
}

#[test]
fn brackets_follow_open_positions() {
    let bars = trending_waves(400);
    let (_, strategy) = run_both(&bars);
    for update in strategy.brackets() {
        match update.side {
            signalgate_core::Side::Long => assert!(update.stop < update.target),
            signalgate_core::Side::Short => assert!(update.stop > update.target),
        }
    }
}

#[test]
fn labels_mirror_events() {
    let bars = trending_waves(400);
    let (indicator, _) = run_both(&bars);
    assert_eq!(indicator.labels().len(), indicator.events().len());
    for (label, event) in indicator.labels().iter().zip(indicator.events()) {
        assert_eq!(label.bar_index, event.bar_index);
        assert!(label.text.starts_with(event.kind.label()));
    }
}

#[test]
fn previews_are_not_recorded() {
    let bars = trending_waves(200);
    let features = builder().snapshots(&bars);
    let mut strategy = StrategySurface::new(EngineConfig::default(), 1.0).unwrap();
    for (bar, f) in bars.iter().zip(&features) {
        strategy.on_bar(&bar.as_preview(), f);
    }
    assert!(strategy.events().is_empty());
    assert!(strategy.orders().is_empty());
    assert!(strategy.engine().position().is_none());
}
