//! Engine configuration.
//!
//! One serde table per component. Every field has a default, so a partial TOML
//! file is a valid configuration. Out-of-range values are rejected by
//! [`EngineConfig::validate`] at load time; the engine never sees an invalid
//! configuration mid-stream.

use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Side;
use crate::regime::Regime;

/// Configuration errors. Only produced while loading / validating.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which directions the engine may open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    LongOnly,
    ShortOnly,
    #[default]
    LongShort,
}

impl TradingMode {
    pub fn allows(self, side: Side) -> bool {
        match self {
            TradingMode::LongOnly => side == Side::Long,
            TradingMode::ShortOnly => side == Side::Short,
            TradingMode::LongShort => true,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trading_mode: TradingMode,
    pub regime: RegimeConfig,
    pub score: ScoreConfig,
    pub gates: GateConfig,
    pub open_window: OpenWindowConfig,
    pub exits: ExitConfig,
    pub risk: RiskConfig,
    pub cooldown: CooldownConfig,
}

// ── Regime ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// ATR percentile at or above which the raw regime is VOL_SHOCK.
    pub shock_threshold: f64,
    /// VOL_SHOCK releases only once the percentile drops below
    /// `shock_threshold - release_delta`.
    pub release_delta: f64,
    /// Choppiness at or above which the raw regime is CHOP.
    pub chop_threshold: f64,
    /// Trend strength at or above which the raw regime is TREND.
    pub trend_threshold: f64,
    pub min_hold_bars: u32,
    /// Emit CONSOLIDATION when the effective regime turns RANGE or CHOP.
    pub emit_consolidation: bool,
    pub overrides: RegimeOverrides,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            shock_threshold: 95.0,
            release_delta: 10.0,
            chop_threshold: 61.8,
            trend_threshold: 25.0,
            min_hold_bars: 3,
            emit_consolidation: true,
            overrides: RegimeOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeOverrides {
    pub trend: ThresholdOverride,
    pub range: ThresholdOverride,
    pub chop: ThresholdOverride,
    pub vol_shock: ThresholdOverride,
}

impl RegimeOverrides {
    pub fn for_regime(&self, regime: Regime) -> &ThresholdOverride {
        match regime {
            Regime::Trend => &self.trend,
            Regime::Range => &self.range,
            Regime::Chop => &self.chop,
            Regime::VolShock => &self.vol_shock,
        }
    }
}

/// Thresholds that may be replaced while a given regime is effective.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverride {
    pub cooldown_bars: Option<u32>,
    pub cooldown_minutes: Option<u32>,
    pub min_prob: Option<f64>,
    pub abstain_override_conf: Option<f64>,
}

/// Thresholds after applying the override for the effective regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveThresholds {
    pub cooldown_bars: u32,
    pub cooldown_minutes: u32,
    pub min_prob: f64,
    pub abstain_override_conf: f64,
}

// ── Score ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub osc_cross: f64,
    pub structure_break: f64,
    pub momentum: f64,
    pub trend: f64,
    pub stack: f64,
    pub volume: f64,
    /// Added to both sides while CHOP is effective. A negative value also
    /// raises the chop veto.
    pub chop_penalty: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            osc_cross: 0.25,
            structure_break: 0.20,
            momentum: 0.20,
            trend: 0.15,
            stack: 0.10,
            volume: 0.10,
            chop_penalty: -0.30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub weights: ScoreWeights,
    /// Minimum side score for a score-path candidate.
    pub entry_threshold: f64,
    /// Require trend / stack context to agree with the side.
    pub context_gate: bool,
    pub min_conf_long: Option<f64>,
    pub min_conf_short: Option<f64>,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            entry_threshold: 0.6,
            context_gate: true,
            min_conf_long: None,
            min_conf_short: None,
        }
    }
}

// ── Entry gates ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum fraction of core features present.
    pub min_completeness: f64,
    /// Reliability fails when ATR is unavailable.
    pub require_atr: bool,
    /// Minimum count of features agreeing with the side.
    pub min_evidence: u32,
    /// Minimum calibrated edge p_side - p_other.
    pub min_edge: f64,
    /// Confidence above which an abstain decision is overridden.
    pub abstain_override_conf: f64,
    pub prob_floor_enabled: bool,
    pub min_prob: f64,
    pub reversal_enabled: bool,
    pub rev_floor_enabled: bool,
    pub rev_min_prob: f64,
    pub rescue_enabled: bool,
    pub rescue_min_prob: f64,
    /// Hard veto of entries against the oscillator stack.
    pub stack_veto: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_completeness: 0.5,
            require_atr: true,
            min_evidence: 2,
            min_edge: 0.0,
            abstain_override_conf: 0.85,
            prob_floor_enabled: true,
            min_prob: 0.55,
            reversal_enabled: true,
            rev_floor_enabled: true,
            rev_min_prob: 0.50,
            rescue_enabled: true,
            rescue_min_prob: 0.60,
            stack_veto: true,
        }
    }
}

// ── Open window ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSides {
    #[default]
    Both,
    LongOnly,
    ShortOnly,
}

impl WindowSides {
    pub fn covers(self, side: Side) -> bool {
        match self {
            WindowSides::Both => true,
            WindowSides::LongOnly => side == Side::Long,
            WindowSides::ShortOnly => side == Side::Short,
        }
    }
}

/// Which candidate origins the open-window bypass applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    #[default]
    All,
    ScoreOnly,
    ReversalOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenWindowConfig {
    pub enabled: bool,
    /// Session open in exchange-local time.
    pub session_open: NaiveTime,
    /// Exchange-local offset from UTC in minutes.
    pub utc_offset_minutes: i32,
    pub window_minutes: u32,
    pub sides: WindowSides,
    pub scope: WindowScope,
}

impl Default for OpenWindowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            session_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            utc_offset_minutes: -300,
            window_minutes: 30,
            sides: WindowSides::Both,
            scope: WindowScope::All,
        }
    }
}

// ── Exits ───────────────────────────────────────────────────────────

/// Price used to detect stop / target breaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTouch {
    /// Bar high / low.
    #[default]
    Wick,
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub risk_touch: RiskTouch,
    pub stack_exit: bool,
    pub trend_exit: bool,
    pub structure_exit: bool,
    pub engulfing_exit: bool,
    /// Re-run the exit union after entry for a position opened this bar.
    pub same_bar_exit: bool,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            risk_touch: RiskTouch::Wick,
            stack_exit: true,
            trend_exit: true,
            structure_exit: true,
            engulfing_exit: true,
            same_bar_exit: false,
        }
    }
}

// ── Dynamic risk ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub sl_atr_mult: f64,
    pub tp_atr_mult: f64,
    /// Used as ATR (fraction of entry price) when ATR is unavailable.
    pub atr_fallback_pct: f64,
    pub take_profit: DynamicTpConfig,
    pub stop: DynamicStopConfig,
    pub breakeven: BreakevenConfig,
    pub trailing: TrailingConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sl_atr_mult: 2.0,
            tp_atr_mult: 6.0,
            atr_fallback_pct: 0.005,
            take_profit: DynamicTpConfig::default(),
            stop: DynamicStopConfig::default(),
            breakeven: BreakevenConfig::default(),
            trailing: TrailingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicTpConfig {
    pub enabled: bool,
    pub kick_in_r: f64,
    pub add_atr_per_r: f64,
    pub max_expand_atr: f64,
    pub require_trend_alignment: bool,
    pub min_confidence: Option<f64>,
}

impl Default for DynamicTpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kick_in_r: 1.5,
            add_atr_per_r: 0.5,
            max_expand_atr: 3.0,
            require_trend_alignment: false,
            min_confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicStopConfig {
    pub widen_enabled: bool,
    pub widen_max_r: f64,
    pub widen_max_atr: f64,
    pub tighten_enabled: bool,
    pub tighten_start_r: f64,
    pub tighten_atr_per_r: f64,
    pub tighten_max_atr: f64,
    pub require_trend_alignment: bool,
    pub min_confidence: Option<f64>,
}

impl Default for DynamicStopConfig {
    fn default() -> Self {
        Self {
            widen_enabled: false,
            widen_max_r: 0.5,
            widen_max_atr: 0.5,
            tighten_enabled: true,
            tighten_start_r: 1.0,
            tighten_atr_per_r: 0.5,
            tighten_max_atr: 2.0,
            require_trend_alignment: false,
            min_confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakevenConfig {
    pub enabled: bool,
    pub trigger_r: f64,
    pub buffer_atr: f64,
}

impl Default for BreakevenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_r: 1.0,
            buffer_atr: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingConfig {
    pub enabled: bool,
    pub start_r: f64,
    pub distance_atr: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_r: 2.0,
            distance_atr: 1.5,
        }
    }
}

// ── Cooldown ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownMode {
    #[default]
    Bars,
    Minutes,
}

/// Which events refresh the cooldown timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownTriggers {
    #[default]
    ExitsOnly,
    AllSignals,
    EntriesOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub mode: CooldownMode,
    pub bars: u32,
    pub minutes: u32,
    pub triggers: CooldownTriggers,
    pub allow_cover_to_buy: bool,
    pub allow_exit_to_short: bool,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            mode: CooldownMode::Bars,
            bars: 1,
            minutes: 0,
            triggers: CooldownTriggers::ExitsOnly,
            allow_cover_to_buy: false,
            allow_exit_to_short: false,
        }
    }
}

// ── Loading / validation ────────────────────────────────────────────

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Pretty TOML rendering (used by `signalgate config --print-default`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.regime;
        check_range("regime.shock_threshold", r.shock_threshold, 0.0, 100.0, "(0, 100]")?;
        if r.shock_threshold <= 0.0 {
            return Err(out_of_range("regime.shock_threshold", r.shock_threshold, "(0, 100]"));
        }
        check_non_negative("regime.release_delta", r.release_delta)?;
        if r.release_delta > r.shock_threshold {
            return Err(ConfigError::Invalid(
                "regime.release_delta must not exceed regime.shock_threshold".into(),
            ));
        }
        check_range("regime.chop_threshold", r.chop_threshold, 0.0, 100.0, "[0, 100]")?;
        check_range("regime.trend_threshold", r.trend_threshold, 0.0, 100.0, "[0, 100]")?;
        for ov in [&r.overrides.trend, &r.overrides.range, &r.overrides.chop, &r.overrides.vol_shock] {
            if let Some(p) = ov.min_prob {
                check_probability("regime.overrides.*.min_prob", p)?;
            }
            if let Some(c) = ov.abstain_override_conf {
                check_probability("regime.overrides.*.abstain_override_conf", c)?;
            }
        }

        let s = &self.score;
        let w = &s.weights;
        for (field, v) in [
            ("score.weights.osc_cross", w.osc_cross),
            ("score.weights.structure_break", w.structure_break),
            ("score.weights.momentum", w.momentum),
            ("score.weights.trend", w.trend),
            ("score.weights.stack", w.stack),
            ("score.weights.volume", w.volume),
        ] {
            check_non_negative(field, v)?;
        }
        check_finite("score.weights.chop_penalty", w.chop_penalty)?;
        check_non_negative("score.entry_threshold", s.entry_threshold)?;
        if let Some(c) = s.min_conf_long {
            check_probability("score.min_conf_long", c)?;
        }
        if let Some(c) = s.min_conf_short {
            check_probability("score.min_conf_short", c)?;
        }

        let g = &self.gates;
        check_probability("gates.min_completeness", g.min_completeness)?;
        check_range("gates.min_edge", g.min_edge, -1.0, 1.0, "[-1, 1]")?;
        check_probability("gates.abstain_override_conf", g.abstain_override_conf)?;
        check_probability("gates.min_prob", g.min_prob)?;
        check_probability("gates.rev_min_prob", g.rev_min_prob)?;
        check_probability("gates.rescue_min_prob", g.rescue_min_prob)?;

        if self.open_window.enabled && self.open_window.window_minutes == 0 {
            return Err(ConfigError::Invalid(
                "open_window.window_minutes must be > 0 when the window is enabled".into(),
            ));
        }
        if self.open_window.utc_offset_minutes.abs() > 14 * 60 {
            return Err(out_of_range(
                "open_window.utc_offset_minutes",
                self.open_window.utc_offset_minutes as f64,
                "[-840, 840]",
            ));
        }

        let k = &self.risk;
        check_positive("risk.sl_atr_mult", k.sl_atr_mult)?;
        check_positive("risk.tp_atr_mult", k.tp_atr_mult)?;
        check_positive("risk.atr_fallback_pct", k.atr_fallback_pct)?;
        check_non_negative("risk.take_profit.kick_in_r", k.take_profit.kick_in_r)?;
        check_non_negative("risk.take_profit.add_atr_per_r", k.take_profit.add_atr_per_r)?;
        check_non_negative("risk.take_profit.max_expand_atr", k.take_profit.max_expand_atr)?;
        if let Some(c) = k.take_profit.min_confidence {
            check_probability("risk.take_profit.min_confidence", c)?;
        }
        check_finite("risk.stop.widen_max_r", k.stop.widen_max_r)?;
        check_non_negative("risk.stop.widen_max_atr", k.stop.widen_max_atr)?;
        check_non_negative("risk.stop.tighten_start_r", k.stop.tighten_start_r)?;
        check_non_negative("risk.stop.tighten_atr_per_r", k.stop.tighten_atr_per_r)?;
        check_non_negative("risk.stop.tighten_max_atr", k.stop.tighten_max_atr)?;
        if let Some(c) = k.stop.min_confidence {
            check_probability("risk.stop.min_confidence", c)?;
        }
        check_non_negative("risk.breakeven.trigger_r", k.breakeven.trigger_r)?;
        check_non_negative("risk.breakeven.buffer_atr", k.breakeven.buffer_atr)?;
        check_non_negative("risk.trailing.start_r", k.trailing.start_r)?;
        check_positive("risk.trailing.distance_atr", k.trailing.distance_atr)?;

        Ok(())
    }

    /// Thresholds with the override for `regime` applied.
    pub fn effective(&self, regime: Regime) -> EffectiveThresholds {
        let ov = self.regime.overrides.for_regime(regime);
        EffectiveThresholds {
            cooldown_bars: ov.cooldown_bars.unwrap_or(self.cooldown.bars),
            cooldown_minutes: ov.cooldown_minutes.unwrap_or(self.cooldown.minutes),
            min_prob: ov.min_prob.unwrap_or(self.gates.min_prob),
            abstain_override_conf: ov
                .abstain_override_conf
                .unwrap_or(self.gates.abstain_override_conf),
        }
    }

    /// BLAKE3 hex digest of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        blake3::hash(&bytes).to_hex().to_string()
    }
}

pub(crate) fn out_of_range(field: &'static str, value: f64, expected: &'static str) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        value,
        expected,
    }
}

pub(crate) fn check_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(out_of_range(field, value, "a finite number"))
    }
}

pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    lo: f64,
    hi: f64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(())
    } else {
        Err(out_of_range(field, value, expected))
    }
}

pub(crate) fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_range(field, value, 0.0, 1.0, "[0, 1]")
}

pub(crate) fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(out_of_range(field, value, ">= 0"))
    }
}

pub(crate) fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(out_of_range(field, value, "> 0"))
    }
}
