//! Backtest configuration
//!
//! Loaded from TOML, validated once, then treated as immutable. Percent fields
//! are in percent units (`1.0` is 1%). Pattern tolerances are fractions.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    risk::RiskLimits, AbcdDetector, BuiltinDetector, DoubleTopBottomDetector, Error,
    GartleyDetector, PatternScanner, Period, Ratio, Result, ScannerBuilder,
    DEFAULT_SWING_LOOKBACK,
};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub instruments: Vec<String>,
    pub account: AccountConfig,
    pub risk: RiskConfig,
    pub patterns: PatternSettings,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub equity: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    pub per_trade_risk_pct: f64,
    pub max_concurrent_risk_pct: f64,
    pub max_open_positions: usize,
    pub max_daily_drawdown_pct: f64,
    #[serde(default = "enabled")]
    pub allow_add_ons: bool,
    #[serde(default = "default_max_add_ons")]
    pub max_add_ons: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PatternSettings {
    #[serde(default = "enabled")]
    pub enable_engulfing: bool,
    #[serde(default = "enabled")]
    pub enable_double_top_bottom: bool,
    #[serde(default = "enabled")]
    pub enable_abcd: bool,
    #[serde(default = "enabled")]
    pub enable_gartley: bool,
    #[serde(default)]
    pub enable_candlesticks: bool,
    #[serde(default)]
    pub enable_chart_patterns: bool,
    pub min_confluence_score: u8,
    #[serde(default = "default_swing_lookback")]
    pub swing_lookback: Period,
    #[serde(default = "enabled")]
    pub require_regime_alignment: bool,
    #[serde(default)]
    pub double_top_bottom: DoubleTopBottomSettings,
    #[serde(default)]
    pub abcd: AbcdSettings,
    #[serde(default)]
    pub gartley: GartleySettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DoubleTopBottomSettings {
    pub price_similarity_threshold: Ratio,
    #[serde(default = "zero_ratio")]
    pub neckline_break_confirmation: Ratio,
}

impl Default for DoubleTopBottomSettings {
    fn default() -> Self {
        Self {
            price_similarity_threshold: Ratio::new_const(0.01),
            neckline_break_confirmation: zero_ratio(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct AbcdSettings {
    /// Max relative difference between the AB and BC bar counts
    #[serde(default)]
    pub time_symmetry_tolerance: Option<Ratio>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GartleySettings {
    pub b_point_tolerance: Ratio,
    pub d_point_tolerance: Ratio,
}

impl Default for GartleySettings {
    fn default() -> Self {
        Self {
            b_point_tolerance: Ratio::new_const(0.05),
            d_point_tolerance: Ratio::new_const(0.05),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub commission_per_trade: f64,
    /// Adverse fill adjustment, percent of price
    #[serde(default)]
    pub slippage_pct: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    /// Bars the trailing stop extreme is taken over
    #[serde(default = "default_trailing_window")]
    pub trailing_window: Period,
    /// Longest bar slice handed to the signal source
    #[serde(default = "default_detection_window")]
    pub detection_window: Period,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            trailing_window: default_trailing_window(),
            detection_window: default_detection_window(),
        }
    }
}

fn enabled() -> bool {
    true
}

fn default_max_add_ons() -> usize {
    2
}

fn default_swing_lookback() -> Period {
    DEFAULT_SWING_LOOKBACK
}

fn default_trailing_window() -> Period {
    Period::new_const(3)
}

fn default_detection_window() -> Period {
    Period::new_const(250)
}

fn zero_ratio() -> Ratio {
    Ratio::new_const(0.0)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            account: AccountConfig { equity: 100_000.0 },
            risk: RiskConfig {
                per_trade_risk_pct: 1.0,
                max_concurrent_risk_pct: 5.0,
                max_open_positions: 5,
                max_daily_drawdown_pct: 3.0,
                allow_add_ons: true,
                max_add_ons: default_max_add_ons(),
            },
            patterns: PatternSettings {
                enable_engulfing: true,
                enable_double_top_bottom: true,
                enable_abcd: true,
                enable_gartley: true,
                enable_candlesticks: false,
                enable_chart_patterns: false,
                min_confluence_score: 60,
                swing_lookback: DEFAULT_SWING_LOOKBACK,
                require_regime_alignment: true,
                double_top_bottom: DoubleTopBottomSettings::default(),
                abcd: AbcdSettings::default(),
                gartley: GartleySettings::default(),
            },
            execution: ExecutionConfig {
                commission_per_trade: 1.0,
                slippage_pct: 0.0,
            },
            backtest: BacktestConfig::default(),
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_nan() || value < min || value > max {
        return Err(Error::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_pretty(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.account.equity.is_finite() && self.account.equity > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "account.equity must be positive, got {}",
                self.account.equity
            )));
        }

        let risk = &self.risk;
        check_range("risk.per_trade_risk_pct", risk.per_trade_risk_pct, 0.0, 100.0)?;
        check_range(
            "risk.max_concurrent_risk_pct",
            risk.max_concurrent_risk_pct,
            0.0,
            100.0,
        )?;
        check_range(
            "risk.max_daily_drawdown_pct",
            risk.max_daily_drawdown_pct,
            0.0,
            100.0,
        )?;
        if risk.max_open_positions == 0 {
            return Err(Error::InvalidConfig(
                "risk.max_open_positions must be at least 1".into(),
            ));
        }

        check_range(
            "patterns.min_confluence_score",
            f64::from(self.patterns.min_confluence_score),
            0.0,
            100.0,
        )?;

        let execution = &self.execution;
        check_range(
            "execution.commission_per_trade",
            execution.commission_per_trade,
            0.0,
            f64::MAX,
        )?;
        check_range("execution.slippage_pct", execution.slippage_pct, 0.0, 100.0)?;

        let lookback = self.patterns.swing_lookback.get();
        let window = self.backtest.detection_window.get();
        if window <= 2 * lookback {
            return Err(Error::InvalidConfig(format!(
                "backtest.detection_window ({window}) must exceed twice patterns.swing_lookback ({lookback})"
            )));
        }
        Ok(())
    }

    pub fn risk_limits(&self) -> RiskLimits {
        RiskLimits {
            max_open_positions: self.risk.max_open_positions,
            max_concurrent_risk_pct: self.risk.max_concurrent_risk_pct,
            max_daily_drawdown_pct: self.risk.max_daily_drawdown_pct,
        }
    }
}

impl PatternSettings {
    /// Scanner with the enabled detectors and configured tolerances
    pub fn scanner(&self) -> Result<PatternScanner> {
        let mut builder = ScannerBuilder::new().swing_lookback(self.swing_lookback);

        if self.enable_engulfing {
            builder = builder.add(BuiltinDetector::Engulfing(Default::default()));
        }
        if self.enable_double_top_bottom {
            builder = builder.add(BuiltinDetector::DoubleTopBottom(DoubleTopBottomDetector::new(
                self.double_top_bottom.price_similarity_threshold,
                self.double_top_bottom.neckline_break_confirmation,
            )));
        }
        if self.enable_abcd {
            builder = builder.add(BuiltinDetector::Abcd(AbcdDetector {
                time_symmetry_tolerance: self.abcd.time_symmetry_tolerance,
                ..AbcdDetector::default()
            }));
        }
        if self.enable_gartley {
            builder = builder.add(BuiltinDetector::Gartley(GartleyDetector::new(
                self.gartley.b_point_tolerance,
                self.gartley.d_point_tolerance,
            )));
        }
        if self.enable_candlesticks {
            builder = builder.with_candlestick_defaults();
        }
        if self.enable_chart_patterns {
            builder = builder.with_chart_defaults();
        }
        builder.build()
    }
}

/// Read, parse and validate a TOML config file
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| Error::ConfigIo {
        path: path.display().to_string(),
        source,
    })?;
    Config::from_toml_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
instruments = ["AAPL", "MSFT"]

[account]
equity = 100000.0

[risk]
per_trade_risk_pct = 1.0
max_concurrent_risk_pct = 5.0
max_open_positions = 3
max_daily_drawdown_pct = 3.0

[patterns]
enable_engulfing = true
enable_double_top_bottom = true
enable_abcd = false
min_confluence_score = 60

[patterns.double_top_bottom]
price_similarity_threshold = 0.01
neckline_break_confirmation = 0.005

[patterns.gartley]
b_point_tolerance = 0.05
d_point_tolerance = 0.05

[execution]
commission_per_trade = 1.0
slippage_pct = 0.1
"#;

    #[test]
    fn parses_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.instruments, vec!["AAPL", "MSFT"]);
        assert_eq!(config.risk.max_open_positions, 3);
        assert!(config.risk.allow_add_ons);
        assert_eq!(config.risk.max_add_ons, 2);
        assert!(!config.patterns.enable_abcd);
        assert!(config.patterns.enable_gartley);
        assert_eq!(config.patterns.swing_lookback.get(), 5);
        assert_eq!(config.backtest.trailing_window.get(), 3);
        assert_eq!(
            config.patterns.double_top_bottom.neckline_break_confirmation.get(),
            0.005
        );
        assert_eq!(config.patterns.abcd.time_symmetry_tolerance, None);
    }

    #[test]
    fn scanner_honours_flags() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let scanner = config.patterns.scanner().unwrap();
        let ids: Vec<_> = scanner.detectors().iter().map(|d| d.id().as_str()).collect();
        assert_eq!(ids, vec!["ENGULFING", "DOUBLE_TOP_BOTTOM", "GARTLEY"]);
    }

    #[test]
    fn rejects_unknown_fields() {
        let doc = SAMPLE.replace("[account]\n", "[account]\nleverage = 2.0\n");
        assert!(matches!(
            Config::from_toml_str(&doc),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let doc = SAMPLE.replace(
            "price_similarity_threshold = 0.01",
            "price_similarity_threshold = 1.5",
        );
        assert!(Config::from_toml_str(&doc).is_err());
    }

    #[test]
    fn rejects_bad_risk() {
        let doc = SAMPLE.replace("per_trade_risk_pct = 1.0", "per_trade_risk_pct = -1.0");
        assert!(matches!(
            Config::from_toml_str(&doc),
            Err(Error::OutOfRange {
                field: "risk.per_trade_risk_pct",
                ..
            })
        ));
    }

    #[test]
    fn rejects_small_detection_window() {
        let mut config = Config::default();
        config.backtest.detection_window = Period::new_const(10);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn default_is_valid_and_round_trips() {
        let config = Config::default();
        config.validate().unwrap();
        let text = config.to_toml_pretty().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_is_config_io() {
        let err = load_config("/nonexistent/pivotbt.toml").unwrap_err();
        assert!(matches!(err, Error::ConfigIo { .. }));
    }
}
