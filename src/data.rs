//! Candle ingestion: per-instrument feeds and CSV loading

use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::{Candle, Error, OHLCVExt, Result};

/// Candles for one instrument
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentFeed {
    /// One chronological series drives both regime and entries
    Single(Vec<Candle>),
    /// Daily bars give the regime, hourly bars drive entries and the timeline
    MultiTimeframe {
        daily: Vec<Candle>,
        hourly: Vec<Candle>,
    },
}

impl InstrumentFeed {
    /// Bars that drive the timeline and signal checks
    pub fn entry_bars(&self) -> &[Candle] {
        match self {
            InstrumentFeed::Single(candles) => candles,
            InstrumentFeed::MultiTimeframe { hourly, .. } => hourly,
        }
    }

    /// Higher-timeframe regime bars, if separate from the entry bars
    pub fn regime_bars(&self) -> Option<&[Candle]> {
        match self {
            InstrumentFeed::Single(_) => None,
            InstrumentFeed::MultiTimeframe { daily, .. } => Some(daily),
        }
    }

    /// No entry bars to trade on, or no regime bars to classify them with
    pub fn is_empty(&self) -> bool {
        self.entry_bars().is_empty() || self.regime_bars().is_some_and(|daily| daily.is_empty())
    }

    /// Check OHLCV sanity and strict timestamp order of every series
    pub fn validate(&self, instrument: &str) -> Result<()> {
        validate_series(instrument, self.entry_bars())?;
        if let Some(daily) = self.regime_bars() {
            validate_series(instrument, daily)?;
        }
        Ok(())
    }
}

/// Feeds keyed by instrument, iterated in name order
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    feeds: BTreeMap<String, InstrumentFeed>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instrument: impl Into<String>, feed: InstrumentFeed) {
        self.feeds.insert(instrument.into(), feed);
    }

    pub fn with_feed(mut self, instrument: impl Into<String>, feed: InstrumentFeed) -> Self {
        self.insert(instrument, feed);
        self
    }

    pub fn get(&self, instrument: &str) -> Option<&InstrumentFeed> {
        self.feeds.get(instrument)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstrumentFeed)> {
        self.feeds.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for MarketData {
    type Item = (String, InstrumentFeed);
    type IntoIter = std::collections::btree_map::IntoIter<String, InstrumentFeed>;

    fn into_iter(self) -> Self::IntoIter {
        self.feeds.into_iter()
    }
}

/// Every candle is valid OHLCV and timestamps strictly increase
pub fn validate_series(instrument: &str, candles: &[Candle]) -> Result<()> {
    for (index, candle) in candles.iter().enumerate() {
        candle.validate().map_err(|e| match e {
            Error::InvalidOHLCV { reason, .. } => Error::InvalidOHLCV { index, reason },
            other => other,
        })?;
        if index > 0 && candle.timestamp <= candles[index - 1].timestamp {
            return Err(Error::UnorderedCandles {
                instrument: instrument.to_string(),
                index,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CandleRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Load `timestamp,open,high,low,close,volume` rows from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let file = File::open(path.as_ref())?;
    read_csv(file)
}

/// Read candles from any CSV source. Header names are matched case-insensitively
/// and `volume` may be omitted.
pub fn read_csv<R: Read>(source: R) -> Result<Vec<Candle>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);

    let headers: csv::StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    reader.set_headers(headers);

    let mut candles = Vec::new();
    for record in reader.deserialize::<CandleRecord>() {
        let record = record?;
        candles.push(Candle::new(
            parse_timestamp(&record.timestamp)?,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        ));
    }
    Ok(candles)
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `YYYY-MM-DD` (UTC midnight)
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(Error::InvalidTimestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn reads_mixed_case_headers() {
        let data = "Timestamp,Open,High,Low,Close,Volume\n\
2024-01-01,100,102,98,101,1500\n\
2024-01-02 09:30:00,101,103,99,102,1600\n\
2024-01-03T00:00:00Z,102,104,100,103,1700\n";
        let candles = read_csv(data.as_bytes()).unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].timestamp, day(0));
        assert_eq!(
            candles[1].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap()
        );
        assert_eq!(candles[2].close, 103.0);
        assert_eq!(candles[2].volume, 1700.0);
    }

    #[test]
    fn volume_column_is_optional() {
        let data = "timestamp,open,high,low,close\n2024-01-01,1,2,0.5,1.5\n";
        let candles = read_csv(data.as_bytes()).unwrap();
        assert_eq!(candles[0].volume, 0.0);
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let data = "timestamp,open,high,low,close,volume\nyesterday,1,2,0.5,1.5,10\n";
        assert!(matches!(
            read_csv(data.as_bytes()),
            Err(Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn bad_number_is_csv_error() {
        let data = "timestamp,open,high,low,close,volume\n2024-01-01,x,2,0.5,1.5,10\n";
        assert!(matches!(read_csv(data.as_bytes()), Err(Error::Csv(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_csv("/nonexistent/candles.csv"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn series_must_be_ordered() {
        let candles = vec![
            Candle::new(day(1), 1.0, 2.0, 0.5, 1.5, 10.0),
            Candle::new(day(0), 1.0, 2.0, 0.5, 1.5, 10.0),
        ];
        assert!(matches!(
            validate_series("AAPL", &candles),
            Err(Error::UnorderedCandles { index: 1, .. })
        ));
    }

    #[test]
    fn feed_accessors() {
        let daily = vec![Candle::new(day(0), 1.0, 2.0, 0.5, 1.5, 10.0)];
        let feed = InstrumentFeed::MultiTimeframe {
            daily: daily.clone(),
            hourly: Vec::new(),
        };
        assert!(feed.is_empty());
        assert_eq!(feed.regime_bars(), Some(daily.as_slice()));
        assert!(InstrumentFeed::Single(daily.clone()).regime_bars().is_none());

        let no_daily = InstrumentFeed::MultiTimeframe {
            daily: Vec::new(),
            hourly: daily,
        };
        assert!(no_daily.is_empty());
    }
}
