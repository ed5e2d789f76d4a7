//! ### Convert
//! Tools for turning raw SolarEdge energy exports into canonical
//! `EnergyRecord`s, and for writing computed summaries back out as csv.

use std::{collections::HashMap, fs, io::Write, path::Path};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{compute::MonthlySummary, error::AnalysisError};

pub const TIME: &str = "Time";
pub const GRID_CONSUMPTION: &str = "Bezug (Wh)";
pub const SELF_CONSUMPTION: &str = "Energie - Eigenverbrauch (Wh)";
pub const EXPORTED: &str = "Exportieren (Wh)";
pub const PRODUCTION: &str = "Produktion (Wh)";
pub const SOLAR_SELF_CONSUMPTION: &str = "SolarSelfConsumption.Energy (Wh)";
pub const CONSUMPTION: &str = "Verbrauch (Wh)";
pub const BATTERY_DISCHARGE: &str = "Von der Batterie (Wh)";

const DATE_FORMAT: &str = "%d.%m.%Y";

/// One decoded csv row: header name to raw cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFieldRecord(HashMap<String, String>);

impl RawFieldRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawFieldRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// A single daily reading. All magnitudes are watt-hours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyRecord {
    /// `None` when the source date could not be parsed; such records
    /// never land in a monthly bucket.
    pub timestamp: Option<NaiveDate>,
    pub grid_consumption: f64,
    pub self_consumption: f64,
    pub exported: f64,
    pub production: f64,
    pub solar_self_consumption: f64,
    pub consumption: f64,
    pub battery_discharge: f64,
    /// Share of consumption not drawn from the grid. Not clamped, so it goes
    /// negative when the grid import exceeds the reported consumption.
    pub autarky: f64,
}

impl EnergyRecord {
    /// A reading with only consumption and grid import set; autarky is derived.
    pub fn new(timestamp: Option<NaiveDate>, consumption: f64, grid_consumption: f64) -> Self {
        Self {
            timestamp,
            consumption,
            grid_consumption,
            autarky: autarky(consumption, grid_consumption),
            ..Default::default()
        }
    }
}

/// `1` when nothing was consumed, otherwise the fraction not imported.
pub fn autarky(consumption: f64, grid_consumption: f64) -> f64 {
    if consumption == 0. {
        1.
    } else {
        (consumption - grid_consumption) / consumption
    }
}

/// Normalizes a raw row. Never fails: unparseable magnitudes become `0`
/// and an unparseable date leaves `timestamp` empty.
pub fn map_record(raw: &RawFieldRecord) -> EnergyRecord {
    let grid_consumption = parse_magnitude(raw, GRID_CONSUMPTION);
    let consumption = parse_magnitude(raw, CONSUMPTION);
    EnergyRecord {
        timestamp: raw.get(TIME).and_then(parse_date),
        grid_consumption,
        self_consumption: parse_magnitude(raw, SELF_CONSUMPTION),
        exported: parse_magnitude(raw, EXPORTED),
        production: parse_magnitude(raw, PRODUCTION),
        solar_self_consumption: parse_magnitude(raw, SOLAR_SELF_CONSUMPTION),
        consumption,
        battery_discharge: parse_magnitude(raw, BATTERY_DISCHARGE),
        autarky: autarky(consumption, grid_consumption),
    }
}

fn parse_magnitude(raw: &RawFieldRecord, key: &str) -> f64 {
    raw.get(key)
        .and_then(|value| leading_number(value.trim()).parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.)
}

/// Longest prefix of `text` shaped like a decimal number, e.g. `1234.5` out
/// of `1234.5 Wh`. An exponent only counts when digits follow it.
fn leading_number(text: &str) -> &str {
    let bytes = text.as_bytes();
    let digits_from = |mut idx: usize| {
        while bytes.get(idx).is_some_and(u8::is_ascii_digit) {
            idx += 1;
        }
        idx
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa = int_end > end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa |= frac_end > end + 1;
        end = frac_end;
    }
    if !mantissa {
        return "";
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }
    &text[..end]
}

/// Accepts `DD.MM.YYYY`, optionally followed by a time of day which is ignored.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let (date, rest) = NaiveDate::parse_and_remainder(value.trim(), DATE_FORMAT).ok()?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(date)
}

/// Decodes csv text with a header row into raw records. Exports come either
/// `;` or `,` separated; the header line decides.
pub fn parse_raw_records(text: &str) -> Result<Vec<RawFieldRecord>, AnalysisError> {
    let text = text.trim_start_matches('\u{feff}');
    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = if header_line.contains(';') { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut records: Vec<RawFieldRecord> = Vec::new();
    for line in reader.records() {
        let line = line?;
        records.push(headers.iter().zip(line.iter()).collect());
    }
    Ok(records)
}

pub fn read_raw_records(path: &Path) -> Result<Vec<RawFieldRecord>, AnalysisError> {
    let text = fs::read_to_string(path)?;
    let records = parse_raw_records(&text)?;
    tracing::info!(path = %path.display(), rows = records.len(), "decoded csv export");
    Ok(records)
}

/// Reads every export in order and maps the rows. Later files come after
/// earlier ones so that duplicate days resolve to the first file.
pub fn load_energy_records(inputs: &[impl AsRef<Path>]) -> Result<Vec<EnergyRecord>, AnalysisError> {
    let mut records = Vec::new();
    for input in inputs {
        let mapped: Vec<EnergyRecord> = read_raw_records(input.as_ref())?
            .iter()
            .map(map_record)
            .collect();
        let undated = mapped.iter().filter(|r| r.timestamp.is_none()).count();
        if undated > 0 {
            tracing::warn!(
                path = %input.as_ref().display(),
                undated,
                "rows without a readable date are skipped"
            );
        }
        records.extend(mapped);
    }
    Ok(records)
}

#[derive(Debug, Serialize)]
pub struct SummaryCsvRow {
    pub month: String,
    pub consumption_kwh: i64,
    pub from_grid_kwh: i64,
    pub to_grid_kwh: i64,
    pub average_autarky: f64,
    pub grid_cost_per_kwh: f64,
    pub cost_grid: f64,
    pub revenue_grid: f64,
    pub difference: f64,
    pub opportunity_cost: f64,
    pub total_days: usize,
}

impl SummaryCsvRow {
    fn new(month: String, summary: &MonthlySummary) -> Self {
        let cents = |value: f64| (value * 100.).round() / 100.;
        Self {
            month,
            consumption_kwh: summary.consumption,
            from_grid_kwh: summary.from_grid,
            to_grid_kwh: summary.to_grid,
            average_autarky: (summary.average_autarky * 10_000.).round() / 10_000.,
            grid_cost_per_kwh: summary.grid_cost_per_kwh,
            cost_grid: cents(summary.cost_grid),
            revenue_grid: cents(summary.revenue_grid),
            difference: cents(summary.difference),
            opportunity_cost: cents(summary.opportunity_cost),
            total_days: summary.total_days,
        }
    }
}

/// Writes one row per month followed by a `Total` row.
pub fn write_summaries<W: Write>(
    writer: W,
    summaries: &[MonthlySummary],
    totals: &MonthlySummary,
) -> Result<(), AnalysisError> {
    let mut out_csv = csv::Writer::from_writer(writer);
    for summary in summaries {
        let month = summary
            .month_key()
            .map(|key| key.to_string())
            .unwrap_or_default();
        out_csv.serialize(SummaryCsvRow::new(month, summary))?;
    }
    out_csv.serialize(SummaryCsvRow::new("Total".to_string(), totals))?;
    out_csv.flush()?;
    Ok(())
}

pub fn write_summaries_csv(
    output: &Path,
    summaries: &[MonthlySummary],
    totals: &MonthlySummary,
) -> Result<(), AnalysisError> {
    write_summaries(fs::File::create(output)?, summaries, totals)
}
