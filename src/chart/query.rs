use std::path::Path;

use chrono::NaiveDate;

use crate::foundation::core::{CHART_BANDS, HOURS_PER_DAY, MAX_DAY_BANDS};
use crate::foundation::error::{ReelError, ReelResult};

/// Tolerance when checking that twilight bands meet end to start.
const BAND_EPSILON: f64 = 1e-6;

/// Daylight level of one background band. Dusk and dawn share a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DayBandKind {
    Night,
    AstronomicalTwilight,
    NauticalTwilight,
    CivilTwilight,
    Day,
}

impl DayBandKind {
    pub fn from_code(code: u8) -> ReelResult<Self> {
        Ok(match code {
            0 => Self::Night,
            1 => Self::AstronomicalTwilight,
            2 => Self::NauticalTwilight,
            3 => Self::CivilTwilight,
            4 => Self::Day,
            other => {
                return Err(ReelError::validation(format!(
                    "unknown day band code {other} (expected 0..=4)"
                )));
            }
        })
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Night => 0,
            Self::AstronomicalTwilight => 1,
            Self::NauticalTwilight => 2,
            Self::CivilTwilight => 3,
            Self::Day => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::AstronomicalTwilight => "astronomical_twilight",
            Self::NauticalTwilight => "nautical_twilight",
            Self::CivilTwilight => "civil_twilight",
            Self::Day => "day",
        }
    }
}

impl TryFrom<u8> for DayBandKind {
    type Error = ReelError;

    fn try_from(code: u8) -> ReelResult<Self> {
        Self::from_code(code)
    }
}

impl From<DayBandKind> for u8 {
    fn from(kind: DayBandKind) -> Self {
        kind.code()
    }
}

/// One background period, in hours after local noon.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TwilightBand {
    pub start: f64,
    pub end: f64,
    pub kind: DayBandKind,
}

impl TwilightBand {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

/// Hourly altitudes of one body, at hours 0..=24 after noon.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArcTrace {
    pub name: String,
    pub altitudes: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LunarTrace {
    pub altitudes: Vec<f64>,
    /// Illuminated fraction per hour, 0..=1.
    pub illumination: Vec<f64>,
}

/// Already computed astronomy for one day of a query.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DayData {
    /// Local clock time at each hour tick; defaults to the noon-based labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_labels: Option<Vec<String>>,
    pub lunar: LunarTrace,
    #[serde(default)]
    pub targets: Vec<ArcTrace>,
    pub bands: Vec<TwilightBand>,
}

impl DayData {
    pub fn validate(&self, day: usize) -> ReelResult<()> {
        let at = |what: &str| format!("day {day}: {what}");

        if let Some(labels) = &self.tick_labels
            && labels.len() != CHART_BANDS
        {
            return Err(ReelError::validation(at(&format!(
                "expected {CHART_BANDS} tick labels, got {}",
                labels.len()
            ))));
        }

        check_hourly(&self.lunar.altitudes, &at("lunar altitudes"))?;
        check_hourly(&self.lunar.illumination, &at("lunar illumination"))?;
        if self
            .lunar
            .illumination
            .iter()
            .any(|v| !(0.0..=1.0).contains(v))
        {
            return Err(ReelError::validation(at(
                "lunar illumination must lie within 0..=1",
            )));
        }
        for target in &self.targets {
            check_hourly(&target.altitudes, &at(&format!("target '{}'", target.name)))?;
        }

        if self.bands.is_empty() || self.bands.len() > MAX_DAY_BANDS {
            return Err(ReelError::validation(at(&format!(
                "expected 1..={MAX_DAY_BANDS} twilight bands, got {}",
                self.bands.len()
            ))));
        }
        let mut edge = 0.0;
        for (i, band) in self.bands.iter().enumerate() {
            if !band.start.is_finite() || !band.end.is_finite() || band.end < band.start {
                return Err(ReelError::validation(at(&format!(
                    "band {i} has invalid span {}..{}",
                    band.start, band.end
                ))));
            }
            if (band.start - edge).abs() > BAND_EPSILON {
                return Err(ReelError::validation(at(&format!(
                    "band {i} starts at {} but the previous band ends at {edge}",
                    band.start
                ))));
            }
            edge = band.end;
        }
        if (edge - HOURS_PER_DAY).abs() > BAND_EPSILON {
            return Err(ReelError::validation(at(&format!(
                "bands end at {edge}, expected {HOURS_PER_DAY}"
            ))));
        }
        Ok(())
    }
}

fn check_hourly(values: &[f64], what: &str) -> ReelResult<()> {
    if values.len() != CHART_BANDS {
        return Err(ReelError::validation(format!(
            "{what}: expected {CHART_BANDS} hourly values, got {}",
            values.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ReelError::validation(format!("{what}: values must be finite")));
    }
    Ok(())
}

/// A chart request: one named set of targets over consecutive days.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Query {
    pub name: String,
    pub start: NaiveDate,
    pub days: Vec<DayData>,
}

impl Query {
    pub fn from_json(text: &str) -> ReelResult<Self> {
        use anyhow::Context as _;
        let query: Self = serde_json::from_str(text).context("failed to parse query JSON")?;
        query.validate()?;
        Ok(query)
    }

    pub fn load(path: impl AsRef<Path>) -> ReelResult<Self> {
        use anyhow::Context as _;
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read query '{}'", path.display()))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.days.is_empty() {
            return Err(ReelError::validation("query must cover at least one day"));
        }
        let targets = self.days[0].targets.len();
        for (day, data) in self.days.iter().enumerate() {
            if data.targets.len() != targets {
                return Err(ReelError::validation(format!(
                    "day {day} has {} targets, day 0 has {targets}",
                    data.targets.len()
                )));
            }
            data.validate(day)?;
        }
        Ok(())
    }

    pub fn total_days(&self) -> u32 {
        u32::try_from(self.days.len()).unwrap_or(u32::MAX)
    }
}
