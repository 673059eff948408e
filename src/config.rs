use std::fmt;
use std::str::FromStr;

use crate::error::AnalyticsError;
use crate::filter::WeekRange;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BandWidth {
    #[default]
    Ten,
    Twenty,
}

impl BandWidth {
    pub fn points(&self) -> u32 {
        match self {
            BandWidth::Ten => 10,
            BandWidth::Twenty => 20,
        }
    }

    /// Lower edge of the band holding `score`; a perfect 100 lands in the top band.
    pub fn band_of(&self, score: f64) -> u32 {
        let width = self.points();
        let clamped = if score.is_finite() {
            score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let band = (clamped / width as f64).floor() as u32 * width;
        band.min(100 - width)
    }
}

impl TryFrom<u32> for BandWidth {
    type Error = AnalyticsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(BandWidth::Ten),
            20 => Ok(BandWidth::Twenty),
            other => Err(AnalyticsError::InvalidBandWidth(other)),
        }
    }
}

impl FromStr for BandWidth {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| AnalyticsError::InvalidBandWidth(0))?;
        BandWidth::try_from(value)
    }
}

impl fmt::Display for BandWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.points())
    }
}

/// Policy knobs for the score-quality aggregates and KPIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalyticsConfig {
    pub band_width: BandWidth,
    pub include_withdrawn_in_grades: bool,
    pub engagement_window: WeekRange,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            band_width: BandWidth::Ten,
            include_withdrawn_in_grades: false,
            engagement_window: WeekRange::EARLY_ENGAGEMENT,
        }
    }
}
