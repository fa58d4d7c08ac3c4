//! The statistics behind the report and the invariants they must satisfy.
//!
//! The built-in dataset is the 2025 estimate of the economic contribution of
//! Indian Americans.  Alternative datasets with the same shape can be loaded
//! from JSON, which keeps the layout code independent of the actual numbers.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// An sRGB colour stored as three 8-bit channels.
///
/// Serialized as a `#RRGGBB` hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses a `#RRGGBB` string. The leading `#` is required.
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Converts the colour into the layout engine representation.
    pub fn to_genpdf(self) -> genpdf::style::Color {
        genpdf::style::Color::Rgb(self.0, self.1, self.2)
    }

    /// Converts the colour into the chart backend representation.
    pub fn to_plotters(self) -> plotters::style::RGBColor {
        plotters::style::RGBColor(self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid colour '{value}', expected #RRGGBB"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

/// One economic category of the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Name used in the table and the narrative bullets.
    pub category: String,
    /// Shorter name used on chart axes and pie labels.
    pub chart_label: String,
    /// Annual contribution in billions of US dollars.
    pub value_billions: u32,
    /// Published share of the total, in whole percent.
    pub share_percent: u8,
    /// Colour of the bar and pie wedge.
    pub color: Rgb,
    /// Narrative text for the detailed analysis. May contain inline markup.
    pub detail: String,
}

impl Contribution {
    /// `$410 Billion` as printed in the table.
    pub fn value_label(&self) -> String {
        format!("${} Billion", self.value_billions)
    }

    /// `$410B` as printed above the bars.
    pub fn bar_label(&self) -> String {
        format!("${}B", self.value_billions)
    }
}

/// Everything that goes into the rendered report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    pub title: String,
    pub summary: String,
    pub contributions: Vec<Contribution>,
    /// Label of the summary row at the bottom of the table.
    pub total_label: String,
    pub conclusion: String,
    pub sources: String,
}

impl ReportData {
    /// The hard-coded 2025 dataset.
    pub fn diaspora_2025() -> Self {
        let contribution =
            |category: &str, chart_label: &str, value, share, color: Rgb, detail: &str| {
                Contribution {
                    category: category.to_owned(),
                    chart_label: chart_label.to_owned(),
                    value_billions: value,
                    share_percent: share,
                    color,
                    detail: detail.to_owned(),
                }
            };

        Self {
            title: "Economic Impact of Indian Americans in the US (2025)".to_owned(),
            summary: "As of 2025, the Indian diaspora in the United States is a pivotal economic \
                force, contributing significantly across multiple sectors. With a population of \
                ~4.8 million, Indian Americans drive innovation, entrepreneurship, consumer \
                spending, and tax revenues. This report quantifies their economic impact using \
                data from the U.S. Census Bureau, Bureau of Economic Analysis, and industry \
                projections."
                .to_owned(),
            contributions: vec![
                contribution(
                    "Workforce & Income",
                    "Workforce",
                    410,
                    42,
                    Rgb(0x1f, 0x77, 0xb4),
                    "75% work in high-skill fields (tech, healthcare, finance). Median household \
                     income: $132,000 (vs. U.S. average of $74,580).",
                ),
                contribution(
                    "Entrepreneurship",
                    "Entrepreneurship",
                    220,
                    23,
                    Rgb(0xff, 0x7f, 0x0e),
                    "250,000+ Indian-owned firms. 15% YoY growth since 2020. 1.2 million jobs \
                     supported.",
                ),
                contribution(
                    "Consumer Spending",
                    "Consumer Spending",
                    180,
                    18,
                    Rgb(0x2c, 0xa0, 0x2c),
                    "Per capita spending: $37,500. Top expenditures: Housing (30%), education \
                     (20%), healthcare (15%).",
                ),
                contribution(
                    "Tax Contributions",
                    "Taxes",
                    95,
                    10,
                    Rgb(0xd6, 0x27, 0x28),
                    "Net fiscal impact: +$45 billion (after public services).",
                ),
                contribution(
                    "Education & R&D",
                    "Education & R&D",
                    70,
                    7,
                    Rgb(0x94, 0x67, 0xbd),
                    "200,000 Indian students. 15% of U.S. patents filed by Indian-origin \
                     researchers.",
                ),
            ],
            total_label: "Total Annual Impact".to_owned(),
            conclusion: "The Indian diaspora is indispensable to the U.S. economy, contributing \
                $975 billion annually (5.5% of U.S. GDP). Their dominance in innovation, \
                entrepreneurship, and high-skill labor positions them as critical drivers of \
                America\u{2019}s global competitiveness. Economic impact projected to reach $1.5 \
                Trillion by 2030."
                .to_owned(),
            sources: "U.S. Census Bureau, Bureau of Economic Analysis, National Foundation for \
                American Policy, Indiaspora, McKinsey Global Institute. Report Generated: \
                October 2025."
                .to_owned(),
        }
    }

    /// Decodes a dataset from JSON and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let data: Self = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    /// Reads and validates a dataset stored as JSON on disk.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading report data from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Sum of all category values in billions.
    pub fn total_billions(&self) -> u64 {
        self.contributions
            .iter()
            .map(|c| u64::from(c.value_billions))
            .sum()
    }

    /// `$975 Billion` as printed in the total row.
    pub fn total_label_value(&self) -> String {
        format!("${} Billion", self.total_billions())
    }

    /// Exact share of the category at `index` in percent, computed from the values.
    pub fn derived_share(&self, index: usize) -> Option<f64> {
        let total = self.total_billions();
        if total == 0 {
            return None;
        }
        self.contributions
            .get(index)
            .map(|c| f64::from(c.value_billions) * 100.0 / total as f64)
    }

    /// Checks the invariants the layout relies on.
    ///
    /// Shares must add up to exactly 100 and each published share must agree
    /// with the share derived from the values to within one percentage point.
    pub fn validate(&self) -> Result<()> {
        if self.contributions.is_empty() {
            return Err(ReportError::invalid_data("at least one category is required"));
        }

        let mut seen = HashSet::new();
        for contribution in &self.contributions {
            let name = contribution.category.trim();
            if name.is_empty() {
                return Err(ReportError::invalid_data("category names must not be empty"));
            }
            if !seen.insert(name) {
                return Err(ReportError::invalid_data(format!(
                    "duplicate category '{name}'"
                )));
            }
            if contribution.value_billions == 0 {
                return Err(ReportError::invalid_data(format!(
                    "category '{name}' must have a positive value"
                )));
            }
        }

        let share_sum: u32 = self
            .contributions
            .iter()
            .map(|c| u32::from(c.share_percent))
            .sum();
        if share_sum != 100 {
            return Err(ReportError::invalid_data(format!(
                "category shares add up to {share_sum}%, expected 100%"
            )));
        }

        for (index, contribution) in self.contributions.iter().enumerate() {
            let derived = self.derived_share(index).unwrap_or_default();
            if (derived - f64::from(contribution.share_percent)).abs() > 1.0 {
                return Err(ReportError::invalid_data(format!(
                    "category '{}' is published as {}% but its value accounts for {:.1}%",
                    contribution.category, contribution.share_percent, derived
                )));
            }
        }

        Ok(())
    }
}

impl Default for ReportData {
    fn default() -> Self {
        Self::diaspora_2025()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dataset_is_valid() {
        let data = ReportData::diaspora_2025();
        data.validate().expect("built-in data is consistent");
        assert_eq!(data.total_billions(), 975);
        assert_eq!(data.total_label_value(), "$975 Billion");
        assert_eq!(data.contributions.len(), 5);
    }

    #[test]
    fn published_shares_match_rounded_values() {
        let data = ReportData::diaspora_2025();
        for (index, contribution) in data.contributions.iter().enumerate() {
            let derived = data.derived_share(index).unwrap();
            assert_eq!(derived.round() as u8, contribution.share_percent);
        }
    }

    #[test]
    fn labels_use_report_formatting() {
        let data = ReportData::diaspora_2025();
        assert_eq!(data.contributions[0].value_label(), "$410 Billion");
        assert_eq!(data.contributions[3].bar_label(), "$95B");
    }

    #[test]
    fn rejects_shares_not_summing_to_hundred() {
        let mut data = ReportData::diaspora_2025();
        data.contributions[4].share_percent = 6;
        let err = data.validate().unwrap_err();
        assert!(err.to_string().contains("99%"), "{err}");
    }

    #[test]
    fn rejects_shares_summing_to_more_than_hundred() {
        let mut data = ReportData::diaspora_2025();
        data.contributions[4].share_percent = 8;
        let err = data.validate().unwrap_err();
        assert!(err.to_string().contains("101%"), "{err}");
    }

    #[test]
    fn rejects_share_that_disagrees_with_value() {
        let mut data = ReportData::diaspora_2025();
        data.contributions[0].share_percent = 40;
        data.contributions[1].share_percent = 25;
        let err = data.validate().unwrap_err();
        assert!(err.to_string().contains("Workforce & Income"), "{err}");
    }

    #[test]
    fn rejects_empty_and_duplicate_categories() {
        let mut data = ReportData::diaspora_2025();
        data.contributions.clear();
        assert!(data.validate().is_err());

        let mut data = ReportData::diaspora_2025();
        data.contributions[1].category = "Workforce & Income".to_owned();
        let err = data.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{err}");
    }

    #[test]
    fn rejects_zero_values() {
        let mut data = ReportData::diaspora_2025();
        data.contributions[2].value_billions = 0;
        assert!(data.validate().is_err());
    }

    #[test]
    fn hex_colours_parse_strictly() {
        assert_eq!(Rgb::from_hex("#1f77b4"), Some(Rgb(0x1f, 0x77, 0xb4)));
        assert_eq!(Rgb::from_hex("1f77b4"), None);
        assert_eq!(Rgb::from_hex("#1f77b"), None);
        assert_eq!(Rgb::from_hex("#1g77b4"), None);
        assert_eq!(Rgb(0x94, 0x67, 0xbd).to_string(), "#9467bd");
    }

    #[test]
    fn json_round_trip_preserves_dataset() {
        let data = ReportData::diaspora_2025();
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"#2ca02c\""));
        let decoded = ReportData::from_json_str(&json).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn json_with_bad_colour_is_rejected() {
        let json = serde_json::to_string(&ReportData::diaspora_2025())
            .unwrap()
            .replace("#2ca02c", "green");
        assert!(matches!(
            ReportData::from_json_str(&json),
            Err(ReportError::Json(_))
        ));
    }

    #[test]
    fn bundled_json_matches_builtin_dataset() {
        let json = include_str!("../data/diaspora_2025.json");
        assert_eq!(ReportData::from_json_str(json).unwrap(), ReportData::diaspora_2025());
    }
}
