use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ServiceError};
use crate::lenient;

// Request type tag, also the first segment of every cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    MarketOutlook,
    PriceForecast,
    MarketSentiment,
    TickerSentiment,
    MarketIndicators,
    InvestmentIdeas,
}

impl RequestKind {
    pub const ALL: [RequestKind; 6] = [
        RequestKind::MarketOutlook,
        RequestKind::PriceForecast,
        RequestKind::MarketSentiment,
        RequestKind::TickerSentiment,
        RequestKind::MarketIndicators,
        RequestKind::InvestmentIdeas,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            RequestKind::MarketOutlook => "market-outlook",
            RequestKind::PriceForecast => "price-forecast",
            RequestKind::MarketSentiment => "market-sentiment",
            RequestKind::TickerSentiment => "ticker-sentiment",
            RequestKind::MarketIndicators => "market-indicators",
            RequestKind::InvestmentIdeas => "investment-ideas",
        }
    }

    // Shape the provider is asked to return
    pub fn shape(self) -> Shape {
        match self {
            RequestKind::InvestmentIdeas => Shape::Array,
            _ => Shape::Object,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for RequestKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| ConfigError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    Week,
    Month,
    Quarter,
}

impl Timeframe {
    pub fn describe(self) -> &'static str {
        match self {
            Timeframe::Day => "next trading day",
            Timeframe::Week => "next week",
            Timeframe::Month => "next month",
            Timeframe::Quarter => "next quarter",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::Day => "day",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
            Timeframe::Quarter => "quarter",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SentimentScope {
    Market,
    Ticker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Short,
    Medium,
    Long,
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::Moderate => "moderate",
            RiskProfile::Aggressive => "aggressive",
        })
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Horizon::Short => "short",
            Horizon::Medium => "medium",
            Horizon::Long => "long",
        })
    }
}

// User-preference bundle for investment ideas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentPreferences {
    pub risk_profile: RiskProfile,
    pub investment_horizon: Horizon,
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub exclude_sectors: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub investment_amount: Option<f64>,
}

impl InvestmentPreferences {
    // Lists are treated as sets so equal preference bundles share a cache key
    fn normalized(mut self) -> Self {
        for list in [&mut self.sectors, &mut self.exclude_sectors, &mut self.themes] {
            *list = list
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            list.sort();
            list.dedup();
        }
        self
    }
}

/// One logical prediction request. Constructed through the checked
/// constructors below and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionRequest {
    MarketOutlook { timeframe: Timeframe },
    PriceForecast { ticker: String },
    Sentiment { scope: SentimentScope },
    MarketIndicators,
    InvestmentIdeas { preferences: InvestmentPreferences },
}

fn normalize_ticker(raw: &str) -> Result<String, ServiceError> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(ServiceError::InvalidRequest("ticker must not be empty".into()));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
    {
        return Err(ServiceError::InvalidRequest(format!(
            "ticker `{ticker}` contains unsupported characters"
        )));
    }
    Ok(ticker)
}

impl PredictionRequest {
    pub fn market_outlook(timeframe: Timeframe) -> Self {
        PredictionRequest::MarketOutlook { timeframe }
    }

    pub fn price_forecast(ticker: &str) -> Result<Self, ServiceError> {
        Ok(PredictionRequest::PriceForecast {
            ticker: normalize_ticker(ticker)?,
        })
    }

    pub fn sentiment(scope: SentimentScope) -> Result<Self, ServiceError> {
        let scope = match scope {
            SentimentScope::Market => SentimentScope::Market,
            SentimentScope::Ticker(t) => SentimentScope::Ticker(normalize_ticker(&t)?),
        };
        Ok(PredictionRequest::Sentiment { scope })
    }

    pub fn market_indicators() -> Self {
        PredictionRequest::MarketIndicators
    }

    pub fn investment_ideas(preferences: InvestmentPreferences) -> Result<Self, ServiceError> {
        if let Some(amount) = preferences.investment_amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ServiceError::InvalidRequest(
                    "investment amount must be a positive number".into(),
                ));
            }
        }
        Ok(PredictionRequest::InvestmentIdeas {
            preferences: preferences.normalized(),
        })
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            PredictionRequest::MarketOutlook { .. } => RequestKind::MarketOutlook,
            PredictionRequest::PriceForecast { .. } => RequestKind::PriceForecast,
            PredictionRequest::Sentiment {
                scope: SentimentScope::Market,
            } => RequestKind::MarketSentiment,
            PredictionRequest::Sentiment {
                scope: SentimentScope::Ticker(_),
            } => RequestKind::TickerSentiment,
            PredictionRequest::MarketIndicators => RequestKind::MarketIndicators,
            PredictionRequest::InvestmentIdeas { .. } => RequestKind::InvestmentIdeas,
        }
    }

    // Parameter set used for cache keys and audit records
    pub fn params(&self) -> Value {
        match self {
            PredictionRequest::MarketOutlook { timeframe } => json!({ "timeframe": timeframe }),
            PredictionRequest::PriceForecast { ticker } => json!({ "ticker": ticker }),
            PredictionRequest::Sentiment { scope } => match scope {
                SentimentScope::Market => json!({ "scope": "market" }),
                SentimentScope::Ticker(ticker) => json!({ "scope": "ticker", "ticker": ticker }),
            },
            PredictionRequest::MarketIndicators => json!({ "scope": "indicators" }),
            PredictionRequest::InvestmentIdeas { preferences } => {
                serde_json::to_value(preferences).unwrap_or(Value::Null)
            }
        }
    }

    // Stamp request-derived fields onto a validated live result
    pub fn decorate(&self, value: &mut Value) {
        let Some(obj) = value.as_object_mut() else {
            return;
        };
        match self {
            PredictionRequest::MarketOutlook { timeframe } => {
                obj.insert("timeframe".into(), json!(timeframe));
                obj.insert("createdAt".into(), json!(Utc::now()));
            }
            PredictionRequest::PriceForecast { ticker } => {
                obj.insert("ticker".into(), json!(ticker));
            }
            PredictionRequest::Sentiment {
                scope: SentimentScope::Ticker(ticker),
            } => {
                obj.insert("ticker".into(), json!(ticker));
            }
            _ => {}
        }
    }
}

/// Result of one resolution: the schema-valid JSON value plus whether it was
/// produced locally instead of by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub kind: RequestKind,
    pub synthetic: bool,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptSpec {
    pub provider_id: String,
    pub model_id: String,
}

impl AttemptSpec {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
        }
    }
}

impl fmt::Display for AttemptSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider_id, self.model_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Outlook {
    Bearish,
    #[default]
    Neutral,
    Bullish,
}

impl fmt::Display for Outlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outlook::Bearish => "bearish",
            Outlook::Neutral => "neutral",
            Outlook::Bullish => "bullish",
        })
    }
}

impl Outlook {
    pub fn score(self) -> u8 {
        match self {
            Outlook::Bearish => 1,
            Outlook::Neutral => 2,
            Outlook::Bullish => 3,
        }
    }
}

fn mentions(label: &str, words: &[&str]) -> bool {
    words.iter().any(|w| label.contains(w))
}

// Providers are loose with labels: "Positive", "moderately bullish", "BEARISH".
// Anything without a recognisable lean reads as neutral.
impl<'de> Deserialize<'de> for Outlook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let label = raw.as_str().unwrap_or_default().to_ascii_lowercase();
        Ok(if mentions(&label, &["bear", "negative", "pessimis"]) {
            Outlook::Bearish
        } else if mentions(&label, &["bull", "positive", "optimis"]) {
            Outlook::Bullish
        } else {
            Outlook::Neutral
        })
    }
}

lazy_static! {
    static ref RETURN_RANGE: Regex =
        Regex::new(r"([+-]?\d+(?:\.\d+)?)\s*%?\s*to\s*([+-]?\d+(?:\.\d+)?)\s*%").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SectorPrediction {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub sector: String,
    pub outlook: Outlook,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub potential_return: String,
    #[serde(deserialize_with = "lenient::string_or_list")]
    pub key_stocks: Vec<String>,
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub rationale: String,
}

impl SectorPrediction {
    // Parses "-2% to +1%" style ranges
    pub fn return_range(&self) -> Option<(f64, f64)> {
        let caps = RETURN_RANGE.captures(&self.potential_return)?;
        let low = caps[1].parse().ok()?;
        let high = caps[2].parse().ok()?;
        Some((low, high))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PriceRange {
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub low: f64,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexPrediction {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub index: String,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub current_value: f64,
    pub predicted_range: PriceRange,
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub confidence: f64,
    #[serde(deserialize_with = "lenient::string_or_list")]
    pub key_drivers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOutlook {
    pub market_outlook: Outlook,
    pub confidence_score: f64,
    pub key_drivers: Vec<String>,
    #[serde(deserialize_with = "lenient::items_that_decode")]
    pub sector_predictions: Vec<SectorPrediction>,
    #[serde(deserialize_with = "lenient::items_that_decode")]
    pub major_index_predictions: Vec<IndexPrediction>,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub analysis: String,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceForecast {
    #[serde(default)]
    pub ticker: String,
    pub current_price: f64,
    pub predicted_prices: BTreeMap<String, f64>,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub confidence: f64,
    #[serde(default, deserialize_with = "lenient::string_or_list")]
    pub technical_factors: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_or_list")]
    pub fundamental_factors: Vec<String>,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSentiment {
    pub overall: Outlook,
    pub sectors: BTreeMap<String, Outlook>,
    pub analysis: String,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerSentiment {
    pub ticker: String,
    pub sentiment: Outlook,
    pub confidence_score: f64,
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentIdea {
    pub ticker: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub reason: String,
    pub risk_level: String,
    pub potential_return: String,
    pub suggested_allocation: f64,
    #[serde(default)]
    pub synthetic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Stable,
}

// "rising", "Upward", "falling slightly" and friends
impl<'de> Deserialize<'de> for Trend {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let label = raw.as_str().unwrap_or_default().to_ascii_lowercase();
        let label = label.trim();
        Ok(if label.starts_with("up") || label.contains("rising") || label.contains("higher") {
            Trend::Up
        } else if label.starts_with("down") || label.contains("falling") || label.contains("lower") {
            Trend::Down
        } else {
            Trend::Stable
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IndicatorReading {
    // Kept as text: providers write "4,512", "4.3%" or "$78/bbl"
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub value: String,
    pub trend: Trend,
    pub sentiment: Outlook,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketIndicators {
    #[serde(deserialize_with = "lenient::entries_that_decode")]
    pub indicators: BTreeMap<String, IndicatorReading>,
    pub summary: String,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure: Option<String>,
}

// Sentiment comes back in one of two shapes depending on scope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Sentiment {
    Market(MarketSentiment),
    Ticker(TickerSentiment),
}
