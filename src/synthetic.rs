//! Locally generated stand-ins used when no provider produced a valid result.
//!
//! Values are randomized inside plausible bands but stay internally
//! consistent: a bullish sector never gets a negative lower return bound,
//! support levels sit below the current price and resistance levels above it.
//! Every result is flagged `synthetic` and carries [`DISCLOSURE`].

use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{
    IndexPrediction, IndicatorReading, InvestmentIdea, InvestmentPreferences, MarketIndicators,
    MarketOutlook, MarketSentiment, Outlook, PredictionRequest, PriceForecast, PriceRange,
    RiskProfile, SectorPrediction, SentimentScope, TickerSentiment, Timeframe, Trend,
};

pub const DISCLOSURE: &str =
    "Note: this is a synthetic fallback generated locally because no AI provider was available.";

const SECTORS: &[(&str, &[&str])] = &[
    ("Technology", &["AAPL", "MSFT", "NVDA", "GOOGL"]),
    ("Healthcare", &["JNJ", "PFE", "UNH", "ABBV"]),
    ("Financials", &["JPM", "BAC", "WFC", "GS"]),
    ("Consumer Discretionary", &["AMZN", "TSLA", "HD", "NKE"]),
    ("Consumer Staples", &["PG", "KO", "PEP", "WMT"]),
    ("Energy", &["XOM", "CVX", "COP", "SLB"]),
    ("Industrials", &["CAT", "BA", "GE", "MMM"]),
    ("Materials", &["LIN", "FCX", "APD", "DOW"]),
    ("Utilities", &["NEE", "DUK", "SO", "D"]),
    ("Real Estate", &["AMT", "PLD", "CCI", "SPG"]),
    ("Communication Services", &["META", "NFLX", "DIS", "CMCSA"]),
];

// (name, baseline, +/- band)
const INDICES: &[(&str, f64, f64)] = &[
    ("S&P 500", 4500.0, 100.0),
    ("Dow Jones Industrial Average", 36000.0, 500.0),
    ("Nasdaq Composite", 14500.0, 250.0),
    ("Russell 2000", 2000.0, 50.0),
    ("VIX", 15.0, 5.0),
];

// (name, baseline, +/- band, whether a rise is good for equities)
const INDICATORS: &[(&str, f64, f64, bool)] = &[
    ("S&P 500", 4500.0, 100.0, true),
    ("Dow Jones Industrial Average", 36000.0, 500.0, true),
    ("NASDAQ Composite", 14500.0, 250.0, true),
    ("VIX", 15.0, 5.0, false),
    ("10-Year Treasury Yield", 4.2, 0.4, false),
    ("US Dollar Index", 104.0, 3.0, false),
    ("Crude Oil", 78.0, 8.0, false),
    ("Gold", 2000.0, 80.0, false),
];

struct CatalogIdea {
    ticker: &'static str,
    name: &'static str,
    kind: &'static str,
    sector: &'static str,
    risk: RiskProfile,
    potential_return: &'static str,
}

const CATALOG: &[CatalogIdea] = &[
    CatalogIdea { ticker: "BND", name: "Vanguard Total Bond Market ETF", kind: "etf", sector: "Fixed Income", risk: RiskProfile::Conservative, potential_return: "3-5% annually" },
    CatalogIdea { ticker: "VIG", name: "Vanguard Dividend Appreciation ETF", kind: "etf", sector: "Diversified", risk: RiskProfile::Conservative, potential_return: "5-7% annually" },
    CatalogIdea { ticker: "JNJ", name: "Johnson & Johnson", kind: "stock", sector: "Healthcare", risk: RiskProfile::Conservative, potential_return: "4-6% annually" },
    CatalogIdea { ticker: "PG", name: "Procter & Gamble Co.", kind: "stock", sector: "Consumer Staples", risk: RiskProfile::Conservative, potential_return: "4-6% annually" },
    CatalogIdea { ticker: "NEE", name: "NextEra Energy Inc.", kind: "stock", sector: "Utilities", risk: RiskProfile::Conservative, potential_return: "5-7% annually" },
    CatalogIdea { ticker: "VTI", name: "Vanguard Total Stock Market ETF", kind: "etf", sector: "Diversified", risk: RiskProfile::Moderate, potential_return: "7-9% annually" },
    CatalogIdea { ticker: "MSFT", name: "Microsoft Corp.", kind: "stock", sector: "Technology", risk: RiskProfile::Moderate, potential_return: "8-12% annually" },
    CatalogIdea { ticker: "JPM", name: "JPMorgan Chase & Co.", kind: "stock", sector: "Financials", risk: RiskProfile::Moderate, potential_return: "7-10% annually" },
    CatalogIdea { ticker: "XLV", name: "Health Care Select Sector SPDR Fund", kind: "etf", sector: "Healthcare", risk: RiskProfile::Moderate, potential_return: "6-9% annually" },
    CatalogIdea { ticker: "VNQ", name: "Vanguard Real Estate ETF", kind: "etf", sector: "Real Estate", risk: RiskProfile::Moderate, potential_return: "5-8% annually" },
    CatalogIdea { ticker: "QQQ", name: "Invesco QQQ Trust", kind: "etf", sector: "Technology", risk: RiskProfile::Aggressive, potential_return: "10-15% annually" },
    CatalogIdea { ticker: "NVDA", name: "NVIDIA Corp.", kind: "stock", sector: "Technology", risk: RiskProfile::Aggressive, potential_return: "15-25% annually" },
    CatalogIdea { ticker: "TSLA", name: "Tesla Inc.", kind: "stock", sector: "Consumer Discretionary", risk: RiskProfile::Aggressive, potential_return: "10-30% annually" },
    CatalogIdea { ticker: "XLE", name: "Energy Select Sector SPDR Fund", kind: "etf", sector: "Energy", risk: RiskProfile::Aggressive, potential_return: "8-14% annually" },
    CatalogIdea { ticker: "SMH", name: "VanEck Semiconductor ETF", kind: "etf", sector: "Technology", risk: RiskProfile::Aggressive, potential_return: "12-20% annually" },
];

const MAX_IDEAS: usize = 5;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn random_outlook<R: Rng + ?Sized>(rng: &mut R) -> Outlook {
    match rng.gen_range(0..3) {
        0 => Outlook::Bearish,
        1 => Outlook::Neutral,
        _ => Outlook::Bullish,
    }
}

fn random_confidence<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    f64::from(rng.gen_range(50..80_u32))
}

// Asymmetric integer percent band per outlook
fn return_range<R: Rng + ?Sized>(outlook: Outlook, rng: &mut R) -> String {
    let (min, max) = match outlook {
        Outlook::Bearish => (rng.gen_range(-9..=-2), rng.gen_range(0..=2)),
        Outlook::Neutral => (rng.gen_range(-3..=-1), rng.gen_range(1..=5)),
        Outlook::Bullish => (rng.gen_range(0..=1), rng.gen_range(3..=10)),
    };
    format!("{min}% to {max}%")
}

fn index_prediction<R: Rng + ?Sized>(
    (name, baseline, band): (&str, f64, f64),
    rng: &mut R,
) -> IndexPrediction {
    let current = (baseline + rng.gen_range(-band..band)).round();
    let is_vix = name == "VIX";

    let (low, high) = if is_vix {
        let low = (current - rng.gen_range(0.0..5.0)).max(10.0);
        let high = (current + rng.gen_range(0.0..5.0)).max(low + 2.0);
        (low, high)
    } else {
        let drift = current * rng.gen_range(-0.02..0.02);
        let spread = current * rng.gen_range(0.005..0.05);
        (current + drift - spread, current + drift + spread)
    };

    IndexPrediction {
        index: name.to_string(),
        current_value: current,
        predicted_range: PriceRange {
            low: round2(low),
            high: round2(high),
        },
        confidence: random_confidence(rng),
        key_drivers: vec![
            "Market sentiment".into(),
            "Economic data".into(),
            "Technical patterns".into(),
            if is_vix { "Market volatility" } else { "Sector performance" }.into(),
        ],
    }
}

pub fn market_outlook<R: Rng + ?Sized>(timeframe: Timeframe, rng: &mut R) -> MarketOutlook {
    let sector_predictions = SECTORS
        .iter()
        .map(|(sector, stocks)| {
            let outlook = random_outlook(rng);
            let key_stocks = stocks
                .choose_multiple(rng, 2)
                .map(|s| s.to_string())
                .collect();
            let rationale = match outlook {
                Outlook::Bullish => "Positive momentum expected.",
                Outlook::Bearish => "Caution advised in this sector.",
                Outlook::Neutral => "Mixed signals present.",
            };
            SectorPrediction {
                sector: sector.to_string(),
                outlook,
                potential_return: return_range(outlook, rng),
                key_stocks,
                rationale: format!("Based on current market conditions and technical analysis. {rationale}"),
            }
        })
        .collect();

    let major_index_predictions: Vec<IndexPrediction> = INDICES
        .iter()
        .map(|&index| index_prediction(index, rng))
        .collect();

    // Headline outlook follows where the S&P midpoint lands
    let market_outlook = major_index_predictions
        .iter()
        .find(|p| p.index == "S&P 500")
        .map(|sp| {
            let mid = (sp.predicted_range.low + sp.predicted_range.high) / 2.0;
            if mid > sp.current_value * 1.01 {
                Outlook::Bullish
            } else if mid < sp.current_value * 0.99 {
                Outlook::Bearish
            } else {
                Outlook::Neutral
            }
        })
        .unwrap_or_default();

    MarketOutlook {
        market_outlook,
        confidence_score: random_confidence(rng),
        key_drivers: vec![
            "Federal Reserve policy".into(),
            "Inflation data".into(),
            "Corporate earnings".into(),
            "Market sentiment".into(),
            "Technical indicators".into(),
        ],
        sector_predictions,
        major_index_predictions,
        analysis: format!(
            "The market shows {} signals for the {}. Watch Federal Reserve communications and upcoming earnings reports. {DISCLOSURE}",
            market_outlook,
            timeframe.describe()
        ),
        timeframe: Some(timeframe),
        created_at: Some(Utc::now()),
        synthetic: true,
        disclosure: Some(DISCLOSURE.to_string()),
    }
}

pub fn price_forecast<R: Rng + ?Sized>(ticker: &str, rng: &mut R) -> PriceForecast {
    let base = f64::from(rng.gen_range(50..200_u32));
    let volatility = rng.gen_range(0.05..0.35);

    let mut predicted_prices = BTreeMap::new();
    for (horizon, scale) in [("oneDay", 0.2), ("oneWeek", 0.4), ("oneMonth", 0.7), ("threeMonths", 1.0)] {
        let change = rng.gen_range(-1.0..1.0) * volatility * scale;
        predicted_prices.insert(horizon.to_string(), round2(base * (1.0 + change)));
    }

    PriceForecast {
        ticker: ticker.to_string(),
        current_price: base,
        predicted_prices,
        support_levels: [0.9, 0.85, 0.8].iter().map(|m| round2(base * m)).collect(),
        resistance_levels: [1.1, 1.15, 1.2].iter().map(|m| round2(base * m)).collect(),
        confidence: f64::from(rng.gen_range(55..80_u32)),
        technical_factors: vec![
            "Moving average trends".into(),
            "Volume patterns".into(),
            "Price momentum".into(),
            "Historical support/resistance levels".into(),
        ],
        fundamental_factors: vec![
            "Industry outlook".into(),
            "Recent earnings performance".into(),
            "Market sentiment".into(),
            "Sector rotation trends".into(),
        ],
        synthetic: true,
        disclosure: Some(DISCLOSURE.to_string()),
    }
}

pub fn market_sentiment<R: Rng + ?Sized>(rng: &mut R) -> MarketSentiment {
    let sectors: BTreeMap<String, Outlook> = SECTORS
        .iter()
        .map(|(sector, _)| (sector.to_string(), random_outlook(rng)))
        .collect();

    let mean = sectors.values().map(|o| f64::from(o.score())).sum::<f64>() / sectors.len() as f64;
    let overall = if mean >= 2.5 {
        Outlook::Bullish
    } else if mean <= 1.5 {
        Outlook::Bearish
    } else {
        Outlook::Neutral
    };

    MarketSentiment {
        overall,
        sectors,
        analysis: format!(
            "Sector signals are mixed and conviction is limited across the market. {DISCLOSURE}"
        ),
        synthetic: true,
        disclosure: Some(DISCLOSURE.to_string()),
    }
}

pub fn ticker_sentiment<R: Rng + ?Sized>(ticker: &str, rng: &mut R) -> TickerSentiment {
    TickerSentiment {
        ticker: ticker.to_string(),
        sentiment: random_outlook(rng),
        confidence_score: random_confidence(rng),
        key_factors: vec![
            "Recent price momentum".into(),
            "Sector-wide sentiment".into(),
            "Earnings expectations".into(),
            "Macro environment".into(),
            DISCLOSURE.into(),
        ],
        synthetic: true,
        disclosure: Some(DISCLOSURE.to_string()),
    }
}

pub fn market_indicators<R: Rng + ?Sized>(rng: &mut R) -> MarketIndicators {
    let indicators: BTreeMap<String, IndicatorReading> = INDICATORS
        .iter()
        .map(|&(name, baseline, band, rise_is_bullish)| {
            let value = baseline + rng.gen_range(-band..band);
            let trend = match rng.gen_range(0..3) {
                0 => Trend::Down,
                1 => Trend::Stable,
                _ => Trend::Up,
            };
            let sentiment = match (trend, rise_is_bullish) {
                (Trend::Stable, _) => Outlook::Neutral,
                (Trend::Up, true) | (Trend::Down, false) => Outlook::Bullish,
                _ => Outlook::Bearish,
            };
            let value = if name == "10-Year Treasury Yield" {
                format!("{value:.2}%")
            } else {
                format!("{:.2}", round2(value))
            };
            (
                name.to_string(),
                IndicatorReading {
                    value,
                    trend,
                    sentiment,
                },
            )
        })
        .collect();

    let count = |o: Outlook| indicators.values().filter(|r| r.sentiment == o).count();
    let (bullish, bearish) = (count(Outlook::Bullish), count(Outlook::Bearish));
    let lean = match bullish.cmp(&bearish) {
        std::cmp::Ordering::Greater => "lean constructive",
        std::cmp::Ordering::Less => "lean defensive",
        std::cmp::Ordering::Equal => "are balanced",
    };

    MarketIndicators {
        summary: format!(
            "{bullish} of {} indicators read bullish and {bearish} bearish, so conditions {lean}. {DISCLOSURE}",
            indicators.len()
        ),
        indicators,
        synthetic: true,
        disclosure: Some(DISCLOSURE.to_string()),
    }
}

pub fn investment_ideas<R: Rng + ?Sized>(
    prefs: &InvestmentPreferences,
    rng: &mut R,
) -> Vec<InvestmentIdea> {
    let excluded = |sector: &str| {
        prefs
            .exclude_sectors
            .iter()
            .any(|s| s.eq_ignore_ascii_case(sector))
    };
    let preferred = |sector: &str| prefs.sectors.iter().any(|s| s.eq_ignore_ascii_case(sector));

    let mut picks: Vec<&CatalogIdea> = CATALOG
        .iter()
        .filter(|idea| idea.risk == prefs.risk_profile && !excluded(idea.sector))
        .collect();
    // Top up from the other profiles when exclusions thin the list out
    let mut others: Vec<&CatalogIdea> = CATALOG
        .iter()
        .filter(|idea| idea.risk != prefs.risk_profile && !excluded(idea.sector))
        .collect();
    others.shuffle(rng);
    picks.shuffle(rng);
    picks.sort_by_key(|idea| !preferred(idea.sector));
    picks.extend(others);
    picks.truncate(MAX_IDEAS);

    if picks.is_empty() {
        // Everything excluded; a broad index fund is the least opinionated answer
        picks.extend(CATALOG.iter().filter(|idea| idea.ticker == "VTI"));
    }

    let n = picks.len() as u32;
    let share = 100 / n;
    let remainder = 100 % n;

    let horizon = prefs.investment_horizon;

    picks
        .into_iter()
        .enumerate()
        .map(|(i, idea)| InvestmentIdea {
            ticker: idea.ticker.to_string(),
            name: idea.name.to_string(),
            kind: idea.kind.to_string(),
            reason: format!(
                "Broad {} exposure suited to a {horizon}-term horizon. {DISCLOSURE}",
                idea.sector
            ),
            risk_level: idea.risk.to_string(),
            potential_return: idea.potential_return.to_string(),
            suggested_allocation: f64::from(share + u32::from((i as u32) < remainder)),
            synthetic: true,
        })
        .collect()
}

/// Schema-valid stand-in for any request, as the JSON the pipeline caches.
pub fn generate<R: Rng + ?Sized>(request: &PredictionRequest, rng: &mut R) -> Value {
    let value = match request {
        PredictionRequest::MarketOutlook { timeframe } => {
            serde_json::to_value(market_outlook(*timeframe, rng))
        }
        PredictionRequest::PriceForecast { ticker } => {
            serde_json::to_value(price_forecast(ticker, rng))
        }
        PredictionRequest::Sentiment {
            scope: SentimentScope::Market,
        } => serde_json::to_value(market_sentiment(rng)),
        PredictionRequest::Sentiment {
            scope: SentimentScope::Ticker(ticker),
        } => serde_json::to_value(ticker_sentiment(ticker, rng)),
        PredictionRequest::MarketIndicators => serde_json::to_value(market_indicators(rng)),
        PredictionRequest::InvestmentIdeas { preferences } => {
            serde_json::to_value(investment_ideas(preferences, rng))
        }
    };
    // Plain structs of strings and numbers always serialize
    value.unwrap_or(Value::Null)
}
