use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ValidationError;
use crate::models::RequestKind;

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Str,
    Number,
    Object,
    Array,
    StrList,
    NumList,
    NumMap,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::Str => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::StrList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldKind::NumList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_number)),
            FieldKind::NumMap => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_number)),
        }
    }
}

const MARKET_OUTLOOK: &[(&str, FieldKind)] = &[
    ("marketOutlook", FieldKind::Str),
    ("confidenceScore", FieldKind::Number),
    ("keyDrivers", FieldKind::StrList),
    ("sectorPredictions", FieldKind::Array),
    ("majorIndexPredictions", FieldKind::Array),
];

const PRICE_FORECAST: &[(&str, FieldKind)] = &[
    ("currentPrice", FieldKind::Number),
    ("predictedPrices", FieldKind::NumMap),
    ("supportLevels", FieldKind::NumList),
    ("resistanceLevels", FieldKind::NumList),
    ("confidence", FieldKind::Number),
];

const MARKET_SENTIMENT: &[(&str, FieldKind)] = &[
    ("overall", FieldKind::Str),
    ("sectors", FieldKind::Object),
    ("analysis", FieldKind::Str),
];

const TICKER_SENTIMENT: &[(&str, FieldKind)] = &[
    ("ticker", FieldKind::Str),
    ("sentiment", FieldKind::Str),
    ("confidenceScore", FieldKind::Number),
    ("keyFactors", FieldKind::StrList),
];

const MARKET_INDICATORS: &[(&str, FieldKind)] = &[
    ("indicators", FieldKind::Object),
    ("summary", FieldKind::Str),
];

const INVESTMENT_IDEA: &[(&str, FieldKind)] = &[
    ("ticker", FieldKind::Str),
    ("name", FieldKind::Str),
    ("type", FieldKind::Str),
    ("reason", FieldKind::Str),
    ("riskLevel", FieldKind::Str),
    ("potentialReturn", FieldKind::Str),
    ("suggestedAllocation", FieldKind::Number),
];

pub fn required_fields(kind: RequestKind) -> Vec<&'static str> {
    let fields = match kind {
        RequestKind::MarketOutlook => MARKET_OUTLOOK,
        RequestKind::PriceForecast => PRICE_FORECAST,
        RequestKind::MarketSentiment => MARKET_SENTIMENT,
        RequestKind::TickerSentiment => TICKER_SENTIMENT,
        RequestKind::MarketIndicators => MARKET_INDICATORS,
        RequestKind::InvestmentIdeas => INVESTMENT_IDEA,
    };
    fields.iter().map(|(name, _)| *name).collect()
}

// First required field that is absent or of the wrong primitive kind
fn first_missing(obj: &Map<String, Value>, fields: &[(&'static str, FieldKind)]) -> Option<&'static str> {
    fields
        .iter()
        .find(|(name, kind)| !obj.get(*name).is_some_and(|v| kind.accepts(v)))
        .map(|(name, _)| *name)
}

// Nested content is not inspected here; the typed models decode it leniently
fn check_object(
    value: Value,
    fields: &[(&'static str, FieldKind)],
) -> Result<Value, ValidationError> {
    let Some(obj) = value.as_object() else {
        return Err(ValidationError::missing(fields[0].0));
    };
    if let Some(field) = first_missing(obj, fields) {
        return Err(ValidationError::missing(field));
    }
    Ok(value)
}

// Keeps the well-formed ideas, rejects the list if none are left
fn check_ideas(value: Value) -> Result<Value, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::missing("ideas"));
    };
    let total = items.len();
    let mut first_problem = None;

    let valid: Vec<Value> = items
        .into_iter()
        .filter(|item| {
            let problem = match item.as_object() {
                None => Some("ticker"),
                Some(obj) if obj.get("type").and_then(Value::as_str) == Some("error") => {
                    Some("type")
                }
                Some(obj) => first_missing(obj, INVESTMENT_IDEA),
            };
            if problem.is_some() && first_problem.is_none() {
                first_problem = problem;
            }
            problem.is_none()
        })
        .collect();

    if valid.is_empty() {
        return Err(ValidationError::missing(first_problem.unwrap_or("ideas")));
    }
    if valid.len() < total {
        debug!(kept = valid.len(), total, "dropped malformed investment ideas");
    }
    Ok(Value::Array(valid))
}

/// Checks the required fields for `kind` and returns the accepted value.
/// Investment ideas are filtered down to the well-formed entries.
pub fn validate(kind: RequestKind, value: Value) -> Result<Value, ValidationError> {
    match kind {
        RequestKind::MarketOutlook => check_object(value, MARKET_OUTLOOK),
        RequestKind::PriceForecast => check_object(value, PRICE_FORECAST),
        RequestKind::MarketSentiment => check_object(value, MARKET_SENTIMENT),
        RequestKind::TickerSentiment => check_object(value, TICKER_SENTIMENT),
        RequestKind::MarketIndicators => check_object(value, MARKET_INDICATORS),
        RequestKind::InvestmentIdeas => check_ideas(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Shape;
    use crate::normalizer::placeholder;
    use serde_json::json;

    fn outlook() -> Value {
        json!({
            "marketOutlook": "bullish",
            "confidenceScore": 72,
            "keyDrivers": ["Earnings", "Rates"],
            "sectorPredictions": [
                {"sector": "Technology", "outlook": "bullish", "potentialReturn": "1% to 5%",
                 "keyStocks": ["AAPL"], "rationale": "AI capex"}
            ],
            "majorIndexPredictions": [
                {"index": "S&P 500", "currentValue": 4500, "predictedRange": {"low": 4400, "high": 4650},
                 "confidence": 70, "keyDrivers": ["Fed"]}
            ],
            "analysis": "Constructive."
        })
    }

    #[test]
    fn accepts_complete_market_outlook() {
        let value = outlook();
        assert_eq!(validate(RequestKind::MarketOutlook, value.clone()), Ok(value));
    }

    #[test]
    fn names_first_missing_field() {
        let mut value = outlook();
        value.as_object_mut().unwrap().remove("keyDrivers");
        value.as_object_mut().unwrap().remove("majorIndexPredictions");
        assert_eq!(
            validate(RequestKind::MarketOutlook, value),
            Err(ValidationError::missing("keyDrivers"))
        );
    }

    #[test]
    fn wrong_primitive_kind_counts_as_missing() {
        let mut value = outlook();
        value["confidenceScore"] = json!("72");
        assert_eq!(
            validate(RequestKind::MarketOutlook, value),
            Err(ValidationError::missing("confidenceScore"))
        );
    }

    #[test]
    fn loose_nested_content_passes_when_required_fields_are_present() {
        let mut value = outlook();
        value["marketOutlook"] = json!("moderately bullish");
        value["sectorPredictions"][0]["outlook"] = json!("Positive");
        value["majorIndexPredictions"][0]["confidence"] = json!("70%");
        assert_eq!(validate(RequestKind::MarketOutlook, value.clone()), Ok(value));

        let forecast = json!({
            "currentPrice": 190.5,
            "predictedPrices": {"oneWeek": 193.2},
            "supportLevels": [185],
            "resistanceLevels": [195],
            "confidence": 64,
            "technicalFactors": "Golden cross on the daily chart"
        });
        assert!(validate(RequestKind::PriceForecast, forecast).is_ok());

        let sentiment = json!({"overall": "cautiously optimistic",
                               "sectors": {"Energy": "slightly bearish"}, "analysis": "Mixed."});
        assert!(validate(RequestKind::MarketSentiment, sentiment).is_ok());
    }

    #[test]
    fn indicators_need_a_map_and_a_summary() {
        let value = json!({
            "indicators": {"VIX": {"value": "14.2", "trend": "down", "sentiment": "bullish"}},
            "summary": "Calm tape."
        });
        assert!(validate(RequestKind::MarketIndicators, value).is_ok());
        assert_eq!(
            validate(RequestKind::MarketIndicators, json!({"indicators": [], "summary": "x"})),
            Err(ValidationError::missing("indicators"))
        );
    }

    #[test]
    fn price_forecast_requires_numeric_levels() {
        let value = json!({
            "currentPrice": 190.5,
            "predictedPrices": {"oneDay": 191.0, "oneWeek": 193.2},
            "supportLevels": [185, 180],
            "resistanceLevels": [195, 200],
            "confidence": 64
        });
        assert!(validate(RequestKind::PriceForecast, value.clone()).is_ok());

        let mut bad = value;
        bad["predictedPrices"]["oneMonth"] = json!("up");
        assert_eq!(
            validate(RequestKind::PriceForecast, bad),
            Err(ValidationError::missing("predictedPrices"))
        );
    }

    #[test]
    fn sentiment_shapes() {
        let market = json!({"overall": "Neutral", "sectors": {"Energy": "bearish"}, "analysis": "Mixed."});
        assert!(validate(RequestKind::MarketSentiment, market).is_ok());

        let ticker = json!({"ticker": "MSFT", "sentiment": "bullish", "confidenceScore": 80});
        assert_eq!(
            validate(RequestKind::TickerSentiment, ticker),
            Err(ValidationError::missing("keyFactors"))
        );
    }

    #[test]
    fn object_placeholder_is_rejected() {
        for kind in [RequestKind::MarketOutlook, RequestKind::MarketSentiment] {
            let first = required_fields(kind)[0];
            assert_eq!(
                validate(kind, placeholder(Shape::Object)),
                Err(ValidationError::missing(first))
            );
        }
    }

    #[test]
    fn ideas_are_filtered() {
        let ideas = json!([
            {"ticker": "VTI", "name": "Vanguard Total Stock Market ETF", "type": "etf",
             "reason": "Core holding", "riskLevel": "moderate", "potentialReturn": "7-9% annually",
             "suggestedAllocation": 40},
            {"ticker": "XYZ", "name": "Missing allocation"},
            "not an object"
        ]);
        let kept = validate(RequestKind::InvestmentIdeas, ideas).unwrap();
        assert_eq!(kept.as_array().unwrap().len(), 1);
        assert_eq!(kept[0]["ticker"], "VTI");
    }

    #[test]
    fn array_placeholder_is_rejected() {
        assert_eq!(
            validate(RequestKind::InvestmentIdeas, placeholder(Shape::Array)),
            Err(ValidationError::missing("type"))
        );
        assert_eq!(
            validate(RequestKind::InvestmentIdeas, json!({"ticker": "VTI"})),
            Err(ValidationError::missing("ideas"))
        );
    }
}
