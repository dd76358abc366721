use crate::models::{AttemptSpec, PredictionRequest, RequestKind, SentimentScope};

pub const GEMINI: &str = "gemini";
pub const OPENROUTER: &str = "openrouter";

const SECTORS: &str = "Technology, Healthcare, Financials, Consumer Discretionary, Consumer Staples, \
Energy, Industrials, Materials, Utilities, Real Estate, Communication Services";

const INDICES: &str =
    "S&P 500, Dow Jones Industrial Average, Nasdaq Composite, Russell 2000, VIX";

// Everything a provider call needs besides the (provider, model) pair
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub user: String,
    pub system: String,
    pub temperature: f32,
}

/// Fixed fallback order per request kind, before any configured extras.
pub fn default_attempts(kind: RequestKind) -> Vec<AttemptSpec> {
    match kind {
        RequestKind::MarketSentiment | RequestKind::TickerSentiment => vec![
            AttemptSpec::new(GEMINI, "gemini-1.5-flash"),
            AttemptSpec::new(OPENROUTER, "deepseek/deepseek-r1:free"),
        ],
        RequestKind::MarketIndicators => {
            vec![AttemptSpec::new(OPENROUTER, "deepseek/deepseek-r1:free")]
        }
        RequestKind::MarketOutlook | RequestKind::PriceForecast | RequestKind::InvestmentIdeas => {
            vec![
                AttemptSpec::new(GEMINI, "gemini-1.5-flash"),
                AttemptSpec::new(OPENROUTER, "anthropic/claude-3-opus:free"),
                AttemptSpec::new(OPENROUTER, "meta-llama/llama-3-70b-instruct:free"),
                AttemptSpec::new(OPENROUTER, "deepseek/deepseek-r1:free"),
                AttemptSpec::new(GEMINI, "gemini-pro"),
            ]
        }
    }
}

fn market_outlook(timeframe_text: &str) -> String {
    format!(
        r#"Produce a market prediction for the {timeframe_text}.

Weigh market indicators, sentiment and technical factors and give:
1. The overall market outlook (bearish, neutral or bullish)
2. A confidence score from 0 to 100
3. The key drivers behind the call

For each of these sectors give an outlook, a potential return range and one or two
stocks likely to lead: {SECTORS}

For each of these indices give the approximate current value, a predicted low/high
range for the {timeframe_text}, a confidence level (0-100) and key drivers: {INDICES}

Reply with a single JSON object and no markdown, shaped like:
{{
  "marketOutlook": "bearish" | "neutral" | "bullish",
  "confidenceScore": 70,
  "keyDrivers": ["driver"],
  "sectorPredictions": [
    {{"sector": "Technology", "outlook": "bullish", "potentialReturn": "-2% to +1%",
      "keyStocks": ["AAPL", "MSFT"], "rationale": "short explanation"}}
  ],
  "majorIndexPredictions": [
    {{"index": "S&P 500", "currentValue": 4500, "predictedRange": {{"low": 4400, "high": 4600}},
      "confidence": 70, "keyDrivers": ["driver"]}}
  ],
  "analysis": "detailed reasoning"
}}"#
    )
}

fn price_forecast(ticker: &str) -> String {
    format!(
        r#"Produce a price prediction for {ticker}.

Include the approximate current price, predicted prices for the next trading day,
one week, one month and three months, key support and resistance levels, a
confidence level (0-100), and the technical and fundamental factors behind it.

Reply with a single JSON object and no markdown, shaped like:
{{
  "currentPrice": 100.0,
  "predictedPrices": {{"oneDay": 101.0, "oneWeek": 102.5, "oneMonth": 104.0, "threeMonths": 108.0}},
  "supportLevels": [95.0, 90.0],
  "resistanceLevels": [105.0, 110.0],
  "confidence": 65,
  "technicalFactors": ["factor"],
  "fundamentalFactors": ["factor"]
}}"#
    )
}

fn market_sentiment() -> String {
    format!(
        r#"Assess the current market sentiment.

Give the overall sentiment (bearish, neutral or bullish), a sentiment label for each
of these sectors: {SECTORS}
and a one or two paragraph analysis of current conditions.

Reply with a single JSON object and no markdown, shaped like:
{{
  "overall": "bearish" | "neutral" | "bullish",
  "sectors": {{"Technology": "bullish"}},
  "analysis": "brief analysis"
}}"#
    )
}

fn ticker_sentiment(ticker: &str) -> String {
    format!(
        r#"Assess the market sentiment for {ticker}.

Give the overall sentiment (bearish, neutral or bullish), a confidence score from
0 to 100 and four or five key factors driving it.

Reply with a single JSON object and no markdown, shaped like:
{{
  "ticker": "{ticker}",
  "sentiment": "bearish" | "neutral" | "bullish",
  "confidenceScore": 75,
  "keyFactors": ["factor"]
}}"#
    )
}

const INDICATORS: &str = "S&P 500, Dow Jones Industrial Average, NASDAQ Composite, \
VIX (Volatility Index), 10-Year Treasury Yield, US Dollar Index, Crude Oil, Gold";

fn market_indicators() -> String {
    format!(
        r#"Analyse these key market indicators and what they imply for sentiment:
{INDICATORS}

For each indicator give a realistic approximate current value, whether the trend is
up, down or stable, and whether it reads bearish, neutral or bullish for the broader market.

Reply with a single JSON object and no markdown, shaped like:
{{
  "indicators": {{
    "S&P 500": {{"value": "approximate current value", "trend": "up" | "down" | "stable",
                "sentiment": "bearish" | "neutral" | "bullish"}}
  }},
  "summary": "what these indicators suggest about market sentiment"
}}"#
    )
}

fn investment_ideas(request: &crate::models::InvestmentPreferences) -> String {
    let mut constraints = Vec::new();
    if !request.sectors.is_empty() {
        constraints.push(format!("Focus on these sectors: {}", request.sectors.join(", ")));
    }
    if !request.exclude_sectors.is_empty() {
        constraints.push(format!(
            "Exclude these sectors: {}",
            request.exclude_sectors.join(", ")
        ));
    }
    if !request.themes.is_empty() {
        constraints.push(format!(
            "Consider these investment themes: {}",
            request.themes.join(", ")
        ));
    }
    if let Some(amount) = request.investment_amount {
        constraints.push(format!("For an investment amount of approximately ${amount:.0}"));
    }

    format!(
        r#"Suggest 5 investment ideas for a {risk} investor with a {horizon}-term horizon.
{constraints}

For each idea give the ticker, full name, type (stock, etf, bond, crypto or other), why
it suits this investor, its risk level (conservative, moderate or aggressive), the
expected return and a suggested allocation percentage.

Reply with a JSON array and no markdown, shaped like:
[
  {{"ticker": "AAPL", "name": "Apple Inc.", "type": "stock", "reason": "why",
    "riskLevel": "moderate", "potentialReturn": "8-10% annually", "suggestedAllocation": 15}}
]"#,
        risk = request.risk_profile,
        horizon = request.investment_horizon,
        constraints = constraints.join("\n"),
    )
}

/// Prompt and system instruction for a request. Pure: the same request always
/// yields the same prompt.
pub fn build_prompt(request: &PredictionRequest) -> Prompt {
    match request {
        PredictionRequest::MarketOutlook { timeframe } => Prompt {
            user: market_outlook(timeframe.describe()),
            system: "You are a market analyst specializing in short-term market predictions based on \
technical and fundamental analysis. Give realistic forecasts with honest uncertainty. \
Respond with a valid JSON object without markdown code fences."
                .into(),
            temperature: 0.3,
        },
        PredictionRequest::PriceForecast { ticker } => Prompt {
            user: price_forecast(ticker),
            system: "You are a technical analyst specializing in stock price predictions. Give \
realistic predictions with appropriate uncertainty. Respond with a valid JSON object without \
markdown code fences."
                .into(),
            temperature: 0.3,
        },
        PredictionRequest::Sentiment { scope } => Prompt {
            user: match scope {
                SentimentScope::Market => market_sentiment(),
                SentimentScope::Ticker(ticker) => ticker_sentiment(ticker),
            },
            system: "You are a financial analyst specializing in market and stock sentiment. \
Respond with a valid JSON object without code block markers."
                .into(),
            temperature: 0.3,
        },
        PredictionRequest::MarketIndicators => Prompt {
            user: market_indicators(),
            system: "You are a market analyst specializing in indicator analysis and sentiment \
interpretation. Return your response as a valid JSON object without code block markers."
                .into(),
            temperature: 0.2,
        },
        PredictionRequest::InvestmentIdeas { preferences } => Prompt {
            user: investment_ideas(preferences),
            system: "You are an investment advisor helping retail investors find opportunities that \
fit their risk profile and preferences. Always respond with a valid JSON array."
                .into(),
            temperature: 0.4,
        },
    }
}
