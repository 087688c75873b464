//! Value bet detection
//!
//! A selection is a value bet when the bookmaker pays noticeably more than
//! the model's fair (implied) odds for it.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::predict::engine::PredictionSet;
use crate::{FootyError, Market, Result, Selection};

/// Decimal market odds per selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketOdds {
    odds: BTreeMap<Selection, f64>,
}

impl MarketOdds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed odds used when no odds feed is configured
    pub fn placeholder() -> Self {
        let mut odds = MarketOdds::new();
        odds.set(Selection::Home, 2.0);
        odds.set(Selection::Draw, 3.5);
        odds.set(Selection::Away, 3.8);
        odds.set(Selection::BttsYes, 1.9);
        odds.set(Selection::BttsNo, 1.9);
        odds.set(Selection::Over25, 1.85);
        odds.set(Selection::Under25, 1.95);
        odds
    }

    pub fn set(&mut self, selection: Selection, odds: f64) {
        self.odds.insert(selection, odds);
    }

    pub fn with(mut self, selection: Selection, odds: f64) -> Self {
        self.set(selection, odds);
        self
    }

    pub fn get(&self, selection: Selection) -> Option<f64> {
        self.odds.get(&selection).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Selection, f64)> + '_ {
        self.odds.iter().map(|(s, o)| (*s, *o))
    }

    pub fn len(&self) -> usize {
        self.odds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.odds.is_empty()
    }

    /// Parse `{"1X2": {"Home": 2.1, ...}, "BTTS": {"Yes": 1.8}, ...}`
    ///
    /// Unknown markets and selections are logged and ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, HashMap<String, f64>> = serde_json::from_str(json)
            .map_err(|e| FootyError::Parse(format!("Invalid odds JSON: {}", e)))?;

        let mut odds = MarketOdds::new();
        for (market_name, selections) in raw {
            let Some(market) = Market::from_name(&market_name) else {
                log::warn!("Ignoring odds for unknown market '{}'", market_name);
                continue;
            };
            for (selection_name, value) in selections {
                match Selection::from_names(market, &selection_name) {
                    Some(selection) => odds.set(selection, value),
                    None => log::warn!(
                        "Ignoring odds for unknown selection '{}' in {}",
                        selection_name,
                        market
                    ),
                }
            }
        }
        Ok(odds)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            FootyError::Parse(format!("Failed to read odds file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&content)
    }
}

/// A selection whose market odds beat the model's implied odds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueBet {
    pub market: Market,
    #[serde(serialize_with = "selection_name")]
    pub selection: Selection,
    /// Model probability for the selection
    pub confidence: f64,
    pub implied_odds: f64,
    pub market_odds: f64,
    /// Percentage by which market odds exceed implied odds
    #[serde(rename = "value")]
    pub value_pct: f64,
}

fn selection_name<S: Serializer>(selection: &Selection, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(selection.name())
}

/// Fair decimal odds for a probability; infinite when the probability is zero
pub fn implied_odds(probability: f64) -> f64 {
    if probability > 0.0 {
        1.0 / probability
    } else {
        f64::INFINITY
    }
}

/// Compares predictions against market odds
#[derive(Debug, Clone)]
pub struct ValueBetDetector {
    margin: f64,
}

impl Default for ValueBetDetector {
    fn default() -> Self {
        ValueBetDetector::new(0.10)
    }
}

impl ValueBetDetector {
    pub fn new(margin: f64) -> Self {
        ValueBetDetector { margin }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// True when the market odds clear the implied odds by the margin
    pub fn is_value(&self, probability: f64, market_odds: f64) -> bool {
        valid_odds(market_odds) && market_odds > implied_odds(probability) * (1.0 + self.margin)
    }

    /// Flag value bets across every selection present in both inputs
    pub fn detect(&self, prediction: &PredictionSet, odds: &MarketOdds) -> Vec<ValueBet> {
        let mut bets = Vec::new();
        for (selection, probability) in prediction.iter() {
            let Some(market_odds) = odds.get(selection) else {
                continue;
            };
            if !valid_odds(market_odds) {
                log::debug!(
                    "{}: ignoring malformed odds {} for {} {}",
                    prediction.fixture_id,
                    market_odds,
                    selection.market(),
                    selection
                );
                continue;
            }

            let implied = implied_odds(probability);
            if market_odds > implied * (1.0 + self.margin) {
                bets.push(ValueBet {
                    market: selection.market(),
                    selection,
                    confidence: probability,
                    implied_odds: implied,
                    market_odds,
                    value_pct: (market_odds / implied - 1.0) * 100.0,
                });
            }
        }
        bets
    }
}

fn valid_odds(odds: f64) -> bool {
    odds.is_finite() && odds > 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixtureId;

    fn prediction(home: f64, draw: f64, away: f64, btts_yes: f64, over: f64) -> PredictionSet {
        PredictionSet {
            fixture_id: FixtureId(1),
            home,
            draw,
            away,
            btts_yes,
            over_2_5: over,
            imputed: false,
            imputed_count: 0,
        }
    }

    #[test]
    fn test_implied_odds() {
        assert!((implied_odds(0.5) - 2.0).abs() < 1e-12);
        assert!((implied_odds(0.25) - 4.0).abs() < 1e-12);
        assert!(implied_odds(0.0).is_infinite());
    }

    #[test]
    fn test_value_percentage() {
        let set = prediction(0.5, 0.3, 0.2, 0.5, 0.5);
        let odds = MarketOdds::new().with(Selection::Home, 2.5);

        let bets = ValueBetDetector::new(0.10).detect(&set, &odds);
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].selection, Selection::Home);
        assert_eq!(bets[0].market, Market::Outcome1X2);
        assert!((bets[0].implied_odds - 2.0).abs() < 1e-12);
        assert!((bets[0].value_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_margin_boundary_not_flagged() {
        let set = prediction(0.5, 0.3, 0.2, 0.5, 0.5);
        // Exactly implied * 1.1 is not enough
        let odds = MarketOdds::new().with(Selection::Home, 2.2).with(Selection::Draw, 3.0);
        let detector = ValueBetDetector::new(0.10);
        assert!(detector.detect(&set, &odds).is_empty());
        assert!(!detector.is_value(0.5, 2.2));
        assert!(detector.is_value(0.5, 2.21));
    }

    #[test]
    fn test_never_flags_below_threshold() {
        let detector = ValueBetDetector::default();
        for step in 1..=100 {
            let p = step as f64 / 100.0;
            let threshold = implied_odds(p) * 1.1;
            for odds in [threshold, threshold * 0.99, threshold * 0.5] {
                let set = prediction(p, 0.0, 0.0, 0.0, 0.0);
                let market = MarketOdds::new().with(Selection::Home, odds);
                assert!(detector.detect(&set, &market).is_empty(), "p={} odds={}", p, odds);
            }
        }
    }

    #[test]
    fn test_zero_probability_never_flagged() {
        let set = prediction(0.0, 0.5, 0.5, 0.5, 0.5);
        let odds = MarketOdds::new().with(Selection::Home, 1000.0);
        assert!(ValueBetDetector::default().detect(&set, &odds).is_empty());
    }

    #[test]
    fn test_malformed_and_missing_odds_skipped() {
        let set = prediction(0.5, 0.3, 0.2, 0.5, 0.5);
        let odds = MarketOdds::new()
            .with(Selection::Home, f64::NAN)
            .with(Selection::Draw, 0.9)
            .with(Selection::Away, 1.0)
            .with(Selection::BttsYes, f64::INFINITY);
        assert!(ValueBetDetector::default().detect(&set, &odds).is_empty());
    }

    #[test]
    fn test_complementary_selections() {
        // BTTS No = 0.3 so implied 3.33; Under = 0.6 so implied 1.67
        let set = prediction(0.4, 0.3, 0.3, 0.7, 0.4);
        let odds = MarketOdds::new().with(Selection::BttsNo, 4.0).with(Selection::Under25, 1.7);
        let bets = ValueBetDetector::default().detect(&set, &odds);
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].selection, Selection::BttsNo);
    }

    #[test]
    fn test_every_flag_clears_margin() {
        let set = prediction(0.45, 0.28, 0.27, 0.55, 0.52);
        let detector = ValueBetDetector::default();
        for bet in detector.detect(&set, &MarketOdds::placeholder()) {
            assert!(bet.market_odds > bet.implied_odds * 1.1);
            assert!(bet.value_pct > 10.0);
        }
    }

    #[test]
    fn test_odds_json() {
        let json = r#"{"1X2": {"Home": 2.1, "Draw": 3.4, "Away": 3.6},
                       "BTTS": {"Yes": 1.8, "Maybe": 2.0},
                       "Corners": {"Over": 1.9},
                       "Over/Under 2.5": {"Under": 2.05}}"#;
        let odds = MarketOdds::from_json(json).unwrap();
        assert_eq!(odds.len(), 5);
        assert_eq!(odds.get(Selection::Home), Some(2.1));
        assert_eq!(odds.get(Selection::BttsYes), Some(1.8));
        assert_eq!(odds.get(Selection::Under25), Some(2.05));
        assert_eq!(odds.get(Selection::Over25), None);

        assert!(MarketOdds::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_value_bet_serialization() {
        let bet = ValueBet {
            market: Market::Btts,
            selection: Selection::BttsYes,
            confidence: 0.6,
            implied_odds: 1.0 / 0.6,
            market_odds: 2.0,
            value_pct: 20.0,
        };
        let json = serde_json::to_value(&bet).unwrap();
        assert_eq!(json["market"], "BTTS");
        assert_eq!(json["selection"], "Yes");
        assert_eq!(json["value"], 20.0);
    }
}
