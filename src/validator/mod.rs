//! Validator Pipeline (C3): a chain of rule checkers run in order, with
//! first-failure short-circuit and a mode-dependent score threshold
//! (spec §4.3).

pub mod checkers;

use crate::config::{Thresholds, ValidatorConfig};
use crate::domain::comment::CommentPair;
use crate::domain::location::Location;
use crate::domain::state::ValidationOutcome;
use crate::domain::weather::WeatherForecast;

use checkers::{
    CheckContext, Checker, ConsistencyChecker, HumidityChecker, LengthAndBannedWordChecker,
    RegionalChecker, SeasonalChecker, TemperatureConditionChecker, WeatherConditionChecker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    Strict,
    Moderate,
    Relaxed,
}

impl EvaluationMode {
    #[must_use]
    pub fn threshold(self) -> f32 {
        match self {
            Self::Strict => 0.6,
            Self::Moderate => 0.45,
            Self::Relaxed => 0.3,
        }
    }

    fn checkers(self) -> Vec<Box<dyn Checker>> {
        match self {
            Self::Strict => vec![
                Box::new(WeatherConditionChecker),
                Box::new(TemperatureConditionChecker),
                Box::new(HumidityChecker),
                Box::new(RegionalChecker),
                Box::new(SeasonalChecker),
                Box::new(ConsistencyChecker),
                Box::new(LengthAndBannedWordChecker {
                    check_length: true,
                    check_banned_words: true,
                }),
            ],
            Self::Moderate => vec![
                Box::new(WeatherConditionChecker),
                Box::new(TemperatureConditionChecker),
                Box::new(HumidityChecker),
                Box::new(RegionalChecker),
                Box::new(SeasonalChecker),
                Box::new(ConsistencyChecker),
                Box::new(LengthAndBannedWordChecker {
                    check_length: false,
                    check_banned_words: true,
                }),
            ],
            Self::Relaxed => vec![
                Box::new(WeatherConditionChecker),
                Box::new(LengthAndBannedWordChecker {
                    check_length: false,
                    check_banned_words: true,
                }),
            ],
        }
    }
}

pub struct ValidatorPipeline {
    mode: EvaluationMode,
    thresholds: Thresholds,
    validator_config: ValidatorConfig,
}

impl ValidatorPipeline {
    #[must_use]
    pub fn new(mode: EvaluationMode, thresholds: Thresholds, validator_config: ValidatorConfig) -> Self {
        Self {
            mode,
            thresholds,
            validator_config,
        }
    }

    /// Runs the configured checker chain against `candidate`, stopping
    /// at the first failure. `score` is the fraction of checkers that
    /// passed before that point (or all of them, if none failed).
    #[must_use]
    pub fn evaluate(
        &self,
        candidate: &CommentPair,
        forecast: &WeatherForecast,
        location: &Location,
    ) -> ValidationOutcome {
        let chain = self.mode.checkers();
        let total = chain.len().max(1) as f32;
        let mut passed = 0usize;
        let mut reasons = Vec::new();
        let mut ok = true;

        for checker in &chain {
            let ctx = CheckContext {
                candidate,
                forecast,
                location,
                thresholds: &self.thresholds,
                validator: &self.validator_config,
            };
            let outcome = checker.check(&ctx);
            if outcome.ok {
                passed += 1;
            } else {
                ok = false;
                if let Some(reason) = outcome.reason {
                    reasons.push(format!("{}: {reason}", checker.name()));
                }
                break;
            }
        }

        let score = passed as f32 / total;
        let ok = ok && score >= self.mode.threshold();
        ValidationOutcome { ok, reasons, score }
    }
}
