//! Rule checkers (spec §4.3). Each checker is stateless and reads only
//! the request-scoped [`CheckContext`]; thresholds and pattern tables
//! come from configuration, never from a literal in this file.

use crate::config::{Thresholds, ValidatorConfig};
use crate::domain::comment::CommentPair;
use crate::domain::location::Location;
use crate::domain::weather::WeatherForecast;

pub struct CheckContext<'a> {
    pub candidate: &'a CommentPair,
    pub forecast: &'a WeatherForecast,
    pub location: &'a Location,
    pub thresholds: &'a Thresholds,
    pub validator: &'a ValidatorConfig,
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub ok: bool,
    pub reason: Option<String>,
}

impl CheckOutcome {
    fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, ctx: &CheckContext) -> CheckOutcome;
}

fn contains_any(haystack: &str, needles: &[&str]) -> Option<&'static str> {
    let lower = haystack.to_lowercase();
    needles.iter().find(|n| lower.contains(&n.to_lowercase())).copied()
}

fn weather_text(ctx: &CheckContext) -> &str {
    &ctx.candidate.weather.text
}

fn advice_text(ctx: &CheckContext) -> &str {
    &ctx.candidate.advice.text
}

pub struct WeatherConditionChecker;

impl Checker for WeatherConditionChecker {
    fn name(&self) -> &'static str {
        "weather_condition"
    }

    fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        use crate::domain::weather::WeatherCondition::*;
        let condition = ctx.forecast.condition;
        let weather = weather_text(ctx);
        let advice = advice_text(ctx);

        if condition.is_rain_family() {
            let mut forbidden = vec!["clear sky", "sunny", "pleasant outdoors", "great for a walk"];
            if condition == HeavyRain {
                forbidden.push("light rain");
                forbidden.push("changing sky");
            }
            if let Some(hit) = contains_any(weather, &forbidden) {
                return CheckOutcome::fail(format!("weather text contradicts rain condition: \"{hit}\""));
            }
            let required = ["umbrella", "rain gear", "caution", "indoors"];
            if contains_any(advice, &required).is_none() {
                return CheckOutcome::fail("advice lacks rain-appropriate guidance");
            }
        } else if condition == Clear {
            let forbidden = ["rainy", "damp", "gloomy", "umbrella required"];
            if let Some(hit) = contains_any(weather, &forbidden) {
                return CheckOutcome::fail(format!("weather text contradicts clear condition: \"{hit}\""));
            }
        } else if condition.is_cloudy_family() {
            let mut forbidden = vec!["blue sky", "dazzling", "laundry day"];
            forbidden.push("sudden change");
            forbidden.push("unstable sky");
            if let Some(hit) = contains_any(weather, &forbidden) {
                return CheckOutcome::fail(format!("weather text contradicts cloudy condition: \"{hit}\""));
            }
        }

        CheckOutcome::pass()
    }
}

pub struct TemperatureConditionChecker;

impl Checker for TemperatureConditionChecker {
    fn name(&self) -> &'static str {
        "temperature_condition"
    }

    fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        let t = ctx.thresholds;
        let temp = ctx.forecast.temperature_c;
        let weather = weather_text(ctx);
        let advice = advice_text(ctx);
        let warns_at_all = contains_any(advice, &["caution", "warning", "careful", "beware"]).is_some();
        let heat_stroke_vocab = contains_any(advice, &["heat stroke", "heatstroke", "hydrate"]).is_some();

        if temp >= t.temp_hot_c && contains_any(weather, &["cold", "chilly"]).is_some() {
            return CheckOutcome::fail("\"cold/chilly\" used at hot temperature");
        }
        if temp < t.temp_cold_c && contains_any(weather, &["hot", "sweltering"]).is_some() {
            return CheckOutcome::fail("\"hot/sweltering\" used at cold temperature");
        }
        if temp >= t.temp_heat_stroke_advisory_c && temp < t.temp_heat_stroke_required_c && warns_at_all && !heat_stroke_vocab
        {
            return CheckOutcome::fail("warning phrasing near heat-stroke threshold lacks heat-stroke vocabulary");
        }
        if temp >= t.temp_heat_stroke_required_c && warns_at_all && !heat_stroke_vocab {
            return CheckOutcome::fail("warning phrasing at extreme heat lacks heat-stroke vocabulary");
        }
        if (t.temp_moderate_low_c..=t.temp_hot_c).contains(&temp)
            && contains_any(weather, &["extreme cold", "scorching"]).is_some()
        {
            return CheckOutcome::fail("extreme-temperature phrasing used at moderate temperature");
        }

        CheckOutcome::pass()
    }
}

pub struct HumidityChecker;

impl Checker for HumidityChecker {
    fn name(&self) -> &'static str {
        "humidity"
    }

    fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        let t = ctx.thresholds;
        let humidity = ctx.forecast.humidity_pct;
        let advice = advice_text(ctx);

        if humidity >= t.humidity_high_pct && contains_any(advice, &["dry air"]).is_some() {
            return CheckOutcome::fail("\"dry air\" advice given at high humidity");
        }
        if humidity < t.humidity_low_pct && contains_any(advice, &["dehumidify", "muggy"]).is_some() {
            return CheckOutcome::fail("\"dehumidify/muggy\" advice given at low humidity");
        }
        CheckOutcome::pass()
    }
}

pub struct RegionalChecker;

impl Checker for RegionalChecker {
    fn name(&self) -> &'static str {
        "regional"
    }

    fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        let weather = weather_text(ctx);
        match ctx.location.prefecture.as_str() {
            "Okinawa" => {
                if let Some(hit) = contains_any(weather, &["snow", "freezing"]) {
                    return CheckOutcome::fail(format!("\"{hit}\" is implausible in Okinawa"));
                }
            }
            "Hokkaido" => {
                if let Some(hit) = contains_any(weather, &["scorching", "tropical night"]) {
                    return CheckOutcome::fail(format!("\"{hit}\" is implausible in Hokkaido"));
                }
            }
            _ => {}
        }
        CheckOutcome::pass()
    }
}

pub struct SeasonalChecker;

impl Checker for SeasonalChecker {
    fn name(&self) -> &'static str {
        "seasonal"
    }

    fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        use chrono::Datelike;
        use chrono_tz::Asia::Tokyo;
        let weather = weather_text(ctx);
        let has_pollen = contains_any(weather, &["pollen"]).is_some();
        if !has_pollen {
            return CheckOutcome::pass();
        }
        if ctx.forecast.condition.is_rain_family() {
            return CheckOutcome::fail("pollen vocabulary used during rain, forbidden year-round");
        }
        let month = ctx.forecast.datetime_utc.with_timezone(&Tokyo).month();
        let in_pollen_off_season = (6..=12).contains(&month) || month == 1;
        if in_pollen_off_season {
            return CheckOutcome::fail("pollen vocabulary used outside pollen season (Feb-May)");
        }
        CheckOutcome::pass()
    }
}

pub struct ConsistencyChecker;

impl Checker for ConsistencyChecker {
    fn name(&self) -> &'static str {
        "consistency"
    }

    fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        let weather = weather_text(ctx);
        let advice = advice_text(ctx);

        let weather_is_calm = contains_any(weather, &["sunny", "clear"]).is_some();
        let advice_wants_umbrella = contains_any(advice, &["umbrella"]).is_some();
        if weather_is_calm && advice_wants_umbrella {
            return CheckOutcome::fail("clear weather text contradicts umbrella advice");
        }

        let weather_is_cold = contains_any(weather, &["cold"]).is_some();
        let advice_is_heat = contains_any(advice, &["stay hydrated", "cool down"]).is_some();
        if weather_is_cold && advice_is_heat {
            return CheckOutcome::fail("cold weather text contradicts heat-mitigation advice");
        }

        let weather_cautious = contains_any(weather, &["careful", "caution"]).is_some();
        let advice_relaxed = contains_any(advice, &["relax", "at ease"]).is_some();
        let weather_relaxed = contains_any(weather, &["relax", "at ease"]).is_some();
        let advice_cautious = contains_any(advice, &["careful", "caution"]).is_some();
        if (weather_cautious && advice_relaxed) || (weather_relaxed && advice_cautious) {
            return CheckOutcome::fail("weather and advice strike opposing tones");
        }

        if contains_any(weather, &["umbrella"]).is_some() && contains_any(advice, &["umbrella"]).is_some() {
            return CheckOutcome::fail("umbrella mentioned redundantly in both lines");
        }

        if contains_any(weather, &["morning"]).is_some() && contains_any(advice, &["sweltering heat"]).is_some() {
            return CheckOutcome::fail("morning phrasing contradicts sweltering-heat advice");
        }

        CheckOutcome::pass()
    }
}

pub struct LengthAndBannedWordChecker {
    pub check_length: bool,
    pub check_banned_words: bool,
}

impl Checker for LengthAndBannedWordChecker {
    fn name(&self) -> &'static str {
        "length_and_banned_word"
    }

    fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        let lines = [weather_text(ctx), advice_text(ctx)];

        if self.check_length {
            for line in lines {
                if line.trim().chars().count() > ctx.validator.max_line_chars {
                    return CheckOutcome::fail(format!(
                        "line exceeds {} characters",
                        ctx.validator.max_line_chars
                    ));
                }
            }
        }

        if self.check_banned_words {
            for line in lines {
                let lower = line.to_lowercase();
                if let Some(word) = ctx.validator.ng_words.iter().find(|w| lower.contains(w.as_str())) {
                    return CheckOutcome::fail(format!("line contains banned word \"{word}\""));
                }
            }
        }

        CheckOutcome::pass()
    }
}
