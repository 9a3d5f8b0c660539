//! Post-hoc queries about a recorded match: players, clocks, decks, result.

use crate::data::{PlayerInfoSection, RatingRecord, ReplayData};
use prismata_core::{DeckEntry, GameError, GameResult, Player, Resources};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Results and end conditions this old carry codes that were never decoded.
const OLD_RESULT_MAX_VERSION: i64 = 158;

/// Key of the rating inside a legacy `score` object.
const LEGACY_SCORE_KEY: &str = "23";

/// Tier whose progress is not tracked.
const TOP_TIER: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GameFormat {
    Ranked,
    VersusBot,
    Versus,
    Event,
    Casual,
}

impl GameFormat {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            200 => Some(GameFormat::Ranked),
            201 => Some(GameFormat::VersusBot),
            202 => Some(GameFormat::Versus),
            203 => Some(GameFormat::Event),
            204 => Some(GameFormat::Casual),
            _ => None,
        }
    }
}

impl fmt::Display for GameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EndCondition {
    Resign,
    Elimination,
    Defeated,
    Repetition,
    Disconnect,
    DoubleDisconnect,
    Draw,
}

impl EndCondition {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(EndCondition::Resign),
            1 => Some(EndCondition::Elimination),
            2 => Some(EndCondition::Defeated),
            11 => Some(EndCondition::Repetition),
            30 => Some(EndCondition::Disconnect),
            31 => Some(EndCondition::DoubleDisconnect),
            32 => Some(EndCondition::Draw),
            _ => None,
        }
    }

    pub fn is_draw(self) -> bool {
        matches!(
            self,
            EndCondition::Repetition | EndCondition::DoubleDisconnect | EndCondition::Draw
        )
    }
}

impl fmt::Display for EndCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Rounded to two decimals.
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<i64>,
    /// Progress through the tier in percent, one decimal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub name: String,
    /// Only present when it differs from `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub bot: bool,
    pub rating: Option<Rating>,
    /// Ranked games only. The inner value is `None` for unrated records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_rating: Option<Option<Rating>>,
}

/// Clock settings in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeControl {
    pub initial: f64,
    pub bank: f64,
    pub increment: f64,
    pub bank_dilution: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub base_set: Vec<String>,
    pub random_set: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_supplies: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPosition {
    pub units: BTreeMap<String, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// `None` for a draw.
    pub winner: Option<Player>,
    pub end_condition: EndCondition,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn rating(record: Option<&RatingRecord>) -> Option<Rating> {
    let record = record?;
    let legacy_score = record
        .score
        .as_ref()
        .and_then(|score| score.get(LEGACY_SCORE_KEY))
        .and_then(|v| v.as_f64());
    let value = record
        .display_rating
        .filter(|&r| r != 0.0)
        .or(legacy_score.filter(|&r| r != 0.0))?;

    let tier_percent = match record.tier {
        Some(tier) if tier != TOP_TIER => record.tier_percent.map(|p| round_to(p * 100.0, 1)),
        _ => None,
    };
    Some(Rating {
        value: round_to(value, 2),
        tier: record.tier,
        tier_percent,
    })
}

fn unix_time(seconds: Option<f64>) -> Option<SystemTime> {
    let duration = Duration::try_from_secs_f64(seconds?).ok()?;
    UNIX_EPOCH.checked_add(duration)
}

fn missing(section: &str, field: &str) -> GameError {
    GameError::data(format!("{} missing.", section)).with_detail(field)
}

impl ReplayData {
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        unix_time(self.start_time)
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        unix_time(self.end_time)
    }

    pub fn game_format(&self) -> GameResult<GameFormat> {
        let code = self
            .format
            .ok_or_else(|| GameError::data("Unknown game format: missing"))?;
        GameFormat::from_code(code)
            .ok_or_else(|| GameError::data(format!("Unknown game format: {}", code)))
    }

    pub fn player_info(&self, player: Player) -> GameResult<PlayerInfo> {
        let players = self
            .player_info
            .as_ref()
            .ok_or_else(|| GameError::data("Player info missing."))?;
        let ratings = self
            .rating_info
            .as_ref()
            .ok_or_else(|| GameError::data("Rating info missing."))?;
        let i = player.index();

        let (name, display_name, bot) = match players {
            PlayerInfoSection::Legacy(legacy) => {
                let name = legacy
                    .player_names
                    .get(i)
                    .ok_or_else(|| missing("Player info", "playerNames"))?;
                let bot = legacy.player_bots.get(i).is_some_and(crate::data::truthy);
                (name.clone(), None, bot)
            }
            PlayerInfoSection::Players(entries) => {
                let entry = entries.get(i).ok_or_else(|| missing("Player info", "name"))?;
                let display_name = entry
                    .display_name
                    .clone()
                    .filter(|display| *display != entry.name);
                (entry.name.clone(), display_name, entry.bot)
            }
        };

        let initial = ratings.initial_ratings.get(i).and_then(Option::as_ref);
        let final_rating = match ratings.final_ratings.get(i) {
            Some(Some(record)) if self.game_format()? == GameFormat::Ranked => {
                Some(rating(Some(record)))
            }
            _ => None,
        };

        Ok(PlayerInfo {
            name,
            display_name,
            bot,
            rating: rating(initial),
            final_rating,
        })
    }

    pub fn time_control(&self, player: Player) -> GameResult<TimeControl> {
        let time = self
            .time_info
            .as_ref()
            .ok_or_else(|| GameError::data("Time info missing."))?;
        if time.correspondence {
            return Err(GameError::not_implemented("Correspondence time info"));
        }
        if !time.use_clocks {
            return Err(GameError::not_implemented("useClocks off in time info"));
        }
        let i = player.index();

        if self.is_legacy_layout()? {
            let pick = |values: &Option<Vec<f64>>, field: &str| {
                values
                    .as_ref()
                    .and_then(|v| v.get(i).copied())
                    .ok_or_else(|| missing("Time info", field))
            };
            // Legacy records store the initial times swapped.
            let initial = match player {
                Player::Second => time.white_initial_time,
                Player::First => time.black_initial_time,
            };
            return Ok(TimeControl {
                initial: initial.ok_or_else(|| missing("Time info", "initialTime"))?,
                bank: pick(&time.player_initial_time_banks, "playerInitialTimeBanks")?,
                increment: pick(&time.player_increments, "playerIncrements")?,
                bank_dilution: pick(&time.player_time_bank_dilutions, "playerTimeBankDilutions")?,
            });
        }

        let clock = time
            .player_time
            .as_ref()
            .and_then(|t| t.get(i))
            .ok_or_else(|| missing("Time info", "playerTime"))?;
        Ok(TimeControl {
            initial: clock.initial,
            bank: clock.bank,
            increment: clock.increment,
            bank_dilution: clock.bank_dilution,
        })
    }

    pub fn deck(&self, player: Player) -> GameResult<Deck> {
        let initial = self.initial_state()?;
        let i = player.index();
        let names = |entries: &[DeckEntry]| entries.iter().map(|e| e.name().to_string()).collect();

        let custom_supplies = initial.base_sets[i]
            .iter()
            .chain(&initial.random_sets[i])
            .filter_map(|entry| match entry {
                DeckEntry::Custom { name, supply } => Some((name.clone(), *supply)),
                DeckEntry::Named(_) => None,
            })
            .collect();
        Ok(Deck {
            base_set: names(&initial.base_sets[i]),
            random_set: names(&initial.random_sets[i]),
            custom_supplies,
        })
    }

    pub fn start_position(&self, player: Player) -> GameResult<StartPosition> {
        let mut initial = self.initial_state()?;
        let i = player.index();
        let units = initial.init_cards[i]
            .iter()
            .map(|(count, name)| (name.clone(), *count))
            .collect();
        let resources = std::mem::take(&mut initial.init_resources[i]);
        Ok(StartPosition {
            units,
            resources: (!resources.is_zero()).then_some(resources),
        })
    }

    pub fn result(&self) -> GameResult<MatchResult> {
        let result = self.result.ok_or_else(|| GameError::data("Missing result."))?;
        if self.server_version()? <= OLD_RESULT_MAX_VERSION {
            if result == 3 {
                return Err(GameError::not_implemented("Old version: Result 3"));
            }
            if self.end_condition == Some(20) {
                return Err(GameError::not_implemented("Old version: End condition 20"));
            }
        }
        let winner = match result {
            0 | 1 => usize::try_from(result).ok().and_then(Player::from_index),
            2 => None,
            _ => return Err(GameError::data("Unknown result.").with_detail(result)),
        };

        let end_condition = self
            .end_condition
            .and_then(EndCondition::from_code)
            .ok_or_else(|| {
                let code = self
                    .end_condition
                    .map_or_else(|| "missing".to_string(), |c| c.to_string());
                GameError::data(format!("Unknown end condition: {}", code))
            })?;

        match (end_condition.is_draw(), winner) {
            (true, Some(_)) => Err(GameError::data("Expected draw with end condition.")
                .with_detail(end_condition)),
            (false, None) => Err(GameError::data("Expected non-draw with end condition.")
                .with_detail(end_condition)),
            _ => Ok(MatchResult {
                winner,
                end_condition,
            }),
        }
    }
}
