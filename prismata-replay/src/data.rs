//! Replay record model and blueprint normalisation.
//!
//! Records come in two layouts. Servers up to version 153 store the two
//! players' decks, starting cards and resources under separate
//! `white*`/`black*` fields; later servers use two-element arrays. Both
//! decode into [`ReplayData`] and are reconciled by
//! [`ReplayData::initial_state`].

use crate::command::RawCommand;
use crate::config::{ReplayOptions, PASSIVE_RECORD_FIELDS};
use crate::error::ReplayError;
use prismata_core::{
    Blueprint, Condition, CreateRule, DeckEntry, GameError, GameResult, InitialState, Resources,
    SacrificeRule, Script, TargetAction,
};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Last server version writing the per-colour record layout.
pub const LEGACY_LAYOUT_MAX_VERSION: i64 = 153;

/// Blueprint attributes with no effect on play.
const IGNORED_ATTRIBUTES: [&str; 14] = [
    "assignedBlocking",
    "baseSet",
    "description",
    "fullDescription",
    "fullDescription_en",
    "group",
    "needs",
    "originalName",
    "position",
    "potentiallyMoreAttack",
    "score",
    "UIArt",
    "xOffset",
    "yOffset",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayData {
    pub code: Option<String>,
    /// Unix seconds.
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub format: Option<i64>,
    pub result: Option<i64>,
    pub end_condition: Option<i64>,

    pub command_info: Option<CommandInfo>,
    pub deck_info: Option<DeckInfo>,
    pub init_info: Option<InitInfo>,
    pub player_info: Option<PlayerInfoSection>,
    pub rating_info: Option<RatingInfo>,
    pub time_info: Option<TimeInfo>,
    pub version_info: Option<VersionInfo>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, IgnoredAny>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInfo {
    #[serde(default)]
    pub command_list: Vec<RawCommand>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckInfo {
    #[serde(default)]
    pub merged_deck: Vec<RawBlueprint>,
    pub base: Option<Vec<Vec<RawDeckEntry>>>,
    pub randomizer: Option<Vec<Vec<RawDeckEntry>>>,
    pub white_base: Option<Vec<RawDeckEntry>>,
    pub black_base: Option<Vec<RawDeckEntry>>,
    pub white_dominion: Option<Vec<RawDeckEntry>>,
    pub black_dominion: Option<Vec<RawDeckEntry>>,
}

/// Set entry: a plain name, or `[name, supply]` for a custom supply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawDeckEntry {
    Named(String),
    Custom(String, i64),
}

/// `[count, blueprint name]`.
pub type RawInitCard = (u32, String);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitInfo {
    pub init_cards: Option<Vec<Vec<RawInitCard>>>,
    pub init_resources: Option<Vec<ResourceValue>>,
    pub white_init_cards: Option<Vec<RawInitCard>>,
    pub black_init_cards: Option<Vec<RawInitCard>>,
    pub white_init_resources: Option<ResourceValue>,
    pub black_init_resources: Option<ResourceValue>,
    #[serde(default, deserialize_with = "flag")]
    pub infinite_supplies: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PlayerInfoSection {
    Players(Vec<PlayerEntry>),
    Legacy(LegacyPlayerInfo),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPlayerInfo {
    pub player_names: Vec<String>,
    #[serde(default)]
    pub player_bots: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingInfo {
    #[serde(default)]
    pub initial_ratings: Vec<Option<RatingRecord>>,
    #[serde(default)]
    pub final_ratings: Vec<Option<RatingRecord>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub display_rating: Option<f64>,
    pub score: Option<Map<String, Value>>,
    pub tier: Option<i64>,
    pub tier_percent: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    #[serde(default, deserialize_with = "flag")]
    pub correspondence: bool,
    #[serde(default, deserialize_with = "flag")]
    pub use_clocks: bool,
    pub player_time: Option<Vec<PlayerTime>>,
    pub white_initial_time: Option<f64>,
    pub black_initial_time: Option<f64>,
    pub player_time_bank_dilutions: Option<Vec<f64>>,
    pub player_initial_time_banks: Option<Vec<f64>>,
    pub player_increments: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTime {
    pub bank: f64,
    pub bank_dilution: f64,
    pub increment: f64,
    pub initial: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub server_version: i64,
}

/// Resource amount stored either as a resource string or as plain gold.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ResourceValue {
    Text(String),
    Gold(i64),
}

impl ResourceValue {
    pub fn to_resources(&self) -> Resources {
        match self {
            ResourceValue::Text(s) => Resources::parse(s),
            ResourceValue::Gold(n) => Resources::gold(i32::try_from(*n).unwrap_or(i32::MAX)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScript {
    #[serde(default)]
    pub create: Vec<Vec<Value>>,
    pub delay: Option<i32>,
    pub receive: Option<ResourceValue>,
    #[serde(default, deserialize_with = "flag")]
    pub selfsac: bool,
}

/// Blueprint as stored in `deckInfo.mergedDeck`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlueprint {
    pub name: String,
    #[serde(rename = "UIName")]
    pub ui_name: Option<String>,
    #[serde(rename = "UIShortname")]
    pub ui_shortname: Option<String>,
    pub rarity: Option<String>,

    #[serde(rename = "buildTime")]
    pub build_time: Option<i32>,
    pub charge: Option<i32>,
    #[serde(rename = "defaultBlocking", default, deserialize_with = "flag")]
    pub default_blocking: bool,
    #[serde(default, deserialize_with = "flag")]
    pub fragile: bool,
    #[serde(rename = "HPGained")]
    pub hp_gained: Option<i32>,
    #[serde(rename = "HPMax")]
    pub hp_max: Option<i32>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub lifespan: Option<i32>,
    #[serde(default, deserialize_with = "flag")]
    pub spell: bool,
    pub toughness: Option<i32>,
    #[serde(default, deserialize_with = "flag")]
    pub undefendable: bool,

    #[serde(rename = "abilityCost")]
    pub ability_cost: Option<ResourceValue>,
    #[serde(rename = "abilityNetherfy", default, deserialize_with = "flag")]
    pub ability_netherfy: bool,
    #[serde(rename = "abilitySac")]
    pub ability_sac: Option<Vec<Vec<Value>>>,
    #[serde(rename = "abilityScript")]
    pub ability_script: Option<RawScript>,
    #[serde(rename = "HPUsed")]
    pub hp_used: Option<i32>,
    #[serde(rename = "targetAction")]
    pub target_action: Option<String>,
    #[serde(rename = "targetAmount")]
    pub target_amount: Option<i32>,

    #[serde(rename = "buyCost")]
    pub buy_cost: Option<ResourceValue>,
    #[serde(rename = "buySac")]
    pub buy_sac: Option<Vec<Vec<Value>>>,
    #[serde(rename = "buyScript")]
    pub buy_script: Option<RawScript>,

    #[serde(rename = "beginOwnTurnScript")]
    pub begin_own_turn_script: Option<RawScript>,
    #[serde(rename = "goldResonate")]
    pub gold_resonate: Option<String>,
    pub resonate: Option<String>,
    pub condition: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub other: BTreeMap<String, IgnoredAny>,
}

impl ReplayData {
    /// Decode and check a record.
    pub fn from_json(text: &str, options: &ReplayOptions) -> Result<Self, ReplayError> {
        let data: ReplayData = serde_json::from_str(text)?;
        data.validate(options)?;
        Ok(data)
    }

    pub fn from_value(value: Value, options: &ReplayOptions) -> Result<Self, ReplayError> {
        let data: ReplayData = serde_json::from_value(value)?;
        data.validate(options)?;
        Ok(data)
    }

    pub fn validate(&self, options: &ReplayOptions) -> GameResult<()> {
        if !options.strict {
            return Ok(());
        }
        if let Some(key) = self
            .extra
            .keys()
            .find(|key| !PASSIVE_RECORD_FIELDS.contains(&key.as_str()))
        {
            return Err(GameError::data("Unknown replay field.").with_detail(key));
        }
        Ok(())
    }

    pub fn server_version(&self) -> GameResult<i64> {
        self.version_info
            .as_ref()
            .map(|v| v.server_version)
            .ok_or_else(|| GameError::data("Version info missing."))
    }

    pub fn is_legacy_layout(&self) -> GameResult<bool> {
        Ok(self.server_version()? <= LEGACY_LAYOUT_MAX_VERSION)
    }

    pub fn commands(&self) -> GameResult<&[RawCommand]> {
        self.command_info
            .as_ref()
            .map(|c| c.command_list.as_slice())
            .ok_or_else(|| GameError::data("Command info missing."))
    }

    /// Normalised deck, sets and starting position for the rules engine.
    pub fn initial_state(&self) -> GameResult<InitialState> {
        let legacy = self.is_legacy_layout()?;
        let deck_info = self
            .deck_info
            .as_ref()
            .ok_or_else(|| GameError::data("Deck info missing."))?;
        let init_info = self
            .init_info
            .as_ref()
            .ok_or_else(|| GameError::data("Init info missing."))?;

        const DECK: &str = "Deck info missing.";
        const INIT: &str = "Init info missing.";
        let (base_sets, random_sets, init_cards, init_resources) = if legacy {
            (
                [
                    required(&deck_info.white_base, DECK, "whiteBase")?,
                    required(&deck_info.black_base, DECK, "blackBase")?,
                ],
                [
                    required(&deck_info.white_dominion, DECK, "whiteDominion")?,
                    required(&deck_info.black_dominion, DECK, "blackDominion")?,
                ],
                [
                    required(&init_info.white_init_cards, INIT, "whiteInitCards")?,
                    required(&init_info.black_init_cards, INIT, "blackInitCards")?,
                ],
                [
                    required(&init_info.white_init_resources, INIT, "whiteInitResources")?,
                    required(&init_info.black_init_resources, INIT, "blackInitResources")?,
                ],
            )
        } else {
            (
                per_player(&deck_info.base, DECK, "base")?,
                per_player(&deck_info.randomizer, DECK, "randomizer")?,
                per_player(&init_info.init_cards, INIT, "initCards")?,
                per_player(&init_info.init_resources, INIT, "initResources")?,
            )
        };

        let mut deck = deck_info
            .merged_deck
            .iter()
            .map(normalize_blueprint)
            .collect::<GameResult<Vec<_>>>()?;
        let renames = rename_map(&deck_info.merged_deck);
        for blueprint in &mut deck {
            rename_blueprint(blueprint, &renames);
        }

        let rename = |name: &str| renames.get(name).cloned().unwrap_or_else(|| name.to_string());
        let to_entries = |set: &[RawDeckEntry]| -> Vec<DeckEntry> {
            set.iter()
                .map(|entry| match entry {
                    RawDeckEntry::Named(name) => DeckEntry::Named(rename(name)),
                    RawDeckEntry::Custom(name, supply) => DeckEntry::Custom {
                        name: name.clone(),
                        supply: *supply,
                    },
                })
                .collect()
        };
        let to_cards = |cards: &[RawInitCard]| -> Vec<(u32, String)> {
            cards
                .iter()
                .map(|(count, name)| (*count, rename(name)))
                .collect()
        };

        Ok(InitialState {
            deck,
            init_resources: [
                init_resources[0].to_resources(),
                init_resources[1].to_resources(),
            ],
            init_cards: [to_cards(&init_cards[0]), to_cards(&init_cards[1])],
            base_sets: [to_entries(&base_sets[0]), to_entries(&base_sets[1])],
            random_sets: [to_entries(&random_sets[0]), to_entries(&random_sets[1])],
            infinite_supplies: init_info.infinite_supplies,
        })
    }
}

fn required<T: Clone>(value: &Option<T>, message: &str, field: &str) -> GameResult<T> {
    value
        .clone()
        .ok_or_else(|| GameError::data(message).with_detail(field))
}

fn per_player<T: Clone>(value: &Option<Vec<T>>, message: &str, field: &str) -> GameResult<[T; 2]> {
    match value.as_deref() {
        Some([first, second]) => Ok([first.clone(), second.clone()]),
        _ => Err(GameError::data(message).with_detail(field)),
    }
}

/// Blueprints whose UI name differs from their internal name, by internal name.
pub fn rename_map(deck: &[RawBlueprint]) -> HashMap<String, String> {
    deck.iter()
        .filter_map(|raw| match &raw.ui_name {
            Some(ui) if !ui.is_empty() && *ui != raw.name => Some((raw.name.clone(), ui.clone())),
            _ => None,
        })
        .collect()
}

/// Rewrite a blueprint's own name and every name it references.
pub fn rename_blueprint(blueprint: &mut Blueprint, renames: &HashMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    let apply = |name: &mut String| {
        if let Some(new) = renames.get(name.as_str()) {
            *name = new.clone();
        }
    };

    if let Some(new) = renames.get(&blueprint.name) {
        blueprint.original_name = Some(std::mem::replace(&mut blueprint.name, new.clone()));
    }
    if let Some(name) = blueprint.resonate.as_mut() {
        apply(name);
    }
    if let Some(name) = blueprint.gold_resonate.as_mut() {
        apply(name);
    }
    for script in [
        blueprint.ability_script.as_mut(),
        blueprint.buy_script.as_mut(),
        blueprint.begin_own_turn_script.as_mut(),
    ]
    .into_iter()
    .flatten()
    {
        for rule in &mut script.create {
            apply(&mut rule.unit_name);
        }
    }
    for rules in [blueprint.ability_sac.as_mut(), blueprint.buy_sac.as_mut()]
        .into_iter()
        .flatten()
    {
        for rule in rules {
            apply(&mut rule.unit_name);
        }
    }
}

/// Apply engine defaults and convert loosely typed fields.
pub fn normalize_blueprint(raw: &RawBlueprint) -> GameResult<Blueprint> {
    let defaults = Blueprint::new(raw.name.clone());
    let sac_rules = |rules: &Option<Vec<Vec<Value>>>| -> GameResult<Option<Vec<SacrificeRule>>> {
        rules
            .as_ref()
            .map(|rules| rules.iter().map(|r| sacrifice_rule(r)).collect())
            .transpose()
    };
    let script = |script: &Option<RawScript>| script.as_ref().map(convert_script).transpose();

    Ok(Blueprint {
        original_name: None,
        ui_shortname: raw.ui_shortname.clone(),
        rarity: raw.rarity.clone(),
        build_time: raw.build_time.unwrap_or(defaults.build_time),
        charge: raw.charge,
        default_blocking: raw.default_blocking,
        fragile: raw.fragile,
        hp_gained: raw.hp_gained.unwrap_or(0),
        hp_max: raw.hp_max,
        lifespan: raw.lifespan,
        spell: raw.spell,
        toughness: raw.toughness.unwrap_or(defaults.toughness),
        undefendable: raw.undefendable,
        ability_cost: raw.ability_cost.as_ref().map(ResourceValue::to_resources),
        ability_netherfy: raw.ability_netherfy,
        ability_sac: sac_rules(&raw.ability_sac)?,
        ability_script: script(&raw.ability_script)?,
        hp_used: raw.hp_used.unwrap_or(0),
        target_action: raw.target_action.as_deref().map(TargetAction::from_name),
        target_amount: raw.target_amount,
        buy_cost: raw.buy_cost.as_ref().map(ResourceValue::to_resources),
        buy_sac: sac_rules(&raw.buy_sac)?,
        buy_script: script(&raw.buy_script)?,
        begin_own_turn_script: script(&raw.begin_own_turn_script)?,
        gold_resonate: raw.gold_resonate.clone(),
        resonate: raw.resonate.clone(),
        condition: raw.condition.as_ref().map(convert_condition),
        unknown_attributes: raw
            .other
            .keys()
            .filter(|key| !IGNORED_ATTRIBUTES.contains(&key.as_str()))
            .cloned()
            .collect(),
        ..defaults
    })
}

fn convert_script(raw: &RawScript) -> GameResult<Script> {
    Ok(Script {
        create: raw
            .create
            .iter()
            .map(|rule| create_rule(rule))
            .collect::<GameResult<_>>()?,
        delay: raw.delay,
        receive: raw.receive.as_ref().map(ResourceValue::to_resources),
        selfsac: raw.selfsac,
    })
}

/// `[name, "own" | "opponent", count = 1, buildTime = 1, lifespan?]`
fn create_rule(rule: &[Value]) -> GameResult<CreateRule> {
    let unit_name = rule
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| GameError::data("Invalid create rule.").with_detail(Value::from(rule)))?;
    let build_time = match rule.get(3) {
        None | Some(Value::Null) => 1,
        Some(value) => int_value(value)
            .ok_or_else(|| GameError::data("Invalid create rule.").with_detail(value))?,
    };
    Ok(CreateRule {
        unit_name: unit_name.to_string(),
        for_opponent: rule.get(1).and_then(Value::as_str) != Some("own"),
        count: count_or_one(rule.get(2)),
        build_time,
        lifespan: rule.get(4).and_then(int_value),
    })
}

/// `[name, count = 1]`
fn sacrifice_rule(rule: &[Value]) -> GameResult<SacrificeRule> {
    let unit_name = rule
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| GameError::data("Invalid sacrifice rule.").with_detail(Value::from(rule)))?;
    Ok(SacrificeRule {
        unit_name: unit_name.to_string(),
        count: count_or_one(rule.get(1)),
    })
}

fn convert_condition(map: &Map<String, Value>) -> Condition {
    let mut condition = Condition::default();
    for (key, value) in map {
        match key.as_str() {
            "isABC" => condition.is_abc = true,
            "healthAtMost" => condition.health_at_most = int_value(value),
            "nameIn" => {
                condition.name_in = Some(
                    value
                        .as_array()
                        .map(|names| {
                            names
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                )
            }
            "isEngineerTempHack" => condition.is_engineer_temp_hack = true,
            other => condition.unknown_keys.push(other.to_string()),
        }
    }
    condition
}

fn count_or_one(value: Option<&Value>) -> u32 {
    value
        .and_then(Value::as_u64)
        .filter(|&n| n > 0)
        .map_or(1, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn int_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => leading_int(s),
        _ => None,
    }
}

/// Integer prefix of a string, as in `"3"` or `"3 turns"`.
fn leading_int(s: &str) -> Option<i32> {
    let trimmed = s.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[..end].parse().ok()
}

/// JavaScript-style truthiness of a JSON value.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(truthy(&Value::deserialize(deserializer)?))
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(int_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawBlueprint {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let bp = normalize_blueprint(&raw(json!({"name": "Drone", "rarity": "trinket"}))).unwrap();
        assert_eq!(bp.build_time, 1);
        assert_eq!(bp.toughness, 1);
        assert_eq!(bp.hp_gained, 0);
        assert!(!bp.default_blocking);
        assert!(bp.unknown_attributes.is_empty());
    }

    #[test]
    fn test_loose_fields_converted() {
        let bp = normalize_blueprint(&raw(json!({
            "name": "Blood Phage",
            "lifespan": "3",
            "defaultBlocking": 1,
            "buyCost": 6,
            "abilityCost": "1B",
            "abilitySac": [["Drone"], ["Engineer", 2]],
            "buyScript": {"create": [["Drone", "own", 2, 0], ["Wall", "opponent"]], "selfsac": true},
            "condition": {"healthAtMost": 3, "nameIn": ["Drone"], "card": 1},
            "targetAction": "snipe",
            "description": "ignored",
            "mystery": 4
        })))
        .unwrap();
        assert_eq!(bp.lifespan, Some(3));
        assert!(bp.default_blocking);
        assert_eq!(bp.buy_cost, Some(Resources::gold(6)));
        assert_eq!(bp.ability_cost, Some(Resources::parse("1B")));

        let sac = bp.ability_sac.unwrap();
        assert_eq!(sac[0].count, 1);
        assert_eq!(sac[1].count, 2);

        let script = bp.buy_script.unwrap();
        assert!(script.selfsac);
        assert_eq!(script.create[0].count, 2);
        assert_eq!(script.create[0].build_time, 0);
        assert!(!script.create[0].for_opponent);
        assert_eq!(script.create[1].build_time, 1);
        assert!(script.create[1].for_opponent);

        let condition = bp.condition.unwrap();
        assert_eq!(condition.health_at_most, Some(3));
        assert_eq!(condition.unknown_keys, vec!["card".to_string()]);
        assert_eq!(bp.target_action, Some(TargetAction::Snipe));
        assert_eq!(bp.unknown_attributes, vec!["mystery".to_string()]);
    }

    #[test]
    fn test_rename_rewrites_references() {
        let deck = vec![
            raw(json!({"name": "Drone", "UIName": "Worker"})),
            raw(json!({"name": "Hive", "resonate": "Drone",
                "buyScript": {"create": [["Drone", "own"]]}, "buySac": [["Drone", 1]]})),
        ];
        let renames = rename_map(&deck);
        let mut hive = normalize_blueprint(&deck[1]).unwrap();
        rename_blueprint(&mut hive, &renames);
        assert_eq!(hive.resonate.as_deref(), Some("Worker"));
        assert_eq!(hive.buy_script.unwrap().create[0].unit_name, "Worker");
        assert_eq!(hive.buy_sac.unwrap()[0].unit_name, "Worker");

        let mut drone = normalize_blueprint(&deck[0]).unwrap();
        rename_blueprint(&mut drone, &renames);
        assert_eq!(drone.name, "Worker");
        assert_eq!(drone.original_name.as_deref(), Some("Drone"));
    }

    fn record(version: i64) -> Value {
        json!({
            "versionInfo": {"serverVersion": version},
            "deckInfo": {
                "mergedDeck": [
                    {"name": "Drone", "UIName": "Worker", "rarity": "normal"},
                    {"name": "Wall", "rarity": "rare"}
                ],
                "base": [["Drone", ["Wall", 3]], ["Drone"]],
                "randomizer": [[], []],
                "whiteBase": ["Drone"], "blackBase": ["Wall"],
                "whiteDominion": [], "blackDominion": []
            },
            "initInfo": {
                "initCards": [[[2, "Drone"]], [[1, "Wall"]]],
                "initResources": ["0", 5],
                "whiteInitCards": [[1, "Drone"]], "blackInitCards": [],
                "whiteInitResources": "2", "blackInitResources": "0"
            }
        })
    }

    #[test]
    fn test_initial_state_current_layout() {
        let data = ReplayData::from_value(record(200), &ReplayOptions::default()).unwrap();
        let init = data.initial_state().unwrap();
        assert_eq!(init.deck[0].name, "Worker");
        assert_eq!(init.init_cards[0], vec![(2, "Worker".to_string())]);
        assert_eq!(
            init.base_sets[0],
            vec![
                DeckEntry::Named("Worker".into()),
                DeckEntry::Custom {
                    name: "Wall".into(),
                    supply: 3
                }
            ]
        );
        assert_eq!(init.init_resources[1], Resources::gold(5));
    }

    #[test]
    fn test_initial_state_legacy_layout() {
        let data = ReplayData::from_value(record(140), &ReplayOptions::default()).unwrap();
        let init = data.initial_state().unwrap();
        assert_eq!(init.base_sets[1], vec![DeckEntry::Named("Wall".into())]);
        assert_eq!(init.init_cards[0], vec![(1, "Worker".to_string())]);
        assert_eq!(init.init_resources[0], Resources::gold(2));
    }

    #[test]
    fn test_missing_sections() {
        let data = ReplayData::from_value(json!({}), &ReplayOptions::default()).unwrap();
        assert_eq!(
            data.initial_state().unwrap_err(),
            GameError::data("Version info missing.")
        );
        let data =
            ReplayData::from_value(json!({"versionInfo": {"serverVersion": 200}}), &ReplayOptions::default())
                .unwrap();
        assert_eq!(data.initial_state().unwrap_err(), GameError::data("Deck info missing."));
    }

    #[test]
    fn test_strict_rejects_unknown_fields() {
        let value = json!({"rawHash": 1, "mystery": true});
        assert!(ReplayData::from_value(value.clone(), &ReplayOptions::default()).is_ok());
        let err = ReplayData::from_value(value, &ReplayOptions::strict()).unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&json!(1)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("bot")));
        assert!(!truthy(&Value::Null));
    }
}
