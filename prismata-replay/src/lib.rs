//! Reconstruct Prismata matches from recorded replays.
//!
//! A replay records raw client input (unit clicks, blueprint clicks, the
//! space bar). [`ReplayParser`] infers the high-level action behind each
//! input and applies it to a [`prismata_core::GameState`], reporting every
//! step to registered [`observer::ReplayObserver`]s.
//!
//! ```ignore
//! let mut parser = ReplayParser::from_json(&text, &ReplayOptions::default())?;
//! parser.register(Box::new(ConsoleObserver::stdout(ConsoleOptions::default())));
//! parser.run()?;
//! println!("{:?}", parser.data().result()?);
//! ```

pub mod command;
pub mod config;
pub mod data;
pub mod error;
pub mod info;
pub mod observer;
pub mod parser;
pub mod shift_click;

pub use command::{parse_command, ReplayCommand};
pub use config::ReplayOptions;
pub use data::ReplayData;
pub use error::{ErrorKind, ReplayError};
pub use info::{
    Deck, EndCondition, GameFormat, MatchResult, PlayerInfo, Rating, StartPosition, TimeControl,
};
pub use observer::console::{ConsoleObserver, ConsoleOptions};
pub use observer::event_log::EventLogObserver;
pub use observer::{CollectingObserver, ReplayEvent, ReplayObserver};
pub use parser::ReplayParser;
