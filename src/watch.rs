//! Watchlist matching for kill events.
//!
//! An operator configures a guild, an alliance and a set of player names.
//! An event matches when either side (killer or victim) belongs to one of
//! them, so a watched entity's kills and deaths are both relayed.
//!
//! Precedence is fixed: guild, then alliance, then player. A configuration
//! with nothing set matches nothing.

use std::collections::HashSet;
use std::fmt;

use crate::types::{KillEvent, Participant};

/// Normalizes a name for comparison: trimmed and lower-cased.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Operator-configured matching criteria.
///
/// All names are normalized once at construction; blank values are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchConfig {
    guild_name: Option<String>,
    alliance_name: Option<String>,
    player_names: HashSet<String>,
}

impl WatchConfig {
    pub fn new<I, S>(guild: Option<&str>, alliance: Option<&str>, players: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let non_blank = |s: &str| Some(normalize(s)).filter(|n| !n.is_empty());
        WatchConfig {
            guild_name: guild.and_then(non_blank),
            alliance_name: alliance.and_then(non_blank),
            player_names: players
                .into_iter()
                .filter_map(|p| non_blank(p.as_ref()))
                .collect(),
        }
    }

    /// Returns true if no guild, alliance or player is configured.
    pub fn is_empty(&self) -> bool {
        self.guild_name.is_none() && self.alliance_name.is_none() && self.player_names.is_empty()
    }

    pub fn guild_name(&self) -> Option<&str> {
        self.guild_name.as_deref()
    }

    pub fn alliance_name(&self) -> Option<&str> {
        self.alliance_name.as_deref()
    }

    pub fn player_names(&self) -> &HashSet<String> {
        &self.player_names
    }

    fn guild_matches(&self, p: &Participant) -> bool {
        self.guild_name
            .as_deref()
            .is_some_and(|g| normalize(p.guild_name()) == g)
    }

    fn alliance_matches(&self, p: &Participant) -> bool {
        self.alliance_name
            .as_deref()
            .is_some_and(|a| normalize(p.alliance_name()) == a)
    }

    fn player_matches(&self, p: &Participant) -> bool {
        self.player_names.contains(&normalize(p.name()))
    }

    /// Returns true if the victim is the watched entity.
    ///
    /// Used to present an event as a loss rather than a kill.
    pub fn victim_is_watched(&self, event: &KillEvent) -> bool {
        let v = &event.victim;
        self.guild_matches(v) || self.alliance_matches(v) || self.player_matches(v)
    }
}

/// Why an event did or did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Guild,
    Alliance,
    Player,
    NoFiltersConfigured,
    NoMatch,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchReason::Guild => "guild",
            MatchReason::Alliance => "alliance",
            MatchReason::Player => "player",
            MatchReason::NoFiltersConfigured => "no filters configured",
            MatchReason::NoMatch => "no match",
        };
        f.write_str(s)
    }
}

/// The result of matching an event against a [`WatchConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchMatch {
    pub ok: bool,
    pub reason: MatchReason,
}

impl WatchMatch {
    fn hit(reason: MatchReason) -> Self {
        WatchMatch { ok: true, reason }
    }

    fn miss(reason: MatchReason) -> Self {
        WatchMatch { ok: false, reason }
    }
}

/// Matches an event against the watchlist.
///
/// Pure: no side effects, symmetric in killer and victim.
pub fn matches(event: &KillEvent, config: &WatchConfig) -> WatchMatch {
    if config.is_empty() {
        return WatchMatch::miss(MatchReason::NoFiltersConfigured);
    }

    let sides = [&event.killer, &event.victim];

    if sides.iter().any(|p| config.guild_matches(p)) {
        WatchMatch::hit(MatchReason::Guild)
    } else if sides.iter().any(|p| config.alliance_matches(p)) {
        WatchMatch::hit(MatchReason::Alliance)
    } else if sides.iter().any(|p| config.player_matches(p)) {
        WatchMatch::hit(MatchReason::Player)
    } else {
        WatchMatch::miss(MatchReason::NoMatch)
    }
}
