//! Shared test utilities and arbitrary generators for property-based testing.
//!
//! Names are drawn from small pools, mixed in case and padding, so generated
//! events and watchlists collide often enough to exercise matching.

use crate::types::{EventId, KillEvent, Participant};
use crate::watch::WatchConfig;
use proptest::prelude::*;

fn arb_name(pool: &'static [&'static str]) -> impl Strategy<Value = String> {
    (prop::sample::select(pool), any::<bool>(), any::<bool>()).prop_map(|(name, upper, padded)| {
        let name = if upper {
            name.to_uppercase()
        } else {
            name.to_string()
        };
        if padded { format!(" {} ", name) } else { name }
    })
}

const PLAYERS: &[&str] = &["alice", "bob", "carol", "dave", ""];
const GUILDS: &[&str] = &["foo", "bar", "baz", ""];
const ALLIANCES: &[&str] = &["ally", "axis", ""];

pub fn arb_event_id() -> impl Strategy<Value = EventId> {
    any::<u64>().prop_map(EventId)
}

pub fn arb_participant() -> impl Strategy<Value = Participant> {
    (arb_name(PLAYERS), arb_name(GUILDS), arb_name(ALLIANCES))
        .prop_map(|(name, guild, alliance)| Participant::new(&name, &guild, &alliance))
}

pub fn arb_kill_event() -> impl Strategy<Value = KillEvent> {
    (
        arb_event_id(),
        arb_participant(),
        arb_participant(),
        prop_oneof![Just(0u64), 1u64..10_000_000],
    )
        .prop_map(|(id, killer, victim, fame)| KillEvent::new(id, killer, victim, fame))
}

pub fn arb_watch_config() -> impl Strategy<Value = WatchConfig> {
    (
        prop::option::of(arb_name(GUILDS)),
        prop::option::of(arb_name(ALLIANCES)),
        prop::collection::vec(arb_name(PLAYERS), 0..3),
    )
        .prop_map(|(guild, alliance, players)| {
            WatchConfig::new(guild.as_deref(), alliance.as_deref(), players)
        })
}
