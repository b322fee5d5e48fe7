//! Kill event records as served by the feed.
//!
//! Only the fields the relay reasons about are modelled explicitly. Everything
//! else (equipment, inventory, participants, timestamps) is carried through
//! untouched in `extra` so collaborators see the record exactly as received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::EventId;

/// One side of a kill: the killer or the victim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Participant {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub guild_name: Option<String>,

    #[serde(default)]
    pub alliance_name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Participant {
    /// Creates a participant with the three identifying names set.
    ///
    /// Empty strings are stored as `None`.
    pub fn new(name: &str, guild: &str, alliance: &str) -> Self {
        fn non_empty(s: &str) -> Option<String> {
            (!s.is_empty()).then(|| s.to_string())
        }

        Participant {
            name: non_empty(name),
            guild_name: non_empty(guild),
            alliance_name: non_empty(alliance),
            extra: Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn guild_name(&self) -> &str {
        self.guild_name.as_deref().unwrap_or("")
    }

    pub fn alliance_name(&self) -> &str {
        self.alliance_name.as_deref().unwrap_or("")
    }
}

/// A single kill event.
///
/// Immutable once received. A `total_fame` of zero marks a knockdown, which
/// is never delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    #[serde(rename = "EventId", default)]
    pub id: EventId,

    #[serde(rename = "TotalVictimKillFame", default)]
    pub total_fame: u64,

    #[serde(rename = "Killer", default)]
    pub killer: Participant,

    #[serde(rename = "Victim", default)]
    pub victim: Participant,

    /// Fields the relay does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KillEvent {
    pub fn new(id: impl Into<EventId>, killer: Participant, victim: Participant, fame: u64) -> Self {
        KillEvent {
            id: id.into(),
            total_fame: fame,
            killer,
            victim,
            extra: Map::new(),
        }
    }

    /// Returns true if this event is a non-lethal knockdown.
    pub fn is_knockdown(&self) -> bool {
        self.total_fame == 0
    }

    /// Returns the feed timestamp, if present.
    pub fn timestamp(&self) -> Option<&str> {
        self.extra.get("TimeStamp").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> Value {
        serde_json::json!({
            "EventId": 1_234_567,
            "TimeStamp": "2024-05-01T12:00:00.123456Z",
            "TotalVictimKillFame": 48_000,
            "Killer": {
                "Name": "Alice",
                "GuildName": "Foo",
                "AllianceName": "",
                "Equipment": { "MainHand": { "Type": "T8_MAIN_SWORD", "Count": 1 } }
            },
            "Victim": {
                "Name": "Bob",
                "GuildName": null,
                "AllianceName": "BAR",
                "Inventory": [null, { "Type": "T4_BAG", "Count": 1 }]
            },
            "Participants": [],
            "numberOfParticipants": 1
        })
    }

    #[test]
    fn deserializes_feed_record() {
        let event: KillEvent = serde_json::from_value(sample_json()).unwrap();

        assert_eq!(event.id, EventId(1_234_567));
        assert_eq!(event.total_fame, 48_000);
        assert_eq!(event.killer.name(), "Alice");
        assert_eq!(event.killer.guild_name(), "Foo");
        assert_eq!(event.killer.alliance_name(), "");
        assert_eq!(event.victim.guild_name(), "");
        assert_eq!(event.victim.alliance_name(), "BAR");
        assert_eq!(event.timestamp(), Some("2024-05-01T12:00:00.123456Z"));
        assert!(!event.is_knockdown());
    }

    #[test]
    fn opaque_fields_survive_reserialization() {
        let original = sample_json();
        let event: KillEvent = serde_json::from_value(original.clone()).unwrap();
        let back = serde_json::to_value(&event).unwrap();

        assert_eq!(back["Participants"], original["Participants"]);
        assert_eq!(back["numberOfParticipants"], original["numberOfParticipants"]);
        assert_eq!(back["Killer"]["Equipment"], original["Killer"]["Equipment"]);
        assert_eq!(back["Victim"]["Inventory"], original["Victim"]["Inventory"]);
    }

    #[test]
    fn missing_fields_default() {
        let event: KillEvent = serde_json::from_value(serde_json::json!({})).unwrap();

        assert!(event.id.is_unset());
        assert!(event.is_knockdown());
        assert_eq!(event.killer, Participant::default());
    }

    #[test]
    fn participant_new_treats_empty_as_none() {
        let p = Participant::new("Alice", "", "ALLY");
        assert_eq!(p.name.as_deref(), Some("Alice"));
        assert_eq!(p.guild_name, None);
        assert_eq!(p.alliance_name.as_deref(), Some("ALLY"));
    }
}
