//! Short human-readable summaries handed to the sink.

use std::fmt::Write;

use crate::types::{KillEvent, Participant};

use super::collaborators::Estimate;

/// Public killboard page for an event.
pub fn killboard_url(event: &KillEvent) -> String {
    format!("https://albiononline.com/killboard/kill/{}", event.id)
}

/// Formats a number with a K/M/B suffix and at most one decimal.
///
/// `999` → `999`, `1500` → `1.5K`, `2000000` → `2M`.
pub fn format_compact(n: u64) -> String {
    let (value, suffix) = match n {
        1_000_000_000.. => (n as f64 / 1e9, "B"),
        1_000_000.. => (n as f64 / 1e6, "M"),
        1_000.. => (n as f64 / 1e3, "K"),
        _ => return n.to_string(),
    };
    let formatted = format!("{:.1}", value);
    let trimmed = formatted.strip_suffix(".0").unwrap_or(&formatted);
    format!("{}{}", trimmed, suffix)
}

fn describe(p: &Participant) -> String {
    let name = match p.name() {
        "" => "Unknown",
        name => name,
    };
    match (p.guild_name(), p.alliance_name()) {
        ("", _) => name.to_string(),
        (guild, "") => format!("{} ({})", name, guild),
        (guild, alliance) => format!("{} ([{}] {})", name, alliance, guild),
    }
}

/// Builds the message posted alongside the artifact.
///
/// `victim_watched` marks the event as one of our losses.
pub fn summarize(event: &KillEvent, estimate: &Estimate, victim_watched: bool) -> String {
    let mut out = String::new();
    let tag = if victim_watched { "Loss" } else { "Kill" };

    let _ = writeln!(
        out,
        "{}: {} killed {}",
        tag,
        describe(&event.killer),
        describe(&event.victim)
    );
    let _ = write!(out, "Fame {}", format_compact(event.total_fame));
    if estimate.victim_total_loss > 0 {
        let _ = write!(
            out,
            " · Loss (est.) {} silver",
            format_compact(estimate.victim_total_loss)
        );
    }
    let _ = write!(out, "\n{}", killboard_url(event));
    out
}
