//! API-Football payload parsing
//!
//! Parses the JSON returned by the `fixtures` and `fixtures/statistics`
//! endpoints (saved to disk) into domain types. No network access happens
//! here.

use crate::{
    Fixture, FixtureId, FixtureStatistics, FixtureStatus, FootyError, Result, Score,
    SideStatistics, Team, TeamId,
};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    fixture: FixtureInfo,
    #[serde(default)]
    league: Option<LeagueInfo>,
    teams: TeamsInfo,
    goals: GoalsInfo,
}

#[derive(Debug, Deserialize)]
struct FixtureInfo {
    id: i64,
    timestamp: i64,
    status: StatusInfo,
}

#[derive(Debug, Deserialize)]
struct StatusInfo {
    #[serde(default)]
    long: Option<String>,
    #[serde(default)]
    short: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeagueInfo {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TeamsInfo {
    home: TeamInfo,
    away: TeamInfo,
}

#[derive(Debug, Deserialize)]
struct TeamInfo {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GoalsInfo {
    home: Option<u8>,
    away: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct StatisticsEntry {
    team: TeamRef,
    #[serde(default)]
    statistics: Vec<StatItem>,
}

#[derive(Debug, Deserialize)]
struct TeamRef {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct StatItem {
    #[serde(rename = "type")]
    kind: String,
    value: Value,
}

/// Parsed fixtures payload
#[derive(Debug, Clone, Default)]
pub struct ImportedFixtures {
    pub teams: Vec<Team>,
    pub fixtures: Vec<Fixture>,
    /// Entries dropped because they could not be turned into a valid fixture
    pub skipped: usize,
}

/// Parse a `fixtures` endpoint response
pub fn parse_fixtures(json: &str) -> Result<ImportedFixtures> {
    let envelope: Envelope<FixtureEntry> = serde_json::from_str(json)
        .map_err(|e| FootyError::Parse(format!("Invalid fixtures payload: {}", e)))?;

    let mut imported = ImportedFixtures::default();
    let mut seen_teams = std::collections::HashSet::new();

    for entry in envelope.response {
        for team in [&entry.teams.home, &entry.teams.away] {
            if seen_teams.insert(team.id) {
                imported.teams.push(Team {
                    id: TeamId(team.id),
                    name: team.name.clone(),
                });
            }
        }

        match entry_to_fixture(&entry) {
            Ok(fixture) => imported.fixtures.push(fixture),
            Err(e) => {
                log::warn!("Skipping fixture {}: {}", entry.fixture.id, e);
                imported.skipped += 1;
            }
        }
    }

    log::debug!(
        "Parsed {} fixtures and {} teams ({} skipped)",
        imported.fixtures.len(),
        imported.teams.len(),
        imported.skipped
    );
    Ok(imported)
}

fn entry_to_fixture(entry: &FixtureEntry) -> Result<Fixture> {
    let id = FixtureId(entry.fixture.id);

    let status_name = entry
        .fixture
        .status
        .short
        .as_deref()
        .or(entry.fixture.status.long.as_deref())
        .unwrap_or_default();
    let status = FixtureStatus::parse(status_name)
        .or_else(|| entry.fixture.status.long.as_deref().and_then(FixtureStatus::parse))
        .ok_or_else(|| FootyError::Parse(format!("Unknown status '{}'", status_name)))?;

    let kickoff = DateTime::from_timestamp(entry.fixture.timestamp, 0)
        .ok_or_else(|| FootyError::Parse(format!("Invalid timestamp {}", entry.fixture.timestamp)))?
        .naive_utc();

    // Live scores are not final; only finished fixtures keep their goals
    let score = match (status, entry.goals.home, entry.goals.away) {
        (FixtureStatus::Finished, Some(home), Some(away)) => Some(Score::new(home, away)),
        (FixtureStatus::Finished, _, _) => {
            return Err(FootyError::InvalidFixture(format!("{} is finished without goals", id)))
        }
        _ => None,
    };

    Ok(Fixture {
        id,
        league_id: entry.league.as_ref().map(|l| l.id),
        home_team: TeamId(entry.teams.home.id),
        away_team: TeamId(entry.teams.away.id),
        kickoff,
        status,
        score,
    })
}

/// Parse a `fixtures/statistics` endpoint response for `fixture`
///
/// Entries are matched to sides by team id; a side without an entry keeps
/// all fields empty.
pub fn parse_statistics(json: &str, fixture: &Fixture) -> Result<FixtureStatistics> {
    let envelope: Envelope<StatisticsEntry> = serde_json::from_str(json)
        .map_err(|e| FootyError::Parse(format!("Invalid statistics payload: {}", e)))?;

    let mut stats = FixtureStatistics::empty(fixture.id);
    for entry in &envelope.response {
        let side = if entry.team.id == fixture.home_team.0 {
            &mut stats.home
        } else if entry.team.id == fixture.away_team.0 {
            &mut stats.away
        } else {
            log::warn!("Statistics for team {} not in {}", entry.team.id, fixture.id);
            continue;
        };
        apply_items(side, &entry.statistics);
    }
    Ok(stats)
}

fn apply_items(side: &mut SideStatistics, items: &[StatItem]) {
    for item in items {
        match item.kind.as_str() {
            "Ball Possession" => side.possession = parse_number(&item.value).map(|v| v as f32),
            "Total Shots" => side.shots = parse_count(&item.value),
            "Shots on Goal" => side.shots_on_target = parse_count(&item.value),
            "Corner Kicks" => side.corners = parse_count(&item.value),
            "Fouls" => side.fouls = parse_count(&item.value),
            "Yellow Cards" => side.yellow_cards = parse_count(&item.value),
            "Red Cards" => side.red_cards = parse_count(&item.value),
            _ => {}
        }
    }
}

/// Numbers arrive as JSON numbers, strings like "55%", or null
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn parse_count(value: &Value) -> Option<u16> {
    parse_number(value)
        .filter(|v| *v >= 0.0 && *v <= u16::MAX as f64)
        .map(|v| v.round() as u16)
}
