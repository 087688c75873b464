//! SQLite database management for fixture data

use crate::{
    Fixture, FixtureId, FixtureStatistics, FixtureStatus, FootyError, Market, Result, Score,
    Selection, SideStatistics, Team, TeamId,
};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A persisted prediction for one selection of one fixture
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub fixture_id: FixtureId,
    pub market: Market,
    pub selection: Selection,
    pub confidence: f64,
    pub is_value_bet: bool,
    /// Market odds the prediction was compared against
    pub odds: Option<f64>,
    pub created_at: NaiveDateTime,
}

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fixtures (
                id INTEGER PRIMARY KEY,
                league_id INTEGER,
                home_team_id INTEGER NOT NULL REFERENCES teams(id),
                away_team_id INTEGER NOT NULL REFERENCES teams(id),
                kickoff TEXT NOT NULL,
                status TEXT NOT NULL,
                home_goals INTEGER,
                away_goals INTEGER
            );

            CREATE TABLE IF NOT EXISTS fixture_statistics (
                fixture_id INTEGER PRIMARY KEY REFERENCES fixtures(id),
                home_possession REAL,
                away_possession REAL,
                home_shots INTEGER,
                away_shots INTEGER,
                home_shots_on_target INTEGER,
                away_shots_on_target INTEGER,
                home_corners INTEGER,
                away_corners INTEGER,
                home_fouls INTEGER,
                away_fouls INTEGER,
                home_yellow_cards INTEGER,
                away_yellow_cards INTEGER,
                home_red_cards INTEGER,
                away_red_cards INTEGER
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fixture_id INTEGER NOT NULL REFERENCES fixtures(id),
                market TEXT NOT NULL,
                selection TEXT NOT NULL,
                confidence REAL NOT NULL,
                is_value_bet INTEGER NOT NULL,
                odds REAL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_fixtures_kickoff ON fixtures(kickoff);
            CREATE INDEX IF NOT EXISTS idx_fixtures_status ON fixtures(status);
            CREATE INDEX IF NOT EXISTS idx_predictions_fixture ON predictions(fixture_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Insert a team or rename an existing one
    pub fn upsert_team(&self, team: &Team) -> Result<()> {
        self.conn.execute(
            "INSERT INTO teams (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![team.id.0, team.name],
        )?;
        Ok(())
    }

    pub fn get_team(&self, id: TeamId) -> Result<Option<Team>> {
        let team = self
            .conn
            .query_row(
                "SELECT id, name FROM teams WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(Team {
                        id: TeamId(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(team)
    }

    pub fn team_name(&self, id: TeamId) -> Result<String> {
        self.get_team(id)?
            .map(|t| t.name)
            .ok_or(FootyError::TeamNotFound(id))
    }

    pub fn get_all_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM teams ORDER BY name")?;
        let teams = stmt
            .query_map([], |row| {
                Ok(Team {
                    id: TeamId(row.get(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(teams)
    }

    // ==================== Fixture Operations ====================

    /// Insert or update a fixture
    ///
    /// Rejects fixtures whose score presence does not match their status.
    pub fn upsert_fixture(&self, fixture: &Fixture) -> Result<()> {
        if !fixture.is_consistent() {
            return Err(FootyError::InvalidFixture(format!(
                "{} has status {} but score {:?}",
                fixture.id, fixture.status, fixture.score
            )));
        }
        if fixture.home_team == fixture.away_team {
            return Err(FootyError::InvalidFixture(format!(
                "{} has the same home and away team",
                fixture.id
            )));
        }

        self.conn.execute(
            r#"
            INSERT INTO fixtures (id, league_id, home_team_id, away_team_id, kickoff,
                                  status, home_goals, away_goals)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                league_id = COALESCE(excluded.league_id, league_id),
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                kickoff = excluded.kickoff,
                status = excluded.status,
                home_goals = excluded.home_goals,
                away_goals = excluded.away_goals
            "#,
            params![
                fixture.id.0,
                fixture.league_id,
                fixture.home_team.0,
                fixture.away_team.0,
                fixture.kickoff.format(DATETIME_FORMAT).to_string(),
                fixture.status.code(),
                fixture.score.map(|s| s.home),
                fixture.score.map(|s| s.away),
            ],
        )?;
        Ok(())
    }

    /// Insert multiple fixtures
    pub fn upsert_fixtures(&self, fixtures: &[Fixture]) -> Result<usize> {
        let mut count = 0;
        for fixture in fixtures {
            self.upsert_fixture(fixture)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn get_fixture(&self, id: FixtureId) -> Result<Option<Fixture>> {
        let fixture = self
            .conn
            .query_row(
                "SELECT id, league_id, home_team_id, away_team_id, kickoff, status,
                        home_goals, away_goals
                 FROM fixtures WHERE id = ?1",
                params![id.0],
                Self::row_to_fixture,
            )
            .optional()?;
        Ok(fixture)
    }

    /// Get all fixtures, oldest first
    pub fn get_all_fixtures(&self) -> Result<Vec<Fixture>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, league_id, home_team_id, away_team_id, kickoff, status,
                    home_goals, away_goals
             FROM fixtures
             ORDER BY kickoff, id",
        )?;
        let fixtures = stmt
            .query_map([], Self::row_to_fixture)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(fixtures)
    }

    pub fn get_fixtures_by_status(&self, status: FixtureStatus) -> Result<Vec<Fixture>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, league_id, home_team_id, away_team_id, kickoff, status,
                    home_goals, away_goals
             FROM fixtures
             WHERE status = ?1
             ORDER BY kickoff, id",
        )?;
        let fixtures = stmt
            .query_map(params![status.code()], Self::row_to_fixture)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(fixtures)
    }

    fn row_to_fixture(row: &rusqlite::Row) -> rusqlite::Result<Fixture> {
        let kickoff_str: String = row.get(4)?;
        let kickoff = NaiveDateTime::parse_from_str(&kickoff_str, DATETIME_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let status_str: String = row.get(5)?;
        let status = FixtureStatus::parse(&status_str).unwrap_or(FixtureStatus::NotStarted);

        let home_goals: Option<u8> = row.get(6)?;
        let away_goals: Option<u8> = row.get(7)?;
        let score = match (home_goals, away_goals) {
            (Some(home), Some(away)) => Some(Score::new(home, away)),
            _ => None,
        };

        Ok(Fixture {
            id: FixtureId(row.get(0)?),
            league_id: row.get(1)?,
            home_team: TeamId(row.get(2)?),
            away_team: TeamId(row.get(3)?),
            kickoff,
            status,
            score,
        })
    }

    // ==================== Statistics Operations ====================

    /// Insert or replace the statistics of a fixture
    pub fn upsert_statistics(&self, stats: &FixtureStatistics) -> Result<()> {
        let (h, a) = (&stats.home, &stats.away);
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO fixture_statistics (
                fixture_id, home_possession, away_possession, home_shots, away_shots,
                home_shots_on_target, away_shots_on_target, home_corners, away_corners,
                home_fouls, away_fouls, home_yellow_cards, away_yellow_cards,
                home_red_cards, away_red_cards)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                stats.fixture_id.0,
                h.possession,
                a.possession,
                h.shots,
                a.shots,
                h.shots_on_target,
                a.shots_on_target,
                h.corners,
                a.corners,
                h.fouls,
                a.fouls,
                h.yellow_cards,
                a.yellow_cards,
                h.red_cards,
                a.red_cards,
            ],
        )?;
        Ok(())
    }

    pub fn get_statistics(&self, fixture_id: FixtureId) -> Result<Option<FixtureStatistics>> {
        let stats = self
            .conn
            .query_row(
                "SELECT * FROM fixture_statistics WHERE fixture_id = ?1",
                params![fixture_id.0],
                Self::row_to_statistics,
            )
            .optional()?;
        Ok(stats)
    }

    pub fn get_all_statistics(&self) -> Result<Vec<FixtureStatistics>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM fixture_statistics ORDER BY fixture_id")?;
        let stats = stmt
            .query_map([], Self::row_to_statistics)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    fn row_to_statistics(row: &rusqlite::Row) -> rusqlite::Result<FixtureStatistics> {
        Ok(FixtureStatistics {
            fixture_id: FixtureId(row.get(0)?),
            home: SideStatistics {
                possession: row.get(1)?,
                shots: row.get(3)?,
                shots_on_target: row.get(5)?,
                corners: row.get(7)?,
                fouls: row.get(9)?,
                yellow_cards: row.get(11)?,
                red_cards: row.get(13)?,
            },
            away: SideStatistics {
                possession: row.get(2)?,
                shots: row.get(4)?,
                shots_on_target: row.get(6)?,
                corners: row.get(8)?,
                fouls: row.get(10)?,
                yellow_cards: row.get(12)?,
                red_cards: row.get(14)?,
            },
        })
    }

    // ==================== Prediction Operations ====================

    /// Append prediction rows. Existing rows are never updated.
    pub fn insert_predictions(&mut self, records: &[PredictionRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO predictions (fixture_id, market, selection, confidence,
                                          is_value_bet, odds, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.fixture_id.0,
                    record.market.name(),
                    record.selection.name(),
                    record.confidence,
                    record.is_value_bet,
                    record.odds,
                    record.created_at.format(DATETIME_FORMAT).to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Predictions of a fixture, oldest first
    pub fn get_predictions_for_fixture(&self, fixture_id: FixtureId) -> Result<Vec<PredictionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT fixture_id, market, selection, confidence, is_value_bet, odds, created_at
             FROM predictions
             WHERE fixture_id = ?1
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![fixture_id.0], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (fixture, market, selection, confidence, is_value_bet, odds, created_at) in rows {
            let market = Market::from_name(&market)
                .ok_or_else(|| FootyError::Parse(format!("Unknown market '{}'", market)))?;
            let selection = Selection::from_names(market, &selection).ok_or_else(|| {
                FootyError::Parse(format!("Unknown selection '{}' for {}", selection, market))
            })?;
            let created_at = NaiveDateTime::parse_from_str(&created_at, DATETIME_FORMAT)
                .map_err(|e| FootyError::Parse(format!("Invalid timestamp '{}': {}", created_at, e)))?;

            records.push(PredictionRecord {
                fixture_id: FixtureId(fixture),
                market,
                selection,
                confidence,
                is_value_bet,
                odds,
                created_at,
            });
        }
        Ok(records)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |query: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(query, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let parse = |s: Option<String>| s.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok());

        let min_kickoff: Option<String> = self
            .conn
            .query_row("SELECT MIN(kickoff) FROM fixtures", [], |row| row.get(0))
            .optional()?
            .flatten();

        let max_kickoff: Option<String> = self
            .conn
            .query_row("SELECT MAX(kickoff) FROM fixtures", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            team_count: count("SELECT COUNT(*) FROM teams")?,
            fixture_count: count("SELECT COUNT(*) FROM fixtures")?,
            finished_count: count("SELECT COUNT(*) FROM fixtures WHERE status = 'FT'")?,
            statistics_count: count("SELECT COUNT(*) FROM fixture_statistics")?,
            prediction_count: count("SELECT COUNT(*) FROM predictions")?,
            earliest_kickoff: parse(min_kickoff),
            latest_kickoff: parse(max_kickoff),
        })
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

impl PredictionRecord {
    /// A record stamped with the current time
    pub fn now(
        fixture_id: FixtureId,
        selection: Selection,
        confidence: f64,
        is_value_bet: bool,
        odds: Option<f64>,
    ) -> Self {
        PredictionRecord {
            fixture_id,
            market: selection.market(),
            selection,
            confidence,
            is_value_bet,
            odds,
            created_at: Utc::now().naive_utc(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub fixture_count: usize,
    pub finished_count: usize,
    pub statistics_count: usize,
    pub prediction_count: usize,
    pub earliest_kickoff: Option<NaiveDateTime>,
    pub latest_kickoff: Option<NaiveDateTime>,
}
