//! Seeded synthetic league generator
//!
//! Produces a plausible corpus of teams, fixtures and statistics for local
//! experimentation (`footy data seed`) and tests. Team strengths drive goal
//! rates and match statistics, so the generated data carries learnable signal.

use crate::{Fixture, FixtureId, FixtureStatistics, Score, SideStatistics, Team, TeamId};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TEAM_NAMES: [&str; 20] = [
    "Arsenal",
    "Aston Villa",
    "Bournemouth",
    "Brentford",
    "Brighton",
    "Chelsea",
    "Crystal Palace",
    "Everton",
    "Fulham",
    "Ipswich",
    "Leicester",
    "Liverpool",
    "Manchester City",
    "Manchester United",
    "Newcastle",
    "Nottingham Forest",
    "Southampton",
    "Tottenham",
    "West Ham",
    "Wolves",
];

/// Base goal rate per side before strength adjustment
const BASE_GOALS: f64 = 1.35;
const HOME_ADVANTAGE: f64 = 0.25;

/// Generated corpus
#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub teams: Vec<Team>,
    /// Finished fixtures first (oldest first), then upcoming fixtures
    pub fixtures: Vec<Fixture>,
    /// One record per fixture, in fixture order
    pub statistics: Vec<FixtureStatistics>,
}

/// Generator configuration
#[derive(Debug, Clone)]
pub struct SyntheticLeague {
    team_count: usize,
    upcoming: usize,
    seed: u64,
    league_id: i64,
}

impl SyntheticLeague {
    pub fn new(team_count: usize, seed: u64) -> Self {
        SyntheticLeague {
            team_count: team_count.clamp(2, TEAM_NAMES.len()),
            upcoming: 0,
            seed,
            league_id: 39,
        }
    }

    /// Also generate `count` not-started fixtures after the finished ones
    pub fn with_upcoming(mut self, count: usize) -> Self {
        self.upcoming = count;
        self
    }

    /// Generate `finished` played fixtures plus any configured upcoming fixtures
    pub fn generate(&self, finished: usize) -> SyntheticData {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let teams: Vec<Team> = TEAM_NAMES
            .iter()
            .take(self.team_count)
            .enumerate()
            .map(|(i, name)| Team {
                id: TeamId(i as i64 + 1),
                name: name.to_string(),
            })
            .collect();

        // Attack/defence strength in roughly [-0.5, 0.5]
        let strength: Vec<f64> = (0..teams.len()).map(|_| rng.gen_range(-0.5..0.5)).collect();

        let start = season_start();
        let mut fixtures = Vec::with_capacity(finished + self.upcoming);
        let mut statistics = Vec::with_capacity(finished + self.upcoming);

        for i in 0..finished + self.upcoming {
            let home = rng.gen_range(0..teams.len());
            let mut away = rng.gen_range(0..teams.len() - 1);
            if away >= home {
                away += 1;
            }

            let id = FixtureId(i as i64 + 1);
            // Two fixtures a day, three hours apart
            let kickoff = start + Duration::days(i as i64 / 2) + Duration::hours(3 * (i as i64 % 2));

            let diff = strength[home] - strength[away];
            let mut fixture = if i < finished {
                let home_goals = poisson(&mut rng, BASE_GOALS * (diff + HOME_ADVANTAGE).exp());
                let away_goals = poisson(&mut rng, BASE_GOALS * (-diff).exp());
                Fixture::finished(
                    id,
                    teams[home].id,
                    teams[away].id,
                    kickoff,
                    Score::new(home_goals, away_goals),
                )
            } else {
                Fixture::scheduled(id, teams[home].id, teams[away].id, kickoff)
            };
            fixture.league_id = Some(self.league_id);

            statistics.push(match_statistics(&mut rng, id, diff));
            fixtures.push(fixture);
        }

        log::debug!(
            "Generated {} teams, {} fixtures (seed {})",
            teams.len(),
            fixtures.len(),
            self.seed
        );

        SyntheticData {
            teams,
            fixtures,
            statistics,
        }
    }
}

fn season_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 8, 12)
        .and_then(|d| d.and_hms_opt(15, 0, 0))
        .unwrap_or_default()
}

fn match_statistics(rng: &mut StdRng, fixture_id: FixtureId, diff: f64) -> FixtureStatistics {
    let possession = (50.0 + diff * 20.0 + rng.gen_range(-6.0..6.0)).clamp(25.0, 75.0);

    let side = |rng: &mut StdRng, possession: f64, edge: f64| {
        let shots = poisson(rng, 12.0 * (edge * 0.6).exp()) as u16;
        let on_target = (shots as f64 * rng.gen_range(0.25..0.5)).round() as u16;
        SideStatistics {
            possession: Some(possession as f32),
            shots: Some(shots),
            shots_on_target: Some(on_target),
            corners: Some(poisson(rng, 5.0 * (edge * 0.4).exp()) as u16),
            fouls: Some(poisson(rng, 11.0) as u16),
            yellow_cards: Some(poisson(rng, 1.8) as u16),
            red_cards: Some(u16::from(rng.gen_bool(0.04))),
        }
    };

    FixtureStatistics {
        fixture_id,
        home: side(&mut *rng, possession, diff),
        away: side(&mut *rng, 100.0 - possession, -diff),
    }
}

/// Knuth's Poisson sampler, capped far enough above the mean to leave the
/// distribution intact
fn poisson(rng: &mut StdRng, lambda: f64) -> u8 {
    let cap = (4.0 * lambda + 10.0).min(f64::from(u8::MAX)) as u8;
    let limit = (-lambda).exp();
    let mut k = 0u8;
    let mut p = 1.0;
    loop {
        p *= rng.gen::<f64>();
        if p <= limit || k >= cap {
            return k;
        }
        k += 1;
    }
}
