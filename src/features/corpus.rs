//! Historical fixture corpus with per-team and per-fixture indexes

use crate::{Fixture, FixtureId, FixtureStatistics, TeamId};
use std::collections::HashMap;

/// Snapshot of historical fixtures and their statistics
///
/// Finished fixtures with a known score are indexed per team, newest first,
/// so form windows can be read without rescanning the whole corpus.
pub struct Corpus<'a> {
    fixtures: &'a [Fixture],
    statistics: HashMap<FixtureId, &'a FixtureStatistics>,
    by_team: HashMap<TeamId, Vec<&'a Fixture>>,
}

impl<'a> Corpus<'a> {
    /// Build a corpus from fixture and statistics collections
    pub fn new(fixtures: &'a [Fixture], statistics: &'a [FixtureStatistics]) -> Self {
        let statistics = statistics.iter().map(|s| (s.fixture_id, s)).collect();

        let mut by_team: HashMap<TeamId, Vec<&'a Fixture>> = HashMap::new();
        for fixture in fixtures
            .iter()
            .filter(|f| f.is_finished() && f.score.is_some())
        {
            by_team.entry(fixture.home_team).or_default().push(fixture);
            by_team.entry(fixture.away_team).or_default().push(fixture);
        }

        // Newest first; ties broken by id so ordering never depends on input order
        for played in by_team.values_mut() {
            played.sort_by(|a, b| b.kickoff.cmp(&a.kickoff).then(b.id.cmp(&a.id)));
        }

        Corpus {
            fixtures,
            statistics,
            by_team,
        }
    }

    /// All fixtures in the corpus
    pub fn fixtures(&self) -> &'a [Fixture] {
        self.fixtures
    }

    pub fn statistics(&self, fixture: FixtureId) -> Option<&'a FixtureStatistics> {
        self.statistics.get(&fixture).copied()
    }

    /// Up to `window` finished fixtures of `team` that kicked off strictly
    /// before `target`, excluding `target` itself, newest first.
    pub fn recent_fixtures(&self, team: TeamId, target: &Fixture, window: usize) -> Vec<&'a Fixture> {
        self.by_team
            .get(&team)
            .map(|played| {
                played
                    .iter()
                    .copied()
                    .filter(|f| f.id != target.id && f.kickoff < target.kickoff)
                    .take(window)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Score;
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_recent_fixtures_window() {
        let fixtures: Vec<Fixture> = (1..=8)
            .map(|i| {
                Fixture::finished(FixtureId(i), TeamId(1), TeamId(i + 1), day(i as u32), Score::new(1, 0))
            })
            .collect();
        let corpus = Corpus::new(&fixtures, &[]);

        let target = Fixture::scheduled(FixtureId(100), TeamId(1), TeamId(50), day(7));
        let recent = corpus.recent_fixtures(TeamId(1), &target, 5);

        // Fixtures on days 6, 5, 4, 3, 2 (day 7 is not strictly earlier)
        let ids: Vec<i64> = recent.iter().map(|f| f.id.0).collect();
        assert_eq!(ids, vec![6, 5, 4, 3, 2]);
    }

    #[test]
    fn test_unfinished_fixtures_ignored() {
        let fixtures = vec![
            Fixture::finished(FixtureId(1), TeamId(1), TeamId(2), day(1), Score::new(2, 2)),
            Fixture::scheduled(FixtureId(2), TeamId(1), TeamId(3), day(2)),
        ];
        let corpus = Corpus::new(&fixtures, &[]);
        let target = Fixture::scheduled(FixtureId(3), TeamId(1), TeamId(4), day(10));

        let recent = corpus.recent_fixtures(TeamId(1), &target, 5);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, FixtureId(1));
        assert!(corpus.recent_fixtures(TeamId(99), &target, 5).is_empty());
    }
}
