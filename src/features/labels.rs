//! Ground-truth labels for the three prediction tasks

use crate::{Fixture, FootyError, Result};

/// Full-time result from the home side's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

impl Outcome {
    /// Index into the one-hot outcome encoding
    pub fn index(&self) -> usize {
        match self {
            Outcome::HomeWin => 0,
            Outcome::Draw => 1,
            Outcome::AwayWin => 2,
        }
    }
}

/// Labels for one finished fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub outcome: Outcome,
    /// Both teams scored at least once
    pub btts: bool,
    /// Three or more goals in total
    pub over_2_5: bool,
}

impl Label {
    pub const DIM: usize = 5;

    /// Encode a finished fixture's final score
    pub fn from_fixture(fixture: &Fixture) -> Result<Self> {
        if !fixture.is_finished() {
            return Err(FootyError::FixtureNotFinished(fixture.id));
        }
        let score = fixture.score.ok_or(FootyError::MissingScore(fixture.id))?;

        let outcome = match score.home.cmp(&score.away) {
            std::cmp::Ordering::Greater => Outcome::HomeWin,
            std::cmp::Ordering::Equal => Outcome::Draw,
            std::cmp::Ordering::Less => Outcome::AwayWin,
        };

        Ok(Label {
            outcome,
            btts: score.home >= 1 && score.away >= 1,
            over_2_5: score.total() >= 3,
        })
    }

    /// `[home, draw, away, btts, over]`
    pub fn to_vec(&self) -> [f32; Label::DIM] {
        let mut v = [0.0; Label::DIM];
        v[self.outcome.index()] = 1.0;
        v[3] = if self.btts { 1.0 } else { 0.0 };
        v[4] = if self.over_2_5 { 1.0 } else { 0.0 };
        v
    }
}

/// Turns finished fixtures into training labels
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelEncoder;

impl LabelEncoder {
    pub fn encode(&self, fixture: &Fixture) -> Result<Label> {
        Label::from_fixture(fixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixtureId, Score, TeamId};
    use chrono::NaiveDate;

    fn finished(home: u8, away: u8) -> Fixture {
        Fixture::finished(
            FixtureId(1),
            TeamId(1),
            TeamId(2),
            NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(19, 45, 0)
                .unwrap(),
            Score::new(home, away),
        )
    }

    #[test]
    fn test_outcome_encoding() {
        assert_eq!(Label::from_fixture(&finished(2, 1)).unwrap().to_vec(), [1.0, 0.0, 0.0, 1.0, 1.0]);
        assert_eq!(Label::from_fixture(&finished(0, 0)).unwrap().to_vec(), [0.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(Label::from_fixture(&finished(0, 2)).unwrap().to_vec(), [0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(Label::from_fixture(&finished(3, 0)).unwrap().to_vec(), [1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_label_properties_over_score_grid() {
        for home in 0..=6u8 {
            for away in 0..=6u8 {
                let label = Label::from_fixture(&finished(home, away)).unwrap();
                let v = label.to_vec();

                let ones = v[..3].iter().filter(|x| **x == 1.0).count();
                assert_eq!(ones, 1, "exactly one outcome for {}-{}", home, away);
                assert_eq!(label.btts, home >= 1 && away >= 1);
                assert_eq!(label.over_2_5, home as u16 + away as u16 >= 3);
            }
        }
    }

    #[test]
    fn test_unfinished_fixture_rejected() {
        let mut fixture = finished(1, 0);
        fixture.score = None;
        assert!(matches!(Label::from_fixture(&fixture), Err(FootyError::MissingScore(_))));

        let upcoming = Fixture::scheduled(FixtureId(2), TeamId(1), TeamId(2), fixture.kickoff);
        assert!(matches!(
            Label::from_fixture(&upcoming),
            Err(FootyError::FixtureNotFinished(_))
        ));
    }
}
