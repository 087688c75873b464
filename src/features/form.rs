//! Team form computation
//!
//! Rolling points and goal averages over a team's recent finished fixtures.

use crate::{Fixture, TeamId};

/// Form of a team over a window of finished fixtures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamForm {
    /// Fixtures in the window
    pub matches_played: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    /// Goals scored by the team
    pub goals_for: u32,
    /// Goals conceded by the team
    pub goals_against: u32,
}

impl TeamForm {
    /// Create new empty form
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute form from a window of fixtures, from `team`'s perspective
    pub fn from_fixtures(window: &[&Fixture], team: TeamId) -> Self {
        let mut form = TeamForm::new();
        for fixture in window {
            form.update(fixture, team);
        }
        form
    }

    /// Update form with a fixture result. Fixtures without a score, or not
    /// involving the team, are ignored.
    pub fn update(&mut self, fixture: &Fixture, team: TeamId) {
        let (Some(scored), Some(conceded)) = (fixture.goals_for(team), fixture.goals_against(team))
        else {
            return;
        };

        self.matches_played += 1;
        self.goals_for += scored as u32;
        self.goals_against += conceded as u32;

        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => self.wins += 1,
            std::cmp::Ordering::Equal => self.draws += 1,
            std::cmp::Ordering::Less => self.losses += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches_played == 0
    }

    /// League points: 3 per win, 1 per draw
    pub fn points(&self) -> u32 {
        3 * self.wins as u32 + self.draws as u32
    }

    /// Average goals scored per fixture (0 for an empty window)
    pub fn avg_goals_for(&self) -> f32 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.goals_for as f32 / self.matches_played as f32
        }
    }

    /// Average goals conceded per fixture (0 for an empty window)
    pub fn avg_goals_against(&self) -> f32 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.goals_against as f32 / self.matches_played as f32
        }
    }
}
