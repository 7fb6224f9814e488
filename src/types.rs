
// ---------------------------------------------------------------------------
// TeamStat
// ---------------------------------------------------------------------------

/// One team's season standings, as written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamStat {
    /// Partition key. Unique within one fetch.
    pub team_id: i64,
    pub team_name: String,
    pub wins: u32,
    pub losses: u32,
    pub points_per_game_for: f64,
    pub points_per_game_against: f64,
    pub details: TeamDetails,
}

/// Standings columns SportsDataIO returns alongside the core record.
/// Absent or null provider fields stay `None` and are not stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamDetails {
    /// Team abbreviation, e.g. "LAL".
    pub key: Option<String>,
    pub conference: Option<String>,
    pub division: Option<String>,
    pub percentage: Option<f64>,
    pub home_wins: Option<u32>,
    pub home_losses: Option<u32>,
    pub away_wins: Option<u32>,
    pub away_losses: Option<u32>,
    pub last_ten_wins: Option<u32>,
    pub last_ten_losses: Option<u32>,
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// Run lifecycle: Started → Fetched → Transformed → Written, or Failed from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Started,
    Fetched,
    Transformed,
    Written,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Written | PipelineState::Failed)
    }

    /// The state a successful step moves to. Terminal states have no successor.
    pub fn next(self) -> Option<PipelineState> {
        match self {
            PipelineState::Started => Some(PipelineState::Fetched),
            PipelineState::Fetched => Some(PipelineState::Transformed),
            PipelineState::Transformed => Some(PipelineState::Written),
            PipelineState::Written | PipelineState::Failed => None,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Started => "STARTED",
            PipelineState::Fetched => "FETCHED",
            PipelineState::Transformed => "TRANSFORMED",
            PipelineState::Written => "WRITTEN",
            PipelineState::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_all_states() {
        let mut state = PipelineState::Started;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                PipelineState::Started,
                PipelineState::Fetched,
                PipelineState::Transformed,
                PipelineState::Written,
            ]
        );
        assert!(state.is_terminal());
    }

    #[test]
    fn failed_is_terminal() {
        assert!(PipelineState::Failed.is_terminal());
        assert!(PipelineState::Failed.next().is_none());
        assert!(!PipelineState::Fetched.is_terminal());
    }

    #[test]
    fn display_uses_upper_case_names() {
        assert_eq!(PipelineState::Transformed.to_string(), "TRANSFORMED");
        assert_eq!(PipelineState::Failed.to_string(), "FAILED");
    }
}
