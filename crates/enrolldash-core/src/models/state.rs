use serde::{Deserialize, Serialize};

/// Where the coordinator is in its refresh cycle.
///
/// `Idle -> Loading -> Idle | Error` on a first load, `Idle -> Refreshing ->
/// Idle | Error` once data exists, and `Error -> Loading | Refreshing` on the
/// next refresh. There is no terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Refreshing,
    Error,
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(self, FetchState::Refreshing)
    }

    /// True while a fetch is in flight.
    pub fn is_busy(&self) -> bool {
        self.is_loading() || self.is_refreshing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_state_flags() {
        assert!(FetchState::Loading.is_loading());
        assert!(!FetchState::Loading.is_refreshing());
        assert!(FetchState::Refreshing.is_refreshing());
        assert!(FetchState::Refreshing.is_busy());
        assert!(!FetchState::Idle.is_busy());
        assert!(!FetchState::Error.is_busy());
    }

    #[test]
    fn test_fetch_state_default_is_idle() {
        assert_eq!(FetchState::default(), FetchState::Idle);
    }
}
