use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DistanceError {
    #[error("no distance with a walking time to compare")]
    NoCandidates,
}

/// How the single distance of a flattened row is chosen from a building's stations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistancePolicy {
    /// Shortest walking time, earliest string on ties.
    #[default]
    Nearest,
    /// First station in card order, whatever its walking time.
    First,
}

impl FromStr for DistancePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "first" => Ok(Self::First),
            other => anyhow::bail!("unknown distance policy {:?} (expected nearest|first)", other),
        }
    }
}

impl DistancePolicy {
    /// Picks the distance string for a building. Never fails: a building without
    /// any usable distance gets an empty string.
    pub fn select<S: AsRef<str>>(self, distances: &[S]) -> String {
        match self {
            Self::Nearest => select_nearest(distances)
                .map(str::to_string)
                .unwrap_or_default(),
            Self::First => distances
                .first()
                .map(|d| d.as_ref().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Walking minutes embedded in e.g. "ＪＲ山手線/渋谷駅 歩6分": the first run of ASCII digits.
pub fn walking_minutes(raw: &str) -> Option<u32> {
    DIGITS.find(raw)?.as_str().parse().ok()
}

/// Returns the raw string with the smallest walking time.
///
/// Strings without a digit run (the site renders "-" for unused station slots) are
/// skipped. Ties keep the earliest string.
pub fn select_nearest<S: AsRef<str>>(distances: &[S]) -> Result<&str, DistanceError> {
    let mut best: Option<(u32, &str)> = None;

    for raw in distances {
        let raw = raw.as_ref();
        let Some(minutes) = walking_minutes(raw) else {
            continue;
        };
        if best.map_or(true, |(m, _)| minutes < m) {
            best = Some((minutes, raw));
        }
    }

    best.map(|(_, raw)| raw).ok_or(DistanceError::NoCandidates)
}
