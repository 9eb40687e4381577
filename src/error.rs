use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} not fetched: crawl deadline exceeded")]
    DeadlineExceeded { url: String },

    #[error("{url} not fetched: fetch pool closed")]
    Cancelled { url: String },
}

/// Where in the traversal a unit of work failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    LineIndex { prefecture: String },
    StationIndex { line: String },
    Listing { line: String, station: String, page: u32 },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::LineIndex { prefecture } => write!(f, "line index of {prefecture}"),
            Stage::StationIndex { line } => write!(f, "station index of line {line:?}"),
            Stage::Listing {
                line,
                station,
                page,
            } => write!(f, "page {page} of {line:?}/{station:?}"),
        }
    }
}

/// A skipped unit of work, kept for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlFailure {
    #[serde(flatten)]
    pub stage: Stage,
    pub url: String,
    pub reason: String,
}

impl fmt::Display for CrawlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.stage, self.url, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("crawl aborted at {0}")]
    Aborted(CrawlFailure),
}
