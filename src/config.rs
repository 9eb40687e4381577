use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::crawler::distance::DistancePolicy;

pub struct Config {
    pub site_url: String,
    pub prefectures: Vec<String>,
    pub page_size: u32,
    pub delay: Duration,
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub deadline: Option<Duration>,
    pub strict: bool,
    pub distance_policy: DistancePolicy,
    pub output_dir: PathBuf,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: "https://suumo.jp".to_string(),
            prefectures: vec!["tokyo".to_string()],
            page_size: 20,
            delay: Duration::from_millis(300),
            concurrency: 4,
            fetch_timeout: Duration::from_secs(30),
            deadline: None,
            strict: false,
            distance_policy: DistancePolicy::Nearest,
            output_dir: PathBuf::from("out"),
            user_agent: "chintai-crawler/0.1".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Every key is optional; a present but malformed value is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let d = Self::default();

        Ok(Self {
            site_url: lookup("SITE_URL").unwrap_or(d.site_url),
            prefectures: lookup("PREFECTURES")
                .map(|v| split_list(&v))
                .unwrap_or(d.prefectures),
            page_size: parse_var(&lookup, "PAGE_SIZE")?.unwrap_or(d.page_size),
            delay: parse_var(&lookup, "DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(d.delay),
            concurrency: parse_var(&lookup, "CONCURRENCY")?.unwrap_or(d.concurrency),
            fetch_timeout: parse_var(&lookup, "FETCH_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(d.fetch_timeout),
            deadline: parse_var(&lookup, "CRAWL_DEADLINE_SECS")?.map(Duration::from_secs),
            strict: parse_var(&lookup, "STRICT")?.unwrap_or(d.strict),
            distance_policy: parse_var(&lookup, "DISTANCE_POLICY")?.unwrap_or(d.distance_policy),
            output_dir: lookup("OUTPUT_DIR").map(PathBuf::from).unwrap_or(d.output_dir),
            user_agent: lookup("USER_AGENT").unwrap_or(d.user_agent),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
