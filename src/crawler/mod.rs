use std::sync::Mutex;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::crawler::distance::DistancePolicy;
use crate::crawler::models::{Building, Line, PageContext, Property, Station};
use crate::error::{CrawlError, CrawlFailure, FetchError, Stage};

pub mod distance;
pub mod fetcher;
pub mod flatten;
pub mod models;
pub mod parser;
pub mod service;

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Listing page size, sent as the `rn` query parameter.
    pub page_size: u32,
    /// Max fetches in flight across the whole run.
    pub concurrency: usize,
    /// Pause after every fetch, while still holding the fetch slot.
    pub delay: Duration,
    /// Overall budget for the run, measured from `Crawler::new`.
    pub deadline: Option<Duration>,
    pub strict: bool,
    pub distance_policy: DistancePolicy,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            concurrency: 4,
            delay: Duration::from_millis(300),
            deadline: None,
            strict: false,
            distance_policy: DistancePolicy::Nearest,
        }
    }
}

/// Results of a crawl unit, in traversal order.
#[derive(Debug, Default)]
pub struct Harvest {
    pub buildings: Vec<Building>,
    pub properties: Vec<Property>,
    pub failures: Vec<CrawlFailure>,
    pub pages: usize,
}

impl Harvest {
    fn failed(failure: CrawlFailure) -> Self {
        Self {
            failures: vec![failure],
            ..Default::default()
        }
    }

    pub fn merge(mut self, other: Harvest) -> Self {
        self.buildings.extend(other.buildings);
        self.properties.extend(other.properties);
        self.failures.extend(other.failures);
        self.pages += other.pages;
        self
    }

    pub fn room_count(&self) -> usize {
        self.buildings.iter().map(|b| b.rooms.len()).sum()
    }
}

async fn merge(acc: Harvest, next: Harvest) -> Result<Harvest, CrawlError> {
    Ok(acc.merge(next))
}

/// Line index page of a prefecture, e.g. `https://suumo.jp/chintai/tokyo/ensen/`.
pub fn prefecture_url(site_url: &str, prefecture: &str) -> String {
    format!("{}/chintai/{}/ensen/", site_url.trim_end_matches('/'), prefecture)
}

/// Listing URL for one page: base url plus `page` and `rn` (zero padded page size).
/// Any `page`/`rn` already on the base url are replaced, other parameters are kept.
pub fn page_url(base: &str, page: u32, page_size: u32) -> Result<String, FetchError> {
    let mut url = parse_url(base)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "page" && k != "rn")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    url.query_pairs_mut()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string())
        .append_pair("rn", &format!("{page_size:04}"));
    Ok(url.to_string())
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw).map_err(|source| FetchError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

pub struct Crawler<S> {
    source: S,
    opts: CrawlOptions,
    permits: Semaphore,
    deadline: Option<Instant>,
    aborted: Mutex<Option<CrawlFailure>>,
}

impl<S: fetcher::PageSource> Crawler<S> {
    pub fn new(source: S, opts: CrawlOptions) -> Self {
        let permits = Semaphore::new(opts.concurrency.max(1));
        let deadline = opts.deadline.map(|d| Instant::now() + d);
        Self {
            source,
            opts,
            permits,
            deadline,
            aborted: Mutex::new(None),
        }
    }

    fn width(&self) -> usize {
        self.opts.concurrency.max(1)
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Cancelled {
                url: url.to_string(),
            })?;

        let fetched = match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                return Err(FetchError::DeadlineExceeded {
                    url: url.to_string(),
                })
            }
            Some(deadline) => timeout_at(deadline, self.source.fetch(url))
                .await
                .unwrap_or_else(|_| {
                    Err(FetchError::DeadlineExceeded {
                        url: url.to_string(),
                    })
                }),
            None => self.source.fetch(url).await,
        };

        // polite delay
        if !self.opts.delay.is_zero() {
            sleep(self.opts.delay).await;
        }

        fetched
    }

    /// Strict runs stop at the first failure, lenient runs keep it for the report.
    /// A strict abort closes the fetch pool, so siblings still waiting for a slot
    /// fail with `FetchError::Cancelled` instead of hitting the site. Those
    /// follow-on failures report the abort that caused them.
    fn settle(&self, failure: CrawlFailure) -> Result<Harvest, CrawlError> {
        if self.opts.strict {
            self.permits.close();
            let mut aborted = self.aborted.lock().unwrap_or_else(|e| e.into_inner());
            let cause = aborted.get_or_insert_with(|| {
                error!(%failure, "Aborting crawl");
                failure
            });
            return Err(CrawlError::Aborted(cause.clone()));
        }
        warn!(%failure, "Skipping failed unit");
        Ok(Harvest::failed(failure))
    }

    fn harvest(&self, buildings: Vec<Building>) -> Harvest {
        let properties = buildings
            .iter()
            .flat_map(|b| flatten::flatten(b, self.opts.distance_policy))
            .collect();

        Harvest {
            buildings,
            properties,
            failures: Vec::new(),
            pages: 1,
        }
    }

    pub async fn crawl_prefectures(
        &self,
        site_url: &str,
        prefectures: &[String],
    ) -> Result<Harvest, CrawlError> {
        stream::iter(prefectures)
            .map(|prefecture| self.crawl_prefecture(site_url, prefecture))
            .buffered(self.width())
            .try_fold(Harvest::default(), merge)
            .await
    }

    pub async fn crawl_prefecture(
        &self,
        site_url: &str,
        prefecture: &str,
    ) -> Result<Harvest, CrawlError> {
        let index_url = prefecture_url(site_url, prefecture);

        let lines = match self.discover_lines(&index_url).await {
            Ok(lines) => lines,
            Err(e) => {
                return self.settle(CrawlFailure {
                    stage: Stage::LineIndex {
                        prefecture: prefecture.to_string(),
                    },
                    url: index_url,
                    reason: e.to_string(),
                })
            }
        };

        info!(prefecture, lines = lines.len(), "Found lines");

        stream::iter(lines)
            .map(|line| self.crawl_line(line))
            .buffered(self.width())
            .try_fold(Harvest::default(), merge)
            .await
    }

    pub async fn discover_lines(&self, index_url: &str) -> Result<Vec<Line>, FetchError> {
        let base = parse_url(index_url)?;
        let html = self.fetch(index_url).await?;
        Ok(parser::extract_lines(&html, &base))
    }

    pub async fn discover_stations(&self, line_url: &str) -> Result<Vec<Station>, FetchError> {
        let base = parse_url(line_url)?;
        let html = self.fetch(line_url).await?;
        Ok(parser::extract_stations(&html, &base))
    }

    /// Crawls every station of a line. Stations are discovered from the line page
    /// when the line does not carry them yet.
    pub async fn crawl_line(&self, line: Line) -> Result<Harvest, CrawlError> {
        let line = if line.stations.is_empty() {
            match self.discover_stations(&line.url).await {
                Ok(stations) => Line { stations, ..line },
                Err(e) => {
                    return self.settle(CrawlFailure {
                        stage: Stage::StationIndex { line: line.name },
                        url: line.url,
                        reason: e.to_string(),
                    })
                }
            }
        } else {
            line
        };

        info!(line = %line.name, stations = line.stations.len(), "Found stations");

        stream::iter(&line.stations)
            .map(|station| {
                self.crawl_listing(&station.url, PageContext::new(&line.name, &station.name))
            })
            .buffered(self.width())
            .try_fold(Harvest::default(), merge)
            .await
    }

    /// Walks all pages of one listing. Page 1 is fetched once and serves both the
    /// page count and its own cards.
    pub async fn crawl_listing(&self, base_url: &str, ctx: PageContext) -> Result<Harvest, CrawlError> {
        let first = match self.fetch_listing(base_url, 1, &ctx).await {
            Ok(page) => page,
            Err(failure) => return self.settle(failure),
        };

        if first.page_count == 0 {
            info!(line = %ctx.line, station = %ctx.station, "No results");
            return Ok(Harvest::default());
        }

        let first_page = self.harvest(first.buildings);

        let harvest = stream::iter(2..=first.page_count)
            .map(|page| self.crawl_page(base_url, page, &ctx))
            .buffered(self.width())
            .try_fold(first_page, merge)
            .await?;

        info!(
            line = %ctx.line,
            station = %ctx.station,
            pages = first.page_count,
            buildings = harvest.buildings.len(),
            properties = harvest.properties.len(),
            "Listing done"
        );

        Ok(harvest)
    }

    async fn crawl_page(
        &self,
        base_url: &str,
        page: u32,
        ctx: &PageContext,
    ) -> Result<Harvest, CrawlError> {
        match self.fetch_listing(base_url, page, ctx).await {
            Ok(listing) => {
                debug!(page, buildings = listing.buildings.len(), "Page parsed");
                Ok(self.harvest(listing.buildings))
            }
            Err(failure) => self.settle(failure),
        }
    }

    async fn fetch_listing(
        &self,
        base_url: &str,
        page: u32,
        ctx: &PageContext,
    ) -> Result<parser::ListingPage, CrawlFailure> {
        let failure = |url: &str, e: FetchError| CrawlFailure {
            stage: Stage::Listing {
                line: ctx.line.clone(),
                station: ctx.station.clone(),
                page,
            },
            url: url.to_string(),
            reason: e.to_string(),
        };

        let url = page_url(base_url, page, self.opts.page_size).map_err(|e| failure(base_url, e))?;
        let html = self.fetch(&url).await.map_err(|e| failure(&url, e))?;
        Ok(parser::parse_listing(&html, ctx))
    }
}
