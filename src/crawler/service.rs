use std::path::PathBuf;

use tracing::{info, warn};

use crate::{
    config::Config,
    crawler::{
        fetcher::PageSource,
        models::{Line, PageContext},
        CrawlOptions, Crawler, Harvest,
    },
    storage::files::OutputSink,
};

/// What one run walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlTarget {
    /// A single listing root; buildings carry no line/station names.
    Station { url: String },
    /// One line page; its stations are discovered.
    Line { url: String, name: String },
    /// Full walk from each prefecture's line index.
    Prefectures(Vec<String>),
}

pub struct RunSummary {
    pub buildings: usize,
    pub properties: usize,
    pub pages: usize,
    pub failures: usize,
    pub files_written: Vec<PathBuf>,
}

pub struct ScrapingService<S> {
    crawler: Crawler<S>,
    site_url: String,
    sink: OutputSink,
}

impl<S: PageSource> ScrapingService<S> {
    pub fn new(cfg: &Config, source: S) -> Self {
        let opts = CrawlOptions {
            page_size: cfg.page_size,
            concurrency: cfg.concurrency,
            delay: cfg.delay,
            deadline: cfg.deadline,
            strict: cfg.strict,
            distance_policy: cfg.distance_policy,
        };

        Self {
            crawler: Crawler::new(source, opts),
            site_url: cfg.site_url.clone(),
            sink: OutputSink::new(&cfg.output_dir),
        }
    }

    pub async fn crawl(&self, target: &CrawlTarget) -> anyhow::Result<Harvest> {
        let harvest = match target {
            CrawlTarget::Station { url } => {
                info!(url = %url, "Crawling single listing");
                self.crawler
                    .crawl_listing(url, PageContext::default())
                    .await?
            }
            CrawlTarget::Line { url, name } => {
                info!(url = %url, line = %name, "Crawling line");
                self.crawler
                    .crawl_line(Line {
                        name: name.clone(),
                        url: url.clone(),
                        stations: Vec::new(),
                    })
                    .await?
            }
            CrawlTarget::Prefectures(prefectures) => {
                info!(?prefectures, "Crawling prefectures");
                self.crawler
                    .crawl_prefectures(&self.site_url, prefectures)
                    .await?
            }
        };
        Ok(harvest)
    }

    pub async fn run(&self, target: &CrawlTarget) -> anyhow::Result<RunSummary> {
        let harvest = self.crawl(target).await?;

        if !harvest.failures.is_empty() {
            warn!(
                failures = harvest.failures.len(),
                "Some units were not crawled, see failures.json"
            );
        }

        let files_written = self.sink.write(&harvest).await?;

        info!(
            buildings = harvest.buildings.len(),
            properties = harvest.properties.len(),
            rooms = harvest.room_count(),
            pages = harvest.pages,
            failures = harvest.failures.len(),
            "DONE: crawl finished"
        );

        Ok(RunSummary {
            buildings: harvest.buildings.len(),
            properties: harvest.properties.len(),
            pages: harvest.pages,
            failures: harvest.failures.len(),
            files_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::crawler::tests::{links, listing, page, StaticSource, SITE};
    use crate::storage::files::tests::scratch_dir;

    fn config(out: PathBuf) -> Config {
        Config {
            site_url: SITE.to_string(),
            delay: Duration::ZERO,
            output_dir: out,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn line_run_writes_both_exports() {
        let out = scratch_dir("service-line");
        let line_url = format!("{SITE}/chintai/tokyo/en_a/");
        let s1 = format!("{SITE}/chintai/tokyo/ek_001/");
        let source = StaticSource::default()
            .page(&line_url, links(&[("/chintai/tokyo/ek_001/", "S1")]))
            .page(page(&s1, 1), listing(&[("A", 2), ("B", 1)], Some(1)));

        let service = ScrapingService::new(&config(out.clone()), source);
        let summary = service
            .run(&CrawlTarget::Line {
                url: line_url,
                name: "A線".into(),
            })
            .await
            .unwrap();

        assert_eq!(summary.buildings, 2);
        assert_eq!(summary.properties, 3);
        assert_eq!(summary.failures, 0);
        assert_eq!(
            summary.files_written,
            vec![out.join("buildings.json"), out.join("properties.csv")]
        );

        let csv = std::fs::read_to_string(out.join("properties.csv")).unwrap();
        let mut rows = csv.lines();
        assert_eq!(rows.next(), Some("line,station,name,age,height,distance,price,admin,area"));
        assert_eq!(rows.next(), Some("A線,S1,A,築5年,3階建,駅B 歩2分,5万円,3000円,20m2"));
        assert_eq!(rows.count(), 2);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("buildings.json")).unwrap())
                .unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["rooms"].as_array().unwrap().len(), 2);
        assert_eq!(json[0]["line"], "A線");
    }

    #[tokio::test]
    async fn strict_run_returns_error() {
        let out = scratch_dir("service-strict");
        let cfg = Config {
            strict: true,
            ..config(out.clone())
        };
        let service = ScrapingService::new(&cfg, StaticSource::default());

        let err = service
            .run(&CrawlTarget::Prefectures(vec!["tokyo".into()]))
            .await
            .err()
            .unwrap();

        assert!(err.to_string().contains("crawl aborted"));
        assert!(!out.join("properties.csv").exists());
    }

    #[tokio::test]
    async fn lenient_run_reports_failures() {
        let out = scratch_dir("service-lenient");
        let service = ScrapingService::new(&config(out.clone()), StaticSource::default());

        let summary = service
            .run(&CrawlTarget::Station {
                url: format!("{SITE}/chintai/tokyo/ek_001/"),
            })
            .await
            .unwrap();

        assert_eq!(summary.failures, 1);
        assert_eq!(summary.properties, 0);
        assert!(out.join("failures.json").exists());
        // header is still written for an empty run
        let csv = std::fs::read_to_string(out.join("properties.csv")).unwrap();
        assert_eq!(csv.trim_end(), "line,station,name,age,height,distance,price,admin,area");
    }
}
