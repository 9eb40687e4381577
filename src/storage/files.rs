use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::crawler::models::{Building, Property, PROPERTY_COLUMNS};
use crate::crawler::Harvest;

pub const BUILDINGS_FILE: &str = "buildings.json";
pub const PROPERTIES_FILE: &str = "properties.csv";
pub const FAILURES_FILE: &str = "failures.json";

/// Writes the run's exports into one directory.
pub struct OutputSink {
    dir: PathBuf,
}

impl OutputSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub async fn write(&self, harvest: &Harvest) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let mut written = Vec::new();

        let path = self.dir.join(BUILDINGS_FILE);
        write_file(&path, buildings_json(&harvest.buildings)?).await?;
        written.push(path);

        let path = self.dir.join(PROPERTIES_FILE);
        write_file(&path, properties_csv(&harvest.properties)?).await?;
        written.push(path);

        if !harvest.failures.is_empty() {
            let path = self.dir.join(FAILURES_FILE);
            write_file(&path, serde_json::to_vec_pretty(&harvest.failures)?).await?;
            written.push(path);
        }

        Ok(written)
    }
}

async fn write_file(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let len = bytes.len();
    fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = len, "Wrote export");
    Ok(())
}

/// Nested export: one object per building with its rooms inline.
pub fn buildings_json(buildings: &[Building]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(buildings)?)
}

/// Flat export: header row first, even when there are no rows.
pub fn properties_csv(properties: &[Property]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    wtr.write_record(PROPERTY_COLUMNS)?;
    for property in properties {
        wtr.serialize(property)?;
    }

    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("flushing csv: {}", e.error()))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::crawler::models::Room;
    use crate::error::{CrawlFailure, Stage};

    pub fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("chintai-crawler-{tag}-{}-{nanos}", std::process::id()))
    }

    fn property(name: &str) -> Property {
        Property {
            line: "ＪＲ山手線".into(),
            station: "渋谷".into(),
            name: name.into(),
            age: "築3年".into(),
            height: "10階建".into(),
            distance: "ＪＲ山手線/渋谷駅 歩4分".into(),
            price: "12.5万円".into(),
            admin: "10000円".into(),
            area: "30.2m2".into(),
        }
    }

    #[test]
    fn csv_columns_are_stable() {
        let bytes = properties_csv(&[property("Tower, East"), property("Villa")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "line,station,name,age,height,distance,price,admin,area");
        assert_eq!(
            lines[1],
            "ＪＲ山手線,渋谷,\"Tower, East\",築3年,10階建,ＪＲ山手線/渋谷駅 歩4分,12.5万円,10000円,30.2m2"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_csv_has_header_only() {
        let text = String::from_utf8(properties_csv(&[]).unwrap()).unwrap();
        assert_eq!(text, "line,station,name,age,height,distance,price,admin,area\n");
    }

    #[test]
    fn json_nests_rooms() {
        let b = Building {
            name: "Villa".into(),
            distances: vec!["—".into()],
            rooms: vec![Room {
                price: "7万円".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let value: serde_json::Value =
            serde_json::from_slice(&buildings_json(&[b]).unwrap()).unwrap();
        assert_eq!(value[0]["name"], "Villa");
        assert_eq!(value[0]["distances"][0], "—");
        assert_eq!(value[0]["rooms"][0]["price"], "7万円");
        assert_eq!(value[0]["rooms"][0]["admin"], "");
    }

    #[tokio::test]
    async fn failures_file_only_when_needed() {
        let dir = scratch_dir("sink");
        let sink = OutputSink::new(&dir);

        let written = sink.write(&Harvest::default()).await.unwrap();
        assert_eq!(written.len(), 2);
        assert!(!dir.join(FAILURES_FILE).exists());

        let harvest = Harvest {
            failures: vec![CrawlFailure {
                stage: Stage::Listing {
                    line: "".into(),
                    station: "".into(),
                    page: 4,
                },
                url: "https://suumo.jp/chintai/tokyo/ek_27580/?page=4&rn=0020".into(),
                reason: "timed out".into(),
            }],
            ..Default::default()
        };
        let written = sink.write(&harvest).await.unwrap();
        assert_eq!(written.last(), Some(&dir.join(FAILURES_FILE)));

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.join(FAILURES_FILE)).unwrap()).unwrap();
        assert_eq!(value[0]["stage"], "listing");
        assert_eq!(value[0]["page"], 4);
        assert_eq!(value[0]["reason"], "timed out");
    }
}
