use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::crawler::models::{Building, Line, PageContext, Room, Station};

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static CARD: LazyLock<Selector> = LazyLock::new(|| selector("div.cassetteitem"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("div.cassetteitem_content-title"));
static DISTANCE: LazyLock<Selector> =
    LazyLock::new(|| selector("li.cassetteitem_detail-col2 > div"));
// first div is the age, last div the building height
static AGE_HEIGHT: LazyLock<Selector> =
    LazyLock::new(|| selector("li.cassetteitem_detail-col3 > div"));
static ROOM_ROW: LazyLock<Selector> =
    LazyLock::new(|| selector("div.cassetteitem-item > table > tbody"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| selector("span.cassetteitem_price--rent"));
static ADMIN: LazyLock<Selector> =
    LazyLock::new(|| selector("span.cassetteitem_price--administration"));
static AREA: LazyLock<Selector> = LazyLock::new(|| selector("span.cassetteitem_menseki"));
static PAGINATION: LazyLock<Selector> =
    LazyLock::new(|| selector("div.pagination.pagination_set-nav > ol > li"));
static LINE_LINK: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[href*="/en_"]"#));
static STATION_LINK: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[href*="/ek_"]"#));

/// Everything read from one listing page.
#[derive(Debug, Default)]
pub struct ListingPage {
    pub page_count: u32,
    pub buildings: Vec<Building>,
}

pub fn parse_listing(html: &str, ctx: &PageContext) -> ListingPage {
    let doc = Html::parse_document(html);
    ListingPage {
        page_count: page_count(&doc),
        buildings: extract_buildings(&doc, ctx),
    }
}

/// Visible text with whitespace runs collapsed.
fn text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> String {
    scope.select(sel).next().map(text).unwrap_or_default()
}

/// Last page number from the pagination bar. No bar, or a non-numeric last entry,
/// means the listing has no results.
pub fn page_count(doc: &Html) -> u32 {
    doc.select(&PAGINATION)
        .last()
        .and_then(|li| text(li).parse().ok())
        .unwrap_or(0)
}

pub fn extract_buildings(doc: &Html, ctx: &PageContext) -> Vec<Building> {
    doc.select(&CARD).map(|card| extract_card(card, ctx)).collect()
}

fn extract_card(card: ElementRef<'_>, ctx: &PageContext) -> Building {
    let distances = card.select(&DISTANCE).map(text).collect();

    let labels: Vec<String> = card.select(&AGE_HEIGHT).map(text).collect();
    let age = labels.first().cloned().unwrap_or_default();
    let height = labels.last().cloned().unwrap_or_default();

    let rooms = card
        .select(&ROOM_ROW)
        .map(|row| Room {
            price: first_text(row, &PRICE),
            admin: first_text(row, &ADMIN),
            area: first_text(row, &AREA),
        })
        .collect();

    Building {
        line: ctx.line.clone(),
        station: ctx.station.clone(),
        name: first_text(card, &TITLE),
        age,
        height,
        distances,
        rooms,
    }
}

/// (name, absolute url) for every matching anchor, first occurrence of each url only.
fn extract_links(doc: &Html, sel: &Selector, page_url: &Url) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for a in doc.select(sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Ok(url) = page_url.join(href) else {
            continue;
        };
        let name = text(a);
        if name.is_empty() {
            continue;
        }
        let url = url.to_string();
        if seen.insert(url.clone()) {
            links.push((name, url));
        }
    }

    links
}

/// Lines listed on a prefecture's line index. Stations are filled in later.
pub fn extract_lines(html: &str, page_url: &Url) -> Vec<Line> {
    let doc = Html::parse_document(html);
    extract_links(&doc, &LINE_LINK, page_url)
        .into_iter()
        .map(|(name, url)| Line {
            name,
            url,
            stations: Vec::new(),
        })
        .collect()
}

pub fn extract_stations(html: &str, page_url: &Url) -> Vec<Station> {
    let doc = Html::parse_document(html);
    extract_links(&doc, &STATION_LINK, page_url)
        .into_iter()
        .map(|(name, url)| Station { name, url })
        .collect()
}
