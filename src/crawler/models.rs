use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub name: String,
    pub url: String,
    pub stations: Vec<Station>,
}

/// Line and station names stamped onto every building read from one listing page.
/// Both are empty when crawling a single fixed listing root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub line: String,
    pub station: String,
}

impl PageContext {
    pub fn new(line: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            station: station.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Room {
    pub price: String,
    pub admin: String,
    pub area: String,
}

/// One listing card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Building {
    pub line: String,
    pub station: String,
    pub name: String,
    pub age: String,
    pub height: String,
    /// Raw "distance from station" strings in site order, one per nearby station.
    pub distances: Vec<String>,
    pub rooms: Vec<Room>,
}

/// One row of the flattened export. Field order is the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Property {
    pub line: String,
    pub station: String,
    pub name: String,
    pub age: String,
    pub height: String,
    pub distance: String,
    pub price: String,
    pub admin: String,
    pub area: String,
}

pub const PROPERTY_COLUMNS: [&str; 9] = [
    "line", "station", "name", "age", "height", "distance", "price", "admin", "area",
];
