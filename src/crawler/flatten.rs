use crate::crawler::distance::DistancePolicy;
use crate::crawler::models::{Building, Property};

/// One row per room, with the building's fields repeated on each.
pub fn flatten(building: &Building, policy: DistancePolicy) -> Vec<Property> {
    if building.rooms.is_empty() {
        return Vec::new();
    }

    let distance = policy.select(&building.distances);

    building
        .rooms
        .iter()
        .map(|room| Property {
            line: building.line.clone(),
            station: building.station.clone(),
            name: building.name.clone(),
            age: building.age.clone(),
            height: building.height.clone(),
            distance: distance.clone(),
            price: room.price.clone(),
            admin: room.admin.clone(),
            area: room.area.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::models::Room;

    fn building(rooms: usize, distances: &[&str]) -> Building {
        Building {
            line: "山手線".into(),
            station: "渋谷".into(),
            name: "Maison Shibuya".into(),
            age: "築12年".into(),
            height: "5階建".into(),
            distances: distances.iter().map(|d| d.to_string()).collect(),
            rooms: (0..rooms)
                .map(|i| Room {
                    price: format!("{}万円", 8 + i),
                    admin: "5000円".into(),
                    area: format!("{}m2", 20 + i),
                })
                .collect(),
        }
    }

    #[test]
    fn one_property_per_room() {
        let b = building(3, &["A 歩10分", "B 歩4分", "C 歩7分"]);
        let rows = flatten(&b, DistancePolicy::Nearest);

        assert_eq!(rows.len(), 3);
        for (row, room) in rows.iter().zip(&b.rooms) {
            assert_eq!(row.line, "山手線");
            assert_eq!(row.station, "渋谷");
            assert_eq!(row.name, "Maison Shibuya");
            assert_eq!(row.age, "築12年");
            assert_eq!(row.height, "5階建");
            assert_eq!(row.distance, "B 歩4分");
            assert_eq!(row.price, room.price);
            assert_eq!(row.admin, room.admin);
            assert_eq!(row.area, room.area);
        }
    }

    #[test]
    fn no_rooms_no_rows() {
        assert!(flatten(&building(0, &["A 歩1分"]), DistancePolicy::Nearest).is_empty());
    }

    #[test]
    fn unusable_distances_become_empty() {
        let rows = flatten(&building(2, &["—", "—"]), DistancePolicy::Nearest);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.distance.is_empty()));

        let rows = flatten(&building(1, &[]), DistancePolicy::Nearest);
        assert_eq!(rows[0].distance, "");
    }

    #[test]
    fn first_policy_keeps_card_order() {
        let rows = flatten(&building(1, &["A 歩10分", "B 歩4分"]), DistancePolicy::First);
        assert_eq!(rows[0].distance, "A 歩10分");
    }
}
