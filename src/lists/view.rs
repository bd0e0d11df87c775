//! Derived, side-effect free views over a list collection

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use super::item::List;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListSort {
    #[default]
    FavoritesFirst,
    NameAsc,
    NameDesc,
    SizeDesc,
}

impl ListSort {
    pub fn next(self) -> Self {
        match self {
            ListSort::FavoritesFirst => ListSort::NameAsc,
            ListSort::NameAsc => ListSort::NameDesc,
            ListSort::NameDesc => ListSort::SizeDesc,
            ListSort::SizeDesc => ListSort::FavoritesFirst,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListSort::FavoritesFirst => "favorites first",
            ListSort::NameAsc => "name A-Z",
            ListSort::NameDesc => "name Z-A",
            ListSort::SizeDesc => "largest first",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemSort {
    #[default]
    InsertionOrder,
    TitleAsc,
    TitleDesc,
}

impl ItemSort {
    pub fn next(self) -> Self {
        match self {
            ItemSort::InsertionOrder => ItemSort::TitleAsc,
            ItemSort::TitleAsc => ItemSort::TitleDesc,
            ItemSort::TitleDesc => ItemSort::InsertionOrder,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemSort::InsertionOrder => "added",
            ItemSort::TitleAsc => "title A-Z",
            ItemSort::TitleDesc => "title Z-A",
        }
    }
}

fn by_name(a: &List, b: &List) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

/// Indices into `lists` of the lists whose name contains `filter`
/// (case-insensitive), in `sort` order. Ties keep collection order.
pub fn ordered_indices(lists: &[List], filter: &str, sort: ListSort) -> Vec<usize> {
    let needle = filter.trim().to_lowercase();
    let mut indices: Vec<usize> = lists
        .iter()
        .enumerate()
        .filter(|(_, list)| needle.is_empty() || list.name.to_lowercase().contains(&needle))
        .map(|(i, _)| i)
        .collect();

    indices.sort_by(|&a, &b| {
        let (a, b) = (&lists[a], &lists[b]);
        match sort {
            ListSort::FavoritesFirst => b.favorite.cmp(&a.favorite),
            ListSort::NameAsc => by_name(a, b),
            ListSort::NameDesc => by_name(b, a),
            ListSort::SizeDesc => b.items.len().cmp(&a.items.len()),
        }
    });
    indices
}

/// Item positions of `list` in `sort` order
pub fn ordered_item_indices(list: &List, sort: ItemSort) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..list.items.len()).collect();
    match sort {
        ItemSort::InsertionOrder => {}
        ItemSort::TitleAsc => indices.sort_by_key(|&i| list.items[i].title_key()),
        ItemSort::TitleDesc => {
            indices.sort_by(|&a, &b| list.items[b].title_key().cmp(&list.items[a].title_key()))
        }
    }
    indices
}

/// Filtered, sorted copy of the collection with each list's items reordered
pub fn view(lists: &[List], filter: &str, list_sort: ListSort, item_sort: ItemSort) -> Vec<List> {
    ordered_indices(lists, filter, list_sort)
        .into_iter()
        .map(|i| {
            let list = &lists[i];
            let items = ordered_item_indices(list, item_sort)
                .into_iter()
                .map(|j| list.items[j].clone())
                .collect();
            List { items, ..list.clone() }
        })
        .collect()
}

/// Summary numbers for the admin panel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStats {
    pub lists: usize,
    pub items: usize,
    pub favorites: usize,
    pub empty_lists: usize,
    pub distinct_titles: usize,
    pub largest: Option<(String, usize)>,
}

pub fn stats(lists: &[List]) -> ListStats {
    let distinct: HashSet<String> = lists
        .iter()
        .flat_map(|list| list.items.iter().map(|item| item.title_key()))
        .collect();

    let largest = lists
        .iter()
        .filter(|list| !list.items.is_empty())
        .fold(None::<&List>, |best, list| match best {
            Some(b) if b.items.len() >= list.items.len() => Some(b),
            _ => Some(list),
        })
        .map(|list| (list.name.clone(), list.items.len()));

    ListStats {
        lists: lists.len(),
        items: lists.iter().map(|l| l.items.len()).sum(),
        favorites: lists.iter().filter(|l| l.favorite).count(),
        empty_lists: lists.iter().filter(|l| l.items.is_empty()).count(),
        distinct_titles: distinct.len(),
        largest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lists::item::Item;

    fn list(name: &str, titles: &[&str], favorite: bool) -> List {
        List {
            name: name.to_string(),
            items: titles.iter().map(|t| Item::plain(*t)).collect(),
            favorite,
            created_at: 0,
        }
    }

    fn names(lists: &[List]) -> Vec<&str> {
        lists.iter().map(|l| l.name.as_str()).collect()
    }

    fn sample() -> Vec<List> {
        vec![
            list("horror", &["Alien"], false),
            list("Action", &["Heat", "Ronin", "Drive"], false),
            list("Comfort", &[], true),
            list("Action Copy", &["Heat", "Ronin"], true),
        ]
    }

    #[test]
    fn test_sort_orders() {
        let lists = sample();
        let none = ItemSort::InsertionOrder;
        assert_eq!(
            names(&view(&lists, "", ListSort::FavoritesFirst, none)),
            vec!["Comfort", "Action Copy", "horror", "Action"]
        );
        assert_eq!(
            names(&view(&lists, "", ListSort::NameAsc, none)),
            vec!["Action", "Action Copy", "Comfort", "horror"]
        );
        assert_eq!(
            names(&view(&lists, "", ListSort::NameDesc, none)),
            vec!["horror", "Comfort", "Action Copy", "Action"]
        );
        assert_eq!(
            names(&view(&lists, "", ListSort::SizeDesc, none)),
            vec!["Action", "Action Copy", "horror", "Comfort"]
        );
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let lists = sample();
        let filtered = view(&lists, "ACTION", ListSort::NameAsc, ItemSort::InsertionOrder);
        assert_eq!(names(&filtered), vec!["Action", "Action Copy"]);
        assert!(view(&lists, "zzz", ListSort::NameAsc, ItemSort::InsertionOrder).is_empty());
    }

    #[test]
    fn test_item_sort_does_not_touch_source() {
        let lists = sample();
        let sorted = view(&lists, "Action", ListSort::NameAsc, ItemSort::TitleAsc);
        let titles: Vec<&str> = sorted[0].items.iter().map(|i| i.title()).collect();
        assert_eq!(titles, vec!["Drive", "Heat", "Ronin"]);

        let desc = view(&lists, "Action", ListSort::NameAsc, ItemSort::TitleDesc);
        let titles: Vec<&str> = desc[0].items.iter().map(|i| i.title()).collect();
        assert_eq!(titles, vec!["Ronin", "Heat", "Drive"]);

        assert_eq!(lists[1].items[0].title(), "Heat");
    }

    #[test]
    fn test_stats() {
        let s = stats(&sample());
        assert_eq!(s.lists, 4);
        assert_eq!(s.items, 6);
        assert_eq!(s.favorites, 2);
        assert_eq!(s.empty_lists, 1);
        assert_eq!(s.distinct_titles, 4);
        assert_eq!(s.largest, Some(("Action".to_string(), 3)));
        assert_eq!(stats(&[]), ListStats::default());
    }
}
