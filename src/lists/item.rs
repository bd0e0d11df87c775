use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A list entry: either a bare title or an object carrying a title plus
/// whatever metadata came with it (poster path, year, rating...).
///
/// On the wire a plain item is a JSON string and a rich item is an object
/// with a `title` field. Objects that only carry `name` (TV shows) are
/// accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Item {
    PlainTitle(String),
    RichItem { title: String, metadata: Map<String, Value> },
}

impl Item {
    pub fn plain(title: impl Into<String>) -> Self {
        Item::PlainTitle(title.into())
    }

    pub fn title(&self) -> &str {
        match self {
            Item::PlainTitle(title) => title,
            Item::RichItem { title, .. } => title,
        }
    }

    /// Case-insensitive key used for duplicate detection
    pub fn title_key(&self) -> String {
        self.title().trim().to_lowercase()
    }
}

impl TryFrom<Value> for Item {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(title) => Ok(Item::PlainTitle(title)),
            Value::Object(mut metadata) => {
                let title_field = ["title", "name"]
                    .into_iter()
                    .find(|field| matches!(metadata.get(*field), Some(Value::String(_))))
                    .ok_or_else(|| "item object needs a string 'title' or 'name'".to_string())?;
                let title = match metadata.remove(title_field) {
                    Some(Value::String(title)) => title,
                    _ => return Err("item object needs a string 'title' or 'name'".to_string()),
                };
                Ok(Item::RichItem { title, metadata })
            }
            other => Err(format!("item must be a string or an object, got {}", other)),
        }
    }
}

impl From<Item> for Value {
    fn from(item: Item) -> Self {
        match item {
            Item::PlainTitle(title) => Value::String(title),
            Item::RichItem { title, mut metadata } => {
                metadata.insert("title".to_string(), Value::String(title));
                Value::Object(metadata)
            }
        }
    }
}

/// A named, ordered collection of items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub created_at: u64,
}

impl List {
    pub fn new(name: impl Into<String>, created_at: u64) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            favorite: false,
            created_at,
        }
    }

    pub fn contains_title(&self, key: &str) -> bool {
        self.items.iter().any(|item| item.title_key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_from_string_and_object() {
        let plain: Item = serde_json::from_value(json!("Inception")).unwrap();
        assert_eq!(plain, Item::plain("Inception"));

        let rich: Item = serde_json::from_value(json!({ "title": "Heat", "year": 1995 })).unwrap();
        assert_eq!(rich.title(), "Heat");
        match &rich {
            Item::RichItem { metadata, .. } => assert_eq!(metadata.get("year"), Some(&json!(1995))),
            _ => panic!("expected rich item"),
        }

        let show: Item = serde_json::from_value(json!({ "name": "The Wire", "id": 1438 })).unwrap();
        assert_eq!(show.title(), "The Wire");
    }

    #[test]
    fn test_item_with_title_and_name_prefers_title() {
        let item: Item = serde_json::from_value(json!({ "title": "Alien", "name": "alien-1979" })).unwrap();
        assert_eq!(item.title(), "Alien");
        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["name"], json!("alien-1979"));
        assert_eq!(back["title"], json!("Alien"));
    }

    #[test]
    fn test_item_rejects_untitled_shapes() {
        assert!(serde_json::from_value::<Item>(json!({ "year": 1999 })).is_err());
        assert!(serde_json::from_value::<Item>(json!(42)).is_err());
        assert!(serde_json::from_value::<Item>(json!({ "title": 7 })).is_err());
    }

    #[test]
    fn test_title_key_ignores_case_and_padding() {
        assert_eq!(Item::plain("  Inception ").title_key(), "inception");
    }
}
