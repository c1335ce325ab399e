//! Donated item model, input payloads and list filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

use super::enums::{Category, Condition, ItemStatus};
use super::user::UserContact;
use super::{parse_field, required_text};

/// Item model from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub condition: Condition,
    /// Storage paths, in upload order
    pub images: Vec<String>,
    pub donor_id: Uuid,
    pub status: ItemStatus,
    pub quantity: i32,
    pub tags: Vec<String>,
    pub pickup_location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item with the donor's contact details
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemDetails {
    #[serde(flatten)]
    pub item: Item,
    pub donor: Option<UserContact>,
}

/// Subset of an item embedded in request responses
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ItemSummary {
    pub id: Uuid,
    pub title: String,
    pub category: Category,
    pub condition: Condition,
    pub images: Vec<String>,
    pub pickup_location: String,
    pub status: ItemStatus,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            category: item.category,
            condition: item.condition,
            images: item.images.clone(),
            pickup_location: item.pickup_location.clone(),
            status: item.status,
        }
    }
}

/// Tags as sent by clients: a JSON list or a comma-separated string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Csv(String),
}

impl TagsInput {
    /// Trimmed, non-empty, de-duplicated tags in first-seen order
    pub fn normalize(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            TagsInput::List(tags) => tags.iter().map(String::as_str).collect(),
            TagsInput::Csv(csv) => csv.split(',').collect(),
        };

        let mut tags: Vec<String> = Vec::with_capacity(raw.len());
        for tag in raw.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        tags
    }
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    /// One of book, notebook, pen, pencil, calculator, ruler, eraser, other
    pub category: String,
    /// One of new, like-new, good, fair, poor
    pub condition: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    #[schema(value_type = Option<Vec<String>>)]
    pub tags: Option<TagsInput>,
    #[validate(length(min = 1, message = "Pickup location is required"))]
    pub pickup_location: String,
    /// Paths returned by the file storage for uploaded images
    #[serde(default)]
    pub images: Vec<String>,
}

/// Update item request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    #[schema(value_type = Option<Vec<String>>)]
    pub tags: Option<TagsInput>,
    pub pickup_location: Option<String>,
    /// Newly uploaded image paths, appended to the existing ones
    #[serde(default)]
    pub images: Vec<String>,
}

/// Validated item ready to be inserted. Status always starts `available`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub condition: Condition,
    pub images: Vec<String>,
    pub donor_id: Uuid,
    pub quantity: i32,
    pub tags: Vec<String>,
    pub pickup_location: String,
}

impl NewItem {
    pub fn new(donor_id: Uuid, input: CreateItem) -> AppResult<Self> {
        let quantity = input.quantity.unwrap_or(1);
        check_quantity(quantity)?;

        Ok(Self {
            id: Uuid::new_v4(),
            title: required_text(&input.title, "Title")?,
            description: required_text(&input.description, "Description")?,
            category: parse_field(input.category.trim())?,
            condition: parse_field(input.condition.trim())?,
            images: input.images,
            donor_id,
            quantity,
            tags: input.tags.map(|t| t.normalize()).unwrap_or_default(),
            pickup_location: required_text(&input.pickup_location, "Pickup location")?,
        })
    }

    /// Materialize the stored record with the given timestamps
    pub fn into_item(self, now: DateTime<Utc>) -> Item {
        Item {
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            condition: self.condition,
            images: self.images,
            donor_id: self.donor_id,
            status: ItemStatus::Available,
            quantity: self.quantity,
            tags: self.tags,
            pickup_location: self.pickup_location,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Item {
    /// Merge an update into this item. Nothing is modified when any field
    /// is invalid.
    pub fn apply_update(&mut self, update: UpdateItem) -> AppResult<()> {
        let mut next = self.clone();

        if let Some(ref title) = update.title {
            next.title = required_text(title, "Title")?;
        }
        if let Some(ref description) = update.description {
            next.description = required_text(description, "Description")?;
        }
        if let Some(ref category) = update.category {
            next.category = parse_field(category.trim())?;
        }
        if let Some(ref condition) = update.condition {
            next.condition = parse_field(condition.trim())?;
        }
        if let Some(quantity) = update.quantity {
            check_quantity(quantity)?;
            next.quantity = quantity;
        }
        if let Some(ref tags) = update.tags {
            next.tags = tags.normalize();
        }
        if let Some(ref location) = update.pickup_location {
            next.pickup_location = required_text(location, "Pickup location")?;
        }
        next.images.extend(update.images);

        *self = next;
        Ok(())
    }
}

fn check_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::Validation("Quantity must be at least 1".to_string()));
    }
    Ok(())
}

/// Item list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ItemQuery {
    pub category: Option<String>,
    pub condition: Option<String>,
    pub status: Option<String>,
    /// Full-text search over title, description and tags
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Parsed, conjunctive item filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    pub category: Option<Category>,
    pub condition: Option<Condition>,
    pub status: Option<ItemStatus>,
    /// Lowercased search terms; an item matches if any term matches
    pub search_terms: Option<Vec<String>>,
}

impl ItemFilter {
    pub fn from_query(query: &ItemQuery) -> AppResult<Self> {
        fn non_blank(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }

        Ok(Self {
            category: non_blank(&query.category).map(parse_field).transpose()?,
            condition: non_blank(&query.condition).map(parse_field).transpose()?,
            status: non_blank(&query.status).map(parse_field).transpose()?,
            search_terms: non_blank(&query.search).map(search_terms),
        })
    }

    pub fn matches(&self, item: &Item) -> bool {
        if self.category.is_some_and(|c| c != item.category) {
            return false;
        }
        if self.condition.is_some_and(|c| c != item.condition) {
            return false;
        }
        if self.status.is_some_and(|s| s != item.status) {
            return false;
        }
        match &self.search_terms {
            None => true,
            Some(terms) => {
                let mut words = search_terms(&item.title);
                words.extend(search_terms(&item.description));
                for tag in &item.tags {
                    words.extend(search_terms(tag));
                }
                terms.iter().any(|term| words.contains(term))
            }
        }
    }
}

/// Split text into lowercased alphanumeric words, without duplicates
pub fn search_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input() -> CreateItem {
        CreateItem {
            title: "  Calculus textbook ".to_string(),
            description: "Stewart, 8th edition".to_string(),
            category: "book".to_string(),
            condition: "like-new".to_string(),
            quantity: None,
            tags: Some(TagsInput::Csv("math, calculus, ,math".to_string())),
            pickup_location: "Library lobby".to_string(),
            images: vec!["/uploads/a.jpg".to_string()],
        }
    }

    fn sample_item() -> Item {
        NewItem::new(Uuid::new_v4(), create_input())
            .unwrap()
            .into_item(Utc::now())
    }

    #[test]
    fn test_new_item_normalizes_input() {
        let donor = Uuid::new_v4();
        let item = NewItem::new(donor, create_input()).unwrap();
        assert_eq!(item.title, "Calculus textbook");
        assert_eq!(item.category, Category::Book);
        assert_eq!(item.condition, Condition::LikeNew);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.tags, vec!["math", "calculus"]);
        assert_eq!(item.donor_id, donor);

        let stored = item.into_item(Utc::now());
        assert_eq!(stored.status, ItemStatus::Available);
        assert_eq!(stored.created_at, stored.updated_at);
    }

    #[test]
    fn test_new_item_rejects_invalid_fields() {
        let mut input = create_input();
        input.category = "laptop".to_string();
        assert!(matches!(NewItem::new(Uuid::new_v4(), input), Err(AppError::Validation(_))));

        let mut input = create_input();
        input.condition = "broken".to_string();
        assert!(matches!(NewItem::new(Uuid::new_v4(), input), Err(AppError::Validation(_))));

        let mut input = create_input();
        input.description = "   ".to_string();
        assert!(matches!(NewItem::new(Uuid::new_v4(), input), Err(AppError::Validation(_))));

        let mut input = create_input();
        input.quantity = Some(0);
        assert!(matches!(NewItem::new(Uuid::new_v4(), input), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_tags_from_list() {
        let tags = TagsInput::List(vec![" pen ".into(), "blue".into(), "pen".into(), "".into()]);
        assert_eq!(tags.normalize(), vec!["pen", "blue"]);
    }

    #[test]
    fn test_tags_deserialize_both_shapes() {
        let list: TagsInput = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(list, TagsInput::List(vec!["a".into(), "b".into()]));
        let csv: TagsInput = serde_json::from_str(r#""a, b""#).unwrap();
        assert_eq!(csv.normalize(), vec!["a", "b"]);
    }

    #[test]
    fn test_update_appends_images() {
        let mut item = sample_item();
        item.apply_update(UpdateItem {
            title: Some("Calculus I".to_string()),
            quantity: Some(2),
            images: vec!["/uploads/b.jpg".to_string()],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(item.title, "Calculus I");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.images, vec!["/uploads/a.jpg", "/uploads/b.jpg"]);
        assert_eq!(item.condition, Condition::LikeNew);
    }

    #[test]
    fn test_invalid_update_leaves_item_untouched() {
        let mut item = sample_item();
        let before = item.clone();
        let result = item.apply_update(UpdateItem {
            title: Some("New title".to_string()),
            condition: Some("broken".to_string()),
            images: vec!["/uploads/c.jpg".to_string()],
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(item, before);
    }

    #[test]
    fn test_filter_from_query() {
        let filter = ItemFilter::from_query(&ItemQuery {
            category: Some("pen".to_string()),
            status: Some(" ".to_string()),
            search: Some("Blue, INK".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.category, Some(Category::Pen));
        assert_eq!(filter.status, None);
        assert_eq!(filter.search_terms, Some(vec!["blue".to_string(), "ink".to_string()]));

        let bad = ItemFilter::from_query(&ItemQuery {
            status: Some("lost".to_string()),
            ..Default::default()
        });
        assert!(matches!(bad, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_filter_matches_text() {
        let item = sample_item();
        let by_tag = ItemFilter {
            search_terms: Some(vec!["nothing".into(), "calculus".into()]),
            ..Default::default()
        };
        assert!(by_tag.matches(&item));

        let by_description = ItemFilter {
            search_terms: Some(vec!["stewart".into()]),
            ..Default::default()
        };
        assert!(by_description.matches(&item));

        let miss = ItemFilter {
            search_terms: Some(vec!["calc".into()]),
            ..Default::default()
        };
        assert!(!miss.matches(&item));

        let wrong_category = ItemFilter {
            category: Some(Category::Pen),
            ..Default::default()
        };
        assert!(!wrong_category.matches(&item));
    }
}
