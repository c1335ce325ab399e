//! Item listing service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CreateItem, ItemQuery, UpdateItem},
        Caller, Item, ItemDetails, ItemFilter, NewItem, Page, PageRequest,
    },
    repository::Repository,
};

use super::contact_map;

#[derive(Clone)]
pub struct ItemsService {
    repository: Repository,
}

impl ItemsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Attach donor contacts, keeping the input order
    async fn with_donors(&self, items: Vec<Item>) -> AppResult<Vec<ItemDetails>> {
        let donors =
            contact_map(self.repository.users.as_ref(), items.iter().map(|i| i.donor_id)).await?;
        Ok(items
            .into_iter()
            .map(|item| ItemDetails {
                donor: donors.get(&item.donor_id).cloned(),
                item,
            })
            .collect())
    }

    /// Load an item the caller owns
    async fn owned_item(&self, caller: &Caller, id: Uuid) -> AppResult<Item> {
        let item = self
            .repository
            .items
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))?;

        if item.donor_id != caller.id {
            return Err(AppError::Authorization(
                "You can only modify your own items".to_string(),
            ));
        }
        Ok(item)
    }

    /// List a new item for the calling donor
    pub async fn create(&self, caller: &Caller, input: CreateItem) -> AppResult<Item> {
        let new_item = NewItem::new(caller.id, input)?;
        let item = self.repository.items.insert(new_item).await?;
        tracing::info!("Item {} created by donor {}", item.id, caller.id);
        Ok(item)
    }

    /// Filtered, paginated item list, newest first
    pub async fn list(&self, query: &ItemQuery) -> AppResult<Page<ItemDetails>> {
        let filter = ItemFilter::from_query(query)?;
        let page = PageRequest::new(query.page, query.limit)?;

        let (items, total) = self.repository.items.search(&filter, page).await?;
        let details = self.with_donors(items).await?;
        Ok(Page::new(details, total, page))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ItemDetails> {
        let item = self
            .repository
            .items
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))?;

        let mut details = self.with_donors(vec![item]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::Internal("Item lost while loading donor".to_string()))
    }

    /// Update an item owned by the caller. Status is not editable here.
    pub async fn update(&self, caller: &Caller, id: Uuid, update: UpdateItem) -> AppResult<Item> {
        let mut item = self.owned_item(caller, id).await?;
        item.apply_update(update)?;

        let updated = self.repository.items.update(&item).await?;
        tracing::info!("Item {} updated by donor {}", id, caller.id);
        Ok(updated)
    }

    /// Hard delete. Requests referencing the item are kept.
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> AppResult<()> {
        self.owned_item(caller, id).await?;

        if !self.repository.items.delete(id).await? {
            return Err(AppError::NotFound(format!("Item with id {} not found", id)));
        }
        tracing::info!("Item {} deleted by donor {}", id, caller.id);
        Ok(())
    }

    /// All items of the calling donor, newest first
    pub async fn list_mine(&self, caller: &Caller) -> AppResult<Vec<Item>> {
        self.repository.items.list_by_donor(caller.id).await
    }
}
