//! Menu item store

use parking_lot::RwLock;
use shared::models::{MenuItem, MenuItemCreate, MenuItemUpdate, OrderItem};
use std::sync::Arc;

use crate::message::{ChangeAction, ChangeBus, Collection};
use crate::orders::money;
use crate::storage::{self, LocalStorage, Persist, StorageResult, keys};
use crate::utils::{AppError, AppResult};

pub struct MenuStore {
    items: RwLock<Vec<MenuItem>>,
    persist: Arc<dyn Persist>,
    bus: ChangeBus,
}

impl std::fmt::Debug for MenuStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuStore")
            .field("items", &self.items.read().len())
            .finish()
    }
}

fn validate(item: &MenuItem) -> AppResult<()> {
    if item.name.trim().is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if item.category.trim().is_empty() {
        return Err(AppError::validation("category must not be empty"));
    }
    money::validate_price(item.price)
}

impl MenuStore {
    pub fn new(persist: Arc<dyn Persist>, bus: ChangeBus) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            persist,
            bus,
        }
    }

    pub fn load(storage: &LocalStorage, persist: Arc<dyn Persist>, bus: ChangeBus) -> StorageResult<Self> {
        let items: Vec<MenuItem> = storage::load_collection(storage, keys::MENU_ITEMS)?;
        tracing::info!(count = items.len(), "Menu items rehydrated");
        let store = Self::new(persist, bus);
        *store.items.write() = items;
        Ok(store)
    }

    pub fn add_menu_item(&self, input: MenuItemCreate) -> AppResult<MenuItem> {
        let mut items = self.items.write();
        let id = match input.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let item = MenuItem {
            id,
            name: input.name,
            category: input.category,
            base_spirit: input.base_spirit,
            price: input.price,
            available: input.available.unwrap_or(true),
            ingredients: input.ingredients,
        };

        let verdict = if items.iter().any(|m| m.id == item.id) {
            Err(AppError::conflict(format!("Menu item {} already exists", item.id)))
        } else {
            validate(&item)
        };
        if let Err(e) = verdict {
            tracing::warn!(error = %e, "Rejected new menu item");
            return Err(e);
        }

        items.push(item.clone());
        self.commit(&items, &item.id, ChangeAction::Upsert);
        tracing::info!(menu_item_id = %item.id, name = %item.name, "Menu item added");
        Ok(item)
    }

    pub fn update_menu_item(&self, id: &str, update: MenuItemUpdate) -> AppResult<MenuItem> {
        let mut items = self.items.write();
        let Some(index) = items.iter().position(|m| m.id == id) else {
            return Err(AppError::not_found(format!("Menu item {id}")));
        };

        let mut draft = items[index].clone();
        if let Some(name) = update.name {
            draft.name = name;
        }
        if let Some(category) = update.category {
            draft.category = category;
        }
        if let Some(base_spirit) = update.base_spirit {
            draft.base_spirit = Some(base_spirit).filter(|s| !s.is_empty());
        }
        if let Some(price) = update.price {
            draft.price = price;
        }
        if let Some(available) = update.available {
            draft.available = available;
        }
        if let Some(ingredients) = update.ingredients {
            draft.ingredients = ingredients;
        }
        if let Err(e) = validate(&draft) {
            tracing::warn!(menu_item_id = %id, error = %e, "Rejected menu item update");
            return Err(e);
        }

        items[index] = draft.clone();
        self.commit(&items, id, ChangeAction::Upsert);
        Ok(draft)
    }

    pub fn delete_menu_item(&self, id: &str) -> AppResult<MenuItem> {
        let mut items = self.items.write();
        let Some(index) = items.iter().position(|m| m.id == id) else {
            return Err(AppError::not_found(format!("Menu item {id}")));
        };
        let removed = items.remove(index);
        self.commit(&items, id, ChangeAction::Delete);
        tracing::info!(menu_item_id = %id, "Menu item deleted");
        Ok(removed)
    }

    pub fn set_menu_items(&self, list: Vec<MenuItem>) {
        let mut items = self.items.write();
        *items = list;
        storage::persist_collection(self.persist.as_ref(), keys::MENU_ITEMS, &*items);
        tracing::info!(count = items.len(), "Menu items replaced");
    }

    /// Build an order line from the catalog entry `id`
    pub fn order_item(&self, id: &str, quantity: i32) -> AppResult<OrderItem> {
        let item = self
            .get(id)
            .ok_or_else(|| AppError::not_found(format!("Menu item {id}")))?;
        if !item.available {
            return Err(AppError::business_rule(format!("{} is not available", item.name)));
        }
        let line = OrderItem {
            id: item.id,
            name: item.name,
            price: item.price,
            quantity,
        };
        money::validate_item(&line)?;
        Ok(line)
    }

    /// Rebuild caller-supplied order lines from the catalog
    ///
    /// Name and price come from the menu; only `id` and `quantity` are
    /// taken from the request. Unknown ids are rejected as invalid input.
    pub fn resolve_items(&self, lines: &[OrderItem]) -> AppResult<Vec<OrderItem>> {
        lines
            .iter()
            .map(|line| match self.order_item(&line.id, line.quantity) {
                Err(AppError::NotFound(_)) => Err(AppError::validation(format!(
                    "Order references unknown menu item {}",
                    line.id
                ))),
                other => other,
            })
            .collect::<AppResult<Vec<_>>>()
            .inspect_err(|e| tracing::warn!(error = %e, "Rejected order lines"))
    }

    fn commit(&self, items: &[MenuItem], id: &str, action: ChangeAction) {
        storage::persist_collection(self.persist.as_ref(), keys::MENU_ITEMS, items);
        self.bus.publish(Collection::MenuItems, id, action);
    }

    pub fn get(&self, id: &str) -> Option<MenuItem> {
        self.items.read().iter().find(|m| m.id == id).cloned()
    }

    pub fn by_category(&self, category: &str) -> Vec<MenuItem> {
        self.items
            .read()
            .iter()
            .filter(|m| m.category == category)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<MenuItem> {
        self.items.read().clone()
    }
}
