//! Catalog discovery.
//!
//! Enumerates the schemas, tables and views visible through a [`Database`]
//! handle. Discovery is all-or-nothing: any introspection failure other than
//! an unsupported view listing aborts the whole call.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::db::Database;
use crate::error::{Result, ScoutError};
use crate::models::{ItemDescriptor, ItemKind, SchemaEntry};

/// The discovered schemas of one connection, default schema first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub schemas: Vec<SchemaEntry>,
}

pub async fn discover(db: &dyn Database) -> Result<Catalog> {
    let mut schemas = Vec::new();

    let default_entry = load_entry(db, None).await?;
    if !default_entry.is_empty() {
        schemas.push(default_entry);
    }

    let names = db.list_schemas().await.map_err(as_catalog_error)?;
    for name in names {
        let is_default = db
            .default_schema()
            .is_some_and(|d| d.eq_ignore_ascii_case(&name));
        if is_default {
            continue;
        }

        let entry = load_entry(db, Some(&name)).await?;
        if !entry.is_empty() {
            schemas.push(entry);
        }
    }

    let catalog = Catalog { schemas };
    tracing::info!(
        schemas = catalog.schemas.len(),
        items = catalog.items().len(),
        "catalog discovered"
    );
    Ok(catalog)
}

async fn load_entry(db: &dyn Database, schema: Option<&str>) -> Result<SchemaEntry> {
    let tables = db.list_tables(schema).await.map_err(as_catalog_error)?;
    let views = match db.list_views(schema).await {
        Ok(views) => views,
        Err(ScoutError::Unsupported(msg)) => {
            tracing::debug!(reason = %msg, "views unsupported, treating as empty");
            BTreeSet::new()
        }
        Err(e) => return Err(as_catalog_error(e)),
    };

    Ok(SchemaEntry {
        schema: schema.map(str::to_string),
        tables,
        views,
    })
}

fn as_catalog_error(err: ScoutError) -> ScoutError {
    match err {
        ScoutError::Catalog(_) | ScoutError::Connection(_) => err,
        other => ScoutError::Catalog(other.to_string()),
    }
}

impl Catalog {
    /// Every item, tables before views within each schema, without duplicates.
    pub fn items(&self) -> Vec<ItemDescriptor> {
        let mut seen = BTreeSet::new();
        let mut items = Vec::new();
        for entry in &self.schemas {
            let schema = entry.schema.as_deref();
            let tables = entry.tables.iter().map(|t| (t, ItemKind::Table));
            let views = entry.views.iter().map(|v| (v, ItemKind::View));
            for (name, kind) in tables.chain(views) {
                let item = ItemDescriptor::new(schema, name, kind);
                if seen.insert(item.clone()) {
                    items.push(item);
                }
            }
        }
        items
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.iter().all(SchemaEntry::is_empty)
    }

    /// Look up an item by schema and exact name.
    pub fn find(&self, schema: Option<&str>, name: &str) -> Option<ItemDescriptor> {
        let entry = self.schemas.iter().find(|e| e.schema.as_deref() == schema)?;
        if entry.tables.contains(name) {
            Some(ItemDescriptor::new(schema, name, ItemKind::Table))
        } else if entry.views.contains(name) {
            Some(ItemDescriptor::new(schema, name, ItemKind::View))
        } else {
            None
        }
    }

    /// Map a model-produced name onto a real catalog item.
    ///
    /// Tries an exact full-name match, then a case-insensitive one, then a
    /// unique match on the bare item name (so `main.orders` or `ORDERS` still
    /// find `orders`). Quote characters are ignored.
    pub fn resolve(&self, raw: &str) -> Option<ItemDescriptor> {
        let name: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '"' | '`' | '[' | ']' | '\''))
            .collect();
        if name.is_empty() {
            return None;
        }

        let items = self.items();
        if let Some(item) = items.iter().find(|i| i.full_name() == name) {
            return Some(item.clone());
        }
        if let Some(item) = items
            .iter()
            .find(|i| i.full_name().eq_ignore_ascii_case(&name))
        {
            return Some(item.clone());
        }

        let bare = name.rsplit('.').next().unwrap_or(&name);
        let mut candidates = items.iter().filter(|i| i.name.eq_ignore_ascii_case(bare));
        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }
}
