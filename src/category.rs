//! Built-in and user-defined categories.
//!
//! Built-ins are fixed, never stored and never owned. User categories live
//! in the `categories` collection. The effective set is built-ins first, in
//! their fixed order, followed by the user's own in mirror order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mirror::MirrorRecord;
use crate::remote::{Document, Write, OWNER_FIELD};

pub const CATEGORIES_COLLECTION: &str = "categories";

/// Category used when none is given.
pub const DEFAULT_CATEGORY: &str = "Personal";

/// Color used when a category name resolves to nothing.
pub const FALLBACK_COLOR: &str = "#ccc";

/// Built-in categories and their colors, in display order.
pub const BUILTIN_CATEGORIES: [(&str, &str); 6] = [
    ("Personal", "#3b82f6"),
    ("Work", "#a855f7"),
    ("Shopping", "#22c55e"),
    ("Health", "#ef4444"),
    ("Finance", "#eab308"),
    ("Study", "#f97316"),
];

pub fn builtin_color(name: &str) -> Option<&'static str> {
    BUILTIN_CATEGORIES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, color)| *color)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(alias = "userId")]
    pub owner_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MirrorRecord for Category {
    const COLLECTION: &'static str = CATEGORIES_COLLECTION;

    fn from_document(doc: &Document) -> Result<Self> {
        Ok(serde_json::from_value(doc.to_value())?)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// One entry of the effective category set.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EffectiveCategory {
    /// Store id for user categories, `None` for built-ins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub color: String,
    pub builtin: bool,
}

/// Built-ins followed by `user` in the given order.
pub fn effective_categories(user: &[Category]) -> Vec<EffectiveCategory> {
    BUILTIN_CATEGORIES
        .iter()
        .map(|(name, color)| EffectiveCategory {
            id: None,
            name: name.to_string(),
            color: color.to_string(),
            builtin: true,
        })
        .chain(user.iter().map(|category| EffectiveCategory {
            id: Some(category.id.clone()),
            name: category.name.clone(),
            color: category.color.clone(),
            builtin: false,
        }))
        .collect()
}

/// Color for a category name: built-ins win over same-named user
/// categories; unknown names get [`FALLBACK_COLOR`].
pub fn resolve_color(name: &str, user: &[Category]) -> String {
    if let Some(color) = builtin_color(name) {
        return color.to_string();
    }
    user.iter()
        .find(|category| category.name == name)
        .map(|category| category.color.clone())
        .unwrap_or_else(|| FALLBACK_COLOR.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub color: String,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("category name cannot be empty".to_string()));
        }
        if self.color.trim().is_empty() {
            return Err(Error::Validation("category color cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn to_write(&self, owner_id: &str) -> Write {
        Write::new()
            .set("name", self.name.trim())
            .set("color", self.color.trim())
            .set(OWNER_FIELD, owner_id)
            .server_timestamp("createdAt")
    }
}

/// Partial category update. Categories carry no `updatedAt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl CategoryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(Error::Validation("category name cannot be empty".to_string()));
        }
        if self.color.as_deref().is_some_and(|color| color.trim().is_empty()) {
            return Err(Error::Validation("category color cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn to_write(&self) -> Write {
        let mut write = Write::new();
        if let Some(name) = &self.name {
            write = write.set("name", name.trim());
        }
        if let Some(color) = &self.color {
            write = write.set("color", color.trim());
        }
        write
    }
}
