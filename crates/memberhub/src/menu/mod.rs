//! Navigation menus.
//!
//! Menu data arrives as a flat list of [`MenuRecord`]s, each optionally
//! pointing at a parent. [`build_forest`] turns that list into ordered
//! [`MenuNode`] trees, and [`MenuTreeBuilder`] holds the latest forest for a
//! menu type alongside any fetch error.

mod builder;
mod source;
mod tree;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use builder::{MenuSnapshot, MenuTreeBuilder};
pub use source::{MenuSource, SqliteMenuSource, StaticMenuSource};
pub use tree::{build_forest, ForestOptions, MAX_DEPTH};

/// Link prefix for menu entries that point at a built page.
pub const DEFAULT_PAGE_PATH_PREFIX: &str = "/pages/";

/// Link used when a menu entry has nowhere to go.
pub const DEFAULT_PLACEHOLDER_HREF: &str = "#";

/// One row of flat navigation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuRecord {
    /// Unique identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Explicit link, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Parent identifier; `None` for top-level entries.
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Position among siblings, ascending.
    #[serde(default)]
    pub sort_order: i32,
    /// Nesting depth as reported by the source. Not used to build trees.
    #[serde(default)]
    pub depth: i32,
    /// Icon name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the link opens in a new tab.
    #[serde(default)]
    pub open_in_new_tab: bool,
    /// Linked page identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<i64>,
    /// Linked page title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    /// Linked page slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_slug: Option<String>,
}

impl MenuRecord {
    /// Create a record with the given id and name and every optional field empty.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            href: None,
            parent_id: None,
            sort_order: 0,
            depth: 0,
            icon: None,
            description: None,
            open_in_new_tab: false,
            page_id: None,
            page_title: None,
            page_slug: None,
        }
    }

    /// Set the parent identifier.
    #[must_use]
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the sibling sort rank.
    #[must_use]
    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Set the explicit link.
    #[must_use]
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Link this record to a built page.
    #[must_use]
    pub fn with_page(mut self, page_id: i64, title: impl Into<String>, slug: impl Into<String>) -> Self {
        self.page_id = Some(page_id);
        self.page_title = Some(title.into());
        self.page_slug = Some(slug.into());
        self
    }
}

/// Read menu records from a JSON file holding an array of records.
///
/// A `null` document is an empty menu.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold an array of
/// menu records.
pub fn read_records_file(path: impl AsRef<Path>) -> Result<Vec<MenuRecord>> {
    let raw = std::fs::read_to_string(path)?;
    let records: Option<Vec<MenuRecord>> = serde_json::from_str(&raw)?;
    Ok(records.unwrap_or_default())
}

/// How explicit links, page slugs and placeholders combine into a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOptions {
    /// Prefix joined with a page slug.
    pub page_path_prefix: String,
    /// Link used when nothing else applies.
    pub placeholder_href: String,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            page_path_prefix: DEFAULT_PAGE_PATH_PREFIX.to_string(),
            placeholder_href: DEFAULT_PLACEHOLDER_HREF.to_string(),
        }
    }
}

impl LinkOptions {
    /// Resolve the link for a record.
    ///
    /// Explicit link first, then the linked page's slug, then the placeholder.
    /// Empty strings count as missing.
    #[must_use]
    pub fn resolve(&self, record: &MenuRecord) -> String {
        if let Some(href) = record.href.as_deref().filter(|h| !h.is_empty()) {
            return href.to_string();
        }
        if let Some(slug) = record.page_slug.as_deref().filter(|s| !s.is_empty()) {
            return format!("{}{}", self.page_path_prefix, slug.trim_start_matches('/'));
        }
        self.placeholder_href.clone()
    }
}

/// A menu entry with its resolved link and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNode {
    /// The source record.
    #[serde(flatten)]
    pub record: MenuRecord,
    /// Link resolved from the record's href, page slug or the placeholder.
    pub resolved_href: String,
    /// Child entries ordered by ascending sort rank.
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    /// Create a childless node for a record.
    #[must_use]
    pub fn new(record: MenuRecord, links: &LinkOptions) -> Self {
        let resolved_href = links.resolve(&record);
        Self {
            record,
            resolved_href,
            children: Vec::new(),
        }
    }

    /// The node's identifier.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.record.id
    }

    /// The node's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Number of nodes in this subtree, including this one.
    #[must_use]
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(&node.children);
        }
        count
    }
}

/// What happens to records whose parent id matches no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Leave them out of the forest entirely.
    #[default]
    Drop,
    /// Treat them as top-level entries.
    PromoteToRoot,
}

impl std::fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::PromoteToRoot => write!(f, "promote_to_root"),
        }
    }
}

/// How completions of overlapping fetches are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Every completion is applied; whichever finishes last wins.
    #[default]
    LastWriteWins,
    /// Completions older than an already-applied fetch are discarded.
    LatestRequestWins,
}

impl std::fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LastWriteWins => write!(f, "last_write_wins"),
            Self::LatestRequestWins => write!(f, "latest_request_wins"),
        }
    }
}
