//! `SQLite` schema definitions for memberhub.

/// SQL statement to create the pages table.
pub const CREATE_PAGES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the menu items table.
///
/// `parent_id` is not a foreign key; records may name parents that do not exist.
pub const CREATE_MENU_ITEMS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS menu_items (
    id INTEGER PRIMARY KEY,
    menu_type TEXT NOT NULL,
    name TEXT NOT NULL,
    href TEXT,
    parent_id INTEGER,
    sort_order INTEGER NOT NULL DEFAULT 0,
    depth INTEGER NOT NULL DEFAULT 0,
    icon TEXT,
    description TEXT,
    open_in_new_tab INTEGER NOT NULL DEFAULT 0,
    page_id INTEGER REFERENCES pages(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index on `menu_type` for per-menu reads.
pub const CREATE_MENU_TYPE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_menu_items_type ON menu_items(menu_type)
";

/// SQL statement to create an index on `parent_id`.
pub const CREATE_MENU_PARENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_menu_items_parent ON menu_items(parent_id)
";

/// SQL statement to create the persistent key-value slots table.
pub const CREATE_SLOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS slots (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_PAGES_TABLE,
    CREATE_MENU_ITEMS_TABLE,
    CREATE_MENU_TYPE_INDEX,
    CREATE_MENU_PARENT_INDEX,
    CREATE_SLOTS_TABLE,
    CREATE_METADATA_TABLE,
];
