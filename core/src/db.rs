use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::models::{ConversationTurn, FoodRecord, NewFoodRecord, NewTurn};

/// Storage operations used by the resolution pipeline and conversation log.
///
/// `Database` implements this directly for single-threaded callers, and
/// `Mutex<Database>` implements it for shared use (the server hands the
/// service an `Arc<Mutex<Database>>`). Test code substitutes doubles to
/// exercise persistence-failure paths.
pub trait Store: Send + Sync {
    /// Insert a reference food. Returns false when a record with the same
    /// name (case-insensitive) already exists and the row was ignored.
    fn insert_food(&self, food: &NewFoodRecord) -> Result<bool>;
    /// Case-insensitive exact lookup by name.
    fn food_by_name(&self, name: &str) -> Result<Option<FoodRecord>>;
    fn food_count(&self) -> Result<i64>;
    fn all_food_names(&self) -> Result<Vec<String>>;
    /// Append a turn, timestamping it now. Returns the stored row.
    fn append_turn(&self, turn: &NewTurn) -> Result<ConversationTurn>;
    /// Most-recent-first, at most `limit` turns.
    fn recent_turns(&self, limit: i64) -> Result<Vec<ConversationTurn>>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    calories_per_100g REAL NOT NULL,
                    protein_per_100g REAL NOT NULL,
                    carbs_per_100g REAL NOT NULL,
                    fat_per_100g REAL NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    role TEXT NOT NULL,
                    text TEXT NOT NULL,
                    query TEXT,
                    weight_g INTEGER,
                    calories REAL,
                    protein REAL,
                    carbs REAL,
                    fat REAL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_foods_name ON foods(name);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodRecord> {
        Ok(FoodRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            calories_per_100g: row.get(2)?,
            protein_per_100g: row.get(3)?,
            carbs_per_100g: row.get(4)?,
            fat_per_100g: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn turn_from_row(row: &rusqlite::Row) -> rusqlite::Result<ConversationTurn> {
        Ok(ConversationTurn {
            id: row.get(0)?,
            role: row.get(1)?,
            text: row.get(2)?,
            query: row.get(3)?,
            weight_g: row.get(4)?,
            calories: row.get(5)?,
            protein: row.get(6)?,
            carbs: row.get(7)?,
            fat: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    // --- Foods ---

    pub fn insert_food(&self, food: &NewFoodRecord) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        // OR IGNORE keeps the first occurrence on duplicate names.
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO foods (name, calories_per_100g, protein_per_100g, carbs_per_100g, fat_per_100g, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                food.name,
                food.calories_per_100g,
                food.protein_per_100g,
                food.carbs_per_100g,
                food.fat_per_100g,
                now,
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn food_by_name(&self, name: &str) -> Result<Option<FoodRecord>> {
        // The name column is COLLATE NOCASE, so equality is case-insensitive.
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM foods WHERE name = ?1 LIMIT 1")?;
        let mut rows = stmt.query(params![name])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn food_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM foods", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn all_food_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM foods")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    // --- Conversation turns ---

    pub fn append_turn(&self, turn: &NewTurn) -> Result<ConversationTurn> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO messages (role, text, query, weight_g, calories, protein, carbs, fat, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                turn.role,
                turn.text,
                turn.query,
                turn.weight_g,
                turn.nutrients.map(|n| n.calories),
                turn.nutrients.map(|n| n.protein),
                turn.nutrients.map(|n| n.carbs),
                turn.nutrients.map(|n| n.fat),
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT * FROM messages WHERE id = ?1",
                params![id],
                Self::turn_from_row,
            )
            .context("Stored turn not found")
    }

    pub fn recent_turns(&self, limit: i64) -> Result<Vec<ConversationTurn>> {
        // SQLite treats a negative LIMIT as unlimited; clamp instead.
        let limit = limit.max(0);
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM messages ORDER BY id DESC LIMIT ?1")?;
        let turns = stmt
            .query_map(params![limit], Self::turn_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(turns)
    }
}

impl Store for Mutex<Database> {
    fn insert_food(&self, food: &NewFoodRecord) -> Result<bool> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert_food(food)
    }

    fn food_by_name(&self, name: &str) -> Result<Option<FoodRecord>> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .food_by_name(name)
    }

    fn food_count(&self) -> Result<i64> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .food_count()
    }

    fn all_food_names(&self) -> Result<Vec<String>> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .all_food_names()
    }

    fn append_turn(&self, turn: &NewTurn) -> Result<ConversationTurn> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append_turn(turn)
    }

    fn recent_turns(&self, limit: i64) -> Result<Vec<ConversationTurn>> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent_turns(limit)
    }
}
