use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection};
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::{Application, Status, User};

/// Columns `list` is allowed to sort by.
const SORT_COLUMNS: [&str; 7] = [
    "company",
    "position",
    "status",
    "applied_date",
    "salary_min",
    "salary_max",
    "created_at",
];

const APPLICATION_COLUMNS: &str = "id, user_id, company, position, status, applied_date, \
     response_date, first_interview_date, offer_date, rejection_date, \
     link, location, description, salary_min, salary_max, created_at, updated_at";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

/// Fields for a new application. The applied date is mandatory here; every
/// other milestone date starts empty and gets filled in as the pipeline
/// progresses.
pub struct NewApplication {
    pub company: String,
    pub position: String,
    pub status: Option<Status>,
    pub applied_date: NaiveDate,
    pub link: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
}

/// Partial update. `None` leaves a field untouched; for the milestone
/// dates, `Some(None)` clears the stored value.
#[derive(Default)]
pub struct ApplicationUpdate {
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: Option<Status>,
    pub applied_date: Option<NaiveDate>,
    pub response_date: Option<Option<NaiveDate>>,
    pub first_interview_date: Option<Option<NaiveDate>>,
    pub offer_date: Option<Option<NaiveDate>>,
    pub rejection_date: Option<Option<NaiveDate>>,
    pub link: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
}

impl Database {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "apptrack") {
            Ok(proj_dirs.data_dir().join("apptrack.db"))
        } else {
            // Fallback to current directory
            Ok(PathBuf::from("apptrack.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                company TEXT NOT NULL,
                position TEXT NOT NULL,
                status TEXT CHECK (status IN ('applied', 'phone_screen', 'technical', 'final_round', 'offer', 'rejected')),
                applied_date TEXT NOT NULL,
                response_date TEXT,
                first_interview_date TEXT,
                offer_date TEXT,
                rejection_date TEXT,
                link TEXT,
                location TEXT,
                description TEXT,
                salary_min INTEGER CHECK (salary_min IS NULL OR salary_min >= 0),
                salary_max INTEGER CHECK (salary_max IS NULL OR salary_max >= 0),
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_applications_user ON applications(user_id);
            CREATE INDEX IF NOT EXISTS idx_applications_user_status ON applications(user_id, status);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'apptrack init' first."
            ));
        }
        Ok(())
    }

    // --- User operations ---

    pub fn get_or_create_user(&self, name: &str) -> Result<i64> {
        // Try to find existing
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE LOWER(name) = LOWER(?1)",
                [name],
                |row| row.get(0),
            )
            .ok();

        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn
            .execute("INSERT INTO users (name) VALUES (?1)", [name])?;
        let id = self.conn.last_insert_rowid();

        // First user on a fresh database becomes the active one
        if self.active_user()?.is_none() {
            self.conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES ('active_user', ?1)",
                [id],
            )?;
        }
        Ok(id)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM users ORDER BY name")?;
        let rows = stmt.query_map([], Self::row_to_user)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list users")
    }

    pub fn set_active_user(&self, name: &str) -> Result<User> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE LOWER(name) = LOWER(?1)",
                [name],
                Self::row_to_user,
            )
            .map_err(|_| {
                anyhow!(
                    "User '{}' not found. Run 'apptrack user add {}' first.",
                    name,
                    name
                )
            })?;

        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('active_user', ?1)",
            [user.id],
        )?;
        Ok(user)
    }

    pub fn active_user(&self) -> Result<Option<User>> {
        let result = self.conn.query_row(
            "SELECT u.id, u.name, u.created_at FROM users u
             JOIN settings s ON s.key = 'active_user' AND u.id = CAST(s.value AS INTEGER)",
            [],
            Self::row_to_user,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    // --- Application operations (all scoped by owning user) ---

    pub fn add_application(&self, user_id: i64, new: &NewApplication) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO applications (user_id, company, position, status, applied_date,
                                       link, location, description, salary_min, salary_max)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user_id,
                new.company,
                new.position,
                new.status.map(|s| s.as_str()),
                new.applied_date.to_string(),
                new.link,
                new.location,
                new.description,
                new.salary_min,
                new.salary_max,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_application(&self, user_id: i64, id: i64) -> Result<Option<Application>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1 AND user_id = ?2"
        );
        let result = self
            .conn
            .query_row(&sql, params![id, user_id], Self::row_to_application);
        match result {
            Ok(app) => Ok(Some(app)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_applications(
        &self,
        user_id: i64,
        status: Option<Status>,
        sort: &str,
        descending: bool,
    ) -> Result<Vec<Application>> {
        if !SORT_COLUMNS.contains(&sort) {
            return Err(anyhow!(
                "Cannot sort by '{}'. Valid columns: {}",
                sort,
                SORT_COLUMNS.join(", ")
            ));
        }

        let mut sql =
            format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = ?1");
        if status.is_some() {
            sql.push_str(" AND status = ?2");
        }
        sql.push_str(&format!(
            " ORDER BY {} {}",
            sort,
            if descending { "DESC" } else { "ASC" }
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if let Some(s) = status {
            stmt.query_map(params![user_id, s.as_str()], Self::row_to_application)?
        } else {
            stmt.query_map(params![user_id], Self::row_to_application)?
        };

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list applications")
    }

    pub fn update_application(
        &self,
        user_id: i64,
        id: i64,
        update: &ApplicationUpdate,
    ) -> Result<bool> {
        let mut sets: Vec<String> = vec![];
        let mut vals: Vec<Value> = vec![];

        fn set(sets: &mut Vec<String>, vals: &mut Vec<Value>, col: &str, val: Value) {
            vals.push(val);
            sets.push(format!("{} = ?{}", col, vals.len()));
        }

        if let Some(company) = &update.company {
            set(&mut sets, &mut vals, "company", Value::Text(company.clone()));
        }
        if let Some(position) = &update.position {
            set(&mut sets, &mut vals, "position", Value::Text(position.clone()));
        }
        if let Some(status) = update.status {
            set(&mut sets, &mut vals, "status", Value::Text(status.as_str().into()));
        }
        if let Some(date) = update.applied_date {
            set(&mut sets, &mut vals, "applied_date", Value::Text(date.to_string()));
        }
        let date_cols = [
            ("response_date", &update.response_date),
            ("first_interview_date", &update.first_interview_date),
            ("offer_date", &update.offer_date),
            ("rejection_date", &update.rejection_date),
        ];
        for (col, val) in date_cols {
            if let Some(date) = val {
                let v = match date {
                    Some(d) => Value::Text(d.to_string()),
                    None => Value::Null,
                };
                set(&mut sets, &mut vals, col, v);
            }
        }
        if let Some(link) = &update.link {
            set(&mut sets, &mut vals, "link", Value::Text(link.clone()));
        }
        if let Some(location) = &update.location {
            set(&mut sets, &mut vals, "location", Value::Text(location.clone()));
        }
        if let Some(description) = &update.description {
            set(&mut sets, &mut vals, "description", Value::Text(description.clone()));
        }
        if let Some(min) = update.salary_min {
            set(&mut sets, &mut vals, "salary_min", Value::Integer(min));
        }
        if let Some(max) = update.salary_max {
            set(&mut sets, &mut vals, "salary_max", Value::Integer(max));
        }

        if sets.is_empty() {
            return Err(anyhow!("Nothing to update."));
        }

        sets.push("updated_at = datetime('now')".to_string());
        vals.push(Value::Integer(id));
        let id_idx = vals.len();
        vals.push(Value::Integer(user_id));
        let user_idx = vals.len();

        let sql = format!(
            "UPDATE applications SET {} WHERE id = ?{} AND user_id = ?{}",
            sets.join(", "),
            id_idx,
            user_idx
        );
        let changed = self.conn.execute(&sql, params_from_iter(vals))?;
        Ok(changed > 0)
    }

    pub fn delete_application(&self, user_id: i64, id: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM applications WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        Ok(Application {
            id: row.get(0)?,
            user_id: row.get(1)?,
            company: row.get(2)?,
            position: row.get(3)?,
            status: Self::column_status(row, 4)?,
            applied_date: Self::column_date(row, 5)?,
            response_date: Self::column_date(row, 6)?,
            first_interview_date: Self::column_date(row, 7)?,
            offer_date: Self::column_date(row, 8)?,
            rejection_date: Self::column_date(row, 9)?,
            link: row.get(10)?,
            location: row.get(11)?,
            description: row.get(12)?,
            salary_min: row.get(13)?,
            salary_max: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn column_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
        let raw: Option<String> = row.get(idx)?;
        raw.map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
        })
        .transpose()
    }

    fn column_status(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<Status>> {
        let raw: Option<String> = row.get(idx)?;
        raw.map(|s| {
            Status::from_str(&s)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn sample(company: &str) -> NewApplication {
        NewApplication {
            company: company.to_string(),
            position: "Engineer".to_string(),
            status: Some(Status::Applied),
            applied_date: "2024-03-01".parse().unwrap(),
            link: None,
            location: None,
            description: None,
            salary_min: Some(90_000),
            salary_max: Some(120_000),
        }
    }

    #[test]
    fn first_user_becomes_active() {
        let db = test_db();
        let id = db.get_or_create_user("alex").unwrap();
        let active = db.active_user().unwrap().unwrap();
        assert_eq!(active.id, id);

        db.get_or_create_user("sam").unwrap();
        assert_eq!(db.active_user().unwrap().unwrap().name, "alex");

        db.set_active_user("sam").unwrap();
        assert_eq!(db.active_user().unwrap().unwrap().name, "sam");
    }

    #[test]
    fn switching_to_unknown_user_fails() {
        let db = test_db();
        assert!(db.set_active_user("nobody").is_err());
    }

    #[test]
    fn add_and_get_round_trips_dates_and_status() {
        let db = test_db();
        let user = db.get_or_create_user("alex").unwrap();
        let id = db.add_application(user, &sample("Acme")).unwrap();

        let app = db.get_application(user, id).unwrap().unwrap();
        assert_eq!(app.company, "Acme");
        assert_eq!(app.status, Some(Status::Applied));
        assert_eq!(app.applied_date, Some("2024-03-01".parse().unwrap()));
        assert_eq!(app.response_date, None);
        assert_eq!(app.salary_min, Some(90_000));
    }

    #[test]
    fn applications_are_scoped_by_user() {
        let db = test_db();
        let alex = db.get_or_create_user("alex").unwrap();
        let sam = db.get_or_create_user("sam").unwrap();
        let id = db.add_application(alex, &sample("Acme")).unwrap();

        assert!(db.get_application(sam, id).unwrap().is_none());
        assert_eq!(
            db.list_applications(sam, None, "applied_date", true)
                .unwrap()
                .len(),
            0
        );
        assert_eq!(
            db.list_applications(alex, None, "applied_date", true)
                .unwrap()
                .len(),
            1
        );
        assert!(!db.delete_application(sam, id).unwrap());
        assert!(db.get_application(alex, id).unwrap().is_some());
    }

    #[test]
    fn list_filters_by_status_and_rejects_bad_sort() {
        let db = test_db();
        let user = db.get_or_create_user("alex").unwrap();
        db.add_application(user, &sample("Acme")).unwrap();
        let mut offer = sample("Globex");
        offer.status = Some(Status::Offer);
        db.add_application(user, &offer).unwrap();

        let offers = db
            .list_applications(user, Some(Status::Offer), "applied_date", true)
            .unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].company, "Globex");

        assert!(db
            .list_applications(user, None, "1; DROP TABLE applications", true)
            .is_err());
    }

    #[test]
    fn list_sorts_by_requested_column() {
        let db = test_db();
        let user = db.get_or_create_user("alex").unwrap();
        let mut early = sample("Globex");
        early.applied_date = "2024-02-01".parse().unwrap();
        db.add_application(user, &sample("Acme")).unwrap();
        db.add_application(user, &early).unwrap();

        let apps = db
            .list_applications(user, None, "applied_date", false)
            .unwrap();
        assert_eq!(apps[0].company, "Globex");
        assert_eq!(apps[1].company, "Acme");

        let apps = db.list_applications(user, None, "company", false).unwrap();
        assert_eq!(apps[0].company, "Acme");
    }

    #[test]
    fn update_sets_and_clears_fields_independently() {
        let db = test_db();
        let user = db.get_or_create_user("alex").unwrap();
        let id = db.add_application(user, &sample("Acme")).unwrap();

        let update = ApplicationUpdate {
            status: Some(Status::PhoneScreen),
            response_date: Some(Some("2024-03-10".parse().unwrap())),
            salary_max: Some(130_000),
            ..Default::default()
        };
        assert!(db.update_application(user, id, &update).unwrap());

        let app = db.get_application(user, id).unwrap().unwrap();
        assert_eq!(app.status, Some(Status::PhoneScreen));
        assert_eq!(app.response_date, Some("2024-03-10".parse().unwrap()));
        assert_eq!(app.salary_max, Some(130_000));
        // untouched fields survive
        assert_eq!(app.company, "Acme");
        assert_eq!(app.applied_date, Some("2024-03-01".parse().unwrap()));

        let clear = ApplicationUpdate {
            response_date: Some(None),
            ..Default::default()
        };
        assert!(db.update_application(user, id, &clear).unwrap());
        let app = db.get_application(user, id).unwrap().unwrap();
        assert_eq!(app.response_date, None);
        // status stays: dates and status are edited independently
        assert_eq!(app.status, Some(Status::PhoneScreen));
    }

    #[test]
    fn empty_update_is_an_error() {
        let db = test_db();
        let user = db.get_or_create_user("alex").unwrap();
        let id = db.add_application(user, &sample("Acme")).unwrap();
        assert!(db
            .update_application(user, id, &ApplicationUpdate::default())
            .is_err());
    }
}
