use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use portico_core::{
    NewProduct, NewUser, Product, ProductPatch, ProductStore, Role, StoreError, User, UserStore,
};

/// SQLite-backed user and product store. One connection, serialised by a
/// mutex; every statement is short.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_tables(&self) -> Result<(), StoreError> {
        self.conn()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'USER',
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
            )
            .map_err(backend)
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn write_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => StoreError::Duplicate,
        _ => backend(err),
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, email, role, created_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price, created_at, updated_at";

fn user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        role: Role::from(role),
        created_at: row.get(5)?,
    })
}

fn product_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn get_product_in(conn: &Connection, id: i64) -> Result<Product, StoreError> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
        [id],
        product_row,
    )
    .optional()
    .map_err(backend)?
    .ok_or(StoreError::NotFound)
}

impl UserStore for SqliteStore {
    fn create_user(&self, user: &NewUser, now: i64) -> Result<User, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (username, password_hash, email, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.username, user.password_hash, user.email, user.role.as_str(), now],
        )
        .map_err(write_error)?;
        Ok(User {
            id: conn.last_insert_rowid(),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            created_at: now,
        })
    }

    fn find_user_by_name(&self, username: &str) -> Result<User, StoreError> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                user_row,
            )
            .optional()
            .map_err(backend)?
            .ok_or(StoreError::NotFound)
    }

    fn get_user(&self, id: i64) -> Result<User, StoreError> {
        self.conn()
            .query_row(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"), [id], user_row)
            .optional()
            .map_err(backend)?
            .ok_or(StoreError::NotFound)
    }

    fn set_role(&self, username: &str, role: &Role) -> Result<(), StoreError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET role = ?1 WHERE username = ?2",
                params![role.as_str(), username],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .map_err(backend)?;
        let rows = stmt.query_map([], user_row).map_err(backend)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)
    }
}

impl ProductStore for SqliteStore {
    fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
            .map_err(backend)?;
        let rows = stmt.query_map([], product_row).map_err(backend)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)
    }

    fn get_product(&self, id: i64) -> Result<Product, StoreError> {
        get_product_in(&self.conn(), id)
    }

    fn create_product(&self, product: &NewProduct, now: i64) -> Result<Product, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO products (name, description, price, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
            params![product.name, product.description, product.price, now],
        )
        .map_err(write_error)?;
        Ok(Product {
            id: conn.last_insert_rowid(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_product(&self, id: i64, patch: &ProductPatch, now: i64) -> Result<Product, StoreError> {
        let conn = self.conn();
        let mut product = get_product_in(&conn, id)?;
        patch.apply(&mut product, now);
        conn.execute(
            "UPDATE products SET name = ?1, description = ?2, price = ?3, updated_at = ?4 WHERE id = ?5",
            params![product.name, product.description, product.price, product.updated_at, id],
        )
        .map_err(write_error)?;
        Ok(product)
    }

    fn delete_product(&self, id: i64) -> Result<(), StoreError> {
        let removed = self
            .conn()
            .execute("DELETE FROM products WHERE id = ?1", [id])
            .map_err(backend)?;
        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
