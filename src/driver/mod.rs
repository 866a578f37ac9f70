//! Connection and cursor interface.
//!
//! ```rust,ignore
//! use sqlfauna::driver::{connect_url, Params};
//!
//! let conn = connect_url("fauna://SECRET@db.fauna.com")?;
//! let mut cursor = conn.cursor();
//! cursor
//!     .execute("SELECT users.name FROM users WHERE users.age > %(age)s", &Params::named([("age", 30)]))
//!     .await?;
//! for row in cursor.fetch_all()? {
//!     println!("{:?}", row);
//! }
//! ```

pub mod cursor;
pub mod memory;
pub mod params;
pub mod transport;
pub mod wire;

pub use cursor::{Cursor, Row};
pub use memory::MemoryTransport;
pub use params::Params;
pub use transport::{HttpTransport, Transport};

use std::sync::Arc;

use crate::config::Config;
use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::Translator;

/// Connection-string scheme the driver registers under.
pub const DIALECT: &str = "fauna";

/// Open a connection over HTTP.
///
/// No request is made until the first statement executes.
pub fn connect(config: Config) -> FaunaResult<Connection> {
    let transport = HttpTransport::new(&config)?;
    tracing::debug!(endpoint = transport.endpoint(), config = ?config, "connecting");
    Ok(Connection::with_transport(Arc::new(transport)).page_size(config.page_size))
}

/// Open a connection from a `fauna://SECRET@host[:port]` URL.
pub fn connect_url(url: &str) -> FaunaResult<Connection> {
    connect(Config::from_url(url)?)
}

/// A session with the store.
///
/// Cursors borrow the connection; closing it consumes it.
pub struct Connection {
    transport: Arc<dyn Transport>,
    translator: Translator,
}

impl Connection {
    /// Use a custom transport, e.g. [`MemoryTransport`].
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            translator: Translator::default(),
        }
    }

    /// Documents fetched per page.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.translator = Translator::new(page_size);
        self
    }

    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self)
    }

    /// Every statement is committed by the store as it executes.
    pub fn commit(&self) -> FaunaResult<()> {
        tracing::debug!("commit: no-op, statements are applied as they execute");
        Ok(())
    }

    /// Nothing to roll back; see [`Connection::commit`].
    pub fn rollback(&self) -> FaunaResult<()> {
        tracing::debug!("rollback: no-op, statements are applied as they execute");
        Ok(())
    }

    /// Multi-statement transactions are not available.
    pub fn begin(&self) -> FaunaResult<()> {
        Err(FaunaError::NotSupported(
            "multi-statement transactions".to_string(),
        ))
    }

    pub fn close(self) {
        tracing::debug!("connection closed");
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn translator(&self) -> &Translator {
        &self.translator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;
    use pretty_assertions::assert_eq;

    fn memory() -> Connection {
        Connection::with_transport(Arc::new(MemoryTransport::new()))
    }

    #[tokio::test]
    async fn test_insert_then_select() {
        let conn = memory();
        let mut cursor = conn.cursor();
        cursor
            .execute(
                "INSERT INTO users (name, age) VALUES (%s, %s), (%s, %s)",
                &Params::positional([Value::from("Bob"), Value::Int(30), Value::from("Al"), Value::Int(20)]),
            )
            .await
            .unwrap();
        assert_eq!(cursor.row_count(), 2);
        assert_eq!(cursor.last_row_id(), Some("2"));

        cursor
            .execute("SELECT users.name FROM users ORDER BY users.age", &Params::none())
            .await
            .unwrap();
        assert_eq!(cursor.description(), Some(&["name".to_string()][..]));
        assert_eq!(cursor.fetch_one().unwrap(), Some(vec![Value::from("Al")]));
        assert_eq!(cursor.fetch_all().unwrap(), vec![vec![Value::from("Bob")]]);
        assert_eq!(cursor.fetch_one().unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_without_result_set() {
        let conn = memory();
        let mut cursor = conn.cursor();
        assert!(matches!(cursor.fetch_all(), Err(FaunaError::Interface(_))));
        cursor
            .execute("INSERT INTO users (name) VALUES ('Bob')", &Params::none())
            .await
            .unwrap();
        assert!(matches!(cursor.fetch_one(), Err(FaunaError::Interface(_))));
    }

    #[tokio::test]
    async fn test_closed_cursor() {
        let conn = memory();
        let mut cursor = conn.cursor();
        cursor.close();
        let err = cursor
            .execute("SELECT users.name FROM users", &Params::none())
            .await
            .unwrap_err();
        assert!(matches!(err, FaunaError::Interface(_)));
    }

    #[test]
    fn test_transactions() {
        let conn = memory();
        assert!(conn.commit().is_ok());
        assert!(conn.rollback().is_ok());
        assert!(matches!(conn.begin(), Err(FaunaError::NotSupported(_))));
        conn.close();
    }

    #[test]
    fn test_connect_url() {
        assert!(connect_url("fauna://secret@localhost:8443/?scheme=http").is_ok());
        assert!(matches!(connect_url("fauna://localhost"), Err(FaunaError::Config(_))));
    }
}
