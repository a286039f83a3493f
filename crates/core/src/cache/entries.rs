//! Stored entry operations.
//!
//! Entries are keyed by [`Request::cache_key`] inside a generation. Writes
//! replace the whole entry; nothing reads an entry to compute the next one.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{Request, StoredResponse};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Summary of a stored entry, without its body.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryInfo {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body_len: usize,
    pub stored_at: String,
}

/// A row ready to be written, with the request already reduced to its key.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &Request, response: &StoredResponse) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("cannot store a {} request", request.method)));
        }
        Ok(Self {
            key_hash: request.cache_key(),
            method: request.method.clone(),
            url: request.cache_url(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }

    fn upsert(&self, conn: &rusqlite::Connection, generation: &str, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
            params![generation, stored_at],
        )?;
        conn.execute(
            "INSERT INTO entries (
                generation, key_hash, method, url, status, status_text,
                headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(generation, key_hash) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                status = excluded.status,
                status_text = excluded.status_text,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                generation,
                &self.key_hash,
                &self.method,
                &self.url,
                self.status,
                &self.status_text,
                &self.headers_json,
                &self.body,
                stored_at,
            ],
        )?;
        Ok(())
    }
}

impl CacheDb {
    /// Store a response under the request's key, replacing any prior entry.
    ///
    /// Opens the generation if it does not exist yet. Only `GET` requests can
    /// be stored.
    pub async fn put_response(
        &self, generation: &str, request: &Request, response: &StoredResponse,
    ) -> Result<(), Error> {
        let row = EntryRow::new(request, response)?;
        let generation = generation.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { row.upsert(conn, &generation, &stored_at) })
            .await
            .map_err(Error::from)
    }

    /// Store several responses in one transaction: either all are written or
    /// none are.
    pub async fn put_responses(&self, generation: &str, entries: &[(Request, StoredResponse)]) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let generation = generation.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    row.upsert(&tx, &generation, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request.
    ///
    /// Returns None on a miss, for a missing generation, and for any non-`GET`
    /// request.
    pub async fn match_response(
        &self, generation: &str, request: &Request,
    ) -> Result<Option<StoredResponse>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let generation = generation.to_string();
        let key_hash = request.cache_key();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, status_text, headers_json, body
                    FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key_hash], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                });

                match result {
                    Ok((status, status_text, headers_json, body)) => Ok(Some(StoredResponse {
                        status,
                        status_text,
                        headers: serde_json::from_str(&headers_json)?,
                        body: Bytes::from(body),
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// List the entries of a generation, ordered by URL.
    pub async fn list_entries(&self, generation: &str) -> Result<Vec<EntryInfo>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, headers_json, length(body), stored_at
                    FROM entries WHERE generation = ?1 ORDER BY url",
                )?;
                let rows = stmt
                    .query_map(params![generation], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u16>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(method, url, status, headers_json, body_len, stored_at)| -> Result<EntryInfo, Error> {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        let content_type = headers
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                            .map(|(_, v)| v.clone());
                        Ok(EntryInfo { method, url, status, content_type, body_len: body_len as usize, stored_at })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }
}
