//! Stored responses within a generation.
//!
//! Every write is a full overwrite of one row, keyed by
//! (generation, request identity).

use super::generations::Generation;
use super::hash::compute_request_key;
use crate::Error;
use crate::request::{Request, Response};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// Raw row as read from the `entries` table.
struct EntryRow {
    url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn into_response(self) -> Result<Response, Error> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| Error::CorruptEntry(format!("{}: status {}: {e}", self.url, self.status)))?;
        let headers = headers_from_json(&self.headers_json)?;
        Ok(Response { status, headers, body: Bytes::from(self.body), url: Url::parse(&self.url).ok() })
    }
}

/// Header values are kept as raw bytes; they need not be visible ASCII.
fn headers_to_json(headers: &HeaderMap) -> Result<String, Error> {
    let pairs: Vec<(&str, &[u8])> = headers.iter().map(|(name, value)| (name.as_str(), value.as_bytes())).collect();
    serde_json::to_string(&pairs).map_err(|e| Error::CorruptEntry(e.to_string()))
}

fn headers_from_json(json: &str) -> Result<HeaderMap, Error> {
    let pairs: Vec<(String, Vec<u8>)> =
        serde_json::from_str(json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let value = HeaderValue::from_bytes(&value).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        headers.append(name, value);
    }
    Ok(headers)
}

impl Generation {
    /// Store `response` as the entry for `request`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// - `UnsupportedMethod` for anything but GET
    /// - `InvalidUrl` for non-HTTP(S) URLs
    /// - `Database` if the generation no longer exists
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        if request.method != Method::GET {
            return Err(Error::UnsupportedMethod(request.method.to_string()));
        }
        if !request.is_http() {
            return Err(Error::InvalidUrl(format!("cannot store {} URL", request.url.scheme())));
        }

        let identity = request.identity();
        let key = compute_request_key(request.method.as_str(), &identity);
        let method = request.method.to_string();
        let status = response.status.as_u16();
        let headers_json = headers_to_json(&response.headers)?;
        // Bytes -> Vec copies once here; the caller's response body is untouched.
        let body = response.body.to_vec();
        let generation = self.name.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                    generation, key_hash, method, url, status, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(generation, key_hash) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![generation, key, method, identity, status, headers_json, body, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for `request`.
    ///
    /// Non-GET requests never match.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if request.method != Method::GET {
            return Ok(None);
        }

        let key = compute_request_key(request.method.as_str(), &request.identity());
        let generation = self.name.clone();
        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, body
                FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    Ok(EntryRow { url: row.get(0)?, status: row.get(1)?, headers_json: row.get(2)?, body: row.get(3)? })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Delete the entry for `request`.
    ///
    /// Returns false if nothing was stored for it.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let key = compute_request_key(request.method.as_str(), &request.identity());
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE generation = ?1 AND key_hash = ?2",
                    params![generation, key],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Identities stored in this generation, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored entries.
    pub async fn len(&self) -> Result<u64, Error> {
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }
}
