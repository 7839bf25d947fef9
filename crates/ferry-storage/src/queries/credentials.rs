// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential and session-health operations.

use ferry_core::FerryError;
use ferry_core::types::{Credential, SessionHealth, UserId};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Users holding a valid credential, ordered by user id.
pub async fn valid_credentials(db: &Database) -> Result<Vec<(UserId, Credential)>, FerryError> {
    db.connection()
        .call(|conn| -> Result<Vec<(UserId, Credential)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT user_id, credential FROM credentials WHERE valid = 1 ORDER BY user_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        UserId(row.get(0)?),
                        Credential::new(row.get::<_, String>(1)?),
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// The user's credential, if present and still valid.
pub async fn get_credential(db: &Database, user: UserId) -> Result<Option<Credential>, FerryError> {
    db.connection()
        .call(move |conn| -> Result<Option<Credential>, rusqlite::Error> {
            let result = conn.query_row(
                "SELECT credential FROM credentials WHERE user_id = ?1 AND valid = 1",
                params![user.0],
                |row| row.get::<_, String>(0),
            );
            match result {
                Ok(value) => Ok(Some(Credential::new(value))),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Store a credential, replacing any previous one and marking it valid.
pub async fn save_credential(
    db: &Database,
    user: UserId,
    credential: &Credential,
) -> Result<(), FerryError> {
    let value = credential.expose().to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO credentials (user_id, credential, valid)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT(user_id) DO UPDATE SET
                    credential = excluded.credential,
                    valid = 1,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![user.0, value],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a credential invalid. The row is kept so health history survives.
pub async fn invalidate_credential(db: &Database, user: UserId) -> Result<(), FerryError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE credentials SET valid = 0, healthy = 0,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?1",
                params![user.0],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record the outcome of the latest health check for a user.
pub async fn set_session_health(
    db: &Database,
    user: UserId,
    healthy: bool,
    detail: Option<&str>,
) -> Result<(), FerryError> {
    let detail = detail.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE credentials SET healthy = ?1, health_detail = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?3",
                params![healthy, detail, user.0],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Health of every known user session.
pub async fn session_health(db: &Database) -> Result<Vec<SessionHealth>, FerryError> {
    db.connection()
        .call(|conn| -> Result<Vec<SessionHealth>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT user_id, healthy, valid, health_detail, updated_at
                 FROM credentials ORDER BY user_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(SessionHealth {
                        user: UserId(row.get(0)?),
                        healthy: row.get(1)?,
                        credential_valid: row.get(2)?,
                        detail: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}
