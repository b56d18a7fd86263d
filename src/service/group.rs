//! Group service
//!
//! List, get, create, update and delete over the `groups` table. Each
//! operation issues at most one statement, so none of them needs a
//! transaction.

use sea_orm::Value;
use serde::Deserialize;
use std::fmt;

use super::{ServiceError, ServiceResult};
use crate::db::Gateway;
use crate::entity::group::{self, NAME_MAX_LEN};

/// Row shape returned by every statement. Casts and the coalesce let tables
/// made by older setup tools (`TIMESTAMP`, nullable `"membersCount"`) decode.
macro_rules! group_columns {
    () => {
        r#"id, name, description, COALESCE("membersCount", 0) AS "membersCount", "createdAt"::timestamptz AS "createdAt", "updatedAt"::timestamptz AS "updatedAt""#
    };
}

const LIST_GROUPS: &str = concat!("SELECT ", group_columns!(), " FROM groups ORDER BY id DESC");

const GET_GROUP: &str = concat!("SELECT ", group_columns!(), " FROM groups WHERE id = $1");

const INSERT_GROUP: &str = concat!(
    r#"INSERT INTO groups (name, description, "membersCount") VALUES ($1, $2, $3) RETURNING "#,
    group_columns!()
);

const UPDATE_GROUP: &str = concat!(
    r#"UPDATE groups SET name = $1, description = $2, "membersCount" = $3, "updatedAt" = CURRENT_TIMESTAMP WHERE id = $4 RETURNING "#,
    group_columns!()
);

const DELETE_GROUP: &str = concat!("DELETE FROM groups WHERE id = $1 RETURNING ", group_columns!());

/// Group id as received from the client.
///
/// Not validated up front: an id that is not an integer can never match a
/// row, so looking it up simply yields "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Integer form used as the bound parameter, if the raw id has one
    fn as_key(&self) -> Option<i64> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i32> for GroupId {
    fn from(id: i32) -> Self {
        Self(id.to_string())
    }
}

/// Create/update payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupInput {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Loosely typed: numbers and numeric strings are accepted
    #[serde(rename = "membersCount")]
    pub members_count: Option<serde_json::Value>,
}

/// Payload that passed validation, ready to bind
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidGroup {
    name: String,
    description: Option<String>,
    members_count: i32,
}

impl GroupInput {
    fn validate(self) -> ServiceResult<ValidGroup> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ServiceError::Validation("Name is required".to_string()))?;

        if name.chars().count() > NAME_MAX_LEN {
            return Err(ServiceError::Validation(format!(
                "Name must not exceed {} characters",
                NAME_MAX_LEN
            )));
        }

        Ok(ValidGroup {
            name: name.to_string(),
            description: self.description.filter(|d| !d.is_empty()),
            members_count: members_count(self.members_count.as_ref())?,
        })
    }
}

/// Coerce the loosely typed membersCount; anything non-numeric becomes 0,
/// numbers that do not fit the column are rejected
fn members_count(value: Option<&serde_json::Value>) -> ServiceResult<i32> {
    use serde_json::Value as Json;

    let number = match value {
        Some(Json::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Some(Json::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n < 0 => Err(ServiceError::Validation(
            "membersCount must not be negative".to_string(),
        )),
        Some(n) => i32::try_from(n).map_err(|_| {
            ServiceError::Validation(format!("membersCount must not exceed {}", i32::MAX))
        }),
        None => Ok(0),
    }
}

/// Group CRUD over an injected [`Gateway`]
#[derive(Clone, Debug)]
pub struct GroupService {
    gateway: Gateway,
}

impl GroupService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// All groups, newest first
    pub async fn list(&self) -> ServiceResult<Vec<group::Model>> {
        Ok(self.gateway.fetch_all(LIST_GROUPS, vec![]).await?)
    }

    pub async fn get(&self, id: &GroupId) -> ServiceResult<group::Model> {
        let key = id.as_key().ok_or(ServiceError::NotFound)?;

        self.gateway
            .fetch_optional(GET_GROUP, vec![Value::BigInt(Some(key))])
            .await?
            .ok_or(ServiceError::NotFound)
    }

    pub async fn create(&self, input: GroupInput) -> ServiceResult<group::Model> {
        let valid = input.validate()?;

        let created: group::Model = self
            .gateway
            .fetch_optional(INSERT_GROUP, valid.into_values())
            .await?
            .ok_or(ServiceError::Persistence(sea_orm::DbErr::RecordNotInserted))?;

        tracing::info!("Created group {} ({})", created.id, created.name);
        Ok(created)
    }

    /// Overwrite name, description and membersCount; refreshes updatedAt
    pub async fn update(&self, id: &GroupId, input: GroupInput) -> ServiceResult<group::Model> {
        let valid = input.validate()?;
        let key = id.as_key().ok_or(ServiceError::NotFound)?;

        let mut values = valid.into_values();
        values.push(Value::BigInt(Some(key)));

        let updated: group::Model = self
            .gateway
            .fetch_optional(UPDATE_GROUP, values)
            .await?
            .ok_or(ServiceError::NotFound)?;

        tracing::info!("Updated group {}", updated.id);
        Ok(updated)
    }

    /// Hard delete; returns the removed row
    pub async fn delete(&self, id: &GroupId) -> ServiceResult<group::Model> {
        let key = id.as_key().ok_or(ServiceError::NotFound)?;

        let deleted: group::Model = self
            .gateway
            .fetch_optional(DELETE_GROUP, vec![Value::BigInt(Some(key))])
            .await?
            .ok_or(ServiceError::NotFound)?;

        tracing::info!("Deleted group {} ({})", deleted.id, deleted.name);
        Ok(deleted)
    }
}

impl ValidGroup {
    fn into_values(self) -> Vec<Value> {
        vec![
            Value::from(self.name),
            Value::from(self.description),
            Value::from(self.members_count),
        ]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase};
    use serde_json::json;
    use std::sync::Arc;

    use crate::db::tests::{mock_gateway, statement, transaction_log};

    pub(crate) fn sample_group(id: i32, name: &str) -> group::Model {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        group::Model {
            id,
            name: name.to_string(),
            description: None,
            members_count: 0,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn service_with(results: Vec<Vec<group::Model>>) -> (GroupService, Arc<DatabaseConnection>) {
        let (gateway, conn) =
            mock_gateway(MockDatabase::new(DatabaseBackend::Postgres).append_query_results(results));
        (GroupService::new(gateway), conn)
    }

    fn input(value: serde_json::Value) -> GroupInput {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (service, conn) =
            service_with(vec![vec![sample_group(3, "c"), sample_group(1, "a")]]);

        let groups = service.list().await.unwrap();
        assert_eq!(groups.iter().map(|g| g.id).collect::<Vec<_>>(), vec![3, 1]);
        drop(service);

        assert_eq!(transaction_log(conn), vec![statement(LIST_GROUPS, vec![])]);
        assert!(LIST_GROUPS.ends_with("ORDER BY id DESC"));
    }

    #[test]
    fn test_reads_tolerate_legacy_columns() {
        for sql in [LIST_GROUPS, GET_GROUP, INSERT_GROUP, UPDATE_GROUP, DELETE_GROUP] {
            assert!(sql.contains(r#"COALESCE("membersCount", 0) AS "membersCount""#), "{}", sql);
            assert!(sql.contains(r#""createdAt"::timestamptz AS "createdAt""#), "{}", sql);
            assert!(sql.contains(r#""updatedAt"::timestamptz AS "updatedAt""#), "{}", sql);
        }
    }

    #[tokio::test]
    async fn test_list_empty_is_ok() {
        let (service, _conn) = service_with(vec![vec![]]);
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_found_and_missing() {
        let (service, conn) = service_with(vec![vec![sample_group(5, "Chess Club")], vec![]]);

        let found = service.get(&GroupId::from(5)).await.unwrap();
        assert_eq!(found.name, "Chess Club");

        let missing = service.get(&GroupId::from(999)).await;
        assert!(matches!(missing, Err(ServiceError::NotFound)));
        drop(service);

        assert_eq!(
            transaction_log(conn),
            vec![
                statement(GET_GROUP, vec![Value::BigInt(Some(5))]),
                statement(GET_GROUP, vec![Value::BigInt(Some(999))]),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_not_found() {
        let (service, conn) = service_with(vec![]);

        for raw in ["abc", "", "1.5"] {
            let id = GroupId::new(raw);
            assert!(matches!(service.get(&id).await, Err(ServiceError::NotFound)));
            assert!(matches!(service.delete(&id).await, Err(ServiceError::NotFound)));
            assert!(matches!(
                service.update(&id, input(json!({"name": "X"}))).await,
                Err(ServiceError::NotFound)
            ));
        }
        drop(service);
        assert!(transaction_log(conn).is_empty());
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let (service, conn) = service_with(vec![vec![sample_group(4, "Chess Club")]]);

        let created = service.create(input(json!({"name": "  Chess Club "}))).await.unwrap();
        assert_eq!(created.id, 4);
        assert_eq!(created.description, None);
        assert_eq!(created.members_count, 0);
        drop(service);

        assert_eq!(
            transaction_log(conn),
            vec![statement(
                INSERT_GROUP,
                vec![
                    Value::from("Chess Club"),
                    Value::String(None),
                    Value::Int(Some(0)),
                ]
            )]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_missing_or_blank_name() {
        let (service, conn) = service_with(vec![]);

        for body in [
            json!({"description": "no name"}),
            json!({"name": ""}),
            json!({"name": "   \t"}),
            json!({"name": null}),
        ] {
            let result = service.create(input(body)).await;
            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }
        drop(service);
        assert!(transaction_log(conn).is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_overlong_name() {
        let (service, conn) = service_with(vec![]);

        let name = "x".repeat(NAME_MAX_LEN + 1);
        let result = service.create(input(json!({ "name": name }))).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        drop(service);
        assert!(transaction_log(conn).is_empty());
    }

    #[test]
    fn test_members_count_coercion() {
        let cases = [
            (None, 0),
            (Some(json!(null)), 0),
            (Some(json!(12)), 12),
            (Some(json!(12.0)), 12),
            (Some(json!(12.5)), 0),
            (Some(json!("42")), 42),
            (Some(json!(" 7 ")), 7),
            (Some(json!("lots")), 0),
            (Some(json!(true)), 0),
            (Some(json!([1])), 0),
            (Some(json!(2_147_483_647_i64)), i32::MAX),
        ];
        for (value, expected) in cases {
            assert_eq!(members_count(value.as_ref()).unwrap(), expected, "{:?}", value);
        }

        assert!(matches!(
            members_count(Some(&json!(-1))),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            members_count(Some(&json!("-3"))),
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_members_count_out_of_range_is_rejected() {
        let (service, conn) = service_with(vec![]);

        for value in [json!(10_000_000_000_i64), json!("2147483648"), json!(1e12)] {
            let result = service
                .create(input(json!({"name": "Big", "membersCount": value.clone()})))
                .await;
            assert!(
                matches!(&result, Err(ServiceError::Validation(msg)) if msg.contains("membersCount")),
                "{:?}",
                value
            );
        }
        drop(service);
        assert!(transaction_log(conn).is_empty());
    }

    #[test]
    fn test_empty_description_becomes_null() {
        let valid = input(json!({"name": "A", "description": ""})).validate().unwrap();
        assert_eq!(valid.description, None);

        let valid = input(json!({"name": "A", "description": "hi"})).validate().unwrap();
        assert_eq!(valid.description.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp_only() {
        let before = sample_group(9, "Old");
        let mut after = before.clone();
        after.name = "New".to_string();
        after.members_count = 3;
        after.updated_at = before.updated_at + Duration::seconds(5);

        let (service, conn) = service_with(vec![vec![after.clone()]]);

        let updated = service
            .update(&GroupId::from(9), input(json!({"name": "New", "membersCount": "3"})))
            .await
            .unwrap();
        assert_eq!(updated.id, before.id);
        assert_eq!(updated.created_at, before.created_at);
        assert!(updated.updated_at >= before.updated_at);
        drop(service);

        assert!(UPDATE_GROUP.contains(r#""updatedAt" = CURRENT_TIMESTAMP"#));
        assert!(!UPDATE_GROUP.contains(r#""createdAt" ="#));
        assert_eq!(
            transaction_log(conn),
            vec![statement(
                UPDATE_GROUP,
                vec![
                    Value::from("New"),
                    Value::String(None),
                    Value::Int(Some(3)),
                    Value::BigInt(Some(9)),
                ]
            )]
        );
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (service, _conn) = service_with(vec![vec![]]);
        let result = service
            .update(&GroupId::from(999), input(json!({"name": "X"})))
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_validates_before_lookup() {
        let (service, conn) = service_with(vec![]);
        let result = service.update(&GroupId::from(1), input(json!({"name": " "}))).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        drop(service);
        assert!(transaction_log(conn).is_empty());
    }

    #[tokio::test]
    async fn test_delete_returns_removed_row() {
        let (service, _conn) = service_with(vec![vec![sample_group(2, "Gone")], vec![]]);

        let deleted = service.delete(&GroupId::from(2)).await.unwrap();
        assert_eq!(deleted.name, "Gone");

        let again = service.delete(&GroupId::from(2)).await;
        assert!(matches!(again, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_store_failure_is_persistence_error() {
        let (gateway, _conn) = mock_gateway(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("connection refused".to_string())]),
        );
        let service = GroupService::new(gateway);

        assert!(matches!(
            service.list().await,
            Err(ServiceError::Persistence(_))
        ));
    }
}
