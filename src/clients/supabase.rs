//! Supabase client: GoTrue for token resolution, PostgREST for rows.
//!
//! One instance is built at startup and shared behind `Arc`; the underlying
//! `reqwest::Client` pools connections for us.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::auth::{IdentityStore, Profile, User};
use crate::config::SupabaseConfig;
use crate::store::{
    ListQuery, NewNotification, Notification, NotificationStore, ReminderCandidate, ReminderKind,
    StoreError, TechLocation,
};

#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: Url,
    service_role_key: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(&config.url)
            .map_err(|e| StoreError::Rejected(format!("invalid Supabase URL '{}': {}", config.url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder().gzip(true).build()?;

        Ok(Self {
            http,
            base_url,
            service_role_key: config.service_role_key.clone(),
            anon_key: config
                .anon_key
                .clone()
                .unwrap_or_else(|| config.service_role_key.clone()),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::Rejected(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// PostgREST request authenticated with the service-role key
    fn table(&self, method: Method, table: &str) -> Result<RequestBuilder, StoreError> {
        let url = self.endpoint(&format!("rest/v1/{}", table))?;
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected(error_message(status, &body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Pull the human-readable message out of a GoTrue / PostgREST error body
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| format!("Supabase responded with {}", status))
}

/// PostgREST `in.(...)` filter with every value double-quoted, so commas
/// and parentheses inside a value stay part of it
fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Column layout of the tables the reminder jobs scan
struct ReminderSource {
    user_column: &'static str,
    due_column: &'static str,
    status: &'static str,
}

fn reminder_source(kind: ReminderKind) -> ReminderSource {
    match kind {
        ReminderKind::Appointment => ReminderSource {
            user_column: "client_id",
            due_column: "scheduled_at",
            status: "scheduled",
        },
        ReminderKind::Contract => ReminderSource {
            user_column: "vendor_id",
            due_column: "end_date",
            status: "active",
        },
        ReminderKind::Quote => ReminderSource {
            user_column: "client_id",
            due_column: "created_at",
            status: "pending",
        },
    }
}

#[derive(Deserialize)]
struct PreferencesRow {
    preferences: Value,
}

#[async_trait]
impl IdentityStore for SupabaseClient {
    async fn resolve_token(&self, token: &str) -> Result<User, StoreError> {
        let url = self.endpoint("auth/v1/user")?;
        let request = self
            .http
            .get(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token);
        self.send(request).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let request = self
            .table(Method::GET, "profiles")?
            .query(&[("id", format!("eq.{}", user_id)), ("select", "*".to_string())]);
        let rows: Vec<Profile> = self.send(request).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl NotificationStore for SupabaseClient {
    async fn list_notifications(&self, user_id: &str, query: ListQuery) -> Result<Vec<Notification>, StoreError> {
        let mut params = vec![
            ("user_id", format!("eq.{}", user_id)),
            ("order", "created_at.desc".to_string()),
        ];
        if query.unread_only {
            params.push(("read", "eq.false".to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let request = self.table(Method::GET, "notifications")?.query(&params);
        self.send(request).await
    }

    async fn create_notification(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let request = self
            .table(Method::POST, "notifications")?
            .header("Prefer", "return=representation")
            .json(&new);
        let rows: Vec<Notification> = self.send(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn mark_read(&self, user_id: &str, ids: Option<Vec<String>>) -> Result<usize, StoreError> {
        let mut params = vec![
            ("user_id", format!("eq.{}", user_id)),
            ("read", "eq.false".to_string()),
        ];
        if let Some(ids) = ids {
            params.push(("id", in_filter(&ids)));
        }

        let request = self
            .table(Method::PATCH, "notifications")?
            .query(&params)
            .header("Prefer", "return=representation")
            .json(&json!({ "read": true, "read_at": timestamp(Utc::now()) }));
        let rows: Vec<Value> = self.send(request).await?;
        Ok(rows.len())
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
        let request = self.table(Method::GET, "notification_preferences")?.query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("select", "preferences".to_string()),
        ]);
        let rows: Vec<PreferencesRow> = self.send(request).await?;
        Ok(rows.into_iter().next().map(|row| row.preferences))
    }

    async fn put_preferences(&self, user_id: &str, preferences: Value) -> Result<Value, StoreError> {
        let request = self
            .table(Method::POST, "notification_preferences")?
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&json!({
                "user_id": user_id,
                "preferences": preferences,
                "updated_at": timestamp(Utc::now()),
            }));
        let rows: Vec<PreferencesRow> = self.send(request).await?;
        rows.into_iter()
            .next()
            .map(|row| row.preferences)
            .ok_or_else(|| StoreError::Decode("upsert returned no rows".to_string()))
    }

    async fn record_tech_location(&self, location: TechLocation) -> Result<TechLocation, StoreError> {
        let request = self
            .table(Method::POST, "tech_locations")?
            .header("Prefer", "return=representation")
            .json(&location);
        let rows: Vec<TechLocation> = self.send(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn latest_tech_location(&self, user_id: &str) -> Result<Option<TechLocation>, StoreError> {
        let request = self.table(Method::GET, "tech_locations")?.query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("order", "recorded_at.desc".to_string()),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<TechLocation> = self.send(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn due_reminders(&self, kind: ReminderKind, cutoff: DateTime<Utc>) -> Result<Vec<ReminderCandidate>, StoreError> {
        let source = reminder_source(kind);
        let select = format!(
            "record_id:id,user_id:{},title,due_at:{}",
            source.user_column, source.due_column
        );

        let mut params = vec![
            ("select", select),
            ("status", format!("eq.{}", source.status)),
            (source.due_column, format!("lte.{}", timestamp(cutoff))),
        ];
        if kind != ReminderKind::Quote {
            params.push((source.due_column, format!("gte.{}", timestamp(Utc::now()))));
        }

        let request = self.table(Method::GET, kind.table())?.query(&params);
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> SupabaseConfig {
        SupabaseConfig {
            url: url.to_string(),
            service_role_key: "service".to_string(),
            anon_key: None,
        }
    }

    #[test]
    fn endpoints_are_joined_under_base_path() {
        let client = SupabaseClient::new(&config("https://project.supabase.co")).unwrap();
        assert_eq!(
            client.endpoint("auth/v1/user").unwrap().as_str(),
            "https://project.supabase.co/auth/v1/user"
        );

        let proxied = SupabaseClient::new(&config("https://gateway.example.com/supabase")).unwrap();
        assert_eq!(
            proxied.endpoint("rest/v1/profiles").unwrap().as_str(),
            "https://gateway.example.com/supabase/rest/v1/profiles"
        );
    }

    #[test]
    fn anon_key_falls_back_to_service_key() {
        let client = SupabaseClient::new(&config("https://project.supabase.co")).unwrap();
        assert_eq!(client.anon_key, "service");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(SupabaseClient::new(&config("not a url")).is_err());
    }

    #[test]
    fn in_filter_quotes_each_value() {
        let ids = vec!["a1".to_string(), "b2),user_id.neq.(x".to_string(), r#"q"\"#.to_string()];
        assert_eq!(in_filter(&ids), r#"in.("a1","b2),user_id.neq.(x","q\"\\")"#);
    }

    #[test]
    fn error_message_prefers_body_fields() {
        assert_eq!(
            error_message(StatusCode::UNAUTHORIZED, r#"{"msg":"invalid JWT"}"#),
            "invalid JWT"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"column missing"}"#),
            "column missing"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>"),
            "Supabase responded with 502 Bad Gateway"
        );
    }
}
