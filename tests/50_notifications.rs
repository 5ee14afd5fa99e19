mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use heyspruce_api::store::{ReminderCandidate, ReminderKind};
use reqwest::StatusCode;
use serde_json::{json, Value};

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[tokio::test]
async fn create_list_and_mark_read() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let client = reqwest::Client::new();

    for title in ["Quote ready", "Invoice sent"] {
        let res = client
            .post(server.url("notifications"))
            .header("authorization", bearer(common::CLIENT_TOKEN))
            .json(&json!({ "title": title, "message": "Open the app for details" }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .get(format!("{}?unread_only=true", server.url("notifications")))
        .header("authorization", bearer(common::CLIENT_TOKEN))
        .send()
        .await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["count"], 2);
    assert_eq!(body["unread"], 2);
    let first_id = body["notifications"][0]["id"].as_str().unwrap_or_default().to_string();

    let res = client
        .post(server.url("mark-read"))
        .header("authorization", bearer(common::CLIENT_TOKEN))
        .json(&json!({ "ids": [first_id] }))
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?, json!({ "updated": 1 }));

    // No body marks the rest
    let res = client
        .put(server.url("mark-read"))
        .header("authorization", bearer(common::CLIENT_TOKEN))
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?, json!({ "updated": 1 }));

    let res = client
        .get(server.url("notifications"))
        .header("authorization", bearer(common::CLIENT_TOKEN))
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?["unread"], 0);
    Ok(())
}

#[tokio::test]
async fn notifying_another_user_requires_admin() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let client = reqwest::Client::new();
    let request = json!({ "user_id": common::TECH_ID, "title": "Job assigned", "message": "See schedule" });

    let res = client
        .post(server.url("notifications"))
        .header("authorization", bearer(common::CLIENT_TOKEN))
        .json(&request)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(server.url("notifications"))
        .header("authorization", bearer(common::ADMIN_TOKEN))
        .json(&request)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .get(server.url("notifications"))
        .header("authorization", bearer(common::TECH_TOKEN))
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?["notifications"][0]["title"], "Job assigned");
    Ok(())
}

#[tokio::test]
async fn preferences_round_trip_through_the_store() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("preferences"))
        .header("authorization", bearer(common::TECH_TOKEN))
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?, json!({ "preferences": {} }));

    let prefs = json!({ "email": false, "push": true, "quiet_hours": { "start": "22:00", "end": "07:00" } });
    let res = client
        .put(server.url("preferences"))
        .header("authorization", bearer(common::TECH_TOKEN))
        .json(&prefs)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(server.url("preferences"))
        .header("authorization", bearer(common::TECH_TOKEN))
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?["preferences"], prefs);

    let res = client
        .post(server.url("preferences"))
        .header("authorization", bearer(common::TECH_TOKEN))
        .json(&json!(["not", "an", "object"]))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn appointment_job_notifies_due_records() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let client = reqwest::Client::new();
    let now = Utc::now();

    server
        .store
        .add_reminder(
            ReminderKind::Appointment,
            ReminderCandidate {
                record_id: "appt-1".to_string(),
                user_id: common::CLIENT_ID.to_string(),
                title: "Lawn care visit".to_string(),
                due_at: now + Duration::hours(3),
            },
        )
        .await;
    server
        .store
        .add_reminder(
            ReminderKind::Appointment,
            ReminderCandidate {
                record_id: "appt-2".to_string(),
                user_id: common::CLIENT_ID.to_string(),
                title: "Gutter cleaning".to_string(),
                due_at: now + Duration::days(5),
            },
        )
        .await;

    let res = client.get(server.url("cron-appointments")).send().await?;
    assert_eq!(res.json::<Value>().await?, json!({ "job": "cron-appointments", "processed": 1 }));

    let res = client
        .get(server.url("notifications"))
        .header("authorization", bearer(common::CLIENT_TOKEN))
        .send()
        .await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["count"], 1);
    assert_eq!(body["notifications"][0]["kind"], "appointment_reminder");
    Ok(())
}

fn candidate(record_id: &str, user_id: &str, title: &str, due_at: chrono::DateTime<Utc>) -> ReminderCandidate {
    ReminderCandidate {
        record_id: record_id.to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        due_at,
    }
}

#[tokio::test]
async fn contract_job_looks_ahead_and_quote_job_looks_back() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let client = reqwest::Client::new();
    let now = Utc::now();

    // Contracts: expiring within 30 days
    server
        .store
        .add_reminder(ReminderKind::Contract, candidate("ctr-1", common::TECH_ID, "Snow removal", now + Duration::days(10)))
        .await;
    server
        .store
        .add_reminder(ReminderKind::Contract, candidate("ctr-2", common::TECH_ID, "Pool service", now + Duration::days(60)))
        .await;
    // Quotes: pending for more than 3 days
    server
        .store
        .add_reminder(ReminderKind::Quote, candidate("q-1", common::CLIENT_ID, "Deck repair", now - Duration::days(5)))
        .await;
    server
        .store
        .add_reminder(ReminderKind::Quote, candidate("q-2", common::CLIENT_ID, "Fence install", now - Duration::days(1)))
        .await;
    server
        .store
        .add_reminder(ReminderKind::Quote, candidate("q-3", common::CLIENT_ID, "Roof patch", now + Duration::days(2)))
        .await;

    let res = client.post(server.url("cron-contracts")).send().await?;
    assert_eq!(res.json::<Value>().await?, json!({ "job": "cron-contracts", "processed": 1 }));

    let res = client.post(server.url("cron-quotes")).send().await?;
    assert_eq!(res.json::<Value>().await?, json!({ "job": "cron-quotes", "processed": 1 }));

    let res = client
        .get(server.url("notifications"))
        .header("authorization", bearer(common::TECH_TOKEN))
        .send()
        .await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["count"], 1);
    assert_eq!(body["notifications"][0]["kind"], "contract_expiring");
    assert_eq!(body["notifications"][0]["data"]["record_id"], "ctr-1");

    let res = client
        .get(server.url("notifications"))
        .header("authorization", bearer(common::CLIENT_TOKEN))
        .send()
        .await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["count"], 1);
    assert_eq!(body["notifications"][0]["kind"], "quote_followup");
    assert_eq!(body["notifications"][0]["data"]["record_id"], "q-1");
    Ok(())
}
