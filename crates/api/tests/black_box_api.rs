use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use regdesk_app::{AppServices, Settings};
use regdesk_auth::{Hs256JwtValidator, JwtClaims, Role};
use regdesk_core::{AccountId, RegionId};

const JWT_SECRET: &str = "black-box-secret";
const WEBHOOK_TOKEN: &str = "black-box-webhook";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory services, ephemeral port.
        let services = AppServices::in_memory().with_settings(Settings {
            webhook_token: Some(WEBHOOK_TOKEN.to_string()),
            ..Settings::default()
        });
        let jwt = Arc::new(Hs256JwtValidator::new(JWT_SECRET.as_bytes().to_vec()));
        let app = regdesk_api::app::build_app(Arc::new(services), jwt);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(role: Role, region_id: Option<RegionId>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: AccountId::new(),
        role,
        region_id,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Region, open event with payments enabled and one priced inscription type.
async fn seed_event(server: &TestServer, admin: &str) -> (String, String) {
    let res = server.post(admin, "/regions", json!({ "name": "Sul" })).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let region: Value = res.json().await.unwrap();

    let today = Utc::now().date_naive();
    let res = server
        .post(
            admin,
            "/events/create",
            json!({
                "region_id": region["id"],
                "name": "Congresso de Jovens",
                "description": null,
                "location": "Centro de Convenções",
                "starts_on": today + ChronoDuration::days(30),
                "ends_on": today + ChronoDuration::days(32),
                "max_participants": 100
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let event: Value = res.json().await.unwrap();
    let event_id = event["id"].as_str().unwrap().to_string();

    let res = server
        .client
        .patch(server.url(&format!("/events/{event_id}/update/payments")))
        .bearer_auth(admin)
        .json(&json!({ "enabled": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .post(
            admin,
            &format!("/events/{event_id}/types"),
            json!({ "description": "Adulto", "value": 15000 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let kind: Value = res.json().await.unwrap();

    (event_id, kind["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn health_is_public_and_the_rest_needs_a_token() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.get("not-a-jwt", "/events").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let region = RegionId::new();
    let res = server.get(&mint_jwt(Role::Manager, Some(region)), "/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["role"], "manager");
    assert_eq!(body["region_id"], region.to_string());
}

#[tokio::test]
async fn events_are_created_and_listed() {
    let server = TestServer::spawn().await;
    let admin = mint_jwt(Role::Admin, None);
    let (event_id, _) = seed_event(&server, &admin).await;

    let res = server.get(&admin, &format!("/events/{event_id}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let event: Value = res.json().await.unwrap();
    assert_eq!(event["status"], "open");
    assert_eq!(event["payment_enabled"], true);

    let res = server.get(&admin, "/events").await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    // Plain users cannot create events.
    let user = mint_jwt(Role::User, None);
    let res = server.post(&user, "/regions", json!({ "name": "Leste" })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let server = TestServer::spawn().await;
    let admin = mint_jwt(Role::Admin, None);

    let res = server.get(&admin, "/events/not-a-uuid").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let missing = uuid::Uuid::now_v7();
    let res = server.get(&admin, &format!("/events/{missing}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "event_not_found");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn guest_inscription_is_paid_through_its_link() {
    let server = TestServer::spawn().await;
    let admin = mint_jwt(Role::Admin, None);
    let (event_id, type_id) = seed_event(&server, &admin).await;

    let res = server
        .client
        .post(server.url(&format!("/guest/inscriptions?event_id={event_id}")))
        .json(&json!({
            "responsible": "Marta Souza",
            "email": "marta@example.com",
            "participants": [
                {
                    "name": "Marta Souza",
                    "birth_date": "1990-04-12",
                    "gender": "female",
                    "type_inscription_id": type_id
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    let token = receipt["payment_link"]["token"].as_str().unwrap().to_string();
    let inscription_id = receipt["inscription"]["id"].as_str().unwrap().to_string();

    let res = server
        .client
        .get(server.url(&format!("/payment-links/{token}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary["value"], 15000);
    assert_eq!(summary["responsible"], "Marta Souza");

    let res = server
        .client
        .post(server.url(&format!("/payment-links/{token}/checkout")))
        .json(&json!({ "method": "pix" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let checkout: Value = res.json().await.unwrap();
    let reference = checkout["installments"][0]["gateway_reference"]
        .as_str()
        .unwrap()
        .to_string();

    let webhook = json!({ "event": "PAYMENT_CONFIRMED", "payment": { "id": reference } });
    let res = server
        .client
        .post(server.url("/webhooks/gateway"))
        .json(&webhook)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .client
        .post(server.url("/webhooks/gateway"))
        .header("x-webhook-token", WEBHOOK_TOKEN)
        .json(&webhook)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["outcome"], "payment_approved");

    let res = server.get(&admin, &format!("/inscriptions/{inscription_id}")).await;
    let detail: Value = res.json().await.unwrap();
    assert_eq!(detail["inscription"]["status"], "paid");

    // The link is single use.
    let res = server
        .client
        .post(server.url(&format!("/payment-links/{token}/checkout")))
        .json(&json!({ "method": "pix" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Events with inscriptions cannot be deleted.
    let res = server
        .client
        .delete(server.url(&format!("/events/{event_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invariant_violation");
}

#[tokio::test]
async fn reports_are_served_as_pdf() {
    let server = TestServer::spawn().await;
    let admin = mint_jwt(Role::Admin, None);
    let (event_id, _) = seed_event(&server, &admin).await;

    let res = server
        .get(&admin, &format!("/reports/events/{event_id}/financial"))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap().to_str().unwrap(),
        "application/pdf"
    );
    let bytes = res.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));

    let user = mint_jwt(Role::User, None);
    let res = server
        .get(&user, &format!("/reports/events/{event_id}/inscriptions"))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
