use crate::openapi::ROUTES;
use crate::{router, AppState};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use banca_core::backoffice::{CreateDraw, CreateLottery, CreatePool, CreateUser, CreateZone};
use banca_core::permissions::{TICKET_CANCEL, TICKET_CREATE};
use banca_core::storage::{BettingPool, Draw, WeeklySchedule};
use banca_core::{Backoffice, BetType, ServiceConfig, Storage};
use chrono::NaiveTime;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    office: Arc<Backoffice>,
    admin_token: String,
}

async fn test_app_with(config: ServiceConfig) -> TestApp {
    let storage = Arc::new(Storage::in_memory().await.unwrap());
    let office = Arc::new(Backoffice::with_storage(config, storage));
    office.bootstrap_admin("admin", "admin123").await.unwrap();

    let app = router(AppState::new(office.clone()));
    let mut t = TestApp {
        app,
        office,
        admin_token: String::new(),
    };
    t.admin_token = t.login("admin", "admin123").await;
    t
}

async fn test_app() -> TestApp {
    let mut config = ServiceConfig::default();
    config.jwt.secret = "unit-test-secret-0123456789abcdef".to_string();
    test_app_with(config).await
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn sales_setup(&self) -> (BettingPool, Draw, String) {
        let zone = self
            .office
            .create_zone(CreateZone {
                name: "Norte".to_string(),
            })
            .await
            .unwrap();
        let pool = self
            .office
            .create_pool(CreatePool {
                code: None,
                name: "Banca Norte".to_string(),
                zone_id: zone.id,
                address: None,
                phone: None,
                config: None,
            })
            .await
            .unwrap();
        let lottery = self
            .office
            .create_lottery(CreateLottery {
                name: "Nacional".to_string(),
                code: "LN".to_string(),
                utc_offset_minutes: None,
            })
            .await
            .unwrap();
        let draw = self
            .office
            .create_draw(CreateDraw {
                lottery_id: lottery.id,
                name: "Nacional Noche".to_string(),
                abbreviation: "LN".to_string(),
                draw_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
                bet_types: BetType::ALL.to_vec(),
                schedules: (0..7)
                    .map(|day| WeeklySchedule {
                        day_of_week: day,
                        start_time: NaiveTime::MIN,
                        end_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
                        is_active: true,
                    })
                    .collect(),
            })
            .await
            .unwrap();
        self.office
            .create_user(CreateUser {
                username: "cajero".to_string(),
                password: "cajero123".to_string(),
                full_name: "Cajero Norte".to_string(),
                email: None,
                betting_pool_id: Some(pool.id),
                is_admin: false,
                permissions: vec![TICKET_CREATE.to_string()],
            })
            .await
            .unwrap();
        let token = self.login("cajero", "cajero123").await;
        (pool, draw, token)
    }
}

fn ticket_body(pool_id: i64, draw_id: i64, number: &str, amount: f64) -> Value {
    json!({
        "bettingPoolId": pool_id,
        "lines": [{
            "drawId": draw_id,
            "betNumber": number,
            "betType": "DIRECTO",
            "betAmount": amount,
        }],
    })
}

#[tokio::test]
async fn test_public_routes_and_auth() {
    let t = test_app().await;

    let (status, body) = t.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = t.call(Method::GET, "/api/v1/zones", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = t.call(Method::GET, "/api/v1/zones", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = t.call(Method::GET, "/api/v1/auth/me", Some(&t.admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["admin"], true);
}

#[tokio::test]
async fn test_zone_crud_over_http() {
    let t = test_app().await;
    let token = Some(t.admin_token.as_str());

    let (status, zone) = t
        .call(Method::POST, "/api/v1/zones", token, Some(json!({ "name": "Este" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = zone["id"].as_i64().unwrap();

    let (status, body) = t
        .call(Method::POST, "/api/v1/zones", token, Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation-failed");

    let (status, _) = t.call(Method::DELETE, &format!("/api/v1/zones/{}", id), token, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, page) = t.call(Method::GET, "/api/v1/zones", token, None).await;
    assert_eq!(page["totalCount"], 0);
    let (_, page) = t.call(Method::GET, "/api/v1/zones?includeInactive=true", token, None).await;
    assert_eq!(page["totalCount"], 1);

    let (status, _) = t.call(Method::GET, "/api/v1/zones/999", token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = t.call(Method::GET, "/api/v1/zones/abc", token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad-request");
}

#[tokio::test]
async fn test_ticket_sale_and_limit_rejection() {
    let t = test_app().await;
    let (pool, draw, seller) = t.sales_setup().await;

    let (status, _) = t
        .call(
            Method::POST,
            "/api/v1/limits",
            Some(&t.admin_token),
            Some(json!({
                "name": "Tope 07",
                "drawId": draw.id,
                "betType": "DIRECTO",
                "betNumberPattern": "07",
                "maxBetPerNumber": 50.0,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, ticket) = t
        .call(
            Method::POST,
            "/api/v1/tickets",
            Some(&seller),
            Some(ticket_body(pool.id, draw.id, "07", 40.0)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", ticket);
    assert_eq!(ticket["grandTotal"], 40.0);

    let (status, body) = t
        .call(
            Method::POST,
            "/api/v1/tickets",
            Some(&seller),
            Some(ticket_body(pool.id, draw.id, "07", 20.0)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ticket/invalid-bets-exceed-limits");
    assert_eq!(body["lines"][0]["available"], 10.0);

    let (status, _) = t
        .call(
            Method::GET,
            &format!("/api/v1/tickets/by-barcode/{}", ticket["barcode"].as_str().unwrap()),
            Some(&seller),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = t
        .call(
            Method::PATCH,
            "/api/v1/tickets",
            Some(&seller),
            Some(json!({ "drawId": draw.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], 1);
}

#[tokio::test]
async fn test_hot_numbers_prize_overrides_and_contacts() {
    let t = test_app().await;
    let (pool, draw, seller) = t.sales_setup().await;
    let admin = Some(t.admin_token.as_str());

    let (status, hot) = t
        .call(
            Method::PUT,
            "/api/v1/hot-numbers",
            admin,
            Some(json!({ "selectedNumbers": [5, 105, 3, 5] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hot["selectedNumbers"], json!([3, 5]));
    let (status, _) = t
        .call(
            Method::PUT,
            "/api/v1/hot-numbers",
            Some(&seller),
            Some(json!({ "selectedNumbers": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .call(
            Method::POST,
            "/api/v1/hot-numbers/limits",
            admin,
            Some(json!({ "drawIds": [draw.id], "directo": 100.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, limits) = t
        .call(
            Method::GET,
            &format!("/api/v1/hot-numbers/limits?drawIds={},999", draw.id),
            admin,
            None,
        )
        .await;
    assert_eq!(limits.as_array().unwrap().len(), 1);
    let (status, _) = t
        .call(Method::GET, "/api/v1/hot-numbers/limits?drawIds=abc", admin, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let config_path = format!("/api/v1/betting-pools/{}/draws/{}/prize-config", pool.id, draw.id);
    let (status, saved) = t
        .call(
            Method::POST,
            &config_path,
            admin,
            Some(json!({ "prizes": [{ "betType": "DIRECTO", "payouts": [80, 10, 5] }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", saved);
    assert_eq!(saved["created"], 1);
    let (_, resolved) = t
        .call(Method::GET, &format!("{}/resolved", config_path), admin, None)
        .await;
    assert_eq!(resolved[0]["betType"], "DIRECTO");
    assert_eq!(resolved[0]["source"], "DRAW_SPECIFIC");
    assert_eq!(resolved[1]["source"], "SYSTEM_DEFAULT");

    let (status, _) = t
        .call(
            Method::POST,
            "/api/v1/contacts",
            admin,
            Some(json!({ "bettingPoolId": pool.id, "contactName": "Pedro" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, removed) = t
        .call(
            Method::DELETE,
            &format!("/api/v1/contacts/by-betting-pool/{}", pool.id),
            admin,
            None,
        )
        .await;
    assert_eq!(removed["deleted"], 1);

    let (status, _) = t.call(Method::GET, "/api/v1/winning-plays", Some(&seller), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, report) = t
        .call(Method::GET, "/api/v1/winning-plays?zoneIds=1,2", admin, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["totalCount"], 0);
    assert_eq!(report["grandTotal"], 0.0);
}

#[tokio::test]
async fn test_tickets_of_another_pool_are_forbidden() {
    let t = test_app().await;
    let (pool, draw, seller) = t.sales_setup().await;
    let (_, ticket) = t
        .call(
            Method::POST,
            "/api/v1/tickets",
            Some(&seller),
            Some(ticket_body(pool.id, draw.id, "31", 10.0)),
        )
        .await;
    let id = ticket["id"].as_i64().unwrap();

    let other = t
        .office
        .create_pool(CreatePool {
            code: None,
            name: "Banca Sur".to_string(),
            zone_id: pool.zone_id,
            address: None,
            phone: None,
            config: None,
        })
        .await
        .unwrap();
    t.office
        .create_user(CreateUser {
            username: "cajero2".to_string(),
            password: "cajero123".to_string(),
            full_name: "Cajero Sur".to_string(),
            email: None,
            betting_pool_id: Some(other.id),
            is_admin: false,
            permissions: vec![TICKET_CREATE.to_string(), TICKET_CANCEL.to_string()],
        })
        .await
        .unwrap();
    let outsider = t.login("cajero2", "cajero123").await;

    let (status, _) = t
        .call(Method::GET, &format!("/api/v1/tickets/{}", id), Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t
        .call(
            Method::PATCH,
            &format!("/api/v1/tickets/{}/cancel", id),
            Some(&outsider),
            Some(json!({ "reason": "ajena" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .call(Method::GET, &format!("/api/v1/tickets/{}", id), Some(&seller), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_permissions_are_enforced() {
    let t = test_app().await;
    let (_, _, seller) = t.sales_setup().await;

    let (status, body) = t
        .call(Method::POST, "/api/v1/zones", Some(&seller), Some(json!({ "name": "Sur" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = t.call(Method::GET, "/api/v1/limits", Some(&seller), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call(Method::GET, "/api/v1/bet-types", Some(&seller), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_play_expansion() {
    let t = test_app().await;
    let token = Some(t.admin_token.as_str());

    let (status, body) = t
        .call(Method::POST, "/api/v1/plays/expand", token, Some(json!({ "plays": ["33d66", "123."] })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["numbers"], json!(["33", "44", "55", "66"]));
    assert_eq!(body[1]["numbers"].as_array().unwrap().len(), 6);

    let (status, body) = t
        .call(Method::POST, "/api/v1/plays/expand", token, Some(json!({ "plays": ["12x"] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "play/invalid");
}

#[tokio::test]
async fn test_documented_routes_exist() {
    let t = test_app().await;
    for doc in ROUTES {
        let path = doc
            .path
            .replace(":id", "1")
            .replace(":draw_id", "1")
            .replace(":barcode", "000000000000");
        let method = Method::from_bytes(doc.method.to_ascii_uppercase().as_bytes()).unwrap();
        let (status, _) = t.call(method, &format!("/api/v1{}", path), None, None).await;
        assert_ne!(status, StatusCode::NOT_FOUND, "{} {}", doc.method, doc.path);
        assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", doc.method, doc.path);
    }

    let (status, doc) = t.call(Method::GET, "/api/v1/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["paths"].as_object().unwrap().len() > 30, true);
}

#[tokio::test]
async fn test_rate_limit() {
    let mut config = ServiceConfig::default();
    config.jwt.secret = "unit-test-secret-0123456789abcdef".to_string();
    config.rate_limit.permits = 3;
    let t = test_app_with(config).await;

    // The admin login already used one permit
    assert_eq!(t.call(Method::GET, "/api/v1/health", None, None).await.0, StatusCode::OK);
    assert_eq!(t.call(Method::GET, "/api/v1/health", None, None).await.0, StatusCode::OK);
    let (status, body) = t.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate-limited");
}
