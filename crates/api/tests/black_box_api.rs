use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use toolroom_auth::{JwtClaims, PrincipalId, Role};
use toolroom_core::TenantId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        // Without DATABASE_URL the in-memory backend is selected, so each
        // server starts from a clean slate.
        let app = toolroom_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn create_item(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    name: &str,
    quantity: i64,
) -> String {
    let res = client
        .post(format!("{}/catalog/items", base_url))
        .bearer_auth(token)
        .json(&json!({ "name": name, "quantity": quantity }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["item"]["item_id"].as_str().unwrap().to_string()
}

async fn create_project(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    name: &str,
) -> String {
    let res = client
        .post(format!("{}/projects", base_url))
        .bearer_auth(token)
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["project"]["project_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn borrow_and_return_round_trip() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let client = reqwest::Client::new();

    let item_id = create_item(&client, &srv.base_url, &token, "Impact Driver", 10).await;
    let project_id = create_project(&client, &srv.base_url, &token, "Site A").await;

    // Borrow 4: pool drops to 6, allocation appears.
    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["action"], "borrow");
    assert_eq!(body["item"]["quantity"], 6);
    let transaction_id = body["transaction"]["transaction_id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client
        .get(format!("{}/projects/{}/inventory", srv.base_url, project_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["allocations"][0]["quantity"], 4);

    // Transaction detail carries item/project summaries.
    let res = client
        .get(format!("{}/transactions/{}", srv.base_url, transaction_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["item"]["name"], "Impact Driver");
    assert_eq!(body["transaction"]["project"]["name"], "Site A");

    // Return all 4: pool back to 10, allocation gone.
    let res = client
        .post(format!("{}/transactions/return", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["action"], "return");
    assert_eq!(body["item"]["quantity"], 10);

    let res = client
        .get(format!("{}/projects/{}/inventory", srv.base_url, project_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["allocations"].as_array().unwrap().is_empty());

    // Both movements are in the ledger, newest first.
    let res = client
        .get(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["transactions"][0]["action"], "return");
    assert_eq!(body["transactions"][1]["action"], "borrow");
}

#[tokio::test]
async fn insufficient_pool_and_over_return_are_rejected() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let client = reqwest::Client::new();

    let item_id = create_item(&client, &srv.base_url, &token, "Ladder", 3).await;
    let project_id = create_project(&client, &srv.base_url, &token, "Site B").await;

    // Borrow 5 from a pool of 3: rejected, no state change.
    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{}/catalog/items/{}", srv.base_url, item_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["item"]["quantity"], 3);

    // Allocate 2, then try to return 5: rejected.
    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/transactions/return", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Returning without any allocation is a 404.
    let other_item = create_item(&client, &srv.base_url, &token, "Generator", 1).await;
    let res = client
        .post(format!("{}/transactions/return", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": other_item, "project_id": project_id, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn movement_requests_are_validated_at_the_boundary() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let client = reqwest::Client::new();

    let item_id = create_item(&client, &srv.base_url, &token, "Drill", 5).await;
    let project_id = create_project(&client, &srv.base_url, &token, "Site C").await;

    // Missing quantity.
    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Non-positive quantity.
    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Unknown item.
    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "item_id": uuid::Uuid::now_v7().to_string(),
            "project_id": project_id,
            "quantity": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // An empty ledger lists as 404, not an empty page.
    let res = client
        .get(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unauthorized_access_blocked_for_mutations() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    // Not admin => no catalog permissions => forbidden for item creation.
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("viewer")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/catalog/items", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Widget" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn warehouse_role_can_move_stock_but_not_reconcile() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let admin = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let warehouse = mint_jwt(jwt_secret, tenant_id, vec![Role::new("warehouse")]);
    let client = reqwest::Client::new();

    let item_id = create_item(&client, &srv.base_url, &admin, "Sander", 5).await;
    let project_id = create_project(&client, &srv.base_url, &admin, "Site D").await;

    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&warehouse)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/admin/reconcile", srv.base_url))
        .bearer_auth(&warehouse)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_isolation_blocks_cross_tenant_reads_and_writes() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant1 = TenantId::new();
    let tenant2 = TenantId::new();
    let token1 = mint_jwt(jwt_secret, tenant1, vec![Role::new("admin")]);
    let token2 = mint_jwt(jwt_secret, tenant2, vec![Role::new("admin")]);
    let client = reqwest::Client::new();

    let item_id = create_item(&client, &srv.base_url, &token1, "Welder", 5).await;
    let project1 = create_project(&client, &srv.base_url, &token1, "Tenant1 Site").await;

    // Tenant2 cannot read tenant1's item.
    let res = client
        .get(format!("{}/catalog/items/{}", srv.base_url, item_id))
        .bearer_auth(&token2)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Tenant2 cannot borrow tenant1's item, even against its own project.
    let project2 = create_project(&client, &srv.base_url, &token2, "Tenant2 Site").await;
    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token2)
        .json(&json!({ "item_id": item_id, "project_id": project2, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Tenant1's ledger stays invisible to tenant2.
    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token1)
        .json(&json!({ "item_id": item_id, "project_id": project1, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .get(format!("{}/transactions", srv.base_url))
        .bearer_auth(&token2)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_delete_blocked_while_allocated_and_names_are_unique() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let client = reqwest::Client::new();

    let item_id = create_item(&client, &srv.base_url, &token, "Compressor", 2).await;
    let project_id = create_project(&client, &srv.base_url, &token, "Site E").await;

    // Duplicate name (case-insensitive) conflicts.
    let res = client
        .post(format!("{}/catalog/items", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "COMPRESSOR" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(format!("{}/transactions/borrow", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .delete(format!("{}/catalog/items/{}", srv.base_url, item_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(format!("{}/transactions/return", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .delete(format!("{}/catalog/items/{}", srv.base_url, item_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn reconcile_reports_clean_after_normal_operation() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);
    let client = reqwest::Client::new();

    let item_id = create_item(&client, &srv.base_url, &token, "Jackhammer", 8).await;
    let project_id = create_project(&client, &srv.base_url, &token, "Site F").await;

    for quantity in [3, 2] {
        let res = client
            .post(format!("{}/transactions/borrow", srv.base_url))
            .bearer_auth(&token)
            .json(&json!({ "item_id": item_id, "project_id": project_id, "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .post(format!("{}/admin/reconcile", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["report"]["clean"], true);
    assert_eq!(body["report"]["entries_replayed"], 2);
    assert!(body["report"]["allocation_drift"]
        .as_array()
        .unwrap()
        .is_empty());
}
