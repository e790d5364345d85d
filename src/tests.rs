//! Integration tests for the DormHub backend.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha256;
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::models::Tier;
use crate::notify::Mailer;
use crate::payments::PaymentGateway;
use crate::{create_router, AppState};

const TEST_CHECKSUM_KEY: &str = "test-checksum-key";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    pool: sqlx::SqlitePool,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool.clone()));

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            gateway_api_url: None,
            gateway_checksum_key: Some(TEST_CHECKSUM_KEY.to_string()),
            gateway_return_url: "http://localhost:3000/payment/return".to_string(),
            gateway_cancel_url: "http://localhost:3000/payment/cancel".to_string(),
            email_api_url: None,
            email_api_key: None,
            email_from: "no-reply@dormhub.vn".to_string(),
        };

        let state = AppState {
            repo: repo.clone(),
            gateway: Arc::new(PaymentGateway::from_config(&config)),
            mailer: Arc::new(Mailer::from_config(&config)),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            repo,
            pool,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn create_landlord(&self, name: &str) -> String {
        let (status, body) = self
            .post("/api/landlords", json!({"displayName": name}))
            .await;
        assert_eq!(status, 200, "create landlord failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_dorm(&self, landlord_id: &str, name: &str) -> String {
        let (status, body) = self
            .post(
                "/api/dorms",
                json!({"landlordId": landlord_id, "name": name, "address": "12 Nguyễn Trãi"}),
            )
            .await;
        assert_eq!(status, 200, "create dorm failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_room(&self, dorm_id: &str, code: &str, price: i64) -> String {
        let (status, body) = self
            .post(
                "/api/rooms",
                json!({"dormId": dorm_id, "code": code, "price": price}),
            )
            .await;
        assert_eq!(status, 200, "create room failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_renter(&self, user_id: &str, name: &str, email: Option<&str>) -> String {
        let (status, body) = self
            .post(
                "/api/renters",
                json!({"userId": user_id, "displayName": name, "email": email}),
            )
            .await;
        assert_eq!(status, 200, "create renter failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Seed the standard three-amenity catalog and return a name->id map
    /// pulled back from the list endpoint.
    async fn seed_amenities(&self, dorm_id: &str) -> Value {
        let (status, body) = self
            .put(
                &format!("/api/dorms/{}/amenities", dorm_id),
                json!({"amenities": [
                    {"name": "Điện", "unitPrice": 3000, "unit": "kWh", "feeMode": "metered"},
                    {"name": "Internet", "unitPrice": 100000, "feeMode": "fixed"},
                    {"name": "Rác", "unitPrice": 20000, "feeMode": "per_person"},
                ]}),
            )
            .await;
        assert_eq!(status, 200, "seed amenities failed: {body}");
        let (_, listed) = self.get(&format!("/api/dorms/{}/amenities", dorm_id)).await;
        listed["data"].clone()
    }

    fn amenity_id(catalog: &Value, name: &str) -> String {
        catalog
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["name"] == name)
            .unwrap_or_else(|| panic!("amenity {name} not in catalog"))["id"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

/// Hex HMAC-SHA256 over the gateway's pipe-delimited webhook fields.
fn sign_webhook(order_code: i64, status: &str, amount: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_CHECKSUM_KEY.as_bytes()).unwrap();
    mac.update(format!("{}|{}|{}", order_code, status, amount).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_key_rejected() {
    let fixture = TestFixture::new().await;

    // Bare client without the default x-api-key header
    let resp = Client::new()
        .get(fixture.url("/api/landlords/nobody"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_wrong_key_rejected() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/api/landlords/nobody"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_create_and_get_landlord() {
    let fixture = TestFixture::new().await;

    let id = fixture.create_landlord("Chị Hoa").await;
    let (status, body) = fixture.get(&format!("/api/landlords/{}", id)).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["displayName"], "Chị Hoa");
    // New accounts start on the free tier
    assert_eq!(body["data"]["subscriptionTier"], "free");
}

#[tokio::test]
async fn test_dorm_crud() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;

    let dorm = fixture.create_dorm(&landlord, "Trọ Bình Minh").await;

    let (status, body) = fixture.get(&format!("/api/dorms/{}", dorm)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["name"], "Trọ Bình Minh");
    assert_eq!(body["data"]["dueDay"], 5);

    let (status, body) = fixture
        .put(&format!("/api/dorms/{}", dorm), json!({"dueDay": 10}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["dueDay"], 10);

    let (_, body) = fixture
        .get(&format!("/api/landlords/{}/dorms", landlord))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/dorms/{}", dorm)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (status, _) = fixture.get(&format!("/api/dorms/{}", dorm)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_free_tier_dorm_limit() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;

    fixture.create_dorm(&landlord, "Trọ 1").await;

    let (status, body) = fixture
        .post(
            "/api/dorms",
            json!({"landlordId": landlord, "name": "Trọ 2", "address": "34 Lê Lợi"}),
        )
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "LIMIT_EXCEEDED");
}

#[tokio::test]
async fn test_amenity_diff_sync_counts() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    fixture.create_room(&dorm, "P101", 2_000_000).await;
    fixture.create_room(&dorm, "P102", 2_500_000).await;

    // Fresh catalog of three entries fans links out to both rooms
    let (status, body) = fixture
        .put(
            &format!("/api/dorms/{}/amenities", dorm),
            json!({"amenities": [
                {"name": "Điện", "unitPrice": 3000, "unit": "kWh", "feeMode": "metered"},
                {"name": "Internet", "unitPrice": 100000, "feeMode": "fixed"},
                {"name": "Rác", "unitPrice": 20000, "feeMode": "per_person"},
            ]}),
        )
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["inserted"], 3);
    assert_eq!(body["data"]["updated"], 0);
    assert_eq!(body["data"]["deleted"], 0);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["linksCreated"], 6);

    let (_, listed) = fixture.get(&format!("/api/dorms/{}/amenities", dorm)).await;
    let electric = TestFixture::amenity_id(&listed["data"], "Điện");
    let internet = TestFixture::amenity_id(&listed["data"], "Internet");

    // Resubmit two of the three: both update, the absent one is deleted
    let (status, body) = fixture
        .put(
            &format!("/api/dorms/{}/amenities", dorm),
            json!({"amenities": [
                {"id": electric, "name": "Điện", "unitPrice": 3500, "unit": "kWh", "feeMode": "metered"},
                {"id": internet, "name": "Internet cáp quang", "unitPrice": 100000, "feeMode": "fixed"},
            ]}),
        )
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["updated"], 2);
    assert_eq!(body["data"]["inserted"], 0);
    assert_eq!(body["data"]["deleted"], 1);
    assert_eq!(body["data"]["total"], 2);

    let (_, listed) = fixture.get(&format!("/api/dorms/{}/amenities", dorm)).await;
    let names: Vec<&str> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Internet cáp quang"));
}

#[tokio::test]
async fn test_save_empty_catalog_deletes_everything() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;
    fixture.seed_amenities(&dorm).await;

    let (status, body) = fixture
        .put(&format!("/api/dorms/{}/amenities", dorm), json!({"amenities": []}))
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["updated"], 0);
    assert_eq!(body["data"]["inserted"], 0);
    assert_eq!(body["data"]["deleted"], 3);
    assert_eq!(body["data"]["total"], 0);

    // Room links to the deleted amenities are cascaded away
    let (_, links) = fixture.get(&format!("/api/rooms/{}/links", room)).await;
    assert_eq!(links["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_invalid_amenity_fails_whole_batch() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;

    let (status, body) = fixture
        .put(
            &format!("/api/dorms/{}/amenities", dorm),
            json!({"amenities": [
                {"name": "Internet", "unitPrice": 100000, "feeMode": "fixed"},
                {"name": "Điện", "unitPrice": -5, "feeMode": "metered"},
            ]}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "unitPrice");
    assert_eq!(body["error"]["message"], "Đơn giá dịch vụ không được âm");

    // Nothing was written
    let (_, listed) = fixture.get(&format!("/api/dorms/{}/amenities", dorm)).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_reconcile_restores_missing_links() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    fixture.seed_amenities(&dorm).await;
    let room1 = fixture.create_room(&dorm, "P101", 2_000_000).await;
    fixture.create_room(&dorm, "P102", 2_500_000).await;

    // Simulate legacy drift: one room lost its links
    sqlx::query("DELETE FROM room_amenity_links WHERE room_id = ?")
        .bind(&room1)
        .execute(&fixture.pool)
        .await
        .unwrap();

    let (status, body) = fixture
        .post(&format!("/api/dorms/{}/reconcile-links", dorm), json!({}))
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["created"], 3);
    assert_eq!(body["data"]["existing"], 3);

    // A second pass finds the full room x amenity grid and creates nothing
    let (_, body) = fixture
        .post(&format!("/api/dorms/{}/reconcile-links", dorm), json!({}))
        .await;
    assert_eq!(body["data"]["created"], 0);
    assert_eq!(body["data"]["existing"], 6);
}

#[tokio::test]
async fn test_duplicate_room_code_rejected() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    fixture.create_room(&dorm, "P101", 2_000_000).await;

    let (status, body) = fixture
        .post(
            "/api/rooms",
            json!({"dormId": dorm, "code": "P101", "price": 1_800_000}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["field"], "code");
    assert_eq!(body["error"]["message"], "Mã phòng đã tồn tại");
}

#[tokio::test]
async fn test_room_with_renter_cannot_go_vacant() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;
    let renter = fixture.create_renter("user-1", "Anh Tuấn", None).await;

    let (status, body) = fixture
        .post(&format!("/api/renters/{}/assign", renter), json!({"roomId": room}))
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["assignedRoomId"], room.as_str());

    let (_, body) = fixture.get(&format!("/api/rooms/{}", room)).await;
    assert_eq!(body["data"]["status"], "occupied");
    assert_eq!(body["data"]["currentRenterId"], renter.as_str());

    // Occupied room with a renter refuses the vacant status
    let (status, body) = fixture
        .put(&format!("/api/rooms/{}", room), json!({"status": "vacant"}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["message"],
        "Phòng đang có người thuê, không thể chuyển về trạng thái trống"
    );

    // After unassigning, both pointer sides clear and vacant is allowed
    let (status, body) = fixture
        .post(&format!("/api/renters/{}/unassign", renter), json!({}))
        .await;
    assert_eq!(status, 200, "{body}");
    assert!(body["data"]["assignedRoomId"].is_null());

    let (_, body) = fixture.get(&format!("/api/rooms/{}", room)).await;
    assert_eq!(body["data"]["status"], "vacant");
    assert!(body["data"]["currentRenterId"].is_null());
}

#[tokio::test]
async fn test_invoice_pricing_computed_server_side() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    let catalog = fixture.seed_amenities(&dorm).await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;
    let electric = TestFixture::amenity_id(&catalog, "Điện");
    let trash = TestFixture::amenity_id(&catalog, "Rác");

    // Trash is per-person and not part of the scenario
    let (status, _) = fixture
        .put(
            &format!("/api/rooms/{}/links", room),
            json!({"amenityId": trash, "enabled": false}),
        )
        .await;
    assert_eq!(status, 200);

    let (status, body) = fixture
        .post(
            &format!("/api/rooms/{}/invoices", room),
            json!({
                "period": {"year": 2026, "month": 8},
                "readings": [{"amenityId": electric, "current": 5}],
            }),
        )
        .await;
    assert_eq!(status, 200, "{body}");

    // 2,000,000 rent + 100,000 internet + 3,000 x 5 kWh
    assert_eq!(body["data"]["totalAmount"], 2_115_000);
    assert_eq!(body["data"]["currency"], "VND");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["periodStart"], "2026-08-01");
    assert_eq!(body["data"]["lines"].as_array().unwrap().len(), 3);

    let electric_line = body["data"]["lines"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["amenityId"] == electric.as_str())
        .unwrap();
    assert_eq!(electric_line["quantity"], 5);
    assert_eq!(electric_line["amount"], 15_000);
}

#[tokio::test]
async fn test_invoice_idempotent_per_period() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    fixture.seed_amenities(&dorm).await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;

    let period = json!({"period": {"year": 2026, "month": 8}, "readings": []});
    let (_, first) = fixture
        .post(&format!("/api/rooms/{}/invoices", room), period.clone())
        .await;
    let (status, second) = fixture
        .post(&format!("/api/rooms/{}/invoices", room), period)
        .await;

    assert_eq!(status, 200);
    assert_eq!(first["data"]["id"], second["data"]["id"]);

    let (_, listed) = fixture.get(&format!("/api/rooms/{}/invoices", room)).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_metered_baseline_advances_between_invoices() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    let catalog = fixture.seed_amenities(&dorm).await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;
    let electric = TestFixture::amenity_id(&catalog, "Điện");

    let (_, _) = fixture
        .post(
            &format!("/api/rooms/{}/invoices", room),
            json!({
                "period": {"year": 2026, "month": 8},
                "readings": [{"amenityId": electric, "current": 5}],
            }),
        )
        .await;

    // September bills from the advanced baseline of 5
    let (_, body) = fixture
        .post(
            &format!("/api/rooms/{}/invoices", room),
            json!({
                "period": {"year": 2026, "month": 9},
                "readings": [{"amenityId": electric, "current": 12}],
            }),
        )
        .await;

    let electric_line = body["data"]["lines"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["amenityId"] == electric.as_str())
        .unwrap();
    assert_eq!(electric_line["quantity"], 7);
    assert_eq!(electric_line["amount"], 21_000);
}

#[tokio::test]
async fn test_paid_status_requires_evidence() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    fixture.seed_amenities(&dorm).await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;
    let renter = fixture.create_renter("user-1", "Anh Tuấn", None).await;

    let (_, body) = fixture
        .post(
            &format!("/api/rooms/{}/invoices", room),
            json!({"period": {"year": 2026, "month": 8}, "readings": []}),
        )
        .await;
    let invoice = body["data"]["id"].as_str().unwrap().to_string();

    // No evidence on file yet
    let (status, body) = fixture
        .put(&format!("/api/invoices/{}/status", invoice), json!({"status": "paid"}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "Hóa đơn chưa có minh chứng thanh toán");

    let (status, body) = fixture
        .post(
            &format!("/api/invoices/{}/evidence", invoice),
            json!({"renterId": renter, "files": ["https://cdn.local/bank-transfer.jpg"]}),
        )
        .await;
    assert_eq!(status, 200, "{body}");
    let evidence = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = fixture.get(&format!("/api/invoices/{}", invoice)).await;
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(
        body["data"]["evidenceUrl"],
        "https://cdn.local/bank-transfer.jpg"
    );

    // Approving the evidence marks the invoice paid
    let (status, body) = fixture
        .post(&format!("/api/evidence/{}/review", evidence), json!({"approve": true}))
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["status"], "approved");

    let (_, body) = fixture.get(&format!("/api/invoices/{}", invoice)).await;
    assert_eq!(body["data"]["status"], "paid");

    // A second review of settled evidence is refused
    let (status, _) = fixture
        .post(&format!("/api/evidence/{}/review", evidence), json!({"approve": false}))
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_rejected_evidence_marks_invoice_rejected() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;
    let renter = fixture.create_renter("user-1", "Anh Tuấn", None).await;

    let (_, body) = fixture
        .post(
            &format!("/api/rooms/{}/invoices", room),
            json!({"period": {"year": 2026, "month": 8}, "readings": []}),
        )
        .await;
    let invoice = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = fixture
        .post(
            &format!("/api/invoices/{}/evidence", invoice),
            json!({"renterId": renter, "files": ["https://cdn.local/blurry.jpg"]}),
        )
        .await;
    let evidence = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = fixture
        .post(&format!("/api/evidence/{}/review", evidence), json!({"approve": false}))
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["data"]["status"], "rejected");

    let (_, body) = fixture.get(&format!("/api/invoices/{}", invoice)).await;
    assert_eq!(body["data"]["status"], "rejected");
}

#[tokio::test]
async fn test_checkout_rejects_free_target() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;

    let (status, body) = fixture
        .post(
            "/api/payments/checkout",
            json!({"landlordId": landlord, "targetTier": "free"}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["message"], "Không thể mua gói miễn phí");
}

#[tokio::test]
async fn test_paid_webhook_applies_once() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;

    let order_code = 17_240_001;
    fixture
        .repo
        .create_payment_request(&landlord, order_code, Tier::Basic, 99_000)
        .await
        .unwrap();

    let payload = json!({
        "orderCode": order_code,
        "status": "PAID",
        "amount": 99_000,
        "signature": sign_webhook(order_code, "PAID", 99_000),
    });

    // Webhook endpoint sits outside the PSK layer
    let resp = Client::new()
        .post(fixture.url("/api/payments/webhook"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["applied"], true);
    assert_eq!(body["data"]["status"], "completed");

    // Gateway retry of the same delivery is a no-op
    let resp = Client::new()
        .post(fixture.url("/api/payments/webhook"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["applied"], false);

    let (_, body) = fixture.get(&format!("/api/landlords/{}", landlord)).await;
    assert_eq!(body["data"]["subscriptionTier"], "basic");

    let (_, body) = fixture
        .get(&format!("/api/landlords/{}/subscriptions", landlord))
        .await;
    let subs = body["data"].as_array().unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["tier"], "basic");
}

#[tokio::test]
async fn test_unsigned_webhook_rejected() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;

    let order_code = 17_240_002;
    fixture
        .repo
        .create_payment_request(&landlord, order_code, Tier::Pro, 249_000)
        .await
        .unwrap();

    let resp = Client::new()
        .post(fixture.url("/api/payments/webhook"))
        .json(&json!({
            "orderCode": order_code,
            "status": "PAID",
            "amount": 249_000,
            "signature": "not-a-real-signature",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Nothing changed
    let (_, body) = fixture.get(&format!("/api/landlords/{}", landlord)).await;
    assert_eq!(body["data"]["subscriptionTier"], "free");
}

#[tokio::test]
async fn test_failed_webhook_keeps_tier() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;

    let order_code = 17_240_003;
    fixture
        .repo
        .create_payment_request(&landlord, order_code, Tier::Basic, 99_000)
        .await
        .unwrap();

    let resp = Client::new()
        .post(fixture.url("/api/payments/webhook"))
        .json(&json!({
            "orderCode": order_code,
            "status": "CANCELLED",
            "amount": 99_000,
            "signature": sign_webhook(order_code, "CANCELLED", 99_000),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "failed");

    let (_, body) = fixture.get(&format!("/api/landlords/{}", landlord)).await;
    assert_eq!(body["data"]["subscriptionTier"], "free");

    let (_, body) = fixture
        .get(&format!("/api/landlords/{}/subscriptions", landlord))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_meter_readings_skip_unlinked_amenities() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    let catalog = fixture.seed_amenities(&dorm).await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;
    let electric = TestFixture::amenity_id(&catalog, "Điện");

    let (status, body) = fixture
        .post(
            &format!("/api/rooms/{}/readings", room),
            json!({"readings": [
                {"amenityId": electric, "current": 42},
                {"amenityId": "no-such-amenity", "current": 7},
            ]}),
        )
        .await;
    assert_eq!(status, 200, "{body}");

    let outcomes = body["data"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["applied"], true);
    assert_eq!(outcomes[1]["applied"], false);
}

#[tokio::test]
async fn test_delete_room_with_renter_rejected() {
    let fixture = TestFixture::new().await;
    let landlord = fixture.create_landlord("Chủ trọ").await;
    let dorm = fixture.create_dorm(&landlord, "Trọ").await;
    let room = fixture.create_room(&dorm, "P101", 2_000_000).await;
    let renter = fixture.create_renter("user-1", "Anh Tuấn", None).await;

    fixture
        .post(&format!("/api/renters/{}/assign", renter), json!({"roomId": room}))
        .await;

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/rooms/{}", room)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
