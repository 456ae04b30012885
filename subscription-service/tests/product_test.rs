//! Product catalog integration tests for subscription-service.

mod common;

use common::{money, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[tokio::test]
async fn create_and_get_product_works() {
    let app = TestApp::spawn().await;

    let product = app.create_product("100.00", 12, "0.2").await;
    assert_eq!(product["name"], "Premium");
    assert_eq!(product["duration_months"], 12);
    assert_eq!(product["is_active"], true);
    assert_eq!(money(&product["price"]), Decimal::new(100, 0));

    let response = app
        .client
        .get(app.url(&format!(
            "/api/v1/products/{}",
            product["product_id"].as_str().unwrap()
        )))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["product_id"], product["product_id"]);
}

#[tokio::test]
async fn list_products_is_public() {
    let app = TestApp::spawn().await;
    app.create_product("10.00", 1, "0").await;
    app.create_product("20.00", 1, "0").await;

    let response = app
        .client
        .get(app.url("/api/v1/products"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let products: Vec<Value> = response.json().await.unwrap();
    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn create_product_requires_token() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/v1/products"))
        .json(&json!({
            "name": "Basic",
            "price": "10.00",
            "duration_months": 1,
            "tax_rate": "0",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn invalid_product_reports_every_field() {
    let app = TestApp::spawn().await;

    let response = app
        .authed(app.client.post(app.url("/api/v1/products")))
        .json(&json!({
            "name": " ",
            "price": "-1",
            "duration_months": 0,
            "tax_rate": "-0.1",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 422);

    let body: Value = response.json().await.unwrap();
    let details = &body["details"];
    for field in ["name", "price", "duration_months", "tax_rate"] {
        assert!(
            details.get(field).is_some(),
            "missing validation error for {}: {}",
            field,
            body
        );
    }
}

#[tokio::test]
async fn update_product_works() {
    let app = TestApp::spawn().await;
    let product = app.create_product("10.00", 1, "0").await;
    let id = product["product_id"].as_str().unwrap();

    let response = app
        .authed(app.client.put(app.url(&format!("/api/v1/products/{}", id))))
        .json(&json!({
            "name": "Premium Plus",
            "description": "More features",
            "price": "15.00",
            "duration_months": 6,
            "tax_rate": "0.1",
            "is_active": false,
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["name"], "Premium Plus");
    assert_eq!(updated["duration_months"], 6);
    assert_eq!(updated["is_active"], false);
    assert_eq!(money(&updated["price"]), Decimal::new(15, 0));
}

#[tokio::test]
async fn missing_product_returns_404() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url(&format!("/api/v1/products/{}", uuid::Uuid::new_v4())))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn delete_product_works_until_subscribed() {
    let app = TestApp::spawn().await;

    let unused = app.create_product("10.00", 1, "0").await;
    let response = app
        .authed(app.client.delete(app.url(&format!(
            "/api/v1/products/{}",
            unused["product_id"].as_str().unwrap()
        ))))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 204);

    let subscribed = app.create_product("10.00", 1, "0").await;
    let response = app
        .create_subscription(json!({ "product_id": subscribed["product_id"] }))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let response = app
        .authed(app.client.delete(app.url(&format!(
            "/api/v1/products/{}",
            subscribed["product_id"].as_str().unwrap()
        ))))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn product_amounts_must_fit_storage() {
    let app = TestApp::spawn().await;

    let response = app
        .authed(app.client.post(app.url("/api/v1/products")))
        .json(&json!({
            "name": "Unbounded",
            "price": "100000000000000000000",
            "duration_months": 1,
            "tax_rate": "10000000000",
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.unwrap();
    assert!(body["details"].get("price").is_some());
    assert!(body["details"].get("tax_rate").is_some());

    let response = app
        .authed(app.client.post(app.url("/api/v1/products")))
        .json(&json!({
            "name": "Too precise",
            "price": "10.00",
            "duration_months": 1,
            "tax_rate": "0.12345",
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.unwrap();
    assert!(body["details"].get("tax_rate").is_some());

    // Nothing was stored.
    let products: Vec<Value> = app
        .client
        .get(app.url("/api/v1/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(products.is_empty());
}
