/// End-to-end API tests against a real database
///
/// These tests require a running PostgreSQL database and are skipped when
/// DATABASE_URL is unset.

mod common;

use axum::http::StatusCode;
use common::{token_for, unique_email, TestContext};
use parcelhub_shared::models::parcel::Parcel;
use parcelhub_shared::models::rider::{Rider, RiderStatus};
use parcelhub_shared::models::user::{User, UserRole};
use serde_json::{json, Value};
use uuid::Uuid;

async fn book_parcel(ctx: &TestContext, owner: &str) -> Uuid {
    let (status, body) = ctx
        .send(
            "POST",
            "/parcels",
            Some(&token_for(owner)),
            Some(json!({
                "title": "Books",
                "type": "non-document",
                "senderRegion": "Dhaka",
                "receiverRegion": "Sylhet",
                "weight": 2.0,
                "cost": 500
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["created_by"], owner);
    assert_eq!(body["payment_status"], "unpaid");
    body["id"].as_str().unwrap().parse().unwrap()
}

async fn apply_as_rider(ctx: &TestContext, email: &str) -> Uuid {
    let (status, body) = ctx
        .send(
            "POST",
            "/riders",
            Some(&token_for(email)),
            Some(json!({ "name": "Rahim", "region": "Dhaka", "bikeBrand": "Honda" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "pending");
    body["id"].as_str().unwrap().parse().unwrap()
}

fn payment_body(parcel_id: Uuid, transaction_id: &str, email: &str) -> Value {
    json!({
        "parcelId": parcel_id.to_string(),
        "transactionId": transaction_id,
        "amount": 500,
        "email": email,
        "paymentMethod": "card"
    })
}

#[tokio::test]
async fn test_settlement_end_to_end() {
    let Some(ctx) = TestContext::new().await else { return };
    let owner = unique_email("a");
    let token = token_for(&owner);
    let parcel_id = book_parcel(&ctx, &owner).await;

    let (status, body) = ctx
        .send("POST", "/payments", Some(&token), Some(payment_body(parcel_id, "tx1", &owner)))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Payment recorded successfully");
    assert!(body["insertedId"].is_string());

    let (status, parcel) = ctx.send("GET", &format!("/parcels/{}", parcel_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parcel["payment_status"], "paid");
    assert_eq!(parcel["transactionId"], "tx1");

    let (status, payments) = ctx
        .send("GET", &format!("/payments?email={}", owner), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let payments = payments.as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["transactionId"], "tx1");
    assert_eq!(payments[0]["email"], owner.as_str());
    assert_eq!(payments[0]["id"], body["insertedId"]);
}

#[tokio::test]
async fn test_duplicate_settlement_is_conflict() {
    let Some(ctx) = TestContext::new().await else { return };
    let owner = unique_email("a");
    let token = token_for(&owner);
    let parcel_id = book_parcel(&ctx, &owner).await;

    let (status, _) = ctx
        .send("POST", "/payments", Some(&token), Some(payment_body(parcel_id, "tx1", &owner)))
        .await;
    assert_eq!(status, StatusCode::OK);

    for tx in ["tx1", "tx2"] {
        let (status, body) = ctx
            .send("POST", "/payments", Some(&token), Some(payment_body(parcel_id, tx, &owner)))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    let (_, payments) = ctx
        .send("GET", &format!("/payments?email={}", owner), Some(&token), None)
        .await;
    assert_eq!(payments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_settling_unknown_parcel_is_not_found() {
    let Some(ctx) = TestContext::new().await else { return };
    let owner = unique_email("a");

    let (status, body) = ctx
        .send(
            "POST",
            "/payments",
            Some(&token_for(&owner)),
            Some(payment_body(Uuid::new_v4(), "tx1", &owner)),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Parcel not found");
}

#[tokio::test]
async fn test_rider_approval_end_to_end() {
    let Some(ctx) = TestContext::new().await else { return };
    let admin = ctx.user_with_role("admin", UserRole::Admin).await;
    let rider_email = unique_email("r");

    let (status, body) = ctx.send("POST", "/users", None, Some(json!({ "email": rider_email }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["insertedId"].is_string());

    let rider_id = apply_as_rider(&ctx, &rider_email).await;

    let (status, body) = ctx
        .send(
            "PATCH",
            &format!("/riders/{}/status", rider_id),
            Some(&token_for(&admin)),
            Some(json!({ "status": "active", "email": rider_email })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(
        body,
        json!({ "success": true, "message": "Rider active successfully", "riderModifiedCount": 1 })
    );

    let user = User::find_by_email(&ctx.db, &rider_email).await.unwrap().unwrap();
    assert_eq!(user.role, UserRole::Rider);

    let rider = Rider::find_by_id(&ctx.db, rider_id).await.unwrap().unwrap();
    assert_eq!(rider.status, RiderStatus::Active);

    let (status, active) = ctx.send("GET", "/riders/active", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(active.as_array().unwrap().iter().any(|r| r["id"] == rider_id.to_string()));
}

#[tokio::test]
async fn test_rider_status_errors() {
    let Some(ctx) = TestContext::new().await else { return };
    let admin_token = token_for(&ctx.user_with_role("admin", UserRole::Admin).await);
    let rider_email = unique_email("r");
    let rider_id = apply_as_rider(&ctx, &rider_email).await;
    let uri = format!("/riders/{}/status", rider_id);

    let (status, body) = ctx
        .send("PATCH", &uri, Some(&admin_token), Some(json!({ "status": "promoted" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid status value");

    let (status, _) = ctx
        .send(
            "PATCH",
            &uri,
            Some(&admin_token),
            Some(json!({ "status": "active", "email": unique_email("someone-else") })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .send("PATCH", &uri, Some(&admin_token), Some(json!({ "status": "rejected" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx
        .send("PATCH", &uri, Some(&admin_token), Some(json!({ "status": "active" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/riders/{}/status", Uuid::new_v4()),
            Some(&admin_token),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rider_status_requires_admin() {
    let Some(ctx) = TestContext::new().await else { return };
    let customer = ctx.user_with_role("customer", UserRole::User).await;
    let rider_id = apply_as_rider(&ctx, &unique_email("r")).await;

    let (status, body) = ctx
        .send(
            "PATCH",
            &format!("/riders/{}/status", rider_id),
            Some(&token_for(&customer)),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Insufficient permissions");

    // Never signed in, so no user record at all
    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/riders/{}/status", rider_id),
            Some(&token_for(&unique_email("stranger"))),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let rider = Rider::find_by_id(&ctx.db, rider_id).await.unwrap().unwrap();
    assert_eq!(rider.status, RiderStatus::Pending);
}

#[tokio::test]
async fn test_deactivate_alias() {
    let Some(ctx) = TestContext::new().await else { return };
    let admin_token = token_for(&ctx.user_with_role("admin", UserRole::Admin).await);
    let rider_id = apply_as_rider(&ctx, &unique_email("r")).await;
    let uri = format!("/riders/deactivate/{}", rider_id);

    // Still pending: only active riders can be deactivated
    let (status, _) = ctx.send("PATCH", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/riders/{}/status", rider_id),
            Some(&admin_token),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx.send("PATCH", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rider deactivated successfully");

    let rider = Rider::find_by_id(&ctx.db, rider_id).await.unwrap().unwrap();
    assert_eq!(rider.status, RiderStatus::Inactive);
}

#[tokio::test]
async fn test_sign_in_upsert_is_idempotent() {
    let Some(ctx) = TestContext::new().await else { return };
    let email = unique_email("signin");
    let body = json!({ "email": email, "name": "Ayesha", "photoUrl": "https://img.example/a.png" });

    let (status, first) = ctx.send("POST", "/users", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(first["insertedId"].is_string());

    let (status, second) = ctx.send("POST", "/users", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, json!({ "message": "user already exist", "insertedId": false }));

    let user = User::find_by_email(&ctx.db, &email).await.unwrap().unwrap();
    assert_eq!(user.name.as_deref(), Some("Ayesha"));
    assert!(user.last_login_at.is_some());
}

#[tokio::test]
async fn test_user_search() {
    let Some(ctx) = TestContext::new().await else { return };
    let marker = Uuid::new_v4().simple().to_string();
    let email = format!("Search-{}@example.com", marker);
    ctx.send("POST", "/users", None, Some(json!({ "email": email }))).await;

    let (status, users) = ctx
        .send("GET", &format!("/users/search?email=search-{}", marker), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], email.as_str());

    let (status, _) = ctx
        .send("GET", &format!("/users/search?email=nobody-{}", Uuid::new_v4().simple()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_role_changes() {
    let Some(ctx) = TestContext::new().await else { return };
    let admin_token = token_for(&ctx.user_with_role("admin", UserRole::Admin).await);
    let email = ctx.user_with_role("member", UserRole::User).await;
    let user = User::find_by_email(&ctx.db, &email).await.unwrap().unwrap();
    let uri = format!("/users/{}/role", user.id);

    let (status, body) = ctx
        .send("PATCH", &uri, Some(&admin_token), Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User role updated to admin");

    let user = User::find_by_id(&ctx.db, user.id).await.unwrap().unwrap();
    assert_eq!(user.role, UserRole::Admin);

    for role in ["rider", "owner"] {
        let (status, _) = ctx
            .send("PATCH", &uri, Some(&admin_token), Some(json!({ "role": role })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "role {}", role);
    }

    let (status, _) = ctx
        .send(
            "PATCH",
            &format!("/users/{}/role", Uuid::new_v4()),
            Some(&admin_token),
            Some(json!({ "role": "user" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .send("PATCH", &uri, Some(&token_for(&unique_email("nobody"))), Some(json!({ "role": "user" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_parcel_listing() {
    let Some(ctx) = TestContext::new().await else { return };
    let owner = ctx.user_with_role("owner", UserRole::User).await;
    let admin = ctx.user_with_role("admin", UserRole::Admin).await;
    let first = book_parcel(&ctx, &owner).await;
    let second = book_parcel(&ctx, &owner).await;

    let (status, parcels) = ctx
        .send("GET", &format!("/parcels?email={}", owner), Some(&token_for(&owner)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = parcels
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.to_string(), first.to_string()]);

    let (status, _) = ctx.send("GET", "/parcels", Some(&token_for(&owner)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, all) = ctx.send("GET", "/parcels", Some(&token_for(&admin)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(all.as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn test_parcel_deletion() {
    let Some(ctx) = TestContext::new().await else { return };
    let owner = unique_email("owner");
    let token = token_for(&owner);
    let unpaid = book_parcel(&ctx, &owner).await;
    let paid = book_parcel(&ctx, &owner).await;

    let (status, _) = ctx
        .send("POST", "/payments", Some(&token), Some(payment_body(paid, "tx-paid", &owner)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .send("DELETE", &format!("/parcels/{}", unpaid), Some(&token_for(&unique_email("other"))), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("DELETE", &format!("/parcels/{}", paid), Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(Parcel::find_by_id(&ctx.db, paid).await.unwrap().is_some());

    let (status, body) = ctx.send("DELETE", &format!("/parcels/{}", unpaid), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deletedCount": 1 }));

    let (status, _) = ctx.send("GET", &format!("/parcels/{}", unpaid), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
