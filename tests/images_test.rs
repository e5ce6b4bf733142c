//! Integration tests for image upload and listing.

mod common;

use common::{png_base64, TestHarness, PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
async fn end_to_end_register_token_upload_list() {
    let h = TestHarness::with_server().await;

    let resp = h.register("picam", PASSWORD).await;
    assert_eq!(resp.status(), 201);

    let tokens: Value = h
        .post_json("/api/v1/token/", &json!({"username": "picam", "password": PASSWORD}))
        .await
        .json()
        .await
        .unwrap();
    let access = tokens["access"].as_str().unwrap();

    let resp = h.upload(Some(access), &json!({"image": png_base64()})).await;
    assert_eq!(resp.status(), 201);
    let uploaded: Value = resp.json().await.unwrap();
    assert_eq!(uploaded["user"], "picam");
    assert!(uploaded["id"].is_string());
    assert!(uploaded["uploaded_at"].is_string());
    let image_url = uploaded["image"].as_str().unwrap();
    assert!(image_url.starts_with("/media/uploads/"));

    let resp = h.list(Some(access)).await;
    assert_eq!(resp.status(), 200);
    let listed: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(listed, vec![uploaded.clone()]);

    // The stored blob is served back.
    let blob = h.client.get(h.url(image_url)).send().await.unwrap();
    assert_eq!(blob.status(), 200);
    let bytes = blob.bytes().await.unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
}

#[tokio::test]
async fn data_uri_payload_is_accepted() {
    let h = TestHarness::with_server().await;
    let access = h.login_new_user("picam").await;

    let uri = format!("data:image/png;base64,{}", png_base64());
    let resp = h.upload(Some(&access), &json!({"image": uri})).await;
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn owner_comes_from_token_not_payload() {
    let h = TestHarness::with_server().await;
    let alice = h.login_new_user("alice").await;
    let bob = h.login_new_user("bob").await;
    let bob_id = rpi_db::queries::users::get_user_by_username(&h.conn(), "bob")
        .unwrap()
        .unwrap()
        .id;

    let resp = h
        .upload(
            Some(&alice),
            &json!({"image": png_base64(), "user": bob_id.to_string()}),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"], "alice");

    let bobs: Vec<Value> = h.list(Some(&bob)).await.json().await.unwrap();
    assert!(bobs.is_empty());
}

#[tokio::test]
async fn listings_are_scoped_per_user() {
    let h = TestHarness::with_server().await;
    let alice = h.login_new_user("alice").await;
    let bob = h.login_new_user("bob").await;

    for _ in 0..2 {
        h.upload(Some(&alice), &json!({"image": png_base64()})).await;
    }
    h.upload(Some(&bob), &json!({"image": png_base64()})).await;

    let alices: Vec<Value> = h.list(Some(&alice)).await.json().await.unwrap();
    let bobs: Vec<Value> = h.list(Some(&bob)).await.json().await.unwrap();

    assert_eq!(alices.len(), 2);
    assert!(alices.iter().all(|i| i["user"] == "alice"));
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0]["user"], "bob");
}

#[tokio::test]
async fn listing_is_newest_first() {
    let h = TestHarness::with_server().await;
    let access = h.login_new_user("picam").await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let body: Value = h
            .upload(Some(&access), &json!({"image": png_base64()}))
            .await
            .json()
            .await
            .unwrap();
        ids.push(body["id"].clone());
    }
    ids.reverse();

    let listed: Vec<Value> = h.list(Some(&access)).await.json().await.unwrap();
    let listed_ids: Vec<Value> = listed.into_iter().map(|i| i["id"].clone()).collect();
    assert_eq!(listed_ids, ids);
}

#[tokio::test]
async fn empty_listing_is_ok() {
    let h = TestHarness::with_server().await;
    let access = h.login_new_user("picam").await;

    let resp = h.list(Some(&access)).await;
    assert_eq!(resp.status(), 200);
    let listed: Vec<Value> = resp.json().await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn unauthenticated_upload_mutates_nothing() {
    let h = TestHarness::with_server().await;
    h.register("picam", PASSWORD).await;

    for token in [None, Some("garbage"), Some("a.b.c")] {
        let resp = h.upload(token, &json!({"image": png_base64()})).await;
        assert_eq!(resp.status(), 401, "{token:?}");
        assert_eq!(resp.headers()["www-authenticate"], "Bearer");
    }

    assert_eq!(h.image_count(), 0);
    assert_eq!(h.blob_count(), 0);
}

#[tokio::test]
async fn unauthenticated_list_is_rejected() {
    let h = TestHarness::with_server().await;

    let resp = h.list(None).await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn invalid_images_are_field_errors() {
    let h = TestHarness::with_server().await;
    let access = h.login_new_user("picam").await;

    let cases = [
        json!({}),
        json!({"image": ""}),
        json!({"image": "!!not base64!!"}),
        json!({"image": "aGVsbG8gd29ybGQ="}),
    ];
    for body in cases {
        let resp = h.upload(Some(&access), &body).await;
        assert_eq!(resp.status(), 400, "{body}");
        let err: Value = resp.json().await.unwrap();
        assert!(err["fields"]["image"].is_array(), "{body}");
    }

    assert_eq!(h.image_count(), 0);
    assert_eq!(h.blob_count(), 0);
}

#[tokio::test]
async fn oversized_image_is_rejected() {
    let mut config = common::test_config();
    config.uploads.max_bytes = 64;
    let h = TestHarness::with_server_config(config).await;
    let access = h.login_new_user("picam").await;

    let big = image::RgbImage::from_fn(64, 64, |x, y| image::Rgb([x as u8, y as u8, 7]));
    let mut buf = std::io::Cursor::new(Vec::new());
    big.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    let encoded = {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
    };

    let resp = h.upload(Some(&access), &json!({"image": encoded})).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(h.image_count(), 0);
}
