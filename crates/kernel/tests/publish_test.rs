#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Publish pipeline and version history over the real router.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use passport_kernel::publish::RequiredFields;
use passport_test_utils::{assert, image_block, text_block};

mod common;
use common::{EDITOR, SITE_URL, TestApp, VIEWER};

#[tokio::test]
async fn publish_captures_fields_and_published_blocks_only() {
    let app = TestApp::new();
    let doc = app.create_document("Field A").await;
    let text = app.create_block(doc, text_block("Story", "Made in Porto")).await;
    app.create_block(doc, text_block("Draft", "Not yet")).await;
    app.set_block_status(doc, text["id"].as_str().unwrap(), "published")
        .await;

    let response = app.publish(doc).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let outcome = response.json();
    assert_eq!(outcome["created"], true);

    let version = &outcome["version"];
    assert_eq!(version["version"], 1);
    assert_eq!(version["snapshot"]["fields"]["name"], "Field A");
    let blocks = version["snapshot"]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["id"], text["id"]);
    assert_eq!(
        version["publicUrl"],
        format!("{SITE_URL}/public/dpp/{doc}/v/1")
    );
    assert_eq!(
        version["scannableCode"],
        format!("{SITE_URL}/public/dpp/{doc}/v/1?src=code")
    );

    let document = app.get(&format!("/api/dpp/{doc}"), Some(EDITOR)).await;
    assert_eq!(document.json()["status"], "published");
}

#[tokio::test]
async fn publishing_twice_without_edits_returns_same_version() {
    let app = TestApp::new();
    let doc = app.create_document("Chair").await;

    let first = app.publish(doc).await;
    assert_eq!(first.status, StatusCode::CREATED);

    for _ in 0..3 {
        let again = app.publish(doc).await;
        assert_eq!(again.status, StatusCode::OK);
        let outcome = again.json();
        assert_eq!(outcome["created"], false);
        assert_eq!(outcome["version"]["version"], 1);
    }

    let versions = app.get(&format!("/api/dpp/{doc}/versions"), Some(EDITOR)).await;
    assert_eq!(versions.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn fetched_versions_are_byte_stable() {
    let app = TestApp::new();
    let doc = app.create_document("Lamp").await;
    let block = app.create_block(doc, text_block("Care", "Dust only")).await;
    let id = block["id"].as_str().unwrap().to_string();
    app.set_block_status(doc, &id, "published").await;
    app.publish(doc).await;

    let uri = format!("/api/dpp/{doc}/versions/1");
    let before = app.get(&uri, Some(EDITOR)).await;
    assert_eq!(before.status, StatusCode::OK);
    let page_before = app.get(&format!("/public/dpp/{doc}/v/1"), None).await;

    app.call(
        "PUT",
        &format!("/api/dpp/{doc}/content/blocks/{id}"),
        Some(EDITOR),
        Some(json!({ "content": { "heading": "Care", "text": "Wipe with a damp cloth" } })),
    )
    .await;
    app.call(
        "PUT",
        &format!("/api/dpp/{doc}/fields"),
        Some(EDITOR),
        Some(json!({ "name": "Desk lamp", "category": "FURNITURE" })),
    )
    .await;

    let after = app.get(&uri, Some(EDITOR)).await;
    assert_eq!(before.bytes, after.bytes);
    let page_after = app.get(&format!("/public/dpp/{doc}/v/1"), None).await;
    assert_eq!(page_before.bytes, page_after.bytes);
    assert::contains(&page_after.text(), "Dust only");
    assert::not_contains(&page_after.text(), "damp cloth");
}

#[tokio::test]
async fn text_and_image_scenario() {
    let app = TestApp::new();
    let doc = app.create_document("Sneaker").await;

    let text = app.create_block(doc, text_block("Origin", "Stitched by hand")).await;
    let image = app
        .create_block(doc, image_block("https://cdn.example/shoe.png", "Shoe"))
        .await;
    app.set_block_status(doc, text["id"].as_str().unwrap(), "published")
        .await;

    let v1 = app.publish(doc).await.json();
    let v1_blocks = v1["version"]["snapshot"]["blocks"].as_array().unwrap().clone();
    assert_eq!(v1_blocks.len(), 1);
    assert_eq!(v1_blocks[0]["id"], text["id"]);

    let state = app
        .get(&format!("/api/dpp/{doc}/publish-state"), Some(EDITOR))
        .await
        .json();
    assert_eq!(state["state"], "published");

    // Third block, published immediately
    let third = app.create_block(doc, text_block("Care", "Brush clean")).await;
    app.set_block_status(doc, third["id"].as_str().unwrap(), "published")
        .await;

    let state = app
        .get(&format!("/api/dpp/{doc}/publish-state"), Some(EDITOR))
        .await
        .json();
    assert_eq!(state["state"], "published_with_pending_edits");
    assert_eq!(state["latestVersion"], 1);

    let stored_v1 = app
        .get(&format!("/api/dpp/{doc}/versions/1"), Some(EDITOR))
        .await
        .json();
    assert_eq!(stored_v1["snapshot"]["blocks"].as_array().unwrap().len(), 1);

    let v2 = app.publish(doc).await.json();
    assert_eq!(v2["version"]["version"], 2);
    let v2_ids: Vec<_> = v2["version"]["snapshot"]["blocks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].clone())
        .collect();
    assert_eq!(v2_ids, vec![text["id"].clone(), third["id"].clone()]);
    assert!(!v2_ids.contains(&image["id"]));

    let page = app.get(&format!("/public/dpp/{doc}/v/1"), None).await;
    assert::not_contains(&page.text(), "Brush clean");
}

#[tokio::test]
async fn draft_document_state() {
    let app = TestApp::new();
    let doc = app.create_document("Bag").await;

    let state = app
        .get(&format!("/api/dpp/{doc}/publish-state"), Some(VIEWER))
        .await;
    assert_eq!(state.status, StatusCode::OK);
    assert_eq!(state.json()["state"], "draft");
    assert!(state.json()["latestVersion"].is_null());
}

#[tokio::test]
async fn viewer_cannot_publish() {
    let app = TestApp::new();
    let doc = app.create_document("Bag").await;

    let response = app
        .call("POST", &format!("/api/dpp/{doc}/publish"), Some(VIEWER), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let versions = app.get(&format!("/api/dpp/{doc}/versions"), Some(VIEWER)).await;
    assert!(versions.json().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn guard_blocks_publish_without_required_fields() {
    let app = TestApp::with_guard(Arc::new(RequiredFields::new(["name", "brand"])));
    let doc = app.create_document("Bag").await;

    let response = app.publish(doc).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["details"][0], "brand is required to publish");

    app.call(
        "PUT",
        &format!("/api/dpp/{doc}/fields"),
        Some(EDITOR),
        Some(json!({ "name": "Bag", "category": "TEXTILE", "brand": "Acme" })),
    )
    .await;
    let retry = app.publish(doc).await;
    assert_eq!(retry.status, StatusCode::CREATED);
    assert_eq!(retry.json()["version"]["version"], 1);
}

#[tokio::test]
async fn version_history_is_newest_first() {
    let app = TestApp::new();
    let doc = app.create_document("Bag").await;
    app.publish(doc).await;
    app.call(
        "PUT",
        &format!("/api/dpp/{doc}/fields"),
        Some(EDITOR),
        Some(json!({ "name": "Tote bag", "category": "TEXTILE" })),
    )
    .await;
    app.publish(doc).await;

    let versions = app
        .get(&format!("/api/dpp/{doc}/versions"), Some(EDITOR))
        .await
        .json();
    let numbers: Vec<i64> = versions
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![2, 1]);

    let missing = app.get(&format!("/api/dpp/{doc}/versions/9"), Some(EDITOR)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn public_page_renders_theme_and_escapes_fields() {
    let app = TestApp::new();
    let doc = app.create_document("<b>Bold</b> chair").await;
    app.call(
        "PUT",
        &format!("/api/dpp/{doc}/content/styling"),
        Some(EDITOR),
        Some(json!({ "colors": { "primary": "#123456" } })),
    )
    .await;
    app.publish(doc).await;

    let page = app.get(&format!("/public/dpp/{doc}/v/1"), None).await;
    assert_eq!(page.status, StatusCode::OK);
    let html = page.text();
    assert::contains(&html, "#123456");
    assert::contains(&html, "&lt;b&gt;Bold&lt;/b&gt; chair");
    assert::not_contains(&html, "<b>Bold</b>");

    let public_url = format!("{SITE_URL}/public/dpp/{doc}/v/1");
    assert::contains(&html, &format!("<a href=\"{public_url}\">"));
    assert::contains(&html, &format!("{public_url}?src=code"));
}
