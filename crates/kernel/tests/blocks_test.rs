#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Block, document and styling routes over the real router.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use uuid::Uuid;

use passport_kernel::content::BlockCollection;
use passport_kernel::models::BlockType;
use passport_test_utils::{assert, image_block, text_block};

mod common;
use common::{EDITOR, TestApp, VIEWER, ids};

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn health_check_returns_healthy() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "healthy");
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;

    let response = app
        .get(&format!("/api/dpp/{doc}/content/blocks"), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error"], "unauthorized");
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;

    let response = app
        .get(&format!("/api/dpp/{doc}/content/blocks"), Some("nope"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers.get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer error=\"invalid_token\""
    );
}

#[tokio::test]
async fn viewer_can_read_but_not_write() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    app.create_block(doc, text_block("Care", "Wash cold")).await;

    let listed = app
        .get(&format!("/api/dpp/{doc}/content/blocks"), Some(VIEWER))
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.json().as_array().unwrap().len(), 1);

    let created = app
        .call(
            "POST",
            &format!("/api/dpp/{doc}/content/blocks"),
            Some(VIEWER),
            Some(text_block("x", "y")),
        )
        .await;
    assert_eq!(created.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let app = TestApp::new();
    let response = app
        .get(
            &format!("/api/dpp/{}/content/blocks", Uuid::now_v7()),
            Some(EDITOR),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Block CRUD
// =============================================================================

#[tokio::test]
async fn new_blocks_are_drafts_appended_at_the_end() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;

    let first = app.create_block(doc, text_block("A", "a")).await;
    let second = app.create_block(doc, image_block("/files/a.png", "A")).await;

    assert_eq!(first["status"], "draft");
    assert_eq!(first["order"], 0);
    assert_eq!(second["order"], 1);
    assert_eq!(second["type"], "image");
}

#[tokio::test]
async fn block_from_template_uses_default_content() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;

    let block = app.create_block(doc, json!({ "type": "accordion" })).await;
    assert_eq!(block["type"], "accordion");
    assert!(block["content"].is_object());
}

#[tokio::test]
async fn update_returns_canonical_block() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let block = app.create_block(doc, text_block("A", "a")).await;
    let id = block["id"].as_str().unwrap();

    let response = app
        .call(
            "PUT",
            &format!("/api/dpp/{doc}/content/blocks/{id}"),
            Some(EDITOR),
            Some(json!({ "content": { "heading": "Care", "text": "Wash cold" } })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    let updated = response.json();
    assert_eq!(updated["content"]["text"], "Wash cold");
    assert_eq!(updated["id"], block["id"]);
    assert_eq!(updated["order"], 0);
}

#[tokio::test]
async fn publishing_an_incomplete_block_is_rejected() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let block = app.create_block(doc, text_block("Only a heading", "")).await;
    let id = block["id"].as_str().unwrap();

    let response = app
        .call(
            "PUT",
            &format!("/api/dpp/{doc}/content/blocks/{id}"),
            Some(EDITOR),
            Some(json!({ "status": "published" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["details"][0], "text: 'text' is required");
}

#[tokio::test]
async fn delete_removes_block() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let a = app.create_block(doc, text_block("A", "a")).await;
    let b = app.create_block(doc, text_block("B", "b")).await;

    let response = app
        .call(
            "DELETE",
            &format!("/api/dpp/{doc}/content/blocks/{}", a["id"].as_str().unwrap()),
            Some(EDITOR),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let remaining = app.list_blocks(doc).await;
    assert_eq!(ids(&remaining), vec![b["id"].as_str().unwrap().to_string()]);
}

// =============================================================================
// Reorder
// =============================================================================

#[tokio::test]
async fn valid_reorder_yields_requested_order() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let mut created = Vec::new();
    for i in 0..4 {
        created.push(app.create_block(doc, text_block(&format!("H{i}"), "t")).await);
    }
    let wanted = vec![
        created[2]["id"].clone(),
        created[0]["id"].clone(),
        created[3]["id"].clone(),
        created[1]["id"].clone(),
    ];

    let response = app
        .call(
            "POST",
            &format!("/api/dpp/{doc}/content/blocks/reorder"),
            Some(EDITOR),
            Some(json!({ "blockIds": wanted })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());

    let blocks = app.list_blocks(doc).await;
    let listed: Vec<_> = blocks.iter().map(|b| b["id"].clone()).collect();
    assert_eq!(listed, wanted);
    let orders: Vec<i64> = blocks.iter().map(|b| b["order"].as_i64().unwrap()).collect();
    assert!(orders.windows(2).all(|w| w[0] < w[1]), "{orders:?}");
}

#[tokio::test]
async fn invalid_reorder_leaves_order_unchanged() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let a = app.create_block(doc, text_block("A", "a")).await;
    let b = app.create_block(doc, text_block("B", "b")).await;
    let before = ids(&app.list_blocks(doc).await);

    for block_ids in [
        json!([b["id"]]),
        json!([b["id"], b["id"]]),
        json!([b["id"], a["id"], Uuid::now_v7()]),
    ] {
        let response = app
            .call(
                "POST",
                &format!("/api/dpp/{doc}/content/blocks/reorder"),
                Some(EDITOR),
                Some(json!({ "blockIds": block_ids })),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(ids(&app.list_blocks(doc).await), before);
    }
}

// =============================================================================
// Forms, block types and capabilities
// =============================================================================

#[tokio::test]
async fn form_describes_block_fields() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let block = app.create_block(doc, text_block("A", "a")).await;

    let response = app
        .get(
            &format!(
                "/api/dpp/{doc}/content/blocks/{}/form",
                block["id"].as_str().unwrap()
            ),
            Some(EDITOR),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let names: Vec<String> = response
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"heading".to_string()));
    assert!(names.contains(&"text".to_string()));
}

#[tokio::test]
async fn block_types_follow_capabilities() {
    let app = TestApp::with_capabilities(&["cms_access"]);
    let doc = app.create_document("Jacket").await;

    let response = app
        .get(&format!("/api/dpp/{doc}/content/block-types"), Some(EDITOR))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    let types: Vec<&str> = body["types"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"text"));
    assert!(!types.contains(&"storytelling"));
    assert!(body["autosave"]["debounceMs"].as_u64().unwrap() > 0);

    let denied = app
        .call(
            "POST",
            &format!("/api/dpp/{doc}/content/blocks"),
            Some(EDITOR),
            Some(json!({ "type": "storytelling" })),
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn styling_requires_capability() {
    let app = TestApp::with_capabilities(&["cms_access"]);
    let doc = app.create_document("Jacket").await;

    let read = app
        .get(&format!("/api/dpp/{doc}/content/styling"), Some(EDITOR))
        .await;
    assert_eq!(read.status, StatusCode::OK);

    let write = app
        .call(
            "PUT",
            &format!("/api/dpp/{doc}/content/styling"),
            Some(EDITOR),
            Some(json!({ "colors": { "primary": "#112233" } })),
        )
        .await;
    assert_eq!(write.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn styling_is_validated_and_resolved() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let uri = format!("/api/dpp/{doc}/content/styling");

    let bad = app
        .call("PUT", &uri, Some(EDITOR), Some(json!({ "colors": { "primary": "red" } })))
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let good = app
        .call(
            "PUT",
            &uri,
            Some(EDITOR),
            Some(json!({ "colors": { "primary": "#112233" } })),
        )
        .await;
    assert_eq!(good.status, StatusCode::OK, "{}", good.text());
    assert_eq!(good.json()["colors"]["primary"], "#112233");
}

// =============================================================================
// Compliance fields
// =============================================================================

#[tokio::test]
async fn field_update_keeps_blocks() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    app.create_block(doc, text_block("A", "a")).await;

    let response = app
        .call(
            "PUT",
            &format!("/api/dpp/{doc}/fields"),
            Some(EDITOR),
            Some(json!({ "name": "Rain jacket", "category": "TEXTILE", "gtin": "4006381333931" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    assert_eq!(response.json()["fields"]["name"], "Rain jacket");
    assert_eq!(app.list_blocks(doc).await.len(), 1);
}

#[tokio::test]
async fn invalid_fields_are_rejected() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;

    let response = app
        .call(
            "PUT",
            &format!("/api/dpp/{doc}/fields"),
            Some(EDITOR),
            Some(json!({ "name": "", "category": "TOYS", "gtin": "12" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["details"].as_array().unwrap().len(), 3);
}

// =============================================================================
// Media
// =============================================================================

const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

fn multipart(filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "passport-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[tokio::test]
async fn uploaded_media_is_served() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let (content_type, body) = multipart("logo.png", PNG);

    let response = common::read(
        app.request(
            Request::post(format!("/api/dpp/{doc}/media"))
                .header(header::AUTHORIZATION, format!("Bearer {EDITOR}"))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await,
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    let stored = response.json();
    assert_eq!(stored["mimeType"], "image/png");
    let url = stored["url"].as_str().unwrap();
    assert::contains(url, "/files/");

    let served = app.get(url, None).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.bytes, PNG);
}

#[tokio::test]
async fn upload_rejects_disallowed_type() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let (content_type, body) = multipart("notes.txt", b"plain text");

    let response = app
        .request(
            Request::post(format!("/api/dpp/{doc}/media"))
                .header(header::AUTHORIZATION, format!("Bearer {EDITOR}"))
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Collection manager over the guarded service
// =============================================================================

#[tokio::test]
async fn deleting_selected_block_clears_selection() {
    let app = TestApp::new();
    let doc = app.create_document("Jacket").await;
    let scoped = std::sync::Arc::new(app.state.blocks().scoped(app.user(EDITOR)));

    let mut collection = BlockCollection::new(
        scoped,
        app.state.registry().clone(),
        Default::default(),
        doc,
    );
    collection.load().await.unwrap();
    let first = collection.add(BlockType::Text, None).await.unwrap().id;
    let second = collection.add(BlockType::Text, None).await.unwrap().id;

    collection.select(first).unwrap();
    let pending = collection.request_delete(second).unwrap();
    collection.confirm_delete(pending).await.unwrap();
    assert_eq!(collection.selected().map(|b| b.id), Some(first));

    let pending = collection.request_delete(first).unwrap();
    collection.confirm_delete(pending).await.unwrap();
    assert!(collection.selected().is_none());
    assert!(app.list_blocks(doc).await.is_empty());
}
