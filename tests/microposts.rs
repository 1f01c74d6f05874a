mod common;

use axum::http::StatusCode;
use common::TestApp;
use sample_app::db::MicropostRepository;

#[tokio::test]
async fn visitor_home_page() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let page = client.get("/").await;

    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.title(), "Sample App");
    assert_eq!(page.body["heading"], "Sample App");
    assert_eq!(page.body["signup_href"], "/signup");
}

#[tokio::test]
async fn home_page_counts_a_single_micropost() {
    let app = TestApp::spawn().await;
    let user = app.create_user("Example User", "user@example.com", false).await;
    app.create_micropost(&user, "Foo").await;
    let mut client = app.client();
    client.sign_in_as(&user).await;

    let page = client.get("/").await;

    assert_eq!(page.body["heading"], "Example User");
    assert_eq!(page.body["user"]["micropost_count"], "1 micropost");
    assert_eq!(page.body["feed"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn home_page_counts_multiple_microposts() {
    let app = TestApp::spawn().await;
    let user = app.create_user("Example User", "user@example.com", false).await;
    app.create_micropost(&user, "Foo").await;
    app.create_micropost(&user, "Bar").await;
    let mut client = app.client();
    client.sign_in_as(&user).await;

    let page = client.get("/").await;
    assert_eq!(page.body["user"]["micropost_count"], "2 microposts");
}

#[tokio::test]
async fn home_page_with_no_microposts() {
    let app = TestApp::spawn().await;
    let user = app.create_user("Example User", "user@example.com", false).await;
    let mut client = app.client();
    client.sign_in_as(&user).await;

    let page = client.get("/").await;
    assert_eq!(page.body["user"]["micropost_count"], "0 microposts");
    assert!(page.body["feed"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn home_feed_is_paginated() {
    let app = TestApp::spawn().await;
    let user = app.create_user("Example User", "user@example.com", false).await;
    for _ in 0..31 {
        app.create_micropost(&user, "FooBar").await;
    }
    let mut client = app.client();
    client.sign_in_as(&user).await;

    let page = client.get("/").await;
    assert_eq!(page.body["user"]["micropost_count"], "31 microposts");
    assert_eq!(page.body["feed"].as_array().unwrap().len(), 30);
    assert_eq!(page.body["pagination"]["total_pages"], 2);

    let second = client.get("/?page=2").await;
    assert_eq!(second.body["feed"].as_array().unwrap().len(), 1);
    assert_eq!(second.body["pagination"]["page"], 2);
}

#[tokio::test]
async fn create_micropost() {
    let app = TestApp::spawn().await;
    let user = app.create_user("Example User", "user@example.com", false).await;
    let mut client = app.client();
    client.sign_in_as(&user).await;

    let response = client.post("/microposts", &[("content", "  Lorem ipsum  ")]).await;
    assert!(response.redirects_to("/"));

    let page = client.get("/").await;
    assert_eq!(page.flash_message(), Some("Micropost created!"));
    assert_eq!(page.body["user"]["micropost_count"], "1 micropost");
    assert_eq!(page.body["feed"][0]["content"], "Lorem ipsum");
}

#[tokio::test]
async fn create_micropost_with_invalid_content() {
    let app = TestApp::spawn().await;
    let user = app.create_user("Example User", "user@example.com", false).await;
    let mut client = app.client();
    client.sign_in_as(&user).await;

    let page = client.post("/microposts", &[("content", "   ")]).await;
    assert_eq!(page.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(page.errors(), vec!["Content can't be blank"]);

    let too_long = "a".repeat(141);
    let page = client.post("/microposts", &[("content", too_long.as_str())]).await;
    assert_eq!(page.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(page.body["micropost_form"]["content"], too_long.as_str());

    assert_eq!(
        MicropostRepository::count_for_user(&app.pool, user.id).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn owner_deletes_micropost() {
    let app = TestApp::spawn().await;
    let user = app.create_user("Example User", "user@example.com", false).await;
    let post = app.create_micropost(&user, "Foo").await;
    let mut client = app.client();
    client.sign_in_as(&user).await;

    let response = client.delete(&format!("/microposts/{}", post.id)).await;

    assert!(response.redirects_to("/"));
    assert!(MicropostRepository::get_by_id(&app.pool, post.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn other_users_cannot_delete_micropost() {
    let app = TestApp::spawn().await;
    let owner = app.create_user("Owner", "owner@example.com", false).await;
    let admin = app.create_user("Admin", "admin@example.com", true).await;
    let post = app.create_micropost(&owner, "Foo").await;
    let mut client = app.client();
    client.sign_in_as(&admin).await;

    let response = client.delete(&format!("/microposts/{}", post.id)).await;
    assert!(response.redirects_to("/"));

    let missing = client.delete("/microposts/999").await;
    assert!(missing.redirects_to("/"));

    assert!(MicropostRepository::get_by_id(&app.pool, post.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn health_check() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let response = client.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
}
