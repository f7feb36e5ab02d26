use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use serde_json::{Value, json};
use spacetraveling::{
    Config, content::ContentSourceConfig, content::FileConfig, create_app,
};
use std::{fs, path::PathBuf};
use tempfile::TempDir;

fn post(day: u32, edited: bool) -> Value {
    let published = format!("2021-03-{:02}T19:25:28+0000", day);
    let last = if edited {
        format!("2021-03-{:02}T15:49:00+0000", day + 1)
    } else {
        published.clone()
    };

    json!({
        "id": format!("doc-{}", day),
        "uid": format!("post-{}", day),
        "type": "posts",
        "first_publication_date": published,
        "last_publication_date": last,
        "data": {
            "title": format!("Viagem {}", day),
            "subtitle": format!("Subtítulo {}", day),
            "author": "Danilo Vieira",
            "banner": { "url": format!("https://images.example.com/{}.png", day), "alt": "Banner" },
            "content": [{
                "heading": "Introdução",
                "body": [
                    {
                        "type": "paragraph",
                        "text": vec!["palavra"; 250].join(" "),
                        "spans": [{ "start": 0, "end": 7, "type": "strong" }]
                    }
                ]
            }]
        }
    })
}

async fn setup_test_server() -> (TempDir, TestServer) {
    let temp_dir = TempDir::new().unwrap();
    let content_path = temp_dir.path().join("posts.json");
    let documents: Vec<Value> = (1..=5).map(|day| post(day, day == 3)).collect();
    fs::write(&content_path, serde_json::to_string(&documents).unwrap()).unwrap();

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let mut config = Config::default();
    config.templates.directory = root.join("templates");
    config.static_files.directory = root.join("static");
    config.content = ContentSourceConfig::File(FileConfig { path: content_path });
    config.app.base_url = Some("https://spacetraveling.example.com".to_string());
    config.app.preview_secret = "test-preview-secret".to_string();

    let app = create_app(config).await.unwrap();
    let server = TestServer::new(app).unwrap();
    (temp_dir, server)
}

fn next_page_from_html(html: &str) -> String {
    let marker = "data-next-page=\"";
    let start = html.find(marker).unwrap() + marker.len();
    let end = start + html[start..].find('"').unwrap();
    html[start..end].replace("&amp;", "&")
}

#[tokio::test]
async fn test_home_lists_newest_posts() {
    let (_temp_dir, server) = setup_test_server().await;

    let response = server.get("/").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let html = response.text();
    assert!(html.contains("Viagem 5"));
    assert!(html.contains("Viagem 4"));
    assert!(html.contains("Viagem 3"));
    assert!(!html.contains("Viagem 2"));
    assert!(html.contains("05 mar 21"));
    assert!(html.contains("href=\"/post/post-5\""));
    assert!(html.contains("Carregar mais posts"));
    assert!(html.contains("/static/style.css?v="));

    let newest = html.find("Viagem 5").unwrap();
    let older = html.find("Viagem 4").unwrap();
    assert!(newest < older);
}

#[tokio::test]
async fn test_load_more_follows_cursor() {
    let (_temp_dir, server) = setup_test_server().await;

    let html = server.get("/").await.text();
    let cursor = next_page_from_html(&html);

    let response = server
        .get("/api/posts")
        .add_query_param("cursor", &cursor)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let page: Value = response.json();
    let results = page["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["uid"], "post-2");
    assert_eq!(results[1]["uid"], "post-1");
    assert_eq!(results[0]["data"]["title"], "Viagem 2");
    assert!(page["next_page"].is_null());
}

#[tokio::test]
async fn test_load_more_rejects_bad_cursors() {
    let (_temp_dir, server) = setup_test_server().await;

    let response = server.get("/api/posts").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/posts")
        .add_query_param("cursor", "https://evil.example.com/search?page=2")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_page_renders_content() {
    let (_temp_dir, server) = setup_test_server().await;

    let response = server.get("/post/post-3").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let html = response.text();
    assert!(html.contains("<h1>Viagem 3</h1>"));
    assert!(html.contains("03 mar 21"));
    assert!(html.contains("2 min"));
    assert!(html.contains("* editado em 04 mar 2021, às 15:49"));
    assert!(html.contains("<strong>palavra</strong>"));
    assert!(html.contains("https://images.example.com/3.png"));
    assert!(html.contains("href=\"/post/post-2\""));
    assert!(html.contains("href=\"/post/post-4\""));
    assert!(!html.contains("Sair do modo Preview"));
}

#[tokio::test]
async fn test_first_and_last_posts_have_one_neighbor() {
    let (_temp_dir, server) = setup_test_server().await;

    let html = server.get("/post/post-1").await.text();
    assert!(!html.contains("Post anterior"));
    assert!(html.contains("Próximo post"));
    assert!(!html.contains("editado em"));

    let html = server.get("/post/post-5").await.text();
    assert!(html.contains("Post anterior"));
    assert!(!html.contains("Próximo post"));
}

#[tokio::test]
async fn test_unknown_post_is_not_found() {
    let (_temp_dir, server) = setup_test_server().await;

    let response = server.get("/post/nao-existe").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    // Still not found on the cached path.
    let response = server.get("/post/nao-existe").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preview_enter_and_exit() {
    let (_temp_dir, server) = setup_test_server().await;

    let response = server
        .get("/api/preview")
        .add_query_param("token", "draft-ref")
        .add_query_param("slug", "post-2")
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/post/post-2");

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("preview_ref="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let response = server
        .get("/post/post-2")
        .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert!(response.text().contains("Sair do modo Preview"));

    let response = server.get("/api/exit-preview").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_preview_requires_token() {
    let (_temp_dir, server) = setup_test_server().await;

    let response = server.get("/api/preview").add_query_param("slug", "post-2").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forged_preview_cookie_is_ignored() {
    let (_temp_dir, server) = setup_test_server().await;

    let response = server
        .get("/post/post-2")
        .add_header(
            header::COOKIE,
            HeaderValue::from_static("preview_ref=ZHJhZnQ:forged"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(!response.text().contains("Sair do modo Preview"));
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let (_temp_dir, server) = setup_test_server().await;

    let response = server.get("/static/load_more.js").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("cursor"));

    let response = server.get("/static/style.css").add_query_param("v", "1").await;
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );
}

#[tokio::test]
async fn test_router_without_test_server() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let temp_dir = TempDir::new().unwrap();
    let content_path = temp_dir.path().join("posts.json");
    fs::write(&content_path, "[]").unwrap();

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let mut config = Config::default();
    config.templates.directory = root.join("templates");
    config.static_files.directory = root.join("static");
    config.content = ContentSourceConfig::File(FileConfig { path: content_path });

    let app = create_app(config).await.unwrap();
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // An empty repository still renders the home page, without a load more button.
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(!html.contains("Carregar mais posts"));
}

#[tokio::test]
async fn test_missing_content_file_fails_startup() {
    let mut config = Config::default();
    config.content = ContentSourceConfig::File(FileConfig {
        path: PathBuf::from("/nonexistent/posts.json"),
    });

    assert!(create_app(config).await.is_err());
}

#[tokio::test]
async fn test_post_fields_are_escaped_in_head_and_banner() {
    let temp_dir = TempDir::new().unwrap();
    let content_path = temp_dir.path().join("posts.json");
    let mut document = post(1, false);
    document["data"]["title"] = json!("<script>alert(1)</script>");
    document["data"]["banner"]["url"] = json!("https://images.example.com/a.png\" onerror=\"alert(1)");
    fs::write(&content_path, serde_json::to_string(&vec![document]).unwrap()).unwrap();

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let mut config = Config::default();
    config.templates.directory = root.join("templates");
    config.static_files.directory = root.join("static");
    config.content = ContentSourceConfig::File(FileConfig { path: content_path });

    let server = TestServer::new(create_app(config).await.unwrap()).unwrap();
    let html = server.get("/post/post-1").await.text();

    assert!(!html.contains("<script>alert(1)</script>"));
    assert!(html.contains("<title>&lt;script&gt;alert(1)&lt;/script&gt; | spacetraveling</title>"));
    assert!(!html.contains("\" onerror=\""));
}
