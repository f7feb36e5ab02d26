use super::{
    error::BlogError,
    format::{format_edited, format_optional_date},
    richtext,
    types::*,
};
use crate::{AppState, preview};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

#[derive(Deserialize)]
pub struct LoadMoreQuery {
    cursor: Option<String>,
}

fn post_url(uid: &str) -> String {
    format!("/post/{}", urlencoding::encode(uid))
}

fn error_response(e: &BlogError) -> Response {
    match e {
        BlogError::NotFound(_) => (StatusCode::NOT_FOUND, "Post not found").into_response(),
        BlogError::InvalidCursor(_) => {
            (StatusCode::BAD_REQUEST, "Invalid pagination cursor").into_response()
        }
        BlogError::SourceUnavailable(source) => {
            error!("Content source error: {}", source);
            (StatusCode::BAD_GATEWAY, "Content source unavailable").into_response()
        }
    }
}

fn base_url(app_state: &AppState) -> &str {
    app_state
        .config
        .app
        .base_url
        .as_deref()
        .unwrap_or("http://localhost:3000")
}

/// Cache-busted URLs for the stylesheet and the "load more" script.
async fn asset_urls(app_state: &AppState) -> (String, String) {
    let handler = &app_state.static_handler;
    (
        handler.get_versioned_url("style.css").await,
        handler.get_versioned_url("load_more.js").await,
    )
}

fn summary_object(post: &PostSummary) -> liquid::Object {
    liquid::object!({
        "uid": post.uid,
        "url": post_url(&post.uid),
        "title": post.data.title,
        "subtitle": post.data.subtitle,
        "author": post.data.author,
        "date": post.first_publication_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
        "date_formatted": format_optional_date(post.first_publication_date.as_ref()),
    })
}

fn link_object(link: Option<&PostLink>) -> liquid::Object {
    match link {
        Some(link) => liquid::object!({
            "uid": link.uid,
            "title": link.title,
            "url": post_url(&link.uid),
        }),
        None => liquid::object!({
            "uid": "",
            "title": "",
            "url": "",
        }),
    }
}

pub async fn index_handler(State(app_state): State<AppState>) -> Response {
    let pagination = match app_state.listing.build_initial_page().await {
        Ok(pagination) => pagination,
        Err(e) => return error_response(&e),
    };

    let posts: Vec<_> = pagination.results.iter().map(summary_object).collect();
    let config = app_state.listing.get_config();
    let base_url = base_url(&app_state);
    let site_name = app_state.config.app.name.clone();
    let (style_url, script_url) = asset_urls(&app_state).await;

    let globals = liquid::object!({
        "posts": posts,
        "has_next": pagination.next_page.is_some(),
        "next_page": pagination.next_page.clone().unwrap_or_default(),
        "load_more_url": "/api/posts",
        "site_name": site_name,
        "base_url": base_url,
        "page_title": "Home",
        "meta_description": format!("Posts do {}", site_name),
        "og_title": site_name,
        "og_url": base_url,
        "og_type": "website",
        "style_url": style_url,
        "script_url": script_url,
        "preview": false,
    });

    match app_state
        .template_engine
        .render_template(&config.index_template, globals)
        .await
    {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template rendering error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// JSON page for the "load more" button: `{ next_page, results }`.
pub async fn load_more_handler(
    State(app_state): State<AppState>,
    Query(query): Query<LoadMoreQuery>,
) -> Response {
    let Some(cursor) = query.cursor else {
        return (StatusCode::BAD_REQUEST, "Missing cursor").into_response();
    };

    match app_state.listing.load_more(&cursor).await {
        Ok(pagination) => Json(pagination).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn post_handler(
    State(app_state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let preview_ref = preview::preview_ref(&headers, &app_state.config.app.preview_secret);

    // Previews always read the draft and never touch the cache.
    let page = match preview_ref.as_deref() {
        Some(reference) => match app_state.detail.resolve(&slug, Some(reference)).await {
            Ok(page) => Some(Arc::new(page)),
            Err(BlogError::NotFound(_)) => None,
            Err(e) => return error_response(&e),
        },
        None => match app_state.detail.page(&slug).await {
            Ok(page) => page,
            Err(e) => return error_response(&e),
        },
    };

    let Some(page) = page else {
        return (StatusCode::NOT_FOUND, "Post not found").into_response();
    };

    let post = &page.post;
    let config = app_state.detail.get_config();
    let base_url = base_url(&app_state);
    let (style_url, script_url) = asset_urls(&app_state).await;

    let content: Vec<_> = post
        .data
        .content
        .iter()
        .map(|block| {
            liquid::object!({
                "heading": block.heading,
                "html": richtext::as_html(&block.body),
            })
        })
        .collect();

    let edited_formatted = match (page.is_edited, post.last_publication_date.as_ref()) {
        (true, Some(date)) => format_edited(date),
        _ => String::new(),
    };

    let globals = liquid::object!({
        "post": {
            "uid": post.uid,
            "title": post.data.title,
            "subtitle": post.data.subtitle,
            "author": post.data.author,
            "banner_url": post.data.banner.url,
            "banner_alt": post.data.banner.alt,
            "date": post.first_publication_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            "date_formatted": format_optional_date(post.first_publication_date.as_ref()),
            "edited_formatted": edited_formatted,
            "content": content,
        },
        "read_time_minutes": page.read_time_minutes,
        "is_edited": page.is_edited,
        "has_prev_post": page.prev_post.is_some(),
        "prev_post": link_object(page.prev_post.as_ref()),
        "has_next_post": page.next_post.is_some(),
        "next_post": link_object(page.next_post.as_ref()),
        "preview": page.preview,
        "site_name": app_state.config.app.name.clone(),
        "base_url": base_url,
        "page_title": post.data.title,
        "meta_description": post.data.subtitle,
        "og_title": post.data.title,
        "og_url": format!("{}{}", base_url, post_url(&post.uid)),
        "og_type": "article",
        "style_url": style_url,
        "script_url": script_url,
    });

    match app_state
        .template_engine
        .render_template(&config.post_template, globals)
        .await
    {
        Ok(html) if page.preview => {
            ([(header::CACHE_CONTROL, "no-store")], Html(html)).into_response()
        }
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template rendering error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}
