use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    auth::AuthUser,
    error::AppError,
    handlers::{AppJson, AppPath},
    links,
    models::{present, ApiResponse, CreateLinkRequest, LinkList, LinkView, URL_LIMIT},
    AppState,
};

/// POST /api/urls
pub async fn create_url(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<CreateLinkRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LinkView>>), AppError> {
    let raw = present(&payload.original_url)
        .ok_or_else(|| AppError::Validation("Please provide a URL to shorten".into()))?;
    let original_url = links::normalize_url(raw)?;

    let link = links::create_for_user(&state.db, &user.id, &original_url).await?;
    let short_url = state.config.short_url(&link.short_code);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "URL shortened successfully",
            LinkView::new(link, short_url),
        )),
    ))
}

/// GET /api/urls
pub async fn list_urls(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<LinkList>>, AppError> {
    let urls: Vec<LinkView> = links::list_for_user(&state.db, &user.id)
        .await?
        .into_iter()
        .map(|link| {
            let short_url = state.config.short_url(&link.short_code);
            LinkView::new(link, short_url)
        })
        .collect();

    Ok(Json(ApiResponse::data(LinkList {
        total_count: urls.len(),
        urls,
        limit: URL_LIMIT,
    })))
}

/// DELETE /api/urls/:id
pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    links::delete_for_user(&state.db, &user.id, &id).await?;
    Ok(Json(ApiResponse::message("URL deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        test_utils::{register, send, test_app, test_state},
    };
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn create_requires_token() {
        let app = test_app(test_state().await);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/urls",
            None,
            Some(json!({ "originalUrl": "example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_returns_normalized_link_and_short_url() {
        let app = test_app(test_state().await);
        let (_, token) = register(&app, "Ada", "ada@example.com").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/urls",
            Some(&token),
            Some(json!({ "originalUrl": "example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let data = &body["data"];
        assert_eq!(data["originalUrl"], "https://example.com/");
        assert_eq!(data["clicks"], 0);
        let code = data["shortCode"].as_str().unwrap();
        assert_eq!(
            data["shortUrl"].as_str().unwrap(),
            format!("http://localhost:5000/{code}")
        );
    }

    #[tokio::test]
    async fn create_rejects_missing_and_invalid_urls() {
        let app = test_app(test_state().await);
        let (_, token) = register(&app, "Ada", "ada@example.com").await;

        let (status, body) =
            send(&app, Method::POST, "/api/urls", Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide a URL to shorten");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/urls",
            Some(&token),
            Some(json!({ "originalUrl": "http://"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide a valid URL");
    }

    #[tokio::test]
    async fn create_over_quota_is_forbidden() {
        let state = test_state().await;
        let app = test_app(state.clone());
        let (user_id, token) = register(&app, "Ada", "ada@example.com").await;
        sqlx::query("UPDATE users SET url_count = ?1 WHERE id = ?2")
            .bind(URL_LIMIT)
            .bind(&user_id)
            .execute(&state.db)
            .await
            .unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/urls",
            Some(&token),
            Some(json!({ "originalUrl": "example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["message"],
            "URL limit reached (100/100). Please upgrade your account."
        );
        assert!(db::list_links_for_user(&state.db, &user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_only_shows_own_links() {
        let app = test_app(test_state().await);
        let (_, ada) = register(&app, "Ada", "ada@example.com").await;
        let (_, bob) = register(&app, "Bob", "bob@example.com").await;

        for url in ["a.com", "b.com"] {
            send(&app, Method::POST, "/api/urls", Some(&ada), Some(json!({ "originalUrl": url })))
                .await;
        }
        send(&app, Method::POST, "/api/urls", Some(&bob), Some(json!({ "originalUrl": "c.com" })))
            .await;

        let (status, body) = send(&app, Method::GET, "/api/urls", Some(&ada), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalCount"], 2);
        assert_eq!(body["data"]["limit"], 100);
        // newest first
        assert_eq!(body["data"]["urls"][0]["originalUrl"], "https://b.com/");
        assert_eq!(body["data"]["urls"][1]["originalUrl"], "https://a.com/");
    }

    #[tokio::test]
    async fn delete_status_codes() {
        let app = test_app(test_state().await);
        let (_, ada) = register(&app, "Ada", "ada@example.com").await;
        let (_, bob) = register(&app, "Bob", "bob@example.com").await;

        let (_, created) = send(
            &app,
            Method::POST,
            "/api/urls",
            Some(&ada),
            Some(json!({ "originalUrl": "example.com" })),
        )
        .await;
        let id = created["data"]["_id"].as_str().unwrap();

        let (status, _) = send(&app, Method::DELETE, "/api/urls/not-a-uuid", Some(&ada), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = format!("/api/urls/{}", uuid::Uuid::new_v4());
        let (status, _) = send(&app, Method::DELETE, &missing, Some(&ada), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/urls/{id}");
        let (status, body) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized to delete this URL");

        let (status, body) = send(&app, Method::DELETE, &uri, Some(&ada), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "URL deleted successfully");
    }

    #[tokio::test]
    async fn delete_with_undecodable_id_is_400_envelope() {
        let app = test_app(test_state().await);
        let (_, ada) = register(&app, "Ada", "ada@example.com").await;

        let (status, body) = send(&app, Method::DELETE, "/api/urls/%FF%FE", Some(&ada), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
