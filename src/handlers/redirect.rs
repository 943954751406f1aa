use crate::{error::AppError, handlers::AppPath, links, AppState};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /:code
///
/// Count the visit and answer with a 302 to the stored URL. Public.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    AppPath(code): AppPath<String>,
) -> Result<Response, AppError> {
    let original_url = links::resolve(&state.db, &code).await?;
    tracing::debug!(short_code = %code, "Redirecting to {}", original_url);

    Ok((StatusCode::FOUND, [(header::LOCATION, original_url)]).into_response())
}

#[cfg(test)]
mod tests {
    use crate::{
        db, links,
        test_utils::{create_test_user, send, send_raw, test_app, test_state},
    };
    use axum::http::{header, Method, StatusCode};

    #[tokio::test]
    async fn redirects_and_counts_the_click() {
        let state = test_state().await;
        let user = create_test_user(&state.db, "ada@example.com").await;
        let link = links::create_for_user(&state.db, &user.id, "https://example.com/page")
            .await
            .unwrap();
        let app = test_app(state.clone());

        let response = send_raw(&app, Method::GET, &format!("/{}", link.short_code), None, None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://example.com/page"
        );

        let after = db::get_link_by_code(&state.db, &link.short_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.clicks, 1);
        assert_eq!(after.original_url, "https://example.com/page");
    }

    #[tokio::test]
    async fn unknown_code_is_404_envelope() {
        let app = test_app(test_state().await);
        let (status, body) = send(&app, Method::GET, "/Zz9Zz9", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "URL not found");
    }

    #[tokio::test]
    async fn undecodable_code_is_400_envelope() {
        let app = test_app(test_state().await);
        let response = send_raw(&app, Method::GET, "/%FF%FE%FD%FC%FB%FA", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let (status, body) = send(&app, Method::GET, "/%FF%FE%FD%FC%FB%FA", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("UTF-8"));
    }
}
