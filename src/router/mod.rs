//! HTTP adapter.

pub mod auth;
pub mod feedback;
pub mod follow;
pub mod media;
pub mod profile;
pub mod status;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ServerError;
use crate::pagination::Pagination;
use crate::AppState;

const BEARER: &str = "Bearer ";
const MISSING_AUTHORIZATION: &str = "Authorization header is required";
const INVALID_AUTHORIZATION: &str = "Invalid authorization format. Use 'Bearer <token>'";

/// JSON body validated before reaching the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Bearer credential of the request, set by [`bearer`].
#[derive(Debug, Clone)]
pub struct Credential(pub String);

/// Require an `Authorization: Bearer <token>` header.
async fn bearer(mut req: Request, next: Next) -> Result<Response, ServerError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(ServerError::Unauthorized(MISSING_AUTHORIZATION))?;

    let token = value
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix(BEARER))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ServerError::Unauthorized(INVALID_AUTHORIZATION))?
        .to_owned();

    req.extensions_mut().insert(Credential(token));
    Ok(next.run(req).await)
}

/// Raw `page` and `pageSize` query values.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<String>,
    #[serde(alias = "page_size")]
    pub page_size: Option<String>,
}

impl PageQuery {
    /// Non-numeric values are ignored.
    pub fn pagination(&self) -> Pagination {
        let parse = |value: &Option<String>| value.as_deref().and_then(|v| v.trim().parse::<i64>().ok());
        Pagination::new(parse(&self.page), parse(&self.page_size))
    }
}

/// Every route under `/api/v1`.
pub fn api() -> Router<AppState> {
    let public = Router::new()
        // `GET /health` goes to `health`.
        .route("/health", get(status::health))
        .route("/user/search", get(profile::search))
        .route("/user/{user_id}/profile", get(follow::public_profile))
        // only `PUT` needs a credential.
        .route(
            "/users/{user_id}/profile",
            put(profile::update_by_id)
                .route_layer(middleware::from_fn(bearer))
                .get(profile::get_by_id),
        )
        .route("/user/{user_id}/followers", get(follow::followers))
        .route("/user/{user_id}/following", get(follow::following))
        .route("/feedback", post(feedback::submit).get(feedback::list))
        .route("/feedback/{feedback_id}/resolve", patch(feedback::resolve))
        .route("/media/sign", post(media::sign));

    // Authorization required.
    let protected = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/users/me/profile", get(profile::me).put(profile::update))
        .route("/user/me/profile/details", get(profile::details))
        .route("/user/{user_id}/follow", post(follow::follow).delete(follow::unfollow))
        .route("/user/{user_id}/follow/status", get(follow::status))
        .route("/media/verify-avatar", post(media::verify_avatar))
        .route_layer(middleware::from_fn(bearer));

    public.merge(protected)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use crate::testing::{credential, state};
    use crate::{app, make_request};

    async fn body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &axum::Router, uid: &str) -> Value {
        let response = make_request(app.clone(), Method::POST, "/api/v1/auth/register", Some(&credential(uid)), String::new()).await;
        body(response).await
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(state());

        let response = make_request(app, Method::GET, "/api/v1/health", None, String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_authorization_header() {
        let app = app(state());

        let response = make_request(app.clone(), Method::POST, "/api/v1/auth/login", None, String::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let error = body(response).await;
        assert_eq!(error["code"], "authentication_error");
        assert_eq!(error["detail"], "Authorization header is required");

        let response = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/login")
            .header(axum::http::header::AUTHORIZATION, "Token abc")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, response).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body(response).await["detail"],
            "Invalid authorization format. Use 'Bearer <token>'"
        );
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let app = app(state());

        let response = make_request(app.clone(), Method::POST, "/api/v1/auth/register", Some(&credential("a")), String::new()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body(response).await;
        assert_eq!(created["email"], "a@rally.test");
        assert_eq!(created["isOnboarding"], true);

        let response = make_request(app.clone(), Method::POST, "/api/v1/auth/register", Some(&credential("a")), String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = make_request(app.clone(), Method::POST, "/api/v1/auth/login", Some(&credential("a")), String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["id"], created["id"]);

        let response = make_request(app, Method::POST, "/api/v1/auth/login", Some("bogus"), String::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(response).await["detail"], "invalid or expired token");
    }

    #[tokio::test]
    async fn test_profile_update_and_search() {
        let app = app(state());
        register(&app, "a").await;
        register(&app, "b").await;

        let update = json!({ "username": "trail.runner", "bioText": "hills" }).to_string();
        let response = make_request(app.clone(), Method::PUT, "/api/v1/users/me/profile", Some(&credential("a")), update.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["username"], "trail.runner");

        let response = make_request(app.clone(), Method::PUT, "/api/v1/users/me/profile", Some(&credential("b")), update).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body(response).await["code"], "conflict_error");

        let invalid = json!({ "username": "a b" }).to_string();
        let response = make_request(app.clone(), Method::PUT, "/api/v1/users/me/profile", Some(&credential("b")), invalid).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(response).await["errors"][0]["field"], "username");

        let response = make_request(app.clone(), Method::GET, "/api/v1/user/me/profile/details", Some(&credential("a")), String::new()).await;
        assert_eq!(body(response).await["bioText"], "hills");

        let response = make_request(app, Method::GET, "/api/v1/user/search?q=TRAIL&page=x&pageSize=5", None, String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let found = body(response).await;
        assert_eq!(found["total"], 1);
        assert_eq!(found["page"], 1);
        assert_eq!(found["pageSize"], 5);
    }

    #[tokio::test]
    async fn test_profile_by_id() {
        let app = app(state());
        let a = register(&app, "a").await;
        let b = register(&app, "b").await;
        let path_a = format!("/api/v1/users/{}/profile", a["id"].as_str().unwrap());
        let path_b = format!("/api/v1/users/{}/profile", b["id"].as_str().unwrap());

        let response = make_request(app.clone(), Method::GET, &path_b, None, String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["email"], "b@rally.test");

        let update = json!({ "firstName": "Mine" }).to_string();
        let response = make_request(app.clone(), Method::PUT, &path_b, None, update.clone()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = make_request(app.clone(), Method::PUT, &path_b, Some(&credential("a")), update.clone()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let error = body(response).await;
        assert_eq!(error["code"], "authorization_error");
        assert_eq!(error["detail"], "unauthorized: cannot modify another user's profile");

        let response = make_request(app.clone(), Method::GET, &path_b, None, String::new()).await;
        assert!(body(response).await["firstName"].is_null());

        let response = make_request(app.clone(), Method::PUT, &path_a, Some(&credential("a")), update).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["firstName"], "Mine");

        let response = make_request(app, Method::GET, "/api/v1/users/nope/profile", None, String::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_follow_flow() {
        let app = app(state());
        let u1 = register(&app, "u1").await;
        let u2 = register(&app, "u2").await;
        let id1 = u1["id"].as_str().unwrap();
        let id2 = u2["id"].as_str().unwrap();
        let follow = format!("/api/v1/user/{id2}/follow");

        let response = make_request(app.clone(), Method::POST, &follow, Some(&credential("u1")), String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(response).await,
            json!({ "success": true, "message": "Successfully followed user", "isFollowing": true })
        );

        let response = make_request(app.clone(), Method::POST, &follow, Some(&credential("u1")), String::new()).await;
        assert_eq!(body(response).await["message"], "Already following this user");

        let response = make_request(app.clone(), Method::GET, &format!("{follow}/status"), Some(&credential("u1")), String::new()).await;
        assert_eq!(body(response).await, json!({ "isFollowing": true }));

        let response = make_request(app.clone(), Method::GET, &format!("/api/v1/user/{id2}/profile"), None, String::new()).await;
        assert_eq!(body(response).await["followersCount"], 1);

        let response = make_request(app.clone(), Method::GET, &format!("/api/v1/user/{id2}/followers?page=0&pageSize=1000"), None, String::new()).await;
        let list = body(response).await;
        assert_eq!(list["total"], 1);
        assert_eq!(list["totalPages"], 1);
        assert_eq!(list["pageSize"], 50);
        assert_eq!(list["users"][0]["id"], id1);
        assert!(list.get("skipped").is_none());

        let response = make_request(app.clone(), Method::POST, &format!("/api/v1/user/{id1}/follow"), Some(&credential("u1")), String::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body(response).await;
        assert_eq!(error["code"], "validation_error");
        assert_eq!(error["detail"], "cannot follow yourself");

        let response = make_request(app.clone(), Method::DELETE, &follow, Some(&credential("u1")), String::new()).await;
        assert_eq!(body(response).await["message"], "Successfully unfollowed user");

        let response = make_request(app.clone(), Method::GET, &format!("/api/v1/user/{id1}/following"), None, String::new()).await;
        assert_eq!(body(response).await["total"], 0);

        let response = make_request(app.clone(), Method::POST, "/api/v1/user/u2/follow", Some(&credential("u1")), String::new()).await;
        assert_eq!(body(response).await["detail"], "invalid target user ID");

        let response = make_request(app, Method::GET, "/api/v1/user/u2/profile", None, String::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_follow_requires_local_user() {
        let app = app(state());
        let target = register(&app, "target").await;
        let path = format!("/api/v1/user/{}/follow", target["id"].as_str().unwrap());

        let response = make_request(app, Method::POST, &path, Some(&credential("stranger")), String::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error = body(response).await;
        assert_eq!(error["code"], "not_found_error");
        assert_eq!(error["detail"], "current user not found");
    }

    #[tokio::test]
    async fn test_feedback_routes() {
        let app = app(state());

        let submission = json!({ "username": "ada", "comment": "love it", "categories": ["ui"] }).to_string();
        let response = make_request(app.clone(), Method::POST, "/api/v1/feedback", None, submission).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body(response).await;
        assert_eq!(created["resolved"], false);

        let response = make_request(app.clone(), Method::POST, "/api/v1/feedback", None, json!({ "username": "ada" }).to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = make_request(app.clone(), Method::GET, "/api/v1/feedback?categories=bug,ui&username=AD", None, String::new()).await;
        let list = body(response).await;
        assert_eq!(list["total"], 1);
        assert_eq!(list["feedbacks"][0]["comment"], "love it");

        let path = format!("/api/v1/feedback/{}/resolve", created["id"].as_str().unwrap());
        let response = make_request(app.clone(), Method::PATCH, &path, None, json!({ "resolved": true }).to_string()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["resolved"], true);

        let path = format!("/api/v1/feedback/{}/resolve", crate::id::ObjectId::new());
        let response = make_request(app, Method::PATCH, &path, None, json!({ "resolved": true }).to_string()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await["detail"], "feedback not found");
    }

    #[tokio::test]
    async fn test_media_routes() {
        let app = app(state());
        register(&app, "a").await;

        let request = json!({ "folder": "avatars", "userId": "abc" }).to_string();
        let response = make_request(app.clone(), Method::POST, "/api/v1/media/sign", None, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let signature = body(response).await;
        assert_eq!(signature["apiKey"], "key");
        assert_eq!(signature["cloudName"], "rally");
        assert_eq!(signature["publicId"], "abc");
        assert_eq!(signature["signature"].as_str().unwrap().len(), 40);

        let request = json!({ "publicId": "avatars/a", "avatarUrl": "https://res.cloudinary.com/rally/a.png" }).to_string();
        let response = make_request(app.clone(), Method::POST, "/api/v1/media/verify-avatar", Some(&credential("a")), request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await["message"], "Avatar updated successfully");

        let response = make_request(app, Method::GET, "/api/v1/users/me/profile", Some(&credential("a")), String::new()).await;
        assert_eq!(body(response).await["avatarUrl"], "https://res.cloudinary.com/rally/a.png");
    }

    #[tokio::test]
    async fn test_signed_id_token() {
        use std::sync::Arc;

        use crate::token::JwtVerifier;
        use crate::token::tests::{PUBLIC_KEY, claims, config, sign};

        let verifier = Arc::new(JwtVerifier::new(&config(PUBLIC_KEY)).unwrap());
        let app = app(crate::testing::state_with(verifier));

        let token = sign(&claims("firebase-uid"), Some("main"));
        let response = make_request(app.clone(), Method::POST, "/api/v1/auth/register", Some(&token), String::new()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body(response).await["email"], "firebase-uid@rally.test");

        let mut expired = claims("firebase-uid");
        expired.exp = 1;
        let response = make_request(app, Method::POST, "/api/v1/auth/login", Some(&sign(&expired, Some("main"))), String::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
