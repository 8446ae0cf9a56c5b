//! The axum application: HTML views, the REST API and their middleware.

use crate::{
    feature::{item::item_view, member::member_api},
    infra::{
        error::{InternalError, PanicHandler},
        middleware::{log_request_response, MakeRequestIdSpan},
        openapi::ApiDoc,
        shutdown::shutdown_signal,
        state::AppState,
    },
};
use axum::{
    error_handling::HandleErrorLayer,
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use http::header::AUTHORIZATION;
use std::iter;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_redoc::{Redoc, Servable};

/// The REST API, to be nested under `/api`.
pub fn api() -> Router<AppState> {
    Router::new().merge(member_api::routes())
}

/// Constructs the full axum application.
pub fn app(state: AppState) -> Router {
    let server = state.config().server.clone();

    // Fallible middleware from tower, mapped to infallible response with [`HandleErrorLayer`].
    let tower_middleware = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e| async move {
            InternalError::Other(format!("Tower middleware failed: {e}")).into_response()
        }))
        .concurrency_limit(server.concurrency_limit);

    Router::new()
        .route("/", get(|| async { Redirect::permanent("/items") }))
        .merge(item_view::routes())
        .nest("/api", api())
        .merge(Redoc::with_url("/api/redoc", ApiDoc::openapi()))
        .merge(RapiDoc::with_openapi("/api/openapi.json", ApiDoc::openapi()).path("/api/rapidoc"))
        .with_state(state)
        // Layers
        .layer(TimeoutLayer::new(server.request_timeout))
        .layer(axum::middleware::from_fn(log_request_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MakeRequestIdSpan)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(()),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new(iter::once(
            AUTHORIZATION,
        )))
        .layer(tower_middleware)
        .layer(CatchPanicLayer::custom(PanicHandler))
}

/// Serves the application until ctrl-c is pressed.
pub async fn run_app(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let app = app(state);

    tracing::info!("Starting axum on {:?}", listener.local_addr());
    let exit_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    match &exit_result {
        Ok(_) => tracing::info!("Successfully shut down"),
        Err(e) => tracing::error!("Shutdown failed: {}", e),
    }

    exit_result
}

/// Spawn a server on a random port and return its base url.
pub async fn spawn_app(state: AppState) -> std::io::Result<String> {
    let address = "127.0.0.1";
    let listener = TcpListener::bind(format!("{address}:0")).await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(run_app(listener, state));
    Ok(format!("http://{address}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feature::member::{member_api::MemberId, member_repository::Member},
        infra::{config::load_config, error::ErrorBody},
    };
    use axum::body::Body;
    use http::{header::CONTENT_TYPE, Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = load_config().unwrap();
        app(AppState::in_memory(config))
    }

    async fn body_text(res: Response<Body>) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_form(uri: &str, body: &'static str) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn send_json(method: &str, uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn root_redirects_to_items() {
        let res = test_app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(StatusCode::PERMANENT_REDIRECT, res.status());
        assert_eq!("/items", res.headers()["location"]);
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let res = test_app()
            .oneshot(Request::get("/items").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, res.status());
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn add_form_is_empty() {
        let res = test_app()
            .oneshot(Request::get("/items/add").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, res.status());
        let html = body_text(res).await;
        assert!(html.contains(r#"name="item_name" value="""#));
    }

    #[tokio::test]
    async fn low_total_redisplays_the_form() {
        let app = test_app();
        let res = app
            .clone()
            .oneshot(post_form(
                "/items/add",
                "item_name=itemA&price=1000&quantity=1",
            ))
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, res.status());
        let html = body_text(res).await;
        assert!(html.contains("must be at least 10000. Current value = 1000"));

        let res = app
            .oneshot(Request::get("/items").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(!body_text(res).await.contains("itemA"));
    }

    #[tokio::test]
    async fn add_then_view_then_edit() {
        let app = test_app();

        let res = app
            .clone()
            .oneshot(post_form(
                "/items/add",
                "item_name=itemA&price=10000&quantity=1",
            ))
            .await
            .unwrap();
        assert_eq!(StatusCode::SEE_OTHER, res.status());
        assert_eq!("/items/1?status=true", res.headers()["location"]);

        let res = app
            .clone()
            .oneshot(
                Request::get("/items/1?status=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, res.status());
        let html = body_text(res).await;
        assert!(html.contains("Saved"));
        assert!(html.contains("itemA"));

        let res = app
            .clone()
            .oneshot(Request::get("/items/1/edit").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, res.status());
        assert!(body_text(res).await.contains(r#"value="10000""#));

        let res = app
            .clone()
            .oneshot(post_form(
                "/items/1/edit",
                "item_name=itemB&price=20000&quantity=30",
            ))
            .await
            .unwrap();
        assert_eq!(StatusCode::SEE_OTHER, res.status());
        assert_eq!("/items/1", res.headers()["location"]);

        let res = app
            .oneshot(Request::get("/items").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let html = body_text(res).await;
        assert!(html.contains("itemB"));
        assert!(!html.contains("itemA"));
    }

    #[tokio::test]
    async fn any_status_value_shows_the_item() {
        let app = test_app();
        let res = app
            .clone()
            .oneshot(post_form(
                "/items/add",
                "item_name=itemA&price=10000&quantity=1",
            ))
            .await
            .unwrap();
        assert_eq!(StatusCode::SEE_OTHER, res.status());

        for uri in ["/items/1?status=", "/items/1?status=maybe"] {
            let res = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(StatusCode::OK, res.status(), "{uri}");
            let html = body_text(res).await;
            assert!(html.contains("itemA"));
            assert!(!html.contains("Saved"), "{uri}");
        }
    }

    #[tokio::test]
    async fn missing_item_is_404() {
        let app = test_app();
        let res = app
            .clone()
            .oneshot(Request::get("/items/99").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(StatusCode::NOT_FOUND, res.status());

        let res = app
            .oneshot(post_form(
                "/items/99/edit",
                "item_name=itemA&price=10000&quantity=1",
            ))
            .await
            .unwrap();
        assert_eq!(StatusCode::NOT_FOUND, res.status());
    }

    #[tokio::test]
    async fn duplicate_member_is_a_conflict() {
        let app = test_app();
        let res = app
            .clone()
            .oneshot(send_json("POST", "/api/members", r#"{"name": "spring"}"#))
            .await
            .unwrap();
        assert_eq!(StatusCode::CREATED, res.status());
        let id: MemberId = serde_json::from_str(&body_text(res).await).unwrap();
        assert_eq!(1, id.id);

        let res = app
            .oneshot(send_json("POST", "/api/members", r#"{"name": "spring"}"#))
            .await
            .unwrap();
        assert_eq!(StatusCode::CONFLICT, res.status());
        let error: ErrorBody = serde_json::from_str(&body_text(res).await).unwrap();
        assert_eq!("member already exists", error.message());
    }

    #[tokio::test]
    async fn empty_member_name_is_unprocessable() {
        let res = test_app()
            .oneshot(send_json("POST", "/api/members", r#"{"name": ""}"#))
            .await
            .unwrap();
        assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, res.status());
    }

    #[tokio::test]
    async fn rename_member() {
        let app = test_app();
        for body in [r#"{"name": "kim"}"#, r#"{"name": "lee"}"#] {
            let res = app
                .clone()
                .oneshot(send_json("POST", "/api/members", body))
                .await
                .unwrap();
            assert_eq!(StatusCode::CREATED, res.status());
        }

        let res = app
            .clone()
            .oneshot(send_json("PUT", "/api/members/1", r#"{"name": "lee"}"#))
            .await
            .unwrap();
        assert_eq!(StatusCode::CONFLICT, res.status());

        let res = app
            .clone()
            .oneshot(send_json("PUT", "/api/members/1", r#"{"name": "kim"}"#))
            .await
            .unwrap();
        assert_eq!(StatusCode::CONFLICT, res.status());

        let res = app
            .clone()
            .oneshot(send_json("PUT", "/api/members/1", r#"{"name": "park"}"#))
            .await
            .unwrap();
        assert_eq!(StatusCode::NO_CONTENT, res.status());

        let res = app
            .clone()
            .oneshot(send_json("PUT", "/api/members/9", r#"{"name": "choi"}"#))
            .await
            .unwrap();
        assert_eq!(StatusCode::NOT_FOUND, res.status());

        let res = app
            .clone()
            .oneshot(Request::get("/api/members/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let member: Member = serde_json::from_str(&body_text(res).await).unwrap();
        assert_eq!("park", member.name);

        let res = app
            .oneshot(
                Request::get("/api/members?name=lee")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let members: Vec<Member> = serde_json::from_str(&body_text(res).await).unwrap();
        assert_eq!(vec![Member { id: 2, name: "lee".to_string() }], members);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = test_app();
        for uri in ["/api/openapi.json", "/api/redoc", "/api/rapidoc"] {
            let res = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(StatusCode::OK, res.status(), "{uri}");
        }
    }
}
