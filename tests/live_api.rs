//! End-to-end scenarios against a real PostgreSQL database.
//!
//! Run with a dedicated scratch database (tables named Artist/Track are
//! dropped and recreated in its public schema). The tests share that
//! schema, so they must run single-threaded:
//!
//!     RESTABLE_TEST_DATABASE_URL=postgres://localhost/restable_test \
//!         cargo test --test live_api -- --ignored --test-threads=1

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use restable::{bootstrap, ApiConfig};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use tower::ServiceExt; // for oneshot

async fn connect() -> PgPool {
    let url = std::env::var("RESTABLE_TEST_DATABASE_URL")
        .expect("RESTABLE_TEST_DATABASE_URL must point at a scratch database");
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database")
}

async fn setup_schema(pool: &PgPool) {
    for ddl in [
        r#"DROP TABLE IF EXISTS "Track""#,
        r#"DROP TABLE IF EXISTS "Artist""#,
        r#"CREATE TABLE "Artist" (
            "ArtistId" SERIAL PRIMARY KEY,
            "Name" VARCHAR(120)
        )"#,
        r#"CREATE TABLE "Track" (
            "TrackId" SERIAL PRIMARY KEY,
            "Name" VARCHAR(200) NOT NULL,
            "ArtistId" INTEGER REFERENCES "Artist" ("ArtistId"),
            "UnitPrice" NUMERIC(10,2)
        )"#,
        r#"INSERT INTO "Artist" ("Name") VALUES ('AC/DC'), ('Accept'), ('Aerosmith')"#,
        r#"INSERT INTO "Track" ("Name", "ArtistId", "UnitPrice")
            VALUES ('For Those About To Rock', 1, 0.99)"#,
    ] {
        sqlx::query(ddl).execute(pool).await.expect("setup ddl");
    }
}

async fn app(pool: PgPool) -> Router {
    let state = bootstrap(pool, ApiConfig::default(), &HashMap::new())
        .await
        .expect("bootstrap");
    restable::api_router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
#[ignore = "needs RESTABLE_TEST_DATABASE_URL"]
async fn post_creates_with_location_and_self_link() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let app = app(pool).await;

    let (status, headers, body) =
        send(&app, json_request("POST", "/artists", r#"{"Name":"Jeff Knupp"}"#)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["Name"], "Jeff Knupp");
    let id = body["ArtistId"].as_i64().expect("generated key");
    assert_eq!(body["self"], format!("/artists/{}", id));
    let location = headers
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header");
    assert!(location.ends_with(&format!("/artists/{}", id)));
}

#[tokio::test]
#[ignore = "needs RESTABLE_TEST_DATABASE_URL"]
async fn patch_upserts_and_is_idempotent() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let app = app(pool).await;

    // No row at 276: created with the path key as primary key.
    let (status, _, body) =
        send(&app, json_request("PATCH", "/artists/276", r#"{"Name":"Jeff Knupp"}"#)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ArtistId"], 276);
    assert_eq!(body["Name"], "Jeff Knupp");
    assert_eq!(body["self"], "/artists/276");

    // Same call again: row exists now, merged, no content.
    let (status, _, _) =
        send(&app, json_request("PATCH", "/artists/276", r#"{"Name":"Jeff Knupp"}"#)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Merge an existing row and confirm other fields are untouched.
    let (status, _, _) =
        send(&app, json_request("PATCH", "/artists/1", r#"{"Name":"AC/DC (remastered)"}"#)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, body) = send(&app, get("/artists/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Name"], "AC/DC (remastered)");
    assert_eq!(body["ArtistId"], 1);
}

#[tokio::test]
#[ignore = "needs RESTABLE_TEST_DATABASE_URL"]
async fn put_replaces_fully_and_requires_existence() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let app = app(pool).await;

    // PUT never creates.
    let (status, _, _) =
        send(&app, json_request("PUT", "/artists/424242", r#"{"Name":"Ghost"}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Track 1 has Name, ArtistId, UnitPrice set; a PUT omitting UnitPrice
    // and ArtistId resets them to NULL (unlike PATCH).
    let (status, _, _) =
        send(&app, json_request("PUT", "/tracks/1", r#"{"Name":"Renamed"}"#)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, _, body) = send(&app, get("/tracks/1")).await;
    assert_eq!(body["Name"], "Renamed");
    assert_eq!(body["ArtistId"], Value::Null);
    assert_eq!(body["UnitPrice"], Value::Null);

    // Constraint violations on commit surface as 422.
    let (status, _, body) = send(
        &app,
        json_request(
            "PUT",
            "/tracks/1",
            r#"{"Name":"Renamed","ArtistId":999999,"UnitPrice":"0.99"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("foreign key"));
}

#[tokio::test]
#[ignore = "needs RESTABLE_TEST_DATABASE_URL"]
async fn filters_match_exactly_and_by_wildcard() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let app = app(pool).await;

    let (status, _, body) = send(&app, get("/artists?Name=AC%2FDC")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"].as_array().unwrap().len(), 1);
    assert_eq!(body["resources"][0]["Name"], "AC/DC");
    assert_eq!(body["pagination"]["count"], 1);

    let (status, _, body) = send(&app, get("/artists?Name=%25AC%25DC%25")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"].as_array().unwrap().len(), 1);
    assert_eq!(body["resources"][0]["Name"], "AC/DC");

    // Empty result is still 200.
    let (status, _, body) = send(&app, get("/artists?Name=Nobody")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"].as_array().unwrap().len(), 0);

    // Sorting and pagination. 'Aerosmith' sorts after both other names
    // regardless of collation, so it falls off the first page of two.
    let (status, _, body) = send(&app, get("/artists?sort=Name&per_page=2&page=1")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["Name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(!names.contains(&"Aerosmith"));
    assert_eq!(body["pagination"]["per_page"], 2);
    assert_eq!(body["pagination"]["count"], 3);
}

#[tokio::test]
#[ignore = "needs RESTABLE_TEST_DATABASE_URL"]
async fn delete_honors_referential_integrity() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let app = app(pool).await;

    // Artist 1 is referenced by a track: 422, and the row survives.
    let (status, _, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/artists/1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("foreign key"));
    let (status, _, _) = send(&app, get("/artists/1")).await;
    assert_eq!(status, StatusCode::OK);

    // Artist 3 is unreferenced: gone after 204.
    let (status, _, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/artists/3")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = send(&app, get("/artists/3")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "needs RESTABLE_TEST_DATABASE_URL"]
async fn attributes_and_links_traverse_foreign_keys() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let app = app(pool).await;

    // Decimal columns come back as exact strings.
    let (status, headers, body) = send(&app, get("/tracks/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["UnitPrice"], "0.99");
    assert_eq!(body["artist_url"], "/artists/1");
    assert_eq!(body["self"], "/tracks/1");
    let link = headers
        .get("link")
        .and_then(|v| v.to_str().ok())
        .expect("link header");
    assert!(link.contains("rel=\"self\""));
    assert!(link.contains("related(Artist)"));

    // Scalar attribute payload.
    let (status, _, body) = send(&app, get("/tracks/1/Name")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Name"], "For Those About To Rock");

    // Attribute naming a related resource returns its representation.
    let (status, _, body) = send(&app, get("/tracks/1/artists")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ArtistId"], 1);
    assert_eq!(body["self"], "/artists/1");

    // Unknown attribute is 404.
    let (status, _, _) = send(&app, get("/tracks/1/Composer")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Expanded representation nests the related object one level deep.
    let (status, _, body) = send(&app, get("/tracks/1?expand")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["artist"]["Name"], "AC/DC");
}
