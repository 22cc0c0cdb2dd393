//! Integration tests for the TMDB gateway against a mock HTTP server.

use std::sync::Arc;

use codex::config::MetadataConfig;
use codex::images::AssetCache;
use codex::library::ArtworkRef;
use codex::metadata::{ArtworkSource, MetadataGateway, TmdbGateway};
use codex::scheduler::{FetchJob, JobOutcome, JobRunner};
use codex_common::{ErrorKind, Generation, ItemKey};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> TmdbGateway {
    let config = MetadataConfig {
        api_key: Some("test-key".into()),
        api_base_url: server.uri(),
        image_base_url: format!("{}/t/p/w200", server.uri()),
        request_timeout_secs: 5,
        ..MetadataConfig::default()
    };
    TmdbGateway::new(&config).unwrap()
}

fn artwork(reference: &str) -> ArtworkRef {
    ArtworkRef::parse(reference).unwrap()
}

#[tokio::test]
async fn find_movie_uses_first_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("query", "Foo Bar"))
        .and(query_param("year", "2001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "results": [
                { "id": 11, "title": "Foo Bar", "poster_path": "/x.jpg", "release_date": "2001-05-01" },
                { "id": 12, "title": "Foo Bar II", "poster_path": "/y.jpg" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = gateway(&server)
        .find_movie("Foo Bar", Some(2001))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.id, 11);
    assert_eq!(record.title, "Foo Bar");
    assert_eq!(record.artwork, Some(artwork("/x.jpg")));
}

#[tokio::test]
async fn empty_results_and_missing_posters_are_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/tv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": 70523, "name": "Dark", "poster_path": null }]
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    assert!(gateway.find_movie("Nothing", None).await.unwrap().is_none());

    let show = gateway.find_show("Dark").await.unwrap().unwrap();
    assert_eq!(show.id, 70523);
    assert_eq!(show.artwork, None);
}

#[tokio::test]
async fn season_details_maps_episode_stills() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tv/70523/season/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "season_number": 1,
            "poster_path": "/s1.jpg",
            "episodes": [
                { "episode_number": 1, "name": "Secrets", "still_path": "/e1.jpg" },
                { "episode_number": 2, "name": "Lies", "still_path": "" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tv/70523/season/9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let season = gateway.season_details(70523, 1).await.unwrap().unwrap();
    assert_eq!(season.season_number, 1);
    assert_eq!(season.artwork, Some(artwork("/s1.jpg")));
    assert_eq!(season.episodes.len(), 2);
    assert_eq!(season.episodes[0].still, Some(artwork("/e1.jpg")));
    assert_eq!(season.episodes[1].name.as_deref(), Some("Lies"));
    assert_eq!(season.episodes[1].still, None);

    assert!(gateway.season_details(70523, 9).await.unwrap().is_none());
}

#[tokio::test]
async fn server_errors_and_bad_payloads_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/tv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    assert!(gateway.find_movie("Foo", None).await.is_err());
    assert!(gateway.find_show("Dark").await.is_err());
}

#[tokio::test]
async fn fetch_image_joins_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/t/p/w200/x.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xFF\xD8\xFF jpeg".to_vec()))
        .mount(&server)
        .await;

    let bytes = gateway(&server).fetch_image(&artwork("/x.jpg")).await.unwrap();
    assert!(bytes.starts_with(b"\xFF\xD8\xFF"));
}

#[tokio::test]
async fn runner_downloads_through_gateway_into_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/t/p/w200/x.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"poster".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(AssetCache::new(dir.path(), false));
    let gateway = Arc::new(gateway(&server));
    let runner = JobRunner::new(gateway.clone(), gateway, cache.clone());

    let job = FetchJob::ImageDownload {
        reference: artwork("/x.jpg"),
    };
    // Second run is served from disk; the mock expects exactly one hit.
    for _ in 0..2 {
        assert!(matches!(
            runner.run(Generation::initial(), job.clone()).await,
            JobOutcome::Image { result: Ok(_), .. }
        ));
    }
    assert_eq!(cache.read(&artwork("/x.jpg")).unwrap().as_ref(), b"poster");

    let outcome = runner
        .run(
            Generation::initial(),
            FetchJob::MovieLookup {
                key: ItemKey::new("movies/Foo (2001)"),
                title: "Foo".into(),
                year: Some(2001),
            },
        )
        .await;
    assert_eq!(
        outcome,
        JobOutcome::Movie {
            key: ItemKey::new("movies/Foo (2001)"),
            result: Err(ErrorKind::RemoteLookupFailed),
        }
    );
}
