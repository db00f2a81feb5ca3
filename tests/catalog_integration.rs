use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reelfront::paginator::{CatalogFeed, Paginator};
use reelfront::{Catalog, CatalogError, Config, ContentId, Provider, SourceKind};

fn config(upstream: &MockServer, relay: Option<&MockServer>) -> Config {
    Config {
        relays: relay
            .map(|r| vec![format!("{}/relay?target={{url}}", r.uri())])
            .unwrap_or_default(),
        request_timeout: Duration::from_secs(2),
        shortdrama_base: upstream.uri(),
        dramabos_base: upstream.uri(),
        ..Config::default()
    }
}

#[tokio::test]
async fn browse_detail_and_play_a_dramabox_title() {
    let upstream = MockServer::start().await;
    Mock::given(path("/dramabox/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "bookId": "41000102", "bookName": "The CEO's Secret", "tagNames": ["Romance"] }
        ])))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(path("/dramabox/foryou"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "list": [] } })))
        .mount(&upstream)
        .await;
    Mock::given(path("/dramabox/detail"))
        .and(query_param("bookId", "41000102"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bookId": "41000102", "bookName": "The CEO's Secret", "introduction": "..."
        })))
        .mount(&upstream)
        .await;
    Mock::given(path("/dramabox/allepisode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "chapterId": "c1", "chapterIndex": 0, "cdnList": [{ "isDefault": 1, "videoPathList": [
                { "quality": 720, "isDefault": 1, "videoPath": "https://cdn.example/c1/720.mp4" }
            ]}]},
            { "chapterId": "c2", "chapterIndex": 1, "videoUrl": "https://cdn.example/player.php?id=c2" }
        ])))
        .mount(&upstream)
        .await;

    let catalog = Catalog::from_config(&config(&upstream, None)).unwrap();

    let first = catalog.listing(Provider::DramaBox, 1).await.unwrap();
    let again = catalog.listing(Provider::DramaBox, 1).await.unwrap();
    assert_eq!(first.items, again.items);
    assert_eq!(first.items[0].genre, "Romance");

    let id: ContentId = first.items[0].id.parse().unwrap();
    let detail = catalog.detail(&id).await.unwrap();
    assert_eq!(detail.episodes.len(), 2);

    let direct = catalog.resolve_episode(&id, 1).await.unwrap();
    assert_eq!(direct.kind, SourceKind::DirectMedia);
    let page = catalog.resolve_episode(&id, 2).await.unwrap();
    assert_eq!(page.kind, SourceKind::EmbeddableDocument);
}

#[tokio::test]
async fn blocked_upstream_is_reached_through_a_relay() {
    let upstream = MockServer::start().await;
    let relay = MockServer::start().await;
    Mock::given(path("/netshort/foryou"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "contentInfos": [
            { "shortPlayId": "n7", "shortPlayName": "Relayed" }
        ]})))
        .expect(1)
        .mount(&relay)
        .await;

    let catalog = Catalog::from_config(&config(&upstream, Some(&relay))).unwrap();
    let page = catalog.listing(Provider::NetShort, 1).await.unwrap();
    assert_eq!(page.items[0].title, "Relayed");

    let log = catalog.transport().debug_log().entries();
    assert_eq!(log.len(), 2);
    assert!(log[1].message.contains("relay 1"));
}

#[tokio::test]
async fn feed_over_all_providers_survives_failures() {
    let upstream = MockServer::start().await;
    Mock::given(path("/tensei/anime"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [
            { "slug": "a", "title": "A" }, { "slug": "b", "title": "B" }
        ]})))
        .mount(&upstream)
        .await;
    Mock::given(path("/tensei/anime"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [
            { "slug": "b", "title": "B" }, { "slug": "c", "title": "C" }
        ]})))
        .mount(&upstream)
        .await;

    let catalog = Catalog::from_config(&config(&upstream, None)).unwrap();
    let feed = Paginator::new(CatalogFeed::new(catalog, None), 600.0);

    assert_eq!(feed.load_initial().await.unwrap(), Some(2));
    assert_eq!(feed.on_scroll(100.0).await.unwrap(), Some(1));

    let ids: Vec<String> = feed.items().await.into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["tensei:a", "tensei:b", "tensei:c"]);
}

#[tokio::test]
async fn unsupported_search_providers_are_skipped_not_fatal() {
    let upstream = MockServer::start().await;
    Mock::given(path("/dramabox/search"))
        .and(query_param("query", "ceo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "bookId": "1" }])))
        .mount(&upstream)
        .await;

    let catalog = Catalog::from_config(&config(&upstream, None)).unwrap();
    let results = catalog.search("ceo").await.unwrap();
    assert_eq!(results.len(), 1);

    let err = catalog
        .detail(&"flickreels:9".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Unsupported { .. }));
}
