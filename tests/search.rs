mod common;

use std::time::{Duration, Instant};

use bili_info::{BiliInfoError, SearchQuery, SearchResult, SearchType};
use common::{mount_nav, ok, rejected, setup};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header_regex, method, path, query_param},
};

async fn mount_homepage(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "buvid3=TEST-BUVID3infoc; path=/; domain=.bilibili.com")
                .append_header("set-cookie", "b_nut=1700000000; path=/; domain=.bilibili.com")
                .set_body_string("<html></html>"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn invalid_queries_never_reach_the_network() {
    let (server, client) = setup().await;
    let queries = [
        SearchQuery::new("   "),
        SearchQuery {
            search_type: Some("music".to_string()),
            ..SearchQuery::new("test")
        },
        SearchQuery {
            page: Some(0),
            ..SearchQuery::new("test")
        },
        SearchQuery {
            recent_days: Some(3),
            recent_weeks: Some(1),
            ..SearchQuery::new("test")
        },
        SearchQuery {
            search_type: Some("article".to_string()),
            order: Some("dm".to_string()),
            ..SearchQuery::new("test")
        },
    ];
    for query in &queries {
        assert!(matches!(
            client.search(query).await,
            Err(BiliInfoError::InvalidParameter(_))
        ));
    }
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn video_search_is_signed_and_typed() {
    let (server, client) = setup().await;
    mount_nav(&server).await;
    mount_homepage(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .and(query_param("keyword", "rust"))
        .and(query_param("search_type", "video"))
        .and(query_param("order", "pubdate"))
        .and(query_param("page", "2"))
        .and(header_regex("cookie", "SESSDATA=test-sessdata"))
        .and(header_regex("cookie", "buvid3=TEST-BUVID3infoc"))
        .and(header_regex("referer", "bilibili"))
        .respond_with(ok(json!({
            "page": 2,
            "pagesize": 20,
            "numResults": 1000,
            "numPages": 50,
            "result": [{
                "type": "video",
                "bvid": "BV1x341177NN",
                "aid": 170001,
                "title": "<em class=\"keyword\">Rust</em> 入门",
                "author": "up",
                "mid": 42,
                "play": 12345,
                "video_review": 67,
                "favorites": 8,
                "duration": "12:34",
                "pubdate": 1700000000,
                "description": "desc",
                "pic": "//i0.hdslb.com/bfs/archive/x.jpg",
                "tag": "编程"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = SearchQuery {
        order: Some("pubdate".to_string()),
        page: Some(2),
        ..SearchQuery::new("rust")
    };
    let page = client.search(&query).await.unwrap();
    assert_eq!(page.search_type, SearchType::Video);
    assert_eq!(page.page, 2);
    assert_eq!(page.num_pages, 50);
    assert_eq!(page.results.len(), 1);
    match &page.results[0] {
        SearchResult::Video(hit) => {
            assert_eq!(hit.title, "Rust 入门");
            assert_eq!(hit.link, "https://www.bilibili.com/video/BV1x341177NN");
            assert_eq!(hit.pic, "https://i0.hdslb.com/bfs/archive/x.jpg");
            assert_eq!(hit.play, 12345);
        }
        other => panic!("unexpected hit: {:?}", other),
    }

    let requests = server.received_requests().await.unwrap_or_default();
    let search = requests
        .iter()
        .find(|r| r.url.path() == "/x/web-interface/search/type")
        .expect("search request");
    let keys: Vec<String> = search.url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    assert!(keys.contains(&"wts".to_string()));
    assert!(keys.contains(&"w_rid".to_string()));
}

#[tokio::test]
async fn empty_result_is_an_empty_page() {
    let (server, client) = setup().await;
    mount_nav(&server).await;
    mount_homepage(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .and(query_param("search_type", "bili_user"))
        .respond_with(ok(json!({"page": 1, "numResults": 0, "numPages": 0})))
        .mount(&server)
        .await;

    let query = SearchQuery {
        search_type: Some("bili_user".to_string()),
        ..SearchQuery::new("nobody-at-all")
    };
    let page = client.search(&query).await.unwrap();
    assert!(page.results.is_empty());
    assert_eq!(page.num_results, 0);
}

#[tokio::test]
async fn risk_control_rejection_is_surfaced() {
    let (server, client) = setup().await;
    mount_nav(&server).await;
    mount_homepage(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .respond_with(rejected(-412, "请求被拦截"))
        .expect(1)
        .mount(&server)
        .await;

    match client.search(&SearchQuery::new("rust")).await {
        Err(BiliInfoError::Platform { code, message }) => {
            assert_eq!(code, -412);
            assert!(message.contains("请求被拦截"));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn search_without_homepage_cookies_still_runs() {
    let (server, client) = setup().await;
    mount_nav(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .respond_with(ok(json!({"page": 1, "numResults": 0, "numPages": 0, "result": []})))
        .mount(&server)
        .await;

    assert!(client.search(&SearchQuery::new("rust")).await.is_ok());
}

#[tokio::test]
async fn slow_key_endpoint_does_not_serialize_searches() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .respond_with(ok(json!({"page": 1, "numResults": 0, "numPages": 0, "result": []})))
        .mount(&server)
        .await;

    let query = SearchQuery::new("rust");
    let started = Instant::now();
    let (a, b, c, d) = tokio::join!(
        client.search(&query),
        client.search(&query),
        client.search(&query),
        client.search(&query),
    );
    let elapsed = started.elapsed();
    assert!(a.is_ok() && b.is_ok() && c.is_ok() && d.is_ok());
    assert!(elapsed < Duration::from_millis(2500), "took {:?}", elapsed);

    // 刚失败过，不会马上再请求 nav 或首页
    let before = server.received_requests().await.unwrap_or_default().len();
    let started = Instant::now();
    client.search(&query).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
    let after = server.received_requests().await.unwrap_or_default().len();
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn keyword_with_spaces_is_sent_as_signed() {
    let (server, client) = setup().await;
    mount_nav(&server).await;
    mount_homepage(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .and(query_param("keyword", "rust lang"))
        .respond_with(ok(json!({"page": 1, "numResults": 0, "numPages": 0, "result": []})))
        .expect(1)
        .mount(&server)
        .await;

    client.search(&SearchQuery::new("rust lang")).await.unwrap();

    let requests = server.received_requests().await.unwrap_or_default();
    let search = requests
        .iter()
        .find(|r| r.url.path() == "/x/web-interface/search/type")
        .expect("search request");
    let raw = search.url.query().unwrap_or_default();
    assert!(raw.contains("keyword=rust%20lang"), "query: {}", raw);
    assert!(!raw.contains('+'), "query: {}", raw);
}
