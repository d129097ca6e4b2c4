mod common;

use bili_info::BiliInfoError;
use common::{CID, VIDEO_URL, mount_view, setup};
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{method, path, query_param},
};

const DANMAKU_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<i>
  <chatserver>chat.bilibili.com</chatserver>
  <chatid>279786</chatid>
  <maxlimit>1000</maxlimit>
  <d p="12.5,1,25,16777215,1700000100,0,a1b2c3d4,1001,10">后面的</d>
  <d p="3.25,5,25,16711680,1700000000,0,e5f6a7b8,1002,10">前面 &amp; 顶部</d>
</i>"#;

#[tokio::test]
async fn danmaku_in_stream_order() {
    let (server, client) = setup().await;
    mount_view(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/v1/dm/list.so"))
        .and(query_param("oid", CID.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/xml")
                .set_body_string(DANMAKU_XML),
        )
        .mount(&server)
        .await;

    let entries = client.get_danmaku(VIDEO_URL).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "后面的");
    assert_eq!(entries[0].offset, 12.5);
    assert_eq!(entries[1].text, "前面 & 顶部");
    assert_eq!(entries[1].mode, 5);
    assert_eq!(entries[1].color, 16711680);
    assert_eq!(entries[1].sent_at.timestamp(), 1700000000);

    let again = client.get_danmaku(VIDEO_URL).await.unwrap();
    assert_eq!(entries, again);
}

#[tokio::test]
async fn empty_stream_is_not_an_error() {
    let (server, client) = setup().await;
    mount_view(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/v1/dm/list.so"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<?xml version="1.0" encoding="UTF-8"?><i><chatid>279786</chatid></i>"#),
        )
        .mount(&server)
        .await;

    assert!(client.get_danmaku(VIDEO_URL).await.unwrap().is_empty());
}

#[tokio::test]
async fn json_rejection_instead_of_xml_is_a_platform_error() {
    let (server, client) = setup().await;
    mount_view(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/v1/dm/list.so"))
        .respond_with(common::rejected(-404, "啥都木有"))
        .mount(&server)
        .await;

    match client.get_danmaku(VIDEO_URL).await {
        Err(BiliInfoError::Platform { code, .. }) => assert_eq!(code, -404),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn html_block_page_is_unexpected() {
    let (server, client) = setup().await;
    mount_view(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/v1/dm/list.so"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>request blocked</body></html>"),
        )
        .mount(&server)
        .await;

    assert!(matches!(
        client.get_danmaku(VIDEO_URL).await,
        Err(BiliInfoError::UnexpectedResponse(_))
    ));
}
