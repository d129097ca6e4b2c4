mod common;

use common::{AID, VIDEO_URL, mount_view, ok, setup};
use serde_json::json;
use wiremock::{
    Mock,
    matchers::{method, path, query_param},
};

#[tokio::test]
async fn hot_comments_keep_platform_order() {
    let (server, client) = setup().await;
    mount_view(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .and(query_param("type", "1"))
        .and(query_param("oid", AID.to_string()))
        .and(query_param("sort", "2"))
        .respond_with(ok(json!({
            "page": {"num": 1, "size": 20, "count": 2},
            "replies": [
                {"mid": 7, "like": 50, "rcount": 3, "ctime": 1700000000,
                 "member": {"uname": "热评"}, "content": {"message": "第一"}},
                {"mid": 8, "like": 900, "rcount": 0, "ctime": 1700000500,
                 "member": {"uname": "路人"}, "content": {"message": "第二"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let comments = client.get_comments(VIDEO_URL).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].author, "热评");
    assert_eq!(comments[0].text, "第一");
    assert_eq!(comments[1].likes, 900);
}

#[tokio::test]
async fn closed_comment_section_is_empty() {
    let (server, client) = setup().await;
    mount_view(&server).await;
    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .respond_with(ok(json!({"replies": null})))
        .mount(&server)
        .await;

    assert!(client.get_comments(VIDEO_URL).await.unwrap().is_empty());
}
