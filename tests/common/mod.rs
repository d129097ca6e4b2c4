#![allow(dead_code)]

use std::time::Duration;

use bili_info::{BiliClient, ClientConfig};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

pub const SESSDATA: &str = "test-sessdata";
pub const BVID: &str = "BV1x341177NN";
pub const VIDEO_URL: &str = "https://www.bilibili.com/video/BV1x341177NN";
pub const AID: i64 = 170001;
pub const CID: i64 = 279786;

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(SESSDATA)
        .with_api_base(server.uri())
        .with_homepage(server.uri())
        .with_short_link_hosts(vec!["127.0.0.1".to_string()])
        .with_timeout(Duration::from_secs(5))
}

pub async fn setup() -> (MockServer, BiliClient) {
    let server = MockServer::start().await;
    let client = BiliClient::new(config_for(&server)).expect("client");
    (server, client)
}

pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 0,
        "message": "0",
        "ttl": 1,
        "data": data,
    }))
}

pub fn rejected(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": code,
        "message": message,
        "ttl": 1,
    }))
}

pub async fn mount_view(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("bvid", BVID))
        .respond_with(ok(json!({
            "bvid": BVID,
            "aid": AID,
            "cid": CID,
            "title": "测试视频",
            "pages": [{"cid": CID, "page": 1, "part": "P1", "duration": 200}],
        })))
        .mount(server)
        .await;
}

// 未登录时 nav 返回 -101，但 wbi_img 仍然有效
pub async fn mount_nav(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -101,
            "message": "账号未登录",
            "ttl": 1,
            "data": {
                "isLogin": false,
                "wbi_img": {
                    "img_url": "https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png",
                    "sub_url": "https://i0.hdslb.com/bfs/wbi/4932caff0ff746eab6f01bf08b70ac45.png"
                }
            }
        })))
        .mount(server)
        .await;
}
