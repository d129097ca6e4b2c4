//! Danmaku (bullet comment) fetching and XML decoding

use std::str::FromStr;

use log::{debug, info};
use quick_xml::{events::Event, reader::Reader};

use crate::{
    api::{
        client::{ApiClient, parse_envelope},
        endpoints,
    },
    error::{BiliInfoError, Result},
    models::{DanmakuEntry, VideoView},
    utils,
};

/// 获取 1P 的全部弹幕，保持接口返回的顺序
pub async fn get(api: &ApiClient, view: &VideoView) -> Result<Vec<DanmakuEntry>> {
    let url = api.endpoint(endpoints::DANMAKU_LIST)?;
    let params = [("oid".to_string(), view.cid.to_string())];
    let xml = api.fetch_bytes(url, &params, true).await?;
    let entries = decode(&xml)?;
    info!("视频 {} 共 {} 条弹幕", view.bvid, entries.len());
    Ok(entries)
}

// 弹幕接口出错时返回的是 JSON 外层结构而不是 XML
fn rejected_as_json(body: &[u8]) -> BiliInfoError {
    match parse_envelope(body) {
        Ok(envelope) if envelope.code != 0 => BiliInfoError::Platform {
            code: envelope.code,
            message: envelope.message,
        },
        Ok(_) => BiliInfoError::UnexpectedResponse("弹幕接口返回了JSON而不是XML".to_string()),
        Err(e) => e,
    }
}

/// 解析 `<i><d p="...">text</d>...</i>` 格式的弹幕 XML，根元素必须是 `<i>`
pub fn decode(xml: &[u8]) -> Result<Vec<DanmakuEntry>> {
    if xml.trim_ascii_start().starts_with(b"{") {
        return Err(rejected_as_json(xml));
    }

    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut root_seen = false;
    // 当前所在 <d> 的 p 属性
    let mut current: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) if !root_seen => {
                if e.name().as_ref() != b"i" {
                    return Err(BiliInfoError::UnexpectedResponse(format!(
                        "弹幕XML的根元素不是 <i>: <{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    )));
                }
                root_seen = true;
            }
            Ok(Event::Start(e)) if e.name().as_ref() == b"d" => {
                current = Some(p_attribute(&e)?);
                text.clear();
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"d" => {
                entries.push(parse_entry(&p_attribute(&e)?, String::new())?);
            }
            Ok(Event::Text(t)) if current.is_some() => {
                text.push_str(&t.unescape().map_err(BiliInfoError::unexpected)?);
            }
            Ok(Event::CData(t)) if current.is_some() => {
                text.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"d" => {
                if let Some(p) = current.take() {
                    entries.push(parse_entry(&p, std::mem::take(&mut text))?);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(BiliInfoError::UnexpectedResponse(format!(
                    "弹幕XML解析失败(位置 {}): {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
        buf.clear();
    }

    if !root_seen {
        return Err(BiliInfoError::UnexpectedResponse(
            "弹幕内容为空或不是XML".to_string(),
        ));
    }
    debug!("解析出 {} 条弹幕", entries.len());
    Ok(entries)
}

fn p_attribute(e: &quick_xml::events::BytesStart<'_>) -> Result<String> {
    for attr in e.attributes() {
        let attr = attr.map_err(BiliInfoError::unexpected)?;
        if attr.key.as_ref() == b"p" {
            return Ok(attr
                .unescape_value()
                .map_err(BiliInfoError::unexpected)?
                .into_owned());
        }
    }
    Err(BiliInfoError::UnexpectedResponse(
        "弹幕缺少 p 属性".to_string(),
    ))
}

fn field<T: FromStr + Default>(parts: &[&str], idx: usize) -> T {
    parts
        .get(idx)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_default()
}

// p = "出现时间,模式,字号,颜色,发送时间戳,弹幕池,发送者hash,dmid,屏蔽等级"
fn parse_entry(p: &str, text: String) -> Result<DanmakuEntry> {
    let parts: Vec<&str> = p.split(',').collect();
    let offset = parts
        .first()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| BiliInfoError::UnexpectedResponse(format!("无效的弹幕属性: {}", p)))?;

    Ok(DanmakuEntry {
        offset,
        mode: field(&parts, 1),
        font_size: field(&parts, 2),
        color: field(&parts, 3),
        sent_at: utils::timestamp_to_utc(field(&parts, 4)),
        pool: field(&parts, 5),
        sender_hash: parts.get(6).map(|s| s.to_string()).unwrap_or_default(),
        id: parts.get(7).map(|s| s.to_string()).unwrap_or_default(),
        text,
    })
}
