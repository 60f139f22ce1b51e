#![allow(dead_code)]

use forest_core::envelope::{MARKER, encode_base64};
use forest_core::patch::HP_VALUE_SIGNATURE;

pub const RESUME_PREFIX: &[u8] = b"__RESUME__\x00\x01";

pub fn string(s: &str) -> Vec<u8> {
    assert!(s.len() < 0x80, "test strings fit a one-byte varint");
    let mut out = vec![s.len() as u8];
    out.extend_from_slice(s.as_bytes());
    out
}

fn table(entries: &[&str]) -> Vec<u8> {
    let mut out = (entries.len() as u32).to_le_bytes().to_vec();
    for entry in entries {
        out.extend_from_slice(&string(entry));
    }
    out
}

pub fn header(types: &[&str], properties: &[&str]) -> Vec<u8> {
    let mut out = string("SerV10");
    out.push(0);
    out.extend_from_slice(&table(types));
    out.extend_from_slice(&table(properties));
    out
}

pub fn blob(types: &[&str], body: &[u8]) -> Vec<u8> {
    let mut out = string("SerV10");
    out.push(0);
    out.extend_from_slice(&table(types));
    out.extend_from_slice(body);
    out
}

pub fn building(hp: f32, guid: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(guid) = guid {
        body.extend_from_slice(&string(guid));
    }
    body.extend_from_slice(&string("_hp"));
    body.extend_from_slice(&HP_VALUE_SIGNATURE);
    body.extend_from_slice(&hp.to_le_bytes());
    body.extend_from_slice(b"\x00\x00");
    blob(&["TheForest.Buildings.World.BuildingHealth"], &body)
}

pub fn player(short_type: &str, body: &[u8]) -> Vec<u8> {
    blob(&[&format!("TheForest.Player.{short_type}")], body)
}

/// Header with a couple of registered names, then the given blobs.
pub fn payload(blobs: &[Vec<u8>]) -> Vec<u8> {
    let mut out = header(&["UnityEngine.Transform"], &["position", "_hp"]);
    for blob in blobs {
        out.extend_from_slice(blob);
    }
    out
}

pub fn resume_file(inner: &[u8], outer_base64: bool) -> Vec<u8> {
    let mut body = RESUME_PREFIX.to_vec();
    body.extend_from_slice(MARKER);
    body.extend_from_slice(encode_base64(inner).as_bytes());
    if outer_base64 {
        encode_base64(&body).into_bytes()
    } else {
        body
    }
}

/// A small world: two buildings, a fire, and three player blobs.
pub fn sample_payload() -> Vec<u8> {
    payload(&[
        building(150.0, Some("0f8fad5b-d9cb-469f-a165-70867728950e")),
        player("PlayerStats", b"stats-a"),
        blob(&["TheForest.World.Fire2"], b"fire"),
        building(40.0, None),
        player("PlayerClothing", b"shirt-a"),
        player("InventoryItemView", b"axe"),
    ])
}
