//! Binary codec: TrackerState <-> gzip-compressed tag tree.
//!
//! Root compound layout:
//!   ServerStarts:  Int
//!   DimLoadCounts: List<{Dim: Int, Count: Int}>
//!   PlayerData:    List<{UUIDM: Long, UUIDL: Long,
//!                        JoinCount, QuitCount, DeathCount, RespawnCount: Int,
//!                        DimEnter: List<{Dim, Count}>, DimLeave: List<{Dim, Count}>}>
//!
//! Decoding always builds a fresh state; the live store is only replaced
//! by the caller once decoding has fully succeeded.

use std::io::{Read, Write};

use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hashbrown::HashMap;
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};
use crate::format::{self, Compound, Tag};
use crate::store::{DimensionId, PlayerRecord, TrackerState, COUNTER_MAX};

pub const KEY_SERVER_STARTS: &str = "ServerStarts";
pub const KEY_DIM_LOAD_COUNTS: &str = "DimLoadCounts";
pub const KEY_PLAYER_DATA: &str = "PlayerData";
pub const KEY_UUID_MOST: &str = "UUIDM";
pub const KEY_UUID_LEAST: &str = "UUIDL";
pub const KEY_JOIN_COUNT: &str = "JoinCount";
pub const KEY_QUIT_COUNT: &str = "QuitCount";
pub const KEY_DEATH_COUNT: &str = "DeathCount";
pub const KEY_RESPAWN_COUNT: &str = "RespawnCount";
pub const KEY_DIM_ENTER: &str = "DimEnter";
pub const KEY_DIM_LEAVE: &str = "DimLeave";
pub const KEY_DIM: &str = "Dim";
pub const KEY_COUNT: &str = "Count";

/// Gzip member header magic
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Default gzip level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Upper bound on the inflated document size
pub const MAX_INFLATED_SIZE: u64 = 64 * 1024 * 1024;

// ---------------------------------------------------------------------------
// State <-> tag tree
// ---------------------------------------------------------------------------

/// Build the root compound for `state`.
///
/// Map entries are emitted in ascending key order so identical states
/// always produce identical bytes.
pub fn encode_state(state: &TrackerState) -> Compound {
    let mut root = Compound::new();
    root.insert(KEY_DIM_LOAD_COUNTS, encode_dim_counts(&state.dimension_load_counts));

    let mut players: Vec<(&Uuid, &PlayerRecord)> = state.player_records.iter().collect();
    players.sort_by_key(|(id, _)| **id);

    let player_tags = players
        .into_iter()
        .map(|(id, record)| {
            let (most, least) = id.as_u64_pair();
            let mut tag = Compound::new();
            tag.insert(KEY_UUID_MOST, Tag::Long(most as i64));
            tag.insert(KEY_UUID_LEAST, Tag::Long(least as i64));
            tag.insert(KEY_JOIN_COUNT, encode_count(record.join));
            tag.insert(KEY_QUIT_COUNT, encode_count(record.quit));
            tag.insert(KEY_DEATH_COUNT, encode_count(record.death));
            tag.insert(KEY_RESPAWN_COUNT, encode_count(record.respawn));
            tag.insert(KEY_DIM_ENTER, encode_dim_counts(&record.dimension_enter_counts));
            tag.insert(KEY_DIM_LEAVE, encode_dim_counts(&record.dimension_leave_counts));
            Tag::Compound(tag)
        })
        .collect();
    root.insert(KEY_PLAYER_DATA, Tag::List(player_tags));

    root.insert(KEY_SERVER_STARTS, encode_count(state.server_start_count));
    root
}

fn encode_dim_counts(counts: &HashMap<DimensionId, u32>) -> Tag {
    let mut entries: Vec<(DimensionId, u32)> = counts.iter().map(|(d, c)| (*d, *c)).collect();
    entries.sort_unstable_by_key(|(dim, _)| *dim);

    Tag::List(
        entries
            .into_iter()
            .map(|(dim, count)| {
                let mut tag = Compound::new();
                tag.insert(KEY_DIM, Tag::Int(dim));
                tag.insert(KEY_COUNT, encode_count(count));
                Tag::Compound(tag)
            })
            .collect(),
    )
}

/// Rebuild a state from a root compound.
///
/// A root without a `DimLoadCounts` list carries no prior state and
/// decodes to an empty state. Missing integer fields read as 0 and list
/// elements that are not compounds are skipped.
pub fn decode_state(root: &Compound) -> TrackerState {
    let mut state = TrackerState::default();

    let Some(dim_loads) = root.get_list(KEY_DIM_LOAD_COUNTS) else {
        return state;
    };
    state.dimension_load_counts = decode_dim_counts(dim_loads);

    for tag in root.get_list(KEY_PLAYER_DATA).unwrap_or(&[]) {
        let Some(tag) = tag.as_compound() else { continue };
        let most = tag.get_long(KEY_UUID_MOST).unwrap_or(0) as u64;
        let least = tag.get_long(KEY_UUID_LEAST).unwrap_or(0) as u64;

        let record = PlayerRecord {
            join: read_count(tag, KEY_JOIN_COUNT),
            quit: read_count(tag, KEY_QUIT_COUNT),
            death: read_count(tag, KEY_DEATH_COUNT),
            respawn: read_count(tag, KEY_RESPAWN_COUNT),
            dimension_enter_counts: decode_dim_counts(tag.get_list(KEY_DIM_ENTER).unwrap_or(&[])),
            dimension_leave_counts: decode_dim_counts(tag.get_list(KEY_DIM_LEAVE).unwrap_or(&[])),
        };
        state.player_records.insert(Uuid::from_u64_pair(most, least), record);
    }

    state.server_start_count = read_count(root, KEY_SERVER_STARTS);
    state
}

fn encode_count(count: u32) -> Tag {
    Tag::Int(count.min(COUNTER_MAX) as i32)
}

/// Missing or negative counts read as 0.
fn read_count(tag: &Compound, key: &str) -> u32 {
    tag.get_int(key).map_or(0, |v| v.max(0) as u32)
}

fn decode_dim_counts(items: &[Tag]) -> HashMap<DimensionId, u32> {
    items
        .iter()
        .filter_map(Tag::as_compound)
        .map(|c| (c.get_int(KEY_DIM).unwrap_or(0), read_count(c, KEY_COUNT)))
        .collect()
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

/// Serialize and gzip `state` at the default level.
pub fn to_bytes(state: &TrackerState) -> TrackerResult<Vec<u8>> {
    to_bytes_with_level(state, DEFAULT_COMPRESSION_LEVEL)
}

/// Serialize and gzip `state` at `level` (0..=9).
pub fn to_bytes_with_level(state: &TrackerState, level: u32) -> TrackerResult<Vec<u8>> {
    let raw = format::to_bytes(&encode_state(state))?;
    compress(&raw, level)
}

/// Gunzip, parse and decode a tracker file.
pub fn from_bytes(data: &[u8]) -> TrackerResult<TrackerState> {
    let raw = decompress(data)?;
    let root = format::read_root(&raw)?;
    Ok(decode_state(&root))
}

fn compress(raw: &[u8], level: u32) -> TrackerResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2 + 32), Compression::new(level));
    encoder.write_all(raw).map_err(|e| TrackerError::Compression {
        path: None,
        message: format!("gzip encode failed: {}", e),
    })?;
    encoder.finish().map_err(|e| TrackerError::Compression {
        path: None,
        message: format!("gzip finish failed: {}", e),
    })
}

fn decompress(data: &[u8]) -> TrackerResult<Vec<u8>> {
    decompress_limited(data, MAX_INFLATED_SIZE)
}

/// Inflate exactly one gzip member holding at most `limit` bytes.
fn decompress_limited(data: &[u8], limit: u64) -> TrackerResult<Vec<u8>> {
    if !data.starts_with(&GZIP_MAGIC) {
        return Err(TrackerError::Compression {
            path: None,
            message: "missing gzip header".to_string(),
        });
    }

    let mut decoder = GzDecoder::new(data);
    let mut raw = Vec::new();
    (&mut decoder)
        .take(limit + 1)
        .read_to_end(&mut raw)
        .map_err(|e| TrackerError::Compression {
            path: None,
            message: format!("gzip decode failed: {}", e),
        })?;
    if raw.len() as u64 > limit {
        return Err(TrackerError::Compression {
            path: None,
            message: format!("inflated data exceeds {} bytes", limit),
        });
    }

    // The bufread decoder stops right after the member trailer
    let rest = decoder.into_inner();
    if !rest.is_empty() {
        return Err(TrackerError::TrailingBytes { count: rest.len() });
    }
    Ok(raw)
}
