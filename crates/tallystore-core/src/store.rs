//! Counter store: the in-memory tracker state and its dirty flag.
//!
//! No I/O happens here. Every operation is total: reads of unseen keys
//! return 0 and never create entries, writes create entries lazily.

use std::fmt;
use std::str::FromStr;

use hashbrown::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Integer identifier of a dimension (world) instance.
pub type DimensionId = i32;

/// 128-bit player identity, stable across sessions.
pub type PlayerId = Uuid;

/// Largest value a counter reaches. Counters are stored as int32 on disk,
/// so increments stop here and every in-memory value persists exactly.
pub const COUNTER_MAX: u32 = i32::MAX as u32;

/// Per-player scalar event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEvent {
    Join,
    Quit,
    Death,
    Respawn,
}

impl PlayerEvent {
    pub const ALL: [PlayerEvent; 4] = [
        PlayerEvent::Join,
        PlayerEvent::Quit,
        PlayerEvent::Death,
        PlayerEvent::Respawn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PlayerEvent::Join => "join",
            PlayerEvent::Quit => "quit",
            PlayerEvent::Death => "death",
            PlayerEvent::Respawn => "respawn",
        }
    }
}

/// Per-player, per-dimension event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionEvent {
    Enter,
    Leave,
}

impl DimensionEvent {
    pub const ALL: [DimensionEvent; 2] = [DimensionEvent::Enter, DimensionEvent::Leave];

    pub fn name(self) -> &'static str {
        match self {
            DimensionEvent::Enter => "enter",
            DimensionEvent::Leave => "leave",
        }
    }
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for DimensionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for event names that match no known kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for PlayerEvent {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlayerEvent::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

impl FromStr for DimensionEvent {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DimensionEvent::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Counters for one player identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerRecord {
    pub join: u32,
    pub quit: u32,
    pub death: u32,
    pub respawn: u32,
    pub dimension_enter_counts: HashMap<DimensionId, u32>,
    pub dimension_leave_counts: HashMap<DimensionId, u32>,
}

impl PlayerRecord {
    pub fn count(&self, kind: PlayerEvent) -> u32 {
        match kind {
            PlayerEvent::Join => self.join,
            PlayerEvent::Quit => self.quit,
            PlayerEvent::Death => self.death,
            PlayerEvent::Respawn => self.respawn,
        }
    }

    pub fn increment(&mut self, kind: PlayerEvent) {
        let slot = match kind {
            PlayerEvent::Join => &mut self.join,
            PlayerEvent::Quit => &mut self.quit,
            PlayerEvent::Death => &mut self.death,
            PlayerEvent::Respawn => &mut self.respawn,
        };
        bump(slot);
    }

    pub fn dimension_counts(&self, kind: DimensionEvent) -> &HashMap<DimensionId, u32> {
        match kind {
            DimensionEvent::Enter => &self.dimension_enter_counts,
            DimensionEvent::Leave => &self.dimension_leave_counts,
        }
    }

    pub fn dimension_count(&self, dim: DimensionId, kind: DimensionEvent) -> u32 {
        self.dimension_counts(kind).get(&dim).copied().unwrap_or(0)
    }

    pub fn increment_dimension(&mut self, dim: DimensionId, kind: DimensionEvent) {
        let map = match kind {
            DimensionEvent::Enter => &mut self.dimension_enter_counts,
            DimensionEvent::Leave => &mut self.dimension_leave_counts,
        };
        bump(map.entry(dim).or_insert(0));
    }
}

/// Everything that is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub server_start_count: u32,
    pub dimension_load_counts: HashMap<DimensionId, u32>,
    pub player_records: HashMap<PlayerId, PlayerRecord>,
}

impl TrackerState {
    pub fn is_empty(&self) -> bool {
        self.server_start_count == 0
            && self.dimension_load_counts.is_empty()
            && self.player_records.is_empty()
    }
}

fn bump(count: &mut u32) {
    if *count < COUNTER_MAX {
        *count += 1;
    }
}

/// Tracker state plus the dirty flag.
///
/// `dirty` is true iff the state has diverged from the last confirmed
/// write. Only the persistence path clears it.
#[derive(Debug, Clone, Default)]
pub struct CounterStore {
    state: TrackerState,
    dirty: bool,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a freshly decoded state. The result is clean.
    pub fn from_state(state: TrackerState) -> Self {
        Self { state, dirty: false }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Swap in a hydrated state; the store is clean afterwards.
    pub fn replace_state(&mut self, state: TrackerState) {
        self.state = state;
        self.dirty = false;
    }

    /// Drop all counters and the dirty flag.
    pub fn clear(&mut self) {
        self.replace_state(TrackerState::default());
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // -- server / dimension --------------------------------------------------

    pub fn record_server_start(&mut self) {
        bump(&mut self.state.server_start_count);
        self.dirty = true;
    }

    pub fn server_start_count(&self) -> u32 {
        self.state.server_start_count
    }

    pub fn record_dimension_load(&mut self, dim: DimensionId) {
        bump(self.state.dimension_load_counts.entry(dim).or_insert(0));
        self.dirty = true;
    }

    pub fn dimension_load_count(&self, dim: DimensionId) -> u32 {
        self.state.dimension_load_counts.get(&dim).copied().unwrap_or(0)
    }

    /// Dimensions with a recorded load, in no particular order.
    pub fn dimensions(&self) -> impl Iterator<Item = DimensionId> + '_ {
        self.state.dimension_load_counts.keys().copied()
    }

    // -- players -------------------------------------------------------------

    pub fn player_event_count(&self, player: &PlayerId, kind: PlayerEvent) -> u32 {
        self.state
            .player_records
            .get(player)
            .map_or(0, |r| r.count(kind))
    }

    pub fn increment_player_event(&mut self, player: PlayerId, kind: PlayerEvent) {
        self.record_mut(player).increment(kind);
        self.dirty = true;
    }

    pub fn player_dimension_event_count(
        &self,
        player: &PlayerId,
        dim: DimensionId,
        kind: DimensionEvent,
    ) -> u32 {
        self.state
            .player_records
            .get(player)
            .map_or(0, |r| r.dimension_count(dim, kind))
    }

    pub fn increment_player_dimension_event(
        &mut self,
        player: PlayerId,
        dim: DimensionId,
        kind: DimensionEvent,
    ) {
        self.record_mut(player).increment_dimension(dim, kind);
        self.dirty = true;
    }

    pub fn player_count(&self) -> usize {
        self.state.player_records.len()
    }

    pub fn players(&self) -> impl Iterator<Item = (&PlayerId, &PlayerRecord)> {
        self.state.player_records.iter()
    }

    fn record_mut(&mut self, player: PlayerId) -> &mut PlayerRecord {
        self.state.player_records.entry(player).or_default()
    }
}
