//! `TrackerQuery`: read-only counter access for other host features
//! (command templating, status displays).

use tallystore_core::{DataTracker, DimensionEvent, DimensionId, PlayerEvent, PlayerId, SharedTracker};

/// Integer getters for every tracked counter. Unseen keys read as 0.
pub trait TrackerQuery {
    fn server_starts(&self) -> u32;

    fn dimension_loads(&self, dim: DimensionId) -> u32;

    fn player_events(&self, player: &PlayerId, kind: PlayerEvent) -> u32;

    fn player_dimension_events(&self, player: &PlayerId, dim: DimensionId, kind: DimensionEvent) -> u32;
}

impl TrackerQuery for DataTracker {
    fn server_starts(&self) -> u32 {
        self.server_start_count()
    }

    fn dimension_loads(&self, dim: DimensionId) -> u32 {
        self.dimension_load_count(dim)
    }

    fn player_events(&self, player: &PlayerId, kind: PlayerEvent) -> u32 {
        self.player_event_count(player, kind)
    }

    fn player_dimension_events(&self, player: &PlayerId, dim: DimensionId, kind: DimensionEvent) -> u32 {
        self.player_dimension_event_count(player, dim, kind)
    }
}

impl TrackerQuery for SharedTracker {
    fn server_starts(&self) -> u32 {
        self.lock().server_start_count()
    }

    fn dimension_loads(&self, dim: DimensionId) -> u32 {
        self.lock().dimension_load_count(dim)
    }

    fn player_events(&self, player: &PlayerId, kind: PlayerEvent) -> u32 {
        self.lock().player_event_count(player, kind)
    }

    fn player_dimension_events(&self, player: &PlayerId, dim: DimensionId, kind: DimensionEvent) -> u32 {
        self.lock().player_dimension_event_count(player, dim, kind)
    }
}
