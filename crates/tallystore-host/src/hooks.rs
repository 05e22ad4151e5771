//! `LifecycleHooks`: the callbacks a host fires on game events.

use tallystore_core::{DataTracker, DimensionEvent, DimensionId, PlayerEvent, PlayerId, SharedTracker};

/// Lifecycle callbacks. Each one increments exactly one counter.
///
/// Implementors provide the four primitive operations; the per-event
/// methods are derived from them.
pub trait LifecycleHooks {
    fn on_server_start(&mut self);

    fn on_dimension_load(&mut self, dim: DimensionId);

    fn on_player_event(&mut self, player: PlayerId, kind: PlayerEvent);

    fn on_player_dimension_event(&mut self, player: PlayerId, dim: DimensionId, kind: DimensionEvent);

    fn on_player_join(&mut self, player: PlayerId) {
        self.on_player_event(player, PlayerEvent::Join);
    }

    fn on_player_quit(&mut self, player: PlayerId) {
        self.on_player_event(player, PlayerEvent::Quit);
    }

    fn on_player_death(&mut self, player: PlayerId) {
        self.on_player_event(player, PlayerEvent::Death);
    }

    fn on_player_respawn(&mut self, player: PlayerId) {
        self.on_player_event(player, PlayerEvent::Respawn);
    }

    fn on_player_enter_dimension(&mut self, player: PlayerId, dim: DimensionId) {
        self.on_player_dimension_event(player, dim, DimensionEvent::Enter);
    }

    fn on_player_leave_dimension(&mut self, player: PlayerId, dim: DimensionId) {
        self.on_player_dimension_event(player, dim, DimensionEvent::Leave);
    }
}

impl LifecycleHooks for DataTracker {
    fn on_server_start(&mut self) {
        self.record_server_start();
    }

    fn on_dimension_load(&mut self, dim: DimensionId) {
        self.record_dimension_load(dim);
    }

    fn on_player_event(&mut self, player: PlayerId, kind: PlayerEvent) {
        self.increment_player_event(player, kind);
    }

    fn on_player_dimension_event(&mut self, player: PlayerId, dim: DimensionId, kind: DimensionEvent) {
        self.increment_player_dimension_event(player, dim, kind);
    }
}

/// Shared trackers take the lock for the duration of one increment.
impl LifecycleHooks for SharedTracker {
    fn on_server_start(&mut self) {
        self.lock().record_server_start();
    }

    fn on_dimension_load(&mut self, dim: DimensionId) {
        self.lock().record_dimension_load(dim);
    }

    fn on_player_event(&mut self, player: PlayerId, kind: PlayerEvent) {
        self.lock().increment_player_event(player, kind);
    }

    fn on_player_dimension_event(&mut self, player: PlayerId, dim: DimensionId, kind: DimensionEvent) {
        self.lock().increment_player_dimension_event(player, dim, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallystore_core::TrackerConfig;
    use uuid::Uuid;

    #[test]
    fn test_each_hook_hits_its_counter() {
        let mut tracker = DataTracker::new(TrackerConfig::disabled()).unwrap();
        let p = Uuid::from_u128(42);

        tracker.on_server_start();
        tracker.on_dimension_load(-1);
        tracker.on_player_join(p);
        tracker.on_player_quit(p);
        tracker.on_player_death(p);
        tracker.on_player_death(p);
        tracker.on_player_respawn(p);
        tracker.on_player_enter_dimension(p, 1);
        tracker.on_player_leave_dimension(p, 0);

        assert_eq!(tracker.server_start_count(), 1);
        assert_eq!(tracker.dimension_load_count(-1), 1);
        assert_eq!(tracker.player_event_count(&p, PlayerEvent::Join), 1);
        assert_eq!(tracker.player_event_count(&p, PlayerEvent::Quit), 1);
        assert_eq!(tracker.player_event_count(&p, PlayerEvent::Death), 2);
        assert_eq!(tracker.player_event_count(&p, PlayerEvent::Respawn), 1);
        assert_eq!(tracker.player_dimension_event_count(&p, 1, DimensionEvent::Enter), 1);
        assert_eq!(tracker.player_dimension_event_count(&p, 0, DimensionEvent::Leave), 1);
        assert_eq!(tracker.player_dimension_event_count(&p, 0, DimensionEvent::Enter), 0);
    }

    #[test]
    fn test_shared_tracker_hooks() {
        let mut shared = DataTracker::new(TrackerConfig::disabled()).unwrap().into_shared();
        shared.on_server_start();
        shared.on_dimension_load(3);
        shared.on_dimension_load(3);

        let tracker = shared.lock();
        assert_eq!(tracker.server_start_count(), 1);
        assert_eq!(tracker.dimension_load_count(3), 2);
        assert!(tracker.is_dirty());
    }
}
