//! Cue system plugin.

use bevy::prelude::*;

use super::manager::CueManager;

/// Registers the cue manager resource.
///
/// Dispatch itself happens synchronously inside the effect engine; the
/// plugin only provides the registry games register handlers with.
pub struct CuePlugin;

impl Plugin for CuePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CueManager>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_provides_manager() {
        let mut app = App::new();
        app.add_plugins(CuePlugin);
        assert!(app.world().get_resource::<CueManager>().is_some());
    }
}
