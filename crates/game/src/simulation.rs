//! Game simulation - the fixed-step loop.
//!
//! Each tick applies the frame's input, steps the platforms (backwards while
//! an undo is in flight), then advances the character.

use std::sync::Arc;

use glam::Quat;
use hopper_physics::{
    CharacterConfig, CharacterController, EventBus, PhysicsError, PhysicsResult, Surroundings,
    Tick,
};
use serde::{Deserialize, Serialize};

use crate::input::{InputCommand, PlayerInput};
use crate::level::Level;
use crate::reversal::TimeReversal;
use crate::save::{PlayerSaveState, SaveData, SaveError};

/// Game simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulation tick rate (ticks per second).
    pub tick_rate: u32,

    /// Character physics configuration.
    pub character: CharacterConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 50,
            character: CharacterConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Get the time step per tick in seconds.
    pub fn delta_time(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn sanitized(&self) -> Self {
        Self {
            tick_rate: self.tick_rate.max(1),
            character: self.character.sanitized(),
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if self.tick_rate == 0 {
            return Err(PhysicsError::InvalidConfiguration {
                field: "tick_rate",
                reason: "must be at least 1".to_string(),
            });
        }
        self.character.validate()
    }
}

/// The main game simulation.
///
/// Owns the level and one character. Advancing it with the same inputs
/// always produces the same state.
#[derive(Debug)]
pub struct Simulation {
    /// Current frame/tick number.
    pub frame: u64,

    /// Simulation configuration.
    pub config: SimulationConfig,

    /// Current level.
    pub level: Level,

    character: CharacterController,
    reversal: TimeReversal,
    bus: Arc<EventBus>,
    previous_input: PlayerInput,
    now: f64,
}

impl Simulation {
    /// Create a new simulation. `level` must have been built on `bus`.
    pub fn new(config: SimulationConfig, level: Level, bus: Arc<EventBus>) -> Self {
        let config = config.sanitized();
        let mut character =
            CharacterController::new(level.spawn.position, config.character.clone(), bus.clone());
        character.place(
            level.spawn.position,
            Quat::from_rotation_y(-level.spawn.yaw.to_radians()),
        );

        Self {
            frame: 0,
            config,
            level,
            character,
            reversal: TimeReversal::new(bus.clone()),
            bus,
            previous_input: PlayerInput::default(),
            now: 0.0,
        }
    }

    /// Create a simulation with default configuration on the test course.
    pub fn test() -> Self {
        let bus = Arc::new(EventBus::new());
        Self::new(SimulationConfig::default(), Level::test_course(bus.clone()), bus)
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn character(&self) -> &CharacterController {
        &self.character
    }

    /// Simulation time at the start of the next tick (seconds).
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn is_reversing(&self) -> bool {
        self.reversal.is_reversing()
    }

    /// Get the delta time for this simulation.
    pub fn delta_time(&self) -> f32 {
        self.config.delta_time()
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self, input: &PlayerInput) {
        let dt = self.config.delta_time();
        let tick = Tick::new(self.now, dt);

        let command = input.to_command(&self.previous_input);
        self.previous_input = input.clone();
        self.apply_command(&command, tick);

        let platform_dt = self.reversal.update(self.now, dt);
        self.level
            .platforms
            .step(Some(&mut self.level.collision), platform_dt);

        self.character.fixed_update(
            Surroundings {
                world: Some(&self.level.collision),
                platforms: &self.level.platforms,
                jump_pads: Some(&mut self.level.jump_pads),
            },
            tick,
        );

        self.now = tick.end();
        self.frame += 1;
    }

    fn apply_command(&mut self, command: &InputCommand, tick: Tick) {
        self.character.apply_look(command.look);
        self.character.set_move_input(command.move_axis);

        if let Some(tap) = command.move_tap {
            self.character.move_tap(tap, tick.now);
        }
        if command.jump_pressed {
            self.character.press_jump(tick.now);
        }
        if command.undo_pressed && !self.character.undo(Some(&self.level.collision), tick) {
            log::debug!("nothing to undo at frame {}", self.frame);
        }
    }

    // ========================================================================
    // Save data
    // ========================================================================

    pub fn capture_save(&self) -> SaveData {
        let body = self.character.body();
        SaveData {
            player: PlayerSaveState {
                position: body.position,
                rotation: body.rotation,
            },
            platforms: self.level.platforms.capture_save_states(),
        }
    }

    /// Apply save data. Platforms are validated first; on error nothing
    /// about the character changes.
    pub fn restore_save(&mut self, data: &SaveData) -> Result<(), SaveError> {
        self.level
            .platforms
            .restore_save_states(Some(&mut self.level.collision), &data.platforms)?;
        self.character
            .place(data.player.position, data.player.rotation);
        log::info!("restored save at frame {}", self.frame);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn forward() -> PlayerInput {
        let mut input = PlayerInput::default();
        input.movement.forward = true;
        input
    }

    #[test]
    fn test_simulation_creation() {
        let sim = Simulation::test();
        assert_eq!(sim.frame, 0);
        assert_eq!(sim.now(), 0.0);
    }

    #[test]
    fn test_tick_advances_frame() {
        let mut sim = Simulation::test();

        sim.tick(&PlayerInput::default());
        assert_eq!(sim.frame, 1);

        sim.tick(&PlayerInput::default());
        assert_eq!(sim.frame, 2);
        assert!((sim.now() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_movement_input() {
        let mut sim = Simulation::test();
        let start_pos = sim.character().body().position;

        for _ in 0..60 {
            sim.tick(&forward());
        }

        let end_pos = sim.character().body().position;
        let distance = (end_pos - start_pos).length();

        assert!(distance > 1.0, "Player should have moved, distance={}", distance);
    }

    #[test]
    fn test_determinism() {
        let inputs: Vec<_> = (0..200)
            .map(|i| {
                let mut input = PlayerInput::default();
                input.movement.forward = i % 2 == 0;
                input.movement.right = i % 3 == 0;
                input.actions.jump = i % 40 < 2;
                input.actions.undo = i == 150;
                input.mouse_delta = (if i % 7 == 0 { 3.0 } else { 0.0 }, 0.0);
                input
            })
            .collect();

        let run = || {
            let mut sim = Simulation::test();
            for input in &inputs {
                sim.tick(input);
            }
            sim.capture_save()
        };

        let first = run();
        let second = run();

        assert_eq!(first, second, "Simulations should be deterministic");
    }

    #[test]
    fn test_save_restore() {
        let mut sim = Simulation::test();
        for _ in 0..120 {
            sim.tick(&forward());
        }
        let save = sim.capture_save();

        let mut other = Simulation::test();
        other.restore_save(&save).unwrap();

        assert_eq!(other.capture_save(), save);
    }

    #[test]
    fn test_bad_save_leaves_character() {
        let mut sim = Simulation::test();
        let before = sim.character().body().position;
        let mut save = sim.capture_save();
        save.player.position = Vec3::new(9.0, 9.0, 9.0);
        save.platforms[0].traversal.current_index = 42;

        assert!(sim.restore_save(&save).is_err());
        assert_eq!(sim.character().body().position, before);
    }

    #[test]
    fn test_config_tick_rate() {
        let config = SimulationConfig {
            tick_rate: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.sanitized().tick_rate, 1);
        assert_eq!(SimulationConfig::default().delta_time(), 0.02);
    }
}
