//! Hopper - headless driver
//!
//! Runs a scripted session on the test course and logs what the locomotion
//! core reports: landings, jumps, dashes, jump pads and an undo.
//!
//! Set `RUST_LOG=debug` for component-level detail.

use std::sync::Arc;

use anyhow::Context;
use hopper_game::input::{ActionInput, MovementInput};
use hopper_game::{save, Level, PlayerInput, Simulation, SimulationConfig};
use hopper_physics::events::{
    handler, DashCooldownFinished, DashExecuted, JumpPadBoost, Landed, PreJumpCalculation,
    Reversal, UndoBegan, UndoCompleted,
};
use hopper_physics::EventBus;

/// One scripted stretch of input.
struct Segment {
    label: &'static str,
    frames: u32,
    input: PlayerInput,
}

fn held(movement: MovementInput, actions: ActionInput) -> PlayerInput {
    PlayerInput {
        movement,
        actions,
        ..Default::default()
    }
}

fn script() -> Vec<Segment> {
    let none = MovementInput::default();
    let forward = MovementInput {
        forward: true,
        ..Default::default()
    };
    let right = MovementInput {
        right: true,
        ..Default::default()
    };
    let jump = ActionInput {
        jump: true,
        ..Default::default()
    };
    let undo = ActionInput {
        undo: true,
        ..Default::default()
    };
    let idle = ActionInput::default();

    vec![
        Segment { label: "settle", frames: 25, input: held(none, idle) },
        Segment { label: "walk", frames: 50, input: held(forward, idle) },
        Segment { label: "jump", frames: 1, input: held(forward, jump) },
        Segment { label: "airborne", frames: 60, input: held(forward, idle) },
        Segment { label: "undo", frames: 1, input: held(none, undo) },
        Segment { label: "rewinding", frames: 30, input: held(none, idle) },
        Segment { label: "tap", frames: 3, input: held(right, idle) },
        Segment { label: "release", frames: 3, input: held(none, idle) },
        Segment { label: "dash", frames: 20, input: held(right, idle) },
        Segment { label: "coast", frames: 50, input: held(none, idle) },
    ]
}

fn log_events(bus: &EventBus) {
    bus.subscribe::<Landed>(handler(|event: &Landed| {
        log::info!("landed at {:.2} ({})", event.time, event.position);
        Ok(())
    }));
    bus.subscribe::<PreJumpCalculation>(handler(|event: &PreJumpCalculation| {
        log::info!("jump at {:.2} from {}", event.time, event.position);
        Ok(())
    }));
    bus.subscribe::<DashExecuted>(handler(|event: &DashExecuted| {
        log::info!("dash {} x{}", event.direction, event.strength);
        Ok(())
    }));
    bus.subscribe::<DashCooldownFinished>(handler(|event: &DashCooldownFinished| {
        log::info!("dash ready again at {:.2}", event.ready_time);
        Ok(())
    }));
    bus.subscribe::<JumpPadBoost>(handler(|event: &JumpPadBoost| {
        log::info!("jump pad boost {:.1} along {}", event.force, event.direction);
        Ok(())
    }));
    bus.subscribe::<UndoBegan>(handler(|event: &UndoBegan| {
        log::info!(
            "undo to {} over {:.2}s",
            event.snapshot.position,
            event.snap_time
        );
        Ok(())
    }));
    bus.subscribe::<UndoCompleted>(handler(|event: &UndoCompleted| {
        log::info!("undo completed at {:.2}", event.time);
        Ok(())
    }));
    bus.subscribe::<Reversal>(handler(|event: &Reversal| {
        log::info!(
            "time reversal {} (step {:.4})",
            if event.is_reversing { "on" } else { "off" },
            event.reversal_fixed_delta
        );
        Ok(())
    }));
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = SimulationConfig::default();
    config.validate().context("invalid simulation config")?;

    let bus = Arc::new(EventBus::new());
    log_events(&bus);
    let level = Level::test_course(bus.clone());
    log::info!("loaded {} ({} brushes)", level.name, level.collision.brush_count());

    let mut sim = Simulation::new(config, level, bus);

    for segment in script() {
        log::debug!("segment {} for {} frames", segment.label, segment.frames);
        for frame in 0..segment.frames {
            let mut input = segment.input.clone();
            input.frame = frame;
            sim.tick(&input);
        }
        let body = sim.character().body();
        log::info!(
            "[{:>9}] t={:.2} pos={} vel={} state={:?}",
            segment.label,
            sim.now(),
            body.position,
            body.velocity(),
            sim.character().state()
        );
    }

    let bytes = save::encode(&sim.capture_save()).context("encoding save data")?;
    let restored = save::decode(&bytes).context("decoding save data")?;
    sim.restore_save(&restored).context("restoring save data")?;
    log::info!("save data round-tripped ({} bytes)", bytes.len());

    Ok(())
}
