//! Shared helpers for the integration suites

#![allow(dead_code)]

use hologram_shader_vm::isa::Program;
use hologram_shader_vm::{Channel, Machine, MachineConfig, ProgramBuilder, RunStatus, ShaderStage, Vector};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Route machine traces to the test writer; `RUST_LOG` picks the level
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Machine for `stage` with `program` bound
pub fn machine(stage: ShaderStage, program: Program) -> Machine {
    init_tracing();
    let mut machine = Machine::new(MachineConfig::new(stage)).expect("default config is valid");
    machine.bind_program(Arc::new(program)).expect("program binds");
    machine
}

pub fn build(b: ProgramBuilder) -> Program {
    b.build().expect("program builds")
}

/// Run to completion, asserting no lane was killed
pub fn run_to_end(machine: &mut Machine) {
    assert_eq!(machine.run(0).expect("run succeeds"), RunStatus::Halted { alive_mask: 0xf });
}

pub fn splat_f32(value: [f32; 4]) -> Vector {
    value.map(Channel::splat_f32)
}

/// The same per-lane values in every channel
pub fn lanes_u32(lanes: [u32; 4]) -> Vector {
    [Channel::from_u32(lanes); 4]
}

pub fn lanes_f32(lanes: [f32; 4]) -> Vector {
    [Channel::from_f32(lanes); 4]
}
