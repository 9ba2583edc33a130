//! Serialization
//!
//! Programs, configurations and run results survive bincode and JSON encoding
//! and behave the same once decoded.

mod common;

use common::{build, lanes_u32, machine, run_to_end};
use hologram_shader_vm::isa::{Opcode, Program, WriteMask};
use hologram_shader_vm::{
    MachineConfig, MachineLimits, Primitive, ProgramBuilder, RunStatus, ShaderStage, StackDepths,
};

/// Sums 1..=n per lane, with n taken from IN[0].x
fn summing_program() -> Program {
    let mut b = ProgramBuilder::new();
    let k = b.immediate_u32([1, 0, u32::MAX, 0]);
    let x = b.temp_dst(0).mask(WriteMask::X);
    b.op(Opcode::Mov, &[x], &[b.input(0)]);
    b.bgnloop();
    b.op(Opcode::Usne, &[b.temp_dst(1)], &[b.temp(0).scalar(0), b.imm(k).scalar(1)]);
    b.uif(b.temp(1).scalar(0));
    b.op(Opcode::Uadd, &[b.temp_dst(2)], &[b.temp(2).scalar(0), b.temp(0).scalar(0)]);
    b.op(Opcode::Uadd, &[x], &[b.temp(0).scalar(0), b.imm(k).scalar(2)]);
    b.else_();
    b.brk();
    b.endif();
    b.endloop();
    b.end();
    build(b)
}

// ================================================================================================
// Programs
// ================================================================================================

#[test]
fn test_program_bincode_round_trip_runs_the_same() {
    let program = summing_program();
    let bytes = bincode::serialize(&program).unwrap();
    let decoded: Program = bincode::deserialize(&bytes).unwrap();
    assert_eq!(decoded, program);

    for p in [program, decoded] {
        let mut m = machine(ShaderStage::Compute, p);
        m.set_input(0, lanes_u32([0, 1, 4, 10])).unwrap();
        run_to_end(&mut m);
        assert_eq!(m.temp(2).unwrap()[0].as_u32(), [0, 1, 10, 55]);
    }
}

#[test]
fn test_program_json_round_trip() {
    let program = summing_program();
    let text = serde_json::to_string(&program).unwrap();
    let decoded: Program = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, program);
    assert_eq!(decoded.disassemble(), program.disassemble());
}

#[test]
fn test_disassembly_has_one_line_per_instruction() {
    let program = summing_program();
    let text = program.disassemble();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), program.len());
    assert!(lines[0].starts_with("   0: "));
    assert!(lines[0].contains(&Opcode::Mov.to_string()));
    assert!(lines.last().unwrap().contains(&Opcode::End.to_string()));
}

// ================================================================================================
// Configuration and results
// ================================================================================================

#[test]
fn test_config_json_keeps_limits() {
    let config = MachineConfig {
        stage: ShaderStage::Geometry,
        limits: MachineLimits {
            max_temps: 32,
            vertex_streams: 2,
            ..MachineLimits::default()
        },
        flatshade: true,
    };
    let text = config.to_json().unwrap();
    assert!(text.contains("\"Geometry\""));
    assert_eq!(MachineConfig::from_json(&text).unwrap(), config);
}

#[test]
fn test_invalid_config_json_is_rejected() {
    let text = r#"{ "stage": "Geometry", "limits": { "max_total_vertices": 1 } }"#;
    assert!(MachineConfig::from_json(text).is_err());
    assert!(MachineConfig::from_json(r#"{ "stage": "Pixel" }"#).is_err());
}

#[test]
fn test_run_results_serialize() {
    let statuses = [RunStatus::Halted { alive_mask: 0b1011 }, RunStatus::Suspended { resume_pc: 12 }];
    let text = serde_json::to_string(&statuses).unwrap();
    let back: Vec<RunStatus> = serde_json::from_str(&text).unwrap();
    assert_eq!(back, statuses);

    let prim = Primitive {
        vertex_count: 3,
        first_output: 6,
    };
    let bytes = bincode::serialize(&prim).unwrap();
    assert_eq!(bincode::deserialize::<Primitive>(&bytes).unwrap(), prim);

    let depths = StackDepths::default();
    let text = serde_json::to_string(&depths).unwrap();
    assert_eq!(serde_json::from_str::<StackDepths>(&text).unwrap(), depths);
}
