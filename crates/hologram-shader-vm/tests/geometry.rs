//! Geometry Output
//!
//! Vertex emission, primitive bookkeeping per stream and the output vertex offset.

mod common;

use common::{build, lanes_f32, machine, run_to_end};
use hologram_shader_vm::isa::{Declaration, Opcode, RegisterFile, SrcRegister};
use hologram_shader_vm::{Channel, Fault, Primitive, ProgramBuilder, RunStatus, ShaderStage};

fn with_outputs(b: &mut ProgramBuilder, count: u32) {
    b.declare(Declaration::new(RegisterFile::Output, 0, count - 1));
}

#[test]
fn test_emit_lays_vertices_out_in_sequence() {
    let mut b = ProgramBuilder::new();
    with_outputs(&mut b, 2);
    let k = b.immediate_f32([7.0, 8.0, 9.0, 1.0]);
    b.op(Opcode::Mov, &[b.output(0)], &[b.input(0)]);
    b.op(Opcode::Mov, &[b.output(1)], &[b.imm(k).scalar(0)]);
    b.op(Opcode::Emit, &[], &[]);
    b.op(Opcode::Mov, &[b.output(0)], &[b.input(0).dim(1)]);
    b.op(Opcode::Mov, &[b.output(1)], &[b.imm(k).scalar(1)]);
    b.op(Opcode::Emit, &[], &[]);
    b.op(Opcode::Endprim, &[], &[]);
    b.op(Opcode::Mov, &[b.output(0)], &[b.input(0).dim(2)]);
    b.op(Opcode::Mov, &[b.output(1)], &[b.imm(k).scalar(2)]);
    b.op(Opcode::Emit, &[], &[]);
    b.end();

    let mut m = machine(ShaderStage::Geometry, build(b));
    for vertex in 0..3 {
        let v = vertex as f32;
        m.set_vertex_input(vertex, 0, lanes_f32([v + 0.5, 0.0, 0.0, 0.0])).unwrap();
    }
    assert_eq!(m.run(0).unwrap(), RunStatus::Halted { alive_mask: 0xf });

    assert_eq!(m.outputs_per_vertex(), 2);
    assert_eq!(
        m.primitives(0),
        vec![
            Primitive {
                vertex_count: 2,
                first_output: 0
            },
            Primitive {
                vertex_count: 1,
                first_output: 4
            },
        ]
    );
    // one primitive per invocation: only lane 0 runs
    for (vertex, expected) in [(0usize, 0.5f32), (1, 1.5), (2, 2.5)] {
        assert_eq!(m.output(vertex * 2).unwrap()[0].as_f32(), [expected, 0.0, 0.0, 0.0]);
    }
    assert_eq!(m.output(5).unwrap()[1].f32(0), 9.0);
}

#[test]
fn test_output_reads_follow_the_vertex_offset() {
    let mut b = ProgramBuilder::new();
    with_outputs(&mut b, 1);
    let k = b.immediate_f32([3.0; 4]);
    b.op(Opcode::Mov, &[b.output(0)], &[b.imm(k)]);
    b.op(Opcode::Mov, &[b.temp_dst(0)], &[SrcRegister::new(RegisterFile::Output, 0)]);
    b.op(Opcode::Emit, &[], &[]);
    b.op(Opcode::Mov, &[b.temp_dst(1)], &[SrcRegister::new(RegisterFile::Output, 0)]);
    b.end();

    let mut m = machine(ShaderStage::Geometry, build(b));
    run_to_end(&mut m);
    assert_eq!(m.temp(0).unwrap()[0].f32(0), 3.0);
    assert_eq!(m.temp(1).unwrap()[0], Channel::ZERO);
}

#[test]
fn test_streams_are_tracked_separately() {
    let mut b = ProgramBuilder::new();
    with_outputs(&mut b, 1);
    let streams = b.immediate_u32([0, 1, 0, 0]);
    b.op(Opcode::Emit, &[], &[b.imm(streams).scalar(1)]);
    b.op(Opcode::Emit, &[], &[b.imm(streams).scalar(1)]);
    b.op(Opcode::Endprim, &[], &[b.imm(streams).scalar(1)]);
    b.op(Opcode::Emit, &[], &[b.imm(streams).scalar(0)]);
    b.end();

    let mut m = machine(ShaderStage::Geometry, build(b));
    run_to_end(&mut m);
    assert_eq!(
        m.primitives(1),
        vec![Primitive {
            vertex_count: 2,
            first_output: 0
        }]
    );
    // END closed the open stream 0 primitive
    assert_eq!(
        m.primitives(0),
        vec![Primitive {
            vertex_count: 1,
            first_output: 2
        }]
    );
}

#[test]
fn test_vertex_budget_drops_extra_vertices() {
    let mut b = ProgramBuilder::new();
    with_outputs(&mut b, 1);
    b.max_output_vertices(2);
    for _ in 0..4 {
        b.op(Opcode::Emit, &[], &[]);
    }
    b.end();

    let mut m = machine(ShaderStage::Geometry, build(b));
    run_to_end(&mut m);
    assert_eq!(m.primitives(0)[0].vertex_count, 2);

    // a new run starts from an empty stream
    run_to_end(&mut m);
    assert_eq!(m.primitives(0).len(), 1);
}

#[test]
fn test_emit_to_missing_stream_is_malformed() {
    let mut b = ProgramBuilder::new();
    let k = b.immediate_u32([7; 4]);
    b.op(Opcode::Emit, &[], &[b.imm(k)]);
    b.end();

    let mut m = machine(ShaderStage::Geometry, build(b));
    let err = m.run(0).unwrap_err();
    assert_eq!(err.fault(), Some(&Fault::BadStream { stream: 7, streams: 4 }));
}
