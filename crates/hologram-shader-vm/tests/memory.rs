//! Memory Operations
//!
//! Buffer, shared-memory, image and constant-buffer access through LOAD,
//! STORE, RESQ and the atomics, including concurrent machines.

mod common;

use common::{build, lanes_u32, machine, run_to_end};
use hologram_shader_vm::isa::{DstRegister, Opcode, RegisterFile, TextureTarget, WriteMask};
use hologram_shader_vm::{
    AtomicOp, BufferPool, Channel, ConstantBuffer, Fault, Image, ImageCoords, ImageParams, MemoryRegion, ProgramBuilder,
    RunStatus, ShaderStage, Vector, VmError,
};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

fn buffer_dst(unit: i32, mask: WriteMask) -> DstRegister {
    DstRegister::new(RegisterFile::Buffer, unit).mask(mask)
}

fn pool_with(words: &[u32]) -> (Arc<BufferPool>, MemoryRegion) {
    let pool = Arc::new(BufferPool::new());
    let region = MemoryRegion::from_words(words);
    pool.bind(0, region.clone());
    (pool, region)
}

// ================================================================================================
// Buffers
// ================================================================================================

#[test]
fn test_load_reads_words_that_fit() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::Load, &[b.temp_dst(0)], &[b.resource(RegisterFile::Buffer, 0), b.input(0)]);
    b.op(Opcode::Load, &[b.temp_dst(1).mask(WriteMask::X)], &[b.resource(RegisterFile::Buffer, 0), b.input(1)]);
    b.end();

    let (pool, _) = pool_with(&[1, 2, 3, 4]);
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_buffers(pool);
    m.set_input(0, lanes_u32([0, 4, 16, 0])).unwrap();
    m.set_input(1, lanes_u32([0, 4, 12, 16])).unwrap();
    run_to_end(&mut m);

    let wide = m.temp(0).unwrap();
    assert_eq!(wide[0].as_u32(), [1, 0, 0, 1]);
    assert_eq!(wide[3].as_u32(), [4, 0, 0, 4]);
    assert_eq!(m.temp(1).unwrap()[0].as_u32(), [1, 2, 4, 0]);
}

#[test]
fn test_store_writes_only_channels_that_fit() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::Store, &[buffer_dst(0, WriteMask::XYZW)], &[b.input(0), b.input(1)]);
    b.end();

    let (pool, region) = pool_with(&[0, 0]);
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_buffers(pool);
    m.set_input(0, lanes_u32([0, 4, 8, 100])).unwrap();
    m.set_input(1, lanes_u32([10, 20, 30, 40])).unwrap();
    run_to_end(&mut m);

    // lane 1 overwrites the second word lane 0 wrote
    assert_eq!(region.to_words(), vec![10, 20]);
}

#[test]
fn test_store_respects_exec_mask() {
    let mut b = ProgramBuilder::new();
    b.uif(b.input(2).scalar(0));
    b.op(Opcode::Store, &[buffer_dst(0, WriteMask::X)], &[b.input(0), b.input(1)]);
    b.endif();
    b.end();

    let (pool, region) = pool_with(&[0; 4]);
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_buffers(pool);
    m.set_input(0, lanes_u32([0, 4, 8, 12])).unwrap();
    m.set_input(1, lanes_u32([5, 6, 7, 8])).unwrap();
    m.set_input(2, lanes_u32([1, 0, 1, 0])).unwrap();
    run_to_end(&mut m);
    assert_eq!(region.to_words(), vec![5, 0, 7, 0]);
}

#[test]
fn test_helper_and_killed_lanes_have_no_side_effects() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::KillIf, &[], &[b.input(0)]);
    b.op(
        Opcode::AtomUadd,
        &[b.temp_dst(0).mask(WriteMask::X)],
        &[b.resource(RegisterFile::Buffer, 0), b.input(1), b.input(2)],
    );
    b.end();

    let (pool, region) = pool_with(&[0]);
    let mut m = machine(ShaderStage::Fragment, build(b));
    m.bind_buffers(pool);
    m.set_non_helper_mask(0b0111);
    m.set_input(0, [Channel::from_f32([-1.0, 0.0, 0.0, 0.0]); 4]).unwrap();
    m.set_input(1, lanes_u32([0; 4])).unwrap();
    m.set_input(2, lanes_u32([1; 4])).unwrap();

    assert_eq!(m.run(0).unwrap(), RunStatus::Halted { alive_mask: 0b1110 });
    assert_eq!(region.to_words(), vec![2]);
    assert_eq!(m.temp(0).unwrap()[0].as_u32(), [0, 0, 1, 0]);
}

#[test]
fn test_all_helper_quad_has_no_side_effects() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::Store, &[buffer_dst(0, WriteMask::X)], &[b.input(0), b.input(1)]);
    b.op(
        Opcode::AtomUadd,
        &[b.temp_dst(0).mask(WriteMask::X)],
        &[b.resource(RegisterFile::Buffer, 0), b.input(2), b.input(1)],
    );
    b.end();

    let (pool, region) = pool_with(&[0; 4]);
    let mut m = machine(ShaderStage::Fragment, build(b));
    m.bind_buffers(pool);
    m.set_non_helper_mask(0);
    m.set_input(0, lanes_u32([0, 4, 8, 12])).unwrap();
    m.set_input(1, lanes_u32([1; 4])).unwrap();
    m.set_input(2, lanes_u32([0; 4])).unwrap();

    // the mask holds across runs
    for _ in 0..2 {
        run_to_end(&mut m);
        assert_eq!(region.to_words(), vec![0; 4]);
    }

    m.set_non_helper_mask(0b1111);
    run_to_end(&mut m);
    assert_eq!(region.to_words(), vec![5, 1, 1, 1]);
}

#[test]
fn test_resq_reports_buffer_size() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::Resq, &[b.temp_dst(0)], &[b.resource(RegisterFile::Buffer, 0)]);
    b.op(Opcode::Resq, &[b.temp_dst(1)], &[b.resource(RegisterFile::Buffer, 5)]);
    b.end();

    let pool = Arc::new(BufferPool::new());
    pool.allocate(0, 64);
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_buffers(pool);
    run_to_end(&mut m);

    let t = m.temp(0).unwrap();
    assert_eq!(t[0].as_u32(), [64; 4]);
    assert_eq!(t[1], Channel::ZERO);
    assert_eq!(m.temp(1).unwrap()[0], Channel::ZERO);
}

#[test]
fn test_buffer_access_without_binding_is_reported() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::Load, &[b.temp_dst(0)], &[b.resource(RegisterFile::Buffer, 0), b.input(0)]);
    b.end();

    let mut m = machine(ShaderStage::Compute, build(b));
    assert_eq!(m.run(0), Err(VmError::MissingCapability("shader buffers")));
}

#[test]
fn test_load_from_constant_buffer_bytes() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::Load, &[b.temp_dst(0).mask(WriteMask::XY)], &[b.resource(RegisterFile::Constant, 1), b.input(0)]);
    b.end();

    let mut m = machine(ShaderStage::Vertex, build(b));
    m.set_constant_buffer(1, ConstantBuffer::from_words(&[11, 22, 33])).unwrap();
    m.set_input(0, lanes_u32([0, 4, 8, 6])).unwrap();
    run_to_end(&mut m);

    let t = m.temp(0).unwrap();
    assert_eq!(t[0].as_u32(), [11, 22, 0, 0]);
    assert_eq!(t[1].as_u32(), [22, 33, 0, 0]);
}

// ================================================================================================
// Atomics
// ================================================================================================

#[test]
fn test_aliasing_lanes_apply_in_lane_order() {
    let mut b = ProgramBuilder::new();
    b.op(
        Opcode::AtomUadd,
        &[b.temp_dst(0)],
        &[b.resource(RegisterFile::Buffer, 0), b.input(0), b.input(1)],
    );
    b.end();

    let (pool, region) = pool_with(&[0]);
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_buffers(pool);
    m.set_input(0, lanes_u32([0; 4])).unwrap();
    m.set_input(1, lanes_u32([1, 2, 3, 4])).unwrap();
    run_to_end(&mut m);

    assert_eq!(region.to_words(), vec![10]);
    // the previous value goes to every written channel
    let t = m.temp(0).unwrap();
    for chan in t {
        assert_eq!(chan.as_u32(), [0, 1, 3, 6]);
    }
}

#[test]
fn test_compare_and_swap_chain() {
    let mut b = ProgramBuilder::new();
    b.op(
        Opcode::AtomCas,
        &[b.temp_dst(0).mask(WriteMask::X)],
        &[b.resource(RegisterFile::Buffer, 0), b.input(0), b.input(1), b.input(2)],
    );
    b.end();

    let (pool, region) = pool_with(&[5]);
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_buffers(pool);
    m.set_input(0, lanes_u32([0; 4])).unwrap();
    m.set_input(1, lanes_u32([5, 7, 0, 8])).unwrap();
    m.set_input(2, lanes_u32([7, 8, 1, 9])).unwrap();
    run_to_end(&mut m);

    assert_eq!(m.temp(0).unwrap()[0].as_u32(), [5, 7, 8, 8]);
    assert_eq!(region.to_words(), vec![9]);
}

#[test]
fn test_atomic_without_x_in_mask_does_nothing() {
    let mut b = ProgramBuilder::new();
    b.op(
        Opcode::AtomXchg,
        &[b.temp_dst(0).mask(WriteMask::Y)],
        &[b.resource(RegisterFile::Buffer, 0), b.input(0), b.input(1)],
    );
    b.end();

    let (pool, region) = pool_with(&[3]);
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_buffers(pool);
    m.set_input(1, lanes_u32([9; 4])).unwrap();
    run_to_end(&mut m);
    assert_eq!(region.to_words(), vec![3]);
    assert_eq!(m.temp(0).unwrap()[1], Channel::ZERO);
}

#[test]
fn test_out_of_range_atomic_returns_zero() {
    let mut b = ProgramBuilder::new();
    b.op(
        Opcode::AtomUmax,
        &[b.temp_dst(0).mask(WriteMask::X)],
        &[b.resource(RegisterFile::Buffer, 0), b.input(0), b.input(1)],
    );
    b.end();

    let (pool, region) = pool_with(&[4, 4]);
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_buffers(pool);
    m.set_input(0, lanes_u32([0, 4, 6, 8])).unwrap();
    m.set_input(1, lanes_u32([2, 9, 9, 9])).unwrap();
    run_to_end(&mut m);
    assert_eq!(m.temp(0).unwrap()[0].as_u32(), [4, 4, 0, 0]);
    assert_eq!(region.to_words(), vec![4, 9]);
}

#[test]
fn test_concurrent_machines_share_buffer_atomically() {
    let mut b = ProgramBuilder::new();
    let k = b.immediate_u32([0, 1, 0, 0]);
    b.op(
        Opcode::AtomUadd,
        &[b.null().mask(WriteMask::X)],
        &[b.resource(RegisterFile::Buffer, 0), b.imm(k).scalar(0), b.imm(k).scalar(1)],
    );
    b.end();
    let program = build(b);

    let (pool, region) = pool_with(&[0]);
    let groups = 64usize;
    (0..groups).into_par_iter().for_each(|_| {
        let mut m = machine(ShaderStage::Compute, program.clone());
        m.bind_buffers(pool.clone());
        for _ in 0..10 {
            run_to_end(&mut m);
        }
    });
    assert_eq!(region.to_words(), vec![(groups * 10 * 4) as u32]);
}

// ================================================================================================
// Shared memory
// ================================================================================================

#[test]
fn test_shared_memory_is_visible_across_a_barrier() {
    let mut b = ProgramBuilder::new();
    let mem = DstRegister::new(RegisterFile::Memory, 0).mask(WriteMask::X);
    b.op(Opcode::Store, &[mem], &[b.input(1), b.input(0)]);
    b.op(Opcode::Barrier, &[], &[]);
    b.op(Opcode::Load, &[b.temp_dst(0).mask(WriteMask::X)], &[b.resource(RegisterFile::Memory, 0), b.input(2)]);
    b.end();
    let program = build(b);

    let shared = MemoryRegion::new(16);
    let mut first = machine(ShaderStage::Compute, program.clone());
    let mut second = machine(ShaderStage::Compute, program);
    for (m, values) in [(&mut first, [1, 2, 3, 4]), (&mut second, [5, 6, 7, 8])] {
        m.bind_local_memory(shared.clone());
        m.set_input(0, lanes_u32(values)).unwrap();
        m.set_input(1, lanes_u32([0, 4, 8, 12])).unwrap();
        m.set_input(2, lanes_u32([12, 8, 4, 0])).unwrap();
    }

    let RunStatus::Suspended { resume_pc } = first.run(0).unwrap() else {
        panic!("first machine should stop at the barrier");
    };
    assert_eq!(second.run(0).unwrap(), RunStatus::Suspended { resume_pc });
    assert_eq!(shared.to_words(), vec![5, 6, 7, 8]);

    assert_eq!(first.run(resume_pc).unwrap(), RunStatus::Halted { alive_mask: 0xf });
    assert_eq!(second.run(resume_pc).unwrap(), RunStatus::Halted { alive_mask: 0xf });
    assert_eq!(first.temp(0).unwrap()[0].as_u32(), [8, 7, 6, 5]);
    assert_eq!(second.temp(0).unwrap()[0].as_u32(), [8, 7, 6, 5]);
}

#[test]
fn test_unbound_shared_memory_reads_zero() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::Store, &[DstRegister::new(RegisterFile::Memory, 0)], &[b.input(0), b.input(0)]);
    b.op(Opcode::Load, &[b.temp_dst(0)], &[b.resource(RegisterFile::Memory, 0), b.input(0)]);
    b.end();

    let mut m = machine(ShaderStage::Compute, build(b));
    m.set_temp(0, lanes_u32([9; 4])).unwrap();
    run_to_end(&mut m);
    assert_eq!(m.temp(0).unwrap(), [Channel::ZERO; 4]);
}

// ================================================================================================
// Images
// ================================================================================================

#[derive(Debug, Clone, PartialEq)]
enum ImageCall {
    Load(ImageParams, ImageCoords),
    Store(ImageParams, ImageCoords, Vector),
    Atomic(ImageParams, AtomicOp, Vector, Vector),
    Dims(ImageParams),
}

#[derive(Default)]
struct RecordingImage {
    calls: Mutex<Vec<ImageCall>>,
}

impl RecordingImage {
    fn calls(&self) -> Vec<ImageCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Image for RecordingImage {
    fn load(&self, params: &ImageParams, coords: &ImageCoords, _sample: &[i32; 4]) -> Vector {
        self.calls.lock().unwrap().push(ImageCall::Load(*params, *coords));
        [Channel::splat_f32(0.25); 4]
    }

    fn store(&self, params: &ImageParams, coords: &ImageCoords, _sample: &[i32; 4], value: &Vector) {
        self.calls.lock().unwrap().push(ImageCall::Store(*params, *coords, *value));
    }

    fn atomic(
        &self,
        params: &ImageParams,
        op: AtomicOp,
        _coords: &ImageCoords,
        _sample: &[i32; 4],
        value: &Vector,
        value2: &Vector,
    ) -> Vector {
        self.calls.lock().unwrap().push(ImageCall::Atomic(*params, op, *value, *value2));
        [Channel::splat_u32(77); 4]
    }

    fn dims(&self, params: &ImageParams) -> [i32; 4] {
        self.calls.lock().unwrap().push(ImageCall::Dims(*params));
        [32, 16, 1, 1]
    }
}

#[test]
fn test_image_operations_reach_the_capability() {
    let mut b = ProgramBuilder::new();
    let image = b.resource(RegisterFile::Image, 2);
    b.memory(Opcode::Load, b.temp_dst(0), &[image, b.input(0)], TextureTarget::Tex2D, 7);
    b.memory(
        Opcode::Store,
        DstRegister::new(RegisterFile::Image, 2),
        &[b.input(0), b.input(1)],
        TextureTarget::Tex2D,
        7,
    );
    b.memory(Opcode::AtomCas, b.temp_dst(1), &[image, b.input(0), b.input(1), b.input(2)], TextureTarget::Tex2D, 7);
    b.memory(Opcode::Resq, b.temp_dst(2), &[image], TextureTarget::Tex2D, 7);
    b.end();

    let recorder = Arc::new(RecordingImage::default());
    let mut m = machine(ShaderStage::Fragment, build(b));
    m.bind_image(recorder.clone());
    m.set_non_helper_mask(0b1011);
    m.set_input(0, [Channel::from_i32([0, 1, 0, 1]), Channel::from_i32([0, 0, 1, 1]), Channel::ZERO, Channel::ZERO])
        .unwrap();
    m.set_input(1, lanes_u32([3; 4])).unwrap();
    m.set_input(2, lanes_u32([4; 4])).unwrap();
    run_to_end(&mut m);

    let params = ImageParams {
        unit: 2,
        exec_mask: 0b1011,
        target: TextureTarget::Tex2D,
        format: 7,
    };
    let coords = [[0, 1, 0, 1], [0, 0, 1, 1], [0; 4]];
    assert_eq!(
        recorder.calls(),
        vec![
            ImageCall::Load(params, coords),
            ImageCall::Store(params, coords, [Channel::from_u32([3; 4]); 4]),
            ImageCall::Atomic(params, AtomicOp::Cas, lanes_u32([3; 4]), lanes_u32([4; 4])),
            ImageCall::Dims(params),
        ]
    );
    assert_eq!(m.temp(0).unwrap(), [Channel::splat_f32(0.25); 4]);
    assert_eq!(m.temp(1).unwrap(), [Channel::splat_u32(77); 4]);
    assert_eq!(m.temp(2).unwrap()[1].as_i32(), [16; 4]);
}

#[test]
fn test_image_access_needs_descriptor_and_capability() {
    let mut b = ProgramBuilder::new();
    b.op(Opcode::Load, &[b.temp_dst(0)], &[b.resource(RegisterFile::Image, 0), b.input(0)]);
    b.end();
    let mut m = machine(ShaderStage::Compute, build(b));
    m.bind_image(Arc::new(RecordingImage::default()));
    let err = m.run(0).unwrap_err();
    assert!(matches!(err.fault(), Some(Fault::MissingDescriptor(_))), "{err}");

    let mut b = ProgramBuilder::new();
    b.memory(Opcode::Load, b.temp_dst(0), &[b.resource(RegisterFile::Image, 0), b.input(0)], TextureTarget::Tex2D, 0);
    b.end();
    let mut m = machine(ShaderStage::Compute, build(b));
    assert_eq!(m.run(0), Err(VmError::MissingCapability("image")));
}
