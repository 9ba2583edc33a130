//! Geometry output: `EMIT` and `ENDPRIM`
//!
//! Each emitted vertex advances the output vertex offset by the number of
//! declared outputs, so output writes after an `EMIT` land in the next
//! vertex's registers.

use super::Machine;
use crate::config::MachineLimits;
use crate::error::{ExecResult, Fault};
use crate::isa::{Instruction, CHAN_X};
use serde::{Deserialize, Serialize};

/// A finished primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Primitive {
    pub vertex_count: u32,
    /// Output register index of the first vertex
    pub first_output: usize,
}

#[derive(Debug, Clone)]
struct Stream {
    /// Vertex count per primitive; the last entry is the open primitive
    vertex_counts: Vec<u32>,
    offsets: Vec<usize>,
}

impl Stream {
    fn new() -> Self {
        Self {
            vertex_counts: vec![0],
            offsets: vec![0],
        }
    }

    fn open_count(&self) -> u32 {
        self.vertex_counts.last().copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub(super) struct GeometryState {
    pub(super) output_vertex_offset: usize,
    pub(super) num_outputs: usize,
    max_output_vertices: usize,
    streams: Vec<Stream>,
}

impl GeometryState {
    pub(super) fn new(limits: &MachineLimits) -> Self {
        Self {
            output_vertex_offset: 0,
            num_outputs: 0,
            max_output_vertices: limits.max_total_vertices,
            streams: vec![Stream::new(); limits.vertex_streams],
        }
    }

    pub(super) fn configure(&mut self, num_outputs: usize, max_output_vertices: usize) {
        self.num_outputs = num_outputs;
        self.max_output_vertices = max_output_vertices;
    }

    pub(super) fn reset(&mut self) {
        self.output_vertex_offset = 0;
        self.streams.fill(Stream::new());
    }

    pub(super) fn primitives(&self, stream: usize) -> Vec<Primitive> {
        let Some(stream) = self.streams.get(stream) else {
            return Vec::new();
        };
        let closed = stream.vertex_counts.len().saturating_sub(1);
        stream.vertex_counts[..closed]
            .iter()
            .zip(&stream.offsets)
            .map(|(&vertex_count, &first_output)| Primitive {
                vertex_count,
                first_output,
            })
            .collect()
    }

    fn stream_mut(&mut self, stream: u32) -> ExecResult<&mut Stream> {
        let streams = self.streams.len();
        self.streams
            .get_mut(stream as usize)
            .ok_or(Fault::BadStream { stream, streams })
    }

    fn emit_vertex(&mut self, stream: u32) -> ExecResult<()> {
        let (max, num_outputs, offset) = (self.max_output_vertices, self.num_outputs, self.output_vertex_offset);
        let s = self.stream_mut(stream)?;
        let count = s.open_count();
        if count as usize >= max {
            return Ok(());
        }
        if count == 0 {
            if let Some(start) = s.offsets.last_mut() {
                *start = offset;
            }
        }
        if let Some(open) = s.vertex_counts.last_mut() {
            *open += 1;
        }
        self.output_vertex_offset += num_outputs;
        Ok(())
    }

    fn end_primitive(&mut self, stream: u32) -> ExecResult<()> {
        let s = self.stream_mut(stream)?;
        s.vertex_counts.push(0);
        s.offsets.push(0);
        Ok(())
    }
}

impl Machine {
    fn stream_operand(&self, inst: &Instruction) -> ExecResult<u32> {
        if inst.src.is_empty() {
            return Ok(0);
        }
        Ok(self.fetch_scalar_i32(inst, 0, CHAN_X)? as u32)
    }

    pub(super) fn exec_emit(&mut self, inst: &Instruction) -> ExecResult<()> {
        let stream = self.stream_operand(inst)?;
        if self.control.exec_mask() != 0 {
            self.geometry.emit_vertex(stream)?;
        }
        Ok(())
    }

    pub(super) fn exec_endprim(&mut self, inst: &Instruction) -> ExecResult<()> {
        let stream = self.stream_operand(inst)?;
        if self.control.exec_mask() != 0 {
            self.geometry.end_primitive(stream)?;
        }
        Ok(())
    }

    /// `END` closes a stream 0 primitive left open
    pub(super) fn close_open_primitive(&mut self) -> ExecResult<()> {
        if self.config.stage != crate::config::ShaderStage::Geometry {
            return Ok(());
        }
        if self.geometry.stream_mut(0)?.open_count() > 0 {
            self.geometry.end_primitive(0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GeometryState {
        let mut state = GeometryState::new(&MachineLimits::default());
        state.configure(2, 3);
        state
    }

    #[test]
    fn test_emit_advances_offset() {
        let mut g = state();
        g.emit_vertex(0).unwrap();
        g.emit_vertex(0).unwrap();
        assert_eq!(g.output_vertex_offset, 4);
        g.end_primitive(0).unwrap();
        assert_eq!(
            g.primitives(0),
            vec![Primitive {
                vertex_count: 2,
                first_output: 0
            }]
        );
    }

    #[test]
    fn test_vertex_budget_caps_primitive() {
        let mut g = state();
        for _ in 0..5 {
            g.emit_vertex(0).unwrap();
        }
        assert_eq!(g.output_vertex_offset, 6);
        g.end_primitive(0).unwrap();
        g.emit_vertex(0).unwrap();
        g.end_primitive(0).unwrap();
        let prims = g.primitives(0);
        assert_eq!(prims[0].vertex_count, 3);
        assert_eq!(prims[1], Primitive {
            vertex_count: 1,
            first_output: 6
        });
    }

    #[test]
    fn test_bad_stream() {
        let mut g = state();
        assert_eq!(g.emit_vertex(4), Err(Fault::BadStream { stream: 4, streams: 4 }));
        assert!(g.primitives(9).is_empty());
    }
}
