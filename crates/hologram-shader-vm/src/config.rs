//! Machine configuration
//!
//! Register-file capacities and nesting bounds are fixed when a machine is
//! built. Defaults match the limits Gallium drivers advertise for the TGSI
//! interpreter; embedders that want smaller machines can shrink them.
//!
//! ```rust
//! use hologram_shader_vm::{MachineConfig, ShaderStage};
//!
//! let config = MachineConfig::from_json(r#"{ "stage": "Compute" }"#).unwrap();
//! assert_eq!(config.stage, ShaderStage::Compute);
//! assert_eq!(config.limits.max_temps, 4096);
//! ```

use crate::error::{Result, VmError};
use serde::{Deserialize, Serialize};

/// Pipeline stage a program runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEval,
    Geometry,
    #[default]
    Fragment,
    Compute,
}

impl ShaderStage {
    /// Lanes enabled when a run starts
    pub fn default_lane_mask(self) -> u8 {
        match self {
            // one primitive per invocation
            ShaderStage::Geometry => 0x1,
            _ => 0xf,
        }
    }
}

/// Capacities of register files and control stacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineLimits {
    pub max_temps: usize,
    pub max_inputs: usize,
    pub max_outputs: usize,
    pub max_addrs: usize,
    pub max_system_values: usize,
    pub max_constant_buffers: usize,
    pub max_immediates: usize,
    pub max_samplers: usize,
    /// Input vertices per primitive in a geometry program
    pub max_prim_vertices: usize,
    /// Output vertices across all geometry invocations
    pub max_total_vertices: usize,
    pub vertex_streams: usize,
    pub max_cond_nesting: usize,
    pub max_loop_nesting: usize,
    pub max_switch_nesting: usize,
    pub max_call_nesting: usize,
}

impl MachineLimits {
    /// Break-type entries are pushed by both loops and switches
    pub fn break_stack_limit(&self) -> usize {
        self.max_loop_nesting + self.max_switch_nesting
    }
}

impl Default for MachineLimits {
    fn default() -> Self {
        Self {
            max_temps: 4096,
            max_inputs: 80,
            max_outputs: 80,
            max_addrs: 3,
            max_system_values: 32,
            max_constant_buffers: 32,
            max_immediates: 4096,
            max_samplers: 128,
            max_prim_vertices: 6,
            max_total_vertices: 4096,
            vertex_streams: 4,
            max_cond_nesting: 32,
            max_loop_nesting: 32,
            max_switch_nesting: 32,
            max_call_nesting: 32,
        }
    }
}

/// Machine configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub stage: ShaderStage,
    pub limits: MachineLimits,
    /// Interpolate color inputs as constants
    pub flatshade: bool,
}

impl MachineConfig {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    /// Parse a JSON document; absent fields take their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| VmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| VmError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let l = &self.limits;
        let required = [
            ("max_temps", l.max_temps),
            ("max_addrs", l.max_addrs),
            ("max_cond_nesting", l.max_cond_nesting),
            ("max_loop_nesting", l.max_loop_nesting),
            ("max_switch_nesting", l.max_switch_nesting),
            ("max_call_nesting", l.max_call_nesting),
            ("max_prim_vertices", l.max_prim_vertices),
            ("vertex_streams", l.vertex_streams),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| *v == 0) {
            return Err(VmError::Config(format!("{name} must be nonzero")));
        }
        if self.stage == ShaderStage::Geometry && l.max_total_vertices < l.max_outputs {
            return Err(VmError::Config(format!(
                "max_total_vertices ({}) cannot hold one vertex of {} outputs",
                l.max_total_vertices, l.max_outputs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MachineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.stage, ShaderStage::Fragment);
        assert_eq!(config.limits.break_stack_limit(), 64);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = MachineConfig::new(ShaderStage::Geometry);
        config.limits.max_temps = 64;
        config.flatshade = true;
        let text = config.to_json().unwrap();
        assert_eq!(MachineConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MachineConfig::from_json(r#"{ "limits": { "max_temps": 16 } }"#).unwrap();
        assert_eq!(config.limits.max_temps, 16);
        assert_eq!(config.limits.max_inputs, 80);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = MachineConfig::from_json(r#"{ "limits": { "max_call_nesting": 0 } }"#).unwrap_err();
        assert_eq!(err, VmError::Config("max_call_nesting must be nonzero".into()));
        assert!(MachineConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_geometry_default_mask() {
        assert_eq!(ShaderStage::Geometry.default_lane_mask(), 0x1);
        assert_eq!(ShaderStage::Compute.default_lane_mask(), 0xf);
    }
}
