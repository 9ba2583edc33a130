//! Control-flow stack machine
//!
//! Structured control flow is executed by masking lanes rather than by
//! branching per lane. Five masks gate execution:
//!
//! ```text
//! exec = cond & loop & cont & switch & func
//! ```
//!
//! Every construct saves the masks it changes on a [`BoundedStack`] and the
//! matching closing instruction restores them. The composite `exec` mask is
//! recomputed after every change, so readers never see a stale value.
//!
//! A call records the depth of every other stack in a [`CallFrame`]; a return
//! unwinds each stack to exactly that depth, however deeply the callee was
//! nested when it returned.

use crate::channel::{lanes_where, Channel};
use crate::config::MachineLimits;
use crate::error::{ExecResult, Fault};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one of the control stacks in errors and depth reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackKind {
    Condition,
    Loop,
    Continue,
    LoopLabel,
    Switch,
    BreakType,
    Function,
    Call,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StackKind::Condition => "condition",
            StackKind::Loop => "loop",
            StackKind::Continue => "continue",
            StackKind::LoopLabel => "loop label",
            StackKind::Switch => "switch",
            StackKind::BreakType => "break type",
            StackKind::Function => "function",
            StackKind::Call => "call",
        };
        f.write_str(name)
    }
}

/// Fixed-capacity stack whose overflow and underflow are program faults
#[derive(Debug, Clone)]
pub(crate) struct BoundedStack<T> {
    items: Vec<T>,
    limit: usize,
    kind: StackKind,
}

impl<T: Copy> BoundedStack<T> {
    pub(crate) fn new(kind: StackKind, limit: usize) -> Self {
        Self {
            items: Vec::with_capacity(limit),
            limit,
            kind,
        }
    }

    pub(crate) fn push(&mut self, value: T) -> ExecResult<()> {
        if self.items.len() >= self.limit {
            return Err(Fault::StackOverflow {
                stack: self.kind,
                limit: self.limit,
            });
        }
        self.items.push(value);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> ExecResult<T> {
        self.items.pop().ok_or(Fault::StackUnderflow(self.kind))
    }

    pub(crate) fn top(&self) -> ExecResult<T> {
        self.items.last().copied().ok_or(Fault::StackUnderflow(self.kind))
    }

    pub(crate) fn depth(&self) -> usize {
        self.items.len()
    }

    /// Drop every entry above `depth` and return the entry at `depth`,
    /// leaving the stack `depth` entries deep
    pub(crate) fn unwind_to(&mut self, depth: usize) -> ExecResult<T> {
        if self.items.len() <= depth {
            return Err(Fault::StackUnderflow(self.kind));
        }
        self.items.truncate(depth + 1);
        self.pop()
    }

    pub(crate) fn truncate(&mut self, depth: usize) {
        self.items.truncate(depth);
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    fn check_empty(&self) -> ExecResult<()> {
        match self.items.len() {
            0 => Ok(()),
            depth => Err(Fault::UnbalancedStack { stack: self.kind, depth }),
        }
    }
}

/// Innermost construct a `BRK` leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BreakTarget {
    Loop,
    Switch,
}

/// State of the innermost switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SwitchFrame {
    pub(crate) selector: Channel,
    /// Lanes currently executing a case body
    pub(crate) mask: u8,
    /// Lanes claimed by some case so far
    pub(crate) default_mask: u8,
}

/// Stack depths recorded at a call, plus where to resume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallFrame {
    cond_depth: usize,
    loop_depth: usize,
    cont_depth: usize,
    label_depth: usize,
    switch_depth: usize,
    break_depth: usize,
    return_pc: usize,
}

/// What the run loop does after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Next,
    Jump(usize),
    Halt,
    Suspend,
}

/// Snapshot of every control stack's depth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDepths {
    pub condition: usize,
    pub loops: usize,
    pub continues: usize,
    pub loop_labels: usize,
    pub switches: usize,
    pub break_types: usize,
    pub functions: usize,
    pub calls: usize,
}

/// Execution masks and the stacks that save them
#[derive(Debug, Clone)]
pub(crate) struct ControlState {
    pub(crate) cond_mask: u8,
    pub(crate) loop_mask: u8,
    pub(crate) cont_mask: u8,
    pub(crate) func_mask: u8,
    pub(crate) switch: SwitchFrame,
    exec_mask: u8,
    break_target: BreakTarget,
    cond_stack: BoundedStack<u8>,
    loop_stack: BoundedStack<u8>,
    cont_stack: BoundedStack<u8>,
    loop_labels: BoundedStack<usize>,
    switch_stack: BoundedStack<SwitchFrame>,
    break_stack: BoundedStack<BreakTarget>,
    func_stack: BoundedStack<u8>,
    call_stack: BoundedStack<CallFrame>,
}

impl ControlState {
    pub(crate) fn new(limits: &MachineLimits) -> Self {
        Self {
            cond_mask: 0,
            loop_mask: 0,
            cont_mask: 0,
            func_mask: 0,
            switch: SwitchFrame {
                selector: Channel::ZERO,
                mask: 0,
                default_mask: 0,
            },
            exec_mask: 0,
            break_target: BreakTarget::Loop,
            cond_stack: BoundedStack::new(StackKind::Condition, limits.max_cond_nesting),
            loop_stack: BoundedStack::new(StackKind::Loop, limits.max_loop_nesting),
            cont_stack: BoundedStack::new(StackKind::Continue, limits.max_loop_nesting),
            loop_labels: BoundedStack::new(StackKind::LoopLabel, limits.max_loop_nesting),
            switch_stack: BoundedStack::new(StackKind::Switch, limits.max_switch_nesting),
            break_stack: BoundedStack::new(StackKind::BreakType, limits.break_stack_limit()),
            func_stack: BoundedStack::new(StackKind::Function, limits.max_call_nesting),
            call_stack: BoundedStack::new(StackKind::Call, limits.max_call_nesting),
        }
    }

    /// Enable `default_mask` lanes everywhere and empty every stack
    pub(crate) fn reset(&mut self, default_mask: u8) {
        self.cond_mask = default_mask;
        self.loop_mask = default_mask;
        self.cont_mask = default_mask;
        self.func_mask = default_mask;
        self.switch = SwitchFrame {
            selector: Channel::ZERO,
            mask: default_mask,
            default_mask: 0,
        };
        self.break_target = BreakTarget::Loop;
        self.clear_stacks();
        self.update();
    }

    fn clear_stacks(&mut self) {
        self.cond_stack.clear();
        self.loop_stack.clear();
        self.cont_stack.clear();
        self.loop_labels.clear();
        self.switch_stack.clear();
        self.break_stack.clear();
        self.func_stack.clear();
        self.call_stack.clear();
    }

    #[inline]
    fn update(&mut self) {
        self.exec_mask = self.cond_mask & self.loop_mask & self.cont_mask & self.switch.mask & self.func_mask;
    }

    #[inline]
    pub(crate) fn exec_mask(&self) -> u8 {
        self.exec_mask
    }

    pub(crate) fn depths(&self) -> StackDepths {
        StackDepths {
            condition: self.cond_stack.depth(),
            loops: self.loop_stack.depth(),
            continues: self.cont_stack.depth(),
            loop_labels: self.loop_labels.depth(),
            switches: self.switch_stack.depth(),
            break_types: self.break_stack.depth(),
            functions: self.func_stack.depth(),
            calls: self.call_stack.depth(),
        }
    }

    /// Every stack must be empty when the program ends
    pub(crate) fn check_balanced(&self) -> ExecResult<()> {
        self.cond_stack.check_empty()?;
        self.loop_stack.check_empty()?;
        self.cont_stack.check_empty()?;
        self.loop_labels.check_empty()?;
        self.switch_stack.check_empty()?;
        self.break_stack.check_empty()?;
        self.func_stack.check_empty()?;
        self.call_stack.check_empty()
    }

    // ============================================================================================
    // Conditionals
    // ============================================================================================

    /// `IF`/`UIF`: keep only lanes in `true_lanes`; skip to `else_label` if none remain
    pub(crate) fn if_(&mut self, true_lanes: u8, else_label: usize) -> ExecResult<Flow> {
        self.cond_stack.push(self.cond_mask)?;
        self.cond_mask &= true_lanes;
        self.update();
        Ok(if self.cond_mask == 0 {
            Flow::Jump(else_label)
        } else {
            Flow::Next
        })
    }

    pub(crate) fn else_(&mut self, endif_label: usize) -> ExecResult<Flow> {
        let outer = self.cond_stack.top()?;
        self.cond_mask = !self.cond_mask & outer;
        self.update();
        Ok(if self.cond_mask == 0 {
            Flow::Jump(endif_label)
        } else {
            Flow::Next
        })
    }

    pub(crate) fn endif(&mut self) -> ExecResult<()> {
        self.cond_mask = self.cond_stack.pop()?;
        self.update();
        Ok(())
    }

    // ============================================================================================
    // Loops
    // ============================================================================================

    /// `BGNLOOP` at `pc`
    pub(crate) fn bgnloop(&mut self, pc: usize) -> ExecResult<()> {
        self.loop_labels.push(pc)?;
        self.loop_stack.push(self.loop_mask)?;
        self.cont_stack.push(self.cont_mask)?;
        self.break_stack.push(self.break_target)?;
        self.break_target = BreakTarget::Loop;
        Ok(())
    }

    pub(crate) fn endloop(&mut self) -> ExecResult<Flow> {
        self.cont_mask = self.cont_stack.top()?;
        self.update();
        if self.exec_mask != 0 {
            return Ok(Flow::Jump(self.loop_labels.top()? + 1));
        }
        self.loop_labels.pop()?;
        self.loop_mask = self.loop_stack.pop()?;
        self.cont_mask = self.cont_stack.pop()?;
        self.break_target = self.break_stack.pop()?;
        self.update();
        Ok(Flow::Next)
    }

    pub(crate) fn brk(&mut self) {
        match self.break_target {
            BreakTarget::Loop => self.loop_mask &= !self.exec_mask,
            BreakTarget::Switch => self.switch.mask = 0,
        }
        self.update();
    }

    pub(crate) fn cont(&mut self) {
        self.cont_mask &= !self.exec_mask;
        self.update();
    }

    // ============================================================================================
    // Switch
    // ============================================================================================

    pub(crate) fn switch(&mut self, selector: Channel) -> ExecResult<()> {
        self.switch_stack.push(self.switch)?;
        self.switch = SwitchFrame {
            selector,
            mask: 0,
            default_mask: 0,
        };
        self.break_stack.push(self.break_target)?;
        self.break_target = BreakTarget::Switch;
        self.update();
        Ok(())
    }

    pub(crate) fn case(&mut self, value: &Channel) -> ExecResult<()> {
        let enclosing = self.switch_stack.top()?.mask;
        let selector = self.switch.selector;
        let matched = lanes_where(|lane| selector.u32(lane) == value.u32(lane));
        self.switch.default_mask |= matched;
        self.switch.mask |= matched & enclosing;
        self.update();
        Ok(())
    }

    /// Claims every lane no case matched; correct only as the last arm
    pub(crate) fn default(&mut self) -> ExecResult<()> {
        let enclosing = self.switch_stack.top()?.mask;
        self.switch.mask |= !self.switch.default_mask & enclosing;
        self.update();
        Ok(())
    }

    pub(crate) fn endswitch(&mut self) -> ExecResult<()> {
        self.switch = self.switch_stack.pop()?;
        self.break_target = self.break_stack.pop()?;
        self.update();
        Ok(())
    }

    // ============================================================================================
    // Subroutines
    // ============================================================================================

    /// `CAL`; skipped when no lane is active
    pub(crate) fn call(&mut self, return_pc: usize, target: usize) -> ExecResult<Flow> {
        if self.exec_mask == 0 {
            return Ok(Flow::Next);
        }
        self.call_stack.push(CallFrame {
            cond_depth: self.cond_stack.depth(),
            loop_depth: self.loop_stack.depth(),
            cont_depth: self.cont_stack.depth(),
            label_depth: self.loop_labels.depth(),
            switch_depth: self.switch_stack.depth(),
            break_depth: self.break_stack.depth(),
            return_pc,
        })?;
        self.cond_stack.push(self.cond_mask)?;
        self.loop_stack.push(self.loop_mask)?;
        self.cont_stack.push(self.cont_mask)?;
        self.switch_stack.push(self.switch)?;
        self.break_stack.push(self.break_target)?;
        self.func_stack.push(self.func_mask)?;
        Ok(Flow::Jump(target))
    }

    /// `RET`: retire the active lanes; return once none are left
    pub(crate) fn ret(&mut self) -> ExecResult<Flow> {
        self.func_mask &= !self.exec_mask;
        self.update();
        if self.func_mask != 0 {
            return Ok(Flow::Next);
        }
        if self.call_stack.depth() == 0 {
            // returning from the entry routine
            self.clear_stacks();
            return Ok(Flow::Halt);
        }
        self.unwind_call()
    }

    /// `ENDSUB`: a subroutine that ran off its end returns unconditionally
    pub(crate) fn endsub(&mut self) -> ExecResult<Flow> {
        self.unwind_call()
    }

    fn unwind_call(&mut self) -> ExecResult<Flow> {
        let frame = self.call_stack.pop()?;
        self.cond_mask = self.cond_stack.unwind_to(frame.cond_depth)?;
        self.loop_mask = self.loop_stack.unwind_to(frame.loop_depth)?;
        self.cont_mask = self.cont_stack.unwind_to(frame.cont_depth)?;
        self.loop_labels.truncate(frame.label_depth);
        self.switch = self.switch_stack.unwind_to(frame.switch_depth)?;
        self.break_target = self.break_stack.unwind_to(frame.break_depth)?;
        self.func_mask = self.func_stack.pop()?;
        self.update();
        Ok(Flow::Jump(frame.return_pc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ControlState {
        let mut state = ControlState::new(&MachineLimits::default());
        state.reset(0xf);
        state
    }

    #[test]
    fn test_bounded_stack_limits() {
        let mut stack = BoundedStack::new(StackKind::Switch, 2);
        stack.push(1u8).unwrap();
        stack.push(2u8).unwrap();
        assert_eq!(
            stack.push(3),
            Err(Fault::StackOverflow {
                stack: StackKind::Switch,
                limit: 2
            })
        );
        assert_eq!(stack.pop(), Ok(2));
        assert_eq!(stack.pop(), Ok(1));
        assert_eq!(stack.pop(), Err(Fault::StackUnderflow(StackKind::Switch)));
    }

    #[test]
    fn test_unwind_to_returns_saved_entry() {
        let mut stack = BoundedStack::new(StackKind::Condition, 8);
        for v in [10u8, 11, 12, 13] {
            stack.push(v).unwrap();
        }
        assert_eq!(stack.unwind_to(1), Ok(11));
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.unwind_to(1), Err(Fault::StackUnderflow(StackKind::Condition)));
    }

    #[test]
    fn test_if_else_endif_masks() {
        let mut s = state();
        assert_eq!(s.if_(0b0101, 9), Ok(Flow::Next));
        assert_eq!(s.exec_mask(), 0b0101);
        assert_eq!(s.else_(12), Ok(Flow::Next));
        assert_eq!(s.exec_mask(), 0b1010);
        s.endif().unwrap();
        assert_eq!(s.exec_mask(), 0xf);
        assert_eq!(s.depths(), StackDepths::default());
    }

    #[test]
    fn test_if_with_no_true_lane_jumps() {
        let mut s = state();
        assert_eq!(s.if_(0, 7), Ok(Flow::Jump(7)));
        assert_eq!(s.else_(9), Ok(Flow::Next));
        assert_eq!(s.exec_mask(), 0xf);
        s.endif().unwrap();
    }

    #[test]
    fn test_else_inside_disabled_branch_stays_disabled() {
        let mut s = state();
        s.if_(0b0011, 20).unwrap();
        // inner IF only sees lanes 0 and 1
        s.if_(0b1111, 10).unwrap();
        assert_eq!(s.else_(12), Ok(Flow::Jump(12)));
        s.endif().unwrap();
        assert_eq!(s.exec_mask(), 0b0011);
    }

    #[test]
    fn test_loop_break_and_continue() {
        let mut s = state();
        s.bgnloop(4).unwrap();
        s.cond_mask = 0b0011;
        s.update();
        s.brk();
        s.cond_mask = 0xf;
        s.update();
        assert_eq!(s.exec_mask(), 0b1100);
        s.cont();
        assert_eq!(s.exec_mask(), 0);
        // continue lanes come back at ENDLOOP; broken lanes do not
        assert_eq!(s.endloop(), Ok(Flow::Jump(5)));
        assert_eq!(s.exec_mask(), 0b1100);
        s.brk();
        assert_eq!(s.endloop(), Ok(Flow::Next));
        assert_eq!(s.exec_mask(), 0xf);
        assert_eq!(s.depths(), StackDepths::default());
    }

    #[test]
    fn test_switch_case_default() {
        let mut s = state();
        s.switch(Channel::from_u32([1, 2, 3, 3])).unwrap();
        assert_eq!(s.exec_mask(), 0);
        s.case(&Channel::splat_u32(1)).unwrap();
        assert_eq!(s.exec_mask(), 0b0001);
        s.brk();
        s.case(&Channel::splat_u32(2)).unwrap();
        assert_eq!(s.exec_mask(), 0b0010);
        s.brk();
        s.default().unwrap();
        assert_eq!(s.exec_mask(), 0b1100);
        s.brk();
        s.endswitch().unwrap();
        assert_eq!(s.exec_mask(), 0xf);
        assert_eq!(s.depths(), StackDepths::default());
    }

    #[test]
    fn test_call_return_unwinds_nested_state() {
        let mut s = state();
        s.if_(0b0110, 30).unwrap();
        assert_eq!(s.call(3, 40), Ok(Flow::Jump(40)));
        // callee: open a loop and an if, then return from inside them
        s.bgnloop(41).unwrap();
        s.if_(0xf, 50).unwrap();
        // lanes 0 and 3 never entered, so the function mask is not yet clear
        assert_eq!(s.ret(), Ok(Flow::Next));
        assert_eq!(s.exec_mask(), 0);
        assert_eq!(s.endsub(), Ok(Flow::Jump(3)));
        assert_eq!(s.exec_mask(), 0b0110);
        assert_eq!(
            s.depths(),
            StackDepths {
                condition: 1,
                ..StackDepths::default()
            }
        );
        s.endif().unwrap();
        s.check_balanced().unwrap();
    }

    #[test]
    fn test_call_skipped_without_active_lanes() {
        let mut s = state();
        s.if_(0, 5).unwrap();
        assert_eq!(s.call(2, 9), Ok(Flow::Next));
        assert_eq!(s.depths().calls, 0);
    }

    #[test]
    fn test_partial_ret_keeps_running() {
        let mut s = state();
        s.call(1, 10).unwrap();
        s.if_(0b0001, 20).unwrap();
        assert_eq!(s.ret(), Ok(Flow::Next));
        s.endif().unwrap();
        assert_eq!(s.exec_mask(), 0b1110);
        assert_eq!(s.ret(), Ok(Flow::Jump(1)));
        assert_eq!(s.exec_mask(), 0xf);
    }

    #[test]
    fn test_ret_from_entry_halts() {
        let mut s = state();
        s.bgnloop(0).unwrap();
        assert_eq!(s.ret(), Ok(Flow::Halt));
        s.check_balanced().unwrap();
    }

    #[test]
    fn test_unbalanced_stack_detected() {
        let mut s = state();
        s.if_(0xf, 1).unwrap();
        assert_eq!(
            s.check_balanced(),
            Err(Fault::UnbalancedStack {
                stack: StackKind::Condition,
                depth: 1
            })
        );
    }
}
