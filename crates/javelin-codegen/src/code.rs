//! Instruction stream for one method body.
//!
//! [`CodeBuffer`] appends bytecode, tracks operand stack depth, and owns
//! the branch patching protocol: a forward branch returns a [`Patch`]
//! that must be resolved exactly once before [`CodeBuffer::finish`].
//! Protocol violations and out-of-range branch offsets are recorded and
//! reported by `finish` as [`CodegenError::Internal`].

use crate::constant_pool::ConstantPool;
use crate::error::{CodegenError, Result};
use crate::frame::StackMap;
use crate::opcodes::*;
use javelin_types::slot_width;

/// Placeholder left by a forward branch.
///
/// Deliberately neither `Clone` nor `Copy`: resolving consumes it.
#[derive(Debug)]
#[must_use = "a branch patch must be resolved before the method is finished"]
pub struct Patch {
    id: usize,
    /// Position of the branch opcode; offsets are relative to it
    opcode_offset: usize,
}

impl Patch {
    pub fn opcode_offset(&self) -> usize {
        self.opcode_offset
    }
}

/// Bytecode and stack requirement of a completed method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedCode {
    pub bytes: Vec<u8>,
    pub max_stack: u16,
    /// Verification frames; `None` for straight-line code
    pub stack_map: Option<StackMap>,
}

#[derive(Debug, Default)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
    stack: u16,
    max_stack: u16,
    /// One flag per issued patch
    resolved: Vec<bool>,
    last_op: Option<u8>,
    /// First patching fault, reported by `finish`
    fault: Option<String>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write offset.
    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn stack_depth(&self) -> u16 {
        self.stack
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    /// Reset the tracked depth at a join point.
    pub fn set_stack_depth(&mut self, depth: u16) {
        self.stack = depth;
        self.max_stack = self.max_stack.max(depth);
    }

    /// Whether the most recent instruction never falls through.
    pub fn ends_with_terminal(&self) -> bool {
        self.last_op.map_or(false, is_terminal)
    }

    fn push(&mut self, slots: u16) {
        self.stack += slots;
        self.max_stack = self.max_stack.max(self.stack);
    }

    fn pop(&mut self, slots: u16) {
        self.stack = self.stack.saturating_sub(slots);
    }

    fn op(&mut self, op: u8) {
        self.last_op = Some(op);
        self.bytes.push(op);
    }

    fn u1(&mut self, v: u8) {
        self.bytes.push(v);
    }

    fn u2(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    /// Emit an opcode with no operands and an explicit stack effect.
    pub fn simple(&mut self, op: u8, pops: u16, pushes: u16) {
        self.op(op);
        self.pop(pops);
        self.push(pushes);
    }

    // ---- constants ----

    pub fn aconst_null(&mut self) {
        self.simple(ACONST_NULL, 0, 1);
    }

    pub fn iconst(&mut self, pool: &mut ConstantPool, value: i32) {
        match value {
            -1..=5 => self.op((ICONST_0 as i32 + value) as u8),
            -128..=127 => {
                self.op(BIPUSH);
                self.u1(value as i8 as u8);
            }
            -32768..=32767 => {
                self.op(SIPUSH);
                self.u2(value as i16 as u16);
            }
            _ => {
                let index = pool.add_integer(value);
                self.ldc_index(index);
                return;
            }
        }
        self.push(1);
    }

    pub fn lconst(&mut self, pool: &mut ConstantPool, value: i64) {
        match value {
            0 | 1 => self.op(LCONST_0 + value as u8),
            _ => {
                let index = pool.add_long(value);
                self.op(LDC2_W);
                self.u2(index);
            }
        }
        self.push(2);
    }

    pub fn fconst(&mut self, pool: &mut ConstantPool, value: f32) {
        if value == 0.0 && value.is_sign_positive() || value == 1.0 || value == 2.0 {
            self.op(FCONST_0 + value as u8);
            self.push(1);
        } else {
            let index = pool.add_float(value);
            self.ldc_index(index);
        }
    }

    pub fn dconst(&mut self, pool: &mut ConstantPool, value: f64) {
        if value == 0.0 && value.is_sign_positive() || value == 1.0 {
            self.op(DCONST_0 + value as u8);
        } else {
            let index = pool.add_double(value);
            self.op(LDC2_W);
            self.u2(index);
        }
        self.push(2);
    }

    pub fn ldc_string(&mut self, pool: &mut ConstantPool, value: &str) {
        let index = pool.add_string(value);
        self.ldc_index(index);
    }

    /// `ldc`/`ldc_w` of a single-slot constant.
    fn ldc_index(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.op(LDC);
            self.u1(index as u8);
        } else {
            self.op(LDC_W);
            self.u2(index);
        }
        self.push(1);
    }

    // ---- locals ----

    fn local_op(&mut self, short_base: u8, long_op: u8, slot: u16) {
        if slot <= 3 {
            self.op(short_base + slot as u8);
        } else if slot <= u8::MAX as u16 {
            self.op(long_op);
            self.u1(slot as u8);
        } else {
            self.op(WIDE);
            self.u1(long_op);
            self.u2(slot);
            self.last_op = Some(long_op);
        }
    }

    /// Load a local of type `descriptor`.
    pub fn load(&mut self, descriptor: &str, slot: u16) {
        match descriptor {
            "Z" | "B" | "C" | "S" | "I" => self.local_op(ILOAD_0, ILOAD, slot),
            "J" => self.local_op(LLOAD_0, LLOAD, slot),
            "F" => self.local_op(FLOAD_0, FLOAD, slot),
            "D" => self.local_op(DLOAD_0, DLOAD, slot),
            _ => self.local_op(ALOAD_0, ALOAD, slot),
        }
        self.push(slot_width(descriptor));
    }

    /// Store the top of stack into a local of type `descriptor`.
    pub fn store(&mut self, descriptor: &str, slot: u16) {
        match descriptor {
            "Z" | "B" | "C" | "S" | "I" => self.local_op(ISTORE_0, ISTORE, slot),
            "J" => self.local_op(LSTORE_0, LSTORE, slot),
            "F" => self.local_op(FSTORE_0, FSTORE, slot),
            "D" => self.local_op(DSTORE_0, DSTORE, slot),
            _ => self.local_op(ASTORE_0, ASTORE, slot),
        }
        self.pop(slot_width(descriptor));
    }

    pub fn aload(&mut self, slot: u16) {
        self.load("L", slot);
    }

    pub fn astore(&mut self, slot: u16) {
        self.store("L", slot);
    }

    pub fn iload(&mut self, slot: u16) {
        self.load("I", slot);
    }

    pub fn istore(&mut self, slot: u16) {
        self.store("I", slot);
    }

    pub fn iinc(&mut self, slot: u16, delta: i16) {
        if slot <= u8::MAX as u16 && (-128..=127).contains(&delta) {
            self.op(IINC);
            self.u1(slot as u8);
            self.u1(delta as i8 as u8);
        } else {
            self.op(WIDE);
            self.u1(IINC);
            self.u2(slot);
            self.u2(delta as u16);
            self.last_op = Some(IINC);
        }
    }

    // ---- stack ----

    pub fn dup(&mut self) {
        self.simple(DUP, 0, 1);
    }

    pub fn dup_x1(&mut self) {
        self.simple(DUP_X1, 0, 1);
    }

    pub fn dup2_x1(&mut self) {
        self.simple(DUP2_X1, 0, 2);
    }

    /// Duplicate a value of type `descriptor` on top of the stack.
    pub fn dup_value(&mut self, descriptor: &str) {
        if slot_width(descriptor) == 2 {
            self.simple(DUP2, 0, 2);
        } else {
            self.dup();
        }
    }

    /// Discard a value of type `descriptor`; nothing for void.
    pub fn pop_value(&mut self, descriptor: &str) {
        match slot_width(descriptor) {
            0 => {}
            2 => self.simple(POP2, 2, 0),
            _ => self.simple(POP, 1, 0),
        }
    }

    // ---- objects, fields, calls ----

    pub fn new_object(&mut self, class_index: u16) {
        self.op(NEW);
        self.u2(class_index);
        self.push(1);
    }

    pub fn checkcast(&mut self, class_index: u16) {
        self.op(CHECKCAST);
        self.u2(class_index);
    }

    pub fn instanceof(&mut self, class_index: u16) {
        self.op(INSTANCEOF);
        self.u2(class_index);
    }

    pub fn getfield(&mut self, field_index: u16, descriptor: &str) {
        self.op(GETFIELD);
        self.u2(field_index);
        self.pop(1);
        self.push(slot_width(descriptor));
    }

    pub fn putfield(&mut self, field_index: u16, descriptor: &str) {
        self.op(PUTFIELD);
        self.u2(field_index);
        self.pop(1 + slot_width(descriptor));
    }

    pub fn getstatic(&mut self, field_index: u16, descriptor: &str) {
        self.op(GETSTATIC);
        self.u2(field_index);
        self.push(slot_width(descriptor));
    }

    pub fn putstatic(&mut self, field_index: u16, descriptor: &str) {
        self.op(PUTSTATIC);
        self.u2(field_index);
        self.pop(slot_width(descriptor));
    }

    /// `invokevirtual`/`invokespecial`/`invokestatic`. `arg_slots` excludes
    /// the receiver, which is popped for every opcode but `invokestatic`.
    pub fn invoke(&mut self, op: u8, method_index: u16, arg_slots: u16, ret_slots: u16) {
        self.op(op);
        self.u2(method_index);
        let receiver = if op == INVOKESTATIC { 0 } else { 1 };
        self.pop(arg_slots + receiver);
        self.push(ret_slots);
    }

    pub fn invokeinterface(&mut self, method_index: u16, arg_slots: u16, ret_slots: u16) {
        self.op(INVOKEINTERFACE);
        self.u2(method_index);
        self.u1((arg_slots + 1) as u8);
        self.u1(0);
        self.pop(arg_slots + 1);
        self.push(ret_slots);
    }

    // ---- control flow ----

    /// Typed return for a value of type `descriptor` (`V` for none).
    pub fn return_value(&mut self, descriptor: &str) {
        let op = match descriptor {
            "V" => RETURN,
            "Z" | "B" | "C" | "S" | "I" => IRETURN,
            "J" => LRETURN,
            "F" => FRETURN,
            "D" => DRETURN,
            _ => ARETURN,
        };
        self.simple(op, slot_width(descriptor), 0);
        self.stack = 0;
    }

    pub fn athrow(&mut self) {
        self.simple(ATHROW, 1, 0);
        self.stack = 0;
    }

    /// Emit a forward branch whose target is not known yet.
    pub fn branch(&mut self, op: u8) -> Patch {
        let opcode_offset = self.offset();
        self.op(op);
        self.u2(0);
        self.pop(branch_pops(op));

        let id = self.resolved.len();
        self.resolved.push(false);
        Patch { id, opcode_offset }
    }

    /// Point a patch at the current offset.
    pub fn resolve(&mut self, patch: Patch) {
        let target = self.offset();
        self.resolve_to(patch, target);
    }

    /// Point a patch at `target`. Resolving a patch twice, or a distance
    /// that does not fit in a signed 16-bit offset, makes `finish` fail.
    pub fn resolve_to(&mut self, patch: Patch, target: usize) {
        match self.resolved.get_mut(patch.id) {
            Some(done) if !*done => *done = true,
            _ => {
                self.record_fault(format!(
                    "branch patch at offset {} resolved twice",
                    patch.opcode_offset
                ));
                return;
            }
        }

        let delta = self.relative_offset(patch.opcode_offset, target);
        let at = patch.opcode_offset + 1;
        self.bytes[at..at + 2].copy_from_slice(&delta.to_be_bytes());

        // The current offset is now a jump target and reachable again
        if target == self.offset() {
            self.last_op = None;
        }
    }

    /// Emit a branch to an already emitted `target` (a loop head).
    pub fn branch_back(&mut self, op: u8, target: usize) {
        let opcode_offset = self.offset();
        let delta = self.relative_offset(opcode_offset, target);
        self.op(op);
        self.u2(delta as u16);
        self.pop(branch_pops(op));
    }

    pub fn goto_back(&mut self, target: usize) {
        self.branch_back(GOTO, target);
    }

    fn record_fault(&mut self, message: String) {
        log::debug!("code buffer fault: {}", message);
        self.fault.get_or_insert(message);
    }

    fn relative_offset(&mut self, opcode_offset: usize, target: usize) -> i16 {
        let delta = target as i64 - opcode_offset as i64;
        match i16::try_from(delta) {
            Ok(delta) => delta,
            Err(_) => {
                self.record_fault(format!(
                    "branch from offset {} to {} exceeds the 16-bit offset range",
                    opcode_offset, target
                ));
                0
            }
        }
    }

    /// Freeze the stream. Fails on a recorded patching fault or a branch
    /// patch that was never resolved.
    pub fn finish(self) -> Result<FinishedCode> {
        if let Some(fault) = self.fault {
            return Err(CodegenError::Internal(fault));
        }
        let pending: Vec<usize> = self
            .resolved
            .iter()
            .enumerate()
            .filter(|(_, done)| !**done)
            .map(|(id, _)| id)
            .collect();
        if !pending.is_empty() {
            return Err(CodegenError::Internal(format!(
                "{} unresolved branch patch(es) at finish: {:?}",
                pending.len(),
                pending
            )));
        }

        Ok(FinishedCode {
            bytes: self.bytes,
            max_stack: self.max_stack,
            stack_map: None,
        })
    }
}
