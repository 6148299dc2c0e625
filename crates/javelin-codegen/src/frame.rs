//! Verification frames for the `StackMapTable` attribute.
//!
//! From classfile version 50 on, the verifier expects the types of every
//! local and operand stack slot at each branch target and after each
//! unconditional jump. They are computed from the finished bytecode: a
//! worklist pass simulates every instruction and merges the states flowing
//! into each offset, the same inference the JVM's old verifier performed.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use javelin_types::{class, internal_name_of, MethodDescriptor};

use crate::code::FinishedCode;
use crate::constant_pool::{Constant, ConstantPool};
use crate::error::{CodegenError, Result};
use crate::opcodes::*;
use crate::registry::TypeRegistry;

/// `verification_type_info`. References are held by internal name and
/// interned into the constant pool when the table is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(String),
    /// Result of the `new` at this offset, before its constructor has run
    Uninitialized(u16),
}

impl VerificationType {
    pub fn object(internal_name: &str) -> Self {
        VerificationType::Object(internal_name.to_string())
    }

    /// Type of a value with field descriptor `descriptor`.
    pub fn from_descriptor(descriptor: &str) -> Self {
        match descriptor.as_bytes().first() {
            Some(b'Z' | b'B' | b'C' | b'S' | b'I') => VerificationType::Integer,
            Some(b'J') => VerificationType::Long,
            Some(b'F') => VerificationType::Float,
            Some(b'D') => VerificationType::Double,
            _ => internal_name_of(descriptor).map_or(VerificationType::Top, VerificationType::object),
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, VerificationType::Long | VerificationType::Double)
    }

    fn is_reference(&self) -> bool {
        matches!(
            self,
            VerificationType::Object(_)
                | VerificationType::Null
                | VerificationType::UninitializedThis
                | VerificationType::Uninitialized(_)
        )
    }

    fn slots(&self) -> u16 {
        if self.is_wide() {
            2
        } else {
            1
        }
    }

    fn write(&self, pool: &mut ConstantPool, out: &mut Vec<u8>) {
        match self {
            VerificationType::Top => out.push(0),
            VerificationType::Integer => out.push(1),
            VerificationType::Float => out.push(2),
            VerificationType::Double => out.push(3),
            VerificationType::Long => out.push(4),
            VerificationType::Null => out.push(5),
            VerificationType::UninitializedThis => out.push(6),
            VerificationType::Object(name) => {
                out.push(7);
                u2(out, pool.add_class(name));
            }
            VerificationType::Uninitialized(offset) => {
                out.push(8);
                u2(out, *offset);
            }
        }
    }
}

/// Locals and operand stack at one offset, one entry per slot: the second
/// slot of a `long` or `double` holds `Top`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

impl Frame {
    fn push(&mut self, value: VerificationType) {
        let wide = value.is_wide();
        self.stack.push(value);
        if wide {
            self.stack.push(VerificationType::Top);
        }
    }

    fn pop(&mut self, slots: u16) -> Result<()> {
        let slots = slots as usize;
        if self.stack.len() < slots {
            return Err(underflow());
        }
        self.stack.truncate(self.stack.len() - slots);
        Ok(())
    }

    /// Pop one slot.
    fn pop_one(&mut self) -> Result<VerificationType> {
        self.stack.pop().ok_or_else(underflow)
    }

    fn local(&self, slot: usize) -> VerificationType {
        self.locals.get(slot).cloned().unwrap_or(VerificationType::Top)
    }

    fn set_local(&mut self, slot: usize, value: VerificationType) {
        let end = slot + value.slots() as usize;
        if self.locals.len() < end {
            self.locals.resize(end, VerificationType::Top);
        }
        // Overwriting the upper half of a wide value kills it
        if slot > 0 && self.locals[slot - 1].is_wide() {
            self.locals[slot - 1] = VerificationType::Top;
        }
        if value.is_wide() {
            self.locals[slot + 1] = VerificationType::Top;
        }
        self.locals[slot] = value;
    }

    /// `kind` is the offset of the opcode within the `iload`..`aload` family.
    fn load(&mut self, kind: u8, slot: usize) {
        let value = match kind {
            0 => VerificationType::Integer,
            1 => VerificationType::Long,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            _ => match self.local(slot) {
                local if local.is_reference() => local,
                _ => VerificationType::object(class::OBJECT),
            },
        };
        self.push(value);
    }

    fn store(&mut self, kind: u8, slot: usize) -> Result<()> {
        let value = match kind {
            0..=3 => {
                let value = numeric(kind);
                self.pop(value.slots())?;
                value
            }
            _ => self.pop_one()?,
        };
        self.set_local(slot, value);
        Ok(())
    }

    /// Replace every copy of an uninitialized value once its constructor
    /// has run.
    fn initialize(&mut self, from: &VerificationType, to: &VerificationType) {
        for slot in self.locals.iter_mut().chain(self.stack.iter_mut()) {
            if slot == from {
                *slot = to.clone();
            }
        }
    }
}

/// Frames of one method body, ready to be encoded as a `StackMapTable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMap {
    /// Locals implied by the method descriptor
    pub initial_locals: Vec<VerificationType>,
    /// `(offset, frame)` in ascending offset order
    pub frames: Vec<(u16, Frame)>,
}

impl StackMap {
    pub fn frame_at(&self, offset: u16) -> Option<&Frame> {
        self.frames
            .iter()
            .find(|(at, _)| *at == offset)
            .map(|(_, frame)| frame)
    }

    /// The attribute body: `number_of_entries`, then each frame in its
    /// most compact form relative to the one before it.
    pub fn encode(&self, pool: &mut ConstantPool) -> Vec<u8> {
        let mut out = Vec::new();
        u2(&mut out, self.frames.len() as u16);

        let mut previous_locals = compact(&self.initial_locals, true);
        let mut previous_offset: Option<u16> = None;
        for (offset, frame) in &self.frames {
            let delta = match previous_offset {
                Some(previous) => offset - previous - 1,
                None => *offset,
            };
            let locals = compact(&frame.locals, true);
            let stack = compact(&frame.stack, false);
            write_frame(pool, &mut out, delta, &previous_locals, &locals, &stack);
            previous_locals = locals;
            previous_offset = Some(*offset);
        }
        out
    }
}

/// One entry per value: the upper half of wide values is implicit, and
/// trailing `Top` locals are left out.
fn compact(slots: &[VerificationType], trim: bool) -> Vec<VerificationType> {
    let mut out = Vec::with_capacity(slots.len());
    let mut iter = slots.iter();
    while let Some(slot) = iter.next() {
        out.push(slot.clone());
        if slot.is_wide() {
            iter.next();
        }
    }
    if trim {
        while out.last() == Some(&VerificationType::Top) {
            out.pop();
        }
    }
    out
}

fn write_frame(
    pool: &mut ConstantPool,
    out: &mut Vec<u8>,
    delta: u16,
    previous: &[VerificationType],
    locals: &[VerificationType],
    stack: &[VerificationType],
) {
    let same_locals = locals == previous;
    match stack {
        [] if same_locals => {
            if delta <= 63 {
                out.push(delta as u8);
            } else {
                out.push(251);
                u2(out, delta);
            }
        }
        [item] if same_locals => {
            if delta <= 63 {
                out.push(64 + delta as u8);
            } else {
                out.push(247);
                u2(out, delta);
            }
            item.write(pool, out);
        }
        [] if locals.len() > previous.len() && locals.len() - previous.len() <= 3 && locals.starts_with(previous) => {
            let added = &locals[previous.len()..];
            out.push(251 + added.len() as u8);
            u2(out, delta);
            for local in added {
                local.write(pool, out);
            }
        }
        [] if previous.len() > locals.len() && previous.len() - locals.len() <= 3 && previous.starts_with(locals) => {
            out.push(251 - (previous.len() - locals.len()) as u8);
            u2(out, delta);
        }
        _ => {
            out.push(255);
            u2(out, delta);
            u2(out, locals.len() as u16);
            for local in locals {
                local.write(pool, out);
            }
            u2(out, stack.len() as u16);
            for item in stack {
                item.write(pool, out);
            }
        }
    }
}

/// The method a body belongs to.
#[derive(Debug, Clone, Copy)]
pub struct MethodShape<'a> {
    pub class_name: &'a str,
    pub descriptor: &'a str,
    pub is_static: bool,
    /// `<init>`: slot 0 stays uninitialized until the super constructor runs
    pub is_constructor: bool,
}

impl MethodShape<'_> {
    fn initial_frame(&self) -> Result<Frame> {
        let md = MethodDescriptor::parse(self.descriptor)?;
        let mut frame = Frame::default();
        if !self.is_static {
            let this = if self.is_constructor {
                VerificationType::UninitializedThis
            } else {
                VerificationType::object(self.class_name)
            };
            frame.set_local(0, this);
        }
        for param in &md.params {
            let slot = frame.locals.len();
            frame.set_local(slot, VerificationType::from_descriptor(param));
        }
        Ok(frame)
    }
}

/// Compute the frames of `code` and attach them as its stack map.
///
/// Unreachable runs of instructions are overwritten with `nop`s ending in
/// `athrow`; they verify against a frame holding only a `Throwable`.
pub fn compute(
    code: &mut FinishedCode,
    shape: &MethodShape<'_>,
    pool: &ConstantPool,
    registry: &TypeRegistry,
) -> Result<()> {
    if code.bytes.is_empty() {
        code.stack_map = None;
        return Ok(());
    }
    let initial = shape.initial_frame()?;
    let initial_locals = initial.locals.clone();
    let starts = decode(&code.bytes)?;

    let analyzer = Analyzer {
        bytes: &code.bytes,
        starts: starts.iter().copied().collect(),
        pool,
        registry,
        class_name: shape.class_name,
    };
    let states = analyzer.run(initial)?;

    let mut offsets = BTreeSet::new();
    for &at in states.keys() {
        let op = code.bytes[at];
        if is_branch(op) {
            offsets.extend(jump_target(&code.bytes, at));
        }
        let next = at + instruction_length(&code.bytes, at);
        if is_terminal(op) && next < code.bytes.len() {
            offsets.insert(next);
        }
    }

    let dead = unreachable_runs(&starts, &states, code.bytes.len());
    for &(start, end) in &dead {
        log::trace!("unreachable code at {}..{}", start, end);
        for byte in &mut code.bytes[start..end - 1] {
            *byte = NOP;
        }
        code.bytes[end - 1] = ATHROW;
        offsets.insert(start);
    }
    if !dead.is_empty() {
        code.max_stack = code.max_stack.max(1);
    }

    let frames: Vec<(u16, Frame)> = offsets
        .into_iter()
        .map(|at| {
            let frame = states.get(&at).cloned().unwrap_or_else(|| Frame {
                locals: Vec::new(),
                stack: vec![VerificationType::object(class::THROWABLE)],
            });
            (at as u16, frame)
        })
        .collect();
    log::trace!("{} stack map frame(s) for {}", frames.len(), shape.descriptor);

    code.stack_map = if frames.is_empty() {
        None
    } else {
        Some(StackMap { initial_locals, frames })
    };
    Ok(())
}

/// Offset of every instruction.
fn decode(bytes: &[u8]) -> Result<Vec<usize>> {
    let mut starts = Vec::new();
    let mut at = 0;
    while at < bytes.len() {
        starts.push(at);
        at += instruction_length(bytes, at);
    }
    if at != bytes.len() {
        return Err(CodegenError::Internal(format!(
            "truncated instruction at offset {}",
            starts.last().copied().unwrap_or(0)
        )));
    }
    Ok(starts)
}

/// Maximal `[start, end)` runs of instructions no state reached.
fn unreachable_runs(starts: &[usize], states: &BTreeMap<usize, Frame>, len: usize) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut open = None;
    for &at in starts {
        match (states.contains_key(&at), open) {
            (false, None) => open = Some(at),
            (true, Some(start)) => {
                runs.push((start, at));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        runs.push((start, len));
    }
    runs
}

fn jump_target(bytes: &[u8], at: usize) -> Option<usize> {
    let delta = i16::from_be_bytes([bytes[at + 1], bytes[at + 2]]);
    at.checked_add_signed(delta as isize)
}

struct Analyzer<'a> {
    bytes: &'a [u8],
    starts: BTreeSet<usize>,
    pool: &'a ConstantPool,
    registry: &'a TypeRegistry,
    class_name: &'a str,
}

impl<'a> Analyzer<'a> {
    /// Entry state of every reachable instruction.
    fn run(&self, initial: Frame) -> Result<BTreeMap<usize, Frame>> {
        let mut states = BTreeMap::new();
        let mut worklist = VecDeque::new();
        states.insert(0, initial);
        worklist.push_back(0);

        while let Some(at) = worklist.pop_front() {
            let mut frame = match states.get(&at) {
                Some(frame) => frame.clone(),
                None => continue,
            };
            let op = self.bytes[at];
            self.execute(at, &mut frame).map_err(|e| at_offset(e, at))?;

            let mut successors = Vec::with_capacity(2);
            if is_branch(op) {
                successors.push(jump_target(self.bytes, at));
            }
            if !is_terminal(op) {
                successors.push(Some(at + instruction_length(self.bytes, at)));
            }
            for next in successors {
                let next = match next {
                    Some(next) if self.starts.contains(&next) => next,
                    _ => {
                        return Err(CodegenError::Internal(format!(
                            "control flow from offset {} leaves the code",
                            at
                        )))
                    }
                };
                let changed = match states.get_mut(&next) {
                    Some(existing) => self.merge(existing, &frame).map_err(|e| at_offset(e, next))?,
                    None => {
                        states.insert(next, frame.clone());
                        true
                    }
                };
                if changed && !worklist.contains(&next) {
                    worklist.push_back(next);
                }
            }
        }
        Ok(states)
    }

    /// Merge `incoming` into `into`; whether anything changed.
    fn merge(&self, into: &mut Frame, incoming: &Frame) -> Result<bool> {
        if into.stack.len() != incoming.stack.len() {
            return Err(CodegenError::Internal(format!(
                "operand stacks of height {} and {} meet",
                into.stack.len(),
                incoming.stack.len()
            )));
        }
        if into.locals.len() < incoming.locals.len() {
            into.locals.resize(incoming.locals.len(), VerificationType::Top);
        }

        let mut changed = false;
        for (i, slot) in into.locals.iter_mut().enumerate() {
            let other = incoming.locals.get(i).unwrap_or(&VerificationType::Top);
            changed |= self.merge_slot(slot, other);
        }
        for (slot, other) in into.stack.iter_mut().zip(&incoming.stack) {
            changed |= self.merge_slot(slot, other);
        }
        Ok(changed)
    }

    fn merge_slot(&self, slot: &mut VerificationType, other: &VerificationType) -> bool {
        let merged = match (&*slot, other) {
            (a, b) if a == b => return false,
            (VerificationType::Object(_), VerificationType::Null) => return false,
            (VerificationType::Null, VerificationType::Object(_)) => other.clone(),
            (VerificationType::Object(a), VerificationType::Object(b)) => {
                VerificationType::Object(self.common_superclass(a, b))
            }
            _ => VerificationType::Top,
        };
        if merged == *slot {
            return false;
        }
        *slot = merged;
        true
    }

    /// Nearest shared superclass, as far as the hierarchy is known.
    /// Interfaces and arrays meet at `Object`, which the verifier accepts
    /// wherever an interface is expected.
    fn common_superclass(&self, a: &str, b: &str) -> String {
        if a.starts_with('[') || b.starts_with('[') {
            return class::OBJECT.to_string();
        }
        let ancestors = self.ancestors(a);
        self.ancestors(b)
            .into_iter()
            .find(|candidate| ancestors.contains(candidate))
            .unwrap_or_else(|| class::OBJECT.to_string())
    }

    fn ancestors(&self, name: &str) -> Vec<String> {
        let mut chain = vec![name.to_string()];
        while let Some(parent) = chain.last().and_then(|c| self.superclass_of(c)) {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
        }
        chain
    }

    fn superclass_of(&self, name: &str) -> Option<String> {
        if let Some(info) = self.registry.resolve_internal(name) {
            if info.is_interface {
                return None;
            }
            if let Some(parent) = info.superclass() {
                return Some(parent.to_string());
            }
        }
        library_superclass(name).map(str::to_string)
    }

    fn execute(&self, at: usize, frame: &mut Frame) -> Result<()> {
        let bytes = self.bytes;
        let op = bytes[at];
        let u1 = |i: usize| bytes[at + i];
        let u2 = |i: usize| u16::from_be_bytes([bytes[at + i], bytes[at + i + 1]]);

        match op {
            NOP | IINC | GOTO => {}
            ACONST_NULL => frame.push(VerificationType::Null),
            BIPUSH | SIPUSH => frame.push(VerificationType::Integer),
            _ if (ICONST_M1..LCONST_0).contains(&op) => frame.push(VerificationType::Integer),
            _ if (LCONST_0..FCONST_0).contains(&op) => frame.push(VerificationType::Long),
            _ if (FCONST_0..DCONST_0).contains(&op) => frame.push(VerificationType::Float),
            _ if (DCONST_0..BIPUSH).contains(&op) => frame.push(VerificationType::Double),
            LDC => frame.push(self.constant_type(u1(1) as u16)?),
            LDC_W | LDC2_W => frame.push(self.constant_type(u2(1))?),

            ILOAD..=ALOAD => frame.load(op - ILOAD, u1(1) as usize),
            _ if (ILOAD_0..IALOAD).contains(&op) => {
                let form = op - ILOAD_0;
                frame.load(form / 4, (form % 4) as usize);
            }
            IALOAD | BALOAD | CALOAD | SALOAD => {
                frame.pop(2)?;
                frame.push(VerificationType::Integer);
            }
            LALOAD | FALOAD | DALOAD => {
                frame.pop(2)?;
                frame.push(numeric(op - IALOAD));
            }
            AALOAD => {
                frame.pop(1)?;
                let array = frame.pop_one()?;
                frame.push(element_type(&array));
            }

            ISTORE..=ASTORE => frame.store(op - ISTORE, u1(1) as usize)?,
            _ if (ISTORE_0..=ASTORE_0 + 3).contains(&op) => {
                let form = op - ISTORE_0;
                frame.store(form / 4, (form % 4) as usize)?;
            }

            POP => frame.pop(1)?,
            POP2 => frame.pop(2)?,
            DUP => {
                let value = frame.pop_one()?;
                frame.stack.extend([value.clone(), value]);
            }
            DUP_X1 => {
                let v1 = frame.pop_one()?;
                let v2 = frame.pop_one()?;
                frame.stack.extend([v1.clone(), v2, v1]);
            }
            DUP2 => {
                let v1 = frame.pop_one()?;
                let v2 = frame.pop_one()?;
                frame.stack.extend([v2.clone(), v1.clone(), v2, v1]);
            }
            DUP2_X1 => {
                let v1 = frame.pop_one()?;
                let v2 = frame.pop_one()?;
                let v3 = frame.pop_one()?;
                frame.stack.extend([v2.clone(), v1.clone(), v3, v2, v1]);
            }

            _ if (IADD..INEG).contains(&op) => {
                let value = numeric((op - IADD) % 4);
                frame.pop(2 * value.slots())?;
                frame.push(value);
            }
            _ if (INEG..ISHL).contains(&op) => {
                let value = numeric((op - INEG) % 4);
                frame.pop(value.slots())?;
                frame.push(value);
            }
            _ if (ISHL..IAND).contains(&op) => {
                // The shift distance is always an int
                let long = (op - ISHL) % 2 == 1;
                frame.pop(if long { 3 } else { 2 })?;
                frame.push(if long { VerificationType::Long } else { VerificationType::Integer });
            }
            _ if (IAND..IINC).contains(&op) => {
                let long = (op - IAND) % 2 == 1;
                frame.pop(if long { 4 } else { 2 })?;
                frame.push(if long { VerificationType::Long } else { VerificationType::Integer });
            }

            I2L | I2F | I2D | F2I | F2L | F2D | I2B | I2C | I2S => {
                frame.pop(1)?;
                frame.push(conversion_result(op));
            }
            L2I | L2F | L2D | D2I | D2L | D2F => {
                frame.pop(2)?;
                frame.push(conversion_result(op));
            }
            LCMP | DCMPL | DCMPG => {
                frame.pop(4)?;
                frame.push(VerificationType::Integer);
            }
            FCMPL | FCMPG => {
                frame.pop(2)?;
                frame.push(VerificationType::Integer);
            }
            _ if is_branch(op) => frame.pop(branch_pops(op))?,

            IRETURN | FRETURN | ARETURN | ATHROW => frame.pop(1)?,
            LRETURN | DRETURN => frame.pop(2)?,
            RETURN => {}

            GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD => {
                let (_, _, descriptor) = self.member(u2(1))?;
                let value = VerificationType::from_descriptor(descriptor);
                match op {
                    GETSTATIC => frame.push(value),
                    PUTSTATIC => frame.pop(value.slots())?,
                    GETFIELD => {
                        frame.pop(1)?;
                        frame.push(value);
                    }
                    _ => frame.pop(value.slots() + 1)?,
                }
            }
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
                let (_, name, descriptor) = self.member(u2(1))?;
                let md = MethodDescriptor::parse(descriptor)?;
                frame.pop(md.arg_slots())?;
                if op != INVOKESTATIC {
                    let receiver = frame.pop_one()?;
                    if op == INVOKESPECIAL && name == "<init>" {
                        self.initialize(frame, &receiver)?;
                    }
                }
                if md.ret != "V" {
                    frame.push(VerificationType::from_descriptor(&md.ret));
                }
            }

            NEW => frame.push(VerificationType::Uninitialized(at as u16)),
            ARRAYLENGTH | INSTANCEOF => {
                frame.pop(1)?;
                frame.push(VerificationType::Integer);
            }
            CHECKCAST => {
                frame.pop(1)?;
                frame.push(VerificationType::object(self.class(u2(1))?));
            }
            WIDE => {
                let inner = u1(1);
                let slot = u2(2) as usize;
                match inner {
                    IINC => {}
                    ILOAD..=ALOAD => frame.load(inner - ILOAD, slot),
                    ISTORE..=ASTORE => frame.store(inner - ISTORE, slot)?,
                    _ => return Err(unsupported(inner)),
                }
            }
            _ => return Err(unsupported(op)),
        }
        Ok(())
    }

    fn constant_type(&self, index: u16) -> Result<VerificationType> {
        match self.pool.get(index) {
            Some(Constant::Integer(_)) => Ok(VerificationType::Integer),
            Some(Constant::Float(_)) => Ok(VerificationType::Float),
            Some(Constant::Long(_)) => Ok(VerificationType::Long),
            Some(Constant::Double(_)) => Ok(VerificationType::Double),
            Some(Constant::String(_)) => Ok(VerificationType::object(class::STRING)),
            Some(Constant::Class(_)) => Ok(VerificationType::object("java/lang/Class")),
            _ => Err(CodegenError::Internal(format!("constant #{} cannot be loaded", index))),
        }
    }

    fn member(&self, index: u16) -> Result<(&'a str, &'a str, &'a str)> {
        self.pool
            .member(index)
            .ok_or_else(|| CodegenError::Internal(format!("constant #{} is not a member reference", index)))
    }

    fn class(&self, index: u16) -> Result<&'a str> {
        self.pool
            .class_name(index)
            .ok_or_else(|| CodegenError::Internal(format!("constant #{} is not a class", index)))
    }

    /// `invokespecial <init>` turns the receiver, and every copy of it,
    /// into an initialized object.
    fn initialize(&self, frame: &mut Frame, receiver: &VerificationType) -> Result<()> {
        let class = match receiver {
            VerificationType::UninitializedThis => self.class_name,
            VerificationType::Uninitialized(new_at) => {
                let at = *new_at as usize;
                self.class(u16::from_be_bytes([self.bytes[at + 1], self.bytes[at + 2]]))?
            }
            _ => return Ok(()),
        };
        frame.initialize(receiver, &VerificationType::object(class));
        Ok(())
    }
}

/// `int`, `long`, `float`, `double` in opcode family order.
fn numeric(kind: u8) -> VerificationType {
    match kind {
        0 => VerificationType::Integer,
        1 => VerificationType::Long,
        2 => VerificationType::Float,
        _ => VerificationType::Double,
    }
}

fn conversion_result(op: u8) -> VerificationType {
    match op {
        I2L | F2L | D2L => VerificationType::Long,
        I2F | L2F | D2F => VerificationType::Float,
        I2D | L2D | F2D => VerificationType::Double,
        _ => VerificationType::Integer,
    }
}

fn element_type(array: &VerificationType) -> VerificationType {
    match array {
        VerificationType::Object(name) => name
            .strip_prefix('[')
            .map_or(VerificationType::object(class::OBJECT), VerificationType::from_descriptor),
        _ => VerificationType::Null,
    }
}

/// Superclasses of the library types generated code commonly joins.
fn library_superclass(name: &str) -> Option<&'static str> {
    match name {
        "java/lang/Integer" | "java/lang/Long" | "java/lang/Double" | "java/lang/Float" | "java/lang/Short"
        | "java/lang/Byte" => Some("java/lang/Number"),
        "java/lang/RuntimeException" => Some("java/lang/Exception"),
        "java/lang/Exception" | "java/lang/Error" => Some(class::THROWABLE),
        "java/util/ArrayList" => Some("java/util/AbstractList"),
        "java/util/LinkedHashMap" => Some("java/util/HashMap"),
        "java/util/HashMap" => Some("java/util/AbstractMap"),
        _ => None,
    }
}

fn underflow() -> CodegenError {
    CodegenError::Internal("operand stack underflow".to_string())
}

fn unsupported(op: u8) -> CodegenError {
    CodegenError::Internal(format!("no stack map rule for opcode {:#04x}", op))
}

fn at_offset(error: CodegenError, at: usize) -> CodegenError {
    match error {
        CodegenError::Internal(message) => CodegenError::Internal(format!("{} at offset {}", message, at)),
        other => other,
    }
}

fn u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}
