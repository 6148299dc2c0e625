//! Boxing, unboxing and primitive conversions.
//!
//! All functions assume the value to convert is on top of the operand
//! stack and leave the converted value in its place.

use javelin_types::{
    desc, internal_name_of, is_int_like, is_primitive, is_wrapper, primitive_of, slot_width,
    wrapper_of,
};

use crate::code::CodeBuffer;
use crate::constant_pool::ConstantPool;
use crate::error::{CodegenError, Result};
use crate::opcodes::*;

fn unbox_method(primitive: &str) -> Option<&'static str> {
    Some(match primitive {
        "Z" => "booleanValue",
        "B" => "byteValue",
        "C" => "charValue",
        "S" => "shortValue",
        "I" => "intValue",
        "J" => "longValue",
        "F" => "floatValue",
        "D" => "doubleValue",
        _ => return None,
    })
}

/// `Integer.valueOf(I)` and friends.
pub fn box_primitive(code: &mut CodeBuffer, pool: &mut ConstantPool, primitive: &str) {
    let wrapper = wrapper_of(primitive);
    let owner = internal_name_of(wrapper).unwrap_or(wrapper);
    let method = pool.add_method_ref(owner, "valueOf", &format!("({}){}", primitive, wrapper));
    code.invoke(INVOKESTATIC, method, slot_width(primitive), 1);
}

/// `Integer.intValue()` and friends; the receiver must already have the
/// wrapper type.
pub fn unbox(code: &mut CodeBuffer, pool: &mut ConstantPool, wrapper: &str) -> Result<()> {
    let primitive = primitive_of(wrapper);
    let name = unbox_method(primitive)
        .filter(|_| is_wrapper(wrapper))
        .ok_or_else(|| CodegenError::Internal(format!("{} is not a wrapper type", wrapper)))?;
    let owner = internal_name_of(wrapper).unwrap_or(wrapper);
    let method = pool.add_method_ref(owner, name, &format!("(){}", primitive));
    code.invoke(INVOKEVIRTUAL, method, 0, slot_width(primitive));
    Ok(())
}

/// Conversion opcodes between two primitive types, including narrowing.
pub fn convert_primitive(code: &mut CodeBuffer, from: &str, to: &str) {
    if from == to || to == desc::BOOLEAN || from == desc::BOOLEAN {
        return;
    }
    // Sub-int widening needs no instruction
    if is_int_like(from) && (to == desc::INT || (from == desc::BYTE && to == desc::SHORT)) {
        return;
    }

    let base = if is_int_like(from) { desc::INT } else { from };
    let narrow = matches!(to, "B" | "C" | "S");
    let target = if narrow { desc::INT } else { to };

    let op = match (base, target) {
        ("I", "J") => Some(I2L),
        ("I", "F") => Some(I2F),
        ("I", "D") => Some(I2D),
        ("J", "I") => Some(L2I),
        ("J", "F") => Some(L2F),
        ("J", "D") => Some(L2D),
        ("F", "I") => Some(F2I),
        ("F", "J") => Some(F2L),
        ("F", "D") => Some(F2D),
        ("D", "I") => Some(D2I),
        ("D", "J") => Some(D2L),
        ("D", "F") => Some(D2F),
        _ => None,
    };
    if let Some(op) = op {
        code.simple(op, slot_width(base), slot_width(target));
    }

    if narrow {
        let op = match to {
            "B" => I2B,
            "C" => I2C,
            _ => I2S,
        };
        code.simple(op, 1, 1);
    }
}

/// Value on the stack is statically `Object`: cast it to `target`, going
/// through the wrapper class for primitives.
pub fn unbox_or_cast(code: &mut CodeBuffer, pool: &mut ConstantPool, target: &str) -> Result<()> {
    if is_primitive(target) {
        let wrapper = wrapper_of(target);
        let class = pool.add_class(internal_name_of(wrapper).unwrap_or(wrapper));
        code.checkcast(class);
        return unbox(code, pool, wrapper);
    }
    if target != desc::OBJECT {
        if let Some(internal) = internal_name_of(target) {
            let class = pool.add_class(internal);
            code.checkcast(class);
        }
    }
    Ok(())
}

/// Convert a value of type `from` into type `to`.
pub fn coerce(code: &mut CodeBuffer, pool: &mut ConstantPool, from: &str, to: &str) -> Result<()> {
    if from == to || to == desc::VOID {
        return Ok(());
    }

    match (is_primitive(from), is_primitive(to)) {
        (true, true) => convert_primitive(code, from, to),
        (true, false) => {
            if is_wrapper(to) {
                // int -> Long: widen first, then box as the target's primitive
                let target = primitive_of(to);
                convert_primitive(code, from, target);
                box_primitive(code, pool, target);
            } else {
                box_primitive(code, pool, from);
            }
        }
        (false, true) => {
            if is_wrapper(from) {
                let unboxed = primitive_of(from);
                unbox(code, pool, from)?;
                convert_primitive(code, unboxed, to);
            } else {
                unbox_or_cast(code, pool, to)?;
            }
        }
        (false, false) => {
            if from == desc::OBJECT {
                unbox_or_cast(code, pool, to)?;
            }
        }
    }
    Ok(())
}
