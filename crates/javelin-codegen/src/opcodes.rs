//! JVM opcodes emitted by the generators.

// Constants
pub const NOP: u8 = 0x00;
pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_M1: u8 = 0x02;
pub const ICONST_0: u8 = 0x03;
pub const LCONST_0: u8 = 0x09;
pub const FCONST_0: u8 = 0x0b;
pub const DCONST_0: u8 = 0x0e;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const LDC2_W: u8 = 0x14;

// Loads: the `_0` forms are followed by `_1`..`_3`
pub const ILOAD: u8 = 0x15;
pub const LLOAD: u8 = 0x16;
pub const FLOAD: u8 = 0x17;
pub const DLOAD: u8 = 0x18;
pub const ALOAD: u8 = 0x19;
pub const ILOAD_0: u8 = 0x1a;
pub const LLOAD_0: u8 = 0x1e;
pub const FLOAD_0: u8 = 0x22;
pub const DLOAD_0: u8 = 0x26;
pub const ALOAD_0: u8 = 0x2a;

// Array element loads
pub const IALOAD: u8 = 0x2e;
pub const LALOAD: u8 = 0x2f;
pub const FALOAD: u8 = 0x30;
pub const DALOAD: u8 = 0x31;
pub const AALOAD: u8 = 0x32;
pub const BALOAD: u8 = 0x33;
pub const CALOAD: u8 = 0x34;
pub const SALOAD: u8 = 0x35;

// Stores
pub const ISTORE: u8 = 0x36;
pub const LSTORE: u8 = 0x37;
pub const FSTORE: u8 = 0x38;
pub const DSTORE: u8 = 0x39;
pub const ASTORE: u8 = 0x3a;
pub const ISTORE_0: u8 = 0x3b;
pub const LSTORE_0: u8 = 0x3f;
pub const FSTORE_0: u8 = 0x43;
pub const DSTORE_0: u8 = 0x47;
pub const ASTORE_0: u8 = 0x4b;

// Stack
pub const POP: u8 = 0x57;
pub const POP2: u8 = 0x58;
pub const DUP: u8 = 0x59;
pub const DUP_X1: u8 = 0x5a;
pub const DUP2: u8 = 0x5c;
pub const DUP2_X1: u8 = 0x5d;

// Arithmetic: `I` forms, followed by `L`, `F`, `D` at +1, +2, +3
pub const IADD: u8 = 0x60;
pub const ISUB: u8 = 0x64;
pub const IMUL: u8 = 0x68;
pub const IDIV: u8 = 0x6c;
pub const IREM: u8 = 0x70;
pub const INEG: u8 = 0x74;

// Shifts and bitwise ops: `I` form, `L` form at +1
pub const ISHL: u8 = 0x78;
pub const ISHR: u8 = 0x7a;
pub const IUSHR: u8 = 0x7c;
pub const IAND: u8 = 0x7e;
pub const IOR: u8 = 0x80;
pub const IXOR: u8 = 0x82;
pub const IINC: u8 = 0x84;

// Conversions
pub const I2L: u8 = 0x85;
pub const I2F: u8 = 0x86;
pub const I2D: u8 = 0x87;
pub const L2I: u8 = 0x88;
pub const L2F: u8 = 0x89;
pub const L2D: u8 = 0x8a;
pub const F2I: u8 = 0x8b;
pub const F2L: u8 = 0x8c;
pub const F2D: u8 = 0x8d;
pub const D2I: u8 = 0x8e;
pub const D2L: u8 = 0x8f;
pub const D2F: u8 = 0x90;
pub const I2B: u8 = 0x91;
pub const I2C: u8 = 0x92;
pub const I2S: u8 = 0x93;

// Comparisons
pub const LCMP: u8 = 0x94;
pub const FCMPL: u8 = 0x95;
pub const FCMPG: u8 = 0x96;
pub const DCMPL: u8 = 0x97;
pub const DCMPG: u8 = 0x98;

// Branches
pub const IFEQ: u8 = 0x99;
pub const IFNE: u8 = 0x9a;
pub const IFLT: u8 = 0x9b;
pub const IFGE: u8 = 0x9c;
pub const IFGT: u8 = 0x9d;
pub const IFLE: u8 = 0x9e;
pub const IF_ICMPEQ: u8 = 0x9f;
pub const IF_ICMPNE: u8 = 0xa0;
pub const IF_ICMPLT: u8 = 0xa1;
pub const IF_ICMPGE: u8 = 0xa2;
pub const IF_ICMPGT: u8 = 0xa3;
pub const IF_ICMPLE: u8 = 0xa4;
pub const IF_ACMPEQ: u8 = 0xa5;
pub const IF_ACMPNE: u8 = 0xa6;
pub const GOTO: u8 = 0xa7;
pub const IFNULL: u8 = 0xc6;
pub const IFNONNULL: u8 = 0xc7;

// Returns
pub const IRETURN: u8 = 0xac;
pub const LRETURN: u8 = 0xad;
pub const FRETURN: u8 = 0xae;
pub const DRETURN: u8 = 0xaf;
pub const ARETURN: u8 = 0xb0;
pub const RETURN: u8 = 0xb1;

// Fields and methods
pub const GETSTATIC: u8 = 0xb2;
pub const PUTSTATIC: u8 = 0xb3;
pub const GETFIELD: u8 = 0xb4;
pub const PUTFIELD: u8 = 0xb5;
pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;

// Objects
pub const NEW: u8 = 0xbb;
pub const ARRAYLENGTH: u8 = 0xbe;
pub const ATHROW: u8 = 0xbf;
pub const CHECKCAST: u8 = 0xc0;
pub const INSTANCEOF: u8 = 0xc1;

pub const WIDE: u8 = 0xc4;

/// Instructions after which control never reaches the next byte.
pub fn is_terminal(op: u8) -> bool {
    matches!(op, IRETURN..=RETURN | ATHROW | GOTO)
}

/// Instructions carrying a 16-bit relative jump offset.
pub fn is_branch(op: u8) -> bool {
    matches!(op, IFEQ..=GOTO | IFNULL | IFNONNULL)
}

/// Encoded length of the instruction at `at`, opcode included.
pub fn instruction_length(bytes: &[u8], at: usize) -> usize {
    let operands = match bytes[at] {
        BIPUSH | LDC | ILOAD..=ALOAD | ISTORE..=ASTORE => 1,
        SIPUSH | LDC_W | LDC2_W | IINC | IFEQ..=GOTO | IFNULL | IFNONNULL => 2,
        GETSTATIC..=INVOKESTATIC | NEW | CHECKCAST | INSTANCEOF => 2,
        INVOKEINTERFACE => 4,
        WIDE if bytes.get(at + 1) == Some(&IINC) => 5,
        WIDE => 3,
        _ => 0,
    };
    1 + operands
}

/// Conditional branches take one or two operands off the stack.
pub fn branch_pops(op: u8) -> u16 {
    match op {
        IFEQ..=IFLE | IFNULL | IFNONNULL => 1,
        IF_ICMPEQ..=IF_ACMPNE => 2,
        _ => 0,
    }
}

/// Branch with the opposite condition, used to jump over a block when the
/// source condition is false.
pub fn negate_branch(op: u8) -> u8 {
    match op {
        IFEQ => IFNE,
        IFNE => IFEQ,
        IFLT => IFGE,
        IFGE => IFLT,
        IFGT => IFLE,
        IFLE => IFGT,
        IF_ICMPEQ => IF_ICMPNE,
        IF_ICMPNE => IF_ICMPEQ,
        IF_ICMPLT => IF_ICMPGE,
        IF_ICMPGE => IF_ICMPLT,
        IF_ICMPGT => IF_ICMPLE,
        IF_ICMPLE => IF_ICMPGT,
        IF_ACMPEQ => IF_ACMPNE,
        IF_ACMPNE => IF_ACMPEQ,
        IFNULL => IFNONNULL,
        IFNONNULL => IFNULL,
        other => other,
    }
}
