pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

// major versions
pub const BYTECODE_JAVA_LE_4: u16 = 48;
pub const BYTECODE_JAVA_5: u16 = 49;
pub const BYTECODE_JAVA_6: u16 = 50;
pub const BYTECODE_JAVA_7: u16 = 51;
pub const BYTECODE_JAVA_8: u16 = 52;
pub const BYTECODE_JAVA_9: u16 = 53;
pub const BYTECODE_JAVA_10: u16 = 54;
pub const BYTECODE_JAVA_11: u16 = 55;
pub const BYTECODE_JAVA_12: u16 = 56;
pub const BYTECODE_JAVA_13: u16 = 57;
pub const BYTECODE_JAVA_14: u16 = 58;
pub const BYTECODE_JAVA_15: u16 = 59;
pub const BYTECODE_JAVA_16: u16 = 60;
pub const BYTECODE_JAVA_17: u16 = 61;
pub const BYTECODE_JAVA_18: u16 = 62;
pub const BYTECODE_JAVA_19: u16 = 63;
pub const BYTECODE_JAVA_20: u16 = 64;
pub const BYTECODE_JAVA_21: u16 = 65;

/// Minor version marking a class file compiled with `--enable-preview`.
pub const PREVIEW_MINOR_VERSION: u16 = 0xFFFF;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassAccessFlag: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAccessFlag: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodAccessFlag: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParameterAccessFlag: u16 {
        const FINAL = 0x0010;
        const SYNTHETIC = 0x1000;
        const MANDATED = 0x8000;
    }
}
