use std::sync::Arc;

use nom::number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, u8};

use crate::{
    class::stream::{discard, modified_utf8},
    error::{ClassFormatError, PResult, fail},
};

#[derive(Debug, Clone, PartialEq)]
pub enum PooledConstant {
    Utf8(Arc<str>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(Arc<str>),
    String(Arc<str>),
    MethodType(Arc<str>),
    Module(Arc<str>),
    Package(Arc<str>),
    FieldRef(LinkConstant),
    MethodRef(LinkConstant),
    InterfaceMethodRef(LinkConstant),
    NameAndType {
        name: Arc<str>,
        descriptor: Arc<str>,
    },
    MethodHandle {
        reference_kind: u8,
        reference: LinkConstant,
    },
    Dynamic(DynamicConstant),
    InvokeDynamic(DynamicConstant),
    /// Second slot of a `Long` or `Double`.
    Empty,
}

/// Resolved `Fieldref`/`Methodref`/`InterfaceMethodref`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkConstant {
    pub class_name: Arc<str>,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DynamicConstant {
    pub bootstrap_method: u16,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Field,
    Method,
}

#[derive(Debug)]
enum RawConstant {
    Utf8(Arc<str>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
    Empty,
}

/// Constant table of one class file, indexed from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    constants: Vec<PooledConstant>,
}

impl ConstantPool {
    pub fn parse(input: &[u8]) -> PResult<'_, ConstantPool> {
        let (input, raw) = parse_raw_pool(input)?;
        let constants = match resolve_pool(&raw) {
            Ok(constants) => constants,
            Err(err) => return fail(err),
        };
        Ok((input, ConstantPool { constants }))
    }

    /// Reads only the constant pool of a complete class file.
    pub fn read_from_class(class_file: &[u8]) -> Result<ConstantPool, ClassFormatError> {
        let (input, _) = discard(8)(class_file)?;
        let (_, pool) = Self::parse(input)?;
        Ok(pool)
    }

    /// Number of slots, excluding the unused slot 0.
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &PooledConstant)> {
        self.constants
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, PooledConstant::Empty))
            .map(|(i, c)| (i as u16 + 1, c))
    }

    pub fn constant(&self, index: u16) -> Result<&PooledConstant, ClassFormatError> {
        match index
            .checked_sub(1)
            .and_then(|i| self.constants.get(i as usize))
        {
            Some(PooledConstant::Empty) | None => Err(ClassFormatError::BadConstant {
                index,
                expected: "usable constant",
            }),
            Some(constant) => Ok(constant),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&Arc<str>, ClassFormatError> {
        match self.constant(index) {
            Ok(PooledConstant::Utf8(value)) => Ok(value),
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&Arc<str>, ClassFormatError> {
        match self.constant(index) {
            Ok(PooledConstant::Class(name)) => Ok(name),
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// Index 0 stands for "no class" (super class of `java/lang/Object`, catch-all handlers).
    pub fn optional_class_name(&self, index: u16) -> Result<Option<&Arc<str>>, ClassFormatError> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }

    pub fn link_constant(&self, index: u16) -> Result<&LinkConstant, ClassFormatError> {
        match self.constant(index) {
            Ok(
                PooledConstant::FieldRef(link)
                | PooledConstant::MethodRef(link)
                | PooledConstant::InterfaceMethodRef(link)
                | PooledConstant::MethodHandle {
                    reference: link, ..
                },
            ) => Ok(link),
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "member reference",
            }),
        }
    }

    /// Resolves the name and descriptor of a field or method declaration.
    pub fn class_element(
        &self,
        kind: ElementKind,
        name_index: u16,
        descriptor_index: u16,
    ) -> Result<(Arc<str>, Arc<str>), ClassFormatError> {
        let (name_expected, descriptor_expected) = match kind {
            ElementKind::Field => ("field name", "field descriptor"),
            ElementKind::Method => ("method name", "method descriptor"),
        };
        let name = self
            .utf8(name_index)
            .map_err(|_| ClassFormatError::BadConstant {
                index: name_index,
                expected: name_expected,
            })?;
        let descriptor = self
            .utf8(descriptor_index)
            .map_err(|_| ClassFormatError::BadConstant {
                index: descriptor_index,
                expected: descriptor_expected,
            })?;
        Ok((Arc::clone(name), Arc::clone(descriptor)))
    }
}

fn parse_raw_pool(input: &[u8]) -> PResult<'_, Vec<RawConstant>> {
    let (mut input, constant_pool_count) = be_u16(input)?;
    let slots = (constant_pool_count as usize).saturating_sub(1);

    let mut constant_pool = Vec::with_capacity(slots);
    while constant_pool.len() < slots {
        let constant;
        (input, constant) = parse_constant(input, constant_pool.len() + 1)?;
        let need_empty = matches!(constant, RawConstant::Long(_) | RawConstant::Double(_));
        constant_pool.push(constant);
        if need_empty {
            constant_pool.push(RawConstant::Empty);
        }
    }
    // a wide constant in the last slot spills one past the declared count
    constant_pool.truncate(slots);

    Ok((input, constant_pool))
}

fn parse_constant(mut input: &[u8], index: usize) -> PResult<'_, RawConstant> {
    let tag;
    (input, tag) = u8(input)?;
    let cp_info = match tag {
        1 => {
            let value;
            (input, value) = modified_utf8(input)?;
            RawConstant::Utf8(value)
        }
        3 => {
            let int;
            (input, int) = be_i32(input)?;
            RawConstant::Integer(int)
        }
        4 => {
            let float;
            (input, float) = be_f32(input)?;
            RawConstant::Float(float)
        }
        5 => {
            let long;
            (input, long) = be_i64(input)?;
            RawConstant::Long(long)
        }
        6 => {
            let double;
            (input, double) = be_f64(input)?;
            RawConstant::Double(double)
        }
        7 => {
            let name_index;
            (input, name_index) = be_u16(input)?;
            RawConstant::Class { name_index }
        }
        8 => {
            let string_index;
            (input, string_index) = be_u16(input)?;
            RawConstant::String { string_index }
        }
        9 | 10 | 11 => {
            let (class_index, name_and_type_index);
            (input, class_index) = be_u16(input)?;
            (input, name_and_type_index) = be_u16(input)?;
            match tag {
                9 => RawConstant::Fieldref {
                    class_index,
                    name_and_type_index,
                },
                10 => RawConstant::Methodref {
                    class_index,
                    name_and_type_index,
                },
                _ => RawConstant::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                },
            }
        }
        12 => {
            let (name_index, descriptor_index);
            (input, name_index) = be_u16(input)?;
            (input, descriptor_index) = be_u16(input)?;
            RawConstant::NameAndType {
                name_index,
                descriptor_index,
            }
        }
        15 => {
            let (reference_kind, reference_index);
            (input, reference_kind) = u8(input)?;
            (input, reference_index) = be_u16(input)?;
            RawConstant::MethodHandle {
                reference_kind,
                reference_index,
            }
        }
        16 => {
            let descriptor_index;
            (input, descriptor_index) = be_u16(input)?;
            RawConstant::MethodType { descriptor_index }
        }
        17 | 18 => {
            let (bootstrap_method_attr_index, name_and_type_index);
            (input, bootstrap_method_attr_index) = be_u16(input)?;
            (input, name_and_type_index) = be_u16(input)?;
            if tag == 17 {
                RawConstant::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                }
            } else {
                RawConstant::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                }
            }
        }
        19 => {
            let name_index;
            (input, name_index) = be_u16(input)?;
            RawConstant::Module { name_index }
        }
        20 => {
            let name_index;
            (input, name_index) = be_u16(input)?;
            RawConstant::Package { name_index }
        }
        _ => return fail(ClassFormatError::UnknownConstantTag { tag, index }),
    };
    Ok((input, cp_info))
}

fn resolve_pool(raw: &[RawConstant]) -> Result<Vec<PooledConstant>, ClassFormatError> {
    raw.iter()
        .map(|constant| {
            type Pc = PooledConstant;
            Ok(match constant {
                RawConstant::Utf8(v) => Pc::Utf8(Arc::clone(v)),
                RawConstant::Integer(v) => Pc::Integer(*v),
                RawConstant::Float(v) => Pc::Float(*v),
                RawConstant::Long(v) => Pc::Long(*v),
                RawConstant::Double(v) => Pc::Double(*v),
                RawConstant::Class { name_index } => Pc::Class(resolve_utf8(raw, *name_index)?),
                RawConstant::String { string_index } => {
                    Pc::String(resolve_utf8(raw, *string_index)?)
                }
                RawConstant::MethodType { descriptor_index } => {
                    Pc::MethodType(resolve_utf8(raw, *descriptor_index)?)
                }
                RawConstant::Module { name_index } => Pc::Module(resolve_utf8(raw, *name_index)?),
                RawConstant::Package { name_index } => {
                    Pc::Package(resolve_utf8(raw, *name_index)?)
                }
                RawConstant::Fieldref {
                    class_index,
                    name_and_type_index,
                } => Pc::FieldRef(resolve_link(raw, *class_index, *name_and_type_index)?),
                RawConstant::Methodref {
                    class_index,
                    name_and_type_index,
                } => Pc::MethodRef(resolve_link(raw, *class_index, *name_and_type_index)?),
                RawConstant::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    Pc::InterfaceMethodRef(resolve_link(raw, *class_index, *name_and_type_index)?)
                }
                RawConstant::NameAndType {
                    name_index,
                    descriptor_index,
                } => Pc::NameAndType {
                    name: resolve_utf8(raw, *name_index)?,
                    descriptor: resolve_utf8(raw, *descriptor_index)?,
                },
                RawConstant::MethodHandle {
                    reference_kind,
                    reference_index,
                } => Pc::MethodHandle {
                    reference_kind: *reference_kind,
                    reference: resolve_member_ref(raw, *reference_index)?,
                },
                RawConstant::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => Pc::Dynamic(resolve_dynamic(
                    raw,
                    *bootstrap_method_attr_index,
                    *name_and_type_index,
                )?),
                RawConstant::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => Pc::InvokeDynamic(resolve_dynamic(
                    raw,
                    *bootstrap_method_attr_index,
                    *name_and_type_index,
                )?),
                RawConstant::Empty => Pc::Empty,
            })
        })
        .collect()
}

fn raw_at(raw: &[RawConstant], index: u16) -> Option<&RawConstant> {
    raw.get((index as usize).checked_sub(1)?)
}

fn resolve_utf8(raw: &[RawConstant], index: u16) -> Result<Arc<str>, ClassFormatError> {
    let Some(RawConstant::Utf8(string)) = raw_at(raw, index) else {
        return Err(ClassFormatError::BadConstant {
            index,
            expected: "Utf8",
        });
    };
    Ok(Arc::clone(string))
}

fn resolve_class(raw: &[RawConstant], index: u16) -> Result<Arc<str>, ClassFormatError> {
    let Some(RawConstant::Class { name_index }) = raw_at(raw, index) else {
        return Err(ClassFormatError::BadConstant {
            index,
            expected: "Class",
        });
    };
    resolve_utf8(raw, *name_index)
}

fn resolve_name_and_type(
    raw: &[RawConstant],
    index: u16,
) -> Result<(Arc<str>, Arc<str>), ClassFormatError> {
    let Some(RawConstant::NameAndType {
        name_index,
        descriptor_index,
    }) = raw_at(raw, index)
    else {
        return Err(ClassFormatError::BadConstant {
            index,
            expected: "NameAndType",
        });
    };
    Ok((
        resolve_utf8(raw, *name_index)?,
        resolve_utf8(raw, *descriptor_index)?,
    ))
}

fn resolve_link(
    raw: &[RawConstant],
    class_index: u16,
    name_and_type_index: u16,
) -> Result<LinkConstant, ClassFormatError> {
    let class_name = resolve_class(raw, class_index)?;
    let (name, descriptor) = resolve_name_and_type(raw, name_and_type_index)?;
    Ok(LinkConstant {
        class_name,
        name,
        descriptor,
    })
}

fn resolve_member_ref(raw: &[RawConstant], index: u16) -> Result<LinkConstant, ClassFormatError> {
    match raw_at(raw, index) {
        Some(
            RawConstant::Fieldref {
                class_index,
                name_and_type_index,
            }
            | RawConstant::Methodref {
                class_index,
                name_and_type_index,
            }
            | RawConstant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            },
        ) => resolve_link(raw, *class_index, *name_and_type_index),
        _ => Err(ClassFormatError::BadConstant {
            index,
            expected: "member reference",
        }),
    }
}

fn resolve_dynamic(
    raw: &[RawConstant],
    bootstrap_method: u16,
    name_and_type_index: u16,
) -> Result<DynamicConstant, ClassFormatError> {
    let (name, descriptor) = resolve_name_and_type(raw, name_and_type_index)?;
    Ok(DynamicConstant {
        bootstrap_method,
        name,
        descriptor,
    })
}
