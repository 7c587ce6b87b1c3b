use std::sync::Arc;

use nom::{
    Parser,
    multi::count,
    number::complete::{be_u16, be_u32},
};

use crate::{
    class::{
        attributes::{AttributeMap, parse_attributes},
        constant_pool::ConstantPool,
        member::{StructField, StructMethod},
    },
    consts::{BYTECODE_JAVA_LE_4, CLASS_MAGIC, ClassAccessFlag},
    error::{ClassFormatError, PResult, fail},
};

/// Every part of a class file, resolved against its constant pool.
pub(crate) struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: ClassAccessFlag,
    pub this_class: Arc<str>,
    pub super_class: Option<Arc<str>>,
    pub interfaces: Vec<Arc<str>>,
    pub fields: Vec<StructField>,
    pub methods: Vec<StructMethod>,
    pub attributes: AttributeMap,
}

pub(crate) fn class_file(input: &[u8], generics: bool) -> Result<ClassFile, ClassFormatError> {
    let origin = input;
    let (input, (minor_version, major_version)) = parse_header(input)?;
    let (input, constant_pool) = ConstantPool::parse(input)?;

    let (input, access_flags) = be_u16(input)?;
    let (input, this_class) = be_u16(input)?;
    let (input, super_class) = be_u16(input)?;
    let this_class = Arc::clone(constant_pool.class_name(this_class)?);
    let super_class = constant_pool.optional_class_name(super_class)?.cloned();

    let (input, interfaces) = parse_interfaces(input, &constant_pool)?;
    let (input, fields) = parse_fields(input, &constant_pool, generics)?;
    let bytecode_version = major_version.max(BYTECODE_JAVA_LE_4);
    let (input, methods) =
        parse_methods(input, origin, &constant_pool, bytecode_version, generics)?;
    let (input, attributes) = parse_attributes(input, &constant_pool)?;

    if !input.is_empty() {
        return Err(ClassFormatError::TrailingData(input.len()));
    }

    Ok(ClassFile {
        minor_version,
        major_version,
        constant_pool,
        access_flags: ClassAccessFlag::from_bits_retain(access_flags),
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn parse_header(input: &[u8]) -> PResult<'_, (u16, u16)> {
    let (input, magic) = be_u32(input)?;
    if magic != CLASS_MAGIC {
        return fail(ClassFormatError::BadMagic(magic));
    }
    let (input, minor) = be_u16(input)?;
    let (input, major) = be_u16(input)?;
    Ok((input, (minor, major)))
}

fn parse_interfaces<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, Vec<Arc<str>>> {
    let (input, interface_count) = be_u16(input)?;

    let (input, interfaces) =
        count(be_u16::<_, ClassFormatError>, interface_count as _).parse(input)?;

    let names = interfaces
        .into_iter()
        .map(|index| pool.class_name(index).map(Arc::clone))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((input, names))
}

fn parse_fields<'a>(
    input: &'a [u8],
    pool: &ConstantPool,
    generics: bool,
) -> PResult<'a, Vec<StructField>> {
    let (input, field_count) = be_u16(input)?;
    let (input, fields) = count(
        |input| StructField::parse(input, pool, generics),
        field_count as _,
    )
    .parse(input)?;
    Ok((input, fields))
}

fn parse_methods<'a>(
    input: &'a [u8],
    origin: &'a [u8],
    pool: &ConstantPool,
    bytecode_version: u16,
    generics: bool,
) -> PResult<'a, Vec<StructMethod>> {
    let (input, methods_count) = be_u16(input)?;

    let (input, methods) = count(
        |input| StructMethod::parse(input, origin, pool, bytecode_version, generics),
        methods_count as _,
    )
    .parse(input)?;

    Ok((input, methods))
}
