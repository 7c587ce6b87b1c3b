use std::sync::Arc;

use log::{debug, warn};
use nom::number::complete::{be_u16, be_u32};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::{
    class::{
        StructClass,
        attributes::{
            ATTRIBUTE_CODE, AttributeMap, attribute_header, decode_attribute, parse_attributes,
        },
        constant_pool::{ConstantPool, ElementKind},
        stream::{discard, offset_in},
    },
    code::{InstructionSequence, decoder},
    consts::{FieldAccessFlag, MethodAccessFlag},
    descriptor::{
        FieldDescriptor, MethodDescriptor, parse_field_descriptor, parse_method_descriptor,
    },
    error::{ClassFormatError, Error, PResult, Result},
    signature::{
        GenericFieldDescriptor, GenericMethodDescriptor, parse_field_signature,
        parse_method_signature,
    },
};

const SYNTHETIC_FLAG: u16 = 0x1000;

/// Shared view over fields, methods and record components.
pub trait StructMember {
    fn attributes(&self) -> &AttributeMap;

    fn raw_access_flags(&self) -> u16;

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes().contains(name)
    }

    fn is_synthetic(&self) -> bool {
        self.raw_access_flags() & SYNTHETIC_FLAG != 0 || self.has_attribute("Synthetic")
    }

    fn is_deprecated(&self) -> bool {
        self.has_attribute("Deprecated")
    }
}

#[derive(Debug)]
pub struct StructField {
    pub access_flags: FieldAccessFlag,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
    pub attributes: AttributeMap,
    pub signature: Option<GenericFieldDescriptor>,
    parsed_descriptor: OnceCell<FieldDescriptor>,
}

/// Location of a method body inside its class file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub local_variables: u16,
    pub code_length: u32,
    /// Code bytes plus the exception table that follows them.
    pub code_full_length: u32,
    /// Offset of the first code byte from the start of the class file.
    pub code_offset: usize,
    pub exception_table_length: u16,
}

#[derive(Debug)]
pub struct StructMethod {
    pub access_flags: MethodAccessFlag,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
    pub attributes: AttributeMap,
    pub signature: Option<GenericMethodDescriptor>,
    code: Option<CodeAttribute>,
    bytecode_version: u16,
    parsed_descriptor: OnceCell<MethodDescriptor>,
    instructions: Mutex<Option<Arc<InstructionSequence>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructRecordComponent {
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
    pub attributes: AttributeMap,
    pub signature: Option<GenericFieldDescriptor>,
}

impl StructMember for StructField {
    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    fn raw_access_flags(&self) -> u16 {
        self.access_flags.bits()
    }
}

impl StructMember for StructMethod {
    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    fn raw_access_flags(&self) -> u16 {
        self.access_flags.bits()
    }
}

impl StructMember for StructRecordComponent {
    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    fn raw_access_flags(&self) -> u16 {
        0
    }
}

impl StructField {
    pub(crate) fn parse<'a>(
        input: &'a [u8],
        pool: &ConstantPool,
        generics: bool,
    ) -> PResult<'a, StructField> {
        let (input, access_flags) = be_u16(input)?;
        let (input, name_index) = be_u16(input)?;
        let (input, descriptor_index) = be_u16(input)?;
        let (name, descriptor) =
            pool.class_element(ElementKind::Field, name_index, descriptor_index)?;
        let (input, attributes) = parse_attributes(input, pool)?;

        let signature = generics
            .then(|| member_signature(&attributes, &name, parse_field_signature))
            .flatten();

        Ok((
            input,
            StructField {
                access_flags: FieldAccessFlag::from_bits_retain(access_flags),
                name,
                descriptor,
                attributes,
                signature,
                parsed_descriptor: OnceCell::new(),
            },
        ))
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlag::STATIC)
    }

    pub fn field_descriptor(&self) -> std::result::Result<&FieldDescriptor, ClassFormatError> {
        self.parsed_descriptor
            .get_or_try_init(|| parse_field_descriptor(&self.descriptor))
    }
}

impl StructMethod {
    /// Parses a `method_info`; `origin` is the whole class file, used to
    /// record where the body lives.
    pub(crate) fn parse<'a>(
        input: &'a [u8],
        origin: &'a [u8],
        pool: &ConstantPool,
        bytecode_version: u16,
        generics: bool,
    ) -> PResult<'a, StructMethod> {
        let (input, access_flags) = be_u16(input)?;
        let (input, name_index) = be_u16(input)?;
        let (input, descriptor_index) = be_u16(input)?;
        let (name, descriptor) =
            pool.class_element(ElementKind::Method, name_index, descriptor_index)?;

        let (mut input, attributes_count) = be_u16(input)?;
        let mut attributes = AttributeMap::default();
        let mut code = None;
        for _ in 0..attributes_count {
            let (attribute_name, body);
            (input, (attribute_name, body)) = attribute_header(input, pool)?;
            if &*attribute_name == ATTRIBUTE_CODE {
                let (rest, code_attribute) = parse_code(body, origin, pool, &mut attributes)?;
                if !rest.is_empty() {
                    return Err(ClassFormatError::AttributeLength {
                        name: ATTRIBUTE_CODE.to_string(),
                        declared: body.len(),
                        actual: offset_in(body, rest),
                    }
                    .into());
                }
                code = Some(code_attribute);
            } else {
                attributes.insert(decode_attribute(attribute_name, body, pool)?);
            }
        }
        attributes.merge_local_variable_signatures();

        let signature = generics
            .then(|| member_signature(&attributes, &name, parse_method_signature))
            .flatten();

        Ok((
            input,
            StructMethod {
                access_flags: MethodAccessFlag::from_bits_retain(access_flags),
                name,
                descriptor,
                attributes,
                signature,
                code,
                bytecode_version,
                parsed_descriptor: OnceCell::new(),
                instructions: Mutex::new(None),
            },
        ))
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlag::STATIC)
    }

    pub fn is_varargs(&self) -> bool {
        self.access_flags.contains(MethodAccessFlag::VARARGS)
    }

    pub fn contains_code(&self) -> bool {
        self.code.is_some()
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        self.code.as_ref()
    }

    pub fn local_variables(&self) -> u16 {
        self.code.map_or(0, |code| code.local_variables)
    }

    pub fn bytecode_version(&self) -> u16 {
        self.bytecode_version
    }

    pub fn method_descriptor(&self) -> std::result::Result<&MethodDescriptor, ClassFormatError> {
        self.parsed_descriptor
            .get_or_try_init(|| parse_method_descriptor(&self.descriptor))
    }

    /// Loads and decodes the method body. Does nothing when the body is
    /// already decoded or the method has no code.
    pub fn expand_data(&self, class: &StructClass) -> Result<()> {
        let Some(code) = &self.code else {
            return Ok(());
        };
        let mut instructions = self.instructions.lock();
        if instructions.is_some() {
            return Ok(());
        }

        let loader = class
            .loader()
            .ok_or_else(|| Error::MissingLink(class.qualified_name().to_string()))?;
        let bytes = loader.load_bytecode(class.qualified_name(), code)?;
        let pool = class.pool()?;
        let sequence = decoder::decode(
            &bytes,
            code.code_length as usize,
            self.bytecode_version,
            &pool,
        )?;
        debug!(
            "expanded {}.{}{} ({} instructions)",
            class.qualified_name(),
            self.name,
            self.descriptor,
            sequence.len()
        );
        *instructions = Some(Arc::new(sequence));
        Ok(())
    }

    pub fn release_resources(&self) {
        self.instructions.lock().take();
    }

    pub fn is_expanded(&self) -> bool {
        self.instructions.lock().is_some()
    }

    pub fn instruction_sequence(&self) -> Option<Arc<InstructionSequence>> {
        self.instructions.lock().clone()
    }
}

impl StructRecordComponent {
    pub(crate) fn parse<'a>(
        input: &'a [u8],
        pool: &ConstantPool,
    ) -> PResult<'a, StructRecordComponent> {
        let (input, name_index) = be_u16(input)?;
        let (input, descriptor_index) = be_u16(input)?;
        let (name, descriptor) =
            pool.class_element(ElementKind::Field, name_index, descriptor_index)?;
        let (input, attributes) = parse_attributes(input, pool)?;
        Ok((
            input,
            StructRecordComponent {
                name,
                descriptor,
                attributes,
                signature: None,
            },
        ))
    }

    pub(crate) fn attach_signature(&mut self) {
        self.signature = member_signature(&self.attributes, &self.name, parse_field_signature);
    }
}

/// Code attribute body: header, skipped code and exception table, then
/// nested attributes joining the method's own.
fn parse_code<'a>(
    body: &'a [u8],
    origin: &'a [u8],
    pool: &ConstantPool,
    attributes: &mut AttributeMap,
) -> PResult<'a, CodeAttribute> {
    let (input, max_stack) = be_u16(body)?;
    let (input, local_variables) = be_u16(input)?;
    let (input, code_length) = be_u32(input)?;
    let code_offset = offset_in(origin, input);
    let (input, _) = discard(code_length as usize)(input)?;
    let (input, exception_table_length) = be_u16(input)?;
    let (input, _) = discard(exception_table_length as usize * 8)(input)?;
    let (input, nested) = parse_attributes(input, pool)?;
    for attribute in nested.iter().cloned() {
        attributes.insert(attribute);
    }

    Ok((
        input,
        CodeAttribute {
            max_stack,
            local_variables,
            code_length,
            code_full_length: code_length + 2 + exception_table_length as u32 * 8,
            code_offset,
            exception_table_length,
        },
    ))
}

fn member_signature<T>(
    attributes: &AttributeMap,
    member: &str,
    parse: fn(&str) -> std::result::Result<T, ClassFormatError>,
) -> Option<T> {
    let signature = attributes.signature()?;
    match parse(signature) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!("ignoring signature of {member}: {err}");
            None
        }
    }
}

