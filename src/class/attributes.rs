use std::sync::Arc;

use nom::{
    Parser,
    bytes::complete::take,
    multi::count,
    number::complete::{be_u16, be_u32, u8},
};

use crate::{
    class::{
        constant_pool::{ConstantPool, LinkConstant, PooledConstant},
        member::StructRecordComponent,
        stream::offset_in,
    },
    consts::{ClassAccessFlag, ParameterAccessFlag},
    error::{ClassFormatError, PResult, fail},
};

pub const ATTRIBUTE_CODE: &str = "Code";
pub const ATTRIBUTE_LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
pub const ATTRIBUTE_LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";

#[derive(Debug, Clone, PartialEq)]
pub enum StructAttribute {
    ConstantValue(Const),
    Signature(Arc<str>),
    SourceFile(Arc<str>),
    Exceptions(Vec<Arc<str>>),
    InnerClasses(Vec<InnerClass>),
    EnclosingMethod {
        class_name: Arc<str>,
        /// Name and descriptor, absent for initializer blocks.
        method: Option<(Arc<str>, Arc<str>)>,
    },
    LineNumberTable(Vec<LineNumber>),
    LocalVariableTable(LocalVariableTable),
    LocalVariableTypeTable(LocalVariableTable),
    BootstrapMethods(Vec<BootstrapMethod>),
    MethodParameters(Vec<MethodParameter>),
    Record(Vec<StructRecordComponent>),
    PermittedSubclasses(Vec<Arc<str>>),
    NestHost(Arc<str>),
    NestMembers(Vec<Arc<str>>),
    Synthetic,
    Deprecated,
    RuntimeVisibleAnnotations(Vec<Annotation>),
    RuntimeInvisibleAnnotations(Vec<Annotation>),
    RuntimeVisibleParameterAnnotations(Vec<Vec<Annotation>>),
    RuntimeInvisibleParameterAnnotations(Vec<Vec<Annotation>>),
    AnnotationDefault(ElementValue),
    Unknown { name: Arc<str>, length: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Byte(i32),
    Char(i32),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Short(i32),
    Boolean(i32),
    String(Arc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface.
    pub type_name: Arc<str>,
    pub element_value_pairs: Vec<ElementValuePair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValuePair {
    pub element_name: Arc<str>,
    pub value: ElementValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Const(Const),
    Enum {
        type_name: Arc<str>,
        const_name: Arc<str>,
    },
    /// Return descriptor, `V` for `void.class`.
    Class(Arc<str>),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClass {
    pub inner_class: Arc<str>,
    pub outer_class: Option<Arc<str>>,
    pub simple_name: Option<Arc<str>>,
    pub access_flags: ClassAccessFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalVariableTable {
    pub entries: Vec<LocalVariable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name: Arc<str>,
    /// Field descriptor, or the generic signature when read from a type table.
    pub descriptor: Arc<str>,
    pub index: u16,
    pub signature: Option<Arc<str>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    pub reference_kind: u8,
    pub method: LinkConstant,
    pub arguments: Vec<PooledConstant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParameter {
    pub name: Option<Arc<str>>,
    pub access_flags: ParameterAccessFlag,
}

impl StructAttribute {
    pub fn name(&self) -> &str {
        match self {
            StructAttribute::ConstantValue(_) => "ConstantValue",
            StructAttribute::Signature(_) => "Signature",
            StructAttribute::SourceFile(_) => "SourceFile",
            StructAttribute::Exceptions(_) => "Exceptions",
            StructAttribute::InnerClasses(_) => "InnerClasses",
            StructAttribute::EnclosingMethod { .. } => "EnclosingMethod",
            StructAttribute::LineNumberTable(_) => "LineNumberTable",
            StructAttribute::LocalVariableTable(_) => ATTRIBUTE_LOCAL_VARIABLE_TABLE,
            StructAttribute::LocalVariableTypeTable(_) => ATTRIBUTE_LOCAL_VARIABLE_TYPE_TABLE,
            StructAttribute::BootstrapMethods(_) => "BootstrapMethods",
            StructAttribute::MethodParameters(_) => "MethodParameters",
            StructAttribute::Record(_) => "Record",
            StructAttribute::PermittedSubclasses(_) => "PermittedSubclasses",
            StructAttribute::NestHost(_) => "NestHost",
            StructAttribute::NestMembers(_) => "NestMembers",
            StructAttribute::Synthetic => "Synthetic",
            StructAttribute::Deprecated => "Deprecated",
            StructAttribute::RuntimeVisibleAnnotations(_) => "RuntimeVisibleAnnotations",
            StructAttribute::RuntimeInvisibleAnnotations(_) => "RuntimeInvisibleAnnotations",
            StructAttribute::RuntimeVisibleParameterAnnotations(_) => {
                "RuntimeVisibleParameterAnnotations"
            }
            StructAttribute::RuntimeInvisibleParameterAnnotations(_) => {
                "RuntimeInvisibleParameterAnnotations"
            }
            StructAttribute::AnnotationDefault(_) => "AnnotationDefault",
            StructAttribute::Unknown { name, .. } => name,
        }
    }
}

impl LocalVariableTable {
    /// Attaches the generic signatures of `type_table` to the entries
    /// describing the same slot from the same start offset.
    pub fn merge_signatures(&mut self, type_table: &LocalVariableTable) {
        for entry in &mut self.entries {
            if let Some(typed) = type_table
                .entries
                .iter()
                .find(|t| t.index == entry.index && t.start_pc == entry.start_pc)
            {
                entry.signature = Some(Arc::clone(&typed.descriptor));
            }
        }
    }

    /// Variable occupying `slot` at bytecode offset `pc`.
    pub fn variable_at(&self, slot: u16, pc: u16) -> Option<&LocalVariable> {
        self.entries.iter().find(|v| {
            v.index == slot && pc >= v.start_pc && (pc as u32) < v.start_pc as u32 + v.length as u32
        })
    }
}

/// Attributes of a class or member in declaration order.
///
/// Repeated local variable tables are merged into the first one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeMap {
    attributes: Vec<StructAttribute>,
}

impl AttributeMap {
    pub fn insert(&mut self, attribute: StructAttribute) {
        match attribute {
            StructAttribute::LocalVariableTable(table) => {
                match self.attributes.iter_mut().find_map(|a| match a {
                    StructAttribute::LocalVariableTable(existing) => Some(existing),
                    _ => None,
                }) {
                    Some(existing) => existing.entries.extend(table.entries),
                    None => self
                        .attributes
                        .push(StructAttribute::LocalVariableTable(table)),
                }
            }
            StructAttribute::LocalVariableTypeTable(table) => {
                match self.attributes.iter_mut().find_map(|a| match a {
                    StructAttribute::LocalVariableTypeTable(existing) => Some(existing),
                    _ => None,
                }) {
                    Some(existing) => existing.entries.extend(table.entries),
                    None => self
                        .attributes
                        .push(StructAttribute::LocalVariableTypeTable(table)),
                }
            }
            attribute => self.attributes.push(attribute),
        }
    }

    pub fn get(&self, name: &str) -> Option<&StructAttribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StructAttribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn signature(&self) -> Option<&Arc<str>> {
        self.attributes.iter().find_map(|a| match a {
            StructAttribute::Signature(signature) => Some(signature),
            _ => None,
        })
    }

    pub fn local_variable_table(&self) -> Option<&LocalVariableTable> {
        self.attributes.iter().find_map(|a| match a {
            StructAttribute::LocalVariableTable(table) => Some(table),
            _ => None,
        })
    }

    pub fn local_variable_type_table(&self) -> Option<&LocalVariableTable> {
        self.attributes.iter().find_map(|a| match a {
            StructAttribute::LocalVariableTypeTable(table) => Some(table),
            _ => None,
        })
    }

    pub fn line_numbers(&self) -> &[LineNumber] {
        self.attributes
            .iter()
            .find_map(|a| match a {
                StructAttribute::LineNumberTable(lines) => Some(lines.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn exceptions(&self) -> &[Arc<str>] {
        self.attributes
            .iter()
            .find_map(|a| match a {
                StructAttribute::Exceptions(exceptions) => Some(exceptions.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn record_components(&self) -> Option<&[StructRecordComponent]> {
        self.attributes.iter().find_map(|a| match a {
            StructAttribute::Record(components) => Some(components.as_slice()),
            _ => None,
        })
    }

    pub(crate) fn record_components_mut(&mut self) -> Option<&mut Vec<StructRecordComponent>> {
        self.attributes.iter_mut().find_map(|a| match a {
            StructAttribute::Record(components) => Some(components),
            _ => None,
        })
    }

    /// Copies type-table signatures onto the plain local variable table.
    pub(crate) fn merge_local_variable_signatures(&mut self) {
        let Some(type_table) = self.local_variable_type_table().cloned() else {
            return;
        };
        for attribute in &mut self.attributes {
            if let StructAttribute::LocalVariableTable(table) = attribute {
                table.merge_signatures(&type_table);
            }
        }
    }
}

/// `u2 name_index`, `u4 length`, then `length` bytes of body.
pub(crate) fn attribute_header<'a>(
    input: &'a [u8],
    pool: &ConstantPool,
) -> PResult<'a, (Arc<str>, &'a [u8])> {
    let (input, name_index) = be_u16(input)?;
    let name = Arc::clone(pool.utf8(name_index)?);
    let (input, length) = be_u32(input)?;
    let (input, body) = take(length)(input)?;
    Ok((input, (name, body)))
}

pub(crate) fn parse_attributes<'a>(
    input: &'a [u8],
    pool: &ConstantPool,
) -> PResult<'a, AttributeMap> {
    let (mut input, attributes_count) = be_u16(input)?;
    let mut attributes = AttributeMap::default();
    for _ in 0..attributes_count {
        let (name, body);
        (input, (name, body)) = attribute_header(input, pool)?;
        attributes.insert(decode_attribute(name, body, pool)?);
    }
    Ok((input, attributes))
}

/// Decodes one attribute body, which must be consumed exactly.
pub(crate) fn decode_attribute(
    name: Arc<str>,
    body: &[u8],
    pool: &ConstantPool,
) -> Result<StructAttribute, ClassFormatError> {
    let (rest, attribute) = parse_attribute_body(name.clone(), body, pool)?;
    if !rest.is_empty() {
        return Err(ClassFormatError::AttributeLength {
            name: name.to_string(),
            declared: body.len(),
            actual: offset_in(body, rest),
        });
    }
    Ok(attribute)
}

fn parse_attribute_body<'a>(
    name: Arc<str>,
    mut input: &'a [u8],
    pool: &ConstantPool,
) -> PResult<'a, StructAttribute> {
    let attribute = match &*name {
        "ConstantValue" => {
            let index;
            (input, index) = be_u16(input)?;
            StructAttribute::ConstantValue(resolve_const(pool, index)?)
        }
        "Signature" => {
            let index;
            (input, index) = be_u16(input)?;
            StructAttribute::Signature(Arc::clone(pool.utf8(index)?))
        }
        "SourceFile" => {
            let index;
            (input, index) = be_u16(input)?;
            StructAttribute::SourceFile(Arc::clone(pool.utf8(index)?))
        }
        "Exceptions" => {
            let names;
            (input, names) = class_list(input, pool)?;
            StructAttribute::Exceptions(names)
        }
        "InnerClasses" => {
            let number_of_classes;
            (input, number_of_classes) = be_u16(input)?;
            let inner_classes;
            (input, inner_classes) = count(
                |input| parse_inner_class(input, pool),
                number_of_classes as _,
            )
            .parse(input)?;
            StructAttribute::InnerClasses(inner_classes)
        }
        "EnclosingMethod" => {
            let (class_index, method_index);
            (input, class_index) = be_u16(input)?;
            (input, method_index) = be_u16(input)?;
            let method = match method_index {
                0 => None,
                index => match pool.constant(index)? {
                    PooledConstant::NameAndType { name, descriptor } => {
                        Some((Arc::clone(name), Arc::clone(descriptor)))
                    }
                    _ => {
                        return fail(ClassFormatError::BadConstant {
                            index,
                            expected: "NameAndType",
                        });
                    }
                },
            };
            StructAttribute::EnclosingMethod {
                class_name: Arc::clone(pool.class_name(class_index)?),
                method,
            }
        }
        "LineNumberTable" => {
            let line_number_table_length;
            (input, line_number_table_length) = be_u16(input)?;
            let line_number_table;
            (input, line_number_table) =
                count(parse_line_number, line_number_table_length as _).parse(input)?;
            StructAttribute::LineNumberTable(line_number_table)
        }
        ATTRIBUTE_LOCAL_VARIABLE_TABLE | ATTRIBUTE_LOCAL_VARIABLE_TYPE_TABLE => {
            let table_length;
            (input, table_length) = be_u16(input)?;
            let entries;
            (input, entries) =
                count(|input| parse_local_variable(input, pool), table_length as _)
                    .parse(input)?;
            if &*name == ATTRIBUTE_LOCAL_VARIABLE_TABLE {
                StructAttribute::LocalVariableTable(LocalVariableTable { entries })
            } else {
                StructAttribute::LocalVariableTypeTable(LocalVariableTable { entries })
            }
        }
        "BootstrapMethods" => {
            let num_bootstrap_methods;
            (input, num_bootstrap_methods) = be_u16(input)?;
            let methods;
            (input, methods) = count(
                |input| parse_bootstrap_method(input, pool),
                num_bootstrap_methods as _,
            )
            .parse(input)?;
            StructAttribute::BootstrapMethods(methods)
        }
        "MethodParameters" => {
            let parameters_count;
            (input, parameters_count) = u8(input)?;
            let parameters;
            (input, parameters) = count(
                |input| parse_method_parameter(input, pool),
                parameters_count as _,
            )
            .parse(input)?;
            StructAttribute::MethodParameters(parameters)
        }
        "Record" => {
            let components_count;
            (input, components_count) = be_u16(input)?;
            let components;
            (input, components) = count(
                |input| StructRecordComponent::parse(input, pool),
                components_count as _,
            )
            .parse(input)?;
            StructAttribute::Record(components)
        }
        "PermittedSubclasses" => {
            let names;
            (input, names) = class_list(input, pool)?;
            StructAttribute::PermittedSubclasses(names)
        }
        "NestHost" => {
            let index;
            (input, index) = be_u16(input)?;
            StructAttribute::NestHost(Arc::clone(pool.class_name(index)?))
        }
        "NestMembers" => {
            let names;
            (input, names) = class_list(input, pool)?;
            StructAttribute::NestMembers(names)
        }
        "Synthetic" => StructAttribute::Synthetic,
        "Deprecated" => StructAttribute::Deprecated,
        "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
            let annotations;
            (input, annotations) = parse_annotations(input, pool)?;
            if &*name == "RuntimeVisibleAnnotations" {
                StructAttribute::RuntimeVisibleAnnotations(annotations)
            } else {
                StructAttribute::RuntimeInvisibleAnnotations(annotations)
            }
        }
        "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
            let num_parameters;
            (input, num_parameters) = u8(input)?;
            let parameters;
            (input, parameters) = count(
                |input| parse_annotations(input, pool),
                num_parameters as _,
            )
            .parse(input)?;
            if &*name == "RuntimeVisibleParameterAnnotations" {
                StructAttribute::RuntimeVisibleParameterAnnotations(parameters)
            } else {
                StructAttribute::RuntimeInvisibleParameterAnnotations(parameters)
            }
        }
        "AnnotationDefault" => {
            let value;
            (input, value) = parse_element_value(input, pool)?;
            StructAttribute::AnnotationDefault(value)
        }
        _ => {
            let length = input.len() as u32;
            input = &input[input.len()..];
            StructAttribute::Unknown { name, length }
        }
    };
    Ok((input, attribute))
}

fn class_list<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, Vec<Arc<str>>> {
    let (input, number) = be_u16(input)?;
    let (input, indices) = count(be_u16::<_, ClassFormatError>, number as _).parse(input)?;
    let names = indices
        .into_iter()
        .map(|index| pool.class_name(index).map(Arc::clone))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((input, names))
}

fn parse_inner_class<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, InnerClass> {
    let (input, inner_class_info_index) = be_u16(input)?;
    let (input, outer_class_info_index) = be_u16(input)?;
    let (input, inner_name_index) = be_u16(input)?;
    let (input, inner_class_access_flags) = be_u16(input)?;
    let simple_name = match inner_name_index {
        0 => None,
        index => Some(Arc::clone(pool.utf8(index)?)),
    };
    Ok((
        input,
        InnerClass {
            inner_class: Arc::clone(pool.class_name(inner_class_info_index)?),
            outer_class: pool.optional_class_name(outer_class_info_index)?.cloned(),
            simple_name,
            access_flags: ClassAccessFlag::from_bits_retain(inner_class_access_flags),
        },
    ))
}

fn parse_line_number(input: &[u8]) -> PResult<'_, LineNumber> {
    let (input, start_pc) = be_u16(input)?;
    let (input, line_number) = be_u16(input)?;
    Ok((
        input,
        LineNumber {
            start_pc,
            line_number,
        },
    ))
}

fn parse_method_parameter<'a>(
    input: &'a [u8],
    pool: &ConstantPool,
) -> PResult<'a, MethodParameter> {
    let (input, name_index) = be_u16(input)?;
    let (input, access_flags) = be_u16(input)?;
    let name = match name_index {
        0 => None,
        index => Some(Arc::clone(pool.utf8(index)?)),
    };
    Ok((
        input,
        MethodParameter {
            name,
            access_flags: ParameterAccessFlag::from_bits_retain(access_flags),
        },
    ))
}

fn parse_local_variable<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, LocalVariable> {
    let (input, start_pc) = be_u16(input)?;
    let (input, length) = be_u16(input)?;
    let (input, name_index) = be_u16(input)?;
    let (input, descriptor_index) = be_u16(input)?;
    let (input, index) = be_u16(input)?;
    Ok((
        input,
        LocalVariable {
            start_pc,
            length,
            name: Arc::clone(pool.utf8(name_index)?),
            descriptor: Arc::clone(pool.utf8(descriptor_index)?),
            index,
            signature: None,
        },
    ))
}

fn parse_bootstrap_method<'a>(
    input: &'a [u8],
    pool: &ConstantPool,
) -> PResult<'a, BootstrapMethod> {
    let (input, bootstrap_method_ref) = be_u16(input)?;
    let (input, num_bootstrap_arguments) = be_u16(input)?;
    let (input, argument_indices) =
        count(be_u16::<_, ClassFormatError>, num_bootstrap_arguments as _).parse(input)?;

    let PooledConstant::MethodHandle {
        reference_kind,
        reference,
    } = pool.constant(bootstrap_method_ref)?
    else {
        return fail(ClassFormatError::BadConstant {
            index: bootstrap_method_ref,
            expected: "MethodHandle",
        });
    };
    let arguments = argument_indices
        .into_iter()
        .map(|index| pool.constant(index).cloned())
        .collect::<Result<Vec<_>, _>>()?;

    Ok((
        input,
        BootstrapMethod {
            reference_kind: *reference_kind,
            method: reference.clone(),
            arguments,
        },
    ))
}

fn parse_annotations<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, Vec<Annotation>> {
    let (input, num_annotations) = be_u16(input)?;
    count(|input| parse_annotation(input, pool), num_annotations as _).parse(input)
}

fn parse_annotation<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, Annotation> {
    let (input, type_index) = be_u16(input)?;
    let type_name = Arc::clone(pool.utf8(type_index)?);
    let (input, num_element_value_pairs) = be_u16(input)?;
    let (input, element_value_pairs) = count(
        |input| parse_element_value_pair(input, pool),
        num_element_value_pairs as _,
    )
    .parse(input)?;

    Ok((
        input,
        Annotation {
            type_name,
            element_value_pairs,
        },
    ))
}

fn parse_element_value_pair<'a>(
    input: &'a [u8],
    pool: &ConstantPool,
) -> PResult<'a, ElementValuePair> {
    let (input, element_name_index) = be_u16(input)?;
    let element_name = Arc::clone(pool.utf8(element_name_index)?);
    let (input, value) = parse_element_value(input, pool)?;
    Ok((
        input,
        ElementValuePair {
            element_name,
            value,
        },
    ))
}

fn parse_element_value<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, ElementValue> {
    let (mut input, tag) = u8(input)?;
    let value = match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => {
            let const_value_index;
            (input, const_value_index) = be_u16(input)?;
            let value = resolve_const(pool, const_value_index)?;
            let value = match (tag, value) {
                (b'B', Const::Int(v)) => Const::Byte(v),
                (b'C', Const::Int(v)) => Const::Char(v),
                (b'S', Const::Int(v)) => Const::Short(v),
                (b'Z', Const::Int(v)) => Const::Boolean(v),
                (b'I', v @ Const::Int(_))
                | (b'J', v @ Const::Long(_))
                | (b'F', v @ Const::Float(_))
                | (b'D', v @ Const::Double(_))
                | (b's', v @ Const::String(_)) => v,
                _ => {
                    return fail(ClassFormatError::BadConstant {
                        index: const_value_index,
                        expected: "annotation constant",
                    });
                }
            };
            ElementValue::Const(value)
        }
        b'e' => {
            let (type_name_index, const_name_index);
            (input, type_name_index) = be_u16(input)?;
            (input, const_name_index) = be_u16(input)?;
            ElementValue::Enum {
                type_name: Arc::clone(pool.utf8(type_name_index)?),
                const_name: Arc::clone(pool.utf8(const_name_index)?),
            }
        }
        b'c' => {
            let class_info_index;
            (input, class_info_index) = be_u16(input)?;
            ElementValue::Class(Arc::clone(pool.utf8(class_info_index)?))
        }
        b'@' => {
            let annotation;
            (input, annotation) = parse_annotation(input, pool)?;
            ElementValue::Annotation(annotation)
        }
        b'[' => {
            let num_values;
            (input, num_values) = be_u16(input)?;
            let values;
            (input, values) =
                count(|input| parse_element_value(input, pool), num_values as _).parse(input)?;
            ElementValue::Array(values)
        }
        _ => {
            return fail(ClassFormatError::Syntax {
                kind: nom::error::ErrorKind::Tag,
                remaining: input.len(),
            });
        }
    };
    Ok((input, value))
}

fn resolve_const(pool: &ConstantPool, index: u16) -> Result<Const, ClassFormatError> {
    Ok(match pool.constant(index)? {
        PooledConstant::Integer(v) => Const::Int(*v),
        PooledConstant::Float(v) => Const::Float(*v),
        PooledConstant::Long(v) => Const::Long(*v),
        PooledConstant::Double(v) => Const::Double(*v),
        // annotation strings point at Utf8, ConstantValue strings at String
        PooledConstant::String(v) | PooledConstant::Utf8(v) => Const::String(Arc::clone(v)),
        _ => {
            return Err(ClassFormatError::BadConstant {
                index,
                expected: "constant value",
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(strings: &[&str]) -> ConstantPool {
        let mut bytes = vec![0, strings.len() as u8 + 1];
        for s in strings {
            bytes.extend_from_slice(&[1, 0, s.len() as u8]);
            bytes.extend_from_slice(s.as_bytes());
        }
        ConstantPool::parse(&bytes).unwrap().1
    }

    fn local_variable(index: u16, start_pc: u16, descriptor: &str) -> LocalVariable {
        LocalVariable {
            start_pc,
            length: 10,
            name: "x".into(),
            descriptor: descriptor.into(),
            index,
            signature: None,
        }
    }

    #[test]
    fn unknown_attribute_skips_declared_length() {
        // 1 "Custom", 2 "Deprecated"
        let pool = pool_of(&["Custom", "Deprecated"]);
        let bytes = [
            0, 2, // count
            0, 1, 0, 0, 0, 3, 0xaa, 0xbb, 0xcc, // Custom, 3 bytes
            0, 2, 0, 0, 0, 0, // Deprecated
            0xff,
        ];
        let (rest, attributes) = parse_attributes(&bytes, &pool).unwrap();
        assert_eq!(rest, &[0xff]);
        assert_eq!(attributes.len(), 2);
        assert_eq!(
            attributes.get("Custom"),
            Some(&StructAttribute::Unknown {
                name: "Custom".into(),
                length: 3
            })
        );
        assert!(attributes.contains("Deprecated"));
    }

    #[test]
    fn known_attribute_must_fill_declared_length() {
        let pool = pool_of(&["Deprecated"]);
        let bytes = [0, 1, 0, 1, 0, 0, 0, 2, 0, 0];
        let err = parse_attributes(&bytes, &pool).unwrap_err();
        assert!(matches!(
            ClassFormatError::from(err),
            ClassFormatError::AttributeLength { declared: 2, actual: 0, .. }
        ));
    }

    #[test]
    fn repeated_local_variable_tables_are_merged() {
        let mut attributes = AttributeMap::default();
        attributes.insert(StructAttribute::LocalVariableTable(LocalVariableTable {
            entries: vec![local_variable(0, 0, "I")],
        }));
        attributes.insert(StructAttribute::Deprecated);
        attributes.insert(StructAttribute::LocalVariableTable(LocalVariableTable {
            entries: vec![local_variable(1, 2, "J")],
        }));
        assert_eq!(attributes.len(), 2);
        let table = attributes.local_variable_table().unwrap();
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries[1].index, 1);
    }

    #[test]
    fn type_table_signatures_are_attached() {
        let mut attributes = AttributeMap::default();
        attributes.insert(StructAttribute::LocalVariableTable(LocalVariableTable {
            entries: vec![
                local_variable(0, 0, "Ljava/util/List;"),
                local_variable(1, 0, "I"),
            ],
        }));
        attributes.insert(StructAttribute::LocalVariableTypeTable(LocalVariableTable {
            entries: vec![local_variable(0, 0, "Ljava/util/List<TT;>;")],
        }));
        attributes.merge_local_variable_signatures();

        let table = attributes.local_variable_table().unwrap();
        assert_eq!(
            table.entries[0].signature.as_deref(),
            Some("Ljava/util/List<TT;>;")
        );
        assert_eq!(table.entries[1].signature, None);
        assert_eq!(table.variable_at(1, 9).map(|v| &*v.descriptor), Some("I"));
        assert!(table.variable_at(1, 10).is_none());
    }
}
