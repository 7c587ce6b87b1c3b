use std::fmt::{self, Display};

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_until,
    character::complete::{char, one_of},
    combinator::{eof, map},
    multi::many0,
    sequence::delimited,
};

use crate::error::ClassFormatError;

type DResult<'a, T> = IResult<&'a str, T, ClassFormatError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor(pub FieldType);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: ReturnType,
}

pub type ReturnType = Option<FieldType>;

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Object(String),
    Short,
    Boolean,
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn is_long(&self) -> bool {
        matches!(self, FieldType::Long | FieldType::Double)
    }

    /// Local variable slots taken by a value of this type.
    pub fn slot_size(&self) -> u16 {
        if self.is_long() { 2 } else { 1 }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => f.write_str("B"),
            FieldType::Char => f.write_str("C"),
            FieldType::Double => f.write_str("D"),
            FieldType::Float => f.write_str("F"),
            FieldType::Int => f.write_str("I"),
            FieldType::Long => f.write_str("J"),
            FieldType::Short => f.write_str("S"),
            FieldType::Boolean => f.write_str("Z"),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(element) => write!(f, "[{element}"),
        }
    }
}

impl MethodDescriptor {
    /// Slots used by the parameters, not counting `this`.
    pub fn parameter_slots(&self) -> u16 {
        self.parameters.iter().map(FieldType::slot_size).sum()
    }
}

pub fn parse_field_descriptor(input: &str) -> Result<FieldDescriptor, ClassFormatError> {
    field_descriptor(input)
        .map(|(_, field_type)| FieldDescriptor(field_type))
        .map_err(|_| ClassFormatError::InvalidDescriptor(input.to_string()))
}

fn field_descriptor(input: &str) -> DResult<'_, FieldType> {
    let (input, field_type) = parse_field_type(input)?;
    eof(input)?;
    Ok((input, field_type))
}

pub fn parse_method_descriptor(input: &str) -> Result<MethodDescriptor, ClassFormatError> {
    method_descriptor(input)
        .map(|(_, descriptor)| descriptor)
        .map_err(|_| ClassFormatError::InvalidDescriptor(input.to_string()))
}

fn method_descriptor(input: &str) -> DResult<'_, MethodDescriptor> {
    let (input, parameters) =
        delimited(char('('), many0(parse_field_type), char(')')).parse(input)?;

    let (input, return_type) = parse_return_type_descriptor(input)?;

    eof(input)?;
    Ok((
        input,
        MethodDescriptor {
            parameters,
            return_type,
        },
    ))
}

pub(crate) fn parse_return_type_descriptor(input: &str) -> DResult<'_, ReturnType> {
    alt((map(parse_field_type, Some), parse_void_type)).parse(input)
}

pub(crate) fn parse_field_type(input: &str) -> DResult<'_, FieldType> {
    alt((parse_base_type, parse_object_type, parse_array_type)).parse(input)
}

pub(crate) fn parse_base_type(input: &str) -> DResult<'_, FieldType> {
    let (input, ch) = one_of("BCDFIJSZ")(input)?;
    let field_type = match ch {
        'B' => FieldType::Byte,
        'C' => FieldType::Char,
        'D' => FieldType::Double,
        'F' => FieldType::Float,
        'I' => FieldType::Int,
        'J' => FieldType::Long,
        'S' => FieldType::Short,
        _ => FieldType::Boolean,
    };
    Ok((input, field_type))
}

fn parse_object_type(input: &str) -> DResult<'_, FieldType> {
    let (input, _) = char('L')(input)?;

    let (input, class_name) = take_until(";")(input)?;

    let (input, _) = char(';')(input)?;

    Ok((input, FieldType::Object(class_name.to_string())))
}

fn parse_array_type(input: &str) -> DResult<'_, FieldType> {
    let (input, _) = char('[')(input)?;

    let (input, field_type) = parse_field_type(input)?;

    Ok((input, FieldType::Array(Box::new(field_type))))
}

fn parse_void_type(input: &str) -> DResult<'_, ReturnType> {
    let (input, _) = char('V')(input)?;
    Ok((input, None))
}
