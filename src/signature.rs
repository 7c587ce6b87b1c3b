//! Generic signatures as stored in `Signature` attributes.

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::{eof, map, opt, value},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded},
};

use crate::{
    descriptor::{FieldType, parse_base_type},
    error::ClassFormatError,
};

type SResult<'a, T> = IResult<&'a str, T, ClassFormatError>;

/// Type variable name to the type argument it stands for.
pub type GenericMap = HashMap<String, TypeArgument>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericType {
    Base(FieldType),
    Class(ClassType),
    TypeVariable(String),
    Array(Box<GenericType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassType {
    /// Binary name, inner classes joined with `$`.
    pub name: String,
    pub arguments: Vec<TypeArgument>,
    /// Outer classes from outermost, for `Outer<T>.Inner` forms.
    pub enclosing: Vec<ClassType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeArgument {
    Unbounded,
    Exact(GenericType),
    Extends(GenericType),
    Super(GenericType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    pub class_bound: Option<GenericType>,
    pub interface_bounds: Vec<GenericType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericClassDescriptor {
    pub type_parameters: Vec<TypeParameter>,
    pub superclass: GenericType,
    pub superinterfaces: Vec<GenericType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericFieldDescriptor {
    pub field_type: GenericType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericMethodDescriptor {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<GenericType>,
    pub return_type: Option<GenericType>,
    pub exceptions: Vec<GenericType>,
}

impl GenericType {
    pub fn class_name(&self) -> Option<&str> {
        match self {
            GenericType::Class(class) => Some(&class.name),
            _ => None,
        }
    }

    pub fn arguments(&self) -> &[TypeArgument] {
        match self {
            GenericType::Class(class) => &class.arguments,
            _ => &[],
        }
    }

    /// Replaces type variables bound in `map`.
    ///
    /// A variable bound to a wildcard can only be replaced where a type argument
    /// is allowed; elsewhere (array elements, bounds) it stays a variable.
    pub fn substitute(&self, map: &GenericMap) -> GenericType {
        match self {
            GenericType::Base(_) => self.clone(),
            GenericType::TypeVariable(name) => match map.get(name) {
                Some(TypeArgument::Exact(replacement)) => replacement.clone(),
                _ => self.clone(),
            },
            GenericType::Array(element) => GenericType::Array(Box::new(element.substitute(map))),
            GenericType::Class(class) => GenericType::Class(class.substitute(map)),
        }
    }
}

impl ClassType {
    fn substitute(&self, map: &GenericMap) -> ClassType {
        ClassType {
            name: self.name.clone(),
            arguments: self.arguments.iter().map(|a| a.substitute(map)).collect(),
            enclosing: self.enclosing.iter().map(|c| c.substitute(map)).collect(),
        }
    }
}

impl TypeArgument {
    pub fn substitute(&self, map: &GenericMap) -> TypeArgument {
        let bound_variable = |t: &GenericType| match t {
            GenericType::TypeVariable(name) => map.get(name).cloned(),
            _ => None,
        };
        match self {
            TypeArgument::Unbounded => TypeArgument::Unbounded,
            TypeArgument::Exact(t) => {
                bound_variable(t).unwrap_or_else(|| TypeArgument::Exact(t.substitute(map)))
            }
            TypeArgument::Extends(t) => match bound_variable(t) {
                Some(TypeArgument::Exact(u) | TypeArgument::Extends(u)) => TypeArgument::Extends(u),
                Some(TypeArgument::Super(_) | TypeArgument::Unbounded) => TypeArgument::Unbounded,
                None => TypeArgument::Extends(t.substitute(map)),
            },
            TypeArgument::Super(t) => match bound_variable(t) {
                Some(TypeArgument::Exact(u) | TypeArgument::Super(u)) => TypeArgument::Super(u),
                Some(TypeArgument::Extends(_) | TypeArgument::Unbounded) => TypeArgument::Unbounded,
                None => TypeArgument::Super(t.substitute(map)),
            },
        }
    }
}

impl Display for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericType::Base(base) => write!(f, "{base}"),
            GenericType::Class(class) => write!(f, "{class}"),
            GenericType::TypeVariable(name) => write!(f, "T{name};"),
            GenericType::Array(element) => write!(f, "[{element}"),
        }
    }
}

impl Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[TypeArgument]) -> fmt::Result {
            if arguments.is_empty() {
                return Ok(());
            }
            f.write_str("<")?;
            for argument in arguments {
                write!(f, "{argument}")?;
            }
            f.write_str(">")
        }

        f.write_str("L")?;
        let mut previous: Option<&str> = None;
        for part in self.enclosing.iter().chain(std::iter::once(self)) {
            match previous {
                None => f.write_str(&part.name)?,
                Some(outer) => {
                    let simple = part
                        .name
                        .strip_prefix(outer)
                        .and_then(|rest| rest.strip_prefix('$'))
                        .unwrap_or(&part.name);
                    write!(f, ".{simple}")?;
                }
            }
            write_arguments(f, &part.arguments)?;
            previous = Some(&part.name);
        }
        f.write_str(";")
    }
}

impl Display for TypeArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArgument::Unbounded => f.write_str("*"),
            TypeArgument::Exact(t) => write!(f, "{t}"),
            TypeArgument::Extends(t) => write!(f, "+{t}"),
            TypeArgument::Super(t) => write!(f, "-{t}"),
        }
    }
}

impl GenericClassDescriptor {
    pub fn type_parameter_names(&self) -> impl Iterator<Item = &str> {
        self.type_parameters.iter().map(|p| p.name.as_str())
    }

    /// Binds this class's type parameters to the arguments of `usage`.
    ///
    /// Raw usages and argument count mismatches give an empty map.
    pub fn generic_map(&self, usage: &GenericType) -> GenericMap {
        let arguments = usage.arguments();
        if self.type_parameters.is_empty() || arguments.len() != self.type_parameters.len() {
            return GenericMap::new();
        }
        self.type_parameters
            .iter()
            .zip(arguments)
            .map(|(parameter, argument)| (parameter.name.clone(), argument.clone()))
            .collect()
    }
}

pub fn parse_class_signature(input: &str) -> Result<GenericClassDescriptor, ClassFormatError> {
    class_signature(input)
        .map(|(_, signature)| signature)
        .map_err(|_| ClassFormatError::InvalidDescriptor(input.to_string()))
}

pub fn parse_field_signature(input: &str) -> Result<GenericFieldDescriptor, ClassFormatError> {
    field_signature(input)
        .map(|(_, signature)| signature)
        .map_err(|_| ClassFormatError::InvalidDescriptor(input.to_string()))
}

pub fn parse_method_signature(input: &str) -> Result<GenericMethodDescriptor, ClassFormatError> {
    method_signature(input)
        .map(|(_, signature)| signature)
        .map_err(|_| ClassFormatError::InvalidDescriptor(input.to_string()))
}

fn class_signature(input: &str) -> SResult<'_, GenericClassDescriptor> {
    let (input, type_parameters) = opt(type_parameters).parse(input)?;
    let (input, superclass) = map(class_type_signature, GenericType::Class).parse(input)?;
    let (input, superinterfaces) =
        many0(map(class_type_signature, GenericType::Class)).parse(input)?;
    eof(input)?;
    Ok((
        input,
        GenericClassDescriptor {
            type_parameters: type_parameters.unwrap_or_default(),
            superclass,
            superinterfaces,
        },
    ))
}

fn field_signature(input: &str) -> SResult<'_, GenericFieldDescriptor> {
    let (input, field_type) = reference_type(input)?;
    eof(input)?;
    Ok((input, GenericFieldDescriptor { field_type }))
}

fn method_signature(input: &str) -> SResult<'_, GenericMethodDescriptor> {
    let (input, type_parameters) = opt(type_parameters).parse(input)?;
    let (input, parameters) = delimited(char('('), many0(java_type), char(')')).parse(input)?;
    let (input, return_type) = alt((map(java_type, Some), value(None, char('V')))).parse(input)?;
    let (input, exceptions) = many0(preceded(
        char('^'),
        alt((map(class_type_signature, GenericType::Class), type_variable)),
    ))
    .parse(input)?;
    eof(input)?;
    Ok((
        input,
        GenericMethodDescriptor {
            type_parameters: type_parameters.unwrap_or_default(),
            parameters,
            return_type,
            exceptions,
        },
    ))
}

fn identifier(input: &str) -> SResult<'_, &str> {
    take_while1(|c: char| !".;[/<>:".contains(c))(input)
}

fn type_parameters(input: &str) -> SResult<'_, Vec<TypeParameter>> {
    delimited(char('<'), many1(type_parameter), char('>')).parse(input)
}

fn type_parameter(input: &str) -> SResult<'_, TypeParameter> {
    let (input, name) = identifier(input)?;
    let (input, class_bound) = preceded(char(':'), opt(reference_type)).parse(input)?;
    let (input, interface_bounds) = many0(preceded(char(':'), reference_type)).parse(input)?;
    Ok((
        input,
        TypeParameter {
            name: name.to_string(),
            class_bound,
            interface_bounds,
        },
    ))
}

fn java_type(input: &str) -> SResult<'_, GenericType> {
    alt((reference_type, map(parse_base_type, GenericType::Base))).parse(input)
}

fn reference_type(input: &str) -> SResult<'_, GenericType> {
    alt((
        map(class_type_signature, GenericType::Class),
        type_variable,
        array_type,
    ))
    .parse(input)
}

fn type_variable(input: &str) -> SResult<'_, GenericType> {
    map(delimited(char('T'), identifier, char(';')), |name: &str| {
        GenericType::TypeVariable(name.to_string())
    })
    .parse(input)
}

fn array_type(input: &str) -> SResult<'_, GenericType> {
    map(preceded(char('['), java_type), |element| {
        GenericType::Array(Box::new(element))
    })
    .parse(input)
}

fn class_type_signature(input: &str) -> SResult<'_, ClassType> {
    let (input, _) = char('L')(input)?;
    let (input, segments) = separated_list1(char('/'), identifier).parse(input)?;
    let (input, arguments) = opt(type_arguments).parse(input)?;
    let (input, suffixes) =
        many0(preceded(char('.'), pair(identifier, opt(type_arguments)))).parse(input)?;
    let (input, _) = char(';')(input)?;

    let mut current = ClassType {
        name: segments.join("/"),
        arguments: arguments.unwrap_or_default(),
        enclosing: Vec::new(),
    };
    for (simple, arguments) in suffixes {
        let mut enclosing = std::mem::take(&mut current.enclosing);
        let name = format!("{}${simple}", current.name);
        enclosing.push(current);
        current = ClassType {
            name,
            arguments: arguments.unwrap_or_default(),
            enclosing,
        };
    }
    Ok((input, current))
}

fn type_arguments(input: &str) -> SResult<'_, Vec<TypeArgument>> {
    delimited(char('<'), many1(type_argument), char('>')).parse(input)
}

fn type_argument(input: &str) -> SResult<'_, TypeArgument> {
    alt((
        value(TypeArgument::Unbounded, char('*')),
        map(preceded(char('+'), reference_type), TypeArgument::Extends),
        map(preceded(char('-'), reference_type), TypeArgument::Super),
        map(reference_type, TypeArgument::Exact),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> GenericType {
        GenericType::TypeVariable(name.to_string())
    }

    #[test]
    fn parses_class_signature_with_bounds() {
        let signature = parse_class_signature(
            "<K:Ljava/lang/Object;V::Ljava/lang/Comparable<TV;>;>\
             Ljava/util/AbstractMap<TK;TV;>;Ljava/io/Serializable;",
        )
        .unwrap();
        let names: Vec<_> = signature.type_parameter_names().collect();
        assert_eq!(names, ["K", "V"]);
        assert!(signature.type_parameters[1].class_bound.is_none());
        assert_eq!(signature.type_parameters[1].interface_bounds.len(), 1);
        assert_eq!(signature.superclass.class_name(), Some("java/util/AbstractMap"));
        assert_eq!(
            signature.superclass.arguments(),
            &[TypeArgument::Exact(var("K")), TypeArgument::Exact(var("V"))]
        );
        assert_eq!(signature.superinterfaces.len(), 1);
    }

    #[test]
    fn parses_inner_class_types_and_displays_them_back() {
        let text = "Lpkg/Outer<TT;>.Inner<+Ljava/lang/Number;>;";
        let signature = parse_field_signature(text).unwrap();
        let GenericType::Class(class) = &signature.field_type else {
            panic!("expected class type");
        };
        assert_eq!(class.name, "pkg/Outer$Inner");
        assert_eq!(class.enclosing.len(), 1);
        assert_eq!(class.enclosing[0].arguments, vec![TypeArgument::Exact(var("T"))]);
        assert_eq!(signature.field_type.to_string(), text);
    }

    #[test]
    fn parses_method_signature() {
        let signature = parse_method_signature(
            "<E:Ljava/lang/Exception;>([TE;I)Ljava/util/List<*>;^TE;^Ljava/io/IOException;",
        )
        .unwrap();
        assert_eq!(signature.type_parameters.len(), 1);
        assert_eq!(
            signature.parameters,
            vec![GenericType::Array(Box::new(var("E"))), GenericType::Base(FieldType::Int)]
        );
        assert_eq!(
            signature.return_type.as_ref().map(|t| t.arguments().to_vec()),
            Some(vec![TypeArgument::Unbounded])
        );
        assert_eq!(signature.exceptions.len(), 2);
        assert!(parse_method_signature("()V").unwrap().return_type.is_none());
    }

    #[test]
    fn substitution_respects_wildcards() {
        let mut map = GenericMap::new();
        map.insert("T".into(), TypeArgument::Exact(var("X")));
        map.insert("U".into(), TypeArgument::Super(var("Y")));

        assert_eq!(
            TypeArgument::Extends(var("T")).substitute(&map),
            TypeArgument::Extends(var("X"))
        );
        assert_eq!(TypeArgument::Extends(var("U")).substitute(&map), TypeArgument::Unbounded);
        assert_eq!(
            TypeArgument::Exact(var("U")).substitute(&map),
            TypeArgument::Super(var("Y"))
        );
        assert_eq!(
            GenericType::Array(Box::new(var("T"))).substitute(&map),
            GenericType::Array(Box::new(var("X")))
        );
    }

    #[test]
    fn generic_map_degrades_on_arity_mismatch() {
        let signature = parse_class_signature("<A:Ljava/lang/Object;>Ljava/lang/Object;").unwrap();
        let usage = parse_field_signature("Lp/C<TX;TY;>;").unwrap().field_type;
        assert!(signature.generic_map(&usage).is_empty());
        let usage = parse_field_signature("Lp/C<TX;>;").unwrap().field_type;
        assert_eq!(
            signature.generic_map(&usage).get("A"),
            Some(&TypeArgument::Exact(var("X")))
        );
    }

    #[test]
    fn rejects_malformed_signature() {
        assert!(parse_class_signature("<T>Ljava/lang/Object;").is_err());
        assert!(parse_field_signature("Ljava/util/List<>;").is_err());
    }
}
