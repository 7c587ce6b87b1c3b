mod common;

use classfile_model::{
    ClassFormatError, DecompilerOptions, Error, StructClass,
    class::{attributes::StructAttribute, member::StructMember},
    consts::{ClassAccessFlag, MethodAccessFlag},
    signature::{GenericType, TypeArgument},
};

use common::*;

fn sample_class() -> Vec<u8> {
    ClassFileBuilder::new("org/example/Widget", Some("java/lang/Object"))
        .interface("java/lang/Runnable")
        .interface("java/io/Serializable")
        .field(ACC_PUBLIC | ACC_STATIC, "COUNT", "I", Vec::new())
        .field(ACC_PUBLIC, "name", "Ljava/lang/String;", Vec::new())
        .method_with_code("<init>", "()V", &[0x2a, 0xb1])
        .method_with_code("run", "()V", &[0xb1])
        .method(ACC_PUBLIC | ACC_ABSTRACT, "size", "(JLjava/lang/String;)I", Vec::new())
        .class_attribute(|b| {
            let source = b.utf8("Widget.java");
            b.attribute("SourceFile", &source.to_be_bytes())
        })
        .build()
}

#[test]
fn exposes_class_metadata() {
    let class = create(&sample_class());

    assert_eq!(class.qualified_name(), "org/example/Widget");
    assert_eq!(class.super_class(), Some("java/lang/Object"));
    assert_eq!(
        class.interface_names().collect::<Vec<_>>(),
        ["java/lang/Runnable", "java/io/Serializable"]
    );
    assert!(class.has_modifier(ClassAccessFlag::PUBLIC));
    assert!(!class.is_interface());
    assert!(class.is_own());

    assert_eq!(class.fields().len(), 2);
    let count = class.field("COUNT", "I").unwrap();
    assert!(count.is_static());
    assert!(class.field("COUNT", "J").is_none());

    assert_eq!(class.methods().len(), 3);
    let size = class.method("size", "(JLjava/lang/String;)I").unwrap();
    assert!(size.access_flags.contains(MethodAccessFlag::ABSTRACT));
    assert!(!size.contains_code());
    let descriptor = size.method_descriptor().unwrap();
    assert_eq!(descriptor.parameters.len(), 2);

    let run = class.method("run", "()V").unwrap();
    assert!(run.contains_code());
    assert_eq!(run.code().unwrap().code_length, 1);
    assert!(!run.has_attribute("Code"));

    assert!(matches!(
        class.attributes().get("SourceFile"),
        Some(StructAttribute::SourceFile(file)) if &**file == "Widget.java"
    ));
}

#[test]
fn version_predicates_follow_major_and_minor() {
    let released =
        create(&ClassFileBuilder::new("A", Some("java/lang/Object")).version(61, 0).build());
    assert!(released.is_version17());
    assert!(released.is_version8());
    assert!(!released.is_preview_version());
    assert!(released.has_records_support());
    assert!(released.has_sealed_classes_support());
    assert!(!released.has_switch_pattern_matching_support());

    let preview =
        create(&ClassFileBuilder::new("A", Some("java/lang/Object")).version(61, 0xFFFF).build());
    assert!(preview.is_version17());
    assert!(preview.is_preview_version());
    assert!(preview.has_switch_pattern_matching_support());
    assert!(!preview.has_record_pattern_support());

    let sealed_preview =
        create(&ClassFileBuilder::new("A", Some("java/lang/Object")).version(59, 0xFFFF).build());
    assert!(sealed_preview.has_sealed_classes_support());
    assert!(!create(&ClassFileBuilder::new("A", None).version(59, 0).build())
        .has_sealed_classes_support());
}

#[test]
fn ancient_versions_are_normalised() {
    let class =
        create(&ClassFileBuilder::new("A", Some("java/lang/Object")).version(45, 3).build());
    assert_eq!(class.major_version(), 45);
    assert_eq!(class.bytecode_version(), 48);
    assert!(!class.is_version5());
}

#[test]
fn object_has_no_super_class() {
    let class = create(&simple_class("java/lang/Object", None));
    assert_eq!(class.super_class(), None);
}

#[test]
fn rejects_malformed_class_files() {
    let options = DecompilerOptions::default();

    let mut bytes = sample_class();
    bytes[0] = 0xCB;
    assert!(matches!(
        StructClass::create(&bytes, true, None, &options),
        Err(Error::ClassFormat(ClassFormatError::BadMagic(0xCBFE_BABE)))
    ));

    let bytes = sample_class();
    assert!(matches!(
        StructClass::create(&bytes[..bytes.len() - 3], true, None, &options),
        Err(Error::ClassFormat(ClassFormatError::Truncated { .. }))
    ));

    let mut bytes = sample_class();
    bytes.push(0);
    assert!(matches!(
        StructClass::create(&bytes, true, None, &options),
        Err(Error::ClassFormat(ClassFormatError::TrailingData(1)))
    ));
}

#[test]
fn attribute_length_must_match_its_body() {
    let bytes = ClassFileBuilder::new("A", Some("java/lang/Object"))
        .class_attribute(|b| {
            let source = b.utf8("A.java");
            let mut body = source.to_be_bytes().to_vec();
            body.push(0);
            b.attribute("SourceFile", &body)
        })
        .build();
    assert!(matches!(
        StructClass::create(&bytes, true, None, &DecompilerOptions::default()),
        Err(Error::ClassFormat(ClassFormatError::AttributeLength { .. }))
    ));
}

#[test]
fn unknown_attributes_are_kept_opaque() {
    let bytes = ClassFileBuilder::new("A", Some("java/lang/Object"))
        .class_attribute(|b| b.attribute("org.example.Custom", &[1, 2, 3]))
        .build();
    let class = create(&bytes);
    assert!(matches!(
        class.attributes().get("org.example.Custom"),
        Some(StructAttribute::Unknown { length: 3, .. })
    ));
}

#[test]
fn local_variable_type_table_merges_into_table() {
    let bytes = ClassFileBuilder::new("A", Some("java/lang/Object"))
        .method_with(ACC_PUBLIC, "names", "(Ljava/util/List;)V", |b| {
            let table = b.local_variables(
                "LocalVariableTable",
                &[(0, 1, "this", "LA;", 0), (0, 1, "names", "Ljava/util/List;", 1)],
            );
            let types = b.local_variables(
                "LocalVariableTypeTable",
                &[(0, 1, "names", "Ljava/util/List<Ljava/lang/String;>;", 1)],
            );
            vec![b.code(1, 2, &[0xb1], &[], vec![table, types])]
        })
        .build();

    let class = create(&bytes);
    let method = class.method("names", "(Ljava/util/List;)V").unwrap();
    let table = method.attributes().local_variable_table().unwrap();
    assert_eq!(table.entries.len(), 2);
    assert_eq!(table.entries[0].signature, None);
    assert_eq!(
        table.entries[1].signature.as_deref(),
        Some("Ljava/util/List<Ljava/lang/String;>;")
    );
    assert_eq!(&*table.variable_at(1, 0).unwrap().name, "names");
    assert!(table.variable_at(1, 1).is_none());
}

#[test]
fn generic_signatures_need_the_option() {
    let bytes = ClassFileBuilder::new("p/Box", Some("java/lang/Object"))
        .class_attribute(|b| b.signature("<T:Ljava/lang/Object;>Ljava/lang/Object;"))
        .field(ACC_PUBLIC, "value", "Ljava/lang/Object;", Vec::new())
        .build();

    let plain = create(&bytes);
    assert!(plain.signature().is_none());
    assert!(plain.attributes().signature().is_some());

    let generic = StructClass::create(&bytes, true, None, &generic_options()).unwrap();
    let signature = generic.signature().unwrap();
    assert_eq!(signature.type_parameter_names().collect::<Vec<_>>(), ["T"]);
    assert_eq!(
        signature.superclass.class_name(),
        Some("java/lang/Object")
    );
}

#[test]
fn member_signatures_are_parsed_with_the_option() {
    let bytes = ClassFileBuilder::new("p/Holder", Some("java/lang/Object"))
        .field(ACC_PUBLIC, "items", "Ljava/util/List;", Vec::new())
        .build();
    assert!(create(&bytes).field("items", "Ljava/util/List;").unwrap().signature.is_none());

    let mut builder = ClassFileBuilder::new("p/Holder", Some("java/lang/Object"));
    let signature = builder.signature("Ljava/util/List<+Ljava/lang/Number;>;");
    let bytes = builder
        .field(ACC_PUBLIC, "items", "Ljava/util/List;", vec![signature])
        .build();
    let class = StructClass::create(&bytes, true, None, &generic_options()).unwrap();
    let field = class.field("items", "Ljava/util/List;").unwrap();
    let field_type = &field.signature.as_ref().unwrap().field_type;
    assert_eq!(field_type.class_name(), Some("java/util/List"));
    assert!(matches!(
        field_type.arguments(),
        [TypeArgument::Extends(GenericType::Class(bound))] if bound.name == "java/lang/Number"
    ));
}

#[test]
fn pool_without_loader_is_never_released() {
    let class = create(&sample_class());
    class.release_resources();
    assert!(class.is_pool_loaded());
    assert!(class.pool().unwrap().len() > 1);
}

#[test]
fn expanding_without_loader_reports_missing_link() {
    let class = create(&sample_class());
    let run = class.method("run", "()V").unwrap();
    assert!(matches!(
        run.expand_data(&class),
        Err(Error::MissingLink(name)) if name == "org/example/Widget"
    ));
    assert!(!run.is_expanded());
}
