mod common;

use std::sync::Arc;

use classfile_model::{
    ClassFormatError, DecompilerOptions, Error, StructContext,
    code::{Group, opcodes},
};

use common::*;

fn be32(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}

/// `int pick(int)` built around one switch instruction at offset 1.
fn switch_method(switch: &[u8]) -> Vec<u8> {
    let mut code = vec![opcodes::ILOAD_1];
    code.extend_from_slice(switch);
    code.extend_from_slice(&[
        opcodes::ICONST_0,
        opcodes::IRETURN,
        opcodes::ICONST_1,
        opcodes::IRETURN,
        opcodes::ICONST_M1,
        opcodes::IRETURN,
    ]);
    ClassFileBuilder::new("p/Switch", Some("java/lang/Object"))
        .method_with_code("pick", "(I)I", &code)
        .build()
}

fn context_with(bytes: &[u8]) -> StructContext {
    let mut context = StructContext::new(DecompilerOptions::default());
    context.add_data("memory", "Class.class", bytes, true).unwrap();
    context
}

#[test]
fn tableswitch_targets_resolve_to_instructions() {
    // padding 2, default -> 28, cases 0 -> 24, 1 -> 26
    let mut switch = vec![opcodes::TABLESWITCH, 0, 0];
    for value in [27, 0, 1, 23, 25] {
        switch.extend_from_slice(&be32(value));
    }
    let context = context_with(&switch_method(&switch));
    let class = context.class("p/Switch").unwrap();
    let method = class.method("pick", "(I)I").unwrap();
    method.expand_data(class).unwrap();

    let sequence = method.instruction_sequence().unwrap();
    assert_eq!(sequence.len(), 8);
    let instruction = sequence.instruction(1).unwrap();
    assert_eq!(instruction.group, Group::Switch);
    assert_eq!(instruction.length, 23);
    assert_eq!(instruction.operands.len(), 3 + 2);
    let table = instruction.switch_table.as_ref().unwrap();
    assert_eq!(table.default, 6);
    assert_eq!(table.values, vec![0, 1]);
    assert_eq!(table.destinations, vec![2, 4]);
    assert_eq!(sequence.offset(2), Some(24));
}

#[test]
fn lookupswitch_reads_key_target_pairs() {
    // padding 2, default -> 32, 10 -> 28, 20 -> 30
    let mut switch = vec![opcodes::LOOKUPSWITCH, 0, 0];
    for value in [31, 2, 10, 27, 20, 29] {
        switch.extend_from_slice(&be32(value));
    }
    let context = context_with(&switch_method(&switch));
    let class = context.class("p/Switch").unwrap();
    let method = class.method("pick", "(I)I").unwrap();
    method.expand_data(class).unwrap();

    let sequence = method.instruction_sequence().unwrap();
    let instruction = sequence.instruction(1).unwrap();
    assert_eq!(instruction.length, 27);
    assert_eq!(instruction.operands.len(), 2 + 2 * 2);
    let table = instruction.switch_table.as_ref().unwrap();
    assert_eq!(table.values, vec![10, 20]);
    assert_eq!(table.destinations, vec![2, 4]);
    assert_eq!(table.default, 6);
}

#[test]
fn expand_release_expand_is_stable() {
    let mut builder = ClassFileBuilder::new("p/Calls", Some("java/lang/Object"));
    let hash_code = builder.method_ref("java/lang/Object", "hashCode", "()I");
    let [high, low] = hash_code.to_be_bytes();
    let bytes = builder
        .method_with_code(
            "call",
            "()V",
            &[opcodes::ALOAD_0, opcodes::INVOKEVIRTUAL, high, low, opcodes::POP, opcodes::RETURN],
        )
        .build();
    let context = context_with(&bytes);
    let class = context.class("p/Calls").unwrap();
    let method = class.method("call", "()V").unwrap();

    assert!(!method.is_expanded());
    method.expand_data(class).unwrap();
    let first = method.instruction_sequence().unwrap();
    assert_eq!(first.instruction(1).unwrap().operands, vec![hash_code as i32]);

    method.expand_data(class).unwrap();
    assert!(Arc::ptr_eq(&first, &method.instruction_sequence().unwrap()));

    method.release_resources();
    class.release_resources();
    assert!(!method.is_expanded());
    assert!(!class.is_pool_loaded());

    method.expand_data(class).unwrap();
    assert_eq!(*first, *method.instruction_sequence().unwrap());
    assert!(class.is_pool_loaded());
}

#[test]
fn exception_handlers_map_to_instruction_indices() {
    let mut builder = ClassFileBuilder::new("p/Guard", Some("java/lang/Object"));
    let hash_code = builder.method_ref("java/lang/Object", "hashCode", "()I");
    let [high, low] = hash_code.to_be_bytes();
    // 0 aload_0, 1 invokevirtual, 4 return, 5 astore_1, 6 return
    let code = [
        opcodes::ALOAD_0,
        opcodes::INVOKEVIRTUAL,
        high,
        low,
        opcodes::RETURN,
        opcodes::ASTORE_1,
        opcodes::RETURN,
    ];
    let bytes = builder
        .method_with(ACC_PUBLIC, "guarded", "()V", |b| {
            vec![b.code(
                2,
                2,
                &code,
                &[(0, 4, 5, Some("java/lang/Exception")), (0, 7, 5, None)],
                Vec::new(),
            )]
        })
        .build();
    let context = context_with(&bytes);
    let class = context.class("p/Guard").unwrap();
    let method = class.method("guarded", "()V").unwrap();
    assert_eq!(method.code().unwrap().exception_table_length, 2);
    method.expand_data(class).unwrap();

    let sequence = method.instruction_sequence().unwrap();
    let handlers = &sequence.exception_table().handlers;
    assert_eq!(handlers.len(), 2);
    assert_eq!(handlers[0].exception_class.as_deref(), Some("java/lang/Exception"));
    assert_eq!(
        (handlers[0].from_instruction, handlers[0].to_instruction, handlers[0].handler_instruction),
        (0, 2, 3)
    );
    assert_eq!(handlers[1].exception_class, None);
    assert_eq!(handlers[1].to_instruction, sequence.len());
}

#[test]
fn malformed_bodies_fail_expansion() {
    let bytes = ClassFileBuilder::new("p/Bad", Some("java/lang/Object"))
        .method_with_code("jump", "()V", &[opcodes::GOTO, 0, 1, opcodes::RETURN])
        .method_with_code("short", "()V", &[opcodes::NOP, opcodes::SIPUSH, 1])
        .build();
    let context = context_with(&bytes);
    let class = context.class("p/Bad").unwrap();

    let jump = class.method("jump", "()V").unwrap();
    assert!(matches!(
        jump.expand_data(class),
        Err(Error::ClassFormat(ClassFormatError::BadJumpTarget { from: 0, to: 1 }))
    ));
    assert!(!jump.is_expanded());

    let short = class.method("short", "()V").unwrap();
    assert!(matches!(
        short.expand_data(class),
        Err(Error::ClassFormat(ClassFormatError::CodeOverrun { offset: 1, .. }))
    ));
}

#[test]
fn methods_without_code_expand_to_nothing() {
    let bytes = ClassFileBuilder::new("p/Shape", Some("java/lang/Object"))
        .access(ACC_PUBLIC | ACC_ABSTRACT)
        .method(ACC_PUBLIC | ACC_ABSTRACT, "area", "()D", Vec::new())
        .build();
    let context = context_with(&bytes);
    let class = context.class("p/Shape").unwrap();
    let area = class.method("area", "()D").unwrap();
    area.expand_data(class).unwrap();
    assert!(area.instruction_sequence().is_none());
}
