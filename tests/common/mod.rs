#![allow(dead_code)]

use std::{collections::HashMap, fs::File, io::Write, path::Path};

use classfile_model::{DecompilerOptions, StructClass};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

/// Assembles class files byte by byte.
pub struct ClassFileBuilder {
    minor_version: u16,
    major_version: u16,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    pool: Vec<u8>,
    pool_count: u16,
    utf8_indices: HashMap<String, u16>,
    class_indices: HashMap<String, u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassFileBuilder {
    pub fn new(name: &str, super_class: Option<&str>) -> Self {
        let mut builder = Self {
            minor_version: 0,
            major_version: 52,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            pool: Vec::new(),
            pool_count: 1,
            utf8_indices: HashMap::new(),
            class_indices: HashMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        if let Some(super_class) = super_class {
            builder.super_class = builder.class(super_class);
        }
        builder
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    pub fn access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    fn push_constant(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.pool_count;
        self.pool.extend_from_slice(bytes);
        self.pool_count += slots;
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&index) = self.utf8_indices.get(value) {
            return index;
        }
        let mut bytes = vec![1];
        bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        bytes.extend_from_slice(value.as_bytes());
        let index = self.push_constant(&bytes, 1);
        self.utf8_indices.insert(value.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.class_indices.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let mut bytes = vec![7];
        bytes.extend_from_slice(&name_index.to_be_bytes());
        let index = self.push_constant(&bytes, 1);
        self.class_indices.insert(name.to_string(), index);
        index
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        let mut bytes = vec![8];
        bytes.extend_from_slice(&utf8.to_be_bytes());
        self.push_constant(&bytes, 1)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut bytes = vec![3];
        bytes.extend_from_slice(&value.to_be_bytes());
        self.push_constant(&bytes, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut bytes = vec![5];
        bytes.extend_from_slice(&value.to_be_bytes());
        self.push_constant(&bytes, 2)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut name_and_type = vec![12];
        name_and_type.extend_from_slice(&name.to_be_bytes());
        name_and_type.extend_from_slice(&descriptor.to_be_bytes());
        let name_and_type = self.push_constant(&name_and_type, 1);
        let mut bytes = vec![10];
        bytes.extend_from_slice(&class.to_be_bytes());
        bytes.extend_from_slice(&name_and_type.to_be_bytes());
        self.push_constant(&bytes, 1)
    }

    /// Encoded `attribute_info`.
    pub fn attribute(&mut self, name: &str, body: &[u8]) -> Vec<u8> {
        let mut bytes = self.utf8(name).to_be_bytes().to_vec();
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    pub fn signature(&mut self, signature: &str) -> Vec<u8> {
        let index = self.utf8(signature);
        self.attribute("Signature", &index.to_be_bytes())
    }

    /// `Code` attribute; `handlers` are `(start, end, handler, catch type)`.
    pub fn code(
        &mut self,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
        handlers: &[(u16, u16, u16, Option<&str>)],
        attributes: Vec<Vec<u8>>,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&max_stack.to_be_bytes());
        body.extend_from_slice(&max_locals.to_be_bytes());
        body.extend_from_slice(&(code.len() as u32).to_be_bytes());
        body.extend_from_slice(code);
        body.extend_from_slice(&(handlers.len() as u16).to_be_bytes());
        for &(start, end, handler, catch_type) in handlers {
            let catch_type = catch_type.map_or(0, |name| self.class(name));
            for value in [start, end, handler, catch_type] {
                body.extend_from_slice(&value.to_be_bytes());
            }
        }
        body.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            body.extend_from_slice(&attribute);
        }
        self.attribute("Code", &body)
    }

    /// `LocalVariableTable` or `LocalVariableTypeTable`, entries as
    /// `(start_pc, length, name, descriptor or signature, index)`.
    pub fn local_variables(
        &mut self,
        table: &str,
        entries: &[(u16, u16, &str, &str, u16)],
    ) -> Vec<u8> {
        let mut body = (entries.len() as u16).to_be_bytes().to_vec();
        for &(start_pc, length, name, descriptor, index) in entries {
            let name = self.utf8(name);
            let descriptor = self.utf8(descriptor);
            for value in [start_pc, length, name, descriptor, index] {
                body.extend_from_slice(&value.to_be_bytes());
            }
        }
        self.attribute(table, &body)
    }

    pub fn field(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) -> Self {
        let member = self.member(access_flags, name, descriptor, attributes);
        self.fields.push(member);
        self
    }

    pub fn method(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) -> Self {
        let member = self.member(access_flags, name, descriptor, attributes);
        self.methods.push(member);
        self
    }

    /// Method whose body is `code` with no handlers.
    pub fn method_with_code(self, name: &str, descriptor: &str, code: &[u8]) -> Self {
        self.method_with(ACC_PUBLIC, name, descriptor, |builder| {
            vec![builder.code(4, 4, code, &[], Vec::new())]
        })
    }

    /// Method whose attributes need pool entries of this builder.
    pub fn method_with(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: impl FnOnce(&mut Self) -> Vec<Vec<u8>>,
    ) -> Self {
        let attributes = attributes(&mut self);
        self.method(access_flags, name, descriptor, attributes)
    }

    pub fn class_attribute(mut self, attribute: impl FnOnce(&mut Self) -> Vec<u8>) -> Self {
        let attribute = attribute(&mut self);
        self.attributes.push(attribute);
        self
    }

    fn member(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) -> Vec<u8> {
        let mut bytes = access_flags.to_be_bytes().to_vec();
        bytes.extend_from_slice(&self.utf8(name).to_be_bytes());
        bytes.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
        bytes.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            bytes.extend_from_slice(&attribute);
        }
        bytes
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = 0xCAFE_BABEu32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&self.minor_version.to_be_bytes());
        bytes.extend_from_slice(&self.major_version.to_be_bytes());
        bytes.extend_from_slice(&self.pool_count.to_be_bytes());
        bytes.extend_from_slice(&self.pool);
        bytes.extend_from_slice(&self.access_flags.to_be_bytes());
        bytes.extend_from_slice(&self.this_class.to_be_bytes());
        bytes.extend_from_slice(&self.super_class.to_be_bytes());
        bytes.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            bytes.extend_from_slice(&interface.to_be_bytes());
        }
        for members in [&self.fields, &self.methods, &self.attributes] {
            bytes.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for member in members {
                bytes.extend_from_slice(member);
            }
        }
        bytes
    }
}

/// Minimal class `name` extending `super_class`.
pub fn simple_class(name: &str, super_class: Option<&str>) -> Vec<u8> {
    ClassFileBuilder::new(name, super_class).build()
}

pub fn create(bytes: &[u8]) -> StructClass {
    StructClass::create(bytes, true, None, &DecompilerOptions::default()).unwrap()
}

pub fn generic_options() -> DecompilerOptions {
    DecompilerOptions {
        decompile_generic_signatures: true,
        ..DecompilerOptions::default()
    }
}

/// Writes an uncompressed zip with `entries` in order; names ending in `/`
/// become directories.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
    }
    zip.finish().unwrap();
}
