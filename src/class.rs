//! Typed model of a single class file.

pub mod attributes;
pub mod constant_pool;
pub mod member;
pub(crate) mod parser;
pub mod stream;

use std::{collections::HashMap, sync::Arc};

use log::warn;
use parking_lot::Mutex;

use crate::{
    consts::{
        BYTECODE_JAVA_5, BYTECODE_JAVA_7, BYTECODE_JAVA_8, BYTECODE_JAVA_11, BYTECODE_JAVA_12,
        BYTECODE_JAVA_14, BYTECODE_JAVA_15, BYTECODE_JAVA_16, BYTECODE_JAVA_17, BYTECODE_JAVA_19,
        BYTECODE_JAVA_21, BYTECODE_JAVA_LE_4, ClassAccessFlag, PREVIEW_MINOR_VERSION,
    },
    context::loader::LazyLoader,
    error::{Error, Result},
    options::DecompilerOptions,
    signature::{GenericClassDescriptor, parse_class_signature},
};

use self::{
    attributes::AttributeMap,
    constant_pool::ConstantPool,
    member::{StructField, StructMethod, StructRecordComponent},
};

/// Key used for member lookups: `name` and `descriptor` joined by a space.
pub fn member_key(name: &str, descriptor: &str) -> String {
    format!("{name} {descriptor}")
}

#[derive(Debug)]
pub struct StructClass {
    qualified_name: Arc<str>,
    super_class: Option<Arc<str>>,
    interfaces: Vec<Arc<str>>,
    pub access_flags: ClassAccessFlag,
    minor_version: u16,
    major_version: u16,
    bytecode_version: u16,
    own: bool,
    loader: Option<Arc<LazyLoader>>,
    pool: Mutex<Option<Arc<ConstantPool>>>,
    attributes: AttributeMap,
    signature: Option<GenericClassDescriptor>,
    fields: Vec<StructField>,
    methods: Vec<StructMethod>,
    field_keys: HashMap<String, usize>,
    method_keys: HashMap<String, usize>,
}

impl StructClass {
    /// Parses a complete class file.
    ///
    /// `loader` is used later to reload the constant pool and method bodies
    /// after [`release_resources`](Self::release_resources).
    pub fn create(
        bytes: &[u8],
        own: bool,
        loader: Option<Arc<LazyLoader>>,
        options: &DecompilerOptions,
    ) -> Result<StructClass> {
        let generics = options.decompile_generic_signatures;
        let mut file = parser::class_file(bytes, generics)?;

        if generics {
            if let Some(components) = file.attributes.record_components_mut() {
                components
                    .iter_mut()
                    .for_each(StructRecordComponent::attach_signature);
            }
        }
        let signature = match (generics, file.attributes.signature()) {
            (true, Some(text)) => match parse_class_signature(text) {
                Ok(signature) => Some(signature),
                Err(err) => {
                    warn!("ignoring signature of class {}: {err}", file.this_class);
                    None
                }
            },
            _ => None,
        };

        let field_keys = file
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (member_key(&f.name, &f.descriptor), i))
            .collect();
        let method_keys = file
            .methods
            .iter()
            .enumerate()
            .map(|(i, m)| (member_key(&m.name, &m.descriptor), i))
            .collect();

        Ok(StructClass {
            qualified_name: file.this_class,
            super_class: file.super_class,
            interfaces: file.interfaces,
            access_flags: file.access_flags,
            minor_version: file.minor_version,
            major_version: file.major_version,
            bytecode_version: file.major_version.max(BYTECODE_JAVA_LE_4),
            own,
            loader,
            pool: Mutex::new(Some(Arc::new(file.constant_pool))),
            attributes: file.attributes,
            signature,
            fields: file.fields,
            methods: file.methods,
            field_keys,
            method_keys,
        })
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn super_class(&self) -> Option<&str> {
        self.super_class.as_deref()
    }

    pub fn interface_names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(|name| &**name)
    }

    pub fn is_own(&self) -> bool {
        self.own
    }

    pub fn loader(&self) -> Option<&Arc<LazyLoader>> {
        self.loader.as_ref()
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn signature(&self) -> Option<&GenericClassDescriptor> {
        self.signature.as_ref()
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    pub fn methods(&self) -> &[StructMethod] {
        &self.methods
    }

    pub fn field(&self, name: &str, descriptor: &str) -> Option<&StructField> {
        self.field_keys
            .get(&member_key(name, descriptor))
            .map(|&i| &self.fields[i])
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&StructMethod> {
        self.method_keys
            .get(&member_key(name, descriptor))
            .map(|&i| &self.methods[i])
    }

    pub fn record_components(&self) -> Option<&[StructRecordComponent]> {
        self.attributes.record_components()
    }

    pub fn has_modifier(&self, flag: ClassAccessFlag) -> bool {
        self.access_flags.contains(flag)
    }

    pub fn is_interface(&self) -> bool {
        self.has_modifier(ClassAccessFlag::INTERFACE)
    }

    pub fn is_enum(&self) -> bool {
        self.has_modifier(ClassAccessFlag::ENUM)
    }

    pub fn is_record(&self) -> bool {
        self.record_components().is_some()
    }

    /// Constant pool, reloaded through the loader when it was released.
    pub fn pool(&self) -> Result<Arc<ConstantPool>> {
        let mut pool = self.pool.lock();
        if let Some(pool) = &*pool {
            return Ok(Arc::clone(pool));
        }
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| Error::MissingLink(self.qualified_name.to_string()))?;
        let reloaded = Arc::new(loader.load_pool(&self.qualified_name)?);
        *pool = Some(Arc::clone(&reloaded));
        Ok(reloaded)
    }

    /// Drops the constant pool; only done when it can be reloaded.
    pub fn release_resources(&self) {
        if self.loader.is_some() {
            self.pool.lock().take();
        }
    }

    pub fn is_pool_loaded(&self) -> bool {
        self.pool.lock().is_some()
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    pub fn bytecode_version(&self) -> u16 {
        self.bytecode_version
    }

    pub fn is_version(&self, minimum: u16) -> bool {
        self.major_version >= minimum
    }

    pub fn is_version5(&self) -> bool {
        self.is_version(BYTECODE_JAVA_5)
    }

    pub fn is_version7(&self) -> bool {
        self.is_version(BYTECODE_JAVA_7)
    }

    pub fn is_version8(&self) -> bool {
        self.is_version(BYTECODE_JAVA_8)
    }

    pub fn is_version11(&self) -> bool {
        self.is_version(BYTECODE_JAVA_11)
    }

    pub fn is_version17(&self) -> bool {
        self.is_version(BYTECODE_JAVA_17)
    }

    pub fn is_preview_version(&self) -> bool {
        self.minor_version == PREVIEW_MINOR_VERSION
    }

    /// Released at `release`, or available as a preview in `preview..release`.
    fn has_feature(&self, preview: u16, release: u16) -> bool {
        self.major_version >= release
            || (self.major_version >= preview && self.is_preview_version())
    }

    pub fn has_enhanced_switch_support(&self) -> bool {
        self.has_feature(BYTECODE_JAVA_12, BYTECODE_JAVA_14)
    }

    pub fn has_records_support(&self) -> bool {
        self.has_feature(BYTECODE_JAVA_14, BYTECODE_JAVA_16)
    }

    pub fn has_pattern_instanceof_support(&self) -> bool {
        self.has_feature(BYTECODE_JAVA_14, BYTECODE_JAVA_16)
    }

    pub fn has_sealed_classes_support(&self) -> bool {
        self.has_feature(BYTECODE_JAVA_15, BYTECODE_JAVA_17)
    }

    pub fn has_switch_pattern_matching_support(&self) -> bool {
        self.has_feature(BYTECODE_JAVA_17, BYTECODE_JAVA_21)
    }

    pub fn has_record_pattern_support(&self) -> bool {
        self.has_feature(BYTECODE_JAVA_19, BYTECODE_JAVA_21)
    }
}
