//! Every class, archive and plain file taking part in one run.

pub mod generics;
pub mod inheritance;
pub mod loader;
pub mod saver;
pub mod unit;

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, Read},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use log::{debug, error, warn};
use zip::{ZipArchive, result::ZipError};

use crate::{
    class::{StructClass, member::StructMethod},
    error::{Error, Result},
    options::DecompilerOptions,
};

use self::{
    generics::GenericHierarchy,
    inheritance::ClassResolver,
    loader::{LazyLoader, Link},
    saver::{DecompiledData, ResultSaver},
    unit::{ContextUnit, JAR_MANIFEST, UnitKind},
};

const MULTI_RELEASE_PREFIX: &str = "META-INF/versions/";

/// Owns the units read so far and the classes they contain.
///
/// Every class reachable through [`class`](Self::class) belongs to exactly
/// one unit.
#[derive(Debug)]
pub struct StructContext {
    options: DecompilerOptions,
    loader: Arc<LazyLoader>,
    units: Vec<ContextUnit>,
    unit_keys: HashMap<String, usize>,
    classes: HashMap<String, Arc<StructClass>>,
    generics: DashMap<String, Arc<GenericHierarchy>>,
}

impl StructContext {
    pub fn new(options: DecompilerOptions) -> Self {
        Self::with_loader(options, Arc::new(LazyLoader::default()))
    }

    pub fn with_loader(options: DecompilerOptions, loader: Arc<LazyLoader>) -> Self {
        Self {
            options,
            loader,
            units: Vec::new(),
            unit_keys: HashMap::new(),
            classes: HashMap::new(),
            generics: DashMap::new(),
        }
    }

    pub fn options(&self) -> &DecompilerOptions {
        &self.options
    }

    pub fn loader(&self) -> &Arc<LazyLoader> {
        &self.loader
    }

    pub fn units(&self) -> &[ContextUnit] {
        &self.units
    }

    pub fn class(&self, name: &str) -> Option<&Arc<StructClass>> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Arc<StructClass>> {
        self.classes.values()
    }

    pub fn own_classes(&self) -> impl Iterator<Item = &Arc<StructClass>> {
        self.classes.values().filter(|class| class.is_own())
    }

    pub fn instance_of(&self, value: &str, reference: &str) -> bool {
        inheritance::instance_of(self, value, reference)
    }

    pub fn method_recursive<'a>(
        &'a self,
        class: &'a StructClass,
        name: &str,
        descriptor: &str,
    ) -> Option<&'a StructMethod> {
        inheritance::method_recursive(self, class, name, descriptor)
    }

    /// Reads a directory tree, an archive or a single file.
    ///
    /// Library spaces (`own == false`) are only consulted for lookups and
    /// never saved.
    pub fn add_space(&mut self, path: impl AsRef<Path>, own: bool) -> Result<()> {
        self.add_path(path.as_ref(), own, "", 0)
    }

    /// Adds a class whose bytes are already in memory.
    pub fn add_data(
        &mut self,
        path: &str,
        entry_name: &str,
        bytes: &[u8],
        own: bool,
    ) -> Result<()> {
        let class = StructClass::create(bytes, own, Some(Arc::clone(&self.loader)), &self.options)?;
        let link = Link::Memory(Arc::from(bytes));
        let key = unit_key("memory", Path::new(path), own);
        let index = self.unit_index(key, || ContextUnit::new(UnitKind::Folder, path, "", own));
        self.register(index, class, entry_name, link);
        Ok(())
    }

    /// Writes every own unit back through `saver`.
    ///
    /// All units are attempted; the names of those that failed are reported
    /// together.
    pub fn save(&self, saver: &mut dyn ResultSaver, data: &dyn DecompiledData) -> Result<()> {
        let mut failed_units = Vec::new();
        for unit in self.units.iter().filter(|unit| unit.is_own()) {
            if let Err(err) = unit.save(saver, data) {
                error!("failed to save {}: {err}", unit.display_name());
                failed_units.push(unit.display_name());
            }
        }
        if failed_units.is_empty() {
            Ok(())
        } else {
            Err(Error::Save { failed_units })
        }
    }

    fn add_path(&mut self, file: &Path, own: bool, relative: &str, level: usize) -> Result<()> {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if file.is_dir() {
            let relative = match level {
                0 => String::new(),
                1 => name,
                _ => format!("{relative}/{name}"),
            };
            let mut children = fs::read_dir(file)
                .and_then(|entries| {
                    entries
                        .map(|entry| entry.map(|entry| entry.path()))
                        .collect::<io::Result<Vec<_>>>()
                })
                .map_err(|err| Error::io(file, err))?;
            children.sort();
            for child in children {
                self.add_path(&child, own, &relative, level + 1)?;
            }
            return Ok(());
        }

        if name.ends_with(".jar") {
            return self.add_archive(relative, file, UnitKind::Jar, own);
        }
        if name.ends_with(".zip") {
            return self.add_archive(relative, file, UnitKind::Zip, own);
        }

        let key = unit_key("folder", file.parent().unwrap_or(file), own);
        let index = self.unit_index(key, || {
            ContextUnit::new(UnitKind::Folder, relative, "", own)
        });
        if !name.ends_with(".class") {
            self.units[index].add_other_entry(file, name);
            return Ok(());
        }

        let parsed = fs::read(file)
            .map_err(|err| Error::io(file, err))
            .and_then(|bytes| {
                StructClass::create(&bytes, own, Some(Arc::clone(&self.loader)), &self.options)
            });
        match parsed {
            Ok(class) => self.register(index, class, &name, Link::File(file.to_path_buf())),
            Err(err) => warn!("corrupted class file {}: {err}", file.display()),
        }
        Ok(())
    }

    fn add_archive(
        &mut self,
        relative: &str,
        file: &Path,
        kind: UnitKind,
        own: bool,
    ) -> Result<()> {
        let mut archive = match File::open(file)
            .map_err(ZipError::Io)
            .and_then(ZipArchive::new)
        {
            Ok(archive) => archive,
            Err(source) => {
                warn!("{}, skipping", corrupted(file, source));
                return Ok(());
            }
        };

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            match archive.by_index(i) {
                Ok(entry) => entries.push((entry.name().to_string(), entry.is_dir())),
                Err(source) => {
                    warn!("{}, skipping", corrupted(file, source));
                    return Ok(());
                }
            }
        }
        if let Some((entry, _)) = entries.iter().find(|(name, _)| escapes_archive(name)) {
            return Err(Error::ZipSlip {
                archive: file.to_path_buf(),
                entry: entry.clone(),
            });
        }

        let filename = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = unit_key("archive", file, own);
        let index = self.unit_index(key, || ContextUnit::new(kind, relative, filename, own));
        debug!("reading {} entries of {}", entries.len(), file.display());

        for (i, (name, is_dir)) in entries.into_iter().enumerate() {
            if self.options.skip_multi_release_overlays && name.starts_with(MULTI_RELEASE_PREFIX) {
                warn!("skipping multi-release entry {name} of {}", file.display());
                continue;
            }
            if is_dir {
                self.units[index].add_dir_entry(name);
                continue;
            }

            let is_class = name.ends_with(".class");
            let is_manifest = kind == UnitKind::Jar && name.eq_ignore_ascii_case(JAR_MANIFEST);
            if !is_class && !is_manifest {
                self.units[index].add_other_entry(file, name);
                continue;
            }

            let bytes = match read_entry(&mut archive, i) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("unreadable entry {name} of {}: {err}", file.display());
                    continue;
                }
            };
            if is_manifest {
                self.units[index].set_manifest(bytes);
                self.units[index].add_other_entry(file, name);
                continue;
            }

            match StructClass::create(&bytes, own, Some(Arc::clone(&self.loader)), &self.options) {
                Ok(class) => {
                    let link = Link::Entry {
                        archive: file.to_path_buf(),
                        entry: name.clone(),
                    };
                    self.register(index, class, &name, link);
                }
                Err(err) => warn!("corrupted class entry {name} of {}: {err}", file.display()),
            }
        }
        Ok(())
    }

    fn unit_index(&mut self, key: String, create: impl FnOnce() -> ContextUnit) -> usize {
        *self.unit_keys.entry(key).or_insert_with(|| {
            self.units.push(create());
            self.units.len() - 1
        })
    }

    fn register(&mut self, unit: usize, class: StructClass, entry_name: &str, link: Link) {
        let name = class.qualified_name().to_string();
        if self.classes.contains_key(&name) {
            warn!("duplicate class {name} in {entry_name}, keeping the first");
            return;
        }
        let class = Arc::new(class);
        self.loader.add_class_link(name.clone(), link);
        self.units[unit].add_class(Arc::clone(&class), entry_name);
        self.classes.insert(name, class);
    }
}

impl ClassResolver for StructContext {
    fn resolve(&self, name: &str) -> Option<&StructClass> {
        self.classes.get(name).map(Arc::as_ref)
    }
}

fn read_entry(archive: &mut ZipArchive<File>, index: usize) -> io::Result<Vec<u8>> {
    let mut entry = archive.by_index(index).map_err(io::Error::other)?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Units are told apart by origin and ownership, so a library tree and an
/// own tree never share a unit.
fn unit_key(kind: &str, origin: &Path, own: bool) -> String {
    let side = if own { "own" } else { "lib" };
    format!("{kind}:{side}:{}", origin.display())
}

fn corrupted(path: &Path, source: ZipError) -> Error {
    Error::Archive {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether `entry`, joined onto the archive location, leaves it.
fn escapes_archive(entry: &str) -> bool {
    let path = PathBuf::from(entry.replace('\\', "/"));
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(parent) => depth = parent,
                None => return true,
            },
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}
