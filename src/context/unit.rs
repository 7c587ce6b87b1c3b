use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;

use crate::{
    class::StructClass,
    context::saver::{DecompiledData, ResultSaver},
};

pub const JAR_MANIFEST: &str = "META-INF/MANIFEST.MF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Folder,
    Jar,
    Zip,
}

/// Non-class file carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherEntry {
    pub source: PathBuf,
    pub entry_name: String,
}

/// One input container: a directory level, a jar or a zip.
///
/// `classes` and `class_entries` are parallel and keep the order in which
/// entries were read.
#[derive(Debug)]
pub struct ContextUnit {
    kind: UnitKind,
    own: bool,
    path: String,
    filename: String,
    classes: Vec<Arc<StructClass>>,
    class_entries: Vec<String>,
    dir_entries: Vec<String>,
    other_entries: Vec<OtherEntry>,
    manifest: Option<Vec<u8>>,
}

impl ContextUnit {
    pub(crate) fn new(
        kind: UnitKind,
        path: impl Into<String>,
        filename: impl Into<String>,
        own: bool,
    ) -> Self {
        Self {
            kind,
            own,
            path: path.into(),
            filename: filename.into(),
            classes: Vec::new(),
            class_entries: Vec::new(),
            dir_entries: Vec::new(),
            other_entries: Vec::new(),
            manifest: None,
        }
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn is_own(&self) -> bool {
        self.own
    }

    /// Directory of the unit relative to the input root, `/`-separated.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Archive file name; empty for folder units.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn classes(&self) -> &[Arc<StructClass>] {
        &self.classes
    }

    pub fn class_entries(&self) -> &[String] {
        &self.class_entries
    }

    pub fn dir_entries(&self) -> &[String] {
        &self.dir_entries
    }

    pub fn other_entries(&self) -> &[OtherEntry] {
        &self.other_entries
    }

    pub fn manifest(&self) -> Option<&[u8]> {
        self.manifest.as_deref()
    }

    pub fn is_archive(&self) -> bool {
        self.kind != UnitKind::Folder
    }

    pub(crate) fn display_name(&self) -> String {
        match (self.path.is_empty(), self.filename.is_empty()) {
            (true, true) => ".".to_string(),
            (true, false) => self.filename.clone(),
            (false, true) => self.path.clone(),
            (false, false) => format!("{}/{}", self.path, self.filename),
        }
    }

    pub(crate) fn add_class(&mut self, class: Arc<StructClass>, entry_name: impl Into<String>) {
        self.classes.push(class);
        self.class_entries.push(entry_name.into());
    }

    pub(crate) fn add_dir_entry(&mut self, entry_name: impl Into<String>) {
        self.dir_entries.push(entry_name.into());
    }

    pub(crate) fn add_other_entry(&mut self, source: &Path, entry_name: impl Into<String>) {
        self.other_entries.push(OtherEntry {
            source: source.to_path_buf(),
            entry_name: entry_name.into(),
        });
    }

    pub(crate) fn set_manifest(&mut self, manifest: Vec<u8>) {
        self.manifest = Some(manifest);
    }

    fn own_class_entries(&self) -> impl Iterator<Item = (&Arc<StructClass>, &String)> {
        self.classes
            .iter()
            .zip(&self.class_entries)
            .filter(|(class, _)| class.is_own())
    }

    /// Writes the unit back in its original shape.
    pub(crate) fn save(
        &self,
        saver: &mut dyn ResultSaver,
        data: &dyn DecompiledData,
    ) -> io::Result<()> {
        debug!("saving unit {}", self.display_name());
        match self.kind {
            UnitKind::Folder => self.save_folder(saver, data),
            UnitKind::Jar | UnitKind::Zip => {
                saver.create_archive(&self.path, &self.filename, self.manifest())?;
                let written = self.save_archive_entries(saver, data);
                let closed = saver.close_archive(&self.path, &self.filename);
                written.and(closed)
            }
        }
    }

    fn save_folder(
        &self,
        saver: &mut dyn ResultSaver,
        data: &dyn DecompiledData,
    ) -> io::Result<()> {
        saver.save_folder(&self.path)?;

        for entry in &self.other_entries {
            saver.copy_file(&entry.source, &self.path, &entry.entry_name)?;
        }

        for (class, entry) in self.own_class_entries() {
            let Some(entry_name) = data.class_entry_name(class, entry) else {
                continue;
            };
            let Some(content) = data.class_content(class) else {
                continue;
            };
            saver.save_class_file(&self.path, class.qualified_name(), &entry_name, &content)?;
        }
        Ok(())
    }

    fn save_archive_entries(
        &self,
        saver: &mut dyn ResultSaver,
        data: &dyn DecompiledData,
    ) -> io::Result<()> {
        for dir in &self.dir_entries {
            saver.save_dir_entry(&self.path, &self.filename, dir)?;
        }

        for entry in &self.other_entries {
            if self.kind == UnitKind::Jar && entry.entry_name.eq_ignore_ascii_case(JAR_MANIFEST) {
                continue;
            }
            saver.copy_entry(&entry.source, &self.path, &self.filename, &entry.entry_name)?;
        }

        for (class, entry) in self.own_class_entries() {
            let Some(entry_name) = data.class_entry_name(class, entry) else {
                continue;
            };
            let Some(content) = data.class_content(class) else {
                continue;
            };
            saver.save_class_entry(
                &self.path,
                &self.filename,
                class.qualified_name(),
                &entry_name,
                &content,
            )?;
        }
        Ok(())
    }
}
