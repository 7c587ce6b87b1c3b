use std::{
    collections::HashMap,
    fmt::Write as _,
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use classfile_model::{
    StructClass, StructContext,
    class::member::{StructMember, StructMethod},
    context::{
        saver::{DecompiledData, ResultSaver},
        unit::JAR_MANIFEST,
    },
};
use log::warn;
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

/// Mirrors every unit below an output directory.
pub struct DirectorySaver {
    root: PathBuf,
    archives: HashMap<String, ZipWriter<File>>,
}

impl DirectorySaver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            archives: HashMap::new(),
        }
    }

    fn folder(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn archive(&mut self, path: &str, archive_name: &str) -> io::Result<&mut ZipWriter<File>> {
        self.archives
            .get_mut(&archive_key(path, archive_name))
            .ok_or_else(|| io::Error::other(format!("archive {archive_name} is not open")))
    }
}

fn archive_key(path: &str, archive_name: &str) -> String {
    format!("{path}/{archive_name}")
}

fn write_entry(zip: &mut ZipWriter<File>, entry_name: &str, content: &[u8]) -> io::Result<()> {
    zip.start_file(entry_name, SimpleFileOptions::default())
        .map_err(io::Error::other)?;
    zip.write_all(content)
}

impl ResultSaver for DirectorySaver {
    fn save_folder(&mut self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.folder(path))
    }

    fn copy_file(&mut self, source: &Path, path: &str, entry_name: &str) -> io::Result<()> {
        fs::copy(source, self.folder(path).join(entry_name)).map(|_| ())
    }

    fn save_class_file(
        &mut self,
        path: &str,
        _qualified_name: &str,
        entry_name: &str,
        content: &str,
    ) -> io::Result<()> {
        fs::write(self.folder(path).join(entry_name), content)
    }

    fn create_archive(
        &mut self,
        path: &str,
        archive_name: &str,
        manifest: Option<&[u8]>,
    ) -> io::Result<()> {
        let folder = self.folder(path);
        fs::create_dir_all(&folder)?;
        let mut zip = ZipWriter::new(File::create(folder.join(archive_name))?);
        if let Some(manifest) = manifest {
            write_entry(&mut zip, JAR_MANIFEST, manifest)?;
        }
        self.archives.insert(archive_key(path, archive_name), zip);
        Ok(())
    }

    fn save_dir_entry(
        &mut self,
        path: &str,
        archive_name: &str,
        entry_name: &str,
    ) -> io::Result<()> {
        self.archive(path, archive_name)?
            .add_directory(entry_name, SimpleFileOptions::default())
            .map_err(io::Error::other)
    }

    fn copy_entry(
        &mut self,
        source: &Path,
        path: &str,
        archive_name: &str,
        entry_name: &str,
    ) -> io::Result<()> {
        let mut source = ZipArchive::new(File::open(source)?).map_err(io::Error::other)?;
        let mut entry = source.by_name(entry_name).map_err(io::Error::other)?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        write_entry(self.archive(path, archive_name)?, entry_name, &content)
    }

    fn save_class_entry(
        &mut self,
        path: &str,
        archive_name: &str,
        _qualified_name: &str,
        entry_name: &str,
        content: &str,
    ) -> io::Result<()> {
        write_entry(
            self.archive(path, archive_name)?,
            entry_name,
            content.as_bytes(),
        )
    }

    fn close_archive(&mut self, path: &str, archive_name: &str) -> io::Result<()> {
        match self.archives.remove(&archive_key(path, archive_name)) {
            Some(zip) => zip.finish().map(|_| ()).map_err(io::Error::other),
            None => Ok(()),
        }
    }
}

/// Text listing of a class: header, fields and methods, optionally with
/// decoded instructions.
pub struct Listing<'a> {
    context: &'a StructContext,
    expand: bool,
}

impl<'a> Listing<'a> {
    pub fn new(context: &'a StructContext, expand: bool) -> Self {
        Self { context, expand }
    }

    fn render(&self, class: &StructClass) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        write!(out, "class {}", class.qualified_name())?;
        if let Some(super_class) = class.super_class() {
            write!(out, " extends {super_class}")?;
        }
        let interfaces: Vec<_> = class.interface_names().collect();
        if !interfaces.is_empty() {
            write!(out, " implements {}", interfaces.join(", "))?;
        }
        writeln!(
            out,
            "\n  version {}.{} flags {:?}",
            class.major_version(),
            class.minor_version(),
            class.access_flags
        )?;
        if let Some(signature) = class.signature() {
            writeln!(out, "  signature {signature:?}")?;
        }

        for field in class.fields() {
            let synthetic = if field.is_synthetic() { " synthetic" } else { "" };
            writeln!(out, "  field {} {}{synthetic}", field.name, field.descriptor)?;
        }

        for method in class.methods() {
            write!(out, "  method {}{}", method.name, method.descriptor)?;
            let overrides = class
                .super_class()
                .and_then(|name| self.context.class(name))
                .and_then(|parent| {
                    self.context
                        .method_recursive(parent, &method.name, &method.descriptor)
                });
            if overrides.is_some() {
                write!(out, " overrides")?;
            }
            writeln!(out)?;
            if self.expand && method.contains_code() {
                self.render_code(&mut out, class, method)?;
            }
        }
        Ok(out)
    }

    fn render_code(
        &self,
        out: &mut String,
        class: &StructClass,
        method: &StructMethod,
    ) -> std::fmt::Result {
        if let Err(err) = method.expand_data(class) {
            warn!("cannot decode {}.{}: {err}", class.qualified_name(), method.name);
            return writeln!(out, "    <undecodable: {err}>");
        }
        if let Some(sequence) = method.instruction_sequence() {
            for (offset, instruction) in sequence.iter() {
                writeln!(out, "    {offset:>5}: {instruction}")?;
            }
            for handler in &sequence.exception_table().handlers {
                writeln!(
                    out,
                    "    catch {} [{}, {}) -> {}",
                    handler.exception_class.as_deref().unwrap_or("any"),
                    handler.from,
                    handler.to,
                    handler.handler
                )?;
            }
        }
        method.release_resources();
        Ok(())
    }
}

impl DecompiledData for Listing<'_> {
    fn class_entry_name(&self, _class: &StructClass, entry_name: &str) -> Option<String> {
        let stem = entry_name.strip_suffix(".class").unwrap_or(entry_name);
        Some(format!("{stem}.txt"))
    }

    fn class_content(&self, class: &StructClass) -> Option<String> {
        let content = self.render(class).ok();
        class.release_resources();
        content
    }
}
