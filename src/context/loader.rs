use std::{
    collections::HashMap,
    fmt::Debug,
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::trace;
use parking_lot::RwLock;
use zip::ZipArchive;

use crate::{
    class::{constant_pool::ConstantPool, member::CodeAttribute},
    error::{ClassFormatError, Error, Result},
};

/// Where the bytes of a class can be read again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    File(PathBuf),
    Entry { archive: PathBuf, entry: String },
    Memory(Arc<[u8]>),
}

/// Reads raw bytes from a file, or from an entry of an archive when
/// `internal_path` is given.
pub trait BytecodeProvider: Debug + Send + Sync {
    fn bytecode(&self, external_path: &Path, internal_path: Option<&str>) -> io::Result<Vec<u8>>;
}

/// Plain files and zip/jar entries from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemProvider;

impl BytecodeProvider for FileSystemProvider {
    fn bytecode(&self, external_path: &Path, internal_path: Option<&str>) -> io::Result<Vec<u8>> {
        let Some(entry) = internal_path else {
            return fs::read(external_path);
        };
        let mut archive = ZipArchive::new(File::open(external_path)?).map_err(io::Error::other)?;
        let mut zip_file = archive.by_name(entry).map_err(io::Error::other)?;
        let mut content = Vec::with_capacity(zip_file.size() as usize);
        zip_file.read_to_end(&mut content)?;
        Ok(content)
    }
}

/// Re-reads class files on demand so that parsed data can be dropped
/// between uses.
#[derive(Debug)]
pub struct LazyLoader {
    links: RwLock<HashMap<String, Link>>,
    provider: Box<dyn BytecodeProvider>,
}

impl Default for LazyLoader {
    fn default() -> Self {
        Self::new(FileSystemProvider)
    }
}

impl LazyLoader {
    pub fn new(provider: impl BytecodeProvider + 'static) -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
            provider: Box::new(provider),
        }
    }

    pub fn add_class_link(&self, class_name: impl Into<String>, link: Link) {
        self.links.write().insert(class_name.into(), link);
    }

    pub fn remove_class_link(&self, class_name: &str) -> Option<Link> {
        self.links.write().remove(class_name)
    }

    pub fn class_link(&self, class_name: &str) -> Option<Link> {
        self.links.read().get(class_name).cloned()
    }

    pub fn class_bytes(&self, class_name: &str) -> Result<Vec<u8>> {
        let link = self
            .class_link(class_name)
            .ok_or_else(|| Error::MissingLink(class_name.to_string()))?;
        trace!("reloading {class_name} from {link:?}");
        match link {
            Link::File(path) => self
                .provider
                .bytecode(&path, None)
                .map_err(|err| Error::io(path, err)),
            Link::Entry { archive, entry } => self
                .provider
                .bytecode(&archive, Some(&entry))
                .map_err(|err| Error::io(archive, err)),
            Link::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn load_pool(&self, class_name: &str) -> Result<ConstantPool> {
        let bytes = self.class_bytes(class_name)?;
        Ok(ConstantPool::read_from_class(&bytes)?)
    }

    /// Code bytes and exception table of one method.
    pub fn load_bytecode(&self, class_name: &str, code: &CodeAttribute) -> Result<Vec<u8>> {
        let bytes = self.class_bytes(class_name)?;
        let end = code.code_offset + code.code_full_length as usize;
        match bytes.get(code.code_offset..end) {
            Some(body) => Ok(body.to_vec()),
            None => Err(ClassFormatError::Truncated {
                remaining: bytes.len().saturating_sub(code.code_offset),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::{ZipWriter, write::SimpleFileOptions};

    use super::*;

    fn code_at(code_offset: usize, code_full_length: u32) -> CodeAttribute {
        CodeAttribute {
            max_stack: 0,
            local_variables: 0,
            code_length: code_full_length - 2,
            code_full_length,
            code_offset,
            exception_table_length: 0,
        }
    }

    #[test]
    fn memory_link_serves_method_body() {
        let loader = LazyLoader::default();
        loader.add_class_link("a/B", Link::Memory(Arc::from(&[9u8, 8, 7, 6, 5, 4][..])));
        assert_eq!(loader.load_bytecode("a/B", &code_at(1, 3)).unwrap(), vec![8, 7, 6]);
        assert!(matches!(
            loader.load_bytecode("a/B", &code_at(4, 5)),
            Err(Error::ClassFormat(ClassFormatError::Truncated { remaining: 2 }))
        ));
    }

    #[test]
    fn missing_link_is_reported() {
        let loader = LazyLoader::default();
        loader.add_class_link("a/B", Link::Memory(Arc::from(&[][..])));
        loader.remove_class_link("a/B");
        assert!(matches!(
            loader.class_bytes("a/B"),
            Err(Error::MissingLink(name)) if name == "a/B"
        ));
    }

    #[test]
    fn rereads_files_and_archive_entries() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("A.class");
        fs::write(&plain, [1, 2, 3]).unwrap();

        let jar = dir.path().join("lib.jar");
        let mut zip = ZipWriter::new(File::create(&jar).unwrap());
        zip.start_file("p/B.class", SimpleFileOptions::default()).unwrap();
        zip.write_all(&[4, 5]).unwrap();
        zip.finish().unwrap();

        let loader = LazyLoader::default();
        loader.add_class_link("A", Link::File(plain));
        loader.add_class_link(
            "p/B",
            Link::Entry {
                archive: jar,
                entry: "p/B.class".into(),
            },
        );
        assert_eq!(loader.class_bytes("A").unwrap(), vec![1, 2, 3]);
        assert_eq!(loader.class_bytes("p/B").unwrap(), vec![4, 5]);
        assert_eq!(loader.class_bytes("p/B").unwrap(), vec![4, 5]);
    }
}
