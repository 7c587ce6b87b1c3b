use std::{io, path::Path};

use crate::class::StructClass;

/// Sink receiving everything written back by
/// [`StructContext::save`](crate::context::StructContext::save).
///
/// `path` is the unit's directory relative to the input root; archive
/// methods also receive the archive file name.
pub trait ResultSaver {
    fn save_folder(&mut self, path: &str) -> io::Result<()>;

    fn copy_file(&mut self, source: &Path, path: &str, entry_name: &str) -> io::Result<()>;

    fn save_class_file(
        &mut self,
        path: &str,
        qualified_name: &str,
        entry_name: &str,
        content: &str,
    ) -> io::Result<()>;

    fn create_archive(
        &mut self,
        path: &str,
        archive_name: &str,
        manifest: Option<&[u8]>,
    ) -> io::Result<()>;

    fn save_dir_entry(&mut self, path: &str, archive_name: &str, entry_name: &str)
    -> io::Result<()>;

    fn copy_entry(
        &mut self,
        source: &Path,
        path: &str,
        archive_name: &str,
        entry_name: &str,
    ) -> io::Result<()>;

    fn save_class_entry(
        &mut self,
        path: &str,
        archive_name: &str,
        qualified_name: &str,
        entry_name: &str,
        content: &str,
    ) -> io::Result<()>;

    fn close_archive(&mut self, path: &str, archive_name: &str) -> io::Result<()>;
}

/// Provides the output produced for each class.
pub trait DecompiledData {
    /// Output entry name for a class read from `entry_name`, or `None` to skip it.
    fn class_entry_name(&self, class: &StructClass, entry_name: &str) -> Option<String>;

    fn class_content(&self, class: &StructClass) -> Option<String>;
}
