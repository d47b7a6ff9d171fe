//! The file store that static responses are served from.  Implement `FileSystem` over flash, an
//! SD card or a compiled-in table; `StaticFs` covers the last case.

/// An opened file.
pub trait File {
    /// Total size in bytes, or `None` if it is not known up front (the body is then sent with
    /// chunked transfer encoding).
    fn len(&self) -> Option<usize>;

    /// Read the next bytes into `buf`, returning how many were written.  `0` marks the end of the
    /// file.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// Resolves request paths to files.
pub trait FileSystem {
    /// The file handle type
    type File: File;

    /// Open `path` (absolute, normalised, index page already substituted).
    fn open(&self, path: &str) -> Option<Self::File>;
}

/// A file system over a table of `(path, contents)` pairs, typically built with
/// `include_bytes!`.
///
/// ```
/// use wsgate::fs::{File, FileSystem, StaticFs};
///
/// static FILES: &[(&str, &[u8])] = &[("/index.html", b"<html></html>")];
///
/// let fs = StaticFs::new(FILES);
/// let file = fs.open("/index.html").unwrap();
/// assert_eq!(file.len(), Some(13));
/// assert!(fs.open("/missing").is_none());
/// ```
#[derive(Clone, Copy)]
pub struct StaticFs<'a> {
    files: &'a [(&'a str, &'a [u8])],
}

impl<'a> StaticFs<'a> {
    #[allow(missing_docs)]
    pub const fn new(files: &'a [(&'a str, &'a [u8])]) -> Self {
        Self { files }
    }
}

/// A file of a `StaticFs`
pub struct StaticFile<'a> {
    data: &'a [u8],
}

impl File for StaticFile<'_> {
    fn len(&self) -> Option<usize> {
        Some(self.data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        n
    }
}

impl<'a> FileSystem for StaticFs<'a> {
    type File = StaticFile<'a>;

    fn open(&self, path: &str) -> Option<Self::File> {
        self.files
            .iter()
            .find(|(name, _)| *name == path)
            .map(|(_, data)| StaticFile { data })
    }
}

/// A file system without files; every path is `404 Not Found`.
#[derive(Clone, Copy, Default)]
pub struct NoFs;

impl FileSystem for NoFs {
    type File = StaticFile<'static>;

    fn open(&self, _path: &str) -> Option<Self::File> {
        None
    }
}
