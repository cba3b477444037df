//! XML stream files: root element management and atomic tmp→rename

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Append-only sink for one XML stream, fed pre-rendered chunks in id order.
pub trait ChunkSink: Send {
    fn append_chunk(&mut self, chunk: &str) -> io::Result<()>;

    /// Flush and close the stream.
    fn finalize(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// Which of the three canonical streams a file carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Primary,
    Filelists,
    Other,
}

impl StreamKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Primary => "primary.xml",
            Self::Filelists => "filelists.xml",
            Self::Other => "other.xml",
        }
    }

    pub fn db_file_name(self) -> &'static str {
        match self {
            Self::Primary => "primary.db",
            Self::Filelists => "filelists.db",
            Self::Other => "other.db",
        }
    }

    fn root(self) -> &'static str {
        match self {
            Self::Primary => "metadata",
            Self::Filelists => "filelists",
            Self::Other => "otherdata",
        }
    }

    fn namespace(self) -> &'static str {
        match self {
            Self::Primary => "http://linux.duke.edu/metadata/common",
            Self::Filelists => "http://linux.duke.edu/metadata/filelists",
            Self::Other => "http://linux.duke.edu/metadata/other",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Primary => "primary",
            Self::Filelists => "filelists",
            Self::Other => "other",
        })
    }
}

enum StreamWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// One XML output file: declaration plus root element at creation, chunks
/// appended verbatim, closing tag at finalize. Written to `<name>.tmp` and
/// renamed into place so consumers never observe a half-written stream.
pub struct XmlFileSink {
    writer: StreamWriter,
    kind: StreamKind,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl XmlFileSink {
    /// Open the stream and write its header. `packages` is the total task
    /// count advertised in the root element.
    pub fn create(dir: &Path, kind: StreamKind, packages: usize, gzip: bool) -> io::Result<Self> {
        let file_name = if gzip {
            format!("{}.gz", kind.file_name())
        } else {
            kind.file_name().to_string()
        };
        let final_path = dir.join(&file_name);
        let tmp_path = dir.join(format!("{file_name}.tmp"));

        // Clean up stale tmp file
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = BufWriter::new(File::create(&tmp_path)?);
        let mut writer = if gzip {
            StreamWriter::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            StreamWriter::Plain(file)
        };

        writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        match kind {
            StreamKind::Primary => writeln!(
                writer,
                r#"<metadata xmlns="{}" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="{packages}">"#,
                kind.namespace()
            )?,
            _ => writeln!(
                writer,
                r#"<{} xmlns="{}" packages="{packages}">"#,
                kind.root(),
                kind.namespace()
            )?,
        }

        Ok(Self {
            writer,
            kind,
            tmp_path,
            final_path,
        })
    }

    /// Path the finalized stream lands at.
    pub fn path(&self) -> &Path {
        &self.final_path
    }
}

impl ChunkSink for XmlFileSink {
    fn append_chunk(&mut self, chunk: &str) -> io::Result<()> {
        self.writer.write_all(chunk.as_bytes())
    }

    fn finalize(self: Box<Self>) -> io::Result<()> {
        let XmlFileSink {
            mut writer,
            kind,
            tmp_path,
            final_path,
        } = *self;

        writeln!(writer, "</{}>", kind.root())?;
        match writer {
            StreamWriter::Plain(w) => {
                w.into_inner().map_err(io::IntoInnerError::into_error)?;
            }
            StreamWriter::Gzip(gz) => {
                gz.finish()?
                    .into_inner()
                    .map_err(io::IntoInnerError::into_error)?;
            }
        }
        fs::rename(&tmp_path, &final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn plain_stream_header_chunks_footer() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Box::new(
            XmlFileSink::create(dir.path(), StreamKind::Primary, 2, false).unwrap(),
        );
        sink.append_chunk("<package>a</package>\n").unwrap();
        sink.append_chunk("<package>b</package>\n").unwrap();
        sink.finalize().unwrap();

        let text = std::fs::read_to_string(dir.path().join("primary.xml")).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(text.contains("packages=\"2\""));
        assert!(text.contains("xmlns:rpm="));
        assert!(text.contains("<package>a</package>\n<package>b</package>\n"));
        assert!(text.ends_with("</metadata>\n"));
        assert!(!dir.path().join("primary.xml.tmp").exists());
    }

    #[test]
    fn filelists_root_element() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Box::new(
            XmlFileSink::create(dir.path(), StreamKind::Filelists, 0, false).unwrap(),
        );
        sink.finalize().unwrap();

        let text = std::fs::read_to_string(dir.path().join("filelists.xml")).unwrap();
        assert!(text.contains("<filelists xmlns=\"http://linux.duke.edu/metadata/filelists\""));
        assert!(text.ends_with("</filelists>\n"));
    }

    #[test]
    fn gzip_stream_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            Box::new(XmlFileSink::create(dir.path(), StreamKind::Other, 1, true).unwrap());
        sink.append_chunk("<package>z</package>\n").unwrap();
        sink.finalize().unwrap();

        let file = File::open(dir.path().join("other.xml.gz")).unwrap();
        let mut text = String::new();
        flate2::read::GzDecoder::new(file)
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.contains("<package>z</package>"));
        assert!(text.ends_with("</otherdata>\n"));
    }

    #[test]
    fn unfinalized_stream_stays_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let _sink = XmlFileSink::create(dir.path(), StreamKind::Primary, 1, false).unwrap();
        assert!(dir.path().join("primary.xml.tmp").exists());
        assert!(!dir.path().join("primary.xml").exists());
    }
}
