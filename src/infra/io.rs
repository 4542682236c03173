use anyhow::{Context, Result};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// How many leading bytes are sniffed for NUL when deciding "binary"
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

/// File bytes, mapped for large files and buffered otherwise
pub enum FileContent
{
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl FileContent
{
    pub fn as_bytes(&self) -> &[u8]
    {
        match self
        {
            FileContent::Mapped(mmap) => mmap,
            FileContent::Buffered(buf) => buf.as_slice(),
        }
    }

    /// Decode as UTF-8, replacing invalid sequences instead of failing
    pub fn text(&self) -> Cow<'_, str>
    {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// True when the leading bytes contain a NUL (git's heuristic)
    pub fn looks_binary(&self) -> bool
    {
        let bytes = self.as_bytes();
        let head = &bytes[..bytes
            .len()
            .min(BINARY_SNIFF_BYTES)];
        memchr::memchr(0, head).is_some()
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent>
{
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD
    {
        // Use memory mapping for large files
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: read-only mapping; a concurrent truncation is the caller's risk
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    }
    else
    {
        // Read small files into memory
        let content =
            std::fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Read a file as owned text (lossy UTF-8). Binary files are an error.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String>
{
    let path = path.as_ref();
    let content = read_file_smart(path)?;
    if content.looks_binary()
    {
        anyhow::bail!("{} looks like a binary file", path.display());
    }
    Ok(content
        .text()
        .into_owned())
}

/// Keep at most `max_lines` leading lines of `content`.
/// Returns the kept prefix and the total number of lines.
pub fn head_lines(
    content: &str,
    max_lines: usize,
) -> (&str, usize)
{
    let idx = crate::infra::line_index::LineIndex::build(content.as_bytes());
    let total = idx.line_count();
    if max_lines >= total
    {
        return (content.trim_end_matches('\n'), total);
    }
    if max_lines == 0
    {
        return ("", total);
    }
    let (_, hi) = idx
        .byte_range(0, max_lines)
        .unwrap_or((0, content.len()));
    (content[..hi].trim_end_matches('\n'), total)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn head_lines_keeps_prefix_and_counts_total()
    {
        let content = "line1\nline2\nline3\nline4\nline5";

        let (kept, total) = head_lines(content, 2);
        assert_eq!(kept, "line1\nline2");
        assert_eq!(total, 5);

        let (kept, total) = head_lines(content, 10);
        assert_eq!(kept, content);
        assert_eq!(total, 5);

        let (kept, _) = head_lines(content, 0);
        assert!(kept.is_empty());
    }

    #[test]
    fn read_text_is_lossy_and_rejects_binary() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let text = tmp
            .path()
            .join("latin1.txt");
        std::fs::write(&text, b"caf\xe9\n")?;
        assert_eq!(read_text(&text)?, "caf\u{fffd}\n");

        let bin = tmp
            .path()
            .join("blob.bin");
        std::fs::write(&bin, b"\x7fELF\0\0\0")?;
        assert!(read_text(&bin).is_err());
        Ok(())
    }

    #[test]
    fn large_files_are_mapped() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let big = tmp
            .path()
            .join("big.txt");
        std::fs::write(&big, "x".repeat((MMAP_THRESHOLD + 1) as usize))?;
        let content = read_file_smart(&big)?;
        assert!(matches!(content, FileContent::Mapped(_)));
        assert_eq!(
            content
                .as_bytes()
                .len() as u64,
            MMAP_THRESHOLD + 1
        );
        Ok(())
    }
}
