use anyhow::{anyhow, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 3] = [0x1F, 0x8B, 0x08];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Compression detected from an input's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
    Zstd,
}

impl Compression {
    fn detect(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) {
            Compression::Gzip
        } else if head.starts_with(&ZSTD_MAGIC) {
            Compression::Zstd
        } else {
            Compression::Plain
        }
    }
}

/// Peek at the first bytes of `reader` and wrap it in a gzip or zstd
/// decoder when the magic bytes match. The peeked bytes are replayed.
pub fn maybe_decompress<R: Read + Send + 'static>(
    mut reader: R,
) -> std::io::Result<(Box<dyn Read + Send>, Compression)> {
    let mut head = [0u8; 4];
    let mut n = 0;
    // A short read here does not mean end of input.
    while n < head.len() {
        let read = reader.read(&mut head[n..])?;
        if read == 0 {
            break;
        }
        n += read;
    }

    let compression = Compression::detect(&head[..n]);
    let chained = Cursor::new(head[..n].to_vec()).chain(reader);

    let boxed: Box<dyn Read + Send> = match compression {
        Compression::Gzip => Box::new(MultiGzDecoder::new(chained)),
        Compression::Zstd => Box::new(zstd::Decoder::new(chained)?),
        Compression::Plain => Box::new(chained),
    };
    Ok((boxed, compression))
}

/// Open a file for reading with transparent gzip/zstd decompression.
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<(Box<dyn Read + Send>, Compression)> {
    let path = path.as_ref();

    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        if extension.eq_ignore_ascii_case("zip") {
            return Err(anyhow!(
                "ZIP archives are not supported; only gzip and zstd inputs are decompressed. Extract it first: unzip {}",
                path.display()
            ));
        }
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    maybe_decompress(file)
        .with_context(|| format!("Failed to detect compression of {}", path.display()))
}
