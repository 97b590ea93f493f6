use crate::error::Error;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;

const HASH_BLOCK_SIZE: usize = 1 << 20; // 1MB

/// `<path>.<extension>`, e.g. `clip.mov.md5`.
pub fn sidecar_path(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Contents of the checksum sidecar, with surrounding whitespace removed.
///
/// A missing or unreadable sidecar means integrity cannot be established.
pub fn read_checksum_sidecar(path: &Path, extension: &str) -> Result<String, Error> {
    let sidecar = sidecar_path(path, extension);
    match fs::read_to_string(&sidecar) {
        Ok(contents) => Ok(contents.trim().to_string()),
        Err(source) => Err(Error::IntegrityMissing {
            path: sidecar,
            source,
        }),
    }
}

pub fn file_md5(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Hash `path` and store the digest next to it. Returns the digest.
pub fn write_md5_sidecar(path: &Path, extension: &str) -> Result<String, Error> {
    let digest = file_md5(path)?;
    let sidecar = sidecar_path(path, extension);
    fs::write(&sidecar, &digest)?;
    info!("Wrote checksum {} to {}", digest, sidecar.display());
    Ok(digest)
}
