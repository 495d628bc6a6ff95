use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{NgramError, Result};
use crate::model::tables::NGramTables;

/// Opens a corpus file for line-by-line reading.
pub fn open_corpus<P: AsRef<Path>>(filename: P) -> Result<BufReader<File>> {
	Ok(BufReader::new(File::open(filename)?))
}

/// Creates a file for writing, refusing to overwrite an existing one.
///
/// # Errors
/// Returns `OutputExists` if something is already at `path`.
pub fn create_new<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
	let path = path.as_ref();
	match OpenOptions::new().write(true).create_new(true).open(path) {
		Ok(file) => Ok(BufWriter::new(file)),
		Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(NgramError::OutputExists(path.to_owned())),
		Err(e) => Err(e.into()),
	}
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/words.txt` + `"bin"` → `data/words.bin`
pub fn build_output_path<P: AsRef<Path>>(input_path: P, output_extension: &str) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Serializes tables with `postcard` and writes them to `path`.
pub fn save_tables<P: AsRef<Path>>(tables: &NGramTables, path: P) -> Result<()> {
	let bytes = postcard::to_stdvec(tables)?;
	fs::write(&path, &bytes)?;
	info!("wrote {} bytes to {}", bytes.len(), path.as_ref().display());
	Ok(())
}

/// Reads tables written by [`save_tables`] and checks their shapes.
pub fn load_tables<P: AsRef<Path>>(path: P) -> Result<NGramTables> {
	let bytes = fs::read(path)?;
	let tables: NGramTables = postcard::from_bytes(&bytes)?;
	tables.validate()?;
	Ok(tables)
}
