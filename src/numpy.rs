//! Read and write adjacency matrices as Numpy arrays
//!
//! Only 2D little-endian f64 matrices in C order are supported, which is what
//! `numpy.load` gives back for `np.zeros((h, w))`.

use ndarray::prelude::*;
use ndarray as nd;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str;
use regex::bytes::Regex;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crate::errors::*;

const HEADER: &str = r"(?-u)^\x93NUMPY\x01\x00(?s:..)\{'descr': ?'<f8', ?'fortran_order': ?False, ?'shape': ?\((\d+), ?(\d+),?\),? ?\} *\n";

/// Write an array in .npy format (version 1.0) to any writer
pub fn write_array<W, S>(mut writer: W, arr: &ArrayBase<S, Ix2>) -> Result<()>
    where W: Write, S: nd::Data<Elem=f64> {
    let header_nospace = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        arr.shape()[0], arr.shape()[1]);
    let virtual_len =
        // Calculating how many bytes we have in the header, so we can get alignment
        header_nospace.len()
        + 6 // The magic string
        + 2 // The version number
        + 2 // An unsigned 2-byte integer for header length
        + 1 ; // Because there will be a \n added
    let padding_needed = (((virtual_len + 15) / 16) * 16) - virtual_len; // to get to the next 16

    writer.write_all(b"\x93NUMPY\x01\x00")?;
    // Magic string, version number and the length itself are not included
    writer.write_u16::<LittleEndian>((header_nospace.len() + padding_needed + 1) as u16)?;
    write!(writer, "{}{}\n", header_nospace, " ".repeat(padding_needed))?;
    // Logical order is C order, whatever the memory layout is
    for &x in arr.iter() {
        writer.write_f64::<LittleEndian>(x)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write an array as a numpy (.npy) file
pub fn write_matrix<S, P>(path: P, arr: &ArrayBase<S, Ix2>) -> Result<()>
    where S: nd::Data<Elem=f64>, P: AsRef<Path> {
    write_array(BufWriter::new(File::create(path)?), arr)
}

/// Read a .npy matrix from any reader. `name` is only used in complaints.
pub fn read_array<R: Read>(mut reader: R, name: &Path) -> Result<Array2<f64>> {
    let header_match = Regex::new(HEADER)
        .map_err(|e| Error::Other(format!("bad numpy header pattern: {}", e)))?;
    // Headers are padded to a multiple of 16 and rarely longer than 128 bytes
    let mut prefix = vec![];
    (&mut reader).take(256).read_to_end(&mut prefix)?;
    let (skip, h, w) = {
        let captures = header_match.captures(&prefix)
            .ok_or_else(|| helpful_complaint(name, &prefix))?;
        let dim = |i: usize| -> Result<usize> {
            str::from_utf8(&captures[i])
                .map_err(|_| helpful_complaint(name, &prefix))?
                .parse()
                .map_err(Error::from)
        };
        (captures[0].len(), dim(1)?, dim(2)?)
    };

    let mut body = &prefix[skip..];
    let mut values = Vec::with_capacity(h * w);
    let mut rest = reader;
    for _ in 0..h * w {
        let x = if body.is_empty() {
            rest.read_f64::<LittleEndian>()
        } else {
            body.read_f64::<LittleEndian>()
        };
        values.push(x.map_err(|_| Error::Other(format!(
            "The numpy file {} is too short for a {}x{} array", name.display(), h, w)))?);
    }
    Ok(Array2::from_shape_vec((h, w), values)?)
}

/// Read a Numpy matrix into memory. Be careful if it's large. You could run out of memory.
pub fn read_matrix<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    read_array(reader, path.as_ref())
}

/// Tell the user more info about the file
///
/// It seems verbose but you can see this error often so it save you time.
fn helpful_complaint(p: &Path, header: &[u8]) -> Error {
    let cap = ::std::cmp::min(header.len(), 100);
    let complaint = format!(
        "Expected {} to be an uncompressed numpy (.npy) file, but couldn't \
        parse the header. The first hundred bytes look like:

        {}


        As bytes, the header is as follows:

        {:?}


        It should look something like this example, where . are non-printable characters: \
        NUMPY..{{'descr': '<f8', 'fortran_order': False, 'shape': (34, 27), }}\
        Note: only 2D little-endian 64-bit float matrices in C order are supported (for \
        simplicity). You may need to change the dtype accordingly.",
        p.display(),
        String::from_utf8_lossy(&header[..cap]),
        &header[..cap]);
    Error::Other(complaint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn header_is_aligned() {
        let mut buf = vec![];
        write_array(&mut buf, &Array2::<f64>::zeros((3, 5))).unwrap();
        let header_len = buf.len() - 3 * 5 * 8;
        assert_eq!(header_len % 16, 0);
        assert_eq!(buf[header_len - 1], b'\n');
        assert_eq!(&buf[..6], b"\x93NUMPY");
    }

    #[test]
    fn reads_back_what_it_wrote() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.npy");
        let m = arr2(&[[1.0, 2.5, 0.0], [-4.0, 0.0, 1e9]]);
        write_matrix(&path, &m).unwrap();
        assert_eq!(read_matrix(&path).unwrap(), m);
        // Transposed views are written in logical order
        write_matrix(&path, &m.t()).unwrap();
        assert_eq!(read_matrix(&path).unwrap(), m.t());
    }

    #[test]
    fn complains_about_other_formats() {
        let bad = Cursor::new(b"\x93NUMPY\x01\x00F\x00{'descr': '>i4'}".to_vec());
        assert!(matches!(read_array(bad, Path::new("x.npy")), Err(Error::Other(_))));

        let mut short = vec![];
        write_array(&mut short, &Array2::<f64>::zeros((4, 4))).unwrap();
        short.truncate(short.len() - 8);
        assert!(read_array(Cursor::new(short), Path::new("y.npy")).is_err());
    }
}
