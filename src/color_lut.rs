//! Functions for reading FreeSurfer-style color lookup tables.
//!
//! A color lookup table (like `FreeSurferColorLUT.txt`) assigns a name and an RGBA display
//! color to each integer region identifier of a volumetric segmentation. Each non-comment line
//! holds six whitespace separated fields: `id name r g b a`.

use flate2::bufread::GzDecoder;

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, RoiMetricsError};
use crate::util::is_gz_file;


/// One region of a [`ColorLut`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLutEntry {
    pub id: i64,
    pub name: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// A color lookup table, with entries in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorLut {
    pub entries: Vec<ColorLutEntry>,
}

impl ColorLut {
    /// Read a color lookup table from a file.
    /// If the file's name ends with ".gz", the file is assumed to need GZip decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ColorLut> {
        let gz = is_gz_file(&path);
        let file = BufReader::new(File::open(path)?);
        if gz {
            ColorLut::from_reader(GzDecoder::new(file))
        } else {
            ColorLut::from_reader(file)
        }
    }

    /// Read a color lookup table from the given text stream.
    pub fn from_reader<S>(input: S) -> Result<ColorLut>
    where
        S: Read,
    {
        let mut entries: Vec<ColorLutEntry> = Vec::new();
        for (idx, line) in BufReader::new(input).lines().enumerate() {
            let line = line?;
            let content = match line.find('#') {
                Some(pos) => &line[..pos],
                None => &line[..],
            };
            let fields: Vec<&str> = content.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            entries.push(parse_entry(&fields, idx + 1)?);
        }
        Ok(ColorLut { entries })
    }

    /// The region name for the given identifier, if the table has one.
    ///
    /// # Examples
    ///
    /// ```
    /// let lut = roimetrics::ColorLut::from_reader("17 Left-Hippocampus 220 216 20 0".as_bytes()).unwrap();
    /// assert_eq!(lut.name_of(17), Some("Left-Hippocampus"));
    /// assert_eq!(lut.name_of(18), None);
    /// ```
    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(fields: &[&str], line: usize) -> Result<ColorLutEntry> {
    if fields.len() < 6 {
        return Err(RoiMetricsError::InvalidColorLut(
            line,
            format!("expected 6 fields, found {}", fields.len()),
        ));
    }
    Ok(ColorLutEntry {
        id: parse_field(fields[0], "id", line)?,
        name: fields[1].to_string(),
        r: parse_field(fields[2], "red", line)?,
        g: parse_field(fields[3], "green", line)?,
        b: parse_field(fields[4], "blue", line)?,
        a: parse_field(fields[5], "alpha", line)?,
    })
}

fn parse_field<T: FromStr>(field: &str, what: &str, line: usize) -> Result<T> {
    field
        .parse::<T>()
        .map_err(|_| RoiMetricsError::InvalidColorLut(line, format!("invalid {} value '{}'", what, field)))
}

impl fmt::Display for ColorLut {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Color lookup table for {} brain regions.", self.entries.len())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const LUT_TEXT: &str = "#$Id: FreeSurferColorLUT.txt\n\
                            \n\
                            #No. Label Name:                            R   G   B   A\n\
                            0   Unknown                                 0   0   0   0\n\
                            2   Left-Cerebral-White-Matter              245 245 245 0\n\
                            17  Left-Hippocampus                        220 216 20  0  # trailing comment\n";

    #[test]
    fn a_lut_can_be_read() {
        let lut = ColorLut::from_reader(LUT_TEXT.as_bytes()).unwrap();
        assert_eq!(3, lut.len());
        assert_eq!(lut.entries[1].id, 2);
        assert_eq!(lut.entries[1].name, "Left-Cerebral-White-Matter");
        assert_eq!(lut.entries[2].r, 220);
        assert_eq!(lut.entries[2].b, 20);
        assert_eq!(lut.name_of(0), Some("Unknown"));
    }

    #[test]
    fn short_and_malformed_lines_are_rejected() {
        match ColorLut::from_reader("0 Unknown 0 0 0 0\n5 Broken 1 2\n".as_bytes()) {
            Err(RoiMetricsError::InvalidColorLut(line, _)) => assert_eq!(line, 2),
            other => panic!("expected InvalidColorLut, got {:?}", other),
        }
        let res = ColorLut::from_reader("x Unknown 0 0 0 0\n".as_bytes());
        assert!(matches!(res, Err(RoiMetricsError::InvalidColorLut(1, _))));
        let res = ColorLut::from_reader("1 Unknown 0 300 0 0\n".as_bytes());
        assert!(matches!(res, Err(RoiMetricsError::InvalidColorLut(1, _))));
    }

    #[test]
    fn gzipped_lut_files_can_be_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lut.txt.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(LUT_TEXT.as_bytes()).unwrap();
        enc.finish().unwrap();

        let lut = ColorLut::from_file(&path).unwrap();
        assert_eq!(lut.name_of(17), Some("Left-Hippocampus"));
    }
}
