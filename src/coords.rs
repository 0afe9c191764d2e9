/// 2-D coordinate array of the embedding projection
///
/// Rows carry no meaning of their own; they are addressed through the index mapping.
/// Reads NumPy `.npy` files (versions 1.0 to 3.0, `f4`/`f8`, either byte order, C or
/// Fortran layout) and, for files with a `.json` extension, a plain `[[x, y], ...]` list.
use std::path::Path;
use regex::Regex;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::error::{Artifact, LoadError};

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateArray {
    points: Vec<[f64; 2]>,
}

impl CoordinateArray {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::Missing {
                artifact: Artifact::Embeddings,
                path: path.to_path_buf(),
            });
        }

        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            artifact: Artifact::Embeddings,
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let parsed = if is_json {
            Self::from_json_bytes(&bytes)
        } else {
            Self::from_npy_bytes(&bytes)
        };

        parsed.map_err(|reason| LoadError::malformed(Artifact::Embeddings, path, reason))
    }

    /// Parse a `[[x, y], ...]` JSON list
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, String> {
        let rows: Vec<Vec<f64>> = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        let mut points = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match row.as_slice() {
                [x, y] => points.push([*x, *y]),
                _ => return Err(format!("row {} has {} values, expected 2", i, row.len())),
            }
        }
        Ok(Self { points })
    }

    /// Parse an in-memory `.npy` file holding an `(N, 2)` float array
    pub fn from_npy_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
            return Err("not a .npy file (bad magic)".to_string());
        }

        let major = bytes[6];
        let (header_len, header_start) = match major {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 => {
                if bytes.len() < 12 {
                    return Err("truncated .npy header".to_string());
                }
                let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
                (len as usize, 12)
            }
            other => return Err(format!("unsupported .npy format version {}", other)),
        };

        let data_start = header_start + header_len;
        if bytes.len() < data_start {
            return Err("truncated .npy header".to_string());
        }
        let header = std::str::from_utf8(&bytes[header_start..data_start])
            .map_err(|_| "non-text .npy header".to_string())?;
        let header = NpyHeader::parse(header)?;
        debug!("npy header: {:?}", header);

        let (rows, cols) = match header.shape.as_slice() {
            [rows, cols] => (*rows, *cols),
            shape => return Err(format!("expected a 2-D array, got shape {:?}", shape)),
        };
        if cols != 2 {
            return Err(format!("expected 2 columns, got {}", cols));
        }

        let item_size = header.dtype.size();
        let payload = &bytes[data_start..];
        let expected = rows
            .checked_mul(cols)
            .and_then(|count| count.checked_mul(item_size))
            .ok_or_else(|| format!("shape ({}, {}) is too large", rows, cols))?;
        if payload.len() != expected {
            return Err(format!(
                "payload is {} bytes, expected {} for shape ({}, {})",
                payload.len(),
                expected,
                rows,
                cols
            ));
        }

        let values: Vec<f64> = payload
            .chunks_exact(item_size)
            .map(|chunk| header.dtype.read(chunk))
            .collect();

        let points = if header.fortran_order {
            let (xs, ys) = values.split_at(values.len() / 2);
            xs.iter().zip(ys).map(|(x, y)| [*x, *y]).collect()
        } else {
            values.chunks_exact(2).map(|pair| [pair[0], pair[1]]).collect()
        };

        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `[rows, 2]`, mirroring the array shape on disk
    pub fn shape(&self) -> [usize; 2] {
        [self.points.len(), 2]
    }

    /// Row lookup; negative or out-of-bounds rows yield `None`
    pub fn get(&self, row: i64) -> Option<[f64; 2]> {
        usize::try_from(row)
            .ok()
            .and_then(|row| self.points.get(row))
            .copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FloatDtype {
    F32 { big_endian: bool },
    F64 { big_endian: bool },
}

impl FloatDtype {
    fn size(&self) -> usize {
        match self {
            FloatDtype::F32 { .. } => 4,
            FloatDtype::F64 { .. } => 8,
        }
    }

    fn read(&self, chunk: &[u8]) -> f64 {
        match *self {
            FloatDtype::F32 { big_endian } => {
                let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
                if big_endian {
                    f32::from_be_bytes(raw) as f64
                } else {
                    f32::from_le_bytes(raw) as f64
                }
            }
            FloatDtype::F64 { big_endian } => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&chunk[..8]);
                if big_endian {
                    f64::from_be_bytes(raw)
                } else {
                    f64::from_le_bytes(raw)
                }
            }
        }
    }
}

#[derive(Debug)]
struct NpyHeader {
    dtype: FloatDtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl NpyHeader {
    /// Parse the Python dict literal, e.g.
    /// `{'descr': '<f4', 'fortran_order': False, 'shape': (100, 2), }`
    fn parse(header: &str) -> Result<Self, String> {
        let descr = capture(header, r#"['"]descr['"]\s*:\s*['"]([<>|=]?)f(\d+)['"]"#, 2)?
            .ok_or_else(|| "missing or non-float 'descr' in .npy header".to_string())?;
        let big_endian = match descr[0].as_str() {
            ">" => true,
            "<" => false,
            _ => cfg!(target_endian = "big"),
        };
        let dtype = match descr[1].as_str() {
            "4" => FloatDtype::F32 { big_endian },
            "8" => FloatDtype::F64 { big_endian },
            size => return Err(format!("unsupported float size f{}", size)),
        };

        let fortran_order = capture(header, r#"['"]fortran_order['"]\s*:\s*(True|False)"#, 1)?
            .map(|groups| groups[0] == "True")
            .ok_or_else(|| "missing 'fortran_order' in .npy header".to_string())?;

        let shape_text = capture(header, r#"['"]shape['"]\s*:\s*\(([^)]*)\)"#, 1)?
            .ok_or_else(|| "missing 'shape' in .npy header".to_string())?;
        let shape = shape_text[0]
            .split(',')
            .map(str::trim)
            .filter(|dim| !dim.is_empty())
            .map(|dim| {
                dim.trim_end_matches('L')
                    .parse::<usize>()
                    .map_err(|_| format!("bad dimension '{}' in .npy shape", dim))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dtype,
            fortran_order,
            shape,
        })
    }
}

fn capture(text: &str, pattern: &str, groups: usize) -> Result<Option<Vec<String>>, String> {
    let re = Regex::new(pattern).map_err(|e| e.to_string())?;
    Ok(re.captures(text).map(|caps| {
        (1..=groups)
            .map(|i| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect()
    }))
}
