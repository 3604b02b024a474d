//! Little-endian field encoding shared by the step streams.

use std::io::{Read, Write};

use crate::{ResultsError, ResultsResult};

pub(crate) fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_all<W: Write>(w: &mut W, buf: &[u8]) -> ResultsResult<()> {
    w.write_all(buf).map_err(ResultsError::Write)
}

pub(crate) fn read_exact<R: Read, const N: usize>(r: &mut R) -> ResultsResult<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b).map_err(ResultsError::Read)?;
    Ok(b)
}

pub(crate) fn get_i32<R: Read>(r: &mut R) -> ResultsResult<i32> {
    Ok(i32::from_le_bytes(read_exact::<R, 4>(r)?))
}

pub(crate) fn get_i64<R: Read>(r: &mut R) -> ResultsResult<i64> {
    Ok(i64::from_le_bytes(read_exact::<R, 8>(r)?))
}

pub(crate) fn get_f64<R: Read>(r: &mut R) -> ResultsResult<f64> {
    Ok(f64::from_le_bytes(read_exact::<R, 8>(r)?))
}

pub(crate) fn get_f32<R: Read>(r: &mut R) -> ResultsResult<f32> {
    Ok(f32::from_le_bytes(read_exact::<R, 4>(r)?))
}

/// Convert a count to the i32 used in stream headers.
pub(crate) fn count_i32(what: &str, n: usize) -> ResultsResult<i32> {
    i32::try_from(n).map_err(|_| ResultsError::Mismatch {
        what: format!("{} count {} exceeds the stream limit", what, n),
    })
}

/// Convert a header count back to usize.
pub(crate) fn count_usize(what: &str, n: i32) -> ResultsResult<usize> {
    usize::try_from(n).map_err(|_| ResultsError::Mismatch {
        what: format!("negative {} count {}", what, n),
    })
}
