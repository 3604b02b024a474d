//! Quality step stream.
//!
//! Layout (little-endian):
//!
//! ```text
//! header  nodes:i32 links:i32
//! period  node:f32 x nodes, link:f32 x links
//! trailer period_count:i32
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use crate::codec::{count_i32, count_usize, get_f32, get_i32, put_f32, put_i32, write_all};
use crate::{ResultsError, ResultsResult};

const HEADER_LEN: u64 = 8;

/// Node concentrations and link average concentrations for one reporting period.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityPeriod {
    pub nodes: Vec<f32>,
    pub links: Vec<f32>,
}

pub struct QualityStreamWriter<W: Write> {
    inner: W,
    node_count: usize,
    link_count: usize,
    periods: usize,
    buf: Vec<u8>,
}

impl<W: Write> QualityStreamWriter<W> {
    pub fn new(mut inner: W, node_count: usize, link_count: usize) -> ResultsResult<Self> {
        let mut buf = Vec::with_capacity(4 * (node_count + link_count));
        put_i32(&mut buf, count_i32("node", node_count)?);
        put_i32(&mut buf, count_i32("link", link_count)?);
        write_all(&mut inner, &buf)?;
        Ok(Self {
            inner,
            node_count,
            link_count,
            periods: 0,
            buf,
        })
    }

    pub fn periods_written(&self) -> usize {
        self.periods
    }

    pub fn write_period(&mut self, nodes: &[f64], links: &[f64]) -> ResultsResult<()> {
        if nodes.len() != self.node_count || links.len() != self.link_count {
            return Err(ResultsError::Mismatch {
                what: format!(
                    "period has {}/{} values, stream has {}/{} nodes/links",
                    nodes.len(),
                    links.len(),
                    self.node_count,
                    self.link_count
                ),
            });
        }
        self.buf.clear();
        for &c in nodes.iter().chain(links) {
            put_f32(&mut self.buf, c as f32);
        }
        write_all(&mut self.inner, &self.buf)?;
        self.periods += 1;
        Ok(())
    }

    /// Write the period count trailer, flush, and hand back the writer.
    pub fn finish(mut self) -> ResultsResult<W> {
        self.buf.clear();
        put_i32(&mut self.buf, count_i32("period", self.periods)?);
        write_all(&mut self.inner, &self.buf)?;
        self.inner.flush().map_err(ResultsError::Write)?;
        Ok(self.inner)
    }
}

pub struct QualityStreamReader<R: Read + Seek> {
    inner: R,
    node_count: usize,
    link_count: usize,
    period_count: usize,
    next: usize,
}

impl<R: Read + Seek> QualityStreamReader<R> {
    /// Open a finished stream; the trailer is read first to learn the period count.
    pub fn new(mut inner: R) -> ResultsResult<Self> {
        let node_count = count_usize("node", get_i32(&mut inner)?)?;
        let link_count = count_usize("link", get_i32(&mut inner)?)?;
        let end = inner.seek(SeekFrom::End(-4)).map_err(ResultsError::Read)?;
        let period_count = count_usize("period", get_i32(&mut inner)?)?;
        let expected = HEADER_LEN + (period_count * 4 * (node_count + link_count)) as u64;
        if end != expected {
            return Err(ResultsError::Mismatch {
                what: format!(
                    "quality stream holds {} bytes of periods, trailer announces {}",
                    end.saturating_sub(HEADER_LEN),
                    expected - HEADER_LEN
                ),
            });
        }
        inner
            .seek(SeekFrom::Start(HEADER_LEN))
            .map_err(ResultsError::Read)?;
        Ok(Self {
            inner,
            node_count,
            link_count,
            period_count,
            next: 0,
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn link_count(&self) -> usize {
        self.link_count
    }

    pub fn period_count(&self) -> usize {
        self.period_count
    }

    pub fn next_period(&mut self) -> ResultsResult<Option<QualityPeriod>> {
        if self.next >= self.period_count {
            return Ok(None);
        }
        let mut p = QualityPeriod {
            nodes: Vec::with_capacity(self.node_count),
            links: Vec::with_capacity(self.link_count),
        };
        for _ in 0..self.node_count {
            p.nodes.push(get_f32(&mut self.inner)?);
        }
        for _ in 0..self.link_count {
            p.links.push(get_f32(&mut self.inner)?);
        }
        self.next += 1;
        Ok(Some(p))
    }

    /// Random access to period `index`.
    pub fn period(&mut self, index: usize) -> ResultsResult<Option<QualityPeriod>> {
        if index >= self.period_count {
            return Ok(None);
        }
        let offset = HEADER_LEN + (index * 4 * (self.node_count + self.link_count)) as u64;
        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(ResultsError::Read)?;
        self.next = index;
        self.next_period()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn periods_round_trip_as_f32() {
        let mut w = QualityStreamWriter::new(Vec::new(), 2, 1).unwrap();
        w.write_period(&[1.0, 0.5], &[0.75]).unwrap();
        w.write_period(&[0.9, 0.4], &[0.65]).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 8 + 2 * 12 + 4);

        let mut r = QualityStreamReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.period_count(), 2);
        let p = r.next_period().unwrap().unwrap();
        assert_eq!(p.nodes, vec![1.0, 0.5]);
        assert_eq!(p.links, vec![0.75]);
        assert_eq!(r.next_period().unwrap().unwrap().links, vec![0.65f64 as f32]);
        assert!(r.next_period().unwrap().is_none());
        assert_eq!(r.period(0).unwrap().unwrap().nodes[0], 1.0);
    }

    #[test]
    fn unfinished_stream_is_rejected() {
        let mut w = QualityStreamWriter::new(Vec::new(), 2, 1).unwrap();
        w.write_period(&[1.0, 0.5], &[0.75]).unwrap();
        // no trailer: last four bytes are data
        let bytes = std::mem::take(&mut w.inner);
        assert!(QualityStreamReader::new(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn empty_stream() {
        let bytes = QualityStreamWriter::new(Vec::new(), 3, 2)
            .unwrap()
            .finish()
            .unwrap();
        let mut r = QualityStreamReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.period_count(), 0);
        assert!(r.next_period().unwrap().is_none());
    }
}
