//! Hydraulic step stream.
//!
//! Layout (little-endian):
//!
//! ```text
//! header  version:i32 nodes:i32 links:i32 report_start:i64 report_step:i64 duration:i64
//! step    { demand:f64 head:f64 reserved:f64 } x nodes
//!         { flow:f64 head_delta:f64 reserved:f64 } x links
//!         step:i64 time:i64
//! ```
//!
//! Each step holds the solution valid from `time` for `step` seconds. The
//! final step has `step == 0` and ends the stream.

use std::io::{Read, Write};

use crate::codec::{
    count_i32, count_usize, get_f64, get_i32, get_i64, put_f64, put_i32, put_i64, write_all,
};
use crate::{ResultsError, ResultsResult};

pub const HYDRAULIC_FORMAT_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydraulicHeader {
    pub version: i32,
    pub node_count: usize,
    pub link_count: usize,
    pub report_start: i64,
    pub report_step: i64,
    pub duration: i64,
}

impl HydraulicHeader {
    pub fn new(
        node_count: usize,
        link_count: usize,
        report_start: i64,
        report_step: i64,
        duration: i64,
    ) -> Self {
        Self {
            version: HYDRAULIC_FORMAT_VERSION,
            node_count,
            link_count,
            report_start,
            report_step,
            duration,
        }
    }

    fn record_len(&self) -> usize {
        24 * (self.node_count + self.link_count) + 16
    }
}

/// One hydraulic solution. Flows and demands in cfs, heads in ft.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HydraulicStep {
    pub demand: Vec<f64>,
    pub head: Vec<f64>,
    pub flow: Vec<f64>,
    /// Head loss across each link (start minus end head).
    pub head_delta: Vec<f64>,
    /// Seconds this solution stays in effect; zero for the last step.
    pub step: i64,
    pub time: i64,
}

impl HydraulicStep {
    pub fn is_last(&self) -> bool {
        self.step == 0
    }

    /// Whether this step's solution is in effect at `time`.
    pub fn covers(&self, time: i64) -> bool {
        time >= self.time && (self.is_last() || time < self.time + self.step)
    }
}

pub struct HydraulicStreamWriter<W: Write> {
    inner: W,
    header: HydraulicHeader,
    buf: Vec<u8>,
    steps: usize,
}

impl<W: Write> HydraulicStreamWriter<W> {
    /// Start a stream by writing its header.
    pub fn new(mut inner: W, header: HydraulicHeader) -> ResultsResult<Self> {
        let mut buf = Vec::with_capacity(header.record_len());
        put_i32(&mut buf, header.version);
        put_i32(&mut buf, count_i32("node", header.node_count)?);
        put_i32(&mut buf, count_i32("link", header.link_count)?);
        put_i64(&mut buf, header.report_start);
        put_i64(&mut buf, header.report_step);
        put_i64(&mut buf, header.duration);
        write_all(&mut inner, &buf)?;
        Ok(Self {
            inner,
            header,
            buf,
            steps: 0,
        })
    }

    pub fn header(&self) -> &HydraulicHeader {
        &self.header
    }

    pub fn steps_written(&self) -> usize {
        self.steps
    }

    pub fn write_step(&mut self, step: &HydraulicStep) -> ResultsResult<()> {
        let n = self.header.node_count;
        let l = self.header.link_count;
        if step.demand.len() != n || step.head.len() != n {
            return Err(ResultsError::Mismatch {
                what: format!("step has {} node values, stream has {} nodes", step.head.len(), n),
            });
        }
        if step.flow.len() != l || step.head_delta.len() != l {
            return Err(ResultsError::Mismatch {
                what: format!("step has {} link values, stream has {} links", step.flow.len(), l),
            });
        }
        self.buf.clear();
        for i in 0..n {
            put_f64(&mut self.buf, step.demand[i]);
            put_f64(&mut self.buf, step.head[i]);
            put_f64(&mut self.buf, 0.0);
        }
        for k in 0..l {
            put_f64(&mut self.buf, step.flow[k]);
            put_f64(&mut self.buf, step.head_delta[k]);
            put_f64(&mut self.buf, 0.0);
        }
        put_i64(&mut self.buf, step.step);
        put_i64(&mut self.buf, step.time);
        write_all(&mut self.inner, &self.buf)?;
        self.steps += 1;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> ResultsResult<W> {
        self.inner.flush().map_err(ResultsError::Write)?;
        Ok(self.inner)
    }
}

pub struct HydraulicStreamReader<R: Read> {
    inner: R,
    header: HydraulicHeader,
    done: bool,
}

impl<R: Read> HydraulicStreamReader<R> {
    pub fn new(mut inner: R) -> ResultsResult<Self> {
        let version = get_i32(&mut inner)?;
        if version != HYDRAULIC_FORMAT_VERSION {
            return Err(ResultsError::Mismatch {
                what: format!("unsupported hydraulic stream version {}", version),
            });
        }
        let node_count = count_usize("node", get_i32(&mut inner)?)?;
        let link_count = count_usize("link", get_i32(&mut inner)?)?;
        let header = HydraulicHeader {
            version,
            node_count,
            link_count,
            report_start: get_i64(&mut inner)?,
            report_step: get_i64(&mut inner)?,
            duration: get_i64(&mut inner)?,
        };
        Ok(Self {
            inner,
            header,
            done: false,
        })
    }

    pub fn header(&self) -> &HydraulicHeader {
        &self.header
    }

    /// Next step, or `None` once the last step has been read.
    pub fn next_step(&mut self) -> ResultsResult<Option<HydraulicStep>> {
        if self.done {
            return Ok(None);
        }
        let n = self.header.node_count;
        let l = self.header.link_count;
        let mut s = HydraulicStep {
            demand: Vec::with_capacity(n),
            head: Vec::with_capacity(n),
            flow: Vec::with_capacity(l),
            head_delta: Vec::with_capacity(l),
            step: 0,
            time: 0,
        };
        let r = &mut self.inner;
        for _ in 0..n {
            s.demand.push(get_f64(r)?);
            s.head.push(get_f64(r)?);
            get_f64(r)?;
        }
        for _ in 0..l {
            s.flow.push(get_f64(r)?);
            s.head_delta.push(get_f64(r)?);
            get_f64(r)?;
        }
        s.step = get_i64(r)?;
        s.time = get_i64(r)?;
        if s.step < 0 {
            return Err(ResultsError::Mismatch {
                what: format!("negative step length {} at t = {}", s.step, s.time),
            });
        }
        self.done = s.is_last();
        Ok(Some(s))
    }

    /// Scan forward to the step in effect at `time`.
    ///
    /// Returns `None` if the stream ends first or `time` precedes the
    /// current position.
    pub fn seek_to(&mut self, time: i64) -> ResultsResult<Option<HydraulicStep>> {
        while let Some(step) = self.next_step()? {
            if step.covers(time) {
                return Ok(Some(step));
            }
            if step.time > time {
                return Ok(None);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(time: i64, len: i64, v: f64) -> HydraulicStep {
        HydraulicStep {
            demand: vec![v, 0.0],
            head: vec![100.0, 90.0 + v],
            flow: vec![v],
            head_delta: vec![10.0 - v],
            step: len,
            time,
        }
    }

    #[test]
    fn header_is_36_bytes() {
        let w = HydraulicStreamWriter::new(Vec::new(), HydraulicHeader::new(2, 1, 0, 3600, 7200))
            .unwrap();
        assert_eq!(w.finish().unwrap().len(), 36);
    }

    #[test]
    fn reads_back_steps_until_terminator() {
        let mut w =
            HydraulicStreamWriter::new(Vec::new(), HydraulicHeader::new(2, 1, 0, 3600, 7200))
                .unwrap();
        w.write_step(&step(0, 3600, 1.0)).unwrap();
        w.write_step(&step(3600, 3600, 2.0)).unwrap();
        w.write_step(&step(7200, 0, 3.0)).unwrap();
        assert_eq!(w.steps_written(), 3);
        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 36 + 3 * (24 * 3 + 16));

        let mut r = HydraulicStreamReader::new(bytes.as_slice()).unwrap();
        assert_eq!(r.header().report_step, 3600);
        assert_eq!(r.next_step().unwrap(), Some(step(0, 3600, 1.0)));
        assert_eq!(r.next_step().unwrap(), Some(step(3600, 3600, 2.0)));
        assert!(r.next_step().unwrap().unwrap().is_last());
        assert_eq!(r.next_step().unwrap(), None);
    }

    #[test]
    fn seek_scans_forward() {
        let mut w =
            HydraulicStreamWriter::new(Vec::new(), HydraulicHeader::new(2, 1, 0, 3600, 7200))
                .unwrap();
        w.write_step(&step(0, 1800, 1.0)).unwrap();
        w.write_step(&step(1800, 5400, 2.0)).unwrap();
        w.write_step(&step(7200, 0, 3.0)).unwrap();
        let bytes = w.finish().unwrap();

        let mut r = HydraulicStreamReader::new(bytes.as_slice()).unwrap();
        let s = r.seek_to(3600).unwrap().unwrap();
        assert_eq!(s.time, 1800);
        let s = r.seek_to(7200).unwrap().unwrap();
        assert_eq!(s.time, 7200);
        assert!(r.seek_to(0).unwrap().is_none());
    }

    #[test]
    fn wrong_counts_are_rejected() {
        let mut w = HydraulicStreamWriter::new(Vec::new(), HydraulicHeader::new(3, 1, 0, 3600, 0))
            .unwrap();
        let err = w.write_step(&step(0, 0, 1.0)).unwrap_err();
        assert_eq!(err.code(), 306);
    }

    #[test]
    fn truncated_stream_is_a_read_error() {
        let mut w =
            HydraulicStreamWriter::new(Vec::new(), HydraulicHeader::new(2, 1, 0, 3600, 7200))
                .unwrap();
        w.write_step(&step(0, 3600, 1.0)).unwrap();
        let bytes = w.finish().unwrap();
        let mut r = HydraulicStreamReader::new(bytes.as_slice()).unwrap();
        r.next_step().unwrap();
        let err = r.next_step().unwrap_err();
        assert_eq!(err.code(), 303);
    }
}
