use crate::topology::CoreId;
use log::debug;
use std::io::{self, BufRead};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operation {
    Read,
    Write,
}

/// One `OP CORE HEXADDR` line of a trace.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TraceRecord {
    pub operation: Operation,
    pub core: CoreId,
    pub address: u64,
}

impl TraceRecord {
    /// Parse a single trace line. Returns `None` for anything other than exactly three tokens
    /// where the first is `READ` or `WRITE`, the second a decimal core index and the third a
    /// hexadecimal address (an `0x` prefix is accepted but not required).
    ///
    /// # Examples
    ///
    /// ```
    /// use coherence_sim::trace::{Operation, TraceRecord};
    /// let record = TraceRecord::parse("WRITE 3 7ffe10").unwrap();
    /// assert_eq!(record.operation, Operation::Write);
    /// assert_eq!(record.core, 3);
    /// assert_eq!(record.address, 0x7ffe10);
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let (op, core, address) = (tokens.next()?, tokens.next()?, tokens.next()?);
        if tokens.next().is_some() {
            return None;
        }
        let operation = match op {
            "READ" => Operation::Read,
            "WRITE" => Operation::Write,
            _ => return None,
        };
        let digits = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .unwrap_or(address);
        Some(Self {
            operation,
            core: core.parse().ok()?,
            address: u64::from_str_radix(digits, 16).ok()?,
        })
    }
}

/// `TraceReader` sequentially pulls records out of a line-oriented trace. Lines that do not parse
/// are skipped without interrupting the stream; only I/O failures are surfaced.
pub struct TraceReader<R> {
    reader: R,
    pub line_number: u64,
    pub skipped: u64,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            skipped: 0,
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = io::Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match self.reader.read_until(b'\n', &mut buffer) {
                Err(err) => return Some(Err(err)),
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    let parsed = std::str::from_utf8(&buffer)
                        .ok()
                        .and_then(TraceRecord::parse);
                    match parsed {
                        Some(record) => return Some(Ok(record)),
                        None => {
                            self.skipped += 1;
                            debug!(
                                "skipping trace line {}: {:?}",
                                self.line_number,
                                String::from_utf8_lossy(&buffer).trim_end()
                            );
                        }
                    }
                }
            }
        }
    }
}
