/// Cache-line granular key used for every piece of coherence bookkeeping.
pub type Tag = u64;

/// Number of offset bits shifted out of an address by default (64-byte lines).
pub const DEFAULT_LINE_SHIFT: u32 = 6;

/// `LineAddress` maps a raw memory address onto the cache line it falls in. Only the line tag
/// participates in coherence.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct LineAddress {
    pub tag: Tag,
}

impl LineAddress {
    /// Provided a raw address and the line shift (log2 of the line size in bytes), produce the
    /// line address.
    ///
    /// # Arguments
    ///
    /// * `address` - raw byte address taken from a trace record.
    /// * `line_shift` - number of low bits forming the intra-line offset. Must be below 64.
    ///
    /// # Examples
    ///
    /// ```
    /// use coherence_sim::address::LineAddress;
    /// let line = LineAddress::new(0x1f4f, 6);
    /// assert_eq!(line.tag, 0x7d);
    /// ```
    pub fn new(address: u64, line_shift: u32) -> Self {
        Self {
            tag: address >> line_shift,
        }
    }
}
