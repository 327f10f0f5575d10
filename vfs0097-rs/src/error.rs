#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Not enough bytes left to read a field: needed, remaining
    NotEnoughData(usize, usize),
    /// Seek target lies past the end of the data: target, len
    OutOfBounds(usize, usize),
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotEnoughData(needed, remaining) => f.write_fmt(format_args!(
                "not enough data: needed {} bytes, {} remaining",
                needed, remaining
            )),
            Self::OutOfBounds(target, len) => f.write_fmt(format_args!(
                "position {} is out of bounds for {} bytes",
                target, len
            )),
        }
    }
}
