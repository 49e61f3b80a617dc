pub trait Serialize<'a> {
    /// Writes the header part of `self` into `buf`.
    ///
    /// Returns the trailing bytes that may be written straight from `self` without copying.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]>;
}
