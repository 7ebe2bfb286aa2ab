/// Two independently sized buffers forming one logical message.
///
/// Either half may be absent; an empty slice counts as absent. The stream
/// sender skips absent halves, the multicast sender rejects them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadPair<'a> {
    pub first: Option<&'a [u8]>,
    pub second: Option<&'a [u8]>,
}

impl<'a> PayloadPair<'a> {
    pub fn new(first: &'a [u8], second: &'a [u8]) -> Self {
        PayloadPair {
            first: Some(first),
            second: Some(second),
        }
    }

    pub fn single(data: &'a [u8]) -> Self {
        PayloadPair {
            first: Some(data),
            second: None,
        }
    }

    /// Length of the first half, zero when absent.
    pub fn first_len(&self) -> usize {
        self.first.map_or(0, <[u8]>::len)
    }

    pub fn second_len(&self) -> usize {
        self.second.map_or(0, <[u8]>::len)
    }

    pub fn total_len(&self) -> usize {
        self.first_len() + self.second_len()
    }

    /// Halves that carry data, in transmission order.
    pub fn present(&self) -> impl Iterator<Item = &'a [u8]> {
        [self.first, self.second]
            .into_iter()
            .flatten()
            .filter(|half| !half.is_empty())
    }
}

/// Ordered spans of one stream message: optional marker, then the payload halves.
pub(crate) fn segments<'a>(
    marker: Option<&'a [u8]>,
    payload: &PayloadPair<'a>,
) -> impl Iterator<Item = &'a [u8]> {
    marker
        .into_iter()
        .filter(|m| !m.is_empty())
        .chain(payload.present())
}
