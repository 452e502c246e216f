use core::fmt;

/// Service primitive attached to an L2 frame crossing the L1/L2 boundary.
///
/// DATA carries a payload. ESTABLISH opens both halves of a channel so the
/// handset, which waits to observe the idle pattern, sees it come up.
/// RELEASE closes both halves after the L2 DISC/DM exchange. ERROR closes
/// only the transmit half and lets the receiver time out, so a channel is
/// never reused while the handset is still transmitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePrimitive {
    Data,
    Establish,
    Release,
    Error,
}

/// An L2 frame: a primitive plus payload octets.
///
/// Payload bits are MSB-first across the frame but LSB-first within each
/// octet on the air interface; the L1 pipelines apply that rewrite, not
/// this type.
#[derive(Clone, PartialEq, Eq)]
pub struct L2Frame {
    primitive: FramePrimitive,
    data: Vec<u8>,
}

impl L2Frame {
    pub fn new(primitive: FramePrimitive, data: Vec<u8>) -> L2Frame {
        L2Frame { primitive, data }
    }

    /// A payload-less control primitive (ESTABLISH / RELEASE / ERROR).
    pub fn control(primitive: FramePrimitive) -> L2Frame {
        assert!(primitive != FramePrimitive::Data, "DATA frames need a payload");
        L2Frame { primitive, data: Vec::new() }
    }

    pub fn primitive(&self) -> FramePrimitive {
        self.primitive
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len_bits(&self) -> usize {
        self.data.len() * 8
    }
}

impl fmt::Debug for L2Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L2Frame {{ {:?}", self.primitive)?;
        if !self.data.is_empty() {
            write!(f, " ")?;
            for b in &self.data {
                write!(f, "{:02x}", b)?;
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_frame() {
        let f = L2Frame::new(FramePrimitive::Data, vec![0x01, 0x2b]);
        assert_eq!(f.len_bits(), 16);
        assert_eq!(f.data(), &[0x01, 0x2b]);
    }

    #[test]
    #[should_panic(expected = "DATA frames need a payload")]
    fn test_control_rejects_data() {
        L2Frame::control(FramePrimitive::Data);
    }
}
