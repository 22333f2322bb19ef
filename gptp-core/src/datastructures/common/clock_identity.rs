use crate::datastructures::{WireFormat, WireFormatError};

/// The identity of a gPTP time-aware system.
///
/// Derived from a 6-byte MAC address by the EUI-48 → EUI-64 conversion: a
/// 2-byte insert (`FF:FE` by default) is placed at positions 3-4. Domain 0
/// uses the resulting identity as-is; non-zero domains overwrite byte 3 with
/// `domainNumber * 16 + original_byte3` so that per-domain clock identities
/// stay distinguishable while tracing back to the same physical interface.
///
/// For more details, see *IEEE1588-2019 section 7.5.2.2.2* and *IEEE
/// 802.1AS-2020 section 8.5.2.2*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    /// Convert a 6-byte MAC address into an 8-byte clock identity using the
    /// EUI-48 → EUI-64 conversion, inserting `insert` (`FF:FE` per the
    /// standard) at positions 3-4.
    ///
    /// # Example
    /// ```
    /// # use gptp_core::datastructures::common::ClockIdentity;
    /// let id = ClockIdentity::from_eui48(
    ///     [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
    ///     [0xFF, 0xFE],
    /// );
    /// assert_eq!(id.0, [0x11, 0x22, 0x33, 0xFF, 0xFE, 0x44, 0x55, 0x66]);
    /// ```
    pub fn from_eui48(mac: [u8; 6], insert: [u8; 2]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0..3].copy_from_slice(&mac[0..3]);
        bytes[3..5].copy_from_slice(&insert);
        bytes[5..8].copy_from_slice(&mac[3..6]);
        Self(bytes)
    }

    /// Convert a 6-byte MAC address into a clock identity using the
    /// standard's default `FF:FE` insert.
    pub fn from_mac_address(mac: [u8; 6]) -> Self {
        Self::from_eui48(mac, [0xFF, 0xFE])
    }

    /// Derive the clock identity used by a non-zero gPTP domain from the
    /// domain-0 identity, per the data model's domain-byte manipulation:
    /// byte 3 is overwritten with `domainNumber * 16 + original_byte3`.
    ///
    /// # Example
    /// ```
    /// # use gptp_core::datastructures::common::ClockIdentity;
    /// let base = ClockIdentity([0x11, 0x22, 0x33, 0xFF, 0xFE, 0x44, 0x55, 0x66]);
    /// let domain1 = base.for_domain(1);
    /// assert_eq!(domain1.0[3], 0x10 + 0xFF);
    /// ```
    pub fn for_domain(self, domain_number: u8) -> Self {
        if domain_number == 0 {
            return self;
        }
        let mut bytes = self.0;
        bytes[3] = domain_number.wrapping_mul(16).wrapping_add(bytes[3]);
        Self(bytes)
    }
}

impl WireFormat for ClockIdentity {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        buffer[0..8].copy_from_slice(&self.0);
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(Self(buffer[0..8].try_into().unwrap()))
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, val) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ":")?;
            }

            write!(f, "{:02x}", val)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_identity_wireformat() {
        let representations = [(
            [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08u8],
            ClockIdentity([0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]),
        )];

        for (byte_representation, object_representation) in representations {
            let mut serialization_buffer = [0; 8];
            object_representation
                .serialize(&mut serialization_buffer)
                .unwrap();
            assert_eq!(serialization_buffer, byte_representation);

            let deserialized_data = ClockIdentity::deserialize(&byte_representation).unwrap();
            assert_eq!(deserialized_data, object_representation);
        }
    }

    #[test]
    fn eui48_to_eui64_no_insert_override() {
        let id = ClockIdentity::from_mac_address([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(id, ClockIdentity([0x11, 0x22, 0x33, 0xFF, 0xFE, 0x44, 0x55, 0x66]));
    }

    #[test]
    fn domain_zero_is_identity() {
        let id = ClockIdentity::from_mac_address([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(id.for_domain(0), id);
    }

    #[test]
    fn nonzero_domain_rewrites_byte_three() {
        let id = ClockIdentity::from_mac_address([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let domain2 = id.for_domain(2);
        assert_eq!(domain2.0[3], 2u8.wrapping_mul(16).wrapping_add(0xFF));
        // every other byte is untouched
        assert_eq!(domain2.0[0..3], id.0[0..3]);
        assert_eq!(domain2.0[4..8], id.0[4..8]);
    }
}
