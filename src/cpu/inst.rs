use std::fmt;

/// The instruction set. Each opcode is followed by a fixed number of argument bytes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Load the accumulator with a constant.
    LoadAccImmediate = 0xA9,
    /// Load the accumulator from memory.
    LoadAccDirect = 0xAD,
    /// Store the accumulator in memory.
    StoreAcc = 0x8D,
    /// Add the contents of memory to the accumulator.
    AddWithCarry = 0x6D,
    LoadXImmediate = 0xA2,
    LoadXDirect = 0xAE,
    LoadYImmediate = 0xA0,
    LoadYDirect = 0xAC,
    NoOp = 0xEA,
    Break = 0x00,
    /// Set the Z flag if memory equals the X register.
    CompareX = 0xEC,
    /// Branch by a relative offset if the Z flag is clear.
    BranchNotEqual = 0xD0,
    Increment = 0xEE,
    SystemCall = 0xFF,
}

impl Opcode {
    /// Returns the number of argument bytes following the opcode.
    pub fn arg_count(&self) -> usize {
        match self {
            Self::NoOp | Self::Break | Self::SystemCall => 0,
            Self::LoadAccImmediate
            | Self::LoadXImmediate
            | Self::LoadYImmediate
            | Self::BranchNotEqual => 1,
            Self::LoadAccDirect
            | Self::StoreAcc
            | Self::AddWithCarry
            | Self::LoadXDirect
            | Self::LoadYDirect
            | Self::CompareX
            | Self::Increment => 2,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::LoadAccImmediate | Self::LoadAccDirect => "LDA",
            Self::StoreAcc => "STA",
            Self::AddWithCarry => "ADC",
            Self::LoadXImmediate | Self::LoadXDirect => "LDX",
            Self::LoadYImmediate | Self::LoadYDirect => "LDY",
            Self::NoOp => "NOP",
            Self::Break => "BRK",
            Self::CompareX => "CPX",
            Self::BranchNotEqual => "BNE",
            Self::Increment => "INC",
            Self::SystemCall => "SYS",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0xA9 => Self::LoadAccImmediate,
            0xAD => Self::LoadAccDirect,
            0x8D => Self::StoreAcc,
            0x6D => Self::AddWithCarry,
            0xA2 => Self::LoadXImmediate,
            0xAE => Self::LoadXDirect,
            0xA0 => Self::LoadYImmediate,
            0xAC => Self::LoadYDirect,
            0xEA => Self::NoOp,
            0x00 => Self::Break,
            0xEC => Self::CompareX,
            0xD0 => Self::BranchNotEqual,
            0xEE => Self::Increment,
            0xFF => Self::SystemCall,
            _ => return Err(byte),
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:02X})", self.mnemonic(), *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_every_byte() {
        let valid: Vec<_> = (0..=u8::MAX)
            .filter_map(|byte| Opcode::try_from(byte).ok())
            .collect();
        assert_eq!(valid.len(), 14);
        for opcode in valid {
            assert_eq!(Opcode::try_from(opcode as u8), Ok(opcode));
        }
    }

    #[test]
    fn unknown_opcode() {
        assert_eq!(Opcode::try_from(0xFA), Err(0xFA));
    }

    #[test]
    fn arg_counts() {
        assert_eq!(Opcode::Break.arg_count(), 0);
        assert_eq!(Opcode::BranchNotEqual.arg_count(), 1);
        assert_eq!(Opcode::StoreAcc.arg_count(), 2);
    }
}
