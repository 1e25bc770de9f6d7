use crate::opcode::Opcode;
use alloc::vec::Vec;

/// Mapping from program counter to code validity, specifically whether the
/// given position is a valid `JUMPDEST` -- a `JUMPDEST` opcode byte that
/// does not fall inside a `PUSHn` immediate.
#[derive(Clone, Debug)]
pub struct Valids(Vec<bool>);

impl Valids {
    /// Create a new valid mapping from given code bytes.
    pub fn new(code: &[u8]) -> Self {
        let mut valids: Vec<bool> = alloc::vec![false; code.len()];

        let mut i = 0;
        while i < code.len() {
            let opcode = Opcode(code[i]);
            if opcode == Opcode::JUMPDEST {
                valids[i] = true;
                i += 1;
            } else if let Some(v) = opcode.as_u8().checked_sub(Opcode::PUSH1.as_u8()) {
                if v < 32 {
                    i += v as usize + 2;
                } else {
                    i += 1;
                }
            } else {
                i += 1;
            }
        }

        Valids(valids)
    }

    /// Get the length of the valid mapping. This is the same as the
    /// code bytes length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the valids list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the position is valid.
    pub fn is_valid(&self, position: usize) -> bool {
        if position >= self.0.len() {
            return false;
        }

        self.0[position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jumpdest_inside_push_data_is_not_valid() {
        // PUSH1 0x5b -- the 0x5b is immediate data, not an opcode.
        let code = [Opcode::PUSH1.as_u8(), 0x5b, Opcode::JUMPDEST.as_u8()];
        let valids = Valids::new(&code);
        assert!(!valids.is_valid(1));
        assert!(valids.is_valid(2));
    }

    #[test]
    fn out_of_range_is_invalid() {
        let valids = Valids::new(&[Opcode::JUMPDEST.as_u8()]);
        assert!(!valids.is_valid(5));
    }
}
