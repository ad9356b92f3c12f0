use crate::error::DecodeError;
use crate::instr::Instr;

/// An ordered, append-only sequence of instructions with a bounded
/// capacity fixed at construction. The decoder fills one; the emulator
/// reads it; the emitter reads the residual `Code` it produces.
#[derive(Debug, Clone)]
pub struct Code {
    instructions: Vec<Instr>,
    capacity: usize,
}

impl Code {
    /// Allocates a `Code` buffer able to hold up to `capacity` instructions.
    pub fn with_capacity(capacity: usize) -> Code {
        Code {
            instructions: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.instructions.len() >= self.capacity
    }

    /// Appends `instr`, failing with `DecodeError::TooManyInstructions` if
    /// the buffer is already at capacity.
    pub fn push(&mut self, instr: Instr) -> Result<(), DecodeError> {
        if self.is_full() {
            return Err(DecodeError::TooManyInstructions {
                capacity: self.capacity,
            });
        }
        self.instructions.push(instr);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instr> {
        self.instructions.iter()
    }

    pub fn as_slice(&self) -> &[Instr] {
        &self.instructions
    }

    pub fn last(&self) -> Option<&Instr> {
        self.instructions.last()
    }
}

impl<'a> IntoIterator for &'a Code {
    type Item = &'a Instr;
    type IntoIter = std::slice::Iter<'a, Instr>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::InstrKind;

    #[test]
    fn push_respects_capacity() {
        let mut code = Code::with_capacity(1);
        assert!(code.push(Instr::simple(0, 1, InstrKind::Nop)).is_ok());
        assert!(code.is_full());
        assert!(matches!(
            code.push(Instr::simple(1, 1, InstrKind::Ret)),
            Err(DecodeError::TooManyInstructions { capacity: 1 })
        ));
    }

    #[test]
    fn len_tracks_successful_pushes_only() {
        let mut code = Code::with_capacity(2);
        code.push(Instr::simple(0, 1, InstrKind::Nop)).unwrap();
        code.push(Instr::simple(1, 1, InstrKind::Ret)).unwrap();
        assert_eq!(code.len(), 2);
        assert_eq!(code.as_slice().len(), 2);
    }
}
